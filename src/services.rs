pub mod run_sync;
