pub mod fs;
pub mod rsync;
