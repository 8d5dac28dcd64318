use std::{
    fmt::Display,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::PlanError;

/// Depth of `path` below `root`, counted in path separators.
///
/// `root` itself has depth 0, its children depth 1. Returns `None` when `path`
/// does not live under `root`.
pub fn get_depth(root: &Path, path: &Path) -> Option<usize> {
    path.strip_prefix(root)
        .ok()
        .map(|rest| rest.components().count())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryType {
    File,
    Dir,
}

/// A directory or file selected for transfer, relative to the traversal root.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Entry {
    pub kind: EntryType,
    pub path_name: PathBuf,
}

impl Entry {
    pub fn new(kind: EntryType, path_name: &Path) -> Self {
        Self {
            kind,
            path_name: path_name.to_path_buf(),
        }
    }
}

impl Display for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            EntryType::Dir => write!(f, "{}/", self.path_name.display()),
            EntryType::File => write!(f, "{}", self.path_name.display()),
        }
    }
}

/// Directories and files found at the requested depth.
///
/// Within one parent directory entries are sorted by file name. Nothing else
/// about the order is promised.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub dirs: Vec<PathBuf>,
    pub files: Vec<PathBuf>,
}

impl SyncPlan {
    pub fn len(&self) -> usize {
        self.dirs.len() + self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty() && self.files.is_empty()
    }

    /// Directories first, then files.
    pub fn entries(&self) -> impl Iterator<Item = Entry> + '_ {
        self.dirs
            .iter()
            .map(|dir| Entry::new(EntryType::Dir, dir))
            .chain(self.files.iter().map(|file| Entry::new(EntryType::File, file)))
    }
}

/// Collect the children of every directory sitting `depth - 1` levels below
/// `root`.
///
/// A `depth` of zero or less never matches any directory and yields an empty
/// plan. Unreadable entries are logged and skipped.
pub fn plan(root: &Path, depth: i64) -> Result<SyncPlan, PlanError> {
    if depth <= 0 {
        debug!(depth, "depth is not positive, nothing to plan");
        return Ok(SyncPlan::default());
    }

    let root = resolve_root(root)?;
    let parent_depth = (depth - 1) as usize;
    let mut plan = SyncPlan::default();

    let walker = WalkDir::new(&root)
        .max_depth(parent_depth + 1)
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("Skipping unreadable entry: {}", err);
                continue;
            }
        };

        let Some(parent) = entry.path().parent() else {
            continue;
        };
        if entry.depth() == 0 || get_depth(&root, parent) != Some(parent_depth) {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(&root) else {
            continue;
        };

        if entry.file_type().is_dir() {
            plan.dirs.push(relative.to_path_buf());
        } else {
            plan.files.push(relative.to_path_buf());
        }
    }

    debug!(
        root = %root.display(),
        depth,
        dirs = plan.dirs.len(),
        files = plan.files.len(),
        "planned entries"
    );

    Ok(plan)
}

fn resolve_root(root: &Path) -> Result<PathBuf, PlanError> {
    let absolute = std::path::absolute(root).map_err(|source| PlanError::Resolve {
        path: root.to_path_buf(),
        source,
    })?;

    if !absolute.exists() {
        return Err(PlanError::RootNotFound { path: absolute });
    }
    if !absolute.is_dir() {
        return Err(PlanError::NotADirectory { path: absolute });
    }

    Ok(absolute)
}
