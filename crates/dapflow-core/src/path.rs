use dapflow_types::{HostBreakpoint, Location};
use std::fmt;
use std::path::{Path, PathBuf};

/// Expand tilde (~) in paths to the user's home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(stripped);
    }
    PathBuf::from(path)
}

/// Normalize a path for comparison (resolve to absolute, canonicalize if possible)
///
/// Falls back to joining with the current directory when the file does not
/// exist, so breakpoints on files that are not yet written still get a
/// stable identity.
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        }
    })
}

/// Check if two paths are equivalent after normalization
pub fn paths_equal(path1: &Path, path2: &Path) -> bool {
    normalize_path(path1) == normalize_path(path2)
}

/// Breakpoint identity: normalized absolute path plus zero-based line.
///
/// Host-issued ids are not stable across remove/re-add, so this key is the
/// only identity the core relies on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocationKey {
    path: PathBuf,
    line: u32,
}

impl LocationKey {
    pub fn new(path: &Path, zero_based_line: u32) -> Self {
        Self {
            path: normalize_path(path),
            line: zero_based_line,
        }
    }

    pub fn of_location(location: &Location) -> Self {
        Self::new(&location.path, location.zero_based_line())
    }

    pub fn of_host(breakpoint: &HostBreakpoint) -> Self {
        Self::new(&breakpoint.path, breakpoint.line)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn zero_based_line(&self) -> u32 {
        self.line
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path.display(), self.line)
    }
}
