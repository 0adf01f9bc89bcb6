//! Header search paths.
//!
//! Resolution is an explicit `Result`: a miss is a value the caller decides
//! what to do with (consult a resolver, raise an error), never a diagnostic
//! raised from inside the search.

use cpx_ir::FileCharacteristic;
use std::path::{Path, PathBuf};

/// A header that search located on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedHeader {
    pub path: PathBuf,
    /// Flavor of the directory the header was found in.
    pub characteristic: FileCharacteristic,
}

/// Header search failed; the include form could not be mapped to a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderNotFound;

/// Ordered user and system search directories.
///
/// Quoted includes try the including file's directory first, then user
/// directories, then system directories; angled includes skip the current
/// directory. New system directories land after the existing system block;
/// user directories are appended to the user block.
#[derive(Default, Debug)]
pub struct HeaderSearch {
    user: Vec<PathBuf>,
    system: Vec<PathBuf>,
}

impl HeaderSearch {
    /// Create an empty search path.
    pub fn new() -> Self {
        HeaderSearch::default()
    }

    /// Append a search directory to the user or system block.
    pub fn add_dir(&mut self, path: &Path, system: bool) {
        if system {
            self.system.push(path.to_path_buf());
        } else {
            self.user.push(path.to_path_buf());
        }
    }

    /// Resolve an include form against the search path.
    pub fn resolve(
        &self,
        name: &str,
        angled: bool,
        current_dir: Option<&Path>,
    ) -> Result<ResolvedHeader, HeaderNotFound> {
        if !angled {
            if let Some(dir) = current_dir {
                let candidate = dir.join(name);
                if candidate.is_file() {
                    return Ok(ResolvedHeader {
                        path: candidate,
                        characteristic: FileCharacteristic::User,
                    });
                }
            }
        }
        for dir in &self.user {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Ok(ResolvedHeader {
                    path: candidate,
                    characteristic: FileCharacteristic::User,
                });
            }
        }
        for dir in &self.system {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Ok(ResolvedHeader {
                    path: candidate,
                    characteristic: FileCharacteristic::System,
                });
            }
        }
        Err(HeaderNotFound)
    }

    /// Flavor of an arbitrary path: `System` when it lies under a system
    /// search directory. Used for resolver-produced paths that bypassed
    /// search.
    pub fn dir_flavor(&self, path: &Path) -> FileCharacteristic {
        if self.system.iter().any(|dir| path.starts_with(dir)) {
            FileCharacteristic::System
        } else {
            FileCharacteristic::User
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_file(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let Ok(()) = fs::write(&path, "x\n") else {
            panic!("failed to write test file");
        };
        path
    }

    #[test]
    fn test_quoted_prefers_current_dir() {
        let Ok(current) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let Ok(search) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let in_current = write_file(current.path(), "a.h");
        write_file(search.path(), "a.h");

        let mut headers = HeaderSearch::new();
        headers.add_dir(search.path(), false);

        let Ok(resolved) = headers.resolve("a.h", false, Some(current.path())) else {
            panic!("should resolve");
        };
        assert_eq!(resolved.path, in_current);
    }

    #[test]
    fn test_angled_skips_current_dir() {
        let Ok(current) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        write_file(current.path(), "a.h");

        let headers = HeaderSearch::new();
        assert_eq!(
            headers.resolve("a.h", true, Some(current.path())),
            Err(HeaderNotFound)
        );
    }

    #[test]
    fn test_system_dir_characteristic() {
        let Ok(sys) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let path = write_file(sys.path(), "sys.h");

        let mut headers = HeaderSearch::new();
        headers.add_dir(sys.path(), true);

        let Ok(resolved) = headers.resolve("sys.h", true, None) else {
            panic!("should resolve");
        };
        assert_eq!(resolved.characteristic, FileCharacteristic::System);
        assert_eq!(headers.dir_flavor(&path), FileCharacteristic::System);
    }

    #[test]
    fn test_user_dirs_searched_before_system() {
        let Ok(user) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let Ok(sys) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let in_user = write_file(user.path(), "b.h");
        write_file(sys.path(), "b.h");

        let mut headers = HeaderSearch::new();
        headers.add_dir(sys.path(), true);
        headers.add_dir(user.path(), false);

        let Ok(resolved) = headers.resolve("b.h", true, None) else {
            panic!("should resolve");
        };
        assert_eq!(resolved.path, in_user);
        assert_eq!(resolved.characteristic, FileCharacteristic::User);
    }
}
