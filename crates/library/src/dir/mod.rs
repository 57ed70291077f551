use std::io::{Read, Seek};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::LibraryError;

mod local;
#[cfg(test)]
pub(crate) mod memory;
mod s3;

pub use local::LocalDir;
pub use s3::S3Dir;

/// One walked entry. `modified` is nanoseconds since the unix epoch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub relpath: String,
    pub size: u64,
    pub modified: u64,
    pub is_dir: bool,
}

pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

pub struct OpenedFile {
    pub modified: u64,
    pub reader: Box<dyn ReadSeek>,
}

/// Receives a depth-first walk. `visit` fires before a directory's
/// children, `leave` once after all of them. An error from either aborts
/// the walk and is returned from `MusicDir::walk`.
pub trait WalkVisitor {
    fn visit(&mut self, entry: &Entry) -> Result<(), LibraryError>;
    fn leave(&mut self, relpath: &str) -> Result<(), LibraryError>;
}

pub trait MusicDir: Send + Sync {
    fn kind(&self) -> &'static str;
    fn walk(&self, visitor: &mut dyn WalkVisitor) -> Result<(), LibraryError>;
    fn get_file(&self, relpath: &str) -> Result<OpenedFile, LibraryError>;
}

pub(crate) fn unix_secs(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}

/// Modification times keep their sub-second part so a rewrite within the
/// same second still compares newer.
pub(crate) fn unix_nanos(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|duration| u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Rejects paths that would escape the music root.
pub(crate) fn check_relpath(relpath: &str) -> Result<(), LibraryError> {
    let escapes = relpath.starts_with('/')
        || relpath.contains('\\')
        || relpath.split('/').any(|part| part == "..");
    if relpath.is_empty() || escapes {
        return Err(LibraryError::InvalidPath(relpath.to_string()));
    }
    Ok(())
}
