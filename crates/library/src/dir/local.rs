use std::fs::File;
use std::path::{Path, PathBuf};

use common::ROOT_RELPATH;
use tracing::warn;
use walkdir::WalkDir;

use super::{check_relpath, unix_nanos, Entry, MusicDir, OpenedFile, WalkVisitor};
use crate::LibraryError;

/// Music directory on local disk.
#[derive(Clone, Debug)]
pub struct LocalDir {
    root: PathBuf,
}

impl LocalDir {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn relpath_of(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        let parts: Vec<String> = rel
            .components()
            .map(|part| part.as_os_str().to_string_lossy().into_owned())
            .collect();
        if parts.is_empty() {
            ROOT_RELPATH.to_string()
        } else {
            parts.join("/")
        }
    }
}

impl MusicDir for LocalDir {
    fn kind(&self) -> &'static str {
        "local"
    }

    fn walk(&self, visitor: &mut dyn WalkVisitor) -> Result<(), LibraryError> {
        // (depth, relpath) of every directory still waiting for its leave event
        let mut open_dirs: Vec<(usize, String)> = Vec::new();

        for item in WalkDir::new(&self.root)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = match item {
                Ok(entry) => entry,
                Err(err) if err.depth() == 0 => {
                    return Err(LibraryError::Walk(format!(
                        "{}: {}",
                        self.root.display(),
                        err
                    )));
                }
                Err(err) => {
                    warn!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };

            while let Some((depth, _)) = open_dirs.last() {
                if *depth < entry.depth() {
                    break;
                }
                if let Some((_, relpath)) = open_dirs.pop() {
                    visitor.leave(&relpath)?;
                }
            }

            let meta = match entry.metadata() {
                Ok(meta) => meta,
                Err(err) if entry.depth() == 0 => {
                    return Err(LibraryError::Walk(format!(
                        "{}: {}",
                        self.root.display(),
                        err
                    )));
                }
                Err(err) => {
                    warn!(path = %entry.path().display(), error = %err, "skipping entry");
                    continue;
                }
            };

            let is_dir = meta.is_dir();
            let walked = Entry {
                relpath: self.relpath_of(entry.path()),
                size: if is_dir { 0 } else { meta.len() },
                modified: meta.modified().map(unix_nanos).unwrap_or(0),
                is_dir,
            };
            visitor.visit(&walked)?;
            if is_dir {
                open_dirs.push((entry.depth(), walked.relpath));
            }
        }

        while let Some((_, relpath)) = open_dirs.pop() {
            visitor.leave(&relpath)?;
        }
        Ok(())
    }

    fn get_file(&self, relpath: &str) -> Result<OpenedFile, LibraryError> {
        check_relpath(relpath)?;
        let path = self.root.join(relpath);
        let file = File::open(&path)?;
        let modified = file.metadata()?.modified().map(unix_nanos).unwrap_or(0);
        Ok(OpenedFile {
            modified,
            reader: Box::new(file),
        })
    }
}
