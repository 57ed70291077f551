use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::io::Cursor;
use parking_lot::Mutex;

use common::ROOT_RELPATH;

use super::{Entry, MusicDir, OpenedFile, WalkVisitor};
use crate::LibraryError;

type WalkHook = Box<dyn Fn() + Send + Sync>;

#[derive(Clone)]
struct MemoryFile {
    data: Vec<u8>,
    modified: u64,
}

#[derive(Default)]
struct Tree {
    files: BTreeMap<String, MemoryFile>,
    dir_times: HashMap<String, u64>,
    unreadable: HashSet<String>,
    fail_walk: bool,
}

/// In-memory music directory for scanner tests. Directories are implied by
/// file paths and default to a modification time of 1.
#[derive(Default)]
pub(crate) struct MemoryDir {
    tree: Mutex<Tree>,
    walk_hook: Mutex<Option<WalkHook>>,
}

impl MemoryDir {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_file(&self, relpath: &str, data: &str, modified: u64) {
        self.tree.lock().files.insert(
            relpath.to_string(),
            MemoryFile {
                data: data.as_bytes().to_vec(),
                modified,
            },
        );
    }

    pub(crate) fn remove_file(&self, relpath: &str) {
        self.tree.lock().files.remove(relpath);
    }

    pub(crate) fn set_dir_time(&self, relpath: &str, modified: u64) {
        self.tree.lock().dir_times.insert(relpath.to_string(), modified);
    }

    pub(crate) fn set_unreadable(&self, relpath: &str, unreadable: bool) {
        let mut tree = self.tree.lock();
        if unreadable {
            tree.unreadable.insert(relpath.to_string());
        } else {
            tree.unreadable.remove(relpath);
        }
    }

    pub(crate) fn set_fail_walk(&self, fail: bool) {
        self.tree.lock().fail_walk = fail;
    }

    /// Runs once at the start of every walk, before the root is visited.
    pub(crate) fn set_walk_hook(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.walk_hook.lock() = Some(Box::new(hook));
    }

    fn walk_dir(
        &self,
        files: &BTreeMap<String, MemoryFile>,
        dir_times: &HashMap<String, u64>,
        relpath: &str,
        visitor: &mut dyn WalkVisitor,
    ) -> Result<(), LibraryError> {
        visitor.visit(&Entry {
            relpath: relpath.to_string(),
            size: 0,
            modified: dir_times.get(relpath).copied().unwrap_or(1),
            is_dir: true,
        })?;

        let prefix = if relpath == ROOT_RELPATH {
            String::new()
        } else {
            format!("{}/", relpath)
        };
        let mut children: BTreeSet<(String, bool)> = BTreeSet::new();
        for key in files.keys() {
            let Some(rest) = key.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((dir, _)) => children.insert((dir.to_string(), true)),
                None => children.insert((rest.to_string(), false)),
            };
        }

        for (name, is_dir) in children {
            let child = format!("{}{}", prefix, name);
            if is_dir {
                self.walk_dir(files, dir_times, &child, visitor)?;
            } else if let Some(file) = files.get(&child) {
                visitor.visit(&Entry {
                    relpath: child,
                    size: file.data.len() as u64,
                    modified: file.modified,
                    is_dir: false,
                })?;
            }
        }

        visitor.leave(relpath)
    }
}

impl MusicDir for MemoryDir {
    fn kind(&self) -> &'static str {
        "memory"
    }

    fn walk(&self, visitor: &mut dyn WalkVisitor) -> Result<(), LibraryError> {
        if let Some(hook) = self.walk_hook.lock().as_ref() {
            hook();
        }
        let (files, dir_times, fail) = {
            let tree = self.tree.lock();
            (tree.files.clone(), tree.dir_times.clone(), tree.fail_walk)
        };
        if fail {
            return Err(LibraryError::Walk("source unreachable".to_string()));
        }
        self.walk_dir(&files, &dir_times, ROOT_RELPATH, visitor)
    }

    fn get_file(&self, relpath: &str) -> Result<OpenedFile, LibraryError> {
        let tree = self.tree.lock();
        if tree.unreadable.contains(relpath) {
            return Err(LibraryError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                format!("{}: permission denied", relpath),
            )));
        }
        match tree.files.get(relpath) {
            Some(file) => Ok(OpenedFile {
                modified: file.modified,
                reader: Box::new(Cursor::new(file.data.clone())),
            }),
            None => Err(LibraryError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                relpath.to_string(),
            ))),
        }
    }
}
