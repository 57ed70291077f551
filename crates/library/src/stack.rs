use common::Album;

/// State of one directory on the path from the walk root to the current
/// entry.
#[derive(Clone, Debug)]
pub(crate) struct FolderContext {
    pub(crate) album: Album,
    /// Path fields were (re)written this run; the folder gets finalized on
    /// leave.
    pub(crate) path_written: bool,
    pub(crate) tags_written: bool,
    /// Last recognized cover image seen directly inside this folder.
    pub(crate) cover: Option<String>,
}

impl FolderContext {
    pub(crate) fn unchanged(album: Album) -> Self {
        Self {
            album,
            path_written: false,
            tags_written: false,
            cover: None,
        }
    }

    pub(crate) fn written(album: Album) -> Self {
        Self {
            path_written: true,
            ..Self::unchanged(album)
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct FolderStack {
    frames: Vec<FolderContext>,
}

impl FolderStack {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, folder: FolderContext) {
        self.frames.push(folder);
    }

    pub(crate) fn pop(&mut self) -> Option<FolderContext> {
        self.frames.pop()
    }

    pub(crate) fn peek(&self) -> Option<&FolderContext> {
        self.frames.last()
    }

    pub(crate) fn peek_mut(&mut self) -> Option<&mut FolderContext> {
        self.frames.last_mut()
    }

    pub(crate) fn peek_id(&self) -> Option<u64> {
        self.peek().map(|folder| folder.album.id)
    }

    /// Identity of the folder one level above the current one.
    pub(crate) fn peek_parent_id(&self) -> Option<u64> {
        let len = self.frames.len();
        if len < 2 {
            return None;
        }
        Some(self.frames[len - 2].album.id)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
