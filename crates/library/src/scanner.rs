use std::collections::HashSet;
use std::io::Read;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use common::{
    audio_mime, decoded, file_extension, is_cover_filename, split_relpath, Album, Track,
    UNKNOWN_ARTIST, UNKNOWN_GENRE,
};
use metadata::{TagInfo, TagReader};
use redb::Database;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::coordinator::ScanCoordinator;
use crate::dir::{unix_secs, Entry, MusicDir, WalkVisitor};
use crate::stack::{FolderContext, FolderStack};
use crate::store::{CatalogWriter, META_LAST_SCAN_KEY};
use crate::LibraryError;

/// Counters of one finished scan. Only the completion time is persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub seen_folders: usize,
    pub seen_tracks: usize,
    pub new_or_updated_tracks: usize,
    pub errored_tracks: usize,
    pub deleted_tracks: usize,
    pub deleted_albums: usize,
    pub deleted_artists: usize,
    pub deleted_genres: usize,
    pub finished_at: u64,
    pub elapsed: Duration,
}

#[derive(Clone)]
pub struct Scanner {
    db: Arc<Database>,
    dir: Arc<dyn MusicDir>,
    tags: Arc<dyn TagReader>,
    coordinator: ScanCoordinator,
}

impl Scanner {
    pub fn new(db: Arc<Database>, dir: Arc<dyn MusicDir>, tags: Arc<dyn TagReader>) -> Self {
        Self::with_coordinator(db, dir, tags, ScanCoordinator::new())
    }

    pub fn with_coordinator(
        db: Arc<Database>,
        dir: Arc<dyn MusicDir>,
        tags: Arc<dyn TagReader>,
        coordinator: ScanCoordinator,
    ) -> Self {
        Self {
            db,
            dir,
            tags,
            coordinator,
        }
    }

    pub fn coordinator(&self) -> &ScanCoordinator {
        &self.coordinator
    }

    pub fn dir(&self) -> &Arc<dyn MusicDir> {
        &self.dir
    }

    pub fn is_scanning(&self) -> bool {
        self.coordinator.is_running()
    }

    /// Runs one full scan on the calling thread. Fails at once with
    /// `AlreadyScanning` if another scan holds the coordinator.
    pub fn start(&self) -> Result<ScanSummary, LibraryError> {
        let Some(_guard) = self.coordinator.begin() else {
            return Err(LibraryError::AlreadyScanning);
        };
        let started = Instant::now();
        info!(source = self.dir.kind(), "Scan started");

        let mut run = ScanRun::new(&self.db, self.dir.as_ref(), self.tags.as_ref());
        if let Err(err) = self.dir.walk(&mut run) {
            warn!(error = %err, "Scan aborted");
            return Err(err);
        }
        run.commit_open_folder()?;
        if !run.stack.is_empty() {
            return Err(LibraryError::Walk("walk ended inside a folder".to_string()));
        }

        let mut summary = run.reconcile()?;
        summary.elapsed = started.elapsed();
        info!(
            folders = summary.seen_folders,
            tracks = summary.seen_tracks,
            new_or_updated = summary.new_or_updated_tracks,
            errored = summary.errored_tracks,
            deleted_tracks = summary.deleted_tracks,
            deleted_albums = summary.deleted_albums,
            deleted_artists = summary.deleted_artists,
            deleted_genres = summary.deleted_genres,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Scan finished"
        );
        Ok(summary)
    }
}

/// State private to one running scan.
struct ScanRun<'a> {
    db: &'a Database,
    dir: &'a dyn MusicDir,
    tags: &'a dyn TagReader,
    stack: FolderStack,
    /// Track writes of the folder on top of the stack, opened lazily.
    txn: Option<CatalogWriter<'a>>,
    seen_folders: HashSet<u64>,
    seen_tracks: HashSet<u64>,
    new_or_updated: usize,
    errored: usize,
}

impl<'a> ScanRun<'a> {
    fn new(db: &'a Database, dir: &'a dyn MusicDir, tags: &'a dyn TagReader) -> Self {
        Self {
            db,
            dir,
            tags,
            stack: FolderStack::new(),
            txn: None,
            seen_folders: HashSet::new(),
            seen_tracks: HashSet::new(),
            new_or_updated: 0,
            errored: 0,
        }
    }

    fn commit_open_folder(&mut self) -> Result<(), LibraryError> {
        if let Some(writer) = self.txn.take() {
            writer.commit()?;
        }
        Ok(())
    }

    fn enter_folder(&mut self, entry: &Entry) -> Result<(), LibraryError> {
        // track transactions never span directory levels
        self.commit_open_folder()?;

        let writer = CatalogWriter::begin(self.db)?;
        let existing = writer.album_by_path(&entry.relpath)?;
        if let Some(album) = &existing {
            if album.modified_at >= entry.modified {
                writer.abort()?;
                debug!(path = %entry.relpath, "folder unchanged");
                self.seen_folders.insert(album.id);
                self.stack.push(FolderContext::unchanged(album.clone()));
                return Ok(());
            }
        }

        let mut album = match existing {
            Some(album) => album,
            None => Album::new(writer.new_album_id()?, &entry.relpath),
        };
        let (left, right) = split_relpath(&entry.relpath);
        album.left_path = left.to_string();
        album.right_path = right.to_string();
        album.right_path_udec = decoded(right);
        album.modified_at = entry.modified;
        writer.save_album(&album)?;
        writer.commit()?;

        self.seen_folders.insert(album.id);
        self.stack.push(FolderContext::written(album));
        Ok(())
    }

    fn leave_folder(&mut self, relpath: &str) -> Result<(), LibraryError> {
        self.commit_open_folder()?;

        let parent_id = self.stack.peek_parent_id();
        let Some(mut folder) = self.stack.pop() else {
            return Err(LibraryError::Walk(format!("unbalanced leave for {}", relpath)));
        };
        if !folder.path_written {
            return Ok(());
        }

        folder.album.parent_id = parent_id;
        folder.album.cover = folder.cover.take();
        let writer = CatalogWriter::begin(self.db)?;
        writer.save_album(&folder.album)?;
        writer.commit()?;
        info!(path = relpath, "processed folder");
        Ok(())
    }

    fn handle_file(&mut self, entry: &Entry) -> Result<(), LibraryError> {
        let (_, filename) = split_relpath(&entry.relpath);
        if is_cover_filename(filename) {
            if let Some(folder) = self.stack.peek_mut() {
                folder.cover = Some(filename.to_string());
            }
            return Ok(());
        }
        let Some(ext) = file_extension(filename) else {
            debug!(path = %entry.relpath, "skipping file without extension");
            return Ok(());
        };
        if audio_mime(ext).is_none() {
            debug!(path = %entry.relpath, ext, "skipping unsupported file");
            return Ok(());
        }

        let Some(album_id) = self.stack.peek_id() else {
            return Err(LibraryError::Walk(format!(
                "{} visited outside of any folder",
                entry.relpath
            )));
        };
        let writer = match self.txn.take() {
            Some(writer) => writer,
            None => CatalogWriter::begin(self.db)?,
        };
        let result = self.handle_track(&writer, entry, album_id, filename);
        self.txn = Some(writer);
        result
    }

    fn handle_track(
        &mut self,
        writer: &CatalogWriter<'_>,
        entry: &Entry,
        album_id: u64,
        filename: &str,
    ) -> Result<(), LibraryError> {
        let existing = writer.track_in_folder(album_id, filename)?;
        if let Some(track) = &existing {
            if track.modified_at >= entry.modified {
                debug!(path = %entry.relpath, "track unchanged");
                self.seen_tracks.insert(track.id);
                return Ok(());
            }
        }

        let (info, size) = match self.read_tags(&entry.relpath) {
            Ok(read) => read,
            Err(err) => {
                warn!(path = %entry.relpath, error = %err, "failed to read track");
                self.errored += 1;
                // keep a previously good row until the file reads again
                if let Some(track) = &existing {
                    self.seen_tracks.insert(track.id);
                }
                return Ok(());
            }
        };

        let artist_name = info
            .album_artist
            .as_deref()
            .or(info.artist.as_deref())
            .unwrap_or(UNKNOWN_ARTIST);
        let artist = writer.find_or_create_artist(artist_name)?;
        let genre = writer.find_or_create_genre(info.genre.as_deref().unwrap_or(UNKNOWN_GENRE))?;

        let id = match &existing {
            Some(track) => track.id,
            None => writer.new_track_id()?,
        };
        let title = info.title.clone().unwrap_or_default();
        let track = Track {
            id,
            album_id,
            filename: filename.to_string(),
            filename_udec: decoded(filename),
            size,
            modified_at: entry.modified,
            artist_id: artist.id,
            genre_id: genre.id,
            tag_title_udec: decoded(&title),
            tag_title: title,
            tag_track_artist: info.artist.clone().unwrap_or_default(),
            tag_track_number: info.track_no,
            tag_disc_number: info.disc_no,
            tag_brainz_id: info.brainz_id.clone().unwrap_or_default(),
            duration_ms: info.duration_ms.unwrap_or(0),
            bitrate: info.bitrate,
        };
        writer.save_track(&track)?;
        self.seen_tracks.insert(id);
        self.new_or_updated += 1;

        if let Some(folder) = self.stack.peek_mut() {
            if !folder.tags_written {
                let album = &mut folder.album;
                album.tag_title = info.album.clone().unwrap_or_default();
                album.tag_title_udec = decoded(&album.tag_title);
                album.tag_brainz_id = info.album_brainz_id.clone().unwrap_or_default();
                album.tag_year = info.year;
                album.tag_artist_id = Some(artist.id);
                album.tag_genre_id = Some(genre.id);
                folder.tags_written = true;
            }
        }
        Ok(())
    }

    fn read_tags(&self, relpath: &str) -> Result<(TagInfo, u64), LibraryError> {
        let mut opened = self.dir.get_file(relpath)?;
        let mut data = Vec::new();
        opened.reader.read_to_end(&mut data)?;
        let info = self.tags.read(relpath, &data)?;
        Ok((info, data.len() as u64))
    }

    /// Post-walk sweep against the seen sets, in one transaction.
    fn reconcile(self) -> Result<ScanSummary, LibraryError> {
        let writer = CatalogWriter::begin(self.db)?;
        let deleted_tracks = writer.delete_tracks_except(&self.seen_tracks)?;
        let mut deleted_albums = writer.delete_albums_except(&self.seen_folders)?;
        deleted_albums += writer.delete_empty_tagged_albums()?;
        let deleted_artists = writer.delete_artists_without_albums()?;
        let deleted_genres = writer.delete_unused_genres()?;
        let finished_at = unix_secs(SystemTime::now());
        writer.set_meta(META_LAST_SCAN_KEY, &finished_at)?;
        writer.commit()?;

        Ok(ScanSummary {
            seen_folders: self.seen_folders.len(),
            seen_tracks: self.seen_tracks.len(),
            new_or_updated_tracks: self.new_or_updated,
            errored_tracks: self.errored,
            deleted_tracks,
            deleted_albums,
            deleted_artists,
            deleted_genres,
            finished_at,
            elapsed: Duration::ZERO,
        })
    }
}

impl WalkVisitor for ScanRun<'_> {
    fn visit(&mut self, entry: &Entry) -> Result<(), LibraryError> {
        if entry.is_dir {
            self.enter_folder(entry)
        } else {
            self.handle_file(entry)
        }
    }

    fn leave(&mut self, relpath: &str) -> Result<(), LibraryError> {
        self.leave_folder(relpath)
    }
}
