use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use common::{
    join_relpath, name_matches, search_needle, Album, Artist, Genre, Track, ROOT_RELPATH,
};
use metadata::{MetadataError, TagReader};
use redb::{
    CommitError, Database, DatabaseError, ReadableTable, StorageError, TableError,
    TransactionError,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

mod coordinator;
pub mod dir;
mod scanner;
mod stack;
mod store;

pub use coordinator::{ScanCoordinator, ScanGuard};
pub use dir::{Entry, LocalDir, MusicDir, OpenedFile, S3Dir, WalkVisitor};
pub use scanner::{ScanSummary, Scanner};

use store::{
    decode_all, decode_value, folder_track_ids, get_row, init_tables, open_or_create_db,
    ALBUMS_TABLE, ARTISTS_TABLE, GENRES_BY_NAME_TABLE, GENRES_TABLE, META_LAST_SCAN_KEY,
    META_TABLE, TRACKS_BY_FOLDER_TABLE, TRACKS_TABLE,
};

/// Read side of the catalog. Writes only happen through a `Scanner`.
#[derive(Clone)]
pub struct Library {
    db: Arc<Database>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryStats {
    pub genres: usize,
    pub artists: usize,
    pub albums: usize,
    pub tracks: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistSummary {
    pub artist: Artist,
    pub album_count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenreSummary {
    pub genre: Genre,
    pub album_count: usize,
    pub track_count: usize,
}

/// Offset and limit applied after filtering and ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Page {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    pub fn apply<T>(self, items: Vec<T>) -> Vec<T> {
        items.into_iter().skip(self.offset).take(self.limit).collect()
    }
}

/// Orderings of the tag-bearing album list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AlbumOrder {
    /// Most recently added first.
    Newest,
    ByName,
    ByArtist,
    /// Inclusive year range; descending when `from > to`.
    ByYear { from: i32, to: i32 },
    ByGenre(String),
}

/// Restricts track listings by genre name and by the year of the folder.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackFilter {
    pub genre: Option<String>,
    pub from_year: Option<i32>,
    pub to_year: Option<i32>,
}

impl Library {
    pub fn open(path: &Path) -> Result<Self, LibraryError> {
        let db = open_or_create_db(path)?;
        if init_tables(&db)? {
            warn!("Catalog format changed; catalog cleared, next scan rebuilds it");
        }
        info!("Opened catalog at {:?}", path);
        Ok(Self { db: Arc::new(db) })
    }

    pub fn db(&self) -> Arc<Database> {
        Arc::clone(&self.db)
    }

    pub fn scanner(&self, dir: Arc<dyn MusicDir>, tags: Arc<dyn TagReader>) -> Scanner {
        Scanner::new(self.db(), dir, tags)
    }

    pub fn stats(&self) -> Result<LibraryStats, LibraryError> {
        let read_txn = self.db.begin_read()?;
        let stats = LibraryStats {
            genres: read_txn.open_table(GENRES_TABLE)?.len()? as usize,
            artists: read_txn.open_table(ARTISTS_TABLE)?.len()? as usize,
            albums: read_txn.open_table(ALBUMS_TABLE)?.len()? as usize,
            tracks: read_txn.open_table(TRACKS_TABLE)?.len()? as usize,
        };
        Ok(stats)
    }

    /// Unix seconds of the last scan that reached its cleanup pass.
    pub fn last_scan_time(&self) -> Result<Option<u64>, LibraryError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(META_TABLE)?;
        let value = table.get(META_LAST_SCAN_KEY)?;
        match value {
            Some(bytes) => Ok(Some(decode_value(bytes.value())?)),
            None => Ok(None),
        }
    }

    pub fn genre(&self, id: u64) -> Result<Option<Genre>, LibraryError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(GENRES_TABLE)?;
        get_row(&table, id)
    }

    pub fn genres(&self) -> Result<Vec<GenreSummary>, LibraryError> {
        let read_txn = self.db.begin_read()?;
        let genres: Vec<Genre> = decode_all(&read_txn.open_table(GENRES_TABLE)?)?;
        let albums: Vec<Album> = decode_all(&read_txn.open_table(ALBUMS_TABLE)?)?;
        let tracks: Vec<Track> = decode_all(&read_txn.open_table(TRACKS_TABLE)?)?;

        let mut album_counts: HashMap<u64, usize> = HashMap::new();
        for genre_id in albums.iter().filter_map(|album| album.tag_genre_id) {
            *album_counts.entry(genre_id).or_default() += 1;
        }
        let mut track_counts: HashMap<u64, usize> = HashMap::new();
        for track in &tracks {
            *track_counts.entry(track.genre_id).or_default() += 1;
        }

        let mut out: Vec<GenreSummary> = genres
            .into_iter()
            .map(|genre| GenreSummary {
                album_count: album_counts.get(&genre.id).copied().unwrap_or(0),
                track_count: track_counts.get(&genre.id).copied().unwrap_or(0),
                genre,
            })
            .collect();
        out.sort_by_key(|summary| summary.genre.name.to_lowercase());
        Ok(out)
    }

    pub fn artist(&self, id: u64) -> Result<Option<Artist>, LibraryError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ARTISTS_TABLE)?;
        get_row(&table, id)
    }

    /// Every artist with the number of folders tagged with it, by name.
    pub fn artists(&self) -> Result<Vec<ArtistSummary>, LibraryError> {
        let read_txn = self.db.begin_read()?;
        let artists: Vec<Artist> = decode_all(&read_txn.open_table(ARTISTS_TABLE)?)?;
        let albums: Vec<Album> = decode_all(&read_txn.open_table(ALBUMS_TABLE)?)?;

        let mut counts: HashMap<u64, usize> = HashMap::new();
        for artist_id in albums.iter().filter_map(|album| album.tag_artist_id) {
            *counts.entry(artist_id).or_default() += 1;
        }
        let mut out: Vec<ArtistSummary> = artists
            .into_iter()
            .map(|artist| ArtistSummary {
                album_count: counts.get(&artist.id).copied().unwrap_or(0),
                artist,
            })
            .collect();
        out.sort_by_key(|summary| summary.artist.sort_name().to_lowercase());
        Ok(out)
    }

    pub fn artist_albums(&self, artist_id: u64) -> Result<Vec<Album>, LibraryError> {
        let mut albums: Vec<Album> = self
            .albums()?
            .into_iter()
            .filter(|album| album.tag_artist_id == Some(artist_id))
            .collect();
        albums.sort_by(|a, b| {
            a.tag_year
                .cmp(&b.tag_year)
                .then_with(|| a.tag_title.to_lowercase().cmp(&b.tag_title.to_lowercase()))
        });
        Ok(albums)
    }

    /// Every folder row, tag-bearing or not, in id order.
    pub fn albums(&self) -> Result<Vec<Album>, LibraryError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ALBUMS_TABLE)?;
        decode_all(&table)
    }

    pub fn album(&self, id: u64) -> Result<Option<Album>, LibraryError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ALBUMS_TABLE)?;
        get_row(&table, id)
    }

    pub fn root_folder(&self) -> Result<Option<Album>, LibraryError> {
        Ok(self.albums()?.into_iter().find(|album| {
            album.left_path.is_empty() && album.right_path == ROOT_RELPATH
        }))
    }

    pub fn child_folders(&self, parent_id: u64) -> Result<Vec<Album>, LibraryError> {
        let mut children: Vec<Album> = self
            .albums()?
            .into_iter()
            .filter(|album| album.parent_id == Some(parent_id))
            .collect();
        children.sort_by_key(|album| album.folder_sort_name().to_lowercase());
        Ok(children)
    }

    pub fn search_artists(&self, query: &str, page: Page) -> Result<Vec<Artist>, LibraryError> {
        let needle = search_needle(query);
        let mut found: Vec<Artist> = {
            let read_txn = self.db.begin_read()?;
            let table = read_txn.open_table(ARTISTS_TABLE)?;
            decode_all(&table)?
        };
        found.retain(|artist| name_matches(&needle, &artist.name, &artist.name_udec));
        found.sort_by_key(|artist| artist.sort_name().to_lowercase());
        Ok(page.apply(found))
    }

    /// Folders other than the root whose directory name matches.
    pub fn search_folders(&self, query: &str, page: Page) -> Result<Vec<Album>, LibraryError> {
        let needle = search_needle(query);
        let mut found = self.albums()?;
        found.retain(|album| {
            !album.is_root() && name_matches(&needle, &album.right_path, &album.right_path_udec)
        });
        found.sort_by_key(|album| album.folder_sort_name().to_lowercase());
        Ok(page.apply(found))
    }

    /// Tag-bearing folders whose album title matches.
    pub fn search_albums(&self, query: &str, page: Page) -> Result<Vec<Album>, LibraryError> {
        let needle = search_needle(query);
        let mut found = self.albums()?;
        found.retain(|album| {
            album.has_tags() && name_matches(&needle, &album.tag_title, &album.tag_title_udec)
        });
        found.sort_by_key(|album| album.title_sort_name().to_lowercase());
        Ok(page.apply(found))
    }

    /// Tracks whose title or filename matches, in id order.
    pub fn search_tracks(&self, query: &str, page: Page) -> Result<Vec<Track>, LibraryError> {
        let needle = search_needle(query);
        let mut found: Vec<Track> = {
            let read_txn = self.db.begin_read()?;
            let table = read_txn.open_table(TRACKS_TABLE)?;
            decode_all(&table)?
        };
        found.retain(|track| {
            name_matches(&needle, &track.tag_title, &track.tag_title_udec)
                || name_matches(&needle, &track.filename, &track.filename_udec)
        });
        Ok(page.apply(found))
    }

    pub fn album_list(&self, order: &AlbumOrder, page: Page) -> Result<Vec<Album>, LibraryError> {
        let mut albums: Vec<Album> = self
            .albums()?
            .into_iter()
            .filter(|album| album.has_tags())
            .collect();
        let by_title = |a: &Album, b: &Album| {
            a.title_sort_name()
                .to_lowercase()
                .cmp(&b.title_sort_name().to_lowercase())
        };

        match order {
            AlbumOrder::Newest => albums.sort_by(|a, b| b.id.cmp(&a.id)),
            AlbumOrder::ByName => albums.sort_by(by_title),
            AlbumOrder::ByArtist => {
                let names: HashMap<u64, String> = self
                    .artists()?
                    .into_iter()
                    .map(|summary| {
                        let key = summary.artist.sort_name().to_lowercase();
                        (summary.artist.id, key)
                    })
                    .collect();
                let artist_key = |album: &Album| {
                    album
                        .tag_artist_id
                        .and_then(|id| names.get(&id).cloned())
                        .unwrap_or_default()
                };
                albums.sort_by(|a, b| {
                    artist_key(a)
                        .cmp(&artist_key(b))
                        .then_with(|| by_title(a, b))
                });
            }
            AlbumOrder::ByYear { from, to } => {
                let (low, high) = if from <= to { (*from, *to) } else { (*to, *from) };
                albums.retain(|album| {
                    matches!(album.tag_year, Some(year) if year >= low && year <= high)
                });
                albums.sort_by(|a, b| {
                    a.tag_year
                        .cmp(&b.tag_year)
                        .then_with(|| by_title(a, b))
                });
                if from > to {
                    albums.reverse();
                }
            }
            AlbumOrder::ByGenre(name) => {
                let genre_id = self.genre_id_by_name(name)?;
                albums.retain(|album| genre_id.is_some() && album.tag_genre_id == genre_id);
                albums.sort_by(by_title);
            }
        }
        Ok(page.apply(albums))
    }

    /// Tracks passing `filter`, in id order. An unknown genre matches nothing.
    pub fn filter_tracks(&self, filter: &TrackFilter) -> Result<Vec<Track>, LibraryError> {
        let genre_id = match filter.genre.as_deref() {
            Some(name) => match self.genre_id_by_name(name)? {
                Some(id) => Some(id),
                None => return Ok(Vec::new()),
            },
            None => None,
        };
        let years: HashMap<u64, Option<i32>> = self
            .albums()?
            .into_iter()
            .map(|album| (album.id, album.tag_year))
            .collect();
        let in_years = |track: &Track| {
            if filter.from_year.is_none() && filter.to_year.is_none() {
                return true;
            }
            let Some(year) = years.get(&track.album_id).copied().flatten() else {
                return false;
            };
            filter.from_year.map_or(true, |from| year >= from)
                && filter.to_year.map_or(true, |to| year <= to)
        };

        let mut tracks: Vec<Track> = {
            let read_txn = self.db.begin_read()?;
            let table = read_txn.open_table(TRACKS_TABLE)?;
            decode_all(&table)?
        };
        tracks.retain(|track| {
            genre_id.map_or(true, |id| track.genre_id == id) && in_years(track)
        });
        Ok(tracks)
    }

    pub fn genre_tracks(&self, genre: &str, page: Page) -> Result<Vec<Track>, LibraryError> {
        let filter = TrackFilter {
            genre: Some(genre.to_string()),
            ..TrackFilter::default()
        };
        Ok(page.apply(self.filter_tracks(&filter)?))
    }

    fn genre_id_by_name(&self, name: &str) -> Result<Option<u64>, LibraryError> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(GENRES_BY_NAME_TABLE)?;
        let id = index.get(name)?.map(|value| value.value());
        Ok(id)
    }

    /// Tracks of one folder ordered by disc, track number, then filename.
    pub fn album_tracks(&self, album_id: u64) -> Result<Vec<Track>, LibraryError> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(TRACKS_BY_FOLDER_TABLE)?;
        let table = read_txn.open_table(TRACKS_TABLE)?;
        let mut tracks = Vec::new();
        for id in folder_track_ids(&index, album_id)? {
            if let Some(track) = get_row::<Track, _>(&table, id)? {
                tracks.push(track);
            }
        }
        tracks.sort_by(|a, b| {
            a.tag_disc_number
                .cmp(&b.tag_disc_number)
                .then_with(|| a.tag_track_number.cmp(&b.tag_track_number))
                .then_with(|| a.filename.cmp(&b.filename))
        });
        Ok(tracks)
    }

    pub fn track(&self, id: u64) -> Result<Option<Track>, LibraryError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TRACKS_TABLE)?;
        get_row(&table, id)
    }

    /// Path of a track relative to the music root.
    pub fn track_relpath(&self, track: &Track) -> Result<Option<String>, LibraryError> {
        Ok(self
            .album(track.album_id)?
            .map(|album| join_relpath(&album.relpath(), &track.filename)))
    }
}

#[derive(Debug)]
pub enum LibraryError {
    Io(std::io::Error),
    Metadata(MetadataError),
    Redb(redb::Error),
    Bincode(Box<bincode::ErrorKind>),
    AlreadyScanning,
    Walk(String),
    Source(String),
    InvalidPath(String),
}

impl std::fmt::Display for LibraryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LibraryError::Io(err) => write!(f, "io error: {}", err),
            LibraryError::Metadata(err) => write!(f, "metadata error: {}", err),
            LibraryError::Redb(err) => write!(f, "db error: {}", err),
            LibraryError::Bincode(err) => write!(f, "bincode error: {}", err),
            LibraryError::AlreadyScanning => write!(f, "scan already in progress"),
            LibraryError::Walk(message) => write!(f, "walk failed: {}", message),
            LibraryError::Source(message) => write!(f, "music source error: {}", message),
            LibraryError::InvalidPath(path) => write!(f, "invalid path: {}", path),
        }
    }
}

impl std::error::Error for LibraryError {}

impl From<std::io::Error> for LibraryError {
    fn from(err: std::io::Error) -> Self {
        LibraryError::Io(err)
    }
}

impl From<MetadataError> for LibraryError {
    fn from(err: MetadataError) -> Self {
        LibraryError::Metadata(err)
    }
}

impl From<redb::Error> for LibraryError {
    fn from(err: redb::Error) -> Self {
        LibraryError::Redb(err)
    }
}

impl From<DatabaseError> for LibraryError {
    fn from(err: DatabaseError) -> Self {
        LibraryError::Redb(err.into())
    }
}

impl From<TableError> for LibraryError {
    fn from(err: TableError) -> Self {
        LibraryError::Redb(err.into())
    }
}

impl From<TransactionError> for LibraryError {
    fn from(err: TransactionError) -> Self {
        LibraryError::Redb(err.into())
    }
}

impl From<StorageError> for LibraryError {
    fn from(err: StorageError) -> Self {
        LibraryError::Redb(err.into())
    }
}

impl From<CommitError> for LibraryError {
    fn from(err: CommitError) -> Self {
        LibraryError::Redb(err.into())
    }
}

impl From<Box<bincode::ErrorKind>> for LibraryError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        LibraryError::Bincode(err)
    }
}

impl From<reqwest::Error> for LibraryError {
    fn from(err: reqwest::Error) -> Self {
        LibraryError::Source(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use common::decoded;

    use super::*;
    use crate::store::CatalogWriter;

    struct Seeded {
        _temp: tempfile::TempDir,
        library: Library,
    }

    fn add_folder(
        writer: &CatalogWriter<'_>,
        relpath: &str,
        tags: Option<(&str, i32, &Artist, &Genre)>,
    ) -> Album {
        let mut album = Album::new(writer.new_album_id().unwrap(), relpath);
        album.right_path_udec = decoded(&album.right_path);
        if let Some((title, year, artist, genre)) = tags {
            album.tag_title = title.to_string();
            album.tag_title_udec = decoded(title);
            album.tag_year = Some(year);
            album.tag_artist_id = Some(artist.id);
            album.tag_genre_id = Some(genre.id);
        }
        writer.save_album(&album).unwrap();
        album
    }

    fn add_track(writer: &CatalogWriter<'_>, album: &Album, filename: &str, title: &str) {
        let track = Track {
            id: writer.new_track_id().unwrap(),
            album_id: album.id,
            filename: filename.to_string(),
            filename_udec: decoded(filename),
            artist_id: album.tag_artist_id.unwrap_or(0),
            genre_id: album.tag_genre_id.unwrap_or(0),
            tag_title: title.to_string(),
            tag_title_udec: decoded(title),
            ..Track::default()
        };
        writer.save_track(&track).unwrap();
    }

    fn seeded() -> Seeded {
        let temp = tempfile::tempdir().unwrap();
        let library = Library::open(&temp.path().join("catalog.redb")).unwrap();
        let writer = CatalogWriter::begin(&library.db).unwrap();
        let rock = writer.find_or_create_genre("Rock").unwrap();
        let jazz = writer.find_or_create_genre("Jazz").unwrap();
        let bjork = writer.find_or_create_artist("Björk").unwrap();
        let nena = writer.find_or_create_artist("Nena").unwrap();
        writer.find_or_create_artist("Ørsted").unwrap();
        let pink = writer.find_or_create_artist("Pink").unwrap();

        add_folder(&writer, ROOT_RELPATH, None);
        add_folder(&writer, "Ørsted", None);
        let homogenic = add_folder(
            &writer,
            "Björk/Homogenic",
            Some(("Homogénic", 1997, &bjork, &rock)),
        );
        let nineties = add_folder(&writer, "Nena/99", Some(("99 Luftballons", 1983, &nena, &rock)));
        let live = add_folder(&writer, "Pink/Live", Some(("Live", 2001, &pink, &jazz)));
        add_track(&writer, &homogenic, "01 Jóga.mp3", "Jóga");
        add_track(&writer, &nineties, "01.mp3", "Luftballons");
        add_track(&writer, &live, "01.flac", "Intro");
        writer.commit().unwrap();
        Seeded {
            _temp: temp,
            library,
        }
    }

    fn titles(albums: &[Album]) -> Vec<&str> {
        albums.iter().map(|album| album.tag_title.as_str()).collect()
    }

    #[test]
    fn artists_sort_on_their_decoded_names() {
        let seeded = seeded();
        let names: Vec<String> = seeded
            .library
            .artists()
            .unwrap()
            .into_iter()
            .map(|summary| summary.artist.name)
            .collect();
        assert_eq!(names, vec!["Björk", "Nena", "Ørsted", "Pink"]);
    }

    #[test]
    fn search_matches_plain_and_decoded_forms() {
        let library = seeded().library;
        let all = Page::new(0, usize::MAX);

        let plain = library.search_artists("bjork", all).unwrap();
        let accented = library.search_artists("BJÖRK", all).unwrap();
        assert_eq!(plain.len(), 1);
        assert_eq!(plain, accented);
        assert_eq!(titles(&library.search_albums("homogenic", all).unwrap()), vec!["Homogénic"]);

        let folders = library.search_folders("orsted", all).unwrap();
        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0].right_path, "Ørsted");
        // the root folder is never a search hit
        assert_eq!(library.search_folders("", all).unwrap().len(), 4);

        let songs = library.search_tracks("joga", all).unwrap();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].tag_title, "Jóga");
        assert_eq!(library.search_tracks("01", all).unwrap().len(), 3);
        let second = library.search_tracks("\"01*\"", Page::new(1, 1)).unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].filename, "01.mp3");
    }

    #[test]
    fn album_lists_order_and_filter_tagged_folders() {
        let library = seeded().library;
        let all = Page::new(0, usize::MAX);

        let by_name = library.album_list(&AlbumOrder::ByName, all).unwrap();
        assert_eq!(titles(&by_name), vec!["99 Luftballons", "Homogénic", "Live"]);
        let newest = library.album_list(&AlbumOrder::Newest, all).unwrap();
        assert_eq!(titles(&newest), vec!["Live", "99 Luftballons", "Homogénic"]);
        let by_artist = library.album_list(&AlbumOrder::ByArtist, all).unwrap();
        assert_eq!(titles(&by_artist), vec!["Homogénic", "99 Luftballons", "Live"]);

        let descending = AlbumOrder::ByYear { from: 2001, to: 1980 };
        assert_eq!(
            titles(&library.album_list(&descending, all).unwrap()),
            vec!["Live", "Homogénic", "99 Luftballons"]
        );
        let nineties = AlbumOrder::ByYear { from: 1990, to: 2000 };
        assert_eq!(titles(&library.album_list(&nineties, all).unwrap()), vec!["Homogénic"]);

        let rock = AlbumOrder::ByGenre("Rock".to_string());
        assert_eq!(
            titles(&library.album_list(&rock, all).unwrap()),
            vec!["99 Luftballons", "Homogénic"]
        );
        let polka = AlbumOrder::ByGenre("Polka".to_string());
        assert!(library.album_list(&polka, all).unwrap().is_empty());
        assert_eq!(
            titles(&library.album_list(&AlbumOrder::ByName, Page::new(1, 1)).unwrap()),
            vec!["Homogénic"]
        );
    }

    #[test]
    fn tracks_filter_by_genre_and_folder_year() {
        let library = seeded().library;
        let filter = |genre: Option<&str>, from_year, to_year| TrackFilter {
            genre: genre.map(str::to_string),
            from_year,
            to_year,
        };

        assert_eq!(library.filter_tracks(&TrackFilter::default()).unwrap().len(), 3);
        assert_eq!(library.filter_tracks(&filter(Some("Jazz"), None, None)).unwrap().len(), 1);
        assert_eq!(library.filter_tracks(&filter(None, Some(1990), None)).unwrap().len(), 2);
        let early_rock = library
            .filter_tracks(&filter(Some("Rock"), None, Some(1990)))
            .unwrap();
        assert_eq!(early_rock.len(), 1);
        assert_eq!(early_rock[0].tag_title, "Luftballons");
        assert!(library.filter_tracks(&filter(Some("Polka"), None, None)).unwrap().is_empty());

        assert_eq!(library.genre_tracks("Rock", Page::new(0, 10)).unwrap().len(), 2);
        assert_eq!(library.genre_tracks("Rock", Page::new(1, 10)).unwrap().len(), 1);
    }

    #[test]
    fn fresh_catalog_is_empty() {
        let temp = tempfile::tempdir().unwrap();
        let library = Library::open(&temp.path().join("nested").join("catalog.redb")).unwrap();
        assert_eq!(library.stats().unwrap(), LibraryStats::default());
        assert_eq!(library.last_scan_time().unwrap(), None);
        assert!(library.root_folder().unwrap().is_none());
        assert!(library.artists().unwrap().is_empty());
        assert!(library.album(1).unwrap().is_none());
    }

    #[test]
    fn reopening_keeps_the_catalog() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("catalog.redb");
        {
            let library = Library::open(&path).unwrap();
            let writer = store::CatalogWriter::begin(&library.db).unwrap();
            writer.find_or_create_genre("Rock").unwrap();
            writer.commit().unwrap();
        }
        let library = Library::open(&path).unwrap();
        assert_eq!(library.genres().unwrap()[0].genre.name, "Rock");
    }
}
