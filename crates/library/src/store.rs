use std::collections::HashSet;
use std::fs;
use std::path::Path;

use common::{decoded, Album, Artist, Genre, Track};
use redb::{Database, ReadableTable, TableDefinition, TableError, WriteTransaction};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::LibraryError;

pub(crate) const INDEX_VERSION: u32 = 2;
const KEY_SEP: char = '\x1f';

pub(crate) const META_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("meta");
const SEQUENCES_TABLE: TableDefinition<&str, u64> = TableDefinition::new("sequences");
pub(crate) const GENRES_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("genres");
pub(crate) const GENRES_BY_NAME_TABLE: TableDefinition<&str, u64> =
    TableDefinition::new("genres_by_name");
pub(crate) const ARTISTS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("artists");
const ARTISTS_BY_NAME_TABLE: TableDefinition<&str, u64> =
    TableDefinition::new("artists_by_name");
pub(crate) const ALBUMS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("albums");
const ALBUMS_BY_PATH_TABLE: TableDefinition<&str, u64> = TableDefinition::new("albums_by_path");
pub(crate) const TRACKS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("tracks");
pub(crate) const TRACKS_BY_FOLDER_TABLE: TableDefinition<&str, u64> =
    TableDefinition::new("tracks_by_folder");

pub(crate) const META_VERSION_KEY: &str = "version";
pub(crate) const META_LAST_SCAN_KEY: &str = "last_scan_time";

const SEQ_GENRES: &str = "genres";
const SEQ_ARTISTS: &str = "artists";
const SEQ_ALBUMS: &str = "albums";
const SEQ_TRACKS: &str = "tracks";

pub(crate) fn open_or_create_db(path: &Path) -> Result<Database, LibraryError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    if path.exists() {
        Ok(Database::open(path)?)
    } else {
        Ok(Database::create(path)?)
    }
}

/// Creates every catalog table so readers never hit a missing table, and
/// wipes the catalog when it was written by an incompatible version.
pub(crate) fn init_tables(db: &Database) -> Result<bool, LibraryError> {
    let write_txn = db.begin_write()?;
    let stored_version = {
        let table = write_txn.open_table(META_TABLE)?;
        let version: Option<u32> = match table.get(META_VERSION_KEY)? {
            Some(value) => Some(decode_value(value.value())?),
            None => None,
        };
        version
    };

    let reset = matches!(stored_version, Some(version) if version != INDEX_VERSION);
    if reset {
        for table in [GENRES_TABLE, ARTISTS_TABLE, ALBUMS_TABLE, TRACKS_TABLE] {
            clear_table(&write_txn, table)?;
        }
        for table in [
            GENRES_BY_NAME_TABLE,
            ARTISTS_BY_NAME_TABLE,
            ALBUMS_BY_PATH_TABLE,
            TRACKS_BY_FOLDER_TABLE,
        ] {
            clear_index(&write_txn, table)?;
        }
        clear_index(&write_txn, SEQUENCES_TABLE)?;
    }

    {
        write_txn.open_table(SEQUENCES_TABLE)?;
        write_txn.open_table(GENRES_TABLE)?;
        write_txn.open_table(GENRES_BY_NAME_TABLE)?;
        write_txn.open_table(ARTISTS_TABLE)?;
        write_txn.open_table(ARTISTS_BY_NAME_TABLE)?;
        write_txn.open_table(ALBUMS_TABLE)?;
        write_txn.open_table(ALBUMS_BY_PATH_TABLE)?;
        write_txn.open_table(TRACKS_TABLE)?;
        write_txn.open_table(TRACKS_BY_FOLDER_TABLE)?;
        let mut meta = write_txn.open_table(META_TABLE)?;
        if reset {
            meta.remove(META_LAST_SCAN_KEY)?;
        }
        let version_bytes = encode_value(&INDEX_VERSION)?;
        meta.insert(META_VERSION_KEY, version_bytes.as_slice())?;
    }
    write_txn.commit()?;
    Ok(reset)
}

/// One catalog write transaction. Dropping it without `commit` discards
/// every write made through it.
pub(crate) struct CatalogWriter<'db> {
    txn: WriteTransaction<'db>,
}

impl<'db> CatalogWriter<'db> {
    pub(crate) fn begin(db: &'db Database) -> Result<Self, LibraryError> {
        Ok(Self {
            txn: db.begin_write()?,
        })
    }

    pub(crate) fn commit(self) -> Result<(), LibraryError> {
        self.txn.commit()?;
        Ok(())
    }

    pub(crate) fn abort(self) -> Result<(), LibraryError> {
        self.txn.abort()?;
        Ok(())
    }

    pub(crate) fn album_by_path(&self, relpath: &str) -> Result<Option<Album>, LibraryError> {
        let (left, right) = common::split_relpath(relpath);
        let key = album_path_key(left, right);
        let id = {
            let index = self.txn.open_table(ALBUMS_BY_PATH_TABLE)?;
            let id = index.get(key.as_str())?.map(|value| value.value());
            id
        };
        match id {
            Some(id) => {
                let table = self.txn.open_table(ALBUMS_TABLE)?;
                get_row(&table, id)
            }
            None => Ok(None),
        }
    }

    pub(crate) fn new_album_id(&self) -> Result<u64, LibraryError> {
        next_id(&self.txn, SEQ_ALBUMS)
    }

    pub(crate) fn save_album(&self, album: &Album) -> Result<(), LibraryError> {
        let bytes = encode_value(album)?;
        let mut table = self.txn.open_table(ALBUMS_TABLE)?;
        table.insert(album.id, bytes.as_slice())?;
        let mut index = self.txn.open_table(ALBUMS_BY_PATH_TABLE)?;
        let key = album_path_key(&album.left_path, &album.right_path);
        index.insert(key.as_str(), album.id)?;
        Ok(())
    }

    pub(crate) fn track_in_folder(
        &self,
        album_id: u64,
        filename: &str,
    ) -> Result<Option<Track>, LibraryError> {
        let key = folder_track_key(album_id, filename);
        let id = {
            let index = self.txn.open_table(TRACKS_BY_FOLDER_TABLE)?;
            let id = index.get(key.as_str())?.map(|value| value.value());
            id
        };
        match id {
            Some(id) => {
                let table = self.txn.open_table(TRACKS_TABLE)?;
                get_row(&table, id)
            }
            None => Ok(None),
        }
    }

    pub(crate) fn new_track_id(&self) -> Result<u64, LibraryError> {
        next_id(&self.txn, SEQ_TRACKS)
    }

    pub(crate) fn save_track(&self, track: &Track) -> Result<(), LibraryError> {
        let bytes = encode_value(track)?;
        let mut table = self.txn.open_table(TRACKS_TABLE)?;
        table.insert(track.id, bytes.as_slice())?;
        let mut index = self.txn.open_table(TRACKS_BY_FOLDER_TABLE)?;
        let key = folder_track_key(track.album_id, &track.filename);
        index.insert(key.as_str(), track.id)?;
        Ok(())
    }

    /// Exact name match; the first writer of a name owns the row.
    pub(crate) fn find_or_create_artist(&self, name: &str) -> Result<Artist, LibraryError> {
        let existing = {
            let index = self.txn.open_table(ARTISTS_BY_NAME_TABLE)?;
            let id = index.get(name)?.map(|value| value.value());
            id
        };
        if let Some(id) = existing {
            let table = self.txn.open_table(ARTISTS_TABLE)?;
            if let Some(artist) = get_row(&table, id)? {
                return Ok(artist);
            }
        }

        let artist = Artist {
            id: next_id(&self.txn, SEQ_ARTISTS)?,
            name: name.to_string(),
            name_udec: decoded(name),
        };
        let bytes = encode_value(&artist)?;
        let mut table = self.txn.open_table(ARTISTS_TABLE)?;
        table.insert(artist.id, bytes.as_slice())?;
        let mut index = self.txn.open_table(ARTISTS_BY_NAME_TABLE)?;
        index.insert(name, artist.id)?;
        Ok(artist)
    }

    pub(crate) fn find_or_create_genre(&self, name: &str) -> Result<Genre, LibraryError> {
        let existing = {
            let index = self.txn.open_table(GENRES_BY_NAME_TABLE)?;
            let id = index.get(name)?.map(|value| value.value());
            id
        };
        if let Some(id) = existing {
            let table = self.txn.open_table(GENRES_TABLE)?;
            if let Some(genre) = get_row(&table, id)? {
                return Ok(genre);
            }
        }

        let genre = Genre {
            id: next_id(&self.txn, SEQ_GENRES)?,
            name: name.to_string(),
        };
        let bytes = encode_value(&genre)?;
        let mut table = self.txn.open_table(GENRES_TABLE)?;
        table.insert(genre.id, bytes.as_slice())?;
        let mut index = self.txn.open_table(GENRES_BY_NAME_TABLE)?;
        index.insert(name, genre.id)?;
        Ok(genre)
    }

    pub(crate) fn set_meta<T: Serialize>(&self, key: &str, value: &T) -> Result<(), LibraryError> {
        let bytes = encode_value(value)?;
        let mut table = self.txn.open_table(META_TABLE)?;
        table.insert(key, bytes.as_slice())?;
        Ok(())
    }

    pub(crate) fn delete_tracks_except(&self, seen: &HashSet<u64>) -> Result<usize, LibraryError> {
        let mut table = self.txn.open_table(TRACKS_TABLE)?;
        let doomed: Vec<Track> = decode_all::<Track, _>(&table)?
            .into_iter()
            .filter(|track| !seen.contains(&track.id))
            .collect();
        let mut index = self.txn.open_table(TRACKS_BY_FOLDER_TABLE)?;
        for track in &doomed {
            table.remove(track.id)?;
            let key = folder_track_key(track.album_id, &track.filename);
            index.remove(key.as_str())?;
        }
        Ok(doomed.len())
    }

    pub(crate) fn delete_albums_except(&self, seen: &HashSet<u64>) -> Result<usize, LibraryError> {
        self.delete_albums_where(|album| !seen.contains(&album.id))
    }

    /// Removes tag-bearing folders that no longer hold any track. Plain
    /// path containers are left alone.
    pub(crate) fn delete_empty_tagged_albums(&self) -> Result<usize, LibraryError> {
        let with_tracks: HashSet<u64> = {
            let tracks = self.txn.open_table(TRACKS_TABLE)?;
            let ids = decode_all::<Track, _>(&tracks)?
                .into_iter()
                .map(|track| track.album_id)
                .collect();
            ids
        };
        self.delete_albums_where(|album| album.has_tags() && !with_tracks.contains(&album.id))
    }

    fn delete_albums_where<F>(&self, doomed_if: F) -> Result<usize, LibraryError>
    where
        F: Fn(&Album) -> bool,
    {
        let mut table = self.txn.open_table(ALBUMS_TABLE)?;
        let doomed: Vec<Album> = decode_all::<Album, _>(&table)?
            .into_iter()
            .filter(|album| doomed_if(album))
            .collect();
        let mut index = self.txn.open_table(ALBUMS_BY_PATH_TABLE)?;
        for album in &doomed {
            table.remove(album.id)?;
            let key = album_path_key(&album.left_path, &album.right_path);
            index.remove(key.as_str())?;
        }
        Ok(doomed.len())
    }

    pub(crate) fn delete_artists_without_albums(&self) -> Result<usize, LibraryError> {
        let referenced: HashSet<u64> = {
            let albums = self.txn.open_table(ALBUMS_TABLE)?;
            let ids = decode_all::<Album, _>(&albums)?
                .into_iter()
                .filter_map(|album| album.tag_artist_id)
                .collect();
            ids
        };
        let mut table = self.txn.open_table(ARTISTS_TABLE)?;
        let doomed: Vec<Artist> = decode_all::<Artist, _>(&table)?
            .into_iter()
            .filter(|artist| !referenced.contains(&artist.id))
            .collect();
        let mut index = self.txn.open_table(ARTISTS_BY_NAME_TABLE)?;
        for artist in &doomed {
            table.remove(artist.id)?;
            index.remove(artist.name.as_str())?;
        }
        Ok(doomed.len())
    }

    pub(crate) fn delete_unused_genres(&self) -> Result<usize, LibraryError> {
        let mut referenced = HashSet::new();
        {
            let albums = self.txn.open_table(ALBUMS_TABLE)?;
            for album in decode_all::<Album, _>(&albums)? {
                if let Some(genre_id) = album.tag_genre_id {
                    referenced.insert(genre_id);
                }
            }
            let tracks = self.txn.open_table(TRACKS_TABLE)?;
            for track in decode_all::<Track, _>(&tracks)? {
                referenced.insert(track.genre_id);
            }
        }
        let mut table = self.txn.open_table(GENRES_TABLE)?;
        let doomed: Vec<Genre> = decode_all::<Genre, _>(&table)?
            .into_iter()
            .filter(|genre| !referenced.contains(&genre.id))
            .collect();
        let mut index = self.txn.open_table(GENRES_BY_NAME_TABLE)?;
        for genre in &doomed {
            table.remove(genre.id)?;
            index.remove(genre.name.as_str())?;
        }
        Ok(doomed.len())
    }
}

fn next_id(txn: &WriteTransaction<'_>, sequence: &str) -> Result<u64, LibraryError> {
    let mut table = txn.open_table(SEQUENCES_TABLE)?;
    let next = match table.get(sequence)? {
        Some(value) => value.value() + 1,
        None => 1,
    };
    table.insert(sequence, next)?;
    Ok(next)
}

pub(crate) fn get_row<T, Tab>(table: &Tab, id: u64) -> Result<Option<T>, LibraryError>
where
    T: DeserializeOwned,
    Tab: ReadableTable<u64, &'static [u8]>,
{
    match table.get(id)? {
        Some(value) => Ok(Some(decode_value(value.value())?)),
        None => Ok(None),
    }
}

pub(crate) fn decode_all<T, Tab>(table: &Tab) -> Result<Vec<T>, LibraryError>
where
    T: DeserializeOwned,
    Tab: ReadableTable<u64, &'static [u8]>,
{
    let mut out = Vec::new();
    for entry in table.iter()? {
        let entry = entry?;
        out.push(decode_value(entry.1.value())?);
    }
    Ok(out)
}

/// Track ids of one folder, in filename order.
pub(crate) fn folder_track_ids<Tab>(index: &Tab, album_id: u64) -> Result<Vec<u64>, LibraryError>
where
    Tab: ReadableTable<&'static str, u64>,
{
    let prefix = folder_prefix(album_id);
    let mut end = prefix.clone();
    end.push('\u{10ffff}');
    let mut ids = Vec::new();
    for entry in index.range(prefix.as_str()..end.as_str())? {
        let entry = entry?;
        ids.push(entry.1.value());
    }
    Ok(ids)
}

fn clear_table(
    txn: &WriteTransaction<'_>,
    table: TableDefinition<u64, &[u8]>,
) -> Result<(), LibraryError> {
    match txn.delete_table(table) {
        Ok(_) => Ok(()),
        Err(TableError::TableDoesNotExist(_)) => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn clear_index(
    txn: &WriteTransaction<'_>,
    table: TableDefinition<&str, u64>,
) -> Result<(), LibraryError> {
    match txn.delete_table(table) {
        Ok(_) => Ok(()),
        Err(TableError::TableDoesNotExist(_)) => Ok(()),
        Err(err) => Err(err.into()),
    }
}

pub(crate) fn encode_value<T: Serialize>(value: &T) -> Result<Vec<u8>, LibraryError> {
    Ok(bincode::serialize(value)?)
}

pub(crate) fn decode_value<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, LibraryError> {
    Ok(bincode::deserialize(bytes)?)
}

fn album_path_key(left: &str, right: &str) -> String {
    let mut out = String::with_capacity(left.len() + right.len() + 1);
    out.push_str(left);
    out.push(KEY_SEP);
    out.push_str(right);
    out
}

fn folder_prefix(album_id: u64) -> String {
    format!("{:020}{}", album_id, KEY_SEP)
}

fn folder_track_key(album_id: u64, filename: &str) -> String {
    let mut out = folder_prefix(album_id);
    out.push_str(filename);
    out
}
