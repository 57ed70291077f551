use std::collections::{BTreeMap, HashMap};

use axum::extract::{Query, State};
use axum::response::Response;
use common::{Album, Artist, Genre, Track};
use library::Library;
use serde::Serialize;

use super::params::Params;
use super::subsonic::{
    index_key, library_error, ok_with, require, AlbumId3, ApiResult, ArtistId3, Child,
};
use crate::state::AppState;

pub(super) type RawQuery = Query<Vec<(String, String)>>;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IndexEntry {
    id: String,
    name: String,
}

#[derive(Serialize)]
struct Index<T> {
    name: String,
    artist: Vec<T>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Indexes {
    last_modified: u64,
    ignored_articles: String,
    index: Vec<Index<IndexEntry>>,
    child: Vec<Child>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ArtistsIndex {
    ignored_articles: String,
    index: Vec<Index<ArtistId3>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Directory {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent: Option<String>,
    name: String,
    child: Vec<Child>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenreEntry {
    value: String,
    song_count: usize,
    album_count: usize,
}

/// Per-request cache of artist and genre rows.
pub(super) struct Lookup<'a> {
    library: &'a Library,
    artists: HashMap<u64, Option<Artist>>,
    genres: HashMap<u64, Option<Genre>>,
}

impl<'a> Lookup<'a> {
    pub(super) fn new(library: &'a Library) -> Self {
        Self {
            library,
            artists: HashMap::new(),
            genres: HashMap::new(),
        }
    }

    fn artist(&mut self, id: Option<u64>) -> Result<Option<Artist>, Response> {
        let Some(id) = id else {
            return Ok(None);
        };
        if let Some(cached) = self.artists.get(&id) {
            return Ok(cached.clone());
        }
        let artist = self.library.artist(id).map_err(library_error)?;
        self.artists.insert(id, artist.clone());
        Ok(artist)
    }

    fn genre(&mut self, id: Option<u64>) -> Result<Option<Genre>, Response> {
        let Some(id) = id else {
            return Ok(None);
        };
        if let Some(cached) = self.genres.get(&id) {
            return Ok(cached.clone());
        }
        let genre = self.library.genre(id).map_err(library_error)?;
        self.genres.insert(id, genre.clone());
        Ok(genre)
    }

    pub(super) fn track_child(
        &mut self,
        track: &Track,
        folder: &Album,
    ) -> Result<Child, Response> {
        let artist = self.artist(Some(track.artist_id))?;
        let genre = self.genre(Some(track.genre_id))?;
        Ok(Child::track(track, folder, artist.as_ref(), genre.as_ref()))
    }

    pub(super) fn album_id3(
        &mut self,
        album: &Album,
    ) -> Result<(AlbumId3, Vec<Track>), Response> {
        let tracks = self.library.album_tracks(album.id).map_err(library_error)?;
        let artist = self.artist(album.tag_artist_id)?;
        let genre = self.genre(album.tag_genre_id)?;
        Ok((
            AlbumId3::new(album, artist.as_ref(), genre.as_ref(), &tracks),
            tracks,
        ))
    }

    fn folder_children(&mut self, folder: &Album) -> Result<Vec<Child>, Response> {
        let mut children: Vec<Child> = self
            .library
            .child_folders(folder.id)
            .map_err(library_error)?
            .iter()
            .map(Child::folder)
            .collect();
        for track in self.library.album_tracks(folder.id).map_err(library_error)? {
            children.push(self.track_child(&track, folder)?);
        }
        Ok(children)
    }
}

fn group_by_initial<T>(items: Vec<(String, T)>) -> Vec<Index<T>> {
    let mut groups: BTreeMap<String, Vec<T>> = BTreeMap::new();
    for (name, item) in items {
        groups.entry(index_key(&name)).or_default().push(item);
    }
    groups
        .into_iter()
        .map(|(name, artist)| Index { name, artist })
        .collect()
}

pub async fn get_indexes(State(state): State<AppState>) -> ApiResult {
    let library = &state.library;
    let last_modified = library
        .last_scan_time()
        .map_err(library_error)?
        .unwrap_or(0)
        * 1000;
    let Some(root) = library.root_folder().map_err(library_error)? else {
        return Ok(ok_with(
            "indexes",
            Indexes {
                last_modified,
                ignored_articles: String::new(),
                index: Vec::new(),
                child: Vec::new(),
            },
        ));
    };

    let folders = library.child_folders(root.id).map_err(library_error)?;
    let entries = folders
        .into_iter()
        .map(|folder| {
            let entry = IndexEntry {
                id: folder.id.to_string(),
                name: folder.right_path.clone(),
            };
            (folder.folder_sort_name().to_string(), entry)
        })
        .collect();

    let mut lookup = Lookup::new(library);
    let mut child = Vec::new();
    for track in library.album_tracks(root.id).map_err(library_error)? {
        child.push(lookup.track_child(&track, &root)?);
    }

    Ok(ok_with(
        "indexes",
        Indexes {
            last_modified,
            ignored_articles: String::new(),
            index: group_by_initial(entries),
            child,
        },
    ))
}

pub async fn get_music_directory(State(state): State<AppState>, query: RawQuery) -> ApiResult {
    let params = Params::from(query);
    let id = params.require_int(&["id"])?;
    let folder = require(state.library.album(id), "directory")?;
    let child = Lookup::new(&state.library).folder_children(&folder)?;
    Ok(ok_with(
        "directory",
        Directory {
            id: folder.id.to_string(),
            parent: folder.parent_id.map(|id| id.to_string()),
            name: Child::folder(&folder).title,
            child,
        },
    ))
}

pub async fn get_genres(State(state): State<AppState>) -> ApiResult {
    let genres = state.library.genres().map_err(library_error)?;
    let entries: Vec<GenreEntry> = genres
        .into_iter()
        .map(|summary| GenreEntry {
            value: summary.genre.name,
            song_count: summary.track_count,
            album_count: summary.album_count,
        })
        .collect();
    Ok(ok_with("genres", serde_json::json!({ "genre": entries })))
}

pub async fn get_artists(State(state): State<AppState>) -> ApiResult {
    let artists = state.library.artists().map_err(library_error)?;
    let entries = artists
        .into_iter()
        .map(|summary| {
            let name = summary.artist.sort_name().to_string();
            let entry = ArtistId3 {
                id: summary.artist.id.to_string(),
                name: summary.artist.name,
                album_count: summary.album_count,
                album: None,
            };
            (name, entry)
        })
        .collect();
    Ok(ok_with(
        "artists",
        ArtistsIndex {
            ignored_articles: String::new(),
            index: group_by_initial(entries),
        },
    ))
}

pub async fn get_artist(State(state): State<AppState>, query: RawQuery) -> ApiResult {
    let params = Params::from(query);
    let id = params.require_int(&["id"])?;
    let artist = require(state.library.artist(id), "artist")?;
    let folders = state.library.artist_albums(id).map_err(library_error)?;

    let mut lookup = Lookup::new(&state.library);
    let mut albums = Vec::with_capacity(folders.len());
    for folder in &folders {
        albums.push(lookup.album_id3(folder)?.0);
    }
    Ok(ok_with(
        "artist",
        ArtistId3 {
            id: artist.id.to_string(),
            name: artist.name,
            album_count: albums.len(),
            album: Some(albums),
        },
    ))
}

pub async fn get_album(State(state): State<AppState>, query: RawQuery) -> ApiResult {
    let params = Params::from(query);
    let id = params.require_int(&["id"])?;
    let folder = require(state.library.album(id), "album")?;

    let mut lookup = Lookup::new(&state.library);
    let (mut album, tracks) = lookup.album_id3(&folder)?;
    let mut songs = Vec::with_capacity(tracks.len());
    for track in &tracks {
        songs.push(lookup.track_child(track, &folder)?);
    }
    album.song = Some(songs);
    Ok(ok_with("album", album))
}

pub async fn get_song(State(state): State<AppState>, query: RawQuery) -> ApiResult {
    let params = Params::from(query);
    let id = params.require_int(&["id"])?;
    let track = require(state.library.track(id), "song")?;
    let folder = require(state.library.album(track.album_id), "album")?;
    let song = Lookup::new(&state.library).track_child(&track, &folder)?;
    Ok(ok_with("song", song))
}
