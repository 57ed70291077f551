use std::collections::HashMap;

use axum::extract::State;
use axum::response::Response;
use common::{Album, Track};
use library::{AlbumOrder, Library, Page, TrackFilter};
use rand::seq::SliceRandom;
use serde::Serialize;

use super::browse::{Lookup, RawQuery};
use super::params::Params;
use super::subsonic::{
    error_response, library_error, missing_param, ok_with, AlbumId3, ApiResult, ArtistId3, Child,
    ErrorCode,
};
use crate::state::AppState;

const SEARCH_DEFAULT: usize = 20;
const LIST_DEFAULT: usize = 10;
const LIST_MAX: usize = 500;

#[derive(Serialize)]
struct FolderArtist {
    id: String,
    name: String,
}

#[derive(Serialize)]
struct SearchResult2 {
    artist: Vec<FolderArtist>,
    album: Vec<Child>,
    song: Vec<Child>,
}

#[derive(Serialize)]
struct SearchResult3 {
    artist: Vec<ArtistId3>,
    album: Vec<AlbumId3>,
    song: Vec<Child>,
}

#[derive(Serialize)]
struct AlbumList<T> {
    album: Vec<T>,
}

#[derive(Serialize)]
struct SongList {
    song: Vec<Child>,
}

/// What a `getAlbumList` type asks for.
enum ListKind {
    Random,
    Ordered(AlbumOrder),
    /// Play statistics are not kept, so these lists are always empty.
    Unsupported,
}

fn list_kind(params: &Params) -> Result<ListKind, Response> {
    let Some(kind) = params.text("type") else {
        return Err(missing_param("type"));
    };
    let order = match kind {
        "random" => return Ok(ListKind::Random),
        "frequent" | "recent" | "starred" | "highest" => return Ok(ListKind::Unsupported),
        "newest" => AlbumOrder::Newest,
        "alphabeticalByName" => AlbumOrder::ByName,
        "alphabeticalByArtist" => AlbumOrder::ByArtist,
        "byYear" => {
            let from = params.year("fromYear").ok_or_else(|| missing_param("fromYear"))?;
            let to = params.year("toYear").ok_or_else(|| missing_param("toYear"))?;
            AlbumOrder::ByYear { from, to }
        }
        "byGenre" => {
            let genre = params.text("genre").ok_or_else(|| missing_param("genre"))?;
            AlbumOrder::ByGenre(genre.to_string())
        }
        other => {
            return Err(error_response(
                ErrorCode::Generic,
                format!("unknown list type '{}'", other),
            ))
        }
    };
    Ok(ListKind::Ordered(order))
}

fn list_albums(library: &Library, params: &Params) -> Result<Vec<Album>, Response> {
    let kind = list_kind(params)?;
    let page = params.page("offset", "size", LIST_DEFAULT, LIST_MAX);
    match kind {
        ListKind::Random => {
            let all = library
                .album_list(&AlbumOrder::ByName, Page::new(0, usize::MAX))
                .map_err(library_error)?;
            Ok(shuffled(all, page.limit))
        }
        ListKind::Ordered(order) => library.album_list(&order, page).map_err(library_error),
        ListKind::Unsupported => Ok(Vec::new()),
    }
}

fn shuffled<T>(mut items: Vec<T>, limit: usize) -> Vec<T> {
    let mut rng = rand::rng();
    items.shuffle(&mut rng);
    items.truncate(limit);
    items
}

/// Song entries for `tracks`, looking each parent folder up once.
fn songs(
    lookup: &mut Lookup<'_>,
    library: &Library,
    tracks: &[Track],
) -> Result<Vec<Child>, Response> {
    let mut folders: HashMap<u64, Option<Album>> = HashMap::new();
    let mut out = Vec::with_capacity(tracks.len());
    for track in tracks {
        if !folders.contains_key(&track.album_id) {
            let folder = library.album(track.album_id).map_err(library_error)?;
            folders.insert(track.album_id, folder);
        }
        if let Some(Some(folder)) = folders.get(&track.album_id) {
            out.push(lookup.track_child(track, folder)?);
        }
    }
    Ok(out)
}

fn search_query(params: &Params) -> Result<&str, Response> {
    params.get("query").ok_or_else(|| missing_param("query"))
}

/// Folder based search: top-level folders stand in for artists.
pub async fn search2(State(state): State<AppState>, query: RawQuery) -> ApiResult {
    let params = Params::from(query);
    let text = search_query(&params)?;
    let library = &state.library;

    let root_id = library
        .root_folder()
        .map_err(library_error)?
        .map(|root| root.id);
    let top_level: Vec<Album> = library
        .search_folders(text, Page::new(0, usize::MAX))
        .map_err(library_error)?
        .into_iter()
        .filter(|folder| root_id.is_some() && folder.parent_id == root_id)
        .collect();
    let artist = params
        .page("artistOffset", "artistCount", SEARCH_DEFAULT, LIST_MAX)
        .apply(top_level)
        .into_iter()
        .map(|folder| FolderArtist {
            id: folder.id.to_string(),
            name: folder.right_path,
        })
        .collect();

    let album_page = params.page("albumOffset", "albumCount", SEARCH_DEFAULT, LIST_MAX);
    let album = library
        .search_albums(text, album_page)
        .map_err(library_error)?
        .iter()
        .map(Child::folder)
        .collect();

    let song_page = params.page("songOffset", "songCount", SEARCH_DEFAULT, LIST_MAX);
    let tracks = library.search_tracks(text, song_page).map_err(library_error)?;
    let song = songs(&mut Lookup::new(library), library, &tracks)?;

    Ok(ok_with(
        "searchResult2",
        SearchResult2 {
            artist,
            album,
            song,
        },
    ))
}

/// Tag based search over artists, album titles and songs.
pub async fn search3(State(state): State<AppState>, query: RawQuery) -> ApiResult {
    let params = Params::from(query);
    let text = search_query(&params)?;
    let library = &state.library;
    let mut lookup = Lookup::new(library);

    let artist_page = params.page("artistOffset", "artistCount", SEARCH_DEFAULT, LIST_MAX);
    let mut artist = Vec::new();
    for found in library.search_artists(text, artist_page).map_err(library_error)? {
        let album_count = library.artist_albums(found.id).map_err(library_error)?.len();
        artist.push(ArtistId3 {
            id: found.id.to_string(),
            name: found.name,
            album_count,
            album: None,
        });
    }

    let album_page = params.page("albumOffset", "albumCount", SEARCH_DEFAULT, LIST_MAX);
    let mut album = Vec::new();
    for folder in library.search_albums(text, album_page).map_err(library_error)? {
        album.push(lookup.album_id3(&folder)?.0);
    }

    let song_page = params.page("songOffset", "songCount", SEARCH_DEFAULT, LIST_MAX);
    let tracks = library.search_tracks(text, song_page).map_err(library_error)?;
    let song = songs(&mut lookup, library, &tracks)?;

    Ok(ok_with(
        "searchResult3",
        SearchResult3 {
            artist,
            album,
            song,
        },
    ))
}

pub async fn get_album_list(State(state): State<AppState>, query: RawQuery) -> ApiResult {
    let params = Params::from(query);
    let albums = list_albums(&state.library, &params)?;
    let album: Vec<Child> = albums.iter().map(Child::folder).collect();
    Ok(ok_with("albumList", AlbumList { album }))
}

pub async fn get_album_list2(State(state): State<AppState>, query: RawQuery) -> ApiResult {
    let params = Params::from(query);
    let albums = list_albums(&state.library, &params)?;
    let mut lookup = Lookup::new(&state.library);
    let mut album = Vec::with_capacity(albums.len());
    for folder in &albums {
        album.push(lookup.album_id3(folder)?.0);
    }
    Ok(ok_with("albumList2", AlbumList { album }))
}

pub async fn get_random_songs(State(state): State<AppState>, query: RawQuery) -> ApiResult {
    let params = Params::from(query);
    let size = params.page("offset", "size", LIST_DEFAULT, LIST_MAX).limit;
    let filter = TrackFilter {
        genre: params.text("genre").map(str::to_string),
        from_year: params.year("fromYear"),
        to_year: params.year("toYear"),
    };
    let tracks = state.library.filter_tracks(&filter).map_err(library_error)?;
    let tracks = shuffled(tracks, size);
    let song = songs(&mut Lookup::new(&state.library), &state.library, &tracks)?;
    Ok(ok_with("randomSongs", SongList { song }))
}

pub async fn get_songs_by_genre(State(state): State<AppState>, query: RawQuery) -> ApiResult {
    let params = Params::from(query);
    let genre = params.text("genre").ok_or_else(|| missing_param("genre"))?;
    let page = params.page("offset", "count", LIST_DEFAULT, LIST_MAX);
    let tracks = state.library.genre_tracks(genre, page).map_err(library_error)?;
    let song = songs(&mut Lookup::new(&state.library), &state.library, &tracks)?;
    Ok(ok_with("songsByGenre", SongList { song }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::extract::Query;
    use library::LocalDir;
    use metadata::{MetadataError, TagInfo, TagReader};
    use serde_json::Value;

    use super::*;
    use crate::config::ServerConfig;

    /// Reads `key=value` lines instead of real audio tags.
    struct TextTags;

    impl TagReader for TextTags {
        fn read(&self, _path_hint: &str, data: &[u8]) -> Result<TagInfo, MetadataError> {
            let mut info = TagInfo::default();
            for line in String::from_utf8_lossy(data).lines() {
                let Some((key, value)) = line.split_once('=') else {
                    continue;
                };
                let value = Some(value.trim().to_string());
                match key.trim() {
                    "title" => info.title = value,
                    "artist" => info.artist = value,
                    "album" => info.album = value,
                    "genre" => info.genre = value,
                    "year" => info.year = value.and_then(|v| v.parse().ok()),
                    _ => {}
                }
            }
            Ok(info)
        }
    }

    fn scanned_state(temp: &tempfile::TempDir) -> AppState {
        let music = temp.path().join("music");
        let homogenic = "artist=Björk\nalbum=Homogénic\ngenre=Pop\nyear=1997";
        let files = [
            ("Björk/Homogenic/01 Jóga.mp3", format!("title=Jóga\n{}", homogenic)),
            ("Björk/Homogenic/02 Bachelorette.mp3", format!("title=Bachelorette\n{}", homogenic)),
            (
                "Nena/99/01.mp3",
                "title=Luftballons\nartist=Nena\nalbum=99 Luftballons\ngenre=Rock\nyear=1983"
                    .to_string(),
            ),
        ];
        for (relpath, text) in files {
            let path = music.join(relpath);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, text).unwrap();
        }
        let library = Library::open(&temp.path().join("catalog.redb")).unwrap();
        let scanner = library.scanner(Arc::new(LocalDir::new(music)), Arc::new(TextTags));
        scanner.start().unwrap();
        AppState::new(library, scanner, ServerConfig::default())
    }

    fn query(pairs: &[(&str, &str)]) -> RawQuery {
        Query(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    async fn payload(result: ApiResult, key: &str) -> Value {
        let response = match result {
            Ok(response) | Err(response) => response,
        };
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        body["subsonic-response"][key].clone()
    }

    fn names(list: &Value, field: &str) -> Vec<String> {
        list.as_array()
            .unwrap()
            .iter()
            .map(|item| item[field].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn search3_finds_accented_names_from_plain_queries() {
        let temp = tempfile::tempdir().unwrap();
        let state = scanned_state(&temp);

        let result = search3(State(state.clone()), query(&[("query", "bjork")])).await;
        let found = payload(result, "searchResult3").await;
        assert_eq!(names(&found["artist"], "name"), vec!["Björk"]);
        assert_eq!(found["artist"][0]["albumCount"], 1);
        assert!(found["album"].as_array().unwrap().is_empty());

        let result = search3(State(state.clone()), query(&[("query", "homogenic")])).await;
        let found = payload(result, "searchResult3").await;
        assert_eq!(names(&found["album"], "name"), vec!["Homogénic"]);

        let result = search3(State(state), query(&[("query", "joga")])).await;
        let found = payload(result, "searchResult3").await;
        assert_eq!(names(&found["song"], "title"), vec!["Jóga"]);
    }

    #[tokio::test]
    async fn search2_reports_top_level_folders_as_artists() {
        let temp = tempfile::tempdir().unwrap();
        let state = scanned_state(&temp);

        let result = search2(State(state.clone()), query(&[("query", "")])).await;
        let found = payload(result, "searchResult2").await;
        assert_eq!(names(&found["artist"], "name"), vec!["Björk", "Nena"]);
        assert_eq!(found["song"].as_array().unwrap().len(), 3);

        let result = search2(State(state), query(&[])).await;
        let error = payload(result, "error").await;
        assert_eq!(error["code"], 10);
    }

    #[tokio::test]
    async fn album_lists_follow_the_requested_type() {
        let temp = tempfile::tempdir().unwrap();
        let state = scanned_state(&temp);

        let result = get_album_list2(
            State(state.clone()),
            query(&[("type", "alphabeticalByName")]),
        )
        .await;
        let list = payload(result, "albumList2").await;
        assert_eq!(names(&list["album"], "name"), vec!["99 Luftballons", "Homogénic"]);
        assert_eq!(list["album"][1]["songCount"], 2);

        let result = get_album_list(
            State(state.clone()),
            query(&[("type", "byYear"), ("fromYear", "1990"), ("toYear", "2000")]),
        )
        .await;
        let list = payload(result, "albumList").await;
        assert_eq!(names(&list["album"], "title"), vec!["Homogenic"]);

        let random = query(&[("type", "random"), ("size", "1")]);
        let list = payload(get_album_list(State(state.clone()), random).await, "albumList").await;
        assert_eq!(list["album"].as_array().unwrap().len(), 1);

        let frequent = query(&[("type", "frequent")]);
        let list = payload(get_album_list(State(state.clone()), frequent).await, "albumList").await;
        assert!(list["album"].as_array().unwrap().is_empty());

        let result = get_album_list(State(state), query(&[("type", "byGenre")])).await;
        assert_eq!(payload(result, "error").await["code"], 10);
    }

    #[tokio::test]
    async fn songs_by_genre_and_random_songs_respect_filters() {
        let temp = tempfile::tempdir().unwrap();
        let state = scanned_state(&temp);

        let result = get_songs_by_genre(State(state.clone()), query(&[("genre", "Pop")])).await;
        let list = payload(result, "songsByGenre").await;
        assert_eq!(list["song"].as_array().unwrap().len(), 2);

        let result = get_songs_by_genre(
            State(state.clone()),
            query(&[("genre", "Pop"), ("count", "1"), ("offset", "1")]),
        )
        .await;
        let list = payload(result, "songsByGenre").await;
        assert_eq!(list["song"].as_array().unwrap().len(), 1);

        let result = get_random_songs(
            State(state.clone()),
            query(&[("toYear", "1990"), ("size", "5")]),
        )
        .await;
        let list = payload(result, "randomSongs").await;
        assert_eq!(names(&list["song"], "title"), vec!["Luftballons"]);

        let result = get_random_songs(State(state), query(&[("genre", "Polka")])).await;
        let list = payload(result, "randomSongs").await;
        assert!(list["song"].as_array().unwrap().is_empty());
    }
}
