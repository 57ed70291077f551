use axum::response::{IntoResponse, Response};
use axum::Json;
use common::{Album, Artist, Genre, Track};
use library::LibraryError;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::warn;

pub const API_VERSION: &str = "1.9.0";

pub type ApiResult = Result<Response, Response>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Generic = 0,
    MissingParameter = 10,
    NotFound = 70,
}

fn envelope(mut body: Map<String, Value>, status: &str) -> Response {
    body.insert("status".to_string(), Value::from(status));
    body.insert("version".to_string(), Value::from(API_VERSION));
    Json(json!({ "subsonic-response": body })).into_response()
}

/// Successful response with no payload.
pub fn ok_empty() -> Response {
    envelope(Map::new(), "ok")
}

/// Successful response carrying `payload` under `key`.
pub fn ok_with<T: Serialize>(key: &str, payload: T) -> Response {
    match serde_json::to_value(payload) {
        Ok(value) => {
            let mut body = Map::new();
            body.insert(key.to_string(), value);
            envelope(body, "ok")
        }
        Err(err) => error_response(ErrorCode::Generic, format!("encode error: {}", err)),
    }
}

pub fn error_response(code: ErrorCode, message: impl Into<String>) -> Response {
    let mut body = Map::new();
    body.insert(
        "error".to_string(),
        json!({ "code": code as u16, "message": message.into() }),
    );
    envelope(body, "failed")
}

pub fn missing_param(name: &str) -> Response {
    error_response(
        ErrorCode::MissingParameter,
        format!("required parameter '{}' is missing", name),
    )
}

pub fn not_found(what: &str) -> Response {
    error_response(ErrorCode::NotFound, format!("{} not found", what))
}

pub fn library_error(err: LibraryError) -> Response {
    if let LibraryError::Io(io) = &err {
        if io.kind() == std::io::ErrorKind::NotFound {
            return not_found("file");
        }
    }
    warn!("Library error: {}", err);
    error_response(ErrorCode::Generic, err.to_string())
}

pub fn require<T>(value: Result<Option<T>, LibraryError>, what: &str) -> Result<T, Response> {
    match value {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Err(not_found(what)),
        Err(err) => Err(library_error(err)),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Child {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub is_dir: bool,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disc_number: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_art: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist_id: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub media_type: Option<&'static str>,
}

impl Child {
    pub fn folder(folder: &Album) -> Self {
        Self {
            id: folder.id.to_string(),
            parent: folder.parent_id.map(|id| id.to_string()),
            is_dir: true,
            title: folder_name(folder),
            album: None,
            artist: None,
            track: None,
            disc_number: None,
            year: folder.tag_year,
            genre: None,
            cover_art: folder.cover.as_ref().map(|_| folder.id.to_string()),
            size: None,
            content_type: None,
            suffix: None,
            duration: None,
            bit_rate: None,
            path: None,
            album_id: None,
            artist_id: None,
            media_type: None,
        }
    }

    pub fn track(
        track: &Track,
        folder: &Album,
        artist: Option<&Artist>,
        genre: Option<&Genre>,
    ) -> Self {
        let title = if track.tag_title.is_empty() {
            track.filename.clone()
        } else {
            track.tag_title.clone()
        };
        let artist_name = if track.tag_track_artist.is_empty() {
            artist.map(|artist| artist.name.clone())
        } else {
            Some(track.tag_track_artist.clone())
        };
        Self {
            id: track.id.to_string(),
            parent: Some(folder.id.to_string()),
            is_dir: false,
            title,
            album: Some(album_title(folder)),
            artist: artist_name,
            track: track.tag_track_number,
            disc_number: track.tag_disc_number,
            year: folder.tag_year,
            genre: genre.map(|genre| genre.name.clone()),
            cover_art: folder.cover.as_ref().map(|_| folder.id.to_string()),
            size: Some(track.size),
            content_type: Some(track.mime().to_string()),
            suffix: track.extension().map(|ext| ext.to_ascii_lowercase()),
            duration: Some(track.duration_ms / 1000),
            bit_rate: track.bitrate,
            path: Some(common::join_relpath(&folder.relpath(), &track.filename)),
            album_id: Some(folder.id.to_string()),
            artist_id: Some(track.artist_id.to_string()),
            media_type: Some("music"),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumId3 {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_art: Option<String>,
    pub song_count: usize,
    pub duration: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub song: Option<Vec<Child>>,
}

impl AlbumId3 {
    pub fn new(
        album: &Album,
        artist: Option<&Artist>,
        genre: Option<&Genre>,
        tracks: &[Track],
    ) -> Self {
        Self {
            id: album.id.to_string(),
            name: album_title(album),
            artist: artist.map(|artist| artist.name.clone()),
            artist_id: album.tag_artist_id.map(|id| id.to_string()),
            cover_art: album.cover.as_ref().map(|_| album.id.to_string()),
            song_count: tracks.len(),
            duration: tracks.iter().map(|track| track.duration_ms / 1000).sum(),
            year: album.tag_year,
            genre: genre.map(|genre| genre.name.clone()),
            song: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistId3 {
    pub id: String,
    pub name: String,
    pub album_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<Vec<AlbumId3>>,
}

fn folder_name(folder: &Album) -> String {
    if folder.is_root() {
        "Music".to_string()
    } else {
        folder.right_path.clone()
    }
}

/// Tag title, or the directory name for folders without one.
pub fn album_title(folder: &Album) -> String {
    if folder.tag_title.is_empty() {
        folder_name(folder)
    } else {
        folder.tag_title.clone()
    }
}

/// Index bucket for a name: its first letter, or `#`.
pub fn index_key(name: &str) -> String {
    match name.trim().chars().next() {
        Some(ch) if ch.is_alphabetic() => ch.to_uppercase().collect(),
        _ => "#".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn ok_envelope_wraps_the_payload() {
        let value = body_json(ok_with("license", json!({ "valid": true }))).await;
        let body = &value["subsonic-response"];
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], API_VERSION);
        assert_eq!(body["license"]["valid"], true);
    }

    #[tokio::test]
    async fn errors_carry_code_and_message() {
        let value = body_json(missing_param("id")).await;
        let body = &value["subsonic-response"];
        assert_eq!(body["status"], "failed");
        assert_eq!(body["error"]["code"], 10);
        assert!(body["error"]["message"].as_str().unwrap().contains("'id'"));

        let value = body_json(library_error(LibraryError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "gone",
        ))))
        .await;
        assert_eq!(value["subsonic-response"]["error"]["code"], 70);
    }

    #[test]
    fn track_child_falls_back_to_names() {
        let mut folder = Album::new(3, "Artist A/Album X");
        folder.cover = Some("cover.jpg".to_string());
        let track = Track {
            id: 9,
            album_id: 3,
            filename: "01 - Song.MP3".to_string(),
            size: 1234,
            artist_id: 4,
            duration_ms: 61_500,
            ..Track::default()
        };
        let artist = Artist {
            id: 4,
            name: "Artist A".to_string(),
            name_udec: String::new(),
        };
        let child = Child::track(&track, &folder, Some(&artist), None);
        assert_eq!(child.title, "01 - Song.MP3");
        assert_eq!(child.album.as_deref(), Some("Album X"));
        assert_eq!(child.artist.as_deref(), Some("Artist A"));
        assert_eq!(child.suffix.as_deref(), Some("mp3"));
        assert_eq!(child.content_type.as_deref(), Some("audio/mpeg"));
        assert_eq!(child.duration, Some(61));
        assert_eq!(child.cover_art.as_deref(), Some("3"));
        assert_eq!(child.path.as_deref(), Some("Artist A/Album X/01 - Song.MP3"));

        let value = serde_json::to_value(&child).unwrap();
        assert_eq!(value["isDir"], false);
        assert_eq!(value["type"], "music");
        assert!(value.get("genre").is_none());
    }

    #[test]
    fn index_keys_group_by_first_letter() {
        assert_eq!(index_key("abba"), "A");
        assert_eq!(index_key("Ørsted"), "Ø");
        let artist = Artist {
            id: 1,
            name: "Ørsted".to_string(),
            name_udec: common::decoded("Ørsted"),
        };
        assert_eq!(index_key(artist.sort_name()), "O");
        assert_eq!(index_key("2Pac"), "#");
        assert_eq!(index_key(""), "#");
    }
}
