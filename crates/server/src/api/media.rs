use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use library::{LibraryError, MusicDir};

use super::params::Params;
use super::subsonic::{error_response, library_error, not_found, require, ApiResult, ErrorCode};
use crate::range::{parse_range_header, ByteRange, RangeError};
use crate::state::AppState;

type RawQuery = Query<Vec<(String, String)>>;

/// Bytes of one file, or of one range of it.
struct FileSlice {
    data: Vec<u8>,
    size: u64,
    modified: u64,
    range: Option<ByteRange>,
}

enum SliceError {
    Library(LibraryError),
    Unsatisfiable(u64),
}

impl From<LibraryError> for SliceError {
    fn from(err: LibraryError) -> Self {
        SliceError::Library(err)
    }
}

impl From<std::io::Error> for SliceError {
    fn from(err: std::io::Error) -> Self {
        SliceError::Library(LibraryError::Io(err))
    }
}

fn read_slice(
    dir: &dyn MusicDir,
    relpath: &str,
    range_header: Option<&str>,
) -> Result<FileSlice, SliceError> {
    let mut opened = dir.get_file(relpath)?;
    let size = opened.reader.seek(SeekFrom::End(0))?;
    let range = match range_header.map(|value| parse_range_header(value, size)) {
        Some(Ok(range)) => Some(range),
        Some(Err(RangeError::Unsatisfiable)) => return Err(SliceError::Unsatisfiable(size)),
        Some(Err(RangeError::Invalid)) | None => None,
    };
    let (start, len) = match range {
        Some(range) => (range.start, range.len()),
        None => (0, size),
    };
    opened.reader.seek(SeekFrom::Start(start))?;
    let mut data = Vec::with_capacity(len as usize);
    (&mut opened.reader).take(len).read_to_end(&mut data)?;
    Ok(FileSlice {
        data,
        size,
        modified: opened.modified,
        range,
    })
}

fn etag_for(relpath: &str, size: u64, modified: u64) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(relpath.as_bytes());
    hasher.update(&size.to_le_bytes());
    hasher.update(&modified.to_le_bytes());
    let hex = hasher.finalize().to_hex();
    format!("\"{}\"", &hex.as_str()[..16])
}

fn header_value(value: &str) -> HeaderValue {
    HeaderValue::from_str(value)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"))
}

struct ServeOptions<'a> {
    mime: &'a str,
    ranges: bool,
    attachment: Option<&'a str>,
    cache_control: Option<&'static str>,
}

async fn serve_file(
    state: &AppState,
    relpath: String,
    headers: &HeaderMap,
    options: ServeOptions<'_>,
) -> ApiResult {
    let range_header = if options.ranges {
        headers
            .get(header::RANGE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    } else {
        None
    };

    let dir: Arc<dyn MusicDir> = Arc::clone(state.scanner.dir());
    let path = relpath.clone();
    let result = tokio::task::spawn_blocking(move || {
        read_slice(dir.as_ref(), &path, range_header.as_deref())
    })
    .await
    .map_err(|err| error_response(ErrorCode::Generic, format!("read task failed: {}", err)))?;

    let slice = match result {
        Ok(slice) => slice,
        Err(SliceError::Library(err)) => return Err(library_error(err)),
        Err(SliceError::Unsatisfiable(size)) => {
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::RANGE_NOT_SATISFIABLE;
            response.headers_mut().insert(
                header::CONTENT_RANGE,
                header_value(&format!("bytes */{}", size)),
            );
            return Ok(response);
        }
    };

    let etag = etag_for(&relpath, slice.size, slice.modified);
    let not_modified = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.split(',').any(|tag| tag.trim() == etag))
        .unwrap_or(false);

    let mut response = if not_modified {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NOT_MODIFIED;
        response
    } else {
        let len = slice.data.len();
        let mut response = Response::new(Body::from(slice.data));
        response
            .headers_mut()
            .insert(header::CONTENT_LENGTH, HeaderValue::from(len as u64));
        if let Some(range) = slice.range {
            *response.status_mut() = StatusCode::PARTIAL_CONTENT;
            response.headers_mut().insert(
                header::CONTENT_RANGE,
                header_value(&range.content_range(slice.size)),
            );
        }
        response
    };

    let out = response.headers_mut();
    out.insert(header::CONTENT_TYPE, header_value(options.mime));
    out.insert(header::ETAG, header_value(&etag));
    if options.ranges {
        out.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    }
    if let Some(filename) = options.attachment {
        let disposition = format!("attachment; filename=\"{}\"", filename.replace('"', "'"));
        out.insert(header::CONTENT_DISPOSITION, header_value(&disposition));
    }
    if let Some(cache) = options.cache_control {
        out.insert(header::CACHE_CONTROL, HeaderValue::from_static(cache));
    }
    Ok(response)
}

async fn serve_track(
    state: &AppState,
    params: &Params,
    headers: &HeaderMap,
    download: bool,
) -> ApiResult {
    let id = params.require_int(&["id"])?;
    let track = require(state.library.track(id), "song")?;
    let relpath = require(state.library.track_relpath(&track), "album")?;
    let options = ServeOptions {
        mime: track.mime(),
        ranges: true,
        attachment: download.then_some(track.filename.as_str()),
        cache_control: None,
    };
    serve_file(state, relpath, headers, options).await
}

/// Raw file bytes; transcoding options in the query are ignored.
pub async fn stream(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: RawQuery,
) -> ApiResult {
    serve_track(&state, &Params::from(query), &headers, false).await
}

pub async fn download(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: RawQuery,
) -> ApiResult {
    serve_track(&state, &Params::from(query), &headers, true).await
}

pub async fn get_cover_art(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: RawQuery,
) -> ApiResult {
    let params = Params::from(query);
    let id = params.require_int(&["id", "albumId"])?;
    let folder = require(state.library.album(id), "album")?;
    let Some(relpath) = folder.cover_relpath() else {
        return Err(not_found("cover"));
    };
    let mime = mime_guess::from_path(&relpath)
        .first_or_octet_stream()
        .to_string();
    let options = ServeOptions {
        mime: &mime,
        ranges: false,
        attachment: None,
        cache_control: Some("public, max-age=31536000"),
    };
    serve_file(&state, relpath, &headers, options).await
}

#[cfg(test)]
mod tests {
    use std::fs;

    use library::LocalDir;

    use super::*;

    fn music_dir() -> (tempfile::TempDir, LocalDir) {
        let temp = tempfile::tempdir().unwrap();
        fs::create_dir_all(temp.path().join("A")).unwrap();
        fs::write(temp.path().join("A").join("song.mp3"), b"0123456789").unwrap();
        let dir = LocalDir::new(temp.path().to_path_buf());
        (temp, dir)
    }

    #[test]
    fn reads_whole_file_without_range() {
        let (_temp, dir) = music_dir();
        let slice = read_slice(&dir, "A/song.mp3", None).ok().unwrap();
        assert_eq!(slice.data, b"0123456789");
        assert_eq!(slice.size, 10);
        assert_eq!(slice.range, None);
    }

    #[test]
    fn reads_only_the_requested_range() {
        let (_temp, dir) = music_dir();
        let slice = read_slice(&dir, "A/song.mp3", Some("bytes=2-4")).ok().unwrap();
        assert_eq!(slice.data, b"234");
        assert_eq!(slice.range, Some(ByteRange { start: 2, end: 4 }));

        let slice = read_slice(&dir, "A/song.mp3", Some("bytes=oops")).ok().unwrap();
        assert_eq!(slice.data.len(), 10);
        assert_eq!(slice.range, None);
    }

    #[test]
    fn unsatisfiable_ranges_report_the_size() {
        let (_temp, dir) = music_dir();
        match read_slice(&dir, "A/song.mp3", Some("bytes=50-")) {
            Err(SliceError::Unsatisfiable(size)) => assert_eq!(size, 10),
            _ => panic!("expected unsatisfiable range"),
        }
        assert!(matches!(
            read_slice(&dir, "A/missing.mp3", None),
            Err(SliceError::Library(LibraryError::Io(_)))
        ));
    }

    #[test]
    fn etags_change_with_the_file() {
        let a = etag_for("A/song.mp3", 10, 100);
        assert_eq!(a, etag_for("A/song.mp3", 10, 100));
        assert_ne!(a, etag_for("A/song.mp3", 10, 101));
        assert_ne!(a, etag_for("A/song.mp3", 11, 100));
        assert!(a.starts_with('"') && a.ends_with('"'));
        assert_eq!(a.len(), 18);
    }
}
