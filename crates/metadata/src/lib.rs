use std::io::Cursor;

use lofty::error::LoftyError;
use lofty::file::FileType;
use lofty::prelude::{AudioFile, ItemKey, TaggedFileExt};
use lofty::probe::Probe;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TagInfo {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album_artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub track_no: Option<u16>,
    pub disc_no: Option<u16>,
    pub year: Option<i32>,
    pub brainz_id: Option<String>,
    pub album_brainz_id: Option<String>,
    pub duration_ms: Option<u32>,
    pub bitrate: Option<u32>,
}

#[derive(Debug)]
pub enum MetadataError {
    Io(std::io::Error),
    Lofty(LoftyError),
    UnknownFormat(String),
    Invalid(String),
}

impl std::fmt::Display for MetadataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetadataError::Io(err) => write!(f, "io error: {}", err),
            MetadataError::Lofty(err) => write!(f, "tag error: {}", err),
            MetadataError::UnknownFormat(hint) => write!(f, "unknown audio format: {}", hint),
            MetadataError::Invalid(message) => write!(f, "invalid tags: {}", message),
        }
    }
}

impl std::error::Error for MetadataError {}

impl From<std::io::Error> for MetadataError {
    fn from(err: std::io::Error) -> Self {
        MetadataError::Io(err)
    }
}

impl From<LoftyError> for MetadataError {
    fn from(err: LoftyError) -> Self {
        MetadataError::Lofty(err)
    }
}

/// Turns raw file contents into a tag record. The path hint is only used
/// to pick a container when the bytes alone are ambiguous.
pub trait TagReader: Send + Sync {
    fn read(&self, path_hint: &str, data: &[u8]) -> Result<TagInfo, MetadataError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyReader;

impl TagReader for LoftyReader {
    fn read(&self, path_hint: &str, data: &[u8]) -> Result<TagInfo, MetadataError> {
        read_tags_from_bytes(path_hint, data)
    }
}

pub fn read_tags_from_bytes(path_hint: &str, data: &[u8]) -> Result<TagInfo, MetadataError> {
    let mut probe = Probe::new(Cursor::new(data)).guess_file_type()?;
    if probe.file_type().is_none() {
        let from_hint = path_hint
            .rsplit_once('.')
            .and_then(|(_, ext)| FileType::from_ext(ext));
        match from_hint {
            Some(file_type) => probe = probe.set_file_type(file_type),
            None => return Err(MetadataError::UnknownFormat(path_hint.to_string())),
        }
    }
    let tagged_file = probe.read()?;
    let properties = tagged_file.properties();

    let mut info = TagInfo::default();

    let duration_ms = properties.duration().as_millis();
    if duration_ms > 0 {
        info.duration_ms = Some(duration_ms.min(u128::from(u32::MAX)) as u32);
    }
    info.bitrate = properties.audio_bitrate().or(properties.overall_bitrate());

    if let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
        let text = |key: &ItemKey| tag.get_string(key).and_then(non_empty);
        info.title = text(&ItemKey::TrackTitle);
        info.artist = text(&ItemKey::TrackArtist);
        info.album_artist = text(&ItemKey::AlbumArtist);
        info.album = text(&ItemKey::AlbumTitle);
        info.genre = text(&ItemKey::Genre);
        info.track_no = tag.get_string(&ItemKey::TrackNumber).and_then(parse_u16);
        info.disc_no = tag.get_string(&ItemKey::DiscNumber).and_then(parse_u16);
        info.year = tag
            .get_string(&ItemKey::Year)
            .or_else(|| tag.get_string(&ItemKey::RecordingDate))
            .and_then(parse_year);
        info.brainz_id =
            text(&ItemKey::MusicBrainzRecordingId).or_else(|| text(&ItemKey::MusicBrainzTrackId));
        info.album_brainz_id = text(&ItemKey::MusicBrainzReleaseId);
    }

    Ok(info)
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn parse_u16(text: &str) -> Option<u16> {
    let head = text.split('/').next().unwrap_or(text).trim();
    head.parse().ok()
}

pub fn parse_year(text: &str) -> Option<i32> {
    let mut digits = String::new();
    for ch in text.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
            if digits.len() == 4 {
                break;
            }
        } else if !digits.is_empty() {
            break;
        }
    }
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}
