use serde::{Deserialize, Serialize};

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_GENRE: &str = "Unknown Genre";

/// Relative path the hierarchical sources report for their root directory.
pub const ROOT_RELPATH: &str = ".";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: u64,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub id: u64,
    pub name: String,
    pub name_udec: String,
}

impl Artist {
    pub fn sort_name(&self) -> &str {
        sort_form(&self.name, &self.name_udec)
    }
}

/// One visited directory. Every directory becomes a row; the `tag_*`
/// fields are only filled for folders that directly contain audio.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: u64,
    pub left_path: String,
    pub right_path: String,
    pub right_path_udec: String,
    pub parent_id: Option<u64>,
    pub cover: Option<String>,
    /// Unix nanoseconds of the directory as last written.
    pub modified_at: u64,
    pub tag_title: String,
    pub tag_title_udec: String,
    pub tag_brainz_id: String,
    pub tag_year: Option<i32>,
    pub tag_artist_id: Option<u64>,
    pub tag_genre_id: Option<u64>,
}

impl Album {
    pub fn new(id: u64, relpath: &str) -> Self {
        let (left, right) = split_relpath(relpath);
        Self {
            id,
            left_path: left.to_string(),
            right_path: right.to_string(),
            ..Self::default()
        }
    }

    pub fn relpath(&self) -> String {
        format!("{}{}", self.left_path, self.right_path)
    }

    /// Directory name in its decoded form when it has one.
    pub fn folder_sort_name(&self) -> &str {
        sort_form(&self.right_path, &self.right_path_udec)
    }

    pub fn title_sort_name(&self) -> &str {
        sort_form(&self.tag_title, &self.tag_title_udec)
    }

    pub fn is_root(&self) -> bool {
        self.left_path.is_empty() && self.right_path == ROOT_RELPATH
    }

    /// Folders that received album tags from one of their tracks.
    pub fn has_tags(&self) -> bool {
        self.tag_artist_id.is_some()
    }

    pub fn cover_relpath(&self) -> Option<String> {
        self.cover
            .as_deref()
            .map(|cover| join_relpath(&self.relpath(), cover))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub id: u64,
    pub album_id: u64,
    pub filename: String,
    pub filename_udec: String,
    pub size: u64,
    /// Unix nanoseconds of the file as last read.
    pub modified_at: u64,
    pub artist_id: u64,
    pub genre_id: u64,
    pub tag_title: String,
    pub tag_title_udec: String,
    pub tag_track_artist: String,
    pub tag_track_number: Option<u16>,
    pub tag_disc_number: Option<u16>,
    pub tag_brainz_id: String,
    pub duration_ms: u32,
    pub bitrate: Option<u32>,
}

impl Track {
    pub fn extension(&self) -> Option<&str> {
        file_extension(&self.filename)
    }

    pub fn mime(&self) -> &'static str {
        self.extension()
            .and_then(audio_mime)
            .unwrap_or("application/octet-stream")
    }
}

/// Splits a slash separated relative path into its directory part (with
/// the trailing slash kept) and its final component.
pub fn split_relpath(relpath: &str) -> (&str, &str) {
    match relpath.rfind('/') {
        Some(idx) => (&relpath[..=idx], &relpath[idx + 1..]),
        None => ("", relpath),
    }
}

pub fn join_relpath(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() || dir == ROOT_RELPATH {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

pub fn file_extension(filename: &str) -> Option<&str> {
    let idx = filename.rfind('.')?;
    let ext = &filename[idx + 1..];
    if idx == 0 || ext.is_empty() {
        None
    } else {
        Some(ext)
    }
}

const AUDIO_TYPES: &[(&str, &str)] = &[
    ("mp3", "audio/mpeg"),
    ("flac", "audio/x-flac"),
    ("aac", "audio/x-aac"),
    ("m4a", "audio/m4a"),
    ("m4b", "audio/m4b"),
    ("ogg", "audio/ogg"),
    ("opus", "audio/ogg"),
    ("oga", "audio/ogg"),
    ("wma", "audio/x-ms-wma"),
    ("wav", "audio/x-wav"),
    ("wv", "audio/x-wavpack"),
];

pub fn audio_mime(ext: &str) -> Option<&'static str> {
    AUDIO_TYPES
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(ext))
        .map(|(_, mime)| *mime)
}

const COVER_STEMS: &[&str] = &["cover", "folder", "album", "front"];
const COVER_EXTS: &[&str] = &["png", "jpg", "jpeg"];

pub fn is_cover_filename(filename: &str) -> bool {
    let lower = filename.to_ascii_lowercase();
    let Some((stem, ext)) = lower.rsplit_once('.') else {
        return false;
    };
    COVER_STEMS.contains(&stem) && COVER_EXTS.contains(&ext)
}

/// Latin transliteration used for locale insensitive search, empty when
/// the input is already plain ASCII.
pub fn decoded(input: &str) -> String {
    let result = deunicode::deunicode(input);
    if result == input {
        String::new()
    } else {
        result
    }
}

/// The decoded form of a name for ordering and indexing, or the name itself
/// when it needed no decoding.
pub fn sort_form<'a>(name: &'a str, name_udec: &'a str) -> &'a str {
    if name_udec.is_empty() {
        name
    } else {
        name_udec
    }
}

/// Normalizes a search query: surrounding quotes and a trailing `*` are
/// dropped and the rest is lowercased. An empty needle matches everything.
pub fn search_needle(query: &str) -> String {
    query
        .trim()
        .trim_matches('"')
        .trim_end_matches('*')
        .trim()
        .to_lowercase()
}

/// Substring match of a lowercased needle against a name or its decoded form.
pub fn name_matches(needle: &str, name: &str, name_udec: &str) -> bool {
    name.to_lowercase().contains(needle)
        || (!name_udec.is_empty() && name_udec.to_lowercase().contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_relpaths_like_directory_listings() {
        assert_eq!(split_relpath("Artist A/Album X"), ("Artist A/", "Album X"));
        assert_eq!(split_relpath("Artist A"), ("", "Artist A"));
        assert_eq!(split_relpath("."), ("", "."));
    }

    #[test]
    fn album_relpath_round_trips_through_new() {
        let album = Album::new(7, "Artist A/Album X");
        assert_eq!(album.relpath(), "Artist A/Album X");
        assert!(!album.is_root());
        assert!(Album::new(1, ROOT_RELPATH).is_root());
    }

    #[test]
    fn joins_against_root_without_prefix() {
        assert_eq!(join_relpath(".", "song.mp3"), "song.mp3");
        assert_eq!(join_relpath("Artist A/", "Album X"), "Artist A/Album X");
        let mut album = Album::new(2, "Artist A/Album X");
        album.cover = Some("Cover.JPG".to_string());
        assert_eq!(
            album.cover_relpath().as_deref(),
            Some("Artist A/Album X/Cover.JPG")
        );
    }

    #[test]
    fn recognizes_all_cover_names_case_insensitively() {
        let mut count = 0;
        for stem in ["cover", "FOLDER", "Album", "front"] {
            for ext in ["png", "JPG", "jpeg"] {
                assert!(is_cover_filename(&format!("{}.{}", stem, ext)));
                count += 1;
            }
        }
        assert_eq!(count, 12);
        assert!(!is_cover_filename("cover.gif"));
        assert!(!is_cover_filename("back.jpg"));
        assert!(!is_cover_filename("cover"));
    }

    #[test]
    fn extension_lookup_ignores_case_and_dotfiles() {
        assert_eq!(file_extension("01 - Song.MP3"), Some("MP3"));
        assert_eq!(file_extension("README"), None);
        assert_eq!(file_extension(".hidden"), None);
        assert_eq!(audio_mime("MP3"), Some("audio/mpeg"));
        assert_eq!(audio_mime("txt"), None);
    }

    #[test]
    fn search_matches_either_form() {
        let needle = search_needle("  \"bjor*\" ");
        assert_eq!(needle, "bjor");
        assert!(name_matches(&needle, "Björk", "Bjork"));
        assert!(name_matches(&search_needle("BJÖ"), "Björk", "Bjork"));
        assert!(!name_matches(&needle, "Sigur Rós", "Sigur Ros"));
        assert!(name_matches("", "anything", ""));
    }

    #[test]
    fn sort_form_prefers_decoded_names() {
        let artist = Artist {
            id: 1,
            name: "Ørsted".to_string(),
            name_udec: decoded("Ørsted"),
        };
        assert_eq!(artist.sort_name(), "Orsted");
        assert_eq!(sort_form("Nena", ""), "Nena");
    }

    #[test]
    fn decoded_is_empty_for_ascii() {
        assert_eq!(decoded("Bjork"), "");
        assert_eq!(decoded("Björk"), "Bjork");
    }
}
