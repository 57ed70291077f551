use axum::extract::Query;
use axum::response::Response;
use library::Page;

use super::subsonic::missing_param;

/// Query parameters in request order. Repeated keys are kept.
#[derive(Debug, Default, Clone)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn int(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|value| value.trim().parse().ok())
    }

    /// Non-empty trimmed value of `key`.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|value| !value.is_empty())
    }

    pub fn year(&self, key: &str) -> Option<i32> {
        self.get(key).and_then(|value| value.trim().parse().ok())
    }

    /// `offset_key`/`size_key` as a page, with the size defaulted and capped.
    pub fn page(&self, offset_key: &str, size_key: &str, default: usize, max: usize) -> Page {
        let offset = self.int(offset_key).unwrap_or(0) as usize;
        let size = self.int(size_key).map_or(default, |size| size as usize);
        Page::new(offset, size.min(max))
    }

    /// First alias that is present wins, even if its value does not parse.
    pub fn first_int(&self, aliases: &[&str]) -> Option<u64> {
        let key = aliases.iter().find(|key| self.get(key).is_some())?;
        self.int(key)
    }

    /// Like `first_int`, but missing or malformed values become a
    /// missing-parameter error named after the first alias.
    pub fn require_int(&self, aliases: &[&str]) -> Result<u64, Response> {
        self.first_int(aliases)
            .ok_or_else(|| missing_param(aliases.first().copied().unwrap_or("id")))
    }
}

impl From<Query<Vec<(String, String)>>> for Params {
    fn from(Query(pairs): Query<Vec<(String, String)>>) -> Self {
        Self::new(pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Params {
        Params::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn first_present_alias_wins() {
        let p = params(&[("albumId", "7"), ("id", "3")]);
        assert_eq!(p.first_int(&["id", "albumId"]), Some(3));
        assert_eq!(p.first_int(&["albumId", "id"]), Some(7));
        assert_eq!(params(&[("albumId", "7")]).first_int(&["id", "albumId"]), Some(7));
    }

    #[test]
    fn malformed_first_alias_does_not_fall_through() {
        let p = params(&[("id", "abc"), ("albumId", "7")]);
        assert_eq!(p.first_int(&["id", "albumId"]), None);
        assert!(p.require_int(&["id", "albumId"]).is_err());
    }

    #[test]
    fn pages_default_and_cap_their_size() {
        let p = params(&[("songOffset", "20"), ("songCount", "9000"), ("albumCount", "x")]);
        assert_eq!(p.page("songOffset", "songCount", 20, 500), Page::new(20, 500));
        assert_eq!(p.page("albumOffset", "albumCount", 20, 500), Page::new(0, 20));
        assert_eq!(p.text("songOffset"), Some("20"));
        assert_eq!(params(&[("query", "  ")]).text("query"), None);
        assert_eq!(params(&[("fromYear", "1990")]).year("fromYear"), Some(1990));
    }

    #[test]
    fn repeated_keys_keep_the_first_value() {
        let p = params(&[("id", "1"), ("id", "2")]);
        assert_eq!(p.int("id"), Some(1));
        assert_eq!(p.get("missing"), None);
    }
}
