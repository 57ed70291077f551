use std::io::Cursor;

use common::ROOT_RELPATH;
use reqwest::blocking::Client;
use reqwest::header::LAST_MODIFIED;
use reqwest::Url;
use serde::Deserialize;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;
use tracing::debug;

use super::{check_relpath, Entry, MusicDir, OpenedFile, WalkVisitor};
use crate::LibraryError;

/// Anonymous, path-style access to an S3-compatible bucket. Common
/// prefixes under the `/` delimiter are treated as directories.
pub struct S3Dir {
    client: Client,
    endpoint: Url,
    bucket: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListBucketResult {
    #[serde(default)]
    is_truncated: bool,
    #[serde(default)]
    next_continuation_token: Option<String>,
    #[serde(default)]
    contents: Vec<ListedObject>,
    #[serde(default)]
    common_prefixes: Vec<CommonPrefix>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListedObject {
    key: String,
    #[serde(default)]
    last_modified: String,
    #[serde(default)]
    size: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CommonPrefix {
    prefix: String,
}

impl S3Dir {
    /// Must not be called from inside an async runtime.
    pub fn new(endpoint: &str, bucket: &str) -> Result<Self, LibraryError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|err| LibraryError::Source(format!("bad endpoint {}: {}", endpoint, err)))?;
        Ok(Self {
            client: Client::builder().build()?,
            endpoint,
            bucket: bucket.to_string(),
        })
    }

    fn object_url(&self, key: &str) -> Result<Url, LibraryError> {
        let mut url = self.endpoint.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| LibraryError::Source(format!("bad endpoint {}", self.endpoint)))?;
            segments.pop_if_empty().push(&self.bucket);
            if !key.is_empty() {
                segments.extend(key.split('/'));
            }
        }
        Ok(url)
    }

    fn list(&self, prefix: &str) -> Result<(Vec<String>, Vec<ListedObject>), LibraryError> {
        let mut prefixes = Vec::new();
        let mut objects = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let mut url = self.object_url("")?;
            {
                let mut query = url.query_pairs_mut();
                query
                    .append_pair("list-type", "2")
                    .append_pair("delimiter", "/")
                    .append_pair("prefix", prefix);
                if let Some(token) = &token {
                    query.append_pair("continuation-token", token);
                }
            }
            let body = self.client.get(url).send()?.error_for_status()?.text()?;
            let page = parse_listing(&body)?;
            prefixes.extend(page.common_prefixes.into_iter().map(|p| p.prefix));
            objects.extend(page.contents);
            match page.next_continuation_token {
                Some(next) if page.is_truncated => token = Some(next),
                _ => break,
            }
        }
        Ok((prefixes, objects))
    }

    fn walk_prefix(&self, prefix: &str, visitor: &mut dyn WalkVisitor) -> Result<(), LibraryError> {
        let relpath = if prefix.is_empty() {
            ROOT_RELPATH.to_string()
        } else {
            prefix.trim_end_matches('/').to_string()
        };
        visitor.visit(&Entry {
            relpath: relpath.clone(),
            size: 0,
            modified: 0,
            is_dir: true,
        })?;

        let (prefixes, objects) = self.list(prefix)?;
        for sub in &prefixes {
            self.walk_prefix(sub, visitor)?;
        }
        for object in objects {
            // zero-byte "folder" marker objects
            if object.key == prefix || object.key.ends_with('/') {
                continue;
            }
            visitor.visit(&Entry {
                relpath: object.key,
                size: object.size,
                modified: parse_listing_time(&object.last_modified),
                is_dir: false,
            })?;
        }

        visitor.leave(&relpath)
    }
}

impl MusicDir for S3Dir {
    fn kind(&self) -> &'static str {
        "s3"
    }

    fn walk(&self, visitor: &mut dyn WalkVisitor) -> Result<(), LibraryError> {
        debug!(bucket = %self.bucket, endpoint = %self.endpoint, "listing bucket");
        self.walk_prefix("", visitor)
    }

    fn get_file(&self, relpath: &str) -> Result<OpenedFile, LibraryError> {
        check_relpath(relpath)?;
        let response = self
            .client
            .get(self.object_url(relpath)?)
            .send()?
            .error_for_status()?;
        let modified = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|value| value.to_str().ok())
            .map(parse_header_time)
            .unwrap_or(0);
        let data = response.bytes()?.to_vec();
        Ok(OpenedFile {
            modified,
            reader: Box::new(Cursor::new(data)),
        })
    }
}

fn parse_listing(body: &str) -> Result<ListBucketResult, LibraryError> {
    quick_xml::de::from_str(body)
        .map_err(|err| LibraryError::Source(format!("bad bucket listing: {}", err)))
}

fn parse_listing_time(text: &str) -> u64 {
    OffsetDateTime::parse(text, &Rfc3339)
        .map(|time| u64::try_from(time.unix_timestamp_nanos()).unwrap_or(0))
        .unwrap_or(0)
}

fn parse_header_time(text: &str) -> u64 {
    OffsetDateTime::parse(text, &Rfc2822)
        .map(|time| u64::try_from(time.unix_timestamp_nanos()).unwrap_or(0))
        .unwrap_or(0)
}
