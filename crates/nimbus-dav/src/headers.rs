//! Response header extraction
//!
//! The server reports the new content revision in `OC-ETag` (falling back
//! to the standard `ETag`), the server-assigned identifier in `OC-FileId`,
//! and timestamps in HTTP-date format.

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, DATE, ETAG, LAST_MODIFIED};
use reqwest::StatusCode;
use tracing::warn;

use nimbus_core::domain::newtypes::{ItemId, VersionToken};
use nimbus_core::ports::TransportResponse;

pub const OC_ETAG: &str = "oc-etag";
pub const OC_FILE_ID: &str = "oc-fileid";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Version token from `OC-ETag`, else `ETag`, unquoted
pub fn version_token(headers: &HeaderMap) -> Option<VersionToken> {
    let raw = header_str(headers, OC_ETAG).or_else(|| header_str(headers, ETAG.as_str()))?;
    match VersionToken::new(raw.to_string()) {
        Ok(token) => Some(token),
        Err(e) => {
            warn!(value = raw, error = %e, "Ignoring unusable ETag header");
            None
        }
    }
}

/// Server-assigned identifier from `OC-FileId`
pub fn file_id(headers: &HeaderMap) -> Option<ItemId> {
    let raw = header_str(headers, OC_FILE_ID)?;
    let raw = raw.trim_matches('"');
    match ItemId::new(raw.to_string()) {
        Ok(id) => Some(id),
        Err(e) => {
            warn!(value = raw, error = %e, "Ignoring unusable OC-FileId header");
            None
        }
    }
}

/// Parses an HTTP-date header
pub fn http_date(headers: &HeaderMap, name: &str) -> Option<DateTime<Utc>> {
    let raw = header_str(headers, name)?;
    httpdate::parse_http_date(raw)
        .map(DateTime::<Utc>::from)
        .ok()
}

/// Collects the normalized response metadata
pub fn response_metadata(status: StatusCode, headers: &HeaderMap, bytes: u64) -> TransportResponse {
    TransportResponse {
        status: status.as_u16(),
        version_token: version_token(headers),
        file_id: file_id(headers),
        date: http_date(headers, DATE.as_str()),
        last_modified: http_date(headers, LAST_MODIFIED.as_str()),
        bytes,
    }
}
