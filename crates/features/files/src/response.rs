//! Response assembly for streamed file reads.

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use fgate_storage::{FileStream, ReadStatus};

/// How the client should present a downloaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    Attachment,
    Inline,
}

impl Disposition {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Attachment => "attachment",
            Self::Inline => "inline",
        }
    }
}

/// Turns an opened read into a `200`/`206` streaming response.
pub(crate) fn file_response(read: FileStream, disposition: Disposition) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(read.content_length));
    if let Ok(value) = HeaderValue::from_str(read.content_type.as_ref()) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&httpdate::fmt_http_date(read.modified)) {
        headers.insert(header::LAST_MODIFIED, value);
    }
    if let Some(value) = read.content_range().and_then(|range| HeaderValue::from_str(&range).ok()) {
        headers.insert(header::CONTENT_RANGE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&content_disposition(disposition, &read.name)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    let status = match read.status {
        ReadStatus::Full => StatusCode::OK,
        ReadStatus::Partial => StatusCode::PARTIAL_CONTENT,
    };

    (status, headers, Body::from_stream(read.body)).into_response()
}

/// `attachment; filename="..."; filename*=UTF-8''...` with an ASCII fallback name.
fn content_disposition(disposition: Disposition, name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|c| if c.is_ascii_graphic() && c != '"' && c != '\\' || c == ' ' { c } else { '_' })
        .collect();
    format!("{}; filename=\"{fallback}\"; filename*=UTF-8''{}", disposition.as_str(), encode_ext_value(name))
}

/// Percent-encodes everything outside the RFC 5987 `attr-char` set.
fn encode_ext_value(value: &str) -> String {
    const ATTR_CHARS: &[u8] = b"!#$&+-.^_`|~";
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || ATTR_CHARS.contains(&byte) {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}
