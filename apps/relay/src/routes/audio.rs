//! Audio file transfer route handlers
//!
//! - `GET /get-audio?title=<file>` - Send a track from the library
//! - `HEAD /get-audio?title=<file>` - File metadata without body
//!
//! Only the final path component of `title` is used, so a request can never
//! name anything outside the library directory. Range, ETag and
//! Last-Modified handling follows RFC 7232/7233.

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tokio_util::io::ReaderStream;

use crate::error::{ApiError, ApiResult};

const CACHE_CONTROL_VALUE: &str = "private, max-age=3600";

#[derive(Debug, Deserialize, Default)]
pub struct AudioQuery {
    pub title: Option<String>,
}

/// Shared state for the audio handlers
#[derive(Debug, Clone)]
pub struct AudioState {
    /// Base path to the music library
    pub music_library_path: PathBuf,
}

impl AudioState {
    pub fn new(music_library_path: impl Into<PathBuf>) -> Self {
        Self {
            music_library_path: music_library_path.into(),
        }
    }
}

/// Create the audio router (`GET|HEAD /get-audio`)
pub fn audio_router(state: AudioState) -> Router {
    Router::new()
        .route("/get-audio", get(get_audio))
        .with_state(state)
}

/// Send an audio file
///
/// # Response
/// - 200 OK: Full file
/// - 206 Partial Content: Requested byte range
/// - 304 Not Modified: Cache is still valid
/// - 400 Bad Request: Missing or unusable title
/// - 403 Forbidden: Resolved path escapes the library
/// - 404 Not Found: No such file
/// - 416 Range Not Satisfiable: Malformed range, or range starts past the end
///   of the file
///
/// HEAD requests are routed here too; the body is never opened for them.
async fn get_audio(
    State(state): State<AudioState>,
    method: Method,
    Query(query): Query<AudioQuery>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let title = query
        .title
        .filter(|t| !t.is_empty())
        .ok_or(ApiError::MissingField("title"))?;

    let file_name = sanitize_file_name(&title)?;
    let file_path = validate_file_path(file_name, &state.music_library_path).await?;

    let metadata = tokio::fs::metadata(&file_path).await.map_err(|e| {
        tracing::error!(error = %e, path = %file_path.display(), "Failed to read audio file metadata");
        ApiError::AudioFileNotFound(file_name.to_string())
    })?;
    if !metadata.is_file() {
        return Err(ApiError::AudioFileNotFound(file_name.to_string()));
    }

    let file_size = metadata.len();
    let content_type = content_type_for_path(&file_path);

    let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    let etag = generate_etag(file_size, modified);
    let last_modified = format_http_date(modified);

    let response = Response::builder()
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::ETAG, &etag)
        .header(header::LAST_MODIFIED, &last_modified)
        .header(header::CACHE_CONTROL, CACHE_CONTROL_VALUE);

    if is_cache_valid(&headers, &etag, modified) {
        return Ok(response
            .status(StatusCode::NOT_MODIFIED)
            .body(Body::empty())
            .expect("Failed to build response"));
    }

    let range = headers
        .get(header::RANGE)
        .and_then(|h| h.to_str().ok())
        .map(|range| parse_range_header(range, file_size))
        .transpose()?;

    let (status, start, content_length, response) = match range {
        Some((start, end)) => (
            StatusCode::PARTIAL_CONTENT,
            start,
            end - start + 1,
            response.header(
                header::CONTENT_RANGE,
                format!("bytes {}-{}/{}", start, end, file_size),
            ),
        ),
        None => (StatusCode::OK, 0, file_size, response),
    };

    let response = response
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, content_length);

    if method == Method::HEAD {
        return Ok(response.body(Body::empty()).expect("Failed to build response"));
    }

    let mut file = File::open(&file_path).await.map_err(|e| {
        tracing::error!(error = %e, path = %file_path.display(), "Failed to open audio file");
        ApiError::AudioFileNotFound(file_name.to_string())
    })?;

    if start > 0 {
        file.seek(SeekFrom::Start(start))
            .await
            .map_err(|e| ApiError::AudioProcessing(format!("Failed to seek: {}", e)))?;
    }

    tracing::debug!(
        file = %file_name,
        start,
        length = content_length,
        "Sending audio file"
    );

    let body = Body::from_stream(ReaderStream::new(file.take(content_length)));
    Ok(response.body(body).expect("Failed to build response"))
}

/// Reduce a requested title to a bare file name
///
/// Keeps only the last component, splitting on both `/` and `\`. Trailing
/// separators are ignored. Fails when nothing usable remains.
pub fn sanitize_file_name(title: &str) -> ApiResult<&str> {
    let name = title
        .split(|c: char| c == '/' || c == '\\')
        .filter(|part| !part.is_empty())
        .next_back()
        .unwrap_or("");

    match name {
        "" | "." | ".." => Err(ApiError::InvalidQueryParam {
            name: "title",
            reason: "must name a file".to_string(),
        }),
        name => Ok(name),
    }
}

/// Get the Content-Type MIME type for a file from its extension
pub fn content_type_for_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("flac") => "audio/flac",
        Some("aac") => "audio/aac",
        Some("m4a") => "audio/mp4",
        Some("opus") => "audio/opus",
        Some("ogg") | Some("oga") => "audio/ogg",
        Some("wav") => "audio/wav",
        Some("txt") => "text/plain; charset=utf-8",
        Some("json") => "application/json",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

/// Parse HTTP Range header according to RFC 7233
///
/// Supports formats:
/// - `bytes=START-END` (specific range)
/// - `bytes=START-` (from start to end of file)
/// - `bytes=-SUFFIX` (last N bytes)
fn parse_range_header(range_header: &str, file_size: u64) -> ApiResult<(u64, u64)> {
    let range_spec = range_header
        .trim()
        .strip_prefix("bytes=")
        .ok_or_else(|| ApiError::InvalidRange("Invalid range unit".to_string()))?;

    // Single ranges only
    if range_spec.contains(',') {
        return Err(ApiError::InvalidRange(
            "Multiple ranges not supported".to_string(),
        ));
    }

    let (first, last) = range_spec
        .split_once('-')
        .ok_or_else(|| ApiError::InvalidRange("Invalid range format".to_string()))?;
    let (first, last) = (first.trim(), last.trim());

    let parse = |value: &str, what: &str| {
        value
            .parse::<u64>()
            .map_err(|_| ApiError::InvalidRange(format!("Invalid {}", what)))
    };

    let (start, end) = match (first.is_empty(), last.is_empty()) {
        // bytes=500-999
        (false, false) => (parse(first, "start position")?, parse(last, "end position")?),
        // bytes=500-
        (false, true) => (parse(first, "start position")?, file_size.saturating_sub(1)),
        // bytes=-500
        (true, false) => {
            let suffix_length = parse(last, "suffix length")?;
            if suffix_length == 0 {
                return Err(ApiError::RangeNotSatisfiable { file_size });
            }
            (file_size.saturating_sub(suffix_length), file_size.saturating_sub(1))
        }
        (true, true) => return Err(ApiError::InvalidRange("Empty range".to_string())),
    };

    if start >= file_size {
        return Err(ApiError::RangeNotSatisfiable { file_size });
    }

    let end = end.min(file_size - 1);
    if start > end {
        return Err(ApiError::InvalidRange(
            "Start position greater than end".to_string(),
        ));
    }

    Ok((start, end))
}

/// ETag from file size and modification time: `"{size}-{mtime_secs}"`
fn generate_etag(file_size: u64, modified: SystemTime) -> String {
    let mtime_secs = modified
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("\"{}-{}\"", file_size, mtime_secs)
}

fn format_http_date(time: SystemTime) -> String {
    httpdate::fmt_http_date(time)
}

/// Check if the client's cached version is still valid
fn is_cache_valid(headers: &HeaderMap, etag: &str, modified: SystemTime) -> bool {
    // If-None-Match takes precedence over If-Modified-Since (RFC 7232)
    if let Some(value) = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
    {
        let etag = etag.strip_prefix("W/").unwrap_or(etag);
        return value.split(',').any(|v| {
            let v = v.trim();
            v == "*" || v.strip_prefix("W/").unwrap_or(v) == etag
        });
    }

    let Some(since) = headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| httpdate::parse_http_date(v).ok())
    else {
        return false;
    };

    // Future dates never validate
    if since > SystemTime::now() {
        return false;
    }

    // HTTP dates have second precision
    match modified.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(d) => SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(d.as_secs()) <= since,
        Err(_) => false,
    }
}

/// Resolve `file_name` inside the library and verify it stays there
///
/// Canonicalizes both paths so symlinks pointing outside the library are
/// refused. Runs on the blocking pool.
async fn validate_file_path(file_name: &str, music_library_path: &Path) -> ApiResult<PathBuf> {
    let file_name = file_name.to_string();
    let library = music_library_path.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let canonical = library.join(&file_name).canonicalize().map_err(|_| {
            tracing::debug!(file = %file_name, "Audio file not found or inaccessible");
            ApiError::AudioFileNotFound(file_name.clone())
        })?;

        let canonical_library = library.canonicalize().map_err(|e| {
            tracing::error!(error = %e, path = %library.display(), "Invalid music library path");
            ApiError::Configuration(format!("Invalid music library path: {}", e))
        })?;

        if !canonical.starts_with(&canonical_library) {
            tracing::warn!(
                file = %file_name,
                canonical = %canonical.display(),
                library = %canonical_library.display(),
                "Path escapes the music library"
            );
            return Err(ApiError::Forbidden("Access denied".to_string()));
        }

        Ok(canonical)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Path validation task failed: {}", e)))?
}
