// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Remote attachment fetching with size, type, and time limits.
//!
//! The fetcher downloads a remote resource into local storage, or reports a
//! structured failure that still carries whatever metadata the caller
//! supplied. It never decides message fate: the orchestrator degrades a
//! failed fetch into a metadata-only remote reference.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use zapline_config::AttachmentConfig;
use zapline_core::error::ZaplineError;
use zapline_core::types::{AttachmentKind, AttachmentReference, DEFAULT_ATTACHMENT_NAME};

use crate::classifier;

/// Caller-supplied description of an attachment to resolve.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Source URL (remote, or already under the local prefix).
    pub url: String,
    /// Caller-supplied display name.
    pub name: Option<String>,
    /// Caller-supplied category hint.
    pub kind_hint: Option<AttachmentKind>,
    /// Caller-supplied byte size hint.
    pub size_hint: Option<u64>,
}

/// Why a remote fetch did not produce a local copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchError {
    /// The fetch deadline elapsed.
    Timeout,
    /// Declared or streamed size exceeded the ceiling.
    TooLarge,
    /// Resolved category is not in the allowed set.
    TypeRejected,
    /// Connection failure or non-success HTTP response.
    Transport,
}

impl FetchError {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchError::Timeout => "timeout",
            FetchError::TooLarge => "too_large",
            FetchError::TypeRejected => "type_rejected",
            FetchError::Transport => "transport",
        }
    }
}

/// How an attachment reference was resolved.
///
/// An explicit variant rather than null-chaining: every caller handles the
/// degraded branch deliberately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentOutcome {
    /// Bytes were fetched into local storage.
    Downloaded,
    /// The URL already pointed at local storage; no network fetch occurred.
    AlreadyLocal,
    /// The fetch failed; the original remote URL was kept with defaulted
    /// metadata. A legitimate terminal outcome, not an error state.
    KeptRemote(FetchError),
}

/// Downloads remote attachments into local storage under configured limits.
#[derive(Debug, Clone)]
pub struct AttachmentFetcher {
    client: reqwest::Client,
    upload_dir: PathBuf,
    local_prefix: String,
    public_base_url: String,
    max_bytes: u64,
    timeout: Duration,
}

impl AttachmentFetcher {
    /// Builds a fetcher from the attachment config section.
    pub fn new(config: &AttachmentConfig, public_base_url: &str) -> Result<Self, ZaplineError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("zapline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ZaplineError::Internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            upload_dir: PathBuf::from(&config.upload_dir),
            local_prefix: config.local_prefix.clone(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            max_bytes: config.max_bytes,
            timeout: Duration::from_secs(config.fetch_timeout_secs),
        })
    }

    /// Overrides the fetch deadline (for tests exercising timeouts).
    #[cfg(test)]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The directory fetched files are stored under.
    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Resolves a durable attachment reference for the request.
    ///
    /// Never fails: a fetch failure degrades into a remote reference carrying
    /// the caller's metadata with gaps defaulted.
    pub async fn resolve(&self, request: FetchRequest) -> (AttachmentReference, AttachmentOutcome) {
        if request.url.starts_with(&self.local_prefix) {
            debug!(url = %request.url, "attachment already local, passing through");
            return (self.local_reference(&request).await, AttachmentOutcome::AlreadyLocal);
        }

        match self.fetch_remote(&request).await {
            Ok(reference) => {
                info!(name = %reference.name, size = ?reference.size, "attachment downloaded");
                (reference, AttachmentOutcome::Downloaded)
            }
            Err(reason) => {
                warn!(url = %request.url, reason = reason.as_str(), "attachment fetch failed, keeping remote URL");
                (self.fallback_reference(&request), AttachmentOutcome::KeptRemote(reason))
            }
        }
    }

    /// Builds the pass-through reference for an already-local URL.
    async fn local_reference(&self, request: &FetchRequest) -> AttachmentReference {
        let basename = request
            .url
            .rsplit('/')
            .next()
            .unwrap_or(DEFAULT_ATTACHMENT_NAME)
            .to_string();
        let name = request.name.clone().unwrap_or_else(|| basename.clone());
        let kind = request
            .kind_hint
            .unwrap_or_else(|| classifier::classify(&name, None));

        // Prefer the on-disk size when the file is present.
        let size = match tokio::fs::metadata(self.upload_dir.join(&basename)).await {
            Ok(meta) => Some(meta.len()),
            Err(_) => request.size_hint,
        };

        AttachmentReference {
            full_url: format!("{}{}", self.public_base_url, request.url),
            url: request.url.clone(),
            name,
            kind,
            size,
            downloaded: true,
        }
    }

    /// Builds the degraded reference kept when a fetch fails.
    fn fallback_reference(&self, request: &FetchRequest) -> AttachmentReference {
        let name = request
            .name
            .clone()
            .or_else(|| filename_from_url(&request.url))
            .unwrap_or_else(|| DEFAULT_ATTACHMENT_NAME.to_string());
        AttachmentReference {
            url: request.url.clone(),
            full_url: request.url.clone(),
            name,
            kind: request.kind_hint.unwrap_or_default(),
            size: request.size_hint,
            downloaded: false,
        }
    }

    /// Performs the bounded streaming download.
    ///
    /// One deadline spans connect and body transfer. The deadline is checked
    /// in-band at each stage so every failure path, including an elapsed
    /// deadline mid-stream, can remove the partially written file.
    async fn fetch_remote(&self, request: &FetchRequest) -> Result<AttachmentReference, FetchError> {
        let deadline = tokio::time::Instant::now() + self.timeout;

        tokio::fs::create_dir_all(&self.upload_dir)
            .await
            .map_err(|_| FetchError::Transport)?;

        let response = tokio::time::timeout_at(deadline, self.client.get(&request.url).send())
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else {
                    FetchError::Transport
                }
            })?;

        if !response.status().is_success() {
            return Err(FetchError::Transport);
        }

        // Reject before streaming when the server declares an oversized body.
        if let Some(declared) = response.content_length() {
            if declared > self.max_bytes {
                return Err(FetchError::TooLarge);
            }
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut filename = resolve_filename(request, &response, content_type.as_deref());

        // Category gate: the check happens only once a name is known, not
        // before download when unknowable from the URL alone.
        if !classifier::allowed_file(&filename) {
            match request.kind_hint {
                Some(kind) if kind != AttachmentKind::File => {
                    // Trust the caller's category and synthesize a safe name.
                    filename = format!(
                        "{}.{}",
                        DEFAULT_ATTACHMENT_NAME,
                        classifier::extension_for_kind(kind)
                    );
                }
                _ => return Err(FetchError::TypeRejected),
            }
        }

        let extension = classifier::extension_of(&filename).unwrap_or_else(|| "bin".to_string());
        let stored_name = format!(
            "{}_{}.{}",
            uuid::Uuid::new_v4().simple(),
            Utc::now().format("%Y%m%d_%H%M%S"),
            extension
        );
        let path = self.upload_dir.join(&stored_name);

        let written = match tokio::time::timeout_at(deadline, self.stream_to_file(response, &path))
            .await
        {
            Ok(Ok(written)) => written,
            Ok(Err(reason)) => {
                // Partial file from an aborted transfer.
                let _ = tokio::fs::remove_file(&path).await;
                return Err(reason);
            }
            Err(_) => {
                // Deadline elapsed mid-stream; same cleanup.
                let _ = tokio::fs::remove_file(&path).await;
                return Err(FetchError::Timeout);
            }
        };

        let url = format!("{}{}", self.local_prefix, stored_name);
        let kind = request
            .kind_hint
            .unwrap_or_else(|| classifier::classify(&filename, content_type.as_deref()));

        Ok(AttachmentReference {
            full_url: format!("{}{}", self.public_base_url, url),
            url,
            name: request.name.clone().unwrap_or(filename),
            kind,
            size: Some(written),
            downloaded: true,
        })
    }

    /// Streams the body to disk, aborting once the ceiling is crossed.
    async fn stream_to_file(
        &self,
        response: reqwest::Response,
        path: &Path,
    ) -> Result<u64, FetchError> {
        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|_| FetchError::Transport)?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else {
                    FetchError::Transport
                }
            })?;
            written += chunk.len() as u64;
            if written > self.max_bytes {
                return Err(FetchError::TooLarge);
            }
            file.write_all(&chunk)
                .await
                .map_err(|_| FetchError::Transport)?;
        }

        file.flush().await.map_err(|_| FetchError::Transport)?;
        Ok(written)
    }
}

/// Resolution order: caller-supplied name, then Content-Disposition, then the
/// URL basename, then an extension guessed from the content-type, then the
/// `attachment.bin` fallback.
fn resolve_filename(
    request: &FetchRequest,
    response: &reqwest::Response,
    content_type: Option<&str>,
) -> String {
    if let Some(name) = &request.name {
        return sanitize_filename(name);
    }

    if let Some(name) = response
        .headers()
        .get(reqwest::header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(filename_from_disposition)
    {
        return name;
    }

    if let Some(name) = filename_from_url(&request.url) {
        return name;
    }

    if let Some(ext) = content_type.and_then(classifier::extension_from_content_type) {
        return format!("{DEFAULT_ATTACHMENT_NAME}.{ext}");
    }

    format!("{DEFAULT_ATTACHMENT_NAME}.bin")
}

/// Pulls a `filename=` parameter out of a Content-Disposition header.
fn filename_from_disposition(header: &str) -> Option<String> {
    let (_, rest) = header.split_once("filename=")?;
    let raw = rest.split(';').next()?.trim().trim_matches(['"', '\'']);
    if raw.is_empty() {
        return None;
    }
    Some(sanitize_filename(raw))
}

/// Extracts a usable basename from a URL path, ignoring query and fragment.
fn filename_from_url(url: &str) -> Option<String> {
    let path = match reqwest::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        // Relative or unparseable URLs: strip query/fragment by hand.
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    let basename = path.rsplit('/').next()?;
    if basename.is_empty() || !basename.contains('.') {
        return None;
    }
    Some(sanitize_filename(basename))
}

/// Reduces a filename to a safe character set for storage and logging.
fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches(['.', '_']).to_string();
    if trimmed.is_empty() {
        DEFAULT_ATTACHMENT_NAME.to_string()
    } else {
        trimmed
    }
}
