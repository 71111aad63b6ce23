// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pure attachment type classification.
//!
//! Maps a filename (primarily the extension) and an optional transport
//! content-type to a coarse [`AttachmentKind`]. The extension table takes
//! precedence when both signals disagree: content-type headers from arbitrary
//! external senders are less trustworthy than a concrete filename.

use zapline_core::types::AttachmentKind;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "wmv", "webm"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "m4a", "aac"];
const DOCUMENT_EXTENSIONS: &[&str] = &["doc", "docx", "txt"];
const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "rar"];

/// Returns the lowercased extension of `filename`, if it has one.
pub fn extension_of(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Whether the filename's extension is in the storable set.
///
/// Archives (zip, rar) are storable but classify as plain `file`.
pub fn allowed_file(filename: &str) -> bool {
    let Some(ext) = extension_of(filename) else {
        return false;
    };
    let ext = ext.as_str();
    IMAGE_EXTENSIONS.contains(&ext)
        || VIDEO_EXTENSIONS.contains(&ext)
        || AUDIO_EXTENSIONS.contains(&ext)
        || DOCUMENT_EXTENSIONS.contains(&ext)
        || ARCHIVE_EXTENSIONS.contains(&ext)
        || ext == "pdf"
}

/// Classifies a filename and optional content-type into an [`AttachmentKind`].
///
/// Pure and deterministic: no I/O. The content-type is consulted only when
/// the extension is absent or matches nothing.
pub fn classify(filename: &str, content_type: Option<&str>) -> AttachmentKind {
    if let Some(ext) = extension_of(filename) {
        if let Some(kind) = classify_extension(&ext) {
            return kind;
        }
    }
    if let Some(kind) = content_type.and_then(classify_content_type) {
        return kind;
    }
    AttachmentKind::File
}

fn classify_extension(ext: &str) -> Option<AttachmentKind> {
    if IMAGE_EXTENSIONS.contains(&ext) {
        Some(AttachmentKind::Image)
    } else if VIDEO_EXTENSIONS.contains(&ext) {
        Some(AttachmentKind::Video)
    } else if AUDIO_EXTENSIONS.contains(&ext) {
        Some(AttachmentKind::Audio)
    } else if ext == "pdf" {
        Some(AttachmentKind::Pdf)
    } else if DOCUMENT_EXTENSIONS.contains(&ext) {
        Some(AttachmentKind::Document)
    } else {
        None
    }
}

fn classify_content_type(content_type: &str) -> Option<AttachmentKind> {
    // Strip any "; charset=..." parameters first.
    let essence = content_type.split(';').next().unwrap_or("").trim();
    if essence.starts_with("image/") {
        Some(AttachmentKind::Image)
    } else if essence.starts_with("video/") {
        Some(AttachmentKind::Video)
    } else if essence.starts_with("audio/") {
        Some(AttachmentKind::Audio)
    } else if essence == "application/pdf" {
        Some(AttachmentKind::Pdf)
    } else if essence == "text/plain" || essence == "application/msword" {
        Some(AttachmentKind::Document)
    } else {
        None
    }
}

/// A safe extension for a caller-supplied kind hint, used when a synthesized
/// filename is needed.
pub fn extension_for_kind(kind: AttachmentKind) -> &'static str {
    match kind {
        AttachmentKind::Image => "jpg",
        AttachmentKind::Video => "mp4",
        AttachmentKind::Audio => "mp3",
        AttachmentKind::Pdf => "pdf",
        AttachmentKind::Document => "doc",
        AttachmentKind::File => "bin",
    }
}

/// An extension guessed from a content-type, for unnamed downloads.
pub fn extension_from_content_type(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next().unwrap_or("").trim();
    match essence {
        "image/png" => Some("png"),
        "image/jpeg" => Some("jpg"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "video/mp4" => Some("mp4"),
        "video/webm" => Some("webm"),
        "audio/mpeg" => Some("mp3"),
        "audio/wav" => Some("wav"),
        "audio/ogg" => Some("ogg"),
        "application/pdf" => Some("pdf"),
        "text/plain" => Some("txt"),
        _ => None,
    }
}
