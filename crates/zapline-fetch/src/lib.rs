// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Attachment ingestion for the Zapline message relay.
//!
//! [`fetcher::AttachmentFetcher`] downloads remote resources into local
//! storage under size/type/time constraints, degrading to a metadata-only
//! remote reference on failure. [`classifier`] is the pure extension /
//! content-type table backing category decisions.

pub mod classifier;
pub mod fetcher;

pub use fetcher::{AttachmentFetcher, AttachmentOutcome, FetchError, FetchRequest};
