// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the Zapline relay: ingestion orchestrator, chat API
//! handlers, and the axum server wiring.

pub mod handlers;
pub mod ingest;
pub mod server;

pub use ingest::{IngestReceipt, IngestRequest, IngestionOrchestrator};
pub use server::{build_router, start_server, AppState};
