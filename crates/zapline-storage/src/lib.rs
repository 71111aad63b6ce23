// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage backends for the Zapline message relay.
//!
//! Currently in-memory only; the traits in `zapline-core` are the boundary a
//! relational backend would implement.

mod memory;

pub use memory::{InMemoryMessageStore, InMemoryPhoneRegistry};
