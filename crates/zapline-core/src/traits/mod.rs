// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter traits at the seams of the relay core.

mod storage;

pub use storage::{MessageStore, PhoneRegistry};
