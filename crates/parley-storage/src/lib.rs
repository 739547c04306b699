// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Parley dialogue engine.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! connection via `tokio-rusqlite`, the session and vector store
//! implementations, and the per-session lock gateway.

pub mod adapter;
pub mod database;
pub mod gateway;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::Database;
pub use gateway::{SessionGateway, SessionGuard};
