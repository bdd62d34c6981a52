//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop and server hosts.
//!
//! ## Overview
//!
//! This crate provides production-ready implementations of the bridge traits:
//! - `ObjectStoreStorage` using `object_store` (S3-compatible endpoints, or an
//!   in-memory store for tests)
//! - `TerminalConfirmation` / `TerminalSelector` using `dialoguer` prompts on
//!   the terminal
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ObjectStoreStorage, S3Options};
//! use bridge_traits::ObjectStorage;
//!
//! #[tokio::main]
//! async fn main() {
//!     let storage = ObjectStoreStorage::s3(&S3Options {
//!         endpoint: "https://example.r2.cloudflarestorage.com".into(),
//!         region: "auto".into(),
//!         bucket: "archive".into(),
//!         access_key_id: "key".into(),
//!         secret_access_key: "secret".into(),
//!     })
//!     .unwrap();
//!
//!     let page = storage.list("series/", Some("/"), None).await.unwrap();
//! }
//! ```

mod object_storage;
mod prompt;

pub use object_storage::{ObjectStoreStorage, S3Options};
pub use prompt::{TerminalConfirmation, TerminalSelector};
