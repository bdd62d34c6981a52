//! # Host Bridge Traits
//!
//! Abstraction traits the archive core depends on but does not implement.
//!
//! ## Overview
//!
//! This crate defines the contract between the core crates and concrete
//! adapters. Each trait represents a capability that the core requires but that
//! hosts provide: a bucket, a way to ask the user a question, a clock.
//!
//! ## Traits
//!
//! ### Storage
//! - [`ObjectStorage`](storage::ObjectStorage) - Paginated listing and puts against a bucket
//!
//! ### Interaction
//! - [`OptionSelector`](prompt::OptionSelector) - Pick one of a labelled list or cancel
//! - [`ConfirmationPrompt`](prompt::ConfirmationPrompt) - Yes/no approval before mutations
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type.
//! Adapters convert their transport errors into
//! `BridgeError::StorageUnavailable` so callers can tell a dead endpoint apart
//! from a bad request.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds so a single client handle can
//! be shared by every concurrent volume job.

pub mod error;
pub mod prompt;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use prompt::{ConfirmationPrompt, DefaultSelector, FixedConfirmation, OptionSelector, Selection};
pub use storage::{ListPage, ObjectEntry, ObjectStorage};
pub use time::{Clock, FixedClock, LogLevel, SystemClock};
