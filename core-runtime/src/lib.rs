//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the archive tooling:
//! - Logging and tracing infrastructure
//! - Configuration management (builder and environment loading)
//! - Event bus for pipeline and reconcile progress
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that other modules depend on.
//! It establishes the logging conventions, configuration validation and event
//! broadcasting mechanisms used throughout the workspace.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{ArchiveConfig, CatalogSettings, PipelineSettings, StorageSettings};
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus};
