//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the playback core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! Every other core crate depends on this one for its configuration values,
//! its logging conventions and the broadcast channel used to publish domain
//! events to the host.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder};
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus};
