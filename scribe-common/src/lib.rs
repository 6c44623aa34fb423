//! # Scribe Common Library
//!
//! Shared code for the Scribe services:
//! - Error and result types
//! - Job lifecycle events and the broadcast EventBus
//! - Configuration file discovery and loading
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
