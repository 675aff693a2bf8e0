//! # fsguard
//!
//! Everyday filesystem helpers built on [`fsguard_core::Engine`]. Every call
//! goes through the engine's dispatch surface, so it is admission-controlled
//! and retried on transient errors.

pub mod error;
pub mod helpers;

pub use error::{Error, Result};
pub use fsguard_core::{Engine, EngineConfig};
