//! # fsguard-core
//!
//! Resilience layer for filesystem calls:
//! - Retry policy that classifies transient OS errors (EAGAIN, EMFILE, EBUSY)
//!   and backs off linearly between attempts
//! - Blocking and managed (async) retry executors
//! - Admission controller capping how many managed operations run at once,
//!   with a FIFO queue for the rest
//! - [`Engine`], which ties the above together, and the filesystem
//!   primitives dispatched through it
//! - Configuration loading (`fsguard.yaml` plus `FSGUARD_*` overrides)

pub mod admission;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod retry;

pub use admission::{AdmissionController, PendingResult};
pub use config::{ConfigLoader, EngineConfig};
pub use dispatch::{ExecutorKind, FsHandle, Primitive};
pub use engine::{Engine, EngineBuilder};
pub use error::{Error, Result};
