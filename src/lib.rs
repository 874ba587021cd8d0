//! Library crate for recon-scan-rs: liveness checks, sequential TCP port
//! scans and HTTP verb probing, rendered into plain-text reports.
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod liveness;
pub mod ports;
pub mod report;
pub mod resolve;
pub mod scanner;
pub mod types;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{ReconError, Result};
