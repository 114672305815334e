//! Polling-Station Check-in Queue and Token Rotation
//!
//! Admits physically present voters into the voting process, tracks each
//! voter's lifecycle at one station, protects the admission channel with a
//! rotating one-time token, and reconciles local queue state against the
//! authoritative election backend.

pub mod backend;
pub mod config;
pub mod errors;
pub mod station;
pub mod types;

// Re-export commonly used types
pub use errors::{AdmissionError, BackendError, Error, Result};
pub use station::{StationPanel, SyncOutcome};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the station panel with proper logging
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tps_panel=info".into()),
        )
        .init();

    tracing::info!("🗳️  Station panel v{} initialized", VERSION);
    Ok(())
}
