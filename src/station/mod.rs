//! Station-side check-in subsystem
//!
//! One panel instance per physical station owns the queue, the rotating
//! admission token and the observable event channels.

pub mod activity;
pub mod admission;
pub mod panel;
pub mod queue;
pub mod sync;
pub mod token;

// Re-export the panel surface
pub use activity::{
    ActivityFeed, ActivityLogEntry, HistoryKind, HistoryRecord, Notification, NotificationKind,
};
pub use admission::AdmissionHandler;
pub use panel::{RotationTicker, StationPanel, SyncService};
pub use queue::{CheckinQueue, QueueStats, TransitionOptions};
pub use sync::{ReconciliationClient, SyncOutcome};
pub use token::{AdmissionToken, RotationTrigger, RotatorStats, TokenRotator};
