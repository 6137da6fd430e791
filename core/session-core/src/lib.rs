//! # crewclock-core
//!
//! Core library for Crewclock, providing the work-session state machine
//! shared by the kiosk daemon and any other client.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. The daemon provides the
//!   serialized executor and the 1 Hz tick.
//! - **Not thread-safe**: Callers provide their own synchronization; the
//!   intended shape is a single owning thread fed by a channel.
//! - **Nothing fatal**: Guarded operations return typed feedback values,
//!   never errors; malformed external input is ignored, not raised.
//! - **Event log is ground truth**: The worker ledger is fully derivable
//!   from the scan log by deterministic replay.

// Public modules
pub mod bonus;
pub mod config;
pub mod error;
pub mod events;
pub mod feedback;
pub mod ledger;
pub mod pause;
pub mod queue;
pub mod session;
pub mod store;
pub mod windows;

// Re-export commonly used items at crate root
pub use bonus::{BonusRevocation, BonusState};
pub use config::{ProcedureCodes, SessionConfig};
pub use error::{CoreError, Result};
pub use events::{EventLog, ProjectEvent, ProjectEventKind, ScanAction, ScanEvent};
pub use feedback::{
    EditFeedback, LunchFeedback, PauseFeedback, SaveFeedback, ScanFeedback, StartFeedback,
};
pub use ledger::{ClockState, Worker, WorkerLedger};
pub use pause::{Credential, PauseState, QcKind};
pub use queue::QueueItem;
pub use session::{ProjectInfo, Session, TickOutcome};
pub use store::{SessionSnapshot, SnapshotStore, SNAPSHOT_VERSION};
pub use windows::TimeWindow;
