//! Time-stepped scheduling: the main loop, phase dispatch, and snapshots.

pub mod engine;
pub mod snapshot;

pub use engine::{SimulationError, Timer};
pub use snapshot::{compute_state_digest, snapshot, SimSnapshot};
