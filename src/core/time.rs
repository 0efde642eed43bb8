//! Simulation time configuration.
//!
//! The simulation advances in discrete integer time steps. `SimInfo`
//! carries the fixed-duration configuration the scheduler is initialized
//! with; validation happens in `Timer::initialize` so that a bad
//! configuration surfaces as an error rather than a panic.

use serde::{Deserialize, Serialize};

/// Static configuration for one simulation run.
///
/// `duration` is the number of time steps to execute. `y0`/`m0` anchor
/// step 0 to a calendar date for reporting purposes; `m0` must lie in
/// `[1, 12]`. `branch_time` supports forked simulations: when it is
/// non-negative the scheduler starts at that step instead of 0.
///
/// # Example
/// ```
/// use fuelcycle_simulator_core_rs::core::time::SimInfo;
///
/// let si = SimInfo::new(120);
/// assert_eq!(si.duration, 120);
/// assert_eq!(si.m0, 1);
/// assert_eq!(si.branch_time, -1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimInfo {
    /// Number of time steps in the simulation.
    pub duration: i32,

    /// Calendar year of time step 0.
    pub y0: i32,

    /// Calendar month of time step 0 (1-12).
    pub m0: u32,

    /// Free-form label for the run, carried into snapshots.
    pub handle: String,

    /// Step to resume from when branching off a parent simulation.
    /// Negative means "not a branch" and the run starts at step 0.
    pub branch_time: i32,
}

impl SimInfo {
    /// Configuration for a `duration`-step run starting January 2020,
    /// not branched from any parent.
    pub fn new(duration: i32) -> Self {
        Self {
            duration,
            y0: 2020,
            m0: 1,
            handle: String::new(),
            branch_time: -1,
        }
    }

    /// Same as [`SimInfo::new`] but resuming at `branch_time`.
    pub fn branched(duration: i32, branch_time: i32) -> Self {
        Self {
            branch_time,
            ..Self::new(duration)
        }
    }
}

impl Default for SimInfo {
    fn default() -> Self {
        Self::new(0)
    }
}
