//! Impl-side frame flow over the pending and active layer trees.
//!
//! [`LayerTreeHostImpl`] takes commits into the pending tree, runs the
//! [`CommitPipeline`] phases, activates once every required tile is ready and
//! draws the active tree. [`FrameScheduler`] decides which of those steps a
//! frame runs.

mod error;
mod host;
mod pipeline;
mod scheduler;

pub use error::HostError;
pub use host::{DrawFrame, LayerTreeHostImpl};
pub use layers::{LayerDrawProperties, TreeState};
pub use pipeline::{CommitPipeline, PrioritiesUpdated, ReadyToActivate, TilingsManaged};
pub use scheduler::{
    FrameScheduler, FrameSchedulerConfig, FrameSchedulerDecision, FrameSchedulerInput,
    SchedulerAction, SchedulerUpdateReason,
};
