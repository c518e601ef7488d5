//! Scout core: pure job state machine and status view-model helpers.
mod effect;
mod msg;
mod site;
mod state;
mod update;
mod view_model;

pub use effect::Effect;
pub use msg::{Msg, RowOutcome};
pub use site::normalize_site_for_dedupe;
pub use state::{JobId, JobState, JobStats, JobStatus};
pub use update::update;
pub use view_model::{JobSnapshot, LOG_TAIL_LINES};
