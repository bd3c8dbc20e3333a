mod artifacts;
mod identifiers;
mod status;

pub use artifacts::ArtifactSpec;
pub use identifiers::{GoalHash, RunId};
pub use status::{ExecutionStatus, RunStatus};
