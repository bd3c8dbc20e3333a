mod artifact_queries;
mod history_queries;
mod provenance_queries;
pub(super) mod types;

pub(super) use provenance_queries::downstream_ids;
