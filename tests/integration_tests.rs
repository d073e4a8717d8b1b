//! Integration tests for the assembled router

#[path = "integration/helpers.rs"]
mod helpers;

#[path = "integration/alert_pipeline.rs"]
mod alert_pipeline;

#[path = "integration/service_requests.rs"]
mod service_requests;

#[path = "integration/scheduler_turns.rs"]
mod scheduler_turns;
