//! Row structs for the `jobs` and `job_events` tables.

pub mod job;
pub mod job_event;
