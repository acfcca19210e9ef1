//! Deterministic idempotency keys for lifecycle events.

/// Build the key identifying one logical event occurrence.
///
/// `{job_id}:{event_type}:{attempt}` with `:{seq}` appended for events
/// that repeat within an attempt (heartbeats).
pub fn idempotency_key(job_id: &str, event_type: &str, attempt: i32, seq: Option<u64>) -> String {
    match seq {
        Some(seq) => format!("{job_id}:{event_type}:{attempt}:{seq}"),
        None => format!("{job_id}:{event_type}:{attempt}"),
    }
}
