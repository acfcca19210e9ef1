//! Jittered delays for idle backoff and inter-job pacing.

use std::time::Duration;

use rand::Rng;

/// Jitter ratio applied to the idle backoff (±15%).
pub const IDLE_JITTER_RATIO: f64 = 0.15;

/// Jitter ratio applied to the pause between jobs (±50%).
pub const PACE_JITTER_RATIO: f64 = 0.5;

/// Sample a delay uniformly within `nominal × (1 ± ratio)`, floored at zero.
///
/// Independent workers that go idle together drift apart instead of
/// polling the queue in lockstep.
pub fn jitter(nominal: Duration, ratio: f64) -> Duration {
    jitter_with(&mut rand::rng(), nominal, ratio)
}

/// [`jitter`] with a caller-supplied random source.
pub fn jitter_with<R: Rng>(rng: &mut R, nominal: Duration, ratio: f64) -> Duration {
    let ratio = if ratio.is_finite() { ratio.abs() } else { 0.0 };
    let nominal_ns = u64::try_from(nominal.as_nanos()).unwrap_or(u64::MAX);
    if nominal_ns == 0 || ratio == 0.0 {
        return nominal;
    }

    // Truncating the spread keeps samples inside the advertised bounds.
    let spread = (nominal_ns as f64 * ratio) as u64;
    let low = nominal_ns.saturating_sub(spread);
    let high = nominal_ns.saturating_add(spread);
    Duration::from_nanos(rng.random_range(low..=high))
}
