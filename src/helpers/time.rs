use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::Instant;

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

pub fn get_instant() -> Instant {
    Instant::now()
}

/// Instant used to mark a credential as expired regardless of the clock.
pub fn far_past() -> DateTime<Utc> {
    DateTime::<Utc>::MIN_UTC
}

/// Local expiry for a credential issued at `issued_at` with the upstream `expires_in`.
///
/// The safety buffer is subtracted from the declared lifetime, but never takes
/// more than half of it: the credential keeps at least `expires_in / 2` seconds
/// (and at least one second), so it is never born expired.
pub fn compute_valid_until(
    issued_at: DateTime<Utc>,
    expires_in_seconds: u64,
    safety_buffer_seconds: u64,
) -> DateTime<Utc> {
    let lifetime = expires_in_seconds
        .saturating_sub(safety_buffer_seconds)
        .max(expires_in_seconds / 2)
        .max(1);
    let lifetime = i64::try_from(lifetime).unwrap_or(i64::MAX);
    let lifetime = TimeDelta::try_seconds(lifetime).unwrap_or(TimeDelta::MAX);
    issued_at
        .checked_add_signed(lifetime)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
