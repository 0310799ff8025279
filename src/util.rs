//! Small shared utilities.

use std::sync::atomic::{AtomicI64, Ordering};

static LAST_MICROS: AtomicI64 = AtomicI64::new(0);

/// Current wall-clock time in microseconds, forced strictly increasing
/// within this process.
///
/// Two calls in the same microsecond still yield distinct, ordered values.
/// Used both for pending-action `since` keys (which must preserve insertion
/// order) and for placeholder review ids (microsecond epoch values sit far
/// above the server's small-integer id space, so the ranges never collide).
pub fn monotonic_micros() -> i64 {
  let now = chrono::Utc::now().timestamp_micros();
  let mut last = LAST_MICROS.load(Ordering::Relaxed);
  loop {
    let next = now.max(last + 1);
    match LAST_MICROS.compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed) {
      Ok(_) => return next,
      Err(observed) => last = observed,
    }
  }
}

/// Current wall-clock time as an ISO-8601 string.
///
/// Entity `updated_at` fields use this format throughout; ISO-8601 strings
/// compare lexicographically in chronological order.
pub fn now_iso() -> String {
  chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
