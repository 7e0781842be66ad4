use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

static CLOCK_START: Lazy<Instant> = Lazy::new(Instant::now);

/// Minimum spacing between log lines from a single call site.
pub(crate) const LOG_INTERVAL_MS: u64 = 1_000;

/// At-most-once-per-interval gate for a log call site. A slot value of zero
/// means the site has never logged.
pub(crate) fn log_permitted(slot: &AtomicU64, interval_ms: u64) -> bool {
    let now = CLOCK_START.elapsed().as_millis() as u64 + 1;
    let last = slot.load(Ordering::Relaxed);
    if last != 0 && now.saturating_sub(last) < interval_ms {
        return false;
    }
    slot.compare_exchange(last, now, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
}

/// Rate-limited wrapper around a `tracing` statement, for drop paths that
/// untrusted traffic can hit at line rate.
macro_rules! log_limited {
    ($($log:tt)*) => {{
        static SLOT: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
        if crate::util::log_permitted(&SLOT, crate::util::LOG_INTERVAL_MS) {
            $($log)*
        }
    }};
}
pub(crate) use log_limited;
