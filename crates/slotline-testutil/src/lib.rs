//! Test helpers for slotline.
//!
//! - [`EventLog`]: records when probe jobs start and finish, in global order
//! - [`Gate`]: holds jobs inside their body until the test opens it
//! - [`random_delays`]: reproducible per-job sleep durations
//! - [`init_tracing`]: `RUST_LOG`-driven subscriber that writes to test output

mod gate;
mod probe;

pub use gate::Gate;
pub use probe::{Event, EventLog};

use std::sync::Once;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a tracing subscriber once per test binary.
///
/// Respects `RUST_LOG`; silent by default.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_test_writer())
            .with(EnvFilter::from_default_env())
            .try_init();
    });
}

/// `count` delays between 1 and `max_ms` milliseconds, reproducible per seed.
pub fn random_delays(count: usize, seed: u64, max_ms: u64) -> Vec<Duration> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| Duration::from_millis(rng.gen_range(1..=max_ms.max(1))))
        .collect()
}
