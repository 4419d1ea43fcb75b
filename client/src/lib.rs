//! Logic layer of the pocket-farm mini-app: farming sessions, task
//! claims, and score aggregation against a hosted realtime store. The
//! UI subscribes to store paths for display state and triggers the
//! orchestrated operations here; it never mutates the store directly.

pub mod claim;
pub mod config;
pub mod farming;
pub mod history;
pub mod membership;
pub mod score;
pub mod store;
pub mod watch;

/// Current wall-clock time in milliseconds, the `now_ms` every
/// projection and claim entry point takes.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Installs the diagnostic subscriber, filtered by `RUST_LOG`. Safe to
/// call more than once (later calls are no-ops).
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let _ = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
