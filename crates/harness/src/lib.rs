pub mod editor;
pub mod flaky;

pub use editor::{Editor, category, page, same, sections, tenant};
pub use flaky::FlakyStore;

use tracing_subscriber::EnvFilter;

/// Install a `RUST_LOG`-driven subscriber once per test binary. Later calls
/// are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
