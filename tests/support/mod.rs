use std::sync::Once;

static INIT: Once = Once::new();

/// Installs a `tracing` subscriber the first time it's called, so the
/// `trace!`/`debug!` events this crate emits around blocking and timeout
/// transitions are visible with `RUST_LOG=uth_sync=trace cargo test`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt::try_init();
    });
}
