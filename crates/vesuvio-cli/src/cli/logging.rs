use std::io::IsTerminal;
use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

static INITIALISED: OnceLock<()> = OnceLock::new();

/// Installs the stderr subscriber once per process. `RUST_LOG` wins over
/// `--verbose`; without either only warnings are shown.
pub(super) fn init_tracing(verbose: bool) {
    if INITIALISED.set(()).is_err() {
        return;
    }

    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr);

    // another subscriber (e.g. a test harness) may already be installed
    let _ = Registry::default().with(filter).with(fmt_layer).try_init();
}
