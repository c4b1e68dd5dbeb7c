//! Process setup for the `splice` binary: error reporting, logging and terminal colors.

use std::{error::Error, fmt};

use eyre::EyreHandler;
use splice_backend::HarnessError;
use tracing_error::ErrorLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use yansi::Paint;

/// Level used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "warn";

/// Renders top-level errors. Contract faults print their full multi-frame report, anything else
/// prints its cause chain.
#[derive(Debug)]
struct Reporter;

impl EyreHandler for Reporter {
    fn debug(&self, error: &(dyn Error + 'static), f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            return fmt::Debug::fmt(error, f);
        }

        if let Some(report) = error.downcast_ref::<HarnessError>().and_then(HarnessError::report) {
            return write!(f, "\n{}", report.red());
        }

        write!(f, "\n{}", error.red())?;
        let mut causes = std::iter::successors(error.source(), |&e| e.source()).peekable();
        if causes.peek().is_some() {
            f.write_str("\n\nCaused by:")?;
            for cause in causes {
                write!(f, "\n  {}", cause.dim())?;
            }
        }
        Ok(())
    }
}

/// Installs the global eyre and panic hooks.
///
/// `SPLICE_DEBUG` in the environment swaps [`Reporter`] for color-eyre's verbose handler.
pub fn install_error_handler() {
    if std::env::var_os("SPLICE_DEBUG").is_some() {
        if let Err(e) = color_eyre::install() {
            warn!("failed to install color eyre error hook: {e}");
        }
        return;
    }

    let (panic_hook, _) = color_eyre::config::HookBuilder::default()
        .panic_section("This is a bug in splice. Rerun with SPLICE_DEBUG=1 and report it.")
        .into_hooks();
    panic_hook.install();
    if let Err(e) = eyre::set_hook(Box::new(|_| Box::new(Reporter))) {
        warn!("failed to install eyre error hook: {e}");
    }
}

/// Logs to stderr, filtered by `RUST_LOG`.
pub fn subscriber() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::Registry::default()
        .with(filter)
        .with(ErrorLayer::default())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init()
}

/// Colors output only on a live color terminal.
pub fn enable_paint() {
    let enable = yansi::Condition::os_support() && yansi::Condition::tty_and_color_live();
    yansi::whenever(yansi::Condition::cached(enable));
}
