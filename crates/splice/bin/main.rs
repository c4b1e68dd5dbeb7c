#[macro_use]
extern crate tracing;

mod args;
mod cmd;
mod utils;

use args::{SpliceArgs, SpliceSubcommand};
use clap::Parser;
use eyre::Result;
use splice_utils::config::HarnessConfig;

fn main() -> Result<()> {
    utils::install_error_handler();
    utils::subscriber();
    utils::enable_paint();

    let opts = SpliceArgs::parse();
    let config = HarnessConfig::load_or_default(opts.config.as_deref())?;
    debug!(?config, "loaded config");

    match opts.cmd {
        SpliceSubcommand::Run(cmd) => cmd.run(config),
        SpliceSubcommand::Blueprint(cmd) => cmd.run(config),
    }
}
