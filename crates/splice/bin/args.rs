use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::cmd::{blueprint::BlueprintArgs, run::RunArgs};

/// Splice: deploy, call and evaluate snippets against EVM contracts.
#[derive(Parser, Debug)]
#[command(name = "splice", version, next_display_order = None)]
pub struct SpliceArgs {
    /// Config file. Defaults to `~/.splice/config.toml` when it exists.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: SpliceSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum SpliceSubcommand {
    /// Deploy (or attach to) a contract and call its functions.
    #[command(visible_alias = "r")]
    Run(RunArgs),

    /// Deploy the runtime code of a contract as a blueprint.
    #[command(visible_alias = "b")]
    Blueprint(BlueprintArgs),
}
