use std::path::PathBuf;

use clap::Parser;
use eyre::{Result, WrapErr};
use splice_backend::{Artifact, Deployer, Env};
use splice_utils::config::HarnessConfig;
use yansi::Paint;

/// CLI arguments for `splice blueprint`.
#[derive(Clone, Debug, Parser)]
pub struct BlueprintArgs {
    /// JSON artifact of the contract.
    #[arg(value_name = "ARTIFACT")]
    pub artifact: PathBuf,

    /// Hex-encoded preamble, possibly empty. Defaults to the configured one.
    #[arg(long)]
    pub preamble: Option<String>,
}

impl BlueprintArgs {
    pub fn run(self, config: HarnessConfig) -> Result<()> {
        let preamble = self
            .preamble
            .as_deref()
            .map(hex::decode)
            .transpose()
            .wrap_err("invalid preamble")?;

        let artifact = Artifact::load(&self.artifact)?;
        let mut env = Env::new(config);
        let blueprint = Deployer::new(artifact).deploy_as_blueprint(&mut env, preamble.as_deref())?;

        let code = env.get_code(blueprint.address)?;
        println!("deployed {}", blueprint.green());
        println!("code: {}", hex::encode_prefixed(&code).dim());
        Ok(())
    }
}
