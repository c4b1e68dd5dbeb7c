use std::path::PathBuf;

use alloy_primitives::Address;
use clap::Parser;
use eyre::{bail, Result};
use splice_backend::{Artifact, ContractInstance, Deployer, Env, HarnessError};
use splice_utils::config::HarnessConfig;
use yansi::Paint;

use super::coerce_args;

/// CLI arguments for `splice run`.
#[derive(Clone, Debug, Parser)]
pub struct RunArgs {
    /// JSON artifact of the contract.
    #[arg(value_name = "ARTIFACT")]
    pub artifact: PathBuf,

    /// Constructor arguments.
    #[arg(long, num_args = 1.., value_name = "ARG")]
    pub args: Vec<String>,

    /// Deploy at this address instead of a generated one.
    #[arg(long)]
    pub address: Option<Address>,

    /// A call to make after deployment: the function name followed by its arguments, separated
    /// by spaces. May be repeated.
    #[arg(long = "call", value_name = "CALL")]
    pub calls: Vec<String>,
}

impl RunArgs {
    pub fn run(self, config: HarnessConfig) -> Result<()> {
        let artifact = Artifact::load(&self.artifact)?;
        let ctor_args = match &artifact.constructor {
            Some(signature) => coerce_args(signature, &self.args)?,
            None if self.args.is_empty() => Vec::new(),
            None => bail!("{} has no constructor arguments", artifact.name),
        };

        let mut env = Env::new(config);
        let deployer = Deployer::new(artifact);
        let contract = match self.address {
            Some(address) => deployer.deploy_to(&mut env, &ctor_args, address)?,
            None => deployer.deploy(&mut env, &ctor_args)?,
        };
        println!("deployed {}", contract.green());

        let mut failed = 0;
        for call in &self.calls {
            if !call_one(&mut env, &contract, call)? {
                failed += 1;
            }
        }

        if failed > 0 {
            bail!("{failed} call(s) failed");
        }
        Ok(())
    }
}

/// Makes one call, printing its result. Returns whether the call succeeded; errors other than
/// contract faults are propagated.
fn call_one(env: &mut Env, contract: &ContractInstance, call: &str) -> Result<bool> {
    let mut words = call.split_whitespace();
    let Some(name) = words.next() else { bail!("empty call") };
    let args = words.map(str::to_string).collect::<Vec<_>>();

    let function = contract.function(name)?;
    let args = coerce_args(function.signature(), &args)?;

    match function.call(env, &args) {
        Ok(Some(value)) => println!("{call} -> {}", value.cyan()),
        Ok(None) => println!("{call} -> {}", "ok".cyan()),
        Err(HarnessError::ContractExecution(report)) => {
            println!("{call} -> {}\n", "reverted".red());
            println!("{}", report.red());
            return Ok(false);
        }
        Err(err) => return Err(err.into()),
    }
    Ok(true)
}
