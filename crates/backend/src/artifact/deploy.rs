use std::{fmt, rc::Rc, sync::Arc};

use alloy_primitives::{Address, Bytes};
use eyre::{bail, Result as EyreResult};

use crate::{
    contract::{CallArg, ContractInstance, FunctionBinding, HasAddress},
    core::Env,
    engine::{Computation, Outcome},
    error::{HarnessError, Result},
    frontend::Frontend,
    utils::abi::decode_revert_reason,
};

use super::Artifact;

/// `PUSH2 <len> RETURNDATASIZE DUP2 PUSH1 0x0a RETURNDATASIZE CODECOPY RETURN`: returns everything
/// after itself as the deployed code.
const BLUEPRINT_TRAMPOLINE_LEN: u8 = 10;

/// Init code deploying `preamble ++ runtime` verbatim, without running any constructor.
pub fn blueprint_initcode(preamble: &[u8], runtime: &[u8]) -> EyreResult<Bytes> {
    let len = preamble.len() + runtime.len();
    if len > u16::MAX as usize {
        bail!("blueprint of {len} bytes does not fit a PUSH2");
    }

    let mut code = Vec::with_capacity(BLUEPRINT_TRAMPOLINE_LEN as usize + len);
    code.push(0x61);
    code.extend_from_slice(&(len as u16).to_be_bytes());
    code.extend_from_slice(&[0x3d, 0x81, 0x60, BLUEPRINT_TRAMPOLINE_LEN, 0x3d, 0x39, 0xf3]);
    code.extend_from_slice(preamble);
    code.extend_from_slice(runtime);
    Ok(code.into())
}

/// Code deployed as a template for other contracts. It is not meant to be called.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Blueprint {
    pub name: String,
    pub address: Address,
}

impl HasAddress for Blueprint {
    fn address(&self) -> Address {
        self.address
    }
}

impl fmt::Display for Blueprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} blueprint at {}>", self.name, self.address)
    }
}

/// Creates contract instances out of an artifact.
#[derive(Clone)]
pub struct Deployer {
    artifact: Arc<Artifact>,
    frontend: Option<Rc<dyn Frontend>>,
}

impl fmt::Debug for Deployer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deployer")
            .field("contract", &self.artifact.name)
            .field("frontend", &self.frontend.is_some())
            .finish()
    }
}

impl Deployer {
    pub fn new(artifact: impl Into<Arc<Artifact>>) -> Self {
        Self { artifact: artifact.into(), frontend: None }
    }

    /// Instances created afterwards can evaluate snippets through `frontend`.
    pub fn with_frontend(mut self, frontend: Rc<dyn Frontend>) -> Self {
        self.frontend = Some(frontend);
        self
    }

    pub fn artifact(&self) -> &Arc<Artifact> {
        &self.artifact
    }

    /// Deploys at a freshly generated address.
    pub fn deploy(&self, env: &mut Env, args: &[CallArg]) -> Result<Rc<ContractInstance>> {
        let address = env.generate_address();
        self.deploy_to(env, args, address)
    }

    /// Runs the constructor with `args` and registers the instance at `address`.
    pub fn deploy_to(
        &self,
        env: &mut Env,
        args: &[CallArg],
        address: Address,
    ) -> Result<Rc<ContractInstance>> {
        let mut initcode = self.artifact.bytecode.to_vec();
        match &self.artifact.constructor {
            Some(signature) => {
                // Constructor arguments carry no selector.
                let (_, encoded) = FunctionBinding::detached(signature.clone()).encode_args(args)?;
                initcode.extend_from_slice(&encoded);
            }
            None if !args.is_empty() => {
                return Err(HarnessError::Argument {
                    function: "constructor".to_string(),
                    min: 0,
                    max: 0,
                    got: args.len(),
                });
            }
            None => {}
        }

        let computation = env.deploy_code(address, initcode.into())?;
        self.check_deployment(address, &computation)?;

        let bytecode = computation.output;
        self.check_data_section(&bytecode);
        let instance = self.instantiate(env, address, bytecode);
        debug!("deployed {instance}");
        Ok(instance)
    }

    /// Deploys the runtime code, behind `preamble`, as a blueprint. The preamble defaults to the
    /// configured one; an empty preamble is allowed.
    pub fn deploy_as_blueprint(&self, env: &mut Env, preamble: Option<&[u8]>) -> Result<Blueprint> {
        let preamble = match preamble {
            Some(preamble) => preamble.to_vec(),
            None => env.config().blueprint_preamble.to_vec(),
        };
        let initcode = blueprint_initcode(&preamble, &self.artifact.runtime_bytecode)?;

        let address = env.generate_address();
        let computation = env.deploy_code(address, initcode)?;
        self.check_deployment(address, &computation)?;

        let blueprint = Blueprint { name: self.artifact.name.clone(), address };
        debug!("deployed {blueprint}");
        Ok(blueprint)
    }

    /// Attaches to code already resident at `address`, without running a constructor.
    ///
    /// A resident runtime that differs from the artifact's is reported but accepted.
    pub fn at(&self, env: &mut Env, address: Address) -> Result<Rc<ContractInstance>> {
        let bytecode = env.get_code(address)?;
        let instance = self.instantiate(env, address, bytecode);
        if !instance.verify_runtime() {
            warn!(
                "requested {instance}, but the code at {address} does not match the runtime of {}",
                self.artifact.name
            );
        }
        Ok(instance)
    }

    fn instantiate(&self, env: &mut Env, address: Address, bytecode: Bytes) -> Rc<ContractInstance> {
        let instance = ContractInstance::new(
            Arc::clone(&self.artifact),
            address,
            bytecode,
            self.frontend.clone(),
            env.config().eval_cache_capacity,
        );
        env.register_contract(Rc::clone(&instance));
        instance
    }

    fn check_deployment(&self, address: Address, computation: &Computation) -> Result<()> {
        if !computation.is_error() {
            return Ok(());
        }

        let reason = match &computation.outcome {
            Outcome::Halt(reason) => reason.clone(),
            _ => decode_revert_reason(&computation.output)
                .unwrap_or_else(|| "constructor reverted".to_string()),
        };
        Err(HarnessError::Deployment { contract: self.artifact.name.clone(), address, reason })
    }

    fn check_data_section(&self, bytecode: &[u8]) {
        let runtime_len = self.artifact.runtime_bytecode.len();
        let expected = self.artifact.data_section_len;
        if bytecode.len() != runtime_len + expected {
            warn!(
                "{} deployed {} bytes of data section, expected {expected}",
                self.artifact.name,
                bytecode.len().saturating_sub(runtime_len),
            );
        }
    }
}
