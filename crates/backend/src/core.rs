use std::rc::Rc;

use alloy_primitives::{Address, Bytes};
use rustc_hash::FxHashMap;
use splice_utils::config::HarnessConfig;

use crate::{
    contract::ContractInstance,
    engine::{Computation, ExecutionEngine, ExecutionRequest, RevmEngine},
    error::Result,
};

/// The execution environment: an engine plus the directory of contracts deployed on it.
///
/// The directory maps every known address to its instance, so that faults crossing contract
/// boundaries can be attributed to the callee's source.
#[derive(Debug)]
pub struct Env {
    engine: Box<dyn ExecutionEngine>,
    contracts: FxHashMap<Address, Rc<ContractInstance>>,
    config: HarnessConfig,
    nonce: u64,
}

impl Env {
    /// An environment on a fresh in-memory [`RevmEngine`].
    pub fn new(config: HarnessConfig) -> Self {
        let engine = RevmEngine::new(&config);
        Self::with_engine(config, Box::new(engine))
    }

    pub fn with_engine(config: HarnessConfig, engine: Box<dyn ExecutionEngine>) -> Self {
        Self { engine, contracts: FxHashMap::default(), config, nonce: 0 }
    }

    #[inline]
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// A fresh address, derived like a `CREATE` of the configured sender.
    pub fn generate_address(&mut self) -> Address {
        let address = self.config.sender.create(self.nonce);
        self.nonce += 1;
        address
    }

    /// Registers `contract` at its address, replacing whatever was registered there.
    pub fn register_contract(&mut self, contract: Rc<ContractInstance>) {
        if let Some(old) = self.contracts.insert(contract.address(), contract) {
            debug!("replaced {old} in the contract directory");
        }
    }

    pub fn lookup_contract(&self, address: Address) -> Option<Rc<ContractInstance>> {
        self.contracts.get(&address).cloned()
    }

    pub fn execute_code(&mut self, request: ExecutionRequest) -> Result<Computation> {
        debug!(
            target = %request.target,
            code_size = request.bytecode.len(),
            start_pc = ?request.start_pc,
            "executing"
        );
        Ok(self.engine.execute(request)?)
    }

    pub fn deploy_code(&mut self, address: Address, initcode: Bytes) -> Result<Computation> {
        debug!(%address, size = initcode.len(), "deploying");
        Ok(self.engine.deploy(address, initcode)?)
    }

    pub fn get_code(&mut self, address: Address) -> Result<Bytes> {
        Ok(self.engine.code(address)?)
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::new(HarnessConfig::default())
    }
}
