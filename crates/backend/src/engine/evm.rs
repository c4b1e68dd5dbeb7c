use alloy_primitives::{Address, Bytes};
use eyre::{eyre, OptionExt, Result};
use revm::{
    db::{CacheDB, EmptyDB},
    primitives::ResultAndState,
    DatabaseCommit,
};
use splice_utils::config::HarnessConfig;

use crate::{
    inspector::ComputationInspector,
    utils::{
        db,
        evm::{inspected_evm, TxDefaults},
    },
};

use super::{Computation, ExecutionEngine, ExecutionRequest};

/// An in-memory ledger backed by revm.
#[derive(Debug)]
pub struct RevmEngine {
    db: CacheDB<EmptyDB>,
    tx: TxDefaults,
}

impl RevmEngine {
    pub fn new(config: &HarnessConfig) -> Self {
        Self {
            db: CacheDB::new(EmptyDB::default()),
            tx: TxDefaults {
                chain_id: config.chain_id,
                sender: config.sender,
                gas_limit: config.gas_limit,
            },
        }
    }

    /// Calls `target` with whatever code currently resides there and commits the state.
    fn transact(
        &mut self,
        target: Address,
        calldata: Bytes,
        inspector: ComputationInspector,
    ) -> Result<Computation> {
        let env = self.tx.call_env(target, calldata);
        let mut evm = inspected_evm(&mut self.db, env, inspector);
        let ResultAndState { result, state } =
            evm.transact().map_err(|err| eyre!("failed to transact: {}", err))?;
        let inspector = evm.into_context().external;
        self.db.commit(state);

        let mut computation =
            inspector.into_computation().ok_or_eyre("no frame was recorded for the transaction")?;
        // The outermost frame excludes the intrinsic cost of the transaction.
        computation.gas_used = result.gas_used();
        Ok(computation)
    }
}

impl ExecutionEngine for RevmEngine {
    fn execute(&mut self, request: ExecutionRequest) -> Result<Computation> {
        let ExecutionRequest { target, bytecode, calldata, fake_codesize, start_pc } = request;
        debug!(%target, code_len = bytecode.len(), ?fake_codesize, ?start_pc, "executing");

        let resident = db::get_code(&self.db, target)?;
        db::set_code(&mut self.db, target, bytecode)?;
        let computation =
            self.transact(target, calldata, ComputationInspector::new(fake_codesize, start_pc));
        db::set_code(&mut self.db, target, resident)?;

        computation
    }

    fn deploy(&mut self, target: Address, initcode: Bytes) -> Result<Computation> {
        debug!(%target, initcode_len = initcode.len(), "deploying");

        db::set_code(&mut self.db, target, initcode)?;
        let computation = self.transact(target, Bytes::new(), ComputationInspector::default());
        let code = match &computation {
            Ok(computation) if !computation.is_error() => computation.output.clone(),
            _ => Bytes::new(),
        };
        db::set_code(&mut self.db, target, code)?;

        computation
    }

    fn code(&mut self, address: Address) -> Result<Bytes> {
        db::get_code(&self.db, address)
    }
}
