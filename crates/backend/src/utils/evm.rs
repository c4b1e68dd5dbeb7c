//! revm plumbing shared by the engine and the computation inspector.

use alloy_primitives::{Address, Bytes, U256};
use revm::{
    inspector_handle_register,
    primitives::{Env, EnvWithHandlerCfg, SpecId, TxKind},
    Context, Database, Evm, EvmContext, Handler, Inspector,
};

/// Hard fork every computation runs under.
pub const SPEC_ID: SpecId = SpecId::CANCUN;

/// Gas a frame is charged once its refund is applied. Refunds are capped at a fifth of the
/// gas spent (EIP-3529).
#[inline]
pub fn net_gas(spent: u64, refunded: u64) -> u64 {
    spent - refunded.min(spent / 5)
}

/// Transaction parameters the harness holds fixed across calls.
#[derive(Clone, Copy, Debug)]
pub struct TxDefaults {
    pub chain_id: u64,
    pub sender: Address,
    pub gas_limit: u64,
}

impl TxDefaults {
    /// A zero-priced call to `target` carrying `calldata`.
    pub fn call_env(&self, target: Address, calldata: Bytes) -> EnvWithHandlerCfg {
        let mut env = Env::default();
        env.cfg.chain_id = self.chain_id;
        env.tx.caller = self.sender;
        env.tx.transact_to = TxKind::Call(target);
        env.tx.data = calldata;
        env.tx.gas_limit = self.gas_limit;
        env.tx.gas_price = U256::ZERO;

        EnvWithHandlerCfg::new_with_spec_id(Box::new(env), SPEC_ID)
    }
}

/// Builds an EVM over `db` that reports every step to `inspector`.
pub fn inspected_evm<'a, DB, I>(db: DB, env: EnvWithHandlerCfg, inspector: I) -> Evm<'a, I, DB>
where
    DB: Database,
    I: Inspector<DB>,
{
    let EnvWithHandlerCfg { env, handler_cfg } = env;

    let mut handler = Handler::new(handler_cfg);
    handler.append_handler_register_plain(inspector_handle_register);
    Evm::new(Context::new(EvmContext::new_with_env(db, env), inspector), handler)
}
