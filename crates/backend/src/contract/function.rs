use std::{
    cell::RefCell,
    collections::HashMap,
    fmt,
    rc::{Rc, Weak},
};

use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{Bytes, Selector};

use crate::{
    artifact::FunctionSignature,
    core::Env,
    engine::ExecutionRequest,
    error::{HarnessError, Result},
    utils::abi,
};

use super::{CallArg, ContractInstance, TaggedValue};

/// A callable external function of a deployed contract.
///
/// Every number of supplied defaulted arguments selects a distinct overload, with its own
/// selector. The (selector, argument tuple type) pair of each overload is computed once.
pub struct FunctionBinding {
    signature: FunctionSignature,
    contract: Weak<ContractInstance>,
    memo: RefCell<HashMap<usize, (Selector, DynSolType)>>,
}

impl fmt::Debug for FunctionBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionBinding").field("signature", &self.signature).finish_non_exhaustive()
    }
}

impl FunctionBinding {
    pub(crate) fn new(signature: FunctionSignature, contract: Weak<ContractInstance>) -> Self {
        Self { signature, contract, memo: RefCell::default() }
    }

    /// A binding without contract, used to encode constructor arguments.
    pub(crate) fn detached(signature: FunctionSignature) -> Self {
        Self::new(signature, Weak::new())
    }

    pub fn name(&self) -> &str {
        &self.signature.name
    }

    pub fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    /// Selector and argument tuple type of the overload taking `n_optional` defaulted arguments.
    pub fn abi_type(&self, n_optional: usize) -> Result<(Selector, DynSolType)> {
        if let Some(memo) = self.memo.borrow().get(&n_optional) {
            return Ok(memo.clone());
        }

        let types = self
            .signature
            .params(n_optional)
            .map(|param| param.resolve())
            .collect::<eyre::Result<Vec<_>>>()?;
        let selector = abi::selector(&abi::signature(&self.signature.name, &types));
        let entry = (selector, DynSolType::Tuple(types));
        trace!(function = self.name(), n_optional, %selector, "resolved overload");

        self.memo.borrow_mut().insert(n_optional, entry.clone());
        Ok(entry)
    }

    /// ABI-encodes `args` against the overload their number selects, returning the selector and
    /// the encoded tuple.
    pub fn encode_args(&self, args: &[CallArg]) -> Result<(Selector, Vec<u8>)> {
        let (min, max) = (self.signature.required(), self.signature.required() + self.signature.optional());
        if !(min..=max).contains(&args.len()) {
            return Err(HarnessError::Argument {
                function: self.signature.name.clone(),
                min,
                max,
                got: args.len(),
            });
        }

        let (selector, ty) = self.abi_type(args.len() - min)?;
        let values = DynSolValue::Tuple(args.iter().cloned().map(CallArg::into_value).collect());
        if !ty.matches(&values) {
            return Err(HarnessError::ArgumentType {
                function: self.signature.name.clone(),
                expected: ty.sol_type_name().into_owned(),
            });
        }

        Ok((selector, values.abi_encode_params()))
    }

    /// Calldata of a call with `args`: selector followed by the encoded arguments.
    pub fn prepare_calldata(&self, args: &[CallArg]) -> Result<Bytes> {
        let (selector, encoded) = self.encode_args(args)?;
        let mut calldata = Vec::with_capacity(4 + encoded.len());
        calldata.extend_from_slice(selector.as_slice());
        calldata.extend_from_slice(&encoded);
        Ok(calldata.into())
    }

    /// Calls the function. Returns `None` for functions without return type.
    pub fn call(&self, env: &mut Env, args: &[CallArg]) -> Result<Option<TaggedValue>> {
        let contract = self.contract()?;
        let calldata = self.prepare_calldata(args)?;

        debug!(contract = %contract.address(), function = self.name(), "calling");
        let request = ExecutionRequest::new(contract.address(), contract.bytecode().clone(), calldata);
        let computation = env.execute_code(request)?;

        let return_type = self.signature.return_type()?;
        contract.marshal(env, computation, return_type.as_ref(), None)
    }

    fn contract(&self) -> Result<Rc<ContractInstance>> {
        self.contract.upgrade().ok_or_else(|| {
            eyre::eyre!("contract of `{}` is no longer alive", self.signature.name).into()
        })
    }
}
