use std::fmt;

use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{Address, U256};

use crate::utils::abi::format_value;

/// A decoded return value, tagged with the type it was declared with.
#[derive(Clone, Debug, PartialEq)]
pub struct TaggedValue {
    pub value: DynSolValue,
    pub ty: DynSolType,
}

impl TaggedValue {
    pub fn new(value: DynSolValue, ty: DynSolType) -> Self {
        Self { value, ty }
    }

    /// The value as an unsigned integer, if it is one.
    pub fn as_uint(&self) -> Option<U256> {
        self.value.as_uint().map(|(value, _)| value)
    }

    pub fn into_inner(self) -> DynSolValue {
        self.value
    }
}

impl fmt::Display for TaggedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_value(&self.value))
    }
}

/// Anything with an on-chain identity. Passed as a call argument, it is reduced to its address.
pub trait HasAddress {
    fn address(&self) -> Address;
}

impl HasAddress for Address {
    fn address(&self) -> Address {
        *self
    }
}

/// An argument of a contract call.
#[derive(Clone, Debug, PartialEq)]
pub enum CallArg {
    Value(DynSolValue),
    Address(Address),
}

impl CallArg {
    pub fn into_value(self) -> DynSolValue {
        match self {
            Self::Value(value) => value,
            Self::Address(address) => DynSolValue::Address(address),
        }
    }
}

impl From<DynSolValue> for CallArg {
    fn from(value: DynSolValue) -> Self {
        Self::Value(value)
    }
}

impl From<U256> for CallArg {
    fn from(value: U256) -> Self {
        Self::Value(DynSolValue::Uint(value, 256))
    }
}

impl From<u64> for CallArg {
    fn from(value: u64) -> Self {
        U256::from(value).into()
    }
}

impl From<bool> for CallArg {
    fn from(value: bool) -> Self {
        Self::Value(DynSolValue::Bool(value))
    }
}

impl From<Address> for CallArg {
    fn from(address: Address) -> Self {
        Self::Address(address)
    }
}

impl<T: HasAddress + ?Sized> From<&T> for CallArg {
    fn from(value: &T) -> Self {
        Self::Address(value.address())
    }
}
