use std::collections::{BTreeMap, BTreeSet};

use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::U256;

use crate::artifact::FunctionSignature;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageVar {
    pub ty: DynSolType,
    pub slot: U256,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImmutableVar {
    pub ty: DynSolType,
    /// Offset within the data section.
    pub offset: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ConstantVar {
    pub ty: DynSolType,
    pub value: DynSolValue,
}

/// What a name resolves to.
#[derive(Clone, Copy, Debug)]
pub enum Symbol<'a> {
    Storage(&'a StorageVar),
    Immutable(&'a ImmutableVar),
    Constant(&'a ConstantVar),
    Function(&'a FunctionSignature),
    Builtin,
}

/// Immutable semantic snapshot of a contract module, shared by every fragment compiled against
/// the contract.
///
/// Built once by the front end through [`NamespaceBuilder`]; afterwards it only answers lookups.
#[derive(Clone, Debug, Default)]
pub struct NamespaceSnapshot {
    contract: String,
    storage: BTreeMap<String, StorageVar>,
    immutables: BTreeMap<String, ImmutableVar>,
    constants: BTreeMap<String, ConstantVar>,
    functions: BTreeMap<String, FunctionSignature>,
    builtins: BTreeSet<String>,
}

impl NamespaceSnapshot {
    pub fn builder(contract: impl Into<String>) -> NamespaceBuilder {
        NamespaceBuilder { inner: Self { contract: contract.into(), ..Default::default() } }
    }

    pub fn contract(&self) -> &str {
        &self.contract
    }

    pub fn storage(&self, name: &str) -> Option<&StorageVar> {
        self.storage.get(name)
    }

    pub fn immutable(&self, name: &str) -> Option<&ImmutableVar> {
        self.immutables.get(name)
    }

    pub fn constant(&self, name: &str) -> Option<&ConstantVar> {
        self.constants.get(name)
    }

    pub fn function(&self, name: &str) -> Option<&FunctionSignature> {
        self.functions.get(name)
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.builtins.contains(name)
    }

    /// Resolves a bare name: constants, immutables and builtins. Storage variables and functions
    /// are members of `self`, see [`Self::lookup_member`].
    pub fn lookup(&self, name: &str) -> Option<Symbol<'_>> {
        if let Some(constant) = self.constants.get(name) {
            return Some(Symbol::Constant(constant));
        }
        if let Some(immutable) = self.immutables.get(name) {
            return Some(Symbol::Immutable(immutable));
        }
        self.builtins.contains(name).then_some(Symbol::Builtin)
    }

    /// Resolves `self.<name>`. A public storage variable and its getter share a name; the
    /// variable wins.
    pub fn lookup_member(&self, name: &str) -> Option<Symbol<'_>> {
        if let Some(var) = self.storage.get(name) {
            return Some(Symbol::Storage(var));
        }
        self.functions.get(name).map(Symbol::Function)
    }
}

#[derive(Debug)]
pub struct NamespaceBuilder {
    inner: NamespaceSnapshot,
}

impl NamespaceBuilder {
    pub fn storage(mut self, name: impl Into<String>, ty: DynSolType, slot: U256) -> Self {
        self.inner.storage.insert(name.into(), StorageVar { ty, slot });
        self
    }

    pub fn immutable(mut self, name: impl Into<String>, ty: DynSolType, offset: usize) -> Self {
        self.inner.immutables.insert(name.into(), ImmutableVar { ty, offset });
        self
    }

    pub fn constant(mut self, name: impl Into<String>, ty: DynSolType, value: DynSolValue) -> Self {
        self.inner.constants.insert(name.into(), ConstantVar { ty, value });
        self
    }

    pub fn function(mut self, signature: FunctionSignature) -> Self {
        self.inner.functions.insert(signature.name.clone(), signature);
        self
    }

    pub fn builtin(mut self, name: impl Into<String>) -> Self {
        self.inner.builtins.insert(name.into());
        self
    }

    pub fn build(self) -> NamespaceSnapshot {
        self.inner
    }
}
