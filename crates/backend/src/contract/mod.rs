//! Deployed contract instances.

mod function;
mod value;

use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    fmt,
    rc::Rc,
    sync::Arc,
};

use alloy_dyn_abi::DynSolType;
use alloy_primitives::{Address, Bytes};
use once_cell::unsync::OnceCell;

use crate::{
    analysis::{
        source_map::SourceMap,
        trace::{FragmentSource, TraceReconstructor},
    },
    artifact::Artifact,
    core::Env,
    engine::Computation,
    error::{HarnessError, Result},
    fragment::{cache::EvalCache, namespace::NamespaceSnapshot, CompiledFragment, FragmentCompiler},
    frontend::Frontend,
    utils::abi::decode_return,
};

pub use self::{
    function::FunctionBinding,
    value::{CallArg, HasAddress, TaggedValue},
};

/// A contract deployed (or attached) at an address of the environment.
pub struct ContractInstance {
    address: Address,
    artifact: Arc<Artifact>,
    /// Runtime code followed by the data section.
    bytecode: Bytes,
    frontend: Option<Rc<dyn Frontend>>,
    functions: BTreeMap<String, FunctionBinding>,

    eval_cache: RefCell<EvalCache>,
    namespace: OnceCell<Rc<NamespaceSnapshot>>,
    unoptimized_bytecode: OnceCell<Bytes>,
    fragment_counter: Cell<u64>,
    last_computation: RefCell<Option<Computation>>,
}

impl fmt::Debug for ContractInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractInstance")
            .field("name", &self.artifact.name)
            .field("address", &self.address)
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ContractInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} at {}>", self.artifact.name, self.address)
    }
}

impl HasAddress for ContractInstance {
    fn address(&self) -> Address {
        self.address
    }
}

impl ContractInstance {
    pub(crate) fn new(
        artifact: Arc<Artifact>,
        address: Address,
        bytecode: Bytes,
        frontend: Option<Rc<dyn Frontend>>,
        eval_cache_capacity: usize,
    ) -> Rc<Self> {
        Rc::new_cyclic(|this| {
            let functions = artifact
                .functions
                .iter()
                .map(|sig| (sig.name.clone(), FunctionBinding::new(sig.clone(), this.clone())))
                .collect();

            Self {
                address,
                artifact,
                bytecode,
                frontend,
                functions,
                eval_cache: RefCell::new(EvalCache::new(eval_cache_capacity)),
                namespace: OnceCell::new(),
                unoptimized_bytecode: OnceCell::new(),
                fragment_counter: Cell::new(0),
                last_computation: RefCell::new(None),
            }
        })
    }

    #[inline]
    pub fn address(&self) -> Address {
        self.address
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.artifact.name
    }

    #[inline]
    pub fn artifact(&self) -> &Arc<Artifact> {
        &self.artifact
    }

    #[inline]
    pub fn bytecode(&self) -> &Bytes {
        &self.bytecode
    }

    pub fn function(&self, name: &str) -> Result<&FunctionBinding> {
        self.functions.get(name).ok_or_else(|| HarnessError::UnknownFunction(name.to_string()))
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionBinding> {
        self.functions.values()
    }

    /// Shorthand for `self.function(name)?.call(env, args)`.
    pub fn call(&self, env: &mut Env, name: &str, args: &[CallArg]) -> Result<Option<TaggedValue>> {
        self.function(name)?.call(env, args)
    }

    /// Evaluates a source snippet against the live state of this contract.
    ///
    /// Expressions return their value; statements return `None`.
    pub fn eval(&self, env: &mut Env, snippet: &str) -> Result<Option<TaggedValue>> {
        self.fragment_compiler(snippet)?.evaluate(env, snippet)
    }

    /// Compiles a snippet without running it.
    pub fn compile_fragment(&self, snippet: &str) -> Result<CompiledFragment> {
        self.fragment_compiler(snippet)?.compile(snippet)
    }

    fn fragment_compiler(&self, snippet: &str) -> Result<FragmentCompiler<'_>> {
        let frontend = self.frontend.as_deref().ok_or_else(|| HarnessError::NoFrontend {
            contract: self.to_string(),
            snippet: snippet.to_string(),
        })?;
        Ok(FragmentCompiler::new(self, frontend))
    }

    /// The computation of the last call or evaluation, kept for inspection.
    pub fn last_computation(&self) -> Option<Computation> {
        self.last_computation.borrow().clone()
    }

    /// The data section: the trailing bytes of the code, as long as the artifact declares.
    pub fn data_section(&self) -> &[u8] {
        let len = self.artifact.data_section_len.min(self.bytecode.len());
        &self.bytecode[self.bytecode.len() - len..]
    }

    /// Whether the code preceding the data section is the artifact's runtime code.
    pub fn verify_runtime(&self) -> bool {
        let end = self.bytecode.len().saturating_sub(self.artifact.data_section_len);
        self.bytecode[..end] == self.artifact.runtime_bytecode[..]
    }

    pub fn source_map(&self) -> Arc<SourceMap> {
        self.artifact.source_map()
    }

    /// Unoptimized runtime code followed by this instance's data section.
    pub fn unoptimized_bytecode(&self) -> Result<&Bytes> {
        self.unoptimized_bytecode.get_or_try_init(|| {
            let mut code = self.artifact.unoptimized_bytecode()?.to_vec();
            let data = self.data_section();
            code.extend_from_slice(data);
            // A truncated data section still has to occupy its declared length.
            code.resize(code.len() + self.artifact.data_section_len - data.len(), 0);
            Ok(code.into())
        })
    }

    /// The semantic snapshot of the module, computed on first use.
    pub(crate) fn namespace(&self, frontend: &dyn Frontend) -> Result<Rc<NamespaceSnapshot>> {
        let namespace = self.namespace.get_or_try_init(|| {
            debug!(contract = self.name(), "analyzing module namespace");
            frontend.analyze_module(&self.artifact).map(Rc::new)
        })?;
        Ok(Rc::clone(namespace))
    }

    pub(crate) fn eval_cache(&self) -> &RefCell<EvalCache> {
        &self.eval_cache
    }

    /// A function name no other fragment of this instance has used.
    pub(crate) fn fresh_fragment_name(&self) -> String {
        let n = self.fragment_counter.get();
        self.fragment_counter.set(n + 1);
        format!("__splice_eval_{n}__")
    }

    /// Turns a computation into a return value, or into the fault report of its failure.
    pub(crate) fn marshal(
        &self,
        env: &Env,
        computation: Computation,
        return_type: Option<&DynSolType>,
        fragment: Option<FragmentSource<'_>>,
    ) -> Result<Option<TaggedValue>> {
        let outcome = if computation.is_error() {
            let report = TraceReconstructor::new(env).build_report(self, &computation, fragment);
            Err(HarnessError::ContractExecution(Box::new(report)))
        } else {
            match return_type {
                Some(ty) => decode_return(ty, &computation.output)
                    .map(|value| Some(TaggedValue::new(value, ty.clone())))
                    .map_err(Into::into),
                None => Ok(None),
            }
        };

        *self.last_computation.borrow_mut() = Some(computation);
        outcome
    }
}
