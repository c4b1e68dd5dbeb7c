//! On-demand compilation of source snippets against a deployed contract.
//!
//! A snippet is wrapped into a parameterless external function, compiled on its own and spliced
//! after the contract's unoptimized runtime code and its data section. Execution enters the
//! fragment directly: the start pc skips the base code, the selector check always passes, and
//! `CODESIZE` reports the length of the base so immutables resolve as they would in the contract.

pub mod cache;
pub mod namespace;

use std::sync::Arc;

use alloy_dyn_abi::DynSolType;
use alloy_primitives::Bytes;
use eyre::eyre;

use crate::{
    analysis::{source_map::SourceMap, trace::FragmentSource},
    artifact::assembly::AsmItem,
    contract::{ContractInstance, TaggedValue},
    core::Env,
    engine::ExecutionRequest,
    error::Result,
    frontend::{Frontend, FrontendError, FragmentWrapper, SelectorCheck, SnippetKind},
};

/// Calldata fragments are entered with. The selector check is compiled out, so it is never read.
pub const FRAGMENT_CALLDATA: &[u8] = b"dbug";

/// A snippet compiled against a contract.
#[derive(Clone, Debug)]
pub struct CompiledFragment {
    /// Fragment code alone, to be appended to the base code.
    pub bytecode: Bytes,
    /// Program-counter maps of the spliced code, base included.
    pub source_map: Arc<SourceMap>,
    /// `None` for statements.
    pub return_type: Option<DynSolType>,
}

pub struct FragmentCompiler<'a> {
    contract: &'a ContractInstance,
    frontend: &'a dyn Frontend,
}

impl<'a> FragmentCompiler<'a> {
    pub fn new(contract: &'a ContractInstance, frontend: &'a dyn Frontend) -> Self {
        Self { contract, frontend }
    }

    /// Compiles `snippet`, or fetches it from the contract's eval cache.
    pub fn compile(&self, snippet: &str) -> Result<CompiledFragment> {
        if let Some(fragment) = self.contract.eval_cache().borrow_mut().get(snippet) {
            trace!(snippet, "eval cache hit");
            return Ok(fragment);
        }
        trace!(snippet, "eval cache miss");

        let namespace = self.contract.namespace(self.frontend)?;
        let parsed = self.frontend.parse_snippet(snippet)?;

        let return_type = match parsed.kind {
            SnippetKind::Expression => match self.frontend.infer_type(&parsed, &namespace) {
                Ok(ty) => Some(ty),
                Err(FrontendError::NotTypeable(reason)) => {
                    trace!(snippet, %reason, "running untypeable expression as a statement");
                    None
                }
                Err(err) => return Err(err.into()),
            },
            SnippetKind::Statement => None,
        };

        let body = match return_type {
            Some(_) => format!("return {}", parsed.source),
            None => parsed.source.clone(),
        };
        let wrapper =
            FragmentWrapper { name: self.contract.fresh_fragment_name(), return_type, body };
        let source = self.frontend.render_wrapper(&wrapper);

        let function = self.frontend.validate_function(&source, &namespace)?;
        let fragment_asm =
            self.frontend.generate_function(&function, &namespace, SelectorCheck::AlwaysPass)?;

        let artifact = self.contract.artifact();
        let mut spliced = artifact
            .unoptimized_assembly
            .clone()
            .ok_or_else(|| eyre!("{} carries no unoptimized assembly", artifact.name))?;
        spliced.push_item(AsmItem::Data(vec![0; artifact.data_section_len].into()));
        spliced.append(fragment_asm);

        let (code, source_map) = spliced.assemble()?;
        let n_base = artifact.unoptimized_bytecode()?.len() + artifact.data_section_len;
        if code.len() < n_base {
            return Err(eyre!("spliced code of {} is shorter than its base", artifact.name).into());
        }
        let fragment = CompiledFragment {
            bytecode: code[n_base..].to_vec().into(),
            source_map: Arc::new(source_map),
            return_type: wrapper.return_type,
        };
        debug!(
            contract = self.contract.name(),
            function = %wrapper.name,
            size = fragment.bytecode.len(),
            "compiled fragment"
        );

        self.contract.eval_cache().borrow_mut().insert(snippet.to_string(), fragment.clone())?;
        Ok(fragment)
    }

    /// Compiles and runs `snippet` against the live state of the contract.
    pub fn evaluate(&self, env: &mut Env, snippet: &str) -> Result<Option<TaggedValue>> {
        let fragment = self.compile(snippet)?;

        let base = self.contract.unoptimized_bytecode()?;
        let mut bytecode = Vec::with_capacity(base.len() + fragment.bytecode.len());
        bytecode.extend_from_slice(base);
        bytecode.extend_from_slice(&fragment.bytecode);

        let request = ExecutionRequest {
            target: self.contract.address(),
            bytecode: bytecode.into(),
            calldata: Bytes::from_static(FRAGMENT_CALLDATA),
            fake_codesize: Some(base.len()),
            start_pc: Some(base.len()),
        };
        let computation = env.execute_code(request)?;

        self.contract.marshal(
            env,
            computation,
            fragment.return_type.as_ref(),
            Some(FragmentSource { map: &fragment.source_map, base_len: base.len() }),
        )
    }
}
