//! Fault reports spanning contract boundaries.

use std::fmt;

use alloy_primitives::Address;

use crate::{
    artifact::SourcePos,
    contract::ContractInstance,
    core::Env,
    engine::{Computation, Outcome},
    utils::abi::decode_revert_reason,
};

use super::{frame::FrameDetail, source_map::SourceMap};

/// Error labels under which a frame faulted because of a call it made. The report follows the
/// faulting callee.
pub const EXTERNAL_CALL_ERRORS: [&str; 2] = ["external call failed", "returndatasize too small"];

/// One contract frame of a fault report.
#[derive(Clone, Debug, PartialEq)]
pub struct ReportFrame {
    /// Display name of the contract, `None` if nothing is registered at `address`.
    pub contract: Option<String>,
    pub address: Address,
    /// Source position of the last executed pc that maps to source.
    pub pos: Option<SourcePos>,
    /// Error label the compiler attached to the faulting instruction.
    pub error: Option<String>,
    /// Decoded revert reason, or halt reason.
    pub reason: Option<String>,
    pub excerpt: Option<String>,
    pub detail: Option<FrameDetail>,
}

impl fmt::Display for ReportFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.contract {
            Some(contract) => f.write_str(contract)?,
            None => write!(f, "<unknown contract at {}>", self.address)?,
        }
        if let Some(pos) = &self.pos {
            write!(f, ", line {pos}")?;
        }
        if let Some(error) = &self.error {
            write!(f, ": {error}")?;
        }
        if let Some(reason) = &self.reason {
            write!(f, " ({reason})")?;
        }
        if let Some(detail) = &self.detail {
            write!(f, "\n  {detail}")?;
        }
        if let Some(excerpt) = &self.excerpt {
            write!(f, "\n{excerpt}")?;
        }
        Ok(())
    }
}

/// A contract execution fault, attributed frame by frame, outermost first.
#[derive(Clone, Debug, PartialEq)]
pub struct ExecutionReport {
    /// Reason of the innermost frame that has one.
    pub reason: Option<String>,
    pub frames: Vec<ReportFrame>,
}

impl ExecutionReport {
    pub fn innermost(&self) -> Option<&ReportFrame> {
        self.frames.last()
    }

    /// The error labels of all frames, outermost first.
    pub fn error_labels(&self) -> Vec<&str> {
        self.frames.iter().filter_map(|frame| frame.error.as_deref()).collect()
    }
}

impl fmt::Display for ExecutionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason.as_deref().unwrap_or("execution reverted"))?;
        for frame in &self.frames {
            write!(f, "\n\n{frame}")?;
        }
        Ok(())
    }
}

/// Source map of an evaluated fragment. It covers the whole spliced code: pcs below `base_len`
/// belong to the contract's own code, the rest to the fragment.
#[derive(Clone, Copy, Debug)]
pub struct FragmentSource<'a> {
    pub map: &'a SourceMap,
    pub base_len: usize,
}

/// Rebuilds the chain of faulting frames of a computation, following external calls into the
/// contracts the environment knows.
pub struct TraceReconstructor<'a> {
    env: &'a Env,
}

impl<'a> TraceReconstructor<'a> {
    pub fn new(env: &'a Env) -> Self {
        Self { env }
    }

    /// `fragment` replaces the contract's own source map for the outermost frame.
    pub fn build_report(
        &self,
        contract: &ContractInstance,
        computation: &Computation,
        fragment: Option<FragmentSource<'_>>,
    ) -> ExecutionReport {
        let mut frames = Vec::new();
        self.collect(Some(contract), computation, fragment, &mut frames);

        let reason = frames.iter().rev().find_map(|frame| frame.reason.clone());
        ExecutionReport { reason, frames }
    }

    fn collect(
        &self,
        contract: Option<&ContractInstance>,
        computation: &Computation,
        fragment: Option<FragmentSource<'_>>,
        frames: &mut Vec<ReportFrame>,
    ) {
        let reason = match &computation.outcome {
            Outcome::Halt(reason) => Some(reason.clone()),
            _ => decode_revert_reason(&computation.output),
        };

        let Some(contract) = contract else {
            frames.push(ReportFrame {
                contract: None,
                address: computation.code_address,
                pos: None,
                error: None,
                reason,
                excerpt: None,
                detail: None,
            });
            return;
        };

        let own_map = contract.source_map();
        let map = fragment.map_or(&*own_map, |fragment| fragment.map);

        let error = map.find_error(&computation.trace).map(str::to_string);
        let resolved = map.resolve(computation.code_address, &computation.trace);
        let (pos, in_contract_source) = match resolved {
            Ok((pc, pos)) => (Some(pos), fragment.map_or(true, |fragment| pc < fragment.base_len)),
            Err(miss) => {
                trace!("{miss}");
                (None, false)
            }
        };

        // Positions inside a fragment point into its wrapper source, not the contract's.
        let tree = &contract.artifact().syntax_tree;
        let contract_pos = pos.filter(|_| in_contract_source);
        let function =
            contract_pos.and_then(|pos| tree.node_at(&pos)).and_then(|node| node.function.as_deref());
        let detail = function.and_then(|name| {
            let signature = contract.artifact().function(name)?;
            FrameDetail::decode(name, &signature.frame, &computation.memory)
        });
        let excerpt = contract_pos.and_then(|pos| tree.excerpt(&pos));

        let follow = error.as_deref().is_some_and(|label| EXTERNAL_CALL_ERRORS.contains(&label));
        frames.push(ReportFrame {
            contract: Some(contract.to_string()),
            address: computation.code_address,
            pos,
            error,
            reason,
            excerpt,
            detail,
        });

        if !follow {
            return;
        }
        if let Some(child) = computation.faulting_child() {
            let callee = self.env.lookup_contract(child.code_address);
            self.collect(callee.as_deref(), child, None, frames);
        }
    }
}
