//! The execution-engine seam.
//!
//! The harness never steps bytecode itself: it submits [`ExecutionRequest`]s to an
//! [`ExecutionEngine`] and reads back [`Computation`] trees.

mod evm;

use std::fmt::Debug;

use alloy_primitives::{Address, Bytes};
use eyre::Result;

pub use self::evm::RevmEngine;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Outcome {
    #[default]
    Success,
    Revert,
    /// Exceptional halt, e.g. out of gas or an invalid jump.
    Halt(String),
}

impl Outcome {
    #[inline]
    pub fn is_error(&self) -> bool {
        !matches!(self, Self::Success)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FrameKind {
    #[default]
    Call,
    StaticCall,
    DelegateCall,
    CallCode,
    Create,
}

/// The record of one message-call frame and everything it called.
#[derive(Clone, Debug, Default)]
pub struct Computation {
    pub kind: FrameKind,
    /// Address whose code ran. Differs from `target` under delegate calls.
    pub code_address: Address,
    /// Address whose storage was used.
    pub target: Address,
    pub bytecode: Bytes,
    pub calldata: Bytes,
    pub outcome: Outcome,
    pub output: Bytes,
    /// Executed program counters, in order.
    pub trace: Vec<usize>,
    /// Memory of the frame when it ended.
    pub memory: Bytes,
    pub gas_used: u64,
    /// Frames entered from this one, in call order.
    pub children: Vec<Computation>,
}

impl Computation {
    #[inline]
    pub fn is_error(&self) -> bool {
        self.outcome.is_error()
    }

    /// The last call made by this frame, if it faulted.
    pub fn faulting_child(&self) -> Option<&Self> {
        self.children.last().filter(|child| child.is_error())
    }
}

/// Parameters of a single computation.
#[derive(Clone, Debug, Default)]
pub struct ExecutionRequest {
    pub target: Address,
    /// Code to run at `target`, in place of whatever resides there.
    pub bytecode: Bytes,
    pub calldata: Bytes,
    /// Value reported by `CODESIZE` in the outermost frame.
    pub fake_codesize: Option<usize>,
    /// Program counter the outermost frame starts at.
    pub start_pc: Option<usize>,
}

impl ExecutionRequest {
    pub fn new(target: Address, bytecode: Bytes, calldata: Bytes) -> Self {
        Self { target, bytecode, calldata, ..Default::default() }
    }
}

pub trait ExecutionEngine: Debug {
    /// Runs `request.bytecode` at `request.target` and commits the resulting state. The code
    /// resident at the target is left as it was.
    fn execute(&mut self, request: ExecutionRequest) -> Result<Computation>;

    /// Runs `initcode` as the constructor of `target` and, on success, installs its output as the
    /// code of `target`.
    fn deploy(&mut self, target: Address, initcode: Bytes) -> Result<Computation>;

    /// The code resident at `address`; empty for accounts without code.
    fn code(&mut self, address: Address) -> Result<Bytes>;
}
