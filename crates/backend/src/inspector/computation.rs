//! Inspector recording the [`Computation`] tree of a transaction.

use alloy_primitives::{Address, Bytes, U256};
use revm::{
    interpreter::{
        opcode, CallInputs, CallOutcome, CallScheme, CreateInputs, CreateOutcome,
        InstructionResult, Interpreter, InterpreterResult,
    },
    Database, EvmContext, Inspector,
};

use crate::{
    engine::{Computation, FrameKind, Outcome},
    utils::evm::net_gas,
};

use super::AssertionUnwrap;

#[derive(Debug, Default)]
struct FrameNode {
    parent: Option<usize>,
    children: Vec<usize>,
    computation: Computation,
}

/// Records every message-call frame of a transaction: its program-counter trace, its memory when
/// it ended and its outcome.
///
/// It also implements the two non-standard features of an execution request for the outermost
/// frame: a synthetic `CODESIZE` and a start program counter other than zero.
#[derive(Debug, Default)]
pub struct ComputationInspector {
    arena: Vec<FrameNode>,
    head: Option<usize>,

    fake_codesize: Option<usize>,
    start_pc: Option<usize>,
    // The outermost frame is about to execute CODESIZE.
    pending_codesize: bool,
}

impl ComputationInspector {
    pub fn new(fake_codesize: Option<usize>, start_pc: Option<usize>) -> Self {
        Self { fake_codesize, start_pc, ..Default::default() }
    }

    /// Enters a new frame, as a child of the current one.
    fn enter(&mut self, kind: FrameKind, code_address: Address, target: Address, calldata: Bytes) {
        let loc = self.arena.len();
        if let Some(parent) = self.head {
            self.arena[parent].children.push(loc);
        }

        self.arena.push(FrameNode {
            parent: self.head,
            children: Vec::new(),
            computation: Computation {
                kind,
                code_address,
                target,
                calldata,
                ..Default::default()
            },
        });
        self.head = Some(loc);
    }

    /// Exits the current frame, returning to its parent.
    fn exit(&mut self, result: &InterpreterResult) {
        let Some(head) = self.head else {
            debug_assert!(false, "exiting a frame that was never entered");
            return;
        };

        let node = &mut self.arena[head];
        let computation = &mut node.computation;
        computation.output = result.output.clone();
        computation.gas_used =
            net_gas(result.gas.spent(), result.gas.refunded() as u64);
        computation.outcome = if result.result.is_ok() {
            Outcome::Success
        } else if result.result.is_revert() {
            Outcome::Revert
        } else {
            Outcome::Halt(format!("{:?}", result.result))
        };

        self.head = node.parent;
    }

    #[inline]
    fn current(&mut self) -> &mut Computation {
        let head = self.head.assert_unwrap("no active frame");
        &mut self.arena[head].computation
    }

    #[inline]
    fn is_outermost(&self) -> bool {
        self.head == Some(0)
    }

    /// Consumes the inspector, returning the outermost computation with its call tree.
    pub fn into_computation(mut self) -> Option<Computation> {
        if self.arena.is_empty() {
            return None;
        }
        Some(build(&mut self.arena, 0))
    }
}

fn build(arena: &mut [FrameNode], loc: usize) -> Computation {
    let children = std::mem::take(&mut arena[loc].children);
    let mut computation = std::mem::take(&mut arena[loc].computation);
    computation.children = children.into_iter().map(|child| build(arena, child)).collect();
    computation
}

impl<DB> Inspector<DB> for ComputationInspector
where
    DB: Database,
{
    fn initialize_interp(&mut self, interp: &mut Interpreter, _context: &mut EvmContext<DB>) {
        self.current().bytecode =
            Bytes::copy_from_slice(interp.contract.bytecode.original_byte_slice());

        if !self.is_outermost() {
            return;
        }

        if let Some(start_pc) = self.start_pc.take() {
            if start_pc < interp.bytecode.len() {
                interp.instruction_pointer = interp.bytecode.as_ptr().wrapping_add(start_pc);
            } else {
                warn!("start pc {start_pc} is beyond the end of the code, ignored");
            }
        }
    }

    fn step(&mut self, interp: &mut Interpreter, _context: &mut EvmContext<DB>) {
        let pc = interp.program_counter();
        self.pending_codesize = self.fake_codesize.is_some() &&
            self.is_outermost() &&
            interp.current_opcode() == opcode::CODESIZE;
        self.current().trace.push(pc);
    }

    fn step_end(&mut self, interp: &mut Interpreter, _context: &mut EvmContext<DB>) {
        if std::mem::take(&mut self.pending_codesize) &&
            interp.instruction_result == InstructionResult::Continue
        {
            if let (Some(size), Some(top)) = (self.fake_codesize, interp.stack.data_mut().last_mut())
            {
                *top = U256::from(size);
            }
        }

        // Keep the memory of the last instruction of the frame, be it a normal or an exceptional
        // halt. Calls out are overwritten once the frame resumes.
        if interp.instruction_result != InstructionResult::Continue {
            self.current().memory = interp.shared_memory.context_memory().to_vec().into();
        }
    }

    fn call(&mut self, _context: &mut EvmContext<DB>, inputs: &mut CallInputs) -> Option<CallOutcome> {
        let kind = match inputs.scheme {
            CallScheme::StaticCall => FrameKind::StaticCall,
            CallScheme::DelegateCall => FrameKind::DelegateCall,
            CallScheme::CallCode => FrameKind::CallCode,
            _ => FrameKind::Call,
        };
        self.enter(kind, inputs.bytecode_address, inputs.target_address, inputs.input.clone());

        None
    }

    fn call_end(
        &mut self,
        _context: &mut EvmContext<DB>,
        _inputs: &CallInputs,
        outcome: CallOutcome,
    ) -> CallOutcome {
        self.exit(&outcome.result);

        outcome
    }

    fn create(
        &mut self,
        _context: &mut EvmContext<DB>,
        inputs: &mut CreateInputs,
    ) -> Option<CreateOutcome> {
        // The address is only known once the frame returns.
        self.enter(FrameKind::Create, Address::ZERO, Address::ZERO, inputs.init_code.clone());

        None
    }

    fn create_end(
        &mut self,
        _context: &mut EvmContext<DB>,
        _inputs: &CreateInputs,
        outcome: CreateOutcome,
    ) -> CreateOutcome {
        if let Some(address) = outcome.address {
            let current = self.current();
            current.code_address = address;
            current.target = address;
        }
        self.exit(&outcome.result);

        outcome
    }
}
