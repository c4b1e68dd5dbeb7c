//! A minimal, label-resolving EVM assembly.
//!
//! This is the common currency between the compiler front end and the fragment compiler: the
//! front end emits [`Assembly`], the harness splices assemblies together and assembles them into
//! bytecode plus a [`SourceMap`].

use std::collections::HashMap;

use alloy_primitives::{ruint::UintTryFrom, Bytes, U256};
use eyre::{bail, Result};
use revm::interpreter::opcode::{JUMPDEST, PUSH0, PUSH2};
use serde::{Deserialize, Serialize};

use crate::analysis::source_map::SourceMap;

use super::SourcePos;

/// Label pushes are always two bytes wide, so offsets are known before labels are resolved.
const LABEL_PUSH_SIZE: usize = 3;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AsmItem {
    /// A single opcode without immediates.
    Op(u8),
    /// A push of minimal width; zero is `PUSH0`.
    Push(U256),
    /// `PUSH2 <offset of label>`.
    PushLabel(String),
    /// A `JUMPDEST` that defines a label.
    Label(String),
    /// Raw bytes.
    Data(Bytes),
}

impl AsmItem {
    fn size(&self) -> usize {
        match self {
            Self::Op(_) | Self::Label(_) => 1,
            Self::Push(value) => 1 + push_width(value),
            Self::PushLabel(_) => LABEL_PUSH_SIZE,
            Self::Data(data) => data.len(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub item: AsmItem,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<SourcePos>,
    /// Label reported when execution faults at (or after) this instruction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<AsmItem> for Instruction {
    fn from(item: AsmItem) -> Self {
        Self { item, pos: None, error: None }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Assembly {
    items: Vec<Instruction>,
}

impl Assembly {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[Instruction] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn push_item(&mut self, item: AsmItem) -> &mut Self {
        self.items.push(item.into());
        self
    }

    pub fn op(&mut self, op: u8) -> &mut Self {
        self.push_item(AsmItem::Op(op))
    }

    pub fn push<T>(&mut self, value: T) -> &mut Self
    where
        U256: UintTryFrom<T>,
    {
        self.push_item(AsmItem::Push(U256::from(value)))
    }

    pub fn push_label(&mut self, label: impl Into<String>) -> &mut Self {
        self.push_item(AsmItem::PushLabel(label.into()))
    }

    pub fn label(&mut self, label: impl Into<String>) -> &mut Self {
        self.push_item(AsmItem::Label(label.into()))
    }

    pub fn data(&mut self, data: impl Into<Bytes>) -> &mut Self {
        self.push_item(AsmItem::Data(data.into()))
    }

    /// Attributes the last instruction to `pos`.
    pub fn at(&mut self, pos: SourcePos) -> &mut Self {
        if let Some(last) = self.items.last_mut() {
            last.pos = Some(pos);
        }
        self
    }

    /// Tags the last instruction with an error label.
    pub fn with_error(&mut self, label: impl Into<String>) -> &mut Self {
        if let Some(last) = self.items.last_mut() {
            last.error = Some(label.into());
        }
        self
    }

    pub fn append(&mut self, other: Self) -> &mut Self {
        self.items.extend(other.items);
        self
    }

    /// Assembles into bytecode, resolving labels and collecting the program-counter maps.
    pub fn assemble(&self) -> Result<(Bytes, SourceMap)> {
        let mut labels = HashMap::new();
        let mut pc = 0;
        for ins in &self.items {
            if let AsmItem::Label(name) = &ins.item {
                if labels.insert(name.as_str(), pc).is_some() {
                    bail!("duplicate label `{name}`");
                }
                if pc > u16::MAX as usize {
                    bail!("label `{name}` at {pc} is out of PUSH2 range");
                }
            }
            pc += ins.item.size();
        }

        let mut code = Vec::with_capacity(pc);
        let mut source_map = SourceMap::default();
        for ins in &self.items {
            let pc = code.len();
            if let Some(pos) = ins.pos {
                source_map.pc_pos.insert(pc, pos);
            }
            if let Some(error) = &ins.error {
                source_map.error_map.insert(pc, error.clone());
            }

            match &ins.item {
                AsmItem::Op(op) => code.push(*op),
                AsmItem::Push(value) => {
                    let width = push_width(value);
                    code.push(PUSH0 + width as u8);
                    code.extend_from_slice(&value.to_be_bytes::<32>()[32 - width..]);
                }
                AsmItem::PushLabel(name) => {
                    let Some(target) = labels.get(name.as_str()) else {
                        bail!("undefined label `{name}`");
                    };
                    code.push(PUSH2);
                    code.extend_from_slice(&(*target as u16).to_be_bytes());
                }
                AsmItem::Label(_) => code.push(JUMPDEST),
                AsmItem::Data(data) => code.extend_from_slice(data),
            }
        }

        Ok((code.into(), source_map))
    }
}

#[inline]
fn push_width(value: &U256) -> usize {
    value.byte_len()
}
