use std::fmt;

use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::U256;

use crate::{
    artifact::{parse_type, FrameVar, VarLocation},
    utils::abi::format_value,
};

/// The function a faulting frame was in, with the values of its memory locals.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameDetail {
    pub function: String,
    pub locals: Vec<(String, DynSolValue)>,
}

impl FrameDetail {
    /// Decodes the memory-resident `vars` out of a memory snapshot. Returns `None` when nothing
    /// could be decoded.
    pub fn decode(function: &str, vars: &[FrameVar], memory: &[u8]) -> Option<Self> {
        let locals = vars
            .iter()
            .filter(|var| var.location == VarLocation::Memory)
            .filter_map(|var| {
                let ty = parse_type(&var.ty)
                    .map_err(|err| trace!("skipping local {}: {err}", var.name))
                    .ok()?;
                decode_memory_var(&ty, var.offset, memory).map(|value| (var.name.clone(), value))
            })
            .collect::<Vec<_>>();

        (!locals.is_empty()).then(|| Self { function: function.to_string(), locals })
    }
}

impl fmt::Display for FrameDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}: ", self.function)?;
        for (i, (name, value)) in self.locals.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={}", format_value(value))?;
        }
        f.write_str(">")
    }
}

/// Reads `len` bytes of memory at `offset`. Memory past the snapshot reads as zero.
fn read_memory(memory: &[u8], offset: usize, len: usize) -> Vec<u8> {
    let mut buf = vec![0; len];
    if offset < memory.len() {
        let end = memory.len().min(offset.saturating_add(len));
        buf[..end - offset].copy_from_slice(&memory[offset..end]);
    }
    buf
}

/// Size in memory of a statically sized type, `None` for dynamic types.
fn memory_size(ty: &DynSolType) -> Option<usize> {
    match ty {
        DynSolType::Bool
        | DynSolType::Int(_)
        | DynSolType::Uint(_)
        | DynSolType::FixedBytes(_)
        | DynSolType::Address => Some(32),
        DynSolType::FixedArray(inner, len) => memory_size(inner)?.checked_mul(*len),
        DynSolType::Tuple(types) => {
            types.iter().try_fold(0usize, |total, ty| total.checked_add(memory_size(ty)?))
        }
        _ => None,
    }
}

fn decode_memory_var(ty: &DynSolType, offset: usize, memory: &[u8]) -> Option<DynSolValue> {
    if let Some(size) = memory_size(ty) {
        // Values extending past the snapshot cannot come from a live frame.
        if size > memory.len().max(32) {
            trace!("skipping {} at {offset:#x}: {size} bytes exceed memory", ty.sol_type_name());
            return None;
        }
        return ty
            .abi_decode(&read_memory(memory, offset, size))
            .map_err(|err| trace!("failed to decode {} at {offset:#x}: {err}", ty.sol_type_name()))
            .ok();
    }

    // Byte strings are laid out as a length word followed by their data.
    let len = U256::from_be_slice(&read_memory(memory, offset, 32));
    let len = usize::try_from(len).ok().filter(|len| *len <= memory.len())?;
    let data = read_memory(memory, offset.checked_add(32)?, len);
    match ty {
        DynSolType::String => Some(DynSolValue::String(String::from_utf8_lossy(&data).into_owned())),
        DynSolType::Bytes => Some(DynSolValue::Bytes(data)),
        _ => None,
    }
}
