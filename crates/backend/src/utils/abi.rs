use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{keccak256, Selector};
use alloy_sol_types::{Panic, Revert, SolError};

/// The 4-byte method id of a canonical signature.
#[inline]
pub fn selector(signature: &str) -> Selector {
    Selector::from_slice(&keccak256(signature)[..4])
}

/// Canonical signature `name(t1,t2,...)`.
pub fn signature<'a>(name: &str, types: impl IntoIterator<Item = &'a DynSolType>) -> String {
    let types = types.into_iter().map(|ty| ty.sol_type_name()).collect::<Vec<_>>();
    format!("{name}({})", types.join(","))
}

/// Decodes `Error(string)` and `Panic(uint256)` revert payloads.
pub fn decode_revert_reason(output: &[u8]) -> Option<String> {
    if output.starts_with(&Revert::SELECTOR) {
        return Revert::abi_decode(output, false).ok().map(|revert| revert.reason);
    }
    if output.starts_with(&Panic::SELECTOR) {
        return Panic::abi_decode(output, false)
            .ok()
            .map(|panic| format!("panic code {:#x}", panic.code));
    }
    None
}

/// Decodes return data of the declared type. Non-tuple types are returned bare, not wrapped in
/// the return tuple.
pub fn decode_return(ty: &DynSolType, output: &[u8]) -> Result<DynSolValue, alloy_dyn_abi::Error> {
    if let DynSolType::Tuple(_) = ty {
        return ty.abi_decode_params(output);
    }

    match DynSolType::Tuple(vec![ty.clone()]).abi_decode_params(output)? {
        DynSolValue::Tuple(mut values) if values.len() == 1 => Ok(values.remove(0)),
        other => Ok(other),
    }
}

/// Human-readable rendering of a value.
pub fn format_value(value: &DynSolValue) -> String {
    match value {
        DynSolValue::Bool(b) => b.to_string(),
        DynSolValue::Int(i, _) => i.to_string(),
        DynSolValue::Uint(u, _) => u.to_string(),
        DynSolValue::FixedBytes(word, size) => hex::encode_prefixed(&word[..*size]),
        DynSolValue::Address(addr) => addr.to_string(),
        DynSolValue::Bytes(bytes) => hex::encode_prefixed(bytes),
        DynSolValue::String(s) => format!("{s:?}"),
        DynSolValue::Array(values) | DynSolValue::FixedArray(values) => {
            format!("[{}]", values.iter().map(format_value).collect::<Vec<_>>().join(", "))
        }
        DynSolValue::Tuple(values) => {
            format!("({})", values.iter().map(format_value).collect::<Vec<_>>().join(", "))
        }
        other => format!("{other:?}"),
    }
}
