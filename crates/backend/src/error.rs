use alloy_primitives::Address;

use crate::{analysis::trace::ExecutionReport, frontend::FrontendError};

pub type Result<T, E = HarnessError> = std::result::Result<T, E>;

/// Errors surfaced to the user of the harness.
///
/// All faults surface synchronously from the call that triggered them.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// The constructor computation faulted.
    #[error("deployment of {contract} at {address} failed: {reason}")]
    Deployment { contract: String, address: Address, reason: String },

    /// The number of supplied arguments is outside the declared bounds.
    #[error("bad args to `{function}`: expected between {min} and {max} arguments, got {got}")]
    Argument { function: String, min: usize, max: usize, got: usize },

    /// The supplied argument values do not match the selected ABI signature.
    #[error("bad args to `{function}`: values do not match `{expected}`")]
    ArgumentType { function: String, expected: String },

    /// A call or a fragment evaluation faulted.
    #[error("{0}")]
    ContractExecution(Box<ExecutionReport>),

    #[error("unknown function `{0}`")]
    UnknownFunction(String),

    #[error("no frontend attached to {contract}, cannot evaluate `{snippet}`")]
    NoFrontend { contract: String, snippet: String },

    /// The eval cache outgrew its capacity. This is a bug.
    #[error("eval cache holds {len} entries, exceeding its capacity of {capacity}")]
    CacheInvariantViolation { len: usize, capacity: usize },

    #[error(transparent)]
    Frontend(#[from] FrontendError),

    #[error(transparent)]
    Abi(#[from] alloy_dyn_abi::Error),

    #[error("{0:#}")]
    Internal(eyre::Report),
}

impl From<eyre::Report> for HarnessError {
    fn from(err: eyre::Report) -> Self {
        Self::Internal(err)
    }
}

impl HarnessError {
    /// Returns the fault report if this is a contract execution error.
    pub fn report(&self) -> Option<&ExecutionReport> {
        match self {
            Self::ContractExecution(report) => Some(report),
            _ => None,
        }
    }
}
