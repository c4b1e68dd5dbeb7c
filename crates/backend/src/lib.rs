//! # splice-backend
//!
//! Deploys compiled contracts on an in-memory EVM, calls them, evaluates source snippets against
//! their live state and attributes faults to source across contract boundaries.

#[macro_use]
extern crate tracing;

pub mod analysis;
pub mod artifact;
pub mod contract;
mod core;
pub mod engine;
pub mod error;
pub mod fragment;
pub mod frontend;
mod inspector;
mod utils;

pub use crate::{
    analysis::trace::{ExecutionReport, ReportFrame},
    artifact::{
        deploy::{Blueprint, Deployer},
        Artifact, FunctionSignature,
    },
    contract::{CallArg, ContractInstance, FunctionBinding, HasAddress, TaggedValue},
    core::Env,
    error::{HarnessError, Result},
    fragment::{CompiledFragment, FRAGMENT_CALLDATA},
    frontend::{Frontend, FrontendError},
};

pub use splice_utils::config::HarnessConfig;
