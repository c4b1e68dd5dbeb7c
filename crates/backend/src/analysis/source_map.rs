use std::{collections::BTreeMap, fmt};

use alloy_primitives::Address;

use crate::artifact::SourcePos;

/// Program-counter maps of a piece of assembled code.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceMap {
    /// pc -> source position.
    pub pc_pos: BTreeMap<usize, SourcePos>,
    /// pc -> declared error label.
    pub error_map: BTreeMap<usize, String>,
}

/// No pc of a trace maps to a source position. Degrades a frame's attribution, never surfaced.
#[derive(Debug)]
pub(crate) struct SourceResolutionMiss {
    pub address: Address,
    pub steps: usize,
}

impl fmt::Display for SourceResolutionMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "none of the {} executed pcs of {} maps to source", self.steps, self.address)
    }
}

impl SourceMap {
    /// The source position of the most recently executed pc that has one.
    pub fn find_source(&self, trace: &[usize]) -> Option<SourcePos> {
        self.find_mapped_pc(trace).map(|(_, pos)| pos)
    }

    /// The most recently executed pc that maps to source, with its position.
    pub fn find_mapped_pc(&self, trace: &[usize]) -> Option<(usize, SourcePos)> {
        trace.iter().rev().find_map(|pc| self.pc_pos.get(pc).map(|pos| (*pc, *pos)))
    }

    /// The error label of the most recently executed pc that has one.
    pub fn find_error(&self, trace: &[usize]) -> Option<&str> {
        trace.iter().rev().find_map(|pc| self.error_map.get(pc).map(String::as_str))
    }

    pub(crate) fn resolve(
        &self,
        address: Address,
        trace: &[usize],
    ) -> Result<(usize, SourcePos), SourceResolutionMiss> {
        self.find_mapped_pc(trace).ok_or(SourceResolutionMiss { address, steps: trace.len() })
    }
}
