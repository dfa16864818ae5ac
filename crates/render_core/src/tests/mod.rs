//! Cross-module scenario tests
//!
//! Pools, scene registration, culling and emission run together against the
//! host backend and a recording command sink.

mod frame_scenarios;

use crate::scene::{FaceCulling, PassDesc, PipelineId, PipelineRegistry, ProgramFlags};
use std::collections::HashMap;

/// Numbers pipelines in request order, one per distinct request
#[derive(Debug, Default)]
pub(crate) struct SequentialPipelines {
    issued: HashMap<(PassDesc, ProgramFlags, FaceCulling), PipelineId>,
}

impl SequentialPipelines {
    pub(crate) fn count(&self) -> usize {
        self.issued.len()
    }
}

impl PipelineRegistry for SequentialPipelines {
    fn get_pipeline(&mut self, pass: &PassDesc, flags: ProgramFlags, culling: FaceCulling) -> Option<PipelineId> {
        let next = PipelineId(u32::try_from(self.issued.len()).unwrap());
        Some(*self.issued.entry((*pass, flags, culling)).or_insert(next))
    }
}
