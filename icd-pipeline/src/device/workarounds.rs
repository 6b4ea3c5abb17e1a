// Copyright (c) 2026 The icd-pipeline contributors
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Hardware errata.
//!
//! Some hardware revisions need extra pipeline flushes around state changes. Which flushes are
//! needed depends on the revision, on which shader stages the pipeline uses and on some of its
//! state. These rules are data: a [`WorkaroundTable`] is injected into the device, and the
//! pipeline compiler records the flags of every matching rule.

use super::{Generation, HardwareRevision};
use crate::{macros::vulkan_bitflags, shader::ShaderStages};
use std::ops::RangeInclusive;

vulkan_bitflags! {
    /// Extra commands emitted before or after the state of a pipeline.
    WorkaroundFlags = (u32);

    /// A post-sync flush with a stall at the scoreboard.
    POST_SYNC_FLUSH = 1 << 0,

    /// A depth stall and an immediate write, needed before the vertex shader state changes on
    /// GEN7.
    VS_FLUSH = 1 << 1,

    /// A depth cache flush, needed after changing multisample state on GEN7.
    MULTISAMPLE_FLUSH = 1 << 2,
}

/// A condition on the pipeline state that a rule depends on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WorkaroundCondition {
    Always,

    /// The pipeline rasterizes with more than one sample.
    Multisampled,

    /// The pipeline has rasterizer discard enabled.
    RasterizerDiscard,

    /// The pipeline writes stream output.
    StreamOutput,
}

/// One erratum.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct WorkaroundRule {
    pub generation: Generation,

    /// The steppings of `generation` affected.
    pub steppings: RangeInclusive<u32>,

    /// The rule applies only if all of these stages are active in the pipeline.
    pub stages: ShaderStages,

    pub condition: WorkaroundCondition,

    /// Flags emitted before the pipeline state.
    pub pre_bind: WorkaroundFlags,

    /// Flags emitted after the pipeline state.
    pub post_bind: WorkaroundFlags,
}

impl WorkaroundRule {
    fn matches(&self, query: &WorkaroundQuery) -> bool {
        self.generation == query.revision.generation
            && self.steppings.contains(&query.revision.stepping)
            && query.active_stages.contains(self.stages)
            && match self.condition {
                WorkaroundCondition::Always => true,
                WorkaroundCondition::Multisampled => query.multisampled,
                WorkaroundCondition::RasterizerDiscard => query.rasterizer_discard,
                WorkaroundCondition::StreamOutput => query.stream_output,
            }
    }
}

/// What a pipeline looks like to the errata rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkaroundQuery {
    pub revision: HardwareRevision,
    pub active_stages: ShaderStages,
    pub multisampled: bool,
    pub rasterizer_discard: bool,
    pub stream_output: bool,
}

/// The flags that apply to a pipeline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorkaroundSet {
    pub pre_bind: WorkaroundFlags,
    pub post_bind: WorkaroundFlags,
}

impl WorkaroundSet {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pre_bind.is_empty() && self.post_bind.is_empty()
    }
}

/// A read-only list of errata rules.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkaroundTable {
    rules: Vec<WorkaroundRule>,
}

impl WorkaroundTable {
    #[inline]
    pub fn new(rules: Vec<WorkaroundRule>) -> Self {
        WorkaroundTable { rules }
    }

    /// A table without any rules.
    #[inline]
    pub fn empty() -> Self {
        WorkaroundTable { rules: Vec::new() }
    }

    /// The errata of the GEN6 and GEN7 families.
    pub fn intel() -> Self {
        const ALL_STEPPINGS: RangeInclusive<u32> = 0..=u32::MAX;

        WorkaroundTable::new(vec![
            // The 3D pipeline must be flushed with a post-sync operation before any state
            // change on GEN6.
            WorkaroundRule {
                generation: Generation::Gen6,
                steppings: ALL_STEPPINGS,
                stages: ShaderStages::VERTEX,
                condition: WorkaroundCondition::Always,
                pre_bind: WorkaroundFlags::POST_SYNC_FLUSH,
                post_bind: WorkaroundFlags::empty(),
            },
            WorkaroundRule {
                generation: Generation::Gen7,
                steppings: ALL_STEPPINGS,
                stages: ShaderStages::VERTEX,
                condition: WorkaroundCondition::Always,
                pre_bind: WorkaroundFlags::VS_FLUSH,
                post_bind: WorkaroundFlags::empty(),
            },
            WorkaroundRule {
                generation: Generation::Gen7,
                steppings: ALL_STEPPINGS,
                stages: ShaderStages::FRAGMENT,
                condition: WorkaroundCondition::Multisampled,
                pre_bind: WorkaroundFlags::empty(),
                post_bind: WorkaroundFlags::MULTISAMPLE_FLUSH,
            },
            WorkaroundRule {
                generation: Generation::Gen7_5,
                steppings: ALL_STEPPINGS,
                stages: ShaderStages::FRAGMENT,
                condition: WorkaroundCondition::Multisampled,
                pre_bind: WorkaroundFlags::empty(),
                post_bind: WorkaroundFlags::MULTISAMPLE_FLUSH,
            },
            // Early GEN7 steppings hang when the geometry shader state is switched without a
            // flush.
            WorkaroundRule {
                generation: Generation::Gen7,
                steppings: 0..=1,
                stages: ShaderStages::GEOMETRY,
                condition: WorkaroundCondition::Always,
                pre_bind: WorkaroundFlags::empty(),
                post_bind: WorkaroundFlags::POST_SYNC_FLUSH,
            },
            WorkaroundRule {
                generation: Generation::Gen7_5,
                steppings: ALL_STEPPINGS,
                stages: ShaderStages::COMPUTE,
                condition: WorkaroundCondition::Always,
                pre_bind: WorkaroundFlags::POST_SYNC_FLUSH,
                post_bind: WorkaroundFlags::empty(),
            },
        ])
    }

    /// Returns the rules of the table.
    #[inline]
    pub fn rules(&self) -> &[WorkaroundRule] {
        &self.rules
    }

    /// Returns the union of the flags of every rule matching `query`.
    pub fn lookup(&self, query: &WorkaroundQuery) -> WorkaroundSet {
        self.rules
            .iter()
            .filter(|rule| rule.matches(query))
            .fold(WorkaroundSet::default(), |set, rule| WorkaroundSet {
                pre_bind: set.pre_bind | rule.pre_bind,
                post_bind: set.post_bind | rule.post_bind,
            })
    }
}
