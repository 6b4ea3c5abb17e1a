// Copyright (c) 2026 The icd-pipeline contributors
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! The compiled form of a pipeline's state.
//!
//! Everything the hardware needs when the pipeline is bound is either baked into the command
//! stream, or lives in a state object whose offset is recorded here. State objects are owned by
//! the pipeline through [`StateAllocations`], which hands them back to the device's allocator
//! when dropped.

use super::{
    color_blend::ColorBlendState,
    depth_stencil::DepthStencilState,
    input_assembly::{PrimitiveTopology, ProvokingVertexMode, ProvokingVertices, ReducedPrimitive},
    rasterization::{RasterizationState, SampleCount},
    stream_output::StreamOutputState,
    tessellation::TessellationState,
    PipelineBindPoint,
};
use crate::{
    device::{
        StateAllocationError, StateAllocator, StateKind, StateOffset, StateRequest, WorkaroundSet,
    },
    format::Format,
    shader::{ShaderStage, ShaderStages},
};
use std::{
    fmt::{Debug, Error as FmtError, Formatter},
    hash::Hash,
    sync::Arc,
};

// Sizes of the state objects, in dwords per element.
const SF_VIEWPORT_DWORDS: u32 = 8;
const CLIP_VIEWPORT_DWORDS: u32 = 4;
const SF_CLIP_VIEWPORT_DWORDS: u32 = 16;
const CC_VIEWPORT_DWORDS: u32 = 2;
const COLOR_CALC_DWORDS: u32 = 6;
const BLEND_DWORDS: u32 = 2;
const DEPTH_STENCIL_DWORDS: u32 = 3;
const SCISSOR_RECT_DWORDS: u32 = 2;
const SAMPLER_DWORDS: u32 = 4;
const INTERFACE_DESCRIPTOR_DWORDS: u32 = 8;

/// The size of a push constant buffer is a multiple of this many bytes.
pub const PUSH_CONSTANT_GRANULARITY: u32 = 32;

/// The size in bytes of an interface descriptor.
pub const INTERFACE_DESCRIPTOR_SIZE: u32 = INTERFACE_DESCRIPTOR_DWORDS * 4;

/// Offsets of the fixed-function state objects of a graphics pipeline.
///
/// Which of them are present depends on the generation: GEN6 has separate SF and clip
/// viewports, later generations have a combined SF/clip viewport.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FixedFunctionOffsets {
    pub sf_viewport: Option<StateOffset>,
    pub clip_viewport: Option<StateOffset>,
    pub sf_clip_viewport: Option<StateOffset>,
    pub cc_viewport: Option<StateOffset>,
    pub color_calc: Option<StateOffset>,
    pub blend: Option<StateOffset>,
    pub depth_stencil: Option<StateOffset>,
    pub scissor: Option<StateOffset>,
}

impl FixedFunctionOffsets {
    pub(crate) fn iter(&self) -> impl Iterator<Item = Option<StateOffset>> {
        [
            self.sf_viewport,
            self.clip_viewport,
            self.sf_clip_viewport,
            self.cc_viewport,
            self.color_calc,
            self.blend,
            self.depth_stencil,
            self.scissor,
        ]
        .into_iter()
    }
}

/// The resources of one shader stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StageBindings {
    pub binding_table: Option<StateOffset>,

    /// The size of the binding table in bytes.
    pub binding_table_size: u32,

    pub sampler_table: Option<StateOffset>,

    /// The number of sampler states in the sampler table.
    pub sampler_count: u32,

    pub push_constants: Option<StateOffset>,

    /// The size of the push constant buffer in bytes, a multiple of
    /// [`PUSH_CONSTANT_GRANULARITY`].
    pub push_constant_size: u32,
}

/// The compiled state specific to graphics pipelines.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphicsState {
    pub topology: PrimitiveTopology,

    /// The hardware primitive type (`3DPRIM_*`).
    pub prim_type: u32,

    pub primitive_restart_enable: bool,
    pub primitive_restart_index: u32,

    pub provoking_vertex: ProvokingVertexMode,

    /// The provoking vertex of each class of primitive.
    pub provoking_vertices: ProvokingVertices,

    pub reduced_primitive: ReducedPrimitive,

    pub depth_attachment_format: Option<Format>,
    pub color_blend_state: ColorBlendState,
    pub depth_stencil_state: DepthStencilState,
    pub rasterization_state: RasterizationState,
    pub rasterization_samples: SampleCount,
    pub tessellation_state: Option<TessellationState>,
    pub stream_output_state: Option<StreamOutputState>,

    pub viewport_count: u32,
    pub scissor_enable: bool,

    pub offsets: FixedFunctionOffsets,
}

/// Everything a pipeline compiled to, apart from its shaders.
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledState {
    pub bind_point: PipelineBindPoint,
    pub active_stages: ShaderStages,

    /// Present for graphics pipelines only.
    pub graphics: Option<GraphicsState>,

    /// Indexed by [`ShaderStage::index`].
    pub stage_bindings: [StageBindings; 6],

    /// Present for compute pipelines only.
    pub interface_descriptor: Option<StateOffset>,

    pub workarounds: WorkaroundSet,
}

impl CompiledState {
    /// Returns the bindings of `stage`.
    #[inline]
    pub fn stage_bindings(&self, stage: ShaderStage) -> &StageBindings {
        &self.stage_bindings[stage.index()]
    }

    /// Returns every state offset the compiled state refers to.
    pub(crate) fn offsets(&self) -> impl Iterator<Item = StateOffset> + '_ {
        let fixed_function = self
            .graphics
            .iter()
            .flat_map(|graphics| graphics.offsets.iter());
        let stages = self.stage_bindings.iter().flat_map(|bindings| {
            [
                bindings.binding_table,
                bindings.sampler_table,
                bindings.push_constants,
            ]
        });

        fixed_function
            .chain(stages)
            .chain([self.interface_descriptor])
            .flatten()
    }
}

/// Describes a state object, for allocation.
pub(crate) struct StateLayout;

impl StateLayout {
    pub(crate) fn sf_viewport(count: u32, description: &impl Hash) -> StateRequest {
        StateRequest::new(
            StateKind::SfViewport,
            count * SF_VIEWPORT_DWORDS * 4,
            32,
            description,
        )
    }

    pub(crate) fn clip_viewport(count: u32, description: &impl Hash) -> StateRequest {
        StateRequest::new(
            StateKind::ClipViewport,
            count * CLIP_VIEWPORT_DWORDS * 4,
            32,
            description,
        )
    }

    pub(crate) fn sf_clip_viewport(count: u32, description: &impl Hash) -> StateRequest {
        StateRequest::new(
            StateKind::SfClipViewport,
            count * SF_CLIP_VIEWPORT_DWORDS * 4,
            64,
            description,
        )
    }

    pub(crate) fn cc_viewport(count: u32, description: &impl Hash) -> StateRequest {
        StateRequest::new(
            StateKind::CcViewport,
            count * CC_VIEWPORT_DWORDS * 4,
            32,
            description,
        )
    }

    pub(crate) fn color_calc(description: &impl Hash) -> StateRequest {
        StateRequest::new(StateKind::ColorCalc, COLOR_CALC_DWORDS * 4, 64, description)
    }

    pub(crate) fn blend(attachments: u32, description: &impl Hash) -> StateRequest {
        StateRequest::new(
            StateKind::Blend,
            attachments * BLEND_DWORDS * 4,
            64,
            description,
        )
    }

    pub(crate) fn depth_stencil(description: &impl Hash) -> StateRequest {
        StateRequest::new(
            StateKind::DepthStencil,
            DEPTH_STENCIL_DWORDS * 4,
            64,
            description,
        )
    }

    pub(crate) fn scissor(count: u32, description: &impl Hash) -> StateRequest {
        StateRequest::new(
            StateKind::Scissor,
            count * SCISSOR_RECT_DWORDS * 4,
            32,
            description,
        )
    }

    pub(crate) fn binding_table(size: u32, description: &impl Hash) -> StateRequest {
        StateRequest::new(StateKind::BindingTable, size, 32, description)
    }

    pub(crate) fn sampler_table(count: u32, description: &impl Hash) -> StateRequest {
        StateRequest::new(
            StateKind::SamplerTable,
            count * SAMPLER_DWORDS * 4,
            32,
            description,
        )
    }

    pub(crate) fn push_constants(size: u32, description: &impl Hash) -> StateRequest {
        StateRequest::new(StateKind::PushConstants, size, 32, description)
    }

    pub(crate) fn interface_descriptor(description: &impl Hash) -> StateRequest {
        StateRequest::new(
            StateKind::InterfaceDescriptor,
            INTERFACE_DESCRIPTOR_SIZE,
            32,
            description,
        )
    }
}

/// Rounds a push constant size up to the hardware granularity.
#[inline]
pub(crate) const fn push_constant_buffer_size(size: u32) -> u32 {
    size.div_ceil(PUSH_CONSTANT_GRANULARITY) * PUSH_CONSTANT_GRANULARITY
}

/// A state object owned by a pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StateRecord {
    pub request: StateRequest,
    pub offset: StateOffset,
}

/// The state objects of a pipeline, released back to the allocator on drop.
///
/// Creation builds one of these before allocating anything, so that every failure path releases
/// what was allocated so far.
pub(crate) struct StateAllocations {
    allocator: Arc<dyn StateAllocator>,
    records: Vec<StateRecord>,
}

impl StateAllocations {
    pub(crate) fn new(allocator: Arc<dyn StateAllocator>) -> Self {
        StateAllocations {
            allocator,
            records: Vec::new(),
        }
    }

    pub(crate) fn allocate(
        &mut self,
        request: StateRequest,
    ) -> Result<StateOffset, StateAllocationError> {
        let offset = self.allocator.allocate(&request)?;
        log::trace!(
            "allocated {} bytes of {:?} state at {:#x}",
            request.size,
            request.kind,
            offset.get(),
        );
        self.records.push(StateRecord { request, offset });

        Ok(offset)
    }

    pub(crate) fn import(&mut self, record: StateRecord) -> Result<(), StateAllocationError> {
        self.allocator.import(&record.request, record.offset)?;
        self.records.push(record);

        Ok(())
    }

    #[inline]
    pub(crate) fn records(&self) -> &[StateRecord] {
        &self.records
    }
}

impl Drop for StateAllocations {
    fn drop(&mut self) {
        for record in self.records.drain(..).rev() {
            self.allocator.release(record.offset);
        }
    }
}

impl Debug for StateAllocations {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.debug_list().entries(&self.records).finish()
    }
}
