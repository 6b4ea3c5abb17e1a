// Copyright (c) 2026 The icd-pipeline contributors
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Describes a processing operation that will execute on the GPU.
//!
//! A pipeline is created from a description of its shader stages and fixed-function state, and
//! is immutable afterwards. Creation does all the work that would otherwise happen on every draw
//! or dispatch: it validates the description, maps the resources of every stage to binding table
//! slots, places the fixed-function state in state objects and emits the commands that program
//! the hardware. Binding the pipeline then only replays its [`CommandStream`].
//!
//! There are two kinds of pipelines:
//!
//! - Graphics pipelines, created with [`Pipeline::new_graphics`], used for drawing.
//! - Compute pipelines, created with [`Pipeline::new_compute`], used for dispatching.
//!
//! Switching from one pipeline to another can use a [`PipelineDelta`](delta::PipelineDelta),
//! which holds only the commands that differ. Pipelines can also be
//! [stored](Pipeline::store) as a binary blob and [loaded](Pipeline::load) back.

pub use self::creation_error::PipelineCreationError;
use self::{
    binding_table::BindingTableTemplate,
    command_stream::{CommandStream, Packet},
    resource_map::ResourceMap,
    state::{
        push_constant_buffer_size, CompiledState, GraphicsState, StageBindings, StateAllocations,
        StateLayout, StateRecord,
    },
};
use crate::{
    device::{Device, DeviceOwned, WorkaroundSet},
    macros::{impl_id_counter, vulkan_enum},
    shader::{CompiledShader, PipelineShaderStageCreateInfo, ShaderStage, ShaderStages},
    DriverObject, Handle, ObjectType,
};
use smallvec::SmallVec;
use std::{
    fmt::{Debug, Error as FmtError, Formatter},
    num::NonZero,
    sync::Arc,
};

pub mod binding_table;
pub mod color_blend;
pub mod command_stream;
pub mod compute;
mod creation_error;
pub mod delta;
pub mod depth_stencil;
pub mod graphics;
pub mod input_assembly;
pub mod rasterization;
pub mod resource_map;
pub mod serialize;
pub mod state;
pub mod stream_output;
pub mod tessellation;
pub mod viewport;

vulkan_enum! {
    /// The type of a pipeline.
    ///
    /// When binding a pipeline or descriptor sets in a command buffer, the state for each bind
    /// point is independent from the others. This means that it is possible, for example, to bind
    /// a graphics pipeline without disturbing any bound compute pipeline. Likewise, binding
    /// descriptor sets to the `Compute` bind point does not affect sets that were bound to the
    /// `Graphics` bind point.
    PipelineBindPoint = PipelineBindPoint(i32);

    Compute = COMPUTE,

    Graphics = GRAPHICS,
}

/// A shader stage of a compiled pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineShader {
    stage: ShaderStage,
    shader: CompiledShader,
    resource_map: Option<ResourceMap>,
    binding_table: BindingTableTemplate,
}

impl PipelineShader {
    #[inline]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// Returns the machine code and interface of the stage.
    #[inline]
    pub fn shader(&self) -> &CompiledShader {
        &self.shader
    }

    /// Returns the resource map of the stage. Only stages that can access resources have one.
    #[inline]
    pub fn resource_map(&self) -> Option<&ResourceMap> {
        self.resource_map.as_ref()
    }

    /// Returns the layout of the binding table of the stage.
    #[inline]
    pub fn binding_table(&self) -> &BindingTableTemplate {
        &self.binding_table
    }
}

/// A compiled graphics or compute pipeline.
///
/// The state objects of the pipeline are released back to the device's allocator when the last
/// `Arc` is dropped.
pub struct Pipeline {
    device: Arc<Device>,
    id: NonZero<u64>,
    shaders: SmallVec<[PipelineShader; 5]>,
    state: CompiledState,
    packets: SmallVec<[Packet; 16]>,
    commands: CommandStream,
    allocations: StateAllocations,
}

impl Pipeline {
    fn from_compiled(
        device: Arc<Device>,
        shaders: SmallVec<[PipelineShader; 5]>,
        state: CompiledState,
        allocations: StateAllocations,
    ) -> Arc<Pipeline> {
        let packets = command_stream::emit(device.generation(), &state);
        let commands = CommandStream::from_packets(&packets);

        Arc::new(Pipeline {
            device,
            id: Self::next_id(),
            shaders,
            state,
            packets,
            commands,
            allocations,
        })
    }

    /// Returns the bind point of the pipeline.
    #[inline]
    pub fn bind_point(&self) -> PipelineBindPoint {
        self.state.bind_point
    }

    /// Returns the stages of the pipeline.
    #[inline]
    pub fn active_stages(&self) -> ShaderStages {
        self.state.active_stages
    }

    /// Returns the shader stages, in pipeline order.
    #[inline]
    pub fn shaders(&self) -> &[PipelineShader] {
        &self.shaders
    }

    /// Returns the shader of `stage`, if the pipeline has that stage.
    #[inline]
    pub fn shader(&self, stage: ShaderStage) -> Option<&PipelineShader> {
        self.shaders.iter().find(|shader| shader.stage == stage)
    }

    /// Returns everything the pipeline compiled to.
    #[inline]
    pub fn state(&self) -> &CompiledState {
        &self.state
    }

    /// Returns the state specific to graphics pipelines, or `None` for a compute pipeline.
    #[inline]
    pub fn graphics_state(&self) -> Option<&GraphicsState> {
        self.state.graphics.as_ref()
    }

    /// Returns the errata flushes emitted around the state of the pipeline.
    #[inline]
    pub fn workarounds(&self) -> WorkaroundSet {
        self.state.workarounds
    }

    /// Returns the commands replayed when the pipeline is bound.
    #[inline]
    pub fn commands(&self) -> &CommandStream {
        &self.commands
    }

    /// Returns the commands, split into packets.
    #[inline]
    pub fn packets(&self) -> &[Packet] {
        &self.packets
    }

    /// Returns the state objects owned by the pipeline, in allocation order.
    #[inline]
    pub fn state_records(&self) -> &[StateRecord] {
        self.allocations.records()
    }
}

impl Debug for Pipeline {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.debug_struct("Pipeline")
            .field("id", &self.id)
            .field("bind_point", &self.state.bind_point)
            .field("active_stages", &self.state.active_stages)
            .field("commands", &self.commands)
            .field("allocations", &self.allocations)
            .finish_non_exhaustive()
    }
}

impl DriverObject for Pipeline {
    #[inline]
    fn object_type(&self) -> ObjectType {
        ObjectType::Pipeline
    }

    #[inline]
    fn handle(&self) -> Handle {
        Handle::new(self.id)
    }
}

impl DeviceOwned for Pipeline {
    #[inline]
    fn device(&self) -> &Arc<Device> {
        &self.device
    }
}

impl_id_counter!(Pipeline);

/// Maps the resources of one stage and allocates its binding table, sampler table and push
/// constant buffer.
fn compile_stage(
    allocations: &mut StateAllocations,
    create_info: PipelineShaderStageCreateInfo,
    render_targets: u32,
    stream_output_bindings: u32,
) -> Result<(PipelineShader, StageBindings), PipelineCreationError> {
    let PipelineShaderStageCreateInfo {
        stage,
        shader,
        descriptor_set_mapping,
        dynamic_view,
        _ne: _,
    } = create_info;

    let resource_map = if stage.has_resources() {
        let resource_map = ResourceMap::new(
            render_targets,
            &shader.interface,
            &descriptor_set_mapping,
            dynamic_view.as_ref(),
        )
        .map_err(|error| PipelineCreationError::ResourceMap { stage, error })?;

        log::trace!(
            "{:?} resource map: {} render targets, {} resources, {} UAVs, {} samplers",
            stage,
            resource_map.rt_count(),
            resource_map.resource_count(),
            resource_map.uav_count(),
            resource_map.sampler_count(),
        );

        Some(resource_map)
    } else {
        None
    };

    let binding_table =
        BindingTableTemplate::for_stage(stage, resource_map.as_ref(), stream_output_bindings);
    let bindings = allocate_stage_bindings(
        allocations,
        stage,
        &shader,
        resource_map.as_ref(),
        &binding_table,
    )?;

    Ok((
        PipelineShader {
            stage,
            shader,
            resource_map,
            binding_table,
        },
        bindings,
    ))
}

fn allocate_stage_bindings(
    allocations: &mut StateAllocations,
    stage: ShaderStage,
    shader: &CompiledShader,
    resource_map: Option<&ResourceMap>,
    binding_table: &BindingTableTemplate,
) -> Result<StageBindings, PipelineCreationError> {
    let mut bindings = StageBindings::default();
    // State objects of a stage are shared only between identical stages.
    let description = (stage, &shader.code, resource_map);

    if !binding_table.is_empty() {
        bindings.binding_table_size = binding_table.size();
        bindings.binding_table = Some(allocations.allocate(StateLayout::binding_table(
            binding_table.size(),
            &(description, binding_table),
        ))?);
    }

    let sampler_count = resource_map.map_or(0, ResourceMap::sampler_count);

    if sampler_count != 0 {
        bindings.sampler_count = sampler_count;
        bindings.sampler_table = Some(
            allocations.allocate(StateLayout::sampler_table(sampler_count, &description))?,
        );
    }

    let push_constant_size = push_constant_buffer_size(shader.interface.push_constant_size);

    if push_constant_size != 0 {
        bindings.push_constant_size = push_constant_size;
        bindings.push_constants = Some(
            allocations.allocate(StateLayout::push_constants(push_constant_size, &description))?,
        );
    }

    Ok(bindings)
}
