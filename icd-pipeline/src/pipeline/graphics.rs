// Copyright (c) 2026 The icd-pipeline contributors
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Graphics pipelines, used for drawing.
//!
//! A graphics pipeline has a vertex stage, optionally tessellation and geometry stages, and
//! usually a fragment stage. Between and around them, the fixed-function units are configured by
//! the state structs of the sibling modules:
//!
//! - [`InputAssemblyState`]: how vertices are assembled into primitives.
//! - [`TessellationState`]: how patches are subdivided.
//! - [`ViewportState`]: the viewports and scissor boxes.
//! - [`RasterizationState`] and [`MultisampleState`]: how primitives become fragments.
//! - [`DepthStencilState`]: the depth and stencil tests.
//! - [`ColorBlendState`]: how fragment outputs are written to the color attachments.
//! - [`StreamOutputState`]: writing processed vertices back to buffers.

use super::{
    color_blend::ColorBlendState,
    compile_stage,
    depth_stencil::DepthStencilState,
    input_assembly::{InputAssemblyState, PrimitiveTopology, ProvokingVertices},
    rasterization::{MultisampleState, RasterizationState},
    state::{
        CompiledState, FixedFunctionOffsets, GraphicsState, StageBindings, StateAllocations,
        StateLayout,
    },
    stream_output::StreamOutputState,
    tessellation::TessellationState,
    viewport::{Scissor, Viewport, ViewportState},
    Pipeline, PipelineBindPoint, PipelineCreationError,
};
use crate::{
    device::{Device, Generation, WorkaroundQuery},
    format::Format,
    shader::{PipelineShaderStageCreateInfo, ShaderStage, ShaderStages},
    NonExhaustive, ValidationError,
};
use smallvec::SmallVec;
use std::sync::Arc;

/// Parameters to create a new graphics [`Pipeline`].
#[derive(Clone, Debug)]
pub struct GraphicsPipelineCreateInfo {
    /// The shader stages to use.
    ///
    /// A vertex stage must always be included. The other stages are optional, but the
    /// tessellation control and evaluation stages go together. Each stage can appear only once.
    ///
    /// The default value is empty, which must be overridden.
    pub stages: SmallVec<[PipelineShaderStageCreateInfo; 5]>,

    /// How vertices are assembled into primitives.
    ///
    /// The default value is [`InputAssemblyState::new`].
    pub input_assembly_state: InputAssemblyState,

    /// The tessellation state.
    ///
    /// Must be `Some` if `stages` contains tessellation stages, and is ignored otherwise. The
    /// default value is `None`.
    pub tessellation_state: Option<TessellationState>,

    /// The viewports and scissors.
    ///
    /// The default value is [`ViewportState::new`].
    pub viewport_state: ViewportState,

    /// The rasterization state.
    ///
    /// The default value is [`RasterizationState::new`].
    pub rasterization_state: RasterizationState,

    /// The multisample state.
    ///
    /// The default value is [`MultisampleState::new`].
    pub multisample_state: MultisampleState,

    /// The depth and stencil tests.
    ///
    /// The default value has both tests disabled.
    pub depth_stencil_state: DepthStencilState,

    /// The format of the depth/stencil attachment, if there is one.
    ///
    /// The default value is `None`.
    pub depth_attachment_format: Option<Format>,

    /// The color attachments and how they are blended. The number of attachments is the number
    /// of render targets of the fragment stage.
    ///
    /// The default value has no attachments.
    pub color_blend_state: ColorBlendState,

    /// The stream output state, if the pipeline writes stream output.
    ///
    /// The default value is `None`.
    pub stream_output_state: Option<StreamOutputState>,

    pub _ne: NonExhaustive,
}

impl GraphicsPipelineCreateInfo {
    /// Returns a `GraphicsPipelineCreateInfo` with default values.
    #[inline]
    pub fn new() -> Self {
        Self {
            stages: SmallVec::new(),
            input_assembly_state: InputAssemblyState::new(),
            tessellation_state: None,
            viewport_state: ViewportState::new(),
            rasterization_state: RasterizationState::new(),
            multisample_state: MultisampleState::new(),
            depth_stencil_state: DepthStencilState::default(),
            depth_attachment_format: None,
            color_blend_state: ColorBlendState::new(),
            stream_output_state: None,
            _ne: NonExhaustive(()),
        }
    }

    /// Rebuilds a create info that compiles to `graphics`, as far as validation is concerned.
    ///
    /// Viewport and scissor contents are not kept in the compiled state, only their count.
    pub(crate) fn from_graphics_state(
        graphics: &GraphicsState,
        stages: impl IntoIterator<Item = PipelineShaderStageCreateInfo>,
    ) -> Self {
        let viewports = (0..graphics.viewport_count)
            .map(|_| Viewport::default())
            .collect();
        let scissors = if graphics.scissor_enable {
            (0..graphics.viewport_count)
                .map(|_| Scissor::default())
                .collect()
        } else {
            SmallVec::new()
        };

        Self {
            stages: stages.into_iter().collect(),
            input_assembly_state: InputAssemblyState {
                topology: graphics.topology,
                primitive_restart_enable: graphics.primitive_restart_enable,
                primitive_restart_index: graphics.primitive_restart_index,
                provoking_vertex: graphics.provoking_vertex,
                ..InputAssemblyState::new()
            },
            tessellation_state: graphics.tessellation_state,
            viewport_state: ViewportState {
                viewports,
                scissors,
                ..ViewportState::new()
            },
            rasterization_state: graphics.rasterization_state,
            multisample_state: MultisampleState {
                rasterization_samples: graphics.rasterization_samples,
                ..MultisampleState::new()
            },
            depth_stencil_state: graphics.depth_stencil_state,
            depth_attachment_format: graphics.depth_attachment_format,
            color_blend_state: graphics.color_blend_state.clone(),
            stream_output_state: graphics.stream_output_state,
            _ne: NonExhaustive(()),
        }
    }

    pub(crate) fn validate(&self, device: &Device) -> Result<(), PipelineCreationError> {
        let active_stages = self.validate_stages(device).map_err(|err| {
            PipelineCreationError::InvalidStageCombination(err.add_context("create_info"))
        })?;
        self.validate_topology(device, active_stages).map_err(|err| {
            PipelineCreationError::UnsupportedTopology(err.add_context("create_info"))
        })?;
        self.validate_state(device, active_stages)
            .map_err(|err| PipelineCreationError::InvalidState(err.add_context("create_info")))?;

        Ok(())
    }

    fn validate_stages(&self, device: &Device) -> Result<ShaderStages, Box<ValidationError>> {
        let mut active_stages = ShaderStages::empty();

        for (index, stage_info) in self.stages.iter().enumerate() {
            let stage = stage_info.stage;

            if active_stages.intersects(stage.into()) {
                return Err(ValidationError::new(
                    format!("stages[{}].stage", index),
                    format!(
                        "is `ShaderStage::{:?}`, but another element of `stages` has the same \
                        stage",
                        stage,
                    ),
                ));
            }

            if stage == ShaderStage::Compute {
                return Err(ValidationError::new(
                    format!("stages[{}].stage", index),
                    "is `ShaderStage::Compute`, which cannot be part of a graphics pipeline",
                ));
            }

            if stage_info.shader.code.is_empty() {
                return Err(ValidationError::new(
                    format!("stages[{}].shader.code", index),
                    "is empty",
                ));
            }

            active_stages |= ShaderStages::from(stage);
        }

        if !active_stages.intersects(ShaderStages::VERTEX) {
            return Err(ValidationError::new("stages", "does not contain a vertex stage"));
        }

        let tessellation = active_stages
            & (ShaderStages::TESSELLATION_CONTROL | ShaderStages::TESSELLATION_EVALUATION);

        if !tessellation.is_empty() {
            if tessellation.count() != 2 {
                return Err(ValidationError::new(
                    "stages",
                    "contains only one of a tessellation control and a tessellation evaluation \
                    stage",
                ));
            }

            if device.generation() == Generation::Gen6 {
                return Err(ValidationError::new(
                    "stages",
                    "contains tessellation stages, but the device has no tessellation unit",
                ));
            }
        }

        Ok(active_stages)
    }

    fn validate_topology(
        &self,
        device: &Device,
        active_stages: ShaderStages,
    ) -> Result<(), Box<ValidationError>> {
        self.input_assembly_state
            .validate(device)
            .map_err(|err| err.add_context("input_assembly_state"))?;

        let has_tessellation = active_stages.intersects(ShaderStages::TESSELLATION_CONTROL);

        match self.input_assembly_state.topology {
            PrimitiveTopology::PatchList => {
                if !has_tessellation {
                    return Err(ValidationError::new(
                        "input_assembly_state.topology",
                        "is `PrimitiveTopology::PatchList`, but `stages` does not contain \
                        tessellation stages",
                    ));
                }

                let Some(tessellation_state) = &self.tessellation_state else {
                    return Err(ValidationError::new(
                        "tessellation_state",
                        "is `None`, but `input_assembly_state.topology` is \
                        `PrimitiveTopology::PatchList`",
                    ));
                };

                let max = device.properties().max_patch_control_points;

                if !(1..=max).contains(&tessellation_state.patch_control_points) {
                    return Err(ValidationError::new(
                        "tessellation_state.patch_control_points",
                        format!(
                            "is {}, which is not between 1 and the `max_patch_control_points` \
                            limit ({})",
                            tessellation_state.patch_control_points, max,
                        ),
                    ));
                }
            }
            topology => {
                if has_tessellation {
                    return Err(ValidationError::new(
                        "input_assembly_state.topology",
                        format!(
                            "is `PrimitiveTopology::{:?}`, but `stages` contains tessellation \
                            stages, which need `PrimitiveTopology::PatchList`",
                            topology,
                        ),
                    ));
                }
            }
        }

        Ok(())
    }

    fn validate_state(
        &self,
        device: &Device,
        active_stages: ShaderStages,
    ) -> Result<(), Box<ValidationError>> {
        for (index, stage_info) in self.stages.iter().enumerate() {
            stage_info
                .validate(device)
                .map_err(|err| err.add_context(format!("stages[{}]", index)))?;
        }

        self.rasterization_state
            .validate()
            .map_err(|err| err.add_context("rasterization_state"))?;
        self.viewport_state
            .validate(device, self.rasterization_state.rasterizer_discard_enable)
            .map_err(|err| err.add_context("viewport_state"))?;
        self.multisample_state
            .validate(device)
            .map_err(|err| err.add_context("multisample_state"))?;
        self.color_blend_state
            .validate()
            .map_err(|err| err.add_context("color_blend_state"))?;

        if let Some(format) = self.depth_attachment_format {
            if !format.is_supported_depth_stencil() {
                return Err(ValidationError::new(
                    "depth_attachment_format",
                    format!(
                        "is `Format::{:?}`, which is not a supported depth/stencil format",
                        format,
                    ),
                ));
            }
        }

        self.depth_stencil_state
            .validate(self.depth_attachment_format)
            .map_err(|err| err.add_context("depth_stencil_state"))?;

        if active_stages.intersects(ShaderStages::TESSELLATION_CONTROL) {
            if let Some(tessellation_state) = &self.tessellation_state {
                tessellation_state
                    .validate(device)
                    .map_err(|err| err.add_context("tessellation_state"))?;
            }
        }

        if let Some(stream_output_state) = &self.stream_output_state {
            stream_output_state
                .validate(device, active_stages)
                .map_err(|err| err.add_context("stream_output_state"))?;
        }

        Ok(())
    }
}

impl Default for GraphicsPipelineCreateInfo {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// Creates a new graphics pipeline.
    pub fn new_graphics(
        device: Arc<Device>,
        create_info: GraphicsPipelineCreateInfo,
    ) -> Result<Arc<Pipeline>, PipelineCreationError> {
        create_info.validate(&device)?;

        let GraphicsPipelineCreateInfo {
            mut stages,
            input_assembly_state,
            tessellation_state,
            viewport_state,
            rasterization_state,
            multisample_state,
            depth_stencil_state,
            depth_attachment_format,
            color_blend_state,
            stream_output_state,
            _ne: _,
        } = create_info;

        stages.sort_by_key(|stage_info| stage_info.stage.index());
        let active_stages = stages
            .iter()
            .fold(ShaderStages::empty(), |stages, stage_info| {
                stages | ShaderStages::from(stage_info.stage)
            });
        let tessellation_state = tessellation_state
            .filter(|_| active_stages.intersects(ShaderStages::TESSELLATION_CONTROL));

        let InputAssemblyState {
            topology,
            primitive_restart_enable,
            primitive_restart_index,
            provoking_vertex,
            _ne: _,
        } = input_assembly_state;
        let prim_type = topology.hardware_primitive(
            tessellation_state.map_or(0, |state| state.patch_control_points),
        );

        // Dropping `allocations` on an early return releases everything allocated so far.
        let mut allocations = StateAllocations::new(device.allocator().clone());
        let generation = device.generation();
        let viewport_count = viewport_state.viewports.len() as u32;
        let mut offsets = FixedFunctionOffsets::default();

        if viewport_count != 0 {
            match generation {
                Generation::Gen6 => {
                    offsets.sf_viewport = Some(
                        allocations
                            .allocate(StateLayout::sf_viewport(viewport_count, &viewport_state))?,
                    );
                    offsets.clip_viewport = Some(allocations.allocate(
                        StateLayout::clip_viewport(viewport_count, &viewport_state),
                    )?);
                }
                Generation::Gen7 | Generation::Gen7_5 => {
                    offsets.sf_clip_viewport = Some(allocations.allocate(
                        StateLayout::sf_clip_viewport(viewport_count, &viewport_state),
                    )?);
                }
            }

            offsets.cc_viewport = Some(
                allocations.allocate(StateLayout::cc_viewport(viewport_count, &viewport_state))?,
            );
        }

        offsets.color_calc = Some(
            allocations.allocate(StateLayout::color_calc(&(
                &color_blend_state,
                &depth_stencil_state,
            )))?,
        );

        if !color_blend_state.attachments.is_empty() {
            offsets.blend = Some(allocations.allocate(StateLayout::blend(
                color_blend_state.attachments.len() as u32,
                &color_blend_state,
            ))?);
        }

        offsets.depth_stencil = Some(allocations.allocate(StateLayout::depth_stencil(&(
            &depth_stencil_state,
            depth_attachment_format,
        )))?);

        if viewport_state.scissor_enable() {
            offsets.scissor = Some(allocations.allocate(StateLayout::scissor(
                viewport_state.scissors.len() as u32,
                &viewport_state.scissors,
            ))?);
        }

        let render_targets = color_blend_state.attachments.len() as u32;
        let stream_output_bindings = stream_output_state.map_or(0, |state| state.binding_count);
        let mut stage_bindings = [StageBindings::default(); 6];
        let mut shaders = SmallVec::new();

        for stage_info in stages {
            let stage = stage_info.stage;
            let (shader, bindings) = compile_stage(
                &mut allocations,
                stage_info,
                if stage == ShaderStage::Fragment {
                    render_targets
                } else {
                    0
                },
                if stage == ShaderStage::Geometry {
                    stream_output_bindings
                } else {
                    0
                },
            )?;
            stage_bindings[stage.index()] = bindings;
            shaders.push(shader);
        }

        let workarounds = device.workarounds().lookup(&WorkaroundQuery {
            revision: device.revision(),
            active_stages,
            multisampled: multisample_state.rasterization_samples.count() > 1,
            rasterizer_discard: rasterization_state.rasterizer_discard_enable,
            stream_output: stream_output_state.is_some(),
        });

        let state = CompiledState {
            bind_point: PipelineBindPoint::Graphics,
            active_stages,
            graphics: Some(GraphicsState {
                topology,
                prim_type,
                primitive_restart_enable,
                primitive_restart_index,
                provoking_vertex,
                provoking_vertices: ProvokingVertices::select(provoking_vertex),
                reduced_primitive: topology.reduced_primitive(),
                depth_attachment_format,
                color_blend_state,
                depth_stencil_state,
                rasterization_state,
                rasterization_samples: multisample_state.rasterization_samples,
                tessellation_state,
                stream_output_state,
                viewport_count,
                scissor_enable: viewport_state.scissor_enable(),
                offsets,
            }),
            stage_bindings,
            interface_descriptor: None,
            workarounds,
        };

        let pipeline = Pipeline::from_compiled(device, shaders, state, allocations);

        log::debug!(
            "created graphics pipeline {:?}: {:?}, stages {:?}, {} state objects, {} command \
            words",
            pipeline.id,
            topology,
            active_stages,
            pipeline.state_records().len(),
            pipeline.commands().len(),
        );

        Ok(pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::GraphicsPipelineCreateInfo;
    use crate::{
        device::{StateAllocator, StateHeap, StateKind, WorkaroundFlags},
        format::Format,
        pipeline::{
            command_stream::PacketKind,
            depth_stencil::{DepthState, DepthStencilState},
            input_assembly::{
                InputAssemblyState, PrimitiveTopology, ProvokingVertexMode, ProvokingVertices,
                ReducedPrimitive,
            },
            rasterization::{MultisampleState, SampleCount},
            resource_map::{ResourceMapError, ResourceMapSlot, ResourceRegion},
            stream_output::StreamOutputState,
            tessellation::TessellationState,
            viewport::{Scissor, ViewportState},
            Pipeline, PipelineBindPoint, PipelineCreationError,
        },
        shader::{
            CompiledShader, DescriptorSetMapping, DescriptorSlot, PipelineShaderStageCreateInfo,
            ShaderInterface, ShaderStage, ShaderStages,
        },
        DriverObject, ObjectType,
    };
    use smallvec::smallvec;
    use std::sync::Arc;

    fn plain_stage(stage: ShaderStage) -> PipelineShaderStageCreateInfo {
        PipelineShaderStageCreateInfo::new(
            stage,
            CompiledShader::new(vec![0x01, 0x00, 0x60, 0x00], ShaderInterface::default()),
        )
    }

    fn tessellation_info() -> GraphicsPipelineCreateInfo {
        let mut create_info = triangle_pipeline_info!();
        create_info
            .stages
            .push(plain_stage(ShaderStage::TessellationControl));
        create_info
            .stages
            .push(plain_stage(ShaderStage::TessellationEvaluation));
        create_info.input_assembly_state =
            InputAssemblyState::new().topology(PrimitiveTopology::PatchList);
        create_info.tessellation_state = Some(TessellationState {
            patch_control_points: 4,
            ..Default::default()
        });

        create_info
    }

    #[test]
    fn triangle_list() {
        let device = test_device!();
        let pipeline = Pipeline::new_graphics(device, triangle_pipeline_info!()).unwrap();

        assert_eq!(pipeline.bind_point(), PipelineBindPoint::Graphics);
        assert_eq!(pipeline.object_type(), ObjectType::Pipeline);
        assert_eq!(
            pipeline.active_stages(),
            ShaderStages::VERTEX | ShaderStages::FRAGMENT,
        );

        let fragment = pipeline.shader(ShaderStage::Fragment).unwrap();
        let rmap = fragment.resource_map().unwrap();
        assert_eq!(rmap.rt_count(), 1);
        assert_eq!(
            rmap.slot_count(),
            (rmap.rt_count() + rmap.resource_count() + rmap.uav_count() + rmap.sampler_count())
                as usize,
        );
        assert_eq!(
            rmap.slot(ResourceRegion::Resource, 0),
            Some(&ResourceMapSlot::Indirect(smallvec![0, 0])),
        );
        assert_eq!(
            rmap.slot(ResourceRegion::Uav, 0),
            Some(&ResourceMapSlot::DynamicView),
        );

        let graphics = pipeline.graphics_state().unwrap();
        assert_eq!(graphics.provoking_vertex, ProvokingVertexMode::FirstVertex);
        assert_eq!(
            graphics.provoking_vertices,
            ProvokingVertices {
                triangle: 0,
                triangle_fan: 1,
                line: 0,
            },
        );
        assert_eq!(graphics.reduced_primitive, ReducedPrimitive::Triangle);
        assert_eq!(graphics.prim_type, 0x04);
        assert!(graphics.offsets.sf_clip_viewport.is_some());
        assert!(graphics.offsets.sf_viewport.is_none());
        assert!(graphics.offsets.scissor.is_none());

        assert!(!pipeline.commands().is_empty());
        assert_eq!(
            pipeline.commands().len(),
            pipeline
                .packets()
                .iter()
                .map(|packet| packet.words().len())
                .sum::<usize>(),
        );
    }

    #[test]
    fn deterministic() {
        let device = test_device!(Gen7_5, 0);
        let a = Pipeline::new_graphics(device.clone(), triangle_pipeline_info!()).unwrap();
        let b = Pipeline::new_graphics(device, triangle_pipeline_info!()).unwrap();

        assert_ne!(a.handle(), b.handle());
        assert_eq!(a.commands().words(), b.commands().words());
        assert_eq!(a.state(), b.state());
    }

    #[test]
    fn stage_combinations() {
        let device = test_device!();

        let mut create_info = triangle_pipeline_info!();
        create_info.stages.remove(0);
        let err = Pipeline::new_graphics(device.clone(), create_info).unwrap_err();
        assert!(matches!(
            err,
            PipelineCreationError::InvalidStageCombination(ref err)
                if err.context == "create_info.stages"
        ));

        let mut create_info = triangle_pipeline_info!();
        create_info.stages.push(fragment_stage!());
        assert!(matches!(
            Pipeline::new_graphics(device.clone(), create_info),
            Err(PipelineCreationError::InvalidStageCombination(_)),
        ));

        let mut create_info = triangle_pipeline_info!();
        create_info.stages.push(compute_stage!());
        assert!(matches!(
            Pipeline::new_graphics(device.clone(), create_info),
            Err(PipelineCreationError::InvalidStageCombination(_)),
        ));

        let mut create_info = triangle_pipeline_info!();
        create_info.stages[1].shader.code = Vec::new().into_boxed_slice();
        assert!(matches!(
            Pipeline::new_graphics(device.clone(), create_info),
            Err(PipelineCreationError::InvalidStageCombination(ref err))
                if err.context == "create_info.stages[1].shader.code"
        ));

        let mut create_info = tessellation_info();
        create_info.stages.pop();
        assert!(matches!(
            Pipeline::new_graphics(device, create_info),
            Err(PipelineCreationError::InvalidStageCombination(_)),
        ));

        assert!(matches!(
            Pipeline::new_graphics(test_device!(Gen6, 0), tessellation_info()),
            Err(PipelineCreationError::InvalidStageCombination(_)),
        ));
    }

    #[test]
    fn tessellation() {
        let device = test_device!();
        let pipeline = Pipeline::new_graphics(device.clone(), tessellation_info()).unwrap();

        let graphics = pipeline.graphics_state().unwrap();
        assert_eq!(graphics.prim_type, 0x20 + 3);
        assert_eq!(graphics.reduced_primitive, ReducedPrimitive::Triangle);
        assert_eq!(
            graphics.tessellation_state.unwrap().patch_control_points,
            4,
        );
        assert!(pipeline
            .shader(ShaderStage::TessellationControl)
            .unwrap()
            .resource_map()
            .is_none());

        let mut create_info = tessellation_info();
        create_info.input_assembly_state = InputAssemblyState::new();
        assert!(matches!(
            Pipeline::new_graphics(device.clone(), create_info),
            Err(PipelineCreationError::UnsupportedTopology(_)),
        ));

        let mut create_info = tessellation_info();
        create_info.tessellation_state = Some(TessellationState {
            patch_control_points: 33,
            ..Default::default()
        });
        assert!(matches!(
            Pipeline::new_graphics(device.clone(), create_info),
            Err(PipelineCreationError::UnsupportedTopology(ref err))
                if err.context == "create_info.tessellation_state.patch_control_points"
        ));

        let mut create_info = triangle_pipeline_info!();
        create_info.input_assembly_state =
            InputAssemblyState::new().topology(PrimitiveTopology::PatchList);
        assert!(matches!(
            Pipeline::new_graphics(device, create_info),
            Err(PipelineCreationError::UnsupportedTopology(_)),
        ));
    }

    #[test]
    fn primitive_restart() {
        let gen7 = test_device!(Gen7, 0);
        let gen75 = test_device!(Gen7_5, 0);

        let mut create_info = triangle_pipeline_info!();
        create_info.input_assembly_state = InputAssemblyState::new().primitive_restart_enable();
        assert!(matches!(
            Pipeline::new_graphics(gen7.clone(), create_info),
            Err(PipelineCreationError::UnsupportedTopology(_)),
        ));

        let mut create_info = triangle_pipeline_info!();
        create_info.input_assembly_state = InputAssemblyState {
            primitive_restart_index: 0x1234,
            ..InputAssemblyState::new()
                .topology(PrimitiveTopology::TriangleStrip)
                .primitive_restart_enable()
        };
        assert!(matches!(
            Pipeline::new_graphics(gen7, create_info.clone()),
            Err(PipelineCreationError::UnsupportedTopology(_)),
        ));

        let pipeline = Pipeline::new_graphics(gen75, create_info).unwrap();
        let vf = pipeline
            .packets()
            .iter()
            .find(|packet| packet.kind() == PacketKind::VertexFetch)
            .unwrap();
        assert_eq!(vf.words()[1], 0x1234);
    }

    #[test]
    fn invalid_state() {
        let device = test_device!();

        let mut create_info = triangle_pipeline_info!();
        create_info.rasterization_state.point_size = 300.0;
        assert!(matches!(
            Pipeline::new_graphics(device.clone(), create_info),
            Err(PipelineCreationError::InvalidState(ref err))
                if err.context == "create_info.rasterization_state.point_size"
        ));

        let mut create_info = triangle_pipeline_info!();
        create_info.depth_attachment_format = Some(Format::R8G8B8A8_UNORM);
        assert!(matches!(
            Pipeline::new_graphics(device.clone(), create_info),
            Err(PipelineCreationError::InvalidState(_)),
        ));

        let mut create_info = triangle_pipeline_info!();
        create_info.viewport_state.viewports.clear();
        assert!(matches!(
            Pipeline::new_graphics(device.clone(), create_info),
            Err(PipelineCreationError::InvalidState(_)),
        ));

        let mut create_info = triangle_pipeline_info!();
        create_info.stream_output_state = Some(StreamOutputState {
            binding_count: 65,
            ..Default::default()
        });
        assert!(matches!(
            Pipeline::new_graphics(device, create_info),
            Err(PipelineCreationError::InvalidState(ref err))
                if err.context == "create_info.stream_output_state.binding_count"
        ));
    }

    #[test]
    fn gen6_state_objects() {
        let device = test_device!(Gen6, 0);
        let mut create_info = triangle_pipeline_info!();
        create_info.viewport_state = ViewportState {
            scissors: smallvec![Scissor::default()],
            ..ViewportState::new()
        };
        create_info.depth_attachment_format = Some(Format::D24_UNORM_S8_UINT);
        create_info.depth_stencil_state = DepthStencilState {
            depth: Some(DepthState::simple()),
            ..Default::default()
        };
        create_info.multisample_state = MultisampleState {
            rasterization_samples: SampleCount::Sample4,
            ..Default::default()
        };

        let pipeline = Pipeline::new_graphics(device, create_info).unwrap();
        let offsets = pipeline.graphics_state().unwrap().offsets;
        assert!(offsets.sf_viewport.is_some());
        assert!(offsets.clip_viewport.is_some());
        assert!(offsets.sf_clip_viewport.is_none());
        assert!(offsets.scissor.is_some());

        let kinds: Vec<_> = pipeline
            .packets()
            .iter()
            .map(|packet| packet.kind())
            .collect();
        assert_eq!(
            kinds,
            [
                PacketKind::PreBindWorkaround,
                PacketKind::ViewportStatePointers,
                PacketKind::ScissorStatePointers,
                PacketKind::CcStatePointers,
                PacketKind::BindingTablePointers(ShaderStages::VERTEX | ShaderStages::FRAGMENT),
                PacketKind::SamplerStatePointers(ShaderStages::VERTEX | ShaderStages::FRAGMENT),
                PacketKind::PushConstants(ShaderStage::Vertex),
            ],
        );
        assert_eq!(
            pipeline.workarounds().pre_bind,
            WorkaroundFlags::POST_SYNC_FLUSH,
        );
    }

    #[test]
    fn multisample_workaround() {
        let device = test_device!(Gen7, 3);
        let mut create_info = triangle_pipeline_info!();
        create_info.multisample_state.rasterization_samples = SampleCount::Sample8;

        let pipeline = Pipeline::new_graphics(device, create_info).unwrap();
        assert_eq!(
            pipeline.workarounds().post_bind,
            WorkaroundFlags::MULTISAMPLE_FLUSH,
        );
        assert_eq!(
            pipeline.packets().last().unwrap().kind(),
            PacketKind::PostBindWorkaround,
        );
    }

    #[test]
    fn resource_map_errors() {
        let device = test_device!();

        let mut create_info = triangle_pipeline_info!();
        create_info.stages[0].descriptor_set_mapping = DescriptorSetMapping::new([
            DescriptorSlot::Sampler(0),
            DescriptorSlot::Sampler(0),
        ]);
        assert_eq!(
            Pipeline::new_graphics(device.clone(), create_info).unwrap_err(),
            PipelineCreationError::ResourceMap {
                stage: ShaderStage::Vertex,
                error: ResourceMapError::DuplicateMapping {
                    region: ResourceRegion::Sampler,
                    entity: 0,
                },
            },
        );

        let mut create_info = triangle_pipeline_info!();
        create_info.stages[1].shader.interface.sampler_count = 17;
        assert!(matches!(
            Pipeline::new_graphics(device.clone(), create_info),
            Err(PipelineCreationError::ResourceMap {
                stage: ShaderStage::Fragment,
                error: ResourceMapError::SlotCapacityExceeded { .. },
            }),
        ));

        // Nothing is left allocated by the failed creations.
        let pipeline = Pipeline::new_graphics(device, triangle_pipeline_info!()).unwrap();
        assert_eq!(pipeline.state_records().len(), 10);
    }

    #[test]
    fn releases_state() {
        let heap = Arc::new(StateHeap::new(StateHeap::DEFAULT_SIZE));
        let device = test_device!(Gen7, 0, heap.clone());

        let pipeline = Pipeline::new_graphics(device.clone(), triangle_pipeline_info!()).unwrap();
        let live = heap.live_allocations();
        assert_eq!(live, pipeline.state_records().len());

        let again = Pipeline::new_graphics(device, triangle_pipeline_info!()).unwrap();
        assert_eq!(heap.live_allocations(), live);

        drop(pipeline);
        assert_eq!(heap.live_allocations(), live);
        drop(again);
        assert_eq!(heap.live_allocations(), 0);
    }

    #[test]
    fn releases_state_on_failure() {
        // Room for the viewports and the color-calc state, but not for the rest.
        let heap = Arc::new(StateHeap::new(192));
        let device = test_device!(Gen7, 0, heap.clone());

        assert!(matches!(
            Pipeline::new_graphics(device, triangle_pipeline_info!()),
            Err(PipelineCreationError::StateAllocation(_)),
        ));
        assert_eq!(heap.live_allocations(), 0);

        // The heap is usable afterwards.
        assert!(heap
            .allocate(&crate::device::StateRequest::new(
                StateKind::Blend,
                8,
                64,
                &0u32,
            ))
            .is_ok());
    }
}
