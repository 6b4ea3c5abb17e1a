// Copyright (c) 2026 The icd-pipeline contributors
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Storing compiled pipelines and loading them back.
//!
//! A stored pipeline is a little-endian binary blob. It starts with a fixed header:
//!
//! | Offset | Size | Contents                               |
//! |--------|------|----------------------------------------|
//! | 0      | 4    | The magic bytes `IPSO`                 |
//! | 4      | 4    | The format version, [`FORMAT_VERSION`] |
//! | 8      | 8    | The total size of the blob in bytes    |
//! | 16     | 4    | The hardware generation                |
//! | 20     | 4    | The hardware stepping                  |
//!
//! The header is followed by records, each made of a 2-byte tag, a 4-byte payload length and
//! the payload. A loaded pipeline owns its state objects at the offsets it was stored with, so
//! the stored command words stay valid. Loading recompiles the commands from the stored state and
//! rejects the blob if they differ from the stored ones.

use super::{
    binding_table::BindingTableTemplate,
    color_blend::{
        AttachmentBlend, BlendFactor, BlendOp, ColorBlendAttachmentState, ColorBlendState,
        ColorComponents, LogicOp,
    },
    compute::ComputePipelineCreateInfo,
    depth_stencil::{
        CompareOp, DepthState, DepthStencilState, StencilOp, StencilOpState, StencilOps,
        StencilState,
    },
    graphics::GraphicsPipelineCreateInfo,
    input_assembly::{PrimitiveTopology, ProvokingVertexMode, ProvokingVertices},
    rasterization::{RasterizationState, SampleCount},
    resource_map::{ResourceMap, ResourceMapSlot, MAX_DESCRIPTOR_SET_DEPTH},
    state::{
        push_constant_buffer_size, CompiledState, FixedFunctionOffsets, GraphicsState,
        StageBindings, StateAllocations, StateRecord,
    },
    stream_output::StreamOutputState,
    tessellation::TessellationState,
    Pipeline, PipelineBindPoint, PipelineShader,
};
use crate::{
    device::{
        Device, Generation, HardwareRevision, StateAllocationError, StateKind, StateOffset,
        StateRequest, WorkaroundFlags, WorkaroundSet,
    },
    format::Format,
    shader::{
        CompiledShader, PipelineShaderStageCreateInfo, ShaderInterface, ShaderStage,
        ShaderStages,
    },
    NonExhaustive,
};
use smallvec::SmallVec;
use std::{
    error::Error,
    fmt::{Display, Error as FmtError, Formatter},
    sync::Arc,
};

/// The version of the format written by [`Pipeline::store`].
pub const FORMAT_VERSION: u32 = 1;

const MAGIC: [u8; 4] = *b"IPSO";
const HEADER_SIZE: usize = 24;
const NO_OFFSET: u32 = u32::MAX;

const RECORD_GENERAL: u16 = 1;
const RECORD_GRAPHICS: u16 = 2;
const RECORD_STAGE: u16 = 3;
const RECORD_INTERFACE_DESCRIPTOR: u16 = 4;
const RECORD_ALLOCATIONS: u16 = 5;
const RECORD_COMMANDS: u16 = 6;

impl Pipeline {
    /// Serializes the pipeline.
    ///
    /// The result can only be loaded on a device with the same [`HardwareRevision`].
    pub fn store(&self) -> Vec<u8> {
        let revision = self.device.revision();
        let state = &self.state;
        let mut w = Writer::default();

        w.bytes(&MAGIC);
        w.u32(FORMAT_VERSION);
        w.u64(0);
        w.u32(revision.generation.as_raw());
        w.u32(revision.stepping);

        w.record(RECORD_GENERAL, |w| {
            w.i32(state.bind_point.as_raw());
            w.u32(state.active_stages.as_raw());
            w.u32(state.workarounds.pre_bind.as_raw());
            w.u32(state.workarounds.post_bind.as_raw());
        });

        if let Some(graphics) = &state.graphics {
            w.record(RECORD_GRAPHICS, |w| write_graphics(w, graphics));
        }

        for shader in &self.shaders {
            w.record(RECORD_STAGE, |w| {
                write_stage(w, shader, state.stage_bindings(shader.stage));
            });
        }

        if let Some(offset) = state.interface_descriptor {
            w.record(RECORD_INTERFACE_DESCRIPTOR, |w| w.offset(Some(offset)));
        }

        w.record(RECORD_ALLOCATIONS, |w| {
            let records = self.allocations.records();
            w.u32(records.len() as u32);

            for record in records {
                w.u32(record.request.kind.as_raw());
                w.u64(record.request.key);
                w.u32(record.request.size);
                w.u32(record.request.alignment);
                w.u32(record.offset.get());
            }
        });

        w.record(RECORD_COMMANDS, |w| {
            let words = self.commands.words();
            w.u32(words.len() as u32);

            for &word in words {
                w.u32(word);
            }
        });

        let mut data = w.data;
        let total_size = data.len() as u64;
        data[8..16].copy_from_slice(&total_size.to_le_bytes());

        log::debug!("stored pipeline {:?}: {} bytes", self.id, data.len());

        data
    }

    /// Loads a pipeline previously serialized with [`store`](Self::store).
    ///
    /// The state objects of the pipeline are claimed back from the allocator of `device` at the
    /// offsets they were stored with. This fails with [`PipelineLoadError::StateAllocation`] if
    /// one of these offsets is used by different state.
    pub fn load(device: Arc<Device>, data: &[u8]) -> Result<Arc<Pipeline>, PipelineLoadError> {
        load_pipeline(device, data)
            .inspect_err(|err| log::warn!("rejected stored pipeline: {}", err))
    }
}

fn load_pipeline(device: Arc<Device>, data: &[u8]) -> Result<Arc<Pipeline>, PipelineLoadError> {
    if data.len() < HEADER_SIZE {
        return Err(PipelineLoadError::Truncated);
    }

    let mut header = Reader::new(&data[..HEADER_SIZE]);

    if header.take(4)? != MAGIC {
        return Err(PipelineLoadError::Malformed("bad magic"));
    }

    let version = header.u32()?;

    if version != FORMAT_VERSION {
        return Err(PipelineLoadError::VersionMismatch { version });
    }

    let total_size = header.u64()?;

    if total_size > data.len() as u64 {
        return Err(PipelineLoadError::Truncated);
    } else if total_size < data.len() as u64 {
        return Err(PipelineLoadError::Malformed("trailing bytes after the pipeline"));
    }

    let generation = Generation::from_raw(header.u32()?)
        .ok_or(PipelineLoadError::Malformed("unknown hardware generation"))?;
    let stored = HardwareRevision::new(generation, header.u32()?);

    if stored != device.revision() {
        return Err(PipelineLoadError::HardwareMismatch {
            stored,
            device: device.revision(),
        });
    }

    StoredPipeline::parse(Reader::new(&data[HEADER_SIZE..]))?.restore(device)
}

/// Error that can happen when loading a stored pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipelineLoadError {
    /// The pipeline was stored on a different hardware revision.
    HardwareMismatch {
        stored: HardwareRevision,
        device: HardwareRevision,
    },

    /// The data was written in a format version that is not supported.
    VersionMismatch { version: u32 },

    /// The data is not a valid stored pipeline.
    Malformed(&'static str),

    /// The data is shorter than its header says.
    Truncated,

    /// A state object of the pipeline could not be claimed back.
    StateAllocation(StateAllocationError),
}

impl Error for PipelineLoadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StateAllocation(err) => Some(err),
            _ => None,
        }
    }
}

impl Display for PipelineLoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self {
            Self::HardwareMismatch { stored, device } => write!(
                f,
                "the pipeline was stored on {:?} stepping {}, but the device is {:?} stepping {}",
                stored.generation, stored.stepping, device.generation, device.stepping,
            ),
            Self::VersionMismatch { version } => write!(
                f,
                "the pipeline was stored with format version {}, but only version {} is \
                supported",
                version, FORMAT_VERSION,
            ),
            Self::Malformed(reason) => write!(f, "the pipeline data is malformed: {}", reason),
            Self::Truncated => write!(f, "the pipeline data is truncated"),
            Self::StateAllocation(_) => {
                write!(f, "a state object of the pipeline could not be claimed back")
            }
        }
    }
}

impl From<StateAllocationError> for PipelineLoadError {
    #[inline]
    fn from(err: StateAllocationError) -> Self {
        Self::StateAllocation(err)
    }
}

struct General {
    bind_point: PipelineBindPoint,
    active_stages: ShaderStages,
    workarounds: WorkaroundSet,
}

struct StoredStage {
    stage: ShaderStage,
    shader: CompiledShader,
    resource_map: Option<ResourceMap>,
    bindings: StageBindings,
}

#[derive(Default)]
struct StoredPipeline {
    general: Option<General>,
    graphics: Option<GraphicsState>,
    stages: Vec<StoredStage>,
    interface_descriptor: Option<StateOffset>,
    allocations: Option<Vec<StateRecord>>,
    commands: Option<Vec<u32>>,
}

impl StoredPipeline {
    fn parse(mut reader: Reader<'_>) -> Result<Self, PipelineLoadError> {
        let mut stored = StoredPipeline::default();

        while !reader.is_empty() {
            let tag = reader.u16()?;
            let len = reader.u32()? as usize;
            let mut r = Reader::new(reader.take(len)?);

            match tag {
                RECORD_GENERAL if stored.general.is_none() => {
                    let bind_point = r.i32_enum(PipelineBindPoint::from_raw)?;
                    let active_stages =
                        r.flags(ShaderStages::from_raw_truncate, ShaderStages::as_raw)?;
                    let pre_bind =
                        r.flags(WorkaroundFlags::from_raw_truncate, WorkaroundFlags::as_raw)?;
                    let post_bind =
                        r.flags(WorkaroundFlags::from_raw_truncate, WorkaroundFlags::as_raw)?;

                    stored.general = Some(General {
                        bind_point,
                        active_stages,
                        workarounds: WorkaroundSet {
                            pre_bind,
                            post_bind,
                        },
                    });
                }
                RECORD_GRAPHICS if stored.graphics.is_none() => {
                    stored.graphics = Some(read_graphics(&mut r)?);
                }
                RECORD_STAGE => stored.stages.push(read_stage(&mut r)?),
                RECORD_INTERFACE_DESCRIPTOR if stored.interface_descriptor.is_none() => {
                    stored.interface_descriptor = Some(
                        r.offset()?
                            .ok_or(PipelineLoadError::Malformed("missing interface descriptor"))?,
                    );
                }
                RECORD_ALLOCATIONS if stored.allocations.is_none() => {
                    let count = r.u32()?;
                    let mut records = Vec::new();

                    for _ in 0..count {
                        records.push(StateRecord {
                            request: StateRequest {
                                kind: r.u32_enum(StateKind::from_raw)?,
                                key: r.u64()?,
                                size: r.u32()?,
                                alignment: r.u32()?,
                            },
                            offset: StateOffset::new(r.u32()?),
                        });
                    }

                    stored.allocations = Some(records);
                }
                RECORD_COMMANDS if stored.commands.is_none() => {
                    let count = r.u32()?;
                    let mut words = Vec::new();

                    for _ in 0..count {
                        words.push(r.u32()?);
                    }

                    stored.commands = Some(words);
                }
                _ => return Err(PipelineLoadError::Malformed("unknown or repeated record")),
            }

            r.finish()?;
        }

        Ok(stored)
    }

    fn restore(self, device: Arc<Device>) -> Result<Arc<Pipeline>, PipelineLoadError> {
        let StoredPipeline {
            general,
            graphics,
            stages,
            interface_descriptor,
            allocations,
            commands,
        } = self;
        let missing = PipelineLoadError::Malformed("missing record");
        let general = general.ok_or(missing.clone())?;
        let records = allocations.ok_or(missing.clone())?;
        let commands = commands.ok_or(missing)?;

        let consistent = match general.bind_point {
            PipelineBindPoint::Graphics => {
                graphics.is_some()
                    && interface_descriptor.is_none()
                    && !general.active_stages.intersects(ShaderStages::COMPUTE)
            }
            PipelineBindPoint::Compute => {
                graphics.is_none()
                    && interface_descriptor.is_some()
                    && general.active_stages == ShaderStages::COMPUTE
            }
        };

        if !consistent {
            return Err(PipelineLoadError::Malformed(
                "the state does not match the bind point",
            ));
        }

        let in_order = stages
            .windows(2)
            .all(|pair| pair[0].stage.index() < pair[1].stage.index());
        let stored_stages = stages
            .iter()
            .fold(ShaderStages::empty(), |stages, stored| {
                stages | ShaderStages::from(stored.stage)
            });

        if !in_order || stored_stages != general.active_stages {
            return Err(PipelineLoadError::Malformed(
                "the stages do not match the active stages",
            ));
        }

        // The command comparison below does not cover state that never reaches the commands.
        let stage_infos = stages
            .iter()
            .map(|stored| PipelineShaderStageCreateInfo::new(stored.stage, stored.shader.clone()));
        let valid = match &graphics {
            Some(graphics) => {
                GraphicsPipelineCreateInfo::from_graphics_state(graphics, stage_infos)
                    .validate(&device)
            }
            None => stage_infos
                .map(ComputePipelineCreateInfo::new)
                .try_for_each(|create_info| create_info.validate(&device)),
        };

        if let Err(err) = valid {
            log::debug!("stored pipeline state rejected: {}", err);

            return Err(PipelineLoadError::Malformed(
                "the stored state is not valid for this device",
            ));
        }

        let stream_output_bindings = graphics
            .as_ref()
            .and_then(|graphics| graphics.stream_output_state)
            .map_or(0, |state| state.binding_count);
        let mut stage_bindings = [StageBindings::default(); 6];
        let mut shaders = SmallVec::new();

        for StoredStage {
            stage,
            shader,
            resource_map,
            bindings,
        } in stages
        {
            if shader.code.is_empty() || stage.has_resources() != resource_map.is_some() {
                return Err(PipelineLoadError::Malformed("invalid shader stage"));
            }

            let binding_table = BindingTableTemplate::for_stage(
                stage,
                resource_map.as_ref(),
                if stage == ShaderStage::Geometry {
                    stream_output_bindings
                } else {
                    0
                },
            );
            let binding_table_size = if binding_table.is_empty() {
                0
            } else {
                binding_table.size()
            };
            let sampler_count = resource_map.as_ref().map_or(0, ResourceMap::sampler_count);
            let push_constant_size =
                push_constant_buffer_size(shader.interface.push_constant_size);

            let bindings_match = bindings.binding_table_size == binding_table_size
                && bindings.binding_table.is_some() == (binding_table_size != 0)
                && bindings.sampler_count == sampler_count
                && bindings.sampler_table.is_some() == (sampler_count != 0)
                && bindings.push_constant_size == push_constant_size
                && bindings.push_constants.is_some() == (push_constant_size != 0);

            if !bindings_match {
                return Err(PipelineLoadError::Malformed(
                    "the stage bindings do not match the stage",
                ));
            }

            stage_bindings[stage.index()] = bindings;
            shaders.push(PipelineShader {
                stage,
                shader,
                resource_map,
                binding_table,
            });
        }

        let state = CompiledState {
            bind_point: general.bind_point,
            active_stages: general.active_stages,
            graphics,
            stage_bindings,
            interface_descriptor,
            workarounds: general.workarounds,
        };

        // Dropping `allocations` on an early return gives back everything claimed so far.
        let mut allocations = StateAllocations::new(device.allocator().clone());

        for record in records {
            allocations.import(record)?;
        }

        let owned = |offset: StateOffset| {
            allocations
                .records()
                .iter()
                .any(|record| record.offset == offset)
        };

        if !state.offsets().all(owned) {
            return Err(PipelineLoadError::Malformed(
                "the state refers to a state object it does not own",
            ));
        }

        let pipeline = Pipeline::from_compiled(device, shaders, state, allocations);

        if pipeline.commands().words() != commands.as_slice() {
            return Err(PipelineLoadError::Malformed(
                "the stored commands differ from the stored state",
            ));
        }

        log::debug!(
            "loaded pipeline {:?}: {:?}, stages {:?}, {} state objects",
            pipeline.id,
            pipeline.bind_point(),
            pipeline.active_stages(),
            pipeline.state_records().len(),
        );

        Ok(pipeline)
    }
}

fn write_stage(w: &mut Writer, shader: &PipelineShader, bindings: &StageBindings) {
    w.u32(shader.stage.as_raw());
    w.u32(shader.shader.code.len() as u32);
    w.bytes(&shader.shader.code);

    let interface = &shader.shader.interface;
    w.u32(interface.resource_count);
    w.u32(interface.uav_count);
    w.u32(interface.sampler_count);
    w.u32(interface.push_constant_size);

    w.option(shader.resource_map.as_ref(), |w, resource_map| {
        for count in resource_map.counts() {
            w.u32(count);
        }

        w.u32(resource_map.slot_count() as u32);

        for slot in resource_map.slots() {
            match slot {
                ResourceMapSlot::Unused => w.u8(0),
                ResourceMapSlot::Direct(index) => {
                    w.u8(1);
                    w.u32(*index);
                }
                ResourceMapSlot::RenderTarget(index) => {
                    w.u8(2);
                    w.u32(*index);
                }
                ResourceMapSlot::DynamicView => w.u8(3),
                ResourceMapSlot::Indirect(path) => {
                    w.u8(4);
                    w.u8(path.len() as u8);

                    for &index in path {
                        w.u32(index);
                    }
                }
            }
        }
    });

    w.offset(bindings.binding_table);
    w.u32(bindings.binding_table_size);
    w.offset(bindings.sampler_table);
    w.u32(bindings.sampler_count);
    w.offset(bindings.push_constants);
    w.u32(bindings.push_constant_size);
}

fn read_stage(r: &mut Reader<'_>) -> Result<StoredStage, PipelineLoadError> {
    let stage = r.u32_enum(ShaderStage::from_raw)?;
    let code_len = r.u32()? as usize;
    let code = r.take(code_len)?;
    let interface = ShaderInterface {
        resource_count: r.u32()?,
        uav_count: r.u32()?,
        sampler_count: r.u32()?,
        push_constant_size: r.u32()?,
        _ne: NonExhaustive(()),
    };

    let resource_map = r.option(|r| {
        let counts = [r.u32()?, r.u32()?, r.u32()?, r.u32()?];
        let slot_count = r.u32()?;
        let mut slots = Vec::new();

        for _ in 0..slot_count {
            slots.push(match r.u8()? {
                0 => ResourceMapSlot::Unused,
                1 => ResourceMapSlot::Direct(r.u32()?),
                2 => ResourceMapSlot::RenderTarget(r.u32()?),
                3 => ResourceMapSlot::DynamicView,
                4 => {
                    let len = r.u8()? as usize;

                    if len > MAX_DESCRIPTOR_SET_DEPTH {
                        return Err(PipelineLoadError::Malformed("descriptor path too long"));
                    }

                    let mut path = SmallVec::new();

                    for _ in 0..len {
                        path.push(r.u32()?);
                    }

                    ResourceMapSlot::Indirect(path)
                }
                _ => return Err(PipelineLoadError::Malformed("unknown resource map slot")),
            });
        }

        ResourceMap::from_parts(counts, slots)
            .ok_or(PipelineLoadError::Malformed("inconsistent resource map"))
    })?;

    let bindings = StageBindings {
        binding_table: r.offset()?,
        binding_table_size: r.u32()?,
        sampler_table: r.offset()?,
        sampler_count: r.u32()?,
        push_constants: r.offset()?,
        push_constant_size: r.u32()?,
    };

    Ok(StoredStage {
        stage,
        shader: CompiledShader::new(code, interface),
        resource_map,
        bindings,
    })
}

fn write_graphics(w: &mut Writer, graphics: &GraphicsState) {
    w.i32(graphics.topology.as_raw());
    w.bool(graphics.primitive_restart_enable);
    w.u32(graphics.primitive_restart_index);
    w.i32(graphics.provoking_vertex.as_raw());
    w.option(graphics.depth_attachment_format, |w, format| w.i32(format.as_raw()));

    let color_blend = &graphics.color_blend_state;
    w.option(color_blend.logic_op, |w, logic_op| w.i32(logic_op.as_raw()));
    w.u32(color_blend.attachments.len() as u32);

    for attachment in &color_blend.attachments {
        w.option(attachment.blend, |w, blend| {
            w.i32(blend.src_color_blend_factor.as_raw());
            w.i32(blend.dst_color_blend_factor.as_raw());
            w.i32(blend.color_blend_op.as_raw());
            w.i32(blend.src_alpha_blend_factor.as_raw());
            w.i32(blend.dst_alpha_blend_factor.as_raw());
            w.i32(blend.alpha_blend_op.as_raw());
        });
        w.u32(attachment.color_write_mask.as_raw());
    }

    for constant in color_blend.blend_constants {
        w.f32(constant);
    }

    let depth_stencil = &graphics.depth_stencil_state;
    w.option(depth_stencil.depth, |w, depth| {
        w.bool(depth.write_enable);
        w.i32(depth.compare_op.as_raw());
    });
    w.option(depth_stencil.stencil, |w, stencil| {
        for face in [stencil.front, stencil.back] {
            w.i32(face.ops.fail_op.as_raw());
            w.i32(face.ops.pass_op.as_raw());
            w.i32(face.ops.depth_fail_op.as_raw());
            w.i32(face.ops.compare_op.as_raw());
            w.u32(face.compare_mask);
            w.u32(face.write_mask);
            w.u32(face.reference);
        }
    });

    let rasterization = &graphics.rasterization_state;
    w.bool(rasterization.depth_clip_enable);
    w.bool(rasterization.rasterizer_discard_enable);
    w.f32(rasterization.point_size);
    w.u32(graphics.rasterization_samples.as_raw());

    w.option(graphics.tessellation_state, |w, tessellation| {
        w.u32(tessellation.patch_control_points);
        w.f32(tessellation.optimal_tess_factor);
        w.f32(tessellation.fixed_tess_factor);
    });
    w.option(graphics.stream_output_state, |w, stream_output| {
        w.u32(stream_output.num_vertices);
        w.u32(stream_output.max_vertices);
        w.u32(stream_output.binding_count);
    });

    w.u32(graphics.viewport_count);
    w.bool(graphics.scissor_enable);

    for offset in offset_fields(&graphics.offsets) {
        w.offset(offset);
    }
}

fn read_graphics(r: &mut Reader<'_>) -> Result<GraphicsState, PipelineLoadError> {
    let topology = r.i32_enum(PrimitiveTopology::from_raw)?;
    let primitive_restart_enable = r.bool()?;
    let primitive_restart_index = r.u32()?;
    let provoking_vertex = r.i32_enum(ProvokingVertexMode::from_raw)?;
    let depth_attachment_format = r.option(|r| r.i32_enum(Format::from_raw))?;

    let logic_op = r.option(|r| r.i32_enum(LogicOp::from_raw))?;
    let attachment_count = r.u32()?;
    let mut attachments = Vec::new();

    for _ in 0..attachment_count {
        attachments.push(ColorBlendAttachmentState {
            blend: r.option(|r| {
                Ok(AttachmentBlend {
                    src_color_blend_factor: r.i32_enum(BlendFactor::from_raw)?,
                    dst_color_blend_factor: r.i32_enum(BlendFactor::from_raw)?,
                    color_blend_op: r.i32_enum(BlendOp::from_raw)?,
                    src_alpha_blend_factor: r.i32_enum(BlendFactor::from_raw)?,
                    dst_alpha_blend_factor: r.i32_enum(BlendFactor::from_raw)?,
                    alpha_blend_op: r.i32_enum(BlendOp::from_raw)?,
                })
            })?,
            color_write_mask: r
                .flags(ColorComponents::from_raw_truncate, ColorComponents::as_raw)?,
        });
    }

    let color_blend_state = ColorBlendState {
        logic_op,
        attachments,
        blend_constants: [r.f32()?, r.f32()?, r.f32()?, r.f32()?],
        _ne: NonExhaustive(()),
    };

    let depth_stencil_state = DepthStencilState {
        depth: r.option(|r| {
            Ok(DepthState {
                write_enable: r.bool()?,
                compare_op: r.i32_enum(CompareOp::from_raw)?,
            })
        })?,
        stencil: r.option(|r| {
            Ok(StencilState {
                front: read_stencil_face(r)?,
                back: read_stencil_face(r)?,
            })
        })?,
        _ne: NonExhaustive(()),
    };

    let rasterization_state = RasterizationState {
        depth_clip_enable: r.bool()?,
        rasterizer_discard_enable: r.bool()?,
        point_size: r.f32()?,
        _ne: NonExhaustive(()),
    };
    let rasterization_samples = r.u32_enum(SampleCount::from_raw)?;

    let tessellation_state = r.option(|r| {
        Ok(TessellationState {
            patch_control_points: r.u32()?,
            optimal_tess_factor: r.f32()?,
            fixed_tess_factor: r.f32()?,
            _ne: NonExhaustive(()),
        })
    })?;
    let stream_output_state = r.option(|r| {
        Ok(StreamOutputState {
            num_vertices: r.u32()?,
            max_vertices: r.u32()?,
            binding_count: r.u32()?,
            _ne: NonExhaustive(()),
        })
    })?;

    let viewport_count = r.u32()?;
    let scissor_enable = r.bool()?;
    let offsets = FixedFunctionOffsets {
        sf_viewport: r.offset()?,
        clip_viewport: r.offset()?,
        sf_clip_viewport: r.offset()?,
        cc_viewport: r.offset()?,
        color_calc: r.offset()?,
        blend: r.offset()?,
        depth_stencil: r.offset()?,
        scissor: r.offset()?,
    };

    Ok(GraphicsState {
        topology,
        prim_type: topology.hardware_primitive(
            tessellation_state.map_or(0, |state| state.patch_control_points),
        ),
        primitive_restart_enable,
        primitive_restart_index,
        provoking_vertex,
        provoking_vertices: ProvokingVertices::select(provoking_vertex),
        reduced_primitive: topology.reduced_primitive(),
        depth_attachment_format,
        color_blend_state,
        depth_stencil_state,
        rasterization_state,
        rasterization_samples,
        tessellation_state,
        stream_output_state,
        viewport_count,
        scissor_enable,
        offsets,
    })
}

fn read_stencil_face(r: &mut Reader<'_>) -> Result<StencilOpState, PipelineLoadError> {
    Ok(StencilOpState {
        ops: StencilOps {
            fail_op: r.i32_enum(StencilOp::from_raw)?,
            pass_op: r.i32_enum(StencilOp::from_raw)?,
            depth_fail_op: r.i32_enum(StencilOp::from_raw)?,
            compare_op: r.i32_enum(CompareOp::from_raw)?,
        },
        compare_mask: r.u32()?,
        write_mask: r.u32()?,
        reference: r.u32()?,
    })
}

// Same order as `read_graphics`.
fn offset_fields(offsets: &FixedFunctionOffsets) -> [Option<StateOffset>; 8] {
    [
        offsets.sf_viewport,
        offsets.clip_viewport,
        offsets.sf_clip_viewport,
        offsets.cc_viewport,
        offsets.color_calc,
        offsets.blend,
        offsets.depth_stencil,
        offsets.scissor,
    ]
}

#[derive(Default)]
struct Writer {
    data: Vec<u8>,
}

impl Writer {
    fn bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    fn u8(&mut self, value: u8) {
        self.data.push(value);
    }

    fn bool(&mut self, value: bool) {
        self.u8(value as u8);
    }

    fn u16(&mut self, value: u16) {
        self.bytes(&value.to_le_bytes());
    }

    fn u32(&mut self, value: u32) {
        self.bytes(&value.to_le_bytes());
    }

    fn i32(&mut self, value: i32) {
        self.bytes(&value.to_le_bytes());
    }

    fn u64(&mut self, value: u64) {
        self.bytes(&value.to_le_bytes());
    }

    fn f32(&mut self, value: f32) {
        self.u32(value.to_bits());
    }

    fn offset(&mut self, offset: Option<StateOffset>) {
        self.u32(offset.map_or(NO_OFFSET, StateOffset::get));
    }

    fn option<T>(&mut self, value: Option<T>, write: impl FnOnce(&mut Self, T)) {
        self.bool(value.is_some());

        if let Some(value) = value {
            write(self, value);
        }
    }

    fn record(&mut self, tag: u16, write: impl FnOnce(&mut Self)) {
        self.u16(tag);
        let len_at = self.data.len();
        self.u32(0);
        write(self);

        let len = (self.data.len() - len_at - 4) as u32;
        self.data[len_at..len_at + 4].copy_from_slice(&len.to_le_bytes());
    }
}

struct Reader<'a> {
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Reader { data }
    }

    fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    // The total size is checked against the header first, so running out of bytes here means a
    // length field inside the data is wrong.
    fn take(&mut self, len: usize) -> Result<&'a [u8], PipelineLoadError> {
        if len > self.data.len() {
            return Err(PipelineLoadError::Malformed("unexpected end of record"));
        }

        let (head, tail) = self.data.split_at(len);
        self.data = tail;

        Ok(head)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], PipelineLoadError> {
        let mut array = [0; N];
        array.copy_from_slice(self.take(N)?);

        Ok(array)
    }

    fn u8(&mut self) -> Result<u8, PipelineLoadError> {
        Ok(self.array::<1>()?[0])
    }

    fn bool(&mut self) -> Result<bool, PipelineLoadError> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(PipelineLoadError::Malformed("invalid boolean")),
        }
    }

    fn u16(&mut self) -> Result<u16, PipelineLoadError> {
        self.array().map(u16::from_le_bytes)
    }

    fn u32(&mut self) -> Result<u32, PipelineLoadError> {
        self.array().map(u32::from_le_bytes)
    }

    fn i32(&mut self) -> Result<i32, PipelineLoadError> {
        self.array().map(i32::from_le_bytes)
    }

    fn u64(&mut self) -> Result<u64, PipelineLoadError> {
        self.array().map(u64::from_le_bytes)
    }

    fn f32(&mut self) -> Result<f32, PipelineLoadError> {
        self.u32().map(f32::from_bits)
    }

    fn offset(&mut self) -> Result<Option<StateOffset>, PipelineLoadError> {
        let raw = self.u32()?;

        Ok((raw != NO_OFFSET).then(|| StateOffset::new(raw)))
    }

    fn i32_enum<T>(&mut self, from_raw: fn(i32) -> Option<T>) -> Result<T, PipelineLoadError> {
        from_raw(self.i32()?).ok_or(PipelineLoadError::Malformed("unknown enum value"))
    }

    fn u32_enum<T>(&mut self, from_raw: fn(u32) -> Option<T>) -> Result<T, PipelineLoadError> {
        from_raw(self.u32()?).ok_or(PipelineLoadError::Malformed("unknown enum value"))
    }

    fn flags<T>(
        &mut self,
        from_raw_truncate: fn(u32) -> T,
        as_raw: fn(T) -> u32,
    ) -> Result<T, PipelineLoadError>
    where
        T: Copy,
    {
        let raw = self.u32()?;
        let flags = from_raw_truncate(raw);

        if as_raw(flags) != raw {
            return Err(PipelineLoadError::Malformed("unknown flags"));
        }

        Ok(flags)
    }

    fn option<T>(
        &mut self,
        read: impl FnOnce(&mut Self) -> Result<T, PipelineLoadError>,
    ) -> Result<Option<T>, PipelineLoadError> {
        if self.bool()? {
            read(self).map(Some)
        } else {
            Ok(None)
        }
    }

    fn finish(self) -> Result<(), PipelineLoadError> {
        if !self.data.is_empty() {
            return Err(PipelineLoadError::Malformed("trailing bytes in record"));
        }

        Ok(())
    }
}
