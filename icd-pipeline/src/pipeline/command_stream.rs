// Copyright (c) 2026 The icd-pipeline contributors
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! The command words replayed when a pipeline is bound.
//!
//! A compiled pipeline carries a short, fixed-capacity sequence of state commands. Binding the
//! pipeline copies it verbatim into the batch buffer, so it is computed once at creation.
//!
//! Commands use the GEN header layout: command type 3 in bits 29..32, the pipeline in bits 27..29,
//! the opcode in bits 24..27, the sub-opcode in bits 16..24 and the dword count minus two in the
//! low bits. The stream is made of [`Packet`]s, each one command with its operands, emitted in a
//! fixed order that respects the dependencies between them.

use super::state::{CompiledState, GraphicsState, StageBindings, INTERFACE_DESCRIPTOR_SIZE};
use crate::{
    device::{Generation, StateOffset, WorkaroundFlags},
    shader::{ShaderStage, ShaderStages},
};
use smallvec::SmallVec;
use std::fmt::{Debug, Error as FmtError, Formatter};

/// The number of words a command stream can hold.
pub const COMMAND_STREAM_CAPACITY: usize = 64;

const fn op(pipeline: u32, opcode: u32, subopcode: u32) -> u32 {
    (0x3 << 29) | (pipeline << 27) | (opcode << 24) | (subopcode << 16)
}

const fn header(op: u32, dwords: u32) -> u32 {
    op | (dwords - 2)
}

const PIPE_CONTROL: u32 = op(3, 2, 0x00);

const GEN6_BINDING_TABLE_POINTERS: u32 = op(3, 0, 0x01);
const GEN6_SAMPLER_STATE_POINTERS: u32 = op(3, 0, 0x02);
const GEN75_VF: u32 = op(3, 0, 0x0c);
const GEN6_VIEWPORT_STATE_POINTERS: u32 = op(3, 0, 0x0d);
const CC_STATE_POINTERS: u32 = op(3, 0, 0x0e);
const SCISSOR_STATE_POINTERS: u32 = op(3, 0, 0x0f);
const CONSTANT_VS: u32 = op(3, 0, 0x15);
const CONSTANT_PS: u32 = op(3, 0, 0x17);

const GEN7_VIEWPORT_STATE_POINTERS_SF_CLIP: u32 = op(3, 0, 0x21);
const GEN7_VIEWPORT_STATE_POINTERS_CC: u32 = op(3, 0, 0x23);
const GEN7_BLEND_STATE_POINTERS: u32 = op(3, 0, 0x24);
const GEN7_DEPTH_STENCIL_STATE_POINTERS: u32 = op(3, 0, 0x25);
const GEN7_BINDING_TABLE_POINTERS_VS: u32 = op(3, 0, 0x26);
const GEN7_BINDING_TABLE_POINTERS_GS: u32 = op(3, 0, 0x29);
const GEN7_BINDING_TABLE_POINTERS_PS: u32 = op(3, 0, 0x2a);
const GEN7_SAMPLER_STATE_POINTERS_VS: u32 = op(3, 0, 0x2b);
const GEN7_SAMPLER_STATE_POINTERS_PS: u32 = op(3, 0, 0x2f);

const MEDIA_CURBE_LOAD: u32 = op(2, 0, 0x01);
const MEDIA_INTERFACE_DESCRIPTOR_LOAD: u32 = op(2, 0, 0x02);

// Modify-enable bits of the GEN6 combined pointer commands.
const GEN6_PTR_VS: u32 = 1 << 8;
const GEN6_PTR_GS: u32 = 1 << 9;
const GEN6_PTR_PS: u32 = 1 << 12;
const GEN6_VP_CLIP: u32 = 1 << 10;
const GEN6_VP_SF: u32 = 1 << 11;
const GEN6_VP_CC: u32 = 1 << 12;

const GEN6_CONSTANT_BUFFER_0_ENABLE: u32 = 1 << 12;
const GEN75_VF_CUT_INDEX_ENABLE: u32 = 1 << 8;

// PIPE_CONTROL dword 1.
const PIPE_CONTROL_DEPTH_CACHE_FLUSH: u32 = 1 << 0;
const PIPE_CONTROL_STALL_AT_SCOREBOARD: u32 = 1 << 1;
const PIPE_CONTROL_DEPTH_STALL: u32 = 1 << 13;
const PIPE_CONTROL_WRITE_IMMEDIATE: u32 = 1 << 14;
const PIPE_CONTROL_CS_STALL: u32 = 1 << 20;

/// Returns the part of a command header that identifies the command, without its length or
/// flags.
#[inline]
pub const fn command_opcode(header: u32) -> u32 {
    header >> 16
}

/// The opcode of `PIPE_CONTROL`, as returned by [`command_opcode`].
pub const PIPE_CONTROL_OPCODE: u32 = command_opcode(PIPE_CONTROL);

/// Identifies the state a packet programs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PacketKind {
    /// The flush emitted before the state of the pipeline.
    PreBindWorkaround,

    /// The vertex fetch cut index, GEN7.5 only.
    VertexFetch,

    /// The SF, clip and CC viewport pointers together, GEN6 only.
    ViewportStatePointers,

    SfClipViewportPointers,
    CcViewportPointers,
    ScissorStatePointers,

    /// The blend, depth-stencil and color-calc pointers together, GEN6 only.
    CcStatePointers,

    BlendStatePointers,
    DepthStencilStatePointers,
    ColorCalcStatePointers,

    /// The binding table pointers of these stages.
    BindingTablePointers(ShaderStages),

    /// The sampler state pointers of these stages.
    SamplerStatePointers(ShaderStages),

    /// The push constant buffer of a stage.
    PushConstants(ShaderStage),

    /// The push constant buffer of the compute stage.
    CurbeLoad,

    InterfaceDescriptorLoad,

    /// The flush emitted after the state of the pipeline.
    PostBindWorkaround,
}

impl PacketKind {
    /// Returns whether the packet is an errata flush rather than state.
    #[inline]
    pub fn is_workaround(self) -> bool {
        matches!(
            self,
            PacketKind::PreBindWorkaround | PacketKind::PostBindWorkaround,
        )
    }
}

/// One command and its operands.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Packet {
    kind: PacketKind,
    words: SmallVec<[u32; 8]>,
}

impl Packet {
    fn new(kind: PacketKind, words: &[u32]) -> Self {
        debug_assert_eq!(words[0] & 0xff, words.len() as u32 - 2);

        Packet {
            kind,
            words: SmallVec::from_slice(words),
        }
    }

    #[inline]
    pub fn kind(&self) -> PacketKind {
        self.kind
    }

    /// Returns the words of the packet, starting with the command header.
    #[inline]
    pub fn words(&self) -> &[u32] {
        &self.words
    }
}

/// A fixed-capacity buffer of command words.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CommandStream {
    words: [u32; COMMAND_STREAM_CAPACITY],
    len: usize,
}

impl CommandStream {
    /// Returns an empty stream.
    #[inline]
    pub const fn new() -> Self {
        CommandStream {
            words: [0; COMMAND_STREAM_CAPACITY],
            len: 0,
        }
    }

    pub(crate) fn from_packets<'a>(packets: impl IntoIterator<Item = &'a Packet>) -> Self {
        let mut stream = CommandStream::new();

        for packet in packets {
            stream.push(packet);
        }

        stream
    }

    /// Appends the words of `packet`.
    ///
    /// # Panics
    ///
    /// - Panics if the stream would exceed [`COMMAND_STREAM_CAPACITY`] words. Pipelines within the
    ///   device limits never come close to it.
    pub(crate) fn push(&mut self, packet: &Packet) {
        let words = packet.words();
        let end = self.len + words.len();

        if end > COMMAND_STREAM_CAPACITY {
            log::error!(
                "command stream overflow: {:?} needs {} words, {} of {} are used",
                packet.kind(),
                words.len(),
                self.len,
                COMMAND_STREAM_CAPACITY,
            );
            panic!(
                "command stream overflow: {} words exceed the capacity of {}",
                end, COMMAND_STREAM_CAPACITY,
            );
        }

        self.words[self.len..end].copy_from_slice(words);
        self.len = end;
    }

    /// Returns the used words.
    #[inline]
    pub fn words(&self) -> &[u32] {
        &self.words[..self.len]
    }

    /// Returns the number of used words.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the used words as bytes, in native byte order, ready to be copied into a batch
    /// buffer.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.words())
    }
}

impl Default for CommandStream {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for CommandStream {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.debug_list()
            .entries(self.words().iter().map(|word| format!("{:#010x}", word)))
            .finish()
    }
}

/// Emits the packets of a compiled pipeline, in binding order.
pub(crate) fn emit(generation: Generation, state: &CompiledState) -> SmallVec<[Packet; 16]> {
    let mut emitter = Emitter {
        generation,
        packets: SmallVec::new(),
    };

    emitter.pipe_control(PacketKind::PreBindWorkaround, state.workarounds.pre_bind);

    match state.graphics {
        Some(ref graphics) => {
            emitter.vertex_fetch(graphics);
            emitter.viewports(graphics);
            emitter.scissor(graphics);
            emitter.cc_state(graphics);
            emitter.binding_tables(state);
            emitter.samplers(state);
            emitter.push_constants(state);
        }
        None => emitter.compute(state),
    }

    emitter.pipe_control(PacketKind::PostBindWorkaround, state.workarounds.post_bind);

    emitter.packets
}

struct Emitter {
    generation: Generation,
    packets: SmallVec<[Packet; 16]>,
}

impl Emitter {
    fn packet(&mut self, kind: PacketKind, words: &[u32]) {
        log::trace!("emitting {:?}, {} words", kind, words.len());
        self.packets.push(Packet::new(kind, words));
    }

    fn pipe_control(&mut self, kind: PacketKind, flags: WorkaroundFlags) {
        if flags.is_empty() {
            return;
        }

        let mut dw1 = 0;

        if flags.intersects(WorkaroundFlags::POST_SYNC_FLUSH) {
            dw1 |= PIPE_CONTROL_CS_STALL | PIPE_CONTROL_STALL_AT_SCOREBOARD;
        }

        if flags.intersects(WorkaroundFlags::VS_FLUSH) {
            dw1 |= PIPE_CONTROL_DEPTH_STALL | PIPE_CONTROL_WRITE_IMMEDIATE;
        }

        if flags.intersects(WorkaroundFlags::MULTISAMPLE_FLUSH) {
            dw1 |= PIPE_CONTROL_DEPTH_CACHE_FLUSH | PIPE_CONTROL_CS_STALL;
        }

        self.packet(kind, &[header(PIPE_CONTROL, 5), dw1, 0, 0, 0]);
    }

    fn vertex_fetch(&mut self, graphics: &GraphicsState) {
        // Earlier generations take the cut index from the index buffer command.
        if self.generation != Generation::Gen7_5 {
            return;
        }

        let mut dw0 = header(GEN75_VF, 2);

        if graphics.primitive_restart_enable {
            dw0 |= GEN75_VF_CUT_INDEX_ENABLE;
        }

        self.packet(
            PacketKind::VertexFetch,
            &[dw0, graphics.primitive_restart_index],
        );
    }

    fn viewports(&mut self, graphics: &GraphicsState) {
        let offsets = &graphics.offsets;

        match self.generation {
            Generation::Gen6 => {
                let mut dw0 = header(GEN6_VIEWPORT_STATE_POINTERS, 4);

                for (offset, bit) in [
                    (offsets.clip_viewport, GEN6_VP_CLIP),
                    (offsets.sf_viewport, GEN6_VP_SF),
                    (offsets.cc_viewport, GEN6_VP_CC),
                ] {
                    if offset.is_some() {
                        dw0 |= bit;
                    }
                }

                if dw0 != header(GEN6_VIEWPORT_STATE_POINTERS, 4) {
                    self.packet(
                        PacketKind::ViewportStatePointers,
                        &[
                            dw0,
                            raw(offsets.clip_viewport),
                            raw(offsets.sf_viewport),
                            raw(offsets.cc_viewport),
                        ],
                    );
                }
            }
            Generation::Gen7 | Generation::Gen7_5 => {
                if let Some(offset) = offsets.sf_clip_viewport {
                    self.packet(
                        PacketKind::SfClipViewportPointers,
                        &[header(GEN7_VIEWPORT_STATE_POINTERS_SF_CLIP, 2), offset.get()],
                    );
                }

                if let Some(offset) = offsets.cc_viewport {
                    self.packet(
                        PacketKind::CcViewportPointers,
                        &[header(GEN7_VIEWPORT_STATE_POINTERS_CC, 2), offset.get()],
                    );
                }
            }
        }
    }

    fn scissor(&mut self, graphics: &GraphicsState) {
        if let Some(offset) = graphics.offsets.scissor {
            self.packet(
                PacketKind::ScissorStatePointers,
                &[header(SCISSOR_STATE_POINTERS, 2), offset.get()],
            );
        }
    }

    fn cc_state(&mut self, graphics: &GraphicsState) {
        let offsets = &graphics.offsets;

        // Bit 0 of each pointer is its modify-enable bit.
        let modified = |offset: Option<StateOffset>| offset.map_or(0, |offset| offset.get() | 1);

        match self.generation {
            Generation::Gen6 => {
                if offsets.blend.is_some()
                    || offsets.depth_stencil.is_some()
                    || offsets.color_calc.is_some()
                {
                    self.packet(
                        PacketKind::CcStatePointers,
                        &[
                            header(CC_STATE_POINTERS, 4),
                            modified(offsets.blend),
                            modified(offsets.depth_stencil),
                            modified(offsets.color_calc),
                        ],
                    );
                }
            }
            Generation::Gen7 | Generation::Gen7_5 => {
                for (kind, opcode, offset) in [
                    (
                        PacketKind::BlendStatePointers,
                        GEN7_BLEND_STATE_POINTERS,
                        offsets.blend,
                    ),
                    (
                        PacketKind::DepthStencilStatePointers,
                        GEN7_DEPTH_STENCIL_STATE_POINTERS,
                        offsets.depth_stencil,
                    ),
                    (
                        PacketKind::ColorCalcStatePointers,
                        CC_STATE_POINTERS,
                        offsets.color_calc,
                    ),
                ] {
                    if offset.is_some() {
                        self.packet(kind, &[header(opcode, 2), modified(offset)]);
                    }
                }
            }
        }
    }

    fn binding_tables(&mut self, state: &CompiledState) {
        self.stage_pointers(
            state,
            |bindings| bindings.binding_table,
            PacketKind::BindingTablePointers,
            GEN6_BINDING_TABLE_POINTERS,
            [
                (ShaderStage::Vertex, GEN7_BINDING_TABLE_POINTERS_VS),
                (ShaderStage::Geometry, GEN7_BINDING_TABLE_POINTERS_GS),
                (ShaderStage::Fragment, GEN7_BINDING_TABLE_POINTERS_PS),
            ],
        );
    }

    fn samplers(&mut self, state: &CompiledState) {
        self.stage_pointers(
            state,
            |bindings| bindings.sampler_table,
            PacketKind::SamplerStatePointers,
            GEN6_SAMPLER_STATE_POINTERS,
            [
                (ShaderStage::Vertex, GEN7_SAMPLER_STATE_POINTERS_VS),
                (ShaderStage::Fragment, GEN7_SAMPLER_STATE_POINTERS_PS),
            ],
        );
    }

    fn stage_pointers<const N: usize>(
        &mut self,
        state: &CompiledState,
        pointer: impl Fn(&StageBindings) -> Option<StateOffset>,
        kind: fn(ShaderStages) -> PacketKind,
        gen6_opcode: u32,
        gen7_opcodes: [(ShaderStage, u32); N],
    ) {
        match self.generation {
            Generation::Gen6 => {
                // The GEN6 command always has a VS, GS and PS pointer.
                let mut stages = ShaderStages::empty();
                let mut dw0 = header(gen6_opcode, 4);
                let mut words = [0; 3];

                for (word, (stage, bit)) in words.iter_mut().zip([
                    (ShaderStage::Vertex, GEN6_PTR_VS),
                    (ShaderStage::Geometry, GEN6_PTR_GS),
                    (ShaderStage::Fragment, GEN6_PTR_PS),
                ]) {
                    if let Some(offset) = pointer(state.stage_bindings(stage)) {
                        stages |= stage.into();
                        dw0 |= bit;
                        *word = offset.get();
                    }
                }

                if !stages.is_empty() {
                    self.packet(kind(stages), &[dw0, words[0], words[1], words[2]]);
                }
            }
            Generation::Gen7 | Generation::Gen7_5 => {
                for (stage, opcode) in gen7_opcodes {
                    if let Some(offset) = pointer(state.stage_bindings(stage)) {
                        self.packet(kind(stage.into()), &[header(opcode, 2), offset.get()]);
                    }
                }
            }
        }
    }

    fn push_constants(&mut self, state: &CompiledState) {
        for (stage, opcode) in [
            (ShaderStage::Vertex, CONSTANT_VS),
            (ShaderStage::Fragment, CONSTANT_PS),
        ] {
            let bindings = state.stage_bindings(stage);
            let Some(offset) = bindings.push_constants else {
                continue;
            };
            let length = bindings.push_constant_size / 32;
            let kind = PacketKind::PushConstants(stage);

            match self.generation {
                Generation::Gen6 => {
                    self.packet(
                        kind,
                        &[
                            header(opcode, 5) | GEN6_CONSTANT_BUFFER_0_ENABLE,
                            offset.get() | (length - 1),
                            0,
                            0,
                            0,
                        ],
                    );
                }
                Generation::Gen7 | Generation::Gen7_5 => {
                    self.packet(
                        kind,
                        &[header(opcode, 7), length, 0, offset.get(), 0, 0, 0],
                    );
                }
            }
        }
    }

    fn compute(&mut self, state: &CompiledState) {
        let bindings = state.stage_bindings(ShaderStage::Compute);

        if let Some(offset) = bindings.push_constants {
            self.packet(
                PacketKind::CurbeLoad,
                &[
                    header(MEDIA_CURBE_LOAD, 4),
                    0,
                    bindings.push_constant_size,
                    offset.get(),
                ],
            );
        }

        if let Some(offset) = state.interface_descriptor {
            self.packet(
                PacketKind::InterfaceDescriptorLoad,
                &[
                    header(MEDIA_INTERFACE_DESCRIPTOR_LOAD, 4),
                    0,
                    INTERFACE_DESCRIPTOR_SIZE,
                    offset.get(),
                ],
            );
        }
    }
}

fn raw(offset: Option<StateOffset>) -> u32 {
    offset.map_or(0, StateOffset::get)
}

#[cfg(test)]
mod tests {
    use super::{
        command_opcode, emit, CommandStream, Packet, PacketKind, COMMAND_STREAM_CAPACITY,
        PIPE_CONTROL_OPCODE,
    };
    use crate::{
        device::{Generation, StateOffset, WorkaroundFlags, WorkaroundSet},
        pipeline::{
            input_assembly::{PrimitiveTopology, ProvokingVertexMode, ProvokingVertices},
            rasterization::SampleCount,
            state::{CompiledState, FixedFunctionOffsets, GraphicsState, StageBindings},
            PipelineBindPoint,
        },
        shader::{ShaderStage, ShaderStages},
    };

    fn offset(value: u32) -> Option<StateOffset> {
        Some(StateOffset::new(value))
    }

    fn full_bindings(base: u32, resources: bool) -> StageBindings {
        StageBindings {
            binding_table: offset(base),
            binding_table_size: 64,
            sampler_table: resources.then(|| StateOffset::new(base + 0x40)),
            sampler_count: resources as u32,
            push_constants: resources.then(|| StateOffset::new(base + 0x80)),
            push_constant_size: if resources { 64 } else { 0 },
        }
    }

    // Every packet a graphics pipeline can emit.
    fn worst_case_graphics() -> CompiledState {
        let topology = PrimitiveTopology::TriangleStrip;
        let mut stage_bindings = [StageBindings::default(); 6];
        stage_bindings[ShaderStage::Vertex.index()] = full_bindings(0x1000, true);
        stage_bindings[ShaderStage::Geometry.index()] = full_bindings(0x2000, false);
        stage_bindings[ShaderStage::Fragment.index()] = full_bindings(0x3000, true);

        CompiledState {
            bind_point: PipelineBindPoint::Graphics,
            active_stages: ShaderStages::VERTEX | ShaderStages::GEOMETRY | ShaderStages::FRAGMENT,
            graphics: Some(GraphicsState {
                topology,
                prim_type: topology.hardware_primitive(0),
                primitive_restart_enable: true,
                primitive_restart_index: 0xffff,
                provoking_vertex: ProvokingVertexMode::FirstVertex,
                provoking_vertices: ProvokingVertices::select(ProvokingVertexMode::FirstVertex),
                reduced_primitive: topology.reduced_primitive(),
                depth_attachment_format: None,
                color_blend_state: Default::default(),
                depth_stencil_state: Default::default(),
                rasterization_state: Default::default(),
                rasterization_samples: SampleCount::Sample4,
                tessellation_state: None,
                stream_output_state: None,
                viewport_count: 1,
                scissor_enable: true,
                offsets: FixedFunctionOffsets {
                    sf_viewport: offset(0x100),
                    clip_viewport: offset(0x140),
                    sf_clip_viewport: offset(0x180),
                    cc_viewport: offset(0x1c0),
                    color_calc: offset(0x200),
                    blend: offset(0x240),
                    depth_stencil: offset(0x280),
                    scissor: offset(0x2c0),
                },
            }),
            stage_bindings,
            interface_descriptor: None,
            workarounds: WorkaroundSet {
                pre_bind: WorkaroundFlags::all(),
                post_bind: WorkaroundFlags::all(),
            },
        }
    }

    fn stream_len(generation: Generation, state: &CompiledState) -> usize {
        CommandStream::from_packets(&emit(generation, state)).len()
    }

    #[test]
    fn header_encoding() {
        let state = worst_case_graphics();
        let packets = emit(Generation::Gen7, &state);

        let pipe_control = &packets[0];
        assert_eq!(pipe_control.kind(), PacketKind::PreBindWorkaround);
        assert_eq!(pipe_control.words()[0], 0x7a00_0003);
        assert_eq!(command_opcode(pipe_control.words()[0]), PIPE_CONTROL_OPCODE);

        let sf_clip = &packets[1];
        assert_eq!(sf_clip.kind(), PacketKind::SfClipViewportPointers);
        assert_eq!(sf_clip.words(), [0x7821_0000, 0x180]);

        let blend = packets
            .iter()
            .find(|packet| packet.kind() == PacketKind::BlendStatePointers)
            .unwrap();
        assert_eq!(blend.words(), [0x7824_0000, 0x241]);

        let constants = packets
            .iter()
            .find(|packet| packet.kind() == PacketKind::PushConstants(ShaderStage::Fragment))
            .unwrap();
        assert_eq!(constants.words(), [0x7817_0005, 2, 0, 0x3080, 0, 0, 0]);
    }

    #[test]
    fn gen6_combined_pointers() {
        let state = worst_case_graphics();
        let packets = emit(Generation::Gen6, &state);

        let binding_tables = packets
            .iter()
            .find(|packet| matches!(packet.kind(), PacketKind::BindingTablePointers(_)))
            .unwrap();
        assert_eq!(
            binding_tables.kind(),
            PacketKind::BindingTablePointers(
                ShaderStages::VERTEX | ShaderStages::GEOMETRY | ShaderStages::FRAGMENT,
            ),
        );
        assert_eq!(
            binding_tables.words(),
            [0x7801_1302, 0x1000, 0x2000, 0x3000],
        );

        let samplers = packets
            .iter()
            .find(|packet| matches!(packet.kind(), PacketKind::SamplerStatePointers(_)))
            .unwrap();
        // The geometry stage has no sampler table.
        assert_eq!(samplers.words(), [0x7802_1102, 0x1040, 0, 0x3040]);

        let constants = packets
            .iter()
            .find(|packet| packet.kind() == PacketKind::PushConstants(ShaderStage::Vertex))
            .unwrap();
        assert_eq!(constants.words(), [0x7815_1003, 0x1080 | 1, 0, 0, 0]);

        // No cut index command before GEN7.5.
        assert!(packets
            .iter()
            .all(|packet| packet.kind() != PacketKind::VertexFetch));
    }

    #[test]
    fn gen75_cut_index() {
        let state = worst_case_graphics();
        let packets = emit(Generation::Gen7_5, &state);

        let vf = packets
            .iter()
            .find(|packet| packet.kind() == PacketKind::VertexFetch)
            .unwrap();
        assert_eq!(vf.words(), [0x780c_0100, 0xffff]);
    }

    #[test]
    fn worst_case_fits() {
        let state = worst_case_graphics();

        assert_eq!(stream_len(Generation::Gen6, &state), 38);
        assert_eq!(stream_len(Generation::Gen7, &state), 46);
        assert_eq!(stream_len(Generation::Gen7_5, &state), 48);

        let mut stage_bindings = [StageBindings::default(); 6];
        stage_bindings[ShaderStage::Compute.index()] = full_bindings(0x1000, true);
        let compute = CompiledState {
            bind_point: PipelineBindPoint::Compute,
            active_stages: ShaderStages::COMPUTE,
            graphics: None,
            stage_bindings,
            interface_descriptor: offset(0x4000),
            workarounds: state.workarounds,
        };

        for generation in [Generation::Gen6, Generation::Gen7, Generation::Gen7_5] {
            assert_eq!(stream_len(generation, &compute), 18);
            assert!(stream_len(generation, &state) <= COMMAND_STREAM_CAPACITY);
        }
    }

    #[test]
    fn no_workarounds_no_flush() {
        let mut state = worst_case_graphics();
        state.workarounds = WorkaroundSet::default();

        assert!(emit(Generation::Gen7, &state)
            .iter()
            .all(|packet| !packet.kind().is_workaround()));
    }

    #[test]
    fn byte_view() {
        let stream = CommandStream::from_packets(&emit(Generation::Gen7, &worst_case_graphics()));
        assert_eq!(stream.as_bytes().len(), stream.len() * 4);
        assert_eq!(
            &stream.as_bytes()[..4],
            stream.words()[0].to_ne_bytes().as_slice(),
        );
    }

    #[test]
    #[should_panic(expected = "command stream overflow")]
    fn overflow_panics() {
        let packet = Packet::new(PacketKind::PostBindWorkaround, &[0x7a00_0003, 0, 0, 0, 0]);
        let mut stream = CommandStream::new();

        for _ in 0..13 {
            stream.push(&packet);
        }
    }
}
