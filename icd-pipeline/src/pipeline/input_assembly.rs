// Copyright (c) 2026 The icd-pipeline contributors
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Primitive assembly: topology, primitive restart and provoking vertex.
//!
//! Besides validation, this module owns the fixed tables that turn an API topology into the
//! hardware `3DPRIM_*` type, the reduced primitive and the provoking vertex indices.

use crate::{
    device::{Device, Generation},
    macros::vulkan_enum,
    NonExhaustive, ValidationError,
};

/// How a graphics pipeline groups vertices into primitives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InputAssemblyState {
    /// The shape of the primitives.
    ///
    /// The default value is [`PrimitiveTopology::TriangleList`].
    pub topology: PrimitiveTopology,

    /// If true, then when drawing with an index buffer, the index value
    /// `primitive_restart_index` ends the current primitive. A new primitive will restart at the
    /// next index.
    ///
    /// Only strip and fan topologies can be used with primitive restart.
    ///
    /// The default value is `false`.
    pub primitive_restart_enable: bool,

    /// The index value that restarts a primitive.
    ///
    /// Before GEN7.5, the hardware can only restart on the maximum value of the index type, so
    /// this must be `0xffff` or `0xffffffff`.
    ///
    /// The default value is `0xffffffff`.
    pub primitive_restart_index: u32,

    /// Which vertex of a primitive provides its flat-shaded attributes.
    ///
    /// The default value is [`ProvokingVertexMode::FirstVertex`].
    pub provoking_vertex: ProvokingVertexMode,

    pub _ne: NonExhaustive,
}

impl InputAssemblyState {
    /// Returns an `InputAssemblyState` with default values.
    #[inline]
    pub const fn new() -> Self {
        Self {
            topology: PrimitiveTopology::TriangleList,
            primitive_restart_enable: false,
            primitive_restart_index: u32::MAX,
            provoking_vertex: ProvokingVertexMode::FirstVertex,
            _ne: NonExhaustive(()),
        }
    }

    /// Sets the primitive topology.
    #[inline]
    pub fn topology(mut self, topology: PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    /// Enables primitive restart with the maximum 32-bit index.
    #[inline]
    pub fn primitive_restart_enable(mut self) -> Self {
        self.primitive_restart_enable = true;
        self
    }

    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            topology,
            primitive_restart_enable,
            primitive_restart_index,
            provoking_vertex: _,
            _ne: _,
        } = self;

        if primitive_restart_enable {
            if !topology.is_strip_or_fan() {
                return Err(ValidationError::new(
                    "primitive_restart_enable",
                    format!(
                        "is `true`, but `topology` is `PrimitiveTopology::{:?}`, which is not a \
                        strip or fan topology",
                        topology,
                    ),
                ));
            }

            if device.generation() < Generation::Gen7_5
                && !matches!(primitive_restart_index, 0xffff | 0xffff_ffff)
            {
                return Err(ValidationError::new(
                    "primitive_restart_index",
                    format!(
                        "is {:#x}, but the device can only restart on 0xffff or 0xffffffff",
                        primitive_restart_index,
                    ),
                ));
            }
        }

        Ok(())
    }
}

impl Default for InputAssemblyState {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

vulkan_enum! {
    /// API primitive topology.
    PrimitiveTopology = PrimitiveTopology(i32);

    PointList = POINT_LIST,
    LineList = LINE_LIST,
    LineStrip = LINE_STRIP,
    TriangleList = TRIANGLE_LIST,
    TriangleStrip = TRIANGLE_STRIP,
    TriangleFan = TRIANGLE_FAN,
    LineListWithAdjacency = LINE_LIST_WITH_ADJACENCY,
    LineStripWithAdjacency = LINE_STRIP_WITH_ADJACENCY,
    TriangleListWithAdjacency = TRIANGLE_LIST_WITH_ADJACENCY,
    TriangleStripWithAdjacency = TRIANGLE_STRIP_WITH_ADJACENCY,

    /// Requires both tessellation stages.
    PatchList = PATCH_LIST,
}

// 3DPRIM_* topology codes.
const PRIM_POINTLIST: u32 = 0x01;
const PRIM_LINELIST: u32 = 0x02;
const PRIM_LINESTRIP: u32 = 0x03;
const PRIM_TRILIST: u32 = 0x04;
const PRIM_TRISTRIP: u32 = 0x05;
const PRIM_TRIFAN: u32 = 0x06;
const PRIM_LINELIST_ADJ: u32 = 0x09;
const PRIM_LINESTRIP_ADJ: u32 = 0x0a;
const PRIM_TRILIST_ADJ: u32 = 0x0b;
const PRIM_TRISTRIP_ADJ: u32 = 0x0c;
const PRIM_PATCHLIST_1: u32 = 0x20;

impl PrimitiveTopology {
    /// Returns the topology class of this topology.
    #[inline]
    pub fn class(self) -> PrimitiveTopologyClass {
        match self {
            Self::PointList => PrimitiveTopologyClass::Point,
            Self::LineList
            | Self::LineStrip
            | Self::LineListWithAdjacency
            | Self::LineStripWithAdjacency => PrimitiveTopologyClass::Line,
            Self::TriangleList
            | Self::TriangleStrip
            | Self::TriangleListWithAdjacency
            | Self::TriangleStripWithAdjacency => PrimitiveTopologyClass::Triangle,
            Self::TriangleFan => PrimitiveTopologyClass::TriangleFan,
            Self::PatchList => PrimitiveTopologyClass::Patch,
        }
    }

    /// Returns whether primitive restart can be used with this topology.
    #[inline]
    pub fn is_strip_or_fan(self) -> bool {
        matches!(
            self,
            Self::LineStrip
                | Self::TriangleStrip
                | Self::TriangleFan
                | Self::LineStripWithAdjacency
                | Self::TriangleStripWithAdjacency
        )
    }

    /// Returns the class of primitives the rasterizer receives.
    ///
    /// Patches are tessellated into triangles before they reach the rasterizer.
    #[inline]
    pub fn reduced_primitive(self) -> ReducedPrimitive {
        match self.class() {
            PrimitiveTopologyClass::Point => ReducedPrimitive::Point,
            PrimitiveTopologyClass::Line => ReducedPrimitive::Line,
            PrimitiveTopologyClass::Triangle
            | PrimitiveTopologyClass::TriangleFan
            | PrimitiveTopologyClass::Patch => ReducedPrimitive::Triangle,
        }
    }

    /// Returns the hardware primitive type (`3DPRIM_*`) for this topology.
    ///
    /// `patch_control_points` is only used for `PatchList`, and must be between 1 and 32.
    #[inline]
    pub fn hardware_primitive(self, patch_control_points: u32) -> u32 {
        match self {
            Self::PointList => PRIM_POINTLIST,
            Self::LineList => PRIM_LINELIST,
            Self::LineStrip => PRIM_LINESTRIP,
            Self::TriangleList => PRIM_TRILIST,
            Self::TriangleStrip => PRIM_TRISTRIP,
            Self::TriangleFan => PRIM_TRIFAN,
            Self::LineListWithAdjacency => PRIM_LINELIST_ADJ,
            Self::LineStripWithAdjacency => PRIM_LINESTRIP_ADJ,
            Self::TriangleListWithAdjacency => PRIM_TRILIST_ADJ,
            Self::TriangleStripWithAdjacency => PRIM_TRISTRIP_ADJ,
            Self::PatchList => PRIM_PATCHLIST_1 + patch_control_points.clamp(1, 32) - 1,
        }
    }
}

/// The kind of primitive a topology is made of.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveTopologyClass {
    Point,
    Line,
    Triangle,
    TriangleFan,
    Patch,
}

/// The primitive class the rasterizer works with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u32)]
pub enum ReducedPrimitive {
    Point = 0,
    Line = 1,
    Triangle = 2,
}

vulkan_enum! {
    /// Specifies which vertex of a primitive is the _provoking vertex_, the vertex whose
    /// attributes are used for flat shading.
    ProvokingVertexMode = ProvokingVertexModeEXT(i32);

    /// The provoking vertex is the first vertex of a primitive.
    FirstVertex = FIRST_VERTEX,

    /// The provoking vertex is the last vertex of a primitive.
    LastVertex = LAST_VERTEX,
}

impl Default for ProvokingVertexMode {
    #[inline]
    fn default() -> Self {
        ProvokingVertexMode::FirstVertex
    }
}

/// The index of the provoking vertex within each class of primitive, as programmed in the
/// hardware.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProvokingVertices {
    pub triangle: u32,
    pub triangle_fan: u32,
    pub line: u32,
}

const FIRST_VERTEX: ProvokingVertices = ProvokingVertices {
    triangle: 0,
    triangle_fan: 1,
    line: 0,
};

const LAST_VERTEX: ProvokingVertices = ProvokingVertices {
    triangle: 2,
    triangle_fan: 2,
    line: 1,
};

impl ProvokingVertices {
    /// Selects the provoking vertex of every primitive class under the given convention.
    ///
    /// Points and patches have no provoking vertex of their own. Patches are tessellated into
    /// triangles and use the `triangle` entry.
    #[inline]
    pub const fn select(mode: ProvokingVertexMode) -> Self {
        match mode {
            ProvokingVertexMode::FirstVertex => FIRST_VERTEX,
            ProvokingVertexMode::LastVertex => LAST_VERTEX,
        }
    }
}
