// Copyright (c) 2026 The icd-pipeline contributors
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Binding table layouts.
//!
//! Each stage's binding table has a fixed layout: ranges of surfaces set aside for draw buffers,
//! constant buffers, sampler views and stream output. The functions of this module give the
//! binding table index of each kind of surface. Binding tables are only ever filled through them.

use super::resource_map::{ResourceMap, ResourceRegion};
use crate::shader::ShaderStage;
use smallvec::SmallVec;

pub const MAX_DRAW_BUFFERS: u32 = 8;
pub const MAX_CONST_BUFFERS: u32 = 1 + 12;
pub const MAX_SAMPLER_VIEWS: u32 = 16;
pub const MAX_SAMPLERS: u32 = 16;
pub const MAX_SO_BINDINGS: u32 = 64;

pub const MAX_VS_SURFACES: u32 = MAX_CONST_BUFFERS + MAX_SAMPLER_VIEWS;
pub const MAX_GS_SURFACES: u32 = MAX_SO_BINDINGS;
pub const MAX_WM_SURFACES: u32 = MAX_DRAW_BUFFERS + MAX_CONST_BUFFERS + MAX_SAMPLER_VIEWS;

/// The size in bytes of one binding table entry.
pub const BINDING_TABLE_ENTRY_SIZE: u32 = 4;

#[inline]
pub const fn vs_const_surface(i: u32) -> u32 {
    i
}

#[inline]
pub const fn vs_texture_surface(i: u32) -> u32 {
    MAX_CONST_BUFFERS + i
}

#[inline]
pub const fn gs_so_surface(i: u32) -> u32 {
    i
}

#[inline]
pub const fn wm_draw_surface(i: u32) -> u32 {
    i
}

#[inline]
pub const fn wm_const_surface(i: u32) -> u32 {
    MAX_DRAW_BUFFERS + i
}

#[inline]
pub const fn wm_texture_surface(i: u32) -> u32 {
    MAX_DRAW_BUFFERS + MAX_CONST_BUFFERS + i
}

/// Returns the number of binding table entries `stage` can address.
pub const fn max_surfaces(stage: ShaderStage) -> u32 {
    match stage {
        ShaderStage::Vertex | ShaderStage::Compute => MAX_VS_SURFACES,
        ShaderStage::Geometry => MAX_GS_SURFACES,
        ShaderStage::Fragment => MAX_WM_SURFACES,
        ShaderStage::TessellationControl | ShaderStage::TessellationEvaluation => 0,
    }
}

/// What a binding table entry is filled with at bind time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BindingTableEntry {
    /// A null surface.
    #[default]
    Null,

    /// The surface of this slot of the stage's resource map.
    ResourceMap(u32),

    /// The stream output buffer with this binding.
    StreamOutput(u32),
}

/// The entries of one stage's binding table.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BindingTableTemplate {
    entries: SmallVec<[BindingTableEntry; 16]>,
}

impl BindingTableTemplate {
    /// Lays out the binding table of `stage`.
    ///
    /// Render targets go to draw surfaces, resources to texture surfaces and UAVs to constant
    /// surfaces. Samplers are not part of the binding table. The geometry stage only has stream
    /// output surfaces, `stream_output_bindings` of them.
    pub fn for_stage(
        stage: ShaderStage,
        rmap: Option<&ResourceMap>,
        stream_output_bindings: u32,
    ) -> Self {
        let mut template = BindingTableTemplate {
            entries: SmallVec::new(),
        };

        match stage {
            ShaderStage::Vertex | ShaderStage::Compute => {
                if let Some(rmap) = rmap {
                    template.map_region(rmap, ResourceRegion::Uav, vs_const_surface);
                    template.map_region(rmap, ResourceRegion::Resource, vs_texture_surface);
                }
            }
            ShaderStage::Fragment => {
                if let Some(rmap) = rmap {
                    template.map_region(rmap, ResourceRegion::RenderTarget, wm_draw_surface);
                    template.map_region(rmap, ResourceRegion::Uav, wm_const_surface);
                    template.map_region(rmap, ResourceRegion::Resource, wm_texture_surface);
                }
            }
            ShaderStage::Geometry => {
                for binding in 0..stream_output_bindings.min(MAX_SO_BINDINGS) {
                    template.set(gs_so_surface(binding), BindingTableEntry::StreamOutput(binding));
                }
            }
            ShaderStage::TessellationControl | ShaderStage::TessellationEvaluation => (),
        }

        debug_assert!(template.entries.len() as u32 <= max_surfaces(stage));

        template
    }

    fn map_region(&mut self, rmap: &ResourceMap, region: ResourceRegion, surface: fn(u32) -> u32) {
        let range = rmap.region_range(region);

        for (entity, slot) in rmap.slots()[range.clone()].iter().enumerate() {
            let entry = if slot.is_used() {
                BindingTableEntry::ResourceMap((range.start + entity) as u32)
            } else {
                BindingTableEntry::Null
            };

            self.set(surface(entity as u32), entry);
        }
    }

    fn set(&mut self, index: u32, entry: BindingTableEntry) {
        let index = index as usize;

        if self.entries.len() <= index {
            self.entries.resize(index + 1, BindingTableEntry::Null);
        }

        self.entries[index] = entry;
    }

    /// Returns the entries, indexed by binding table slot.
    #[inline]
    pub fn entries(&self) -> &[BindingTableEntry] {
        &self.entries
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the size in bytes of the binding table.
    #[inline]
    pub fn size(&self) -> u32 {
        self.entries.len() as u32 * BINDING_TABLE_ENTRY_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::{
        max_surfaces, vs_texture_surface, wm_const_surface, wm_texture_surface, BindingTableEntry,
        BindingTableTemplate, MAX_VS_SURFACES, MAX_WM_SURFACES,
    };
    use crate::{
        pipeline::resource_map::ResourceMap,
        shader::{DescriptorSetMapping, DescriptorSlot, ShaderInterface, ShaderStage},
    };

    #[test]
    fn layout_formulas() {
        assert_eq!(MAX_VS_SURFACES, 29);
        assert_eq!(MAX_WM_SURFACES, 37);
        assert_eq!(vs_texture_surface(0), 13);
        assert_eq!(wm_const_surface(0), 8);
        assert_eq!(wm_texture_surface(15), 36);
        assert_eq!(max_surfaces(ShaderStage::Compute), 29);
    }

    #[test]
    fn fragment_layout() {
        let rmap = ResourceMap::new(
            2,
            &ShaderInterface {
                resource_count: 1,
                uav_count: 1,
                ..Default::default()
            },
            &DescriptorSetMapping::new([DescriptorSlot::Resource(0)]),
            None,
        )
        .unwrap();
        let template = BindingTableTemplate::for_stage(ShaderStage::Fragment, Some(&rmap), 0);

        assert_eq!(template.len(), wm_texture_surface(0) as usize + 1);
        assert_eq!(template.size(), 22 * 4);
        assert_eq!(template.entries()[0], BindingTableEntry::ResourceMap(0));
        assert_eq!(template.entries()[1], BindingTableEntry::ResourceMap(1));
        assert_eq!(template.entries()[2], BindingTableEntry::Null);
        // The UAV is referenced by the code but not mapped.
        assert_eq!(template.entries()[8], BindingTableEntry::Null);
        assert_eq!(template.entries()[21], BindingTableEntry::ResourceMap(2));
    }

    #[test]
    fn vertex_layout() {
        let rmap = ResourceMap::new(
            0,
            &ShaderInterface {
                uav_count: 2,
                sampler_count: 4,
                ..Default::default()
            },
            &DescriptorSetMapping::new([DescriptorSlot::Uav(1), DescriptorSlot::Uav(0)]),
            None,
        )
        .unwrap();
        let template = BindingTableTemplate::for_stage(ShaderStage::Vertex, Some(&rmap), 0);

        // Samplers have no binding table entry.
        assert_eq!(
            template.entries(),
            [
                BindingTableEntry::ResourceMap(0),
                BindingTableEntry::ResourceMap(1),
            ],
        );
    }

    #[test]
    fn geometry_stream_output() {
        let template = BindingTableTemplate::for_stage(ShaderStage::Geometry, None, 3);
        assert_eq!(
            template.entries(),
            [
                BindingTableEntry::StreamOutput(0),
                BindingTableEntry::StreamOutput(1),
                BindingTableEntry::StreamOutput(2),
            ],
        );

        assert!(BindingTableTemplate::for_stage(ShaderStage::TessellationControl, None, 3).is_empty());
    }
}
