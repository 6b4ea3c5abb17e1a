// Copyright (c) 2026 The icd-pipeline contributors
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Mapping of shader entities to binding table slots.
//!
//! A shader indexes its render targets, resources, UAVs and samplers by entity number. The
//! hardware indexes them through a per-stage binding table, whose entries must be filled from
//! whatever the client has bound: render target attachments, descriptors (possibly in nested
//! descriptor sets), or the dynamic memory view.
//!
//! A [`ResourceMap`] records, for every entity a stage's code references, where its descriptor
//! is found at bind time. Its slots are laid out in four regions, in this order: render targets,
//! resources, UAVs, samplers. The slot of an entity is the base of its region plus the entity
//! index.

use crate::shader::{
    DescriptorSetMapping, DescriptorSlot, DynamicViewKind, DynamicViewMapping, ShaderInterface,
};
use smallvec::SmallVec;
use std::{
    error::Error,
    fmt::{Display, Error as FmtError, Formatter},
    ops::Range,
};

/// The deepest level of descriptor set nesting that can be resolved.
pub const MAX_DESCRIPTOR_SET_DEPTH: usize = 8;

/// How the descriptor of one slot is found at bind time.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ResourceMapSlot {
    /// No descriptor is mapped to the entity.
    #[default]
    Unused,

    /// The descriptor at this index of the top-level descriptor set.
    Direct(u32),

    /// The render target attachment with this index.
    RenderTarget(u32),

    /// The dynamic memory view.
    DynamicView,

    /// The descriptor reached by following these indices, starting from the top-level set.
    /// Always has at least two hops.
    Indirect(SmallVec<[u32; 4]>),
}

impl ResourceMapSlot {
    fn from_path(path: &[u32]) -> Self {
        match *path {
            [index] => ResourceMapSlot::Direct(index),
            _ => ResourceMapSlot::Indirect(SmallVec::from_slice(path)),
        }
    }

    /// Returns whether a descriptor is mapped to the slot.
    #[inline]
    pub fn is_used(&self) -> bool {
        !matches!(self, ResourceMapSlot::Unused)
    }
}

/// One of the four regions of a [`ResourceMap`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ResourceRegion {
    RenderTarget,
    Resource,
    Uav,
    Sampler,
}

impl ResourceRegion {
    /// The regions, in slot order.
    pub const ALL: [ResourceRegion; 4] = [
        ResourceRegion::RenderTarget,
        ResourceRegion::Resource,
        ResourceRegion::Uav,
        ResourceRegion::Sampler,
    ];

    /// Returns the number of slots the hardware can address in the region.
    #[inline]
    pub const fn max_count(self) -> u32 {
        use super::binding_table::{
            MAX_CONST_BUFFERS, MAX_DRAW_BUFFERS, MAX_SAMPLERS, MAX_SAMPLER_VIEWS,
        };

        match self {
            ResourceRegion::RenderTarget => MAX_DRAW_BUFFERS,
            ResourceRegion::Resource => MAX_SAMPLER_VIEWS,
            ResourceRegion::Uav => MAX_CONST_BUFFERS,
            ResourceRegion::Sampler => MAX_SAMPLERS,
        }
    }
}

/// The binding model of one shader stage, resolved to slots.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResourceMap {
    counts: [u32; 4],
    slots: Vec<ResourceMapSlot>,
}

impl ResourceMap {
    /// Builds the resource map of a stage.
    ///
    /// - `render_targets` is the number of render targets the stage writes (non-zero only for the
    ///   fragment stage).
    /// - `interface` gives the number of resources, UAVs and samplers the code references.
    /// - `mapping` tells where each entity is found in the descriptor sets.
    /// - `dynamic_view` optionally binds one entity to the dynamic memory view.
    ///
    /// Descriptors naming entities that the code does not reference are ignored. Entities that
    /// are referenced but mapped by no descriptor get an [`ResourceMapSlot::Unused`] slot.
    pub fn new(
        render_targets: u32,
        interface: &ShaderInterface,
        mapping: &DescriptorSetMapping,
        dynamic_view: Option<&DynamicViewMapping>,
    ) -> Result<Self, ResourceMapError> {
        let counts = [
            render_targets,
            interface.resource_count,
            interface.uav_count,
            interface.sampler_count,
        ];

        for (region, count) in ResourceRegion::ALL.into_iter().zip(counts) {
            if count > region.max_count() {
                return Err(ResourceMapError::SlotCapacityExceeded {
                    region,
                    count,
                    max: region.max_count(),
                });
            }
        }

        let slot_count = counts.iter().sum::<u32>() as usize;
        let mut builder = Builder {
            counts,
            slots: vec![ResourceMapSlot::Unused; slot_count],
        };

        for (index, slot) in builder.slots[..render_targets as usize]
            .iter_mut()
            .enumerate()
        {
            *slot = ResourceMapSlot::RenderTarget(index as u32);
        }

        if let Some(&DynamicViewMapping { kind, entity }) = dynamic_view {
            let region = match kind {
                DynamicViewKind::Resource => ResourceRegion::Resource,
                DynamicViewKind::Uav => ResourceRegion::Uav,
            };
            builder.assign(region, entity, ResourceMapSlot::DynamicView)?;
        }

        let mut path = SmallVec::<[u32; MAX_DESCRIPTOR_SET_DEPTH]>::new();
        builder.walk(mapping, &mut path)?;

        Ok(ResourceMap {
            counts,
            slots: builder.slots,
        })
    }

    /// Rebuilds a map from its counts and slots, checking that they are consistent.
    pub(crate) fn from_parts(counts: [u32; 4], slots: Vec<ResourceMapSlot>) -> Option<Self> {
        let consistent = ResourceRegion::ALL
            .into_iter()
            .zip(counts)
            .all(|(region, count)| count <= region.max_count())
            && slots.len() == counts.iter().sum::<u32>() as usize;

        if !consistent {
            return None;
        }

        let map = ResourceMap { counts, slots };

        for region in ResourceRegion::ALL {
            for (index, slot) in map.region(region).iter().enumerate() {
                let valid = match (region, slot) {
                    (ResourceRegion::RenderTarget, ResourceMapSlot::RenderTarget(rt)) => {
                        *rt as usize == index
                    }
                    (ResourceRegion::RenderTarget, _) | (_, ResourceMapSlot::RenderTarget(_)) => {
                        false
                    }
                    (ResourceRegion::Sampler, ResourceMapSlot::DynamicView) => false,
                    (_, ResourceMapSlot::Indirect(path)) => {
                        (2..=MAX_DESCRIPTOR_SET_DEPTH).contains(&path.len())
                    }
                    _ => true,
                };

                if !valid {
                    return None;
                }
            }
        }

        Some(map)
    }

    /// Returns the number of render target slots.
    #[inline]
    pub fn rt_count(&self) -> u32 {
        self.counts[0]
    }

    #[inline]
    pub fn resource_count(&self) -> u32 {
        self.counts[1]
    }

    #[inline]
    pub fn uav_count(&self) -> u32 {
        self.counts[2]
    }

    #[inline]
    pub fn sampler_count(&self) -> u32 {
        self.counts[3]
    }

    #[inline]
    pub(crate) fn counts(&self) -> [u32; 4] {
        self.counts
    }

    /// Returns the total number of slots.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Returns all slots, region after region.
    #[inline]
    pub fn slots(&self) -> &[ResourceMapSlot] {
        &self.slots
    }

    /// Returns the range of slot positions covered by `region`.
    pub fn region_range(&self, region: ResourceRegion) -> Range<usize> {
        region_range(&self.counts, region)
    }

    /// Returns the slots of `region`.
    #[inline]
    pub fn region(&self, region: ResourceRegion) -> &[ResourceMapSlot] {
        &self.slots[self.region_range(region)]
    }

    /// Returns the slot of `entity` in `region`, if the code references it.
    #[inline]
    pub fn slot(&self, region: ResourceRegion, entity: u32) -> Option<&ResourceMapSlot> {
        self.region(region).get(entity as usize)
    }
}

fn region_range(counts: &[u32; 4], region: ResourceRegion) -> Range<usize> {
    let index = region as usize;
    let start = counts[..index].iter().sum::<u32>() as usize;

    start..start + counts[index] as usize
}

struct Builder {
    counts: [u32; 4],
    slots: Vec<ResourceMapSlot>,
}

impl Builder {
    fn assign(
        &mut self,
        region: ResourceRegion,
        entity: u32,
        slot: ResourceMapSlot,
    ) -> Result<(), ResourceMapError> {
        let range = region_range(&self.counts, region);

        if entity as usize >= range.len() {
            log::trace!(
                "skipping {:?} entity {}, the shader references only {}",
                region,
                entity,
                range.len(),
            );
            return Ok(());
        }

        let target = &mut self.slots[range.start + entity as usize];

        if target.is_used() {
            return Err(ResourceMapError::DuplicateMapping { region, entity });
        }

        *target = slot;

        Ok(())
    }

    fn walk(
        &mut self,
        mapping: &DescriptorSetMapping,
        path: &mut SmallVec<[u32; MAX_DESCRIPTOR_SET_DEPTH]>,
    ) -> Result<(), ResourceMapError> {
        for (index, descriptor) in mapping.slots.iter().enumerate() {
            path.push(index as u32);

            match *descriptor {
                DescriptorSlot::Unused => (),
                DescriptorSlot::Resource(entity) => {
                    self.assign(
                        ResourceRegion::Resource,
                        entity,
                        ResourceMapSlot::from_path(path),
                    )?;
                }
                DescriptorSlot::Uav(entity) => {
                    self.assign(ResourceRegion::Uav, entity, ResourceMapSlot::from_path(path))?;
                }
                DescriptorSlot::Sampler(entity) => {
                    self.assign(
                        ResourceRegion::Sampler,
                        entity,
                        ResourceMapSlot::from_path(path),
                    )?;
                }
                DescriptorSlot::NextSet(ref nested) => {
                    let depth = path.len() + 1;

                    if depth > MAX_DESCRIPTOR_SET_DEPTH {
                        return Err(ResourceMapError::NestingTooDeep { depth });
                    }

                    self.walk(nested, path)?;
                }
            }

            path.pop();
        }

        Ok(())
    }
}

/// Error that can happen when building a [`ResourceMap`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceMapError {
    /// A region needs more slots than the hardware provides.
    SlotCapacityExceeded {
        region: ResourceRegion,
        count: u32,
        max: u32,
    },

    /// Two descriptors, or a descriptor and the dynamic view, are mapped to the same entity.
    DuplicateMapping {
        region: ResourceRegion,
        entity: u32,
    },

    /// Descriptor sets are nested deeper than [`MAX_DESCRIPTOR_SET_DEPTH`].
    NestingTooDeep { depth: usize },
}

impl Error for ResourceMapError {}

impl Display for ResourceMapError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self {
            Self::SlotCapacityExceeded { region, count, max } => write!(
                f,
                "the shader uses {} {:?} slots, but at most {} are available",
                count, region, max,
            ),
            Self::DuplicateMapping { region, entity } => write!(
                f,
                "{:?} entity {} is mapped more than once",
                region, entity,
            ),
            Self::NestingTooDeep { depth } => write!(
                f,
                "descriptor sets are nested {} levels deep, but at most {} levels are supported",
                depth, MAX_DESCRIPTOR_SET_DEPTH,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ResourceMap, ResourceMapError, ResourceMapSlot, ResourceRegion, MAX_DESCRIPTOR_SET_DEPTH,
    };
    use crate::shader::{
        DescriptorSetMapping, DescriptorSlot, DynamicViewKind, DynamicViewMapping,
        ShaderInterface,
    };
    use smallvec::smallvec;

    fn interface(resources: u32, uavs: u32, samplers: u32) -> ShaderInterface {
        ShaderInterface {
            resource_count: resources,
            uav_count: uavs,
            sampler_count: samplers,
            ..Default::default()
        }
    }

    #[test]
    fn regions_in_order() {
        let mapping = DescriptorSetMapping::new([
            DescriptorSlot::Sampler(0),
            DescriptorSlot::Resource(1),
            DescriptorSlot::Uav(0),
            DescriptorSlot::Resource(0),
        ]);
        let rmap = ResourceMap::new(2, &interface(2, 1, 1), &mapping, None).unwrap();

        assert_eq!(rmap.slot_count(), 2 + 2 + 1 + 1);
        assert_eq!(
            rmap.slot_count(),
            (rmap.rt_count() + rmap.resource_count() + rmap.uav_count() + rmap.sampler_count())
                as usize,
        );
        assert_eq!(
            rmap.slots(),
            [
                ResourceMapSlot::RenderTarget(0),
                ResourceMapSlot::RenderTarget(1),
                ResourceMapSlot::Direct(3),
                ResourceMapSlot::Direct(1),
                ResourceMapSlot::Direct(2),
                ResourceMapSlot::Direct(0),
            ],
        );
        assert_eq!(rmap.region_range(ResourceRegion::Uav), 4..5);
        assert_eq!(rmap.region_range(ResourceRegion::Sampler), 5..6);
    }

    #[test]
    fn nested_sets() {
        let mapping = DescriptorSetMapping::new([
            DescriptorSlot::Unused,
            DescriptorSlot::NextSet(DescriptorSetMapping::new([
                DescriptorSlot::Resource(0),
                DescriptorSlot::NextSet(DescriptorSetMapping::new([
                    DescriptorSlot::Unused,
                    DescriptorSlot::Sampler(0),
                ])),
            ])),
            DescriptorSlot::Resource(1),
        ]);
        let rmap = ResourceMap::new(0, &interface(2, 0, 1), &mapping, None).unwrap();

        assert_eq!(
            rmap.region(ResourceRegion::Resource),
            [
                ResourceMapSlot::Indirect(smallvec![1, 0]),
                ResourceMapSlot::Direct(2),
            ],
        );
        assert_eq!(
            rmap.slot(ResourceRegion::Sampler, 0),
            Some(&ResourceMapSlot::Indirect(smallvec![1, 1, 1])),
        );
    }

    #[test]
    fn unreferenced_and_unmapped_entities() {
        // Resource 5 is not referenced by the code, UAV 1 is referenced but never mapped.
        let mapping =
            DescriptorSetMapping::new([DescriptorSlot::Resource(5), DescriptorSlot::Uav(0)]);
        let rmap = ResourceMap::new(0, &interface(1, 2, 0), &mapping, None).unwrap();

        assert_eq!(
            rmap.slots(),
            [
                ResourceMapSlot::Unused,
                ResourceMapSlot::Direct(1),
                ResourceMapSlot::Unused,
            ],
        );
    }

    #[test]
    fn dynamic_view() {
        let mapping = DescriptorSetMapping::new([DescriptorSlot::Uav(1)]);
        let dynamic_view = DynamicViewMapping {
            kind: DynamicViewKind::Uav,
            entity: 0,
        };
        let rmap = ResourceMap::new(0, &interface(0, 2, 0), &mapping, Some(&dynamic_view)).unwrap();

        assert_eq!(
            rmap.region(ResourceRegion::Uav),
            [ResourceMapSlot::DynamicView, ResourceMapSlot::Direct(0)],
        );

        let mapping = DescriptorSetMapping::new([DescriptorSlot::Uav(0)]);
        assert_eq!(
            ResourceMap::new(0, &interface(0, 2, 0), &mapping, Some(&dynamic_view)),
            Err(ResourceMapError::DuplicateMapping {
                region: ResourceRegion::Uav,
                entity: 0,
            }),
        );
    }

    #[test]
    fn duplicate_descriptor() {
        let mapping = DescriptorSetMapping::new([
            DescriptorSlot::Sampler(0),
            DescriptorSlot::NextSet(DescriptorSetMapping::new([DescriptorSlot::Sampler(0)])),
        ]);

        assert_eq!(
            ResourceMap::new(0, &interface(0, 0, 1), &mapping, None),
            Err(ResourceMapError::DuplicateMapping {
                region: ResourceRegion::Sampler,
                entity: 0,
            }),
        );
    }

    #[test]
    fn capacity() {
        let mapping = DescriptorSetMapping::default();

        assert_eq!(
            ResourceMap::new(9, &interface(0, 0, 0), &mapping, None),
            Err(ResourceMapError::SlotCapacityExceeded {
                region: ResourceRegion::RenderTarget,
                count: 9,
                max: 8,
            }),
        );
        assert_eq!(
            ResourceMap::new(0, &interface(0, 14, 0), &mapping, None),
            Err(ResourceMapError::SlotCapacityExceeded {
                region: ResourceRegion::Uav,
                count: 14,
                max: 13,
            }),
        );

        let full = ResourceMap::new(8, &interface(16, 13, 16), &mapping, None).unwrap();
        assert_eq!(full.slot_count(), 8 + 16 + 13 + 16);
    }

    #[test]
    fn nesting_depth() {
        fn nested(depth: usize) -> DescriptorSetMapping {
            let mut mapping = DescriptorSetMapping::new([DescriptorSlot::Resource(0)]);

            for _ in 1..depth {
                mapping = DescriptorSetMapping::new([DescriptorSlot::NextSet(mapping)]);
            }

            mapping
        }

        let deepest = ResourceMap::new(
            0,
            &interface(1, 0, 0),
            &nested(MAX_DESCRIPTOR_SET_DEPTH),
            None,
        )
        .unwrap();
        assert_eq!(
            deepest.slot(ResourceRegion::Resource, 0),
            Some(&ResourceMapSlot::Indirect(smallvec![0; MAX_DESCRIPTOR_SET_DEPTH])),
        );

        assert_eq!(
            ResourceMap::new(
                0,
                &interface(1, 0, 0),
                &nested(MAX_DESCRIPTOR_SET_DEPTH + 1),
                None,
            ),
            Err(ResourceMapError::NestingTooDeep {
                depth: MAX_DESCRIPTOR_SET_DEPTH + 1,
            }),
        );
    }

    #[test]
    fn from_parts_checks_layout() {
        let rmap = ResourceMap::new(
            1,
            &interface(1, 0, 0),
            &DescriptorSetMapping::new([DescriptorSlot::Resource(0)]),
            None,
        )
        .unwrap();

        assert_eq!(
            ResourceMap::from_parts(rmap.counts(), rmap.slots().to_vec()),
            Some(rmap.clone()),
        );
        assert_eq!(
            ResourceMap::from_parts(
                rmap.counts(),
                vec![ResourceMapSlot::Direct(0), ResourceMapSlot::Direct(0)],
            ),
            None,
        );
        assert_eq!(ResourceMap::from_parts([1, 1, 0, 0], Vec::new()), None);
    }
}
