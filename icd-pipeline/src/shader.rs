// Copyright (c) 2026 The icd-pipeline contributors
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Compiled shader stages and how they reach their resources.
//!
//! Shaders arrive already translated to machine code. Next to the code, the shader compiler
//! reports a [`ShaderInterface`]: how many resources, UAVs and samplers the code indexes, and how
//! much push constant data it reads. The client then describes, with a
//! [`DescriptorSetMapping`], where each of these entities is found in the descriptor sets it
//! binds. The pipeline compiler turns both into a
//! [`ResourceMap`](crate::pipeline::resource_map::ResourceMap).

use crate::{
    device::Device,
    macros::{vulkan_bitflags, vulkan_enum},
    NonExhaustive, ValidationError,
};

vulkan_enum! {
    /// A single shader stage.
    ShaderStage = ShaderStageFlags(u32);

    Vertex = VERTEX,

    TessellationControl = TESSELLATION_CONTROL,

    TessellationEvaluation = TESSELLATION_EVALUATION,

    Geometry = GEOMETRY,

    Fragment = FRAGMENT,

    Compute = COMPUTE,
}

impl ShaderStage {
    /// Every stage, in pipeline order.
    pub const ALL: [ShaderStage; 6] = [
        ShaderStage::Vertex,
        ShaderStage::TessellationControl,
        ShaderStage::TessellationEvaluation,
        ShaderStage::Geometry,
        ShaderStage::Fragment,
        ShaderStage::Compute,
    ];

    /// Returns the position of the stage in [`ShaderStage::ALL`].
    #[inline]
    pub const fn index(self) -> usize {
        (self as u32).trailing_zeros() as usize
    }

    /// Returns whether the stage can access resources through a binding table.
    ///
    /// The tessellation and geometry stages of this hardware family run without resources of
    /// their own.
    #[inline]
    pub const fn has_resources(self) -> bool {
        matches!(
            self,
            ShaderStage::Vertex | ShaderStage::Fragment | ShaderStage::Compute,
        )
    }
}

vulkan_bitflags! {
    /// A set of shader stages.
    ShaderStages = ShaderStageFlags(u32);

    VERTEX = VERTEX,

    TESSELLATION_CONTROL = TESSELLATION_CONTROL,

    TESSELLATION_EVALUATION = TESSELLATION_EVALUATION,

    GEOMETRY = GEOMETRY,

    FRAGMENT = FRAGMENT,

    COMPUTE = COMPUTE,
}

impl ShaderStages {
    /// Returns the stages in `self`, in pipeline order.
    pub fn iter(self) -> impl Iterator<Item = ShaderStage> {
        ShaderStage::ALL
            .into_iter()
            .filter(move |&stage| self.contains(stage.into()))
    }
}

impl From<ShaderStage> for ShaderStages {
    #[inline]
    fn from(val: ShaderStage) -> Self {
        Self(val as u32)
    }
}

/// Machine code of one shader stage, as produced by the shader compiler.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompiledShader {
    /// The machine code. It is owned by the pipeline and freed with it.
    pub code: Box<[u8]>,

    pub interface: ShaderInterface,
}

impl CompiledShader {
    #[inline]
    pub fn new(code: impl Into<Box<[u8]>>, interface: ShaderInterface) -> Self {
        Self {
            code: code.into(),
            interface,
        }
    }
}

/// The entities that the code of a shader indexes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShaderInterface {
    /// The number of read-only resources (sampled images, uniform texel buffers).
    pub resource_count: u32,

    /// The number of unordered access views (constant and storage buffers).
    pub uav_count: u32,

    pub sampler_count: u32,

    /// The number of bytes of push constants read by the code.
    pub push_constant_size: u32,

    pub _ne: NonExhaustive,
}

impl Default for ShaderInterface {
    #[inline]
    fn default() -> Self {
        Self {
            resource_count: 0,
            uav_count: 0,
            sampler_count: 0,
            push_constant_size: 0,
            _ne: NonExhaustive(()),
        }
    }
}

impl ShaderInterface {
    /// Returns whether the code indexes any resource, UAV or sampler.
    #[inline]
    pub fn uses_resources(&self) -> bool {
        self.resource_count != 0 || self.uav_count != 0 || self.sampler_count != 0
    }
}

/// Describes where the entities of a shader are found in the bound descriptor sets.
///
/// The slots are in the order of the descriptors of the set. A slot can itself be a nested
/// descriptor set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DescriptorSetMapping {
    pub slots: Vec<DescriptorSlot>,
}

impl DescriptorSetMapping {
    #[inline]
    pub fn new(slots: impl IntoIterator<Item = DescriptorSlot>) -> Self {
        Self {
            slots: slots.into_iter().collect(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// A descriptor of a [`DescriptorSetMapping`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DescriptorSlot {
    /// The descriptor is not used by the shader.
    #[default]
    Unused,

    /// The descriptor holds the resource entity with this index.
    Resource(u32),

    /// The descriptor holds the UAV entity with this index.
    Uav(u32),

    /// The descriptor holds the sampler entity with this index.
    Sampler(u32),

    /// The descriptor points to another descriptor set.
    NextSet(DescriptorSetMapping),
}

/// The kind of entity a dynamic memory view is bound as.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DynamicViewKind {
    Resource,
    Uav,
}

/// Binds the dynamically-offset memory view to one entity of a shader.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DynamicViewMapping {
    pub kind: DynamicViewKind,
    pub entity: u32,
}

/// Specifies a single shader stage when creating a pipeline.
#[derive(Clone, Debug)]
pub struct PipelineShaderStageCreateInfo {
    /// The stage that the shader runs in.
    pub stage: ShaderStage,

    /// The compiled shader.
    pub shader: CompiledShader,

    /// Where the entities of the shader are found in the bound descriptor sets.
    ///
    /// The default value is empty.
    pub descriptor_set_mapping: DescriptorSetMapping,

    /// The entity the dynamic memory view is bound as, if any.
    ///
    /// The default value is `None`.
    pub dynamic_view: Option<DynamicViewMapping>,

    pub _ne: NonExhaustive,
}

impl PipelineShaderStageCreateInfo {
    /// Returns a `PipelineShaderStageCreateInfo` with the specified `stage` and `shader`.
    #[inline]
    pub fn new(stage: ShaderStage, shader: CompiledShader) -> Self {
        Self {
            stage,
            shader,
            descriptor_set_mapping: DescriptorSetMapping::default(),
            dynamic_view: None,
            _ne: NonExhaustive(()),
        }
    }

    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let &Self {
            stage,
            ref shader,
            ref descriptor_set_mapping,
            ref dynamic_view,
            _ne: _,
        } = self;

        let interface = &shader.interface;

        if !stage.has_resources()
            && (interface.uses_resources()
                || interface.push_constant_size != 0
                || !descriptor_set_mapping.is_empty()
                || dynamic_view.is_some())
        {
            return Err(ValidationError::new(
                "shader.interface",
                format!(
                    "uses resources or push constants, but the {:?} stage cannot access any",
                    stage,
                ),
            ));
        }

        let max_push_constant_size = device.properties().max_push_constant_size;

        if interface.push_constant_size > max_push_constant_size {
            return Err(ValidationError::new(
                "shader.interface.push_constant_size",
                format!(
                    "is greater than the `max_push_constant_size` limit ({})",
                    max_push_constant_size,
                ),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        CompiledShader, DescriptorSetMapping, DescriptorSlot, PipelineShaderStageCreateInfo,
        ShaderInterface, ShaderStage, ShaderStages,
    };

    #[test]
    fn stage_indices() {
        for (index, stage) in ShaderStage::ALL.into_iter().enumerate() {
            assert_eq!(stage.index(), index);
        }
    }

    #[test]
    fn iterate_stages() {
        let stages = ShaderStages::FRAGMENT | ShaderStages::VERTEX | ShaderStages::GEOMETRY;
        assert_eq!(
            stages.iter().collect::<Vec<_>>(),
            [ShaderStage::Vertex, ShaderStage::Geometry, ShaderStage::Fragment],
        );
        assert!(stages.contains(ShaderStage::Geometry.into()));
        assert!(!stages.contains(ShaderStage::Compute.into()));
    }

    #[test]
    fn geometry_without_resources() {
        let device = test_device!();
        let shader = CompiledShader::new(
            vec![0u8; 16],
            ShaderInterface {
                sampler_count: 1,
                ..Default::default()
            },
        );

        let stage = PipelineShaderStageCreateInfo::new(ShaderStage::Geometry, shader.clone());
        assert!(stage.validate(&device).is_err());

        let mut stage = PipelineShaderStageCreateInfo::new(
            ShaderStage::Geometry,
            CompiledShader::new(vec![0u8; 16], ShaderInterface::default()),
        );
        assert!(stage.validate(&device).is_ok());
        stage.descriptor_set_mapping = DescriptorSetMapping::new([DescriptorSlot::Sampler(0)]);
        assert!(stage.validate(&device).is_err());

        let stage = PipelineShaderStageCreateInfo::new(ShaderStage::Fragment, shader);
        assert!(stage.validate(&device).is_ok());
    }

    #[test]
    fn push_constant_limit() {
        let device = test_device!(Gen6, 0);
        let stage = PipelineShaderStageCreateInfo::new(
            ShaderStage::Vertex,
            CompiledShader::new(
                vec![0u8; 16],
                ShaderInterface {
                    push_constant_size: 256,
                    ..Default::default()
                },
            ),
        );

        let err = stage.validate(&device).unwrap_err();
        assert_eq!(err.context, "shader.interface.push_constant_size");
    }
}
