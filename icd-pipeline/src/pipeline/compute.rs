// Copyright (c) 2026 The icd-pipeline contributors
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! A pipeline that runs a single compute shader.
//!
//! A compute pipeline has no fixed-function state. Binding it loads the push constants of the
//! shader and the interface descriptor, which points the media pipeline at the kernel, its
//! binding table and its samplers.

use super::{
    compile_stage,
    state::{CompiledState, StageBindings, StateAllocations, StateLayout},
    Pipeline, PipelineBindPoint, PipelineCreationError,
};
use crate::{
    device::{Device, WorkaroundQuery},
    shader::{PipelineShaderStageCreateInfo, ShaderStage, ShaderStages},
    NonExhaustive, ValidationError,
};
use smallvec::smallvec;
use std::sync::Arc;

/// Parameters to create a new compute [`Pipeline`].
#[derive(Clone, Debug)]
pub struct ComputePipelineCreateInfo {
    /// The compute shader stage to use.
    ///
    /// There is no default value.
    pub stage: PipelineShaderStageCreateInfo,

    pub _ne: NonExhaustive,
}

impl ComputePipelineCreateInfo {
    /// Returns a `ComputePipelineCreateInfo` with the specified `stage`.
    #[inline]
    pub fn new(stage: PipelineShaderStageCreateInfo) -> Self {
        Self {
            stage,
            _ne: NonExhaustive(()),
        }
    }

    pub(crate) fn validate(&self, device: &Device) -> Result<(), PipelineCreationError> {
        let Self { stage, _ne: _ } = self;

        if stage.stage != ShaderStage::Compute {
            return Err(PipelineCreationError::InvalidStageCombination(
                ValidationError::new(
                    "create_info.stage.stage",
                    format!(
                        "is `ShaderStage::{:?}`, but a compute pipeline needs \
                        `ShaderStage::Compute`",
                        stage.stage,
                    ),
                ),
            ));
        }

        if stage.shader.code.is_empty() {
            return Err(PipelineCreationError::InvalidStageCombination(
                ValidationError::new("create_info.stage.shader.code", "is empty"),
            ));
        }

        stage
            .validate(device)
            .map_err(|err| PipelineCreationError::InvalidState(err.add_context("create_info.stage")))
    }
}

impl Pipeline {
    /// Creates a new compute pipeline.
    pub fn new_compute(
        device: Arc<Device>,
        create_info: ComputePipelineCreateInfo,
    ) -> Result<Arc<Pipeline>, PipelineCreationError> {
        create_info.validate(&device)?;

        let ComputePipelineCreateInfo { stage, _ne: _ } = create_info;

        let mut allocations = StateAllocations::new(device.allocator().clone());
        let (shader, bindings) = compile_stage(&mut allocations, stage, 0, 0)?;
        let interface_descriptor = allocations.allocate(StateLayout::interface_descriptor(&(
            &shader.shader.code,
            bindings,
        )))?;

        let mut stage_bindings = [StageBindings::default(); 6];
        stage_bindings[ShaderStage::Compute.index()] = bindings;

        let workarounds = device.workarounds().lookup(&WorkaroundQuery {
            revision: device.revision(),
            active_stages: ShaderStages::COMPUTE,
            multisampled: false,
            rasterizer_discard: false,
            stream_output: false,
        });

        let state = CompiledState {
            bind_point: PipelineBindPoint::Compute,
            active_stages: ShaderStages::COMPUTE,
            graphics: None,
            stage_bindings,
            interface_descriptor: Some(interface_descriptor),
            workarounds,
        };

        let pipeline = Pipeline::from_compiled(device, smallvec![shader], state, allocations);

        log::debug!(
            "created compute pipeline {:?}: {} state objects, {} command words",
            pipeline.id,
            pipeline.state_records().len(),
            pipeline.commands().len(),
        );

        Ok(pipeline)
    }
}
