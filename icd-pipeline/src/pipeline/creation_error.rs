// Copyright (c) 2026 The icd-pipeline contributors
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

use super::resource_map::ResourceMapError;
use crate::{device::StateAllocationError, shader::ShaderStage, ValidationError};
use std::{
    error::Error,
    fmt::{Display, Error as FmtError, Formatter},
};

/// Error that can happen when creating a graphics or compute pipeline.
///
/// No pipeline object exists after any of these, and every state object allocated before the
/// failure has been released.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipelineCreationError {
    /// The shader stages do not form a valid graphics or compute pipeline: a stage is missing,
    /// duplicated, not allowed on the bind point, not supported by the device, or has no code.
    InvalidStageCombination(Box<ValidationError>),

    /// The primitive topology cannot be used with the other state or stages, or primitive
    /// restart was requested in a way the device does not support.
    UnsupportedTopology(Box<ValidationError>),

    /// A fixed-function state is invalid or exceeds a device limit.
    InvalidState(Box<ValidationError>),

    /// The resource bindings of a stage could not be mapped to binding table slots.
    ResourceMap {
        stage: ShaderStage,
        error: ResourceMapError,
    },

    /// The state allocator could not provide a state object.
    StateAllocation(StateAllocationError),
}

impl Error for PipelineCreationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidStageCombination(err)
            | Self::UnsupportedTopology(err)
            | Self::InvalidState(err) => Some(err.as_ref()),
            Self::ResourceMap { error, .. } => Some(error),
            Self::StateAllocation(err) => Some(err),
        }
    }
}

impl Display for PipelineCreationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self {
            Self::InvalidStageCombination(_) => {
                write!(f, "the shader stages do not form a valid pipeline")
            }
            Self::UnsupportedTopology(_) => write!(
                f,
                "the primitive topology is not supported with this state",
            ),
            Self::InvalidState(_) => write!(f, "a fixed-function state is invalid"),
            Self::ResourceMap { stage, .. } => write!(
                f,
                "the resources of the {:?} stage could not be mapped to binding table slots",
                stage,
            ),
            Self::StateAllocation(_) => write!(f, "a state object could not be allocated"),
        }
    }
}

impl From<StateAllocationError> for PipelineCreationError {
    #[inline]
    fn from(err: StateAllocationError) -> Self {
        Self::StateAllocation(err)
    }
}

#[cfg(test)]
mod tests {
    use super::PipelineCreationError;
    use crate::{
        device::{StateAllocationError, StateKind},
        pipeline::resource_map::{ResourceMapError, ResourceRegion},
        shader::ShaderStage,
        ValidationError,
    };
    use std::error::Error;

    #[test]
    fn source_chain() {
        let err = PipelineCreationError::InvalidState(ValidationError::new(
            "point_size",
            "is out of range",
        ));
        assert_eq!(
            err.source().unwrap().to_string(),
            "point_size: is out of range",
        );

        let err = PipelineCreationError::ResourceMap {
            stage: ShaderStage::Fragment,
            error: ResourceMapError::DuplicateMapping {
                region: ResourceRegion::Sampler,
                entity: 2,
            },
        };
        assert!(err.to_string().contains("Fragment"));
        assert!(err.source().is_some());

        let err: PipelineCreationError = StateAllocationError::OutOfSpace {
            kind: StateKind::Blend,
            size: 8,
        }
        .into();
        assert!(matches!(err, PipelineCreationError::StateAllocation(_)));
    }
}
