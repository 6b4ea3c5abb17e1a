// Copyright (c) 2026 The icd-pipeline contributors
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Pipeline state compiler and resource binding mapper for GEN6/GEN7 class GPUs.
//!
//! # Brief summary
//!
//! - A [`Device`](crate::device::Device) describes the hardware revision being driven, its
//!   capability limits, the table of hardware [workarounds](crate::device::workarounds) that
//!   apply to it, and the [`StateAllocator`](crate::device::StateAllocator) that fixed-function
//!   state objects are placed in.
//!
//! - Shader stages arrive already compiled, as a [`CompiledShader`](crate::shader::CompiledShader)
//!   together with a [`DescriptorSetMapping`](crate::shader::DescriptorSetMapping) telling how
//!   the stage's resources are reached from the bound descriptor sets.
//!
//! - A [`Pipeline`](crate::pipeline::Pipeline) is created from a graphics or compute create info.
//!   Creation validates the description, builds a
//!   [`ResourceMap`](crate::pipeline::resource_map::ResourceMap) for each stage, bakes the
//!   fixed-function state into state objects and emits a short
//!   [`CommandStream`](crate::pipeline::command_stream::CommandStream) that is replayed as-is every
//!   time the pipeline is bound.
//!
//! - A [`PipelineDelta`](crate::pipeline::delta::PipelineDelta) holds only the commands that
//!   differ between two pipelines, for switching from one to the other cheaply.
//!
//! - Pipelines can be [stored](crate::pipeline::Pipeline::store) into a binary blob and
//!   [loaded](crate::pipeline::Pipeline::load) back on a device with the same hardware revision.
//!
//! # Logging
//!
//! The crate logs through the [`log`] facade and never installs a logger itself.

use std::{
    borrow::Cow,
    error::Error,
    fmt::{Display, Error as FmtError, Formatter},
    num::NonZero,
};

pub mod device;
pub mod format;
mod macros;
pub mod pipeline;
pub mod shader;

/// An object created by the driver and handed out to the API.
///
/// Reference counting is provided by `Arc`, and destruction happens when the last reference is
/// dropped.
pub trait DriverObject: Send + Sync {
    /// Returns the type of the object.
    fn object_type(&self) -> ObjectType;

    /// Returns the handle identifying the object. Handles are unique within the process.
    fn handle(&self) -> Handle;
}

/// The types of [`DriverObject`]s.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum ObjectType {
    Pipeline,
    PipelineDelta,
}

/// The handle of a [`DriverObject`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(NonZero<u64>);

impl Handle {
    #[inline]
    pub(crate) fn new(id: NonZero<u64>) -> Self {
        Self(id)
    }

    /// Returns the raw value of the handle.
    #[inline]
    pub fn as_raw(self) -> u64 {
        self.0.get()
    }
}

/// A helper type for non-exhaustive structs.
///
/// This type cannot be constructed outside this crate. Structures with a field of this type can
/// only be constructed by calling a constructor function or `Default::default()`. The effect is
/// similar to the standard Rust `#[non_exhaustive]` attribute, except that it does not prevent
/// update syntax from being used.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)] // add traits as needed
pub struct NonExhaustive(pub(crate) ());

/// The arguments or other context of a call did not meet the requirements of the driver.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationError {
    /// The context in which the problem exists (e.g. a specific parameter).
    pub context: Cow<'static, str>,

    /// A description of the problem.
    pub problem: Cow<'static, str>,
}

impl ValidationError {
    pub(crate) fn new(
        context: impl Into<Cow<'static, str>>,
        problem: impl Into<Cow<'static, str>>,
    ) -> Box<Self> {
        Box::new(Self {
            context: context.into(),
            problem: problem.into(),
        })
    }

    pub(crate) fn add_context(mut self: Box<Self>, context: impl Into<Cow<'static, str>>) -> Box<Self> {
        if self.context.is_empty() {
            self.context = context.into();
        } else {
            self.context = format!("{}.{}", context.into(), self.context).into();
        }

        self
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        if self.context.is_empty() {
            write!(f, "{}", self.problem)
        } else {
            write!(f, "{}: {}", self.context, self.problem)
        }
    }
}

impl Error for ValidationError {}

#[cfg(test)]
mod validation_tests {
    use super::ValidationError;

    #[test]
    fn context_nests_outwards() {
        let err = ValidationError::new("topology", "is not a strip or fan topology")
            .add_context("input_assembly_state");

        assert_eq!(err.context, "input_assembly_state.topology");
        assert_eq!(
            err.to_string(),
            "input_assembly_state.topology: is not a strip or fan topology",
        );
    }

    #[test]
    fn empty_context() {
        let err = ValidationError::new("", "no vertex stage").add_context("stages");
        assert_eq!(err.to_string(), "stages: no vertex stage");
    }
}
