// Copyright (c) 2026 The icd-pipeline contributors
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Writes vertices processed by the pre-rasterization stages back to buffers.

use super::binding_table::MAX_SO_BINDINGS;
use crate::{
    device::{Device, Generation},
    shader::ShaderStages,
    NonExhaustive, ValidationError,
};

/// The state in a graphics pipeline describing stream output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StreamOutputState {
    /// The number of vertices written per primitive.
    ///
    /// The default value is 0.
    pub num_vertices: u32,

    /// The number of vertices that fit in the bound buffers.
    ///
    /// The default value is 0.
    pub max_vertices: u32,

    /// The number of stream output buffer bindings.
    ///
    /// At most [`MAX_SO_BINDINGS`]. The default value is 0.
    pub binding_count: u32,

    pub _ne: NonExhaustive,
}

impl StreamOutputState {
    /// Returns a `StreamOutputState` with default values.
    #[inline]
    pub const fn new() -> Self {
        Self {
            num_vertices: 0,
            max_vertices: 0,
            binding_count: 0,
            _ne: NonExhaustive(()),
        }
    }

    pub(crate) fn validate(
        &self,
        device: &Device,
        active_stages: ShaderStages,
    ) -> Result<(), Box<ValidationError>> {
        if self.binding_count > MAX_SO_BINDINGS {
            return Err(ValidationError::new(
                "binding_count",
                format!("is greater than {}", MAX_SO_BINDINGS),
            ));
        }

        if self.num_vertices > self.max_vertices {
            return Err(ValidationError::new(
                "num_vertices",
                "is greater than `max_vertices`",
            ));
        }

        // GEN6 has no stream output unit; the geometry shader writes the buffers itself.
        if device.generation() == Generation::Gen6
            && !active_stages.intersects(ShaderStages::GEOMETRY)
        {
            return Err(ValidationError::new(
                "",
                "stream output is used on GEN6, but the pipeline has no geometry stage",
            ));
        }

        Ok(())
    }
}

impl Default for StreamOutputState {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::StreamOutputState;
    use crate::shader::ShaderStages;

    #[test]
    fn gen6_needs_geometry() {
        let gen6 = test_device!(Gen6, 0);
        let gen7 = test_device!(Gen7, 0);
        let state = StreamOutputState {
            num_vertices: 3,
            max_vertices: 300,
            binding_count: 4,
            ..Default::default()
        };

        assert!(state.validate(&gen6, ShaderStages::VERTEX).is_err());
        assert!(state
            .validate(&gen6, ShaderStages::VERTEX | ShaderStages::GEOMETRY)
            .is_ok());
        assert!(state.validate(&gen7, ShaderStages::VERTEX).is_ok());
    }

    #[test]
    fn limits() {
        let device = test_device!();
        let state = StreamOutputState {
            binding_count: 65,
            ..Default::default()
        };
        assert!(state.validate(&device, ShaderStages::VERTEX).is_err());

        let state = StreamOutputState {
            num_vertices: 4,
            max_vertices: 3,
            ..Default::default()
        };
        assert!(state.validate(&device, ShaderStages::VERTEX).is_err());
    }
}
