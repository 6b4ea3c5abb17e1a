// Copyright (c) 2026 The icd-pipeline contributors
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Subdivides primitives into smaller primitives.

use crate::{device::Device, NonExhaustive, ValidationError};

/// The state in a graphics pipeline describing the tessellation shader execution of a graphics
/// pipeline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TessellationState {
    /// The number of patch control points to use.
    ///
    /// The default value is 3.
    pub patch_control_points: u32,

    /// The tessellation factor the shader is optimized for. Zero if there is no preference.
    ///
    /// The default value is `0.0`.
    pub optimal_tess_factor: f32,

    /// A tessellation factor to use instead of the one computed by the shader. Zero if the
    /// shader's factor is used.
    ///
    /// The default value is `0.0`.
    pub fixed_tess_factor: f32,

    pub _ne: NonExhaustive,
}

impl TessellationState {
    /// Returns a `TessellationState` with default values.
    #[inline]
    pub const fn new() -> Self {
        Self {
            patch_control_points: 3,
            optimal_tess_factor: 0.0,
            fixed_tess_factor: 0.0,
            _ne: NonExhaustive(()),
        }
    }

    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let max = device.properties().max_patch_control_points;

        if !(1..=max).contains(&self.patch_control_points) {
            return Err(ValidationError::new(
                "patch_control_points",
                format!(
                    "is {}, which is not between 1 and the `max_patch_control_points` limit ({})",
                    self.patch_control_points, max,
                ),
            ));
        }

        for (name, factor) in [
            ("optimal_tess_factor", self.optimal_tess_factor),
            ("fixed_tess_factor", self.fixed_tess_factor),
        ] {
            if !(factor.is_finite() && factor >= 0.0) {
                return Err(ValidationError::new(name, "is negative or not finite"));
            }
        }

        Ok(())
    }
}

impl Default for TessellationState {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}
