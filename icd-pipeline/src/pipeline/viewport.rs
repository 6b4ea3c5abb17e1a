// Copyright (c) 2026 The icd-pipeline contributors
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Configure how to map vertices to the framebuffer.
//!
//! The viewport is the area of the framebuffer that the normalized device coordinates are
//! mapped to, and the depth range that depth values are mapped to. Scissor boxes additionally
//! discard every fragment outside of them.
//!
//! Each viewport has its own scissor box. If no scissors are given, the scissor test is disabled
//! and no scissor state is allocated.

use crate::{device::Device, NonExhaustive, ValidationError};
use smallvec::{smallvec, SmallVec};
use std::{
    hash::{Hash, Hasher},
    ops::RangeInclusive,
};

/// List of viewports and scissors that are used when creating a graphics pipeline object.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewportState {
    /// The viewports.
    ///
    /// The default value is a single viewport covering `[0, 0]` to `[1, 1]`.
    pub viewports: SmallVec<[Viewport; 1]>,

    /// The scissor boxes, one for each viewport.
    ///
    /// If empty, the scissor test is disabled. The default value is empty.
    pub scissors: SmallVec<[Scissor; 1]>,

    pub _ne: NonExhaustive,
}

impl ViewportState {
    /// Returns a `ViewportState` with one default viewport and no scissors.
    #[inline]
    pub fn new() -> Self {
        Self {
            viewports: smallvec![Viewport::default()],
            scissors: SmallVec::new(),
            _ne: NonExhaustive(()),
        }
    }

    /// Returns whether the scissor test is enabled.
    #[inline]
    pub fn scissor_enable(&self) -> bool {
        !self.scissors.is_empty()
    }

    pub(crate) fn validate(
        &self,
        device: &Device,
        rasterizer_discard_enable: bool,
    ) -> Result<(), Box<ValidationError>> {
        let max_viewports = device.properties().max_viewports;
        let viewport_count = self.viewports.len() as u32;

        if viewport_count > max_viewports
            || (viewport_count == 0 && !rasterizer_discard_enable)
        {
            return Err(ValidationError::new(
                "viewports",
                format!(
                    "has {} elements, which is not between 1 and the `max_viewports` limit ({})",
                    viewport_count, max_viewports,
                ),
            ));
        }

        for (index, viewport) in self.viewports.iter().enumerate() {
            viewport
                .validate()
                .map_err(|err| err.add_context(format!("viewports[{}]", index)))?;
        }

        if self.scissor_enable() && self.scissors.len() != self.viewports.len() {
            return Err(ValidationError::new(
                "scissors",
                "is not empty, and its length does not equal the length of `viewports`",
            ));
        }

        Ok(())
    }
}

impl Default for ViewportState {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Hash for ViewportState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.viewports.hash(state);
        self.scissors.hash(state);
    }
}

/// State of a single viewport.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Viewport {
    /// Coordinates in pixels of the top-left hand corner of the viewport.
    ///
    /// The default value is `[0.0; 2]`.
    pub offset: [f32; 2],

    /// Dimensions in pixels of the viewport.
    ///
    /// The default value is `[1.0; 2]`.
    pub extent: [f32; 2],

    /// Minimum and maximum values of the depth.
    ///
    /// The values `0.0` to `1.0` of each vertex's Z coordinate will be mapped to this
    /// `depth_range` before being compared to the existing depth value.
    ///
    /// The default value is `0.0..=1.0`.
    pub depth_range: RangeInclusive<f32>,
}

impl Default for Viewport {
    #[inline]
    fn default() -> Self {
        Viewport {
            offset: [0.0; 2],
            extent: [1.0; 2],
            depth_range: 0.0..=1.0,
        }
    }
}

impl Viewport {
    fn validate(&self) -> Result<(), Box<ValidationError>> {
        if !self.extent.iter().all(|&e| e.is_finite() && e > 0.0) {
            return Err(ValidationError::new(
                "extent",
                "is not greater than zero in every dimension",
            ));
        }

        if !self.offset.iter().all(|o| o.is_finite()) {
            return Err(ValidationError::new("offset", "is not finite"));
        }

        let unit = 0.0f32..=1.0;

        if !unit.contains(self.depth_range.start()) || !unit.contains(self.depth_range.end()) {
            return Err(ValidationError::new(
                "depth_range",
                "is not within the range 0.0..=1.0",
            ));
        }

        Ok(())
    }
}

impl Hash for Viewport {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.offset.map(f32::to_bits).hash(state);
        self.extent.map(f32::to_bits).hash(state);
        self.depth_range.start().to_bits().hash(state);
        self.depth_range.end().to_bits().hash(state);
    }
}

/// A two-dimensional subregion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Scissor {
    /// Coordinates of the top-left hand corner of the box.
    ///
    /// The default value is `[0; 2]`.
    pub offset: [u32; 2],

    /// Dimensions of the box.
    ///
    /// The default value is `[i32::MAX as u32; 2]`.
    pub extent: [u32; 2],
}

impl Default for Scissor {
    #[inline]
    fn default() -> Self {
        Scissor {
            offset: [0; 2],
            extent: [i32::MAX as u32; 2],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Scissor, Viewport, ViewportState};
    use smallvec::{smallvec, SmallVec};

    #[test]
    fn viewport_count() {
        let device = test_device!();
        assert!(ViewportState::new().validate(&device, false).is_ok());

        let empty = ViewportState {
            viewports: SmallVec::new(),
            ..Default::default()
        };
        assert!(empty.validate(&device, false).is_err());
        assert!(empty.validate(&device, true).is_ok());

        let two = ViewportState {
            viewports: smallvec![Viewport::default(), Viewport::default()],
            ..Default::default()
        };
        assert!(two.validate(&device, false).is_err());
    }

    #[test]
    fn scissor_count() {
        let device = test_device!();
        let mut state = ViewportState {
            scissors: smallvec![Scissor::default()],
            ..Default::default()
        };
        assert!(state.scissor_enable());
        assert!(state.validate(&device, false).is_ok());

        state.scissors.push(Scissor::default());
        let err = state.validate(&device, false).unwrap_err();
        assert_eq!(err.context, "scissors");
    }

    #[test]
    fn viewport_bounds() {
        let device = test_device!();
        let state = ViewportState {
            viewports: smallvec![Viewport {
                depth_range: 0.0..=2.0,
                ..Default::default()
            }],
            ..Default::default()
        };

        let err = state.validate(&device, false).unwrap_err();
        assert_eq!(err.context, "viewports[0].depth_range");
    }
}
