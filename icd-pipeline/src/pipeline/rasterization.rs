// Copyright (c) 2026 The icd-pipeline contributors
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Configures how primitives are rasterized.

use crate::{
    device::{Device, Generation},
    macros::vulkan_enum,
    NonExhaustive, ValidationError,
};
use std::hash::{Hash, Hasher};

/// The smallest point size the hardware can rasterize.
pub const MIN_POINT_SIZE: f32 = 0.125;

/// The largest point size the hardware can rasterize.
pub const MAX_POINT_SIZE: f32 = 255.875;

/// Rasterizer controls that end up in the SF and clip state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RasterizationState {
    /// If true, primitives are clipped against the near and far planes of the viewport.
    ///
    /// The default value is `true`.
    pub depth_clip_enable: bool,

    /// Stops primitives after the clipper. Viewports are then not required, which stream output
    /// only pipelines rely on.
    ///
    /// The default value is `false`.
    pub rasterizer_discard_enable: bool,

    /// The size of rasterized points.
    ///
    /// Must be between [`MIN_POINT_SIZE`] and [`MAX_POINT_SIZE`]. The default value is `1.0`.
    pub point_size: f32,

    pub _ne: NonExhaustive,
}

impl RasterizationState {
    /// Returns a `RasterizationState` with default values.
    #[inline]
    pub const fn new() -> Self {
        Self {
            depth_clip_enable: true,
            rasterizer_discard_enable: false,
            point_size: 1.0,
            _ne: NonExhaustive(()),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), Box<ValidationError>> {
        if !(MIN_POINT_SIZE..=MAX_POINT_SIZE).contains(&self.point_size) {
            return Err(ValidationError::new(
                "point_size",
                format!(
                    "is {}, which is not between {} and {}",
                    self.point_size, MIN_POINT_SIZE, MAX_POINT_SIZE,
                ),
            ));
        }

        Ok(())
    }
}

impl Default for RasterizationState {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Hash for RasterizationState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.depth_clip_enable.hash(state);
        self.rasterizer_discard_enable.hash(state);
        self.point_size.to_bits().hash(state);
    }
}

/// Multisampling of a graphics pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MultisampleState {
    /// The number of rasterization samples.
    ///
    /// The default value is [`SampleCount::Sample1`].
    pub rasterization_samples: SampleCount,

    pub _ne: NonExhaustive,
}

impl MultisampleState {
    /// Returns a `MultisampleState` with default values.
    #[inline]
    pub const fn new() -> Self {
        Self {
            rasterization_samples: SampleCount::Sample1,
            _ne: NonExhaustive(()),
        }
    }

    pub(crate) fn validate(&self, device: &Device) -> Result<(), Box<ValidationError>> {
        let samples = self.rasterization_samples;
        let supported = match device.generation() {
            Generation::Gen6 => matches!(samples, SampleCount::Sample1 | SampleCount::Sample4),
            Generation::Gen7 | Generation::Gen7_5 => matches!(
                samples,
                SampleCount::Sample1 | SampleCount::Sample4 | SampleCount::Sample8,
            ),
        };

        if !supported {
            return Err(ValidationError::new(
                "rasterization_samples",
                format!(
                    "is `SampleCount::{:?}`, which is not supported on {:?}",
                    samples,
                    device.generation(),
                ),
            ));
        }

        Ok(())
    }
}

impl Default for MultisampleState {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

vulkan_enum! {
    /// The number of samples per texel of an image, or per pixel when rasterizing.
    SampleCount = SampleCountFlags(u32);

    Sample1 = TYPE_1,

    Sample2 = TYPE_2,

    Sample4 = TYPE_4,

    Sample8 = TYPE_8,

    Sample16 = TYPE_16,
}

impl SampleCount {
    /// Returns the number of samples.
    #[inline]
    pub const fn count(self) -> u32 {
        self as u32
    }
}

#[cfg(test)]
mod tests {
    use super::{MultisampleState, RasterizationState, SampleCount};

    #[test]
    fn point_size_range() {
        assert!(RasterizationState::new().validate().is_ok());

        for point_size in [0.0, 0.1, 256.0, f32::NAN] {
            let state = RasterizationState {
                point_size,
                ..Default::default()
            };
            assert!(state.validate().is_err());
        }

        let largest = RasterizationState {
            point_size: 255.875,
            ..Default::default()
        };
        assert!(largest.validate().is_ok());
    }

    #[test]
    fn sample_counts() {
        let gen6 = test_device!(Gen6, 0);
        let gen7 = test_device!(Gen7, 0);
        let state = |rasterization_samples| MultisampleState {
            rasterization_samples,
            ..Default::default()
        };

        assert!(state(SampleCount::Sample4).validate(&gen6).is_ok());
        assert!(state(SampleCount::Sample8).validate(&gen6).is_err());
        assert!(state(SampleCount::Sample8).validate(&gen7).is_ok());
        assert!(state(SampleCount::Sample2).validate(&gen7).is_err());
        assert_eq!(SampleCount::Sample8.count(), 8);
    }
}
