// Copyright (c) 2026 The icd-pipeline contributors
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Depth and stencil test state, compiled into the hardware `DEPTH_STENCIL_STATE`.
//!
//! Each test needs a depth attachment format with the matching aspect.

use crate::{format::Format, macros::vulkan_enum, NonExhaustive, ValidationError};

/// Depth and stencil tests of a graphics pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DepthStencilState {
    /// `None` disables the depth test, which is the default.
    pub depth: Option<DepthState>,

    /// `None` disables the stencil test, which is the default.
    pub stencil: Option<StencilState>,

    pub _ne: NonExhaustive,
}

impl Default for DepthStencilState {
    #[inline]
    fn default() -> Self {
        Self {
            depth: None,
            stencil: None,
            _ne: NonExhaustive(()),
        }
    }
}

impl DepthStencilState {
    /// Returns whether any test is enabled.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.depth.is_some() || self.stencil.is_some()
    }

    pub(crate) fn validate(&self, depth_format: Option<Format>) -> Result<(), Box<ValidationError>> {
        if self.depth.is_some() && !depth_format.is_some_and(Format::has_depth) {
            return Err(ValidationError::new(
                "depth",
                "is `Some`, but `depth_attachment_format` has no depth component",
            ));
        }

        if self.stencil.is_some() && !depth_format.is_some_and(Format::has_stencil) {
            return Err(ValidationError::new(
                "stencil",
                "is `Some`, but `depth_attachment_format` has no stencil component",
            ));
        }

        Ok(())
    }
}

/// An enabled depth test.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DepthState {
    /// Whether passing fragments store their depth. Off by default.
    pub write_enable: bool,

    /// Fragment depth is the left operand. Defaults to [`CompareOp::Always`].
    pub compare_op: CompareOp,
}

impl Default for DepthState {
    #[inline]
    fn default() -> Self {
        Self {
            write_enable: false,
            compare_op: CompareOp::Always,
        }
    }
}

impl DepthState {
    /// Nearest fragment wins, with depth writes.
    #[inline]
    pub fn simple() -> Self {
        Self {
            compare_op: CompareOp::Less,
            write_enable: true,
        }
    }
}

/// An enabled stencil test, per facing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StencilState {
    /// Also used for points and lines.
    pub front: StencilOpState,

    pub back: StencilOpState,
}

/// Stencil test of one facing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StencilOpState {
    pub ops: StencilOps,

    /// Applied to both operands before comparing.
    pub compare_mask: u32,

    /// Stencil bits that the ops may modify.
    pub write_mask: u32,

    /// Right operand of `ops.compare_op`.
    pub reference: u32,
}

impl Default for StencilOpState {
    #[inline]
    fn default() -> StencilOpState {
        StencilOpState {
            ops: Default::default(),
            compare_mask: u32::MAX,
            write_mask: u32::MAX,
            reference: u32::MAX,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StencilOps {
    pub fail_op: StencilOp,
    pub pass_op: StencilOp,
    pub depth_fail_op: StencilOp,

    /// Stored stencil value against `reference`.
    pub compare_op: CompareOp,
}

impl Default for StencilOps {
    #[inline]
    fn default() -> Self {
        Self {
            pass_op: StencilOp::Keep,
            fail_op: StencilOp::Keep,
            depth_fail_op: StencilOp::Keep,
            compare_op: CompareOp::Never,
        }
    }
}

vulkan_enum! {
    /// Update applied to the stored stencil value.
    StencilOp = StencilOp(i32);

    Keep = KEEP,
    Zero = ZERO,
    Replace = REPLACE,
    IncrementAndClamp = INCREMENT_AND_CLAMP,
    DecrementAndClamp = DECREMENT_AND_CLAMP,
    Invert = INVERT,
    IncrementAndWrap = INCREMENT_AND_WRAP,
    DecrementAndWrap = DECREMENT_AND_WRAP,
}

vulkan_enum! {
    /// Comparison function of the depth and stencil tests.
    CompareOp = CompareOp(i32);

    Never = NEVER,
    Less = LESS,
    Equal = EQUAL,
    LessOrEqual = LESS_OR_EQUAL,
    Greater = GREATER,
    NotEqual = NOT_EQUAL,
    GreaterOrEqual = GREATER_OR_EQUAL,
    Always = ALWAYS,
}
