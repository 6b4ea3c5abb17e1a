// Copyright (c) 2026 The icd-pipeline contributors
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Output merger state: how fragment colors are combined with the render targets.
//!
//! Each color attachment is either blended through an [`AttachmentBlend`], combined through the
//! pipeline-wide [`LogicOp`], or overwritten. The attachment count is also the number of render
//! target slots in the fragment stage's resource map, and each attachment occupies one entry of
//! the hardware `BLEND_STATE`.

use super::binding_table::MAX_DRAW_BUFFERS;
use crate::{
    macros::{vulkan_bitflags, vulkan_enum},
    NonExhaustive, ValidationError,
};
use std::hash::{Hash, Hasher};

/// The blend state of a graphics pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorBlendState {
    /// Bitwise operation between the fragment color and the render target contents.
    ///
    /// Mutually exclusive with per-attachment blending. The default value is `None`.
    pub logic_op: Option<LogicOp>,

    /// One entry per render target, in render target order.
    ///
    /// The hardware has [`MAX_DRAW_BUFFERS`] draw surfaces. The default value is empty.
    pub attachments: Vec<ColorBlendAttachmentState>,

    /// RGBA value read by the `Constant*` blend factors. Goes into `COLOR_CALC_STATE`.
    ///
    /// Defaults to transparent black.
    pub blend_constants: [f32; 4],

    pub _ne: NonExhaustive,
}

impl ColorBlendState {
    /// Returns a `ColorBlendState` with default values.
    #[inline]
    pub fn new() -> Self {
        Self {
            logic_op: None,
            attachments: Vec::new(),
            blend_constants: [0.0; 4],
            _ne: NonExhaustive(()),
        }
    }

    /// Returns a `ColorBlendState` with `count` duplicates of `attachment_state`.
    #[inline]
    pub fn with_attachment_states(count: u32, attachment_state: ColorBlendAttachmentState) -> Self {
        Self {
            attachments: vec![attachment_state; count as usize],
            ..Self::new()
        }
    }

    pub(crate) fn validate(&self) -> Result<(), Box<ValidationError>> {
        if self.attachments.len() as u32 > MAX_DRAW_BUFFERS {
            return Err(ValidationError::new(
                "attachments",
                format!(
                    "has {} elements, but at most {} render targets are supported",
                    self.attachments.len(),
                    MAX_DRAW_BUFFERS,
                ),
            ));
        }

        if self.logic_op.is_some() {
            if let Some(index) = self
                .attachments
                .iter()
                .position(|attachment| attachment.blend.is_some())
            {
                return Err(ValidationError::new(
                    format!("attachments[{}].blend", index),
                    "is `Some`, but `logic_op` is also `Some`",
                ));
            }
        }

        if !self.blend_constants.iter().all(|c| c.is_finite()) {
            return Err(ValidationError::new("blend_constants", "is not finite"));
        }

        Ok(())
    }
}

impl Default for ColorBlendState {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Hash for ColorBlendState {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.logic_op.hash(state);
        self.attachments.hash(state);
        self.blend_constants.map(f32::to_bits).hash(state);
    }
}

/// Per render target blend state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColorBlendAttachmentState {
    /// `None` writes the fragment color unmodified.
    pub blend: Option<AttachmentBlend>,

    /// Channels that are written. Defaults to all of them.
    pub color_write_mask: ColorComponents,
}

impl Default for ColorBlendAttachmentState {
    #[inline]
    fn default() -> Self {
        Self {
            blend: None,
            color_write_mask: ColorComponents::all(),
        }
    }
}

/// Blend equation for the color and alpha channels of one render target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttachmentBlend {
    pub src_color_blend_factor: BlendFactor,
    pub dst_color_blend_factor: BlendFactor,
    pub color_blend_op: BlendOp,
    pub src_alpha_blend_factor: BlendFactor,
    pub dst_alpha_blend_factor: BlendFactor,
    pub alpha_blend_op: BlendOp,
}

impl AttachmentBlend {
    /// Standard "over" compositing: the source is weighted by its alpha and the destination by
    /// the remainder.
    #[inline]
    pub fn alpha() -> Self {
        Self {
            src_color_blend_factor: BlendFactor::SrcAlpha,
            dst_color_blend_factor: BlendFactor::OneMinusSrcAlpha,
            color_blend_op: BlendOp::Add,
            src_alpha_blend_factor: BlendFactor::SrcAlpha,
            dst_alpha_blend_factor: BlendFactor::OneMinusSrcAlpha,
            alpha_blend_op: BlendOp::Add,
        }
    }
}

vulkan_enum! {
    /// Bitwise operation applied instead of blending.
    LogicOp = LogicOp(i32);

    Clear = CLEAR,
    And = AND,
    AndReverse = AND_REVERSE,
    Copy = COPY,
    AndInverted = AND_INVERTED,
    Noop = NO_OP,
    Xor = XOR,
    Or = OR,
    Nor = NOR,
    Equivalent = EQUIVALENT,
    Invert = INVERT,
    OrReverse = OR_REVERSE,
    CopyInverted = COPY_INVERTED,
    OrInverted = OR_INVERTED,
    Nand = NAND,
    Set = SET,
}

vulkan_enum! {
    /// Multiplier applied to a blend operand.
    BlendFactor = BlendFactor(i32);

    Zero = ZERO,
    One = ONE,
    SrcColor = SRC_COLOR,
    OneMinusSrcColor = ONE_MINUS_SRC_COLOR,
    DstColor = DST_COLOR,
    OneMinusDstColor = ONE_MINUS_DST_COLOR,
    SrcAlpha = SRC_ALPHA,
    OneMinusSrcAlpha = ONE_MINUS_SRC_ALPHA,
    DstAlpha = DST_ALPHA,
    OneMinusDstAlpha = ONE_MINUS_DST_ALPHA,
    ConstantColor = CONSTANT_COLOR,
    OneMinusConstantColor = ONE_MINUS_CONSTANT_COLOR,
    ConstantAlpha = CONSTANT_ALPHA,
    OneMinusConstantAlpha = ONE_MINUS_CONSTANT_ALPHA,
    SrcAlphaSaturate = SRC_ALPHA_SATURATE,
}

vulkan_enum! {
    /// How the weighted source and destination are combined.
    BlendOp = BlendOp(i32);

    Add = ADD,
    Subtract = SUBTRACT,
    ReverseSubtract = REVERSE_SUBTRACT,

    /// Blend factors are ignored.
    Min = MIN,

    /// Blend factors are ignored.
    Max = MAX,
}

vulkan_bitflags! {
    /// Channel write mask of a render target.
    ColorComponents = ColorComponentFlags(u32);

    R = R,
    G = G,
    B = B,
    A = A,
}
