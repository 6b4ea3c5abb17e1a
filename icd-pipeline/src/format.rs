// Copyright (c) 2026 The icd-pipeline contributors
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Formats of the attachments a graphics pipeline renders to.
//!
//! Only the formats that the pipeline compiler needs to know about are listed. The depth format
//! decides whether depth and stencil state can be enabled at all.

#![allow(non_camel_case_types)]

use crate::macros::vulkan_enum;

vulkan_enum! {
    /// An attachment format.
    Format = Format(i32);

    R8G8B8A8_UNORM = R8G8B8A8_UNORM,

    B8G8R8A8_UNORM = B8G8R8A8_UNORM,

    R16G16B16A16_SFLOAT = R16G16B16A16_SFLOAT,

    R32G32B32A32_SFLOAT = R32G32B32A32_SFLOAT,

    D16_UNORM = D16_UNORM,

    X8_D24_UNORM_PACK32 = X8_D24_UNORM_PACK32,

    D32_SFLOAT = D32_SFLOAT,

    S8_UINT = S8_UINT,

    /// Not supported as a depth buffer format by this hardware family.
    D16_UNORM_S8_UINT = D16_UNORM_S8_UINT,

    D24_UNORM_S8_UINT = D24_UNORM_S8_UINT,

    D32_SFLOAT_S8_UINT = D32_SFLOAT_S8_UINT,
}

impl Format {
    /// Returns whether the format has a depth component.
    #[inline]
    pub fn has_depth(self) -> bool {
        matches!(
            self,
            Format::D16_UNORM
                | Format::X8_D24_UNORM_PACK32
                | Format::D32_SFLOAT
                | Format::D16_UNORM_S8_UINT
                | Format::D24_UNORM_S8_UINT
                | Format::D32_SFLOAT_S8_UINT
        )
    }

    /// Returns whether the format has a stencil component.
    #[inline]
    pub fn has_stencil(self) -> bool {
        matches!(
            self,
            Format::S8_UINT
                | Format::D16_UNORM_S8_UINT
                | Format::D24_UNORM_S8_UINT
                | Format::D32_SFLOAT_S8_UINT
        )
    }

    /// Returns whether the format can be used for a depth/stencil attachment.
    #[inline]
    pub fn is_depth_stencil(self) -> bool {
        self.has_depth() || self.has_stencil()
    }

    /// Returns whether the hardware can use the format for its depth buffer.
    ///
    /// The hardware has no separate stencil buffer layout matching 16-bit depth, so the packed
    /// `D16_UNORM_S8_UINT` format cannot be used.
    #[inline]
    pub fn is_supported_depth_stencil(self) -> bool {
        self.is_depth_stencil() && self != Format::D16_UNORM_S8_UINT
    }
}
