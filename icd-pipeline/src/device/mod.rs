// Copyright (c) 2026 The icd-pipeline contributors
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! The hardware a pipeline is compiled for.
//!
//! A [`Device`] is read-only once created. It carries:
//!
//! - the [`HardwareRevision`] (generation and stepping) of the GPU;
//! - the capability limits of the GPU, as [`DeviceProperties`];
//! - the [`WorkaroundTable`] listing the extra commands this revision needs around state changes;
//! - the [`StateAllocator`] that fixed-function state objects are allocated from.
//!
//! All of these are injected through [`DeviceCreateInfo`], so that tests and other drivers can
//! supply their own limits, errata and allocation strategy.

pub use self::{
    allocator::{
        StateAllocationError, StateAllocator, StateHeap, StateKind, StateOffset, StateRequest,
    },
    workarounds::{
        WorkaroundCondition, WorkaroundFlags, WorkaroundQuery, WorkaroundRule, WorkaroundSet,
        WorkaroundTable,
    },
};
use crate::{NonExhaustive, ValidationError};
use std::{
    fmt::{Debug, Error as FmtError, Formatter},
    num::NonZero,
    sync::Arc,
};

pub mod allocator;
pub mod workarounds;

/// A GPU generation supported by the pipeline compiler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u32)]
pub enum Generation {
    /// Sandy Bridge.
    Gen6 = 60,

    /// Ivy Bridge.
    Gen7 = 70,

    /// Haswell.
    Gen7_5 = 75,
}

impl Generation {
    #[inline]
    pub const fn as_raw(self) -> u32 {
        self as u32
    }

    #[inline]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            60 => Some(Self::Gen6),
            70 => Some(Self::Gen7),
            75 => Some(Self::Gen7_5),
            _ => None,
        }
    }
}

/// Identifies a specific hardware revision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HardwareRevision {
    pub generation: Generation,

    /// The silicon stepping within the generation, starting at 0 for the first stepping.
    pub stepping: u32,
}

impl HardwareRevision {
    #[inline]
    pub const fn new(generation: Generation, stepping: u32) -> Self {
        Self {
            generation,
            stepping,
        }
    }
}

/// The number of viewports the hardware can address.
pub const HARDWARE_MAX_VIEWPORTS: u32 = 16;

/// The number of control points a patch can have at most.
pub const HARDWARE_MAX_PATCH_CONTROL_POINTS: u32 = 32;

/// Capability limits of a device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceProperties {
    /// The maximum number of viewports a graphics pipeline can use.
    ///
    /// The default value is `1`. Must not exceed [`HARDWARE_MAX_VIEWPORTS`].
    pub max_viewports: u32,

    /// The maximum size in bytes of the push constants of one shader stage.
    pub max_push_constant_size: u32,

    /// The maximum number of control points of a patch list.
    ///
    /// The default value is `32`.
    pub max_patch_control_points: u32,

    pub _ne: NonExhaustive,
}

impl DeviceProperties {
    /// Returns the default limits of `generation`.
    pub const fn for_generation(generation: Generation) -> Self {
        Self {
            max_viewports: 1,
            max_push_constant_size: match generation {
                Generation::Gen6 => 128,
                Generation::Gen7 | Generation::Gen7_5 => 256,
            },
            max_patch_control_points: HARDWARE_MAX_PATCH_CONTROL_POINTS,
            _ne: NonExhaustive(()),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), Box<ValidationError>> {
        let &Self {
            max_viewports,
            max_push_constant_size,
            max_patch_control_points,
            _ne: _,
        } = self;

        if !(1..=HARDWARE_MAX_VIEWPORTS).contains(&max_viewports) {
            return Err(ValidationError::new(
                "max_viewports",
                format!("is not between 1 and {}", HARDWARE_MAX_VIEWPORTS),
            ));
        }

        if max_push_constant_size == 0 || max_push_constant_size % 32 != 0 {
            return Err(ValidationError::new(
                "max_push_constant_size",
                "is not a non-zero multiple of 32",
            ));
        }

        if !(1..=HARDWARE_MAX_PATCH_CONTROL_POINTS).contains(&max_patch_control_points) {
            return Err(ValidationError::new(
                "max_patch_control_points",
                format!("is not between 1 and {}", HARDWARE_MAX_PATCH_CONTROL_POINTS),
            ));
        }

        Ok(())
    }
}

/// Parameters to create a new `Device`.
#[derive(Clone)]
pub struct DeviceCreateInfo {
    /// The hardware revision being driven.
    pub revision: HardwareRevision,

    /// The capability limits.
    ///
    /// The default value is [`DeviceProperties::for_generation`] of the revision's generation.
    pub properties: DeviceProperties,

    /// The errata rules applied to pipelines created on the device.
    ///
    /// The default value is [`WorkaroundTable::intel`].
    pub workarounds: Arc<WorkaroundTable>,

    /// The allocator that fixed-function state objects are placed in.
    ///
    /// The default value is a new [`StateHeap`] of [`StateHeap::DEFAULT_SIZE`] bytes.
    pub allocator: Arc<dyn StateAllocator>,

    pub _ne: NonExhaustive,
}

impl DeviceCreateInfo {
    /// Returns a `DeviceCreateInfo` with the default values for `revision`.
    pub fn new(revision: HardwareRevision) -> Self {
        Self {
            revision,
            properties: DeviceProperties::for_generation(revision.generation),
            workarounds: Arc::new(WorkaroundTable::intel()),
            allocator: Arc::new(StateHeap::new(StateHeap::DEFAULT_SIZE)),
            _ne: NonExhaustive(()),
        }
    }
}

impl Debug for DeviceCreateInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.debug_struct("DeviceCreateInfo")
            .field("revision", &self.revision)
            .field("properties", &self.properties)
            .field("workarounds", &self.workarounds)
            .finish_non_exhaustive()
    }
}

/// The hardware that pipelines are compiled for, along with the services they need from it.
pub struct Device {
    id: NonZero<u64>,
    revision: HardwareRevision,
    properties: DeviceProperties,
    workarounds: Arc<WorkaroundTable>,
    allocator: Arc<dyn StateAllocator>,
}

impl Device {
    /// Creates a new `Device`.
    pub fn new(create_info: DeviceCreateInfo) -> Result<Arc<Device>, Box<ValidationError>> {
        create_info
            .properties
            .validate()
            .map_err(|err| err.add_context("create_info.properties"))?;

        let DeviceCreateInfo {
            revision,
            properties,
            workarounds,
            allocator,
            _ne: _,
        } = create_info;

        log::debug!(
            "created device for {:?} stepping {} with {} workaround rules",
            revision.generation,
            revision.stepping,
            workarounds.rules().len(),
        );

        Ok(Arc::new(Device {
            id: Self::next_id(),
            revision,
            properties,
            workarounds,
            allocator,
        }))
    }

    /// Returns the hardware revision of the device.
    #[inline]
    pub fn revision(&self) -> HardwareRevision {
        self.revision
    }

    /// Returns the generation of the device.
    #[inline]
    pub fn generation(&self) -> Generation {
        self.revision.generation
    }

    /// Returns the capability limits of the device.
    #[inline]
    pub fn properties(&self) -> &DeviceProperties {
        &self.properties
    }

    /// Returns the errata table of the device.
    #[inline]
    pub fn workarounds(&self) -> &Arc<WorkaroundTable> {
        &self.workarounds
    }

    /// Returns the state allocator of the device.
    #[inline]
    pub fn allocator(&self) -> &Arc<dyn StateAllocator> {
        &self.allocator
    }
}

impl Debug for Device {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("revision", &self.revision)
            .field("properties", &self.properties)
            .finish_non_exhaustive()
    }
}

crate::macros::impl_id_counter!(Device);

/// Implemented on objects that belong to a device.
pub trait DeviceOwned {
    /// Returns the device that owns `self`.
    fn device(&self) -> &Arc<Device>;
}

impl<T> DeviceOwned for T
where
    T: std::ops::Deref,
    T::Target: DeviceOwned,
{
    fn device(&self) -> &Arc<Device> {
        (**self).device()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Device, DeviceCreateInfo, DeviceProperties, Generation, HardwareRevision, StateHeap,
        WorkaroundTable,
    };
    use std::sync::Arc;

    #[test]
    fn default_properties() {
        let device = test_device!(Gen6, 1);
        assert_eq!(device.generation(), Generation::Gen6);
        assert_eq!(device.revision().stepping, 1);
        assert_eq!(device.properties().max_viewports, 1);
        assert_eq!(device.properties().max_push_constant_size, 128);
        assert_eq!(device.properties().max_patch_control_points, 32);
    }

    #[test]
    fn invalid_properties() {
        let mut create_info = DeviceCreateInfo::new(HardwareRevision::new(Generation::Gen7, 0));
        create_info.properties = DeviceProperties {
            max_viewports: 17,
            ..DeviceProperties::for_generation(Generation::Gen7)
        };

        let err = Device::new(create_info).unwrap_err();
        assert_eq!(err.context, "create_info.properties.max_viewports");
    }

    #[test]
    fn injected_collaborators() {
        let heap = Arc::new(StateHeap::new(4096));
        let create_info = DeviceCreateInfo {
            workarounds: Arc::new(WorkaroundTable::empty()),
            allocator: heap.clone(),
            ..DeviceCreateInfo::new(HardwareRevision::new(Generation::Gen7_5, 0))
        };

        let device = Device::new(create_info).unwrap();
        assert!(device.workarounds().rules().is_empty());
        assert_eq!(heap.live_allocations(), 0);
    }

    #[test]
    fn generation_order() {
        assert!(Generation::Gen6 < Generation::Gen7);
        assert!(Generation::Gen7 < Generation::Gen7_5);
        assert_eq!(Generation::from_raw(75), Some(Generation::Gen7_5));
        assert_eq!(Generation::from_raw(80), None);
    }

    #[test]
    fn distinct_devices() {
        let a = test_device!();
        let b = test_device!();
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }
}
