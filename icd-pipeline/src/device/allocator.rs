// Copyright (c) 2026 The icd-pipeline contributors
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Allocation of fixed-function state objects.
//!
//! Fixed-function state (viewports, blend, depth-stencil, binding tables, ...) lives in a
//! region of GPU memory that the hardware reads through 32-bit offsets. The pipeline compiler
//! only ever describes what it needs with a [`StateRequest`] and stores the [`StateOffset`] it
//! gets back; where that state lives is up to the [`StateAllocator`] of the device.
//!
//! The default allocator, [`StateHeap`], is content-addressed: two requests with the same kind and
//! description share one allocation, which is reference counted. This makes compiling the same
//! pipeline twice yield the same offsets, and it lets a serialized pipeline claim its state back
//! at the offsets it was stored with.

use foldhash::{fast::FixedState, HashMap};
use parking_lot::Mutex;
use std::{
    collections::BTreeMap,
    error::Error,
    fmt::{Display, Error as FmtError, Formatter},
    hash::{BuildHasher, Hash},
};

/// The kinds of fixed-function state objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u32)]
pub enum StateKind {
    /// `SF_VIEWPORT`, GEN6 only.
    SfViewport = 0,
    /// `CLIP_VIEWPORT`, GEN6 only.
    ClipViewport = 1,
    /// `SF_CLIP_VIEWPORT`, GEN7 and later.
    SfClipViewport = 2,
    CcViewport = 3,
    ColorCalc = 4,
    Blend = 5,
    DepthStencil = 6,
    Scissor = 7,
    BindingTable = 8,
    SamplerTable = 9,
    PushConstants = 10,
    InterfaceDescriptor = 11,
}

impl StateKind {
    #[inline]
    pub const fn as_raw(self) -> u32 {
        self as u32
    }

    pub const fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => Self::SfViewport,
            1 => Self::ClipViewport,
            2 => Self::SfClipViewport,
            3 => Self::CcViewport,
            4 => Self::ColorCalc,
            5 => Self::Blend,
            6 => Self::DepthStencil,
            7 => Self::Scissor,
            8 => Self::BindingTable,
            9 => Self::SamplerTable,
            10 => Self::PushConstants,
            11 => Self::InterfaceDescriptor,
            _ => return None,
        })
    }
}

/// The offset of a state object from the base of the state region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StateOffset(u32);

impl StateOffset {
    #[inline]
    pub const fn new(offset: u32) -> Self {
        Self(offset)
    }

    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }
}

const KEY_SEED: u64 = 0x1f5c_0a7e_6e16_d3c1;

/// Describes a state object to allocate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StateRequest {
    pub kind: StateKind,

    /// A hash of the contents of the state object. Requests with equal keys describe equal
    /// state.
    pub key: u64,

    /// The size of the state object in bytes.
    pub size: u32,

    /// The required alignment of the state object in bytes. Must be a power of two.
    pub alignment: u32,
}

impl StateRequest {
    /// Returns a request for a state object of `kind` whose contents are derived from
    /// `description`.
    pub fn new(kind: StateKind, size: u32, alignment: u32, description: &impl Hash) -> Self {
        debug_assert!(alignment.is_power_of_two());

        Self {
            kind,
            key: FixedState::with_seed(KEY_SEED).hash_one((kind, description)),
            size,
            alignment,
        }
    }
}

/// Allocates fixed-function state objects on behalf of a device.
///
/// Implementations must synchronize internally; they are called from any thread that creates or
/// drops pipelines.
pub trait StateAllocator: Send + Sync {
    /// Allocates a state object described by `request`.
    fn allocate(&self, request: &StateRequest) -> Result<StateOffset, StateAllocationError>;

    /// Claims a state object described by `request` at exactly `offset`.
    ///
    /// This is used when loading serialized pipelines, whose command words refer to the offsets
    /// they were compiled with.
    fn import(&self, request: &StateRequest, offset: StateOffset)
        -> Result<(), StateAllocationError>;

    /// Releases a state object previously returned by `allocate` or claimed by `import`.
    fn release(&self, offset: StateOffset);
}

/// Error that can happen when allocating a state object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateAllocationError {
    /// There is no free range large enough for the state object.
    OutOfSpace { kind: StateKind, size: u32 },

    /// The requested offset is already used by a different state object, or is not suitably
    /// aligned.
    Conflict { kind: StateKind, offset: StateOffset },
}

impl Error for StateAllocationError {}

impl Display for StateAllocationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self {
            Self::OutOfSpace { kind, size } => write!(
                f,
                "not enough space left to allocate {} bytes of {:?} state",
                size, kind,
            ),
            Self::Conflict { kind, offset } => write!(
                f,
                "{:?} state cannot be placed at offset {:#x}",
                kind,
                offset.get(),
            ),
        }
    }
}

/// The default [`StateAllocator`]: a first-fit, content-addressed heap.
#[derive(Debug)]
pub struct StateHeap {
    size: u32,
    state: Mutex<HeapState>,
}

#[derive(Debug, Default)]
struct HeapState {
    by_request: HashMap<StateRequest, StateOffset>,
    blocks: BTreeMap<u32, Block>,
}

#[derive(Debug)]
struct Block {
    request: StateRequest,
    end: u32,
    refs: u32,
}

impl StateHeap {
    /// The size of the heap created by [`DeviceCreateInfo::new`](super::DeviceCreateInfo::new).
    pub const DEFAULT_SIZE: u32 = 64 * 1024;

    /// Creates a heap spanning `size` bytes.
    pub fn new(size: u32) -> Self {
        StateHeap {
            size,
            state: Mutex::new(HeapState::default()),
        }
    }

    /// Returns the size of the heap in bytes.
    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Returns the number of distinct state objects currently allocated.
    pub fn live_allocations(&self) -> usize {
        self.state.lock().blocks.len()
    }

    /// Returns the number of references to the state object at `offset`, or 0 if there is none.
    pub fn references(&self, offset: StateOffset) -> u32 {
        self.state
            .lock()
            .blocks
            .get(&offset.get())
            .map_or(0, |block| block.refs)
    }
}

impl HeapState {
    fn find_free(&self, heap_size: u32, size: u32, alignment: u32) -> Option<u32> {
        let fits = |start: u64, limit: u64| start + u64::from(size) <= limit;
        let mut cursor = 0u64;

        for (&start, block) in &self.blocks {
            let aligned = align_up(cursor, alignment);

            if fits(aligned, u64::from(start)) {
                return u32::try_from(aligned).ok();
            }

            cursor = u64::from(block.end);
        }

        let aligned = align_up(cursor, alignment);

        fits(aligned, u64::from(heap_size))
            .then(|| u32::try_from(aligned).ok())
            .flatten()
    }

    fn is_free(&self, heap_size: u32, start: u32, size: u32) -> bool {
        let end = u64::from(start) + u64::from(size);

        if end > u64::from(heap_size) {
            return false;
        }

        let before_ok = self
            .blocks
            .range(..=start)
            .next_back()
            .map_or(true, |(_, block)| block.end <= start);
        let after_ok = self
            .blocks
            .range(start..)
            .next()
            .map_or(true, |(&next, _)| u64::from(next) >= end);

        before_ok && after_ok
    }

    fn insert(&mut self, request: StateRequest, start: u32) {
        let end = start + request.size.max(1);
        self.blocks.insert(
            start,
            Block {
                request,
                end,
                refs: 1,
            },
        );
        self.by_request.insert(request, StateOffset(start));
    }

    fn add_ref(&mut self, offset: StateOffset) {
        if let Some(block) = self.blocks.get_mut(&offset.get()) {
            block.refs += 1;
        }
    }
}

fn align_up(value: u64, alignment: u32) -> u64 {
    let alignment = u64::from(alignment.max(1));
    value.div_ceil(alignment) * alignment
}

impl StateAllocator for StateHeap {
    fn allocate(&self, request: &StateRequest) -> Result<StateOffset, StateAllocationError> {
        let mut state = self.state.lock();

        if let Some(&offset) = state.by_request.get(request) {
            state.add_ref(offset);
            return Ok(offset);
        }

        let size = request.size.max(1);
        let start = state
            .find_free(self.size, size, request.alignment)
            .ok_or(StateAllocationError::OutOfSpace {
                kind: request.kind,
                size: request.size,
            })?;
        state.insert(*request, start);

        Ok(StateOffset(start))
    }

    fn import(
        &self,
        request: &StateRequest,
        offset: StateOffset,
    ) -> Result<(), StateAllocationError> {
        let mut state = self.state.lock();
        let conflict = StateAllocationError::Conflict {
            kind: request.kind,
            offset,
        };

        if let Some(&existing) = state.by_request.get(request) {
            if existing != offset {
                return Err(conflict);
            }

            state.add_ref(offset);
            return Ok(());
        }

        if offset.get() % request.alignment.max(1) != 0 {
            return Err(conflict);
        }

        if u64::from(offset.get()) + u64::from(request.size.max(1)) > u64::from(self.size) {
            return Err(StateAllocationError::OutOfSpace {
                kind: request.kind,
                size: request.size,
            });
        }

        if !state.is_free(self.size, offset.get(), request.size.max(1)) {
            return Err(conflict);
        }

        state.insert(*request, offset.get());

        Ok(())
    }

    fn release(&self, offset: StateOffset) {
        let mut state = self.state.lock();

        let Some(block) = state.blocks.get_mut(&offset.get()) else {
            log::warn!("released unknown state object at offset {:#x}", offset.get());
            return;
        };

        block.refs -= 1;

        if block.refs == 0 {
            let request = block.request;
            state.blocks.remove(&offset.get());
            state.by_request.remove(&request);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        StateAllocationError, StateAllocator, StateHeap, StateKind, StateOffset, StateRequest,
    };

    fn request(kind: StateKind, size: u32, alignment: u32, description: u32) -> StateRequest {
        StateRequest::new(kind, size, alignment, &description)
    }

    #[test]
    fn deduplicates_equal_requests() {
        let heap = StateHeap::new(1024);
        let blend = request(StateKind::Blend, 16, 64, 7);

        let a = heap.allocate(&blend).unwrap();
        let b = heap.allocate(&blend).unwrap();
        assert_eq!(a, b);
        assert_eq!(heap.live_allocations(), 1);
        assert_eq!(heap.references(a), 2);

        heap.release(a);
        assert_eq!(heap.references(a), 1);
        heap.release(b);
        assert_eq!(heap.live_allocations(), 0);
    }

    #[test]
    fn distinct_requests_do_not_overlap() {
        let heap = StateHeap::new(1024);
        let first = request(StateKind::ColorCalc, 24, 64, 1);
        let second = request(StateKind::ColorCalc, 24, 64, 2);
        let third = request(StateKind::Scissor, 8, 32, 1);

        let a = heap.allocate(&first).unwrap();
        let b = heap.allocate(&second).unwrap();
        let c = heap.allocate(&third).unwrap();

        assert_eq!(a.get(), 0);
        assert_eq!(b.get(), 64);
        // First fit, in the gap left by alignment.
        assert_eq!(c.get(), 32);
        assert_eq!(heap.live_allocations(), 3);
    }

    #[test]
    fn same_description_different_kind() {
        let a = request(StateKind::Blend, 16, 64, 3);
        let b = request(StateKind::DepthStencil, 16, 64, 3);
        assert_ne!(a.key, b.key);
        assert_eq!(a, request(StateKind::Blend, 16, 64, 3));
    }

    #[test]
    fn reuses_released_gaps() {
        let heap = StateHeap::new(1024);
        let a = heap
            .allocate(&request(StateKind::BindingTable, 32, 32, 1))
            .unwrap();
        let b = heap
            .allocate(&request(StateKind::BindingTable, 32, 32, 2))
            .unwrap();
        heap.release(a);

        let c = heap
            .allocate(&request(StateKind::BindingTable, 16, 32, 3))
            .unwrap();
        assert_eq!(c, a);
        assert_ne!(c, b);
    }

    #[test]
    fn out_of_space() {
        let heap = StateHeap::new(64);
        heap.allocate(&request(StateKind::Blend, 64, 64, 1))
            .unwrap();

        assert_eq!(
            heap.allocate(&request(StateKind::Blend, 8, 64, 2)),
            Err(StateAllocationError::OutOfSpace {
                kind: StateKind::Blend,
                size: 8,
            }),
        );
    }

    #[test]
    fn import_at_offset() {
        let heap = StateHeap::new(1024);
        let cc = request(StateKind::ColorCalc, 24, 64, 1);
        let other = request(StateKind::ColorCalc, 24, 64, 2);

        heap.import(&cc, StateOffset::new(128)).unwrap();
        assert_eq!(heap.allocate(&cc).unwrap(), StateOffset::new(128));
        assert_eq!(heap.references(StateOffset::new(128)), 2);

        // Already present at another offset.
        assert!(matches!(
            heap.import(&cc, StateOffset::new(256)),
            Err(StateAllocationError::Conflict { .. }),
        ));

        // Overlapping a different object.
        assert!(matches!(
            heap.import(&other, StateOffset::new(128)),
            Err(StateAllocationError::Conflict { .. }),
        ));

        // Misaligned.
        assert!(matches!(
            heap.import(&other, StateOffset::new(130)),
            Err(StateAllocationError::Conflict { .. }),
        ));

        heap.import(&other, StateOffset::new(192)).unwrap();
        assert_eq!(heap.live_allocations(), 2);
    }

    #[test]
    fn kind_raw_values() {
        for raw in 0..12 {
            assert_eq!(StateKind::from_raw(raw).unwrap().as_raw(), raw);
        }

        assert_eq!(StateKind::from_raw(12), None);
    }
}
