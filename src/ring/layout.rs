//! Byte layout of the shared ring.
//!
//! Header (little-endian, explicit offsets):
//!
//! ```text
//! offset size field
//! 0      4    magic = 0x41434D53
//! 4      4    version (= 1)
//! 8      4    buffer_count (= 3)
//! 12     4    width
//! 16     4    height
//! 20     4    pixel_format = 0x42475241 ('BGRA')
//! 24     4    read_index   (consumer cursor)
//! 28     4    write_index  (producer cursor)
//! 32     8    frame_count  (monotone)
//! 40     8    last_update_ns
//! 48     64   reserved / zero
//! ```
//!
//! Followed by `buffer_count` slot entries (`ready`, `timestamp_ns`,
//! `frame_number`, `width`, `height`, `surface_handle`, reserved), then
//! `buffer_count` pixel planes of `width*height*4` bytes, each aligned
//! to 64 bytes.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

pub const RING_MAGIC: u32 = 0x41434D53;
pub const RING_VERSION: u32 = 1;
pub const RING_BUFFER_COUNT: u32 = 3;
pub const PIXEL_FORMAT_BGRA: u32 = 0x4247_5241;

pub const OFF_MAGIC: usize = 0;
pub const OFF_VERSION: usize = 4;
pub const OFF_BUFFER_COUNT: usize = 8;
pub const OFF_WIDTH: usize = 12;
pub const OFF_HEIGHT: usize = 16;
pub const OFF_PIXEL_FORMAT: usize = 20;
pub const OFF_READ_INDEX: usize = 24;
pub const OFF_WRITE_INDEX: usize = 28;
pub const OFF_FRAME_COUNT: usize = 32;
pub const OFF_LAST_UPDATE_NS: usize = 40;
pub const HEADER_SIZE: usize = 112;

pub const SLOT_OFF_READY: usize = 0;
pub const SLOT_OFF_TIMESTAMP_NS: usize = 8;
pub const SLOT_OFF_FRAME_NUMBER: usize = 16;
pub const SLOT_OFF_WIDTH: usize = 24;
pub const SLOT_OFF_HEIGHT: usize = 28;
pub const SLOT_OFF_SURFACE_HANDLE: usize = 32;
pub const SLOT_SIZE: usize = 72;

/// Pixel planes start and stride on 64-byte boundaries.
pub const PLANE_ALIGN: usize = 64;

pub const fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) / align * align
}

/// Computed offsets for a ring of a given geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingLayout {
    pub width: u32,
    pub height: u32,
    pub buffer_count: u32,
}

impl RingLayout {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            buffer_count: RING_BUFFER_COUNT,
        }
    }

    pub fn plane_size(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    pub fn plane_stride(&self) -> usize {
        align_up(self.plane_size(), PLANE_ALIGN)
    }

    pub fn slot_offset(&self, index: usize) -> usize {
        HEADER_SIZE + index * SLOT_SIZE
    }

    pub fn planes_offset(&self) -> usize {
        align_up(
            HEADER_SIZE + self.buffer_count as usize * SLOT_SIZE,
            PLANE_ALIGN,
        )
    }

    pub fn plane_offset(&self, index: usize) -> usize {
        self.planes_offset() + index * self.plane_stride()
    }

    pub fn total_size(&self) -> usize {
        self.planes_offset() + self.buffer_count as usize * self.plane_stride()
    }
}

/// Atomic field access over a mapped ring region.
///
/// Safety rests on the layout: every u32 field sits on a 4-byte boundary
/// and every u64 field on an 8-byte boundary of an 8-aligned base, and
/// producer and consumer mutate disjoint fields (§4.1 ownership split).
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawRing {
    base: *mut u8,
    pub layout: RingLayout,
}

unsafe impl Send for RawRing {}

impl RawRing {
    /// # Safety
    /// `base` must point to at least `layout.total_size()` bytes, 8-byte
    /// aligned, valid for the lifetime of the ring handle.
    pub unsafe fn new(base: *mut u8, layout: RingLayout) -> Self {
        Self { base, layout }
    }

    fn u32_at(&self, offset: usize) -> &AtomicU32 {
        debug_assert_eq!(offset % 4, 0);
        unsafe { &*(self.base.add(offset) as *const AtomicU32) }
    }

    fn u64_at(&self, offset: usize) -> &AtomicU64 {
        debug_assert_eq!(offset % 8, 0);
        unsafe { &*(self.base.add(offset) as *const AtomicU64) }
    }

    pub fn magic(&self) -> u32 {
        self.u32_at(OFF_MAGIC).load(Ordering::Acquire)
    }

    pub fn store_magic(&self, value: u32) {
        self.u32_at(OFF_MAGIC).store(value, Ordering::Release);
    }

    pub fn version(&self) -> u32 {
        self.u32_at(OFF_VERSION).load(Ordering::Acquire)
    }

    pub fn header_u32(&self, offset: usize) -> u32 {
        self.u32_at(offset).load(Ordering::Relaxed)
    }

    pub fn store_header_u32(&self, offset: usize, value: u32) {
        self.u32_at(offset).store(value, Ordering::Relaxed);
    }

    pub fn read_index(&self) -> u32 {
        self.u32_at(OFF_READ_INDEX).load(Ordering::Acquire)
    }

    pub fn store_read_index(&self, value: u32) {
        self.u32_at(OFF_READ_INDEX).store(value, Ordering::Release);
    }

    pub fn write_index(&self) -> u32 {
        self.u32_at(OFF_WRITE_INDEX).load(Ordering::Acquire)
    }

    pub fn store_write_index(&self, value: u32) {
        self.u32_at(OFF_WRITE_INDEX).store(value, Ordering::Release);
    }

    pub fn frame_count(&self) -> u64 {
        self.u64_at(OFF_FRAME_COUNT).load(Ordering::Acquire)
    }

    pub fn bump_frame_count(&self) -> u64 {
        self.u64_at(OFF_FRAME_COUNT)
            .fetch_add(1, Ordering::AcqRel)
            + 1
    }

    pub fn last_update_ns(&self) -> u64 {
        self.u64_at(OFF_LAST_UPDATE_NS).load(Ordering::Acquire)
    }

    pub fn store_last_update_ns(&self, value: u64) {
        self.u64_at(OFF_LAST_UPDATE_NS)
            .store(value, Ordering::Release);
    }

    pub fn slot_ready(&self, slot: usize) -> u32 {
        self.u32_at(self.layout.slot_offset(slot) + SLOT_OFF_READY)
            .load(Ordering::Acquire)
    }

    pub fn store_slot_ready(&self, slot: usize, ready: u32) {
        self.u32_at(self.layout.slot_offset(slot) + SLOT_OFF_READY)
            .store(ready, Ordering::Release);
    }

    pub fn slot_u64(&self, slot: usize, field: usize) -> u64 {
        self.u64_at(self.layout.slot_offset(slot) + field)
            .load(Ordering::Relaxed)
    }

    pub fn store_slot_u64(&self, slot: usize, field: usize, value: u64) {
        self.u64_at(self.layout.slot_offset(slot) + field)
            .store(value, Ordering::Relaxed);
    }

    pub fn slot_u32(&self, slot: usize, field: usize) -> u32 {
        self.u32_at(self.layout.slot_offset(slot) + field)
            .load(Ordering::Relaxed)
    }

    pub fn store_slot_u32(&self, slot: usize, field: usize, value: u32) {
        self.u32_at(self.layout.slot_offset(slot) + field)
            .store(value, Ordering::Relaxed);
    }

    pub fn plane(&self, slot: usize) -> &[u8] {
        unsafe {
            std::slice::from_raw_parts(
                self.base.add(self.layout.plane_offset(slot)),
                self.layout.plane_size(),
            )
        }
    }

    /// # Safety
    /// Only the producer may call this, and only for the slot returned by
    /// `acquire_write` (the consumer does not read it until `ready`).
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn plane_mut(&self, slot: usize) -> &mut [u8] {
        std::slice::from_raw_parts_mut(
            self.base.add(self.layout.plane_offset(slot)),
            self.layout.plane_size(),
        )
    }

    /// Zero the header and slot table.
    pub fn zero_metadata(&self) {
        for off in (0..self.layout.planes_offset()).step_by(4) {
            self.u32_at(off).store(0, Ordering::Relaxed);
        }
    }
}
