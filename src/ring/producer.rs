use std::sync::Arc;

use tracing::info;

use crate::error::{PipelineError, Result};
use crate::frame::FrameBuffer;
use crate::ring::layout::{
    RawRing, RingLayout, OFF_BUFFER_COUNT, OFF_HEIGHT, OFF_PIXEL_FORMAT, OFF_VERSION, OFF_WIDTH,
    PIXEL_FORMAT_BGRA, RING_MAGIC, RING_VERSION, SLOT_OFF_FRAME_NUMBER, SLOT_OFF_HEIGHT,
    SLOT_OFF_SURFACE_HANDLE, SLOT_OFF_TIMESTAMP_NS, SLOT_OFF_WIDTH,
};
use crate::ring::region::Region;

/// Producer half of the shared frame ring.
///
/// Single-producer: exactly one `RingProducer` exists per session, owned by
/// the processing executor. The producer initializes the header (magic
/// published last), copies finished frames into free slots, and never
/// blocks — a ring with no free slot drops the frame.
pub struct RingProducer {
    _region: Arc<dyn Region>,
    ring: RawRing,
}

impl RingProducer {
    /// Initialize a ring over a fresh region.
    pub fn create(region: Arc<dyn Region>, width: u32, height: u32) -> Result<Self> {
        let layout = RingLayout::new(width, height);
        if region.len() < layout.total_size() {
            return Err(PipelineError::RingLayout(format!(
                "region of {} bytes cannot hold a {}x{} ring ({} bytes)",
                region.len(),
                width,
                height,
                layout.total_size()
            )));
        }

        let ring = unsafe { RawRing::new(region.base(), layout) };
        ring.zero_metadata();
        ring.store_header_u32(OFF_VERSION, RING_VERSION);
        ring.store_header_u32(OFF_BUFFER_COUNT, layout.buffer_count);
        ring.store_header_u32(OFF_WIDTH, width);
        ring.store_header_u32(OFF_HEIGHT, height);
        ring.store_header_u32(OFF_PIXEL_FORMAT, PIXEL_FORMAT_BGRA);
        // Publishing the magic last makes a half-written header unobservable
        ring.store_magic(RING_MAGIC);

        info!(width, height, "frame ring created");
        Ok(Self {
            _region: region,
            ring,
        })
    }

    pub fn layout(&self) -> RingLayout {
        self.ring.layout
    }

    pub fn write_index(&self) -> u32 {
        self.ring.write_index()
    }

    pub fn frame_count(&self) -> u64 {
        self.ring.frame_count()
    }

    /// The slot to fill next, or `None` when the consumer has not yet
    /// released it (ring full — drop this frame).
    pub fn acquire_write(&mut self) -> Option<usize> {
        let slot = self.ring.write_index() as usize;
        if self.ring.slot_ready(slot) != 0 {
            return None;
        }
        Some(slot)
    }

    /// Pixel plane of an acquired slot.
    pub fn slot_pixels_mut(&mut self, slot: usize) -> &mut [u8] {
        // Sound: the slot came from acquire_write, so ready == 0 and the
        // consumer will not touch the plane until submit_write.
        unsafe { self.ring.plane_mut(slot) }
    }

    /// Publish an acquired slot: metadata, then `ready` and the cursor
    /// advance with release ordering, then the monotone counters.
    pub fn submit_write(&mut self, slot: usize, timestamp_ns: u64) {
        let frame_number = self.ring.frame_count() + 1;
        self.ring
            .store_slot_u64(slot, SLOT_OFF_TIMESTAMP_NS, timestamp_ns);
        self.ring
            .store_slot_u64(slot, SLOT_OFF_FRAME_NUMBER, frame_number);
        self.ring
            .store_slot_u32(slot, SLOT_OFF_WIDTH, self.ring.layout.width);
        self.ring
            .store_slot_u32(slot, SLOT_OFF_HEIGHT, self.ring.layout.height);
        // memcpy ring: no process-shared GPU surface behind the slot
        self.ring.store_slot_u64(slot, SLOT_OFF_SURFACE_HANDLE, 0);

        self.ring.store_slot_ready(slot, 1);
        self.ring
            .store_write_index((slot as u32 + 1) % self.ring.layout.buffer_count);
        self.ring.bump_frame_count();
        self.ring.store_last_update_ns(timestamp_ns);
    }

    /// Copy one finished frame into the ring. `Ok(false)` means the ring
    /// was full and the frame was dropped.
    pub fn publish(&mut self, frame: &FrameBuffer) -> Result<bool> {
        if frame.width != self.ring.layout.width || frame.height != self.ring.layout.height {
            return Err(PipelineError::RingLayout(format!(
                "frame {}x{} does not fit ring {}x{}",
                frame.width, frame.height, self.ring.layout.width, self.ring.layout.height
            )));
        }
        let Some(slot) = self.acquire_write() else {
            return Ok(false);
        };
        self.slot_pixels_mut(slot).copy_from_slice(&frame.data);
        self.submit_write(slot, frame.timestamp_ns);
        Ok(true)
    }
}

impl Drop for RingProducer {
    fn drop(&mut self) {
        // Consumers observe magic == 0 as "detached"
        self.ring.store_magic(0);
    }
}
