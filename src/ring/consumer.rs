use std::sync::Arc;

use crate::error::{PipelineError, Result};
use crate::ring::layout::{
    RawRing, RingLayout, OFF_BUFFER_COUNT, OFF_HEIGHT, OFF_WIDTH, RING_MAGIC, RING_VERSION,
    SLOT_OFF_FRAME_NUMBER, SLOT_OFF_TIMESTAMP_NS,
};
use crate::ring::region::Region;

/// A published frame borrowed from the ring.
#[derive(Debug)]
pub struct FrameView<'a> {
    pub slot: usize,
    pub width: u32,
    pub height: u32,
    pub timestamp_ns: u64,
    pub frame_number: u64,
    pub pixels: &'a [u8],
}

/// Consumer half of the shared frame ring, typically living in the
/// camera-extension process.
///
/// Attach validates magic and version; afterwards the consumer only
/// mutates `read_index` and slot `ready` flags. A producer teardown is
/// observed as `magic == 0` and reported as detached.
pub struct RingConsumer {
    _region: Arc<dyn Region>,
    ring: RawRing,
}

impl RingConsumer {
    pub fn attach(region: Arc<dyn Region>) -> Result<Self> {
        if region.len() < crate::ring::layout::HEADER_SIZE {
            return Err(PipelineError::RingLayout(format!(
                "region of {} bytes is smaller than the ring header",
                region.len()
            )));
        }
        let probe = unsafe { RawRing::new(region.base(), RingLayout::new(0, 0)) };
        if probe.magic() != RING_MAGIC {
            return Err(PipelineError::RingDetached(format!(
                "bad magic 0x{:08X}",
                probe.magic()
            )));
        }
        if probe.version() != RING_VERSION {
            return Err(PipelineError::RingLayout(format!(
                "unsupported ring version {}",
                probe.version()
            )));
        }

        let width = probe.header_u32(OFF_WIDTH);
        let height = probe.header_u32(OFF_HEIGHT);
        let buffer_count = probe.header_u32(OFF_BUFFER_COUNT);
        let layout = RingLayout::new(width, height);
        if buffer_count != layout.buffer_count {
            return Err(PipelineError::RingLayout(format!(
                "unexpected buffer_count {buffer_count}"
            )));
        }
        if region.len() < layout.total_size() {
            return Err(PipelineError::RingLayout(
                "region truncated below its declared geometry".to_string(),
            ));
        }

        let ring = unsafe { RawRing::new(region.base(), layout) };
        Ok(Self {
            _region: region,
            ring,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.ring.layout.width, self.ring.layout.height)
    }

    /// Whether the producer has torn the ring down.
    pub fn is_detached(&self) -> bool {
        self.ring.magic() != RING_MAGIC
    }

    pub fn frame_count(&self) -> u64 {
        self.ring.frame_count()
    }

    fn view(&self, slot: usize) -> FrameView<'_> {
        FrameView {
            slot,
            width: self.ring.layout.width,
            height: self.ring.layout.height,
            timestamp_ns: self.ring.slot_u64(slot, SLOT_OFF_TIMESTAMP_NS),
            frame_number: self.ring.slot_u64(slot, SLOT_OFF_FRAME_NUMBER),
            pixels: self.ring.plane(slot),
        }
    }

    /// The oldest unconsumed frame, if any. Call [`release_read`] when
    /// done to free the slot for the producer.
    ///
    /// [`release_read`]: Self::release_read
    pub fn acquire_read(&mut self) -> Option<FrameView<'_>> {
        if self.is_detached() {
            return None;
        }
        let slot = self.ring.read_index() as usize;
        if self.ring.slot_ready(slot) != 1 {
            return None;
        }
        Some(self.view(slot))
    }

    /// Free the slot at the read cursor and advance it.
    pub fn release_read(&mut self) {
        let slot = self.ring.read_index();
        self.ring.store_slot_ready(slot as usize, 0);
        self.ring
            .store_read_index((slot + 1) % self.ring.layout.buffer_count);
    }

    /// The most recently published frame, without touching either cursor.
    /// For consumers that only want the freshest image.
    pub fn peek_latest(&self) -> Option<FrameView<'_>> {
        if self.is_detached() {
            return None;
        }
        let count = self.ring.layout.buffer_count;
        let slot = ((self.ring.write_index() + count - 1) % count) as usize;
        if self.ring.slot_ready(slot) != 1 {
            return None;
        }
        Some(self.view(slot))
    }
}
