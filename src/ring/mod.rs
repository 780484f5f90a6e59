// Shared-memory frame ring — triple-buffered SPSC handoff to the
// camera-extension process.

pub mod consumer;
pub mod layout;
pub mod producer;
pub mod region;

pub use consumer::{FrameView, RingConsumer};
pub use layout::{RingLayout, PIXEL_FORMAT_BGRA, RING_BUFFER_COUNT, RING_MAGIC, RING_VERSION};
pub use producer::RingProducer;
pub use region::{HeapRegion, Region};

#[cfg(unix)]
pub use region::SharedMemoryRegion;
