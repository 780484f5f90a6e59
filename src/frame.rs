//! Frame types shared by the capture, render, and ring layers.

/// Bytes per BGRA8 pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// A borrowed, read-only view of one BGRA8 camera frame.
///
/// The view is only valid for the duration of the capture callback that
/// delivered it; anything that outlives the callback must copy into a
/// [`FrameBuffer`] first.
#[derive(Clone, Copy)]
pub struct Frame<'a> {
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
    /// Row stride in bytes (>= width * 4; rows may be padded).
    pub stride_bytes: usize,
    /// Capture timestamp, monotonic nanoseconds.
    pub timestamp_ns: u64,
}

impl<'a> Frame<'a> {
    /// Wrap a tightly-packed BGRA8 buffer.
    pub fn packed(data: &'a [u8], width: u32, height: u32, timestamp_ns: u64) -> Self {
        Self {
            data,
            width,
            height,
            stride_bytes: width as usize * BYTES_PER_PIXEL,
            timestamp_ns,
        }
    }

    /// One row of pixels, excluding any stride padding.
    pub fn row(&self, y: u32) -> &'a [u8] {
        let start = y as usize * self.stride_bytes;
        &self.data[start..start + self.width as usize * BYTES_PER_PIXEL]
    }

    /// BGRA bytes of the pixel at (x, y).
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let row = self.row(y);
        let off = x as usize * BYTES_PER_PIXEL;
        [row[off], row[off + 1], row[off + 2], row[off + 3]]
    }

    /// Copy into an owned buffer, dropping stride padding.
    pub fn to_owned_buffer(&self) -> FrameBuffer {
        let mut buf = FrameBuffer::new(self.width, self.height, self.timestamp_ns);
        for y in 0..self.height {
            let dst_start = y as usize * self.width as usize * BYTES_PER_PIXEL;
            buf.data[dst_start..dst_start + self.width as usize * BYTES_PER_PIXEL]
                .copy_from_slice(self.row(y));
        }
        buf
    }
}

/// An owned, tightly-packed BGRA8 frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffer {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp_ns: u64,
}

impl FrameBuffer {
    /// Allocate a zeroed buffer of the given dimensions.
    pub fn new(width: u32, height: u32, timestamp_ns: u64) -> Self {
        Self {
            data: vec![0u8; width as usize * height as usize * BYTES_PER_PIXEL],
            width,
            height,
            timestamp_ns,
        }
    }

    /// Fill every pixel with one BGRA value.
    pub fn fill(&mut self, bgra: [u8; 4]) {
        for px in self.data.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.copy_from_slice(&bgra);
        }
    }

    /// Borrow as a [`Frame`] view.
    pub fn as_frame(&self) -> Frame<'_> {
        Frame::packed(&self.data, self.width, self.height, self.timestamp_ns)
    }

    /// BGRA bytes of the pixel at (x, y).
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let off = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        [
            self.data[off],
            self.data[off + 1],
            self.data[off + 2],
            self.data[off + 3],
        ]
    }

    /// Overwrite the pixel at (x, y).
    pub fn set_pixel(&mut self, x: u32, y: u32, bgra: [u8; 4]) {
        let off = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        self.data[off..off + BYTES_PER_PIXEL].copy_from_slice(&bgra);
    }

    /// Mirror the image around its vertical axis, in place.
    pub fn flip_horizontal(&mut self) {
        let w = self.width as usize;
        for y in 0..self.height as usize {
            let row = &mut self.data[y * w * BYTES_PER_PIXEL..(y + 1) * w * BYTES_PER_PIXEL];
            for x in 0..w / 2 {
                for c in 0..BYTES_PER_PIXEL {
                    row.swap(x * BYTES_PER_PIXEL + c, (w - 1 - x) * BYTES_PER_PIXEL + c);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_frame_has_tight_stride() {
        let data = vec![0u8; 8 * 4 * 4];
        let frame = Frame::packed(&data, 8, 4, 100);
        assert_eq!(frame.stride_bytes, 32);
        assert_eq!(frame.timestamp_ns, 100);
    }

    #[test]
    fn pixel_access_round_trips() {
        let mut buf = FrameBuffer::new(4, 4, 0);
        buf.set_pixel(2, 3, [10, 20, 30, 255]);
        assert_eq!(buf.pixel(2, 3), [10, 20, 30, 255]);
        assert_eq!(buf.as_frame().pixel(2, 3), [10, 20, 30, 255]);
    }

    #[test]
    fn strided_frame_copy_drops_padding() {
        // 2x2 image with 4 bytes of padding per row
        let stride = 2 * BYTES_PER_PIXEL + 4;
        let mut data = vec![0xAAu8; stride * 2];
        data[0..4].copy_from_slice(&[1, 2, 3, 4]);
        data[stride..stride + 4].copy_from_slice(&[5, 6, 7, 8]);

        let frame = Frame {
            data: &data,
            width: 2,
            height: 2,
            stride_bytes: stride,
            timestamp_ns: 7,
        };
        let owned = frame.to_owned_buffer();
        assert_eq!(owned.data.len(), 2 * 2 * BYTES_PER_PIXEL);
        assert_eq!(owned.pixel(0, 0), [1, 2, 3, 4]);
        assert_eq!(owned.pixel(0, 1), [5, 6, 7, 8]);
        assert_eq!(owned.timestamp_ns, 7);
    }

    #[test]
    fn fill_sets_every_pixel() {
        let mut buf = FrameBuffer::new(3, 2, 0);
        buf.fill([9, 8, 7, 255]);
        for y in 0..2 {
            for x in 0..3 {
                assert_eq!(buf.pixel(x, y), [9, 8, 7, 255]);
            }
        }
    }

    #[test]
    fn flip_horizontal_mirrors_rows() {
        let mut buf = FrameBuffer::new(3, 1, 0);
        buf.set_pixel(0, 0, [1, 1, 1, 255]);
        buf.set_pixel(1, 0, [2, 2, 2, 255]);
        buf.set_pixel(2, 0, [3, 3, 3, 255]);
        buf.flip_horizontal();
        assert_eq!(buf.pixel(0, 0), [3, 3, 3, 255]);
        assert_eq!(buf.pixel(1, 0), [2, 2, 2, 255]);
        assert_eq!(buf.pixel(2, 0), [1, 1, 1, 255]);
    }

    #[test]
    fn flip_horizontal_even_width() {
        let mut buf = FrameBuffer::new(2, 2, 0);
        buf.set_pixel(0, 0, [1, 0, 0, 255]);
        buf.set_pixel(1, 0, [2, 0, 0, 255]);
        buf.flip_horizontal();
        assert_eq!(buf.pixel(0, 0), [2, 0, 0, 255]);
        assert_eq!(buf.pixel(1, 0), [1, 0, 0, 255]);
    }
}
