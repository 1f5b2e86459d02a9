//! FrameBuffer - Latest-frame buffer shared between producer and consumers
//!
//! ## Responsibilities
//!
//! - Hold the most recently produced visual frame
//! - Serve readers a fully written frame or a deterministic fallback
//! - Apply demo overlays (text banner, detection highlight) to the
//!   buffered frame under the same lock as ordinary writes
//!
//! The buffer is the only state shared between the producer's ~30 Hz loop
//! and the orchestrator's 10-second cycle. The lock is held only for the
//! in-memory swap or pixel mutation, never across I/O.

use tokio::sync::RwLock;

/// Standard frame width in pixels
pub const FRAME_WIDTH: u32 = 640;
/// Standard frame height in pixels
pub const FRAME_HEIGHT: u32 = 480;

/// An RGB24 pixel buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Raster {
    /// Create a raster filled with a solid color
    pub fn new(width: u32, height: u32, color: [u8; 3]) -> Self {
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for _ in 0..(width * height) {
            pixels.extend_from_slice(&color);
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Build a raster from raw RGB24 bytes
    ///
    /// Returns `None` when the byte count does not match the dimensions.
    pub fn from_rgb(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        if pixels.len() != (width * height * 3) as usize {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    fn set_px(&mut self, x: u32, y: u32, color: [u8; 3]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = ((y * self.width + x) * 3) as usize;
        self.pixels[idx..idx + 3].copy_from_slice(&color);
    }

    /// Fill an axis-aligned rectangle, clipped to the raster bounds
    pub fn fill_rect(&mut self, x: u32, y: u32, w: u32, h: u32, color: [u8; 3]) {
        for yy in y..y.saturating_add(h) {
            for xx in x..x.saturating_add(w) {
                self.set_px(xx, yy, color);
            }
        }
    }

    /// Draw a rectangle outline (2 px thick)
    pub fn draw_rect(&mut self, x: u32, y: u32, w: u32, h: u32, color: [u8; 3]) {
        let t = 2u32;
        self.fill_rect(x, y, w, t, color);
        self.fill_rect(x, y.saturating_add(h).saturating_sub(t), w, t, color);
        self.fill_rect(x, y, t, h, color);
        self.fill_rect(x.saturating_add(w).saturating_sub(t), y, t, h, color);
    }

    /// Fill an ellipse centered at (cx, cy) with radii (rx, ry)
    pub fn fill_ellipse(&mut self, cx: i64, cy: i64, rx: i64, ry: i64, color: [u8; 3]) {
        if rx <= 0 || ry <= 0 {
            return;
        }
        for dy in -ry..=ry {
            for dx in -rx..=rx {
                let norm = (dx * dx) as f64 / (rx * rx) as f64
                    + (dy * dy) as f64 / (ry * ry) as f64;
                if norm <= 1.0 {
                    let x = cx + dx;
                    let y = cy + dy;
                    if x >= 0 && y >= 0 {
                        self.set_px(x as u32, y as u32, color);
                    }
                }
            }
        }
    }

    /// Render a text overlay as a banner marker at the given position
    ///
    /// Glyph rasterization is out of scope without a font dependency, so
    /// the text is rendered as a dimmed banner strip with one block per
    /// character (height keyed to the character) - legible as a marker in
    /// the live view and deterministic for tests.
    pub fn overlay_banner(&mut self, text: &str, pos: (u32, u32), color: [u8; 3]) {
        const CHAR_W: u32 = 9;
        const BANNER_H: u32 = 16;
        let (x, y) = pos;
        let chars: Vec<char> = text.chars().collect();
        let w = chars.len() as u32 * CHAR_W + 8;
        let dim = [color[0] / 3, color[1] / 3, color[2] / 3];
        self.fill_rect(x, y, w, BANNER_H, dim);
        for (i, c) in chars.iter().enumerate() {
            let h = 4 + (*c as u32 % 8);
            self.fill_rect(x + 4 + i as u32 * CHAR_W, y + 3, CHAR_W - 3, h, color);
        }
    }

    /// Encode as a 24-bit uncompressed BMP
    pub fn encode_bmp(&self) -> Vec<u8> {
        let row_len = ((self.width as usize * 3) + 3) & !3;
        let image_size = row_len * self.height as usize;
        let file_size = 54 + image_size;
        let mut out = Vec::with_capacity(file_size);

        // File header
        out.extend_from_slice(b"BM");
        out.extend_from_slice(&(file_size as u32).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&54u32.to_le_bytes());

        // BITMAPINFOHEADER
        out.extend_from_slice(&40u32.to_le_bytes());
        out.extend_from_slice(&(self.width as i32).to_le_bytes());
        out.extend_from_slice(&(self.height as i32).to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&24u16.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&(image_size as u32).to_le_bytes());
        out.extend_from_slice(&2835i32.to_le_bytes());
        out.extend_from_slice(&2835i32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());

        // Pixel rows, bottom-up, BGR, padded to 4 bytes
        let pad = row_len - self.width as usize * 3;
        for y in (0..self.height).rev() {
            for x in 0..self.width {
                let idx = ((y * self.width + x) * 3) as usize;
                out.push(self.pixels[idx + 2]);
                out.push(self.pixels[idx + 1]);
                out.push(self.pixels[idx]);
            }
            out.extend(std::iter::repeat(0u8).take(pad));
        }

        out
    }
}

/// Shared latest-frame buffer
///
/// Writers replace the whole frame atomically; readers get a copy of the
/// last fully written frame, or the fallback if nothing was ever written.
pub struct FrameBuffer {
    current: RwLock<Option<Raster>>,
    fallback: Raster,
}

impl FrameBuffer {
    /// Create a buffer with the given fallback frame
    pub fn new(fallback: Raster) -> Self {
        Self {
            current: RwLock::new(None),
            fallback,
        }
    }

    /// Atomically replace the current frame
    pub async fn write(&self, frame: Raster) {
        let mut current = self.current.write().await;
        *current = Some(frame);
    }

    /// Read the current frame, or the fallback if none was ever written
    pub async fn read(&self) -> Raster {
        let current = self.current.read().await;
        match current.as_ref() {
            Some(frame) => frame.clone(),
            None => self.fallback.clone(),
        }
    }

    /// Whether a frame has been written since startup
    pub async fn has_frame(&self) -> bool {
        self.current.read().await.is_some()
    }

    /// Overlay a text banner on the currently buffered frame
    ///
    /// No-op when nothing is buffered yet (the fallback stays pristine).
    pub async fn overlay_text(&self, text: &str, pos: (u32, u32), color: [u8; 3]) {
        let mut current = self.current.write().await;
        if let Some(frame) = current.as_mut() {
            frame.overlay_banner(text, pos, color);
        }
    }

    /// Draw a labeled bounding box on the currently buffered frame
    pub async fn highlight_region(
        &self,
        bbox: (u32, u32, u32, u32),
        label: &str,
        color: [u8; 3],
    ) {
        let mut current = self.current.write().await;
        if let Some(frame) = current.as_mut() {
            let (x, y, w, h) = bbox;
            frame.draw_rect(x, y, w, h, color);
            frame.overlay_banner(label, (x, y.saturating_sub(20)), color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_returns_fallback_before_first_write() {
        let fallback = Raster::new(8, 8, [1, 2, 3]);
        let buffer = FrameBuffer::new(fallback.clone());
        assert!(!buffer.has_frame().await);
        assert_eq!(buffer.read().await, fallback);
    }

    #[tokio::test]
    async fn write_read_round_trip_is_byte_identical() {
        let buffer = FrameBuffer::new(Raster::new(8, 8, [0, 0, 0]));
        let mut frame = Raster::new(8, 8, [10, 20, 30]);
        frame.fill_rect(2, 2, 3, 3, [200, 100, 50]);
        buffer.write(frame.clone()).await;
        assert_eq!(buffer.read().await, frame);
        // A second read before the next write sees the same bytes
        assert_eq!(buffer.read().await, frame);
    }

    #[tokio::test]
    async fn overlay_mutates_buffered_frame_only() {
        let fallback = Raster::new(64, 64, [0, 0, 0]);
        let buffer = FrameBuffer::new(fallback.clone());

        // Without a buffered frame the overlay is a no-op
        buffer.overlay_text("HI", (4, 4), [255, 0, 0]).await;
        assert_eq!(buffer.read().await, fallback);

        let frame = Raster::new(64, 64, [0, 0, 0]);
        buffer.write(frame.clone()).await;
        buffer.overlay_text("HI", (4, 4), [255, 0, 0]).await;
        assert_ne!(buffer.read().await, frame);
    }

    #[tokio::test]
    async fn highlight_region_draws_box_edge() {
        let buffer = FrameBuffer::new(Raster::new(64, 64, [0, 0, 0]));
        buffer.write(Raster::new(64, 64, [0, 0, 0])).await;
        buffer
            .highlight_region((10, 30, 20, 20), "PEST", [255, 0, 0])
            .await;
        let frame = buffer.read().await;
        let idx = ((30 * frame.width() + 10) * 3) as usize;
        assert_eq!(&frame.pixels()[idx..idx + 3], &[255, 0, 0]);
    }

    #[test]
    fn bmp_encoding_has_valid_header_and_size() {
        let raster = Raster::new(10, 7, [0, 128, 0]);
        let bmp = raster.encode_bmp();
        assert_eq!(&bmp[0..2], b"BM");
        let row_len = (10 * 3 + 3) & !3;
        assert_eq!(bmp.len(), 54 + row_len * 7);
        let declared = u32::from_le_bytes([bmp[2], bmp[3], bmp[4], bmp[5]]) as usize;
        assert_eq!(declared, bmp.len());
    }

    #[test]
    fn from_rgb_rejects_wrong_length() {
        assert!(Raster::from_rgb(4, 4, vec![0u8; 4 * 4 * 3]).is_some());
        assert!(Raster::from_rgb(4, 4, vec![0u8; 17]).is_none());
    }
}
