//! Single-channel camera frames.

use chrono::{DateTime, Utc};

/// Acquisition metadata attached to every frame by the camera.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameMetadata {
    /// Hardware frame counter within the current sequence (0-based)
    pub frame_number: u64,
    /// Exposure the frame was integrated with, in seconds
    pub exposure_s: f64,
    /// Time the frame left the sensor
    pub timestamp: DateTime<Utc>,
}

/// Represents a single image frame.
///
/// # Storage
/// Data is stored as a raw byte vector (`Vec<u8>`).
/// - 8-bit images: 1 byte per pixel.
/// - 12/16-bit images: 2 bytes per pixel, Little Endian.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// Bits per pixel (e.g., 8, 12, 16)
    pub bit_depth: u32,

    /// Raw pixel data
    pub data: Vec<u8>,

    /// Acquisition metadata, if the producer supplied any
    pub metadata: Option<FrameMetadata>,
}

impl Frame {
    /// Create a new frame from 16-bit pixel data.
    ///
    /// Copies the data into a byte vector.
    pub fn from_u16(width: u32, height: u32, pixels: &[u16]) -> Self {
        let mut data = Vec::with_capacity(pixels.len() * 2);
        for pixel in pixels {
            data.extend_from_slice(&pixel.to_le_bytes());
        }

        Self {
            width,
            height,
            bit_depth: 16,
            data,
            metadata: None,
        }
    }

    /// Create a new frame from 8-bit pixel data.
    pub fn from_u8(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            bit_depth: 8,
            data,
            metadata: None,
        }
    }

    /// Attach acquisition metadata.
    pub fn with_metadata(mut self, metadata: FrameMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Number of pixels implied by the frame dimensions.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Bytes used to store one pixel at this bit depth.
    pub fn bytes_per_pixel(&self) -> usize {
        if self.bit_depth <= 8 {
            1
        } else {
            2
        }
    }

    /// True when the buffer length matches width x height at the frame's bit depth.
    pub fn is_well_formed(&self) -> bool {
        matches!(self.bit_depth, 8 | 12 | 16)
            && self.data.len() == self.pixel_count() * self.bytes_per_pixel()
    }

    /// Same width, height and bit depth.
    pub fn same_shape(&self, other: &Frame) -> bool {
        self.width == other.width && self.height == other.height && self.bit_depth == other.bit_depth
    }

    /// Get pixel value at (x, y) as u32 (handling bit depth conversion).
    pub fn get(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }

        let idx = (y * self.width + x) as usize;

        match self.bit_depth {
            8 => self.data.get(idx).map(|&v| v as u32),
            12 | 16 => {
                let start = idx * 2;
                let bytes = self.data.get(start..start + 2)?;
                Some(u16::from_le_bytes([bytes[0], bytes[1]]) as u32)
            }
            _ => None,
        }
    }

    /// Iterate over pixel values in row-major order.
    pub fn pixels(&self) -> Box<dyn Iterator<Item = u32> + '_> {
        if self.bit_depth <= 8 {
            Box::new(self.data.iter().map(|&v| v as u32))
        } else {
            Box::new(
                self.data
                    .chunks_exact(2)
                    .map(|b| u16::from_le_bytes([b[0], b[1]]) as u32),
            )
        }
    }

    /// Calculate mean pixel value.
    pub fn mean(&self) -> f64 {
        let n = self.pixel_count();
        if n == 0 {
            return 0.0;
        }
        let sum: u64 = self.pixels().map(u64::from).sum();
        sum as f64 / n as f64
    }
}
