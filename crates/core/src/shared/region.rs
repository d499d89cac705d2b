use crate::shared::constants::MIN_REGION_SIZE;

/// Raw detector output: one candidate box plus its confidence.
///
/// Coordinates are in source-frame pixels and may be degenerate or extend
/// past the frame; validation happens in the region extractor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub confidence: f32,
}

impl Detection {
    /// A detection is usable only when its box lies entirely within the
    /// `frame_w` x `frame_h` source and both sides exceed the minimum size.
    /// Boxes are discarded, never clamped.
    ///
    /// Bounds are compared in i64: finite-but-huge coordinates from a
    /// malformed detector row must be rejected, not wrap around.
    pub fn fits_within(&self, frame_w: u32, frame_h: u32) -> bool {
        self.width > MIN_REGION_SIZE
            && self.height > MIN_REGION_SIZE
            && self.x >= 0
            && self.y >= 0
            && self.x as i64 + self.width as i64 <= frame_w as i64
            && self.y as i64 + self.height as i64 <= frame_h as i64
    }
}

/// A validated face box with its JPEG-encoded crop.
///
/// For the residual path the pixel content is replaced by the noise
/// residual while the geometry stays untouched.
#[derive(Clone, Debug)]
pub struct FaceRegion {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub confidence: f32,
    pub data: Vec<u8>,
}

impl FaceRegion {
    pub fn with_data(&self, data: Vec<u8>) -> FaceRegion {
        FaceRegion {
            data,
            ..self.clone()
        }
    }
}

/// Fixed-size encoded crop ready for storage or scoring.
pub type NormalizedCrop = Vec<u8>;
