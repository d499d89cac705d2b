use ndarray::ArrayView3;

/// A single decoded frame: contiguous RGB bytes in row-major order.
///
/// Format conversion happens at I/O boundaries only; everything past the
/// readers treats pixel data as opaque RGB.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Position of this frame in the decoded source sequence.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(
            (
                self.height as usize,
                self.width as usize,
                self.channels as usize,
            ),
            &self.data,
        )
        .expect("Frame data length must match dimensions")
    }

    /// Copies the rectangle `(x, y, w, h)` into a new frame.
    ///
    /// The caller must have validated that the rectangle lies within the
    /// frame; passing an out-of-bounds rectangle returns `None`.
    pub fn crop(&self, x: u32, y: u32, w: u32, h: u32) -> Option<Frame> {
        if w == 0 || h == 0 || x + w > self.width || y + h > self.height {
            return None;
        }
        let ch = self.channels as usize;
        let src_stride = self.width as usize * ch;
        let row_len = w as usize * ch;
        let mut data = Vec::with_capacity(row_len * h as usize);
        for row in y..y + h {
            let start = row as usize * src_stride + x as usize * ch;
            data.extend_from_slice(&self.data[start..start + row_len]);
        }
        Some(Frame::new(data, w, h, self.channels, self.index))
    }
}
