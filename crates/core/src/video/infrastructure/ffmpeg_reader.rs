use std::path::Path;

use crate::shared::error::PipelineError;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;

fn open_error(e: impl std::fmt::Display) -> PipelineError {
    PipelineError::MediaOpen(e.to_string())
}

/// File-based decoder backed by ffmpeg-next (libavformat + libavcodec).
///
/// Every frame is scaled to tightly packed RGB24 before it leaves this
/// module, so downstream stages never see planar or padded pixel data.
pub struct FfmpegReader {
    input: Option<ffmpeg_next::format::context::Input>,
    stream_index: usize,
}

// Safety: the reader is owned by one worker at a time and the ffmpeg
// contexts behind these raw pointers are never aliased across threads.
unsafe impl Send for FfmpegReader {}

impl FfmpegReader {
    pub fn new() -> Self {
        Self {
            input: None,
            stream_index: 0,
        }
    }
}

impl Default for FfmpegReader {
    fn default() -> Self {
        Self::new()
    }
}

fn stream_fps(stream: &ffmpeg_next::format::stream::Stream) -> f64 {
    let rate = stream.rate();
    if rate.denominator() == 0 {
        return 0.0;
    }
    rate.numerator() as f64 / rate.denominator() as f64
}

fn video_decoder(
    stream: &ffmpeg_next::format::stream::Stream,
) -> Result<ffmpeg_next::decoder::Video, PipelineError> {
    ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
        .map_err(open_error)?
        .decoder()
        .video()
        .map_err(open_error)
}

fn rgb_scaler(
    decoder: &ffmpeg_next::decoder::Video,
) -> Result<ffmpeg_next::software::scaling::Context, PipelineError> {
    ffmpeg_next::software::scaling::Context::get(
        decoder.format(),
        decoder.width(),
        decoder.height(),
        ffmpeg_next::format::Pixel::RGB24,
        decoder.width(),
        decoder.height(),
        ffmpeg_next::software::scaling::Flags::BILINEAR,
    )
    .map_err(open_error)
}

impl VideoReader for FfmpegReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, PipelineError> {
        ffmpeg_next::init().map_err(open_error)?;

        let input = ffmpeg_next::format::input(path).map_err(open_error)?;
        let stream = input
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| PipelineError::MediaOpen("no video stream found".into()))?;
        let decoder = video_decoder(&stream)?;

        let metadata = VideoMetadata {
            width: decoder.width(),
            height: decoder.height(),
            fps: stream_fps(&stream),
            total_frames: stream.frames() as usize,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            source_path: Some(path.to_path_buf()),
        };

        self.stream_index = stream.index();
        self.input = Some(input);
        Ok(metadata)
    }

    fn frames(&mut self) -> Box<dyn Iterator<Item = Result<Frame, PipelineError>> + '_> {
        let Some(input) = self.input.as_mut() else {
            return Box::new(std::iter::once(Err(PipelineError::MediaOpen(
                "reader not opened".into(),
            ))));
        };

        let setup = input
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| PipelineError::MediaOpen("no video stream found".into()))
            .and_then(|stream| {
                let decoder = video_decoder(&stream)?;
                let scaler = rgb_scaler(&decoder)?;
                Ok((decoder, scaler))
            });
        let (decoder, scaler) = match setup {
            Ok(parts) => parts,
            Err(e) => return Box::new(std::iter::once(Err(e))),
        };

        Box::new(DecodedFrames {
            width: decoder.width(),
            height: decoder.height(),
            stream_index: self.stream_index,
            input,
            decoder,
            scaler,
            next_index: 0,
            state: DecodeState::Draining,
        })
    }

    fn close(&mut self) {
        self.input = None;
    }
}

#[derive(PartialEq)]
enum DecodeState {
    Draining,
    Flushing,
    Finished,
}

/// Pull-based decode loop. Packets are demuxed on demand, so a caller that
/// stops early never pays for the rest of the file.
struct DecodedFrames<'a> {
    input: &'a mut ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    stream_index: usize,
    next_index: usize,
    state: DecodeState,
}

impl DecodedFrames<'_> {
    /// One frame out of the decoder, if it has any buffered.
    fn drain_one(&mut self) -> Option<Result<Frame, PipelineError>> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return None;
        }

        let mut rgb = ffmpeg_next::util::frame::video::Video::empty();
        if let Err(e) = self.scaler.run(&decoded, &mut rgb) {
            return Some(Err(PipelineError::MediaOpen(e.to_string())));
        }

        let pixels = packed_rgb(&rgb, self.width, self.height);
        let index = self.next_index;
        self.next_index += 1;
        Some(Ok(Frame::new(pixels, self.width, self.height, 3, index)))
    }
}

impl Iterator for DecodedFrames<'_> {
    type Item = Result<Frame, PipelineError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == DecodeState::Finished {
            return None;
        }

        if let Some(result) = self.drain_one() {
            return Some(result);
        }
        if self.state == DecodeState::Flushing {
            self.state = DecodeState::Finished;
            return None;
        }

        loop {
            let Some((stream, packet)) = self.input.packets().next() else {
                let _ = self.decoder.send_eof();
                self.state = DecodeState::Flushing;
                if let Some(result) = self.drain_one() {
                    return Some(result);
                }
                self.state = DecodeState::Finished;
                return None;
            };

            if stream.index() != self.stream_index {
                continue;
            }
            // Corrupt packets are skipped rather than aborting the stream.
            if self.decoder.send_packet(&packet).is_err() {
                continue;
            }
            if let Some(result) = self.drain_one() {
                return Some(result);
            }
        }
    }
}

/// Strips per-row padding (stride > width*3) into a contiguous RGB buffer.
fn packed_rgb(
    rgb: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb.stride(0);
    let data = rgb.data(0);
    let row_bytes = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in data.chunks(stride).take(height as usize) {
        pixels.extend_from_slice(&row[..row_bytes]);
    }
    pixels
}
