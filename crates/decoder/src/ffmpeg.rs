//! FFmpeg video source: open a file, seek to a frame, decode it as RGB24.

use ffmpeg_next as ffmpeg;
use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling::{Context as ScalingContext, Flags as ScalingFlags};
use ffmpeg_next::util::frame::video::Video as VideoFrame;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

use vs_common::{DecodeError, FrameSource, OpenError, RgbFrame, VideoMetadata};

/// Forward distance (in frames) still served by decoding on instead of seeking.
const SEQUENTIAL_WINDOW: u32 = 10;

/// Safety limit on frames decoded for a single request.
const MAX_DECODE_FRAMES: u32 = 600;

/// Initialise FFmpeg once per process. Safe to call repeatedly.
pub fn init() -> Result<(), String> {
    static INIT: OnceLock<Result<(), String>> = OnceLock::new();
    INIT.get_or_init(|| ffmpeg::init().map_err(|e| e.to_string()))
        .clone()
}

/// Open decode state; dropped on [`FrameSource::close`].
struct DecodeState {
    input: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::Video,
    stream_index: usize,
    time_base: ffmpeg::Rational,
    /// Stream start time in stream time base (0 when unknown).
    start_pts: i64,
    /// Index of the most recently decoded frame, used to skip seeks.
    last_decoded_frame: Option<u32>,
}

/// A video file opened through FFmpeg.
pub struct FfmpegSource {
    metadata: VideoMetadata,
    state: Option<DecodeState>,
}

impl FfmpegSource {
    /// Open a video file and read its stream metadata.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, OpenError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(OpenError::NotFound(path.to_path_buf()));
        }

        let backend = |reason: String| OpenError::Backend {
            path: path.to_path_buf(),
            reason,
        };

        init().map_err(backend)?;

        let input = ffmpeg::format::input(&path).map_err(|e| backend(e.to_string()))?;

        let stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| OpenError::NoVideoStream(path.to_path_buf()))?;

        let stream_index = stream.index();
        let time_base = stream.time_base();
        let start_pts = stream.start_time();
        let start_pts = if start_pts == ffmpeg::ffi::AV_NOPTS_VALUE {
            0
        } else {
            start_pts
        };

        let context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| backend(e.to_string()))?;
        let decoder = context
            .decoder()
            .video()
            .map_err(|e| backend(e.to_string()))?;

        let width = decoder.width();
        let height = decoder.height();
        let codec = decoder
            .codec()
            .map(|c| c.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let fps = rational_to_f64(stream.avg_frame_rate())
            .or_else(|| rational_to_f64(stream.rate()))
            .unwrap_or(0.0);

        let frame_count = match stream.frames() {
            n if n > 0 => n as u32,
            _ => {
                // Estimate from container duration
                let duration = input.duration();
                if duration > 0 && fps > 0.0 {
                    let secs = duration as f64 / ffmpeg::ffi::AV_TIME_BASE as f64;
                    (secs * fps).floor() as u32
                } else {
                    0
                }
            }
        };

        if width == 0 || height == 0 {
            return Err(backend("video stream reports zero dimensions".into()));
        }
        if frame_count == 0 {
            return Err(OpenError::Empty(path.to_path_buf()));
        }

        let metadata = VideoMetadata {
            path: path.to_path_buf(),
            frame_count,
            fps,
            width,
            height,
            codec,
        };

        info!(
            "Opened {}: {}x{} @ {:.2} fps, {} frames, codec: {}",
            metadata.file_name(),
            width,
            height,
            fps,
            frame_count,
            metadata.codec
        );

        Ok(Self {
            metadata,
            state: Some(DecodeState {
                input,
                decoder,
                stream_index,
                time_base,
                start_pts,
                last_decoded_frame: None,
            }),
        })
    }
}

impl FrameSource for FfmpegSource {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn decode_frame(&mut self, index: u32) -> Result<RgbFrame, DecodeError> {
        let start = Instant::now();
        let frame_count = self.metadata.frame_count;
        let fps = self.metadata.fps;

        if index >= frame_count {
            return Err(DecodeError::OutOfRange { index, frame_count });
        }

        let state = self.state.as_mut().ok_or(DecodeError::Closed)?;

        let result = state.decode_at(index, fps);
        if result.is_err() {
            // Decoder may be drained or mid-GOP; force a seek and flush next time
            state.last_decoded_frame = None;
        }
        let rgb = result?;

        trace!(
            "Decoded frame {} of {} in {}us",
            index,
            self.metadata.file_name(),
            start.elapsed().as_micros()
        );

        Ok(rgb)
    }

    fn close(&mut self) {
        if self.state.take().is_some() {
            debug!("Closed {}", self.metadata.file_name());
        }
    }

    fn is_closed(&self) -> bool {
        self.state.is_none()
    }
}

impl DecodeState {
    fn decode_at(&mut self, index: u32, fps: f64) -> Result<RgbFrame, DecodeError> {
        if should_seek(self.last_decoded_frame, index) {
            self.seek_to_frame(index, fps)?;
        }

        let frame = self.decode_until(index, fps)?;
        convert_frame(&frame, index)
    }

    /// Seek to the keyframe at or before `index` and flush the decoder.
    ///
    /// Without a frame rate there is no timestamp to aim for, so the stream is
    /// rewound and frames are counted from the start.
    fn seek_to_frame(&mut self, index: u32, fps: f64) -> Result<(), DecodeError> {
        let file_ts = if fps > 0.0 {
            let start_secs = self.start_pts as f64 * f64::from(self.time_base);
            let target_secs = start_secs + index as f64 / fps;
            (target_secs * ffmpeg::ffi::AV_TIME_BASE as f64) as i64
        } else {
            0
        };

        if let Err(e) = self.input.seek(file_ts, ..file_ts) {
            warn!("Seek to frame {} failed ({}), rewinding to start", index, e);
            self.input
                .seek(0, ..0)
                .map_err(|e| DecodeError::Backend {
                    index,
                    reason: format!("seek failed: {e}"),
                })?;
        }

        self.decoder.flush();
        self.last_decoded_frame = None;

        debug!("Seeked to frame {} (ts={})", index, file_ts);
        Ok(())
    }

    /// Feed packets until a frame at or past `target` comes out.
    fn decode_until(&mut self, target: u32, fps: f64) -> Result<VideoFrame, DecodeError> {
        let backend = |e: ffmpeg::Error| DecodeError::Backend {
            index: target,
            reason: e.to_string(),
        };

        let limit = decode_limit(target, fps);
        let mut frame = VideoFrame::empty();
        let mut frames_decoded = 0u32;
        let mut eof_sent = false;

        loop {
            while self.decoder.receive_frame(&mut frame).is_ok() {
                let current = self.frame_index_of(&frame, fps);
                self.last_decoded_frame = Some(current);
                frames_decoded += 1;

                trace!(
                    "Decoded frame {} (target: {}, pts: {:?})",
                    current,
                    target,
                    frame.pts()
                );

                if current >= target {
                    return Ok(frame);
                }

                if frames_decoded >= limit {
                    warn!(
                        "Hit max decode limit ({}) seeking to frame {}",
                        limit, target
                    );
                    return Err(DecodeError::Backend {
                        index: target,
                        reason: format!("gave up after decoding {frames_decoded} frames"),
                    });
                }
            }

            if eof_sent {
                return Err(DecodeError::EndOfStream { index: target });
            }

            match self.next_video_packet() {
                Some(packet) => self.decoder.send_packet(&packet).map_err(backend)?,
                None => {
                    self.decoder.send_eof().map_err(backend)?;
                    eof_sent = true;
                }
            }
        }
    }

    fn next_video_packet(&mut self) -> Option<ffmpeg::Packet> {
        let stream_index = self.stream_index;
        self.input
            .packets()
            .find(|(stream, _)| stream.index() == stream_index)
            .map(|(_, packet)| packet)
    }

    /// Frame number from the presentation timestamp, or the next sequential
    /// number when there is no usable timestamp.
    fn frame_index_of(&self, frame: &VideoFrame, fps: f64) -> u32 {
        frame_index_from_pts(
            frame.pts(),
            self.start_pts,
            self.time_base,
            fps,
            self.last_decoded_frame,
        )
    }
}

/// Whether reaching `index` needs a seek, given the last decoded frame.
/// Short forward steps decode on from the current position.
fn should_seek(last_decoded: Option<u32>, index: u32) -> bool {
    match last_decoded {
        Some(last) => index <= last || index - last > SEQUENTIAL_WINDOW,
        None => true,
    }
}

/// Frames that may be decoded for one request. Without a frame rate the
/// stream is counted from the start, so the target itself must fit.
fn decode_limit(target: u32, fps: f64) -> u32 {
    if fps > 0.0 {
        MAX_DECODE_FRAMES
    } else {
        target.saturating_add(MAX_DECODE_FRAMES)
    }
}

fn frame_index_from_pts(
    pts: Option<i64>,
    start_pts: i64,
    time_base: ffmpeg::Rational,
    fps: f64,
    last_decoded: Option<u32>,
) -> u32 {
    match pts {
        Some(pts) if fps > 0.0 => {
            let secs = (pts - start_pts) as f64 * f64::from(time_base);
            (secs * fps).round().max(0.0) as u32
        }
        _ => last_decoded.map(|f| f + 1).unwrap_or(0),
    }
}

/// Copy `height` rows of `width_bytes` out of a plane with `stride` bytes
/// per row. `None` if the plane is too short.
fn strip_row_padding(
    src: &[u8],
    stride: usize,
    width_bytes: usize,
    height: usize,
) -> Option<Vec<u8>> {
    if stride < width_bytes {
        return None;
    }
    if stride == width_bytes {
        return src.get(..width_bytes * height).map(<[u8]>::to_vec);
    }

    let mut data = Vec::with_capacity(width_bytes * height);
    for y in 0..height {
        let row_start = y * stride;
        data.extend_from_slice(src.get(row_start..row_start + width_bytes)?);
    }
    Some(data)
}

/// Convert a decoded frame to tightly packed RGB24.
fn convert_frame(frame: &VideoFrame, index: u32) -> Result<RgbFrame, DecodeError> {
    let backend = |e: ffmpeg::Error| DecodeError::Backend {
        index,
        reason: e.to_string(),
    };

    let width = frame.width();
    let height = frame.height();

    let mut scaler = ScalingContext::get(
        frame.format(),
        width,
        height,
        Pixel::RGB24,
        width,
        height,
        ScalingFlags::BILINEAR,
    )
    .map_err(backend)?;

    let mut output = VideoFrame::empty();
    scaler.run(frame, &mut output).map_err(backend)?;

    let width_bytes = width as usize * RgbFrame::BYTES_PER_PIXEL;
    let data = strip_row_padding(output.data(0), output.stride(0), width_bytes, height as usize)
        .ok_or_else(|| DecodeError::Backend {
            index,
            reason: "scaler output plane is smaller than the frame".into(),
        })?;

    RgbFrame::new(width, height, data).ok_or_else(|| DecodeError::Backend {
        index,
        reason: "scaler produced a buffer of unexpected size".into(),
    })
}

fn rational_to_f64(rate: ffmpeg::Rational) -> Option<f64> {
    if rate.numerator() > 0 && rate.denominator() > 0 {
        Some(f64::from(rate))
    } else {
        None
    }
}
