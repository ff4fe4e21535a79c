//! Uploaded video sampling through FFmpeg.
//!
//! Only the best video stream is decoded. Every `sample_every`-th decoded
//! picture is converted to packed RGB24 until `max_frames` samples exist;
//! the rest of the file is left unread.

use anyhow::{anyhow, bail, Context, Result};
use ffmpeg_next as ffmpeg;

use ffmpeg::format::context::Input;
use ffmpeg::software::scaling;
use ffmpeg::util::format::pixel::Pixel;

use super::file::{FileConfig, FileStats};
use crate::frame::Frame;

pub(crate) struct FfmpegFileSource {
    config: FileConfig,
    input: Input,
    video_stream: usize,
    decoder: ffmpeg::decoder::Video,
    to_rgb: scaling::Context,
    pictures_decoded: u64,
    samples: u64,
    drained: bool,
}

impl FfmpegFileSource {
    pub(crate) fn new(config: FileConfig) -> Result<Self> {
        ffmpeg::init().context("ffmpeg initialisation failed")?;
        let input = ffmpeg::format::input(&config.path)
            .with_context(|| format!("cannot open video {}", config.path.display()))?;
        let (video_stream, decoder) = open_video_decoder(&input)?;
        let to_rgb = scaling::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            scaling::Flags::BILINEAR,
        )
        .context("cannot build RGB converter for video")?;

        log::info!(
            "sampling {} ({}x{}, every {} frame(s), at most {})",
            config.path.display(),
            decoder.width(),
            decoder.height(),
            config.sample_every.max(1),
            config.max_frames
        );

        Ok(Self {
            config,
            input,
            video_stream,
            decoder,
            to_rgb,
            pictures_decoded: 0,
            samples: 0,
            drained: false,
        })
    }

    pub(crate) fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.samples >= u64::from(self.config.max_frames) {
            return Ok(None);
        }

        // Pictures still buffered in the decoder come first.
        if let Some(frame) = self.take_sample()? {
            return Ok(Some(frame));
        }
        if self.drained {
            return self.finish();
        }

        let video_stream = self.video_stream;
        for (stream, packet) in self.input.packets() {
            if stream.index() != video_stream {
                continue;
            }
            self.decoder
                .send_packet(&packet)
                .context("video packet rejected by decoder")?;
            if let Some(frame) = take_sample(
                &mut self.decoder,
                &mut self.to_rgb,
                &mut self.pictures_decoded,
                &mut self.samples,
                self.config.sample_every,
            )? {
                return Ok(Some(frame));
            }
        }

        self.drained = true;
        self.decoder
            .send_eof()
            .context("video decoder failed to flush")?;
        match self.take_sample()? {
            Some(frame) => Ok(Some(frame)),
            None => self.finish(),
        }
    }

    pub(crate) fn stats(&self) -> FileStats {
        FileStats {
            frames_captured: self.samples,
            path: self.config.path.clone(),
        }
    }

    fn take_sample(&mut self) -> Result<Option<Frame>> {
        take_sample(
            &mut self.decoder,
            &mut self.to_rgb,
            &mut self.pictures_decoded,
            &mut self.samples,
            self.config.sample_every,
        )
    }

    fn finish(&self) -> Result<Option<Frame>> {
        if self.samples == 0 {
            bail!("video {} contains no decodable frames", self.config.path.display());
        }
        Ok(None)
    }
}

fn open_video_decoder(input: &Input) -> Result<(usize, ffmpeg::decoder::Video)> {
    let stream = input
        .streams()
        .best(ffmpeg::media::Type::Video)
        .ok_or_else(|| anyhow!("upload has no video track"))?;
    let decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
        .context("unsupported video codec parameters")?
        .decoder()
        .video()
        .context("no decoder for video codec")?;
    Ok((stream.index(), decoder))
}

/// Pull decoded pictures until one lands on the sampling interval.
fn take_sample(
    decoder: &mut ffmpeg::decoder::Video,
    to_rgb: &mut scaling::Context,
    pictures_decoded: &mut u64,
    samples: &mut u64,
    sample_every: u32,
) -> Result<Option<Frame>> {
    let interval = u64::from(sample_every.max(1));
    let mut picture = ffmpeg::frame::Video::empty();
    while decoder.receive_frame(&mut picture).is_ok() {
        let position = *pictures_decoded;
        *pictures_decoded += 1;
        if position % interval != 0 {
            continue;
        }
        let mut rgb = ffmpeg::frame::Video::empty();
        to_rgb
            .run(&picture, &mut rgb)
            .context("video frame conversion to RGB failed")?;
        *samples += 1;
        return Frame::from_rgb(packed_rgb(&rgb)?, rgb.width(), rgb.height(), position).map(Some);
    }
    Ok(None)
}

/// RGB24 plane without row padding.
fn packed_rgb(rgb: &ffmpeg::frame::Video) -> Result<Vec<u8>> {
    let row_len = rgb.width() as usize * 3;
    let rows = rgb.height() as usize;
    let stride = rgb.stride(0);
    let plane = rgb.data(0);
    let mut pixels = Vec::with_capacity(row_len * rows);
    for row in 0..rows {
        let start = row * stride;
        let line = plane
            .get(start..start + row_len)
            .context("converted video frame is smaller than reported")?;
        pixels.extend_from_slice(line);
    }
    Ok(pixels)
}
