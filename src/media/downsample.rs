//! Downsampler
//!
//! Decodes image bytes straight to a bounded size.
//!
//! - PNG rows are streamed and area-averaged into the target raster, so the
//!   full-resolution image is never held in memory.
//! - JPEG uses DCT-domain scaling, which shrinks by up to 8x per edge during
//!   the decode. Larger reductions finish with a resize of that raster.
//! - Other formats, and interlaced PNG, decode whole in their native pixel
//!   type under a pixel cap checked against the header, then get resized.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageFormat, ImageReader, Limits, RgbImage, RgbaImage};
use jpeg_decoder::PixelFormat;

use crate::error::MediaError;

/// Largest raster, in pixels, held whole when a source cannot be streamed.
const MAX_FULL_DECODE_PIXELS: u64 = 40_000_000;

/// Room per pixel for a full decode (16-bit RGBA).
const FULL_DECODE_BYTES_PER_PIXEL: u64 = 8;

/// Decoder scratch on top of the raster.
const DECODER_SLACK: u64 = 1024 * 1024;

// == Decoded Image ==
/// RGBA bitmap no larger than the configured bound on either edge.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pixels: RgbaImage,
    source_width: u32,
    source_height: u32,
}

impl DecodedImage {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Dimensions declared by the encoded source.
    pub fn source_dimensions(&self) -> (u32, u32) {
        (self.source_width, self.source_height)
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Size of the pixel buffer in bytes.
    pub fn byte_len(&self) -> usize {
        self.pixels.as_raw().len()
    }
}

// == Downsampler ==
#[derive(Debug, Clone, Copy)]
pub struct Downsampler {
    max_dimension: u32,
}

impl Downsampler {
    pub fn new(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
        }
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// Decodes on the blocking pool.
    pub async fn decode(&self, bytes: Vec<u8>) -> Result<DecodedImage, MediaError> {
        let this = *self;
        tokio::task::spawn_blocking(move || this.decode_sync(&bytes))
            .await
            .map_err(decode_failure)?
    }

    pub fn decode_sync(&self, bytes: &[u8]) -> Result<DecodedImage, MediaError> {
        match image::guess_format(bytes) {
            Ok(ImageFormat::Png) => self.decode_png(bytes),
            Ok(ImageFormat::Jpeg) => self.decode_jpeg(bytes),
            Ok(format) => self.decode_full(bytes, format),
            Err(e) => Err(decode_failure(e)),
        }
    }

    fn decode_png(&self, bytes: &[u8]) -> Result<DecodedImage, MediaError> {
        let mut decoder = png::Decoder::new(Cursor::new(bytes));
        decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
        let mut reader = decoder.read_info().map_err(decode_failure)?;

        let info = reader.info();
        let (source_width, source_height) = (info.width, info.height);
        if source_width == 0 || source_height == 0 {
            return Err(MediaError::DecodeFailure("empty PNG".to_string()));
        }
        // Adam7 rows arrive as partial passes.
        if info.interlaced {
            return self.decode_full(bytes, ImageFormat::Png);
        }

        let layout = match reader.output_color_type().0 {
            png::ColorType::Grayscale => Layout::Gray,
            png::ColorType::GrayscaleAlpha => Layout::GrayAlpha,
            png::ColorType::Rgb => Layout::Rgb,
            png::ColorType::Rgba => Layout::Rgba,
            png::ColorType::Indexed => {
                return Err(MediaError::DecodeFailure("unexpanded PNG palette".to_string()))
            }
        };

        let (target_width, target_height) =
            target_dimensions(source_width, source_height, self.max_dimension);
        let mut reducer =
            BandReducer::new(source_width, source_height, target_width, target_height);
        while let Some(row) = reader.next_row().map_err(decode_failure)? {
            reducer.push_row(row.data(), layout);
        }

        Ok(DecodedImage {
            pixels: reducer.finish()?,
            source_width,
            source_height,
        })
    }

    fn decode_jpeg(&self, bytes: &[u8]) -> Result<DecodedImage, MediaError> {
        let mut decoder = jpeg_decoder::Decoder::new(bytes);
        decoder.read_info().map_err(decode_failure)?;

        let info = decoder
            .info()
            .ok_or_else(|| MediaError::DecodeFailure("missing JPEG header".to_string()))?;
        let (source_width, source_height) = (u32::from(info.width), u32::from(info.height));

        // The decoder picks the smallest 1/8 step that still covers the request.
        let (target_width, target_height) =
            target_dimensions(source_width, source_height, self.max_dimension);
        let (width, height) = decoder
            .scale(clamp_u16(target_width), clamp_u16(target_height))
            .map_err(decode_failure)?;
        full_decode_budget(u32::from(width), u32::from(height))?;

        let raw = decoder.decode().map_err(decode_failure)?;
        let pixel_format = decoder
            .info()
            .map(|i| i.pixel_format)
            .unwrap_or(info.pixel_format);

        let image = jpeg_to_image(u32::from(width), u32::from(height), pixel_format, raw)?;
        Ok(self.finish(image, source_width, source_height))
    }

    fn decode_full(&self, bytes: &[u8], format: ImageFormat) -> Result<DecodedImage, MediaError> {
        let (source_width, source_height) = ImageReader::with_format(Cursor::new(bytes), format)
            .into_dimensions()
            .map_err(decode_failure)?;
        let budget = full_decode_budget(source_width, source_height)?;

        let mut reader = ImageReader::with_format(Cursor::new(bytes), format);
        let mut limits = Limits::default();
        limits.max_alloc = Some(budget);
        reader.limits(limits);

        let image = reader.decode().map_err(decode_failure)?;
        Ok(self.finish(image, source_width, source_height))
    }

    /// Resizes in the native pixel type, then widens to RGBA.
    fn finish(&self, image: DynamicImage, source_width: u32, source_height: u32) -> DecodedImage {
        let (width, height) = (image.width(), image.height());
        let (target_width, target_height) = target_dimensions(width, height, self.max_dimension);

        let image = if (target_width, target_height) != (width, height) {
            image.resize_exact(target_width, target_height, FilterType::Triangle)
        } else {
            image
        };

        DecodedImage {
            pixels: image.into_rgba8(),
            source_width,
            source_height,
        }
    }
}

/// Largest size fitting in `max_dimension` with the source aspect ratio.
/// Never upscales.
pub fn target_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_dimension || longest == 0 {
        return (width, height);
    }

    let scale = f64::from(max_dimension) / f64::from(longest);
    let fit = |edge: u32| ((f64::from(edge) * scale).round() as u32).clamp(1, max_dimension);
    (fit(width), fit(height))
}

/// Allocation limit for holding a `width`x`height` raster whole.
fn full_decode_budget(width: u32, height: u32) -> Result<u64, MediaError> {
    let pixels = u64::from(width) * u64::from(height);
    if pixels > MAX_FULL_DECODE_PIXELS {
        return Err(MediaError::DecodeFailure(format!(
            "{}x{} raster exceeds the {} pixel limit for whole decodes",
            width, height, MAX_FULL_DECODE_PIXELS
        )));
    }
    Ok(pixels * FULL_DECODE_BYTES_PER_PIXEL + DECODER_SLACK)
}

// == Band Reducer ==
/// 8-bit sample layout of a streamed row.
#[derive(Debug, Clone, Copy)]
enum Layout {
    Gray,
    GrayAlpha,
    Rgb,
    Rgba,
}

impl Layout {
    fn channels(self) -> usize {
        match self {
            Layout::Gray => 1,
            Layout::GrayAlpha => 2,
            Layout::Rgb => 3,
            Layout::Rgba => 4,
        }
    }

    fn rgba(self, p: &[u8]) -> [u8; 4] {
        match self {
            Layout::Gray => [p[0], p[0], p[0], 255],
            Layout::GrayAlpha => [p[0], p[0], p[0], p[1]],
            Layout::Rgb => [p[0], p[1], p[2], 255],
            Layout::Rgba => [p[0], p[1], p[2], p[3]],
        }
    }
}

/// Area-averages source rows, top to bottom, into a smaller RGBA raster.
///
/// Source row `y` lands in target row `y * th / sh` and column `x` in
/// `x * tw / sw`. Only one band of sums is kept, so memory is the target
/// raster plus one target row.
#[derive(Debug)]
struct BandReducer {
    source_height: u32,
    target_width: u32,
    target_height: u32,
    columns: Vec<usize>,
    sums: Vec<u64>,
    counts: Vec<u64>,
    band: u32,
    rows: u32,
    pixels: Vec<u8>,
}

impl BandReducer {
    fn new(source_width: u32, source_height: u32, target_width: u32, target_height: u32) -> Self {
        let columns = (0..source_width)
            .map(|x| (u64::from(x) * u64::from(target_width) / u64::from(source_width)) as usize)
            .collect();
        let row_len = target_width as usize;

        Self {
            source_height,
            target_width,
            target_height,
            columns,
            sums: vec![0; row_len * 4],
            counts: vec![0; row_len],
            band: 0,
            rows: 0,
            pixels: Vec::with_capacity(row_len * target_height as usize * 4),
        }
    }

    fn push_row(&mut self, data: &[u8], layout: Layout) {
        if self.rows >= self.source_height {
            return;
        }

        let band = (u64::from(self.rows) * u64::from(self.target_height)
            / u64::from(self.source_height)) as u32;
        if band != self.band {
            self.flush();
            self.band = band;
        }

        for (pixel, &column) in data.chunks_exact(layout.channels()).zip(&self.columns) {
            let base = column * 4;
            for (sum, value) in self.sums[base..base + 4].iter_mut().zip(layout.rgba(pixel)) {
                *sum += u64::from(value);
            }
            self.counts[column] += 1;
        }
        self.rows += 1;
    }

    fn flush(&mut self) {
        for (sums, count) in self.sums.chunks_exact_mut(4).zip(self.counts.iter_mut()) {
            let n = (*count).max(1);
            for sum in sums.iter_mut() {
                self.pixels.push(((*sum + n / 2) / n) as u8);
                *sum = 0;
            }
            *count = 0;
        }
    }

    fn finish(mut self) -> Result<RgbaImage, MediaError> {
        if self.rows != self.source_height {
            return Err(MediaError::DecodeFailure(format!(
                "image data ended after {} of {} rows",
                self.rows, self.source_height
            )));
        }
        self.flush();

        RgbaImage::from_raw(self.target_width, self.target_height, self.pixels)
            .ok_or_else(|| MediaError::DecodeFailure("reduced raster size mismatch".to_string()))
    }
}

fn clamp_u16(value: u32) -> u16 {
    value.min(u32::from(u16::MAX)) as u16
}

fn decode_failure(err: impl std::fmt::Display) -> MediaError {
    MediaError::DecodeFailure(err.to_string())
}

fn jpeg_to_image(
    width: u32,
    height: u32,
    format: PixelFormat,
    raw: Vec<u8>,
) -> Result<DynamicImage, MediaError> {
    let short = || MediaError::DecodeFailure("JPEG pixel buffer too short".to_string());

    let image = match format {
        PixelFormat::L8 => {
            DynamicImage::ImageLuma8(GrayImage::from_raw(width, height, raw).ok_or_else(short)?)
        }
        // Big-endian samples: keep the high byte.
        PixelFormat::L16 => {
            let luma = raw.chunks_exact(2).map(|c| c[0]).collect();
            DynamicImage::ImageLuma8(GrayImage::from_raw(width, height, luma).ok_or_else(short)?)
        }
        PixelFormat::RGB24 => {
            DynamicImage::ImageRgb8(RgbImage::from_raw(width, height, raw).ok_or_else(short)?)
        }
        PixelFormat::CMYK32 => {
            let rgb = raw
                .chunks_exact(4)
                .flat_map(|p| {
                    let k = 255 - u16::from(p[3]);
                    [p[0], p[1], p[2]].map(|c| ((255 - u16::from(c)) * k / 255) as u8)
                })
                .collect();
            DynamicImage::ImageRgb8(RgbImage::from_raw(width, height, rgb).ok_or_else(short)?)
        }
    };

    Ok(image)
}
