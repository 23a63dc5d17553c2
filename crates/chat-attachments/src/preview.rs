//! Image Previews
//!
//! Decodes image uploads, records their dimensions and stores a downscaled
//! re-encoded copy next to the original.

use std::io::{self, Cursor, SeekFrom};

use chat_core::config::PreviewConfig;
use chat_models::{Attachment, FileMeta, ImageMeta};
use image::codecs::jpeg::{JpegDecoder, JpegEncoder};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ExtendedColorType, ImageDecoder, ImageEncoder, RgbaImage};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};
use tracing::{debug, instrument, warn};

use crate::storage::{ContentStore, StorageError};

/// Preview generation errors
#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("Unsupported image format: '{0}'")]
    UnsupportedFormat(String),
    #[error("Could not decode image: {0}")]
    Decode(String),
    #[error("Could not encode preview: {0}")]
    Encode(String),
    #[error("Could not store preview: {0}")]
    Storage(#[from] StorageError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type PreviewResult<T> = Result<T, PreviewError>;

/// Codec family of an original, chosen by its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Jpeg,
    Png,
    Gif,
    Tiff,
    Bmp,
}

impl SourceFormat {
    /// Case-insensitive extension lookup
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "tif" | "tiff" => Some(Self::Tiff),
            "bmp" => Some(Self::Bmp),
            _ => None,
        }
    }

    /// GIFs keep their format, everything else previews as JPEG
    pub fn preview_format(self) -> PreviewFormat {
        match self {
            Self::Gif => PreviewFormat::Gif,
            Self::Jpeg | Self::Png | Self::Tiff | Self::Bmp => PreviewFormat::Jpeg,
        }
    }

    fn codec(self) -> image::ImageFormat {
        match self {
            Self::Jpeg => image::ImageFormat::Jpeg,
            Self::Png => image::ImageFormat::Png,
            Self::Gif => image::ImageFormat::Gif,
            Self::Tiff => image::ImageFormat::Tiff,
            Self::Bmp => image::ImageFormat::Bmp,
        }
    }
}

/// Encoding of a generated preview
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewFormat {
    Jpeg,
    Gif,
}

impl PreviewFormat {
    pub fn mimetype(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
        }
    }
}

/// What happened to the preview of an upload
#[derive(Debug, Clone, PartialEq)]
pub enum PreviewOutcome {
    /// Preview stored; carries its metadata
    Generated(FileMeta),
    /// Not an image
    Skipped,
    /// Image path entered but no preview was produced
    Failed(String),
}

impl PreviewOutcome {
    pub fn is_generated(&self) -> bool {
        matches!(self, Self::Generated(_))
    }
}

/// Decoded original, ready for resizing
pub struct DecodedImage {
    pub image: DynamicImage,
    pub animated: bool,
}

impl DecodedImage {
    pub fn meta(&self) -> ImageMeta {
        ImageMeta {
            width: self.image.width(),
            height: self.image.height(),
            animated: self.animated,
        }
    }
}

/// Encoded preview bytes plus their final dimensions
pub struct EncodedPreview {
    pub format: PreviewFormat,
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

/// Decode an original according to its format's policy
pub fn decode(format: SourceFormat, data: &[u8]) -> PreviewResult<DecodedImage> {
    match format {
        SourceFormat::Jpeg => Ok(DecodedImage {
            image: decode_jpeg(data)?,
            animated: false,
        }),
        SourceFormat::Gif => decode_gif(data),
        SourceFormat::Png | SourceFormat::Tiff | SourceFormat::Bmp => {
            let image = image::load_from_memory_with_format(data, format.codec())
                .map_err(|e| PreviewError::Decode(e.to_string()))?;
            Ok(DecodedImage {
                image,
                animated: false,
            })
        }
    }
}

/// JPEG with EXIF orientation applied, falling back to a plain decode
fn decode_jpeg(data: &[u8]) -> PreviewResult<DynamicImage> {
    match decode_jpeg_oriented(data, image::Limits::default()) {
        Ok(image) => Ok(image),
        Err(e) => {
            debug!(error = %e, "EXIF-aware JPEG decode failed, decoding without orientation");
            image::load_from_memory_with_format(data, image::ImageFormat::Jpeg)
                .map_err(|e| PreviewError::Decode(e.to_string()))
        }
    }
}

fn decode_jpeg_oriented(data: &[u8], limits: image::Limits) -> image::ImageResult<DynamicImage> {
    let mut decoder = JpegDecoder::new(Cursor::new(data))?;
    decoder.set_limits(limits)?;
    let orientation = decoder.orientation()?;
    let mut image = DynamicImage::from_decoder(decoder)?;
    image.apply_orientation(orientation);
    Ok(image)
}

/// Decode every frame; the first one, composited onto the logical screen,
/// becomes the preview source.
fn decode_gif(data: &[u8]) -> PreviewResult<DecodedImage> {
    let decode_err = |e: gif::DecodingError| PreviewError::Decode(e.to_string());

    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::RGBA);
    let mut decoder = options.read_info(Cursor::new(data)).map_err(decode_err)?;

    let screen_width = u32::from(decoder.width());
    let screen_height = u32::from(decoder.height());

    let mut first: Option<RgbaImage> = None;
    let mut frame_count = 0usize;

    while let Some(frame) = decoder.read_next_frame().map_err(decode_err)? {
        frame_count += 1;
        if first.is_some() {
            continue;
        }

        let tile = RgbaImage::from_raw(
            u32::from(frame.width),
            u32::from(frame.height),
            frame.buffer.to_vec(),
        )
        .ok_or_else(|| PreviewError::Decode("GIF frame buffer size mismatch".to_string()))?;

        let mut screen = RgbaImage::new(screen_width, screen_height);
        imageops::replace(&mut screen, &tile, i64::from(frame.left), i64::from(frame.top));
        first = Some(screen);
    }

    let loop_count = match decoder.repeat() {
        gif::Repeat::Infinite => 0,
        gif::Repeat::Finite(n) => n,
    };

    let image = first.ok_or_else(|| PreviewError::Decode("GIF has no frames".to_string()))?;

    Ok(DecodedImage {
        image: DynamicImage::ImageRgba8(image),
        animated: loop_count > 0 || frame_count > 1,
    })
}

/// Target size when the image exceeds the configured bounds.
///
/// Wide images are fitted to `max_width`; otherwise tall images are fitted to
/// `max_height`. Only one of the two rules applies.
pub fn preview_dimensions(width: u32, height: u32, config: &PreviewConfig) -> Option<(u32, u32)> {
    if width > config.max_width && width > height {
        Some((config.max_width, scale(height, config.max_width, width)))
    } else if height > config.max_height {
        Some((scale(width, config.max_height, height), config.max_height))
    } else {
        None
    }
}

fn scale(other: u32, target: u32, dimension: u32) -> u32 {
    let scaled = (f64::from(other) * f64::from(target) / f64::from(dimension)).round();
    (scaled as u32).max(1)
}

/// Downscale to the configured bounds with a Lanczos filter
pub fn resize(image: DynamicImage, config: &PreviewConfig) -> DynamicImage {
    match preview_dimensions(image.width(), image.height(), config) {
        Some((width, height)) => image.resize_exact(width, height, FilterType::Lanczos3),
        None => image,
    }
}

/// Encode a preview image
pub fn encode(image: &DynamicImage, format: PreviewFormat, jpeg_quality: u8) -> PreviewResult<Vec<u8>> {
    match format {
        PreviewFormat::Jpeg => encode_jpeg(image, jpeg_quality),
        PreviewFormat::Gif => encode_gif(image),
    }
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> PreviewResult<Vec<u8>> {
    let rgb = image.to_rgb8();
    let mut out = Vec::new();

    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
        .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        .map_err(|e| PreviewError::Encode(e.to_string()))?;

    Ok(out)
}

fn encode_gif(image: &DynamicImage) -> PreviewResult<Vec<u8>> {
    let encode_err = |e: gif::EncodingError| PreviewError::Encode(e.to_string());

    let width = u16::try_from(image.width())
        .map_err(|_| PreviewError::Encode(format!("GIF width {} too large", image.width())))?;
    let height = u16::try_from(image.height())
        .map_err(|_| PreviewError::Encode(format!("GIF height {} too large", image.height())))?;

    let mut pixels = image.to_rgba8().into_raw();
    let frame = gif::Frame::from_rgba_speed(width, height, &mut pixels, 10);

    let mut encoder = gif::Encoder::new(Vec::new(), width, height, &[]).map_err(encode_err)?;
    encoder.write_frame(&frame).map_err(encode_err)?;

    encoder.into_inner().map_err(PreviewError::Io)
}

/// Resize and encode a decoded original
pub fn render(
    decoded: DecodedImage,
    format: PreviewFormat,
    config: &PreviewConfig,
) -> PreviewResult<EncodedPreview> {
    let preview = resize(decoded.image, config);
    let bytes = encode(&preview, format, config.jpeg_quality)?;

    Ok(EncodedPreview {
        format,
        width: preview.width(),
        height: preview.height(),
        bytes,
    })
}

/// Builds previews for image attachments
#[derive(Debug, Clone, Copy, Default)]
pub struct PreviewGenerator {
    config: PreviewConfig,
}

impl PreviewGenerator {
    pub fn new(config: PreviewConfig) -> Self {
        Self { config }
    }

    /// Generate and store a preview, reporting failures as a value
    #[instrument(skip_all, fields(attachment_id = attachment.id))]
    pub async fn generate<R>(
        &self,
        store: &dyn ContentStore,
        attachment: &mut Attachment,
        original: &mut R,
    ) -> PreviewOutcome
    where
        R: AsyncRead + AsyncSeek + Unpin + ?Sized,
    {
        match self.try_generate(store, attachment, original).await {
            Ok(Some(meta)) => PreviewOutcome::Generated(meta),
            Ok(None) => PreviewOutcome::Skipped,
            Err(e) => {
                warn!(
                    attachment_id = attachment.id,
                    name = %attachment.name,
                    error = %e,
                    "Preview generation failed"
                );
                PreviewOutcome::Failed(e.to_string())
            }
        }
    }

    /// Generate and store a preview; `None` when the original is not an image
    pub async fn try_generate<R>(
        &self,
        store: &dyn ContentStore,
        attachment: &mut Attachment,
        original: &mut R,
    ) -> PreviewResult<Option<FileMeta>>
    where
        R: AsyncRead + AsyncSeek + Unpin + ?Sized,
    {
        if !attachment.is_image() {
            return Ok(None);
        }

        let extension = &attachment.meta.original.extension;
        let format = SourceFormat::from_extension(extension)
            .ok_or_else(|| PreviewError::UnsupportedFormat(extension.clone()))?;

        original.seek(SeekFrom::Start(0)).await?;
        let mut data = Vec::new();
        original.read_to_end(&mut data).await?;

        let decoded = tokio::task::spawn_blocking(move || decode(format, &data))
            .await
            .map_err(|e| PreviewError::Io(io::Error::new(io::ErrorKind::Other, e)))??;

        let original_meta = decoded.meta();
        attachment.set_original_image_meta(
            original_meta.width,
            original_meta.height,
            original_meta.animated,
        );

        let config = self.config;
        let preview_format = format.preview_format();
        let encoded = tokio::task::spawn_blocking(move || render(decoded, preview_format, &config))
            .await
            .map_err(|e| PreviewError::Io(io::Error::new(io::ErrorKind::Other, e)))??;

        debug!(
            format = preview_format.extension(),
            width = encoded.width,
            height = encoded.height,
            "Generated preview"
        );

        let path = store.preview_path(attachment.id, preview_format.extension());
        let size = store.save(&path, &mut encoded.bytes.as_slice()).await?;

        attachment.preview_url = path;
        let meta = attachment.set_preview_meta(FileMeta {
            size: size as i64,
            extension: preview_format.extension().to_string(),
            mimetype: preview_format.mimetype().to_string(),
            image: Some(ImageMeta {
                width: encoded.width,
                height: encoded.height,
                animated: false,
            }),
        });

        Ok(Some(meta.clone()))
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures;
    use super::*;
    use crate::storage::MemoryContentStore;

    fn image_attachment(id: i64, name: &str, mimetype: &str, extension: &str) -> Attachment {
        let mut attachment = Attachment::new(id, 1, name);
        attachment.meta.original = FileMeta {
            size: 0,
            extension: extension.to_string(),
            mimetype: mimetype.to_string(),
            image: None,
        };
        attachment
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(SourceFormat::from_extension("jpg"), Some(SourceFormat::Jpeg));
        assert_eq!(SourceFormat::from_extension("JPEG"), Some(SourceFormat::Jpeg));
        assert_eq!(SourceFormat::from_extension("Png"), Some(SourceFormat::Png));
        assert_eq!(SourceFormat::from_extension("tif"), Some(SourceFormat::Tiff));
        assert_eq!(SourceFormat::from_extension("webp"), None);
        assert_eq!(SourceFormat::from_extension(""), None);
    }

    #[test]
    fn test_preview_format_mapping() {
        assert_eq!(SourceFormat::Gif.preview_format(), PreviewFormat::Gif);
        assert_eq!(SourceFormat::Png.preview_format(), PreviewFormat::Jpeg);
        assert_eq!(PreviewFormat::Jpeg.mimetype(), "image/jpeg");
        assert_eq!(PreviewFormat::Jpeg.extension(), "jpg");
        assert_eq!(PreviewFormat::Gif.mimetype(), "image/gif");
        assert_eq!(PreviewFormat::Gif.extension(), "gif");
    }

    #[test]
    fn test_preview_dimensions() {
        let config = PreviewConfig::default();

        assert_eq!(preview_dimensions(1600, 300, &config), Some((800, 150)));
        assert_eq!(preview_dimensions(300, 900, &config), Some((133, 400)));
        assert_eq!(preview_dimensions(800, 400, &config), None);
        assert_eq!(preview_dimensions(640, 480, &config), Some((533, 400)));
        // square and over both bounds: height rule applies
        assert_eq!(preview_dimensions(1000, 1000, &config), Some((400, 400)));
        // extreme aspect ratios never collapse to zero
        assert_eq!(preview_dimensions(10000, 1, &config), Some((800, 1)));
    }

    #[test]
    fn test_jpeg_exif_rotation_swaps_dimensions() {
        let data = fixtures::jpeg_with_orientation(40, 20, 6);
        let decoded = decode(SourceFormat::Jpeg, &data).unwrap();

        assert_eq!(decoded.image.width(), 20);
        assert_eq!(decoded.image.height(), 40);
        assert!(!decoded.animated);
    }

    #[test]
    fn test_oriented_jpeg_decode_honours_limits() {
        let data = fixtures::jpeg_with_orientation(40, 20, 6);
        let mut limits = image::Limits::default();
        limits.max_image_width = Some(8);

        let err = decode_jpeg_oriented(&data, limits).unwrap_err();
        assert!(matches!(err, image::ImageError::Limits(_)));

        let image = decode_jpeg_oriented(&data, image::Limits::default()).unwrap();
        assert_eq!((image.width(), image.height()), (20, 40));
    }

    #[test]
    fn test_jpeg_without_exif() {
        let decoded = decode(SourceFormat::Jpeg, &fixtures::jpeg(40, 20)).unwrap();
        assert_eq!((decoded.image.width(), decoded.image.height()), (40, 20));
    }

    #[test]
    fn test_gif_animation_rules() {
        let single = fixtures::gif(4, 4, 1, None);
        assert!(!decode(SourceFormat::Gif, &single).unwrap().animated);

        // loop forever is a loop count of zero
        let forever = fixtures::gif(4, 4, 1, Some(gif::Repeat::Infinite));
        assert!(!decode(SourceFormat::Gif, &forever).unwrap().animated);

        let looped = fixtures::gif(4, 4, 1, Some(gif::Repeat::Finite(1)));
        assert!(decode(SourceFormat::Gif, &looped).unwrap().animated);

        let frames = fixtures::gif(4, 4, 2, None);
        let decoded = decode(SourceFormat::Gif, &frames).unwrap();
        assert!(decoded.animated);
        assert_eq!((decoded.image.width(), decoded.image.height()), (4, 4));
    }

    #[test]
    fn test_gif_decode_failure() {
        let result = decode(SourceFormat::Gif, b"GIF89a\x00");
        assert!(matches!(result, Err(PreviewError::Decode(_))));
    }

    #[test]
    fn test_render_encodes_requested_format() {
        let config = PreviewConfig::default();
        let decoded = decode(SourceFormat::Png, &fixtures::png(1600, 300)).unwrap();

        let encoded = render(decoded, PreviewFormat::Jpeg, &config).unwrap();
        assert_eq!((encoded.width, encoded.height), (800, 150));
        assert_eq!(&encoded.bytes[..3], &[0xFF, 0xD8, 0xFF]);

        let decoded = decode(SourceFormat::Gif, &fixtures::gif(8, 8, 2, None)).unwrap();
        let encoded = render(decoded, PreviewFormat::Gif, &config).unwrap();
        assert_eq!(&encoded.bytes[..6], b"GIF89a");
    }

    #[tokio::test]
    async fn test_generate_tall_png() {
        let store = MemoryContentStore::default();
        let generator = PreviewGenerator::default();
        let mut attachment = image_attachment(9, "tall.png", "image/png", "png");
        let mut original = Cursor::new(fixtures::png(300, 900));

        let outcome = generator.generate(&store, &mut attachment, &mut original).await;

        let PreviewOutcome::Generated(meta) = outcome else {
            panic!("expected a generated preview, got {:?}", outcome);
        };
        assert_eq!(meta.mimetype, "image/jpeg");
        assert_eq!(meta.extension, "jpg");
        assert_eq!((meta.width(), meta.height()), (133, 400));
        assert!(!meta.is_animated());

        assert_eq!(attachment.preview_url, "attachments/9_preview.jpg");
        assert_eq!(attachment.meta.original.width(), 300);
        assert_eq!(attachment.meta.original.height(), 900);

        let stored = store.get("attachments/9_preview.jpg").await.unwrap();
        assert_eq!(stored.len() as i64, meta.size);
    }

    #[tokio::test]
    async fn test_generate_rotated_jpeg() {
        let store = MemoryContentStore::default();
        let generator = PreviewGenerator::default();
        let mut attachment = image_attachment(5, "phone.jpg", "image/jpeg", "jpg");
        let mut original = Cursor::new(fixtures::jpeg_with_orientation(1000, 500, 6));

        let outcome = generator.generate(&store, &mut attachment, &mut original).await;

        assert!(outcome.is_generated());
        assert_eq!(attachment.meta.original.width(), 500);
        assert_eq!(attachment.meta.original.height(), 1000);
        assert_eq!(attachment.preview_url, "attachments/5_preview.jpg");
        let preview = attachment.meta.preview.as_ref().unwrap();
        assert_eq!((preview.width(), preview.height()), (200, 400));
        assert_eq!(preview.mimetype, "image/jpeg");
    }

    #[tokio::test]
    async fn test_generate_animated_gif() {
        let store = MemoryContentStore::default();
        let generator = PreviewGenerator::default();
        let mut attachment = image_attachment(3, "anim.gif", "image/gif", "gif");
        let mut original = Cursor::new(fixtures::gif(16, 8, 3, None));

        let outcome = generator.generate(&store, &mut attachment, &mut original).await;

        assert!(outcome.is_generated());
        assert!(attachment.meta.original.is_animated());
        assert_eq!(attachment.preview_url, "attachments/3_preview.gif");
        let preview = attachment.meta.preview.as_ref().unwrap();
        assert_eq!(preview.mimetype, "image/gif");
        assert!(!preview.is_animated());
    }

    #[tokio::test]
    async fn test_generate_skips_non_images() {
        let store = MemoryContentStore::default();
        let generator = PreviewGenerator::default();
        let mut attachment = image_attachment(1, "doc.pdf", "application/pdf", "pdf");
        let mut original = Cursor::new(b"%PDF-1.4".to_vec());

        let outcome = generator.generate(&store, &mut attachment, &mut original).await;

        assert_eq!(outcome, PreviewOutcome::Skipped);
        assert!(attachment.preview_url.is_empty());
        assert!(attachment.meta.preview.is_none());
        assert!(store.paths().await.is_empty());
    }

    #[tokio::test]
    async fn test_generate_unsupported_extension_fails_softly() {
        let store = MemoryContentStore::default();
        let generator = PreviewGenerator::default();
        let mut attachment = image_attachment(1, "photo.webp", "image/png", "webp");
        let mut original = Cursor::new(fixtures::png(10, 10));

        let outcome = generator.generate(&store, &mut attachment, &mut original).await;

        assert!(matches!(outcome, PreviewOutcome::Failed(_)));
        assert!(attachment.preview_url.is_empty());
        assert!(attachment.meta.original.image.is_none());
    }
}
