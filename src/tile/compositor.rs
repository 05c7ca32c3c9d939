//! Mirror compositing
//!
//! Whether compositing is possible is decided once, when the worker is built,
//! and carried as a [`Compositing`] value. The synthesizer never checks for
//! codec support on the request path.

use crate::cache::WorkerConfig;
use crate::http::Response;
use crate::tile::descriptor::TileAxis;
use image::{imageops, ImageFormat, RgbaImage};
use std::fmt;
use std::io::Cursor;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Failures while building a composite
#[derive(Error, Debug)]
pub enum CompositeError {
    /// Source bytes are not a decodable image
    #[error("Bad source image: {0}")]
    Decode(String),

    /// The doubled surface could not be allocated
    #[error("No 2D context: cannot allocate {width}x{height} surface")]
    Surface { width: u64, height: u64 },

    /// PNG encoding failed
    #[error("Encode failed: {0}")]
    Encode(String),
}

impl CompositeError {
    /// The 500 response reported to the page
    pub fn to_response(&self) -> Response {
        let reason = match self {
            CompositeError::Decode(_) => "Bad source image",
            CompositeError::Surface { .. } => "No 2D context",
            CompositeError::Encode(_) => "Encode failed",
        };
        Response::text(500, reason)
    }
}

/// Builds a mirrored tile from encoded source bytes, returning PNG bytes
pub trait Compositor: Send + Sync {
    fn mirror_tile(&self, source: &[u8], axis: TileAxis) -> Result<Vec<u8>, CompositeError>;
}

/// Compositing capability, probed once at construction
#[derive(Clone)]
pub enum Compositing {
    Available(Arc<dyn Compositor>),
    /// Tiles degrade to the unmodified source image
    Unavailable,
}

impl Compositing {
    /// Use the raster compositor if the linked codecs can read the static
    /// image formats and write PNG
    pub fn probe(config: &WorkerConfig) -> Self {
        let supported = ImageFormat::Png.reading_enabled()
            && ImageFormat::Jpeg.reading_enabled()
            && ImageFormat::Png.writing_enabled();

        if supported {
            debug!("Raster compositing available");
            Compositing::Available(Arc::new(RasterCompositor::new(config.max_tile_pixels)))
        } else {
            info!("Image codecs unavailable, tiles will fall back to source images");
            Compositing::Unavailable
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Compositing::Available(_))
    }
}

impl fmt::Debug for Compositing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compositing::Available(_) => write!(f, "Compositing::Available"),
            Compositing::Unavailable => write!(f, "Compositing::Unavailable"),
        }
    }
}

/// CPU compositor backed by the `image` crate
#[derive(Debug, Clone)]
pub struct RasterCompositor {
    max_pixels: u64,
}

impl RasterCompositor {
    pub fn new(max_pixels: u64) -> Self {
        Self { max_pixels }
    }

    /// Allocate the doubled surface, refusing sizes above the pixel ceiling
    fn surface(
        &self,
        width: u32,
        height: u32,
        axis: TileAxis,
    ) -> Result<RgbaImage, CompositeError> {
        let (w, h) = match axis {
            TileAxis::X => (u64::from(width) * 2, u64::from(height)),
            TileAxis::Y => (u64::from(width), u64::from(height) * 2),
        };

        let too_large = w.saturating_mul(h) > self.max_pixels || w == 0 || h == 0;
        match (u32::try_from(w), u32::try_from(h)) {
            (Ok(sw), Ok(sh)) if !too_large => Ok(RgbaImage::new(sw, sh)),
            _ => Err(CompositeError::Surface { width: w, height: h }),
        }
    }
}

impl Compositor for RasterCompositor {
    fn mirror_tile(&self, source: &[u8], axis: TileAxis) -> Result<Vec<u8>, CompositeError> {
        let source = image::load_from_memory(source)
            .map_err(|e| CompositeError::Decode(e.to_string()))?
            .to_rgba8();
        let (width, height) = source.dimensions();

        let mut surface = self.surface(width, height, axis)?;
        imageops::replace(&mut surface, &source, 0, 0);

        match axis {
            TileAxis::X => {
                let mirrored = imageops::flip_horizontal(&source);
                imageops::replace(&mut surface, &mirrored, i64::from(width), 0);
            }
            TileAxis::Y => {
                let mirrored = imageops::flip_vertical(&source);
                imageops::replace(&mut surface, &mirrored, 0, i64::from(height));
            }
        }

        encode_png(&surface)
    }
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, CompositeError> {
    let mut buffer = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|e| CompositeError::Encode(e.to_string()))?;
    Ok(buffer)
}
