//! # Mirror tiles
//!
//! A tile request names a static source image and an axis:
//!
//! ```text
//! GET /__tile?axis=x&src=/static/wall.png
//! ```
//!
//! The response is a PNG twice as wide (`x`) or twice as tall (`y`) as the
//! source, with the source at the origin and its mirror image next to it, so
//! the result repeats seamlessly when used as a CSS background.

pub mod compositor;
pub mod descriptor;
pub mod synthesizer;

pub use compositor::{CompositeError, Compositing, Compositor, RasterCompositor};
pub use descriptor::{TileAxis, TileDescriptor, TileRejection};
pub use synthesizer::TileSynthesizer;
