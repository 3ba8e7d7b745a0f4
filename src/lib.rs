//! FluidCanvas — an interactive raster-drawing engine.
//!
//! Each canvas owns a dense ARGB pixel buffer and a co-resident fluid
//! velocity field.  Freehand strokes are rasterized with pressure- and
//! texture-sensitive brushes, device acceleration drives a lightweight
//! paint-drift simulation, and the buffer serializes to a BMP data-URI for
//! display.  The [`session::CanvasSession`] registry is the boundary the
//! host adapter talks to; everything underneath is plain synchronous
//! call-and-return with exclusive ownership.

pub mod logger;

pub mod brush;
pub mod canvas;
pub mod cli;
pub mod session;
pub mod snapshot;
pub mod stroke;
pub mod telemetry;

pub use brush::{BrushConfig, BrushPhysics, BrushStyle, BrushTexture};
pub use canvas::PixelCanvas;
pub use session::{CanvasHandle, CanvasSession, StrokeHandle};
pub use stroke::{Stroke, StrokePoint};
pub use telemetry::RenderTelemetry;
