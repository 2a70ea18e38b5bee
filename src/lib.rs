// lib.rs — 全景漫游的投影与交互核心

pub mod config;
pub mod error;
pub mod geometry;
pub mod hotspot;
pub mod renderer;
pub mod source;
pub mod view;
pub mod viewport;

pub use config::ViewConfig;
pub use error::{ConfigError, DecodeError, RenderError, ViewError};
pub use hotspot::{GeoCoord, ScreenPoint};
pub use renderer::{
    CanvasRenderer, DisplaySurface, FallbackRenderer, MemorySurface, PanoramaRenderer, RenderFrame,
};
pub use source::{EquirectangularImage, FileDecoder, ImageDecoder};
pub use view::PanoramaView;
pub use viewport::{DragState, Orientation, ViewerState, Viewport, ZoomLimits};
