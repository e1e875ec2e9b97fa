//! Interactive watermark compositing engine.
//!
//! A base raster and one watermark (an image or a line of text) are
//! combined into a single surface. The user drags the watermark around and
//! adjusts its opacity and scale; every change produces a new revision of
//! the [`CompositionState`] and the compositor redraws at most once per
//! display frame.
//!
//! # Components
//!
//! - [`asset`]: URI resolution and decoding, with generation-guarded slots
//! - [`state`]: base asset, watermark descriptor, placement parameters
//! - [`interaction`]: pointer drag state machine
//! - [`compositor`]: pure render of state into pixels
//! - [`scheduler`]: redraw coalescing
//! - [`export`]: PNG encoding and output filename derivation
//! - [`session`]: the above wired together for one screen
//!
//! # Example
//!
//! ```ignore
//! let loader = AssetLoader::new(AssetLoaderConfig::default())?;
//! let mut session = CompositionSession::new(
//!     Compositor::new(),
//!     CanvasDimensions::new(1200, 800),
//!     RedrawScheduler::default(),
//! );
//! session.load_base(&loader, "paper.jpg").await;
//! session.set_text("DRAFT");
//! session.pump(Instant::now())?;
//! let exported = session.export(&ExportEncoder::default())?;
//! ```

pub mod asset;
pub mod compositor;
pub mod error;
pub mod export;
pub mod interaction;
pub mod position;
pub mod scheduler;
pub mod session;
pub mod state;
pub mod text_renderer;

pub use asset::{
    decode_raster, AssetLoader, AssetLoaderConfig, AssetSlot, AssetSource, AssetStatus,
    LoadTicket, RasterAsset,
};
pub use compositor::{Compositor, WatermarkLayer};
pub use error::WatermarkError;
pub use export::{
    derive_filename, sanitize_filename, ExportEncoder, ExportedImage, FilenamePolicy,
};
pub use interaction::{DragState, InteractionController, PointerEvent};
pub use position::{
    centered_origin, normalize_pointer, visible_region, Anchor, CanvasDimensions, CanvasRect,
    PlacementPosition, VisibleRegion, WatermarkDimensions,
};
pub use scheduler::RedrawScheduler;
pub use session::CompositionSession;
pub use state::{CompositionState, PlacementParams, WatermarkDescriptor, WatermarkKind};
pub use text_renderer::{parse_hex_color, Color, GlyphSource, TextStyle};
