//! Export pipeline — drives the paginator against injected collaborators.
//!
//! Rendering the resume to a bitmap (`Rasterizer`) and writing pages (`PageSink`) are
//! traits so the pagination core never touches a renderer or output format directly.
//! `export_bitmap` issues sink calls sequentially, one draw per slice.

pub mod handlers;
pub mod pdf_sink;
pub mod raster;

use async_trait::async_trait;
use bytes::Bytes;
use image::RgbaImage;
use thiserror::Error;
use tracing::info;

use crate::pagination::{plan, Bitmap, PageConfig, PaginationError, PaginationPolicy};

pub use pdf_sink::PdfPageSink;
pub use raster::SnapshotRasterizer;

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Pagination(#[from] PaginationError),

    #[error("Could not decode document snapshot: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Invalid rasterization request: {0}")]
    InvalidRequest(String),

    #[error("Page sink error: {0}")]
    Sink(String),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

// ────────────────────────────────────────────────────────────────────────────
// Collaborator traits
// ────────────────────────────────────────────────────────────────────────────

/// Renders document content to a bitmap.
///
/// Implementations must return the full content height; the paginator never checks for
/// viewport clipping. `target_height_px: None` means "whatever the content needs".
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn rasterize(
        &self,
        content: Bytes,
        target_width_px: Option<u32>,
        target_height_px: Option<u32>,
        scale: f64,
    ) -> Result<Bitmap, ExportError>;
}

/// Receives page slices in order.
///
/// `new_page` is called before every slice except the first.
pub trait PageSink {
    fn new_page(&mut self) -> Result<(), ExportError>;

    fn draw_image(
        &mut self,
        pixels: &RgbaImage,
        x_mm: f64,
        y_mm: f64,
        width_mm: f64,
        height_mm: f64,
    ) -> Result<(), ExportError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Driver
// ────────────────────────────────────────────────────────────────────────────

/// Paginates `bitmap` and feeds every slice to `sink`. Returns the number of pages written.
///
/// Fails before the first sink call on any pagination error, so a sink never receives a
/// truncated document.
pub fn export_bitmap(
    bitmap: &Bitmap,
    page: &PageConfig,
    policy: &PaginationPolicy,
    sink: &mut dyn PageSink,
) -> Result<usize, ExportError> {
    let metrics = bitmap.metrics();
    let plan = plan(&metrics, page, policy)?;
    let geometry = &plan.geometry;

    for slice in &plan.slices {
        if slice.page_index > 0 {
            sink.new_page()?;
        }
        let band = bitmap.band(slice.source_y_px, slice.source_height_px);
        sink.draw_image(
            &band,
            geometry.origin_x_mm,
            geometry.origin_y_mm,
            geometry.available_width_mm,
            slice.display_height_mm,
        )?;
    }

    info!(
        pages = plan.page_count(),
        pixel_width = metrics.pixel_width,
        pixel_height = metrics.pixel_height,
        scale = metrics.scale,
        "Exported bitmap"
    );
    Ok(plan.page_count())
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
