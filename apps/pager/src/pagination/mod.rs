// Resume pagination core.
// Geometry converts device pixels to page millimetres; the paginator slices a tall
// bitmap into page-sized bands. Both are pure and synchronous.

pub mod bitmap;
pub mod error;
pub mod geometry;
pub mod paginator;

// Re-export the public API consumed by the export pipeline and handlers.
pub use bitmap::Bitmap;
pub use error::PaginationError;
pub use geometry::{default_page_config, BitmapMetrics, PageConfig, PageFormat, PageGeometry};
pub use paginator::{paginate, plan, PagePlan, PaginationPolicy, Slice};
