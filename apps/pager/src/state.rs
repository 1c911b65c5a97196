use std::sync::Arc;

use crate::config::Config;
use crate::export::Rasterizer;
use crate::pagination::{PageConfig, PaginationPolicy};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Pluggable snapshot decoder. Default: SnapshotRasterizer.
    pub rasterizer: Arc<dyn Rasterizer>,
    /// Page used when a request does not bring its own.
    pub page_config: PageConfig,
    pub policy: PaginationPolicy,
}
