//! Axum route handlers for the Export API.

use axum::{
    extract::{Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::export::{export_bitmap, ExportError, PdfPageSink};
use crate::pagination::geometry::preview_height_mm;
use crate::pagination::{
    default_page_config, plan, BitmapMetrics, PageConfig, PageFormat, PagePlan, PaginationPolicy,
};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PlanRequest {
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub scale: f64,
    /// Overrides the service's configured page.
    #[serde(default)]
    pub page: Option<PageConfig>,
    #[serde(default)]
    pub policy: Option<PaginationPolicy>,
}

#[derive(Debug, Serialize)]
pub struct PlanResponse {
    pub page_count: usize,
    /// Height of the whole document at the width-locked scale.
    pub preview_height_mm: f64,
    pub plan: PagePlan,
}

#[derive(Debug, Deserialize)]
pub struct PdfExportQuery {
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// Logical width to resample the snapshot to before paginating.
    pub target_width_px: Option<u32>,
    /// Paper size; margins stay as configured.
    pub format: Option<PageFormat>,
}

fn default_scale() -> f64 {
    1.0
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/export/plan
///
/// Returns the page slices for a bitmap of the given dimensions without any pixel data.
pub async fn handle_plan(
    State(state): State<AppState>,
    Json(request): Json<PlanRequest>,
) -> Result<Json<PlanResponse>, AppError> {
    let metrics = BitmapMetrics {
        pixel_width: request.pixel_width,
        pixel_height: request.pixel_height,
        scale: request.scale,
    };
    let page = request.page.unwrap_or_else(|| state.page_config.clone());
    let policy = match request.policy {
        // Client policies may tune thresholds but never raise the configured page cap.
        Some(policy) => {
            policy.validate_within(state.policy.max_iterations)?;
            policy
        }
        None => state.policy.clone(),
    };

    let plan = plan(&metrics, &page, &policy)?;
    let preview_height_mm = preview_height_mm(&metrics, &page)?;

    Ok(Json(PlanResponse {
        page_count: plan.page_count(),
        preview_height_mm,
        plan,
    }))
}

/// POST /api/v1/export/pdf
///
/// Body: PNG or JPEG snapshot of the rendered resume. Returns `application/pdf`.
pub async fn handle_export_pdf(
    State(state): State<AppState>,
    Query(query): Query<PdfExportQuery>,
    body: Bytes,
) -> Result<Response, AppError> {
    if body.is_empty() {
        return Err(AppError::Validation("request body must contain an image".to_string()));
    }

    let export_id = Uuid::new_v4();
    let page = match query.format {
        Some(format) => {
            let base = &state.page_config;
            PageConfig {
                margin_top_mm: base.margin_top_mm,
                margin_bottom_mm: base.margin_bottom_mm,
                margin_left_mm: base.margin_left_mm,
                margin_right_mm: base.margin_right_mm,
                ..default_page_config(format)
            }
        }
        None => state.page_config.clone(),
    };
    let policy = state.policy.clone();

    let bitmap = state
        .rasterizer
        .rasterize(body, query.target_width_px, None, query.scale)
        .await?;

    // PDF assembly compresses every slice — keep it off the async executor.
    let (pdf_bytes, page_count) = tokio::task::spawn_blocking(move || {
        let mut sink = PdfPageSink::new(&page);
        let pages = export_bitmap(&bitmap, &page, &policy, &mut sink)?;
        Ok::<_, ExportError>((sink.finish(), pages))
    })
    .await
    .map_err(ExportError::from)??;

    info!(
        %export_id,
        pages = page_count,
        bytes = pdf_bytes.len(),
        "PDF export complete"
    );

    let disposition = format!("attachment; filename=\"resume-{export_id}.pdf\"");
    let mut response = pdf_bytes.into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/pdf"));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition).map_err(|e| AppError::Internal(e.into()))?,
    );
    headers.insert("x-page-count", HeaderValue::from(page_count));
    Ok(response)
}
