//! Paginator — splits a tall bitmap into one vertical slice per physical page.
//!
//! # Last-page merge policy
//! A strict "one capacity per page" split regularly leaves a final page carrying a few rows.
//! Instead, once the remaining rows fit within `capacity × last_page_merge_factor`, they all go
//! onto one final page. If that final slice would display taller than
//! `available_height × overflow_tolerance`, only its placed height is clamped to
//! `available_height × clamp_factor`; its pixel rows are never dropped.
//!
//! # Tail-merge safeguard
//! After each regular page, a remainder shorter than `tail_merge_px` is emitted immediately
//! as its own page instead of going through another loop iteration.
//!
//! Thresholds are empirical and live in `PaginationPolicy` so they can be tuned.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::pagination::error::PaginationError;
use crate::pagination::geometry::{BitmapMetrics, PageConfig, PageGeometry};

// ────────────────────────────────────────────────────────────────────────────
// Policy
// ────────────────────────────────────────────────────────────────────────────

/// Tunable thresholds for the paginator. `Default` holds the production values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationPolicy {
    /// Remaining rows `<= capacity × factor` are merged into one final slice (inclusive).
    pub last_page_merge_factor: f64,
    /// A final slice displaying taller than `available_height × tolerance` gets clamped.
    pub overflow_tolerance: f64,
    /// Clamped final slices are placed at `available_height × clamp_factor`.
    pub clamp_factor: f64,
    /// Remainders strictly shorter than this are emitted straight away.
    pub tail_merge_px: u32,
    /// Hard cap on loop iterations; tripping it is a bug, not a truncation.
    pub max_iterations: u32,
}

impl Default for PaginationPolicy {
    fn default() -> Self {
        PaginationPolicy {
            last_page_merge_factor: 1.2,
            overflow_tolerance: 1.5,
            clamp_factor: 1.2,
            tail_merge_px: 50,
            max_iterations: 100,
        }
    }
}

/// Upper bound accepted for `max_iterations` when no tighter ceiling is configured.
pub const MAX_ITERATIONS_CEILING: u32 = 10_000;

impl PaginationPolicy {
    /// `validate_within` against `MAX_ITERATIONS_CEILING`.
    pub fn validate(&self) -> Result<(), PaginationError> {
        self.validate_within(MAX_ITERATIONS_CEILING)
    }

    /// Rejects factors that are non-finite or below their floor, and an iteration cap
    /// outside `1..=max_iterations_ceiling`.
    pub fn validate_within(&self, max_iterations_ceiling: u32) -> Result<(), PaginationError> {
        let at_least_one = [
            ("last_page_merge_factor", self.last_page_merge_factor),
            ("overflow_tolerance", self.overflow_tolerance),
        ];
        for (name, value) in at_least_one {
            if !value.is_finite() || value < 1.0 {
                return Err(PaginationError::Configuration(format!(
                    "{name} must be a finite number of at least 1.0, got {value}"
                )));
            }
        }
        if !self.clamp_factor.is_finite() || self.clamp_factor <= 0.0 {
            return Err(PaginationError::Configuration(format!(
                "clamp_factor must be a positive finite number, got {}",
                self.clamp_factor
            )));
        }

        let ceiling = max_iterations_ceiling.min(MAX_ITERATIONS_CEILING);
        if self.max_iterations == 0 || self.max_iterations > ceiling {
            return Err(PaginationError::Configuration(format!(
                "max_iterations must be between 1 and {ceiling}, got {}",
                self.max_iterations
            )));
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Output types
// ────────────────────────────────────────────────────────────────────────────

/// One contiguous band of source rows assigned to one output page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slice {
    /// Zero-based page number; equal to the slice's position in the sequence.
    pub page_index: u32,
    /// First source row, inclusive, in device pixels.
    pub source_y_px: u32,
    pub source_height_px: u32,
    /// Height the slice occupies on its page.
    pub display_height_mm: f64,
    pub is_last_slice: bool,
    /// True when the placed height was clamped below the slice's natural height.
    pub display_compressed: bool,
}

impl Slice {
    /// One past the last source row covered by this slice.
    pub fn source_end_px(&self) -> u32 {
        self.source_y_px + self.source_height_px
    }
}

/// Slices plus the geometry they were computed against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PagePlan {
    pub geometry: PageGeometry,
    pub pixel_height: u32,
    pub slices: Vec<Slice>,
}

impl PagePlan {
    pub fn page_count(&self) -> usize {
        self.slices.len()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Public entry points
// ────────────────────────────────────────────────────────────────────────────

/// Paginates a bitmap of the given dimensions onto pages of `page`.
///
/// Pure: identical inputs always yield identical slices.
pub fn paginate(
    bitmap: &BitmapMetrics,
    page: &PageConfig,
    policy: &PaginationPolicy,
) -> Result<Vec<Slice>, PaginationError> {
    plan(bitmap, page, policy).map(|plan| plan.slices)
}

/// Like `paginate`, but also returns the computed `PageGeometry`.
pub fn plan(
    bitmap: &BitmapMetrics,
    page: &PageConfig,
    policy: &PaginationPolicy,
) -> Result<PagePlan, PaginationError> {
    policy.validate()?;
    let geometry = PageGeometry::compute(bitmap, page)?;
    let slices = slice_rows(bitmap.pixel_height, &geometry, policy)?;
    Ok(PagePlan {
        geometry,
        pixel_height: bitmap.pixel_height,
        slices,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Slicing loop
// ────────────────────────────────────────────────────────────────────────────

/// Runs the slicing loop over `[0, pixel_height)` against an already computed geometry.
pub(crate) fn slice_rows(
    pixel_height: u32,
    geometry: &PageGeometry,
    policy: &PaginationPolicy,
) -> Result<Vec<Slice>, PaginationError> {
    if pixel_height == 0 {
        return Ok(Vec::new());
    }

    let capacity = geometry.capacity_px;
    if capacity == 0 {
        return Err(PaginationError::Configuration(format!(
            "page capacity is 0 rows (available height {:.2}mm, width scale {:.4})",
            geometry.available_height_mm, geometry.width_scale_factor
        )));
    }

    let merge_threshold = capacity as f64 * policy.last_page_merge_factor;
    let overflow_limit_mm = geometry.available_height_mm * policy.overflow_tolerance;

    let mut slices: Vec<Slice> = Vec::new();
    let mut source_y = 0u32;
    let mut iterations = 0u32;

    while source_y < pixel_height {
        if iterations >= policy.max_iterations {
            return Err(PaginationError::InternalInvariant {
                consumed_px: source_y,
                pixel_height,
                iterations,
            });
        }
        iterations += 1;

        let remaining = pixel_height - source_y;
        let is_last_page = remaining as f64 <= merge_threshold;
        let source_height = if is_last_page { remaining } else { capacity };

        let mut display_height_mm = geometry.display_height_mm(source_height);
        let mut display_compressed = false;
        if is_last_page && display_height_mm > overflow_limit_mm {
            let clamped = geometry.available_height_mm * policy.clamp_factor;
            warn!(
                natural_mm = display_height_mm,
                clamped_mm = clamped,
                rows = source_height,
                "Final page taller than overflow tolerance, compressing placed height"
            );
            display_height_mm = clamped;
            display_compressed = true;
        }

        push_slice(
            &mut slices,
            source_y,
            source_height,
            display_height_mm,
            is_last_page,
            display_compressed,
        );
        source_y += source_height;

        let tail = pixel_height - source_y;
        if tail > 0 && tail < policy.tail_merge_px {
            if let Some(previous) = slices.last_mut() {
                previous.is_last_slice = false;
            }
            push_slice(
                &mut slices,
                source_y,
                tail,
                geometry.display_height_mm(tail),
                true,
                false,
            );
            source_y += tail;
        }
    }

    debug!(
        pages = slices.len(),
        pixel_height,
        capacity_px = capacity,
        "Pagination complete"
    );

    Ok(slices)
}

fn push_slice(
    slices: &mut Vec<Slice>,
    source_y_px: u32,
    source_height_px: u32,
    display_height_mm: f64,
    is_last_slice: bool,
    display_compressed: bool,
) {
    let page_index = slices.len() as u32;
    debug!(
        page_index,
        source_y_px, source_height_px, display_height_mm, is_last_slice, "Slice"
    );
    slices.push(Slice {
        page_index,
        source_y_px,
        source_height_px,
        display_height_mm,
        is_last_slice,
        display_compressed,
    });
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
