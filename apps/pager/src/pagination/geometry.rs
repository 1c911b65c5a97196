//! Geometry model — converts between device pixels and physical page millimetres.
//!
//! All conversions go through logical CSS pixels at 96 DPI. A `Bitmap` is captured at
//! `scale` device pixels per logical pixel, so every device-pixel length is divided by
//! `scale` before `PX_TO_MM` is applied.
//!
//! The image is width-locked: one uniform factor maps the bitmap's logical width onto the
//! page's available width, and heights are scaled by the same factor.

use serde::{Deserialize, Serialize};

use crate::pagination::error::PaginationError;

/// Millimetres per logical CSS pixel (25.4 mm per inch / 96 px per inch).
pub const PX_TO_MM: f64 = 25.4 / 96.0;

// ────────────────────────────────────────────────────────────────────────────
// Page configuration
// ────────────────────────────────────────────────────────────────────────────

/// Supported physical paper sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageFormat {
    /// ISO 216 A4, 210 × 297 mm.
    A4,
    /// US Letter, 8.5" × 11".
    Letter,
}

impl PageFormat {
    /// Parses a format name as it appears in env vars and query strings.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "a4" => Some(PageFormat::A4),
            "letter" | "us-letter" => Some(PageFormat::Letter),
            _ => None,
        }
    }

    /// `(width_mm, height_mm)` in portrait orientation.
    pub fn dimensions_mm(self) -> (f64, f64) {
        match self {
            PageFormat::A4 => (210.0, 297.0),
            PageFormat::Letter => (215.9, 279.4),
        }
    }
}

/// Margin applied on every side by `default_page_config`.
pub const DEFAULT_MARGIN_MM: f64 = 10.0;

/// Physical output page size and margins, all in millimetres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageConfig {
    pub page_width_mm: f64,
    pub page_height_mm: f64,
    pub margin_top_mm: f64,
    pub margin_bottom_mm: f64,
    pub margin_left_mm: f64,
    pub margin_right_mm: f64,
}

/// Returns the page config for `format` with `DEFAULT_MARGIN_MM` on all sides.
pub fn default_page_config(format: PageFormat) -> PageConfig {
    let (page_width_mm, page_height_mm) = format.dimensions_mm();
    PageConfig {
        page_width_mm,
        page_height_mm,
        margin_top_mm: DEFAULT_MARGIN_MM,
        margin_bottom_mm: DEFAULT_MARGIN_MM,
        margin_left_mm: DEFAULT_MARGIN_MM,
        margin_right_mm: DEFAULT_MARGIN_MM,
    }
}

impl PageConfig {
    /// Same paper size with a uniform margin on every side.
    pub fn with_margins_mm(mut self, margin_mm: f64) -> Self {
        self.margin_top_mm = margin_mm;
        self.margin_bottom_mm = margin_mm;
        self.margin_left_mm = margin_mm;
        self.margin_right_mm = margin_mm;
        self
    }

    pub fn available_width_mm(&self) -> f64 {
        self.page_width_mm - self.margin_left_mm - self.margin_right_mm
    }

    pub fn available_height_mm(&self) -> f64 {
        self.page_height_mm - self.margin_top_mm - self.margin_bottom_mm
    }

    /// Rejects non-finite values, negative margins and non-positive printable areas.
    pub fn validate(&self) -> Result<(), PaginationError> {
        let fields = [
            ("page_width_mm", self.page_width_mm),
            ("page_height_mm", self.page_height_mm),
            ("margin_top_mm", self.margin_top_mm),
            ("margin_bottom_mm", self.margin_bottom_mm),
            ("margin_left_mm", self.margin_left_mm),
            ("margin_right_mm", self.margin_right_mm),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(PaginationError::Configuration(format!(
                    "{name} must be finite, got {value}"
                )));
            }
        }
        for (name, value) in &fields[2..] {
            if *value < 0.0 {
                return Err(PaginationError::Configuration(format!(
                    "{name} must not be negative, got {value}"
                )));
            }
        }

        let width = self.available_width_mm();
        if width <= 0.0 {
            return Err(PaginationError::Configuration(format!(
                "available page width must be positive, got {width:.2}mm"
            )));
        }
        let height = self.available_height_mm();
        if height <= 0.0 {
            return Err(PaginationError::Configuration(format!(
                "available page height must be positive, got {height:.2}mm"
            )));
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Bitmap dimensions
// ────────────────────────────────────────────────────────────────────────────

/// The three numbers the geometry model and paginator read from a bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BitmapMetrics {
    /// Width in device pixels.
    pub pixel_width: u32,
    /// Height in device pixels; always the full content height.
    pub pixel_height: u32,
    /// Device pixels per logical CSS pixel.
    pub scale: f64,
}

impl BitmapMetrics {
    pub fn validate(&self) -> Result<(), PaginationError> {
        if self.pixel_width == 0 {
            return Err(PaginationError::Configuration(
                "bitmap pixel_width must be positive".to_string(),
            ));
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(PaginationError::Configuration(format!(
                "bitmap scale must be a positive finite number, got {}",
                self.scale
            )));
        }
        Ok(())
    }

    /// Width in logical CSS pixels.
    pub fn logical_width(&self) -> f64 {
        self.pixel_width as f64 / self.scale
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Conversions
// ────────────────────────────────────────────────────────────────────────────

/// Uniform factor that maps the bitmap's physical width onto the available page width.
pub fn width_scale_factor(bitmap: &BitmapMetrics, page: &PageConfig) -> f64 {
    page.available_width_mm() / (bitmap.logical_width() * PX_TO_MM)
}

/// Physical height of `source_height_px` device rows once width-locked onto the page.
pub fn display_height_mm(
    source_height_px: u32,
    bitmap: &BitmapMetrics,
    width_scale_factor: f64,
) -> f64 {
    (source_height_px as f64 / bitmap.scale) * PX_TO_MM * width_scale_factor
}

/// Device rows that exactly fill one page's available height.
///
/// Floors, so a full-capacity slice never displays taller than the available height.
/// Returns 0 for degenerate inputs; the paginator treats that as a configuration error.
pub fn capacity_px(page: &PageConfig, bitmap: &BitmapMetrics, width_scale_factor: f64) -> u32 {
    let rows = page.available_height_mm() / width_scale_factor / PX_TO_MM * bitmap.scale;
    if rows.is_finite() && rows > 0.0 {
        // saturating float → int cast
        rows.floor() as u32
    } else {
        0
    }
}

/// Height of the whole document at the width-locked scale.
pub fn preview_height_mm(
    bitmap: &BitmapMetrics,
    page: &PageConfig,
) -> Result<f64, PaginationError> {
    page.validate()?;
    bitmap.validate()?;
    let wsf = width_scale_factor(bitmap, page);
    Ok(display_height_mm(bitmap.pixel_height, bitmap, wsf))
}

// ────────────────────────────────────────────────────────────────────────────
// Computed page geometry
// ────────────────────────────────────────────────────────────────────────────

/// Everything the paginator and page sinks need, computed once per document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width_scale_factor: f64,
    pub capacity_px: u32,
    pub scale: f64,
    pub available_width_mm: f64,
    pub available_height_mm: f64,
    /// Top-left placement of every slice on its page.
    pub origin_x_mm: f64,
    pub origin_y_mm: f64,
}

impl PageGeometry {
    /// Validates inputs and derives the width-locked geometry.
    ///
    /// A zero capacity is NOT rejected here; see `paginator::slice_rows`.
    pub fn compute(bitmap: &BitmapMetrics, page: &PageConfig) -> Result<Self, PaginationError> {
        page.validate()?;
        bitmap.validate()?;

        let wsf = width_scale_factor(bitmap, page);
        if !wsf.is_finite() || wsf <= 0.0 {
            return Err(PaginationError::Configuration(format!(
                "width scale factor must be positive, got {wsf}"
            )));
        }

        Ok(PageGeometry {
            width_scale_factor: wsf,
            capacity_px: capacity_px(page, bitmap, wsf),
            scale: bitmap.scale,
            available_width_mm: page.available_width_mm(),
            available_height_mm: page.available_height_mm(),
            origin_x_mm: page.margin_left_mm,
            origin_y_mm: page.margin_top_mm,
        })
    }

    /// `display_height_mm` using the values captured in this geometry.
    pub fn display_height_mm(&self, source_height_px: u32) -> f64 {
        (source_height_px as f64 / self.scale) * PX_TO_MM * self.width_scale_factor
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// 274 × 147.1 mm page with 10 mm margins → 254 × 127.1 mm available.
    /// 254 mm is exactly 960 logical pixels.
    fn make_square_page() -> PageConfig {
        PageConfig {
            page_width_mm: 274.0,
            page_height_mm: 147.1,
            margin_top_mm: 10.0,
            margin_bottom_mm: 10.0,
            margin_left_mm: 10.0,
            margin_right_mm: 10.0,
        }
    }

    fn make_bitmap(pixel_width: u32, pixel_height: u32, scale: f64) -> BitmapMetrics {
        BitmapMetrics {
            pixel_width,
            pixel_height,
            scale,
        }
    }

    #[test]
    fn test_px_to_mm_is_96_dpi() {
        assert!((PX_TO_MM * 96.0 - 25.4).abs() < 1e-12);
    }

    #[test]
    fn test_a4_default_available_area() {
        let page = default_page_config(PageFormat::A4);
        assert!((page.available_width_mm() - 190.0).abs() < 1e-9);
        assert!((page.available_height_mm() - 277.0).abs() < 1e-9);
        assert!(page.validate().is_ok());
    }

    #[test]
    fn test_with_margins_overrides_all_sides() {
        let page = default_page_config(PageFormat::Letter).with_margins_mm(0.0);
        assert!((page.available_width_mm() - 215.9).abs() < 1e-9);
        assert!((page.available_height_mm() - 279.4).abs() < 1e-9);
    }

    #[test]
    fn test_page_format_parse() {
        assert_eq!(PageFormat::parse("A4"), Some(PageFormat::A4));
        assert_eq!(PageFormat::parse(" letter "), Some(PageFormat::Letter));
        assert_eq!(PageFormat::parse("legal"), None);
    }

    #[test]
    fn test_margins_consuming_page_is_configuration_error() {
        let page = default_page_config(PageFormat::A4).with_margins_mm(105.0);
        let err = page.validate().unwrap_err();
        assert!(matches!(err, PaginationError::Configuration(_)));
    }

    #[test]
    fn test_negative_margin_rejected() {
        let mut page = default_page_config(PageFormat::A4);
        page.margin_left_mm = -1.0;
        assert!(page.validate().is_err());
    }

    #[test]
    fn test_nan_page_height_rejected() {
        let mut page = default_page_config(PageFormat::A4);
        page.page_height_mm = f64::NAN;
        assert!(page.validate().is_err());
    }

    #[test]
    fn test_width_scale_factor_exact_fit_is_one() {
        let page = make_square_page();
        // 1920 device px at 2x = 960 logical px = 254 mm
        let bitmap = make_bitmap(1920, 4000, 2.0);
        let wsf = width_scale_factor(&bitmap, &page);
        assert!((wsf - 1.0).abs() < 1e-9, "expected 1.0, got {wsf}");
    }

    #[test]
    fn test_width_scale_factor_independent_of_scale_for_same_logical_width() {
        let page = default_page_config(PageFormat::A4);
        let one_x = width_scale_factor(&make_bitmap(800, 100, 1.0), &page);
        let two_x = width_scale_factor(&make_bitmap(1600, 100, 2.0), &page);
        assert!((one_x - two_x).abs() < 1e-12);
    }

    #[test]
    fn test_display_height_divides_by_scale() {
        // 192 device rows at 2x = 96 logical px = 25.4 mm at wsf 1.0
        let bitmap = make_bitmap(1920, 192, 2.0);
        let h = display_height_mm(192, &bitmap, 1.0);
        assert!((h - 25.4).abs() < 1e-9, "expected 25.4mm, got {h}");
    }

    #[test]
    fn test_capacity_fills_available_height() {
        let page = make_square_page();
        let bitmap = make_bitmap(1920, 4000, 2.0);
        let wsf = width_scale_factor(&bitmap, &page);
        let cap = capacity_px(&page, &bitmap, wsf);
        // 127.1 mm / 0.26458 mm * 2 ≈ 960.75
        assert_eq!(cap, 960);
        assert!(display_height_mm(cap, &bitmap, wsf) <= page.available_height_mm());
        assert!(display_height_mm(cap + 1, &bitmap, wsf) > page.available_height_mm());
    }

    #[test]
    fn test_capacity_on_a4_never_overflows_page() {
        let page = default_page_config(PageFormat::A4);
        let bitmap = make_bitmap(1588, 6000, 2.0);
        let wsf = width_scale_factor(&bitmap, &page);
        let cap = capacity_px(&page, &bitmap, wsf);
        assert!(cap > 0);
        assert!(display_height_mm(cap, &bitmap, wsf) <= page.available_height_mm() + 1e-9);
        assert!(display_height_mm(cap + 1, &bitmap, wsf) > page.available_height_mm());
    }

    #[test]
    fn test_capacity_zero_for_degenerate_factor() {
        let page = make_square_page();
        let bitmap = make_bitmap(1920, 100, 2.0);
        assert_eq!(capacity_px(&page, &bitmap, f64::INFINITY), 0);
    }

    #[test]
    fn test_geometry_rejects_zero_width_bitmap() {
        let page = make_square_page();
        let err = PageGeometry::compute(&make_bitmap(0, 100, 1.0), &page).unwrap_err();
        assert!(matches!(err, PaginationError::Configuration(_)));
    }

    #[test]
    fn test_geometry_rejects_zero_scale() {
        let page = make_square_page();
        assert!(PageGeometry::compute(&make_bitmap(100, 100, 0.0), &page).is_err());
    }

    #[test]
    fn test_geometry_origin_is_top_left_margin() {
        let mut page = make_square_page();
        page.margin_left_mm = 12.0;
        page.margin_top_mm = 7.0;
        let geometry = PageGeometry::compute(&make_bitmap(1920, 100, 2.0), &page).unwrap();
        assert_eq!(geometry.origin_x_mm, 12.0);
        assert_eq!(geometry.origin_y_mm, 7.0);
    }

    #[test]
    fn test_preview_height_covers_whole_document() {
        let page = make_square_page();
        // 3840 rows at 2x = 1920 logical px = 508 mm
        let h = preview_height_mm(&make_bitmap(1920, 3840, 2.0), &page).unwrap();
        assert!((h - 508.0).abs() < 1e-6, "expected 508mm, got {h}");
    }
}
