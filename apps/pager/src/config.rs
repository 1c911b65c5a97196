use anyhow::{anyhow, Context, Result};

use crate::export::raster::DEFAULT_MAX_BITMAP_PIXELS;
use crate::pagination::{default_page_config, PageConfig, PageFormat, PaginationPolicy};

/// Application configuration loaded from environment variables.
/// Every variable has a default; malformed values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub page_format: PageFormat,
    pub page_margin_mm: f64,
    pub max_upload_bytes: usize,
    /// Largest decoded or resampled bitmap accepted, in pixels.
    pub max_bitmap_pixels: u64,
    pub last_page_merge_factor: f64,
    pub tail_merge_px: u32,
    pub max_pages: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. `from_env` passes `std::env::var`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let page_format = match lookup("PAGE_FORMAT") {
            Some(raw) => PageFormat::parse(&raw)
                .ok_or_else(|| anyhow!("PAGE_FORMAT must be 'a4' or 'letter', got '{raw}'"))?,
            None => PageFormat::A4,
        };
        let defaults = PaginationPolicy::default();

        let config = Config {
            port: parse_or(&lookup, "PORT", 8080)?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            page_format,
            page_margin_mm: parse_or(&lookup, "PAGE_MARGIN_MM", 10.0)?,
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", 20 * 1024 * 1024)?,
            max_bitmap_pixels: parse_or(&lookup, "MAX_BITMAP_PIXELS", DEFAULT_MAX_BITMAP_PIXELS)?,
            last_page_merge_factor: parse_or(
                &lookup,
                "LAST_PAGE_MERGE_FACTOR",
                defaults.last_page_merge_factor,
            )?,
            tail_merge_px: parse_or(&lookup, "TAIL_MERGE_PX", defaults.tail_merge_px)?,
            max_pages: parse_or(&lookup, "MAX_PAGES", defaults.max_iterations)?,
        };

        config
            .page_config()
            .validate()
            .context("PAGE_FORMAT / PAGE_MARGIN_MM leave no printable area")?;
        config
            .pagination_policy()
            .validate()
            .context("LAST_PAGE_MERGE_FACTOR / MAX_PAGES out of range")?;
        if config.max_bitmap_pixels == 0 {
            return Err(anyhow!("MAX_BITMAP_PIXELS must be positive"));
        }

        Ok(config)
    }

    pub fn page_config(&self) -> PageConfig {
        default_page_config(self.page_format).with_margins_mm(self.page_margin_mm)
    }

    pub fn pagination_policy(&self) -> PaginationPolicy {
        PaginationPolicy {
            last_page_merge_factor: self.last_page_merge_factor,
            tail_merge_px: self.tail_merge_px,
            max_iterations: self.max_pages,
            ..PaginationPolicy::default()
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}
