//! PDF page sink — assembles slices into a paged PDF with `pdf-writer`.
//!
//! Each slice becomes a Flate-compressed DeviceRGB image XObject placed on its own page.
//! Alpha is composited onto white; resume snapshots are opaque in practice.
//! Millimetre placements are converted to PDF points, with y flipped to the bottom-left
//! origin PDF uses.

use image::RgbaImage;
use pdf_writer::{Content, Filter, Name, Pdf, Rect, Ref};
use tracing::debug;

use crate::export::{ExportError, PageSink};
use crate::pagination::PageConfig;

const MM_TO_PT: f64 = 72.0 / 25.4;
const DEFLATE_LEVEL: u8 = 6;

struct PendingPage {
    content: Content,
    images: Vec<(String, Ref)>,
}

impl PendingPage {
    fn new() -> Self {
        PendingPage {
            content: Content::new(),
            images: Vec::new(),
        }
    }
}

pub struct PdfPageSink {
    pdf: Pdf,
    next_id: i32,
    catalog_id: Ref,
    pages_id: Ref,
    page_width_pt: f32,
    page_height_pt: f32,
    pages: Vec<PendingPage>,
    image_count: usize,
}

impl PdfPageSink {
    pub fn new(page: &PageConfig) -> Self {
        let mut sink = PdfPageSink {
            pdf: Pdf::new(),
            next_id: 1,
            catalog_id: Ref::new(1),
            pages_id: Ref::new(1),
            page_width_pt: (page.page_width_mm * MM_TO_PT) as f32,
            page_height_pt: (page.page_height_mm * MM_TO_PT) as f32,
            pages: Vec::new(),
            image_count: 0,
        };
        sink.catalog_id = sink.alloc();
        sink.pages_id = sink.alloc();
        sink
    }

    fn alloc(&mut self) -> Ref {
        let r = Ref::new(self.next_id);
        self.next_id += 1;
        r
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Writes the page tree and returns the finished PDF bytes.
    pub fn finish(mut self) -> Vec<u8> {
        let pages = std::mem::take(&mut self.pages);
        let mut page_ids = Vec::with_capacity(pages.len());

        for pending in pages {
            let page_id = self.alloc();
            let content_id = self.alloc();
            page_ids.push(page_id);

            let raw = pending.content.finish();
            let compressed =
                miniz_oxide::deflate::compress_to_vec_zlib(raw.as_slice(), DEFLATE_LEVEL);
            self.pdf.stream(content_id, &compressed).filter(Filter::FlateDecode);

            let mut page = self.pdf.page(page_id);
            page.media_box(Rect::new(0.0, 0.0, self.page_width_pt, self.page_height_pt))
                .parent(self.pages_id)
                .contents(content_id);
            if !pending.images.is_empty() {
                let mut resources = page.resources();
                let mut xobjects = resources.x_objects();
                for (name, xobj_ref) in &pending.images {
                    xobjects.pair(Name(name.as_bytes()), *xobj_ref);
                }
            }
        }

        self.pdf.catalog(self.catalog_id).pages(self.pages_id);
        let count = page_ids.len() as i32;
        self.pdf.pages(self.pages_id).kids(page_ids).count(count);

        debug!(pages = count, images = self.image_count, "PDF assembled");
        self.pdf.finish()
    }

    fn current_page(&mut self) -> &mut PendingPage {
        if self.pages.is_empty() {
            self.pages.push(PendingPage::new());
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }
}

impl PageSink for PdfPageSink {
    fn new_page(&mut self) -> Result<(), ExportError> {
        self.pages.push(PendingPage::new());
        Ok(())
    }

    fn draw_image(
        &mut self,
        pixels: &RgbaImage,
        x_mm: f64,
        y_mm: f64,
        width_mm: f64,
        height_mm: f64,
    ) -> Result<(), ExportError> {
        let (w, h) = pixels.dimensions();
        if w == 0 || h == 0 {
            return Err(ExportError::Sink(format!("cannot embed an empty {w}x{h} image")));
        }

        let rgb = flatten_onto_white(pixels);
        let compressed = miniz_oxide::deflate::compress_to_vec_zlib(&rgb, DEFLATE_LEVEL);

        let xobj_ref = self.alloc();
        let mut xobj = self.pdf.image_xobject(xobj_ref, &compressed);
        xobj.filter(Filter::FlateDecode);
        xobj.width(w as i32);
        xobj.height(h as i32);
        xobj.color_space().device_rgb();
        xobj.bits_per_component(8);
        drop(xobj);

        self.image_count += 1;
        let name = format!("Im{}", self.image_count);

        let width_pt = (width_mm * MM_TO_PT) as f32;
        let height_pt = (height_mm * MM_TO_PT) as f32;
        let x_pt = (x_mm * MM_TO_PT) as f32;
        let y_pt = self.page_height_pt - (y_mm * MM_TO_PT) as f32 - height_pt;

        let page = self.current_page();
        page.content.save_state();
        page.content.transform([width_pt, 0.0, 0.0, height_pt, x_pt, y_pt]);
        page.content.x_object(Name(name.as_bytes()));
        page.content.restore_state();
        page.images.push((name, xobj_ref));

        Ok(())
    }
}

/// RGBA → packed RGB, compositing alpha over a white background.
fn flatten_onto_white(pixels: &RgbaImage) -> Vec<u8> {
    pixels
        .pixels()
        .flat_map(|p| {
            let [r, g, b, a] = p.0;
            let blend = |c: u8| -> u8 {
                let a = a as u16;
                ((c as u16 * a + 255 * (255 - a)) / 255) as u8
            };
            [blend(r), blend(g), blend(b)]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::export_bitmap;
    use crate::pagination::{default_page_config, Bitmap, PageFormat, PaginationPolicy};
    use image::Rgba;

    fn contains(haystack: &[u8], needle: &str) -> bool {
        haystack
            .windows(needle.len())
            .any(|w| w == needle.as_bytes())
    }

    #[test]
    fn test_empty_sink_produces_pdf_without_pages() {
        let sink = PdfPageSink::new(&default_page_config(PageFormat::A4));
        assert_eq!(sink.page_count(), 0);
        let bytes = sink.finish();
        assert!(bytes.starts_with(b"%PDF-"));
        assert!(contains(&bytes, "/Count 0"));
    }

    #[test]
    fn test_first_draw_opens_a_page() {
        let mut sink = PdfPageSink::new(&default_page_config(PageFormat::A4));
        let img = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]));
        sink.draw_image(&img, 10.0, 10.0, 190.0, 190.0).unwrap();
        assert_eq!(sink.page_count(), 1);
    }

    #[test]
    fn test_new_page_then_draw_counts_pages() {
        let mut sink = PdfPageSink::new(&default_page_config(PageFormat::Letter));
        let img = RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 255]));
        sink.draw_image(&img, 10.0, 10.0, 195.9, 100.0).unwrap();
        sink.new_page().unwrap();
        sink.draw_image(&img, 10.0, 10.0, 195.9, 50.0).unwrap();
        assert_eq!(sink.page_count(), 2);

        let bytes = sink.finish();
        assert!(contains(&bytes, "/Count 2"));
        assert!(contains(&bytes, "/Im1"));
        assert!(contains(&bytes, "/Im2"));
    }

    #[test]
    fn test_draw_rejects_empty_image() {
        let mut sink = PdfPageSink::new(&default_page_config(PageFormat::A4));
        let err = sink
            .draw_image(&RgbaImage::new(0, 0), 10.0, 10.0, 1.0, 1.0)
            .unwrap_err();
        assert!(matches!(err, ExportError::Sink(_)));
    }

    #[test]
    fn test_export_bitmap_into_pdf_page_count_matches() {
        let page = default_page_config(PageFormat::A4);
        let pixels = RgbaImage::from_pixel(40, 400, Rgba([255, 255, 255, 255]));
        let bitmap = Bitmap::new(pixels, 1.0);
        let mut sink = PdfPageSink::new(&page);
        let policy = PaginationPolicy::default();
        let pages = export_bitmap(&bitmap, &page, &policy, &mut sink).unwrap();
        assert_eq!(sink.page_count(), pages);
        let bytes = sink.finish();
        assert!(contains(&bytes, &format!("/Count {pages}")));
    }

    #[test]
    fn test_flatten_onto_white() {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        img.put_pixel(1, 0, Rgba([12, 34, 56, 255]));
        assert_eq!(flatten_onto_white(&img), vec![255, 255, 255, 12, 34, 56]);
    }
}
