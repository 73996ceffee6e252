//! PDF rasterisation: render each page to a `DynamicImage` via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which is synchronous and
//! CPU-heavy. Rendering runs on Tokio's blocking pool so worker threads stay
//! free to drive the in-flight extraction request.
//!
//! ## Why a channel?
//!
//! An exam bundle can run to hundreds of pages and a page at scale 2.0 is
//! several megabytes of pixels. Pages are sent one at a time over a bounded
//! channel, so at most one rendered page waits while the previous one is
//! being extracted. Dropping the receiver stops the renderer after the page
//! it is working on.
//!
//! ## Binding
//!
//! The library is bound once per process. `PDFIUM_LIB_PATH` may name the
//! library file itself or the directory containing it; otherwise the system
//! library is used.

use crate::error::ExtractionError;
use image::DynamicImage;
use once_cell::sync::OnceCell;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, info};

// Needs pdfium-render's `sync` feature for `Pdfium: Send + Sync`.
static PDFIUM: OnceCell<Pdfium> = OnceCell::new();

/// The process-wide pdfium instance, binding it on first use.
pub fn pdfium() -> Result<&'static Pdfium, ExtractionError> {
    PDFIUM.get_or_try_init(|| {
        let bindings = match std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from) {
            Some(path) if path.is_file() => Pdfium::bind_to_library(&path),
            Some(dir) => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir))
            }
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| ExtractionError::PdfiumBindingFailed(format!("{e:?}")))?;
        debug!("pdfium bound");
        Ok(Pdfium::new(bindings))
    })
}

/// Page rasterisation parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    /// Multiplier applied to the page's natural size (72 points per inch).
    pub scale: f32,
    /// Cap on either output dimension, in pixels.
    pub max_pixels: u32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            scale: 2.0,
            max_pixels: 4000,
        }
    }
}

impl RenderOptions {
    fn pdfium_config(&self) -> PdfRenderConfig {
        let max = self.max_pixels.min(i32::MAX as u32) as i32;
        PdfRenderConfig::new()
            .scale_page_by_factor(self.scale)
            .set_maximum_width(max)
            .set_maximum_height(max)
    }
}

/// One rasterised page.
pub struct RenderedPage {
    /// 1-indexed.
    pub page_num: usize,
    pub image: DynamicImage,
}

fn open<'a>(pdfium: &'a Pdfium, path: &Path) -> Result<PdfDocument<'a>, ExtractionError> {
    pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| ExtractionError::CorruptPdf {
            path: path.to_path_buf(),
            detail: format!("{e:?}"),
        })
}

/// Number of pages in a PDF, without rendering anything.
pub async fn page_count(pdf_path: &Path) -> Result<usize, ExtractionError> {
    let path = pdf_path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let document = open(pdfium()?, &path)?;
        Ok(document.pages().len() as usize)
    })
    .await
    .map_err(|e| ExtractionError::Internal(format!("Page count task panicked: {e}")))?
}

/// Start rendering every page of `pdf_path` in order.
///
/// Each page arrives as `Ok(RenderedPage)`. A failure to open the document
/// or render a page is sent as `Err` and ends the stream.
pub fn render_pages(
    pdf_path: &Path,
    options: RenderOptions,
) -> mpsc::Receiver<Result<RenderedPage, ExtractionError>> {
    let (tx, rx) = mpsc::channel(1);
    let path = pdf_path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        if let Err(e) = render_pages_blocking(&path, options, &tx) {
            let _ = tx.blocking_send(Err(e));
        }
    });
    rx
}

fn render_pages_blocking(
    pdf_path: &Path,
    options: RenderOptions,
    tx: &mpsc::Sender<Result<RenderedPage, ExtractionError>>,
) -> Result<(), ExtractionError> {
    let document = open(pdfium()?, pdf_path)?;
    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages from {}", total_pages, pdf_path.display());

    let render_config = options.pdfium_config();
    for idx in 0..total_pages {
        let page_num = idx + 1;
        let page = pages
            .get(idx as u16)
            .map_err(|e| ExtractionError::RasterisationFailed {
                page: page_num,
                detail: format!("{e:?}"),
            })?;
        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            ExtractionError::RasterisationFailed {
                page: page_num,
                detail: format!("{e:?}"),
            }
        })?;
        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            page_num,
            image.width(),
            image.height()
        );
        if tx.blocking_send(Ok(RenderedPage { page_num, image })).is_err() {
            debug!("Receiver dropped; stopping render after page {page_num}");
            break;
        }
    }
    Ok(())
}
