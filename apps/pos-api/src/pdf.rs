//! # PDF Renderer
//!
//! Turns a [`PrintSheet`] into an A4 PDF under
//! `static/export/pdf/<kind>/<kind>-<number>-<date>.pdf`, or a till receipt
//! (213 × 108 mm) under `static/export/pdf/receipt/receipt-<number>-<date>.pdf`.
//!
//! ## Re-rendering
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sheet ──► JSON ──► SHA-256 ──► equals <file>.sha256 and file exists?  │
//! │                                     │                   │               │
//! │                                    yes                  no              │
//! │                                     │                   │               │
//! │                              keep existing file    draw, write PDF,    │
//! │                                                    write fingerprint   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! printpdf stamps every save with a fresh document id and timestamp, so an
//! unchanged document keeps its bytes only because it is not redrawn.

use std::io::BufWriter;
use std::path::{Path, PathBuf};

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use pharma_core::{DocumentKind, PrintSheet};

const MARGIN: f32 = 15.0;
const LINE: f32 = 5.0;

/// Page size in millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Page {
    width: f32,
    height: f32,
}

const A4: Page = Page {
    width: 210.0,
    height: 297.0,
};

const RECEIPT: Page = Page {
    width: 213.0,
    height: 108.0,
};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("PDF drawing failed: {0}")]
    Draw(String),

    #[error("PDF write failed at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("print sheet could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Where a rendered document lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Path under the static root, as stored in the header row.
    pub path: String,
    /// `false` when the existing file was already current.
    pub rendered: bool,
}

/// Renders print sheets into the static tree.
#[derive(Debug, Clone)]
pub struct PdfRenderer {
    static_dir: PathBuf,
    public_base: String,
}

impl PdfRenderer {
    /// ## Arguments
    /// * `static_dir` - root of the static tree
    /// * `public_base` - `<PUBLIC_HOST>:<PORT>`
    pub fn new(static_dir: impl AsRef<Path>, public_base: impl Into<String>) -> Self {
        PdfRenderer {
            static_dir: static_dir.as_ref().to_path_buf(),
            public_base: public_base.into(),
        }
    }

    /// Public URL of a stored artifact path.
    pub fn public_url(&self, path: &str) -> String {
        format!("{}/static/{}", self.public_base, path.trim_start_matches('/'))
    }

    pub fn absolute(&self, path: &str) -> PathBuf {
        self.static_dir.join(path)
    }

    /// Renders `sheet` unless the file on disk already matches it.
    pub async fn render(&self, kind: DocumentKind, sheet: &PrintSheet) -> Result<Artifact, RenderError> {
        let path = format!(
            "export/pdf/{}/{}",
            kind.as_str(),
            kind.artifact_name(sheet.number, sheet.date)
        );
        self.render_at(path, sheet, A4).await
    }

    /// Renders a till receipt on its own small page.
    pub async fn render_receipt(&self, sheet: &PrintSheet) -> Result<Artifact, RenderError> {
        let path = format!(
            "export/pdf/receipt/receipt-{}-{}.pdf",
            sheet.number,
            sheet.date.format("%Y-%m-%d")
        );
        self.render_at(path, sheet, RECEIPT).await
    }

    async fn render_at(&self, path: String, sheet: &PrintSheet, page: Page) -> Result<Artifact, RenderError> {
        let file = self.absolute(&path);
        let sidecar = file.with_extension("pdf.sha256");
        let fingerprint = fingerprint(sheet)?;

        let stored = tokio::fs::read_to_string(&sidecar).await.ok();
        let exists = tokio::fs::try_exists(&file).await.unwrap_or(false);
        if exists && stored.as_deref().map(str::trim) == Some(fingerprint.as_str()) {
            debug!(path = %path, "Artifact is current");
            return Ok(Artifact { path, rendered: false });
        }

        let bytes = draw(sheet, page)?;

        let io_err = |p: &Path| {
            let path = p.display().to_string();
            move |source| RenderError::Io { path, source }
        };
        if let Some(dir) = file.parent() {
            tokio::fs::create_dir_all(dir).await.map_err(io_err(dir))?;
        }
        tokio::fs::write(&file, &bytes).await.map_err(io_err(&file))?;
        tokio::fs::write(&sidecar, &fingerprint).await.map_err(io_err(&sidecar))?;

        debug!(path = %path, size = bytes.len(), "Artifact rendered");
        Ok(Artifact { path, rendered: true })
    }
}

/// Hex SHA-256 of the sheet's JSON form.
pub fn fingerprint(sheet: &PrintSheet) -> Result<String, RenderError> {
    let json = serde_json::to_vec(sheet)?;
    let digest = Sha256::digest(&json);
    Ok(digest.iter().map(|b| format!("{b:02x}")).collect())
}

// =============================================================================
// Drawing
// =============================================================================

/// A cursor over pages; starts a new page when the bottom margin is reached.
struct Pen {
    page: Page,
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    y: f32,
}

impl Pen {
    fn line(&mut self, text: &str, size: f32, x: f32, bold: bool) {
        self.break_if_needed();
        let font = if bold { &self.bold } else { &self.regular };
        self.layer.use_text(text, size, Mm(x), Mm(self.y), font);
    }

    fn cells(&mut self, cells: &[String], widths: &[f32], bold: bool) {
        self.break_if_needed();
        let font = if bold { &self.bold } else { &self.regular };
        let mut x = MARGIN;
        for (cell, width) in cells.iter().zip(widths) {
            self.layer.use_text(cell.as_str(), 9.0, Mm(x), Mm(self.y), font);
            x += width;
        }
        self.advance(LINE);
    }

    fn advance(&mut self, by: f32) {
        self.y -= by;
    }

    fn break_if_needed(&mut self) {
        if self.y < MARGIN {
            let (page, layer) =
                self.doc
                    .add_page(Mm(self.page.width), Mm(self.page.height), "Layer 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = self.page.height - MARGIN;
        }
    }
}

fn draw(sheet: &PrintSheet, size: Page) -> Result<Vec<u8>, RenderError> {
    let title = format!("{} #{}", sheet.title, sheet.number);
    let (doc, page, layer) = PdfDocument::new(&title, Mm(size.width), Mm(size.height), "Layer 1");
    let layer = doc.get_page(page).get_layer(layer);
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| RenderError::Draw(format!("font: {e}")))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| RenderError::Draw(format!("font: {e}")))?;

    let mut pen = Pen {
        page: size,
        doc,
        layer,
        regular,
        bold,
        y: size.height - MARGIN,
    };

    // Letterhead
    let lh = &sheet.letterhead;
    pen.line(&lh.company_name, 14.0, MARGIN, true);
    pen.advance(6.0);
    for text in [&lh.slogan, &lh.address] {
        if !text.is_empty() {
            pen.line(text, 9.0, MARGIN, false);
            pen.advance(LINE);
        }
    }
    let contact = [("Tel", &lh.phone_number), ("WA", &lh.whatsapp_number)]
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| format!("{k}: {v}"))
        .collect::<Vec<_>>()
        .join("  ");
    if !contact.is_empty() {
        pen.line(&contact, 9.0, MARGIN, false);
        pen.advance(LINE);
    }
    if !lh.pharmacist.is_empty() {
        let pharmacist = format!("Pharmacist: {} ({})", lh.pharmacist, lh.pharmacist_license_number);
        pen.line(&pharmacist, 9.0, MARGIN, false);
        pen.advance(LINE);
    }
    pen.advance(4.0);

    // Title and parties
    pen.line(&sheet.title.to_uppercase(), 12.0, MARGIN, true);
    pen.advance(6.0);
    pen.line(&format!("No: {}", sheet.number), 9.0, MARGIN, false);
    pen.line(&format!("Date: {}", sheet.date.format("%Y-%m-%d")), 9.0, 120.0, false);
    pen.advance(LINE);
    for (label, value) in &sheet.parties {
        pen.line(&format!("{label}: {value}"), 9.0, MARGIN, false);
        pen.advance(LINE);
    }
    pen.advance(3.0);

    // Table
    if !sheet.columns.is_empty() {
        let widths = column_widths(sheet.columns.len(), size.width);
        pen.cells(&sheet.columns, &widths, true);
        for row in &sheet.rows {
            pen.cells(row, &widths, false);
        }
        pen.advance(3.0);
    }

    // Totals
    for (label, value) in &sheet.totals {
        pen.line(label, 9.0, 120.0, true);
        pen.line(value, 9.0, 160.0, false);
        pen.advance(LINE);
    }

    if !sheet.notes.is_empty() {
        pen.advance(3.0);
        pen.line(&sheet.notes, 9.0, MARGIN, false);
    }

    let mut buf = BufWriter::new(Vec::new());
    pen.doc
        .save(&mut buf)
        .map_err(|e| RenderError::Draw(format!("save: {e}")))?;
    buf.into_inner()
        .map_err(|e| RenderError::Draw(format!("buffer: {e}")))
}

/// First column (names) gets the remaining width.
fn column_widths(count: usize, page_width: f32) -> Vec<f32> {
    if count == 0 {
        return Vec::new();
    }
    let usable = page_width - 2.0 * MARGIN;
    let narrow = 22.0_f32.min(usable / count as f32);
    let mut widths = vec![narrow; count];
    widths[0] = usable - narrow * (count as f32 - 1.0);
    widths
}

// =============================================================================
// Unit Tests
// =============================================================================
