use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::error::ChapexError;
use crate::extraction::bbox_layout::parse_bbox_layout;
use crate::extraction::fonts::{assign_fonts, parse_font_runs, FontRun};
use crate::extraction::outline::parse_outline_xml;
use crate::extraction::svg::parse_svg_drawings;
use crate::extraction::{GeometryProvider, PageGeometry, PdfDocument, TocEntry};
use crate::geometry::BBox;

/// Geometry backend built on the poppler command-line tools.
///
/// `pdfinfo` for the page count, `pdftohtml -xml` for the outline and line
/// fonts, `pdftotext -bbox-layout` for text blocks, `pdftocairo -svg` for vector
/// drawings and `pdftoppm` for region rendering.
pub struct PopplerProvider;

impl PopplerProvider {
    pub fn new() -> Self {
        PopplerProvider
    }

    /// Check if the poppler tools are available on the system.
    pub fn is_available() -> bool {
        Command::new("pdfinfo")
            .arg("-v")
            .output()
            .map(|o| o.status.success() || !o.stderr.is_empty())
            .unwrap_or(false)
    }
}

impl Default for PopplerProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl GeometryProvider for PopplerProvider {
    fn open(&self, path: &Path) -> Result<Box<dyn PdfDocument>, ChapexError> {
        if !path.is_file() {
            return Err(ChapexError::UnreadableDocument {
                path: path.to_path_buf(),
                reason: "file does not exist".into(),
            });
        }

        let output = run_tool("pdfinfo", Command::new("pdfinfo").arg(path))?;
        if !output.status.success() {
            return Err(ChapexError::UnreadableDocument {
                path: path.to_path_buf(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let info = String::from_utf8_lossy(&output.stdout);
        let page_count = parse_page_count(&info).ok_or_else(|| ChapexError::UnreadableDocument {
            path: path.to_path_buf(),
            reason: "pdfinfo reported no page count".into(),
        })?;

        let scratch = tempfile::Builder::new().prefix("chapex-").tempdir()?;
        debug!(path = %path.display(), page_count, "opened document");

        Ok(Box::new(PopplerDocument {
            path: path.to_path_buf(),
            page_count,
            scratch: Some(scratch),
        }))
    }

    fn backend_name(&self) -> &str {
        "poppler"
    }
}

/// An open document: the source path plus a scratch directory for tool output.
pub struct PopplerDocument {
    path: PathBuf,
    page_count: usize,
    scratch: Option<TempDir>,
}

impl PopplerDocument {
    fn scratch_dir(&self) -> Result<&Path, ChapexError> {
        self.scratch
            .as_ref()
            .map(|d| d.path())
            .ok_or_else(|| ChapexError::Extraction("document already closed".into()))
    }

    fn check_page(&self, index: usize) -> Result<(), ChapexError> {
        if index >= self.page_count {
            return Err(ChapexError::InvalidRange {
                start: index + 1,
                end: index + 1,
                reason: format!("document has {} pages", self.page_count),
            });
        }
        Ok(())
    }

    /// Positioned font runs of one page, in points.
    fn font_runs(&self, page: &str) -> Result<Vec<FontRun>, ChapexError> {
        let output = run_tool(
            "pdftohtml",
            Command::new("pdftohtml")
                .args(["-xml", "-i", "-q", "-stdout", "-fontfullname", "-zoom", "1"])
                .args(["-f", page, "-l", page])
                .arg(&self.path),
        )?;
        let xml = checked_stdout("pdftohtml", output)?;
        parse_font_runs(&xml)
    }
}

impl PdfDocument for PopplerDocument {
    fn table_of_contents(&self) -> Result<Vec<TocEntry>, ChapexError> {
        let output = run_tool(
            "pdftohtml",
            Command::new("pdftohtml")
                .args(["-xml", "-i", "-q", "-stdout", "-f", "1", "-l", "1"])
                .arg(&self.path),
        )?;
        let xml = checked_stdout("pdftohtml", output)?;
        parse_outline_xml(&xml)
    }

    fn page_count(&self) -> usize {
        self.page_count
    }

    fn load_page(&self, index: usize) -> Result<PageGeometry, ChapexError> {
        self.check_page(index)?;
        let page_number = (index + 1).to_string();
        let page = page_number.as_str();

        let output = run_tool(
            "pdftotext",
            Command::new("pdftotext")
                .args(["-bbox-layout", "-enc", "UTF-8", "-f", page, "-l", page])
                .arg(&self.path)
                .arg("-"),
        )?;
        let layout = checked_stdout("pdftotext", output)?;
        let mut text_blocks = parse_bbox_layout(&layout)?
            .into_iter()
            .next()
            .unwrap_or_default();
        match self.font_runs(page) {
            Ok(runs) => assign_fonts(&mut text_blocks, &runs),
            Err(e) => warn!(page = index + 1, error = %e, "line fonts unavailable"),
        }

        let svg_path = self.scratch_dir()?.join(format!("page-{page}.svg"));
        let output = run_tool(
            "pdftocairo",
            Command::new("pdftocairo")
                .args(["-svg", "-f", page, "-l", page])
                .arg(&self.path)
                .arg(&svg_path),
        )?;
        checked_stdout("pdftocairo", output)?;
        let svg = std::fs::read_to_string(&svg_path)?;
        let _ = std::fs::remove_file(&svg_path);
        let drawings = parse_svg_drawings(&svg)?;

        debug!(
            page = index + 1,
            blocks = text_blocks.len(),
            drawings = drawings.len(),
            "loaded page geometry"
        );

        Ok(PageGeometry {
            index,
            text_blocks,
            drawings,
        })
    }

    fn render_region(
        &self,
        index: usize,
        region: &BBox,
        scale: f32,
    ) -> Result<Vec<u8>, ChapexError> {
        self.check_page(index)?;
        let page_number = (index + 1).to_string();
        let page = page_number.as_str();
        let crop = pixel_crop(region, scale);
        let root = self.scratch_dir()?.join(format!("render-{page}"));

        let output = run_tool(
            "pdftoppm",
            Command::new("pdftoppm")
                .args(["-png", "-singlefile", "-f", page, "-l", page])
                .arg("-r")
                .arg(format!("{}", 72.0 * scale))
                .arg("-x")
                .arg(crop.x.to_string())
                .arg("-y")
                .arg(crop.y.to_string())
                .arg("-W")
                .arg(crop.width.to_string())
                .arg("-H")
                .arg(crop.height.to_string())
                .arg(&self.path)
                .arg(&root),
        )?;
        checked_stdout("pdftoppm", output)?;

        let png_path = root.with_extension("png");
        let bytes = std::fs::read(&png_path)?;
        let _ = std::fs::remove_file(&png_path);
        Ok(bytes)
    }

    fn close(&mut self) -> Result<(), ChapexError> {
        if let Some(dir) = self.scratch.take() {
            dir.close()?;
        }
        Ok(())
    }
}

/// Pixel crop window for a region rendered at `scale` (72 dpi × scale).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelCrop {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

pub fn pixel_crop(region: &BBox, scale: f32) -> PixelCrop {
    let x0 = (region.x0 * scale).floor().max(0.0);
    let y0 = (region.y0 * scale).floor().max(0.0);
    let x1 = (region.x1 * scale).ceil().max(x0 + 1.0);
    let y1 = (region.y1 * scale).ceil().max(y0 + 1.0);
    PixelCrop {
        x: x0 as u32,
        y: y0 as u32,
        width: (x1 - x0) as u32,
        height: (y1 - y0) as u32,
    }
}

fn parse_page_count(info: &str) -> Option<usize> {
    info.lines()
        .find_map(|l| l.strip_prefix("Pages:"))
        .and_then(|v| v.trim().parse().ok())
}

fn run_tool(tool: &str, command: &mut Command) -> Result<Output, ChapexError> {
    command.output().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ChapexError::ToolNotFound { tool: tool.into() }
        } else {
            ChapexError::Extraction(format!("{tool} failed: {e}"))
        }
    })
}

fn checked_stdout(tool: &str, output: Output) -> Result<String, ChapexError> {
    if !output.status.success() {
        return Err(ChapexError::ToolFailed {
            tool: tool.into(),
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_page_count() {
        let info = "Title:          Algorithms\nProducer:       LaTeX\nPages:          312\nEncrypted:      no\n";
        assert_eq!(parse_page_count(info), Some(312));
        assert_eq!(parse_page_count("Title: x\n"), None);
    }

    #[test]
    fn test_pixel_crop_scales_and_rounds_outward() {
        let crop = pixel_crop(&BBox::new(10.2, 10.0, 200.0, 100.5), 3.0);
        assert_eq!(
            crop,
            PixelCrop {
                x: 30,
                y: 30,
                width: 570,
                height: 272,
            }
        );
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let err = PopplerProvider::new()
            .open(Path::new("/definitely/not/here.pdf"))
            .err()
            .unwrap();
        assert!(matches!(err, ChapexError::UnreadableDocument { .. }));
    }
}
