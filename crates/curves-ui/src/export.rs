//! Chart files.
//!
//! Charts are drawn into an off-screen [`TestBackend`] buffer and the
//! buffer's text is written to `<out_dir>/<stem>.txt`. [`TextExporter`] is
//! the renderer the batch orchestrator runs jobs through.

use std::fs;
use std::path::{Path, PathBuf};

use curves_core::error::{CurvesError, Result};
use curves_core::models::{Dataset, SmoothingConfig};
use curves_core::regions::{GridConfig, OverlayConfig};
use curves_runtime::orchestrator::PlotRenderer;
use ratatui::{backend::TestBackend, buffer::Buffer, Frame, Terminal};

use crate::grid_view::{render_grid, GridPlot};
use crate::overlay_view::{render_overlay, OverlayPlot};
use crate::themes::Theme;

/// Size of overlay chart files.
pub const OVERLAY_SIZE: (u16, u16) = (120, 40);

/// Columns and rows of a grid chart file: wide enough for readable panels.
pub fn grid_size(config: &GridConfig) -> (u16, u16) {
    let width = (config.cols * 40).clamp(80, 400) as u16;
    let height = (config.rows * 14 + 2).clamp(24, 200) as u16;
    (width, height)
}

/// Buffer contents as lines of text, trailing blanks trimmed.
pub fn buffer_to_string(buffer: &Buffer) -> String {
    let width = buffer.area.width.max(1) as usize;
    buffer
        .content
        .chunks(width)
        .map(|row| {
            row.iter()
                .map(|cell| cell.symbol())
                .collect::<String>()
                .trim_end()
                .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Run `draw` on an off-screen terminal of the given size and return the
/// result as text.
pub fn render_to_text<F>(width: u16, height: u16, draw: F) -> Result<String>
where
    F: FnOnce(&mut Frame),
{
    let mut terminal = Terminal::new(TestBackend::new(width, height)).map_err(backend_error)?;
    terminal.draw(draw).map_err(backend_error)?;
    Ok(buffer_to_string(terminal.backend().buffer()))
}

fn backend_error<E: std::fmt::Display>(e: E) -> CurvesError {
    CurvesError::Io(std::io::Error::other(e.to_string()))
}

/// Write `text` to `<out_dir>/<stem>.txt`.
pub fn write_chart(out_dir: &Path, stem: &str, text: &str) -> Result<PathBuf> {
    let path = out_dir.join(format!("{}.txt", stem));
    fs::write(&path, text)?;
    tracing::debug!(path = %path.display(), bytes = text.len(), "chart file written");
    Ok(path)
}

// ── TextExporter ──────────────────────────────────────────────────────────────

pub struct TextExporter {
    theme: Theme,
    smoothing: SmoothingConfig,
}

impl TextExporter {
    /// `smoothing` is the trend line of grid panels.
    pub fn new(theme: Theme, smoothing: SmoothingConfig) -> Self {
        Self { theme, smoothing }
    }
}

impl PlotRenderer for TextExporter {
    fn render_grid(&self, config: &GridConfig, dataset: &Dataset, out_dir: &Path) -> Result<PathBuf> {
        let plot = GridPlot::build(config, dataset, &self.smoothing)?;
        let (width, height) = grid_size(config);
        let text = render_to_text(width, height, |frame| {
            let area = frame.area();
            render_grid(frame, area, &plot, &self.theme);
        })?;
        write_chart(out_dir, &config.file_stem, &text)
    }

    fn render_overlay(
        &self,
        config: &OverlayConfig,
        dataset: &Dataset,
        out_dir: &Path,
    ) -> Result<PathBuf> {
        let plot = OverlayPlot::build(config, dataset)?;
        let (width, height) = OVERLAY_SIZE;
        let text = render_to_text(width, height, |frame| {
            let area = frame.area();
            render_overlay(frame, area, &plot, &self.theme);
        })?;
        write_chart(out_dir, &config.file_stem, &text)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
