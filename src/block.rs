//! Block layout: one record becomes one self-contained rectangle.
//!
//! Sizing and painting are separate steps. [`BlockLayout::measure`] wraps the text and computes
//! the height without touching any surface; [`paint_block`] draws a [`LayoutBox`] that was
//! produced by the measuring step and never wraps again, so both passes agree by construction.

use crate::config::ReportConfig;
use crate::metrics::TextMeasure;
use crate::model::{LayoutBox, Record, Rect, ReportType, TextBlock};
use crate::surface::{RenderError, Surface};
use crate::text::wrap;

/// Width of the accent strip on the left edge of every block.
const ACCENT_STRIP_WIDTH: f64 = 3.0;

/// Result of sizing one record, not yet positioned.
#[derive(Clone, Debug, PartialEq)]
pub struct MeasuredBlock {
    pub block: TextBlock,
    pub title_lines: Vec<String>,
    pub detail_lines: Vec<Vec<String>>,
    pub height: f64,
}

impl MeasuredBlock {
    /// Positions the measured block with its top-left corner at `(x, y)`.
    pub fn place(self, index: usize, x: f64, y: f64, width: f64) -> LayoutBox {
        LayoutBox {
            index,
            rect: Rect::new(x, y, width, self.height),
            block: self.block,
            title_lines: self.title_lines,
            detail_lines: self.detail_lines,
        }
    }
}

/// Sizes record blocks against a configuration and backend metrics.
pub struct BlockLayout<'a, M: ?Sized> {
    config: &'a ReportConfig,
    metrics: &'a M,
}

impl<'a, M> BlockLayout<'a, M>
where
    M: TextMeasure + ?Sized,
{
    pub fn new(config: &'a ReportConfig, metrics: &'a M) -> Self {
        Self { config, metrics }
    }

    /// Fixed width of every block.
    pub fn box_width(&self) -> f64 {
        self.config.page.content_width()
    }

    /// Height of a block holding `lines` wrapped lines, floor included.
    pub fn height_for_lines(&self, lines: usize) -> f64 {
        let block = &self.config.block;
        let content = block.top_padding + lines as f64 * block.line_height + block.bottom_padding;
        content.max(block.min_height)
    }

    /// Wraps the record's title and details and computes the block height.
    pub fn measure(&self, record: &Record, report_type: ReportType) -> MeasuredBlock {
        let block = TextBlock::from_record(record, report_type);
        let budget = self.config.block_text_width();
        let fonts = &self.config.fonts;

        let title_lines = wrap(&block.title, budget, fonts.block_title, self.metrics);
        let detail_lines: Vec<Vec<String>> = block
            .details
            .iter()
            .map(|detail| wrap(detail, budget, fonts.block_body, self.metrics))
            .collect();

        let line_count =
            title_lines.len() + detail_lines.iter().map(Vec::len).sum::<usize>();
        MeasuredBlock {
            height: self.height_for_lines(line_count),
            block,
            title_lines,
            detail_lines,
        }
    }

    /// Measures `record` and places it at `(x, y)`.
    pub fn layout(
        &self,
        index: usize,
        record: &Record,
        report_type: ReportType,
        x: f64,
        y: f64,
    ) -> LayoutBox {
        self.measure(record, report_type)
            .place(index, x, y, self.box_width())
    }
}

/// Paints a measured block onto `surface`.
///
/// Even-indexed blocks get the striped background.
pub fn paint_block<S>(
    surface: &mut S,
    config: &ReportConfig,
    layout: &LayoutBox,
) -> Result<(), RenderError>
where
    S: Surface + ?Sized,
{
    let geometry = &config.block;
    let palette = &config.palette;
    let fonts = &config.fonts;
    let rect = layout.rect;

    if layout.index % 2 == 0 {
        surface.fill_rect(rect, palette.stripe)?;
    }
    surface.stroke_rect(rect, palette.border)?;
    surface.fill_rect(
        Rect::new(rect.x, rect.y, ACCENT_STRIP_WIDTH, rect.height),
        layout.block.accent,
    )?;

    let avatar = Rect::new(
        rect.x + geometry.padding_x,
        rect.y + geometry.top_padding,
        geometry.avatar_size,
        geometry.avatar_size,
    );
    surface.fill_rect(avatar, layout.block.accent)?;
    let initial = layout.block.initial();
    let initial_width = surface.text_width(&initial, fonts.avatar);
    surface.draw_text(
        &initial,
        avatar.x + (avatar.width - initial_width) / 2.0,
        avatar.y + (avatar.height - f64::from(fonts.avatar.size)) / 2.0,
        fonts.avatar,
        palette.avatar_text,
    )?;

    let text_x = avatar.right() + geometry.avatar_gap;
    let mut y = rect.y + geometry.top_padding;
    for line in &layout.title_lines {
        surface.draw_text(line, text_x, y, fonts.block_title, palette.text)?;
        y += geometry.line_height;
    }
    for line in layout.detail_lines.iter().flatten() {
        surface.draw_text(line, text_x, y, fonts.block_body, palette.text)?;
        y += geometry.line_height;
    }

    Ok(())
}
