//! In-memory surface that records drawing commands, used by unit tests.

use crate::metrics::{FixedMetrics, FontSpec, TextMeasure};
use crate::model::{Color, Rect};

use super::{RenderError, Surface};

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Page { width: f64, height: f64 },
    Fill { rect: Rect, color: Color },
    Stroke { rect: Rect, color: Color },
    Text { text: String, x: f64, y: f64, font: FontSpec },
    Image { rect: Rect },
}

#[derive(Default)]
pub struct RecordingSurface {
    metrics: FixedMetrics,
    commands: Vec<Command>,
    pages: usize,
}

impl RecordingSurface {
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Text drawn on each page, in order.
    pub fn texts_per_page(&self) -> Vec<Vec<String>> {
        let mut pages: Vec<Vec<String>> = Vec::new();
        for command in &self.commands {
            match command {
                Command::Page { .. } => pages.push(Vec::new()),
                Command::Text { text, .. } => {
                    if let Some(page) = pages.last_mut() {
                        page.push(text.clone());
                    }
                }
                _ => {}
            }
        }
        pages
    }

    fn record(&mut self, command: Command) -> Result<(), RenderError> {
        if self.pages == 0 {
            return Err(RenderError::NoPage);
        }
        self.commands.push(command);
        Ok(())
    }
}

impl TextMeasure for RecordingSurface {
    fn text_width(&self, text: &str, font: FontSpec) -> f64 {
        self.metrics.text_width(text, font)
    }
}

impl Surface for RecordingSurface {
    fn begin_page(&mut self, width: f64, height: f64) -> Result<(), RenderError> {
        self.pages += 1;
        self.commands.push(Command::Page { width, height });
        Ok(())
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) -> Result<(), RenderError> {
        self.record(Command::Fill { rect, color })
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color) -> Result<(), RenderError> {
        self.record(Command::Stroke { rect, color })
    }

    fn draw_text(
        &mut self,
        text: &str,
        x: f64,
        y: f64,
        font: FontSpec,
        _color: Color,
    ) -> Result<(), RenderError> {
        self.record(Command::Text {
            text: text.to_owned(),
            x,
            y,
            font,
        })
    }

    fn draw_image(&mut self, _image: &image::DynamicImage, rect: Rect) -> Result<(), RenderError> {
        self.record(Command::Image { rect })
    }

    fn finish(self) -> Result<Vec<u8>, RenderError> {
        Ok(format!("{:?}", self.commands).into_bytes())
    }
}
