//! Document composition: header, information banner, body and footer.
//!
//! [`Composer::plan`] is pass one. It runs the flow engine, places the footer and decides the
//! final page sizes using nothing but text metrics. [`Composer::paint`] is pass two and replays
//! the plan onto a [`Surface`]. Decorations use fixed offsets from the page margins; the only
//! content-dependent decision is where the footer goes (see [`Composer::plan`]).

use image::DynamicImage;

use crate::block::{paint_block, BlockLayout};
use crate::config::ReportConfig;
use crate::flow::{flow, PageBudget};
use crate::metrics::{FontSpec, TextMeasure};
use crate::model::{LayoutBox, Rect, ReportContent};
use crate::surface::{RenderError, Surface};
use crate::text::{fit_to_width, wrap};

/// Horizontal inset of text inside bands and banner cells.
const CELL_INSET: f64 = 5.0;
/// Gap between the disclaimer and the record count line.
const SUMMARY_GAP: f64 = 4.0;
/// Gap between the code image and its caption.
const CAPTION_GAP: f64 = 2.0;
/// Relative widths of the four banner columns.
const BANNER_COLUMNS: [f64; 4] = [0.22, 0.28, 0.18, 0.32];

/// One text slot of the information banner.
#[derive(Clone, Debug, PartialEq)]
pub struct BannerCell {
    pub rect: Rect,
    pub text: String,
    pub font: FontSpec,
}

/// Header band, information banner and details heading of the first page.
#[derive(Clone, Debug, PartialEq)]
pub struct HeaderPlan {
    pub title: String,
    pub brand: String,
    pub subtitle: String,
    pub info_band: Rect,
    pub cells: Vec<BannerCell>,
    pub details_band: Rect,
    pub details_heading: String,
    /// Label repeated in the running header of continuation pages.
    pub running_label: String,
    /// Where the first body block starts.
    pub body_top: f64,
}

/// Disclaimer, record count and scannable code below the body.
#[derive(Clone, Debug, PartialEq)]
pub struct FooterPlan {
    pub top: f64,
    pub height: f64,
    pub disclaimer_lines: Vec<String>,
    pub summary: String,
    pub code: Option<Rect>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PagePlan {
    /// 1-based page number.
    pub number: usize,
    pub height: f64,
    pub boxes: Vec<LayoutBox>,
    pub footer: Option<FooterPlan>,
}

/// Fully measured document, ready to be painted.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentPlan {
    pub width: f64,
    pub header: HeaderPlan,
    pub pages: Vec<PagePlan>,
}

impl DocumentPlan {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// All body boxes in input order.
    pub fn boxes(&self) -> impl Iterator<Item = &LayoutBox> {
        self.pages.iter().flat_map(|page| page.boxes.iter())
    }

    pub fn footer(&self) -> Option<(&PagePlan, &FooterPlan)> {
        self.pages
            .iter()
            .find_map(|page| page.footer.as_ref().map(|footer| (page, footer)))
    }
}

/// Assembles reports from a configuration and an optional code image.
pub struct Composer<'a> {
    config: &'a ReportConfig,
    code_image: Option<&'a DynamicImage>,
}

impl<'a> Composer<'a> {
    pub fn new(config: &'a ReportConfig, code_image: Option<&'a DynamicImage>) -> Self {
        Self { config, code_image }
    }

    /// Measures the whole report.
    ///
    /// With `paginated` set, the body flows over fixed-height pages and the footer follows the
    /// last block unless it would come closer than `footer.safety_margin` to the bottom edge, in
    /// which case it moves to a page of its own. Otherwise everything lands on one canvas whose
    /// height is derived from the content.
    pub fn plan<M>(&self, content: &ReportContent<'_>, paginated: bool, metrics: &M) -> DocumentPlan
    where
        M: TextMeasure + ?Sized,
    {
        let config = self.config;
        let page = &config.page;
        let header = self.plan_header(content, metrics);

        let budget = if paginated {
            PageBudget::Paginated {
                first_top: header.body_top,
                continuation_top: page.continuation_top,
                bottom: page.body_bottom(),
            }
        } else {
            PageBudget::Unbounded {
                top: header.body_top,
            }
        };

        let layout = BlockLayout::new(config, metrics);
        let body = flow(
            content.records,
            content.report_type,
            &layout,
            page.margin_left,
            config.block.spacing,
            budget,
        );

        let mut footer = self.plan_footer(content, metrics, body.end_y + config.footer.gap_after_body);
        let mut pages: Vec<PagePlan> = body
            .pages
            .into_iter()
            .enumerate()
            .map(|(index, boxes)| PagePlan {
                number: index + 1,
                height: page.height,
                boxes,
                footer: None,
            })
            .collect();

        if paginated {
            if footer.top + footer.height > page.height - config.footer.safety_margin {
                footer.top = page.continuation_top;
                pages.push(PagePlan {
                    number: pages.len() + 1,
                    height: page.height,
                    boxes: Vec::new(),
                    footer: None,
                });
            }
        } else if let Some(canvas) = pages.first_mut() {
            canvas.height = footer.top + footer.height + page.margin_bottom;
        }

        if let Some(last) = pages.last_mut() {
            last.footer = Some(footer);
        }

        DocumentPlan {
            width: page.width,
            header,
            pages,
        }
    }

    /// Paints a plan produced by [`Composer::plan`].
    pub fn paint<S>(&self, plan: &DocumentPlan, surface: &mut S) -> Result<(), RenderError>
    where
        S: Surface + ?Sized,
    {
        let total = plan.page_count();
        for page in &plan.pages {
            surface.begin_page(plan.width, page.height)?;
            if page.number == 1 {
                self.paint_header(&plan.header, total, surface)?;
            } else {
                self.paint_running_header(&plan.header, page.number, total, surface)?;
            }
            for layout in &page.boxes {
                paint_block(surface, self.config, layout)?;
            }
            if let Some(footer) = &page.footer {
                self.paint_footer(footer, surface)?;
            }
        }
        Ok(())
    }

    /// Runs both passes against `surface` and encodes the result.
    pub fn render<S>(
        &self,
        content: &ReportContent<'_>,
        paginated: bool,
        mut surface: S,
    ) -> Result<Vec<u8>, RenderError>
    where
        S: Surface,
    {
        let plan = self.plan(content, paginated, &surface);
        log::debug!(
            "planned {} report for {} records on {} page(s)",
            content.report_type,
            plan.boxes().count(),
            plan.page_count()
        );
        self.paint(&plan, &mut surface)?;
        surface.finish()
    }

    fn plan_header<M>(&self, content: &ReportContent<'_>, metrics: &M) -> HeaderPlan
    where
        M: TextMeasure + ?Sized,
    {
        let config = self.config;
        let page = &config.page;
        let header = &config.header;
        let fonts = &config.fonts;
        let label = content.report_type.field_map().label;
        let date = content.generated_on.format("%Y-%m-%d").to_string();

        let mut y = page.margin_top + header.title_height + header.subtitle_height;
        let info_band = Rect::new(page.margin_left, y, page.content_width(), header.band_height);
        y = info_band.bottom();

        let quantity = content.quantity.to_string();
        let rows = [
            ["Subject ID", content.subject, "Date", date.as_str()],
            ["Report", label, "Records", quantity.as_str()],
        ];
        let mut cells = Vec::with_capacity(8);
        for row in rows {
            let mut x = page.margin_left;
            for (column, text) in row.iter().enumerate() {
                let width = page.content_width() * BANNER_COLUMNS[column];
                let font = if column % 2 == 0 {
                    fonts.banner_label
                } else {
                    fonts.banner_value
                };
                cells.push(BannerCell {
                    rect: Rect::new(x, y, width, header.cell_height),
                    text: fit_to_width(text, width - 2.0 * CELL_INSET, font, metrics),
                    font,
                });
                x += width;
            }
            y += header.cell_height;
        }

        y += header.section_gap;
        let details_band =
            Rect::new(page.margin_left, y, page.content_width(), header.band_height);

        HeaderPlan {
            title: content.report_type.title().to_owned(),
            brand: header.brand_label.clone(),
            subtitle: fit_to_width(
                &format!("Generated on {} | Subject {}", date, content.subject),
                page.content_width() * 0.75,
                fonts.subtitle,
                metrics,
            ),
            info_band,
            cells,
            details_band,
            details_heading: format!("Details of {}", label),
            running_label: fit_to_width(
                &format!("{} | {}", content.report_type.title(), content.subject),
                page.content_width() * 0.7,
                fonts.running_header,
                metrics,
            ),
            body_top: details_band.bottom() + config.block.spacing,
        }
    }

    fn plan_footer<M>(&self, content: &ReportContent<'_>, metrics: &M, top: f64) -> FooterPlan
    where
        M: TextMeasure + ?Sized,
    {
        let footer = &self.config.footer;
        let disclaimer_lines = wrap(
            &footer.disclaimer,
            footer.disclaimer_width,
            self.config.fonts.disclaimer,
            metrics,
        );
        let text_height =
            disclaimer_lines.len() as f64 * footer.line_height + SUMMARY_GAP + footer.line_height;

        let code = self.code_image.map(|_| {
            Rect::new(
                self.config.page.right_edge() - footer.code_size,
                top,
                footer.code_size,
                footer.code_size,
            )
        });
        let code_height = code.map_or(0.0, |rect| rect.height + CAPTION_GAP + footer.line_height);

        FooterPlan {
            top,
            height: text_height.max(code_height),
            disclaimer_lines,
            summary: format!("Total records: {}", content.quantity),
            code,
        }
    }

    fn paint_header<S>(&self, header: &HeaderPlan, total: usize, surface: &mut S) -> Result<(), RenderError>
    where
        S: Surface + ?Sized,
    {
        let page = &self.config.page;
        let fonts = &self.config.fonts;
        let palette = &self.config.palette;
        let top = page.margin_top;

        surface.draw_text(&header.title, page.margin_left, top, fonts.title, palette.text)?;
        let brand_width = surface.text_width(&header.brand, fonts.brand);
        surface.draw_text(
            &header.brand,
            page.right_edge() - brand_width,
            top + 4.0,
            fonts.brand,
            palette.text,
        )?;

        let subtitle_y = top + self.config.header.title_height;
        surface.draw_text(&header.subtitle, page.margin_left, subtitle_y, fonts.subtitle, palette.muted)?;
        if total > 1 {
            let label = format!("Page 1 of {}", total);
            let width = surface.text_width(&label, fonts.subtitle);
            surface.draw_text(&label, page.right_edge() - width, subtitle_y, fonts.subtitle, palette.muted)?;
        }

        self.paint_band(header.info_band, "General Information", surface)?;
        for cell in &header.cells {
            surface.stroke_rect(cell.rect, palette.text)?;
            surface.draw_text(
                &cell.text,
                cell.rect.x + CELL_INSET,
                centered_line(cell.rect, cell.font),
                cell.font,
                palette.text,
            )?;
        }
        self.paint_band(header.details_band, &header.details_heading, surface)
    }

    fn paint_band<S>(&self, rect: Rect, text: &str, surface: &mut S) -> Result<(), RenderError>
    where
        S: Surface + ?Sized,
    {
        let font = self.config.fonts.banner_label;
        let palette = &self.config.palette;
        surface.fill_rect(rect, palette.band)?;
        surface.stroke_rect(rect, palette.text)?;
        surface.draw_text(text, rect.x + CELL_INSET, centered_line(rect, font), font, palette.text)
    }

    fn paint_running_header<S>(
        &self,
        header: &HeaderPlan,
        number: usize,
        total: usize,
        surface: &mut S,
    ) -> Result<(), RenderError>
    where
        S: Surface + ?Sized,
    {
        let page = &self.config.page;
        let font = self.config.fonts.running_header;
        let color = self.config.palette.muted;
        let y = page.margin_top - self.config.header.running_header_height;

        surface.draw_text(&header.running_label, page.margin_left, y, font, color)?;
        let label = format!("Page {} of {}", number, total);
        let width = surface.text_width(&label, font);
        surface.draw_text(&label, page.right_edge() - width, y, font, color)?;
        surface.fill_rect(
            Rect::new(page.margin_left, page.margin_top - 4.0, page.content_width(), 0.5),
            self.config.palette.border,
        )
    }

    fn paint_footer<S>(&self, footer: &FooterPlan, surface: &mut S) -> Result<(), RenderError>
    where
        S: Surface + ?Sized,
    {
        let config = self.config;
        let fonts = &config.fonts;
        let palette = &config.palette;
        let line_height = config.footer.line_height;
        let x = config.page.margin_left;

        let mut y = footer.top;
        for line in &footer.disclaimer_lines {
            surface.draw_text(line, x, y, fonts.disclaimer, palette.muted)?;
            y += line_height;
        }
        surface.draw_text(&footer.summary, x, y + SUMMARY_GAP, fonts.summary, palette.text)?;

        if let (Some(rect), Some(image)) = (footer.code, self.code_image) {
            surface.draw_image(image, rect)?;
            let caption = &config.footer.code_caption;
            let width = surface.text_width(caption, fonts.caption);
            surface.draw_text(
                caption,
                rect.x + (rect.width - width) / 2.0,
                rect.bottom() + CAPTION_GAP,
                fonts.caption,
                palette.text,
            )?;
        }
        Ok(())
    }
}

/// Top of a single text line vertically centred in `rect`.
fn centered_line(rect: Rect, font: FontSpec) -> f64 {
    rect.y + (rect.height - f64::from(font.size)) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::FixedMetrics;
    use crate::model::{Record, ReportType};
    use crate::surface::recording::{Command, RecordingSurface};
    use chrono::NaiveDate;
    use serde_json::json;

    fn records(count: usize) -> Vec<Record> {
        (0..count)
            .map(|n| {
                Record::from(json!({
                    "razonSocial": format!("COMERCIO {n}"),
                    "monto": format!("{}.00", 10 + n),
                    "fecha": "2024-03-01",
                    "numRucEmisor": "20123456789"
                }))
            })
            .collect()
    }

    fn content(records: &[Record]) -> ReportContent<'_> {
        ReportContent {
            subject: "12345678",
            report_type: ReportType::Consumption,
            generated_on: NaiveDate::from_ymd_opt(2024, 5, 17).unwrap(),
            quantity: records.len() as u64,
            records,
        }
    }

    fn code_image() -> DynamicImage {
        DynamicImage::new_rgb8(8, 8)
    }

    #[test]
    fn empty_report_still_has_header_and_footer() {
        let config = ReportConfig::default();
        let composer = Composer::new(&config, None);
        let plan = composer.plan(&content(&[]), true, &FixedMetrics::default());

        assert_eq!(plan.page_count(), 1);
        assert_eq!(plan.boxes().count(), 0);
        let (page, footer) = plan.footer().expect("footer planned");
        assert_eq!(page.number, 1);
        assert_eq!(footer.top, plan.header.body_top + config.footer.gap_after_body);
        assert_eq!(footer.summary, "Total records: 0");

        let mut surface = RecordingSurface::default();
        composer.paint(&plan, &mut surface).unwrap();
        let texts = &surface.texts_per_page()[0];
        assert!(texts.contains(&"Consumption Report".to_string()));
        assert!(texts.contains(&"Details of Consumptions".to_string()));
        assert!(texts.contains(&"Total records: 0".to_string()));
    }

    #[test]
    fn footer_follows_the_last_box_when_it_fits() {
        let config = ReportConfig::default();
        let composer = Composer::new(&config, None);
        let plan = composer.plan(&content(&records(3)), true, &FixedMetrics::default());

        let last = plan.boxes().last().unwrap().rect;
        let (page, footer) = plan.footer().unwrap();
        assert_eq!(page.number, 1);
        assert_eq!(footer.top, last.bottom() + config.footer.gap_after_body);
    }

    #[test]
    fn footer_moves_to_a_new_page_when_space_runs_out() {
        let config = ReportConfig::default();
        let composer = Composer::new(&config, None);
        let metrics = FixedMetrics::default();

        // Find a record count whose body ends too close to the bottom of a page.
        let moved = (1..80)
            .map(|count| (count, composer.plan(&content(&records(count)), true, &metrics)))
            .find(|(_, plan)| plan.pages.last().map_or(false, |page| page.boxes.is_empty()))
            .map(|(_, plan)| plan)
            .expect("some record count pushes the footer to its own page");

        let (page, footer) = moved.footer().unwrap();
        assert_eq!(page.number, moved.page_count());
        assert_eq!(footer.top, config.page.continuation_top);
        let previous = &moved.pages[moved.page_count() - 2];
        let end = previous.boxes.last().unwrap().rect.bottom();
        assert!(
            end + config.footer.gap_after_body + footer.height
                > config.page.height - config.footer.safety_margin
        );
    }

    #[test]
    fn footer_never_crosses_the_safety_margin() {
        let config = ReportConfig::default();
        let image = code_image();
        let composer = Composer::new(&config, Some(&image));
        let metrics = FixedMetrics::default();
        for count in 0..60 {
            let plan = composer.plan(&content(&records(count)), true, &metrics);
            let (_, footer) = plan.footer().unwrap();
            assert!(footer.top + footer.height <= config.page.height - config.footer.safety_margin);
            assert_eq!(plan.boxes().count(), count);
        }
    }

    #[test]
    fn canvas_height_is_derived_from_content() {
        let config = ReportConfig::default();
        let composer = Composer::new(&config, None);
        let metrics = FixedMetrics::default();

        let small = composer.plan(&content(&records(2)), false, &metrics);
        let large = composer.plan(&content(&records(60)), false, &metrics);
        assert_eq!(small.page_count(), 1);
        assert_eq!(large.page_count(), 1);
        assert!(large.pages[0].height > config.page.height);

        let (page, footer) = large.footer().unwrap();
        assert_eq!(page.height, footer.top + footer.height + config.page.margin_bottom);
    }

    #[test]
    fn continuation_pages_get_running_headers() {
        let config = ReportConfig::default();
        let composer = Composer::new(&config, None);
        let plan = composer.plan(&content(&records(40)), true, &FixedMetrics::default());
        assert!(plan.page_count() >= 2);

        let mut surface = RecordingSurface::default();
        composer.paint(&plan, &mut surface).unwrap();
        let pages = surface.texts_per_page();
        assert_eq!(pages.len(), plan.page_count());
        let total = plan.page_count();
        assert!(pages[0].contains(&format!("Page 1 of {}", total)));
        assert!(pages[1].contains(&format!("Page 2 of {}", total)));
        assert!(pages[1].contains(&"Consumption Report | 12345678".to_string()));
    }

    #[test]
    fn code_image_is_painted_with_caption() {
        let config = ReportConfig::default();
        let image = code_image();
        let composer = Composer::new(&config, Some(&image));
        let mut surface = RecordingSurface::default();
        let plan = composer.plan(&content(&records(1)), true, &surface);
        composer.paint(&plan, &mut surface).unwrap();

        let images: Vec<Rect> = surface
            .commands()
            .iter()
            .filter_map(|command| match command {
                Command::Image { rect } => Some(*rect),
                _ => None,
            })
            .collect();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].right(), config.page.right_edge());
        assert!(surface.texts_per_page()[0].contains(&config.footer.code_caption));
    }

    #[test]
    fn long_subject_is_fitted_into_its_banner_cell() {
        let config = ReportConfig::default();
        let composer = Composer::new(&config, None);
        let metrics = FixedMetrics::default();
        let long_subject = "X".repeat(200);
        let records = records(0);
        let mut input = content(&records);
        input.subject = &long_subject;
        let plan = composer.plan(&input, true, &metrics);
        for cell in &plan.header.cells {
            assert!(metrics.text_width(&cell.text, cell.font) <= cell.rect.width - 2.0 * CELL_INSET);
        }
    }
}
