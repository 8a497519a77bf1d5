//! Vertical flow of record blocks with pagination.
//!
//! [`flow`] is the measuring pass: it sizes every record through [`BlockLayout`] and decides
//! where each block goes, without drawing anything. The composer later allocates pages of the
//! exact size the plan asks for and paints the boxes at the recorded coordinates.

use crate::block::BlockLayout;
use crate::metrics::TextMeasure;
use crate::model::{LayoutBox, Record, ReportType};

/// Vertical space available to the body.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PageBudget {
    /// Fixed-height pages. The first page starts lower because of the header.
    Paginated {
        first_top: f64,
        continuation_top: f64,
        /// Lowest y a block may reach.
        bottom: f64,
    },
    /// A single canvas that grows with its content.
    Unbounded { top: f64 },
}

impl PageBudget {
    fn first_top(&self) -> f64 {
        match *self {
            PageBudget::Paginated { first_top, .. } => first_top,
            PageBudget::Unbounded { top } => top,
        }
    }
}

/// Output of the measuring pass.
#[derive(Clone, Debug, PartialEq)]
pub struct FlowPlan {
    /// Boxes per page; always at least one (possibly empty) page.
    pub pages: Vec<Vec<LayoutBox>>,
    /// Bottom of the last box on the last page, or the body top when that page has no boxes.
    pub end_y: f64,
}

impl FlowPlan {
    pub fn box_count(&self) -> usize {
        self.pages.iter().map(Vec::len).sum()
    }

    /// All boxes in input order.
    pub fn boxes(&self) -> impl Iterator<Item = &LayoutBox> {
        self.pages.iter().flatten()
    }

    /// Total body height of an unbounded flow, measured from the body top.
    pub fn content_height(&self, budget: PageBudget) -> f64 {
        self.end_y - budget.first_top()
    }
}

/// Stacks one block per record, in input order, inside `budget`.
///
/// On paginated budgets a block that would cross `bottom` moves to a new page. A block is never
/// split; one taller than a whole page is placed alone at the top of its page.
pub fn flow<M>(
    records: &[Record],
    report_type: ReportType,
    layout: &BlockLayout<'_, M>,
    origin_x: f64,
    spacing: f64,
    budget: PageBudget,
) -> FlowPlan
where
    M: TextMeasure + ?Sized,
{
    let mut pages: Vec<Vec<LayoutBox>> = vec![Vec::new()];
    let mut page_top = budget.first_top();
    let mut y = page_top;
    let mut end_y = page_top;

    for (index, record) in records.iter().enumerate() {
        let measured = layout.measure(record, report_type);

        if let PageBudget::Paginated {
            continuation_top,
            bottom,
            ..
        } = budget
        {
            let overflows = y + measured.height > bottom;
            // Breaking only helps when the fresh page offers more room than this one.
            if overflows && (y > page_top || page_top > continuation_top) {
                pages.push(Vec::new());
                page_top = continuation_top;
                y = continuation_top;
            }
        }

        let placed = measured.place(index, origin_x, y, layout.box_width());
        end_y = placed.rect.bottom();
        y = end_y + spacing;
        if let Some(page) = pages.last_mut() {
            page.push(placed);
        }
    }

    if pages.last().map_or(true, Vec::is_empty) {
        end_y = page_top;
    }

    FlowPlan { pages, end_y }
}
