//! Per-page vertical extent of the body area.

use crate::config::PageConfig;
use crate::error::LookupError;

use super::context::LayoutContext;
use super::flow::layout_flow;

/// Supplies the body area of each page. Tops and bottoms are page y coordinates
/// (origin at the bottom edge).
pub trait PageVariator {
    fn body_top(&self, page_number: usize, page: &PageConfig) -> f32;
    fn body_bottom(&self, page_number: usize, page: &PageConfig) -> f32;
}

/// Plain page margins.
#[derive(Clone, Copy, Debug, Default)]
pub struct MarginVariator;

impl PageVariator for MarginVariator {
    fn body_top(&self, _page_number: usize, page: &PageConfig) -> f32 {
        page.body_top()
    }

    fn body_bottom(&self, _page_number: usize, page: &PageConfig) -> f32 {
        page.margins.bottom
    }
}

/// Margins pushed inwards by headers and footers that do not fit between the page edge
/// and the margin.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HeaderFooterVariator {
    pub header_height: f32,
    pub footer_height: f32,
    pub first_header_height: f32,
    pub first_footer_height: f32,
    pub different_first_page: bool,
}

impl HeaderFooterVariator {
    /// Measure headers and footers at the page content width.
    pub fn measure(ctx: &LayoutContext) -> Result<Self, LookupError> {
        let structure = ctx.structure;
        let width = ctx.page().content_width();
        let height = |elements: &[crate::model::Element]| -> Result<f32, LookupError> {
            Ok(layout_flow(ctx, elements, width)?.height)
        };
        let first_header = structure.headers.for_page(1, structure.different_first_page);
        let first_footer = structure.footers.for_page(1, structure.different_first_page);
        Ok(HeaderFooterVariator {
            header_height: height(&structure.headers.default)?,
            footer_height: height(&structure.footers.default)?,
            first_header_height: height(first_header)?,
            first_footer_height: height(first_footer)?,
            different_first_page: structure.different_first_page,
        })
    }

    fn heights(&self, page_number: usize) -> (f32, f32) {
        if self.different_first_page && page_number == 1 {
            (self.first_header_height, self.first_footer_height)
        } else {
            (self.header_height, self.footer_height)
        }
    }
}

impl PageVariator for HeaderFooterVariator {
    fn body_top(&self, page_number: usize, page: &PageConfig) -> f32 {
        let (header, _) = self.heights(page_number);
        if header <= 0.0 {
            return page.body_top();
        }
        page.body_top()
            .min(page.height() - page.header_margin - header)
    }

    fn body_bottom(&self, page_number: usize, page: &PageConfig) -> f32 {
        let (_, footer) = self.heights(page_number);
        if footer <= 0.0 {
            return page.margins.bottom;
        }
        page.margins.bottom.max(page.footer_margin + footer)
    }
}
