//! The layout assembler: walks the body once and paginates it into a [`UnifiedLayout`].

mod borders;
pub mod context;
pub(crate) mod flow;
mod notes;
pub mod paragraph;
pub mod table;
pub mod variator;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::engines::ElementRef;
use crate::error::Error;
use crate::model::{
    Alignment, AnchorFrame, Element, Image, LayoutStructure, Paragraph,
    ParagraphStyle, Table, Textbox,
};
use crate::unified::{
    BlockContent, BlockType, BoxStyle, FlowContent, FlowItem, ImageBox, LayoutBlock, NoteKind, Overlay,
    Page, ParagraphLayout, Rect, SegmentInfo, Size, UnifiedLayout,
};

use borders::BorderGrouper;
use context::note_refs;
use flow::{align_offset, fit_image, layout_flow, layout_item, textbox_content};
use notes::NoteBook;

pub use context::LayoutContext;
pub use paragraph::{LineSpacing, base_font_size, build_paragraph_layout, resolve_indent, resolve_line_spacing};
pub use table::{TableLayout, column_widths, layout_table};
pub use variator::{HeaderFooterVariator, MarginVariator, PageVariator};

const EPSILON: f32 = 0.01;

/// Lay out `structure` with a fresh assembler.
pub fn assemble(structure: &LayoutStructure) -> Result<UnifiedLayout, Error> {
    LayoutAssembler::new(structure).assemble()
}

/// Stable identity of an element's blocks: the source id when present.
fn base_uid(id: Option<&str>, kind: &str, uid: u32) -> String {
    match id {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => format!("{kind}_{uid}"),
    }
}

/// Adjust a break after line `end` (exclusive) of a paragraph of `n` lines so that
/// neither side of the break is left with fewer than `orphan` lines before or `widow`
/// lines after. Returns `start` when the remainder should move to the next page whole.
pub(crate) fn keep_widows_and_orphans(start: usize, end: usize, n: usize, widow: usize, orphan: usize) -> usize {
    if end >= n || end <= start {
        return end;
    }
    let mut end = end;
    let remaining = n - end;
    if remaining < widow {
        end = end.saturating_sub(widow - remaining).max(start);
    }
    if end > start && end - start < orphan {
        end = start;
    }
    end
}

/// Page-level block type and content for something laid out in a flow.
fn flow_block(content: FlowContent, width: f32, height: f32) -> (BlockType, BlockContent, BoxStyle) {
    match content {
        FlowContent::Image(image) => (BlockType::Image, BlockContent::Image(image), BoxStyle::default()),
        FlowContent::Textbox { style, items } => (
            BlockType::Textbox,
            BlockContent::Flow {
                items,
                overlays: Vec::new(),
            },
            style,
        ),
        FlowContent::Table(segment) => (BlockType::Table, BlockContent::Table(*segment), BoxStyle::default()),
        content @ FlowContent::Paragraph(_) => (
            BlockType::Textbox,
            BlockContent::Flow {
                items: vec![FlowItem {
                    x: 0.0,
                    y: 0.0,
                    width,
                    height,
                    content,
                }],
                overlays: Vec::new(),
            },
            BoxStyle::default(),
        ),
    }
}

/// A non-splitting block waiting for placement.
struct Boxed {
    x_offset: f32,
    width: f32,
    height: f32,
    block_type: BlockType,
    content: BlockContent,
    style: BoxStyle,
    uid: String,
    before: f32,
    after: f32,
}

/// Single-pass paginator. Carries cursor state across the whole body; one instance per
/// pass, not shared between threads.
pub struct LayoutAssembler<'a> {
    ctx: LayoutContext<'a>,
    variator: Option<Box<dyn PageVariator + 'a>>,
    pages: Vec<Page>,
    page_number: usize,
    /// Next free y on the page, decreasing down the page.
    current_y: f32,
    /// Body bottom supplied by the variator, before footnotes.
    base_bottom: f32,
    /// `base_bottom` raised by the footnotes registered on this page.
    page_bottom_limit: f32,
    pending_spacing_after: f32,
    page_has_content: bool,
    prev_contextual: bool,
    break_pending: bool,
    sequence: u64,
    footnotes: NoteBook,
    endnotes: NoteBook,
    endnote_ids: Vec<String>,
    grouper: BorderGrouper,
}

impl<'a> LayoutAssembler<'a> {
    pub fn new(structure: &'a LayoutStructure) -> Self {
        LayoutAssembler {
            ctx: LayoutContext::new(structure),
            variator: None,
            pages: Vec::new(),
            page_number: 0,
            current_y: 0.0,
            base_bottom: 0.0,
            page_bottom_limit: 0.0,
            pending_spacing_after: 0.0,
            page_has_content: false,
            prev_contextual: false,
            break_pending: false,
            sequence: 0,
            footnotes: NoteBook::new(NoteKind::Footnote),
            endnotes: NoteBook::new(NoteKind::Endnote),
            endnote_ids: Vec::new(),
            grouper: BorderGrouper::default(),
        }
    }

    /// Replace the default header/footer-aware page variator.
    pub fn with_variator(mut self, variator: impl PageVariator + 'a) -> Self {
        self.variator = Some(Box::new(variator));
        self
    }

    pub fn context(&self) -> &LayoutContext<'a> {
        &self.ctx
    }

    pub fn assemble(&mut self) -> Result<UnifiedLayout, Error> {
        let t0 = Instant::now();
        self.reset();
        if self.variator.is_none() {
            self.variator = Some(Box::new(HeaderFooterVariator::measure(&self.ctx)?));
        }

        let structure = self.ctx.structure;
        self.new_page();
        for (i, element) in structure.body.iter().enumerate() {
            self.place_element(element, structure.body.get(i + 1))?;
        }
        self.place_endnotes()?;
        self.finish_page()?;
        let t_body = t0.elapsed();

        self.grouper.finish(&mut self.pages);
        self.tag_segments();
        self.decorate_pages()?;
        let t_decorate = t0.elapsed();

        log::info!(
            "Layout phases: body={:.1}ms, decorate={:.1}ms, pages={}",
            t_body.as_secs_f64() * 1000.0,
            (t_decorate - t_body).as_secs_f64() * 1000.0,
            self.pages.len(),
        );
        Ok(UnifiedLayout {
            pages: std::mem::take(&mut self.pages),
        })
    }

    fn reset(&mut self) {
        self.pages.clear();
        self.page_number = 0;
        self.sequence = 0;
        self.break_pending = false;
        self.footnotes.clear();
        self.endnotes.clear();
        self.endnote_ids.clear();
        self.grouper.clear();
    }

    fn content_width(&self) -> f32 {
        self.ctx.page().content_width()
    }

    fn left(&self) -> f32 {
        self.ctx.page().margins.left
    }

    fn available(&self) -> f32 {
        self.current_y - self.page_bottom_limit
    }

    fn body_extent(&self, page_number: usize) -> (f32, f32) {
        let page = self.ctx.page();
        match self.variator.as_deref() {
            Some(v) => (v.body_top(page_number, page), v.body_bottom(page_number, page)),
            None => (page.body_top(), page.margins.bottom),
        }
    }

    /// Body height of the next page, before footnotes.
    fn fresh_height(&self) -> f32 {
        let (top, bottom) = self.body_extent(self.page_number + 1);
        top - bottom
    }

    fn new_page(&mut self) {
        self.page_number += 1;
        let (top, bottom) = self.body_extent(self.page_number);
        let page = self.ctx.page();
        self.pages.push(Page {
            number: self.page_number,
            size: Size {
                width: page.width(),
                height: page.height(),
            },
            margins: page.margins,
            blocks: Vec::new(),
        });
        self.current_y = top;
        self.base_bottom = bottom;
        self.page_bottom_limit = bottom;
        self.pending_spacing_after = 0.0;
        self.page_has_content = false;
        self.prev_contextual = false;
        log::debug!("Page {}: body {top:.1}..{bottom:.1}", self.page_number);
    }

    /// Close the current page with its footnotes area.
    fn finish_page(&mut self) -> Result<(), Error> {
        let ids = self.footnotes.ids(self.page_number).to_vec();
        if ids.is_empty() {
            return Ok(());
        }
        let width = self.content_width();
        let area = self
            .footnotes
            .area(&self.ctx, ids.iter().map(String::as_str), width)?;
        let height = area.separator_height + area.entries.iter().map(|e| e.height).sum::<f32>();
        let frame = Rect::new(self.left(), self.base_bottom, width, height);
        let uid = format!("footnotes_{}", self.page_number);
        self.push_block(frame, BlockType::Footnotes, BlockContent::Notes(area), BoxStyle::default(), uid, None);
        Ok(())
    }

    fn break_page(&mut self) -> Result<(), Error> {
        self.finish_page()?;
        self.new_page();
        Ok(())
    }

    fn push_block(
        &mut self,
        frame: Rect,
        block_type: BlockType,
        content: BlockContent,
        style: BoxStyle,
        source_uid: String,
        segment: Option<SegmentInfo>,
    ) {
        self.sequence += 1;
        let page_number = self.page_number;
        if let Some(page) = self.pages.last_mut() {
            page.blocks.push(LayoutBlock {
                frame,
                block_type,
                content,
                style,
                page_number,
                source_uid,
                sequence: self.sequence,
                segment,
            });
        }
    }

    /// Gap above the next block: the larger of the pending `spacing_after` and `before`,
    /// at least the minimum gap between touching blocks. Dropped at the top of a page
    /// except at the start of the document.
    fn gap_before(&self, before: f32, contextual: bool) -> f32 {
        if !self.page_has_content {
            return if self.pages.len() == 1 { before } else { 0.0 };
        }
        if contextual && self.prev_contextual {
            return 0.0;
        }
        let gap = self.pending_spacing_after.max(before);
        if gap > 0.0 { gap } else { self.ctx.options.min_block_gap }
    }

    fn widow_orphan(&self, style: &ParagraphStyle) -> (usize, usize) {
        if style.widow_control == Some(false) {
            return (1, 1);
        }
        let options = &self.ctx.options;
        (
            style.widow_lines.unwrap_or(options.widow_lines).max(1),
            style.orphan_lines.unwrap_or(options.orphan_lines).max(1),
        )
    }

    fn register_notes(&mut self, refs: impl IntoIterator<Item = (NoteKind, String)>) -> Result<(), Error> {
        let mut added = false;
        for (kind, id) in refs {
            match kind {
                NoteKind::Footnote => added |= self.footnotes.register(self.page_number, &id),
                NoteKind::Endnote => {
                    if !self.endnote_ids.contains(&id) {
                        self.endnote_ids.push(id);
                    }
                }
            }
        }
        if added {
            let width = self.content_width();
            let ids = self.footnotes.ids(self.page_number).to_vec();
            let notes = self
                .footnotes
                .area_height(&self.ctx, ids.iter().map(String::as_str), width)?;
            self.page_bottom_limit = self.base_bottom + notes;
        }
        Ok(())
    }

    fn place_element(&mut self, element: &'a Element, next: Option<&'a Element>) -> Result<(), Error> {
        if element.is_watermark() {
            return Ok(());
        }
        if std::mem::take(&mut self.break_pending) {
            self.break_page()?;
        }
        if element.page_break_before() && self.page_has_content {
            log::debug!("Page break before {} on page {}", element.kind_name(), self.page_number);
            self.break_page()?;
        }
        match element {
            Element::Paragraph(para) => self.place_paragraph(para, next)?,
            Element::Table(table) => {
                self.grouper.close();
                self.place_table(table)?;
            }
            Element::Image(image) => {
                self.grouper.close();
                self.place_image(image)?;
            }
            Element::Textbox(textbox) => {
                self.grouper.close();
                self.place_textbox(textbox)?;
            }
            Element::Unsupported(_) => {
                let width = self.content_width();
                self.ctx
                    .dispatcher
                    .dispatch(&self.ctx, ElementRef::Element(element), width)?;
            }
        }
        if element.page_break_after() {
            self.break_pending = true;
        }
        Ok(())
    }

    /// End (exclusive) of the run of lines from `start` that fit below `current_y` after
    /// `lead`, together with the footnotes each line brings onto the page.
    fn fitting_lines(&mut self, layout: &ParagraphLayout, start: usize, lead: f32) -> Result<usize, Error> {
        let width = self.content_width();
        let n = layout.lines.len();
        let mut ids: Vec<String> = self.footnotes.ids(self.page_number).to_vec();
        let mut used = lead;
        let mut end = start;
        while end < n {
            let line = &layout.lines[end];
            let mut with_line = ids.clone();
            for id in line.note_ids(NoteKind::Footnote) {
                if !with_line.iter().any(|known| known == id) {
                    with_line.push(id.to_string());
                }
            }
            let notes = self
                .footnotes
                .area_height(&self.ctx, with_line.iter().map(String::as_str), width)?;
            let tail = if end + 1 == n { layout.style.padding.bottom } else { 0.0 };
            if self.current_y - used - line.block_height - tail < self.base_bottom + notes - EPSILON {
                break;
            }
            used += line.block_height;
            ids = with_line;
            end += 1;
        }
        Ok(end)
    }

    /// Room the start of `next` needs below a block ending with `after` spacing.
    fn next_lead(&self, next: &Element, after: f32) -> Result<f32, Error> {
        let width = self.content_width();
        let gap = after.max(next.spacing_before());
        let first = match next {
            Element::Paragraph(p) => {
                let layout = build_paragraph_layout(&self.ctx, p, width)?;
                layout.style.padding.top + layout.lines.first().map_or(0.0, |l| l.block_height)
            }
            Element::Table(t) => layout_table(&self.ctx, t, width)?
                .row_heights
                .first()
                .copied()
                .unwrap_or(0.0),
            Element::Image(img) if img.anchor.is_none() => fit_image(img.size(), width, None).height,
            _ => 0.0,
        };
        Ok(gap + first)
    }

    fn place_paragraph(&mut self, para: &'a Paragraph, next: Option<&'a Element>) -> Result<(), Error> {
        let width = self.content_width();
        let layout = build_paragraph_layout(&self.ctx, para, width)?;
        let source = self.ctx.source(para);
        let style = &para.style;
        let contextual = style.contextual_spacing;
        let before = style.spacing_before.unwrap_or(0.0).max(0.0);
        let after = style.spacing_after.unwrap_or(0.0).max(0.0);
        let (widow, orphan) = self.widow_orphan(style);
        let group = self.grouper.group_for(&layout.style);
        let base = base_uid(para.id.as_deref(), "paragraph", para.uid);
        let n = layout.lines.len();
        let whole = layout.content_height();

        if self.page_has_content && (style.keep_together || style.keep_with_next) {
            let lead = self.gap_before(before, contextual) + layout.style.padding.top;
            let fits_here = self.fitting_lines(&layout, 0, lead)? == n;
            let mut needed = whole;
            let mut move_on = style.keep_together && !fits_here;
            if style.keep_with_next
                && fits_here
                && let Some(next) = next
            {
                let lead_next = self.next_lead(next, after)?;
                needed += lead_next;
                move_on = self.current_y - (lead - layout.style.padding.top) - whole - lead_next
                    < self.page_bottom_limit - EPSILON;
            }
            // Only worth it when the move actually helps
            if move_on && needed <= self.fresh_height() + EPSILON {
                log::debug!("Keeping {base} together on page {}", self.page_number + 1);
                self.break_page()?;
            }
        }

        let mut start = 0;
        let mut index = 0;
        while start < n {
            let first = start == 0;
            let gap = if first { self.gap_before(before, contextual) } else { 0.0 };
            let lead = gap + if first { layout.style.padding.top } else { 0.0 };
            let natural = self.fitting_lines(&layout, start, lead)?;
            let mut end = keep_widows_and_orphans(start, natural, n, widow, orphan);
            if end == start && !self.page_has_content {
                // Nothing placed yet on this page: take what fits, at least one line
                end = natural.max(start + 1);
            }
            if end == start {
                self.break_page()?;
                continue;
            }
            if end < n {
                log::debug!("Splitting {base} after line {end} of {n} on page {}", self.page_number);
            }

            let segment = if first && end == n {
                layout.clone()
            } else {
                Arc::new(layout.segment(start..end, index))
            };
            let top = self.current_y - gap;
            let frame = Rect::from_top(self.left(), top, width, segment.content_height());

            if let Some(group) = group
                && let Some(page) = self.pages.last_mut()
            {
                self.grouper
                    .attach(page, group, &layout.style, frame, first, &mut self.sequence);
            }

            let refs: Vec<(NoteKind, String)> = layout.lines[start..end]
                .iter()
                .flat_map(|line| {
                    line.items
                        .iter()
                        .flat_map(|item| item.data.notes.iter())
                        .map(|mark| (mark.kind, mark.id.clone()))
                })
                .collect();
            self.register_notes(refs)?;

            self.push_block(
                frame,
                BlockType::Paragraph,
                BlockContent::Paragraph {
                    layout: segment,
                    source: source.clone(),
                },
                layout.style.clone(),
                format!("{base}_seg{index}"),
                Some(SegmentInfo {
                    base_uid: base.clone(),
                    index,
                    count: 0,
                }),
            );
            if first {
                self.place_overlays(&layout.overlays, frame);
            }

            self.current_y = frame.y;
            self.page_has_content = true;
            self.prev_contextual = contextual;
            self.pending_spacing_after = if end == n { after } else { 0.0 };

            start = end;
            index += 1;
            if start < n {
                self.break_page()?;
            }
        }
        Ok(())
    }

    /// Floating content, positioned from its anchor. `anchor_frame` is the owning block.
    fn place_overlays(&mut self, overlays: &[Overlay], anchor_frame: Rect) {
        let page = *self.ctx.page();
        for overlay in overlays {
            let anchor = overlay.anchor;
            let x = match anchor.h_relative_from {
                AnchorFrame::Page => anchor.x,
                AnchorFrame::Margin => page.margins.left + anchor.x,
                AnchorFrame::Paragraph => anchor_frame.x + anchor.x,
            };
            let top = match anchor.v_relative_from {
                AnchorFrame::Page => page.height() - anchor.y,
                AnchorFrame::Margin => page.body_top() - anchor.y,
                AnchorFrame::Paragraph => anchor_frame.top() - anchor.y,
            };
            let frame = Rect::from_top(x, top, overlay.width, overlay.height);
            let (block_type, content, style) = flow_block(overlay.content.clone(), overlay.width, overlay.height);
            let uid = format!("overlay_{}", overlay.source_uid);
            self.push_block(frame, block_type, content, style, uid, None);
        }
    }

    /// Rows from `start` that fit on the page below `lead`, header rows repeated on
    /// continuation segments included. Footnotes referenced from a row's cells must fit
    /// together with the row.
    fn fitting_rows(&mut self, table: &Table, layout: &TableLayout, start: usize, lead: f32) -> Result<usize, Error> {
        let width = self.content_width();
        let headers: f32 = if start > 0 {
            layout.row_heights[..layout.header_rows.min(start)].iter().sum()
        } else {
            0.0
        };
        let mut ids: Vec<String> = self.footnotes.ids(self.page_number).to_vec();
        let mut used = lead + headers;
        let mut end = start;
        for (h, row) in layout.row_heights[start..].iter().zip(&table.rows[start..]) {
            let mut with_row = ids.clone();
            let refs = row.cells.iter().flat_map(|cell| note_refs(&cell.content));
            for (kind, id) in refs {
                if kind == NoteKind::Footnote && !with_row.contains(&id) {
                    with_row.push(id);
                }
            }
            let notes = self
                .footnotes
                .area_height(&self.ctx, with_row.iter().map(String::as_str), width)?;
            if self.current_y - used - h < self.base_bottom + notes - EPSILON {
                break;
            }
            used += h;
            ids = with_row;
            end += 1;
        }
        Ok(end)
    }

    fn place_table(&mut self, table: &'a Table) -> Result<(), Error> {
        let width = self.content_width();
        let layout = layout_table(&self.ctx, table, width)?;
        let rows = layout.row_heights.len();
        if rows == 0 {
            log::debug!("Skipping table {} without rows", table.uid);
            return Ok(());
        }
        let before = table.style.spacing_before.unwrap_or(0.0).max(0.0);
        let after = table.style.spacing_after.unwrap_or(0.0).max(0.0);
        let x = self.left()
            + match table.style.alignment {
                Some(a @ (Alignment::Center | Alignment::Right)) => align_offset(Some(a), layout.width(), width),
                _ => layout.indent,
            };
        let base = base_uid(table.id.as_deref(), "table", table.uid);

        let mut gap = self.gap_before(before, false);
        if self.page_has_content
            && gap + layout.height() > self.available() + EPSILON
            && layout.height() <= self.fresh_height() + EPSILON
        {
            self.break_page()?;
            gap = self.gap_before(before, false);
        }

        let mut start = 0;
        let mut index = 0;
        while start < rows {
            let mut end = self.fitting_rows(table, &layout, start, gap)?;
            if end == start && !self.page_has_content {
                end = start + 1;
            }
            if end == start {
                self.break_page()?;
                gap = self.gap_before(before, false);
                continue;
            }
            if start > 0 || end < rows {
                log::debug!("Table {base} rows {start}..{end} on page {}", self.page_number);
            }
            let segment = layout.segment(start..end);
            let frame = Rect::from_top(x, self.current_y - gap, segment.width(), segment.height());

            let refs = table.rows[start..end]
                .iter()
                .flat_map(|row| row.cells.iter())
                .flat_map(|cell| note_refs(&cell.content));
            let refs: Vec<_> = refs.collect();
            self.register_notes(refs)?;

            self.push_block(
                frame,
                BlockType::Table,
                BlockContent::Table(segment),
                BoxStyle::default(),
                format!("{base}_seg{index}"),
                Some(SegmentInfo {
                    base_uid: base.clone(),
                    index,
                    count: 0,
                }),
            );
            self.current_y = frame.y;
            self.page_has_content = true;
            self.prev_contextual = false;
            self.pending_spacing_after = if end == rows { after } else { 0.0 };

            start = end;
            index += 1;
            if start < rows {
                self.break_page()?;
                gap = 0.0;
            }
        }
        Ok(())
    }

    fn place_boxed(&mut self, boxed: Boxed) -> Result<(), Error> {
        let mut gap = self.gap_before(boxed.before, false);
        if self.page_has_content && gap + boxed.height > self.available() + EPSILON {
            self.break_page()?;
            gap = self.gap_before(boxed.before, false);
        }
        let frame = Rect::from_top(
            self.left() + boxed.x_offset,
            self.current_y - gap,
            boxed.width,
            boxed.height,
        );
        self.push_block(frame, boxed.block_type, boxed.content, boxed.style, boxed.uid, None);
        self.current_y = frame.y;
        self.page_has_content = true;
        self.prev_contextual = false;
        self.pending_spacing_after = boxed.after;
        Ok(())
    }

    /// Anchored elements float at their anchor, measured from the current position.
    fn place_anchored(&mut self, overlay: Overlay) {
        let frame = Rect::from_top(self.left(), self.current_y, self.content_width(), 0.0);
        self.place_overlays(std::slice::from_ref(&overlay), frame);
    }

    fn place_image(&mut self, image: &'a Image) -> Result<(), Error> {
        let width = self.content_width();
        if let Some(anchor) = image.anchor {
            let (w, h) = image.size();
            self.place_anchored(Overlay {
                source_uid: image.uid,
                anchor,
                width: w,
                height: h,
                content: FlowContent::Image(ImageBox {
                    width: w,
                    height: h,
                    description: image.description.clone(),
                }),
            });
            return Ok(());
        }
        let fitted = fit_image(image.size(), width, image.description.clone());
        self.place_boxed(Boxed {
            x_offset: align_offset(image.style.alignment, fitted.width, width),
            width: fitted.width,
            height: fitted.height,
            block_type: BlockType::Image,
            content: BlockContent::Image(fitted),
            style: BoxStyle::default(),
            uid: base_uid(image.id.as_deref(), "image", image.uid),
            before: image.style.spacing_before.unwrap_or(0.0).max(0.0),
            after: image.style.spacing_after.unwrap_or(0.0).max(0.0),
        })
    }

    fn place_textbox(&mut self, textbox: &'a Textbox) -> Result<(), Error> {
        let width = self.content_width();
        let (w, h, content) = textbox_content(&self.ctx, textbox, width)?;
        if let Some(anchor) = textbox.anchor {
            self.place_anchored(Overlay {
                source_uid: textbox.uid,
                anchor,
                width: w,
                height: h,
                content,
            });
            return Ok(());
        }
        let (block_type, content, style) = flow_block(content, w, h);
        self.place_boxed(Boxed {
            x_offset: align_offset(textbox.style.alignment, w, width),
            width: w,
            height: h,
            block_type,
            content,
            style,
            uid: base_uid(textbox.id.as_deref(), "textbox", textbox.uid),
            before: textbox.style.spacing_before.unwrap_or(0.0).max(0.0),
            after: textbox.style.spacing_after.unwrap_or(0.0).max(0.0),
        })
    }

    /// All endnotes in one block after the body, on a new page when they do not fit.
    fn place_endnotes(&mut self) -> Result<(), Error> {
        if self.endnote_ids.is_empty() {
            return Ok(());
        }
        if std::mem::take(&mut self.break_pending) {
            self.break_page()?;
        }
        let width = self.content_width();
        let ids = self.endnote_ids.clone();
        let area = self
            .endnotes
            .area(&self.ctx, ids.iter().map(String::as_str), width)?;
        let height = area.separator_height + area.entries.iter().map(|e| e.height).sum::<f32>();
        let mut gap = self.gap_before(0.0, false);
        if self.page_has_content && gap + height > self.available() + EPSILON {
            self.break_page()?;
            gap = self.gap_before(0.0, false);
        }
        let frame = Rect::from_top(self.left(), self.current_y - gap, width, height);
        self.push_block(frame, BlockType::Endnotes, BlockContent::Notes(area), BoxStyle::default(), "endnotes".into(), None);
        self.current_y = frame.y;
        self.page_has_content = true;
        Ok(())
    }

    /// Fill in segment counts. Elements that ended up in one piece keep their plain uid.
    fn tag_segments(&mut self) {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for block in self.pages.iter().flat_map(|p| p.blocks.iter()) {
            if let Some(segment) = &block.segment {
                *counts.entry(segment.base_uid.clone()).or_default() += 1;
            }
        }
        for block in self.pages.iter_mut().flat_map(|p| p.blocks.iter_mut()) {
            let Some(segment) = block.segment.as_mut() else {
                continue;
            };
            let count = counts.get(&segment.base_uid).copied().unwrap_or(1);
            if count > 1 {
                segment.count = count;
            } else {
                block.source_uid = segment.base_uid.clone();
                block.segment = None;
            }
        }
    }

    /// Watermarks, headers and footers go in front of each page's body blocks.
    fn decorate_pages(&mut self) -> Result<(), Error> {
        let structure = self.ctx.structure;
        let page = *self.ctx.page();
        let width = page.content_width();
        let body_marks: Vec<&Element> = structure.body.iter().filter(|e| e.is_watermark()).collect();

        for out in &mut self.pages {
            let n = out.number;
            let header = structure.headers.for_page(n, structure.different_first_page);
            let footer = structure.footers.for_page(n, structure.different_first_page);
            let mut front = Vec::new();

            for mark in header
                .iter()
                .filter(|e| e.is_watermark())
                .chain(body_marks.iter().copied())
            {
                let (_, w, h, content) = layout_item(&self.ctx, mark, width)?;
                front.push(LayoutBlock {
                    frame: Rect::new(0.0, 0.0, page.width(), page.height()),
                    block_type: BlockType::Watermark,
                    content: BlockContent::Flow {
                        items: vec![FlowItem {
                            x: (page.width() - w) / 2.0,
                            y: (page.height() - h) / 2.0,
                            width: w,
                            height: h,
                            content,
                        }],
                        overlays: Vec::new(),
                    },
                    style: BoxStyle::default(),
                    page_number: n,
                    source_uid: format!("watermark_{}", mark.uid()),
                    sequence: 0,
                    segment: None,
                });
            }

            for (set, block_type) in [(header, BlockType::Header), (footer, BlockType::Footer)] {
                let flow = layout_flow(&self.ctx, set, width)?;
                if flow.items.is_empty() {
                    continue;
                }
                let frame = match block_type {
                    BlockType::Header => {
                        Rect::from_top(page.margins.left, page.height() - page.header_margin, width, flow.height)
                    }
                    _ => Rect::new(page.margins.left, page.footer_margin, width, flow.height),
                };
                front.push(LayoutBlock {
                    frame,
                    block_type,
                    content: BlockContent::Flow {
                        items: flow.items,
                        overlays: Vec::new(),
                    },
                    style: BoxStyle::default(),
                    page_number: n,
                    source_uid: format!("{}_{n}", block_type.as_str()),
                    sequence: 0,
                    segment: None,
                });
            }

            front.append(&mut out.blocks);
            out.blocks = front;
        }

        // Decorations paint first: renumber so `sequence` follows the block lists
        let mut sequence = 0;
        for block in self.pages.iter_mut().flat_map(|p| p.blocks.iter_mut()) {
            sequence += 1;
            block.sequence = sequence;
        }
        self.sequence = sequence;
        Ok(())
    }
}
