use pdf_writer::{Content, Name, Str};

use crate::metrics::TextStyle;
use crate::model::{BorderSpec, Borders, FieldKind, parse_hex_color};
use crate::unified::{
    BlockContent, BoxStyle, CellBox, DecoratorContent, FlowContent, FlowItem, ImageBox,
    InlineBox, InlineKind, LayoutBlock, NoteKind, NotesArea, ParagraphLayout, TableSegment,
};

use super::{Base14, FontSet, to_winansi_bytes};

const BLACK: [u8; 3] = [0, 0, 0];
const PLACEHOLDER_FILL: [u8; 3] = [235, 235, 235];
const PLACEHOLDER_STROKE: [u8; 3] = [160, 160, 160];

fn rgb(color: [u8; 3]) -> (f32, f32, f32) {
    (
        color[0] as f32 / 255.0,
        color[1] as f32 / 255.0,
        color[2] as f32 / 255.0,
    )
}

/// Word highlight names as used by `w:highlight`.
fn highlight_rgb(name: &str) -> Option<[u8; 3]> {
    Some(match name {
        "yellow" => [255, 255, 0],
        "green" => [0, 255, 0],
        "cyan" => [0, 255, 255],
        "magenta" => [255, 0, 255],
        "blue" => [0, 0, 255],
        "red" => [255, 0, 0],
        "darkBlue" => [0, 0, 139],
        "darkCyan" => [0, 139, 139],
        "darkGreen" => [0, 100, 0],
        "darkMagenta" => [139, 0, 139],
        "darkRed" => [139, 0, 0],
        "darkYellow" => [128, 128, 0],
        "darkGray" => [169, 169, 169],
        "lightGray" => [211, 211, 211],
        "black" => [0, 0, 0],
        "white" => [255, 255, 255],
        other => return parse_hex_color(other),
    })
}

/// Paints the blocks of one page into a content stream.
pub(super) struct Painter<'f> {
    content: Content,
    fonts: &'f mut FontSet,
    page_number: usize,
    total_pages: usize,
}

impl<'f> Painter<'f> {
    pub fn new(fonts: &'f mut FontSet, page_number: usize, total_pages: usize) -> Self {
        Painter {
            content: Content::new(),
            fonts,
            page_number,
            total_pages,
        }
    }

    pub fn finish(self) -> Vec<u8> {
        self.content.finish().as_slice().to_vec()
    }

    pub fn block(&mut self, block: &LayoutBlock) {
        let frame = block.frame;
        match &block.content {
            BlockContent::Decorator(deco) => self.decorator(deco, frame.x, frame.y, frame.width, frame.height),
            BlockContent::Paragraph { layout, .. } => self.paragraph(layout, frame.x, frame.top()),
            BlockContent::Table(segment) => self.table(segment, frame.x, frame.top()),
            BlockContent::Image(image) => self.image(image, frame.x, frame.top()),
            BlockContent::Flow { items, overlays } => {
                self.box_style(&block.style, frame.x, frame.y, frame.width, frame.height);
                for item in items.iter().chain(overlays) {
                    self.flow_item(item, frame.x, frame.top());
                }
            }
            BlockContent::Notes(area) => self.notes(area, frame.x, frame.top(), frame.width),
        }
    }

    fn fill_rect(&mut self, color: [u8; 3], x: f32, y: f32, w: f32, h: f32) {
        let (r, g, b) = rgb(color);
        self.content.save_state();
        self.content.set_fill_rgb(r, g, b);
        self.content.rect(x, y, w, h);
        self.content.fill_nonzero();
        self.content.restore_state();
    }

    fn line(&mut self, spec: &BorderSpec, x1: f32, y1: f32, x2: f32, y2: f32) {
        let color = spec.color.as_deref().and_then(parse_hex_color).unwrap_or(BLACK);
        let (r, g, b) = rgb(color);
        self.content.save_state();
        self.content.set_stroke_rgb(r, g, b);
        self.content.set_line_width(spec.width);
        self.content.move_to(x1, y1);
        self.content.line_to(x2, y2);
        self.content.stroke();
        self.content.restore_state();
    }

    /// Background and border sides of a box whose bottom-left corner is (x, y).
    fn box_style(&mut self, style: &BoxStyle, x: f32, y: f32, w: f32, h: f32) {
        if let Some(bg) = style.background.as_deref().and_then(parse_hex_color) {
            self.fill_rect(bg, x, y, w, h);
        }
        self.sides(&style.borders, x, y, w, h, true, true);
    }

    #[allow(clippy::too_many_arguments)]
    fn sides(&mut self, borders: &Borders, x: f32, y: f32, w: f32, h: f32, top: bool, bottom: bool) {
        if top && let Some(b) = Borders::visible(&borders.top) {
            self.line(b, x, y + h, x + w, y + h);
        }
        if bottom && let Some(b) = Borders::visible(&borders.bottom) {
            self.line(b, x, y, x + w, y);
        }
        if let Some(b) = Borders::visible(&borders.left) {
            self.line(b, x, y, x, y + h);
        }
        if let Some(b) = Borders::visible(&borders.right) {
            self.line(b, x + w, y, x + w, y + h);
        }
    }

    fn decorator(&mut self, deco: &DecoratorContent, x: f32, y: f32, w: f32, h: f32) {
        if let Some(bg) = deco.background.as_deref().and_then(parse_hex_color) {
            self.fill_rect(bg, x, y, w, h);
        }
        self.sides(&deco.borders, x, y, w, h, deco.draw_top, deco.draw_bottom);
        if let Some(between) = deco.between_border() {
            for &by in &deco.between {
                self.line(between, x, by, x + w, by);
            }
        }
    }

    fn image(&mut self, image: &ImageBox, x: f32, top: f32) {
        let y = top - image.height;
        self.fill_rect(PLACEHOLDER_FILL, x, y, image.width, image.height);
        let (r, g, b) = rgb(PLACEHOLDER_STROKE);
        self.content.save_state();
        self.content.set_stroke_rgb(r, g, b);
        self.content.set_line_width(0.5);
        self.content.rect(x, y, image.width, image.height);
        self.content.stroke();
        self.content.restore_state();
    }

    fn text(&mut self, font: &TextStyle, color: [u8; 3], x: f32, y: f32, text: &str) {
        let bytes = to_winansi_bytes(text);
        if bytes.is_empty() {
            return;
        }
        let name = self
            .fonts
            .resource_name(Base14::for_family(&font.family, font.bold, font.italic));
        let (r, g, b) = rgb(color);
        self.content.set_fill_rgb(r, g, b);
        self.content.begin_text();
        self.content.set_font(Name(name.as_bytes()), font.size);
        self.content.next_line(x, y);
        self.content.show(Str(&bytes));
        self.content.end_text();
    }

    fn paragraph(&mut self, layout: &ParagraphLayout, x: f32, top: f32) {
        let x0 = x + layout.style.padding.left;
        let y0 = top - layout.style.padding.top;
        if let (Some(marker), Some(first)) = (&layout.metadata.marker, layout.lines.first()) {
            let color = marker.color.as_deref().and_then(parse_hex_color).unwrap_or(BLACK);
            let baseline = y0 - first.baseline_y - first.text_baseline();
            self.text(&marker.font, color, x0 + marker.x, baseline, &marker.text);
        }
        for line in &layout.lines {
            let line_top = y0 - line.baseline_y;
            let baseline = line_top - line.text_baseline();
            for item in &line.items {
                self.inline(item, x0 + line.offset_x + item.x, baseline);
            }
        }
    }

    fn inline(&mut self, item: &InlineBox, x: f32, baseline: f32) {
        let data = &item.data;
        match item.kind {
            InlineKind::InlineImage => {
                if let Some(image) = &data.image {
                    self.image(image, x, baseline + item.ascent);
                }
                return;
            }
            InlineKind::InlineTextbox => {
                for flow in &data.flow {
                    self.flow_item(flow, x, baseline + item.ascent);
                }
                return;
            }
            InlineKind::TextRun | InlineKind::Field => {}
        }

        let text = match &data.field {
            Some(FieldKind::Page) => self.page_number.to_string(),
            Some(FieldKind::NumPages) => self.total_pages.to_string(),
            _ => data.text.clone(),
        };
        let text_width = data
            .notes
            .first()
            .map_or(item.width, |mark| mark.x);
        let y = baseline + data.baseline_shift;

        if let Some(hl) = data.highlight.as_deref().and_then(highlight_rgb) {
            let descent = item.descent;
            self.fill_rect(hl, x, baseline - descent, text_width, item.ascent + descent);
        }
        let color = data.color.as_deref().and_then(parse_hex_color).unwrap_or(BLACK);
        self.text(&data.font, color, x, y, &text);

        let decoration = BorderSpec {
            width: (data.font.size * 0.05).max(0.5),
            space: 0.0,
            color: data.color.clone(),
            style: None,
        };
        if data.underline {
            let uy = y - data.font.size * 0.12;
            self.line(&decoration, x, uy, x + text_width, uy);
        }
        if data.strike {
            let sy = y + data.font.size * 0.3;
            self.line(&decoration, x, sy, x + text_width, sy);
        }

        for mark in &data.notes {
            let font = data.font.with_size(mark.font_size);
            self.text(&font, color, x + mark.x, baseline + mark.baseline_shift, &mark.label);
        }
    }

    fn cell(&mut self, cell: &CellBox, x: f32, top: f32) {
        let cx = x + cell.x;
        let cell_top = top - cell.y;
        let y = cell_top - cell.height;
        if let Some(bg) = cell.shading.as_deref().and_then(parse_hex_color) {
            self.fill_rect(bg, cx, y, cell.width, cell.height);
        }
        let borders = Borders {
            top: cell.borders.top.clone(),
            bottom: cell.borders.bottom.clone(),
            left: cell.borders.left.clone(),
            right: cell.borders.right.clone(),
            between: None,
        };
        self.sides(&borders, cx, y, cell.width, cell.height, true, true);
        if cell.merged {
            return;
        }
        let content_top = cell_top - cell.content_offset();
        for item in &cell.items {
            self.flow_item(item, cx + cell.margins.left, content_top);
        }
    }

    fn table(&mut self, segment: &TableSegment, x: f32, top: f32) {
        let width = segment.width();
        let height = segment.height();
        let b = &segment.borders;
        let outer = Borders {
            top: b.top.clone(),
            bottom: b.bottom.clone(),
            left: b.left.clone(),
            right: b.right.clone(),
            between: None,
        };
        if let Some(inside) = Borders::visible(&b.inside_h) {
            let mut y = top;
            for h in segment.row_heights.iter().take(segment.row_heights.len().saturating_sub(1)) {
                y -= h;
                self.line(inside, x, y, x + width, y);
            }
        }
        if let Some(inside) = Borders::visible(&b.inside_v) {
            let mut cx = x;
            for w in segment.col_widths.iter().take(segment.col_widths.len().saturating_sub(1)) {
                cx += w;
                self.line(inside, cx, top - height, cx, top);
            }
        }
        for cell in &segment.cells {
            self.cell(cell, x, top);
        }
        self.sides(&outer, x, top - height, width, height, true, true);
    }

    fn flow_item(&mut self, item: &FlowItem, x: f32, top: f32) {
        let ix = x + item.x;
        let itop = top - item.y;
        match &item.content {
            FlowContent::Paragraph(layout) => self.paragraph(layout, ix, itop),
            FlowContent::Table(segment) => self.table(segment, ix, itop),
            FlowContent::Image(image) => self.image(image, ix, itop),
            FlowContent::Textbox { style, items } => {
                self.box_style(style, ix, itop - item.height, item.width, item.height);
                for inner in items {
                    self.flow_item(inner, ix, itop);
                }
            }
        }
    }

    fn notes(&mut self, area: &NotesArea, x: f32, top: f32, width: f32) {
        if area.entries.is_empty() {
            return;
        }
        let rule = BorderSpec {
            width: 0.5,
            space: 0.0,
            color: None,
            style: None,
        };
        let rule_y = top - area.separator_height / 2.0;
        let rule_len = match area.kind {
            NoteKind::Footnote => width / 3.0,
            NoteKind::Endnote => width,
        };
        self.line(&rule, x, rule_y, x + rule_len, rule_y);
        let body_top = top - area.separator_height;
        for entry in &area.entries {
            for item in &entry.items {
                self.flow_item(item, x, body_top - entry.y);
            }
        }
    }
}
