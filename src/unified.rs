//! Output of a layout pass: pages of absolutely positioned blocks.
//!
//! Page frames use PDF coordinates (origin bottom-left, `frame.y` is the bottom edge).
//! Offsets inside a block (line tops, table rows, flow items) run top-down from the
//! block's top edge.

use std::sync::Arc;

use serde::Serialize;

use crate::config::Margins;
use crate::metrics::TextStyle;
use crate::model::{
    Alignment, Anchor, BorderSpec, Borders, CellBorders, CellMargins, CellVAlign, FieldKind,
    Padding, Paragraph, TableBorders,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle hanging down from `top`.
    pub fn from_top(x: f32, top: f32, width: f32, height: f32) -> Self {
        Rect::new(x, top - height, width, height)
    }

    pub fn top(&self) -> f32 {
        self.y + self.height
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect::new(
            x,
            y,
            self.right().max(other.right()) - x,
            self.top().max(other.top()) - y,
        )
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    Paragraph,
    Table,
    Image,
    Textbox,
    Decorator,
    Header,
    Footer,
    Footnotes,
    Endnotes,
    Watermark,
}

impl BlockType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Paragraph => "paragraph",
            BlockType::Table => "table",
            BlockType::Image => "image",
            BlockType::Textbox => "textbox",
            BlockType::Decorator => "decorator",
            BlockType::Header => "header",
            BlockType::Footer => "footer",
            BlockType::Footnotes => "footnotes",
            BlockType::Endnotes => "endnotes",
            BlockType::Watermark => "watermark",
        }
    }
}

/// Resolved box style of a block: background fill, border sides and inner padding.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BoxStyle {
    pub background: Option<String>,
    pub borders: Borders,
    pub padding: Padding,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteKind {
    Footnote,
    Endnote,
}

/// A footnote/endnote reference drawn after the word that carries it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NoteMark {
    pub id: String,
    pub label: String,
    pub kind: NoteKind,
    /// Offset from the start of the owning inline box.
    pub x: f32,
    pub width: f32,
    pub font_size: f32,
    pub baseline_shift: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InlineKind {
    TextRun,
    Field,
    InlineImage,
    InlineTextbox,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct InlineData {
    /// Text as drawn, without trailing whitespace or soft hyphens.
    pub text: String,
    /// Source text of the token, trailing whitespace included.
    pub raw: String,
    pub font: TextStyle,
    pub color: Option<String>,
    pub highlight: Option<String>,
    pub underline: bool,
    pub strike: bool,
    /// Upward shift of the baseline (negative for subscript).
    pub baseline_shift: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<FieldKind>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<NoteMark>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageBox>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub flow: Vec<FlowItem>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InlineBox {
    pub kind: InlineKind,
    /// Offset from the line start (`ParagraphLine::offset_x`).
    pub x: f32,
    pub width: f32,
    pub ascent: f32,
    pub descent: f32,
    pub data: InlineData,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParagraphLine {
    pub items: Vec<InlineBox>,
    /// Start of the line relative to the paragraph content box.
    pub offset_x: f32,
    pub available_width: f32,
    pub height: f32,
    /// Vertical advance to the next line.
    pub block_height: f32,
    pub ascent: f32,
    pub descent: f32,
    /// Top of the line box, relative to the paragraph content box.
    pub baseline_y: f32,
    /// The line ends in an explicit break rather than a wrap.
    pub forced_break: bool,
}

impl ParagraphLine {
    /// Distance from the top of the line box to the text baseline. Exact line heights
    /// smaller than the font shrink ascent and descent proportionally.
    pub fn text_baseline(&self) -> f32 {
        let extent = self.ascent + self.descent;
        if extent > self.block_height && extent > 0.0 {
            self.block_height * self.ascent / extent
        } else {
            self.ascent
        }
    }

    pub fn width(&self) -> f32 {
        self.items.last().map(|i| i.x + i.width).unwrap_or(0.0)
    }

    pub fn footnote_ids(&self) -> impl Iterator<Item = &str> {
        self.note_ids(NoteKind::Footnote)
    }

    pub fn note_ids(&self, kind: NoteKind) -> impl Iterator<Item = &str> {
        self.items
            .iter()
            .flat_map(|item| item.data.notes.iter())
            .filter(move |mark| mark.kind == kind)
            .map(|mark| mark.id.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct IndentMetrics {
    pub left: f32,
    pub right: f32,
    pub hanging: f32,
    pub first_line: f32,
    pub text_position: f32,
    pub number_position: f32,
}

/// List marker drawn at `number_position` on the first line.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MarkerBox {
    pub text: String,
    pub x: f32,
    pub width: f32,
    pub font: TextStyle,
    pub color: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ParagraphMetadata {
    pub source_uid: u32,
    pub source_id: Option<String>,
    pub font_size: f32,
    pub line_spacing: f32,
    pub exact_spacing: bool,
    pub alignment: Alignment,
    pub indent: IndentMetrics,
    pub content_width: f32,
    pub marker: Option<MarkerBox>,
    pub segment_index: usize,
}

/// Floating content anchored to a paragraph, positioned when the paragraph is placed.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Overlay {
    pub source_uid: u32,
    pub anchor: Anchor,
    pub width: f32,
    pub height: f32,
    pub content: FlowContent,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ParagraphLayout {
    pub lines: Vec<ParagraphLine>,
    pub overlays: Vec<Overlay>,
    pub style: BoxStyle,
    pub metadata: ParagraphMetadata,
}

impl ParagraphLayout {
    pub fn content_height(&self) -> f32 {
        let lines = self
            .lines
            .last()
            .map(|l| l.baseline_y + l.block_height)
            .unwrap_or(0.0);
        self.style.padding.top + lines + self.style.padding.bottom
    }

    /// Lines `range` as a standalone layout. Top padding and overlays stay with the
    /// first segment, bottom padding with the last.
    pub fn segment(&self, range: std::ops::Range<usize>, index: usize) -> ParagraphLayout {
        let first = range.start == 0;
        let last = range.end >= self.lines.len();
        let mut y = 0.0;
        let lines = self.lines[range]
            .iter()
            .map(|line| {
                let mut line = line.clone();
                line.baseline_y = y;
                y += line.block_height;
                line
            })
            .collect();
        let mut style = self.style.clone();
        if !first {
            style.padding.top = 0.0;
        }
        if !last {
            style.padding.bottom = 0.0;
        }
        let mut metadata = self.metadata.clone();
        metadata.segment_index = index;
        if !first {
            metadata.marker = None;
        }
        ParagraphLayout {
            lines,
            overlays: if first { self.overlays.clone() } else { Vec::new() },
            style,
            metadata,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ImageBox {
    pub width: f32,
    pub height: f32,
    pub description: Option<String>,
}

/// Content of one item in a vertical flow (cells, textboxes, headers, notes).
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FlowContent {
    Paragraph(Arc<ParagraphLayout>),
    Table(Box<TableSegment>),
    Image(ImageBox),
    Textbox { style: BoxStyle, items: Vec<FlowItem> },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FlowItem {
    pub x: f32,
    /// Top offset inside the owning flow.
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub content: FlowContent,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CellBox {
    /// Row index inside the segment.
    pub row: usize,
    pub col: usize,
    pub span: usize,
    pub x: f32,
    /// Top offset inside the segment.
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub margins: CellMargins,
    pub vertical_align: CellVAlign,
    pub content_height: f32,
    pub items: Vec<FlowItem>,
    pub shading: Option<String>,
    pub borders: CellBorders,
    /// Covered by a vertically merged cell above; draws no content or top border.
    pub merged: bool,
}

impl CellBox {
    /// Top offset of the content inside the cell, after vertical alignment.
    pub fn content_offset(&self) -> f32 {
        let free = (self.height - self.margins.top - self.margins.bottom - self.content_height)
            .max(0.0);
        self.margins.top
            + match self.vertical_align {
                CellVAlign::Top => 0.0,
                CellVAlign::Center => free / 2.0,
                CellVAlign::Bottom => free,
            }
    }
}

/// The rows of a table placed on one page.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TableSegment {
    pub col_widths: Vec<f32>,
    /// Source row index of each row in this segment.
    pub rows: Vec<usize>,
    pub row_heights: Vec<f32>,
    pub cells: Vec<CellBox>,
    pub borders: TableBorders,
    pub continued: bool,
}

impl TableSegment {
    pub fn width(&self) -> f32 {
        self.col_widths.iter().sum()
    }

    pub fn height(&self) -> f32 {
        self.row_heights.iter().sum()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NoteEntry {
    pub id: String,
    pub label: String,
    /// Top offset inside the notes area (below the separator).
    pub y: f32,
    pub height: f32,
    pub items: Vec<FlowItem>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NotesArea {
    pub kind: NoteKind,
    pub separator_height: f32,
    pub entries: Vec<NoteEntry>,
}

impl NotesArea {
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.id.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DecoratorContent {
    pub group_id: usize,
    pub background: Option<String>,
    pub borders: Borders,
    pub draw_top: bool,
    pub draw_bottom: bool,
    /// Page y of each boundary between two members of the group.
    pub between: Vec<f32>,
}

impl DecoratorContent {
    pub fn between_border(&self) -> Option<&BorderSpec> {
        Borders::visible(&self.borders.between)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BlockContent {
    Paragraph {
        layout: Arc<ParagraphLayout>,
        #[serde(skip)]
        source: Arc<Paragraph>,
    },
    Table(TableSegment),
    Image(ImageBox),
    Flow {
        items: Vec<FlowItem>,
        overlays: Vec<FlowItem>,
    },
    Notes(NotesArea),
    Decorator(DecoratorContent),
}

/// Tag of one piece of an element split across pages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SegmentInfo {
    pub base_uid: String,
    #[serde(rename = "_pagination_segment_index")]
    pub index: usize,
    #[serde(rename = "_pagination_segment_count")]
    pub count: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LayoutBlock {
    pub frame: Rect,
    pub block_type: BlockType,
    pub content: BlockContent,
    pub style: BoxStyle,
    pub page_number: usize,
    pub source_uid: String,
    pub sequence: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment: Option<SegmentInfo>,
}

impl LayoutBlock {
    pub fn paragraph_layout(&self) -> Option<&ParagraphLayout> {
        match &self.content {
            BlockContent::Paragraph { layout, .. } => Some(layout),
            _ => None,
        }
    }

    pub fn notes(&self) -> Option<&NotesArea> {
        match &self.content {
            BlockContent::Notes(area) => Some(area),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Page {
    pub number: usize,
    pub size: Size,
    pub margins: Margins,
    pub blocks: Vec<LayoutBlock>,
}

impl Page {
    pub fn blocks_of(&self, block_type: BlockType) -> impl Iterator<Item = &LayoutBlock> {
        self.blocks
            .iter()
            .filter(move |b| b.block_type == block_type)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct UnifiedLayout {
    pub pages: Vec<Page>,
}

impl UnifiedLayout {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn blocks(&self) -> impl Iterator<Item = &LayoutBlock> {
        self.pages.iter().flat_map(|p| p.blocks.iter())
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
