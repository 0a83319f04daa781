use std::collections::BTreeMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::config::{LayoutOptions, PageConfig};
use crate::error::Error;

/// EMU (English Metric Units) per point. OOXML drawings are sized in EMU.
pub const EMU_PER_PT: f32 = 12700.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    #[serde(alias = "start")]
    Left,
    Center,
    #[serde(alias = "end")]
    Right,
    #[serde(alias = "both", alias = "distribute")]
    Justify,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VertAlign {
    #[default]
    Baseline,
    #[serde(alias = "superScript")]
    Superscript,
    #[serde(alias = "subScript")]
    Subscript,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BorderSpec {
    #[serde(default = "default_border_width")]
    pub width: f32, // line thickness in points
    #[serde(default)]
    pub space: f32, // gap between text and border in points
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
}

fn default_border_width() -> f32 {
    0.5
}

impl BorderSpec {
    /// `none`/`nil` borders come through from the parser but draw nothing.
    pub fn is_visible(&self) -> bool {
        !matches!(self.style.as_deref(), Some("none" | "nil")) && self.width > 0.0
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Borders {
    #[serde(default)]
    pub top: Option<BorderSpec>,
    #[serde(default)]
    pub bottom: Option<BorderSpec>,
    #[serde(default)]
    pub left: Option<BorderSpec>,
    #[serde(default)]
    pub right: Option<BorderSpec>,
    #[serde(default)]
    pub between: Option<BorderSpec>,
}

impl Borders {
    pub fn visible(side: &Option<BorderSpec>) -> Option<&BorderSpec> {
        side.as_ref().filter(|b| b.is_visible())
    }

    pub fn is_empty(&self) -> bool {
        [&self.top, &self.bottom, &self.left, &self.right, &self.between]
            .into_iter()
            .all(|side| Self::visible(side).is_none())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Padding {
    #[serde(default)]
    pub top: f32,
    #[serde(default)]
    pub bottom: f32,
    #[serde(default)]
    pub left: f32,
    #[serde(default)]
    pub right: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Indent {
    #[serde(default)]
    pub left: Option<f32>,
    #[serde(default)]
    pub right: Option<f32>,
    #[serde(default)]
    pub hanging: Option<f32>,
    #[serde(default)]
    pub first_line: Option<f32>,
}

/// Pre-resolved paragraph formatting, as handed over by the style cascade.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParagraphStyle {
    #[serde(default)]
    pub font_name: Option<String>,
    #[serde(default)]
    pub font_family: Option<String>,
    #[serde(default)]
    pub font_ascii: Option<String>,
    #[serde(default, rename = "font_hAnsi", alias = "font_hansi")]
    pub font_hansi: Option<String>,
    #[serde(default)]
    pub font_size: Option<f32>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub bold: Option<bool>,
    #[serde(default)]
    pub italic: Option<bool>,
    #[serde(default)]
    pub underline: Option<bool>,
    #[serde(default)]
    pub alignment: Option<Alignment>,
    #[serde(default)]
    pub spacing_before: Option<f32>,
    #[serde(default)]
    pub spacing_after: Option<f32>,
    #[serde(default)]
    pub line_spacing: Option<f32>,
    #[serde(default)]
    pub line_spacing_rule: Option<String>,
    /// Raw `w:spacing/@w:line` value (240ths of a line for `auto`, twentieths of a point otherwise).
    #[serde(default)]
    pub line: Option<f32>,
    #[serde(default)]
    pub indent: Indent,
    #[serde(default)]
    pub borders: Borders,
    #[serde(default)]
    pub shading: Option<String>,
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub padding: Option<Padding>,
    #[serde(default, alias = "keep_lines")]
    pub keep_together: bool,
    #[serde(default, alias = "keep_next")]
    pub keep_with_next: bool,
    #[serde(default)]
    pub contextual_spacing: bool,
    #[serde(default)]
    pub widow_control: Option<bool>,
    #[serde(default)]
    pub widow_lines: Option<usize>,
    #[serde(default)]
    pub orphan_lines: Option<usize>,
}

impl ParagraphStyle {
    pub fn background_color(&self) -> Option<&str> {
        self.background.as_deref().or(self.shading.as_deref())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStyle {
    #[serde(default)]
    pub font_name: Option<String>,
    #[serde(default)]
    pub font_family: Option<String>,
    #[serde(default)]
    pub font_ascii: Option<String>,
    #[serde(default, rename = "font_hAnsi", alias = "font_hansi")]
    pub font_hansi: Option<String>,
    #[serde(default)]
    pub font_size: Option<f32>,
    #[serde(default)]
    pub bold: Option<bool>,
    #[serde(default)]
    pub italic: Option<bool>,
    #[serde(default)]
    pub underline: Option<bool>,
    #[serde(default, alias = "strikethrough")]
    pub strike: Option<bool>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub highlight: Option<String>,
    #[serde(default)]
    pub vertical_align: Option<VertAlign>,
}

impl RunStyle {
    /// Fill unset attributes from the owning paragraph's style.
    pub fn inherit(&self, para: &ParagraphStyle) -> RunStyle {
        RunStyle {
            font_name: self.font_name.clone().or_else(|| para.font_name.clone()),
            font_family: self.font_family.clone().or_else(|| para.font_family.clone()),
            font_ascii: self.font_ascii.clone().or_else(|| para.font_ascii.clone()),
            font_hansi: self.font_hansi.clone().or_else(|| para.font_hansi.clone()),
            font_size: self.font_size.or(para.font_size),
            bold: self.bold.or(para.bold),
            italic: self.italic.or(para.italic),
            underline: self.underline.or(para.underline),
            strike: self.strike,
            color: self.color.clone().or_else(|| para.color.clone()),
            highlight: self.highlight.clone(),
            vertical_align: self.vertical_align,
        }
    }

    /// Overlay `other` on top of `self`: set attributes in `other` win.
    pub fn overridden_by(&self, other: &RunStyle) -> RunStyle {
        RunStyle {
            font_name: other.font_name.clone().or_else(|| self.font_name.clone()),
            font_family: other.font_family.clone().or_else(|| self.font_family.clone()),
            font_ascii: other.font_ascii.clone().or_else(|| self.font_ascii.clone()),
            font_hansi: other.font_hansi.clone().or_else(|| self.font_hansi.clone()),
            font_size: other.font_size.or(self.font_size),
            bold: other.bold.or(self.bold),
            italic: other.italic.or(self.italic),
            underline: other.underline.or(self.underline),
            strike: other.strike.or(self.strike),
            color: other.color.clone().or_else(|| self.color.clone()),
            highlight: other.highlight.clone().or_else(|| self.highlight.clone()),
            vertical_align: other.vertical_align.or(self.vertical_align),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorFrame {
    Page,
    Margin,
    #[default]
    #[serde(alias = "column", alias = "text")]
    Paragraph,
}

/// Position of floating content, offsets in points measured right/down from the frame origin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default)]
    pub h_relative_from: AnchorFrame,
    #[serde(default)]
    pub v_relative_from: AnchorFrame,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrawingKind {
    #[default]
    Image,
    Textbox,
}

/// A drawing embedded in a run (`w:drawing`): inline when `anchor` is absent.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Drawing {
    #[serde(default)]
    pub kind: DrawingKind,
    #[serde(default)]
    pub width: Option<f32>,
    #[serde(default)]
    pub height: Option<f32>,
    #[serde(default)]
    pub width_emu: Option<f32>,
    #[serde(default)]
    pub height_emu: Option<f32>,
    #[serde(default)]
    pub anchor: Option<Anchor>,
    #[serde(default)]
    pub description: Option<String>,
    /// Textbox content.
    #[serde(default)]
    pub content: Vec<Element>,
}

impl Drawing {
    pub fn size(&self) -> (f32, f32) {
        (
            length_or_emu(self.width, self.width_emu),
            length_or_emu(self.height, self.height_emu),
        )
    }
}

fn length_or_emu(pt: Option<f32>, emu: Option<f32>) -> f32 {
    pt.or_else(|| emu.map(|e| e / EMU_PER_PT))
        .unwrap_or(0.0)
        .max(0.0)
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub field_type: String,
    #[serde(default)]
    pub style: Option<RunStyle>,
    /// Cached result text from the document, used for fields without an estimate.
    #[serde(default)]
    pub result: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum FieldKind {
    Page,
    NumPages,
    Other(String),
}

impl FieldKind {
    pub fn parse(field_type: &str) -> FieldKind {
        let head = field_type.split_whitespace().next().unwrap_or("");
        match head.to_ascii_uppercase().as_str() {
            "PAGE" => FieldKind::Page,
            "NUMPAGES" | "SECTIONPAGES" => FieldKind::NumPages,
            _ => FieldKind::Other(head.to_string()),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Run {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub style: RunStyle,
    #[serde(default)]
    pub has_break: bool,
    #[serde(default)]
    pub has_tab: bool,
    #[serde(default)]
    pub has_drawing: bool,
    #[serde(default)]
    pub drawing: Option<Drawing>,
    #[serde(default)]
    pub footnote_refs: Vec<String>,
    #[serde(default)]
    pub endnote_refs: Vec<String>,
    #[serde(default)]
    pub fields: Vec<Field>,
    /// Placeholder for the note number inside footnote/endnote bodies.
    #[serde(default)]
    pub is_note_mark: bool,
}

impl Run {
    pub fn text(text: impl Into<String>) -> Self {
        Run {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn drawing(&self) -> Option<&Drawing> {
        self.drawing.as_ref()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ListMarker {
    pub text: String,
    #[serde(default)]
    pub style: Option<RunStyle>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    #[serde(skip)]
    pub uid: u32,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub style: ParagraphStyle,
    #[serde(default)]
    pub runs: Vec<Run>,
    /// Non-run children (anchored images and textboxes).
    #[serde(default)]
    pub children: Vec<Element>,
    #[serde(default)]
    pub numbering: Option<ListMarker>,
    #[serde(default)]
    pub page_break_before: bool,
    #[serde(default)]
    pub page_break_after: bool,
    #[serde(default)]
    pub is_watermark: bool,
}

impl Paragraph {
    pub fn from_text(text: impl Into<String>) -> Self {
        Paragraph {
            runs: vec![Run::text(text)],
            ..Default::default()
        }
    }

    pub fn from_runs(runs: Vec<Run>) -> Self {
        Paragraph {
            runs,
            ..Default::default()
        }
    }

    pub fn plain_text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Image {
    #[serde(skip)]
    pub uid: u32,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub width: Option<f32>,
    #[serde(default)]
    pub height: Option<f32>,
    #[serde(default)]
    pub width_emu: Option<f32>,
    #[serde(default)]
    pub height_emu: Option<f32>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub style: ParagraphStyle,
    #[serde(default)]
    pub anchor: Option<Anchor>,
    #[serde(default)]
    pub page_break_before: bool,
    #[serde(default)]
    pub page_break_after: bool,
    #[serde(default)]
    pub is_watermark: bool,
}

impl Image {
    pub fn size(&self) -> (f32, f32) {
        (
            length_or_emu(self.width, self.width_emu),
            length_or_emu(self.height, self.height_emu),
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Textbox {
    #[serde(skip)]
    pub uid: u32,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub width: Option<f32>,
    #[serde(default)]
    pub height: Option<f32>,
    #[serde(default)]
    pub children: Vec<Element>,
    #[serde(default)]
    pub style: ParagraphStyle,
    #[serde(default)]
    pub anchor: Option<Anchor>,
    #[serde(default)]
    pub page_break_before: bool,
    #[serde(default)]
    pub page_break_after: bool,
    #[serde(default)]
    pub is_watermark: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VMerge {
    Restart,
    Continue,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellVAlign {
    #[default]
    Top,
    #[serde(alias = "middle")]
    Center,
    Bottom,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellMargins {
    #[serde(default)]
    pub top: f32,
    #[serde(default = "default_cell_side_margin")]
    pub left: f32,
    #[serde(default)]
    pub bottom: f32,
    #[serde(default = "default_cell_side_margin")]
    pub right: f32,
}

fn default_cell_side_margin() -> f32 {
    5.4
}

impl Default for CellMargins {
    fn default() -> Self {
        Self {
            top: 0.0,
            left: 5.4,
            bottom: 0.0,
            right: 5.4,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TableBorders {
    #[serde(default)]
    pub top: Option<BorderSpec>,
    #[serde(default)]
    pub bottom: Option<BorderSpec>,
    #[serde(default)]
    pub left: Option<BorderSpec>,
    #[serde(default)]
    pub right: Option<BorderSpec>,
    #[serde(default)]
    pub inside_h: Option<BorderSpec>,
    #[serde(default)]
    pub inside_v: Option<BorderSpec>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TableStyle {
    #[serde(default)]
    pub indent: f32,
    #[serde(default)]
    pub cell_margins: Option<CellMargins>,
    #[serde(default)]
    pub borders: TableBorders,
    #[serde(default)]
    pub spacing_before: Option<f32>,
    #[serde(default)]
    pub spacing_after: Option<f32>,
    /// `fixed` keeps grid widths as given; anything else auto-fits to the longest words.
    #[serde(default)]
    pub layout: Option<String>,
    #[serde(default)]
    pub alignment: Option<Alignment>,
}

impl TableStyle {
    pub fn is_fixed_layout(&self) -> bool {
        self.layout.as_deref() == Some("fixed")
    }
}

fn one() -> u32 {
    1
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CellBorders {
    #[serde(default)]
    pub top: Option<BorderSpec>,
    #[serde(default)]
    pub bottom: Option<BorderSpec>,
    #[serde(default)]
    pub left: Option<BorderSpec>,
    #[serde(default)]
    pub right: Option<BorderSpec>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    #[serde(skip)]
    pub uid: u32,
    #[serde(default, alias = "children")]
    pub content: Vec<Element>,
    #[serde(default = "one")]
    pub grid_span: u32,
    #[serde(default)]
    pub v_merge: Option<VMerge>,
    #[serde(default)]
    pub vertical_align: CellVAlign,
    #[serde(default)]
    pub margins: Option<CellMargins>,
    #[serde(default)]
    pub shading: Option<String>,
    #[serde(default)]
    pub borders: CellBorders,
    #[serde(default)]
    pub width: Option<f32>,
}

impl Default for Cell {
    fn default() -> Self {
        Cell {
            uid: 0,
            content: Vec::new(),
            grid_span: 1,
            v_merge: None,
            vertical_align: CellVAlign::Top,
            margins: None,
            shading: None,
            borders: CellBorders::default(),
            width: None,
        }
    }
}

impl Cell {
    pub fn from_text(text: impl Into<String>) -> Self {
        Cell {
            content: vec![Element::Paragraph(Paragraph::from_text(text))],
            ..Default::default()
        }
    }

    pub fn span(&self) -> usize {
        self.grid_span.max(1) as usize
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    #[serde(default)]
    pub cells: Vec<Cell>,
    #[serde(default)]
    pub height: Option<f32>,
    /// `exact`, `atLeast` or `auto`. Every rule treats `height` as a minimum.
    #[serde(default)]
    pub height_rule: Option<String>,
    #[serde(default)]
    pub is_header: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    #[serde(skip)]
    pub uid: u32,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, alias = "grid_cols")]
    pub grid: Vec<f32>,
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(default)]
    pub style: TableStyle,
    #[serde(default)]
    pub page_break_before: bool,
    #[serde(default)]
    pub page_break_after: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UnsupportedElement {
    pub kind: String,
}

/// A body-level logical element, normalized at the parser boundary.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Element {
    Paragraph(Paragraph),
    Table(Table),
    Image(Image),
    Textbox(Textbox),
    Unsupported(UnsupportedElement),
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum KnownElement {
    Paragraph(Paragraph),
    Table(Table),
    Image(Image),
    Textbox(Textbox),
}

impl<'de> Deserialize<'de> for Element {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let kind = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string();
        match kind.as_str() {
            "paragraph" | "table" | "image" | "textbox" => {
                let known = KnownElement::deserialize(value).map_err(D::Error::custom)?;
                Ok(match known {
                    KnownElement::Paragraph(p) => Element::Paragraph(p),
                    KnownElement::Table(t) => Element::Table(t),
                    KnownElement::Image(i) => Element::Image(i),
                    KnownElement::Textbox(t) => Element::Textbox(t),
                })
            }
            _ => Ok(Element::Unsupported(UnsupportedElement { kind })),
        }
    }
}

impl Element {
    pub fn uid(&self) -> u32 {
        match self {
            Element::Paragraph(p) => p.uid,
            Element::Table(t) => t.uid,
            Element::Image(i) => i.uid,
            Element::Textbox(t) => t.uid,
            Element::Unsupported(_) => 0,
        }
    }

    pub fn source_id(&self) -> Option<&str> {
        match self {
            Element::Paragraph(p) => p.id.as_deref(),
            Element::Table(t) => t.id.as_deref(),
            Element::Image(i) => i.id.as_deref(),
            Element::Textbox(t) => t.id.as_deref(),
            Element::Unsupported(_) => None,
        }
    }

    pub fn kind_name(&self) -> &str {
        match self {
            Element::Paragraph(_) => "paragraph",
            Element::Table(_) => "table",
            Element::Image(_) => "image",
            Element::Textbox(_) => "textbox",
            Element::Unsupported(u) => &u.kind,
        }
    }

    pub fn spacing_before(&self) -> f32 {
        match self {
            Element::Paragraph(p) => p.style.spacing_before,
            Element::Table(t) => t.style.spacing_before,
            Element::Image(i) => i.style.spacing_before,
            Element::Textbox(t) => t.style.spacing_before,
            Element::Unsupported(_) => None,
        }
        .unwrap_or(0.0)
        .max(0.0)
    }

    pub fn spacing_after(&self) -> f32 {
        match self {
            Element::Paragraph(p) => p.style.spacing_after,
            Element::Table(t) => t.style.spacing_after,
            Element::Image(i) => i.style.spacing_after,
            Element::Textbox(t) => t.style.spacing_after,
            Element::Unsupported(_) => None,
        }
        .unwrap_or(0.0)
        .max(0.0)
    }

    pub fn page_break_before(&self) -> bool {
        match self {
            Element::Paragraph(p) => p.page_break_before,
            Element::Table(t) => t.page_break_before,
            Element::Image(i) => i.page_break_before,
            Element::Textbox(t) => t.page_break_before,
            Element::Unsupported(_) => false,
        }
    }

    pub fn page_break_after(&self) -> bool {
        match self {
            Element::Paragraph(p) => p.page_break_after,
            Element::Table(t) => t.page_break_after,
            Element::Image(i) => i.page_break_after,
            Element::Textbox(t) => t.page_break_after,
            Element::Unsupported(_) => false,
        }
    }

    pub fn is_watermark(&self) -> bool {
        match self {
            Element::Paragraph(p) => p.is_watermark,
            Element::Image(i) => i.is_watermark,
            Element::Textbox(t) => t.is_watermark,
            Element::Table(_) | Element::Unsupported(_) => false,
        }
    }

    pub fn as_paragraph(&self) -> Option<&Paragraph> {
        match self {
            Element::Paragraph(p) => Some(p),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HeaderFooterSet {
    #[serde(default)]
    pub default: Vec<Element>,
    #[serde(default)]
    pub first: Option<Vec<Element>>,
}

impl HeaderFooterSet {
    pub fn for_page(&self, page_number: usize, different_first_page: bool) -> &[Element] {
        match &self.first {
            Some(first) if different_first_page && page_number == 1 => first,
            _ => &self.default,
        }
    }
}

/// The whole input of one layout pass: page geometry, options and the logical tree.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutStructure {
    #[serde(default)]
    pub page: PageConfig,
    #[serde(default)]
    pub options: LayoutOptions,
    #[serde(default)]
    pub body: Vec<Element>,
    #[serde(default)]
    pub headers: HeaderFooterSet,
    #[serde(default)]
    pub footers: HeaderFooterSet,
    #[serde(default)]
    pub different_first_page: bool,
    #[serde(default)]
    pub footnotes: BTreeMap<String, Vec<Element>>,
    #[serde(default)]
    pub endnotes: BTreeMap<String, Vec<Element>>,
}

impl LayoutStructure {
    pub fn new(page: PageConfig, body: Vec<Element>) -> Self {
        let mut structure = LayoutStructure {
            page,
            body,
            ..Default::default()
        };
        structure.index();
        structure
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, Error> {
        let mut structure: LayoutStructure = serde_json::from_slice(bytes)?;
        structure.index();
        Ok(structure)
    }

    /// Assign stable uids to every element that owns cached layout state.
    /// Idempotent: calling it again renumbers in the same order.
    pub fn index(&mut self) {
        let mut next = 1u32;
        let groups = [
            &mut self.body,
            &mut self.headers.default,
            &mut self.footers.default,
        ];
        for group in groups {
            index_elements(group, &mut next);
        }
        if let Some(first) = self.headers.first.as_mut() {
            index_elements(first, &mut next);
        }
        if let Some(first) = self.footers.first.as_mut() {
            index_elements(first, &mut next);
        }
        for notes in self
            .footnotes
            .values_mut()
            .chain(self.endnotes.values_mut())
        {
            index_elements(notes, &mut next);
        }
    }
}

fn index_elements(elements: &mut [Element], next: &mut u32) {
    for element in elements {
        let uid = *next;
        *next += 1;
        match element {
            Element::Paragraph(p) => {
                p.uid = uid;
                index_elements(&mut p.children, next);
                for run in &mut p.runs {
                    if let Some(drawing) = run.drawing.as_mut() {
                        index_elements(&mut drawing.content, next);
                    }
                }
            }
            Element::Table(t) => {
                t.uid = uid;
                for row in &mut t.rows {
                    for cell in &mut row.cells {
                        cell.uid = *next;
                        *next += 1;
                        index_elements(&mut cell.content, next);
                    }
                }
            }
            Element::Image(i) => i.uid = uid,
            Element::Textbox(t) => {
                t.uid = uid;
                index_elements(&mut t.children, next);
            }
            Element::Unsupported(_) => {}
        }
    }
}

/// Parse an `RRGGBB` hex colour. `auto` and malformed values yield `None`.
pub fn parse_hex_color(val: &str) -> Option<[u8; 3]> {
    let val = val.trim_start_matches('#');
    if val == "auto" || val.len() != 6 || !val.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&val[0..2], 16).ok()?;
    let g = u8::from_str_radix(&val[2..4], 16).ok()?;
    let b = u8::from_str_radix(&val[4..6], 16).ok()?;
    Some([r, g, b])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_element_types_are_kept() {
        let json = br#"{"body": [{"type": "chart", "series": []}, {"type": "paragraph"}]}"#;
        let structure = LayoutStructure::from_json(json).unwrap();
        assert_eq!(structure.body.len(), 2);
        assert_eq!(structure.body[0].kind_name(), "chart");
        assert_eq!(structure.body[1].uid(), 2);
    }

    #[test]
    fn cell_children_alias_and_default_span() {
        let json = br#"{"type": "table", "rows": [{"cells": [{"children": [{"type": "paragraph"}]}]}]}"#;
        let element: Element = serde_json::from_slice(json).unwrap();
        let Element::Table(table) = element else {
            panic!("expected table");
        };
        assert_eq!(table.rows[0].cells[0].grid_span, 1);
        assert_eq!(table.rows[0].cells[0].content.len(), 1);
    }

    #[test]
    fn field_kinds() {
        assert_eq!(FieldKind::parse(" PAGE \\* MERGEFORMAT"), FieldKind::Page);
        assert_eq!(FieldKind::parse("NUMPAGES"), FieldKind::NumPages);
        assert_eq!(FieldKind::parse("DATE"), FieldKind::Other("DATE".into()));
    }

    #[test]
    fn emu_sizes() {
        let img = Image {
            width_emu: Some(914400.0),
            height: Some(36.0),
            ..Default::default()
        };
        assert_eq!(img.size(), (72.0, 36.0));
    }

    #[test]
    fn hex_colors() {
        assert_eq!(parse_hex_color("FF0080"), Some([255, 0, 128]));
        assert_eq!(parse_hex_color("auto"), None);
        assert_eq!(parse_hex_color("12"), None);
    }
}
