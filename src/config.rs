use serde::{Deserialize, Serialize};

pub const DEFAULT_FONT_SIZE: f32 = 11.0;
pub const DEFAULT_WIDOW_LINES: usize = 2;
pub const DEFAULT_ORPHAN_LINES: usize = 2;
/// Gap reserved above the first footnote for the separator rule.
pub const FOOTNOTE_SEPARATOR_HEIGHT: f32 = 12.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    #[serde(default = "default_margin")]
    pub top: f32,
    #[serde(default = "default_margin")]
    pub bottom: f32,
    #[serde(default = "default_margin")]
    pub left: f32,
    #[serde(default = "default_margin")]
    pub right: f32,
}

fn default_margin() -> f32 {
    72.0
}

impl Default for Margins {
    fn default() -> Self {
        Margins::uniform(72.0)
    }
}

impl Margins {
    pub fn uniform(v: f32) -> Self {
        Margins {
            top: v,
            bottom: v,
            left: v,
            right: v,
        }
    }
}

/// Page geometry of the section being laid out, in points.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageConfig {
    #[serde(default = "default_page_size")]
    pub page_size: (f32, f32),
    #[serde(default)]
    pub margins: Margins,
    #[serde(default = "default_hf_margin")]
    pub header_margin: f32,
    #[serde(default = "default_hf_margin")]
    pub footer_margin: f32,
}

fn default_page_size() -> (f32, f32) {
    (595.0, 842.0)
}

fn default_hf_margin() -> f32 {
    36.0
}

impl Default for PageConfig {
    fn default() -> Self {
        PageConfig {
            page_size: default_page_size(),
            margins: Margins::default(),
            header_margin: default_hf_margin(),
            footer_margin: default_hf_margin(),
        }
    }
}

impl PageConfig {
    pub fn new(width: f32, height: f32, margins: Margins) -> Self {
        PageConfig {
            page_size: (width, height),
            margins,
            ..Default::default()
        }
    }

    pub fn width(&self) -> f32 {
        self.page_size.0
    }

    pub fn height(&self) -> f32 {
        self.page_size.1
    }

    pub fn content_width(&self) -> f32 {
        (self.width() - self.margins.left - self.margins.right).max(0.0)
    }

    pub fn body_top(&self) -> f32 {
        self.height() - self.margins.top
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricsBackend {
    /// Glyph advances from installed or registered fonts, approximation when missing.
    #[default]
    System,
    /// Always `char_count * font_size * 0.6`. Deterministic across machines.
    Approximate,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayoutOptions {
    #[serde(default = "default_widow_lines")]
    pub widow_lines: usize,
    #[serde(default = "default_orphan_lines")]
    pub orphan_lines: usize,
    #[serde(default)]
    pub metrics: MetricsBackend,
    #[serde(default)]
    pub hyphenate: bool,
    #[serde(default = "default_font_size")]
    pub default_font_size: f32,
    #[serde(default = "default_separator")]
    pub footnote_separator_height: f32,
    /// Gap forced between two touching blocks when neither asks for spacing.
    #[serde(default = "default_min_gap")]
    pub min_block_gap: f32,
}

fn default_widow_lines() -> usize {
    DEFAULT_WIDOW_LINES
}

fn default_orphan_lines() -> usize {
    DEFAULT_ORPHAN_LINES
}

fn default_font_size() -> f32 {
    DEFAULT_FONT_SIZE
}

fn default_separator() -> f32 {
    FOOTNOTE_SEPARATOR_HEIGHT
}

fn default_min_gap() -> f32 {
    1.0
}

impl Default for LayoutOptions {
    fn default() -> Self {
        LayoutOptions {
            widow_lines: DEFAULT_WIDOW_LINES,
            orphan_lines: DEFAULT_ORPHAN_LINES,
            metrics: MetricsBackend::System,
            hyphenate: false,
            default_font_size: DEFAULT_FONT_SIZE,
            footnote_separator_height: FOOTNOTE_SEPARATOR_HEIGHT,
            min_block_gap: 1.0,
        }
    }
}
