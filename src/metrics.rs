use std::sync::Arc;

use serde::Serialize;

use crate::breaker::{LineBreaker, measurable};
use crate::config::{DEFAULT_FONT_SIZE, MetricsBackend};
use crate::fonts::{self, DEFAULT_FONT_FAMILY, FontMetrics};
use crate::model::RunStyle;

/// Advance of one character, in ems, when no font metrics are available.
pub const APPROX_CHAR_WIDTH: f32 = 0.6;
pub const DEFAULT_LINE_SPACING: f32 = 1.2;
const FALLBACK_ASCENT: f32 = 0.8;
const FALLBACK_DESCENT: f32 = 0.2;

/// Resolved font selection for measuring one piece of text.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TextStyle {
    pub family: String,
    pub size: f32,
    pub bold: bool,
    pub italic: bool,
    /// Line height multiplier; 1.2 when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_spacing: Option<f32>,
}

impl Default for TextStyle {
    fn default() -> Self {
        TextStyle::new(DEFAULT_FONT_FAMILY, DEFAULT_FONT_SIZE)
    }
}

impl TextStyle {
    pub fn new(family: impl Into<String>, size: f32) -> Self {
        TextStyle {
            family: family.into(),
            size,
            bold: false,
            italic: false,
            line_spacing: None,
        }
    }

    pub fn from_run(style: &RunStyle, default_size: f32) -> Self {
        let family = resolve_family([
            style.font_name.as_deref(),
            style.font_family.as_deref(),
            style.font_ascii.as_deref(),
            style.font_hansi.as_deref(),
        ]);
        TextStyle {
            family: family.to_string(),
            size: style.font_size.filter(|s| *s > 0.0).unwrap_or(default_size),
            bold: style.bold.unwrap_or(false),
            italic: style.italic.unwrap_or(false),
            line_spacing: None,
        }
    }

    pub fn with_size(&self, size: f32) -> Self {
        TextStyle {
            size,
            ..self.clone()
        }
    }

    pub fn line_height(&self) -> f32 {
        self.size * self.line_spacing.unwrap_or(DEFAULT_LINE_SPACING)
    }
}

/// First non-empty family among `font_name`, `font_family`, `font_ascii`, `font_hAnsi`.
pub fn resolve_family<'a>(candidates: [Option<&'a str>; 4]) -> &'a str {
    candidates
        .into_iter()
        .flatten()
        .map(fonts::primary_font_name)
        .find(|name| !name.is_empty())
        .unwrap_or(DEFAULT_FONT_FAMILY)
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TextMeasure {
    pub width: f32,
    pub height: f32,
    pub line_count: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TextLayout {
    pub width: f32,
    pub height: f32,
    pub line_count: usize,
    pub lines: Vec<String>,
}

/// Width/height measurement for styled text. Pure: the same text and style always
/// produce the same numbers for a given backend and font registry.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TextMetrics {
    backend: MetricsBackend,
    breaker: LineBreaker,
}

impl TextMetrics {
    pub fn new(backend: MetricsBackend) -> Self {
        TextMetrics {
            backend,
            breaker: LineBreaker::default(),
        }
    }

    pub fn approximate() -> Self {
        Self::new(MetricsBackend::Approximate)
    }

    pub fn with_hyphenation(mut self, hyphenate: bool) -> Self {
        self.breaker = LineBreaker::new(hyphenate);
        self
    }

    pub fn backend(&self) -> MetricsBackend {
        self.backend
    }

    pub fn breaker(&self) -> LineBreaker {
        self.breaker
    }

    fn font(&self, style: &TextStyle) -> Option<Arc<FontMetrics>> {
        match self.backend {
            MetricsBackend::Approximate => None,
            MetricsBackend::System => fonts::metrics_for(&style.family, style.bold, style.italic)
                .or_else(|| {
                    log::debug!("No metrics for {}, trying {DEFAULT_FONT_FAMILY}", style.family);
                    fonts::metrics_for(DEFAULT_FONT_FAMILY, style.bold, style.italic)
                }),
        }
    }

    /// Advance width of a single line of text. Tabs count as four spaces.
    pub fn text_width(&self, text: &str, style: &TextStyle) -> f32 {
        if text.is_empty() {
            return 0.0;
        }
        let text = measurable(text);
        match self.font(style) {
            Some(font) => font.text_width(&text, style.size),
            None => text.chars().count() as f32 * style.size * APPROX_CHAR_WIDTH,
        }
    }

    pub fn ascent(&self, style: &TextStyle) -> f32 {
        self.font(style)
            .map(|f| f.ascent(style.size))
            .filter(|a| *a > 0.0)
            .unwrap_or(style.size * FALLBACK_ASCENT)
    }

    pub fn descent(&self, style: &TextStyle) -> f32 {
        self.font(style)
            .map(|f| f.descent(style.size))
            .filter(|d| *d > 0.0)
            .unwrap_or(style.size * FALLBACK_DESCENT)
    }

    /// Size of `text` without wrapping; explicit newlines start new lines.
    pub fn measure_text(&self, text: &str, style: &TextStyle) -> TextMeasure {
        let line_height = style.line_height();
        if text.is_empty() {
            return TextMeasure {
                width: 0.0,
                height: line_height,
                line_count: 1,
            };
        }
        let lines: Vec<&str> = text.split('\n').collect();
        let width = lines
            .iter()
            .map(|line| self.text_width(line, style))
            .fold(0.0, f32::max);
        TextMeasure {
            width,
            height: (lines.len() as f32 * line_height).max(line_height),
            line_count: lines.len(),
        }
    }

    /// Wrap `text` greedily at `max_width` (no limit when `None`).
    pub fn layout_text(&self, text: &str, style: &TextStyle, max_width: Option<f32>) -> TextLayout {
        let line_height = style.line_height();
        let limit = max_width.filter(|w| *w > 0.0).unwrap_or(f32::INFINITY);
        let broken = self.breaker.break_text(self, text, style, limit);
        let width = broken.iter().map(|l| l.width).fold(0.0, f32::max);
        let line_count = broken.len().max(1);
        TextLayout {
            width,
            height: (line_count as f32 * line_height).max(line_height),
            line_count,
            lines: broken.iter().map(|l| l.display_text()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_resolution_order() {
        assert_eq!(resolve_family([None, Some("Times"), Some("Courier"), None]), "Times");
        assert_eq!(resolve_family([Some(""), None, None, Some("Georgia")]), "Georgia");
        assert_eq!(resolve_family([None, None, None, None]), DEFAULT_FONT_FAMILY);
    }

    #[test]
    fn approximate_width() {
        let m = TextMetrics::approximate();
        let style = TextStyle::new("Nope", 10.0);
        assert!((m.text_width("abcd", &style) - 24.0).abs() < 1e-4);
        assert!((m.text_width("\t", &style) - 24.0).abs() < 1e-4);
    }

    #[test]
    fn empty_text_is_one_default_line() {
        let m = TextMetrics::approximate();
        let style = TextStyle::new("Arial", 10.0);
        let measure = m.measure_text("", &style);
        assert_eq!(measure.width, 0.0);
        assert_eq!(measure.line_count, 1);
        assert!((measure.height - 12.0).abs() < 1e-4);
    }

    #[test]
    fn layout_wraps_and_keeps_long_words() {
        let m = TextMetrics::approximate();
        let style = TextStyle::new("Arial", 10.0);
        let layout = m.layout_text("aa bb cc", &style, Some(30.0));
        assert_eq!(layout.lines, vec!["aa bb", "cc"]);
        let layout = m.layout_text("superlongword", &style, Some(1.0));
        assert_eq!(layout.line_count, 1);
        assert_eq!(layout.lines[0], "superlongword");
    }

    #[test]
    fn height_respects_line_spacing() {
        let m = TextMetrics::approximate();
        let mut style = TextStyle::new("Arial", 10.0);
        style.line_spacing = Some(2.0);
        assert!((m.measure_text("a\nb", &style).height - 40.0).abs() < 1e-4);
    }
}
