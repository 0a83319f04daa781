use std::borrow::Cow;
use std::sync::Arc;

use crate::breaker::{self, BreakAfter, Fragment, SOFT_HYPHEN, hyphen_pieces, measurable, segments};
use crate::error::LookupError;
use crate::metrics::{DEFAULT_LINE_SPACING, TextStyle};
use crate::model::{
    Alignment, BorderSpec, Borders, Drawing, DrawingKind, Element, FieldKind, Indent, Padding,
    Paragraph, ParagraphStyle, Run, RunStyle, VertAlign,
};
use crate::unified::{
    BoxStyle, FlowContent, FlowItem, ImageBox, IndentMetrics, InlineBox, InlineData, InlineKind,
    MarkerBox, NoteKind, NoteMark, Overlay, ParagraphLayout, ParagraphLine, ParagraphMetadata,
};

use super::context::LayoutContext;
use super::flow;

/// Superscript, subscript and note reference marks are drawn at this fraction of the size.
pub const SCRIPT_SCALE: f32 = 0.58;
const SUPERSCRIPT_SHIFT: f32 = 0.35;
const SUBSCRIPT_SHIFT: f32 = -0.14;

/// Widths of page fields are estimated so layout does not depend on the final page count.
const PAGE_ESTIMATE: &str = "1";
const NUM_PAGES_ESTIMATE: &str = "10";

/// Lay out a paragraph at `available_width`, memoized per (uid, width).
pub fn build_paragraph_layout(
    ctx: &LayoutContext,
    para: &Paragraph,
    available_width: f32,
) -> Result<Arc<ParagraphLayout>, LookupError> {
    ctx.paragraph_layout(para.uid, available_width, || {
        layout_paragraph(ctx, para, available_width)
    })
}

/// The paragraph's own size, else the common (or largest) explicit run size, else the default.
pub fn base_font_size(para: &Paragraph, default_size: f32) -> f32 {
    if let Some(size) = para.style.font_size.filter(|s| *s > 0.0) {
        return size;
    }
    para.runs
        .iter()
        .filter_map(|r| r.style.font_size)
        .filter(|s| *s > 0.0)
        .reduce(f32::max)
        .unwrap_or(default_size)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineSpacing {
    pub height: f32,
    /// `exact` rule: the height is used as-is, even below the font's extent.
    pub exact: bool,
}

impl LineSpacing {
    fn auto(multiplier: f32, base: f32) -> Self {
        LineSpacing {
            height: multiplier * base,
            exact: false,
        }
    }

    /// Small values are multipliers, larger ones absolute lengths.
    fn guess(value: f32, base: f32) -> Self {
        if value <= 10.0 {
            Self::auto(value, base)
        } else {
            LineSpacing {
                height: value,
                exact: false,
            }
        }
    }
}

pub fn resolve_line_spacing(style: &ParagraphStyle, base: f32) -> LineSpacing {
    let positive = |v: Option<f32>| v.filter(|v| *v > 0.0);
    let multiplier = positive(style.line_spacing);
    let line = positive(style.line);
    // Absolute lengths: explicit points, or `w:line` in twentieths of a point
    let absolute = multiplier.or(line.map(|l| l / 20.0));
    let default = LineSpacing::auto(DEFAULT_LINE_SPACING, base);

    let rule = style.line_spacing_rule.as_deref().map(str::to_ascii_lowercase);
    match rule.as_deref() {
        Some("auto") => {
            LineSpacing::auto(line.map(|l| l / 240.0).or(multiplier).unwrap_or(DEFAULT_LINE_SPACING), base)
        }
        None => match (line, multiplier) {
            (Some(l), _) => LineSpacing::auto(l / 240.0, base),
            (None, Some(v)) => LineSpacing::guess(v, base),
            (None, None) => default,
        },
        Some("exact") => absolute
            .map(|height| LineSpacing {
                height,
                exact: true,
            })
            .unwrap_or(default),
        Some("atleast") => absolute
            .map(|v| LineSpacing {
                height: v.max(base),
                exact: false,
            })
            .unwrap_or(default),
        Some(other) => {
            log::debug!("Unknown line spacing rule {other:?}, guessing from value");
            absolute.map(|v| LineSpacing::guess(v, base)).unwrap_or(default)
        }
    }
}

/// Resolve indentation. When `hanging` is present the first line always starts at
/// `left - hanging` and an explicit `first_line` is ignored.
// TODO: drop the hanging override once the parser stops emitting stale first_line values
pub fn resolve_indent(indent: &Indent, has_marker: bool) -> IndentMetrics {
    let left = indent.left.unwrap_or(0.0);
    let right = indent.right.unwrap_or(0.0);
    let hanging = indent.hanging.unwrap_or(0.0);
    let first_line = match indent.hanging {
        Some(h) => left - h,
        None => left + indent.first_line.unwrap_or(0.0),
    };
    IndentMetrics {
        left,
        right,
        hanging,
        first_line,
        text_position: if has_marker { left } else { first_line },
        number_position: left - hanging,
    }
}

/// Background, borders and the padding they imply: border `space + width` per side
/// plus any explicit padding.
pub(crate) fn box_style(style: &ParagraphStyle) -> BoxStyle {
    let side = |b: &Option<BorderSpec>| {
        Borders::visible(b)
            .map(|b| b.space + b.width)
            .unwrap_or(0.0)
    };
    let extra = style.padding.unwrap_or_default();
    let borders = &style.borders;
    BoxStyle {
        background: style.background_color().map(str::to_string),
        borders: borders.clone(),
        padding: Padding {
            top: side(&borders.top) + extra.top,
            bottom: side(&borders.bottom) + extra.bottom,
            left: side(&borders.left) + extra.left,
            right: side(&borders.right) + extra.right,
        },
    }
}

fn script_font(style: &RunStyle, base: f32) -> (TextStyle, f32) {
    let font = TextStyle::from_run(style, base);
    let size = font.size;
    match style.vertical_align.unwrap_or_default() {
        VertAlign::Baseline => (font, 0.0),
        VertAlign::Superscript => (font.with_size(size * SCRIPT_SCALE), size * SUPERSCRIPT_SHIFT),
        VertAlign::Subscript => (font.with_size(size * SCRIPT_SCALE), size * SUBSCRIPT_SHIFT),
    }
}

struct Token {
    kind: InlineKind,
    text: String,
    raw: String,
    /// Visible width: the word plus any note marks glued to it.
    box_width: f32,
    space_width: f32,
    font: TextStyle,
    color: Option<String>,
    highlight: Option<String>,
    underline: bool,
    strike: bool,
    baseline_shift: f32,
    ascent: f32,
    descent: f32,
    brk: BreakAfter,
    field: Option<FieldKind>,
    notes: Vec<NoteMark>,
    image: Option<ImageBox>,
    flow: Vec<FlowItem>,
}

impl Token {
    fn is_blank(&self) -> bool {
        self.text.is_empty()
            && self.notes.is_empty()
            && self.field.is_none()
            && self.image.is_none()
            && self.flow.is_empty()
    }

    fn into_box(self, x: f32, hyphen: Option<f32>) -> InlineBox {
        let mut text = self.text;
        let mut width = self.box_width;
        if let Some(hyphen_w) = hyphen {
            text.push('-');
            width += hyphen_w;
        }
        InlineBox {
            kind: self.kind,
            x,
            width,
            ascent: self.ascent,
            descent: self.descent,
            data: InlineData {
                text,
                raw: self.raw,
                font: self.font,
                color: self.color,
                highlight: self.highlight,
                underline: self.underline,
                strike: self.strike,
                baseline_shift: self.baseline_shift,
                field: self.field,
                notes: self.notes,
                image: self.image,
                flow: self.flow,
            },
        }
    }
}

impl Fragment for Token {
    fn advance(&self) -> f32 {
        self.box_width + self.space_width
    }

    fn trailing_space(&self) -> f32 {
        self.space_width
    }

    fn break_after(&self) -> BreakAfter {
        self.brk
    }
}

/// Turns runs into measured tokens and collects anchored content on the way.
struct Tokenizer<'c, 'a> {
    ctx: &'c LayoutContext<'a>,
    para: &'c Paragraph,
    base_size: f32,
    content_width: f32,
    tokens: Vec<Token>,
    overlays: Vec<Overlay>,
}

impl Tokenizer<'_, '_> {
    fn token(&self, style: &RunStyle, font: TextStyle, shift: f32) -> Token {
        let metrics = &self.ctx.metrics;
        Token {
            kind: InlineKind::TextRun,
            text: String::new(),
            raw: String::new(),
            box_width: 0.0,
            space_width: 0.0,
            ascent: (metrics.ascent(&font) + shift).max(0.0),
            descent: (metrics.descent(&font) - shift).max(0.0),
            font,
            color: style.color.clone(),
            highlight: style.highlight.clone(),
            underline: style.underline.unwrap_or(false),
            strike: style.strike.unwrap_or(false),
            baseline_shift: shift,
            brk: BreakAfter::Allowed,
            field: None,
            notes: Vec::new(),
            image: None,
            flow: Vec::new(),
        }
    }

    fn push_run(&mut self, run: &Run) -> Result<(), LookupError> {
        let style = run.style.inherit(&self.para.style);
        let (font, shift) = script_font(&style, self.base_size);
        let first_new = self.tokens.len();

        let text: Cow<str> = if run.has_tab && !run.text.contains('\t') {
            Cow::Owned(format!("\t{}", run.text))
        } else {
            Cow::Borrowed(&run.text)
        };
        self.push_text(&text, &style, &font, shift);

        for field in &run.fields {
            let field_style = match &field.style {
                Some(s) => style.overridden_by(s),
                None => style.clone(),
            };
            let (field_font, field_shift) = script_font(&field_style, self.base_size);
            let kind = FieldKind::parse(&field.field_type);
            let estimate = match &kind {
                FieldKind::Page => PAGE_ESTIMATE.to_string(),
                FieldKind::NumPages => NUM_PAGES_ESTIMATE.to_string(),
                FieldKind::Other(_) => field.result.clone().unwrap_or_default(),
            };
            let mut token = self.token(&field_style, field_font, field_shift);
            token.kind = InlineKind::Field;
            token.box_width = self.ctx.metrics.text_width(&estimate, &token.font);
            token.raw = estimate.clone();
            token.text = estimate;
            token.field = Some(kind);
            self.tokens.push(token);
        }

        if let Some(drawing) = run.drawing() {
            self.push_drawing(drawing, &style, &font)?;
        } else if run.has_drawing {
            log::debug!("Run flagged has_drawing without drawing data (uid {})", self.para.uid);
        }

        for id in &run.footnote_refs {
            self.attach_note(NoteKind::Footnote, id, &style);
        }
        for id in &run.endnote_refs {
            self.attach_note(NoteKind::Endnote, id, &style);
        }

        if run.has_break {
            let has_new = self.tokens.len() > first_new;
            match self.tokens.last_mut() {
                Some(last) if has_new || last.brk != BreakAfter::Forced => {
                    last.brk = BreakAfter::Forced;
                }
                _ => {
                    let mut token = self.token(&style, font, shift);
                    token.brk = BreakAfter::Forced;
                    self.tokens.push(token);
                }
            }
        }
        Ok(())
    }

    fn push_text(&mut self, text: &str, style: &RunStyle, font: &TextStyle, shift: f32) {
        let metrics = self.ctx.metrics;
        let hyphen_w = metrics.text_width("-", font);
        for seg in segments(text) {
            let space_width = metrics.text_width(&measurable(seg.space), font);
            let pieces = if metrics.breaker().hyphenate {
                hyphen_pieces(seg.word)
            } else {
                vec![seg.word]
            };
            let last = pieces.len() - 1;
            for (i, piece) in pieces.into_iter().enumerate() {
                let mut token = self.token(style, font.clone(), shift);
                token.text = piece.chars().filter(|&c| c != SOFT_HYPHEN).collect();
                token.box_width = metrics.text_width(&measurable(piece), font);
                if i < last {
                    token.raw = piece.to_string();
                    token.brk = BreakAfter::Hyphen(hyphen_w);
                } else {
                    token.raw = format!("{piece}{}", seg.space);
                    token.space_width = space_width;
                    token.brk = if seg.forced {
                        BreakAfter::Forced
                    } else if seg.space.is_empty() {
                        // No whitespace before the next run: keep them on one line
                        BreakAfter::Never
                    } else {
                        BreakAfter::Allowed
                    };
                }
                self.tokens.push(token);
            }
        }
    }

    fn push_drawing(&mut self, drawing: &Drawing, style: &RunStyle, font: &TextStyle) -> Result<(), LookupError> {
        let (width, height) = drawing.size();
        let content = match drawing.kind {
            DrawingKind::Image => FlowContent::Image(ImageBox {
                width,
                height,
                description: drawing.description.clone(),
            }),
            DrawingKind::Textbox => {
                let inner = flow::layout_flow(self.ctx, &drawing.content, width)?;
                FlowContent::Textbox {
                    style: BoxStyle::default(),
                    items: inner.items,
                }
            }
        };

        if let Some(anchor) = drawing.anchor {
            self.overlays.push(Overlay {
                source_uid: self.para.uid,
                anchor,
                width,
                height,
                content,
            });
            return Ok(());
        }

        let scale = if width > self.content_width && self.content_width > 0.0 {
            self.content_width / width
        } else {
            1.0
        };
        let mut token = self.token(style, font.clone(), 0.0);
        token.box_width = width * scale;
        token.ascent = height * scale;
        token.descent = 0.0;
        match content {
            FlowContent::Image(mut image) => {
                token.kind = InlineKind::InlineImage;
                image.width *= scale;
                image.height *= scale;
                token.image = Some(image);
            }
            FlowContent::Textbox { items, .. } => {
                token.kind = InlineKind::InlineTextbox;
                token.ascent = token.ascent.max(items.last().map(|i| i.y + i.height).unwrap_or(0.0));
                token.flow = items;
            }
            FlowContent::Paragraph(_) | FlowContent::Table(_) => {}
        }
        self.tokens.push(token);
        Ok(())
    }

    /// Glue a note reference mark to the last token, after its word.
    fn attach_note(&mut self, kind: NoteKind, id: &str, style: &RunStyle) {
        let font = TextStyle::from_run(style, self.base_size);
        let size = font.size;
        let mark_font = font.with_size(size * SCRIPT_SCALE);
        let label = self.ctx.note_label(kind, id);
        let width = self.ctx.metrics.text_width(&label, &mark_font);
        let shift = size * SUPERSCRIPT_SHIFT;
        let mark_ascent = self.ctx.metrics.ascent(&mark_font) + shift;

        if self.tokens.is_empty() {
            let token = self.token(style, font, 0.0);
            self.tokens.push(token);
        }
        if let Some(token) = self.tokens.last_mut() {
            token.notes.push(NoteMark {
                id: id.to_string(),
                label,
                kind,
                x: token.box_width,
                width,
                font_size: mark_font.size,
                baseline_shift: shift,
            });
            token.box_width += width;
            token.ascent = token.ascent.max(mark_ascent);
        }
    }

    fn push_child(&mut self, child: &Element) -> Result<(), LookupError> {
        let (anchor, content, width, height) = match child {
            Element::Image(image) => {
                let (width, height) = image.size();
                let content = FlowContent::Image(ImageBox {
                    width,
                    height,
                    description: image.description.clone(),
                });
                (image.anchor, content, width, height)
            }
            Element::Textbox(tb) => {
                let (width, height, content) =
                    flow::textbox_content(self.ctx, tb, self.content_width)?;
                (tb.anchor, content, width, height)
            }
            other => {
                let laid = flow::layout_flow(self.ctx, std::slice::from_ref(other), self.content_width)?;
                let content = FlowContent::Textbox {
                    style: BoxStyle::default(),
                    items: laid.items,
                };
                (None, content, self.content_width, laid.height)
            }
        };
        self.overlays.push(Overlay {
            source_uid: child.uid(),
            anchor: anchor.unwrap_or_default(),
            width,
            height,
            content,
        });
        Ok(())
    }
}

/// Uncached paragraph layout.
pub(crate) fn layout_paragraph(
    ctx: &LayoutContext,
    para: &Paragraph,
    available_width: f32,
) -> Result<ParagraphLayout, LookupError> {
    let metrics = ctx.metrics;
    let base_size = base_font_size(para, ctx.options.default_font_size);
    let spacing = resolve_line_spacing(&para.style, base_size);
    let indent = resolve_indent(&para.style.indent, para.numbering.is_some());
    let style = box_style(&para.style);
    let content_width = (available_width - style.padding.left - style.padding.right).max(0.0);

    let mut tokenizer = Tokenizer {
        ctx,
        para,
        base_size,
        content_width,
        tokens: Vec::new(),
        overlays: Vec::new(),
    };
    for run in &para.runs {
        tokenizer.push_run(run)?;
    }
    for child in &para.children {
        tokenizer.push_child(child)?;
    }
    let Tokenizer {
        tokens, overlays, ..
    } = tokenizer;

    let first_width = (content_width - indent.text_position - indent.right).max(0.0);
    let rest_width = (content_width - indent.left - indent.right).max(0.0);
    let ranges = breaker::wrap(&tokens, |i| if i == 0 { first_width } else { rest_width });

    let para_font = TextStyle::from_run(&RunStyle::default().inherit(&para.style), base_size);
    let empty_ascent = metrics.ascent(&para_font);
    let empty_descent = metrics.descent(&para_font);
    let alignment = para.style.alignment.unwrap_or_default();
    let token_count = tokens.len();

    let mut lines: Vec<ParagraphLine> = Vec::with_capacity(ranges.len().max(1));
    let mut tokens = tokens.into_iter();
    let line_count = ranges.len();
    for (li, range) in ranges.into_iter().enumerate() {
        let line_tokens: Vec<Token> = tokens.by_ref().take(range.len()).collect();
        let last_brk = line_tokens.last().map(|t| t.brk);
        let forced = last_brk == Some(BreakAfter::Forced);
        let hyphen = match last_brk {
            Some(BreakAfter::Hyphen(w)) if range.end < token_count => Some(w),
            _ => None,
        };
        let keep = line_tokens
            .iter()
            .rposition(|t| !t.is_blank())
            .map_or(0, |i| i + 1);

        let mut items = Vec::new();
        let mut x = 0.0f32;
        for (i, token) in line_tokens.into_iter().take(keep).enumerate() {
            let advance = token.advance();
            if !token.is_blank() {
                let hyphen = if i + 1 == keep { hyphen } else { None };
                items.push(token.into_box(x, hyphen));
            }
            x += advance;
        }

        let available = if li == 0 { first_width } else { rest_width };
        let is_last = li + 1 == line_count;
        align_items(&mut items, alignment, available, is_last || forced);
        lines.push(finish_line(
            items,
            if li == 0 { indent.text_position } else { indent.left },
            available,
            spacing,
            (empty_ascent, empty_descent),
            forced,
        ));
    }
    if lines.is_empty() {
        lines.push(finish_line(
            Vec::new(),
            indent.text_position,
            first_width,
            spacing,
            (empty_ascent, empty_descent),
            false,
        ));
    }

    let mut y = 0.0;
    for line in &mut lines {
        line.baseline_y = y;
        y += line.block_height;
    }

    let marker = para.numbering.as_ref().map(|marker| {
        let marker_style = marker
            .style
            .as_ref()
            .map(|s| s.inherit(&para.style))
            .unwrap_or_else(|| RunStyle::default().inherit(&para.style));
        let font = TextStyle::from_run(&marker_style, base_size);
        MarkerBox {
            width: metrics.text_width(&marker.text, &font),
            text: marker.text.clone(),
            x: indent.number_position,
            font,
            color: marker_style.color,
        }
    });

    Ok(ParagraphLayout {
        lines,
        overlays,
        style,
        metadata: ParagraphMetadata {
            source_uid: para.uid,
            source_id: para.id.clone(),
            font_size: base_size,
            line_spacing: spacing.height,
            exact_spacing: spacing.exact,
            alignment,
            indent,
            content_width,
            marker,
            segment_index: 0,
        },
    })
}

fn align_items(items: &mut [InlineBox], alignment: Alignment, available: f32, last_or_forced: bool) {
    let width = items.last().map(|i| i.x + i.width).unwrap_or(0.0);
    let slack = (available - width).max(0.0);
    match alignment {
        Alignment::Left => {}
        Alignment::Center => items.iter_mut().for_each(|i| i.x += slack / 2.0),
        Alignment::Right => items.iter_mut().for_each(|i| i.x += slack),
        Alignment::Justify => {
            if last_or_forced || items.len() < 2 {
                return;
            }
            let extra = slack / (items.len() - 1) as f32;
            for (k, item) in items.iter_mut().enumerate() {
                item.x += k as f32 * extra;
            }
        }
    }
}

fn finish_line(
    items: Vec<InlineBox>,
    offset_x: f32,
    available_width: f32,
    spacing: LineSpacing,
    empty_metrics: (f32, f32),
    forced_break: bool,
) -> ParagraphLine {
    let (ascent, descent) = if items.is_empty() {
        empty_metrics
    } else {
        items.iter().fold((0.0f32, 0.0f32), |(a, d), item| {
            (a.max(item.ascent), d.max(item.descent))
        })
    };
    let height = if spacing.exact {
        spacing.height
    } else {
        spacing.height.max(ascent + descent)
    };
    ParagraphLine {
        items,
        offset_x,
        available_width,
        height,
        block_height: height,
        ascent,
        descent,
        baseline_y: 0.0,
        forced_break,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style_with(rule: Option<&str>, line_spacing: Option<f32>, line: Option<f32>) -> ParagraphStyle {
        ParagraphStyle {
            line_spacing_rule: rule.map(str::to_string),
            line_spacing,
            line,
            ..Default::default()
        }
    }

    #[test]
    fn line_spacing_rules() {
        let auto = resolve_line_spacing(&style_with(Some("auto"), None, Some(360.0)), 10.0);
        assert!((auto.height - 15.0).abs() < 1e-4);
        assert!(!auto.exact);

        let exact = resolve_line_spacing(&style_with(Some("exact"), Some(8.0), None), 12.0);
        assert_eq!(exact, LineSpacing { height: 8.0, exact: true });

        let at_least = resolve_line_spacing(&style_with(Some("atLeast"), Some(8.0), None), 12.0);
        assert_eq!(at_least.height, 12.0);

        let guess_mult = resolve_line_spacing(&style_with(Some("weird"), Some(2.0), None), 10.0);
        assert_eq!(guess_mult.height, 20.0);
        let guess_abs = resolve_line_spacing(&style_with(Some("weird"), Some(30.0), None), 10.0);
        assert_eq!(guess_abs.height, 30.0);

        let default = resolve_line_spacing(&ParagraphStyle::default(), 10.0);
        assert!((default.height - 12.0).abs() < 1e-4);
    }

    #[test]
    fn hanging_overrides_first_line() {
        let indent = Indent {
            left: Some(36.0),
            hanging: Some(18.0),
            first_line: Some(50.0),
            ..Default::default()
        };
        let m = resolve_indent(&indent, false);
        assert_eq!(m.first_line, 18.0);
        assert_eq!(m.text_position, 18.0);
        assert_eq!(m.number_position, 18.0);
        assert_eq!(resolve_indent(&indent, true).text_position, 36.0);

        let plain = Indent {
            left: Some(10.0),
            first_line: Some(20.0),
            ..Default::default()
        };
        assert_eq!(resolve_indent(&plain, false).first_line, 30.0);
    }

    #[test]
    fn base_size_prefers_largest_run() {
        let mut para = Paragraph::from_runs(vec![Run::text("a"), Run::text("b")]);
        para.runs[0].style.font_size = Some(10.0);
        para.runs[1].style.font_size = Some(14.0);
        assert_eq!(base_font_size(&para, 11.0), 14.0);
        para.style.font_size = Some(9.0);
        assert_eq!(base_font_size(&para, 11.0), 9.0);
        assert_eq!(base_font_size(&Paragraph::default(), 11.0), 11.0);
    }

    #[test]
    fn border_space_becomes_padding() {
        let style = ParagraphStyle {
            borders: Borders {
                top: Some(BorderSpec {
                    width: 1.0,
                    space: 4.0,
                    color: None,
                    style: Some("single".into()),
                }),
                ..Default::default()
            },
            ..Default::default()
        };
        let boxed = box_style(&style);
        assert_eq!(boxed.padding.top, 5.0);
        assert_eq!(boxed.padding.bottom, 0.0);
    }
}
