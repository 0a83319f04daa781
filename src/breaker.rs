use std::borrow::Cow;
use std::ops::Range;

use crate::metrics::{TextMetrics, TextStyle};

/// Slack allowed when comparing accumulated widths against a line limit.
pub(crate) const EPSILON: f32 = 0.01;

pub(crate) const SOFT_HYPHEN: char = '\u{AD}';

/// Tabs are measured as this many spaces.
pub(crate) const TAB_SPACES: &str = "    ";

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BreakAfter {
    Allowed,
    Forced,
    Never,
    /// Optional break inside a word; the payload is the width of the hyphen drawn when taken.
    Hyphen(f32),
}

/// A measured unit of a line: a word with its trailing whitespace, a field, an image.
pub trait Fragment {
    /// Full advance including trailing whitespace.
    fn advance(&self) -> f32;
    /// Part of the advance that hangs past the margin when the line ends here.
    fn trailing_space(&self) -> f32;
    fn break_after(&self) -> BreakAfter;
}

/// Greedy line breaking. `line_width(i)` is the limit for line `i`, so the first line can
/// differ from the rest. A fragment cluster wider than its line is placed on a line of
/// its own instead of being dropped. Returns fragment ranges, one per line.
pub fn wrap<F: Fragment>(frags: &[F], line_width: impl Fn(usize) -> f32) -> Vec<Range<usize>> {
    let mut lines = Vec::new();
    let mut start = 0;
    while start < frags.len() {
        let limit = line_width(lines.len());
        let end = line_end(frags, start, limit);
        lines.push(start..end);
        start = end;
    }
    lines
}

fn line_end<F: Fragment>(frags: &[F], start: usize, limit: f32) -> usize {
    let mut x = 0.0f32;
    let mut best: Option<usize> = None;
    for (i, frag) in frags.iter().enumerate().skip(start) {
        x += frag.advance();
        let visible = x - frag.trailing_space();
        let is_last = i + 1 == frags.len();
        if visible > limit + EPSILON && best.is_some() {
            break;
        }
        let brk = frag.break_after();
        let candidate = match brk {
            _ if is_last => Some(visible),
            BreakAfter::Never => None,
            BreakAfter::Hyphen(w) => Some(visible + w),
            BreakAfter::Allowed | BreakAfter::Forced => Some(visible),
        };
        let Some(width) = candidate else {
            continue;
        };
        if width <= limit + EPSILON {
            best = Some(i + 1);
            if brk == BreakAfter::Forced {
                return i + 1;
            }
        } else if best.is_none() {
            // Nothing fits: the first unbreakable cluster takes the line on its own
            return i + 1;
        } else {
            break;
        }
    }
    best.unwrap_or(frags.len())
}

/// One whitespace-delimited piece of text: a word plus the whitespace that follows it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Segment<'a> {
    pub word: &'a str,
    pub space: &'a str,
    /// The whitespace contains a newline: the line must end after this segment.
    pub forced: bool,
}

/// Split text into word+whitespace segments. Every character of `text` lands in exactly
/// one segment, in order. Leading whitespace forms a segment with an empty word.
pub(crate) fn segments(text: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut seg_start = 0usize;
    let mut space_start: Option<usize> = None;
    for (idx, ch) in text.char_indices() {
        if ch == '\n' {
            let ws = space_start.unwrap_or(idx);
            let end = idx + ch.len_utf8();
            out.push(Segment {
                word: &text[seg_start..ws],
                space: &text[ws..end],
                forced: true,
            });
            seg_start = end;
            space_start = None;
        } else if ch.is_whitespace() {
            space_start.get_or_insert(idx);
        } else if let Some(ws) = space_start.take() {
            out.push(Segment {
                word: &text[seg_start..ws],
                space: &text[ws..idx],
                forced: false,
            });
            seg_start = idx;
        }
    }
    if seg_start < text.len() {
        let ws = space_start.unwrap_or(text.len());
        out.push(Segment {
            word: &text[seg_start..ws],
            space: &text[ws..],
            forced: false,
        });
    }
    out
}

/// Text as it is measured: tabs become four spaces, newlines and soft hyphens vanish.
pub(crate) fn measurable(text: &str) -> Cow<'_, str> {
    if !text.contains(['\t', '\n', '\r', SOFT_HYPHEN]) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        match ch {
            '\t' => out.push_str(TAB_SPACES),
            '\n' | '\r' | SOFT_HYPHEN => {}
            _ => out.push(ch),
        }
    }
    Cow::Owned(out)
}

/// Split a word at its soft hyphens. Each piece but the last keeps its soft hyphen.
pub(crate) fn hyphen_pieces(word: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, ch) in word.char_indices() {
        if ch == SOFT_HYPHEN {
            let end = idx + ch.len_utf8();
            pieces.push(&word[start..end]);
            start = end;
        }
    }
    if start < word.len() || pieces.is_empty() {
        pieces.push(&word[start..]);
    }
    pieces
}

struct TextFragment<'a> {
    raw: Cow<'a, str>,
    advance: f32,
    trailing: f32,
    brk: BreakAfter,
}

impl Fragment for TextFragment<'_> {
    fn advance(&self) -> f32 {
        self.advance
    }

    fn trailing_space(&self) -> f32 {
        self.trailing
    }

    fn break_after(&self) -> BreakAfter {
        self.brk
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BrokenLine {
    /// Source text of the line, whitespace and soft hyphens included.
    pub text: String,
    /// Visible width: trailing whitespace excluded, hyphen included.
    pub width: f32,
    pub hyphenated: bool,
}

impl BrokenLine {
    /// The text as drawn: trailing whitespace trimmed, soft hyphens removed, a hyphen
    /// appended when the line was broken inside a word.
    pub fn display_text(&self) -> String {
        let mut out: String = self
            .text
            .trim_end()
            .chars()
            .filter(|&c| c != SOFT_HYPHEN)
            .collect();
        if self.hyphenated {
            out.push('-');
        }
        out
    }
}

/// Greedy breaker for single-style text, with optional soft-hyphen hyphenation.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LineBreaker {
    pub hyphenate: bool,
}

impl LineBreaker {
    pub fn new(hyphenate: bool) -> Self {
        LineBreaker { hyphenate }
    }

    pub fn break_text(
        &self,
        metrics: &TextMetrics,
        text: &str,
        style: &TextStyle,
        max_width: f32,
    ) -> Vec<BrokenLine> {
        if text.is_empty() {
            return vec![BrokenLine {
                text: String::new(),
                width: 0.0,
                hyphenated: false,
            }];
        }

        let hyphen_w = metrics.text_width("-", style);
        let mut frags: Vec<TextFragment> = Vec::new();
        for seg in segments(text) {
            let space_w = metrics.text_width(&measurable(seg.space), style);
            let pieces = if self.hyphenate {
                hyphen_pieces(seg.word)
            } else {
                vec![seg.word]
            };
            let last = pieces.len() - 1;
            for (i, piece) in pieces.into_iter().enumerate() {
                let word_w = metrics.text_width(&measurable(piece), style);
                if i < last {
                    frags.push(TextFragment {
                        raw: Cow::Borrowed(piece),
                        advance: word_w,
                        trailing: 0.0,
                        brk: BreakAfter::Hyphen(hyphen_w),
                    });
                    continue;
                }
                let mut raw = String::with_capacity(piece.len() + seg.space.len());
                raw.push_str(piece);
                raw.push_str(seg.space);
                frags.push(TextFragment {
                    raw: Cow::Owned(raw),
                    advance: word_w + space_w,
                    trailing: space_w,
                    brk: if seg.forced {
                        BreakAfter::Forced
                    } else {
                        BreakAfter::Allowed
                    },
                });
            }
        }

        wrap(&frags, |_| max_width)
            .into_iter()
            .map(|range| {
                let last = &frags[range.end - 1];
                let hyphenated =
                    range.end < frags.len() && matches!(last.brk, BreakAfter::Hyphen(_));
                let advance: f32 = frags[range.clone()].iter().map(|f| f.advance).sum();
                let mut width = advance - last.trailing;
                if hyphenated {
                    width += hyphen_w;
                }
                BrokenLine {
                    text: frags[range].iter().map(|f| f.raw.as_ref()).collect(),
                    width,
                    hyphenated,
                }
            })
            .collect()
    }
}
