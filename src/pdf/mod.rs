//! PDF output for a finished [`UnifiedLayout`], drawn with the standard 14 fonts.

mod paint;

use std::time::Instant;

use pdf_writer::{Filter, Name, Pdf, Rect, Ref};

use crate::error::Error;
use crate::unified::UnifiedLayout;

use paint::Painter;

/// Standard PDF fonts. Text is WinAnsi encoded, so characters outside that set are dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum Base14 {
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    TimesRoman,
    TimesBold,
    TimesItalic,
    TimesBoldItalic,
    Courier,
    CourierBold,
    CourierOblique,
    CourierBoldOblique,
}

impl Base14 {
    /// Closest standard font for a family name.
    pub fn for_family(family: &str, bold: bool, italic: bool) -> Base14 {
        let lower = family.to_ascii_lowercase();
        let serif = ["times", "cambria", "georgia", "garamond", "book antiqua", "palatino"]
            .iter()
            .any(|f| lower.contains(f))
            || (lower.contains("serif") && !lower.contains("sans"));
        let mono = ["courier", "consolas", "mono", "menlo", "lucida console"]
            .iter()
            .any(|f| lower.contains(f));
        match (mono, serif, bold, italic) {
            (true, _, false, false) => Base14::Courier,
            (true, _, true, false) => Base14::CourierBold,
            (true, _, false, true) => Base14::CourierOblique,
            (true, _, true, true) => Base14::CourierBoldOblique,
            (false, true, false, false) => Base14::TimesRoman,
            (false, true, true, false) => Base14::TimesBold,
            (false, true, false, true) => Base14::TimesItalic,
            (false, true, true, true) => Base14::TimesBoldItalic,
            (false, false, false, false) => Base14::Helvetica,
            (false, false, true, false) => Base14::HelveticaBold,
            (false, false, false, true) => Base14::HelveticaOblique,
            (false, false, true, true) => Base14::HelveticaBoldOblique,
        }
    }

    pub fn postscript_name(&self) -> &'static str {
        match self {
            Base14::Helvetica => "Helvetica",
            Base14::HelveticaBold => "Helvetica-Bold",
            Base14::HelveticaOblique => "Helvetica-Oblique",
            Base14::HelveticaBoldOblique => "Helvetica-BoldOblique",
            Base14::TimesRoman => "Times-Roman",
            Base14::TimesBold => "Times-Bold",
            Base14::TimesItalic => "Times-Italic",
            Base14::TimesBoldItalic => "Times-BoldItalic",
            Base14::Courier => "Courier",
            Base14::CourierBold => "Courier-Bold",
            Base14::CourierOblique => "Courier-Oblique",
            Base14::CourierBoldOblique => "Courier-BoldOblique",
        }
    }
}

/// Fonts used so far, in first-use order. Resource names are `F1`, `F2`, ...
#[derive(Default)]
pub(crate) struct FontSet {
    used: Vec<Base14>,
}

impl FontSet {
    pub fn resource_name(&mut self, font: Base14) -> String {
        let index = match self.used.iter().position(|f| *f == font) {
            Some(i) => i,
            None => {
                self.used.push(font);
                self.used.len() - 1
            }
        };
        format!("F{}", index + 1)
    }
}

/// Map text to WinAnsiEncoding bytes. Characters outside the code page are dropped.
pub(crate) fn to_winansi_bytes(s: &str) -> Vec<u8> {
    s.chars()
        .filter_map(|c| match c as u32 {
            0x0000..=0x007F => Some(c as u8),
            0x00A0..=0x00FF => Some(c as u8),
            0x20AC => Some(0x80),
            0x201A => Some(0x82),
            0x0192 => Some(0x83),
            0x201E => Some(0x84),
            0x2026 => Some(0x85),
            0x2020 => Some(0x86),
            0x2021 => Some(0x87),
            0x02C6 => Some(0x88),
            0x2030 => Some(0x89),
            0x0160 => Some(0x8A),
            0x2039 => Some(0x8B),
            0x0152 => Some(0x8C),
            0x017D => Some(0x8E),
            0x2018 => Some(0x91),
            0x2019 => Some(0x92),
            0x201C => Some(0x93),
            0x201D => Some(0x94),
            0x2022 => Some(0x95), // bullet
            0x2013 => Some(0x96),
            0x2014 => Some(0x97),
            0x02DC => Some(0x98),
            0x2122 => Some(0x99),
            0x0161 => Some(0x9A),
            0x203A => Some(0x9B),
            0x0153 => Some(0x9C),
            0x017E => Some(0x9E),
            0x0178 => Some(0x9F),
            _ => None,
        })
        .collect()
}

/// Render `layout` to PDF bytes.
pub fn compile(layout: &UnifiedLayout) -> Result<Vec<u8>, Error> {
    let t0 = Instant::now();
    if layout.pages.is_empty() {
        return Err(Error::Pdf("layout has no pages".into()));
    }

    let total_pages = layout.page_count();
    let mut fonts = FontSet::default();
    let mut streams = Vec::with_capacity(total_pages);
    for page in &layout.pages {
        let mut painter = Painter::new(&mut fonts, page.number, total_pages);
        for block in &page.blocks {
            painter.block(block);
        }
        streams.push(painter.finish());
    }
    let t_paint = t0.elapsed();

    let mut pdf = Pdf::new();
    let mut next = Ref::new(1);
    let catalog_id = next.bump();
    let pages_id = next.bump();
    let page_ids: Vec<Ref> = layout.pages.iter().map(|_| next.bump()).collect();
    let content_ids: Vec<Ref> = layout.pages.iter().map(|_| next.bump()).collect();
    let font_refs: Vec<(String, Ref)> = fonts
        .used
        .iter()
        .enumerate()
        .map(|(i, font)| {
            let font_ref = next.bump();
            pdf.type1_font(font_ref)
                .base_font(Name(font.postscript_name().as_bytes()))
                .encoding_predefined(Name(b"WinAnsiEncoding"));
            (format!("F{}", i + 1), font_ref)
        })
        .collect();

    for (id, raw) in content_ids.iter().zip(&streams) {
        let compressed = miniz_oxide::deflate::compress_to_vec_zlib(raw, 6);
        pdf.stream(*id, &compressed).filter(Filter::FlateDecode);
    }

    pdf.catalog(catalog_id).pages(pages_id);
    pdf.pages(pages_id)
        .kids(page_ids.iter().copied())
        .count(total_pages as i32);

    for (i, page) in layout.pages.iter().enumerate() {
        let mut out = pdf.page(page_ids[i]);
        out.media_box(Rect::new(0.0, 0.0, page.size.width, page.size.height))
            .parent(pages_id)
            .contents(content_ids[i]);
        let mut resources = out.resources();
        let mut font_dict = resources.fonts();
        for (name, font_ref) in &font_refs {
            font_dict.pair(Name(name.as_bytes()), *font_ref);
        }
    }

    log::info!(
        "PDF phases: paint={:.1}ms, assembly={:.1}ms, pages={total_pages}, fonts={}",
        t_paint.as_secs_f64() * 1000.0,
        (t0.elapsed() - t_paint).as_secs_f64() * 1000.0,
        font_refs.len(),
    );
    Ok(pdf.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_mapping() {
        assert_eq!(Base14::for_family("Times New Roman", false, false), Base14::TimesRoman);
        assert_eq!(Base14::for_family("Consolas", true, false), Base14::CourierBold);
        assert_eq!(Base14::for_family("Arial", false, true), Base14::HelveticaOblique);
        assert_eq!(Base14::for_family("Open Sans", false, false), Base14::Helvetica);
    }

    #[test]
    fn resource_names_are_stable() {
        let mut fonts = FontSet::default();
        assert_eq!(fonts.resource_name(Base14::Helvetica), "F1");
        assert_eq!(fonts.resource_name(Base14::TimesBold), "F2");
        assert_eq!(fonts.resource_name(Base14::Helvetica), "F1");
    }

    #[test]
    fn winansi_drops_unmapped() {
        assert_eq!(to_winansi_bytes("a\u{2022}\u{4e2d}"), vec![b'a', 0x95]);
    }
}
