mod common;

use docxide_layout::model::{Element, Paragraph, ParagraphStyle, Run};
use docxide_layout::unified::{BlockType, UnifiedLayout};
use docxide_layout::{LayoutAssembler, assemble};

use common::{EPS, blocks_of, exact_para, line_count, para, para_with, pieces, spaced, structure, with_id};

fn page_of(layout: &UnifiedLayout, base: &str) -> Vec<usize> {
    pieces(layout, base).iter().map(|b| b.page_number).collect()
}

#[test]
fn a_single_line_taller_than_the_page_is_forced_onto_it() {
    let layout = assemble(&structure(vec![exact_para("Towering", 900.0)])).expect("assemble");
    assert_eq!(layout.page_count(), 1);

    let blocks = blocks_of(&layout.pages[0], BlockType::Paragraph);
    assert_eq!(blocks.len(), 1);
    let block = blocks[0];
    // One piece only: no segment tag, plain uid
    assert!(block.segment.is_none());
    assert_eq!(block.source_uid, "paragraph_1");
    assert_eq!(line_count(block), 1);
    assert!((block.frame.top() - 770.0).abs() < EPS);
    assert!((block.frame.height - 900.0).abs() < EPS);
}

/// Two 900pt lines: each is forced onto its own page as a separate segment.
#[test]
fn oversized_lines_split_across_two_pages() {
    let body = vec![exact_para("First\nSecond", 900.0)];
    let layout = assemble(&structure(body)).expect("assemble");
    assert_eq!(layout.page_count(), 2);

    let segments = pieces(&layout, "paragraph_1");
    assert_eq!(segments.len(), 2);
    let mut indices = Vec::new();
    for block in &segments {
        let info = block.segment.as_ref().expect("segment info");
        assert_eq!(info.base_uid, "paragraph_1");
        assert_eq!(info.count, 2);
        assert!(block.source_uid.starts_with("paragraph_1"));
        indices.push(info.index);
    }
    assert_eq!(indices, vec![0, 1]);
    assert_eq!(segments[0].page_number, 1);
    assert_eq!(segments[1].page_number, 2);
    assert_ne!(segments[0].source_uid, segments[1].source_uid);
}

#[test]
fn spacing_between_blocks_is_the_larger_value() {
    let body = vec![spaced("Block A", 0.0, 10.0), spaced("Block B", 6.0, 0.0)];
    let layout = assemble(&structure(body)).expect("assemble");
    let page = &layout.pages[0];
    let paragraphs = blocks_of(page, BlockType::Paragraph);
    assert_eq!(paragraphs.len(), 2);
    let gap = paragraphs[0].frame.y - paragraphs[1].frame.top();
    assert!((gap - 10.0).abs() < EPS, "gap {gap}");
}

#[test]
fn touching_blocks_get_the_minimum_gap() {
    let layout = assemble(&structure(vec![para("one"), para("two")])).expect("assemble");
    let paragraphs = blocks_of(&layout.pages[0], BlockType::Paragraph);
    let gap = paragraphs[0].frame.y - paragraphs[1].frame.top();
    assert!((gap - 1.0).abs() < EPS, "gap {gap}");
}

#[test]
fn contextual_spacing_collapses_between_flagged_paragraphs() {
    let contextual = |text: &str| {
        para_with(
            text,
            ParagraphStyle {
                spacing_before: Some(6.0),
                spacing_after: Some(10.0),
                contextual_spacing: true,
                ..Default::default()
            },
        )
    };
    let layout = assemble(&structure(vec![contextual("one"), contextual("two")])).expect("assemble");
    let paragraphs = blocks_of(&layout.pages[0], BlockType::Paragraph);
    let gap = paragraphs[0].frame.y - paragraphs[1].frame.top();
    assert!(gap.abs() < EPS, "gap {gap}");
}

#[test]
fn first_block_starts_at_the_top_margin() {
    let layout = assemble(&structure(vec![para("top")])).expect("assemble");
    let block = &blocks_of(&layout.pages[0], BlockType::Paragraph)[0];
    assert!((block.frame.top() - 770.0).abs() < EPS);
    assert!((block.frame.x - 72.0).abs() < EPS);
    assert!((block.frame.width - 451.0).abs() < EPS);
}

#[test]
fn splits_respect_widows_and_orphans() {
    let mut splits = 0;
    for fillers in 0..70 {
        let mut body: Vec<Element> = (0..fillers).map(|i| para(&format!("filler {i}"))).collect();
        body.push(with_id(para("1\n2\n3\n4\n5\n6"), "target"));
        let layout = assemble(&structure(body)).expect("assemble");
        let segments = pieces(&layout, "target");
        let lines: Vec<usize> = segments.iter().map(|b| line_count(b)).collect();
        assert_eq!(lines.iter().sum::<usize>(), 6, "fillers={fillers}");
        if segments.len() > 1 {
            splits += 1;
            assert!(lines[0] >= 2, "orphan with {fillers} fillers: {lines:?}");
            assert!(lines[lines.len() - 1] >= 2, "widow with {fillers} fillers: {lines:?}");
        }
    }
    assert!(splits > 0, "no filler count produced a split");
}

#[test]
fn disabled_widow_control_splits_anywhere() {
    // 48 one-line fillers leave room for exactly one more line
    let mut body: Vec<Element> = (0..48).map(|i| para(&format!("filler {i}"))).collect();
    let mut target = Paragraph::from_text("1\n2\n3\n4");
    target.id = Some("target".into());
    target.style.widow_control = Some(false);
    body.push(Element::Paragraph(target));
    let layout = assemble(&structure(body)).expect("assemble");
    let lines: Vec<usize> = pieces(&layout, "target").iter().map(|b| line_count(b)).collect();
    assert_eq!(lines.iter().sum::<usize>(), 4);
    assert_eq!(lines.len(), 2, "{lines:?}");
}

#[test]
fn assembling_is_repeatable() {
    let build = || {
        let mut body: Vec<Element> = (0..120)
            .map(|i| spaced(&format!("Paragraph number {i} with a little text in it"), 2.0, 4.0))
            .collect();
        body.insert(30, exact_para("tall\ntall", 400.0));
        structure(body)
    };
    let a = assemble(&build()).expect("assemble");
    let b = assemble(&build()).expect("assemble");
    assert_eq!(a.page_count(), b.page_count());
    let counts = |l: &UnifiedLayout| l.pages.iter().map(|p| p.blocks.len()).collect::<Vec<_>>();
    assert_eq!(counts(&a), counts(&b));

    let input = build();
    let mut assembler = LayoutAssembler::new(&input);
    let first = assembler.assemble().expect("assemble");
    let second = assembler.assemble().expect("assemble");
    assert_eq!(first, second);
    assert_eq!(counts(&first), counts(&a));
}

#[test]
fn page_break_before_starts_a_new_page() {
    let mut second = Paragraph::from_text("second");
    second.page_break_before = true;
    let body = vec![para("first"), Element::Paragraph(second)];
    let layout = assemble(&structure(body)).expect("assemble");
    assert_eq!(layout.page_count(), 2);
    assert_eq!(blocks_of(&layout.pages[1], BlockType::Paragraph).len(), 1);
}

#[test]
fn page_break_on_an_empty_page_is_ignored() {
    let mut first = Paragraph::from_text("first");
    first.page_break_before = true;
    let layout = assemble(&structure(vec![Element::Paragraph(first)])).expect("assemble");
    assert_eq!(layout.page_count(), 1);
}

#[test]
fn page_break_after_moves_the_next_element() {
    let mut first = Paragraph::from_text("first");
    first.page_break_after = true;
    let body = vec![Element::Paragraph(first), para("second")];
    let layout = assemble(&structure(body)).expect("assemble");
    assert_eq!(layout.page_count(), 2);
}

#[test]
fn keep_with_next_moves_a_heading_down() {
    let heading = |keep: bool| {
        let mut p = Paragraph::from_text("Heading");
        p.id = Some("heading".into());
        p.style.keep_with_next = keep;
        Element::Paragraph(p)
    };
    // The filler ends at y=120: the heading fits below it, the 40pt line after it does not
    let body = |keep| vec![exact_para("filler", 650.0), heading(keep), exact_para("next", 40.0)];

    let layout = assemble(&structure(body(true))).expect("assemble");
    assert_eq!(page_of(&layout, "heading"), vec![2]);
    assert_eq!(page_of(&layout, "paragraph_3"), vec![2]);

    let layout = assemble(&structure(body(false))).expect("assemble");
    assert_eq!(page_of(&layout, "heading"), vec![1]);
    assert_eq!(page_of(&layout, "paragraph_3"), vec![2]);
}

#[test]
fn keep_together_moves_the_whole_paragraph() {
    let target = |keep: bool| {
        let mut p = Paragraph::from_text("a\nb\nc\nd");
        p.id = Some("target".into());
        p.style.keep_together = keep;
        p.style.line_spacing_rule = Some("exact".into());
        p.style.line_spacing = Some(20.0);
        Element::Paragraph(p)
    };
    let layout = assemble(&structure(vec![exact_para("filler", 650.0), target(true)])).expect("assemble");
    let segments = pieces(&layout, "target");
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].page_number, 2);
    assert!(segments[0].segment.is_none());
    assert_eq!(segments[0].source_uid, "target");

    let layout = assemble(&structure(vec![exact_para("filler", 650.0), target(false)])).expect("assemble");
    let lines: Vec<usize> = pieces(&layout, "target").iter().map(|b| line_count(b)).collect();
    assert_eq!(lines, vec![2, 2]);
}

#[test]
fn tall_headers_push_the_body_down() {
    let mut input = structure(vec![para("body")]);
    input.headers.default = vec![exact_para("Header", 60.0)];
    input.footers.default = vec![para("Footer")];
    input.index();
    let layout = assemble(&input).expect("assemble");
    let page = &layout.pages[0];

    let header = &blocks_of(page, BlockType::Header)[0];
    assert!((header.frame.top() - 806.0).abs() < EPS);
    assert_eq!(blocks_of(page, BlockType::Footer).len(), 1);
    // Headers and footers come first in paint order
    assert_eq!(page.blocks[0].block_type, BlockType::Header);

    let body = &blocks_of(page, BlockType::Paragraph)[0];
    // 842 - 36 - 60
    assert!((body.frame.top() - 746.0).abs() < EPS);
}

#[test]
fn first_page_header_is_used_once() {
    let mut body: Vec<Element> = vec![para("one")];
    let mut two = Paragraph::from_text("two");
    two.page_break_before = true;
    body.push(Element::Paragraph(two));
    let mut input = structure(body);
    input.different_first_page = true;
    input.headers.default = vec![para("Default header")];
    input.headers.first = Some(Vec::new());
    input.index();
    let layout = assemble(&input).expect("assemble");
    assert_eq!(layout.page_count(), 2);
    assert!(blocks_of(&layout.pages[0], BlockType::Header).is_empty());
    assert_eq!(blocks_of(&layout.pages[1], BlockType::Header).len(), 1);
}

#[test]
fn bordered_paragraphs_share_one_decorator() {
    let bordered = || {
        let mut style = ParagraphStyle::default();
        style.borders.top = Some(docxide_layout::model::BorderSpec {
            width: 1.0,
            space: 1.0,
            color: None,
            style: Some("single".into()),
        });
        para_with("boxed", style)
    };
    let body = vec![bordered(), bordered(), para("plain"), bordered()];
    let layout = assemble(&structure(body)).expect("assemble");
    let page = &layout.pages[0];
    let decorators = blocks_of(page, BlockType::Decorator);
    assert_eq!(decorators.len(), 2);

    let paragraphs = blocks_of(page, BlockType::Paragraph);
    // The first decorator spans both members and is painted before them
    assert!((decorators[0].frame.top() - paragraphs[0].frame.top()).abs() < EPS);
    assert!((decorators[0].frame.y - paragraphs[1].frame.y).abs() < EPS);
    assert!(decorators[0].sequence < paragraphs[0].sequence);
}

#[test]
fn every_page_of_a_long_document_is_filled_within_the_body() {
    let body: Vec<Element> = (0..300)
        .map(|i| {
            let text = format!("Line {i} of a long run of text that wraps across the full width of the page body at least once");
            Element::Paragraph(Paragraph::from_runs(vec![Run::text(text)]))
        })
        .collect();
    let mut input = structure(body);
    input.headers.default = vec![para("Running header")];
    input.footers.default = vec![para("Running footer")];
    input.index();
    let layout = assemble(&input).expect("assemble");
    assert!(layout.page_count() > 5);
    for page in &layout.pages {
        assert_eq!(blocks_of(page, BlockType::Header).len(), 1);
        assert_eq!(blocks_of(page, BlockType::Footer).len(), 1);
        for block in blocks_of(page, BlockType::Paragraph) {
            assert!(block.frame.y >= 72.0 - 0.02, "page {} block below the margin", page.number);
            assert!(block.frame.top() <= 770.0 + 0.02);
        }
    }
    // Sequence numbers follow paint order, headers and footers before the body
    let seqs: Vec<u64> = layout.blocks().map(|b| b.sequence).collect();
    assert!(seqs.windows(2).all(|w| w[0] < w[1]));
    for page in &layout.pages {
        let header = blocks_of(page, BlockType::Header)[0].sequence;
        assert!(blocks_of(page, BlockType::Paragraph).iter().all(|b| b.sequence > header));
    }
}
