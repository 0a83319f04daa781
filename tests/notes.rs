mod common;

use docxide_layout::assemble;
use docxide_layout::model::{Cell, Element, Paragraph, Row, Run, Table};
use docxide_layout::unified::{BlockContent, BlockType, NoteKind};

use common::{EPS, blocks_of, footnoted, para, structure};

#[test]
fn footnote_lands_on_the_referencing_page() {
    let mut input = structure(vec![footnoted("Body text", &["fn1"])]);
    input.footnotes.insert("fn1".into(), vec![para("The note itself.")]);
    input.index();
    let layout = assemble(&input).expect("assemble");
    assert_eq!(layout.page_count(), 1);

    let areas = blocks_of(&layout.pages[0], BlockType::Footnotes);
    assert_eq!(areas.len(), 1);
    let notes = areas[0].notes().expect("notes content");
    assert_eq!(notes.kind, NoteKind::Footnote);
    assert_eq!(notes.ids().collect::<Vec<_>>(), vec!["fn1"]);
    assert_eq!(notes.entries[0].label, "1");
    // The area sits on the bottom margin
    assert!((areas[0].frame.y - 72.0).abs() < EPS);
}

#[test]
fn reference_mark_is_drawn_after_the_word() {
    let mut input = structure(vec![footnoted("Body text", &["fn1"])]);
    input.footnotes.insert("fn1".into(), vec![para("Note.")]);
    input.index();
    let layout = assemble(&input).expect("assemble");
    let block = &blocks_of(&layout.pages[0], BlockType::Paragraph)[0];
    let line = &block.paragraph_layout().expect("paragraph").lines[0];
    let last = line.items.last().expect("items");
    assert_eq!(last.data.text, "text");
    assert_eq!(last.data.notes.len(), 1);
    assert_eq!(last.data.notes[0].label, "1");
    assert!(last.data.notes[0].x > 0.0);
    assert_eq!(line.footnote_ids().collect::<Vec<_>>(), vec!["fn1"]);
}

#[test]
fn labels_follow_first_reference_order() {
    let mut input = structure(vec![footnoted("First", &["zeta"]), footnoted("Second", &["alpha", "zeta"])]);
    input.footnotes.insert("zeta".into(), vec![para("Z")]);
    input.footnotes.insert("alpha".into(), vec![para("A")]);
    input.index();
    let layout = assemble(&input).expect("assemble");
    let area = blocks_of(&layout.pages[0], BlockType::Footnotes)[0]
        .notes()
        .expect("notes");
    let entries: Vec<(&str, &str)> = area
        .entries
        .iter()
        .map(|e| (e.id.as_str(), e.label.as_str()))
        .collect();
    assert_eq!(entries, vec![("zeta", "1"), ("alpha", "2")]);
    // Entries stack top-down inside the area
    assert!(area.entries[1].y >= area.entries[0].y + area.entries[0].height - EPS);
}

#[test]
fn body_text_stays_above_the_footnotes() {
    let mut body = vec![footnoted("Has a note", &["fn1"])];
    body.extend((0..80).map(|i| para(&format!("filler paragraph {i}"))));
    let mut input = structure(body);
    let long_note: Vec<Element> = (0..5).map(|i| para(&format!("Note paragraph {i}"))).collect();
    input.footnotes.insert("fn1".into(), long_note);
    input.index();
    let layout = assemble(&input).expect("assemble");
    assert!(layout.page_count() >= 2);

    let page = &layout.pages[0];
    let area = blocks_of(page, BlockType::Footnotes)[0];
    for block in blocks_of(page, BlockType::Paragraph) {
        assert!(block.frame.y >= area.frame.top() - 0.02, "{} overlaps the notes", block.source_uid);
    }
    // Later pages carry no footnotes
    for page in &layout.pages[1..] {
        assert!(blocks_of(page, BlockType::Footnotes).is_empty());
    }
}

#[test]
fn table_rows_make_room_for_their_footnotes() {
    let cell = |content: Element| Cell {
        content: vec![content],
        ..Default::default()
    };
    let table = Table {
        grid: vec![200.0, 200.0],
        rows: vec![
            Row {
                cells: vec![cell(para("plain")), cell(para("row"))],
                ..Default::default()
            },
            Row {
                cells: vec![cell(para("noted")), cell(footnoted("cell", &["fn1"]))],
                ..Default::default()
            },
        ],
        ..Default::default()
    };
    let mut body: Vec<Element> = (0..45).map(|i| para(&format!("filler {i}"))).collect();
    body.push(Element::Table(table));
    let mut input = structure(body);
    let note: Vec<Element> = (0..4).map(|i| para(&format!("Note paragraph {i}"))).collect();
    input.footnotes.insert("fn1".into(), note);
    input.index();
    let layout = assemble(&input).expect("assemble");

    let mut noted_pages = 0;
    for page in &layout.pages {
        let areas = blocks_of(page, BlockType::Footnotes);
        let Some(area) = areas.first() else {
            continue;
        };
        noted_pages += 1;
        for block in &page.blocks {
            if matches!(block.block_type, BlockType::Table | BlockType::Paragraph) {
                assert!(
                    block.frame.y >= area.frame.top() - 0.02,
                    "{} overlaps the notes on page {}",
                    block.source_uid,
                    page.number
                );
            }
        }
        // The row carrying the reference shares the page with its note
        let carries_row = blocks_of(page, BlockType::Table).iter().any(|b| match &b.content {
            BlockContent::Table(segment) => segment.rows.contains(&1),
            _ => false,
        });
        assert!(carries_row, "note on page {} without its row", page.number);
    }
    assert_eq!(noted_pages, 1);
}

#[test]
fn missing_note_bodies_still_get_an_entry() {
    let layout = assemble(&structure(vec![footnoted("Dangling", &["ghost"])])).expect("assemble");
    let area = blocks_of(&layout.pages[0], BlockType::Footnotes)[0]
        .notes()
        .expect("notes");
    assert_eq!(area.entries.len(), 1);
    assert_eq!(area.entries[0].id, "ghost");
    assert!(area.entries[0].height > 0.0);
}

#[test]
fn endnotes_follow_the_body() {
    let mut run = Run::text("See the end");
    run.endnote_refs = vec!["e1".into()];
    let mut second = Run::text("and again");
    second.endnote_refs = vec!["e2".into()];
    let body = vec![
        Element::Paragraph(Paragraph::from_runs(vec![run])),
        Element::Paragraph(Paragraph::from_runs(vec![second])),
    ];
    let mut input = structure(body);
    input.endnotes.insert("e1".into(), vec![para("First endnote.")]);
    input.endnotes.insert("e2".into(), vec![para("Second endnote.")]);
    input.index();
    let layout = assemble(&input).expect("assemble");

    let last = layout.pages.last().expect("pages");
    let blocks = blocks_of(last, BlockType::Endnotes);
    assert_eq!(blocks.len(), 1);
    let area = blocks[0].notes().expect("notes");
    assert_eq!(area.kind, NoteKind::Endnote);
    let labels: Vec<&str> = area.entries.iter().map(|e| e.label.as_str()).collect();
    assert_eq!(labels, vec!["i", "ii"]);

    // Placed after the last body paragraph
    let paragraphs = blocks_of(last, BlockType::Paragraph);
    let lowest = paragraphs.iter().map(|b| b.frame.y).fold(f32::INFINITY, f32::min);
    assert!(blocks[0].frame.top() <= lowest + EPS);
    assert!(blocks_of(last, BlockType::Footnotes).is_empty());
}
