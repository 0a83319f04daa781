mod common;

use std::fs;

use docxide_layout::model::{Element, Paragraph};
use docxide_layout::pdf;
use docxide_layout::unified::UnifiedLayout;
use docxide_layout::{Error, assemble, convert_json_bytes_to_pdf};

use common::{para, structure};

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[test]
fn compiled_layouts_are_pdf_documents() {
    let mut second = Paragraph::from_text("second page");
    second.page_break_before = true;
    let layout = assemble(&structure(vec![para("first page"), Element::Paragraph(second)])).expect("assemble");
    assert_eq!(layout.page_count(), 2);

    let bytes = pdf::compile(&layout).expect("compile");
    assert!(bytes.starts_with(b"%PDF-"));
    assert!(contains(&bytes, b"/Count 2"));
    assert!(contains(&bytes, b"/BaseFont /"));
    assert!(contains(&bytes, b"%%EOF"));
}

#[test]
fn empty_layouts_are_rejected() {
    let result = pdf::compile(&UnifiedLayout::default());
    assert!(matches!(result, Err(Error::Pdf(_))));
}

#[test]
fn json_converts_to_a_pdf_file() {
    let json = br#"{
        "options": {"metrics": "approximate"},
        "body": [
            {"type": "paragraph", "runs": [{"text": "Hello from JSON", "footnote_refs": ["n1"]}]},
            {"type": "image", "width": 120, "height": 60, "description": "logo"}
        ],
        "footnotes": {"n1": [{"type": "paragraph", "runs": [{"text": "A note."}]}]}
    }"#;
    let dir = std::path::PathBuf::from("tests/output/pdf_output");
    fs::create_dir_all(&dir).expect("output dir");
    let out = dir.join("json.pdf");
    convert_json_bytes_to_pdf(json, &out).expect("convert");
    let bytes = fs::read(&out).expect("read back");
    assert!(bytes.starts_with(b"%PDF-"));
    assert!(contains(&bytes, b"/Count 1"));
}

#[test]
fn malformed_json_is_an_error() {
    let out = std::path::PathBuf::from("tests/output/pdf_output/never.pdf");
    let result = convert_json_bytes_to_pdf(b"{ not json", &out);
    assert!(matches!(result, Err(Error::Json(_))));
}
