#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::{fs, io};

use docxide_layout::config::{Margins, MetricsBackend, PageConfig};
use docxide_layout::model::{Element, LayoutStructure, Paragraph, ParagraphStyle, Run};
use docxide_layout::unified::{BlockType, LayoutBlock, Page, UnifiedLayout};

pub const EPS: f32 = 1e-3;

/// A4 with one-inch margins: 451pt wide, body from y=770 down to y=72.
pub fn a4() -> PageConfig {
    PageConfig::new(595.0, 842.0, Margins::uniform(72.0))
}

/// A structure measured with the fixed-width approximation, so results do not depend
/// on the fonts installed on the machine running the tests.
pub fn structure(body: Vec<Element>) -> LayoutStructure {
    let mut structure = LayoutStructure::new(a4(), body);
    structure.options.metrics = MetricsBackend::Approximate;
    structure
}

pub fn para(text: &str) -> Element {
    Element::Paragraph(Paragraph::from_text(text))
}

pub fn para_with(text: &str, style: ParagraphStyle) -> Element {
    Element::Paragraph(Paragraph {
        style,
        ..Paragraph::from_text(text)
    })
}

pub fn with_id(mut element: Element, id: &str) -> Element {
    if let Element::Paragraph(p) = &mut element {
        p.id = Some(id.to_string());
    }
    element
}

/// Paragraph whose lines are all exactly `height` points tall.
pub fn exact_para(text: &str, height: f32) -> Element {
    para_with(
        text,
        ParagraphStyle {
            line_spacing_rule: Some("exact".into()),
            line_spacing: Some(height),
            ..Default::default()
        },
    )
}

pub fn spaced(text: &str, before: f32, after: f32) -> Element {
    para_with(
        text,
        ParagraphStyle {
            spacing_before: Some(before),
            spacing_after: Some(after),
            ..Default::default()
        },
    )
}

pub fn footnoted(text: &str, ids: &[&str]) -> Element {
    let mut run = Run::text(text);
    run.footnote_refs = ids.iter().map(|s| s.to_string()).collect();
    Element::Paragraph(Paragraph::from_runs(vec![run]))
}

pub fn blocks_of(page: &Page, block_type: BlockType) -> Vec<&LayoutBlock> {
    page.blocks_of(block_type).collect()
}

/// All blocks carrying `base` as source uid or segment base, in page order.
pub fn pieces<'a>(layout: &'a UnifiedLayout, base: &str) -> Vec<&'a LayoutBlock> {
    layout
        .blocks()
        .filter(|b| {
            b.source_uid == base || b.segment.as_ref().is_some_and(|s| s.base_uid == base)
        })
        .collect()
}

pub fn line_count(block: &LayoutBlock) -> usize {
    block.paragraph_layout().map_or(0, |l| l.lines.len())
}

fn load_skiplist() -> HashSet<String> {
    let path = Path::new("tests/fixtures/SKIPLIST");
    let Ok(content) = fs::read_to_string(path) else {
        return HashSet::new();
    };
    content
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|l| l.to_string())
        .collect()
}

pub fn group_name(fixture: &Path) -> String {
    fixture
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_string()
}

fn case_name(fixture: &Path) -> String {
    fixture
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Output directory: tests/output/<group>/<case>/
pub fn output_dir(fixture: &Path) -> PathBuf {
    PathBuf::from("tests/output")
        .join(group_name(fixture))
        .join(case_name(fixture))
}

pub fn display_name(fixture: &Path) -> String {
    format!("{}/{}", group_name(fixture), case_name(fixture))
}

fn natural_cmp(a: &Path, b: &Path) -> std::cmp::Ordering {
    let a_name = case_name(a);
    let b_name = case_name(b);
    let extract = |s: &str| -> (String, u64) {
        let i = s.find(|c: char| c.is_ascii_digit()).unwrap_or(s.len());
        (s[..i].to_string(), s[i..].parse().unwrap_or(0))
    };
    group_name(a)
        .cmp(&group_name(b))
        .then_with(|| extract(&a_name).cmp(&extract(&b_name)))
        .then_with(|| a_name.cmp(&b_name))
}

/// Discover fixtures under tests/fixtures/<group>/<case>/. Filter with
/// DOCXIDE_LAYOUT_CASE (case name) and DOCXIDE_LAYOUT_GROUP (folder name).
pub fn discover_fixtures() -> io::Result<Vec<PathBuf>> {
    let fixtures_dir = Path::new("tests/fixtures");
    let case_filter = std::env::var("DOCXIDE_LAYOUT_CASE").ok();
    let group_filter = std::env::var("DOCXIDE_LAYOUT_GROUP").ok();
    let skiplist = load_skiplist();
    let mut fixtures: Vec<PathBuf> = Vec::new();
    for group_entry in fs::read_dir(fixtures_dir)? {
        let group = group_entry?.path();
        if !group.is_dir() {
            continue;
        }
        let gname = group.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if let Some(gf) = &group_filter
            && gname != gf.as_str()
        {
            continue;
        }
        for entry in fs::read_dir(&group)? {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if let Some(filter) = &case_filter {
                if name == filter.as_str() {
                    fixtures.push(path);
                }
            } else if !skiplist.contains(name) && !skiplist.contains(gname) {
                fixtures.push(path);
            }
        }
    }
    fixtures.sort_by(|a, b| natural_cmp(a, b));
    Ok(fixtures)
}
