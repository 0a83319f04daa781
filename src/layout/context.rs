use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{LayoutOptions, PageConfig};
use crate::engines::{Dispatcher, LayoutNode, NodeKind};
use crate::error::LookupError;
use crate::metrics::TextMetrics;
use crate::model::{Element, LayoutStructure, Paragraph};
use crate::unified::{NoteKind, ParagraphLayout};

use super::table::TableLayout;

/// Cache key: element uid and the width it was laid out at.
type WidthKey = (u32, u32);

fn width_key(uid: u32, width: f32) -> WidthKey {
    (uid, width.to_bits())
}

/// Per-pass state shared by every layout routine: options, metrics, the engine registry
/// and the side tables that memoize layouts per element uid. Elements with uid 0 were
/// never indexed and are not cached.
pub struct LayoutContext<'a> {
    pub structure: &'a LayoutStructure,
    pub options: LayoutOptions,
    pub metrics: TextMetrics,
    pub dispatcher: Dispatcher,
    paragraphs: RefCell<HashMap<WidthKey, Arc<ParagraphLayout>>>,
    tables: RefCell<HashMap<WidthKey, Arc<TableLayout>>>,
    nodes: RefCell<HashMap<(NodeKind, u32, u32), Arc<LayoutNode>>>,
    sources: RefCell<HashMap<u32, Arc<Paragraph>>>,
    labels: HashMap<(NoteKind, String), String>,
}

impl<'a> LayoutContext<'a> {
    pub fn new(structure: &'a LayoutStructure) -> Self {
        let options = structure.options;
        LayoutContext {
            structure,
            options,
            metrics: TextMetrics::new(options.metrics).with_hyphenation(options.hyphenate),
            dispatcher: Dispatcher::default(),
            paragraphs: RefCell::new(HashMap::new()),
            tables: RefCell::new(HashMap::new()),
            nodes: RefCell::new(HashMap::new()),
            sources: RefCell::new(HashMap::new()),
            labels: number_notes(&structure.body),
        }
    }

    pub fn page(&self) -> &PageConfig {
        &self.structure.page
    }

    /// Display label of a note reference. Unreferenced ids get a label on the fly.
    pub fn note_label(&self, kind: NoteKind, id: &str) -> String {
        self.labels
            .get(&(kind, id.to_string()))
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    pub(crate) fn paragraph_layout(
        &self,
        uid: u32,
        width: f32,
        build: impl FnOnce() -> Result<ParagraphLayout, LookupError>,
    ) -> Result<Arc<ParagraphLayout>, LookupError> {
        if uid == 0 {
            return build().map(Arc::new);
        }
        let key = width_key(uid, width);
        let cached = self.paragraphs.borrow().get(&key).cloned();
        if let Some(layout) = cached {
            return Ok(layout);
        }
        let layout = Arc::new(build()?);
        self.paragraphs.borrow_mut().insert(key, layout.clone());
        Ok(layout)
    }

    pub(crate) fn table_layout(
        &self,
        uid: u32,
        width: f32,
        build: impl FnOnce() -> Result<TableLayout, LookupError>,
    ) -> Result<Arc<TableLayout>, LookupError> {
        if uid == 0 {
            return build().map(Arc::new);
        }
        let key = width_key(uid, width);
        let cached = self.tables.borrow().get(&key).cloned();
        if let Some(layout) = cached {
            return Ok(layout);
        }
        let layout = Arc::new(build()?);
        self.tables.borrow_mut().insert(key, layout.clone());
        Ok(layout)
    }

    pub(crate) fn cached_node(&self, kind: NodeKind, uid: u32, width: f32) -> Option<Arc<LayoutNode>> {
        if uid == 0 {
            return None;
        }
        let (uid, bits) = width_key(uid, width);
        self.nodes.borrow().get(&(kind, uid, bits)).cloned()
    }

    pub(crate) fn store_node(&self, kind: NodeKind, uid: u32, width: f32, node: Arc<LayoutNode>) {
        if uid == 0 {
            return;
        }
        let (uid, bits) = width_key(uid, width);
        self.nodes.borrow_mut().insert((kind, uid, bits), node);
    }

    /// Shared handle to a paragraph's source, one allocation per uid.
    pub(crate) fn source(&self, paragraph: &Paragraph) -> Arc<Paragraph> {
        if paragraph.uid == 0 {
            return Arc::new(paragraph.clone());
        }
        self.sources
            .borrow_mut()
            .entry(paragraph.uid)
            .or_insert_with(|| Arc::new(paragraph.clone()))
            .clone()
    }
}

/// Number footnotes and endnotes in order of first reference in the body.
fn number_notes(body: &[Element]) -> HashMap<(NoteKind, String), String> {
    let mut labels = HashMap::new();
    let mut counters = [0usize; 2];
    walk_refs(body, &mut |kind, id| {
        let key = (kind, id.to_string());
        if labels.contains_key(&key) {
            return;
        }
        let slot = match kind {
            NoteKind::Footnote => 0,
            NoteKind::Endnote => 1,
        };
        counters[slot] += 1;
        let label = match kind {
            NoteKind::Footnote => counters[slot].to_string(),
            NoteKind::Endnote => roman_lower(counters[slot]),
        };
        labels.insert(key, label);
    });
    labels
}

/// Note references inside `elements`, in document order.
pub(crate) fn note_refs(elements: &[Element]) -> Vec<(NoteKind, String)> {
    let mut refs = Vec::new();
    walk_refs(elements, &mut |kind, id| refs.push((kind, id.to_string())));
    refs
}

fn walk_refs(elements: &[Element], visit: &mut impl FnMut(NoteKind, &str)) {
    for element in elements {
        match element {
            Element::Paragraph(p) => {
                for run in &p.runs {
                    for id in &run.footnote_refs {
                        visit(NoteKind::Footnote, id);
                    }
                    for id in &run.endnote_refs {
                        visit(NoteKind::Endnote, id);
                    }
                    if let Some(drawing) = &run.drawing {
                        walk_refs(&drawing.content, visit);
                    }
                }
                walk_refs(&p.children, visit);
            }
            Element::Table(t) => {
                for cell in t.rows.iter().flat_map(|r| r.cells.iter()) {
                    walk_refs(&cell.content, visit);
                }
            }
            Element::Textbox(t) => walk_refs(&t.children, visit),
            Element::Image(_) | Element::Unsupported(_) => {}
        }
    }
}

/// Endnotes are labelled i, ii, iii like Word's default endnote format.
fn roman_lower(mut n: usize) -> String {
    const TABLE: [(usize, &str); 13] = [
        (1000, "m"),
        (900, "cm"),
        (500, "d"),
        (400, "cd"),
        (100, "c"),
        (90, "xc"),
        (50, "l"),
        (40, "xl"),
        (10, "x"),
        (9, "ix"),
        (5, "v"),
        (4, "iv"),
        (1, "i"),
    ];
    let mut out = String::new();
    for &(value, digits) in &TABLE {
        while n >= value {
            out.push_str(digits);
            n -= value;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Run;

    #[test]
    fn roman_numerals() {
        assert_eq!(roman_lower(1), "i");
        assert_eq!(roman_lower(4), "iv");
        assert_eq!(roman_lower(14), "xiv");
    }

    #[test]
    fn notes_numbered_by_first_reference() {
        let mut a = Run::text("a");
        a.footnote_refs = vec!["fnB".into(), "fnA".into()];
        let mut b = Run::text("b");
        b.footnote_refs = vec!["fnB".into()];
        b.endnote_refs = vec!["en1".into()];
        let body = vec![Element::Paragraph(Paragraph::from_runs(vec![a, b]))];
        let labels = number_notes(&body);
        assert_eq!(labels[&(NoteKind::Footnote, "fnB".to_string())], "1");
        assert_eq!(labels[&(NoteKind::Footnote, "fnA".to_string())], "2");
        assert_eq!(labels[&(NoteKind::Endnote, "en1".to_string())], "i");
    }
}
