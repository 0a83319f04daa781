//! Footnote and endnote bookkeeping: which notes belong to which page, and the laid-out
//! bodies that fill the notes areas.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::error::LookupError;
use crate::model::{Element, Paragraph, Run, VertAlign};
use crate::unified::{FlowContent, FlowItem, NoteEntry, NoteKind, NotesArea};

use super::context::LayoutContext;
use super::flow::{layout_item, stack};
use super::paragraph::layout_paragraph;

/// A note body laid out at the notes width, label included.
#[derive(Clone, Debug)]
pub(crate) struct NoteBody {
    pub height: f32,
    pub items: Vec<FlowItem>,
}

/// Registry of one kind of note. Registration is append-only: an id registered for a page
/// stays there for the rest of the pass.
pub(crate) struct NoteBook {
    kind: NoteKind,
    pages: BTreeMap<usize, Vec<String>>,
    bodies: HashMap<(String, u32), Arc<NoteBody>>,
}

impl NoteBook {
    pub fn new(kind: NoteKind) -> Self {
        NoteBook {
            kind,
            pages: BTreeMap::new(),
            bodies: HashMap::new(),
        }
    }

    pub fn clear(&mut self) {
        self.pages.clear();
    }

    /// Register `id` on `page`. Returns false when it was already there.
    pub fn register(&mut self, page: usize, id: &str) -> bool {
        let ids = self.pages.entry(page).or_default();
        if ids.iter().any(|known| known == id) {
            return false;
        }
        ids.push(id.to_string());
        true
    }

    pub fn ids(&self, page: usize) -> &[String] {
        self.pages.get(&page).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn body(&mut self, ctx: &LayoutContext, id: &str, width: f32) -> Result<Arc<NoteBody>, LookupError> {
        let key = (id.to_string(), width.to_bits());
        if let Some(body) = self.bodies.get(&key) {
            return Ok(body.clone());
        }
        let body = Arc::new(layout_note(ctx, self.kind, id, width)?);
        self.bodies.insert(key, body.clone());
        Ok(body)
    }

    /// Height of a notes area holding `ids`: separator plus every body. Zero when empty.
    pub fn area_height<'i>(
        &mut self,
        ctx: &LayoutContext,
        ids: impl IntoIterator<Item = &'i str>,
        width: f32,
    ) -> Result<f32, LookupError> {
        let mut height = 0.0;
        let mut any = false;
        for id in ids {
            any = true;
            height += self.body(ctx, id, width)?.height;
        }
        Ok(if any {
            height + ctx.options.footnote_separator_height
        } else {
            0.0
        })
    }

    pub fn area<'i>(
        &mut self,
        ctx: &LayoutContext,
        ids: impl IntoIterator<Item = &'i str>,
        width: f32,
    ) -> Result<NotesArea, LookupError> {
        let mut entries = Vec::new();
        let mut y = 0.0;
        for id in ids {
            let body = self.body(ctx, id, width)?;
            entries.push(NoteEntry {
                id: id.to_string(),
                label: ctx.note_label(self.kind, id),
                y,
                height: body.height,
                items: body.items.clone(),
            });
            y += body.height;
        }
        Ok(NotesArea {
            kind: self.kind,
            separator_height: ctx.options.footnote_separator_height,
            entries,
        })
    }
}

fn label_run(label: String) -> Run {
    let mut run = Run::text(label);
    run.style.vertical_align = Some(VertAlign::Superscript);
    run
}

/// The first paragraph of a note with its label: a note-mark run is filled in place,
/// otherwise a superscript label and a space are prepended.
fn labelled(para: &Paragraph, label: String) -> Paragraph {
    let mut para = para.clone();
    if let Some(mark) = para.runs.iter_mut().find(|r| r.is_note_mark) {
        mark.text = label;
        mark.style.vertical_align.get_or_insert(VertAlign::Superscript);
    } else {
        para.runs.insert(0, Run::text(" "));
        para.runs.insert(0, label_run(label));
    }
    para
}

fn layout_note(ctx: &LayoutContext, kind: NoteKind, id: &str, width: f32) -> Result<NoteBody, LookupError> {
    let label = ctx.note_label(kind, id);
    let notes = match kind {
        NoteKind::Footnote => &ctx.structure.footnotes,
        NoteKind::Endnote => &ctx.structure.endnotes,
    };
    let placeholder;
    let elements: &[Element] = match notes.get(id) {
        Some(elements) if !elements.is_empty() => elements,
        _ => {
            log::debug!("No body for {kind:?} {id:?}, drawing the label only");
            placeholder = [Element::Paragraph(Paragraph::default())];
            &placeholder
        }
    };

    let first_para = elements.iter().position(|e| e.as_paragraph().is_some());
    let mut laid = Vec::with_capacity(elements.len());
    for (i, element) in elements.iter().enumerate() {
        match element.as_paragraph() {
            Some(para) if Some(i) == first_para => {
                let para = labelled(para, label.clone());
                let layout = layout_paragraph(ctx, &para, width)?;
                laid.push((
                    0.0,
                    width,
                    layout.content_height(),
                    FlowContent::Paragraph(Arc::new(layout)),
                ));
            }
            _ => laid.push(layout_item(ctx, element, width)?),
        }
    }

    let members: Vec<&Element> = elements.iter().collect();
    let heights: Vec<f32> = laid.iter().map(|(_, _, h, _)| *h).collect();
    let (offsets, height) = stack(&members, &heights);
    let items = laid
        .into_iter()
        .zip(offsets)
        .map(|((x, width, height, content), y)| FlowItem {
            x,
            y,
            width,
            height,
            content,
        })
        .collect();
    Ok(NoteBody { height, items })
}
