//! Layout tree dispatch: turns logical elements into a generic tree of sized nodes.
//!
//! Each [`NodeKind`] has one registered [`Engine`]. Engines recurse into children through
//! the same [`Dispatcher`], so cell heights, nested tables and textboxes are all measured
//! the same way. A kind without an engine is a [`LookupError`] and is never skipped.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::error::LookupError;
use crate::layout::context::LayoutContext;
use crate::layout::flow::{fit_image, stack, textbox_content};
use crate::layout::paragraph::build_paragraph_layout;
use crate::layout::table::layout_table;
use crate::metrics::TextStyle;
use crate::model::{Cell, CellMargins, Drawing, DrawingKind, Element, ParagraphStyle, Run, RunStyle, Table};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Paragraph,
    Run,
    Text,
    Image,
    Textbox,
    Table,
    Row,
    Cell,
}

/// A node with children.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BaseNode {
    pub kind: NodeKind,
    pub width: f32,
    pub height: f32,
    pub children: Vec<Arc<LayoutNode>>,
}

/// A childless node; `text` is the run text or an image description.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LeafNode {
    pub kind: NodeKind,
    pub width: f32,
    pub height: f32,
    pub text: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LayoutNode {
    Base(BaseNode),
    Leaf(LeafNode),
}

impl LayoutNode {
    pub fn kind(&self) -> NodeKind {
        match self {
            LayoutNode::Base(n) => n.kind,
            LayoutNode::Leaf(n) => n.kind,
        }
    }

    pub fn width(&self) -> f32 {
        match self {
            LayoutNode::Base(n) => n.width,
            LayoutNode::Leaf(n) => n.width,
        }
    }

    pub fn height(&self) -> f32 {
        match self {
            LayoutNode::Base(n) => n.height,
            LayoutNode::Leaf(n) => n.height,
        }
    }

    pub fn children(&self) -> &[Arc<LayoutNode>] {
        match self {
            LayoutNode::Base(n) => &n.children,
            LayoutNode::Leaf(_) => &[],
        }
    }

    /// Number of nodes in this subtree, itself included.
    pub fn count(&self) -> usize {
        1 + self.children().iter().map(|c| c.count()).sum::<usize>()
    }
}

/// Borrowed view of anything the dispatcher can build a node for.
#[derive(Clone, Copy, Debug)]
pub enum ElementRef<'a> {
    Element(&'a Element),
    Run {
        run: &'a Run,
        paragraph: &'a ParagraphStyle,
    },
    Text {
        text: &'a str,
        style: &'a RunStyle,
    },
    Drawing(&'a Drawing),
    Row {
        table: &'a Table,
        index: usize,
        /// Width the owning table was laid out at.
        table_width: f32,
    },
    Cell {
        cell: &'a Cell,
        margins: CellMargins,
    },
}

impl ElementRef<'_> {
    pub fn kind(&self) -> Result<NodeKind, LookupError> {
        Ok(match self {
            ElementRef::Element(element) => match element {
                Element::Paragraph(_) => NodeKind::Paragraph,
                Element::Table(_) => NodeKind::Table,
                Element::Image(_) => NodeKind::Image,
                Element::Textbox(_) => NodeKind::Textbox,
                Element::Unsupported(u) => return Err(LookupError::new(&u.kind, 0)),
            },
            ElementRef::Run { .. } => NodeKind::Run,
            ElementRef::Text { .. } => NodeKind::Text,
            ElementRef::Drawing(d) => match d.kind {
                DrawingKind::Image => NodeKind::Image,
                DrawingKind::Textbox => NodeKind::Textbox,
            },
            ElementRef::Row { .. } => NodeKind::Row,
            ElementRef::Cell { .. } => NodeKind::Cell,
        })
    }

    /// Uid of the element for caching; 0 for units without their own identity.
    pub fn uid(&self) -> u32 {
        match self {
            ElementRef::Element(element) => element.uid(),
            ElementRef::Cell { cell, .. } => cell.uid,
            _ => 0,
        }
    }

    fn kind_name(&self) -> String {
        match self {
            ElementRef::Element(element) => element.kind_name().to_string(),
            ElementRef::Run { .. } => "run".into(),
            ElementRef::Text { .. } => "text".into(),
            ElementRef::Drawing(_) => "drawing".into(),
            ElementRef::Row { .. } => "row".into(),
            ElementRef::Cell { .. } => "cell".into(),
        }
    }
}

/// Builds the node for one kind of element.
pub trait Engine: Send + Sync {
    fn kind(&self) -> NodeKind;

    fn build(
        &self,
        ctx: &LayoutContext,
        element: ElementRef<'_>,
        width: f32,
    ) -> Result<LayoutNode, LookupError>;
}

pub struct Dispatcher {
    engines: HashMap<NodeKind, Box<dyn Engine>>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        let mut dispatcher = Dispatcher::empty();
        dispatcher.register(Box::new(ParagraphEngine));
        dispatcher.register(Box::new(RunEngine));
        dispatcher.register(Box::new(TextEngine));
        dispatcher.register(Box::new(ImageEngine));
        dispatcher.register(Box::new(TextboxEngine));
        dispatcher.register(Box::new(TableEngine));
        dispatcher.register(Box::new(RowEngine));
        dispatcher.register(Box::new(CellEngine));
        dispatcher
    }
}

impl Dispatcher {
    /// A dispatcher without engines; every dispatch fails until engines are registered.
    pub fn empty() -> Self {
        Dispatcher {
            engines: HashMap::new(),
        }
    }

    /// Register an engine, replacing any previous engine for the same kind.
    pub fn register(&mut self, engine: Box<dyn Engine>) {
        self.engines.insert(engine.kind(), engine);
    }

    pub fn unregister(&mut self, kind: NodeKind) -> Option<Box<dyn Engine>> {
        self.engines.remove(&kind)
    }

    pub fn handles(&self, kind: NodeKind) -> bool {
        self.engines.contains_key(&kind)
    }

    pub fn dispatch(
        &self,
        ctx: &LayoutContext,
        element: ElementRef<'_>,
        width: f32,
    ) -> Result<Arc<LayoutNode>, LookupError> {
        let uid = element.uid();
        let kind = element.kind().map_err(|e| LookupError::new(e.kind, uid))?;
        let Some(engine) = self.engines.get(&kind) else {
            log::warn!("No layout engine registered for {kind:?} (uid {uid})");
            return Err(LookupError::new(element.kind_name(), uid));
        };
        if let Some(node) = ctx.cached_node(kind, uid, width) {
            return Ok(node);
        }
        let node = Arc::new(engine.build(ctx, element, width)?);
        ctx.store_node(kind, uid, width, node.clone());
        Ok(node)
    }

    fn dispatch_all(
        &self,
        ctx: &LayoutContext,
        elements: &[Element],
        width: f32,
    ) -> Result<Vec<Arc<LayoutNode>>, LookupError> {
        elements
            .iter()
            .map(|e| self.dispatch(ctx, ElementRef::Element(e), width))
            .collect()
    }
}

fn mismatch(engine: NodeKind, element: &ElementRef<'_>) -> LookupError {
    LookupError::new(
        format!("{} (offered to {engine:?} engine)", element.kind_name()),
        element.uid(),
    )
}

/// Height of `elements` stacked with collapsed spacing, from their nodes.
fn stacked_height(elements: &[Element], nodes: &[Arc<LayoutNode>]) -> f32 {
    let members: Vec<&Element> = elements.iter().filter(|e| !e.is_watermark()).collect();
    let heights: Vec<f32> = elements
        .iter()
        .zip(nodes)
        .filter(|(e, _)| !e.is_watermark())
        .map(|(_, n)| n.height())
        .collect();
    stack(&members, &heights).1
}

struct ParagraphEngine;

impl Engine for ParagraphEngine {
    fn kind(&self) -> NodeKind {
        NodeKind::Paragraph
    }

    fn build(&self, ctx: &LayoutContext, element: ElementRef<'_>, width: f32) -> Result<LayoutNode, LookupError> {
        let ElementRef::Element(Element::Paragraph(para)) = element else {
            return Err(mismatch(self.kind(), &element));
        };
        let layout = build_paragraph_layout(ctx, para, width)?;
        let mut children = Vec::with_capacity(para.runs.len() + para.children.len());
        for run in &para.runs {
            children.push(ctx.dispatcher.dispatch(
                ctx,
                ElementRef::Run {
                    run,
                    paragraph: &para.style,
                },
                width,
            )?);
        }
        children.extend(ctx.dispatcher.dispatch_all(ctx, &para.children, width)?);
        Ok(LayoutNode::Base(BaseNode {
            kind: NodeKind::Paragraph,
            width,
            height: layout.content_height(),
            children,
        }))
    }
}

struct RunEngine;

impl Engine for RunEngine {
    fn kind(&self) -> NodeKind {
        NodeKind::Run
    }

    fn build(&self, ctx: &LayoutContext, element: ElementRef<'_>, width: f32) -> Result<LayoutNode, LookupError> {
        let ElementRef::Run { run, paragraph } = element else {
            return Err(mismatch(self.kind(), &element));
        };
        let style = run.style.inherit(paragraph);
        let mut children = Vec::new();
        if !run.text.is_empty() {
            children.push(ctx.dispatcher.dispatch(
                ctx,
                ElementRef::Text {
                    text: &run.text,
                    style: &style,
                },
                width,
            )?);
        }
        if let Some(drawing) = run.drawing() {
            children.push(ctx.dispatcher.dispatch(ctx, ElementRef::Drawing(drawing), width)?);
        }
        let line = TextStyle::from_run(&style, ctx.options.default_font_size).line_height();
        Ok(LayoutNode::Base(BaseNode {
            kind: NodeKind::Run,
            width: children.iter().map(|c| c.width()).sum(),
            height: children.iter().map(|c| c.height()).fold(line, f32::max),
            children,
        }))
    }
}

struct TextEngine;

impl Engine for TextEngine {
    fn kind(&self) -> NodeKind {
        NodeKind::Text
    }

    fn build(&self, ctx: &LayoutContext, element: ElementRef<'_>, width: f32) -> Result<LayoutNode, LookupError> {
        let ElementRef::Text { text, style } = element else {
            return Err(mismatch(self.kind(), &element));
        };
        let font = TextStyle::from_run(style, ctx.options.default_font_size);
        let layout = ctx.metrics.layout_text(text, &font, Some(width));
        Ok(LayoutNode::Leaf(LeafNode {
            kind: NodeKind::Text,
            width: layout.width,
            height: layout.height,
            text: Some(text.to_string()),
        }))
    }
}

struct ImageEngine;

impl Engine for ImageEngine {
    fn kind(&self) -> NodeKind {
        NodeKind::Image
    }

    fn build(&self, _ctx: &LayoutContext, element: ElementRef<'_>, width: f32) -> Result<LayoutNode, LookupError> {
        let image = match element {
            ElementRef::Element(Element::Image(img)) => {
                fit_image(img.size(), width, img.description.clone())
            }
            ElementRef::Drawing(d) if d.anchor.is_none() => {
                fit_image(d.size(), width, d.description.clone())
            }
            // Anchored drawings float and take no room in the flow
            ElementRef::Drawing(d) => {
                let (w, _) = d.size();
                return Ok(LayoutNode::Leaf(LeafNode {
                    kind: NodeKind::Image,
                    width: w,
                    height: 0.0,
                    text: d.description.clone(),
                }));
            }
            _ => return Err(mismatch(self.kind(), &element)),
        };
        Ok(LayoutNode::Leaf(LeafNode {
            kind: NodeKind::Image,
            width: image.width,
            height: image.height,
            text: image.description,
        }))
    }
}

struct TextboxEngine;

impl Engine for TextboxEngine {
    fn kind(&self) -> NodeKind {
        NodeKind::Textbox
    }

    fn build(&self, ctx: &LayoutContext, element: ElementRef<'_>, width: f32) -> Result<LayoutNode, LookupError> {
        match element {
            ElementRef::Element(Element::Textbox(tb)) => {
                let (w, h, _) = textbox_content(ctx, tb, width)?;
                let children = ctx.dispatcher.dispatch_all(ctx, &tb.children, w)?;
                Ok(LayoutNode::Base(BaseNode {
                    kind: NodeKind::Textbox,
                    width: w,
                    height: h,
                    children,
                }))
            }
            ElementRef::Drawing(d) => {
                let (w, h) = d.size();
                let children = ctx.dispatcher.dispatch_all(ctx, &d.content, w)?;
                let content = stacked_height(&d.content, &children);
                Ok(LayoutNode::Base(BaseNode {
                    kind: NodeKind::Textbox,
                    width: w,
                    height: if d.anchor.is_some() { 0.0 } else { h.max(content) },
                    children,
                }))
            }
            _ => Err(mismatch(self.kind(), &element)),
        }
    }
}

struct TableEngine;

impl Engine for TableEngine {
    fn kind(&self) -> NodeKind {
        NodeKind::Table
    }

    fn build(&self, ctx: &LayoutContext, element: ElementRef<'_>, width: f32) -> Result<LayoutNode, LookupError> {
        let ElementRef::Element(Element::Table(table)) = element else {
            return Err(mismatch(self.kind(), &element));
        };
        let layout = layout_table(ctx, table, width)?;
        let children = (0..table.rows.len())
            .map(|index| {
                ctx.dispatcher.dispatch(
                    ctx,
                    ElementRef::Row {
                        table,
                        index,
                        table_width: width,
                    },
                    layout.width(),
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(LayoutNode::Base(BaseNode {
            kind: NodeKind::Table,
            width: layout.width(),
            height: layout.height(),
            children,
        }))
    }
}

struct RowEngine;

impl Engine for RowEngine {
    fn kind(&self) -> NodeKind {
        NodeKind::Row
    }

    fn build(&self, ctx: &LayoutContext, element: ElementRef<'_>, width: f32) -> Result<LayoutNode, LookupError> {
        let ElementRef::Row {
            table,
            index,
            table_width,
        } = element
        else {
            return Err(mismatch(self.kind(), &element));
        };
        let layout = layout_table(ctx, table, table_width)?;
        let Some(row) = table.rows.get(index) else {
            return Err(mismatch(self.kind(), &element));
        };
        let mut children = Vec::with_capacity(row.cells.len());
        for (cell, placed) in row
            .cells
            .iter()
            .zip(layout.cells.iter().filter(|p| p.row == index))
        {
            children.push(ctx.dispatcher.dispatch(
                ctx,
                ElementRef::Cell {
                    cell,
                    margins: placed.cell.margins,
                },
                placed.cell.width,
            )?);
        }
        Ok(LayoutNode::Base(BaseNode {
            kind: NodeKind::Row,
            width,
            height: layout.row_heights.get(index).copied().unwrap_or(0.0),
            children,
        }))
    }
}

struct CellEngine;

impl Engine for CellEngine {
    fn kind(&self) -> NodeKind {
        NodeKind::Cell
    }

    fn build(&self, ctx: &LayoutContext, element: ElementRef<'_>, width: f32) -> Result<LayoutNode, LookupError> {
        let ElementRef::Cell { cell, margins } = element else {
            return Err(mismatch(self.kind(), &element));
        };
        let inner = (width - margins.left - margins.right).max(0.0);
        let children = ctx.dispatcher.dispatch_all(ctx, &cell.content, inner)?;
        let content = stacked_height(&cell.content, &children);
        Ok(LayoutNode::Base(BaseNode {
            kind: NodeKind::Cell,
            width,
            height: content + margins.top + margins.bottom,
            children,
        }))
    }
}
