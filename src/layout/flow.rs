//! Vertical stacking of elements inside a box: table cells, textboxes, headers,
//! footers and note bodies.

use crate::error::LookupError;
use crate::model::{Alignment, Element, Textbox};
use crate::unified::{FlowContent, FlowItem, ImageBox};

use super::context::LayoutContext;
use super::paragraph::{box_style, build_paragraph_layout};
use super::table::layout_table;

pub(crate) struct Flow {
    pub items: Vec<FlowItem>,
    pub height: f32,
}

/// Top offsets of stacked elements and the total height. Spacing between neighbours
/// collapses to the larger of `spacing_after` and `spacing_before`; the first element's
/// `spacing_before` and the last one's `spacing_after` are kept.
pub(crate) fn stack(elements: &[&Element], heights: &[f32]) -> (Vec<f32>, f32) {
    let mut offsets = Vec::with_capacity(elements.len());
    let mut y = 0.0f32;
    let mut prev_after: Option<f32> = None;
    for (element, height) in elements.iter().zip(heights) {
        let before = element.spacing_before();
        y += match prev_after {
            Some(after) => after.max(before),
            None => before,
        };
        offsets.push(y);
        y += height;
        prev_after = Some(element.spacing_after());
    }
    (offsets, y + prev_after.unwrap_or(0.0))
}

/// Scale an image down uniformly to `max_width`.
pub(crate) fn fit_image(size: (f32, f32), max_width: f32, description: Option<String>) -> ImageBox {
    let (width, height) = size;
    let scale = if width > max_width && max_width > 0.0 {
        max_width / width
    } else {
        1.0
    };
    ImageBox {
        width: width * scale,
        height: height * scale,
        description,
    }
}

/// Horizontal offset of a box of `width` aligned inside `available`.
pub(crate) fn align_offset(alignment: Option<Alignment>, width: f32, available: f32) -> f32 {
    let slack = (available - width).max(0.0);
    match alignment.unwrap_or_default() {
        Alignment::Center => slack / 2.0,
        Alignment::Right => slack,
        Alignment::Left | Alignment::Justify => 0.0,
    }
}

/// Textbox size and content: explicit size when given, else the available width and the
/// height of its children.
pub(crate) fn textbox_content(
    ctx: &LayoutContext,
    textbox: &Textbox,
    available: f32,
) -> Result<(f32, f32, FlowContent), LookupError> {
    let style = box_style(&textbox.style);
    let width = textbox.width.filter(|w| *w > 0.0).unwrap_or(available);
    let inner = (width - style.padding.left - style.padding.right).max(0.0);
    let mut flow = layout_flow(ctx, &textbox.children, inner)?;
    for item in &mut flow.items {
        item.x += style.padding.left;
        item.y += style.padding.top;
    }
    let height = textbox
        .height
        .filter(|h| *h > 0.0)
        .unwrap_or(flow.height + style.padding.top + style.padding.bottom);
    Ok((
        width,
        height,
        FlowContent::Textbox {
            style,
            items: flow.items,
        },
    ))
}

/// Lay out one element for a flow: (x offset, width, height, content).
pub(crate) fn layout_item(
    ctx: &LayoutContext,
    element: &Element,
    width: f32,
) -> Result<(f32, f32, f32, FlowContent), LookupError> {
    match element {
        Element::Paragraph(p) => {
            let layout = build_paragraph_layout(ctx, p, width)?;
            Ok((0.0, width, layout.content_height(), FlowContent::Paragraph(layout)))
        }
        Element::Table(t) => {
            let table = layout_table(ctx, t, width)?;
            let segment = table.full_segment();
            Ok((
                table.indent,
                segment.width(),
                segment.height(),
                FlowContent::Table(Box::new(segment)),
            ))
        }
        Element::Image(img) => {
            let image = fit_image(img.size(), width, img.description.clone());
            let x = align_offset(img.style.alignment, image.width, width);
            Ok((x, image.width, image.height, FlowContent::Image(image)))
        }
        Element::Textbox(tb) => {
            let (w, h, content) = textbox_content(ctx, tb, width)?;
            let x = align_offset(tb.style.alignment, w, width);
            Ok((x, w, h, content))
        }
        Element::Unsupported(u) => Err(LookupError::new(&u.kind, element.uid())),
    }
}

/// Stack `elements` top-down inside `width`. Watermarks are skipped; they are painted
/// per page by the assembler.
pub(crate) fn layout_flow(
    ctx: &LayoutContext,
    elements: &[Element],
    width: f32,
) -> Result<Flow, LookupError> {
    let members: Vec<&Element> = elements.iter().filter(|e| !e.is_watermark()).collect();
    let mut laid = Vec::with_capacity(members.len());
    for element in &members {
        laid.push(layout_item(ctx, element, width)?);
    }
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
    Ok(Flow { items, height })
}
