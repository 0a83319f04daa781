mod common;

use std::sync::Arc;

use docxide_layout::engines::{ElementRef, Engine, LayoutNode, LeafNode, NodeKind};
use docxide_layout::layout::{LayoutContext, build_paragraph_layout};
use docxide_layout::model::{Element, Image, Paragraph, Run};
use docxide_layout::{Error, LookupError, layout_json};

use common::{EPS, para, structure};

fn image(width: f32, height: f32) -> Element {
    Element::Image(Image {
        width: Some(width),
        height: Some(height),
        ..Default::default()
    })
}

#[test]
fn unsupported_elements_fail_the_layout() {
    let json = br#"{
        "options": {"metrics": "approximate"},
        "body": [
            {"type": "paragraph", "runs": [{"text": "before"}]},
            {"type": "chart"}
        ]
    }"#;
    match layout_json(json) {
        Err(Error::Lookup(e)) => assert_eq!(e.kind, "chart"),
        other => panic!("expected a lookup error, got {other:?}"),
    }
}

#[test]
fn unregistered_kinds_are_lookup_errors() {
    let input = structure(vec![image(100.0, 50.0)]);
    let mut ctx = LayoutContext::new(&input);
    assert!(ctx.dispatcher.handles(NodeKind::Image));
    assert!(ctx.dispatcher.unregister(NodeKind::Image).is_some());
    assert!(!ctx.dispatcher.handles(NodeKind::Image));

    let err = ctx
        .dispatcher
        .dispatch(&ctx, ElementRef::Element(&input.body[0]), 451.0)
        .expect_err("image without engine");
    assert_eq!(err.kind, "image");
    assert_eq!(err.uid, input.body[0].uid());
}

#[test]
fn paragraph_nodes_carry_their_runs() {
    let mut run = Run::text("world");
    run.style.bold = Some(true);
    let body = vec![Element::Paragraph(Paragraph::from_runs(vec![Run::text("Hello "), run]))];
    let input = structure(body);
    let ctx = LayoutContext::new(&input);
    let element = &input.body[0];

    let node = ctx
        .dispatcher
        .dispatch(&ctx, ElementRef::Element(element), 451.0)
        .expect("dispatch");
    assert_eq!(node.kind(), NodeKind::Paragraph);
    assert_eq!(node.children().len(), 2);
    assert!(node.children().iter().all(|c| c.kind() == NodeKind::Run));
    // run -> text
    assert_eq!(node.count(), 5);

    let layout = build_paragraph_layout(&ctx, element.as_paragraph().expect("paragraph"), 451.0).expect("layout");
    assert!((node.height() - layout.content_height()).abs() < EPS);
}

#[test]
fn nodes_are_cached_per_uid_and_width() {
    let input = structure(vec![para("cached")]);
    let ctx = LayoutContext::new(&input);
    let element = ElementRef::Element(&input.body[0]);
    assert_ne!(element.uid(), 0);

    let a = ctx.dispatcher.dispatch(&ctx, element, 300.0).expect("dispatch");
    let b = ctx.dispatcher.dispatch(&ctx, element, 300.0).expect("dispatch");
    let c = ctx.dispatcher.dispatch(&ctx, element, 200.0).expect("dispatch");
    assert!(Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&a, &c));
}

#[test]
fn images_are_scaled_to_the_width() {
    let input = structure(vec![image(200.0, 100.0)]);
    let ctx = LayoutContext::new(&input);
    let node = ctx
        .dispatcher
        .dispatch(&ctx, ElementRef::Element(&input.body[0]), 100.0)
        .expect("dispatch");
    assert_eq!(node.kind(), NodeKind::Image);
    assert!((node.width() - 100.0).abs() < EPS);
    assert!((node.height() - 50.0).abs() < EPS);
}

struct Placeholder;

impl Engine for Placeholder {
    fn kind(&self) -> NodeKind {
        NodeKind::Image
    }

    fn build(&self, _ctx: &LayoutContext, _element: ElementRef<'_>, _width: f32) -> Result<LayoutNode, LookupError> {
        Ok(LayoutNode::Leaf(LeafNode {
            kind: NodeKind::Image,
            width: 10.0,
            height: 20.0,
            text: Some("placeholder".into()),
        }))
    }
}

#[test]
fn registered_engines_replace_the_default() {
    let input = structure(vec![image(200.0, 100.0)]);
    let mut ctx = LayoutContext::new(&input);
    ctx.dispatcher.register(Box::new(Placeholder));
    let node = ctx
        .dispatcher
        .dispatch(&ctx, ElementRef::Element(&input.body[0]), 451.0)
        .expect("dispatch");
    assert_eq!((node.width(), node.height()), (10.0, 20.0));
}

#[test]
fn table_nodes_nest_rows_and_cells() {
    let json = br#"{
        "options": {"metrics": "approximate"},
        "body": [{
            "type": "table",
            "grid": [100, 100],
            "rows": [
                {"cells": [{"content": [{"type": "paragraph", "runs": [{"text": "a"}]}]},
                           {"content": [{"type": "paragraph", "runs": [{"text": "b"}]}]}]},
                {"cells": [{"content": [{"type": "paragraph", "runs": [{"text": "c"}]}]},
                           {"content": [{"type": "paragraph", "runs": [{"text": "d"}]}]}]}
            ]
        }]
    }"#;
    let input = docxide_layout::LayoutStructure::from_json(json).expect("parse");
    let ctx = LayoutContext::new(&input);
    let node = ctx
        .dispatcher
        .dispatch(&ctx, ElementRef::Element(&input.body[0]), 451.0)
        .expect("dispatch");
    assert_eq!(node.kind(), NodeKind::Table);
    assert_eq!(node.children().len(), 2);
    for row in node.children() {
        assert_eq!(row.kind(), NodeKind::Row);
        assert_eq!(row.children().len(), 2);
        assert!(row.children().iter().all(|c| c.kind() == NodeKind::Cell));
    }
    let rows: f32 = node.children().iter().map(|r| r.height()).sum();
    assert!((node.height() - rows).abs() < EPS);
}
