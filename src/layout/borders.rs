//! Border grouping: consecutive paragraphs with the same box style share one border,
//! drawn by a decorator block painted beneath them.

use std::collections::HashMap;

use crate::unified::{BlockContent, BlockType, BoxStyle, DecoratorContent, LayoutBlock, Page, Rect};

#[derive(Default)]
pub(crate) struct BorderGrouper {
    current: Option<(BoxStyle, usize)>,
    next_id: usize,
    /// (group, page number) -> index of the decorator in the page's block list
    decorators: HashMap<(usize, usize), usize>,
    /// Last page each group decorated
    last_page: HashMap<usize, usize>,
}

fn decorated(style: &BoxStyle) -> bool {
    style.background.is_some() || !style.borders.is_empty()
}

impl BorderGrouper {
    pub fn clear(&mut self) {
        *self = BorderGrouper::default();
    }

    /// Group of a paragraph with `style`, continuing the open group when the signature
    /// (background, padding, borders) is identical.
    pub fn group_for(&mut self, style: &BoxStyle) -> Option<usize> {
        if !decorated(style) {
            self.current = None;
            return None;
        }
        if let Some((open, id)) = &self.current
            && open == style
        {
            return Some(*id);
        }
        self.next_id += 1;
        self.current = Some((style.clone(), self.next_id));
        Some(self.next_id)
    }

    /// Anything that is not a decorated paragraph closes the open group.
    pub fn close(&mut self) {
        self.current = None;
    }

    /// Extend the group's decorator on `page` to cover `frame`, creating it (just before
    /// the member block about to be pushed) when this is the group's first piece there.
    /// `new_member` marks the first segment of a paragraph.
    pub fn attach(
        &mut self,
        page: &mut Page,
        group: usize,
        style: &BoxStyle,
        frame: Rect,
        new_member: bool,
        sequence: &mut u64,
    ) {
        let key = (group, page.number);
        if let Some(&index) = self.decorators.get(&key)
            && let Some(block) = page.blocks.get_mut(index)
        {
            let old = block.frame;
            block.frame = old.union(&frame);
            if new_member && let BlockContent::Decorator(content) = &mut block.content {
                content.between.push((old.y + frame.top()) / 2.0);
            }
            return;
        }

        let continued = self.last_page.insert(group, page.number).is_some();
        if continued {
            log::debug!("Border group {group} continues on page {}", page.number);
        }
        self.decorators.insert(key, page.blocks.len());
        *sequence += 1;
        page.blocks.push(LayoutBlock {
            frame,
            block_type: BlockType::Decorator,
            content: BlockContent::Decorator(DecoratorContent {
                group_id: group,
                background: style.background.clone(),
                borders: style.borders.clone(),
                draw_top: !continued,
                draw_bottom: true,
                between: Vec::new(),
            }),
            style: style.clone(),
            page_number: page.number,
            source_uid: format!("decorator_{group}"),
            sequence: *sequence,
            segment: None,
        });
    }

    /// A group that went on to a later page has no bottom edge on the earlier ones.
    pub fn finish(&self, pages: &mut [Page]) {
        for (&(group, page_number), &index) in &self.decorators {
            let last = self.last_page.get(&group).copied().unwrap_or(page_number);
            if last == page_number {
                continue;
            }
            let block = pages
                .iter_mut()
                .find(|p| p.number == page_number)
                .and_then(|p| p.blocks.get_mut(index));
            if let Some(LayoutBlock {
                content: BlockContent::Decorator(content),
                ..
            }) = block
            {
                content.draw_bottom = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Margins;
    use crate::model::{BorderSpec, Borders};
    use crate::unified::Size;

    fn boxed() -> BoxStyle {
        BoxStyle {
            borders: Borders {
                top: Some(BorderSpec {
                    width: 1.0,
                    space: 0.0,
                    color: None,
                    style: Some("single".into()),
                }),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn page(number: usize) -> Page {
        Page {
            number,
            size: Size {
                width: 100.0,
                height: 100.0,
            },
            margins: Margins::uniform(10.0),
            blocks: Vec::new(),
        }
    }

    #[test]
    fn same_signature_shares_a_group() {
        let mut grouper = BorderGrouper::default();
        let a = grouper.group_for(&boxed());
        let b = grouper.group_for(&boxed());
        assert_eq!(a, b);
        assert_eq!(grouper.group_for(&BoxStyle::default()), None);
        let c = grouper.group_for(&boxed());
        assert_ne!(a, c);
    }

    #[test]
    fn decorator_extends_over_members() {
        let mut grouper = BorderGrouper::default();
        let mut seq = 0;
        let mut p = page(1);
        let style = boxed();
        let group = grouper.group_for(&style).unwrap();
        grouper.attach(&mut p, group, &style, Rect::new(10.0, 80.0, 50.0, 10.0), true, &mut seq);
        grouper.attach(&mut p, group, &style, Rect::new(10.0, 60.0, 50.0, 10.0), true, &mut seq);
        assert_eq!(p.blocks.len(), 1);
        assert_eq!(p.blocks[0].frame, Rect::new(10.0, 60.0, 50.0, 30.0));
        let BlockContent::Decorator(content) = &p.blocks[0].content else {
            panic!("expected decorator");
        };
        assert_eq!(content.between, vec![75.0]);

        let mut pages = vec![p, page(2)];
        grouper.attach(&mut pages[1], group, &style, Rect::new(10.0, 80.0, 50.0, 10.0), false, &mut seq);
        grouper.finish(&mut pages);
        let BlockContent::Decorator(first) = &pages[0].blocks[0].content else {
            panic!("expected decorator");
        };
        assert!(!first.draw_bottom);
        let BlockContent::Decorator(second) = &pages[1].blocks[0].content else {
            panic!("expected decorator");
        };
        assert!(!second.draw_top);
        assert!(second.draw_bottom);
    }
}
