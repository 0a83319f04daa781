use std::ops::Range;
use std::sync::Arc;

use crate::breaker::measurable;
use crate::engines::ElementRef;
use crate::error::LookupError;
use crate::metrics::TextStyle;
use crate::model::{CellMargins, Element, Row, Table, TableBorders, VMerge};
use crate::unified::{CellBox, TableSegment};

use super::context::LayoutContext;
use super::flow::layout_flow;

/// One cell of a laid-out table, with the rows it covers.
#[derive(Clone, Debug)]
pub(crate) struct PlacedCell {
    pub cell: CellBox,
    /// Source row index.
    pub row: usize,
    /// Rows covered by a vertical merge starting here (1 when unmerged).
    pub row_span: usize,
}

/// Column and row geometry of a whole table, before it is split across pages.
#[derive(Clone, Debug)]
pub struct TableLayout {
    pub col_widths: Vec<f32>,
    pub row_heights: Vec<f32>,
    /// Leading rows flagged `is_header`, repeated on continuation segments.
    pub header_rows: usize,
    pub indent: f32,
    pub borders: TableBorders,
    pub(crate) cells: Vec<PlacedCell>,
}

impl TableLayout {
    pub fn width(&self) -> f32 {
        self.col_widths.iter().sum()
    }

    pub fn height(&self) -> f32 {
        self.row_heights.iter().sum()
    }

    pub fn full_segment(&self) -> TableSegment {
        self.segment(0..self.row_heights.len())
    }

    /// Rows `range` as a segment. Continuation segments repeat the header rows first;
    /// merged cells are clipped to the rows present in the segment.
    pub fn segment(&self, range: Range<usize>) -> TableSegment {
        let mut rows: Vec<usize> = if range.start > 0 {
            (0..self.header_rows.min(range.start)).collect()
        } else {
            Vec::new()
        };
        rows.extend(range.clone());

        let row_heights: Vec<f32> = rows.iter().map(|&r| self.row_heights[r]).collect();
        let mut tops = Vec::with_capacity(rows.len());
        let mut y = 0.0;
        for h in &row_heights {
            tops.push(y);
            y += h;
        }

        let mut cells = Vec::new();
        for placed in &self.cells {
            let Some(pos) = rows.iter().position(|&r| r == placed.row) else {
                continue;
            };
            let mut height = 0.0;
            for k in pos..rows.len() {
                if rows[k] >= placed.row + placed.row_span || rows[k] < placed.row {
                    break;
                }
                height += row_heights[k];
            }
            let mut cell = placed.cell.clone();
            cell.row = pos;
            cell.y = tops[pos];
            cell.height = height;
            cells.push(cell);
        }

        TableSegment {
            col_widths: self.col_widths.clone(),
            rows,
            row_heights,
            cells,
            borders: self.borders.clone(),
            continued: range.start > 0,
        }
    }
}

/// Lay out a table at `available_width`, memoized per (uid, width).
pub fn layout_table(
    ctx: &LayoutContext,
    table: &Table,
    available_width: f32,
) -> Result<Arc<TableLayout>, LookupError> {
    ctx.table_layout(table.uid, available_width, || {
        compute_table_layout(ctx, table, available_width)
    })
}

fn grid_columns(table: &Table) -> usize {
    table
        .rows
        .iter()
        .map(|row| row.cells.iter().map(|c| c.span()).sum::<usize>())
        .max()
        .unwrap_or(0)
        .max(table.grid.len())
        .max(1)
}

/// Column widths from the grid, scaled down to fit `available - indent`. Without a grid
/// the usable width is divided evenly.
pub fn column_widths(ctx: &LayoutContext, table: &Table, available_width: f32) -> Vec<f32> {
    let usable = (available_width - table.style.indent).max(0.0);
    let ncols = grid_columns(table);
    let grid: Vec<f32> = table.grid.iter().map(|w| w.max(0.0)).collect();
    let grid_total: f32 = grid.iter().sum();

    let mut widths = if grid_total > 0.0 {
        let fill = grid_total / grid.len() as f32;
        let mut widths = grid;
        widths.resize(ncols, fill);
        if !table.style.is_fixed_layout() {
            widths = auto_fit_columns(ctx, table, widths);
        }
        widths
    } else {
        vec![usable / ncols as f32; ncols]
    };

    let total: f32 = widths.iter().sum();
    if total > usable && total > 0.0 {
        let scale = usable / total;
        for w in &mut widths {
            *w *= scale;
        }
    }
    widths
}

fn cell_margins(table: &Table, margins: Option<CellMargins>) -> CellMargins {
    margins
        .or(table.style.cell_margins)
        .unwrap_or_default()
}

/// Grow columns whose longest word (plus cell margins) does not fit, shrinking the others
/// proportionally. The total width is preserved.
fn auto_fit_columns(ctx: &LayoutContext, table: &Table, mut widths: Vec<f32>) -> Vec<f32> {
    let ncols = widths.len();
    let default_size = ctx.options.default_font_size;
    let mut min_widths = vec![0.0f32; ncols];

    for row in &table.rows {
        let mut grid_col = 0usize;
        for cell in &row.cells {
            let span = cell.span();
            if grid_col >= ncols || span > 1 {
                grid_col += span;
                continue;
            }
            let margins = cell_margins(table, cell.margins);
            for para in cell.content.iter().filter_map(Element::as_paragraph) {
                for run in &para.runs {
                    let font = TextStyle::from_run(&run.style.inherit(&para.style), default_size);
                    for word in run.text.split_whitespace() {
                        let w = ctx.metrics.text_width(&measurable(word), &font)
                            + margins.left
                            + margins.right;
                        min_widths[grid_col] = min_widths[grid_col].max(w);
                    }
                }
            }
            grid_col += span;
        }
    }

    let total: f32 = widths.iter().sum();
    let mut extra_needed = 0.0f32;
    let mut shrinkable = 0.0f32;
    for (w, min) in widths.iter_mut().zip(&min_widths) {
        if *min > *w {
            extra_needed += *min - *w;
            *w = *min;
        } else {
            shrinkable += *w - *min;
        }
    }

    if extra_needed > 0.0 && shrinkable > 0.0 {
        let factor = extra_needed.min(shrinkable) / shrinkable;
        for (w, min) in widths.iter_mut().zip(&min_widths) {
            if *w > *min {
                *w -= (*w - *min) * factor;
            }
        }
        let new_total: f32 = widths.iter().sum();
        if (new_total - total).abs() > 0.01 && new_total > 0.0 {
            let scale = total / new_total;
            for w in &mut widths {
                *w *= scale;
            }
        }
    }
    widths
}

/// Explicit row height. Both `exact` and `atLeast` act as a floor; content is never clipped.
fn row_floor(row: &Row) -> f32 {
    row.height.filter(|h| *h > 0.0).unwrap_or(0.0)
}

fn compute_table_layout(
    ctx: &LayoutContext,
    table: &Table,
    available_width: f32,
) -> Result<TableLayout, LookupError> {
    let col_widths = column_widths(ctx, table, available_width);
    let ncols = col_widths.len();
    let col_x: Vec<f32> = col_widths
        .iter()
        .scan(0.0, |x, w| {
            let start = *x;
            *x += w;
            Some(start)
        })
        .collect();

    let mut cells: Vec<PlacedCell> = Vec::new();
    // Per grid column: index into `cells` of the merge currently open there
    let mut open_merge: Vec<Option<usize>> = vec![None; ncols];
    // Measured outer height per cell, for merge resolution below
    let mut measured: Vec<f32> = Vec::new();

    for (r, row) in table.rows.iter().enumerate() {
        let mut grid_col = 0usize;
        for (c, cell) in row.cells.iter().enumerate() {
            let span = cell.span();
            let start = grid_col.min(ncols);
            let end = (grid_col + span).min(ncols);
            grid_col += span;
            let x = col_x.get(start).copied().unwrap_or_else(|| col_widths.iter().sum());
            let width: f32 = col_widths[start..end].iter().sum();
            let margins = cell_margins(table, cell.margins);

            if cell.v_merge == Some(VMerge::Continue)
                && let Some(origin) = open_merge.get(start).copied().flatten()
            {
                cells[origin].row_span = r - cells[origin].row + 1;
                let from = &cells[origin].cell;
                let merged = CellBox {
                    row: r,
                    col: c,
                    span,
                    x,
                    y: 0.0,
                    width,
                    height: 0.0,
                    margins,
                    vertical_align: from.vertical_align,
                    content_height: 0.0,
                    items: Vec::new(),
                    shading: from.shading.clone(),
                    borders: cell.borders.clone(),
                    merged: true,
                };
                cells.push(PlacedCell {
                    cell: merged,
                    row: r,
                    row_span: 1,
                });
                measured.push(0.0);
                continue;
            }

            let node = ctx
                .dispatcher
                .dispatch(ctx, ElementRef::Cell { cell, margins }, width)?;
            let inner = (width - margins.left - margins.right).max(0.0);
            let flow = layout_flow(ctx, &cell.content, inner)?;

            for slot in open_merge.iter_mut().take(end).skip(start) {
                *slot = None;
            }
            if cell.v_merge == Some(VMerge::Restart)
                && let Some(slot) = open_merge.get_mut(start)
            {
                *slot = Some(cells.len());
            }

            measured.push(node.height());
            cells.push(PlacedCell {
                cell: CellBox {
                    row: r,
                    col: c,
                    span,
                    x,
                    y: 0.0,
                    width,
                    height: 0.0,
                    margins,
                    vertical_align: cell.vertical_align,
                    content_height: flow.height,
                    items: flow.items,
                    shading: cell.shading.clone(),
                    borders: cell.borders.clone(),
                    merged: false,
                },
                row: r,
                row_span: 1,
            });
        }
    }

    let mut row_heights: Vec<f32> = table
        .rows
        .iter()
        .enumerate()
        .map(|(r, row)| {
            let content = cells
                .iter()
                .zip(&measured)
                .filter(|(p, _)| p.row == r && p.row_span == 1)
                .map(|(_, h)| *h)
                .fold(0.0f32, f32::max);
            content.max(row_floor(row))
        })
        .collect();

    // A merged cell taller than its rows stretches the last row it covers
    for (placed, &need) in cells.iter().zip(&measured) {
        if placed.row_span > 1 {
            let last = placed.row + placed.row_span - 1;
            let have: f32 = row_heights[placed.row..=last].iter().sum();
            if need > have {
                row_heights[last] += need - have;
            }
        }
    }

    let header_rows = table.rows.iter().take_while(|r| r.is_header).count();
    log::debug!(
        "Table uid={} cols={} rows={} height={:.1}",
        table.uid,
        ncols,
        row_heights.len(),
        row_heights.iter().sum::<f32>()
    );

    Ok(TableLayout {
        col_widths,
        row_heights,
        header_rows,
        indent: table.style.indent,
        borders: table.style.borders.clone(),
        cells,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placed(row: usize, row_span: usize) -> PlacedCell {
        PlacedCell {
            cell: CellBox {
                row,
                col: 0,
                span: 1,
                x: 0.0,
                y: 0.0,
                width: 10.0,
                height: 0.0,
                margins: CellMargins::default(),
                vertical_align: Default::default(),
                content_height: 0.0,
                items: Vec::new(),
                shading: None,
                borders: Default::default(),
                merged: false,
            },
            row,
            row_span,
        }
    }

    #[test]
    fn segments_repeat_headers_and_clip_merges() {
        let layout = TableLayout {
            col_widths: vec![10.0],
            row_heights: vec![5.0, 10.0, 20.0, 30.0],
            header_rows: 1,
            indent: 0.0,
            borders: TableBorders::default(),
            cells: vec![placed(0, 1), placed(1, 3), placed(3, 1)],
        };
        let seg = layout.segment(2..4);
        assert_eq!(seg.rows, vec![0, 2, 3]);
        assert_eq!(seg.row_heights, vec![5.0, 20.0, 30.0]);
        assert!(seg.continued);
        // The merge starting at row 1 is not in this segment; header and row 3 are
        assert_eq!(seg.cells.len(), 2);
        assert_eq!(seg.cells[1].y, 25.0);

        let first = layout.segment(0..3);
        let merged = &first.cells[1];
        assert_eq!(merged.height, 30.0);
    }
}
