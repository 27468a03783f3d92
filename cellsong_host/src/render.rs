// ASCII rendering of a session snapshot.
//
// One character per cell:
//   `.` dead   `#` alive   `+` dying
// Dead cells under a box footprint show the box instead: `-` for a neutral
// highlight, `=` for a box whose last evaluation triggered a note.

use cellsong_sim::session::GridSnapshot;
use cellsong_sim::types::{BOX_HEIGHT, BOX_WIDTH, CellState};
use std::fmt::Write;

pub fn render_ascii(snapshot: &GridSnapshot) -> String {
    let size = snapshot.size;
    let mut overlay = vec![None; size * size];
    for footprint in &snapshot.boxes {
        let col0 = footprint.column * BOX_WIDTH;
        for row in footprint.row..(footprint.row + BOX_HEIGHT).min(size) {
            for col in col0..(col0 + BOX_WIDTH).min(size) {
                overlay[row * size + col] = Some(footprint.color.is_some());
            }
        }
    }

    let mut out = String::with_capacity(size * (size + 1) + 32);
    let _ = writeln!(
        out,
        "gen {}  boxes {}",
        snapshot.generation,
        snapshot.boxes.len()
    );
    for (row, cells) in snapshot.cells.chunks(size.max(1)).enumerate() {
        for (col, cell) in cells.iter().enumerate() {
            let ch = match (cell, overlay[row * size + col]) {
                (CellState::Alive, _) => '#',
                (CellState::Dying, _) => '+',
                (CellState::Dead, Some(true)) => '=',
                (CellState::Dead, Some(false)) => '-',
                (CellState::Dead, None) => '.',
            };
            out.push(ch);
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellsong_sim::session::BoxFootprint;
    use cellsong_sim::types::{BoxId, ColorTag};

    fn blank(size: usize) -> GridSnapshot {
        GridSnapshot {
            size,
            generation: 3,
            cells: vec![CellState::Dead; size * size],
            boxes: Vec::new(),
        }
    }

    #[test]
    fn cells_render_by_state() {
        let mut snap = blank(24);
        snap.cells[0] = CellState::Alive;
        snap.cells[1] = CellState::Dying;
        let text = render_ascii(&snap);
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("gen 3  boxes 0"));
        assert!(lines.next().unwrap().starts_with("#+.."));
        assert_eq!(text.lines().count(), 25);
    }

    #[test]
    fn boxes_overlay_dead_cells_only() {
        let mut snap = blank(24);
        snap.cells[6 * 24 + 6] = CellState::Alive;
        snap.boxes.push(BoxFootprint {
            id: BoxId(1),
            column: 1,
            row: 6,
            column_color: ColorTag(1),
            color: Some(ColorTag(4)),
        });
        snap.boxes.push(BoxFootprint {
            id: BoxId(2),
            column: 3,
            row: 0,
            column_color: ColorTag(3),
            color: None,
        });
        let text = render_ascii(&snap);
        let rows: Vec<&str> = text.lines().skip(1).collect();
        assert_eq!(&rows[6][6..12], "#=====");
        assert_eq!(&rows[11][6..12], "======");
        assert_eq!(&rows[12][6..12], "......");
        assert_eq!(&rows[0][18..24], "------");
        assert_eq!(&rows[0][12..18], "......");
    }
}
