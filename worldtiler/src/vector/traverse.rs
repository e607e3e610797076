//! Grid traversal between segment endpoints.
//!
//! Walks the tiles a segment passes through with a DDA over fractional grid
//! coordinates. A segment passing exactly through a grid corner steps
//! diagonally and skips the two tiles it only touches at that point.

use crate::coord::TileGrid;

use super::geometry::Coord;

const CORNER_EPSILON: f64 = 1e-12;

/// `(row, col)` of the tiles strictly between the tiles of `a` and `b`, in
/// traversal order.
pub fn tiles_between(grid: &TileGrid, level: u32, a: Coord, b: Coord) -> Vec<(u32, u32)> {
    let mut col = i64::from(grid.tile_x(a.x, level));
    let mut row = i64::from(grid.tile_y(a.y, level));
    let end_col = i64::from(grid.tile_x(b.x, level));
    let end_row = i64::from(grid.tile_y(b.y, level));
    let cols = i64::from(grid.col_count(level));
    let rows = i64::from(grid.row_count(level));

    let (ax, ay) = (grid.grid_x(a.x, level), grid.grid_y(a.y, level));
    let dx = grid.grid_x(b.x, level) - ax;
    let dy = grid.grid_y(b.y, level) - ay;

    let (step_x, mut t_max_x, t_delta_x) = axis(col, ax, dx);
    let (step_y, mut t_max_y, t_delta_y) = axis(row, ay, dy);

    let max_steps = (end_col - col).abs() + (end_row - row).abs() + 2;
    let mut tiles = Vec::new();

    for _ in 0..max_steps {
        if col == end_col && row == end_row {
            break;
        }
        let next_t = t_max_x.min(t_max_y);
        if next_t > 1.0 + CORNER_EPSILON {
            break;
        }
        if (t_max_x - t_max_y).abs() <= CORNER_EPSILON {
            col += step_x;
            row += step_y;
            t_max_x += t_delta_x;
            t_max_y += t_delta_y;
        } else if t_max_x < t_max_y {
            col += step_x;
            t_max_x += t_delta_x;
        } else {
            row += step_y;
            t_max_y += t_delta_y;
        }
        if !(0..cols).contains(&col) || !(0..rows).contains(&row) {
            break;
        }
        if col == end_col && row == end_row {
            break;
        }
        tiles.push((row as u32, col as u32));
    }

    tiles
}

/// Step direction, parameter of the first boundary and parameter per cell.
fn axis(cell: i64, start: f64, delta: f64) -> (i64, f64, f64) {
    if delta > 0.0 {
        (1, (cell as f64 + 1.0 - start) / delta, 1.0 / delta)
    } else if delta < 0.0 {
        (-1, (cell as f64 - start) / delta, -1.0 / delta)
    } else {
        (0, f64::INFINITY, f64::INFINITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> TileGrid {
        TileGrid::new(36.0).unwrap()
    }

    #[test]
    fn test_same_tile_has_nothing_between() {
        let tiles = tiles_between(&grid(), 0, Coord::new(1.0, 1.0), Coord::new(2.0, 2.0));
        assert!(tiles.is_empty());
    }

    #[test]
    fn test_adjacent_tiles_have_nothing_between() {
        let tiles = tiles_between(&grid(), 0, Coord::new(-10.0, 0.0), Coord::new(10.0, 0.0));
        assert!(tiles.is_empty());
    }

    #[test]
    fn test_horizontal_run() {
        // Columns 4..=8 at lzts 36 span -36..144.
        let tiles = tiles_between(&grid(), 0, Coord::new(-20.0, 0.0), Coord::new(130.0, 0.0));
        assert_eq!(tiles, vec![(2, 5), (2, 6), (2, 7)]);
    }

    #[test]
    fn test_westward_run() {
        let tiles = tiles_between(&grid(), 0, Coord::new(130.0, 0.0), Coord::new(-20.0, 0.0));
        assert_eq!(tiles, vec![(2, 7), (2, 6), (2, 5)]);
    }

    #[test]
    fn test_corner_steps_diagonally() {
        // (0, 18) is the corner shared by rows 2/3 and columns 4/5.
        let tiles = tiles_between(&grid(), 0, Coord::new(-10.0, 8.0), Coord::new(10.0, 28.0));
        assert!(tiles.is_empty());
    }

    #[test]
    fn test_diagonal_off_corner_visits_side_tile() {
        let tiles = tiles_between(&grid(), 0, Coord::new(-10.0, 10.0), Coord::new(10.0, 22.0));
        // Reaches lon 0 at lat 16, below the row edge at 18.
        assert_eq!(tiles, vec![(2, 5)]);
    }
}
