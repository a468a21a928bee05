use crate::errors::{BoardError, MoveError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of rows on the board. Row 0 is the top row.
pub const ROWS: usize = 6;
/// Number of columns on the board.
pub const COLS: usize = 7;
/// Run length that wins the game.
pub const CONNECT: usize = 4;
/// Index of the centre column.
pub const CENTER_COLUMN: usize = COLS / 2;

const DIRECTIONS: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

/// Piece marker owned by one player for the lifetime of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Symbol {
    #[serde(rename = "R")]
    Red,
    #[serde(rename = "Y")]
    Yellow,
}

impl Symbol {
    pub fn opponent(self) -> Symbol {
        match self {
            Symbol::Red => Symbol::Yellow,
            Symbol::Yellow => Symbol::Red,
        }
    }

    pub fn marker(self) -> char {
        match self {
            Symbol::Red => 'R',
            Symbol::Yellow => 'Y',
        }
    }
}

pub type Cell = Option<Symbol>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub column: usize,
}

/// Result of a successful [`Board::apply_move`]: the new board plus the cell that was filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub board: Board,
    pub row: usize,
    pub column: usize,
}

impl Placement {
    pub fn position(&self) -> Position {
        Position {
            row: self.row,
            column: self.column,
        }
    }
}

/// A 6x7 gravity-filled grid.
///
/// Boards are plain values: [`Board::apply_move`] returns a new board and never
/// touches `self`, so callers can keep the previous position around freely.
/// Every constructor keeps the gravity invariant (no piece above an empty cell),
/// deserialization included.
///
/// # Examples
///
/// ```
/// use connect4_engine::board::{Board, Symbol};
///
/// let board = Board::new();
/// let placed = board.apply_move(3, Symbol::Red).expect("empty column accepts a move");
/// assert_eq!(placed.row, 5);
/// assert_eq!(placed.board.cell(5, 3), Some(Some(Symbol::Red)));
/// assert!(board.is_empty());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "Grid", try_from = "Grid")]
pub struct Board {
    cells: Grid,
}

/// Row-major cells, row 0 on top. The wire form of a [`Board`].
pub type Grid = [[Cell; COLS]; ROWS];

impl From<Board> for Grid {
    fn from(board: Board) -> Self {
        board.cells
    }
}

impl TryFrom<Grid> for Board {
    type Error = BoardError;

    fn try_from(cells: Grid) -> Result<Self, Self::Error> {
        let board = Board { cells };
        match board.floating_piece() {
            Some(position) => Err(BoardError::FloatingPiece {
                row: position.row,
                column: position.column,
            }),
            None => Ok(board),
        }
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    pub fn new() -> Self {
        Self {
            cells: [[None; COLS]; ROWS],
        }
    }

    /// Parse a board from six text rows, top row first.
    ///
    /// `.` marks an empty cell, `R` and `Y` mark pieces. Whitespace is ignored.
    pub fn from_rows(rows: [&str; ROWS]) -> Result<Self, BoardError> {
        let mut board = Self::new();
        for (row, text) in rows.iter().enumerate() {
            let markers: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
            if markers.len() != COLS {
                return Err(BoardError::RowLength {
                    row,
                    len: markers.len(),
                    expected: COLS,
                });
            }
            for (column, marker) in markers.into_iter().enumerate() {
                board.cells[row][column] = match marker {
                    '.' => None,
                    'R' | 'r' => Some(Symbol::Red),
                    'Y' | 'y' => Some(Symbol::Yellow),
                    other => {
                        return Err(BoardError::UnknownMarker {
                            marker: other,
                            row,
                            column,
                        })
                    }
                };
            }
        }

        Board::try_from(board.cells)
    }

    pub fn rows(&self) -> &[[Cell; COLS]; ROWS] {
        &self.cells
    }

    /// Cell contents, or `None` when the coordinate is off the board.
    pub fn cell(&self, row: usize, column: usize) -> Option<Cell> {
        self.cells.get(row).and_then(|r| r.get(column)).copied()
    }

    /// Lowest empty row in `column`, if any.
    pub fn drop_row(&self, column: usize) -> Option<usize> {
        if column >= COLS {
            return None;
        }
        (0..ROWS).rev().find(|&row| self.cells[row][column].is_none())
    }

    pub fn accepts(&self, column: usize) -> bool {
        self.drop_row(column).is_some()
    }

    /// Columns that currently accept a piece, in ascending order.
    pub fn legal_columns(&self) -> impl Iterator<Item = usize> + '_ {
        (0..COLS).filter(move |&column| self.accepts(column))
    }

    pub fn apply_move(&self, column: usize, symbol: Symbol) -> Result<Placement, MoveError> {
        if column >= COLS {
            return Err(MoveError::ColumnOutOfRange {
                column: i64::try_from(column).unwrap_or(i64::MAX),
            });
        }
        let row = self
            .drop_row(column)
            .ok_or(MoveError::ColumnFull { column })?;

        let mut board = *self;
        board.cells[row][column] = Some(symbol);
        Ok(Placement { board, row, column })
    }

    /// True when the piece at (`row`, `column`) is part of a run of at least [`CONNECT`].
    ///
    /// Only lines through the given cell are examined; a win can only be created
    /// by the most recent placement.
    pub fn check_win(&self, row: usize, column: usize) -> bool {
        self.winning_line(row, column).is_some()
    }

    /// Cells of the first winning run through (`row`, `column`), ordered along the line.
    pub fn winning_line(&self, row: usize, column: usize) -> Option<Vec<Position>> {
        let symbol = self.cell(row, column).flatten()?;

        for (dr, dc) in DIRECTIONS {
            let backward = self.run_length(row, column, -dr, -dc, symbol);
            let forward = self.run_length(row, column, dr, dc, symbol);
            if backward + forward + 1 >= CONNECT {
                let start_row = row as isize - dr * backward as isize;
                let start_col = column as isize - dc * backward as isize;
                let line = (0..=(backward + forward) as isize)
                    .map(|step| Position {
                        row: (start_row + dr * step) as usize,
                        column: (start_col + dc * step) as usize,
                    })
                    .collect();
                return Some(line);
            }
        }
        None
    }

    pub fn is_full(&self) -> bool {
        self.cells[0].iter().all(Option::is_some)
    }

    pub fn is_empty(&self) -> bool {
        self.cells[ROWS - 1].iter().all(Option::is_none)
    }

    pub fn count(&self, symbol: Symbol) -> usize {
        self.cells
            .iter()
            .flatten()
            .filter(|cell| **cell == Some(symbol))
            .count()
    }

    pub fn pieces(&self) -> usize {
        self.cells.iter().flatten().filter(|cell| cell.is_some()).count()
    }

    /// First piece found sitting above an empty cell, scanning top-down.
    pub fn floating_piece(&self) -> Option<Position> {
        for row in 0..ROWS - 1 {
            for column in 0..COLS {
                if self.cells[row][column].is_some() && self.cells[row + 1][column].is_none() {
                    return Some(Position { row, column });
                }
            }
        }
        None
    }

    // Cells matching `symbol` walking away from the origin, origin excluded.
    fn run_length(&self, row: usize, column: usize, dr: isize, dc: isize, symbol: Symbol) -> usize {
        let mut count = 0;
        let mut r = row as isize + dr;
        let mut c = column as isize + dc;
        while r >= 0 && c >= 0 && (r as usize) < ROWS && (c as usize) < COLS {
            if self.cells[r as usize][c as usize] != Some(symbol) {
                break;
            }
            count += 1;
            r += dr;
            c += dc;
        }
        count
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, row) in self.cells.iter().enumerate() {
            let line: String = row
                .iter()
                .map(|cell| cell.map(Symbol::marker).unwrap_or('.'))
                .collect();
            if index + 1 < ROWS {
                writeln!(f, "{line}")?;
            } else {
                write!(f, "{line}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_row_follows_gravity() {
        let board = Board::new();
        assert_eq!(board.drop_row(0), Some(5));
        let placed = board.apply_move(0, Symbol::Red).unwrap();
        assert_eq!(placed.board.drop_row(0), Some(4));
        assert_eq!(placed.board.drop_row(COLS), None);
    }

    #[test]
    fn winning_line_is_ordered_along_the_run() {
        let board = Board::from_rows([
            ".......",
            ".......",
            ".......",
            ".......",
            ".......",
            ".RRRR..",
        ])
        .unwrap();
        let line = board.winning_line(5, 3).expect("horizontal four");
        let columns: Vec<usize> = line.iter().map(|p| p.column).collect();
        assert_eq!(columns, vec![1, 2, 3, 4]);
        assert!(line.iter().all(|p| p.row == 5));
    }

    #[test]
    fn display_round_trips_through_from_rows() {
        let rows = [
            ".......",
            ".......",
            ".......",
            "...Y...",
            "..RR...",
            "YRYRY..",
        ];
        let board = Board::from_rows(rows).unwrap();
        assert_eq!(board.to_string(), rows.join("\n"));
    }

    #[test]
    fn from_rows_rejects_floating_piece() {
        let err = Board::from_rows([
            ".......",
            ".......",
            ".......",
            "R......",
            ".......",
            ".......",
        ])
        .unwrap_err();
        assert_eq!(err, BoardError::FloatingPiece { row: 3, column: 0 });
    }

    #[test]
    fn from_rows_rejects_bad_shapes() {
        let err = Board::from_rows(["", "", "", "", "", ""]).unwrap_err();
        assert!(matches!(err, BoardError::RowLength { row: 0, len: 0, .. }));

        let err = Board::from_rows([
            ".......", ".......", ".......", ".......", ".......", "...X...",
        ])
        .unwrap_err();
        assert!(matches!(err, BoardError::UnknownMarker { marker: 'X', .. }));
    }
}
