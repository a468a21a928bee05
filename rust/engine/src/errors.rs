use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MoveError {
    #[error("Column {column} is outside the board (0-{max})", max = crate::board::COLS - 1)]
    ColumnOutOfRange { column: i64 },
    #[error("Column {column} is full")]
    ColumnFull { column: usize },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BoardError {
    #[error("Board row {row} has {len} cells, expected {expected}")]
    RowLength {
        row: usize,
        len: usize,
        expected: usize,
    },
    #[error("Unknown cell marker {marker:?} at row {row}, column {column}")]
    UnknownMarker {
        marker: char,
        row: usize,
        column: usize,
    },
    #[error("Piece at row {row}, column {column} has an empty cell beneath it")]
    FloatingPiece { row: usize, column: usize },
}
