//! # connect4-engine: Board rules for Connect Four
//!
//! A pure, allocation-free representation of the 6x7 Connect Four grid.
//! Knows how pieces fall, which columns accept a move, and whether the most
//! recent placement completed a line. It holds no state beyond the grid.
//!
//! ## Core Modules
//!
//! - [`board`] - Board, Symbol, move application, win and draw detection
//! - [`errors`] - Error types for rejected moves and unparsable boards
//!
//! ## Quick Start
//!
//! ```rust
//! use connect4_engine::board::{Board, Symbol};
//!
//! let mut board = Board::new();
//! for column in 0..3 {
//!     board = board.apply_move(column, Symbol::Red).expect("legal").board;
//! }
//! let last = board.apply_move(3, Symbol::Red).expect("legal");
//! assert!(last.board.check_win(last.row, last.column));
//! ```
//!
//! ## Rejected Moves
//!
//! Moves into a full column or off the board are reported, never applied:
//!
//! ```rust
//! use connect4_engine::board::{Board, Symbol, COLS};
//! use connect4_engine::errors::MoveError;
//!
//! let board = Board::new();
//! assert!(matches!(
//!     board.apply_move(COLS, Symbol::Yellow),
//!     Err(MoveError::ColumnOutOfRange { .. })
//! ));
//! ```

pub mod board;
pub mod errors;

pub use board::{Board, Cell, Placement, Position, Symbol, CENTER_COLUMN, COLS, CONNECT, ROWS};
pub use errors::{BoardError, MoveError};
