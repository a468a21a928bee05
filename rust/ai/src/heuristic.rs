//! Single-ply heuristic opponent.
//!
//! Move selection, in priority order:
//! 1. a column that wins immediately,
//! 2. a column that blocks an immediate opponent win,
//! 3. the column whose resulting board scores highest under [`score_board`].
//!
//! Columns are always examined in ascending order and a later column only
//! replaces the current best on a strictly higher score, so ties resolve to the
//! lowest column index. The selector is deterministic.

use crate::BotStrategy;
use connect4_engine::board::{Board, Symbol, CENTER_COLUMN};

/// Bonus added for each of the bot's pieces in the centre column.
pub const CENTER_BONUS: i32 = 2;

#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicBot;

impl HeuristicBot {
    pub fn new() -> Self {
        Self
    }
}

impl BotStrategy for HeuristicBot {
    fn choose_column(&self, board: &Board, bot: Symbol, opponent: Symbol) -> Option<usize> {
        choose_move(board, bot, opponent)
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}

/// Pick a column for `bot`, or `None` when the board is full.
///
/// # Example
///
/// ```rust
/// use connect4_ai::heuristic::choose_move;
/// use connect4_engine::board::{Board, Symbol};
///
/// // Yellow threatens the bottom row; Red must block at column 3.
/// let board = Board::from_rows([
///     ".......",
///     ".......",
///     ".......",
///     ".......",
///     "R......",
///     "YYY.R..",
/// ])
/// .unwrap();
/// assert_eq!(choose_move(&board, Symbol::Red, Symbol::Yellow), Some(3));
/// ```
pub fn choose_move(board: &Board, bot: Symbol, opponent: Symbol) -> Option<usize> {
    let legal: Vec<usize> = board.legal_columns().collect();
    if legal.is_empty() {
        return None;
    }

    if let Some(column) = first_winning_column(board, &legal, bot) {
        return Some(column);
    }
    if let Some(column) = first_winning_column(board, &legal, opponent) {
        return Some(column);
    }

    let mut best_column = legal[0];
    let mut best_score = i32::MIN;
    for &column in &legal {
        let Ok(placed) = board.apply_move(column, bot) else {
            continue;
        };
        let score = score_board(&placed.board, bot);
        if score > best_score {
            best_score = score;
            best_column = column;
        }
    }
    Some(best_column)
}

/// +1 per `symbol` piece, plus [`CENTER_BONUS`] for each one in the centre column.
pub fn score_board(board: &Board, symbol: Symbol) -> i32 {
    let mut score = 0;
    for row in board.rows() {
        for (column, cell) in row.iter().enumerate() {
            if *cell == Some(symbol) {
                score += 1;
                if column == CENTER_COLUMN {
                    score += CENTER_BONUS;
                }
            }
        }
    }
    score
}

fn first_winning_column(board: &Board, legal: &[usize], symbol: Symbol) -> Option<usize> {
    legal.iter().copied().find(|&column| {
        board
            .apply_move(column, symbol)
            .map(|placed| placed.board.check_win(placed.row, placed.column))
            .unwrap_or(false)
    })
}
