//! # connect4-ai: Automated opponents for Connect Four
//!
//! Provides the move selector used when no human opponent is available.
//! Strategies are pure: given a board and the two symbols they return a
//! column, without holding any state between calls.
//!
//! ## Core Components
//!
//! - [`BotStrategy`] - Trait every automated opponent implements
//! - [`heuristic`] - Win-now / block-now lookahead with a centre-weighted score
//! - [`create_bot`] - Factory resolving a strategy by name
//!
//! ## Quick Start
//!
//! ```rust
//! use connect4_ai::create_bot;
//! use connect4_engine::board::{Board, Symbol};
//!
//! let bot = create_bot("heuristic").expect("known strategy");
//! let column = bot.choose_column(&Board::new(), Symbol::Yellow, Symbol::Red);
//! assert_eq!(column, Some(3));
//! ```

use connect4_engine::board::{Board, Symbol};
use thiserror::Error;

pub mod heuristic;

/// Name of the default strategy.
pub const DEFAULT_STRATEGY: &str = "heuristic";

/// Interface for automated opponents.
///
/// Implementations must only return columns that currently accept a move,
/// and must return `None` exactly when no column does.
pub trait BotStrategy: Send + Sync {
    /// Pick the column to play for `bot`, facing `opponent`.
    fn choose_column(&self, board: &Board, bot: Symbol, opponent: Symbol) -> Option<usize>;

    fn name(&self) -> &str;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Unknown bot strategy: {0}")]
pub struct UnknownStrategy(pub String);

/// Resolve a strategy by name.
///
/// `"heuristic"`, its older alias `"baseline"` and the empty string all map to
/// [`heuristic::HeuristicBot`].
///
/// ```rust
/// use connect4_ai::create_bot;
///
/// assert!(create_bot("heuristic").is_ok());
/// assert!(create_bot("minimax").is_err());
/// ```
pub fn create_bot(name: &str) -> Result<Box<dyn BotStrategy>, UnknownStrategy> {
    match name.trim().to_ascii_lowercase().as_str() {
        "" | "heuristic" | "baseline" => Ok(Box::new(heuristic::HeuristicBot::new())),
        other => Err(UnknownStrategy(other.to_string())),
    }
}
