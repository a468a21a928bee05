//! Bot opponents as the gateway uses them.
//!
//! Re-exports the strategies from `connect4_ai` and adds the lookups the
//! gateway needs to drive a bot seat inside a [`Match`].

pub use connect4_ai::{heuristic::HeuristicBot, BotStrategy};

use crate::game::Match;
use std::sync::Arc;

/// Resolve a strategy by name, falling back to the heuristic bot for unknown names.
///
/// # Example
/// ```
/// use connect4_web::ai::create_bot;
///
/// let bot = create_bot("heuristic");
/// assert_eq!(bot.name(), "heuristic");
/// assert_eq!(create_bot("unknown").name(), "heuristic");
/// ```
pub fn create_bot(name: &str) -> Arc<dyn BotStrategy> {
    match connect4_ai::create_bot(name) {
        Ok(bot) => Arc::from(bot),
        Err(err) => {
            tracing::warn!(error = %err, "falling back to the heuristic bot");
            Arc::new(HeuristicBot::new())
        }
    }
}

/// Column the bot seat of `game` would play now, if it is the bot's turn.
pub fn next_bot_column(strategy: &dyn BotStrategy, game: &Match) -> Option<usize> {
    if !game.bot_to_move() {
        return None;
    }
    let bot = game.bot()?;
    let symbol = game.symbol_of(bot)?;
    strategy.choose_column(game.board(), symbol, symbol.opponent())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn bot_opponent_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn BotStrategy>();
    }

    #[test]
    fn bot_plays_only_on_its_turn() {
        let bot = create_bot("heuristic");
        let mut game =
            Match::against_bot("m".into(), "alice".into(), "BOT".into(), Utc::now()).unwrap();
        assert_eq!(next_bot_column(bot.as_ref(), &game), None);

        game.play("alice", 0, Utc::now()).unwrap();
        assert_eq!(next_bot_column(bot.as_ref(), &game), Some(3));
    }

    #[test]
    fn human_match_has_no_bot_column() {
        let bot = create_bot("");
        let game = Match::new("m".into(), "a".into(), "b".into(), Utc::now()).unwrap();
        assert_eq!(next_bot_column(bot.as_ref(), &game), None);
    }
}
