pub mod health;
pub mod leaderboard;
pub mod lobby;
pub mod ws;

pub use health::health;
pub use leaderboard::{leaderboard, recent_matches, LimitQuery};
pub use lobby::lobby;
pub use ws::serve_connection;
