use serde::Serialize;
use warp::reply::Json;

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    live_matches: usize,
    waiting_players: usize,
}

pub fn health(live_matches: usize, waiting_players: usize) -> Json {
    warp::reply::json(&HealthBody {
        status: "ok",
        live_matches,
        waiting_players,
    })
}
