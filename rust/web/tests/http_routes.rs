use connect4_web::{AppContext, GatewaySettings, WebServer};
use serde_json::Value;
use std::time::Duration;
use warp::http::StatusCode;

fn context() -> AppContext {
    AppContext::new_for_tests(GatewaySettings::default()).expect("context")
}

async fn get_json(context: &AppContext, path: &str) -> (StatusCode, Value) {
    let response = warp::test::request()
        .method("GET")
        .path(path)
        .reply(&WebServer::routes(context))
        .await;
    let status = response.status();
    let body = serde_json::from_slice(response.body()).unwrap_or(Value::Null);
    (status, body)
}

/// Play a short horizontal win for `winner` against `loser`.
async fn play_out(context: &AppContext, winner: &str, loser: &str) {
    let gateway = context.gateway();
    gateway.join(gateway.open_connection(), winner).unwrap();
    let reply = gateway.join(gateway.open_connection(), loser).unwrap();
    let connect4_web::JoinReply::Started { match_id } = reply else {
        panic!("expected a pairing, got {reply:?}");
    };
    for column in 0..3 {
        gateway.submit_move(winner, &match_id, column).unwrap();
        gateway.submit_move(loser, &match_id, column).unwrap();
    }
    gateway.submit_move(winner, &match_id, 3).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
}

#[tokio::test]
async fn health_reports_live_counts() {
    let context = context();
    let gateway = context.gateway();
    gateway.join(gateway.open_connection(), "alice").unwrap();

    let (status, body) = get_json(&context, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["waiting_players"], 1);
    assert_eq!(body["live_matches"], 0);
}

#[tokio::test]
async fn lobby_lists_queue_and_matches() {
    let context = context();
    let gateway = context.gateway();
    gateway.join(gateway.open_connection(), "alice").unwrap();
    gateway.join(gateway.open_connection(), "bob").unwrap();
    gateway.join(gateway.open_connection(), "carol").unwrap();

    let (status, body) = get_json(&context, "/api/lobby").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["waiting"][0]["player"], "carol");
    assert_eq!(body["matches"][0]["players"][0], "alice");
    assert_eq!(body["matches"][0]["vs_bot"], false);
}

#[tokio::test]
async fn leaderboard_ranks_humans_by_wins() {
    let context = context();
    play_out(&context, "alice", "bob").await;
    play_out(&context, "alice", "carol").await;
    play_out(&context, "bob", "carol").await;

    let (status, body) = get_json(&context, "/api/leaderboard").await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|standing| standing["username"].as_str())
        .collect();
    assert_eq!(names, vec!["alice", "bob", "carol"]);
    assert_eq!(body[0]["gamesWon"], 2);
    assert_eq!(body[2]["gamesPlayed"], 2);

    let (_, limited) = get_json(&context, "/api/leaderboard?limit=1").await;
    assert_eq!(limited.as_array().map(Vec::len), Some(1));

    let (_, recent) = get_json(&context, "/api/matches?limit=2").await;
    let recent = recent.as_array().expect("array");
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0]["player1"], "bob");
    assert_eq!(recent[0]["status"], "win");
}

#[tokio::test]
async fn metrics_reflect_finished_matches() {
    let context = context();
    play_out(&context, "alice", "bob").await;

    let (status, body) = get_json(&context, "/api/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matches_started"], 1);
    assert_eq!(body["matches_completed"], 1);
    assert_eq!(body["live_matches"], 0);
    assert_eq!(body["winner_counts"]["alice"], 1);
}

#[tokio::test]
async fn unknown_paths_are_not_found() {
    let context = context();
    let (status, _) = get_json(&context, "/api/nothing-here").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn websocket_route_requires_an_upgrade() {
    let context = context();
    let (status, _) = get_json(&context, "/ws").await;
    assert!(status.is_client_error());
}
