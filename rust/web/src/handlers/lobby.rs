use crate::errors::IntoErrorResponse;
use crate::gateway::SessionGateway;
use warp::reply::{self, Response};
use warp::Reply;

/// GET /api/lobby
/// Players waiting for an opponent and every match in progress
pub async fn lobby(gateway: SessionGateway) -> Response {
    match gateway.lobby() {
        Ok(snapshot) => reply::json(&snapshot).into_response(),
        Err(err) => err.into_http_response(),
    }
}
