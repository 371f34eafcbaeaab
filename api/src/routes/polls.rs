//! Poll endpoints

use crate::{ApiError, ApiResult, ApiState};
use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, Path, State},
    routing::{get, post},
    Json, Router,
};
use livepoll_core::{Ballot, NetworkOrigin, Poll};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Register poll routes
pub fn poll_routes() -> Router<ApiState> {
    Router::new()
        .route("/api/polls", post(create_poll))
        .route("/api/polls/{id}", get(get_poll))
        .route("/api/polls/{id}/vote", post(cast_vote))
}

#[derive(Debug, Deserialize)]
pub struct CreatePollRequest {
    pub question: Option<String>,
    pub options: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResponse {
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
    pub created_at: i64,
}

impl From<Poll> for PollResponse {
    fn from(poll: Poll) -> Self {
        Self {
            id: poll.id,
            question: poll.question,
            options: poll.options,
            created_at: poll.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PollResultsResponse {
    #[serde(flatten)]
    pub poll: PollResponse,
    pub votes: Vec<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub option_index: Option<i64>,
    pub fingerprint: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VoteResponse {
    pub success: bool,
    pub message: String,
    pub votes: Vec<u64>,
}

/// Create a new poll
pub async fn create_poll(
    State(state): State<ApiState>,
    payload: Result<Json<CreatePollRequest>, JsonRejection>,
) -> ApiResult<Json<PollResponse>> {
    let Json(request) = payload?;
    let (Some(question), Some(options)) = (request.question, request.options) else {
        return Err(ApiError::BadRequest(
            "Invalid poll data. Need question and at least 2 options.".to_string(),
        ));
    };

    let poll = state.service.create_poll(&question, &options)?;
    crate::ok_json!(poll.into())
}

/// Get poll details and current results
pub async fn get_poll(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<PollResultsResponse>> {
    let view = state.service.get_poll(&id)?;
    crate::ok_json!(PollResultsResponse {
        poll: view.poll.into(),
        votes: view.votes.into_inner(),
    })
}

/// Vote on a poll
pub async fn cast_vote(
    State(state): State<ApiState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(id): Path<String>,
    payload: Result<Json<VoteRequest>, JsonRejection>,
) -> ApiResult<Json<VoteResponse>> {
    let Json(request) = payload?;
    let (Some(option_index), Some(fingerprint)) = (request.option_index, request.fingerprint)
    else {
        return Err(ApiError::BadRequest(
            "Missing optionIndex or fingerprint".to_string(),
        ));
    };

    let ballot = Ballot {
        poll_id: id,
        option_index,
        fingerprint,
        origin: NetworkOrigin::new(peer.ip()),
    };
    let votes = state.service.cast_vote(ballot).await?;

    crate::ok_json!(VoteResponse {
        success: true,
        message: "Vote recorded".to_string(),
        votes: votes.into_inner(),
    })
}
