use std::time::Duration;
use rocket::{State, get, post, put, delete, http::Status, serde::json::{self, Json}};
use rocket_ws::{Channel, WebSocket};
use tracing::{debug, instrument, warn};
use shared::models::*;
use crate::{
    error::ApiError,
    hub::HubHandle,
    processor::PollProcessor,
    subscriber,
    utils::{json_body, require_id},
};

pub struct AppState {
    pub processor: PollProcessor,
    pub write_wait: Duration,
}

impl AppState {
    pub fn new(processor: PollProcessor) -> Self {
        Self {
            processor,
            write_wait: subscriber::WRITE_WAIT,
        }
    }

    pub fn hub(&self) -> &HubHandle {
        self.processor.hub()
    }
}

#[rocket::options("/<_..>")]
pub async fn all_options() -> Status {
    Status::Ok
}

#[instrument(skip(state))]
#[get("/poll?<id>")]
pub async fn get_poll(state: &State<AppState>, id: Option<&str>) -> Result<Json<Poll>, ApiError> {
    let id = require_id(id)?;
    let poll = state.processor.get_poll(id).await?;
    Ok(Json(poll))
}

#[instrument(skip(state, options))]
#[put("/poll", data = "<options>")]
pub async fn create_poll(
    state: &State<AppState>,
    options: Result<Json<Vec<PollOption>>, json::Error<'_>>,
) -> Result<(Status, Json<Poll>), ApiError> {
    let options = json_body(options)?;
    let poll = state.processor.create_poll(options).await?;
    Ok((Status::Created, Json(poll)))
}

#[instrument(skip(state, poll))]
#[post("/poll", data = "<poll>")]
pub async fn update_poll(
    state: &State<AppState>,
    poll: Result<Json<Poll>, json::Error<'_>>,
) -> Result<(Status, Json<Poll>), ApiError> {
    let poll = json_body(poll)?;
    let updated = state.processor.replace_poll(poll).await?;
    Ok((Status::Accepted, Json(updated)))
}

#[instrument(skip(state))]
#[delete("/poll?<id>")]
pub async fn delete_poll(state: &State<AppState>, id: Option<&str>) -> Result<Status, ApiError> {
    let id = require_id(id)?;
    state.processor.delete_poll(id).await?;
    Ok(Status::NoContent)
}

#[instrument(skip(state, vote))]
#[post("/vote?<id>", data = "<vote>")]
pub async fn add_vote(
    state: &State<AppState>,
    id: Option<&str>,
    vote: Result<Json<VoteRequest>, json::Error<'_>>,
) -> Result<(Status, Json<Poll>), ApiError> {
    let id = require_id(id)?;
    let vote = json_body(vote)?;
    let poll = state.processor.add_vote(id, &vote).await?;
    Ok((Status::Accepted, Json(poll)))
}

#[instrument(skip(state))]
#[delete("/vote?<id>&<user>")]
pub async fn remove_vote(
    state: &State<AppState>,
    id: Option<&str>,
    user: Option<&str>,
) -> Result<(Status, Json<Poll>), ApiError> {
    let id = require_id(id)?;
    let user = user.ok_or_else(|| ApiError::BadRequest("no user specified".into()))?;
    let poll = state.processor.clear_votes_for(id, user).await?;
    Ok((Status::Accepted, Json(poll)))
}

#[instrument(skip(state, option))]
#[post("/option?<id>", data = "<option>")]
pub async fn add_option(
    state: &State<AppState>,
    id: Option<&str>,
    option: Result<Json<PollOption>, json::Error<'_>>,
) -> Result<(Status, Json<Poll>), ApiError> {
    let id = require_id(id)?;
    let option = json_body(option)?;
    let poll = state.processor.add_option(id, option).await?;
    Ok((Status::Accepted, Json(poll)))
}

#[instrument(skip(state))]
#[delete("/option?<id>&<option>")]
pub async fn remove_option(
    state: &State<AppState>,
    id: Option<&str>,
    option: Option<&str>,
) -> Result<(Status, Json<Poll>), ApiError> {
    let id = require_id(id)?;
    let option = option.ok_or_else(|| ApiError::BadRequest("no option specified".into()))?;
    let poll = state.processor.remove_option(id, option).await?;
    Ok((Status::Accepted, Json(poll)))
}

/// Upgrades to a websocket that receives every committed update of poll `id`.
#[instrument(skip(state, ws))]
#[get("/ws?<id>")]
pub fn subscribe(state: &State<AppState>, ws: WebSocket, id: Option<&str>) -> Result<Channel<'static>, ApiError> {
    let poll_id = require_id(id)?.to_string();
    let hub = state.hub().clone();
    let write_wait = state.write_wait;

    Ok(ws.channel(move |stream| Box::pin(async move {
        match hub.register(&poll_id).await {
            Ok(subscription) => {
                let watching = hub.subscriber_count(&poll_id).await.unwrap_or_default();
                debug!(%poll_id, subscriber = subscription.id, watching, "Subscriber connected");
                subscriber::serve(stream, subscription, hub, write_wait).await;
            }
            Err(e) => warn!(%poll_id, "Could not register subscriber: {}", e),
        }
        Ok(())
    })))
}
