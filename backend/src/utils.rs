use rocket::serde::json::{self, Json};
use tracing::debug;
use crate::error::ApiError;

pub fn require_id(id: Option<&str>) -> Result<&str, ApiError> {
    match id.map(str::trim) {
        Some(id) if !id.is_empty() => Ok(id),
        Some(_) => {
            debug!("Empty ID specified. Returning bad request status.");
            Err(ApiError::MissingId)
        }
        None => {
            debug!("No ID specified. Returning bad request status.");
            Err(ApiError::MissingId)
        }
    }
}

pub fn json_body<T>(body: Result<Json<T>, json::Error<'_>>) -> Result<T, ApiError> {
    body.map(Json::into_inner).map_err(|e| {
        debug!("Could not parse request body: {}", e);
        ApiError::BadRequest(e.to_string())
    })
}
