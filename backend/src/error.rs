use rocket::http::Status;
use rocket::response::Responder;
use rocket::serde::json::Json;
use serde::Serialize;
use thiserror::Error;
use shared::{ErrorResponse, PollError};

#[derive(Error, Debug, Serialize)]
pub enum ApiError {
    #[error("No poll ID specified")]
    MissingId,
    #[error("Could not parse request: {0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Invalid(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<PollError> for ApiError {
    fn from(err: PollError) -> Self {
        match err {
            PollError::NotFound(_) => ApiError::NotFound(err.to_string()),
            PollError::Invalid(_) => ApiError::Invalid(err.to_string()),
            PollError::StoreUnavailable(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            ApiError::MissingId => Status::BadRequest,
            ApiError::BadRequest(_) => Status::BadRequest,
            ApiError::NotFound(_) => Status::NotFound,
            ApiError::Invalid(_) => Status::BadRequest,
            ApiError::Internal(_) => Status::InternalServerError,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for ApiError {
    fn respond_to(self, req: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        let body = Json(ErrorResponse { error: self.to_string() });
        rocket::Response::build_from(body.respond_to(req)?)
            .status(status)
            .ok()
    }
}
