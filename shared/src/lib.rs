pub mod error;
pub mod models;
pub mod poll;
pub mod validation;

pub use error::{ErrorResponse, PollError, Result};
pub use models::*;
pub use validation::*;
