pub mod catchers;
pub mod config;
pub mod cors;
pub mod document;
pub mod error;
pub mod hub;
pub mod locks;
pub mod processor;
pub mod routes;
pub mod store;
pub mod subscriber;
pub mod utils;
pub use shared::{models::*, PollError};

use std::sync::Arc;
use rocket::{catchers, fairing::AdHoc, routes, Build, Rocket};
use tracing::{error, info};
use crate::{
    catchers::{bad_request, internal_error, not_found, unprocessable},
    config::ServerConfig,
    cors::CORS,
    hub::Hub,
    locks::LockRegistry,
    processor::PollProcessor,
    routes::*,
    store::PollStore,
};

/// Wires the store, lock registry and a freshly spawned hub into a Rocket
/// instance. Must be called from within a tokio runtime.
pub fn build_rocket(config: &ServerConfig, store: Arc<dyn PollStore>) -> Rocket<Build> {
    let hub = Hub::spawn(config.hub);
    let processor = PollProcessor::new(store, LockRegistry::new(), hub);

    rocket::build()
        .attach(CORS::new(config.allowed_origin.clone()))
        .attach(AdHoc::on_shutdown("Close poll store", |rocket| Box::pin(async move {
            if let Some(state) = rocket.state::<AppState>() {
                match state.processor.close().await {
                    Ok(()) => info!("Poll store closed"),
                    Err(e) => error!("Failed to close poll store: {}", e),
                }
            }
        })))
        .manage(AppState::new(processor))
        .mount(
            "/api",
            routes![
                get_poll,
                create_poll,
                update_poll,
                delete_poll,
                add_vote,
                remove_vote,
                add_option,
                remove_option,
                subscribe,
                all_options
            ],
        )
        .register(
            "/",
            catchers![
                bad_request,
                not_found,
                unprocessable,
                internal_error
            ],
        )
}

#[cfg(test)]
mod tests;
