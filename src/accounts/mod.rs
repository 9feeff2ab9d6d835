use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};

use crate::state::AppState;

pub mod addresses;
pub mod claims;
mod dto;
pub mod handlers;
pub mod password;
pub mod replay;
pub mod repo;
pub mod repo_types;
pub mod tokens;
pub(crate) mod extractors;

pub fn router() -> Router<AppState> {
    Router::new().merge(upload_routes()).merge(json_routes())
}

// The raised body limit applies to the multipart upload routes only.
fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/create-user", post(handlers::create_user))
        .route("/update-avatar", put(handlers::update_avatar))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
}

fn json_routes() -> Router<AppState> {
    Router::new()
        .route("/activation", post(handlers::activation))
        .route("/login-user", post(handlers::login_user))
        .route("/getuser", get(handlers::get_user))
        .route("/logout", get(handlers::logout))
        .route("/update-user-info", put(handlers::update_user_info))
        .route("/update-user-addresses", put(handlers::update_user_addresses))
        .route("/delete-user-address/:id", delete(handlers::delete_user_address))
        .route("/update-user-password", put(handlers::update_user_password))
        .route("/user-info/:id", get(handlers::user_info))
}
