use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{dto::PublicUser, jwt::AuthUser, repo::User},
    error::{ApiError, ApiResult},
    state::AppState,
};

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me))
        .route("/me", delete(delete_me))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<PublicUser>> {
    // A verified token for a since-deleted account is no longer a valid
    // credential.
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or(ApiError::AuthInvalid)?;

    Ok(Json(PublicUser {
        id: user.id,
        name: user.name,
        email: user.email,
    }))
}

#[instrument(skip(state))]
pub async fn delete_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<StatusCode> {
    if !User::delete(&state.db, user_id).await? {
        return Err(ApiError::AuthInvalid);
    }
    info!(user_id, "user deleted with owned tasks");
    Ok(StatusCode::NO_CONTENT)
}
