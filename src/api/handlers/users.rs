use crate::{
    api::{
        handlers::{bad_request, error_response},
        ApiState,
    },
    storage::UserId,
};
use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::instrument;

#[instrument(skip(state))]
pub async fn delete(
    Extension(state): Extension<ApiState>,
    Path(user_id): Path<UserId>,
) -> Response {
    if user_id <= 0 {
        return bad_request("Invalid user id");
    }

    match state
        .auth()
        .delete_user(&state.call_context(), user_id)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(&err),
    }
}
