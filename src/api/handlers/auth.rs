//! Login, registration, token validation and admin checks.

use crate::{
    api::{
        handlers::{bad_request, error_response, valid_email, valid_password},
        ApiState,
    },
    storage::{AppId, UserId},
};
use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, instrument};

#[derive(Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
    app_id: Option<AppId>,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"***")
            .field("app_id", &self.app_id)
            .finish()
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    email: String,
    password: String,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct RegisterResponse {
    pub user_id: UserId,
}

#[derive(Deserialize)]
pub struct ValidateRequest {
    token: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ValidateResponse {
    pub user_id: UserId,
}

#[derive(Deserialize, Debug)]
pub struct IsAdminRequest {
    user_id: UserId,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct IsAdminResponse {
    pub is_admin: bool,
}

#[instrument(skip_all)]
pub async fn login(
    Extension(state): Extension<ApiState>,
    payload: Option<Json<LoginRequest>>,
) -> Response {
    let request: LoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => return bad_request("Missing payload"),
    };

    debug!("request: {:?}", request);

    if !valid_email(&request.email) {
        return bad_request("Invalid email");
    }

    if request.password.is_empty() {
        return bad_request("Missing password");
    }

    if request.app_id.is_some_and(|app_id| app_id <= 0) {
        return bad_request("Invalid app_id");
    }

    match state
        .auth()
        .login(
            &state.call_context(),
            &request.email,
            &request.password,
            request.app_id,
        )
        .await
    {
        Ok(token) => (StatusCode::OK, Json(LoginResponse { token })).into_response(),
        Err(err) => error_response(&err),
    }
}

#[instrument(skip_all)]
pub async fn register(
    Extension(state): Extension<ApiState>,
    payload: Option<Json<RegisterRequest>>,
) -> Response {
    let request: RegisterRequest = match payload {
        Some(Json(payload)) => payload,
        None => return bad_request("Missing payload"),
    };

    debug!("request: {:?}", request);

    if !valid_email(&request.email) {
        return bad_request("Invalid email");
    }

    if !valid_password(&request.password) {
        return bad_request("Invalid password");
    }

    match state
        .auth()
        .register(&state.call_context(), &request.email, &request.password)
        .await
    {
        Ok(user_id) => (StatusCode::CREATED, Json(RegisterResponse { user_id })).into_response(),
        Err(err) => error_response(&err),
    }
}

#[instrument(skip_all)]
pub async fn validate(
    Extension(state): Extension<ApiState>,
    payload: Option<Json<ValidateRequest>>,
) -> Response {
    let request: ValidateRequest = match payload {
        Some(Json(payload)) => payload,
        None => return bad_request("Missing payload"),
    };

    if request.token.is_empty() {
        return bad_request("Missing token");
    }

    match state
        .auth()
        .validate_token(&state.call_context(), &request.token)
        .await
    {
        Ok(user_id) => (StatusCode::OK, Json(ValidateResponse { user_id })).into_response(),
        Err(err) => error_response(&err),
    }
}

#[instrument(skip_all)]
pub async fn is_admin(
    Extension(state): Extension<ApiState>,
    payload: Option<Json<IsAdminRequest>>,
) -> Response {
    let request: IsAdminRequest = match payload {
        Some(Json(payload)) => payload,
        None => return bad_request("Missing payload"),
    };

    if request.user_id <= 0 {
        return bad_request("Invalid user_id");
    }

    match state
        .auth()
        .is_admin(&state.call_context(), request.user_id)
        .await
    {
        Ok(is_admin) => (StatusCode::OK, Json(IsAdminResponse { is_admin })).into_response(),
        Err(err) => error_response(&err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_debug_redacts_password() {
        let request = LoginRequest {
            email: "a@x.com".to_string(),
            password: "hunter2hunter2".to_string(),
            app_id: Some(1),
        };
        let debug = format!("{request:?}");
        assert!(debug.contains("a@x.com"));
        assert!(!debug.contains("hunter2"));

        let request = RegisterRequest {
            email: "a@x.com".to_string(),
            password: "hunter2hunter2".to_string(),
        };
        assert!(!format!("{request:?}").contains("hunter2"));
    }
}
