//! Session endpoints: sign out and the current user.

use axum::{
    Json,
    extract::Extension,
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, instrument};
use utoipa::ToSchema;

use super::{cookie_header, internal_error, see_other};
use crate::auth::{AuthService, CurrentUser, Profile, RequireUser, login_redirect_target};

const ME_PATH: &str = "/me";

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub id: String,
    pub email: String,
    pub profile: Profile,
}

#[utoipa::path(
    post,
    path = "/logout",
    responses(
        (status = 303, description = "Session cleared; redirect to the login page")
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn logout(headers: HeaderMap, auth: Extension<Arc<AuthService>>) -> Response {
    let cookies = cookie_header(&headers);
    match auth.logout(cookies.as_deref()) {
        Ok(logout) => see_other(&logout.redirect_to, Some(logout.set_cookie)),
        Err(err) => {
            error!("Failed to clear session cookie: {err}");
            internal_error()
        }
    }
}

#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Return the signed-in user", body = MeResponse),
        (status = 303, description = "No session; redirect to the login page")
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn me(headers: HeaderMap, auth: Extension<Arc<AuthService>>) -> Response {
    let cookies = cookie_header(&headers);

    let user_id = match auth.require_user_id(cookies.as_deref(), ME_PATH) {
        RequireUser::Authenticated(user_id) => user_id,
        RequireUser::RedirectRequired(target) => return see_other(&target, None),
    };

    match auth.load_user(&user_id, cookies.as_deref()).await {
        Ok(CurrentUser::Authenticated(user)) => Json(MeResponse {
            id: user.id,
            email: user.email,
            profile: user.profile,
        })
        .into_response(),
        Ok(CurrentUser::Anonymous) => see_other(&login_redirect_target(ME_PATH), None),
        Ok(CurrentUser::ForcedLogout(logout)) => {
            see_other(&logout.redirect_to, Some(logout.set_cookie))
        }
        Err(err) => {
            error!("Failed to load session user: {err}");
            internal_error()
        }
    }
}
