use super::handlers::{ErrorResponse, health, login, session};
use crate::auth::{Profile, RegistrationFields};
use axum::Json;
use utoipa::{
    OpenApi,
    openapi::{InfoBuilder, License},
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        login::page,
        login::submit,
        session::logout,
        session::me,
    ),
    components(schemas(
        health::Health,
        login::LoginForm,
        login::FieldErrors,
        login::ValidationFailure,
        login::FormFailure,
        login::LoginStatus,
        session::MeResponse,
        Profile,
        RegistrationFields,
        ErrorResponse,
    )),
    tags(
        (name = "health", description = "Service and database status"),
        (name = "auth", description = "Login, registration and sessions")
    )
)]
struct ApiDoc;

/// The `OpenAPI` document, described with Cargo.toml metadata.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();

    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(Some(env!("CARGO_PKG_DESCRIPTION")))
        .build();
    info.license = Some(License::new(env!("CARGO_PKG_LICENSE")));
    doc.info = info;

    doc
}

pub(super) async fn serve() -> Json<utoipa::openapi::OpenApi> {
    Json(openapi())
}
