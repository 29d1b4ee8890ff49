//! The combined login/registration form.
//!
//! Flow Overview:
//! 1) `_action` selects login or register; anything else is rejected.
//! 2) Fields are validated and echoed back (never the password) on failure.
//! 3) [`AuthService`] checks the credentials or creates the account.
//! 4) Success answers with a 303 carrying the new session cookie.

use axum::{
    Form, Json,
    extract::Extension,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use tracing::{debug, error, instrument};
use utoipa::ToSchema;

use super::{ErrorResponse, cookie_header, internal_error, see_other, valid_email};
use crate::auth::{
    AuthError, AuthService, Credentials, CurrentUser, LOGIN_PATH, LOGIN_REDIRECT, NewUser,
    Profile, RegistrationFields,
};

const MIN_PASSWORD_LENGTH: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormAction {
    Login,
    Register,
}

impl FormAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Register => "register",
        }
    }

    fn parse(action: &str) -> Option<Self> {
        match action {
            "login" => Some(Self::Login),
            "register" => Some(Self::Register),
            _ => None,
        }
    }
}

/// `application/x-www-form-urlencoded` body of `POST /login`.
#[derive(Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct LoginForm {
    #[serde(rename = "_action")]
    pub action: String,
    pub email: String,
    pub password: String,
    pub confirmpassword: String,
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    pub country: String,
    /// Where to go after a successful login, as set by `/login?redirectTo=`.
    #[serde(rename = "redirectTo")]
    pub redirect_to: Option<String>,
}

impl fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginForm")
            .field("action", &self.action)
            .field("email", &self.email)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("country", &self.country)
            .field("redirect_to", &self.redirect_to)
            .finish_non_exhaustive()
    }
}

impl LoginForm {
    /// Field-level problems for the given action; empty when the form is usable.
    #[must_use]
    pub fn validate(&self, action: FormAction) -> FieldErrors {
        let mut errors = FieldErrors {
            email: validate_email(&self.email),
            password: validate_password(&self.password),
            ..FieldErrors::default()
        };

        if action == FormAction::Register {
            errors.confirm_password =
                validate_confirm_password(&self.password, &self.confirmpassword);
            errors.first_name = validate_name(&self.first_name);
            errors.last_name = validate_name(&self.last_name);
        }

        errors
    }

    #[must_use]
    pub fn fields(&self) -> RegistrationFields {
        RegistrationFields {
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            country: self.country.clone(),
        }
    }

    fn into_credentials(self) -> Credentials {
        Credentials {
            email: self.email,
            password: SecretString::from(self.password),
        }
    }

    fn into_new_user(self) -> NewUser {
        NewUser {
            email: self.email,
            password: SecretString::from(self.password),
            profile: Profile {
                first_name: self.first_name,
                last_name: self.last_name,
                country: self.country,
            },
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FieldErrors {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirm_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl FieldErrors {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.password.is_none()
            && self.confirm_password.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
    }
}

/// 400 body for a form that failed field validation.
#[derive(Debug, Serialize, ToSchema)]
pub struct ValidationFailure {
    pub errors: FieldErrors,
    pub fields: RegistrationFields,
    pub form: String,
}

/// 400 body for a rejected login or registration.
#[derive(Debug, Serialize, ToSchema)]
pub struct FormFailure {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<RegistrationFields>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginStatus {
    pub authenticated: bool,
}

#[must_use]
pub fn validate_email(email: &str) -> Option<String> {
    (!valid_email(email.trim())).then(|| "Please enter a valid email address".to_string())
}

#[must_use]
pub fn validate_password(password: &str) -> Option<String> {
    (password.chars().count() < MIN_PASSWORD_LENGTH).then(|| {
        format!("Please enter a password that is at least {MIN_PASSWORD_LENGTH} characters long")
    })
}

#[must_use]
pub fn validate_confirm_password(password: &str, confirm: &str) -> Option<String> {
    (password != confirm).then(|| "Passwords do not match".to_string())
}

#[must_use]
pub fn validate_name(name: &str) -> Option<String> {
    name.trim()
        .is_empty()
        .then(|| "Please enter a value".to_string())
}

/// Accept only same-site absolute paths of visible ASCII as post-login targets.
fn safe_redirect(target: Option<&str>) -> Option<&str> {
    target.filter(|path| {
        path.starts_with('/')
            && !path.starts_with("//")
            && !path.contains('\\')
            && path.bytes().all(|byte| byte.is_ascii_graphic())
    })
}

#[utoipa::path(
    get,
    path = "/login",
    responses(
        (status = 200, description = "No active session; show the login form", body = LoginStatus),
        (status = 303, description = "Already signed in; redirect home")
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn page(headers: HeaderMap, auth: Extension<Arc<AuthService>>) -> Response {
    let cookies = cookie_header(&headers);
    let anonymous = Json(LoginStatus {
        authenticated: false,
    });

    match auth.get_user(cookies.as_deref()).await {
        Ok(CurrentUser::Authenticated(_)) => see_other(LOGIN_REDIRECT, None),
        Ok(CurrentUser::Anonymous) => anonymous.into_response(),
        // Already on the login page: clear the cookie without redirecting.
        Ok(CurrentUser::ForcedLogout(logout)) => {
            ([(SET_COOKIE, logout.set_cookie)], anonymous).into_response()
        }
        Err(err) => {
            error!("Failed to resolve session on {LOGIN_PATH}: {err}");
            internal_error()
        }
    }
}

#[utoipa::path(
    post,
    path = "/login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Signed in; the session cookie is set"),
        (status = 400, description = "Field validation failed (`ValidationFailure`) or login/registration rejected", body = FormFailure),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all, fields(action = tracing::field::Empty))]
pub async fn submit(auth: Extension<Arc<AuthService>>, form: Option<Form<LoginForm>>) -> Response {
    let Some(Form(form)) = form else {
        return invalid_form(None);
    };

    let Some(action) = FormAction::parse(&form.action) else {
        debug!("Unknown form action: {:?}", form.action);
        return invalid_form(Some(form.action));
    };
    tracing::Span::current().record("action", action.as_str());

    let errors = form.validate(action);
    if !errors.is_empty() {
        debug!("Form validation failed: {:?}", errors);
        let failure = ValidationFailure {
            errors,
            fields: form.fields(),
            form: action.as_str().to_string(),
        };
        return (StatusCode::BAD_REQUEST, Json(failure)).into_response();
    }

    let outcome = match action {
        FormAction::Login => {
            let redirect_to = safe_redirect(form.redirect_to.as_deref()).map(ToString::to_string);
            auth.login(form.into_credentials())
                .await
                .map(|issued| (issued, redirect_to))
        }
        FormAction::Register => auth
            .register(form.into_new_user())
            .await
            .map(|issued| (issued, None)),
    };

    match outcome {
        Ok((issued, redirect_to)) => see_other(
            redirect_to.as_deref().unwrap_or(&issued.redirect_to),
            Some(issued.set_cookie),
        ),
        Err(err) => rejected(action, err),
    }
}

fn invalid_form(action: Option<String>) -> Response {
    let failure = FormFailure {
        error: "Invalid Form Data".to_string(),
        fields: None,
        form: action,
    };
    (StatusCode::BAD_REQUEST, Json(failure)).into_response()
}

fn rejected(action: FormAction, err: AuthError) -> Response {
    let form = Some(action.as_str().to_string());
    let failure = match err {
        AuthError::InvalidCredentials | AuthError::EmailTaken => FormFailure {
            error: err.public_message().to_string(),
            fields: None,
            form,
        },
        AuthError::CreationFailed { ref fields } => FormFailure {
            error: err.public_message().to_string(),
            fields: Some(fields.clone()),
            form,
        },
        err => {
            error!("Failed to {}: {err:#}", action.as_str());
            return internal_error();
        }
    };
    (StatusCode::BAD_REQUEST, Json(failure)).into_response()
}
