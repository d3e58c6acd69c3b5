use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;

use super::{dispatch, ApiJson, AppState, CurrentUser, Sessions};
use crate::{
    models::users::{Credentials, PasswordChange, Registration, UserSettings},
    services::{users::UserRequest, ServiceError},
};

const MIN_USERNAME_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 6;

fn invalid(message: &str) -> ServiceError {
    ServiceError::Validation(message.to_string())
}

fn validate_registration(registration: &Registration) -> Result<(), ServiceError> {
    if registration.username.trim().chars().count() < MIN_USERNAME_LEN {
        return Err(invalid("Username must be at least 3 characters"));
    }
    if !registration.email.contains('@') {
        return Err(invalid("Invalid email address"));
    }
    if registration.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(invalid("Password must be at least 6 characters"));
    }
    if registration.password != registration.confirm_password {
        return Err(invalid("Passwords do not match"));
    }
    Ok(())
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(registration): ApiJson<Registration>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_registration(&registration)?;

    let user = dispatch(&state.user_channel, |response| UserRequest::Register {
        registration,
        response,
    })
    .await?;

    let cookie = state.sessions.open(user.id);
    Ok((StatusCode::CREATED, [(SET_COOKIE, cookie)], Json(user)))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(credentials): ApiJson<Credentials>,
) -> Result<impl IntoResponse, ServiceError> {
    let user = dispatch(&state.user_channel, |response| UserRequest::Login {
        credentials,
        response,
    })
    .await?;

    let cookie = state.sessions.open(user.id);
    Ok(([(SET_COOKIE, cookie)], Json(user)))
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    state.sessions.close_from_headers(&headers);
    ([(SET_COOKIE, Sessions::expired_cookie())], StatusCode::OK)
}

pub async fn current_user(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> Result<impl IntoResponse, ServiceError> {
    let user = dispatch(&state.user_channel, |response| UserRequest::GetUser {
        user_id: caller.user_id,
        response,
    })
    .await?;

    Ok(Json(user))
}

pub async fn update_settings(
    State(state): State<AppState>,
    caller: CurrentUser,
    ApiJson(settings): ApiJson<UserSettings>,
) -> Result<impl IntoResponse, ServiceError> {
    if settings.email.as_deref().is_some_and(|email| !email.contains('@')) {
        return Err(invalid("Invalid email address"));
    }

    let user = dispatch(&state.user_channel, |response| UserRequest::UpdateSettings {
        user_id: caller.user_id,
        settings,
        response,
    })
    .await?;

    Ok(Json(user))
}

pub async fn change_password(
    State(state): State<AppState>,
    caller: CurrentUser,
    ApiJson(change): ApiJson<PasswordChange>,
) -> Result<impl IntoResponse, ServiceError> {
    if change.current_password.is_empty() || change.new_password.is_empty() {
        return Err(invalid("Current password and new password are required"));
    }
    if change.new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(invalid("New password must be at least 6 characters"));
    }

    dispatch(&state.user_channel, |response| UserRequest::ChangePassword {
        user_id: caller.user_id,
        change,
        response,
    })
    .await?;

    Ok(Json(json!({ "message": "Password updated successfully" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration() -> Registration {
        Registration {
            username: "ada".to_string(),
            email: "ada@example.com".to_string(),
            password: "secret1".to_string(),
            confirm_password: "secret1".to_string(),
            full_name: None,
            referral_code: None,
        }
    }

    #[test]
    fn registration_rules() {
        assert!(validate_registration(&registration()).is_ok());

        let mut short = registration();
        short.username = " ab ".to_string();
        assert!(validate_registration(&short).is_err());

        let mut email = registration();
        email.email = "ada.example.com".to_string();
        assert!(validate_registration(&email).is_err());

        let mut password = registration();
        password.password = "12345".to_string();
        password.confirm_password = "12345".to_string();
        assert!(validate_registration(&password).is_err());

        let mut mismatch = registration();
        mismatch.confirm_password = "secret2".to_string();
        let err = validate_registration(&mismatch).unwrap_err();
        assert_eq!(err.to_string(), "Passwords do not match");
    }
}
