use axum::{
    extract::{DefaultBodyLimit, Query, State},
    routing::{get, post, put},
    Router,
};
use serde_json::json;
use tracing::{info, instrument, warn};

use super::{
    dto::{
        ChangePasswordRequest, EmailRequest, LoginRequest, NewPasswordPayload, ProfileRequest,
        RegisterRequest, TokenPayload, UserPayload, VerifyEmailQuery,
    },
    extractors::AuthUser,
    repo_types::{User, UserFilter},
    services::{self, Verification},
};
use crate::{
    envelope::ApiResponse,
    error::AppError,
    extract::{EntityId, ValidatedJson},
    state::AppState,
    upload::{ProfilePicture, Uploaded, MAX_UPLOAD_BYTES},
};

/// Multipart bodies carry the file plus a few text fields.
const MULTIPART_LIMIT: usize = MAX_UPLOAD_BYTES + 1024 * 1024;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/register",
            post(register).layer(DefaultBodyLimit::max(MULTIPART_LIMIT)),
        )
        .route("/login", post(login))
        .route("/forget-password", post(forget_password))
        .route("/forgot-password", post(forget_password))
        .route("/change-password/:id", post(change_password))
        .route("/resend-verification", post(resend_verification))
        .route("/verify-email", get(verify_email))
        .route("/user/:id", get(get_user))
        .route(
            "/update-profile/:id",
            put(update_profile).layer(DefaultBodyLimit::max(MULTIPART_LIMIT)),
        )
        .route("/me", get(me))
}

#[instrument(skip(state, upload))]
pub async fn register(
    State(state): State<AppState>,
    mut upload: Uploaded<ProfilePicture>,
) -> Result<ApiResponse, AppError> {
    let result = register_from_form(&state, &mut upload).await;
    let user = upload.settle(result).await?;

    Ok(ApiResponse::created(
        "User registered successfully",
        UserPayload { user },
    ))
}

async fn register_from_form(
    state: &AppState,
    upload: &mut Uploaded<ProfilePicture>,
) -> Result<User, AppError> {
    // A taken email wins over any other problem with the form, the picture included.
    if let Some(email) = upload.fields.get("email") {
        services::ensure_email_available(state, email).await?;
    }
    let registration = upload.validate_form(RegisterRequest::from_form)?;
    services::register(state, registration).await
}

#[instrument(skip(state, creds))]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(creds): ValidatedJson<LoginRequest>,
) -> Result<ApiResponse, AppError> {
    let (token, user) = services::login(&state, creds).await?;
    Ok(ApiResponse::ok("Login successful", TokenPayload { token, user }))
}

#[instrument(skip(state, email))]
pub async fn forget_password(
    State(state): State<AppState>,
    ValidatedJson(email): ValidatedJson<EmailRequest>,
) -> Result<ApiResponse, AppError> {
    let new_password = services::forgot_password(&state, &email).await?;
    Ok(ApiResponse::ok(
        "A new password has been sent to your email",
        NewPasswordPayload { new_password },
    ))
}

#[instrument(skip(state, change))]
pub async fn change_password(
    State(state): State<AppState>,
    EntityId(id): EntityId,
    ValidatedJson(change): ValidatedJson<ChangePasswordRequest>,
) -> Result<ApiResponse, AppError> {
    services::change_password(&state, id, change).await?;
    Ok(ApiResponse::ok("Password changed successfully", json!({})))
}

#[instrument(skip(state, email))]
pub async fn resend_verification(
    State(state): State<AppState>,
    ValidatedJson(email): ValidatedJson<EmailRequest>,
) -> Result<ApiResponse, AppError> {
    services::resend_verification(&state, &email).await?;
    Ok(ApiResponse::ok("Verification email sent", json!({})))
}

#[instrument(skip(state, query))]
pub async fn verify_email(
    State(state): State<AppState>,
    query: Option<Query<VerifyEmailQuery>>,
) -> Result<ApiResponse, AppError> {
    let Some(token) = query
        .and_then(|Query(q)| q.token)
        .filter(|t| !t.trim().is_empty())
    else {
        warn!("verify-email without token");
        return Err(AppError::BadRequest("Verification token is required".into()));
    };

    match services::verify_email(&state, token.trim()).await? {
        Verification::Verified(user) => Ok(ApiResponse::ok(
            "Email verified successfully.",
            UserPayload { user },
        )),
        Verification::AlreadyVerified(user) => {
            info!(user_id = user.id, "email was already verified");
            Ok(ApiResponse::ok("Email already verified.", UserPayload { user }))
        }
    }
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    EntityId(id): EntityId,
) -> Result<ApiResponse, AppError> {
    let user = services::find_user(&state, &UserFilter::Id(id))
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    Ok(ApiResponse::ok("User fetched successfully", UserPayload { user }))
}

#[instrument(skip(state, upload))]
pub async fn update_profile(
    State(state): State<AppState>,
    EntityId(id): EntityId,
    mut upload: Uploaded<ProfilePicture>,
) -> Result<ApiResponse, AppError> {
    let result = match upload.validate_form(ProfileRequest::from_form) {
        Ok(update) => services::update_profile(&state, id, update).await,
        Err(e) => Err(e),
    };
    let user = upload.settle(result).await?;
    Ok(ApiResponse::ok("Profile updated successfully", UserPayload { user }))
}

#[instrument(skip(state, caller), fields(user_id = caller.id))]
pub async fn me(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<ApiResponse, AppError> {
    let user = services::find_user(&state, &UserFilter::Id(caller.id))
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    Ok(ApiResponse::ok("User fetched successfully", UserPayload { user }))
}
