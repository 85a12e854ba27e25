use axum::extract::FromRef;
use time::OffsetDateTime;
use tracing::{info, warn};

use super::{
    claims::TokenKind,
    dto::{Credentials, PasswordChange, ProfileUpdate, Registration},
    jwt::JwtKeys,
    password::{
        generate_reset_password, hash_password_blocking, verify_password_blocking,
    },
    repo_types::{NewUser, ProfileChanges, User, UserFilter},
};
use crate::{db::StoreError, error::AppError, mail, state::AppState};

const EMAIL_TAKEN: &str = "Email already exists";

#[derive(Debug)]
pub enum Verification {
    Verified(User),
    AlreadyVerified(User),
}

pub async fn find_user(state: &AppState, filter: &UserFilter) -> Result<Option<User>, AppError> {
    state
        .users
        .find(filter)
        .await
        .map_err(AppError::internal("Failed to load user"))
}

async fn require_user(state: &AppState, filter: &UserFilter) -> Result<User, AppError> {
    find_user(state, filter)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

/// Conflict if any account already uses `email`.
pub async fn ensure_email_available(state: &AppState, email: &str) -> Result<(), AppError> {
    let email = email.trim().to_lowercase();
    if find_user(state, &UserFilter::Email(email.clone())).await?.is_some() {
        warn!(%email, "email already registered");
        return Err(AppError::Conflict(EMAIL_TAKEN.into()));
    }
    Ok(())
}

pub async fn register(state: &AppState, reg: Registration) -> Result<User, AppError> {
    let password_hash = hash_password_blocking(reg.password)
        .await
        .map_err(AppError::internal("Registration failed"))?;

    let user = state
        .users
        .create(NewUser {
            name: reg.name,
            email: reg.email,
            password_hash,
            mobile: reg.mobile,
            gender: reg.gender,
            profile_picture: reg.profile_picture,
        })
        .await
        .map_err(|e| match e {
            StoreError::UniqueViolation(_) => AppError::Conflict(EMAIL_TAKEN.into()),
            other => AppError::internal("Registration failed")(other),
        })?;

    info!(user_id = user.id, email = %user.email, "user registered");
    Ok(user)
}

/// Returns the access token and the user. Unknown email and wrong password
/// produce the same error.
pub async fn login(state: &AppState, creds: Credentials) -> Result<(String, User), AppError> {
    let invalid = || AppError::Unauthorized("Invalid credentials".into());

    let Some(user) = find_user(state, &UserFilter::Email(creds.email.clone())).await? else {
        warn!(email = %creds.email, "login unknown email");
        return Err(invalid());
    };

    let ok = verify_password_blocking(creds.password, user.password.clone())
        .await
        .map_err(AppError::internal("Login failed"))?;
    if !ok {
        warn!(user_id = user.id, "login invalid password");
        return Err(invalid());
    }

    let token = JwtKeys::from_ref(state)
        .sign_access(user.id, &user.email)
        .map_err(AppError::internal("Login failed"))?;

    info!(user_id = user.id, "user logged in");
    Ok((token, user))
}

/// Replaces the password with a random six-digit one and mails it.
/// Delivery is best-effort; the new password is returned either way.
pub async fn forgot_password(state: &AppState, email: &str) -> Result<String, AppError> {
    let user = require_user(state, &UserFilter::Email(email.to_string())).await?;

    let new_password = generate_reset_password();
    let hash = hash_password_blocking(new_password.clone())
        .await
        .map_err(AppError::internal("Password reset failed"))?;
    state
        .users
        .update_password(user.id, &hash)
        .await
        .map_err(AppError::internal("Password reset failed"))?;

    if let Err(e) = state
        .mailer
        .send(mail::password_reset_mail(&user.email, &new_password))
        .await
    {
        warn!(user_id = user.id, error = %format!("{e:#}"), "reset mail not delivered");
    }

    info!(user_id = user.id, "password reset");
    Ok(new_password)
}

pub async fn change_password(
    state: &AppState,
    user_id: i64,
    change: PasswordChange,
) -> Result<(), AppError> {
    let user = require_user(state, &UserFilter::Id(user_id)).await?;

    let matches = verify_password_blocking(change.old_password, user.password.clone())
        .await
        .map_err(AppError::internal("Password change failed"))?;
    if !matches {
        warn!(user_id, "old password mismatch");
        return Err(AppError::field("oldPassword", "Old password is incorrect"));
    }
    if change.new_password != change.confirm_password {
        return Err(AppError::field(
            "confirmPassword",
            "Confirm password must match new password",
        ));
    }

    let hash = hash_password_blocking(change.new_password)
        .await
        .map_err(AppError::internal("Password change failed"))?;
    state
        .users
        .update_password(user_id, &hash)
        .await
        .map_err(AppError::internal("Password change failed"))?;

    info!(user_id, "password changed");
    Ok(())
}

pub async fn resend_verification(state: &AppState, email: &str) -> Result<(), AppError> {
    let user = require_user(state, &UserFilter::Email(email.to_string())).await?;
    if user.email_verified.is_some() {
        return Err(AppError::AlreadyVerified);
    }

    let token = JwtKeys::from_ref(state)
        .sign_verification(user.id, &user.email)
        .map_err(AppError::internal("Failed to send verification email"))?;
    let link = format!("{}/email-verification?token={token}", state.config.app_url);

    state
        .mailer
        .send(mail::verification_mail(&user.email, &link))
        .await
        .map_err(AppError::internal("Failed to send verification email"))?;

    info!(user_id = user.id, "verification mail sent");
    Ok(())
}

pub async fn verify_email(state: &AppState, token: &str) -> Result<Verification, AppError> {
    let claims = JwtKeys::from_ref(state)
        .verify_kind(token, TokenKind::Verification)
        .map_err(|e| {
            warn!(error = %e, "verification token rejected");
            AppError::InvalidToken("Invalid or expired token".into())
        })?;

    let user = require_user(state, &UserFilter::Email(claims.email.clone())).await?;
    if user.email_verified.is_some() {
        return Ok(Verification::AlreadyVerified(user));
    }

    state
        .users
        .mark_email_verified(user.id, OffsetDateTime::now_utc())
        .await
        .map_err(AppError::internal("Email verification failed"))?;

    let user = require_user(state, &UserFilter::Id(user.id)).await?;
    info!(user_id = user.id, "email verified");
    Ok(Verification::Verified(user))
}

pub async fn update_profile(
    state: &AppState,
    user_id: i64,
    update: ProfileUpdate,
) -> Result<User, AppError> {
    state
        .users
        .update_profile(
            user_id,
            ProfileChanges {
                name: update.name,
                email: update.email,
                mobile: update.mobile,
                gender: update.gender,
                profile_picture: update.profile_picture,
            },
        )
        .await
        .map_err(|e| match e {
            StoreError::UniqueViolation(_) => AppError::Conflict(EMAIL_TAKEN.into()),
            other => AppError::internal("Profile update failed")(other),
        })?;

    let user = require_user(state, &UserFilter::Id(user_id)).await?;
    info!(user_id, "profile updated");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::password::verify_password, memory::RecordingMailer};
    use std::sync::Arc;

    fn registration(email: &str) -> Registration {
        Registration {
            name: "A".into(),
            email: email.into(),
            password: "secret1".into(),
            mobile: "1234567890".into(),
            gender: "male".into(),
            profile_picture: None,
        }
    }

    fn creds(email: &str, password: &str) -> Credentials {
        Credentials {
            email: email.into(),
            password: password.into(),
        }
    }

    async fn stored(state: &AppState, email: &str) -> User {
        find_user(state, &UserFilter::Email(email.into()))
            .await
            .unwrap()
            .expect("user exists")
    }

    #[tokio::test]
    async fn register_hashes_the_password() {
        let state = AppState::fake();
        let user = register(&state, registration("a@x.com")).await.unwrap();
        assert_ne!(user.password, "secret1");
        assert!(verify_password("secret1", &user.password).unwrap());
        assert!(user.email_verified.is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let state = AppState::fake();
        register(&state, registration("a@x.com")).await.unwrap();

        let err = ensure_email_available(&state, " A@X.com ").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let err = register(&state, registration("a@x.com")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn login_fails_the_same_way_for_unknown_email_and_wrong_password() {
        let state = AppState::fake();
        register(&state, registration("a@x.com")).await.unwrap();

        let unknown = login(&state, creds("b@x.com", "secret1")).await.unwrap_err();
        let wrong = login(&state, creds("a@x.com", "secret2")).await.unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());
        assert_eq!(unknown.status_code(), wrong.status_code());

        let (token, user) = login(&state, creds("a@x.com", "secret1")).await.unwrap();
        let claims = JwtKeys::from_ref(&state).verify(&token).unwrap();
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.kind, TokenKind::Access);
    }

    #[tokio::test]
    async fn change_password_rejects_wrong_old_password_without_mutating() {
        let state = AppState::fake();
        let user = register(&state, registration("a@x.com")).await.unwrap();

        let err = change_password(
            &state,
            user.id,
            PasswordChange {
                old_password: "nope".into(),
                new_password: "newsecret".into(),
                confirm_password: "newsecret".into(),
            },
        )
        .await
        .unwrap_err();
        match err {
            AppError::Validation(errors) => assert!(errors.get("oldPassword").is_some()),
            other => panic!("unexpected {other:?}"),
        }

        let err = change_password(
            &state,
            user.id,
            PasswordChange {
                old_password: "secret1".into(),
                new_password: "newsecret".into(),
                confirm_password: "different".into(),
            },
        )
        .await
        .unwrap_err();
        match err {
            AppError::Validation(errors) => assert!(errors.get("confirmPassword").is_some()),
            other => panic!("unexpected {other:?}"),
        }

        assert_eq!(stored(&state, "a@x.com").await.password, user.password);
    }

    #[tokio::test]
    async fn change_password_for_missing_user_is_not_found() {
        let state = AppState::fake();
        let err = change_password(
            &state,
            99,
            PasswordChange {
                old_password: "a".into(),
                new_password: "bbbbbb".into(),
                confirm_password: "bbbbbb".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn forgot_password_mails_and_stores_the_new_password() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::in_memory(mailer.clone());
        register(&state, registration("a@x.com")).await.unwrap();

        let new_password = forgot_password(&state, "a@x.com").await.unwrap();
        assert_eq!(new_password.len(), 6);
        assert!(verify_password(&new_password, &stored(&state, "a@x.com").await.password).unwrap());

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "a@x.com");
        assert!(sent[0].html.contains(&new_password));
    }

    #[tokio::test]
    async fn forgot_password_survives_mail_failure() {
        let mailer = Arc::new(RecordingMailer::failing());
        let state = AppState::in_memory(mailer);
        register(&state, registration("a@x.com")).await.unwrap();

        let new_password = forgot_password(&state, "a@x.com").await.unwrap();
        assert!(verify_password(&new_password, &stored(&state, "a@x.com").await.password).unwrap());
    }

    #[tokio::test]
    async fn forgot_password_for_unknown_email_touches_nothing() {
        let state = AppState::fake();
        let user = register(&state, registration("a@x.com")).await.unwrap();

        let err = forgot_password(&state, "b@x.com").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(stored(&state, "a@x.com").await.password, user.password);
    }

    #[tokio::test]
    async fn verify_email_twice_is_a_no_op_the_second_time() {
        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::in_memory(mailer.clone());
        register(&state, registration("a@x.com")).await.unwrap();

        resend_verification(&state, "a@x.com").await.unwrap();
        let html = &mailer.sent()[0].html;
        let token = html
            .split("token=")
            .nth(1)
            .and_then(|rest| rest.split('"').next())
            .expect("link carries a token")
            .to_string();
        assert!(html.contains(&format!("{}/email-verification?token=", state.config.app_url)));

        let first = match verify_email(&state, &token).await.unwrap() {
            Verification::Verified(user) => user.email_verified.expect("timestamp set"),
            Verification::AlreadyVerified(_) => panic!("first call should verify"),
        };
        match verify_email(&state, &token).await.unwrap() {
            Verification::AlreadyVerified(user) => assert_eq!(user.email_verified, Some(first)),
            Verification::Verified(_) => panic!("second call should be a no-op"),
        }

        let err = resend_verification(&state, "a@x.com").await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyVerified));
    }

    #[tokio::test]
    async fn verify_email_rejects_access_tokens() {
        let state = AppState::fake();
        let user = register(&state, registration("a@x.com")).await.unwrap();
        let token = JwtKeys::from_ref(&state)
            .sign_access(user.id, &user.email)
            .unwrap();
        let err = verify_email(&state, &token).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn resend_verification_reports_mail_failure() {
        let state = AppState::in_memory(Arc::new(RecordingMailer::failing()));
        register(&state, registration("a@x.com")).await.unwrap();
        let err = resend_verification(&state, "a@x.com").await.unwrap_err();
        assert!(matches!(err, AppError::Internal { .. }));
    }

    #[tokio::test]
    async fn update_profile_keeps_picture_and_detects_email_collision() {
        let state = AppState::fake();
        let mut reg = registration("a@x.com");
        reg.profile_picture = Some("uploads/profile_pictures/1-a.png".into());
        let a = register(&state, reg).await.unwrap();
        register(&state, registration("b@x.com")).await.unwrap();

        let updated = update_profile(
            &state,
            a.id,
            ProfileUpdate {
                name: "Renamed".into(),
                email: "a@x.com".into(),
                mobile: "0987654321".into(),
                gender: "other".into(),
                profile_picture: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.name.as_deref(), Some("Renamed"));
        assert_eq!(
            updated.profile_picture.as_deref(),
            Some("uploads/profile_pictures/1-a.png")
        );

        let err = update_profile(
            &state,
            a.id,
            ProfileUpdate {
                name: "Renamed".into(),
                email: "b@x.com".into(),
                mobile: "0987654321".into(),
                gender: "other".into(),
                profile_picture: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let err = update_profile(
            &state,
            404,
            ProfileUpdate {
                name: "x".into(),
                email: "c@x.com".into(),
                mobile: "0987654321".into(),
                gender: "male".into(),
                profile_picture: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
