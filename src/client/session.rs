use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ClientError;

/// The cached copy of the signed-in user, as the API returns it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
    #[serde(default)]
    pub mobile: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub email_verified: Option<String>,
}

/// Client-side session: the bearer token and the user it belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: Option<String>,
    pub user: Option<SessionUser>,
}

impl Session {
    pub fn sign_in(&mut self, token: String, user: SessionUser) {
        self.token = Some(token);
        self.user = Some(user);
    }

    /// Replaces the cached user, keeping the token.
    pub fn refresh_user(&mut self, user: SessionUser) {
        self.user = Some(user);
    }

    /// Forgets the token and user. The server is not told; the token stays
    /// valid until it expires.
    pub fn logout(&mut self) {
        self.token = None;
        self.user = None;
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn is_email_verified(&self) -> bool {
        self.user
            .as_ref()
            .is_some_and(|u| u.email_verified.is_some())
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user.as_ref().map(|u| u.id)
    }

    /// Reads a saved session. A missing file is an empty session.
    pub async fn load(path: &Path) -> Result<Self, ClientError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, path: &Path) -> Result<(), ClientError> {
        let bytes = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(verified: bool) -> SessionUser {
        SessionUser {
            id: 1,
            email: "a@x.com".into(),
            email_verified: verified.then(|| "2025-07-13T18:00:00Z".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn logout_clears_everything() {
        let mut session = Session::default();
        session.sign_in("token".into(), user(true));
        assert!(session.is_authenticated());
        assert!(session.is_email_verified());

        session.logout();
        assert_eq!(session, Session::default());
        assert!(!session.is_authenticated());
        assert!(!session.is_email_verified());
    }

    #[test]
    fn reads_the_user_shape_the_api_returns() {
        let parsed: SessionUser = serde_json::from_str(
            r#"{"id":3,"name":"A","email":"a@x.com","mobile":"1234567890","gender":"male",
                "profile_picture":null,"email_verified":null,
                "created_at":"2025-07-13T18:00:00Z","updated_at":"2025-07-13T18:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(parsed.id, 3);
        assert_eq!(parsed.email_verified, None);
    }

    #[tokio::test]
    async fn save_and_load_from_disk() {
        let path = std::env::temp_dir().join(format!(
            "storefront-session-{}.json",
            time::OffsetDateTime::now_utc().unix_timestamp_nanos()
        ));
        assert_eq!(Session::load(&path).await.unwrap(), Session::default());

        let mut session = Session::default();
        session.sign_in("token".into(), user(false));
        session.save(&path).await.unwrap();
        assert_eq!(Session::load(&path).await.unwrap(), session);

        let _ = tokio::fs::remove_file(&path).await;
    }
}
