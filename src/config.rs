use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub verification_ttl_minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailerKind {
    Smtp,
    /// Writes outgoing mail to the log instead of delivering it.
    Log,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub mailer: MailerKind,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub mail: MailConfig,
    /// Frontend base URL, used to build links in outgoing mail.
    pub app_url: String,
    pub frontend_origin: String,
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests can feed a map.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let parsed = |key: &str, default: i64| -> anyhow::Result<i64> {
            match var(key) {
                Some(v) => v
                    .trim()
                    .parse::<i64>()
                    .with_context(|| format!("{key} must be an integer")),
                None => Ok(default),
            }
        };

        let database_url = match var("DATABASE_URL") {
            Some(url) => url,
            None => {
                let host = var("DB_HOST").unwrap_or_else(|| "localhost".into());
                let port = var("DB_PORT").unwrap_or_else(|| "5432".into());
                let user = var("DB_USER").context("DATABASE_URL or DB_USER must be set")?;
                let password = var("DB_PASSWORD").unwrap_or_default();
                let name = var("DB_NAME").context("DATABASE_URL or DB_NAME must be set")?;
                format!("postgres://{user}:{password}@{host}:{port}/{name}")
            }
        };

        let jwt = JwtConfig {
            secret: var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: var("JWT_ISSUER").unwrap_or_else(|| "storefront".into()),
            audience: var("JWT_AUDIENCE").unwrap_or_else(|| "storefront-users".into()),
            ttl_minutes: parsed("JWT_TTL_MINUTES", 60)?,
            verification_ttl_minutes: parsed("JWT_VERIFICATION_TTL_MINUTES", 60 * 24)?,
        };

        let mailer = match var("MAIL_MAILER").as_deref().map(str::to_lowercase).as_deref() {
            None | Some("smtp") | Some("gmail") => MailerKind::Smtp,
            Some("log") => MailerKind::Log,
            Some(other) => anyhow::bail!("unsupported MAIL_MAILER {other:?}"),
        };
        let mail = MailConfig {
            mailer,
            host: var("MAIL_HOST").unwrap_or_else(|| "localhost".into()),
            port: parsed("MAIL_PORT", 587)?
                .try_into()
                .context("MAIL_PORT out of range")?,
            username: var("MAIL_USERNAME"),
            password: var("MAIL_PASSWORD"),
            from_address: var("MAIL_FROM_ADDRESS").unwrap_or_else(|| "no-reply@localhost".into()),
        };

        let app_url = var("APP_URL")
            .unwrap_or_else(|| "http://localhost:3000".into())
            .trim_end_matches('/')
            .to_string();
        let frontend_origin = var("FRONTEND_ORIGIN").unwrap_or_else(|| app_url.clone());

        Ok(Self {
            database_url,
            jwt,
            mail,
            app_url,
            frontend_origin,
            host: var("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parsed("PORT", 5000)?
                .try_into()
                .context("PORT out of range")?,
            upload_dir: var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("uploads")),
        })
    }
}
