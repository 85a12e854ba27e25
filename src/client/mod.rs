//! Typed HTTP client for the API, the session it keeps, and the page guard
//! a frontend runs before rendering.

pub mod api;
pub mod guard;
pub mod session;

pub use api::{ApiClient, ImageFile, ProductForm, ProfileForm, RegisterForm, Reply};
pub use guard::{decide, decide_for, Access, GuardDecision};
pub use session::{Session, SessionUser};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not signed in")]
    NotSignedIn,
}
