use std::sync::{Arc, Mutex, MutexGuard};

use reqwest::{
    multipart::{Form, Part},
    Client, RequestBuilder, StatusCode,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{
    session::{Session, SessionUser},
    ClientError,
};
use crate::envelope::Envelope;

/// HTTP status plus the decoded envelope.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Envelope,
}

impl Reply {
    pub fn is_success(&self) -> bool {
        self.status.is_success() && self.body.status
    }

    pub fn data(&self, key: &str) -> Option<&Value> {
        self.body.data.get(key)
    }

    pub fn error(&self, field: &str) -> Option<&str> {
        self.body.errors.get(field).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    fn into_part(self) -> Result<Part, ClientError> {
        Ok(Part::bytes(self.bytes)
            .file_name(self.file_name)
            .mime_str(&self.mime)?)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub mobile: String,
    pub gender: String,
    pub profile_picture: Option<ImageFile>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileForm {
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub gender: String,
    pub profile_picture: Option<ImageFile>,
}

#[derive(Debug, Clone, Default)]
pub struct ProductForm {
    pub name: String,
    pub description: Option<String>,
    pub price: String,
    pub stock: Option<i32>,
    pub category_id: Option<i64>,
    pub image: Option<ImageFile>,
}

impl ProductForm {
    fn into_form(self) -> Result<Form, ClientError> {
        let mut form = Form::new().text("name", self.name).text("price", self.price);
        if let Some(description) = self.description {
            form = form.text("description", description);
        }
        if let Some(stock) = self.stock {
            form = form.text("stock", stock.to_string());
        }
        if let Some(category_id) = self.category_id {
            form = form.text("category_id", category_id.to_string());
        }
        if let Some(image) = self.image {
            form = form.part("image", image.into_part()?);
        }
        Ok(form)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordBody<'a> {
    old_password: &'a str,
    new_password: &'a str,
    confirm_password: &'a str,
}

/// API client holding the current session. Sign-in, verification and
/// profile calls keep the cached user in step with the server.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    client: Client,
    session: Arc<Mutex<Session>>,
}

impl ApiClient {
    /// `base_url` is the server root, e.g. `http://localhost:5000`.
    pub fn new(base_url: &str) -> Self {
        Self::with_session(base_url, Session::default())
    }

    pub fn with_session(base_url: &str, session: Session) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
            session: Arc::new(Mutex::new(session)),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn session(&self) -> Session {
        self.lock().clone()
    }

    pub fn logout(&self) {
        self.lock().logout();
    }

    async fn send(&self, request: RequestBuilder) -> Result<Reply, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        let body = if bytes.is_empty() {
            Envelope::failure(status.to_string(), json!({}))
        } else {
            serde_json::from_slice(&bytes)?
        };
        debug!(%status, message = %body.message, "api reply");
        Ok(Reply { status, body })
    }

    fn cache_user(&self, reply: &Reply) -> Result<Option<SessionUser>, ClientError> {
        match reply.data("user") {
            Some(user) if reply.is_success() => Ok(Some(serde_json::from_value(user.clone())?)),
            _ => Ok(None),
        }
    }

    pub async fn register(&self, form: RegisterForm) -> Result<Reply, ClientError> {
        let mut body = Form::new()
            .text("name", form.name)
            .text("email", form.email)
            .text("password", form.password)
            .text("mobile", form.mobile)
            .text("gender", form.gender);
        if let Some(picture) = form.profile_picture {
            body = body.part("profile_picture", picture.into_part()?);
        }
        self.send(self.client.post(self.url("/auth/register")).multipart(body))
            .await
    }

    /// On success the token and user are stored in the session.
    pub async fn login(&self, email: &str, password: &str) -> Result<Reply, ClientError> {
        let reply = self
            .send(
                self.client
                    .post(self.url("/auth/login"))
                    .json(&json!({ "email": email, "password": password })),
            )
            .await?;

        let token = reply
            .data("token")
            .and_then(Value::as_str)
            .map(str::to_string);
        if let (Some(token), Some(user)) = (token, self.cache_user(&reply)?) {
            self.lock().sign_in(token, user);
        }
        Ok(reply)
    }

    pub async fn forgot_password(&self, email: &str) -> Result<Reply, ClientError> {
        self.send(
            self.client
                .post(self.url("/auth/forget-password"))
                .json(&json!({ "email": email })),
        )
        .await
    }

    /// Changes the signed-in user's password.
    pub async fn change_password(
        &self,
        old_password: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<Reply, ClientError> {
        let id = self.lock().user_id().ok_or(ClientError::NotSignedIn)?;
        self.send(
            self.client
                .post(self.url(&format!("/auth/change-password/{id}")))
                .json(&ChangePasswordBody {
                    old_password,
                    new_password,
                    confirm_password,
                }),
        )
        .await
    }

    pub async fn resend_verification(&self, email: &str) -> Result<Reply, ClientError> {
        self.send(
            self.client
                .post(self.url("/auth/resend-verification"))
                .json(&json!({ "email": email })),
        )
        .await
    }

    /// Follows the emailed link. Refreshes the cached user when it is the one verified.
    pub async fn verify_email(&self, token: &str) -> Result<Reply, ClientError> {
        let reply = self
            .send(
                self.client
                    .get(self.url("/auth/verify-email"))
                    .query(&[("token", token)]),
            )
            .await?;

        if let Some(user) = self.cache_user(&reply)? {
            let mut session = self.lock();
            if session.user_id() == Some(user.id) {
                session.refresh_user(user);
            }
        }
        Ok(reply)
    }

    pub async fn get_user(&self, id: i64) -> Result<Reply, ClientError> {
        self.send(self.client.get(self.url(&format!("/auth/user/{id}"))))
            .await
    }

    pub async fn update_profile(&self, form: ProfileForm) -> Result<Reply, ClientError> {
        let id = self.lock().user_id().ok_or(ClientError::NotSignedIn)?;
        let mut body = Form::new()
            .text("name", form.name)
            .text("email", form.email)
            .text("mobile", form.mobile)
            .text("gender", form.gender);
        if let Some(picture) = form.profile_picture {
            body = body.part("profile_picture", picture.into_part()?);
        }
        let reply = self
            .send(
                self.client
                    .put(self.url(&format!("/auth/update-profile/{id}")))
                    .multipart(body),
            )
            .await?;

        if let Some(user) = self.cache_user(&reply)? {
            self.lock().refresh_user(user);
        }
        Ok(reply)
    }

    pub async fn me(&self) -> Result<Reply, ClientError> {
        let token = self.lock().token.clone().ok_or(ClientError::NotSignedIn)?;
        self.send(self.client.get(self.url("/auth/me")).bearer_auth(token))
            .await
    }

    pub async fn list_categories(&self) -> Result<Reply, ClientError> {
        self.send(self.client.get(self.url("/categories"))).await
    }

    pub async fn get_category(&self, id: i64) -> Result<Reply, ClientError> {
        self.send(self.client.get(self.url(&format!("/categories/{id}"))))
            .await
    }

    pub async fn create_category(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Reply, ClientError> {
        self.send(
            self.client
                .post(self.url("/categories"))
                .json(&json!({ "name": name, "description": description })),
        )
        .await
    }

    pub async fn update_category(
        &self,
        id: i64,
        name: &str,
        description: Option<&str>,
    ) -> Result<Reply, ClientError> {
        self.send(
            self.client
                .put(self.url(&format!("/categories/{id}")))
                .json(&json!({ "name": name, "description": description })),
        )
        .await
    }

    pub async fn delete_category(&self, id: i64) -> Result<Reply, ClientError> {
        self.send(self.client.delete(self.url(&format!("/categories/{id}"))))
            .await
    }

    pub async fn list_products(&self) -> Result<Reply, ClientError> {
        self.send(self.client.get(self.url("/products"))).await
    }

    pub async fn get_product(&self, id: i64) -> Result<Reply, ClientError> {
        self.send(self.client.get(self.url(&format!("/products/{id}"))))
            .await
    }

    pub async fn create_product(&self, form: ProductForm) -> Result<Reply, ClientError> {
        self.send(
            self.client
                .post(self.url("/products"))
                .multipart(form.into_form()?),
        )
        .await
    }

    pub async fn update_product(&self, id: i64, form: ProductForm) -> Result<Reply, ClientError> {
        self.send(
            self.client
                .put(self.url(&format!("/products/{id}")))
                .multipart(form.into_form()?),
        )
        .await
    }

    pub async fn delete_product(&self, id: i64) -> Result<Reply, ClientError> {
        self.send(self.client.delete(self.url(&format!("/products/{id}"))))
            .await
    }
}
