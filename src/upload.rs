use std::{
    collections::HashMap,
    marker::PhantomData,
    path::{Path, PathBuf},
};

use anyhow::Context;
use axum::{
    async_trait,
    extract::{multipart::MultipartError, FromRequest, Multipart, Request},
    http::StatusCode,
};
use bytes::BytesMut;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::{
    error::AppError,
    state::AppState,
    validation::{FieldErrors, Validate},
};

pub const MAX_UPLOAD_BYTES: usize = 2 * 1024 * 1024;

const TOO_LARGE: &str = "File size must not exceed 2MB";

/// Which file field a form carries and what it may contain.
pub trait UploadPolicy: Send + Sync + 'static {
    /// Multipart field holding the file; also the form key the stored path lands on.
    const FIELD: &'static str;
    /// Directory under the upload root.
    const SUBDIR: &'static str;
    const REJECTION: &'static str;

    fn accepts(content_type: &str, file_name: &str) -> bool;
}

pub struct ProfilePicture;

impl UploadPolicy for ProfilePicture {
    const FIELD: &'static str = "profile_picture";
    const SUBDIR: &'static str = "profile_pictures";
    const REJECTION: &'static str = "Only JPEG and PNG images are allowed";

    fn accepts(content_type: &str, file_name: &str) -> bool {
        let mime_ok = matches!(
            content_type.to_ascii_lowercase().as_str(),
            "image/jpeg" | "image/jpg" | "image/png"
        );
        let ext_ok = extension(file_name)
            .is_some_and(|ext| matches!(ext.as_str(), "jpg" | "jpeg" | "png"));
        mime_ok && ext_ok
    }
}

pub struct ProductImage;

impl UploadPolicy for ProductImage {
    const FIELD: &'static str = "image";
    const SUBDIR: &'static str = "products";
    const REJECTION: &'static str = "Only image files are allowed";

    fn accepts(content_type: &str, _file_name: &str) -> bool {
        content_type.to_ascii_lowercase().starts_with("image/")
    }
}

fn extension(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Text parts of a multipart form, keyed by field name. Repeated keys keep the last value.
#[derive(Debug, Default, Clone)]
pub struct FormFields(HashMap<String, String>);

impl FormFields {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn take(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormFields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Multipart form whose single file, if any, has already been written to disk.
/// The stored relative path is put on `fields` under `P::FIELD`. Type and size
/// violations of the file are kept in `errors` and reported with the form's own.
pub struct Uploaded<P: UploadPolicy> {
    pub fields: FormFields,
    pub stored: Option<String>,
    pub errors: FieldErrors,
    root: PathBuf,
    _policy: PhantomData<P>,
}

impl<P: UploadPolicy> Uploaded<P> {
    /// Runs a form schema over the text fields. File violations join the
    /// schema's violations in one 422.
    pub fn validate_form<R: Validate>(
        &mut self,
        build: impl FnOnce(FormFields) -> R,
    ) -> Result<R::Valid, AppError> {
        let mut errors = std::mem::take(&mut self.errors);
        match build(std::mem::take(&mut self.fields)).validate() {
            Ok(valid) if errors.is_empty() => Ok(valid),
            Ok(_) => Err(AppError::Validation(errors)),
            Err(form_errors) => {
                errors.merge(form_errors);
                Err(AppError::Validation(errors))
            }
        }
    }

    /// Passes `result` through, removing the stored file when it is an error.
    pub async fn settle<T>(self, result: Result<T, AppError>) -> Result<T, AppError> {
        if result.is_err() {
            if let Some(path) = &self.stored {
                discard(&self.root, path).await;
            }
        }
        result
    }

    async fn read(&mut self, mut multipart: Multipart) -> Result<(), AppError> {
        let mut seen_file = false;

        loop {
            let mut field = match multipart.next_field().await {
                Ok(Some(field)) => field,
                Ok(None) => return Ok(()),
                Err(e) => return self.stream_error(e),
            };
            let name = field.name().unwrap_or_default().to_string();

            let Some(file_name) = field.file_name().map(str::to_string) else {
                // The client may echo the file field as text; the upload decides its value.
                if name == P::FIELD {
                    continue;
                }
                match field.text().await {
                    Ok(value) => self.fields.insert(name, value),
                    Err(e) => return self.stream_error(e),
                }
                continue;
            };

            if file_name.is_empty() {
                continue;
            }
            if name != P::FIELD {
                warn!(field = %name, "unexpected file field");
                return Err(AppError::BadRequest(format!("Unexpected file field '{name}'")));
            }
            if seen_file {
                return Err(AppError::BadRequest("Only one file may be uploaded".into()));
            }
            seen_file = true;

            let content_type = field.content_type().unwrap_or_default().to_string();
            if !P::accepts(&content_type, &file_name) {
                warn!(%content_type, %file_name, "upload rejected");
                self.errors.insert(P::FIELD, P::REJECTION);
                continue;
            }

            let mut data = BytesMut::new();
            let mut too_large = false;
            loop {
                match field.chunk().await {
                    Ok(Some(chunk)) if data.len() + chunk.len() > MAX_UPLOAD_BYTES => {
                        too_large = true;
                        break;
                    }
                    Ok(Some(chunk)) => data.extend_from_slice(&chunk),
                    Ok(None) => break,
                    Err(e) => return self.stream_error(e),
                }
            }
            if too_large {
                warn!(%file_name, "upload over size limit");
                self.errors.insert(P::FIELD, TOO_LARGE);
                continue;
            }

            let path = store_file(&self.root, P::SUBDIR, &file_name, &data)
                .await
                .map_err(AppError::internal("File upload failed"))?;
            self.stored = Some(path);
        }
    }

    /// A body over the route limit ends the stream and counts as an oversized file.
    fn stream_error(&mut self, e: MultipartError) -> Result<(), AppError> {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            warn!("multipart body over limit");
            self.errors.insert(P::FIELD, TOO_LARGE);
            Ok(())
        } else {
            Err(AppError::BadRequest(e.body_text()))
        }
    }
}

#[async_trait]
impl<P: UploadPolicy> FromRequest<AppState> for Uploaded<P> {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        let mut upload = Self {
            fields: FormFields::default(),
            stored: None,
            errors: FieldErrors::default(),
            root: state.config.upload_dir.clone(),
            _policy: PhantomData,
        };

        if let Err(e) = upload.read(multipart).await {
            return upload.settle(Err(e)).await;
        }
        if let Some(path) = upload.stored.clone() {
            upload.fields.insert(P::FIELD, path);
        }
        Ok(upload)
    }
}

async fn discard(root: &Path, public_path: &str) {
    let Some(relative) = public_path.strip_prefix("uploads/") else {
        return;
    };
    let target = root.join(relative);
    match tokio::fs::remove_file(&target).await {
        Ok(()) => debug!(path = %target.display(), "upload discarded"),
        Err(e) => warn!(path = %target.display(), error = %e, "upload not discarded"),
    }
}

/// Keeps the last path segment and replaces anything outside `[A-Za-z0-9._-]`.
pub fn sanitize_file_name(original: &str) -> String {
    let base = original.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Writes `data` to `{root}/{subdir}/<millis>-<name>` and returns the public
/// relative path `uploads/{subdir}/<millis>-<name>`.
pub async fn store_file(
    root: &Path,
    subdir: &str,
    original_name: &str,
    data: &[u8],
) -> anyhow::Result<String> {
    let dir = root.join(subdir);
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("create {}", dir.display()))?;

    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    let file_name = format!("{millis}-{}", sanitize_file_name(original_name));
    let target = dir.join(&file_name);
    tokio::fs::write(&target, data)
        .await
        .with_context(|| format!("write {}", target.display()))?;

    debug!(path = %target.display(), bytes = data.len(), "upload stored");
    Ok(format!("uploads/{subdir}/{file_name}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_pictures_need_matching_type_and_extension() {
        assert!(ProfilePicture::accepts("image/png", "me.PNG"));
        assert!(ProfilePicture::accepts("image/jpeg", "me.jpeg"));
        assert!(!ProfilePicture::accepts("image/png", "me.gif"));
        assert!(!ProfilePicture::accepts("image/gif", "me.png"));
        assert!(!ProfilePicture::accepts("application/pdf", "me.pdf"));
    }

    #[test]
    fn product_images_accept_any_image_type() {
        assert!(ProductImage::accepts("image/webp", "x.webp"));
        assert!(ProductImage::accepts("IMAGE/GIF", "x"));
        assert!(!ProductImage::accepts("text/plain", "x.png"));
    }

    #[test]
    fn sanitize_strips_directories_and_odd_characters() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name(r"C:\photos\my pic.png"), "my_pic.png");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
        assert_eq!(sanitize_file_name(""), "file");
    }

    #[test]
    fn form_fields_take_removes_the_value() {
        let mut form: FormFields = [("name", "Chair")].into_iter().collect();
        assert_eq!(form.get("name"), Some("Chair"));
        assert_eq!(form.take("name").as_deref(), Some("Chair"));
        assert_eq!(form.get("name"), None);
    }

    #[tokio::test]
    async fn store_file_writes_under_the_subdir() {
        let root = std::env::temp_dir().join(format!(
            "storefront-upload-{}",
            OffsetDateTime::now_utc().unix_timestamp_nanos()
        ));
        let path = store_file(&root, "products", "chair photo.png", b"png-bytes")
            .await
            .expect("store");

        assert!(path.starts_with("uploads/products/"));
        assert!(path.ends_with("-chair_photo.png"));

        let file_name = path.rsplit('/').next().unwrap();
        let written = tokio::fs::read(root.join("products").join(file_name))
            .await
            .expect("file exists");
        assert_eq!(written, b"png-bytes");

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    struct NameOnly(FormFields);

    impl Validate for NameOnly {
        type Valid = String;

        fn validate(self) -> Result<String, FieldErrors> {
            let mut v = crate::validation::Validator::default();
            let name = v
                .field("name", self.0.get("name").map(str::to_string))
                .required("Name is required")
                .value();
            v.finish(|| name.unwrap_or_default())
        }
    }

    fn upload_with(root: &Path, fields: FormFields) -> Uploaded<ProductImage> {
        Uploaded {
            fields,
            stored: None,
            errors: FieldErrors::default(),
            root: root.to_path_buf(),
            _policy: PhantomData,
        }
    }

    #[test]
    fn file_violations_are_reported_with_form_violations() {
        let mut upload = upload_with(Path::new("unused"), FormFields::default());
        upload.errors.insert("image", ProductImage::REJECTION);

        let Err(AppError::Validation(errors)) = upload.validate_form(NameOnly) else {
            panic!("expected a validation error");
        };
        assert_eq!(errors.get("image"), Some(ProductImage::REJECTION));
        assert_eq!(errors.get("name"), Some("Name is required"));
    }

    #[test]
    fn file_violations_fail_an_otherwise_valid_form() {
        let mut upload = upload_with(Path::new("unused"), [("name", "Desk")].into_iter().collect());
        upload.errors.insert("image", TOO_LARGE);

        let Err(AppError::Validation(errors)) = upload.validate_form(NameOnly) else {
            panic!("expected a validation error");
        };
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.get("image"), Some(TOO_LARGE));
    }

    #[tokio::test]
    async fn settle_discards_the_file_only_on_error() {
        let root = std::env::temp_dir().join(format!(
            "storefront-settle-{}",
            OffsetDateTime::now_utc().unix_timestamp_nanos()
        ));
        let kept = store_file(&root, "products", "a.png", b"a").await.unwrap();
        let dropped = store_file(&root, "products", "b.png", b"b").await.unwrap();

        let mut ok = upload_with(&root, FormFields::default());
        ok.stored = Some(kept.clone());
        assert_eq!(ok.settle(Ok::<_, AppError>(1)).await.unwrap(), 1);

        let mut failed = upload_with(&root, FormFields::default());
        failed.stored = Some(dropped.clone());
        let result = failed
            .settle(Err::<(), _>(AppError::NotFound("User not found".into())))
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let on_disk = |public: &str| root.join(public.trim_start_matches("uploads/"));
        assert!(on_disk(&kept).exists());
        assert!(!on_disk(&dropped).exists());

        let _ = tokio::fs::remove_dir_all(&root).await;
    }
}
