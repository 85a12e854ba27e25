use serde::{Deserialize, Serialize};

use crate::auth::repo_types::User;
use crate::upload::FormFields;
use crate::validation::{Validate, Validator};

const GENDERS: &[&str] = &["male", "female", "other"];

/// Multipart registration form, after the upload step rewrote `profile_picture`.
#[derive(Debug, Default)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub mobile: Option<String>,
    pub gender: Option<String>,
    pub profile_picture: Option<String>,
}

impl RegisterRequest {
    pub fn from_form(mut form: FormFields) -> Self {
        Self {
            name: form.take("name"),
            email: form.take("email"),
            password: form.take("password"),
            mobile: form.take("mobile"),
            gender: form.take("gender"),
            profile_picture: form.take("profile_picture"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub mobile: String,
    pub gender: String,
    pub profile_picture: Option<String>,
}

impl Validate for RegisterRequest {
    type Valid = Registration;

    fn validate(self) -> Result<Registration, crate::validation::FieldErrors> {
        let mut v = Validator::default();
        let name = v.field("name", self.name).required("Name is required").value();
        let email = v
            .field("email", self.email)
            .required("Email is required")
            .email("Invalid email format")
            .value();
        let password = v
            .secret("password", self.password)
            .required("Password is required")
            .min_len(6, "Password must be at least 6 characters")
            .value();
        let mobile = v
            .field("mobile", self.mobile)
            .required("Mobile number is required")
            .digits(10, "Mobile number must be 10 digits")
            .value();
        let gender = v
            .field("gender", self.gender.map(|g| g.to_lowercase()))
            .required("Gender is required")
            .one_of(GENDERS, "Gender must be male, female or other")
            .value();
        let profile_picture = v.field("profile_picture", self.profile_picture).value();

        v.finish(|| Registration {
            name: name.unwrap_or_default(),
            email: email.unwrap_or_default().to_lowercase(),
            password: password.unwrap_or_default(),
            mobile: mobile.unwrap_or_default(),
            gender: gender.unwrap_or_default(),
            profile_picture,
        })
    }
}

/// Multipart profile edit form.
#[derive(Debug, Default)]
pub struct ProfileRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub gender: Option<String>,
    pub profile_picture: Option<String>,
}

impl ProfileRequest {
    pub fn from_form(mut form: FormFields) -> Self {
        Self {
            name: form.take("name"),
            email: form.take("email"),
            mobile: form.take("mobile"),
            gender: form.take("gender"),
            profile_picture: form.take("profile_picture"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub gender: String,
    pub profile_picture: Option<String>,
}

impl Validate for ProfileRequest {
    type Valid = ProfileUpdate;

    fn validate(self) -> Result<ProfileUpdate, crate::validation::FieldErrors> {
        let mut v = Validator::default();
        let name = v.field("name", self.name).required("Name is required").value();
        let email = v
            .field("email", self.email)
            .required("Email is required")
            .email("Invalid email format")
            .value();
        let mobile = v
            .field("mobile", self.mobile)
            .required("Mobile number is required")
            .digits(10, "Mobile number must be 10 digits")
            .value();
        let gender = v
            .field("gender", self.gender.map(|g| g.to_lowercase()))
            .required("Gender is required")
            .one_of(GENDERS, "Gender must be male, female or other")
            .value();
        let profile_picture = v.field("profile_picture", self.profile_picture).value();

        v.finish(|| ProfileUpdate {
            name: name.unwrap_or_default(),
            email: email.unwrap_or_default().to_lowercase(),
            mobile: mobile.unwrap_or_default(),
            gender: gender.unwrap_or_default(),
            profile_picture,
        })
    }
}

/// Request body for login.
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Validate for LoginRequest {
    type Valid = Credentials;

    fn validate(self) -> Result<Credentials, crate::validation::FieldErrors> {
        let mut v = Validator::default();
        let email = v
            .field("email", self.email)
            .required("Email is required")
            .email("Invalid email format")
            .value();
        let password = v
            .secret("password", self.password)
            .required("Password is required")
            .value();
        v.finish(|| Credentials {
            email: email.unwrap_or_default().to_lowercase(),
            password: password.unwrap_or_default(),
        })
    }
}

/// Body of forget-password and resend-verification.
#[derive(Debug, Default, Deserialize)]
pub struct EmailRequest {
    pub email: Option<String>,
}

impl Validate for EmailRequest {
    type Valid = String;

    fn validate(self) -> Result<String, crate::validation::FieldErrors> {
        let mut v = Validator::default();
        let email = v
            .field("email", self.email)
            .required("Email is required")
            .email("Invalid email format")
            .value();
        v.finish(|| email.unwrap_or_default().to_lowercase())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: Option<String>,
    pub new_password: Option<String>,
    pub confirm_password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PasswordChange {
    pub old_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

impl Validate for ChangePasswordRequest {
    type Valid = PasswordChange;

    fn validate(self) -> Result<PasswordChange, crate::validation::FieldErrors> {
        let mut v = Validator::default();
        let old_password = v
            .secret("oldPassword", self.old_password)
            .required("Old password is required")
            .value();
        let new_password = v
            .secret("newPassword", self.new_password)
            .required("New password is required")
            .min_len(6, "New password must be at least 6 characters")
            .value();
        let confirm_password = v
            .secret("confirmPassword", self.confirm_password)
            .required("Confirm password is required")
            .equals(new_password.as_deref(), "Confirm password must match new password")
            .value();
        v.finish(|| PasswordChange {
            old_password: old_password.unwrap_or_default(),
            new_password: new_password.unwrap_or_default(),
            confirm_password: confirm_password.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailQuery {
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserPayload {
    pub user: User,
}

/// Response returned after login.
#[derive(Debug, Serialize)]
pub struct TokenPayload {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPasswordPayload {
    pub new_password: String,
}
