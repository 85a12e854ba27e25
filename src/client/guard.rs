use super::session::Session;

pub const LOGIN_PATH: &str = "/";
pub const VERIFY_EMAIL_PATH: &str = "/verify-email";
pub const DASHBOARD_PATH: &str = "/dashboard";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Needs a signed-in user with a verified email.
    Protected,
    /// Login and signup pages; verified users are sent on to the dashboard.
    GuestOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Render,
    RedirectToLogin,
    RedirectToVerifyEmail,
    RedirectToDashboard,
}

impl GuardDecision {
    pub fn redirect_path(self) -> Option<&'static str> {
        match self {
            GuardDecision::Render => None,
            GuardDecision::RedirectToLogin => Some(LOGIN_PATH),
            GuardDecision::RedirectToVerifyEmail => Some(VERIFY_EMAIL_PATH),
            GuardDecision::RedirectToDashboard => Some(DASHBOARD_PATH),
        }
    }
}

pub fn decide(access: Access, authenticated: bool, verified: bool) -> GuardDecision {
    match (access, authenticated, verified) {
        (Access::Protected, false, _) => GuardDecision::RedirectToLogin,
        (Access::Protected, true, false) => GuardDecision::RedirectToVerifyEmail,
        (Access::GuestOnly, true, true) => GuardDecision::RedirectToDashboard,
        _ => GuardDecision::Render,
    }
}

pub fn decide_for(access: Access, session: &Session) -> GuardDecision {
    decide(access, session.is_authenticated(), session.is_email_verified())
}
