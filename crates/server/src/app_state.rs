use personnel_api::ApiContext;

use crate::{auth::SessionStore, config::Settings};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) api: ApiContext,
    pub(crate) sessions: SessionStore,
    pub(crate) auth: AuthSettings,
}

#[derive(Debug, Clone)]
pub(crate) struct AuthSettings {
    pub(crate) session_cookie: String,
    pub(crate) login_success_url: String,
    pub(crate) logout_redirect: String,
}

impl From<&Settings> for AuthSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            session_cookie: settings.session_cookie.clone(),
            login_success_url: settings.login_success_url.clone(),
            logout_redirect: settings.logout_redirect.clone(),
        }
    }
}
