use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use shared::{
    domain::Username,
    view::{ViewModel, ViewSelection},
};
use storage::Storage;
use tracing::{debug, warn};

pub const MAIN_ROUTE: &str = "/personnel/main";
pub const COMMUTE_LIST_ROUTE: &str = "/personnel/commutelist";
pub const LOGIN_ROUTE: &str = "/personnel/login";
pub const LOGOUT_ROUTE: &str = "/personnel/logout";

pub const MAIN_VIEW: &str = "personnel/main";
pub const COMMUTE_LIST_VIEW: &str = "personnel/commutelist";
pub const LOGIN_VIEW: &str = "personnel/login";

pub const LOGIN_ERROR_MESSAGE: &str = "Login Error Check Your Accout(계정 다시 확인하라우)";
pub const LOGOUT_MESSAGE: &str = "LogOut!!!!!!";

pub const EMPLOYEES_ATTRIBUTE: &str = "employees";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteHandler {
    Main,
    CommuteList,
    LoginForm,
    Logout,
}

#[derive(Debug, Clone, Copy)]
pub struct RouteEntry {
    pub methods: &'static [HttpMethod],
    pub path: &'static str,
    pub handler: RouteHandler,
}

pub const ROUTE_TABLE: &[RouteEntry] = &[
    RouteEntry {
        methods: &[HttpMethod::Get],
        path: MAIN_ROUTE,
        handler: RouteHandler::Main,
    },
    RouteEntry {
        methods: &[HttpMethod::Get],
        path: COMMUTE_LIST_ROUTE,
        handler: RouteHandler::CommuteList,
    },
    RouteEntry {
        methods: &[HttpMethod::Get],
        path: LOGIN_ROUTE,
        handler: RouteHandler::LoginForm,
    },
    RouteEntry {
        methods: &[HttpMethod::Get, HttpMethod::Post],
        path: LOGOUT_ROUTE,
        handler: RouteHandler::Logout,
    },
];

/// Who is making the request, resolved by the routing layer before dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Identity {
    #[default]
    Anonymous,
    Authenticated(Username),
}

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub identity: Identity,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(username: Username) -> Self {
        Self {
            identity: Identity::Authenticated(username),
        }
    }

    /// Empty when the request carries no authenticated session.
    pub fn current_username(&self) -> &str {
        match &self.identity {
            Identity::Anonymous => "",
            Identity::Authenticated(username) => username.as_str(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.identity, Identity::Authenticated(_))
    }
}

/// Produces the employee listing entries for the main view.
#[async_trait]
pub trait EmployeeListCommand: Send + Sync {
    async fn execute(&self) -> anyhow::Result<ViewModel>;
}

pub struct StorageEmployeeList {
    storage: Storage,
}

impl StorageEmployeeList {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl EmployeeListCommand for StorageEmployeeList {
    async fn execute(&self) -> anyhow::Result<ViewModel> {
        let usernames = self
            .storage
            .list_usernames()
            .await
            .context("employee list query failed")?;
        let mut entries = ViewModel::new();
        entries.insert(
            EMPLOYEES_ATTRIBUTE,
            serde_json::to_value(usernames).context("failed to encode employee list")?,
        );
        Ok(entries)
    }
}

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub employee_list: Arc<dyn EmployeeListCommand>,
}

impl ApiContext {
    pub fn new(storage: Storage) -> Self {
        let employee_list = Arc::new(StorageEmployeeList::new(storage.clone()));
        Self {
            storage,
            employee_list,
        }
    }
}

#[derive(Debug, Default)]
pub struct LoginFormQuery {
    pub error: Option<String>,
    pub logout: Option<String>,
}

impl LoginFormQuery {
    /// Builds the flags from raw query pairs. A repeated key keeps its first value.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut query = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_ref() {
                "error" => &mut query.error,
                "logout" => &mut query.logout,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into());
            }
        }
        query
    }
}

pub async fn handle_main(ctx: &RequestContext, command: &dyn EmployeeListCommand) -> ViewSelection {
    let username = ctx.current_username();
    debug!(%username, view = MAIN_VIEW, "dispatching personnel main");

    let mut attributes = ViewModel::new();
    attributes.insert("username", username);
    match command.execute().await {
        Ok(entries) => attributes.merge(entries),
        Err(error) => warn!(%username, error = %format!("{error:#}"), "employee list command failed"),
    }

    ViewSelection::template(MAIN_VIEW).with_attributes(attributes)
}

pub fn handle_commute_list() -> ViewSelection {
    debug!(view = COMMUTE_LIST_VIEW, "dispatching commute list");
    ViewSelection::template(COMMUTE_LIST_VIEW)
}

/// Presence of either parameter is enough; their values are never inspected.
pub fn handle_login_form(query: &LoginFormQuery) -> ViewSelection {
    debug!(
        error = ?query.error,
        logout = ?query.logout,
        view = LOGIN_VIEW,
        "dispatching login form"
    );

    let mut attributes = ViewModel::new();
    if query.error.is_some() {
        attributes.insert("error", LOGIN_ERROR_MESSAGE);
    }
    if query.logout.is_some() {
        attributes.insert("logout", LOGOUT_MESSAGE);
    }

    ViewSelection::template(LOGIN_VIEW).with_attributes(attributes)
}

/// The session must already be torn down by the caller.
pub fn handle_logout(redirect: &str) -> ViewSelection {
    debug!(%redirect, "dispatching logout");
    ViewSelection::redirect(redirect)
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
