use std::fmt::{Display, Formatter};
use std::sync::Arc;

use shortbin_auth::AuthService;
use shortbin_core::UserRepository;
use shortbin_redirector::Redirector;
use shortbin_shortener::Shortener;

/// Account service as wired into the gateway.
pub type Accounts = AuthService<Arc<dyn UserRepository>>;

/// Deployment environment. Error bodies carry debug detail everywhere
/// except in production.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Any name other than `production` counts as development.
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("production") {
            Environment::Production
        } else {
            Environment::Development
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl Display for Environment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    redirector: Arc<dyn Redirector>,
    shortener: Arc<dyn Shortener>,
    accounts: Arc<Accounts>,
    environment: Environment,
}

impl AppState {
    pub fn new(
        redirector: Arc<dyn Redirector>,
        shortener: Arc<dyn Shortener>,
        accounts: Arc<Accounts>,
        environment: Environment,
    ) -> Self {
        Self {
            redirector,
            shortener,
            accounts,
            environment,
        }
    }

    pub fn redirector(&self) -> &dyn Redirector {
        self.redirector.as_ref()
    }

    pub fn shortener(&self) -> &dyn Shortener {
        self.shortener.as_ref()
    }

    pub fn accounts(&self) -> &Accounts {
        &self.accounts
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }
}
