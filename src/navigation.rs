//! Host navigation: the redirect contract and the onboarding route guard.

use std::sync::RwLock;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::profile::Profile;

/// Route of the setup wizard.
pub const ONBOARDING_ROUTE: &str = "/onboarding";
/// Landing route once onboarded.
pub const ROOT_ROUTE: &str = "/";

/// Something that can move the user to another route.
pub trait Navigator: Send + Sync {
    fn redirect(&self, path: &str);
}

/// Where the host must send a navigation to `path`, if not where it asked.
///
/// Not onboarded: everything goes to the wizard. Onboarded: the wizard itself
/// bounces to the dashboard.
pub fn guard_route(profile: &Profile, path: &str) -> Option<&'static str> {
    match (profile.is_onboarded, path == ONBOARDING_ROUTE) {
        (false, false) => Some(ONBOARDING_ROUTE),
        (true, true) => Some(ROOT_ROUTE),
        _ => None,
    }
}

/// Navigator used by the HTTP host. Tracks the current location and applies
/// the guard on every change.
pub struct HostNavigator {
    profile: watch::Receiver<Profile>,
    location: RwLock<String>,
}

impl HostNavigator {
    pub fn new(profile: watch::Receiver<Profile>) -> Self {
        let start = guard_route(&profile.borrow(), ROOT_ROUTE).unwrap_or(ROOT_ROUTE);
        Self {
            profile,
            location: RwLock::new(start.to_string()),
        }
    }

    /// Navigate to `path`, returning where the user actually lands.
    pub fn navigate(&self, path: &str) -> String {
        let target = {
            let profile = self.profile.borrow();
            match guard_route(&profile, path) {
                Some(forced) => {
                    debug!(requested = path, forced, "Route guard redirect");
                    forced.to_string()
                }
                None => path.to_string(),
            }
        };
        let mut location = self
            .location
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *location = target.clone();
        target
    }

    pub fn location(&self) -> String {
        self.location
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Navigator for HostNavigator {
    fn redirect(&self, path: &str) {
        let landed = self.navigate(path);
        info!(requested = path, location = %landed, "Redirect");
    }
}
