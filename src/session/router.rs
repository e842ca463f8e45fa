//! View routing.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use crate::journey::Milestone;

/// Screens the journey front-end can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    /// Signed out.
    Login,
    /// Initial country / region / departure date selection.
    Country,
    /// Main hub with the milestone checklist.
    Dashboard,
    Profile,
    Visa,
    Flight,
    House,
    Jobs,
}

impl View {
    /// Milestone screen a view belongs to, if any.
    pub fn milestone(&self) -> Option<Milestone> {
        match self {
            Self::Profile => Some(Milestone::Profile),
            Self::Visa => Some(Milestone::Visa),
            Self::Flight => Some(Milestone::Flight),
            Self::House => Some(Milestone::House),
            Self::Jobs => Some(Milestone::Job),
            Self::Login | Self::Country | Self::Dashboard => None,
        }
    }
}

impl std::fmt::Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Login => "login",
            Self::Country => "country",
            Self::Dashboard => "dashboard",
            Self::Profile => "profile",
            Self::Visa => "visa",
            Self::Flight => "flight",
            Self::House => "house",
            Self::Jobs => "jobs",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for View {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "login" => Ok(Self::Login),
            "country" => Ok(Self::Country),
            "dashboard" | "hub" => Ok(Self::Dashboard),
            "profile" => Ok(Self::Profile),
            "visa" => Ok(Self::Visa),
            "flight" => Ok(Self::Flight),
            "house" => Ok(Self::House),
            "jobs" => Ok(Self::Jobs),
            other => Err(format!("unknown view '{other}'")),
        }
    }
}

/// Current view, observable by the front-end.
pub struct Router {
    tx: watch::Sender<View>,
}

impl Router {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(View::Login);
        Self { tx }
    }

    pub fn current(&self) -> View {
        *self.tx.borrow()
    }

    pub fn go(&self, view: View) {
        let from = self.tx.send_replace(view);
        if from != view {
            debug!(%from, to = %view, "Route changed");
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<View> {
        self.tx.subscribe()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}
