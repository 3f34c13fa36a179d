//! Application lifecycle states.

use std::fmt;
use std::str::FromStr;

/// Externally fed lifecycle state of the application being optimised.
///
/// Reconfiguration triggers are honoured only in `Running`; after one is
/// accepted the stored state moves to `Deploying` so repeated triggers do not
/// pile up until the platform reports `Running` again.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ApplicationState {
    /// Application defined but not yet deployable.
    #[default]
    New,
    /// Ready for deployment.
    Ready,
    /// A configuration is being rolled out.
    Deploying,
    /// Live and reconfigurable.
    Running,
    /// Deployment or execution failed.
    Failed,
}

impl ApplicationState {
    /// True when SLO-violation triggers should be honoured.
    pub fn accepts_reconfiguration(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl FromStr for ApplicationState {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text.to_ascii_uppercase().as_str() {
            "NEW" => Ok(Self::New),
            "READY" => Ok(Self::Ready),
            "DEPLOYING" => Ok(Self::Deploying),
            "RUNNING" => Ok(Self::Running),
            "FAILED" => Ok(Self::Failed),
            other => Err(format!("unknown application state '{}'", other)),
        }
    }
}

impl fmt::Display for ApplicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::New => "New",
            Self::Ready => "Ready",
            Self::Deploying => "Deploying",
            Self::Running => "Running",
            Self::Failed => "Failed",
        };
        write!(f, "{}", name)
    }
}
