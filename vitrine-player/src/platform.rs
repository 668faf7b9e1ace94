//! Runtime platform detection
//!
//! iOS Quick Look needs a USDZ asset next to the glTF source; every other
//! platform renders the glTF directly and never touches the conversion cache.

use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Other,
}

impl Platform {
    /// Classify a browser user agent
    pub fn from_user_agent(user_agent: &str) -> Self {
        if ["iPad", "iPhone", "iPod"]
            .iter()
            .any(|device| user_agent.contains(device))
        {
            Platform::Ios
        } else {
            Platform::Other
        }
    }

    /// Pinned name wins over user-agent detection
    pub fn resolve(pinned: Option<&str>, user_agent: Option<&str>) -> Result<Self> {
        match (pinned, user_agent) {
            (Some(name), _) => name.parse(),
            (None, Some(ua)) => Ok(Self::from_user_agent(ua)),
            (None, None) => Ok(Platform::Other),
        }
    }

    /// Whether switches must attach a converted platform asset
    pub fn requires_converted_asset(&self) -> bool {
        matches!(self, Platform::Ios)
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ios" => Ok(Platform::Ios),
            "other" | "desktop" | "android" => Ok(Platform::Other),
            other => Err(Error::Config(format!("Unknown platform '{}'", other))),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Ios => write!(f, "ios"),
            Platform::Other => write!(f, "other"),
        }
    }
}
