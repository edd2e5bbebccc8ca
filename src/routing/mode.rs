//! Background execution modes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Path token that requests background execution.
pub const BACKGROUND_MARKER: &str = ":bg";

/// Selects what a `202 Accepted` response carries while the function keeps
/// running detached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BackgroundMode {
    /// Short acknowledgement text.
    #[default]
    Default,
    /// Invocation metadata as text.
    Info,
    /// Zero-length body.
    Empty,
    /// Every resolved parameter as JSON.
    Params,
    /// The first `n` declared parameters the request supplied, as JSON.
    ParamsSpecific(usize),
}

const PARAMS_SPECIFIC: &str = "paramsSpecific";

impl fmt::Display for BackgroundMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackgroundMode::Default => f.write_str("default"),
            BackgroundMode::Info => f.write_str("info"),
            BackgroundMode::Empty => f.write_str("empty"),
            BackgroundMode::Params => f.write_str("params"),
            BackgroundMode::ParamsSpecific(n) => write!(f, "{}{}", PARAMS_SPECIFIC, n),
        }
    }
}

/// A path segment that does not name a background mode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown background mode \"{0}\"")]
pub struct UnknownMode(pub String);

impl FromStr for BackgroundMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(BackgroundMode::Default),
            "info" => Ok(BackgroundMode::Info),
            "empty" => Ok(BackgroundMode::Empty),
            "params" => Ok(BackgroundMode::Params),
            other => other
                .strip_prefix(PARAMS_SPECIFIC)
                .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|digits| digits.parse().ok())
                .filter(|n: &usize| *n > 0)
                .map(BackgroundMode::ParamsSpecific)
                .ok_or_else(|| UnknownMode(other.to_string())),
        }
    }
}

impl TryFrom<String> for BackgroundMode {
    type Error = UnknownMode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BackgroundMode> for String {
    fn from(mode: BackgroundMode) -> Self {
        mode.to_string()
    }
}
