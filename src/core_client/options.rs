// Runtime options understood by the session.

use crate::constants::{OPTION_AUTOSEEK, OPTION_TIMEOUT_SEC};
use crate::core_client::error::FtpError;
use std::fmt;
use std::str::FromStr;

/// The two recognised runtime tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FtpOption {
    TimeoutSec,
    Autoseek,
}

impl FtpOption {
    pub fn name(&self) -> &'static str {
        match self {
            FtpOption::TimeoutSec => OPTION_TIMEOUT_SEC,
            FtpOption::Autoseek => OPTION_AUTOSEEK,
        }
    }

    /// Checks that `value` has the right type and range for this option.
    pub fn validate(&self, value: &OptionValue) -> Result<(), FtpError> {
        match (self, value) {
            (FtpOption::TimeoutSec, OptionValue::Int(secs)) if *secs > 0 => Ok(()),
            (FtpOption::TimeoutSec, OptionValue::Int(_)) => Err(FtpError::InvalidOptionValue(
                "Timeout value must be greater than zero".to_string(),
            )),
            (FtpOption::TimeoutSec, _) => Err(FtpError::InvalidOptionValue(
                "Timeout value must be an integer".to_string(),
            )),
            (FtpOption::Autoseek, OptionValue::Bool(_)) => Ok(()),
            (FtpOption::Autoseek, _) => Err(FtpError::InvalidOptionValue(
                "Autoseek value must be boolean".to_string(),
            )),
        }
    }
}

impl FromStr for FtpOption {
    type Err = FtpError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_ascii_lowercase().as_str() {
            "timeout_sec" | "timeoutsec" => Ok(FtpOption::TimeoutSec),
            "autoseek" => Ok(FtpOption::Autoseek),
            _ => Err(FtpError::UnsupportedOption(name.to_string())),
        }
    }
}

impl fmt::Display for FtpOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Loosely typed option value, so a caller can hand over anything and get a
/// descriptive error back instead of a compile failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Int(i64),
    Bool(bool),
    Text(String),
}

impl OptionValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            OptionValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        OptionValue::Int(v)
    }
}

impl From<i32> for OptionValue {
    fn from(v: i32) -> Self {
        OptionValue::Int(v as i64)
    }
}

impl From<u64> for OptionValue {
    fn from(v: u64) -> Self {
        OptionValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        OptionValue::Bool(v)
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::Text(v.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        OptionValue::Text(v)
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Int(v) => write!(f, "{}", v),
            OptionValue::Bool(v) => write!(f, "{}", v),
            OptionValue::Text(v) => write!(f, "{:?}", v),
        }
    }
}
