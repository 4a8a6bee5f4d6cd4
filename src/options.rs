//! Interception settings.

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::error::{DiError, DiResult};

/// Environment variable read by [`InterceptionOptions::from_env`].
pub const FOLD_CONSTANTS_ENV: &str = "FERROUS_INTERCEPT_FOLD_CONSTANTS";

/// Settings applied by the interception hooks at build time.
///
/// # Examples
///
/// ```
/// use ferrous_intercept::{InterceptionOptions, ServiceCollection};
///
/// let mut services = ServiceCollection::new();
/// services.configure_interception(InterceptionOptions::default().with_fold_constant_proxies(false));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct InterceptionOptions {
    /// Build the proxy once at build time when both the registration and the
    /// interceptor are fixed instances.
    pub fold_constant_proxies: bool,
}

impl Default for InterceptionOptions {
    fn default() -> Self {
        Self {
            fold_constant_proxies: true,
        }
    }
}

impl InterceptionOptions {
    pub fn with_fold_constant_proxies(mut self, fold: bool) -> Self {
        self.fold_constant_proxies = fold;
        self
    }

    /// Reads options from the environment, starting from the defaults.
    ///
    /// `FERROUS_INTERCEPT_FOLD_CONSTANTS` accepts `true`, `false`, `1` or `0`;
    /// anything else is a [`DiError::Configuration`].
    pub fn from_env() -> DiResult<Self> {
        let mut options = Self::default();

        match std::env::var(FOLD_CONSTANTS_ENV) {
            Ok(value) => options.fold_constant_proxies = parse_flag(FOLD_CONSTANTS_ENV, &value)?,
            Err(std::env::VarError::NotPresent) => {}
            Err(std::env::VarError::NotUnicode(_)) => {
                return Err(DiError::Configuration(format!(
                    "{} is not valid unicode",
                    FOLD_CONSTANTS_ENV
                )));
            }
        }

        Ok(options)
    }

    /// Parses options from JSON. Missing fields keep their defaults.
    ///
    /// ```
    /// # #[cfg(feature = "config")]
    /// # {
    /// use ferrous_intercept::InterceptionOptions;
    ///
    /// let options = InterceptionOptions::from_json(r#"{ "fold_constant_proxies": false }"#).unwrap();
    /// assert!(!options.fold_constant_proxies);
    /// # }
    /// ```
    #[cfg(feature = "config")]
    pub fn from_json(json: &str) -> DiResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| DiError::Configuration(format!("invalid interception options: {}", e)))
    }
}

fn parse_flag(name: &str, value: &str) -> DiResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(DiError::Configuration(format!(
            "{} must be true, false, 1 or 0 (got {:?})",
            name, other
        ))),
    }
}
