//! Provider configuration.

use std::env;

#[cfg(feature = "config")]
use serde::Deserialize;

use crate::engine::ServiceProviderMode;
use crate::error::{DiError, DiResult};

/// Prefix of the environment variables read by [`ServiceProviderOptions::from_env`].
pub const ENV_PREFIX: &str = "ASPECT_DI";

/// Options controlling how a [`ServiceProvider`](crate::ServiceProvider) resolves.
///
/// # Examples
///
/// ```
/// use aspect_di::{ServiceProviderMode, ServiceProviderOptions};
///
/// let options = ServiceProviderOptions::default()
///     .with_mode(ServiceProviderMode::Compiled)
///     .with_validate_scopes(false);
/// assert_eq!(options.mode, ServiceProviderMode::Compiled);
/// assert!(!options.validate_scopes);
/// assert_eq!(options.promotion_threshold, 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Deserialize), serde(default))]
pub struct ServiceProviderOptions {
    /// Reject scoped services captured by singletons or resolved from the root scope.
    pub validate_scopes: bool,
    /// Engine used to execute call-site graphs.
    pub mode: ServiceProviderMode,
    /// Resolutions of a service before [`ServiceProviderMode::Dynamic`]
    /// switches it to the compiled form. Values of 1 or less compile at once.
    pub promotion_threshold: usize,
}

impl Default for ServiceProviderOptions {
    fn default() -> Self {
        Self {
            validate_scopes: true,
            mode: ServiceProviderMode::Dynamic,
            promotion_threshold: 2,
        }
    }
}

impl ServiceProviderOptions {
    pub fn with_validate_scopes(mut self, validate_scopes: bool) -> Self {
        self.validate_scopes = validate_scopes;
        self
    }

    pub fn with_mode(mut self, mode: ServiceProviderMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_promotion_threshold(mut self, promotion_threshold: usize) -> Self {
        self.promotion_threshold = promotion_threshold;
        self
    }

    /// Defaults overridden by `ASPECT_DI_VALIDATE_SCOPES`, `ASPECT_DI_MODE` and
    /// `ASPECT_DI_PROMOTION_THRESHOLD`.
    pub fn from_env() -> DiResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Defaults overridden by the variables `lookup` returns, keyed like
    /// [`from_env`](Self::from_env).
    ///
    /// ```
    /// use aspect_di::{ServiceProviderMode, ServiceProviderOptions};
    ///
    /// let options = ServiceProviderOptions::from_lookup(|name| match name {
    ///     "ASPECT_DI_MODE" => Some("runtime".to_string()),
    ///     "ASPECT_DI_VALIDATE_SCOPES" => Some("off".to_string()),
    ///     _ => None,
    /// })
    /// .unwrap();
    /// assert_eq!(options.mode, ServiceProviderMode::Runtime);
    /// assert!(!options.validate_scopes);
    ///
    /// let invalid = ServiceProviderOptions::from_lookup(|name| {
    ///     (name == "ASPECT_DI_PROMOTION_THRESHOLD").then(|| "often".to_string())
    /// });
    /// assert!(invalid.is_err());
    /// ```
    pub fn from_lookup<F>(lookup: F) -> DiResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| {
            let name = format!("{}_{}", ENV_PREFIX, suffix);
            lookup(&name).map(|value| (name, value))
        };

        let mut options = Self::default();
        if let Some((name, value)) = var("VALIDATE_SCOPES") {
            options.validate_scopes = parse_bool(&name, &value)?;
        }
        if let Some((_, value)) = var("MODE") {
            options.mode = value.parse()?;
        }
        if let Some((name, value)) = var("PROMOTION_THRESHOLD") {
            options.promotion_threshold = value
                .trim()
                .parse()
                .map_err(|_| DiError::Configuration(format!("{} must be a count, got {:?}", name, value)))?;
        }
        Ok(options)
    }
}

fn parse_bool(name: &str, value: &str) -> DiResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(DiError::Configuration(format!("{} must be a boolean, got {:?}", name, value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn missing_variables_keep_defaults() {
        let options = ServiceProviderOptions::from_lookup(lookup(&[])).unwrap();
        assert_eq!(options, ServiceProviderOptions::default());
    }

    #[test]
    fn variables_override_defaults() {
        let options = ServiceProviderOptions::from_lookup(lookup(&[
            ("ASPECT_DI_VALIDATE_SCOPES", "0"),
            ("ASPECT_DI_MODE", " Compiled "),
            ("ASPECT_DI_PROMOTION_THRESHOLD", "8"),
        ]))
        .unwrap();
        assert!(!options.validate_scopes);
        assert_eq!(options.mode, ServiceProviderMode::Compiled);
        assert_eq!(options.promotion_threshold, 8);
    }

    #[test]
    fn invalid_values_are_configuration_errors() {
        let err = ServiceProviderOptions::from_lookup(lookup(&[("ASPECT_DI_VALIDATE_SCOPES", "maybe")])).unwrap_err();
        assert!(matches!(err, DiError::Configuration(ref msg) if msg.contains("ASPECT_DI_VALIDATE_SCOPES")));

        let err = ServiceProviderOptions::from_lookup(lookup(&[("ASPECT_DI_MODE", "jit")])).unwrap_err();
        assert!(matches!(err, DiError::Configuration(_)));
    }
}
