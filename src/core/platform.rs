use std::collections::BTreeSet;
use std::sync::{OnceLock, RwLock};

use crate::error::{Error, Result};

/// Platforms an action can declare support for. The built-in set is fixed;
/// additional platforms can be registered process-wide at startup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Platform {
    Ios,
    Mac,
    Android,
    Custom(String),
}

impl Platform {
    pub fn name(&self) -> &str {
        match self {
            Platform::Ios => "ios",
            Platform::Mac => "mac",
            Platform::Android => "android",
            Platform::Custom(name) => name,
        }
    }

    /// Look up a platform by name. Custom names must have been registered
    /// via [`register_custom_platform`] first.
    pub fn from_name(name: &str) -> Result<Platform> {
        match name {
            "ios" => Ok(Platform::Ios),
            "mac" => Ok(Platform::Mac),
            "android" => Ok(Platform::Android),
            other => {
                if custom_platforms()
                    .read()
                    .map(|set| set.contains(other))
                    .unwrap_or(false)
                {
                    Ok(Platform::Custom(other.to_string()))
                } else {
                    Err(Error::config_invalid_value(
                        "platform",
                        Some(other.to_string()),
                        "Unknown platform",
                    )
                    .with_hint("Register custom platforms with register_custom_platform before use"))
                }
            }
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn custom_platforms() -> &'static RwLock<BTreeSet<String>> {
    static CUSTOM: OnceLock<RwLock<BTreeSet<String>>> = OnceLock::new();
    CUSTOM.get_or_init(|| RwLock::new(BTreeSet::new()))
}

/// Register an extra platform name, process-wide. Intended to be called
/// once during startup, before any lookups.
pub fn register_custom_platform(name: impl Into<String>) {
    if let Ok(mut set) = custom_platforms().write() {
        set.insert(name.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_platforms_resolve() {
        assert_eq!(Platform::from_name("ios").unwrap(), Platform::Ios);
        assert_eq!(Platform::from_name("android").unwrap(), Platform::Android);
    }

    #[test]
    fn unregistered_custom_platform_is_an_error() {
        let err = Platform::from_name("smartfridge").unwrap_err();
        assert_eq!(err.code.as_str(), "config.invalid_value");
    }

    #[test]
    fn registered_custom_platform_resolves() {
        register_custom_platform("watchos");
        assert_eq!(
            Platform::from_name("watchos").unwrap(),
            Platform::Custom("watchos".to_string())
        );
    }
}
