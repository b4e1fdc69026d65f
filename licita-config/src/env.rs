// Environment variable loading

use std::collections::HashMap;
use std::env;

/// Collects `PREFIX_*` variables into a map keyed by the lower-cased
/// remainder, e.g. `LICITA_CACHE_DEFAULT_TTL_MS` → `cache_default_ttl_ms`.
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self::new(Some(prefix.into()))
    }

    /// Load from the process environment.
    pub fn load(&self) -> HashMap<String, String> {
        self.load_from(env::vars())
    }

    /// Load from an explicit set of variables.
    pub fn load_from<I, K, V>(&self, vars: I) -> HashMap<String, String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut config = HashMap::new();

        for (key, value) in vars {
            let key = key.as_ref();
            match &self.prefix {
                Some(prefix) => {
                    if let Some(rest) = key.strip_prefix(prefix.as_str()) {
                        let Some(rest) = rest.strip_prefix('_') else {
                            continue;
                        };
                        config.insert(rest.to_lowercase(), value.into());
                    }
                }
                None => {
                    config.insert(key.to_lowercase(), value.into());
                }
            }
        }

        config
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(None)
    }
}
