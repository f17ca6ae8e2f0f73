//! Network configuration: a case-insensitive, type-coercing string map.
//!
//! Mirrors `Params` in the Python original (`app/common/params.py`) exactly,
//! including its coercion order (int, then float, then `TRUE`/`FALSE`
//! case-insensitively, then comma-split list, else string) and its
//! case-insensitive key lookup.

use std::collections::HashMap;

use conduit_core::ConfigError;

/// A configuration value coerced from its raw string form.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// An integer literal.
    Int(i64),
    /// A floating-point literal (tried only when the int parse fails).
    Float(f64),
    /// `TRUE`/`FALSE`, case-insensitive.
    Bool(bool),
    /// A comma-separated list, each element itself coerced.
    List(Vec<ParamValue>),
    /// Anything that didn't match one of the above.
    String(String),
}

impl ParamValue {
    /// Coerces a raw string using the original's exact rule order.
    #[must_use]
    pub fn coerce(raw: &str) -> Self {
        if let Ok(i) = raw.parse::<i64>() {
            return Self::Int(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            return Self::Float(f);
        }
        if raw.eq_ignore_ascii_case("true") {
            return Self::Bool(true);
        }
        if raw.eq_ignore_ascii_case("false") {
            return Self::Bool(false);
        }
        if raw.contains(',') {
            return Self::List(raw.split(',').map(Self::coerce).collect());
        }
        Self::String(raw.to_owned())
    }

    /// Renders this value back to the string an int/float/bool would have
    /// been parsed from, for accessors that want a specific type but
    /// tolerate a value that coerced to a different one (e.g. `port =
    /// "8080"` coerces to `Int`, which [`NetworkConfig::get_string`] must
    /// still be able to hand back as `"8080"`).
    #[must_use]
    pub fn as_string(&self) -> String {
        match self {
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Bool(b) => b.to_string().to_uppercase(),
            Self::List(items) => items.iter().map(Self::as_string).collect::<Vec<_>>().join(","),
            Self::String(s) => s.clone(),
        }
    }
}

/// A case-insensitive `String -> String` configuration map with automatic
/// coercion to int/float/bool/list-of-scalars, per §6.
#[derive(Debug, Clone, Default)]
pub struct NetworkConfig {
    raw: HashMap<String, String>,
}

impl NetworkConfig {
    /// Builds a configuration from an already-lowercased-or-not map; keys
    /// are lowercased on insertion so lookups are case-insensitive.
    #[must_use]
    pub fn new(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        let raw = entries.into_iter().map(|(k, v)| (k.to_lowercase(), v)).collect();
        Self { raw }
    }

    /// Returns `true` if `key` (case-insensitively) is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.raw.contains_key(&key.to_lowercase())
    }

    /// Looks up and coerces `key`, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<ParamValue> {
        self.raw.get(&key.to_lowercase()).map(|v| ParamValue::coerce(v))
    }

    /// Looks up `key`, falling back to `default` if absent.
    #[must_use]
    pub fn get_or(&self, key: &str, default: ParamValue) -> ParamValue {
        self.get(key).unwrap_or(default)
    }

    /// Requires `key` to be present, raising [`ConfigError::MissingKey`] if
    /// not.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingKey`] if `key` is absent.
    pub fn require(&self, key: &str) -> Result<ParamValue, ConfigError> {
        self.get(key).ok_or_else(|| ConfigError::MissingKey(key.to_owned()))
    }

    /// Requires every key in `keys` to be present.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingKey`] naming the first absent key.
    pub fn require_all(&self, keys: &[&str]) -> Result<(), ConfigError> {
        for key in keys {
            if !self.contains(key) {
                return Err(ConfigError::MissingKey((*key).to_owned()));
            }
        }
        Ok(())
    }

    /// Reads `key` as a string, coercing non-string values back to their
    /// textual form.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingKey`] if `key` is absent.
    pub fn get_string(&self, key: &str) -> Result<String, ConfigError> {
        Ok(self.require(key)?.as_string())
    }

    /// Reads `key` as an integer.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingKey`] if absent, or
    /// [`ConfigError::InvalidValue`] if the value did not coerce to
    /// [`ParamValue::Int`].
    pub fn get_int(&self, key: &str) -> Result<i64, ConfigError> {
        match self.require(key)? {
            ParamValue::Int(i) => Ok(i),
            other => Err(ConfigError::InvalidValue {
                key: key.to_owned(),
                reason: format!("expected an integer, got {other:?}"),
            }),
        }
    }

    /// Reads `key` as an integer, falling back to `default` if absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if present but not an integer.
    pub fn get_int_or(&self, key: &str, default: i64) -> Result<i64, ConfigError> {
        if self.contains(key) {
            self.get_int(key)
        } else {
            Ok(default)
        }
    }

    /// Reads `key` as a float (an integer value also coerces).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingKey`] if absent, or
    /// [`ConfigError::InvalidValue`] if the value is not numeric.
    pub fn get_float(&self, key: &str) -> Result<f64, ConfigError> {
        match self.require(key)? {
            ParamValue::Float(f) => Ok(f),
            ParamValue::Int(i) => Ok(i as f64),
            other => Err(ConfigError::InvalidValue {
                key: key.to_owned(),
                reason: format!("expected a number, got {other:?}"),
            }),
        }
    }

    /// Reads `key` as a float, falling back to `default` if absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if present but not numeric.
    pub fn get_float_or(&self, key: &str, default: f64) -> Result<f64, ConfigError> {
        if self.contains(key) {
            self.get_float(key)
        } else {
            Ok(default)
        }
    }

    /// Reads `key` as a boolean.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingKey`] if absent, or
    /// [`ConfigError::InvalidValue`] if the value did not coerce to
    /// [`ParamValue::Bool`].
    pub fn get_bool(&self, key: &str) -> Result<bool, ConfigError> {
        match self.require(key)? {
            ParamValue::Bool(b) => Ok(b),
            other => Err(ConfigError::InvalidValue {
                key: key.to_owned(),
                reason: format!("expected TRUE/FALSE, got {other:?}"),
            }),
        }
    }

    /// Reads `key` as a boolean, falling back to `default` if absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if present but not boolean.
    pub fn get_bool_or(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        if self.contains(key) {
            self.get_bool(key)
        } else {
            Ok(default)
        }
    }

    /// Reads `key` as a comma-separated list. A single scalar value (no
    /// comma in the raw string) is returned as a one-element list, mirroring
    /// the original (a value without a comma never enters the list branch
    /// of `cast_data_type`, but callers that specifically want "a list of
    /// one" are common enough to support directly here).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingKey`] if absent.
    pub fn get_list(&self, key: &str) -> Result<Vec<ParamValue>, ConfigError> {
        match self.require(key)? {
            ParamValue::List(items) => Ok(items),
            scalar => Ok(vec![scalar]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(pairs: &[(&str, &str)]) -> NetworkConfig {
        NetworkConfig::new(pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())))
    }

    #[test]
    fn keys_are_case_insensitive() {
        let cfg = config(&[("Host", "localhost")]);
        assert!(cfg.contains("host"));
        assert!(cfg.contains("HOST"));
        assert_eq!(cfg.get_string("hOsT").unwrap(), "localhost");
    }

    #[test]
    fn coercion_prefers_int_then_float_then_bool_then_list_then_string() {
        assert_eq!(ParamValue::coerce("42"), ParamValue::Int(42));
        assert_eq!(ParamValue::coerce("3.14"), ParamValue::Float(3.14));
        assert_eq!(ParamValue::coerce("true"), ParamValue::Bool(true));
        assert_eq!(ParamValue::coerce("FALSE"), ParamValue::Bool(false));
        assert_eq!(
            ParamValue::coerce("1,2,3"),
            ParamValue::List(vec![ParamValue::Int(1), ParamValue::Int(2), ParamValue::Int(3)])
        );
        assert_eq!(ParamValue::coerce("serial"), ParamValue::String("serial".to_owned()));
    }

    #[test]
    fn missing_required_key_is_a_config_error() {
        let cfg = config(&[]);
        assert_eq!(cfg.require("method"), Err(ConfigError::MissingKey("method".to_owned())));
    }

    #[test]
    fn typed_accessors_reject_the_wrong_shape() {
        let cfg = config(&[("host", "localhost")]);
        assert!(matches!(cfg.get_int("host"), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn or_variants_fall_back_when_absent() {
        let cfg = config(&[]);
        assert_eq!(cfg.get_int_or("keepalive", 60).unwrap(), 60);
        assert!(cfg.get_bool_or("reconnect", true).unwrap());
    }
}
