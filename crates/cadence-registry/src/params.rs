//! Processor parameters.
//!
//! Parameters arrive as strings, from a TOML file or a command-line spec,
//! and are parsed on demand by the processor factory that reads them.

use std::collections::BTreeMap;

use crate::RegistryError;

/// Parse a parameter value string into an f64.
///
/// Supports various formats:
/// - Plain numbers: "0.5", "1024", "-60"
/// - Percentages: "50%", "120%" (divided by 100)
/// - Time in ms: "100ms" (converted to seconds)
/// - Time in s: "1.5s" (kept as seconds)
/// - Frequency in Hz: "440Hz"
/// - Frequency in kHz: "1.2kHz" (converted to Hz)
/// - Decibels: "-60dB" (kept in dB)
pub fn parse_param_value(value: &str) -> Option<f64> {
    let value = value.trim();

    if let Some(pct) = value.strip_suffix('%') {
        return pct.trim().parse::<f64>().ok().map(|v| v / 100.0);
    }

    if let Some(db) = value
        .strip_suffix("dB")
        .or_else(|| value.strip_suffix("db"))
    {
        return db.trim().parse::<f64>().ok();
    }

    if let Some(ms) = value.strip_suffix("ms") {
        return ms.trim().parse::<f64>().ok().map(|v| v / 1000.0);
    }

    if let Some(s) = value.strip_suffix('s') {
        return s.trim().parse::<f64>().ok();
    }

    if let Some(khz) = value
        .strip_suffix("kHz")
        .or_else(|| value.strip_suffix("khz"))
    {
        return khz.trim().parse::<f64>().ok().map(|v| v * 1000.0);
    }

    if let Some(hz) = value
        .strip_suffix("Hz")
        .or_else(|| value.strip_suffix("hz"))
    {
        return hz.trim().parse::<f64>().ok();
    }

    value.parse::<f64>().ok()
}

/// Raw key/value parameters for one processor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    values: BTreeMap<String, String>,
}

impl Params {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Inserts a parameter, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Raw value of a parameter.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Iterates parameters in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// A numeric parameter, or `default` if absent.
    pub fn number(&self, key: &str, default: f64) -> Result<f64, RegistryError> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => parse_param_value(raw)
                .filter(|v| v.is_finite())
                .ok_or_else(|| RegistryError::invalid(key, format!("'{raw}' is not a valid number"))),
        }
    }

    /// A positive whole-number parameter, or `default` if absent.
    pub fn count(&self, key: &str, default: usize) -> Result<usize, RegistryError> {
        let value = self.number(key, default as f64)?;
        if value < 1.0 || value.fract() != 0.0 {
            return Err(RegistryError::invalid(
                key,
                format!("expected a positive whole number, got {value}"),
            ));
        }
        Ok(value as usize)
    }

    /// A required text parameter.
    pub fn text(&self, key: &str) -> Result<&str, RegistryError> {
        self.get(key)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| RegistryError::MissingParameter(key.to_string()))
    }

    /// A parameter parsed with its type's `FromStr`, or `default` if absent.
    pub fn parsed<T>(&self, key: &str, default: T) -> Result<T, RegistryError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw
                .parse()
                .map_err(|e: T::Err| RegistryError::invalid(key, e.to_string())),
        }
    }
}

impl From<BTreeMap<String, String>> for Params {
    fn from(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
