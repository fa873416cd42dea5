// src/env.rs

//! Environment assembly for launched units.
//!
//! A unit only ever sees string environment variables. Three layers are
//! merged, later layers winning on key collision:
//!
//! 1. base: service discovery (`SIDECAR_URL` by default)
//! 2. global secrets from `[secrets].values`
//! 3. unit settings from `[units.<name>]`: the `env` sub-table as flat
//!    variables, and the remaining settings JSON-encoded under
//!    `SKILL_CONFIG`
//!
//! Backends add one last overlay of their own (ambient process environment
//! underneath, request environment on top).

use std::collections::BTreeMap;

use serde_json::{Map, Number, Value as JsonValue};

use crate::config::Config;

/// Flat, case-sensitive environment map.
pub type EnvMap = BTreeMap<String, String>;

/// Key under which structured unit settings are passed as a JSON object.
pub const SKILL_CONFIG_KEY: &str = "SKILL_CONFIG";

/// Snapshot of this process's environment.
///
/// Variables whose name or value is not valid UTF-8 are skipped.
pub fn ambient() -> EnvMap {
    std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect()
}

/// `base` with every key of `top` written over it.
pub fn overlay(base: &EnvMap, top: &EnvMap) -> EnvMap {
    let mut merged = base.clone();
    merged.extend(top.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

#[derive(Debug, Clone, Default)]
pub struct EnvironmentAssembler {
    base: EnvMap,
    secrets: EnvMap,
}

impl EnvironmentAssembler {
    pub fn new(base: EnvMap, secrets: EnvMap) -> Self {
        Self { base, secrets }
    }

    pub fn from_config(config: &Config) -> Self {
        let mut base = EnvMap::new();
        base.insert(config.service.url_key.clone(), config.service.url.clone());
        Self::new(base, config.secrets.values.clone())
    }

    /// Service-discovery variables.
    pub fn base(&self) -> &EnvMap {
        &self.base
    }

    /// Secrets plus unit-specific variables, without the base layer.
    pub fn extra_for(&self, unit_settings: Option<&toml::Table>) -> EnvMap {
        let mut extra = self.secrets.clone();

        let Some(settings) = unit_settings else {
            return extra;
        };

        if let Some(toml::Value::Table(flat)) = settings.get("env") {
            for (key, value) in flat {
                extra.insert(key.clone(), env_value(value));
            }
        }

        let structured: Map<String, JsonValue> = settings
            .iter()
            .filter(|(key, _)| key.as_str() != "env")
            .map(|(key, value)| (key.clone(), to_json(value)))
            .collect();
        if !structured.is_empty() {
            extra.insert(
                SKILL_CONFIG_KEY.to_string(),
                JsonValue::Object(structured).to_string(),
            );
        }

        extra
    }

    /// Full environment for a unit: base overlaid with `extra_for`.
    pub fn assemble(&self, unit_settings: Option<&toml::Table>) -> EnvMap {
        overlay(&self.base, &self.extra_for(unit_settings))
    }
}

/// Render a config value as an environment string.
///
/// Strings pass through unchanged; everything else becomes its JSON text.
pub fn env_value(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        other => to_json(other).to_string(),
    }
}

fn to_json(value: &toml::Value) -> JsonValue {
    match value {
        toml::Value::String(s) => JsonValue::String(s.clone()),
        toml::Value::Integer(i) => JsonValue::Number((*i).into()),
        toml::Value::Float(f) => Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        toml::Value::Boolean(b) => JsonValue::Bool(*b),
        toml::Value::Datetime(dt) => JsonValue::String(dt.to_string()),
        toml::Value::Array(items) => JsonValue::Array(items.iter().map(to_json).collect()),
        toml::Value::Table(table) => JsonValue::Object(
            table
                .iter()
                .map(|(k, v)| (k.clone(), to_json(v)))
                .collect(),
        ),
    }
}
