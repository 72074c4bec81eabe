//! Environment variable fallbacks.
//!
//! Env vars are **fallback**, not override: they only apply to fields that
//! no config file set.

use std::collections::HashMap;

use tracing::debug;

use crate::merge::{ConfigLayer, Layered};

/// Mapping from environment variable name to config field path.
struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
}

/// All supported `VIAGENT_*` env var mappings.
const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "VIAGENT_LOG_LEVEL",
        field_path: "logging.level",
    },
    EnvMapping {
        var_name: "VIAGENT_SYNC_MODE",
        field_path: "sync.mode",
    },
    EnvMapping {
        var_name: "VIAGENT_SYNC_CONCURRENCY",
        field_path: "sync.concurrency",
    },
];

/// Apply environment variable fallbacks to fields that no config file
/// layer set. Returns the number of env vars applied.
pub fn apply_env_fallbacks<S: ::std::hash::BuildHasher>(
    layered: &mut Layered,
    env_vars: &HashMap<String, String, S>,
) -> usize {
    let mut count: usize = 0;

    for mapping in ENV_MAPPINGS {
        if layered.set_by_file(mapping.field_path) {
            continue;
        }
        let Some(val) = env_vars.get(mapping.var_name) else {
            continue;
        };
        debug!(
            var = mapping.var_name,
            field = mapping.field_path,
            "env fallback"
        );
        set_field(
            &mut layered.value,
            mapping.field_path,
            coerce(mapping.field_path, val),
        );
        layered
            .sources
            .insert(mapping.field_path.to_owned(), ConfigLayer::Environment);
        count = count.saturating_add(1);
    }

    count
}

/// Set a `section.key` field, creating the section table if needed.
fn set_field(root: &mut toml::Value, path: &str, val: toml::Value) {
    let Some((section, key)) = path.split_once('.') else {
        return;
    };
    let Some(table) = root.as_table_mut() else {
        return;
    };
    let section = table
        .entry(section.to_owned())
        .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    if let Some(section) = section.as_table_mut() {
        section.insert(key.to_owned(), val);
    }
}

/// Coerce a string env var value to the TOML type of the field.
fn coerce(path: &str, val: &str) -> toml::Value {
    if path == "sync.concurrency"
        && let Ok(i) = val.trim().parse::<i64>()
    {
        return toml::Value::Integer(i);
    }
    toml::Value::String(val.trim().to_owned())
}

/// Collect all current environment variables into a map.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_env_applies_over_defaults() {
        let mut layered = Layered::new(
            toml::from_str("[logging]\nlevel = \"info\"").unwrap(),
            ConfigLayer::Defaults,
        );

        let env = make_env(&[("VIAGENT_LOG_LEVEL", "debug"), ("VIAGENT_SYNC_CONCURRENCY", "4")]);
        assert_eq!(apply_env_fallbacks(&mut layered, &env), 2);
        let merged = &layered.value;
        assert_eq!(
            merged.get("logging").unwrap().get("level").unwrap().as_str(),
            Some("debug")
        );
        assert_eq!(
            merged
                .get("sync")
                .unwrap()
                .get("concurrency")
                .unwrap()
                .as_integer(),
            Some(4)
        );
        assert_eq!(
            layered.sources.get("logging.level"),
            Some(&ConfigLayer::Environment)
        );
    }

    #[test]
    fn test_env_does_not_override_file_layer() {
        let mut layered = Layered::new(
            toml::from_str("[sync]\nmode = \"full\"").unwrap(),
            ConfigLayer::User,
        );

        let env = make_env(&[("VIAGENT_SYNC_MODE", "incremental")]);
        assert_eq!(apply_env_fallbacks(&mut layered, &env), 0);
        assert_eq!(
            layered.value.get("sync").unwrap().get("mode").unwrap().as_str(),
            Some("full")
        );
    }
}
