//! Layer-by-layer merging of raw TOML with per-field provenance.

use std::collections::BTreeMap;
use std::fmt;

/// Where a resolved value came from, lowest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigLayer {
    /// The embedded `defaults.toml`.
    Defaults,
    /// A `VIAGENT_*` variable filling a field no file set.
    Environment,
    /// `~/.viagent/config.toml`.
    User,
    /// `{root}/.viagent/config.toml`.
    Workspace,
}

impl fmt::Display for ConfigLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Defaults => "default",
            Self::Environment => "env",
            Self::User => "~/.viagent/config.toml",
            Self::Workspace => ".viagent/config.toml",
        })
    }
}

/// Dotted field path (`sync.mode`) to the layer that last set it.
pub type FieldSources = BTreeMap<String, ConfigLayer>;

/// A TOML document built up one layer at a time.
#[derive(Debug, Clone)]
pub struct Layered {
    /// The merged document so far.
    pub value: toml::Value,
    /// Provenance of every leaf in `value`.
    pub sources: FieldSources,
}

impl Layered {
    /// Start from `value`, attributing every leaf to `layer`.
    #[must_use]
    pub fn new(value: toml::Value, layer: ConfigLayer) -> Self {
        let mut sources = FieldSources::new();
        attribute(&value, String::new(), layer, &mut sources);
        Self { value, sources }
    }

    /// Lay `overlay` on top. Tables merge key by key; any other value
    /// (arrays included) replaces what was there.
    pub fn apply(&mut self, overlay: &toml::Value, layer: ConfigLayer) {
        overlay_into(&mut self.value, overlay, String::new(), layer, &mut self.sources);
    }

    /// Whether a config file, rather than the defaults, set `path`.
    #[must_use]
    pub fn set_by_file(&self, path: &str) -> bool {
        matches!(
            self.sources.get(path),
            Some(ConfigLayer::User | ConfigLayer::Workspace)
        )
    }
}

fn overlay_into(
    base: &mut toml::Value,
    overlay: &toml::Value,
    path: String,
    layer: ConfigLayer,
    sources: &mut FieldSources,
) {
    match (base, overlay) {
        (toml::Value::Table(table), toml::Value::Table(entries)) => {
            for (key, incoming) in entries {
                let child = join(&path, key);
                match table.get_mut(key) {
                    Some(existing) if existing.is_table() && incoming.is_table() => {
                        overlay_into(existing, incoming, child, layer, sources);
                    },
                    Some(existing) => {
                        *existing = incoming.clone();
                        attribute(incoming, child, layer, sources);
                    },
                    None => {
                        table.insert(key.clone(), incoming.clone());
                        attribute(incoming, child, layer, sources);
                    },
                }
            }
        },
        (base, _) => {
            *base = overlay.clone();
            attribute(overlay, path, layer, sources);
        },
    }
}

/// Record `layer` for every leaf under `value`.
fn attribute(value: &toml::Value, path: String, layer: ConfigLayer, sources: &mut FieldSources) {
    match value {
        toml::Value::Table(table) => {
            for (key, child) in table {
                attribute(child, join(&path, key), layer, sources);
            }
        },
        _ => {
            sources.insert(path, layer);
        },
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_owned()
    } else {
        format!("{path}.{key}")
    }
}
