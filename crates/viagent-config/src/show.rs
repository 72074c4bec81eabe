//! Rendering of the resolved configuration for `viagent config`.

use std::fmt::{self, Write as _};

use crate::merge::FieldSources;
use crate::types::Config;

/// The merged configuration plus where each value came from.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The validated configuration.
    pub config: Config,
    /// Dotted field path to the layer that set it.
    pub field_sources: FieldSources,
    /// Files that contributed, lowest precedence first.
    pub loaded_files: Vec<String>,
}

/// Output format for `viagent config`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowFormat {
    /// TOML, each value followed by a `# [source]` comment.
    Toml,
    /// Plain JSON.
    Json,
}

impl ResolvedConfig {
    /// Render the whole configuration or one `section` of it.
    ///
    /// # Errors
    ///
    /// Fails for an unknown section name or if serialization fails.
    pub fn show(&self, format: ShowFormat, section: Option<&str>) -> Result<String, fmt::Error> {
        let value = self.selected(section)?;
        match format {
            ShowFormat::Json => serde_json::to_string_pretty(&value).map_err(|_| fmt::Error),
            ShowFormat::Toml => {
                let body = toml::to_string_pretty(&value).map_err(|_| fmt::Error)?;
                self.annotate(&body, section.unwrap_or_default())
            },
        }
    }

    fn selected(&self, section: Option<&str>) -> Result<toml::Value, fmt::Error> {
        let root = toml::Value::try_from(&self.config).map_err(|_| fmt::Error)?;
        match section {
            None => Ok(root),
            Some(name) => root.get(name).cloned().ok_or(fmt::Error),
        }
    }

    /// Append the source layer to each `key = value` line. `[table]`
    /// headers switch the dotted prefix used for the lookup.
    fn annotate<'a>(&self, body: &'a str, mut table: &'a str) -> Result<String, fmt::Error> {
        let mut out = String::from("# Resolved Via-gent configuration\n");
        for (n, path) in (1_usize..).zip(&self.loaded_files) {
            writeln!(out, "# layer {n}: {path}")?;
        }
        out.push('\n');

        for line in body.lines() {
            let trimmed = line.trim();
            if let Some(header) = trimmed.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
                table = header;
            }
            let layer = trimmed
                .split_once('=')
                .map(|(key, _)| key.trim())
                .filter(|_| !trimmed.starts_with('#'))
                .and_then(|key| {
                    let path = if table.is_empty() {
                        key.to_owned()
                    } else {
                        format!("{table}.{key}")
                    };
                    self.field_sources.get(&path)
                });
            match layer {
                Some(layer) => writeln!(out, "{line}  # [{layer}]")?,
                None => writeln!(out, "{line}")?,
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::ConfigLayer;

    fn resolved() -> ResolvedConfig {
        let mut field_sources = FieldSources::new();
        field_sources.insert("sync.mode".to_owned(), ConfigLayer::Workspace);
        field_sources.insert("logging.level".to_owned(), ConfigLayer::Defaults);
        ResolvedConfig {
            config: Config::default(),
            field_sources,
            loaded_files: vec!["/ws/.viagent/config.toml".to_owned()],
        }
    }

    #[test]
    fn test_toml_annotates_sources() {
        let out = resolved().show(ShowFormat::Toml, None).unwrap();
        assert!(out.contains("# layer 1: /ws/.viagent/config.toml"));
        assert!(out.contains("mode = \"incremental\"  # [.viagent/config.toml]"));
        assert!(out.contains("level = \"info\"  # [default]"));
    }

    #[test]
    fn test_toml_section_keeps_prefix() {
        let out = resolved().show(ShowFormat::Toml, Some("logging")).unwrap();
        assert!(out.contains("level = \"info\"  # [default]"));
        assert!(!out.contains("mode ="));
    }

    #[test]
    fn test_json_section() {
        let out = resolved().show(ShowFormat::Json, Some("sync")).unwrap();
        let val: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(val["mode"], "incremental");
        assert_eq!(val["concurrency"], 1);
    }

    #[test]
    fn test_unknown_section_errors() {
        assert!(resolved().show(ShowFormat::Json, Some("nope")).is_err());
    }
}
