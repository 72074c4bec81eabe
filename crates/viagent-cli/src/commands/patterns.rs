//! `viagent patterns`: list, validate and try exclusion patterns.

use anyhow::{Result, bail};
use serde_json::json;
use viagent_config::Config;
use viagent_sync::{ExclusionMatcher, merge_exclusion_patterns, validate_exclusion_pattern};

use crate::OutputFormat;
use crate::theme::Theme;

/// Patterns a pass would use with the current config.
pub(crate) fn active_patterns(config: &Config, extended: bool) -> Vec<String> {
    merge_exclusion_patterns(
        &config.sync.exclude_patterns,
        extended || config.sync.include_extended_defaults,
    )
}

/// Run `viagent patterns`. With `--check` the patterns are validated and the
/// command fails if any is invalid; with `--test` paths are matched against
/// the active list; otherwise the active list is printed.
pub(crate) fn run_patterns(
    config: &Config,
    extended: bool,
    check: &[String],
    test_paths: &[String],
    format: OutputFormat,
) -> Result<()> {
    if !check.is_empty() {
        return check_patterns(check, format);
    }

    let patterns = active_patterns(config, extended);
    if !test_paths.is_empty() {
        let matcher = ExclusionMatcher::new(&patterns);
        for path in test_paths {
            let excluded = matcher.is_excluded(path);
            match format {
                OutputFormat::Json => {
                    println!("{}", json!({ "path": path, "excluded": excluded }));
                },
                OutputFormat::Pretty if excluded => {
                    println!("{}", Theme::kv(path, &Theme::dimmed("excluded")));
                },
                OutputFormat::Pretty => println!("{}", Theme::kv(path, "synced")),
            }
        }
        return Ok(());
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&patterns)?),
        OutputFormat::Pretty => {
            println!(
                "{}",
                Theme::header(&format!("{} active exclusion patterns", patterns.len()))
            );
            println!("{}", Theme::separator());
            for pattern in &patterns {
                println!("  {pattern}");
            }
        },
    }
    Ok(())
}

fn check_patterns(patterns: &[String], format: OutputFormat) -> Result<()> {
    let mut invalid = 0usize;
    for pattern in patterns {
        let validation = validate_exclusion_pattern(pattern);
        if !validation.is_valid {
            invalid = invalid.saturating_add(1);
        }
        match format {
            OutputFormat::Json => println!(
                "{}",
                json!({
                    "pattern": pattern,
                    "valid": validation.is_valid,
                    "reason": validation.reason,
                })
            ),
            OutputFormat::Pretty => match &validation.reason {
                None => println!("{}", Theme::success(pattern)),
                Some(reason) => println!("{}", Theme::error(&format!("{pattern}: {reason}"))),
            },
        }
    }
    if invalid > 0 {
        bail!("{invalid} invalid pattern(s)");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_patterns_follow_config() {
        let mut config = Config::default();
        config.sync.exclude_patterns = vec!["*.tmp".into()];
        let base = active_patterns(&config, false);
        assert!(base.contains(&"node_modules".to_owned()));
        assert!(base.contains(&"*.tmp".to_owned()));

        let extended = active_patterns(&config, true);
        assert!(extended.len() > base.len());
    }

    #[test]
    fn test_check_fails_on_invalid_pattern() {
        assert!(check_patterns(&["dist".into()], OutputFormat::Json).is_ok());
        assert!(check_patterns(&["dist".into(), "a?b".into()], OutputFormat::Json).is_err());
    }
}
