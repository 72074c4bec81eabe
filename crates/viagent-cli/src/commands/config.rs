//! `viagent config`: print the resolved configuration.

use anyhow::{Result, anyhow};
use viagent_config::{ResolvedConfig, ShowFormat};

use crate::OutputFormat;
use crate::theme::Theme;

/// Print the merged configuration with its source annotations.
pub(crate) fn show_config(
    resolved: &ResolvedConfig,
    section: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let show_format = match format {
        OutputFormat::Json => ShowFormat::Json,
        OutputFormat::Pretty => ShowFormat::Toml,
    };
    let rendered = resolved.show(show_format, section).map_err(|_| match section {
        Some(name) => anyhow!("unknown config section '{name}'"),
        None => anyhow!("failed to render configuration"),
    })?;

    if format == OutputFormat::Pretty {
        println!("{}", Theme::header("Via-gent configuration"));
        if resolved.loaded_files.is_empty() {
            println!("{}", Theme::dimmed("No config files found, showing defaults"));
        }
        println!("{}", Theme::separator());
    }
    println!("{rendered}");
    Ok(())
}
