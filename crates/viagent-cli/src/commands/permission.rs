//! `viagent permission`: inspect access to a local directory.

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde_json::json;
use viagent_config::Config;
use viagent_sync::{
    get_permission_state, is_persistent_permission_supported, save_directory_handle_reference,
};
use viagent_vfs::{DirectoryHandle, HostDirHandle, PermissionMode};

use crate::OutputFormat;
use crate::commands::open_state_store;
use crate::theme::Theme;

/// Print the read and read-write permission state of `dir`, optionally
/// saving its reference under a project id.
pub(crate) async fn show_permission(
    dir: &Path,
    remember: Option<&str>,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let handle = HostDirHandle::open(dir)
        .await
        .with_context(|| format!("cannot open {}", dir.display()))?;

    let read = get_permission_state(&handle, PermissionMode::Read).await;
    let read_write = get_permission_state(&handle, PermissionMode::ReadWrite).await;
    let persistent = is_persistent_permission_supported(&handle).await;

    if let Some(project) = remember {
        let store = open_state_store(config).await?;
        if !save_directory_handle_reference(&store, &handle, Some(project)).await {
            bail!("could not save directory reference for '{project}'");
        }
    }

    match format {
        OutputFormat::Json => println!(
            "{}",
            json!({
                "directory": handle.path().display().to_string(),
                "read": read,
                "read_write": read_write,
                "persistent": persistent,
                "saved": remember.is_some(),
            })
        ),
        OutputFormat::Pretty => {
            println!("{}", Theme::header(handle.name()));
            println!("{}", Theme::kv("Path", &handle.path().display().to_string()));
            println!("{}", Theme::kv("Read", &Theme::permission(read)));
            println!("{}", Theme::kv("Read-write", &Theme::permission(read_write)));
            println!(
                "{}",
                Theme::kv("Persistent", if persistent { "yes" } else { "no" })
            );
            if let Some(project) = remember {
                println!(
                    "{}",
                    Theme::info(&format!("Saved as the directory of project '{project}'"))
                );
            }
        },
    }
    Ok(())
}
