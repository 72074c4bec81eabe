//! `viagent sync`: one pass from a local directory into a target directory.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::{debug, info};
use viagent_config::Config;
use viagent_events::{EventBus, EventSink, SyncMode, SyncResult};
use viagent_sync::{
    LocalFsAdapter, SyncAttempt, SyncError, SyncManager, SyncOptions, SyncOutcome,
    WorkspaceSession, validate_patterns,
};
use viagent_vfs::{ContainerContext, ContainerFs, HostDirHandle, HostFs};

use crate::OutputFormat;
use crate::commands::open_state_store;
use crate::progress::ProgressView;
use crate::theme::Theme;

/// Arguments of `viagent sync`.
pub(crate) struct SyncArgs {
    pub(crate) source: PathBuf,
    pub(crate) target: PathBuf,
    pub(crate) full: bool,
    pub(crate) exclude: Vec<String>,
    pub(crate) extended: bool,
    pub(crate) concurrency: Option<usize>,
    pub(crate) project: Option<String>,
}

/// Build engine options from config and command-line overrides.
pub(crate) fn resolve_options(args: &SyncArgs, config: &Config) -> Result<SyncOptions> {
    let mut options = SyncOptions::from_section(&config.sync)?;
    validate_patterns(&args.exclude)?;
    options.exclude_patterns.extend(args.exclude.iter().cloned());
    options.include_extended_defaults |= args.extended;
    if args.full {
        options.mode = SyncMode::Full;
    }
    if let Some(n) = args.concurrency {
        options.concurrency = n.max(1);
    }
    Ok(options)
}

/// Run one pass. Fails only on structural errors; per-file failures are
/// reported and leave the exit status at zero.
pub(crate) async fn run_sync(args: SyncArgs, config: &Config, format: OutputFormat) -> Result<()> {
    let options = resolve_options(&args, config)?;
    debug!(
        source = %args.source.display(),
        target = %args.target.display(),
        mode = %options.mode,
        concurrency = options.concurrency,
        "starting sync"
    );

    let source = HostDirHandle::open(&args.source)
        .await
        .with_context(|| format!("cannot open {}", args.source.display()))?;
    let target: Arc<dyn ContainerFs> = Arc::new(
        HostFs::create(&args.target)
            .await
            .with_context(|| format!("cannot use {} as container", args.target.display()))?,
    );

    let bus = Arc::new(EventBus::new().with_source("viagent-cli"));
    let view = ProgressView::spawn(bus.subscribe(), format == OutputFormat::Json);
    let sink = Arc::clone(&bus) as Arc<dyn EventSink>;

    let outcome = if let Some(project) = &args.project {
        let store = open_state_store(config).await?;
        let session =
            WorkspaceSession::open(project, source_name(&args), store, sink, options).await?;
        session.attach_directory(Arc::new(source)).await?;
        session.container().boot(target);
        cancel_on_interrupt(session.manager(), session.sync()).await
    } else {
        let container = Arc::new(ContainerContext::booted(target));
        let adapter = Arc::new(LocalFsAdapter::with_binary_extensions(
            &options.binary_extensions,
        ));
        adapter.set_directory_handle(Arc::new(source));
        let manager = SyncManager::new(container, adapter, sink, &options);
        cancel_on_interrupt(&manager, manager.sync_to_container(None)).await
    };
    view.finish().await;

    match outcome {
        Ok(SyncAttempt::Completed(result)) => {
            info!(
                synced = result.synced_files,
                failed = result.failed_files.len(),
                "sync finished"
            );
            print_summary(&result, format)
        },
        Ok(SyncAttempt::AlreadyRunning) => bail!("a sync is already running"),
        Err(SyncError::Cancelled { synced }) => {
            eprintln!(
                "{}",
                Theme::warning(&format!("Sync cancelled after {synced} items"))
            );
            bail!("sync cancelled")
        },
        Err(e) => {
            eprintln!("{}", Theme::error(&format!("[{}] {e}", e.code())));
            Err(e.into())
        },
    }
}

fn source_name(args: &SyncArgs) -> &str {
    args.source
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("project")
}

/// Drive `pass`, asking `manager` to cancel on Ctrl-C.
async fn cancel_on_interrupt(
    manager: &SyncManager,
    pass: impl Future<Output = SyncOutcome<SyncAttempt>>,
) -> SyncOutcome<SyncAttempt> {
    tokio::pin!(pass);
    tokio::select! {
        outcome = &mut pass => outcome,
        interrupted = tokio::signal::ctrl_c() => {
            if interrupted.is_ok() {
                manager.cancel();
            }
            pass.await
        },
    }
}

fn print_summary(result: &SyncResult, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    println!(
        "{}",
        Theme::success(&format!(
            "Synced {} items in {:.2?}",
            result.synced_files, result.duration
        ))
    );
    if result.has_failures() {
        println!(
            "{}",
            Theme::warning(&format!("{} items failed:", result.failed_files.len()))
        );
        for path in &result.failed_files {
            println!("  {}", Theme::dimmed(path));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> SyncArgs {
        SyncArgs {
            source: PathBuf::from("/tmp/my-app"),
            target: PathBuf::from("/tmp/container"),
            full: false,
            exclude: Vec::new(),
            extended: false,
            concurrency: None,
            project: None,
        }
    }

    #[test]
    fn test_flags_override_config() {
        let mut a = args();
        a.full = true;
        a.extended = true;
        a.concurrency = Some(0);
        a.exclude = vec!["*.tmp".into()];

        let options = resolve_options(&a, &Config::default()).unwrap();
        assert_eq!(options.mode, SyncMode::Full);
        assert!(options.include_extended_defaults);
        assert_eq!(options.concurrency, 1);
        assert!(options.exclude_patterns.contains(&"*.tmp".to_owned()));
    }

    #[test]
    fn test_invalid_exclude_rejected() {
        let mut a = args();
        a.exclude = vec!["bad|pattern".into()];
        assert!(resolve_options(&a, &Config::default()).is_err());
    }

    #[test]
    fn test_source_name() {
        assert_eq!(source_name(&args()), "my-app");
    }

    #[tokio::test]
    async fn test_sync_between_directories() {
        let source = tempfile::tempdir().unwrap();
        let target = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(source.path().join("src")).unwrap();
        std::fs::write(source.path().join("src/main.ts"), "main").unwrap();
        std::fs::create_dir_all(source.path().join("node_modules/x")).unwrap();
        std::fs::write(source.path().join("node_modules/x/i.js"), "x").unwrap();

        let mut a = args();
        a.source = source.path().to_path_buf();
        a.target = target.path().to_path_buf();
        run_sync(a, &Config::default(), OutputFormat::Json)
            .await
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(target.path().join("src/main.ts")).unwrap(),
            "main"
        );
        assert!(!target.path().join("node_modules").exists());
    }
}
