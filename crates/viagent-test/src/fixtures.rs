//! Test fixtures for common project trees.

use std::path::Path;
use std::sync::Arc;

use viagent_vfs::{ContainerContext, ContainerFs};

use crate::mocks::{MemoryDirHandle, RecordingContainerFs};

/// Files of a small web project: `(path, content)`.
///
/// Includes entries the default exclusions drop (`node_modules`, `.git`,
/// `*.log`) and one binary file.
pub const SAMPLE_PROJECT_FILES: &[(&str, &[u8])] = &[
    ("package.json", b"{\"name\":\"sample\"}"),
    ("src/main.ts", b"import { App } from './components/App';"),
    ("src/components/App.tsx", b"export const App = () => null;"),
    ("public/logo.png", &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]),
    ("node_modules/react/index.js", b"module.exports = {};"),
    (".git/HEAD", b"ref: refs/heads/main"),
    ("debug.log", b"trace"),
];

/// Paths of [`SAMPLE_PROJECT_FILES`] that survive the default exclusions.
pub const SAMPLE_PROJECT_SYNCED_FILES: &[&str] = &[
    "package.json",
    "public/logo.png",
    "src/components/App.tsx",
    "src/main.ts",
];

/// In-memory copy of the sample project.
#[must_use]
pub fn sample_project() -> MemoryDirHandle {
    SAMPLE_PROJECT_FILES
        .iter()
        .fold(MemoryDirHandle::new("sample"), |dir, (path, content)| {
            dir.with_file(path, content.to_vec())
        })
}

/// Write the sample project under `root` on disk.
///
/// # Errors
///
/// Returns the first IO error.
pub fn write_sample_project(root: &Path) -> std::io::Result<()> {
    for (path, content) in SAMPLE_PROJECT_FILES {
        let target = root.join(path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(target, content)?;
    }
    Ok(())
}

/// A booted container over a fresh [`RecordingContainerFs`].
#[must_use]
pub fn booted_container() -> (Arc<ContainerContext>, Arc<RecordingContainerFs>) {
    let fs = Arc::new(RecordingContainerFs::new());
    let ctx = Arc::new(ContainerContext::booted(
        Arc::clone(&fs) as Arc<dyn ContainerFs>
    ));
    (ctx, fs)
}

/// Route `tracing` output to the test harness. Safe to call repeatedly.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
