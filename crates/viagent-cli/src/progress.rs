//! Progress bar fed from the event bus.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use viagent_events::{EventReceiver, SyncEvent};

use crate::theme::Theme;

const BAR_TEMPLATE: &str = "  {spinner:.cyan} [{bar:30.cyan/dim}] {pos}/{len} {wide_msg:.dim}";

/// Renders sync events as a progress bar until finished.
pub(crate) struct ProgressView {
    done: CancellationToken,
    task: JoinHandle<()>,
}

impl ProgressView {
    /// Start rendering events from `receiver`. A hidden view still drains
    /// the receiver but draws nothing.
    pub(crate) fn spawn(receiver: EventReceiver, hidden: bool) -> Self {
        let bar = ProgressBar::new(0);
        if hidden {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        if let Ok(style) = ProgressStyle::with_template(BAR_TEMPLATE) {
            bar.set_style(style.progress_chars("━╸─").tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "));
        }

        let done = CancellationToken::new();
        let task = tokio::spawn(render(receiver, bar, done.clone()));
        Self { done, task }
    }

    /// Render whatever is still queued, then clear the bar.
    pub(crate) async fn finish(self) {
        self.done.cancel();
        let _ = self.task.await;
    }
}

async fn render(mut receiver: EventReceiver, bar: ProgressBar, done: CancellationToken) {
    loop {
        tokio::select! {
            biased;
            event = receiver.recv() => match event {
                Some(envelope) => apply(&bar, &envelope.event),
                None => break,
            },
            () = done.cancelled() => {
                while let Some(envelope) = receiver.try_recv() {
                    apply(&bar, &envelope.event);
                }
                break;
            },
        }
    }
    bar.finish_and_clear();
}

fn apply(bar: &ProgressBar, event: &SyncEvent) {
    match event {
        SyncEvent::Started { source_root, mode } => {
            bar.enable_steady_tick(Duration::from_millis(80));
            bar.set_message(format!("{mode} sync of {source_root}"));
        },
        SyncEvent::Progress(progress) => {
            bar.set_length(u64::try_from(progress.total_files).unwrap_or(u64::MAX));
            bar.inc(1);
            bar.set_message(progress.current_file.clone());
        },
        SyncEvent::Error {
            error,
            file: Some(file),
        } => {
            bar.inc(1);
            bar.println(Theme::warning(&format!("{file}: {error}")));
        },
        SyncEvent::Completed(_) => bar.finish_and_clear(),
        SyncEvent::Error { file: None, .. }
        | SyncEvent::FileModified { .. }
        | SyncEvent::FileDeleted { .. }
        | SyncEvent::StatusChanged { .. } => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use viagent_events::{EventBus, EventSink, SyncProgress};

    #[tokio::test]
    async fn test_view_drains_queued_events() {
        let bus = EventBus::new();
        let view = ProgressView::spawn(bus.subscribe(), true);
        bus.emit(SyncEvent::Progress(SyncProgress::new(2, 1, "a.ts")));
        bus.emit(SyncEvent::Error {
            error: "boom".into(),
            file: Some("b.ts".into()),
        });
        // Returns even though the bus is still alive.
        view.finish().await;
    }

    #[test]
    fn test_progress_advances_bar() {
        let bar = ProgressBar::hidden();
        apply(&bar, &SyncEvent::Progress(SyncProgress::new(3, 1, "a.ts")));
        apply(
            &bar,
            &SyncEvent::Error {
                error: "boom".into(),
                file: Some("b.ts".into()),
            },
        );
        assert_eq!(bar.length(), Some(3));
        assert_eq!(bar.position(), 2);
    }
}
