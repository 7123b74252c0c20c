//! Status notifications and summary output
//!
//! Instances publish status changes on an unbounded channel; a reporter
//! task drains it and hands each change to a [`Reporter`]. Publishing is
//! fire-and-forget: a dropped notification never affects counters or
//! termination.

use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;

use dungeon_core::{InstanceId, InstanceStatus, Reporter, Result, StatusChange, Summary};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::registry::InstanceRegistry;

/// Sending side of the status channel, cloned into every instance
#[derive(Debug, Clone)]
pub struct StatusNotifier {
    tx: Option<mpsc::UnboundedSender<StatusChange>>,
}

impl StatusNotifier {
    pub fn new(tx: mpsc::UnboundedSender<StatusChange>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Notifier that drops every notification
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Publish that `instance` is now `status`, with a fresh snapshot
    pub fn notify(&self, registry: &InstanceRegistry, instance: InstanceId, status: InstanceStatus) {
        let Some(tx) = &self.tx else {
            return;
        };

        let snapshot = match registry.snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                debug!(instance = %instance, error = %e, "Skipping status notification");
                return;
            }
        };

        let change = StatusChange {
            instance,
            status,
            snapshot,
        };
        if tx.send(change).is_err() {
            trace!(instance = %instance, "Reporter gone, status notification dropped");
        }
    }
}

/// Spawn a task feeding status changes to `reporter`
///
/// The task ends once every notifier clone is dropped and hands the
/// reporter back for the final summary.
pub fn spawn_reporter<R: Reporter + 'static>(mut reporter: R) -> (StatusNotifier, JoinHandle<R>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<StatusChange>();

    let handle = tokio::spawn(async move {
        while let Some(change) = rx.recv().await {
            reporter.status_changed(&change);
        }
        reporter
    });

    (StatusNotifier::new(tx), handle)
}

/// Render a status change as the console status block
pub fn render_status(change: &StatusChange) -> String {
    let mut out = String::new();

    if change.status.is_active() {
        let _ = writeln!(out, "\nQueueing up players for Dungeon {}", change.instance.number());
    }
    let _ = writeln!(out, "\nCurrent Dungeons Status:");
    for (id, status) in &change.snapshot {
        let _ = writeln!(out, "Dungeon {}: {}", id.number(), status);
    }

    out
}

/// Render the per-instance summary and leftover players
pub fn render_summary(summary: &Summary) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "\nDungeon Instance Summary:");
    for instance in &summary.instances {
        let _ = writeln!(
            out,
            "Dungeon {} served {} parties, total time = {} seconds.",
            instance.id.number(),
            instance.parties_served,
            instance.total_time
        );
    }

    let _ = writeln!(out, "\nLeftover players:");
    let _ = writeln!(out, "Tanks: {}", summary.leftover.tanks);
    let _ = writeln!(out, "Healers: {}", summary.leftover.healers);
    let _ = writeln!(out, "DPS: {}", summary.leftover.dps);

    out
}

/// Human-readable reporter writing status blocks and the summary
pub struct ConsoleReporter<W: Write + Send> {
    out: W,
    show_status: bool,
}

impl ConsoleReporter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            show_status: true,
        }
    }

    /// Only print the final summary
    pub fn summary_only(mut self) -> Self {
        self.show_status = false;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, text: &str) {
        if let Err(e) = self.out.write_all(text.as_bytes()).and_then(|_| self.out.flush()) {
            warn!(error = %e, "Failed to write report");
        }
    }
}

impl<W: Write + Send> Reporter for ConsoleReporter<W> {
    fn status_changed(&mut self, change: &StatusChange) {
        // Terminations are summarized at the end
        if self.show_status && change.status != InstanceStatus::Terminated {
            self.emit(&render_status(change));
        }
    }

    fn summary(&mut self, summary: &Summary) {
        self.emit(&render_summary(summary));
    }
}

/// Write a summary as pretty JSON
pub fn write_summary_json(path: impl AsRef<Path>, summary: &Summary) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dungeon_core::{InstanceSummary, ResourceCounts};

    fn change(instance: usize, status: InstanceStatus) -> StatusChange {
        StatusChange {
            instance: InstanceId(instance),
            status,
            snapshot: vec![
                (InstanceId(0), InstanceStatus::Active),
                (InstanceId(1), InstanceStatus::Idle),
            ],
        }
    }

    fn summary() -> Summary {
        Summary {
            instances: vec![
                InstanceSummary { id: InstanceId(0), parties_served: 3, total_time: 9 },
                InstanceSummary { id: InstanceId(1), parties_served: 2, total_time: 4 },
            ],
            leftover: ResourceCounts::new(2, 0, 1),
            parties_formed: 5,
        }
    }

    #[test]
    fn test_render_status() {
        let text = render_status(&change(0, InstanceStatus::Active));
        assert_eq!(
            text,
            "\nQueueing up players for Dungeon 1\n\nCurrent Dungeons Status:\nDungeon 1: active\nDungeon 2: empty\n"
        );

        let text = render_status(&change(1, InstanceStatus::Idle));
        assert!(!text.contains("Queueing"));
    }

    #[test]
    fn test_render_summary() {
        let text = render_summary(&summary());
        assert!(text.contains("Dungeon 1 served 3 parties, total time = 9 seconds."));
        assert!(text.contains("Dungeon 2 served 2 parties, total time = 4 seconds."));
        assert!(text.ends_with("Tanks: 2\nHealers: 0\nDPS: 1\n"));
    }

    #[test]
    fn test_console_reporter_skips_terminations() {
        let mut reporter = ConsoleReporter::new(Vec::new());
        reporter.status_changed(&change(0, InstanceStatus::Terminated));
        assert!(reporter.into_inner().is_empty());

        let mut reporter = ConsoleReporter::new(Vec::new()).summary_only();
        reporter.status_changed(&change(0, InstanceStatus::Active));
        reporter.summary(&summary());
        let out = String::from_utf8(reporter.into_inner()).unwrap();
        assert!(out.starts_with("\nDungeon Instance Summary:"));
    }

    #[test]
    fn test_disabled_notifier_is_silent() {
        let registry = InstanceRegistry::new(1);
        StatusNotifier::disabled().notify(&registry, InstanceId(0), InstanceStatus::Idle);
    }

    #[tokio::test]
    async fn test_reporter_task_receives_changes() {
        let registry = InstanceRegistry::new(2);
        let (notifier, handle) = spawn_reporter(ConsoleReporter::new(Vec::new()));

        registry.set_active(InstanceId(1)).unwrap();
        notifier.notify(&registry, InstanceId(1), InstanceStatus::Active);
        drop(notifier);

        let reporter = handle.await.unwrap();
        let out = String::from_utf8(reporter.into_inner()).unwrap();
        assert!(out.contains("Dungeon 2: active"));
    }

    #[test]
    fn test_write_summary_json() {
        let path = std::env::temp_dir().join(format!("dungeon-summary-{}.json", std::process::id()));
        write_summary_json(&path, &summary()).unwrap();

        let parsed: Summary = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(parsed, summary());
    }
}
