use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use siphon::sync::SyncProgress;
use uuid::Uuid;

/// Width of the bar prefix column.
const PREFIX_WIDTH: usize = 18;

/// State for one source being synced.
struct SourceState {
    bar: ProgressBar,
    failed: usize,
}

/// Consolidated progress state to avoid multiple mutex locks.
#[derive(Default)]
struct ProgressState {
    /// One bar per source, keyed by source id.
    sources: HashMap<Uuid, SourceState>,
    /// Overall bar for multi-source runs.
    overall: Option<ProgressBar>,
}

/// Interactive progress reporter using indicatif.
///
/// Every source gets its own line; `sync-all` adds an overall bar on top.
pub struct InteractiveReporter {
    multi: MultiProgress,
    state: Mutex<ProgressState>,
}

impl InteractiveReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            state: Mutex::new(ProgressState::default()),
        }
    }

    fn prefix(name: &str) -> String {
        let short: String = if name.chars().count() > PREFIX_WIDTH {
            let mut cut: String = name.chars().take(PREFIX_WIDTH - 1).collect();
            cut.push('…');
            cut
        } else {
            name.to_string()
        };
        format!("{:width$}", short, width = PREFIX_WIDTH)
    }

    fn source_bar(&self, name: &str, max_results: Option<usize>) -> ProgressBar {
        let pb = match max_results {
            Some(limit) => {
                let bar = self.multi.add(ProgressBar::new(limit as u64));
                bar.set_style(Self::bar_style());
                bar
            }
            None => {
                let bar = self.multi.add(ProgressBar::new_spinner());
                bar.set_style(Self::counter_style());
                bar.enable_steady_tick(Duration::from_millis(100));
                bar
            }
        };
        pb.set_prefix(Self::prefix(name));
        pb
    }

    pub fn handle(&self, event: SyncProgress) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        match event {
            SyncProgress::SyncStarted {
                source_id,
                name,
                max_results,
            } => {
                let pb = self.source_bar(&name, max_results);
                pb.set_message("Fetching...");
                state
                    .sources
                    .insert(source_id, SourceState { bar: pb, failed: 0 });
            }

            SyncProgress::FetchedPayload {
                source_id,
                fetched_so_far,
            } => {
                if let Some(source) = state.sources.get(&source_id) {
                    source.bar.set_position(fetched_so_far as u64);
                    source.bar.set_message(match source.failed {
                        0 => "fetched".to_string(),
                        n => format!("fetched, {} failed", n),
                    });
                }
            }

            SyncProgress::ItemFailed {
                source_id,
                reference,
                error,
            } => {
                if let Some(source) = state.sources.get_mut(&source_id) {
                    source.failed += 1;
                    source
                        .bar
                        .set_message(format!("✗ {}: {}", reference, error));
                }
            }

            SyncProgress::Committing {
                source_id,
                inserts,
                updates,
            } => {
                if let Some(source) = state.sources.get(&source_id) {
                    source.bar.set_message(format!(
                        "Saving {} new, {} changed...",
                        inserts, updates
                    ));
                }
            }

            SyncProgress::Committed {
                source_id,
                inserted,
                updated,
                skipped,
                failed,
            } => {
                if let Some(source) = state.sources.get(&source_id) {
                    let msg = if failed > 0 {
                        format!(
                            "✓ {} new, {} updated, {} unchanged, {} failed",
                            inserted, updated, skipped, failed
                        )
                    } else {
                        format!(
                            "✓ {} new, {} updated, {} unchanged",
                            inserted, updated, skipped
                        )
                    };
                    source.bar.finish_with_message(msg);
                }
            }

            SyncProgress::SkippedInactive { source_id, name } => {
                let pb = self.multi.add(ProgressBar::new(1));
                pb.set_style(Self::done_style());
                pb.set_prefix(Self::prefix(&name));
                pb.finish_with_message("· inactive, skipped");
                state
                    .sources
                    .insert(source_id, SourceState { bar: pb, failed: 0 });
            }

            SyncProgress::SyncingSources { count, .. } => {
                let pb = self.multi.insert(0, ProgressBar::new(count as u64));
                pb.set_style(Self::bar_style());
                pb.set_prefix(Self::prefix("Sources"));
                pb.set_message("Syncing...");
                state.overall = Some(pb);
            }

            SyncProgress::SourceSynced { source_id, error } => {
                if let Some(message) = error
                    && let Some(source) = state.sources.get(&source_id)
                    && !source.bar.is_finished()
                {
                    source.bar.abandon_with_message(format!("✗ {}", message));
                }
                if let Some(ref pb) = state.overall {
                    pb.inc(1);
                }
            }

            SyncProgress::SyncSourcesComplete { successful, failed } => {
                if let Some(ref pb) = state.overall {
                    let msg = if failed > 0 {
                        format!("✓ {} sources done, {} failed", successful, failed)
                    } else {
                        format!("✓ {} sources done", successful)
                    };
                    pb.finish_with_message(msg);
                }
            }

            SyncProgress::Warning { message } => {
                // Release lock before printing to avoid holding it during I/O
                drop(state);
                self.multi
                    .println(format!("{} {}", style("⚠").yellow(), message))
                    .ok();
            }

            _ => {}
        }
    }

    /// Finish all progress bars.
    pub fn finish(&self) {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        for source in state.sources.values() {
            if !source.bar.is_finished() {
                source.bar.abandon();
            }
        }
        if let Some(ref pb) = state.overall
            && !pb.is_finished()
        {
            pb.abandon();
        }
    }

    fn counter_style() -> ProgressStyle {
        ProgressStyle::with_template("{prefix:.bold.cyan} {spinner:.green} {pos:>4} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "{prefix:.bold.cyan} [{bar:40.cyan/blue}] {pos:>3}/{len:3} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░")
    }

    fn done_style() -> ProgressStyle {
        ProgressStyle::with_template("{prefix:.bold.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
    }
}

impl Default for InteractiveReporter {
    fn default() -> Self {
        Self::new()
    }
}
