//! Progress reporting and display
//!
//! Batch controllers report through [`BatchObserver`] so the upload logic
//! stays decoupled from how progress is shown.

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
    time::Instant,
};

use crate::{batch::placeholder::PlaceholderListItem, notice::Notice};

/// Observer of batch lifecycle events. Implement this for display backends.
pub trait BatchObserver: Send + Sync {
    /// A placeholder was inserted for a new batch or flat file.
    fn on_batch_start(&self, item: &PlaceholderListItem);

    /// The aggregate percent shown for a placeholder changed.
    fn on_batch_progress(&self, id: &str, percent: u8);

    /// The placeholder was settled and replaced by the real listing.
    fn on_batch_complete(&self, id: &str);

    /// The batch failed and its placeholder was removed.
    fn on_batch_error(&self, id: &str, notice: &Notice);

    /// A single file inside a batch failed.
    fn on_entry_failed(&self, path: &str, message: &str);

    /// A user-facing notification not tied to one placeholder.
    fn notify(&self, notice: &Notice);

    /// Finish and clean up the display.
    fn finish(&self);
}

/// A no-op observer for when progress display is disabled.
pub struct NullObserver;

impl BatchObserver for NullObserver {
    fn on_batch_start(&self, _item: &PlaceholderListItem) {}
    fn on_batch_progress(&self, _id: &str, _percent: u8) {}
    fn on_batch_complete(&self, _id: &str) {}
    fn on_batch_error(&self, _id: &str, _notice: &Notice) {}
    fn on_entry_failed(&self, _path: &str, _message: &str) {}
    fn notify(&self, _notice: &Notice) {}
    fn finish(&self) {}
}

/// Statistics collected while batches run.
#[derive(Debug)]
struct Stats {
    batches: usize,
    completed: usize,
    failed: usize,
    failed_entries: usize,
    bytes: u64,
    start_time: Instant,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            batches: 0,
            completed: 0,
            failed: 0,
            failed_entries: 0,
            bytes: 0,
            start_time: Instant::now(),
        }
    }
}

impl Stats {
    fn print_summary(&self) {
        let duration = self.start_time.elapsed();

        eprintln!();
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!("📊 Summary");
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        eprintln!("   📦 Batches:    {} total", self.batches);
        eprintln!("   ✅ Completed:  {}", self.completed);
        if self.failed > 0 {
            eprintln!("   ❌ Failed:     {}", self.failed);
        }
        if self.failed_entries > 0 {
            eprintln!("   ⚠️  Files lost: {}", self.failed_entries);
        }
        eprintln!("   ☁️  Bytes:      {}", self.bytes);
        eprintln!("   ⏱️  Duration:   {:.2}s", duration.as_secs_f64());
        eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }
}

/// Prints to stderr line by line (for non-TTY).
#[derive(Default)]
pub struct SimpleObserver {
    names: RwLock<HashMap<String, String>>,
    stats: RwLock<Stats>,
}

impl SimpleObserver {
    pub fn new() -> Self {
        Self::default()
    }

    fn name_of(&self, id: &str) -> String {
        self.names
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .unwrap_or_else(|| id.to_owned())
    }
}

impl BatchObserver for SimpleObserver {
    fn on_batch_start(&self, item: &PlaceholderListItem) {
        self.names
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(item.id.clone(), item.name.clone());
        let mut stats = self.stats.write().unwrap_or_else(PoisonError::into_inner);
        stats.batches += 1;
        stats.bytes += item.size;
        eprintln!("☁️  {} ({} bytes)", item.name, item.size);
    }

    // Percent changes are too chatty for a log stream.
    fn on_batch_progress(&self, _id: &str, _percent: u8) {}

    fn on_batch_complete(&self, id: &str) {
        self.stats.write().unwrap_or_else(PoisonError::into_inner).completed += 1;
        eprintln!("   ✓ {}", self.name_of(id));
    }

    fn on_batch_error(&self, id: &str, notice: &Notice) {
        self.stats.write().unwrap_or_else(PoisonError::into_inner).failed += 1;
        eprintln!("   ✗ {}: {notice}", self.name_of(id));
    }

    fn on_entry_failed(&self, path: &str, message: &str) {
        self.stats.write().unwrap_or_else(PoisonError::into_inner).failed_entries += 1;
        eprintln!("   ✗ {path}: {message}");
    }

    fn notify(&self, notice: &Notice) {
        if notice.is_error() {
            eprintln!("❌ {notice}");
        } else {
            eprintln!("ℹ️  {notice}");
        }
    }

    fn finish(&self) {
        self.stats.read().unwrap_or_else(PoisonError::into_inner).print_summary();
    }
}

/// Interactive observer with one progress bar per placeholder (for TTY).
pub struct FancyObserver {
    multi: indicatif::MultiProgress,
    bars: RwLock<HashMap<String, indicatif::ProgressBar>>,
    stats: RwLock<Stats>,
}

impl FancyObserver {
    pub fn new() -> Self {
        Self {
            multi: indicatif::MultiProgress::new(),
            bars: RwLock::new(HashMap::new()),
            stats: RwLock::new(Stats::default()),
        }
    }

    fn take_bar(&self, id: &str) -> Option<indicatif::ProgressBar> {
        self.bars.write().unwrap_or_else(PoisonError::into_inner).remove(id)
    }
}

impl Default for FancyObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchObserver for FancyObserver {
    fn on_batch_start(&self, item: &PlaceholderListItem) {
        let bar = self.multi.add(indicatif::ProgressBar::new(100));
        bar.set_style(
            indicatif::ProgressStyle::default_bar()
                .template("   {bar:40.cyan/blue} {pos:>3}% {msg}")
                .unwrap()
                .progress_chars("█▓▒░  "),
        );
        bar.set_message(item.name.clone());
        self.bars.write().unwrap_or_else(PoisonError::into_inner).insert(item.id.clone(), bar);

        let mut stats = self.stats.write().unwrap_or_else(PoisonError::into_inner);
        stats.batches += 1;
        stats.bytes += item.size;
    }

    fn on_batch_progress(&self, id: &str, percent: u8) {
        if let Some(bar) = self.bars.read().unwrap_or_else(PoisonError::into_inner).get(id) {
            bar.set_position(percent as u64);
        }
    }

    fn on_batch_complete(&self, id: &str) {
        if let Some(bar) = self.take_bar(id) {
            bar.finish_and_clear();
        }
        self.stats.write().unwrap_or_else(PoisonError::into_inner).completed += 1;
    }

    fn on_batch_error(&self, id: &str, notice: &Notice) {
        if let Some(bar) = self.take_bar(id) {
            bar.abandon_with_message(format!("❌ {notice}"));
        }
        self.stats.write().unwrap_or_else(PoisonError::into_inner).failed += 1;
    }

    fn on_entry_failed(&self, path: &str, message: &str) {
        self.stats.write().unwrap_or_else(PoisonError::into_inner).failed_entries += 1;
        self.multi.println(format!("⚠️  {path}: {message}")).ok();
    }

    fn notify(&self, notice: &Notice) {
        let emoji = if notice.is_error() { "❌" } else { "ℹ️ " };
        self.multi.println(format!("{emoji} {notice}")).ok();
    }

    fn finish(&self) {
        for (_, bar) in self.bars.write().unwrap_or_else(PoisonError::into_inner).drain() {
            bar.finish_and_clear();
        }
        self.stats.read().unwrap_or_else(PoisonError::into_inner).print_summary();
    }
}

/// Create an appropriate observer based on terminal capabilities.
pub fn create_observer() -> Arc<dyn BatchObserver> {
    if console::Term::stderr().is_term() {
        Arc::new(FancyObserver::new())
    } else {
        Arc::new(SimpleObserver::new())
    }
}
