//! Session state: the store handle, the active view mode, the completion
//! baseline, and the shared display snapshot the ticker reads.
//!
//! Replaces the original app's process-wide statics (task list, adapter,
//! mode flag) with one owned object passed explicitly. Startup ordering is
//! load-bearing: `open` purges past records and captures the completion
//! baseline before the first partition query runs, and the ticker only
//! ever gets a handle from an already-open session.

use std::sync::{Arc, Mutex};

use tracing::{debug, info, instrument};

use crate::datastore::{DataStore, Result};
use crate::filter::{self, ViewMode};
use crate::task::TaskRecord;

/// Shared handle to the materialized display list.
///
/// The request path replaces the inner `Arc` wholesale after every
/// mutation; the ticker clones it under the lock, so a reader always sees
/// a list that existed at one consistent instant, never a torn mix of
/// pre- and post-mutation rows.
pub type DisplayHandle = Arc<Mutex<Arc<Vec<String>>>>;

/// Percentage of today's baseline that has been completed, clamped to
/// `0..=100`. `None` when the baseline is zero: with no tasks scheduled at
/// session start the rate is undefined, and the renderer reports "no
/// tasks today" instead of a number.
#[must_use]
pub fn completion_percent(baseline: usize, remaining: usize) -> Option<u8> {
    if baseline == 0 {
        return None;
    }
    let done = baseline.saturating_sub(remaining);
    Some((done * 100 / baseline) as u8)
}

pub struct Session {
    store: Arc<Mutex<DataStore>>,
    today: String,
    mode: ViewMode,
    baseline: usize,
    display: DisplayHandle,
}

impl Session {
    /// Open a session over a store: purge past records, capture the
    /// completion baseline, then materialize the today partition.
    #[instrument(skip(store, today))]
    pub fn open(store: DataStore, today: impl Into<String>) -> Result<Self> {
        let today = today.into();

        let purged = store.purge_past(&today)?;
        let baseline = store.count_where(|d| filter::is_today(d, &today))?;
        info!(purged, baseline, %today, "session opened");

        let session = Self {
            store: Arc::new(Mutex::new(store)),
            today,
            mode: ViewMode::default(),
            baseline,
            display: Arc::new(Mutex::new(Arc::new(Vec::new()))),
        };
        session.refresh()?;
        Ok(session)
    }

    #[must_use]
    pub fn today(&self) -> &str {
        &self.today
    }

    #[must_use]
    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    /// Count of today-dated records at session open, plus any adds that
    /// targeted today since. The completion denominator.
    #[must_use]
    pub fn baseline(&self) -> usize {
        self.baseline
    }

    /// Handle the ticker reads display snapshots through.
    #[must_use]
    pub fn display_handle(&self) -> DisplayHandle {
        Arc::clone(&self.display)
    }

    /// Current display snapshot (the active partition's rendered rows).
    #[must_use]
    pub fn display_rows(&self) -> Arc<Vec<String>> {
        Arc::clone(&lock_unpoisoned(&self.display))
    }

    #[instrument(skip(self))]
    pub fn set_mode(&mut self, mode: ViewMode) -> Result<()> {
        if self.mode != mode {
            self.mode = mode;
            debug!(mode = mode.label(), "switched view mode");
        }
        self.refresh()
    }

    #[instrument(skip(self))]
    pub fn toggle_mode(&mut self) -> Result<ViewMode> {
        self.set_mode(self.mode.toggled())?;
        Ok(self.mode)
    }

    /// Add a task and re-materialize the active partition. An add dated
    /// today grows the completion baseline; the date is taken as given
    /// (normalization happens at the input boundary).
    #[instrument(skip(self))]
    pub fn add(&mut self, text: &str, date: &str) -> Result<()> {
        lock_unpoisoned(&self.store).add(text, date)?;
        if filter::is_today(date, &self.today) {
            self.baseline += 1;
        }
        self.refresh()
    }

    /// Remove a today task by text. Returns the number of records
    /// removed; 0 means nothing matched, which is not an error.
    #[instrument(skip(self))]
    pub fn remove_today(&mut self, text: &str) -> Result<usize> {
        let removed = lock_unpoisoned(&self.store).remove(text, &self.today)?;
        self.refresh()?;
        Ok(removed)
    }

    /// Remove a future task by its structured pair.
    #[instrument(skip(self))]
    pub fn remove_future(&mut self, text: &str, date: &str) -> Result<usize> {
        let removed = lock_unpoisoned(&self.store).remove(text, date)?;
        self.refresh()?;
        Ok(removed)
    }

    /// Remove whatever a raw display row of the active partition denotes.
    ///
    /// Today rows are plain text dated today. Future rows are inverted at
    /// the first separator occurrence; a future-mode string without a
    /// separator denotes nothing and removes nothing.
    #[instrument(skip(self))]
    pub fn remove_display_row(&mut self, raw: &str) -> Result<usize> {
        match self.mode {
            ViewMode::Today => self.remove_today(raw),
            ViewMode::Future => match filter::split_display_row(raw) {
                Some((text, date)) => {
                    let (text, date) = (text.to_string(), date.to_string());
                    self.remove_future(&text, &date)
                }
                None => {
                    debug!("future-mode row had no separator; nothing removed");
                    Ok(0)
                }
            },
        }
    }

    /// Rendered rows of the today partition, in insertion order.
    pub fn list_today(&self) -> Result<Vec<String>> {
        self.render_partition(ViewMode::Today)
    }

    /// Rendered rows of the future partition, in insertion order.
    pub fn list_future(&self) -> Result<Vec<String>> {
        self.render_partition(ViewMode::Future)
    }

    /// Completion rate for today, from a fresh store count rather than
    /// the display list, so it reflects store truth even when the display
    /// is stale.
    pub fn completion(&self) -> Result<Option<u8>> {
        let remaining =
            lock_unpoisoned(&self.store).count_where(|d| filter::is_today(d, &self.today))?;
        Ok(completion_percent(self.baseline, remaining))
    }

    fn render_partition(&self, mode: ViewMode) -> Result<Vec<String>> {
        let records = self.query_partition(mode)?;
        Ok(records.iter().map(|r| mode.render_row(r)).collect())
    }

    fn query_partition(&self, mode: ViewMode) -> Result<Vec<TaskRecord>> {
        lock_unpoisoned(&self.store).query_where(|d| mode.admits(d, &self.today))
    }

    /// Re-query the active partition and swap in a fresh display
    /// snapshot.
    fn refresh(&self) -> Result<()> {
        let rows = self.render_partition(self.mode)?;
        let mut display = lock_unpoisoned(&self.display);
        *display = Arc::new(rows);
        Ok(())
    }
}

/// The guarded values are plain data, so a poisoned lock is still usable.
fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
