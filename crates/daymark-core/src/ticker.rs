//! Background clock and reminder ticker.
//!
//! A worker thread wakes once per period, always publishes a clock event,
//! and every `reminder_every` ticks reminds the user of the first row of
//! the active display snapshot (if any). It never touches the datastore;
//! the display handle is its only shared input.
//!
//! Lifecycle: `Idle → Running → Stopping → Stopped`. The stop signal is an
//! mpsc send the worker observes at its next wake (bounded latency of one
//! period); `stop` waits a bounded time for the worker to exit and is
//! idempotent, including on a ticker that was never started.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::bail;
use chrono::Local;
use tracing::{debug, info, instrument, warn};

use crate::datetime;
use crate::session::DisplayHandle;

/// One logical second between ticks.
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(1000);

/// Ticks between reminders: one hour at the default period.
pub const DEFAULT_REMINDER_EVERY: u64 = 3600;

/// How long `stop` waits for the worker to acknowledge before detaching.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickerEvent {
    /// Formatted current wall-clock time, published every tick.
    Clock(String),
    /// First row of the active display snapshot, published on the
    /// reminder cadence while the snapshot is non-empty.
    Reminder(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickerState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

pub struct ReminderTicker {
    display: DisplayHandle,
    period: Duration,
    reminder_every: u64,
    state: TickerState,
    stop_tx: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
    done_rx: Option<Receiver<()>>,
}

impl ReminderTicker {
    #[must_use]
    pub fn new(display: DisplayHandle) -> Self {
        Self::with_timing(display, DEFAULT_PERIOD, DEFAULT_REMINDER_EVERY)
    }

    /// Ticker with an explicit period and reminder cadence; the cadence
    /// floor is one tick.
    #[must_use]
    pub fn with_timing(display: DisplayHandle, period: Duration, reminder_every: u64) -> Self {
        Self {
            display,
            period,
            reminder_every: reminder_every.max(1),
            state: TickerState::Idle,
            stop_tx: None,
            worker: None,
            done_rx: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> TickerState {
        self.state
    }

    /// Spawn the worker and return the event stream. Only valid once,
    /// from `Idle`.
    #[instrument(skip(self))]
    pub fn start(&mut self) -> anyhow::Result<Receiver<TickerEvent>> {
        if self.state != TickerState::Idle {
            bail!("ticker cannot start from state {:?}", self.state);
        }

        let (event_tx, event_rx) = mpsc::channel();
        let (stop_tx, stop_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();

        let display = Arc::clone(&self.display);
        let period = self.period;
        let reminder_every = self.reminder_every;

        let worker = thread::Builder::new()
            .name("daymark-ticker".to_string())
            .spawn(move || run_loop(&display, &event_tx, &stop_rx, period, reminder_every, done_tx))?;

        self.stop_tx = Some(stop_tx);
        self.worker = Some(worker);
        self.done_rx = Some(done_rx);
        self.state = TickerState::Running;
        info!(period_ms = period.as_millis() as u64, reminder_every, "ticker started");
        Ok(event_rx)
    }

    /// Request cancellation and wait up to `timeout` for the worker to
    /// exit. Returns whether the exit was observed; either way the ticker
    /// is `Stopped` afterwards and further calls are no-ops.
    #[instrument(skip(self))]
    pub fn stop(&mut self, timeout: Duration) -> bool {
        match self.state {
            TickerState::Idle => {
                self.state = TickerState::Stopped;
                return true;
            }
            TickerState::Stopped => return true,
            TickerState::Running | TickerState::Stopping => {}
        }

        self.state = TickerState::Stopping;
        if let Some(stop_tx) = self.stop_tx.take() {
            // A send failure means the worker is already gone.
            let _ = stop_tx.send(());
        }

        // The worker drops its end of the done channel on exit, so a
        // disconnect within the timeout is the acknowledgement.
        let acknowledged = match self.done_rx.take() {
            Some(done_rx) => matches!(
                done_rx.recv_timeout(timeout),
                Err(RecvTimeoutError::Disconnected)
            ),
            None => true,
        };

        if let Some(worker) = self.worker.take() {
            if acknowledged {
                let _ = worker.join();
            } else {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "ticker did not acknowledge stop in time; detaching worker"
                );
            }
        }

        self.state = TickerState::Stopped;
        info!(acknowledged, "ticker stopped");
        acknowledged
    }
}

fn run_loop(
    display: &DisplayHandle,
    events: &Sender<TickerEvent>,
    stop_rx: &Receiver<()>,
    period: Duration,
    reminder_every: u64,
    _done_tx: Sender<()>,
) {
    let mut ticks: u64 = 0;

    loop {
        if tick(display, events, &mut ticks, reminder_every).is_err() {
            // Receiver gone; nobody is listening anymore.
            debug!("ticker event channel closed; exiting");
            break;
        }

        match stop_rx.recv_timeout(period) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                debug!("ticker observed stop signal");
                break;
            }
        }
    }
}

/// One tick: publish the clock, then a reminder when the counter hits the
/// cadence and the snapshot has a first row (the counter resets only when
/// a reminder actually fires).
fn tick(
    display: &DisplayHandle,
    events: &Sender<TickerEvent>,
    ticks: &mut u64,
    reminder_every: u64,
) -> Result<(), mpsc::SendError<TickerEvent>> {
    events.send(TickerEvent::Clock(datetime::format_clock(Local::now())))?;

    if *ticks % reminder_every == 0 {
        let snapshot = {
            let guard = display
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            Arc::clone(&guard)
        };
        if let Some(first) = snapshot.first() {
            events.send(TickerEvent::Reminder(first.clone()))?;
            *ticks = 0;
        }
    }

    *ticks += 1;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Instant;

    use super::*;

    const TEST_PERIOD: Duration = Duration::from_millis(10);
    const TEST_TIMEOUT: Duration = Duration::from_secs(2);

    fn display_of(rows: &[&str]) -> DisplayHandle {
        Arc::new(Mutex::new(Arc::new(
            rows.iter().map(ToString::to_string).collect(),
        )))
    }

    fn drain_until_reminder(rx: &Receiver<TickerEvent>) -> Option<String> {
        let deadline = Instant::now() + TEST_TIMEOUT;
        while Instant::now() < deadline {
            match rx.recv_timeout(TEST_TIMEOUT) {
                Ok(TickerEvent::Reminder(text)) => return Some(text),
                Ok(TickerEvent::Clock(_)) => continue,
                Err(_) => break,
            }
        }
        None
    }

    #[test]
    fn publishes_clock_events_every_period() {
        let mut ticker = ReminderTicker::with_timing(display_of(&[]), TEST_PERIOD, 3600);
        let rx = ticker.start().expect("start");

        for _ in 0..3 {
            let event = rx.recv_timeout(TEST_TIMEOUT).expect("clock event");
            assert!(matches!(event, TickerEvent::Clock(_)));
        }

        assert!(ticker.stop(TEST_TIMEOUT));
    }

    #[test]
    fn reminds_of_the_first_display_row() {
        let mut ticker =
            ReminderTicker::with_timing(display_of(&["buy milk", "water plants"]), TEST_PERIOD, 1);
        let rx = ticker.start().expect("start");

        assert_eq!(drain_until_reminder(&rx).as_deref(), Some("buy milk"));
        assert!(ticker.stop(TEST_TIMEOUT));
    }

    #[test]
    fn empty_display_suppresses_reminders() {
        let mut ticker = ReminderTicker::with_timing(display_of(&[]), TEST_PERIOD, 1);
        let rx = ticker.start().expect("start");

        let deadline = Instant::now() + Duration::from_millis(100);
        while Instant::now() < deadline {
            if let Ok(event) = rx.recv_timeout(TEST_PERIOD) {
                assert!(matches!(event, TickerEvent::Clock(_)));
            }
        }

        assert!(ticker.stop(TEST_TIMEOUT));
    }

    #[test]
    fn reminder_follows_a_snapshot_swap() {
        let display = display_of(&["old row"]);
        let mut ticker = ReminderTicker::with_timing(Arc::clone(&display), TEST_PERIOD, 1);
        let rx = ticker.start().expect("start");

        assert_eq!(drain_until_reminder(&rx).as_deref(), Some("old row"));

        {
            let mut guard = display.lock().expect("lock");
            *guard = Arc::new(vec!["new row".to_string()]);
        }

        let deadline = Instant::now() + TEST_TIMEOUT;
        let mut saw_new = false;
        while Instant::now() < deadline && !saw_new {
            if let Some(text) = drain_until_reminder(&rx) {
                saw_new = text == "new row";
            } else {
                break;
            }
        }
        assert!(saw_new, "reminder should pick up the swapped snapshot");

        assert!(ticker.stop(TEST_TIMEOUT));
    }

    #[test]
    fn stops_within_the_timeout_and_emits_nothing_after() {
        let mut ticker = ReminderTicker::with_timing(display_of(&["task"]), TEST_PERIOD, 3600);
        let rx = ticker.start().expect("start");
        assert_eq!(ticker.state(), TickerState::Running);

        assert!(ticker.stop(TEST_TIMEOUT), "worker must acknowledge the stop");
        assert_eq!(ticker.state(), TickerState::Stopped);

        // Drain whatever was in flight before the acknowledgement; the
        // channel must then be closed with nothing further arriving.
        while rx.try_recv().is_ok() {}
        assert!(matches!(
            rx.recv_timeout(TEST_PERIOD * 4),
            Err(RecvTimeoutError::Disconnected)
        ));
    }

    #[test]
    fn stop_is_idempotent() {
        let mut ticker = ReminderTicker::with_timing(display_of(&[]), TEST_PERIOD, 3600);
        let _rx = ticker.start().expect("start");

        assert!(ticker.stop(TEST_TIMEOUT));
        assert!(ticker.stop(TEST_TIMEOUT));
        assert_eq!(ticker.state(), TickerState::Stopped);
    }

    #[test]
    fn stop_before_start_is_safe() {
        let mut ticker = ReminderTicker::new(display_of(&[]));
        assert_eq!(ticker.state(), TickerState::Idle);

        assert!(ticker.stop(TEST_TIMEOUT));
        assert_eq!(ticker.state(), TickerState::Stopped);
    }

    #[test]
    fn start_twice_is_an_error() {
        let mut ticker = ReminderTicker::with_timing(display_of(&[]), TEST_PERIOD, 3600);
        let _rx = ticker.start().expect("start");

        assert!(ticker.start().is_err());
        assert!(ticker.stop(TEST_TIMEOUT));
    }
}
