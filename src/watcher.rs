//! Change watching: host events in, scheduled work out.
//!
//! The watcher decides *when* the engine should do something. It owns the
//! lifecycle state and every deadline; it never touches the host document.

use crate::host::NodeId;
use crate::schedule::{Debouncer, TimerQueue};
use rowpin_config::Timings;
use rowpin_protocol::CoreRequest;
use std::time::{Duration, Instant};

/// Something that happened on the host side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// The host changed its subtree.
    Mutation,
    /// Fallback timer.
    Tick,
    VisibilityChanged { visible: bool },
    /// In-app navigation; only a change of `url` counts.
    Navigated { url: String },
    /// The user activated (clicked) `node`.
    Activated { node: NodeId },
    /// A request from the popup surface.
    Message(CoreRequest),
}

/// Where the engine is in its startup sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    /// Polling the readiness selectors.
    #[default]
    WaitingForHost,
    /// Store loaded and passes running.
    Active,
}

/// Work the engine should do now.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Wake {
    ReadinessPoll,
    /// Scan, resolve and reconcile every visible row.
    Pass,
    Reorder,
    /// The navigation pulse on `id` is over.
    PulseEnd(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Timer {
    ReadinessPoll,
    PulseEnd(String),
}

#[derive(Debug, Clone)]
pub struct ChangeWatcher {
    timings: Timings,
    lifecycle: Lifecycle,
    pass: Debouncer,
    reorder: Debouncer,
    timers: TimerQueue<Timer>,
    last_url: Option<String>,
}

impl ChangeWatcher {
    pub fn new(timings: Timings) -> Self {
        Self {
            pass: Debouncer::new(timings.mutation_debounce()),
            reorder: Debouncer::new(timings.reorder_debounce()),
            timings,
            lifecycle: Lifecycle::WaitingForHost,
            timers: TimerQueue::new(),
            last_url: None,
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    /// Begin waiting for the host; the first readiness check is due at once.
    pub fn start(&mut self, now: Instant) {
        self.lifecycle = Lifecycle::WaitingForHost;
        self.timers.schedule(Timer::ReadinessPoll, now);
    }

    /// The host is not ready yet; check again after the poll interval.
    pub fn poll_again(&mut self, now: Instant) {
        self.timers
            .schedule_in(Timer::ReadinessPoll, now, self.timings.readiness_poll());
    }

    /// The host is ready: go active and schedule the initial pass. `location`
    /// is the baseline later navigation events are compared against.
    pub fn activate(&mut self, now: Instant, location: Option<&str>) {
        self.lifecycle = Lifecycle::Active;
        self.last_url = location.map(str::to_string);
        self.timers.cancel(&Timer::ReadinessPoll);
        self.pass
            .trigger_after(now, self.timings.initial_pass_delay());
    }

    /// Record a host event that may call for a pass. `has_pins` gates the
    /// triggers that are only worth a pass when something is pinned.
    pub fn observe(&mut self, event: &HostEvent, now: Instant, has_pins: bool) {
        if self.lifecycle != Lifecycle::Active {
            return;
        }
        match event {
            HostEvent::Mutation => self.pass.trigger(now),
            HostEvent::Tick if has_pins => self.request_pass(now, Duration::ZERO),
            HostEvent::VisibilityChanged { visible: true } if has_pins => {
                self.request_pass(now, self.timings.visibility_delay())
            }
            HostEvent::Navigated { url } => {
                // Without a baseline the first location seen becomes it
                let Some(previous) = self.last_url.replace(url.clone()) else {
                    return;
                };
                if previous != *url && has_pins {
                    self.request_pass(now, self.timings.navigation_delay());
                }
            }
            _ => {}
        }
    }

    /// Arm the pass debouncer with an explicit delay.
    pub fn request_pass(&mut self, now: Instant, delay: Duration) {
        self.pass.trigger_after(now, delay);
    }

    pub fn schedule_reorder(&mut self, now: Instant) {
        self.reorder.trigger(now);
    }

    pub fn schedule_pulse_end(&mut self, id: &str, now: Instant) {
        self.timers.schedule_in(
            Timer::PulseEnd(id.to_string()),
            now,
            self.timings.navigate_pulse(),
        );
    }

    /// Whether a navigation pulse is still showing on the row for `id`.
    pub fn is_pulsing(&self, id: &str) -> bool {
        self.timers.is_scheduled(&Timer::PulseEnd(id.to_string()))
    }

    pub fn pass_pending(&self) -> bool {
        self.pass.is_pending()
    }

    pub fn reorder_pending(&self) -> bool {
        self.reorder.is_pending()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.pass.deadline(),
            self.reorder.deadline(),
            self.timers.next_deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Everything due at `now`. A pass is always reported before a reorder so
    /// the reorder sees freshly tagged rows.
    pub fn due(&mut self, now: Instant) -> Vec<Wake> {
        let mut wakes: Vec<Wake> = self
            .timers
            .pop_due(now)
            .into_iter()
            .map(|t| match t {
                Timer::ReadinessPoll => Wake::ReadinessPoll,
                Timer::PulseEnd(id) => Wake::PulseEnd(id),
            })
            .collect();
        if self.pass.fire_if_due(now) {
            wakes.push(Wake::Pass);
        }
        if self.reorder.fire_if_due(now) {
            wakes.push(Wake::Reorder);
        }
        wakes
    }
}
