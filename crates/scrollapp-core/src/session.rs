//! Scroll session: the Idle/Active state machine
//!
//! The session owns the anchor and the periodic tick schedule. Both exist
//! only while Active and are dropped together on deactivation, so a tick can
//! never observe a stale anchor. Side effects go through the injected
//! [`ScrollEmitter`] and [`CursorControl`].

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::backend::{CursorControl, ScrollEmitter};
use crate::input::Position;
use crate::motion::{MotionSample, MotionSettings, ScrollVector};

/// Reference tick period while Active
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Active,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Active => write!(f, "active"),
        }
    }
}

/// Notifications for the presentation layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionEvent {
    StateChanged(SessionState),
}

/// Pointer position captured when the session started
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub position: Position,
    pub captured_at: Instant,
}

#[derive(Debug, Clone, Copy)]
struct ActiveSession {
    anchor: Anchor,
    next_tick: Instant,
}

pub struct ScrollSession {
    active: Option<ActiveSession>,
    settings: MotionSettings,
    tick_interval: Duration,
    emitter: Box<dyn ScrollEmitter>,
    cursor: Box<dyn CursorControl>,
    event_tx: Option<mpsc::UnboundedSender<SessionEvent>>,
    scrolls_emitted: u64,
}

impl ScrollSession {
    pub fn new(
        emitter: Box<dyn ScrollEmitter>,
        cursor: Box<dyn CursorControl>,
        settings: MotionSettings,
        tick_interval: Duration,
    ) -> Self {
        Self {
            active: None,
            settings,
            tick_interval: tick_interval.max(Duration::from_millis(1)),
            emitter,
            cursor,
            event_tx: None,
            scrolls_emitted: 0,
        }
    }

    /// Set the event sender for state-change notifications
    pub fn with_event_sender(mut self, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    fn send_event(&self, event: SessionEvent) {
        if let Some(ref tx) = self.event_tx {
            if tx.send(event).is_err() {
                warn!("Failed to send session event: receiver dropped");
            }
        }
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        if self.active.is_some() {
            SessionState::Active
        } else {
            SessionState::Idle
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn anchor(&self) -> Option<Anchor> {
        self.active.map(|a| a.anchor)
    }

    pub fn settings(&self) -> MotionSettings {
        self.settings
    }

    /// Replace curve settings; takes effect on the next tick
    pub fn set_settings(&mut self, settings: MotionSettings) {
        self.settings = settings;
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    pub fn scrolls_emitted(&self) -> u64 {
        self.scrolls_emitted
    }

    /// When the next tick is due, if Active
    pub fn next_tick_at(&self) -> Option<Instant> {
        self.active.map(|a| a.next_tick)
    }

    /// Start a session anchored at `anchor`.
    ///
    /// No-op while already Active; the existing anchor is kept. Returns
    /// whether a transition happened.
    pub fn activate(&mut self, anchor: Position) -> bool {
        if self.active.is_some() {
            debug!("Activate ignored: session already active");
            return false;
        }

        let now = Instant::now();
        self.active = Some(ActiveSession {
            anchor: Anchor {
                position: anchor,
                captured_at: now,
            },
            next_tick: now + self.tick_interval,
        });
        self.cursor.set_cursor_override(true);

        info!("Auto-scroll started at ({:.0}, {:.0})", anchor.x, anchor.y);
        self.send_event(SessionEvent::StateChanged(SessionState::Active));
        true
    }

    /// Stop the session. No-op while Idle.
    pub fn deactivate(&mut self) -> bool {
        if self.active.take().is_none() {
            debug!("Deactivate ignored: session already idle");
            return false;
        }

        self.cursor.set_cursor_override(false);

        info!("Auto-scroll stopped");
        self.send_event(SessionEvent::StateChanged(SessionState::Idle));
        true
    }

    /// Stop then start with a new anchor; always effectful
    pub fn restart(&mut self, anchor: Position) {
        self.deactivate();
        self.activate(anchor);
    }

    /// Compute this tick's scroll without emitting it
    pub fn tick(&self, current: Position) -> Option<ScrollVector> {
        let active = self.active.as_ref()?;
        MotionSample::measure(active.anchor.position, current, self.settings).scroll_vector
    }

    /// Advance the tick schedule past `now`.
    ///
    /// Missed periods are skipped rather than replayed in a burst.
    pub fn complete_tick(&mut self, now: Instant) {
        let interval = self.tick_interval;
        if let Some(active) = self.active.as_mut() {
            active.next_tick += interval;
            if active.next_tick <= now {
                active.next_tick = now + interval;
            }
        }
    }

    /// Compute this tick's scroll and emit it.
    ///
    /// Emission failures are logged and dropped; the next tick tries again.
    pub fn on_tick(&mut self, current: Position) -> Option<ScrollVector> {
        let vector = self.tick(current)?;
        match self.emitter.emit_scroll(vector) {
            Ok(()) => self.scrolls_emitted += 1,
            Err(e) => debug!("Scroll emission failed: {}", e),
        }
        Some(vector)
    }
}

impl fmt::Debug for ScrollSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrollSession")
            .field("state", &self.state())
            .field("anchor", &self.anchor())
            .field("settings", &self.settings)
            .field("tick_interval", &self.tick_interval)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::Error;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    pub(crate) struct RecordingEmitter {
        pub emitted: Arc<Mutex<Vec<f64>>>,
        pub fail: bool,
    }

    impl ScrollEmitter for RecordingEmitter {
        fn emit_scroll(&mut self, amount: f64) -> crate::Result<()> {
            if self.fail {
                return Err(Error::Platform("refused".to_string()));
            }
            self.emitted.lock().unwrap().push(amount);
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    pub(crate) struct RecordingCursor {
        pub calls: Arc<Mutex<Vec<bool>>>,
    }

    impl CursorControl for RecordingCursor {
        fn set_cursor_override(&mut self, enabled: bool) {
            self.calls.lock().unwrap().push(enabled);
        }
    }

    fn session() -> (
        ScrollSession,
        RecordingEmitter,
        RecordingCursor,
        mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        let emitter = RecordingEmitter::default();
        let cursor = RecordingCursor::default();
        let (tx, rx) = mpsc::unbounded_channel();
        let session = ScrollSession::new(
            Box::new(emitter.clone()),
            Box::new(cursor.clone()),
            MotionSettings::default(),
            DEFAULT_TICK_INTERVAL,
        )
        .with_event_sender(tx);
        (session, emitter, cursor, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_starts_idle() {
        let (session, _, _, _) = session();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.anchor().is_none());
        assert!(session.next_tick_at().is_none());
    }

    #[test]
    fn test_activate_records_anchor_and_overrides_cursor() {
        let (mut session, _, cursor, mut rx) = session();
        assert!(session.activate(Position::new(10.0, 20.0)));

        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.anchor().unwrap().position, Position::new(10.0, 20.0));
        assert!(session.next_tick_at().is_some());
        assert_eq!(*cursor.calls.lock().unwrap(), vec![true]);
        assert_eq!(
            drain(&mut rx),
            vec![SessionEvent::StateChanged(SessionState::Active)]
        );
    }

    #[test]
    fn test_activate_twice_keeps_first_anchor() {
        let (mut session, _, cursor, mut rx) = session();
        session.activate(Position::new(1.0, 1.0));
        assert!(!session.activate(Position::new(2.0, 2.0)));

        assert_eq!(session.anchor().unwrap().position, Position::new(1.0, 1.0));
        assert_eq!(cursor.calls.lock().unwrap().len(), 1);
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[test]
    fn test_deactivate_clears_anchor_and_schedule() {
        let (mut session, _, cursor, mut rx) = session();
        session.activate(Position::new(1.0, 1.0));
        drain(&mut rx);

        assert!(session.deactivate());
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.anchor().is_none());
        assert!(session.next_tick_at().is_none());
        assert_eq!(*cursor.calls.lock().unwrap(), vec![true, false]);
        assert_eq!(
            drain(&mut rx),
            vec![SessionEvent::StateChanged(SessionState::Idle)]
        );

        // Idle -> Idle is silent
        assert!(!session.deactivate());
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_restart_reanchors_with_one_transition_each_way() {
        let (mut session, _, _, mut rx) = session();
        session.activate(Position::new(1.0, 1.0));
        drain(&mut rx);

        session.restart(Position::new(5.0, 9.0));
        assert_eq!(session.anchor().unwrap().position, Position::new(5.0, 9.0));
        assert_eq!(
            drain(&mut rx),
            vec![
                SessionEvent::StateChanged(SessionState::Idle),
                SessionEvent::StateChanged(SessionState::Active),
            ]
        );
    }

    #[test]
    fn test_restart_from_idle_activates() {
        let (mut session, _, _, mut rx) = session();
        session.restart(Position::new(3.0, 3.0));
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(
            drain(&mut rx),
            vec![SessionEvent::StateChanged(SessionState::Active)]
        );
    }

    #[test]
    fn test_tick_uses_anchor_delta() {
        let (mut session, emitter, _, _) = session();
        assert_eq!(session.tick(Position::new(0.0, 0.0)), None);

        session.activate(Position::new(0.0, 500.0));
        // 55 units above the anchor scrolls up at 2.5
        let v = session.on_tick(Position::new(0.0, 445.0)).unwrap();
        assert!((v - 2.5).abs() < 1e-9);
        // Inside the dead zone nothing is emitted
        assert_eq!(session.on_tick(Position::new(0.0, 503.0)), None);

        assert_eq!(emitter.emitted.lock().unwrap().len(), 1);
        assert_eq!(session.scrolls_emitted(), 1);
    }

    #[test]
    fn test_settings_apply_on_next_tick() {
        let (mut session, _, _, _) = session();
        session.activate(Position::new(0.0, 500.0));
        session.set_settings(MotionSettings {
            sensitivity: 2.0,
            inverted: true,
        });
        let v = session.tick(Position::new(0.0, 445.0)).unwrap();
        assert!((v + 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_emission_failure_is_ignored() {
        let emitter = RecordingEmitter {
            fail: true,
            ..Default::default()
        };
        let mut session = ScrollSession::new(
            Box::new(emitter),
            Box::new(RecordingCursor::default()),
            MotionSettings::default(),
            DEFAULT_TICK_INTERVAL,
        );
        session.activate(Position::new(0.0, 500.0));
        assert!(session.on_tick(Position::new(0.0, 300.0)).is_some());
        assert_eq!(session.scrolls_emitted(), 0);
        assert!(session.is_active());
    }

    #[test]
    fn test_complete_tick_skips_missed_periods() {
        let (mut session, _, _, _) = session();
        session.activate(Position::new(0.0, 0.0));
        let first = session.next_tick_at().unwrap();

        session.complete_tick(first);
        assert_eq!(session.next_tick_at().unwrap(), first + DEFAULT_TICK_INTERVAL);

        let late = first + Duration::from_millis(95);
        session.complete_tick(late);
        assert_eq!(session.next_tick_at().unwrap(), late + DEFAULT_TICK_INTERVAL);
    }
}
