//! The single serialized command loop.
//!
//! Platform input, IPC requests and the periodic tick all funnel through one
//! queue owned by [`Controller`], so the session and the detector only ever
//! have one writer.

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::activation::{ActivationDetector, ActivationMethod, Command};
use crate::backend::{Capabilities, InputBackend, InputSink, InputSubscription, PointerSource};
use crate::config::{clamp_sensitivity, AppConfig};
use crate::input::{InputEvent, Position};
use crate::session::{ScrollSession, SessionEvent, SessionState};
use crate::{Error, Result};

/// Everything that can arrive on the controller queue
#[derive(Debug)]
pub enum ControlMessage {
    /// Raw event from the input subscription of the given generation
    Input { generation: u64, event: InputEvent },
    /// Out-of-band request, answered with a fresh status snapshot
    Request {
        command: ControlRequest,
        reply: oneshot::Sender<StatusSnapshot>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlRequest {
    Status,
    /// Start at the pointer when Idle, stop when Active
    Toggle,
    /// Re-anchor at the current pointer
    Restart,
    SetMethod(ActivationMethod),
    /// `None` flips the current value
    SetInverted(Option<bool>),
    SetSensitivity(f64),
}

/// Point-in-time view of the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub state: SessionState,
    pub anchor: Option<Position>,
    pub method: ActivationMethod,
    pub sensitivity: f64,
    pub inverted: bool,
    pub input_armed: bool,
    pub gesture_pending: bool,
    pub scrolls_emitted: u64,
}

/// Cloneable handle for talking to a running controller
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: mpsc::UnboundedSender<ControlMessage>,
}

impl ControlHandle {
    pub async fn request(&self, command: ControlRequest) -> Result<StatusSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ControlMessage::Request { command, reply })
            .map_err(|_| Error::Other("Controller is not running".to_string()))?;
        rx.await
            .map_err(|_| Error::Other("Controller dropped the request".to_string()))
    }

    pub async fn status(&self) -> Result<StatusSnapshot> {
        self.request(ControlRequest::Status).await
    }
}

pub struct Controller {
    session: ScrollSession,
    detector: ActivationDetector,
    pointer: Box<dyn PointerSource>,
    input: Box<dyn InputBackend>,
    subscription: Option<Box<dyn InputSubscription>>,
    generation: u64,
    tx: mpsc::UnboundedSender<ControlMessage>,
    rx: Option<mpsc::UnboundedReceiver<ControlMessage>>,
}

impl Controller {
    pub fn new(config: &AppConfig, capabilities: Capabilities) -> (Self, ControlHandle) {
        let Capabilities {
            emitter,
            cursor,
            pointer,
            input,
        } = capabilities;

        let session = ScrollSession::new(
            emitter,
            cursor,
            config.motion_settings(),
            config.tick_interval(),
        );
        let detector = ActivationDetector::new(config.activation_method(), config.gesture_timings());

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = ControlHandle { tx: tx.clone() };

        let controller = Self {
            session,
            detector,
            pointer,
            input,
            subscription: None,
            generation: 0,
            tx,
            rx: Some(rx),
        };
        (controller, handle)
    }

    /// Forward session state changes to `tx`
    pub fn with_event_sender(mut self, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        self.session = self.session.with_event_sender(tx);
        self
    }

    pub fn handle(&self) -> ControlHandle {
        ControlHandle {
            tx: self.tx.clone(),
        }
    }

    /// Run until the shutdown signal fires. Any active session is stopped
    /// and the input subscription released before returning.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let Some(mut rx) = self.rx.take() else {
            error!("Controller queue already taken");
            return;
        };

        info!(
            "Controller started: method={}, sensitivity={:.2}, inverted={}",
            self.detector.method(),
            self.session.settings().sensitivity,
            self.session.settings().inverted
        );
        self.arm_input();

        loop {
            let tick_at = self.session.next_tick_at();
            let gesture_at = self.detector.next_deadline();

            tokio::select! {
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        info!("Controller received shutdown signal");
                        break;
                    }
                }

                Some(message) = rx.recv() => {
                    self.handle_message(message);
                }

                _ = sleep_until_opt(tick_at) => {
                    self.on_tick();
                }

                _ = sleep_until_opt(gesture_at) => {
                    self.detector.expire(Instant::now());
                }
            }
        }

        self.session.deactivate();
        self.subscription = None;
        info!("Controller stopped");
    }

    fn handle_message(&mut self, message: ControlMessage) {
        match message {
            ControlMessage::Input { generation, event } => {
                if generation != self.generation {
                    debug!(
                        "Dropping event from stale subscription {} (current {})",
                        generation, self.generation
                    );
                    return;
                }
                if let Some(command) = self.detector.handle(&event, self.session.state()) {
                    self.apply(command);
                }
            }
            ControlMessage::Request { command, reply } => {
                self.handle_request(command);
                // Requester may have given up
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn handle_request(&mut self, request: ControlRequest) {
        debug!("Control request: {:?}", request);
        match request {
            ControlRequest::Status => {}
            ControlRequest::Toggle => match self.session.state() {
                SessionState::Idle => self.apply(Command::Activate),
                SessionState::Active => self.apply(Command::Deactivate),
            },
            ControlRequest::Restart => self.apply(Command::Restart),
            ControlRequest::SetMethod(method) => {
                if method != self.detector.method() {
                    info!("Activation method changed to {}", method);
                    self.detector.reconfigure(method);
                    self.arm_input();
                }
            }
            ControlRequest::SetInverted(inverted) => {
                let mut settings = self.session.settings();
                settings.inverted = inverted.unwrap_or(!settings.inverted);
                info!("Scroll inversion set to {}", settings.inverted);
                self.session.set_settings(settings);
            }
            ControlRequest::SetSensitivity(value) => {
                let mut settings = self.session.settings();
                settings.sensitivity = clamp_sensitivity(value);
                info!("Sensitivity set to {:.2}", settings.sensitivity);
                self.session.set_settings(settings);
            }
        }
    }

    fn apply(&mut self, command: Command) {
        debug!("Applying {:?}", command);
        match command {
            Command::Deactivate => {
                self.session.deactivate();
            }
            Command::Activate | Command::Restart => {
                let position = match self.pointer.position() {
                    Ok(position) => position,
                    Err(e) => {
                        warn!("Cannot read pointer position, ignoring {:?}: {}", command, e);
                        return;
                    }
                };
                if command == Command::Restart {
                    self.session.restart(position);
                } else {
                    self.session.activate(position);
                }
            }
        }
    }

    fn on_tick(&mut self) {
        self.session.complete_tick(Instant::now());
        match self.pointer.position() {
            Ok(position) => {
                self.session.on_tick(position);
            }
            Err(e) => debug!("Skipping tick, pointer unavailable: {}", e),
        }
    }

    /// Replace the input subscription for the current method.
    ///
    /// The old subscription is dropped, and therefore torn down, before the
    /// new one is armed.
    fn arm_input(&mut self) {
        self.subscription = None;
        self.generation += 1;

        let interest = self.detector.method().interest();
        let sink = InputSink::new(self.tx.clone(), self.generation, interest);
        match self.input.subscribe(interest, sink) {
            Ok(subscription) => {
                debug!("Input subscription {} armed: {:?}", self.generation, interest);
                self.subscription = Some(subscription);
            }
            Err(e) => {
                error!("Failed to arm input subscription: {}", e);
            }
        }
    }

    fn snapshot(&self) -> StatusSnapshot {
        let settings = self.session.settings();
        StatusSnapshot {
            state: self.session.state(),
            anchor: self.session.anchor().map(|a| a.position),
            method: self.detector.method(),
            sensitivity: settings.sensitivity,
            inverted: settings.inverted,
            input_armed: self.subscription.is_some(),
            gesture_pending: self.detector.next_deadline().is_some(),
            scrolls_emitted: self.session.scrolls_emitted(),
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::input::{EventInterest, ModifierSet, MouseButton};
    use crate::session::tests::{RecordingCursor, RecordingEmitter};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Clone, Default)]
    pub(crate) struct FakePointer {
        position: Arc<Mutex<Position>>,
    }

    impl FakePointer {
        pub(crate) fn move_to(&self, x: f64, y: f64) {
            *self.position.lock().unwrap() = Position::new(x, y);
        }
    }

    impl PointerSource for FakePointer {
        fn position(&self) -> Result<Position> {
            Ok(*self.position.lock().unwrap())
        }
    }

    #[derive(Clone, Default)]
    pub(crate) struct FakeInput {
        pub log: Arc<Mutex<Vec<String>>>,
        pub sinks: Arc<Mutex<Vec<InputSink>>>,
        pub fail: bool,
    }

    impl FakeInput {
        pub(crate) fn sink(&self, index: usize) -> InputSink {
            self.sinks.lock().unwrap()[index].clone()
        }
    }

    struct FakeSubscription {
        id: usize,
        interest: EventInterest,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl InputSubscription for FakeSubscription {
        fn interest(&self) -> EventInterest {
            self.interest
        }
    }

    impl Drop for FakeSubscription {
        fn drop(&mut self) {
            self.log.lock().unwrap().push(format!("drop {}", self.id));
        }
    }

    impl InputBackend for FakeInput {
        fn subscribe(
            &mut self,
            interest: EventInterest,
            sink: InputSink,
        ) -> Result<Box<dyn InputSubscription>> {
            if self.fail {
                return Err(Error::Platform("no accessibility permission".to_string()));
            }
            let mut sinks = self.sinks.lock().unwrap();
            sinks.push(sink);
            let id = sinks.len();
            self.log.lock().unwrap().push(format!("subscribe {}", id));
            Ok(Box::new(FakeSubscription {
                id,
                interest,
                log: self.log.clone(),
            }))
        }
    }

    pub(crate) struct Harness {
        pub handle: ControlHandle,
        pub emitter: RecordingEmitter,
        pub cursor: RecordingCursor,
        pub pointer: FakePointer,
        pub input: FakeInput,
        pub shutdown: watch::Sender<bool>,
        pub task: tokio::task::JoinHandle<()>,
    }

    /// Spawn a controller wired to fakes, pointer parked at (500, 400)
    pub(crate) fn start(config: AppConfig, input: FakeInput) -> Harness {
        let emitter = RecordingEmitter::default();
        let cursor = RecordingCursor::default();
        let pointer = FakePointer::default();
        pointer.move_to(500.0, 400.0);

        let capabilities = Capabilities {
            emitter: Box::new(emitter.clone()),
            cursor: Box::new(cursor.clone()),
            pointer: Box::new(pointer.clone()),
            input: Box::new(input.clone()),
        };
        let (controller, handle) = Controller::new(&config, capabilities);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(controller.run(shutdown_rx));

        Harness {
            handle,
            emitter,
            cursor,
            pointer,
            input,
            shutdown,
            task,
        }
    }

    fn config_with_method(method: &str) -> AppConfig {
        let mut config = AppConfig::default();
        config.activation.method = method.to_string();
        config
    }

    fn press(button: MouseButton) -> InputEvent {
        InputEvent::ButtonDown {
            button,
            modifiers: ModifierSet::NONE,
            at: Instant::now(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_press_scroll_and_click_to_exit() {
        let h = start(AppConfig::default(), FakeInput::default());
        let status = h.handle.status().await.unwrap();
        assert!(status.input_armed);

        assert!(h.input.sink(0).send(press(MouseButton::Middle)));
        let status = h.handle.status().await.unwrap();
        assert_eq!(status.state, SessionState::Active);
        assert_eq!(status.anchor, Some(Position::new(500.0, 400.0)));

        // 55 units above the anchor scrolls up at 2.5 per tick
        h.pointer.move_to(500.0, 345.0);
        tokio::time::sleep(Duration::from_millis(35)).await;

        let emitted = h.emitter.emitted.lock().unwrap().clone();
        assert!(emitted.len() >= 3, "only {} ticks", emitted.len());
        assert!(emitted.iter().all(|v| (v - 2.5).abs() < 1e-9));

        assert!(h.input.sink(0).send(press(MouseButton::Left)));
        let status = h.handle.status().await.unwrap();
        assert_eq!(status.state, SessionState::Idle);
        assert_eq!(status.anchor, None);

        let count = h.emitter.emitted.lock().unwrap().len();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.emitter.emitted.lock().unwrap().len(), count);
        assert_eq!(*h.cursor.calls.lock().unwrap(), vec![true, false]);

        h.shutdown.send(true).unwrap();
        h.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_dead_zone_emits_nothing() {
        let h = start(AppConfig::default(), FakeInput::default());
        h.handle.request(ControlRequest::Toggle).await.unwrap();

        h.pointer.move_to(520.0, 403.0);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(h.emitter.emitted.lock().unwrap().is_empty());

        h.shutdown.send(true).unwrap();
        h.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_and_restart_requests() {
        let h = start(AppConfig::default(), FakeInput::default());

        let status = h.handle.request(ControlRequest::Toggle).await.unwrap();
        assert_eq!(status.state, SessionState::Active);

        h.pointer.move_to(10.0, 20.0);
        let status = h.handle.request(ControlRequest::Restart).await.unwrap();
        assert_eq!(status.state, SessionState::Active);
        assert_eq!(status.anchor, Some(Position::new(10.0, 20.0)));

        let status = h.handle.request(ControlRequest::Toggle).await.unwrap();
        assert_eq!(status.state, SessionState::Idle);
        assert_eq!(*h.cursor.calls.lock().unwrap(), vec![true, false, true, false]);

        h.shutdown.send(true).unwrap();
        h.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_settings_requests() {
        let h = start(AppConfig::default(), FakeInput::default());

        let status = h.handle.request(ControlRequest::SetInverted(None)).await.unwrap();
        assert!(status.inverted);
        let status = h.handle.request(ControlRequest::SetInverted(Some(true))).await.unwrap();
        assert!(status.inverted);

        let status = h.handle.request(ControlRequest::SetSensitivity(9.0)).await.unwrap();
        assert_eq!(status.sensitivity, 3.0);
        let status = h.handle.request(ControlRequest::SetSensitivity(0.5)).await.unwrap();
        assert_eq!(status.sensitivity, 0.5);

        h.shutdown.send(true).unwrap();
        h.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_method_change_rearms_and_ignores_stale_events() {
        let h = start(AppConfig::default(), FakeInput::default());
        h.handle.status().await.unwrap();

        let status = h
            .handle
            .request(ControlRequest::SetMethod(ActivationMethod::Button4Click))
            .await
            .unwrap();
        assert_eq!(status.method, ActivationMethod::Button4Click);
        assert_eq!(
            *h.input.log.lock().unwrap(),
            vec!["subscribe 1", "drop 1", "subscribe 2"]
        );

        // The old subscription's events no longer count
        h.input.sink(0).send(press(MouseButton::Button4));
        let status = h.handle.status().await.unwrap();
        assert_eq!(status.state, SessionState::Idle);

        h.input.sink(1).send(press(MouseButton::Button4));
        let status = h.handle.status().await.unwrap();
        assert_eq!(status.state, SessionState::Active);

        h.shutdown.send(true).unwrap();
        h.task.await.unwrap();
        assert_eq!(h.input.log.lock().unwrap().last().unwrap(), "drop 2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_gesture_window_expires_on_schedule() {
        let h = start(config_with_method("double_middle_click"), FakeInput::default());
        h.handle.status().await.unwrap();

        h.input.sink(0).send(press(MouseButton::Middle));
        let status = h.handle.status().await.unwrap();
        assert!(status.gesture_pending);

        tokio::time::sleep(Duration::from_millis(600)).await;
        let status = h.handle.status().await.unwrap();
        assert!(!status.gesture_pending);

        // A late second press starts over instead of activating
        h.input.sink(0).send(press(MouseButton::Middle));
        let status = h.handle.status().await.unwrap();
        assert_eq!(status.state, SessionState::Idle);

        tokio::time::sleep(Duration::from_millis(300)).await;
        h.input.sink(0).send(press(MouseButton::Middle));
        let status = h.handle.status().await.unwrap();
        assert_eq!(status.state, SessionState::Active);

        h.shutdown.send(true).unwrap();
        h.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_without_input() {
        let input = FakeInput {
            fail: true,
            ..Default::default()
        };
        let h = start(AppConfig::default(), input);

        let status = h.handle.status().await.unwrap();
        assert!(!status.input_armed);
        let status = h.handle.request(ControlRequest::Toggle).await.unwrap();
        assert_eq!(status.state, SessionState::Active);

        h.shutdown.send(true).unwrap();
        h.task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_restores_cursor() {
        let h = start(AppConfig::default(), FakeInput::default());
        h.handle.request(ControlRequest::Toggle).await.unwrap();

        h.shutdown.send(true).unwrap();
        h.task.await.unwrap();

        assert_eq!(*h.cursor.calls.lock().unwrap(), vec![true, false]);
        assert!(h.handle.status().await.is_err());
    }
}
