//! Core Graphics backend.
//!
//! Synthetic scrolling and pointer reads go through `CGEvent`; raw input is
//! captured with a listen-only event tap running on its own thread, which
//! needs the Accessibility permission.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::anyhow;
use core_foundation::runloop::{kCFRunLoopDefaultMode, CFRunLoop};
use core_graphics::display::CGDisplay;
use core_graphics::event::{
    CGEvent, CGEventFlags, CGEventTap, CGEventTapLocation, CGEventTapOptions,
    CGEventTapPlacement, CGEventType, EventField, ScrollEventUnit,
};
use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};
use tracing::{debug, info, warn};

use scrollapp_core::backend::{InputSubscription, ScrollEmitter};
use scrollapp_core::input::{EventInterest, InputEvent, Modifier, ModifierSet, MouseButton};
use scrollapp_core::{
    Capabilities, CursorControl, Error, InputBackend, InputSink, PointerSource, Position,
    Result, ScrollQuantizer,
};

/// How often the tap thread checks whether it should stop
const RUN_LOOP_SLICE: Duration = Duration::from_millis(100);

fn event_source() -> Result<CGEventSource> {
    CGEventSource::new(CGEventSourceStateID::HIDSystemState)
        .map_err(|_| Error::Platform("Failed to create CGEventSource".to_string()))
}

struct ScrollWheel {
    quantizer: ScrollQuantizer,
}

impl ScrollEmitter for ScrollWheel {
    fn emit_scroll(&mut self, amount: f64) -> Result<()> {
        let pixels = self.quantizer.push(amount);
        if pixels == 0 {
            return Ok(());
        }

        let event = CGEvent::new_scroll_event(event_source()?, ScrollEventUnit::PIXEL, 1, pixels, 0, 0)
            .map_err(|_| Error::Platform("Failed to create scroll event".to_string()))?;
        event.set_flags(CGEventFlags::CGEventFlagNonCoalesced);
        event.post(CGEventTapLocation::Session);
        Ok(())
    }
}

struct HiddenCursor {
    hidden: bool,
}

impl CursorControl for HiddenCursor {
    fn set_cursor_override(&mut self, enabled: bool) {
        if enabled == self.hidden {
            return;
        }
        let display = CGDisplay::main();
        let result = if enabled {
            display.hide_cursor()
        } else {
            display.show_cursor()
        };
        match result {
            Ok(()) => self.hidden = enabled,
            Err(e) => warn!("Failed to change cursor visibility: {:?}", e),
        }
    }
}

impl Drop for HiddenCursor {
    fn drop(&mut self) {
        self.set_cursor_override(false);
    }
}

struct Pointer;

impl PointerSource for Pointer {
    fn position(&self) -> Result<Position> {
        let event = CGEvent::new(event_source()?)
            .map_err(|_| Error::Platform("Failed to read pointer location".to_string()))?;
        let location = event.location();
        Ok(Position::new(location.x, location.y))
    }
}

fn modifiers(flags: CGEventFlags) -> ModifierSet {
    [
        (CGEventFlags::CGEventFlagShift, Modifier::Shift),
        (CGEventFlags::CGEventFlagControl, Modifier::Control),
        (CGEventFlags::CGEventFlagAlternate, Modifier::Option),
        (CGEventFlags::CGEventFlagCommand, Modifier::Command),
    ]
    .into_iter()
    .filter(|(flag, _)| flags.contains(*flag))
    .map(|(_, modifier)| modifier)
    .collect()
}

fn translate(event_type: CGEventType, event: &CGEvent) -> Option<InputEvent> {
    let at = tokio::time::Instant::now();
    match event_type {
        CGEventType::LeftMouseDown | CGEventType::RightMouseDown | CGEventType::OtherMouseDown => {
            let number = event.get_integer_value_field(EventField::MOUSE_EVENT_BUTTON_NUMBER);
            Some(InputEvent::ButtonDown {
                button: MouseButton::from_number(u32::try_from(number).ok()?),
                modifiers: modifiers(event.get_flags()),
                at,
            })
        }
        CGEventType::FlagsChanged => Some(InputEvent::ModifiersChanged {
            modifiers: modifiers(event.get_flags()),
            at,
        }),
        CGEventType::ScrollWheel => Some(InputEvent::ScrollWheel {
            delta_y: event.get_double_value_field(EventField::SCROLL_WHEEL_EVENT_FIXED_POINT_DELTA_AXIS_1),
            at,
        }),
        _ => None,
    }
}

fn event_types(interest: EventInterest) -> Vec<CGEventType> {
    let mut types = Vec::new();
    if interest.buttons {
        types.extend([
            CGEventType::LeftMouseDown,
            CGEventType::RightMouseDown,
            CGEventType::OtherMouseDown,
        ]);
    }
    if interest.modifiers {
        types.push(CGEventType::FlagsChanged);
    }
    if interest.scroll {
        types.push(CGEventType::ScrollWheel);
    }
    types
}

/// Live event tap; dropping it stops and joins the tap thread
struct TapSubscription {
    interest: EventInterest,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl InputSubscription for TapSubscription {
    fn interest(&self) -> EventInterest {
        self.interest
    }
}

impl Drop for TapSubscription {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Event tap thread panicked");
            }
        }
        debug!("Event tap removed");
    }
}

struct EventTapBackend;

impl InputBackend for EventTapBackend {
    fn subscribe(
        &mut self,
        interest: EventInterest,
        sink: InputSink,
    ) -> Result<Box<dyn InputSubscription>> {
        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = mpsc::channel::<std::result::Result<(), String>>();

        let thread = {
            let running = running.clone();
            std::thread::Builder::new()
                .name("scrollapp-event-tap".to_string())
                .spawn(move || run_tap(interest, sink, running, ready_tx))?
        };

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(TapSubscription {
                interest,
                running,
                thread: Some(thread),
            })),
            Ok(Err(message)) => {
                let _ = thread.join();
                Err(Error::Platform(message))
            }
            Err(_) => {
                let _ = thread.join();
                Err(Error::Platform("Event tap thread exited during setup".to_string()))
            }
        }
    }
}

fn run_tap(
    interest: EventInterest,
    sink: InputSink,
    running: Arc<AtomicBool>,
    ready: mpsc::Sender<std::result::Result<(), String>>,
) {
    let tap = CGEventTap::new(
        CGEventTapLocation::HID,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        event_types(interest),
        move |_proxy, event_type, event| {
            if let Some(input) = translate(event_type, event) {
                sink.send(input);
            }
            None
        },
    );
    let tap = match tap {
        Ok(tap) => tap,
        Err(()) => {
            let _ = ready.send(Err(
                "Failed to create event tap (is Accessibility access granted?)".to_string(),
            ));
            return;
        }
    };

    let source = match tap.mach_port.create_runloop_source(0) {
        Ok(source) => source,
        Err(()) => {
            let _ = ready.send(Err("Failed to create run loop source".to_string()));
            return;
        }
    };

    let run_loop = CFRunLoop::get_current();
    // SAFETY: kCFRunLoopDefaultMode is an immutable CoreFoundation constant
    let mode = unsafe { kCFRunLoopDefaultMode };
    run_loop.add_source(&source, mode);
    tap.enable();
    let _ = ready.send(Ok(()));

    while running.load(Ordering::Relaxed) {
        CFRunLoop::run_in_mode(mode, RUN_LOOP_SLICE, true);
    }

    run_loop.remove_source(&source, mode);
}

pub fn capabilities() -> anyhow::Result<Capabilities> {
    event_source().map_err(|e| anyhow!("Core Graphics unavailable: {}", e))?;
    info!("Using Core Graphics backend");

    Ok(Capabilities {
        emitter: Box::new(ScrollWheel {
            quantizer: ScrollQuantizer::new(),
        }),
        cursor: Box::new(HiddenCursor { hidden: false }),
        pointer: Box::new(Pointer),
        input: Box::new(EventTapBackend),
    })
}
