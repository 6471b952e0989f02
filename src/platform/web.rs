//! Browser drivers (wasm32 only)
//!
//! - `FrameLoop`: requestAnimationFrame loop over a [`GameSession`], cancelled
//!   on game over or teardown
//! - `InputBindings`: keyboard/pointer jumps and pause on hidden tab
//! - `TimeoutScheduler`: `setTimeout`/`clearTimeout` timers for the relay
//! - `SocketTransport`: adapter over a Socket.IO-style JS socket
//! - `WebArcade` / `WebRelay`: the JS-facing handles

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use serde_json::Value;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use super::input::{KeyTarget, captures_jump_key};
use super::storage::{KeyValueStore, LocalStore, MemoryStore};
use crate::relay::{
    Credentials, EventKind, Listener, ListenerResult, Notification, NotificationRelay, NotificationSink,
    RelayEvent, Scheduler, SchedulerError, Subscription, TimerId, Transport, TransportError, TransportFactory,
    TransportHandler,
};
use crate::settings::{RelayConfig, TransportOptions};
use crate::sim::{FrameOutcome, GameSession, GameState, run_shared_frame};

/// LocalStorage when available, otherwise an in-memory fallback
pub fn open_store() -> Rc<dyn KeyValueStore> {
    match LocalStore::open() {
        Ok(store) => Rc::new(store),
        Err(e) => {
            log::warn!("{}; best score will not persist", e);
            Rc::new(MemoryStore::new())
        }
    }
}

fn to_js(value: &Value) -> JsValue {
    serde_json::to_string(value)
        .ok()
        .and_then(|json| js_sys::JSON::parse(&json).ok())
        .unwrap_or(JsValue::NULL)
}

fn from_js(value: &JsValue) -> Value {
    if value.is_undefined() || value.is_null() {
        return Value::Null;
    }
    js_sys::JSON::stringify(value)
        .ok()
        .and_then(|s| s.as_string())
        .and_then(|json| serde_json::from_str(&json).ok())
        .unwrap_or(Value::Null)
}

// === Frame loop ===

struct LoopContext {
    session: Rc<RefCell<GameSession>>,
    store: Rc<dyn KeyValueStore>,
    render: RefCell<Box<dyn FnMut(&GameState)>>,
    handle: Cell<Option<i32>>,
}

fn request_frame(ctx: Rc<LoopContext>) {
    let Some(window) = web_sys::window() else {
        log::error!("No window, frame loop not started");
        return;
    };
    let next = ctx.clone();
    let closure = Closure::once_into_js(move |time: f64| run_frame(next, time));
    match window.request_animation_frame(closure.unchecked_ref()) {
        Ok(handle) => ctx.handle.set(Some(handle)),
        Err(e) => log::error!("requestAnimationFrame failed: {:?}", e),
    }
}

fn run_frame(ctx: Rc<LoopContext>, time: f64) {
    ctx.handle.set(None);
    let outcome = {
        let mut render = ctx.render.borrow_mut();
        run_shared_frame(&ctx.session, time, ctx.store.as_ref(), &mut **render)
    };
    // The renderer may already have resumed the loop (restart from a callback)
    if outcome == FrameOutcome::Continue && ctx.handle.get().is_none() {
        request_frame(ctx);
    }
}

/// A running animation-frame loop
pub struct FrameLoop {
    ctx: Rc<LoopContext>,
}

impl FrameLoop {
    pub fn start(
        session: Rc<RefCell<GameSession>>,
        store: Rc<dyn KeyValueStore>,
        render: impl FnMut(&GameState) + 'static,
    ) -> Self {
        let ctx = Rc::new(LoopContext {
            session,
            store,
            render: RefCell::new(Box::new(render)),
            handle: Cell::new(None),
        });
        request_frame(ctx.clone());
        Self { ctx }
    }

    /// Request frames again (after a restart)
    pub fn resume(&self) {
        if self.ctx.handle.get().is_none() {
            request_frame(self.ctx.clone());
        }
    }

    /// Cancel the pending frame without ending the session
    pub fn pause(&self) {
        if let (Some(handle), Some(window)) = (self.ctx.handle.take(), web_sys::window()) {
            let _ = window.cancel_animation_frame(handle);
        }
    }

    /// Cancel the pending frame and end the session
    pub fn stop(&self) {
        self.pause();
        self.ctx.session.borrow_mut().teardown();
    }
}

// === Input ===

/// Jump keys on the window (ignored while typing), pointer jumps on the
/// host element, pause on hidden tab. Removed on drop.
struct InputBindings {
    host: web_sys::Element,
    keydown: Closure<dyn FnMut(web_sys::KeyboardEvent)>,
    pointerdown: Closure<dyn FnMut(web_sys::PointerEvent)>,
    visibility: Closure<dyn FnMut(web_sys::Event)>,
}

impl InputBindings {
    fn attach(
        host: web_sys::Element,
        session: Rc<RefCell<GameSession>>,
        frame_loop: Rc<FrameLoop>,
    ) -> Option<Self> {
        let window = web_sys::window()?;
        let document = window.document()?;

        let keydown = {
            let session = session.clone();
            Closure::<dyn FnMut(_)>::new(move |event: web_sys::KeyboardEvent| {
                let target = event
                    .target()
                    .and_then(|t| t.dyn_into::<web_sys::HtmlElement>().ok());
                let tag = target.as_ref().map(|el| el.tag_name());
                let key_target = target.as_ref().zip(tag.as_deref()).map(|(el, tag)| KeyTarget {
                    tag,
                    content_editable: el.is_content_editable(),
                });
                if captures_jump_key(&event.code(), key_target) {
                    event.prevent_default();
                    session.borrow_mut().jump();
                }
            })
        };
        let pointerdown = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::PointerEvent| {
            session.borrow_mut().jump();
        });
        let visibility = {
            let document = document.clone();
            Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
                if document.visibility_state() == web_sys::VisibilityState::Hidden {
                    frame_loop.pause();
                    log::info!("Paused (tab hidden)");
                } else {
                    frame_loop.resume();
                }
            })
        };

        let _ = window.add_event_listener_with_callback("keydown", keydown.as_ref().unchecked_ref());
        let _ = host
            .add_event_listener_with_callback("pointerdown", pointerdown.as_ref().unchecked_ref());
        let _ = document
            .add_event_listener_with_callback("visibilitychange", visibility.as_ref().unchecked_ref());
        Some(Self {
            host,
            keydown,
            pointerdown,
            visibility,
        })
    }
}

impl Drop for InputBindings {
    fn drop(&mut self) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let _ = window
            .remove_event_listener_with_callback("keydown", self.keydown.as_ref().unchecked_ref());
        let _ = self.host.remove_event_listener_with_callback(
            "pointerdown",
            self.pointerdown.as_ref().unchecked_ref(),
        );
        if let Some(document) = window.document() {
            let _ = document.remove_event_listener_with_callback(
                "visibilitychange",
                self.visibility.as_ref().unchecked_ref(),
            );
        }
    }
}

// === Timers ===

/// `setTimeout`-backed scheduler
#[derive(Default)]
pub struct TimeoutScheduler;

impl Scheduler for TimeoutScheduler {
    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce()>) -> Result<TimerId, SchedulerError> {
        let window = web_sys::window().ok_or(SchedulerError::Unavailable)?;
        let callback = Closure::once_into_js(move || task());
        let millis = i32::try_from(delay.as_millis()).unwrap_or(i32::MAX);
        let handle = window
            .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), millis)
            .map_err(|e| SchedulerError::Rejected(format!("{:?}", e)))?;
        Ok(TimerId(handle as u64))
    }

    fn cancel(&self, id: TimerId) {
        if let (Ok(handle), Some(window)) = (i32::try_from(id.0), web_sys::window()) {
            window.clear_timeout_with_handle(handle);
        }
    }
}

// === Socket transport ===

#[wasm_bindgen]
extern "C" {
    /// A Socket.IO client socket (or anything with the same surface)
    pub type JsSocket;

    #[wasm_bindgen(method)]
    fn connect(this: &JsSocket);
    #[wasm_bindgen(method)]
    fn disconnect(this: &JsSocket);
    #[wasm_bindgen(method, getter)]
    fn connected(this: &JsSocket) -> bool;
    #[wasm_bindgen(method)]
    fn emit(this: &JsSocket, event: &str, payload: JsValue);
    #[wasm_bindgen(method)]
    fn on(this: &JsSocket, event: &str, handler: &js_sys::Function);
    #[wasm_bindgen(method)]
    fn off(this: &JsSocket, event: &str, handler: &js_sys::Function);
}

struct BoundHandler {
    event: String,
    handler: TransportHandler,
    closure: Closure<dyn FnMut(JsValue)>,
}

/// [`Transport`] over a JS socket
pub struct SocketTransport {
    socket: JsSocket,
    bound: RefCell<Vec<BoundHandler>>,
}

impl Transport for SocketTransport {
    fn connect(&self) {
        self.socket.connect();
    }

    fn disconnect(&self) {
        self.socket.disconnect();
    }

    fn connected(&self) -> bool {
        self.socket.connected()
    }

    fn emit(&self, event: &str, payload: Value) {
        self.socket.emit(event, to_js(&payload));
    }

    fn on(&self, event: &str, handler: TransportHandler) {
        let rust_handler = handler.clone();
        let closure = Closure::<dyn FnMut(JsValue)>::new(move |payload: JsValue| {
            rust_handler(&from_js(&payload));
        });
        self.socket.on(event, closure.as_ref().unchecked_ref());
        self.bound.borrow_mut().push(BoundHandler {
            event: event.to_string(),
            handler,
            closure,
        });
    }

    fn off(&self, event: &str, handler: &TransportHandler) {
        let mut bound = self.bound.borrow_mut();
        bound.retain(|b| {
            let matches = b.event == event && Rc::ptr_eq(&b.handler, handler);
            if matches {
                self.socket.off(event, b.closure.as_ref().unchecked_ref());
            }
            !matches
        });
    }
}

/// Builds sockets through a JS function `(url, token, options) => socket`
pub struct SocketFactory {
    create: js_sys::Function,
}

impl TransportFactory for SocketFactory {
    fn create(
        &self,
        url: &str,
        credentials: &Credentials,
        options: &TransportOptions,
    ) -> Result<Rc<dyn Transport>, TransportError> {
        let options = serde_json::to_value(options).map_err(|e| TransportError::Other(e.to_string()))?;
        let socket = self
            .create
            .call3(
                &JsValue::NULL,
                &JsValue::from_str(url),
                &JsValue::from_str(&credentials.token),
                &to_js(&options),
            )
            .map_err(|e| TransportError::Construction {
                url: url.to_string(),
                reason: format!("{:?}", e),
            })?;
        if socket.is_undefined() || socket.is_null() {
            return Err(TransportError::Construction {
                url: url.to_string(),
                reason: "factory returned no socket".to_string(),
            });
        }
        Ok(Rc::new(SocketTransport {
            socket: socket.unchecked_into(),
            bound: RefCell::new(Vec::new()),
        }))
    }
}

/// Hands notifications to a JS toast function as JSON
struct JsSink {
    toast: js_sys::Function,
}

impl NotificationSink for JsSink {
    fn notify(&self, notification: Notification) {
        let payload = serde_json::to_value(&notification).unwrap_or(Value::Null);
        if let Err(e) = self.toast.call1(&JsValue::NULL, &to_js(&payload)) {
            log::error!("Toast callback failed: {:?}", e);
        }
    }
}

// === JS-facing handles ===

/// The obstacle game, driven by requestAnimationFrame
#[wasm_bindgen]
pub struct WebArcade {
    session: Rc<RefCell<GameSession>>,
    frame_loop: Rc<FrameLoop>,
    input: RefCell<Option<InputBindings>>,
}

#[wasm_bindgen]
impl WebArcade {
    /// Start a game on `host` (the element that takes taps and clicks);
    /// `render` receives the state snapshot every frame
    #[wasm_bindgen(constructor)]
    pub fn new(seed: f64, host: web_sys::Element, render: js_sys::Function) -> WebArcade {
        let store = open_store();
        let session = Rc::new(RefCell::new(GameSession::new(seed as u64, store.as_ref())));
        let frame_loop = Rc::new(FrameLoop::start(
            session.clone(),
            store,
            move |state: &GameState| {
                let snapshot = serde_json::to_value(state).unwrap_or(Value::Null);
                if let Err(e) = render.call1(&JsValue::NULL, &to_js(&snapshot)) {
                    log::error!("Render callback failed: {:?}", e);
                }
            },
        ));
        let input = InputBindings::attach(host, session.clone(), frame_loop.clone());
        log::info!("Arcade started with seed {}", seed as u64);
        WebArcade {
            session,
            frame_loop,
            input: RefCell::new(input),
        }
    }

    pub fn jump(&self) {
        self.session.borrow_mut().jump();
    }

    pub fn restart(&self, seed: f64) {
        self.frame_loop.pause();
        self.session.borrow_mut().restart(seed as u64);
        self.frame_loop.resume();
    }

    #[wasm_bindgen(js_name = bestScore)]
    pub fn best_score(&self) -> u32 {
        self.session.borrow().best_score()
    }

    /// Component unmounted
    pub fn stop(&self) {
        self.frame_loop.stop();
        self.input.borrow_mut().take();
    }
}

/// Live waitlist updates
#[wasm_bindgen]
pub struct WebRelay {
    relay: NotificationRelay,
}

/// Registration returned by [`WebRelay::subscribe`]
#[wasm_bindgen]
pub struct WebSubscription {
    inner: Subscription,
}

#[wasm_bindgen]
impl WebSubscription {
    pub fn unsubscribe(&self) {
        self.inner.unsubscribe();
    }
}

#[wasm_bindgen]
impl WebRelay {
    /// `create_socket(url, token, options)` builds the socket, `toast(n)`
    /// shows a notification
    #[wasm_bindgen(constructor)]
    pub fn new(create_socket: js_sys::Function, toast: js_sys::Function) -> WebRelay {
        let store = open_store();
        let config = RelayConfig::load(store.as_ref());
        let relay = NotificationRelay::new(
            config,
            Rc::new(SocketFactory {
                create: create_socket,
            }),
            Rc::new(TimeoutScheduler),
            store,
            Rc::new(JsSink { toast }),
        );
        WebRelay { relay }
    }

    pub fn connect(&self, token: String) {
        self.relay.connect(Credentials::new(token));
    }

    pub fn disconnect(&self) {
        self.relay.disconnect();
    }

    /// Listen for an event by wire name (`"position-updated"`, `"connect"`, ...,
    /// or `"degraded"`)
    pub fn subscribe(&self, event: &str, callback: js_sys::Function) -> Option<WebSubscription> {
        let kind = EventKind::from_name(event).or((event == "degraded").then_some(EventKind::Degraded))?;
        let listener: Listener = Rc::new(move |relayed: &RelayEvent| -> ListenerResult {
            let payload = serde_json::to_value(relayed)?;
            callback
                .call1(&JsValue::NULL, &to_js(&payload))
                .map_err(|e| format!("{:?}", e))?;
            Ok(())
        });
        Some(WebSubscription {
            inner: self.relay.on(kind, listener),
        })
    }
}
