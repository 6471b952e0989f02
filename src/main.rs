//! Waitlist Arcade entry point
//!
//! On the web this only sets up logging; the page constructs `WebArcade` and
//! `WebRelay` itself. Natively it runs a headless demo of both halves.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub async fn wasm_main() {
    console_error_panic_hook::set_once();
    if console_log::init_with_level(log::Level::Info).is_err() {
        web_sys::console::warn_1(&"Logger already initialized".into());
    }
    log::info!("Waitlist Arcade (web) ready");
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Waitlist Arcade (native) starting...");

    let seed = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(42);

    demo::autopilot_run(seed);
    demo::relay_walkthrough();
}

#[cfg(not(target_arch = "wasm32"))]
mod demo {
    use std::rc::Rc;
    use std::time::Duration;

    use serde_json::json;
    use waitlist_arcade::consts::FRAME_MS;
    use waitlist_arcade::platform::MemoryStore;
    use waitlist_arcade::relay::{
        Credentials, EventKind, ListenerResult, LogSink, ManualScheduler, MemoryTransportFactory,
        RelayEvent, SERVER_DISCONNECT,
    };
    use waitlist_arcade::sim::{FrameOutcome, GameSession, autopilot_wants_jump};
    use waitlist_arcade::{NotificationRelay, RelayConfig};

    /// Frames before the demo gives up on a run that never ends
    const MAX_FRAMES: u32 = 60 * 60 * 5;

    /// Play one seeded game with the autopilot at a steady 60 fps
    pub fn autopilot_run(seed: u64) {
        let store = MemoryStore::new();
        let mut session = GameSession::new(seed, &store);
        session.jump();

        let mut now = 0.0;
        for _ in 0..MAX_FRAMES {
            if autopilot_wants_jump(session.snapshot()) {
                session.jump();
            }
            if session.frame(now, &store) == FrameOutcome::Stop {
                break;
            }
            now += FRAME_MS;
        }

        let state = session.snapshot();
        println!(
            "seed {}: score {} ({}) after {} frames, best {}",
            seed,
            state.score,
            state.phase.as_str(),
            state.frames,
            session.best_score()
        );
        session.teardown();
    }

    /// Drive the relay through a connect, a push, and a server kick
    pub fn relay_walkthrough() {
        let factory = Rc::new(MemoryTransportFactory::new());
        let scheduler = Rc::new(ManualScheduler::new());
        let store = Rc::new(MemoryStore::new());
        let relay = NotificationRelay::new(
            RelayConfig::default(),
            factory.clone(),
            scheduler.clone(),
            store,
            Rc::new(LogSink),
        );

        let subscription = relay.on(
            EventKind::PositionUpdated,
            Rc::new(|event: &RelayEvent| -> ListenerResult {
                println!("listener saw {:?}", event);
                Ok(())
            }),
        );

        relay.connect(Credentials::new("demo-token"));
        let Some(transport) = factory.latest() else {
            log::error!("Relay did not create a transport");
            return;
        };
        transport.accept();
        println!("relay status: {:?}", relay.status());

        transport.push("position-updated", json!({ "position": 7, "previousPosition": 19 }));

        transport.drop_connection(SERVER_DISCONNECT);
        println!(
            "after server disconnect: {:?}, retry pending: {}",
            relay.status(),
            relay.reconnect_pending()
        );
        scheduler.advance(Duration::from_secs(1));
        if let Some(transport) = factory.latest() {
            transport.accept();
        }
        println!(
            "after reconnect: {:?} ({} transports built)",
            relay.status(),
            factory.created().len()
        );

        subscription.unsubscribe();
        relay.disconnect();
    }
}
