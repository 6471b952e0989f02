//! Game session: the per-frame driver between the host's animation-frame
//! callback and the pure simulation.
//!
//! The host calls [`GameSession::frame`] once per display refresh and stops
//! scheduling frames as soon as it returns [`FrameOutcome::Stop`].

use std::cell::RefCell;

use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::physics::apply_impulse;
use super::state::GameState;
use super::tick::{TickOutcome, tick};
use crate::best_score::BestScore;
use crate::consts::FRAME_MS;
use crate::platform::storage::KeyValueStore;

/// Whether the host should request another frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Continue,
    Stop,
}

/// One game instance with its RNG and best score
pub struct GameSession {
    seed: u64,
    rng: Pcg32,
    state: GameState,
    best: BestScore,
    last_time_ms: Option<f64>,
    torn_down: bool,
}

impl GameSession {
    /// Create a session, loading the best score from `store`
    pub fn new(seed: u64, store: &dyn KeyValueStore) -> Self {
        let mut rng = Pcg32::seed_from_u64(seed);
        let state = GameState::new(&mut rng);
        Self {
            seed,
            rng,
            state,
            best: BestScore::load(store),
            last_time_ms: None,
            torn_down: false,
        }
    }

    /// Read-only snapshot for renderers
    pub fn snapshot(&self) -> &GameState {
        &self.state
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn best_score(&self) -> u32 {
        self.best.value()
    }

    /// Player input (click/tap/space)
    pub fn jump(&mut self) {
        apply_impulse(&mut self.state);
    }

    /// Start over with a new seed. The host should resume requesting frames.
    pub fn restart(&mut self, seed: u64) {
        self.seed = seed;
        self.rng = Pcg32::seed_from_u64(seed);
        self.state.reset(&mut self.rng);
        self.last_time_ms = None;
        self.torn_down = false;
        log::debug!("Session restarted with seed {}", seed);
    }

    /// Stop for good (component unmounted). Every later frame returns `Stop`.
    pub fn teardown(&mut self) {
        self.torn_down = true;
    }

    /// Convert elapsed wall time to frame units. The first frame after a
    /// (re)start counts as exactly one frame.
    fn delta_frames(&mut self, now_ms: f64) -> f32 {
        let delta = match self.last_time_ms {
            Some(last) => ((now_ms - last) / FRAME_MS) as f32,
            None => 1.0,
        };
        self.last_time_ms = Some(now_ms);
        delta
    }

    /// Advance one animation frame at timestamp `now_ms`
    pub fn frame(&mut self, now_ms: f64, store: &dyn KeyValueStore) -> FrameOutcome {
        if self.torn_down || self.state.is_terminated() {
            return FrameOutcome::Stop;
        }

        let delta = self.delta_frames(now_ms);
        let TickOutcome { collided, .. } = tick(&mut self.state, delta, &mut self.rng);

        if collided {
            if self.best.record(self.state.score) {
                log::info!("New best score: {}", self.state.score);
                self.best.save(store);
            }
            return FrameOutcome::Stop;
        }
        FrameOutcome::Continue
    }
}

/// Advance a shared session by one frame, then pass a copy of the state to
/// `render`. The session is not borrowed while `render` runs, so a renderer
/// may call back into it (jump, restart, best score).
pub fn run_shared_frame(
    session: &RefCell<GameSession>,
    now_ms: f64,
    store: &dyn KeyValueStore,
    render: &mut dyn FnMut(&GameState),
) -> FrameOutcome {
    let (outcome, snapshot) = {
        let mut session = session.borrow_mut();
        let outcome = session.frame(now_ms, store);
        (outcome, session.snapshot().clone())
    };
    render(&snapshot);
    outcome
}
