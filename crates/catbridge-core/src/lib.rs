//! Cat-Bridge Core Library
//!
//! Gameplay core of an ink-drawing physics puzzle: a drawn stroke becomes a
//! rigid obstacle, and a rule engine watches the runner's collisions and
//! timers to decide the attempt's outcome.
//!
//! Physics runs on `Rapier2D` with a fixed timestep. Everything is driven by
//! [`rules::LevelRuleEngine::tick`], one call per frame.

#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

pub mod context;
pub mod geometry;
pub mod hazard;
pub mod launch_pad;
pub mod level;
pub mod physics;
pub mod rules;
pub mod runner;
pub mod scheduler;
pub mod session;
pub mod stroke;

pub use context::{WorldBounds, WorldContext};
pub use geometry::Point;
pub use hazard::HazardSpawner;
pub use launch_pad::{LaunchPad, PadState};
pub use level::{LevelCatalog, LevelConfig, LevelError, MovementMode, WinRule};
pub use physics::{BodyKind, PHYSICS_DT, PhysicsWorld, Side, default_gravity};
pub use rules::{
    AttemptPhase, EventQueue, GameEvent, LevelRuleEngine, LoseReason, Outcome, RuleEvent,
    WinReport,
};
pub use runner::{Motion, RunnerAgent, RunnerState};
pub use scheduler::{Scheduler, TimerId, TimerKind};
pub use session::GameSession;
pub use stroke::{PhysicsAuthor, Stroke, StrokeCapture, simplify};
