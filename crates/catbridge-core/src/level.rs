//! Level configuration records and the level catalog.
//!
//! Levels are JSON documents. Every optional block falls back to a
//! documented default, and [`LevelConfig::sanitized`] repairs malformed
//! numbers so a bad record never reaches the rule engine.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::geometry::Point;

/// Ink budget used when a level omits or corrupts its own.
pub const DEFAULT_INK_MAX: f32 = 260.0;
/// Level substituted when a requested id is missing.
pub const DEFAULT_LEVEL_ID: u32 = 1;
/// Walk speed floor in pixels/second.
pub const DEFAULT_WALK_SPEED: f32 = 132.0;
/// Default hazard radius in pixels.
pub const DEFAULT_HAZARD_RADIUS: f32 = 18.0;
/// Default stuck-detection movement threshold in pixels per window.
pub const DEFAULT_MIN_MOVE_PX: f32 = 8.0;
/// Side length of the goal sensor in pixels.
pub const DEFAULT_GOAL_SIZE: f32 = 60.0;
/// Trigger id reserved for the goal sensor.
pub const GOAL_TRIGGER_ID: &str = "goal";

/// Errors raised while loading level records.
#[derive(Debug, thiserror::Error)]
pub enum LevelError {
    #[error("invalid level JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read level file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("level catalog contains no levels")]
    EmptyCatalog,
}

/// Static platform rectangle. Visual annotations in the record are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    /// Rotation in radians.
    #[serde(default, alias = "angle")]
    pub rotation: f32,
}

/// Named, non-solid trigger zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerZone {
    pub id: String,
    pub x: f32,
    pub y: f32,
    #[serde(default = "default_goal_size")]
    pub w: f32,
    #[serde(default = "default_goal_size")]
    pub h: f32,
}

fn default_goal_size() -> f32 {
    DEFAULT_GOAL_SIZE
}

/// Hazard schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HazardConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, alias = "delayMs")]
    pub start_delay_ms: u64,
    /// Fraction of world width.
    #[serde(default = "default_spawn_x")]
    pub spawn_x: f32,
    /// Absolute pixels, usually above the visible area.
    #[serde(default = "default_spawn_y")]
    pub spawn_y: f32,
    #[serde(default)]
    pub repeat: bool,
    #[serde(default, alias = "everyMs")]
    pub interval_ms: u64,
    #[serde(default = "default_hazard_radius")]
    pub radius: f32,
    /// Defaults to world height + 200.
    #[serde(default)]
    pub kill_below_y: Option<f32>,
}

fn default_true() -> bool {
    true
}

fn default_spawn_x() -> f32 {
    0.5
}

fn default_spawn_y() -> f32 {
    -50.0
}

fn default_hazard_radius() -> f32 {
    DEFAULT_HAZARD_RADIUS
}

impl Default for HazardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            start_delay_ms: 0,
            spawn_x: default_spawn_x(),
            spawn_y: default_spawn_y(),
            repeat: false,
            interval_ms: 0,
            radius: DEFAULT_HAZARD_RADIUS,
            kill_below_y: None,
        }
    }
}

/// Launch pad placement and tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchPadConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub x: f32,
    pub y: f32,
    #[serde(default = "default_pad_width")]
    pub width: f32,
    #[serde(default = "default_pad_height")]
    pub height: f32,
    #[serde(default = "default_sensor_width")]
    pub sensor_width: f32,
    #[serde(default = "default_sensor_height")]
    pub sensor_height: f32,
    /// Upward launch speed in pixels/second.
    #[serde(default = "default_up_velocity", alias = "upSpeed")]
    pub up_velocity: f32,
    /// Nominal flight time in seconds.
    #[serde(default = "default_flight_time")]
    pub flight_time: f32,
    /// Empirical scale applied to `dx / flight_time`.
    #[serde(default = "default_horizontal_scale")]
    pub horizontal_scale: f32,
    #[serde(default)]
    pub extra_x_boost: f32,
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
    #[serde(default = "default_tilt_angle")]
    pub tilt_angle: f32,
    #[serde(default = "default_tilt_duration_ms")]
    pub tilt_duration_ms: u64,
}

fn default_pad_width() -> f32 {
    220.0
}
fn default_pad_height() -> f32 {
    20.0
}
fn default_sensor_width() -> f32 {
    90.0
}
fn default_sensor_height() -> f32 {
    60.0
}
fn default_up_velocity() -> f32 {
    570.0
}
fn default_flight_time() -> f32 {
    0.95
}
fn default_horizontal_scale() -> f32 {
    0.6
}
fn default_cooldown_ms() -> u64 {
    600
}
fn default_tilt_angle() -> f32 {
    0.28
}
fn default_tilt_duration_ms() -> u64 {
    160
}

impl LaunchPadConfig {
    /// Pad at the given position with every tunable at its default.
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            enabled: true,
            x,
            y,
            width: default_pad_width(),
            height: default_pad_height(),
            sensor_width: default_sensor_width(),
            sensor_height: default_sensor_height(),
            up_velocity: default_up_velocity(),
            flight_time: default_flight_time(),
            horizontal_scale: default_horizontal_scale(),
            extra_x_boost: 0.0,
            cooldown_ms: default_cooldown_ms(),
            tilt_angle: default_tilt_angle(),
            tilt_duration_ms: default_tilt_duration_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MovementMode {
    #[default]
    Walk,
    Launch,
}

/// How the runner moves once the attempt starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movement {
    #[serde(default)]
    pub mode: MovementMode,
    /// Forward speed floor in walk mode, pixels/second.
    #[serde(default = "default_walk_speed")]
    pub speed: f32,
    /// Cosmetic sway before a stroke is drawn.
    #[serde(default)]
    pub glide: bool,
}

fn default_walk_speed() -> f32 {
    DEFAULT_WALK_SPEED
}

impl Default for Movement {
    fn default() -> Self {
        Self {
            mode: MovementMode::Walk,
            speed: DEFAULT_WALK_SPEED,
            glide: false,
        }
    }
}

/// Exactly one win rule is active per level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum WinRule {
    #[default]
    ReachGoal,
    Survive {
        #[serde(alias = "ms")]
        duration_ms: u64,
    },
    EnterTrigger {
        trigger_id: String,
    },
}

/// Independent lose conditions; any one firing is terminal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoseRule {
    #[serde(default, alias = "noWinAfterMs")]
    pub no_win_timeout_ms: Option<u64>,
    #[serde(default)]
    pub stuck_ms: Option<u64>,
    #[serde(default)]
    pub min_move_px: Option<f32>,
    /// Defaults to world height + 200.
    #[serde(default, alias = "fellBelowY")]
    pub fall_below_y: Option<f32>,
}

/// Immutable per-attempt level record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelConfig {
    pub id: u32,
    #[serde(default = "default_ink_max")]
    pub ink_max: f32,
    #[serde(default)]
    pub platforms: Vec<PlatformRect>,
    #[serde(default = "default_start")]
    pub start: Point,
    #[serde(default = "default_goal")]
    pub goal: Point,
    #[serde(default)]
    pub triggers: Vec<TriggerZone>,
    #[serde(default)]
    pub hazard: Option<HazardConfig>,
    #[serde(default, alias = "seesaw")]
    pub launch_pad: Option<LaunchPadConfig>,
    #[serde(default)]
    pub movement: Movement,
    #[serde(default)]
    pub win: WinRule,
    #[serde(default)]
    pub lose: LoseRule,
}

fn default_ink_max() -> f32 {
    DEFAULT_INK_MAX
}

fn default_start() -> Point {
    Point::new(0.15, 0.6)
}

fn default_goal() -> Point {
    Point::new(0.78, 0.6)
}

impl LevelConfig {
    /// Minimal level: flat ground, default start and goal.
    pub fn new(id: u32) -> Self {
        Self {
            id,
            ink_max: DEFAULT_INK_MAX,
            platforms: vec![PlatformRect {
                x: 0.5,
                y: 0.7,
                w: 1.0,
                h: 128.0,
                rotation: 0.0,
            }],
            start: default_start(),
            goal: default_goal(),
            triggers: Vec::new(),
            hazard: None,
            launch_pad: None,
            movement: Movement::default(),
            win: WinRule::ReachGoal,
            lose: LoseRule::default(),
        }
    }

    /// Loads a single level record from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, LevelError> {
        Ok(serde_json::from_str::<Self>(json)?.sanitized())
    }

    /// Serializes the level record to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Replaces malformed numeric fields with their defaults.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        if !self.ink_max.is_finite() || self.ink_max <= 0.0 {
            warn!(level = self.id, ink = self.ink_max, "invalid ink budget, using default");
            self.ink_max = DEFAULT_INK_MAX;
        }
        if !self.start.is_finite() {
            warn!(level = self.id, "invalid start position, using default");
            self.start = default_start();
        }
        if !self.goal.is_finite() {
            warn!(level = self.id, "invalid goal position, using default");
            self.goal = default_goal();
        }
        if !self.movement.speed.is_finite() || self.movement.speed <= 0.0 {
            warn!(level = self.id, "invalid walk speed, using default");
            self.movement.speed = DEFAULT_WALK_SPEED;
        }
        if let Some(hazard) = &mut self.hazard {
            if !hazard.radius.is_finite() || hazard.radius <= 0.0 {
                warn!(level = self.id, "invalid hazard radius, using default");
                hazard.radius = DEFAULT_HAZARD_RADIUS;
            }
        }
        if let Some(pad) = &mut self.launch_pad {
            if !pad.flight_time.is_finite() || pad.flight_time <= 0.0 {
                warn!(level = self.id, "invalid launch flight time, using default");
                pad.flight_time = default_flight_time();
            }
            if !pad.width.is_finite() || pad.width <= 0.0 {
                pad.width = default_pad_width();
            }
            if !pad.height.is_finite() || pad.height <= 0.0 {
                pad.height = default_pad_height();
            }
            if !pad.sensor_width.is_finite() || pad.sensor_width <= 0.0 {
                pad.sensor_width = default_sensor_width();
            }
            if !pad.sensor_height.is_finite() || pad.sensor_height <= 0.0 {
                pad.sensor_height = default_sensor_height();
            }
            if !pad.up_velocity.is_finite() || pad.up_velocity <= 0.0 {
                warn!(level = self.id, "invalid launch speed, using default");
                pad.up_velocity = default_up_velocity();
            }
            if !pad.horizontal_scale.is_finite() || pad.horizontal_scale < 0.0 {
                pad.horizontal_scale = default_horizontal_scale();
            }
            if !pad.extra_x_boost.is_finite() {
                pad.extra_x_boost = 0.0;
            }
        }
        for zone in &mut self.triggers {
            if !zone.w.is_finite() || zone.w <= 0.0 {
                zone.w = DEFAULT_GOAL_SIZE;
            }
            if !zone.h.is_finite() || zone.h <= 0.0 {
                zone.h = DEFAULT_GOAL_SIZE;
            }
        }
        if self
            .lose
            .min_move_px
            .is_some_and(|v| !v.is_finite() || v < 0.0)
        {
            warn!(level = self.id, "invalid minMovePx, using default");
            self.lose.min_move_px = Some(DEFAULT_MIN_MOVE_PX);
        }
        self.platforms
            .retain(|p| p.w.is_finite() && p.h.is_finite() && p.w > 0.0 && p.h > 0.0);
        self
    }

    /// The trigger id whose contact wins the level, if the win rule is
    /// collision-based.
    pub fn winning_trigger(&self) -> Option<&str> {
        match &self.win {
            WinRule::ReachGoal => Some(GOAL_TRIGGER_ID),
            WinRule::EnterTrigger { trigger_id } => Some(trigger_id),
            WinRule::Survive { .. } => None,
        }
    }
}

/// All known levels, keyed by id.
#[derive(Debug, Clone)]
pub struct LevelCatalog {
    levels: BTreeMap<u32, LevelConfig>,
}

impl LevelCatalog {
    /// The built-in catalog, compiled into the binary.
    pub fn builtin() -> Self {
        const LEVELS_JSON: &str = include_str!("../levels/levels.json");
        Self::from_json(LEVELS_JSON).expect("Failed to parse built-in levels JSON")
    }

    /// Parses a JSON array of level records.
    pub fn from_json(json: &str) -> Result<Self, LevelError> {
        let records: Vec<LevelConfig> = serde_json::from_str(json)?;
        if records.is_empty() {
            return Err(LevelError::EmptyCatalog);
        }
        let levels = records
            .into_iter()
            .map(|level| (level.id, level.sanitized()))
            .collect();
        Ok(Self { levels })
    }

    /// Reads a catalog from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LevelError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| LevelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Returns the requested level, or the default level when it is absent.
    pub fn get(&self, id: u32) -> LevelConfig {
        if let Some(level) = self.levels.get(&id) {
            return level.clone();
        }
        warn!(requested = id, "unknown level id, substituting default level");
        self.levels
            .get(&DEFAULT_LEVEL_ID)
            .or_else(|| self.levels.values().next())
            .cloned()
            .unwrap_or_else(|| LevelConfig::new(DEFAULT_LEVEL_ID))
    }

    pub fn contains(&self, id: u32) -> bool {
        self.levels.contains_key(&id)
    }

    /// The next level after `id`, in id order.
    pub fn next_id(&self, id: u32) -> Option<u32> {
        let after = id.checked_add(1)?;
        self.levels.range(after..).next().map(|(next, _)| *next)
    }

    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.levels.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}
