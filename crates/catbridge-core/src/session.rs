//! Level lifecycle around the rule engine: load, restart, advance.

use tracing::info;

use crate::context::{WorldBounds, WorldContext};
use crate::level::LevelCatalog;
use crate::rules::{GameEvent, LevelRuleEngine, RuleEvent};

/// A catalog plus the currently loaded level and its world.
#[derive(Debug)]
pub struct GameSession {
    catalog: LevelCatalog,
    bounds: WorldBounds,
    ctx: WorldContext,
    engine: LevelRuleEngine,
}

impl GameSession {
    /// Builds the world for level `id` and asks to start it.
    pub fn new(catalog: LevelCatalog, bounds: WorldBounds, id: u32, permitted: bool) -> Self {
        let mut ctx = WorldContext::new(bounds);
        let mut engine = LevelRuleEngine::new(&mut ctx, catalog.get(id));
        engine.begin(permitted);
        Self {
            catalog,
            bounds,
            ctx,
            engine,
        }
    }

    /// Tears the current level down and loads `id` in a fresh world.
    /// Returns whether the new attempt was permitted to start.
    pub fn load(&mut self, id: u32, permitted: bool) -> bool {
        self.engine.teardown(&mut self.ctx);
        self.ctx = WorldContext::new(self.bounds);
        self.engine = LevelRuleEngine::new(&mut self.ctx, self.catalog.get(id));
        info!(level = self.level_id(), "level loaded");
        self.engine.begin(permitted)
    }

    /// Reloads the current level.
    pub fn restart(&mut self, permitted: bool) -> bool {
        self.load(self.level_id(), permitted)
    }

    /// Loads the next level in id order, wrapping to the first.
    pub fn advance(&mut self, permitted: bool) -> bool {
        let next = self
            .catalog
            .next_id(self.level_id())
            .or_else(|| self.catalog.ids().next())
            .unwrap_or(self.level_id());
        self.load(next, permitted)
    }

    pub fn tick(&mut self) {
        self.engine.tick(&mut self.ctx);
    }

    pub fn push(&self, event: GameEvent) {
        self.engine.push(event);
    }

    pub fn drain_events(&mut self) -> Vec<RuleEvent> {
        self.engine.drain_events()
    }

    pub fn level_id(&self) -> u32 {
        self.engine.level().id
    }

    pub fn engine(&self) -> &LevelRuleEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut LevelRuleEngine {
        &mut self.engine
    }

    pub fn context(&self) -> &WorldContext {
        &self.ctx
    }

    pub fn catalog(&self) -> &LevelCatalog {
        &self.catalog
    }
}
