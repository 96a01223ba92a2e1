//! Physics simulation using `Rapier2D` with deterministic behavior.
//!
//! Besides owning the Rapier sets, the world keeps a typed index from body and
//! collider handles to [`BodyKind`], so collision pairs can be classified
//! without string labels.

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use parking_lot::Mutex;
use rapier2d::prelude::*;

/// Fixed timestep for physics simulation (60Hz).
pub const PHYSICS_DT: f32 = 1.0 / 60.0;

/// Default gravity vector (downward, in pixels/s²).
pub fn default_gravity() -> Vector {
    Vector::new(0.0, 981.0)
}

/// Which flank of the launch pad a sensor covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// -1 for left, +1 for right.
    pub fn sign(self) -> f32 {
        match self {
            Self::Left => -1.0,
            Self::Right => 1.0,
        }
    }
}

/// Gameplay classification attached to every body or collider at creation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BodyKind {
    Runner,
    Obstacle,
    Hazard,
    Platform,
    PadPlank,
    PadSensor(Side),
    Trigger(String),
}

/// Index from physics identity to [`BodyKind`].
#[derive(Debug, Clone, Default)]
pub struct BodyTags {
    bodies: HashMap<RigidBodyHandle, BodyKind>,
    colliders: HashMap<ColliderHandle, BodyKind>,
}

impl BodyTags {
    pub fn tag_body(&mut self, handle: RigidBodyHandle, kind: BodyKind) {
        self.bodies.insert(handle, kind);
    }

    pub fn tag_collider(&mut self, handle: ColliderHandle, kind: BodyKind) {
        self.colliders.insert(handle, kind);
    }

    pub fn body_kind(&self, handle: RigidBodyHandle) -> Option<&BodyKind> {
        self.bodies.get(&handle)
    }

    pub fn collider_kind(&self, handle: ColliderHandle) -> Option<&BodyKind> {
        self.colliders.get(&handle)
    }

    fn forget_body(&mut self, handle: RigidBodyHandle) {
        self.bodies.remove(&handle);
    }

    fn forget_collider(&mut self, handle: ColliderHandle) {
        self.colliders.remove(&handle);
    }

    pub fn len(&self) -> usize {
        self.bodies.len() + self.colliders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty() && self.colliders.is_empty()
    }
}

/// Collects collision events synchronously while the pipeline steps.
#[derive(Default)]
struct CollisionCollector {
    events: Mutex<Vec<CollisionEvent>>,
}

impl EventHandler for CollisionCollector {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        event: CollisionEvent,
        _contact_pair: Option<&ContactPair>,
    ) {
        self.events.lock().push(event);
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: Real,
    ) {
    }
}

/// Physics world containing all `Rapier2D` components for deterministic simulation.
pub struct PhysicsWorld {
    pub rigid_body_set: RigidBodySet,
    pub collider_set: ColliderSet,
    pub integration_parameters: IntegrationParameters,
    pub physics_pipeline: PhysicsPipeline,
    pub island_manager: IslandManager,
    pub broad_phase: DefaultBroadPhase,
    pub narrow_phase: NarrowPhase,
    pub impulse_joint_set: ImpulseJointSet,
    pub multibody_joint_set: MultibodyJointSet,
    pub ccd_solver: CCDSolver,
    pub gravity: Vector,
    pub frame: u64,
    tags: BodyTags,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PhysicsWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhysicsWorld")
            .field("frame", &self.frame)
            .field("rigid_body_count", &self.rigid_body_set.len())
            .field("collider_count", &self.collider_set.len())
            .field("gravity", &self.gravity)
            .finish_non_exhaustive()
    }
}

impl PhysicsWorld {
    /// Creates a new physics world with default settings.
    pub fn new() -> Self {
        Self::with_gravity(default_gravity())
    }

    /// Creates a new physics world with custom gravity.
    pub fn with_gravity(gravity: Vector) -> Self {
        let integration_parameters = IntegrationParameters {
            dt: PHYSICS_DT,
            ..Default::default()
        };

        Self {
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            integration_parameters,
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            gravity,
            frame: 0,
            tags: BodyTags::default(),
        }
    }

    /// Advances the simulation by one fixed timestep and returns the
    /// collision events reported during that step, in the order Rapier
    /// emitted them.
    pub fn step_with_events(&mut self) -> Vec<CollisionEvent> {
        let collector = CollisionCollector::default();
        self.physics_pipeline.step(
            self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            &(),
            &collector,
        );
        self.frame += 1;
        collector.events.into_inner()
    }

    /// Advances the physics simulation by multiple steps, discarding events.
    pub fn step_n(&mut self, n: u32) {
        for _ in 0..n {
            self.step_with_events();
        }
    }

    /// Adds a rigid body tagged with `kind`.
    pub fn add_tagged_body(&mut self, rigid_body: RigidBody, kind: BodyKind) -> RigidBodyHandle {
        let handle = self.rigid_body_set.insert(rigid_body);
        self.tags.tag_body(handle, kind);
        handle
    }

    /// Adds a collider attached to a rigid body.
    pub fn add_collider(&mut self, collider: Collider, parent: RigidBodyHandle) -> ColliderHandle {
        self.collider_set
            .insert_with_parent(collider, parent, &mut self.rigid_body_set)
    }

    /// Adds a parentless collider tagged with `kind`.
    pub fn add_tagged_static_collider(&mut self, collider: Collider, kind: BodyKind) -> ColliderHandle {
        let handle = self.collider_set.insert(collider);
        self.tags.tag_collider(handle, kind);
        handle
    }

    /// Removes a rigid body, its attached colliders, and their tags.
    pub fn remove_rigid_body(&mut self, handle: RigidBodyHandle) {
        if let Some(body) = self.rigid_body_set.get(handle) {
            for collider in body.colliders() {
                self.tags.forget_collider(*collider);
            }
        }
        self.tags.forget_body(handle);
        self.rigid_body_set.remove(
            handle,
            &mut self.island_manager,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            true,
        );
    }

    /// Removes a parentless collider and its tag.
    pub fn remove_static_collider(&mut self, handle: ColliderHandle) {
        self.tags.forget_collider(handle);
        self.collider_set.remove(
            handle,
            &mut self.island_manager,
            &mut self.rigid_body_set,
            true,
        );
    }

    /// Gets an immutable reference to a rigid body.
    pub fn get_rigid_body(&self, handle: RigidBodyHandle) -> Option<&RigidBody> {
        self.rigid_body_set.get(handle)
    }

    /// Gets a mutable reference to a rigid body.
    pub fn get_rigid_body_mut(&mut self, handle: RigidBodyHandle) -> Option<&mut RigidBody> {
        self.rigid_body_set.get_mut(handle)
    }

    /// Resolves a collider to its compound root: the parent body if it has
    /// one, otherwise the collider itself.
    pub fn root_of(&self, collider: ColliderHandle) -> BodyRoot {
        match self.collider_set.get(collider).and_then(Collider::parent) {
            Some(parent) => BodyRoot::Body(parent),
            None => BodyRoot::Collider(collider),
        }
    }

    /// Classifies a collider, looking at its compound root's tag first.
    pub fn kind_of(&self, collider: ColliderHandle) -> Option<&BodyKind> {
        match self.root_of(collider) {
            BodyRoot::Body(parent) => self
                .tags
                .body_kind(parent)
                .or_else(|| self.tags.collider_kind(collider)),
            BodyRoot::Collider(handle) => self.tags.collider_kind(handle),
        }
    }

    pub fn tags(&self) -> &BodyTags {
        &self.tags
    }

    /// Computes a deterministic hash of the current physics state.
    pub fn compute_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.frame.hash(&mut hasher);

        for (handle, body) in self.rigid_body_set.iter() {
            let (index, generation) = handle.into_raw_parts();
            index.hash(&mut hasher);
            generation.hash(&mut hasher);

            let pos = body.translation();
            hash_f32(pos.x, &mut hasher);
            hash_f32(pos.y, &mut hasher);

            let rot = body.rotation().angle();
            hash_f32(rot, &mut hasher);

            let linvel = body.linvel();
            hash_f32(linvel.x, &mut hasher);
            hash_f32(linvel.y, &mut hasher);

            hash_f32(body.angvel(), &mut hasher);
        }

        hasher.finish()
    }

    /// Returns the current simulation frame number.
    pub fn current_frame(&self) -> u64 {
        self.frame
    }
}

/// The compound root a collider belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyRoot {
    Body(RigidBodyHandle),
    Collider(ColliderHandle),
}

/// Hashes a f32 value by converting to bits.
fn hash_f32(value: f32, hasher: &mut impl Hasher) {
    value.to_bits().hash(hasher);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_physics_world_creation() {
        let world = PhysicsWorld::new();
        assert_eq!(world.frame, 0);
        assert_eq!(world.integration_parameters.dt, PHYSICS_DT);
        assert!(world.tags().is_empty());
    }

    #[test]
    fn test_deterministic_simulation() {
        let mut world1 = PhysicsWorld::new();
        let mut world2 = PhysicsWorld::new();

        let body = RigidBodyBuilder::dynamic()
            .translation(Vector::new(100.0, 100.0))
            .build();
        let collider = ColliderBuilder::ball(10.0).restitution(0.7).build();

        let handle1 = world1.add_tagged_body(body.clone(), BodyKind::Hazard);
        world1.add_collider(collider.clone(), handle1);
        let handle2 = world2.add_tagged_body(body, BodyKind::Hazard);
        world2.add_collider(collider, handle2);

        world1.step_n(100);
        world2.step_n(100);

        assert_eq!(world1.compute_hash(), world2.compute_hash());
        assert_eq!(world1.current_frame(), 100);
    }

    #[test]
    fn test_kind_of_resolves_compound_root() {
        let mut world = PhysicsWorld::new();
        let body = world.add_tagged_body(RigidBodyBuilder::dynamic().build(), BodyKind::Obstacle);
        let a = world.add_collider(ColliderBuilder::cuboid(10.0, 2.0).build(), body);
        let b = world.add_collider(
            ColliderBuilder::cuboid(10.0, 2.0)
                .translation(Vector::new(20.0, 0.0))
                .build(),
            body,
        );
        let goal = world.add_tagged_static_collider(
            ColliderBuilder::cuboid(30.0, 30.0).sensor(true).build(),
            BodyKind::Trigger("goal".to_string()),
        );

        assert_eq!(world.kind_of(a), Some(&BodyKind::Obstacle));
        assert_eq!(world.kind_of(b), Some(&BodyKind::Obstacle));
        assert_eq!(world.root_of(a), world.root_of(b));
        assert_eq!(
            world.kind_of(goal),
            Some(&BodyKind::Trigger("goal".to_string()))
        );
    }

    #[test]
    fn test_remove_body_forgets_tags() {
        let mut world = PhysicsWorld::new();
        let body = world.add_tagged_body(RigidBodyBuilder::dynamic().build(), BodyKind::Hazard);
        let collider = world.add_collider(ColliderBuilder::ball(5.0).build(), body);
        assert_eq!(world.kind_of(collider), Some(&BodyKind::Hazard));

        world.remove_rigid_body(body);
        assert!(world.get_rigid_body(body).is_none());
        assert_eq!(world.kind_of(collider), None);
        assert!(world.tags().is_empty());
    }

    #[test]
    fn test_step_reports_sensor_collision() {
        let mut world = PhysicsWorld::with_gravity(Vector::new(0.0, 0.0));
        let sensor = world.add_tagged_static_collider(
            ColliderBuilder::cuboid(30.0, 30.0)
                .translation(Vector::new(100.0, 100.0))
                .sensor(true)
                .active_events(ActiveEvents::COLLISION_EVENTS)
                .build(),
            BodyKind::Trigger("goal".to_string()),
        );
        let ball = world.add_tagged_body(
            RigidBodyBuilder::dynamic()
                .translation(Vector::new(100.0, 100.0))
                .build(),
            BodyKind::Runner,
        );
        world.add_collider(
            ColliderBuilder::ball(5.0)
                .active_events(ActiveEvents::COLLISION_EVENTS)
                .build(),
            ball,
        );

        let events = world.step_with_events();
        assert!(
            events
                .iter()
                .any(|e| e.started() && (e.collider1() == sensor || e.collider2() == sensor))
        );
    }
}
