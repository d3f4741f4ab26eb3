use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use glam::Vec3;

use crate::entities::entity::EntityList;
use crate::proto::position::{build_position_update, degrees_to_heading, PositionRecord};
use crate::world::pathfind::{Pathfinder, PathfinderOptions};
use crate::world::zone_map::{ZoneMap, BEST_Z_INVALID};

pub const DEFAULT_RUN_SPEED: f32 = 70.0;
pub const DEFAULT_WALK_SPEED: f32 = 30.0;
/// Below this instantaneous speed the walk animation is used.
const WALK_ANIMATION_THRESHOLD: f32 = 45.0;

const MOVING_UPDATE_INTERVAL: Duration = Duration::from_millis(50);
const IDLE_UPDATE_INTERVAL: Duration = Duration::from_millis(1500);

const WAYPOINT_RADIUS: f32 = 5.0;
const ARRIVAL_RADIUS: f32 = 2.0;

const FOLLOW_CLOSE_DISTANCE: f32 = 10.0;
const FOLLOW_FAR_DISTANCE: f32 = 30.0;
const FOLLOW_MIN_SPEED_MULT: f32 = 0.5;
const FOLLOW_MAX_SPEED_MULT: f32 = 1.5;
/// A follow path is rebuilt when its end has drifted this far from the
/// target entity.
const FOLLOW_REPATH_DRIFT: f32 = 5.0;

const STUCK_WINDOW: Duration = Duration::from_secs(3);
const STUCK_MIN_PROGRESS: f32 = 1.0;

const Z_FIX_INTERVAL: Duration = Duration::from_millis(500);
const Z_FIX_MIN_DIFF: f32 = 1.0;
const Z_FIX_MAX_DIFF: f32 = 20.0;
/// Fraction of the height error corrected per interval; asymptotic so the
/// character does not pop.
const Z_FIX_FACTOR: f32 = 0.3;

/// Frame-time cap; a stalled pump must not teleport the character.
const MAX_TICK_DELTA: Duration = Duration::from_millis(100);

pub const ANIM_STAND: u16 = 0;
pub const ANIM_WALK: u16 = 1;
pub const ANIM_RUN: u16 = 27;

/// Signalled whenever `is_moving` transitions to false so a blocking caller
/// can sleep on the transition instead of spinning.
#[derive(Debug, Default)]
pub struct MoveGate {
    moving: Mutex<bool>,
    signal: Condvar,
}

impl MoveGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_moving(&self, moving: bool) {
        let mut state = self.moving.lock().unwrap_or_else(|err| err.into_inner());
        *state = moving;
        if !moving {
            self.signal.notify_all();
        }
    }

    pub fn is_moving(&self) -> bool {
        *self.moving.lock().unwrap_or_else(|err| err.into_inner())
    }

    /// Blocks until movement stops or `keep_waiting` turns false; the
    /// predicate is re-checked about every 100 ms.
    pub fn wait_until_idle<F: Fn() -> bool>(&self, keep_waiting: F) {
        let mut state = self.moving.lock().unwrap_or_else(|err| err.into_inner());
        while *state && keep_waiting() {
            let (next, _) = self
                .signal
                .wait_timeout(state, Duration::from_millis(100))
                .unwrap_or_else(|err| err.into_inner());
            state = next;
        }
    }
}

/// Read-only world state the tick consults.
pub struct TickContext<'a> {
    pub entities: &'a EntityList,
    pub pathfinder: Option<&'a Pathfinder>,
    pub zone_map: Option<&'a ZoneMap>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// A position update is due this tick.
    pub send_update: bool,
}

/// Tick-driven runner that owns the player's position, heading, speed,
/// follow target, and the active waypoint path.
#[derive(Debug)]
pub struct MovementEngine {
    x: f32,
    y: f32,
    z: f32,
    /// Degrees, 0 = North, clockwise positive.
    heading: f32,
    animation: u16,
    sequence: u16,
    is_moving: bool,
    move_speed: f32,
    target: Option<Vec3>,
    path: Vec<Vec3>,
    path_index: usize,
    follow_target: Option<String>,
    pathfinding_enabled: bool,
    last_tick: Option<Instant>,
    last_move_update: Option<Instant>,
    last_idle_update: Option<Instant>,
    last_z_fix: Option<Instant>,
    /// (distance to the current waypoint, observed at, waypoint index)
    stuck_probe: Option<(f32, Instant, usize)>,
    gate: Arc<MoveGate>,
}

impl MovementEngine {
    pub fn new(gate: Arc<MoveGate>, pathfinding_enabled: bool) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            heading: 0.0,
            animation: ANIM_STAND,
            sequence: 0,
            is_moving: false,
            move_speed: DEFAULT_RUN_SPEED,
            target: None,
            path: Vec::new(),
            path_index: 0,
            follow_target: None,
            pathfinding_enabled,
            last_tick: None,
            last_move_update: None,
            last_idle_update: None,
            last_z_fix: None,
            stuck_probe: None,
            gate: gate.clone(),
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    pub fn heading(&self) -> f32 {
        self.heading
    }

    pub fn animation(&self) -> u16 {
        self.animation
    }

    pub fn is_moving(&self) -> bool {
        self.is_moving
    }

    pub fn follow_target(&self) -> Option<&str> {
        self.follow_target.as_deref()
    }

    pub fn move_speed(&self) -> f32 {
        self.move_speed
    }

    pub fn set_move_speed(&mut self, speed: f32) {
        self.move_speed = speed;
    }

    pub fn pathfinding_enabled(&self) -> bool {
        self.pathfinding_enabled
    }

    pub fn set_pathfinding(&mut self, enabled: bool) {
        self.pathfinding_enabled = enabled;
    }

    /// Adopts the server-authoritative position (player profile, spawn echo,
    /// or a self-addressed ClientUpdate).
    pub fn set_position(&mut self, position: Vec3, heading: f32) {
        self.x = position.x;
        self.y = position.y;
        self.z = position.z;
        self.heading = heading;
    }

    pub fn set_heading(&mut self, heading: f32) {
        self.heading = heading.rem_euclid(360.0);
    }

    pub fn face(&mut self, point: Vec3) {
        self.heading = heading_between(self.position(), point);
    }

    /// Starts moving. With a pathfinder present and enabled the route comes
    /// from `find_path`; otherwise the target is approached directly.
    pub fn move_to(&mut self, target: Vec3, pathfinder: Option<&Pathfinder>) {
        self.plan_route(target, pathfinder);
        self.is_moving = true;
        self.stuck_probe = None;
        self.face(target);
        self.gate.set_moving(true);
    }

    fn plan_route(&mut self, target: Vec3, pathfinder: Option<&Pathfinder>) {
        self.path.clear();
        self.path_index = 0;
        self.target = Some(target);
        let Some(pathfinder) = pathfinder.filter(|_| self.pathfinding_enabled) else {
            return;
        };
        let result = pathfinder.find_path(self.position(), target, &PathfinderOptions::default());
        if result.nodes.is_empty() || result.stuck {
            return;
        }
        self.path = result
            .nodes
            .iter()
            .filter(|node| !node.teleport)
            .map(|node| node.pos)
            .collect();
        self.path_index = 0;
    }

    /// Follow is name-based; the entity is re-resolved every tick so a
    /// respawned target with a fresh spawn id is still tracked.
    pub fn follow(&mut self, name: &str) {
        self.follow_target = Some(name.to_string());
    }

    pub fn stop_follow(&mut self) -> Option<String> {
        let previous = self.follow_target.take();
        self.stop();
        previous
    }

    /// Clears path, target, and follow name; the caller emits the final
    /// stand-still update.
    pub fn stop(&mut self) {
        self.follow_target = None;
        self.halt();
    }

    /// Stops moving but keeps any follow target.
    fn halt(&mut self) {
        self.is_moving = false;
        self.animation = ANIM_STAND;
        self.target = None;
        self.path.clear();
        self.path_index = 0;
        self.stuck_probe = None;
        self.gate.set_moving(false);
    }

    /// Next outgoing update; the sequence is strictly monotonic for the
    /// zone session.
    pub fn build_update(&mut self, spawn_id: u16) -> Vec<u8> {
        self.sequence = self.sequence.wrapping_add(1);
        let record = PositionRecord {
            x: self.x,
            y: self.y,
            z: self.z,
            delta_x: 0.0,
            delta_y: 0.0,
            delta_z: 0.0,
            delta_heading: 0.0,
            heading_raw: degrees_to_heading(self.heading),
            animation: self.animation,
            on_ground: true,
        };
        build_position_update(spawn_id, self.sequence, &record)
    }

    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    pub fn tick(&mut self, now: Instant, ctx: &TickContext) -> TickOutcome {
        self.tick_follow(now, ctx);

        if !self.is_moving {
            return TickOutcome {
                send_update: self.idle_update_due(now),
            };
        }

        self.advance_waypoint();
        self.detect_stuck(now);
        if !self.is_moving {
            // stuck handling may have exhausted the path
            return TickOutcome { send_update: true };
        }

        let Some(goal) = self.current_goal() else {
            self.halt();
            return TickOutcome { send_update: true };
        };

        let dt = self.frame_delta(now);
        let arrived = self.integrate(goal, dt);
        if arrived {
            self.halt();
            return TickOutcome { send_update: true };
        }

        self.fix_z(now, ctx.zone_map);

        TickOutcome {
            send_update: self.move_update_due(now),
        }
    }

    fn tick_follow(&mut self, _now: Instant, ctx: &TickContext) {
        let Some(name) = self.follow_target.clone() else {
            return;
        };
        let Some(entity) = ctx.entities.find_by_name_prefix(&name) else {
            return;
        };
        let entity_pos = entity.position();
        let here = self.position();
        let distance = here.truncate().distance(entity_pos.truncate());

        if distance < FOLLOW_CLOSE_DISTANCE {
            if self.is_moving {
                self.halt();
            }
            return;
        }
        if distance <= FOLLOW_FAR_DISTANCE {
            return;
        }

        let end = self.final_goal();
        let drifted = end
            .map(|end| end.truncate().distance(entity_pos.truncate()) > FOLLOW_REPATH_DRIFT)
            .unwrap_or(true);
        if drifted {
            self.plan_route(entity_pos, ctx.pathfinder);
            self.is_moving = true;
            self.stuck_probe = None;
            self.gate.set_moving(true);
        }
    }

    fn current_goal(&self) -> Option<Vec3> {
        if self.path_index < self.path.len() {
            return Some(self.path[self.path_index]);
        }
        self.target
    }

    fn final_goal(&self) -> Option<Vec3> {
        self.path.last().copied().or(self.target)
    }

    fn on_last_leg(&self) -> bool {
        self.path.is_empty() || self.path_index + 1 >= self.path.len()
    }

    fn advance_waypoint(&mut self) {
        while self.path_index + 1 < self.path.len() {
            let waypoint = self.path[self.path_index];
            if self.position().truncate().distance(waypoint.truncate()) >= WAYPOINT_RADIUS {
                break;
            }
            self.path_index += 1;
            self.stuck_probe = None;
        }
    }

    /// No progress of at least one unit toward the current waypoint inside
    /// the window advances past it; on the last waypoint it stops instead.
    fn detect_stuck(&mut self, now: Instant) {
        let Some(goal) = self.current_goal() else {
            return;
        };
        let distance = self.position().truncate().distance(goal.truncate());
        match self.stuck_probe {
            Some((probe_distance, since, index))
                if index == self.path_index =>
            {
                if probe_distance - distance >= STUCK_MIN_PROGRESS {
                    self.stuck_probe = Some((distance, now, self.path_index));
                } else if now.duration_since(since) >= STUCK_WINDOW {
                    if self.on_last_leg() {
                        self.halt();
                    } else {
                        self.path_index += 1;
                        self.stuck_probe = None;
                    }
                }
            }
            _ => self.stuck_probe = Some((distance, now, self.path_index)),
        }
    }

    fn frame_delta(&mut self, now: Instant) -> f32 {
        let dt = match self.last_tick {
            Some(last) => now.saturating_duration_since(last).min(MAX_TICK_DELTA),
            None => Duration::ZERO,
        };
        self.last_tick = Some(now);
        dt.as_secs_f32()
    }

    fn current_speed(&self, distance: f32) -> f32 {
        let mut speed = self.move_speed;
        if self.follow_target.is_some() {
            let mult = if distance > FOLLOW_FAR_DISTANCE {
                FOLLOW_MAX_SPEED_MULT
            } else if distance < FOLLOW_CLOSE_DISTANCE {
                FOLLOW_MIN_SPEED_MULT
            } else {
                let t = (distance - FOLLOW_CLOSE_DISTANCE)
                    / (FOLLOW_FAR_DISTANCE - FOLLOW_CLOSE_DISTANCE);
                FOLLOW_MIN_SPEED_MULT + (FOLLOW_MAX_SPEED_MULT - FOLLOW_MIN_SPEED_MULT) * t
            };
            speed *= mult;
        }
        speed
    }

    /// Moves toward `goal`; true when the journey is complete.
    fn integrate(&mut self, goal: Vec3, dt: f32) -> bool {
        let here = self.position();
        let offset = goal - here;
        let distance = offset.length();

        let arrival = if self.on_last_leg() {
            ARRIVAL_RADIUS
        } else {
            WAYPOINT_RADIUS
        };
        if distance < arrival {
            if self.on_last_leg() {
                self.x = goal.x;
                self.y = goal.y;
                self.z = goal.z;
                return true;
            }
            return false;
        }
        if dt <= 0.0 {
            return false;
        }

        let speed = self.current_speed(distance);
        let step = (speed * dt).min(distance);
        if step > 0.0 {
            let motion = offset * (step / distance);
            self.x += motion.x;
            self.y += motion.y;
            self.z += motion.z;
            if motion.truncate().length() > 1e-6 {
                self.heading = heading_between(here, self.position());
            }
        }

        let actual_speed = if dt > 0.0 { step / dt } else { 0.0 };
        self.animation = if actual_speed < WALK_ANIMATION_THRESHOLD {
            ANIM_WALK
        } else {
            ANIM_RUN
        };

        self.on_last_leg() && self.position().distance(goal) < ARRIVAL_RADIUS
    }

    /// Terrain correction: moderate height errors are closed 30% per
    /// interval; tiny ones are left alone and huge ones are distrusted.
    fn fix_z(&mut self, now: Instant, zone_map: Option<&ZoneMap>) {
        let Some(map) = zone_map else {
            return;
        };
        let due = match self.last_z_fix {
            Some(last) => now.duration_since(last) >= Z_FIX_INTERVAL,
            None => {
                self.last_z_fix = Some(now);
                false
            }
        };
        if !due {
            return;
        }
        self.last_z_fix = Some(now);
        let best = map.best_z(self.x, self.y, self.z);
        if best == BEST_Z_INVALID {
            return;
        }
        let diff = best - self.z;
        if diff.abs() > Z_FIX_MIN_DIFF && diff.abs() < Z_FIX_MAX_DIFF {
            self.z += diff * Z_FIX_FACTOR;
        }
    }

    fn move_update_due(&mut self, now: Instant) -> bool {
        match self.last_move_update {
            Some(last) if now.duration_since(last) < MOVING_UPDATE_INTERVAL => false,
            _ => {
                self.last_move_update = Some(now);
                true
            }
        }
    }

    fn idle_update_due(&mut self, now: Instant) -> bool {
        match self.last_idle_update {
            Some(last) if now.duration_since(last) < IDLE_UPDATE_INTERVAL => false,
            _ => {
                self.last_idle_update = Some(now);
                true
            }
        }
    }
}

/// The server's compass: 0 = +Y (North), 90 = +X (East). `atan2(dx, dy)`,
/// not the usual `atan2(y, x)`.
pub fn heading_between(from: Vec3, to: Vec3) -> f32 {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let degrees = dx.atan2(dy).to_degrees();
    degrees.rem_euclid(360.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::entity::{Entity, EntityList};
    use crate::world::zone_map::test_support::platform_map_bytes;

    fn engine() -> MovementEngine {
        MovementEngine::new(Arc::new(MoveGate::new()), true)
    }

    fn empty_ctx(entities: &EntityList) -> TickContext<'_> {
        TickContext {
            entities,
            pathfinder: None,
            zone_map: None,
        }
    }

    fn entity_at(spawn_id: u32, name: &str, pos: Vec3) -> Entity {
        Entity {
            spawn_id,
            name: name.to_string(),
            x: pos.x,
            y: pos.y,
            z: pos.z,
            heading: 0.0,
            level: 1,
            class_id: 0,
            race_id: 0,
            gender: 0,
            guild_id: 0,
            hp_percent: 100,
            cur_mana: 0,
            max_mana: 0,
            animation: 0,
            delta_x: 0.0,
            delta_y: 0.0,
            delta_z: 0.0,
            delta_heading: 0.0,
            last_update: Instant::now(),
        }
    }

    #[test]
    fn heading_convention_matches_compass() {
        let origin = Vec3::ZERO;
        assert!((heading_between(origin, Vec3::new(0.0, 10.0, 0.0)) - 0.0).abs() < 1e-4);
        assert!((heading_between(origin, Vec3::new(10.0, 0.0, 0.0)) - 90.0).abs() < 1e-4);
        assert!((heading_between(origin, Vec3::new(0.0, -10.0, 0.0)) - 180.0).abs() < 1e-4);
        assert!((heading_between(origin, Vec3::new(-10.0, 0.0, 0.0)) - 270.0).abs() < 1e-4);
    }

    #[test]
    fn straight_move_reaches_target_and_stops() {
        let mut engine = engine();
        let entities = EntityList::new();
        let ctx = empty_ctx(&entities);
        engine.move_to(Vec3::new(0.0, 100.0, 0.0), None);
        assert!(engine.is_moving());
        assert!((engine.heading() - 0.0).abs() < 1e-4);

        let base = Instant::now();
        let mut arrived_at = None;
        for step in 1..=400 {
            let now = base + Duration::from_millis(16 * step);
            engine.tick(now, &ctx);
            if !engine.is_moving() {
                arrived_at = Some(step);
                break;
            }
            if step > 1 {
                assert_eq!(engine.animation(), ANIM_RUN);
            }
        }
        // 100 units at 70 u/s is about 1.4 s of travel
        let arrived_at = arrived_at.expect("never arrived");
        assert!(arrived_at >= 80 && arrived_at <= 120, "took {} ticks", arrived_at);
        assert!(engine.position().distance(Vec3::new(0.0, 100.0, 0.0)) < ARRIVAL_RADIUS);
        assert_eq!(engine.animation(), ANIM_STAND);
    }

    #[test]
    fn walk_speed_selects_walk_animation() {
        let mut engine = engine();
        let entities = EntityList::new();
        let ctx = empty_ctx(&entities);
        engine.set_move_speed(DEFAULT_WALK_SPEED);
        engine.move_to(Vec3::new(0.0, 50.0, 0.0), None);
        let base = Instant::now();
        engine.tick(base, &ctx);
        engine.tick(base + Duration::from_millis(50), &ctx);
        assert_eq!(engine.animation(), ANIM_WALK);
    }

    #[test]
    fn waypoint_path_is_consumed_in_order() {
        let mut engine = engine();
        let entities = EntityList::new();
        let ctx = empty_ctx(&entities);
        engine.move_to(Vec3::new(100.0, 100.0, 0.0), None);
        engine.path = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(50.0, 50.0, 0.0),
            Vec3::new(100.0, 100.0, 0.0),
        ];
        engine.path_index = 0;

        let base = Instant::now();
        let mut max_index = 0;
        for step in 1..=800 {
            let now = base + Duration::from_millis(16 * step);
            engine.tick(now, &ctx);
            max_index = max_index.max(engine.path_index);
            if !engine.is_moving() {
                break;
            }
        }
        assert!(!engine.is_moving());
        assert_eq!(max_index, 2);
        assert!(engine.position().distance(Vec3::new(100.0, 100.0, 0.0)) < ARRIVAL_RADIUS);
    }

    #[test]
    fn follow_recomputes_when_target_drifts() {
        let gate = Arc::new(MoveGate::new());
        let mut engine = MovementEngine::new(gate, true);
        let mut entities = EntityList::new();
        entities.insert_or_replace(entity_at(9, "Gearheart", Vec3::new(100.0, 100.0, 0.0)));

        engine.follow("Gearheart");
        let base = Instant::now();
        engine.tick(base, &empty_ctx(&entities));
        assert!(engine.is_moving());
        let first_goal = engine.final_goal().expect("goal");
        assert!(first_goal.distance(Vec3::new(100.0, 100.0, 0.0)) < 1e-4);

        // target moves; the stale path end is more than the drift allowance away
        entities.insert_or_replace(entity_at(9, "Gearheart", Vec3::new(100.0, 150.0, 0.0)));
        engine.tick(base + Duration::from_millis(16), &empty_ctx(&entities));
        let second_goal = engine.final_goal().expect("goal");
        assert!(second_goal.distance(Vec3::new(100.0, 150.0, 0.0)) < 1e-4);

        // walk up to the target; inside the close distance movement stops
        // but the follow name stays
        let mut now = base + Duration::from_millis(32);
        for _ in 0..2000 {
            now += Duration::from_millis(16);
            engine.tick(now, &empty_ctx(&entities));
            if !engine.is_moving() {
                break;
            }
        }
        assert!(!engine.is_moving());
        assert_eq!(engine.follow_target(), Some("Gearheart"));
        let dist = engine
            .position()
            .truncate()
            .distance(Vec3::new(100.0, 150.0, 0.0).truncate());
        assert!(dist <= FOLLOW_CLOSE_DISTANCE + 1.0, "stopped {} away", dist);

        // stopfollow clears the name
        assert_eq!(engine.stop_follow().as_deref(), Some("Gearheart"));
        assert_eq!(engine.follow_target(), None);
    }

    #[test]
    fn stuck_waypoint_advances_then_stops() {
        let mut engine = engine();
        let entities = EntityList::new();
        let ctx = empty_ctx(&entities);
        engine.move_to(Vec3::new(0.0, 200.0, 0.0), None);
        engine.path = vec![Vec3::new(0.0, 100.0, 0.0), Vec3::new(0.0, 200.0, 0.0)];
        engine.path_index = 0;
        // zero speed simulates an unreachable waypoint
        engine.set_move_speed(0.0);

        let base = Instant::now();
        engine.tick(base, &ctx);
        assert_eq!(engine.path_index, 0);
        engine.tick(base + Duration::from_secs(1), &ctx);
        engine.tick(base + Duration::from_secs(2), &ctx);
        assert_eq!(engine.path_index, 0);
        // window expires: skip to the next waypoint
        engine.tick(base + Duration::from_millis(3100), &ctx);
        assert_eq!(engine.path_index, 1);
        assert!(engine.is_moving());
        // a fresh probe starts for the final waypoint, then stalls out too
        engine.tick(base + Duration::from_millis(3200), &ctx);
        engine.tick(base + Duration::from_millis(6300), &ctx);
        assert!(!engine.is_moving());
    }

    #[test]
    fn terrain_fix_closes_height_error_asymptotically() {
        let map = ZoneMap::from_bytes(&platform_map_bytes(100_000.0, 10.0)).expect("map");
        let mut engine = engine();
        let entities = EntityList::new();
        let ctx = TickContext {
            entities: &entities,
            pathfinder: None,
            zone_map: Some(&map),
        };
        engine.set_position(Vec3::new(0.0, 0.0, 8.0), 0.0);
        engine.move_to(Vec3::new(0.0, 100_000.0, 8.0), None);

        let base = Instant::now();
        engine.tick(base, &ctx);
        // first interval: z moves 30% of the way from 8 toward 10
        engine.tick(base + Duration::from_millis(500), &ctx);
        assert!((engine.position().z - 8.6).abs() < 0.05, "z={}", engine.position().z);

        let mut now = base + Duration::from_millis(500);
        for _ in 0..200 {
            now += Duration::from_millis(100);
            engine.tick(now, &ctx);
        }
        assert!(engine.position().z > 9.5, "z={}", engine.position().z);
    }

    #[test]
    fn update_cadence_moving_and_idle() {
        let mut engine = engine();
        let entities = EntityList::new();
        let ctx = empty_ctx(&entities);
        let base = Instant::now();

        // idle: one update, then quiet until the idle interval passes
        assert!(engine.tick(base, &ctx).send_update);
        assert!(!engine.tick(base + Duration::from_millis(500), &ctx).send_update);
        assert!(engine.tick(base + Duration::from_millis(1600), &ctx).send_update);

        engine.move_to(Vec3::new(0.0, 500.0, 0.0), None);
        assert!(engine.tick(base + Duration::from_millis(1616), &ctx).send_update);
        assert!(!engine.tick(base + Duration::from_millis(1632), &ctx).send_update);
        assert!(engine.tick(base + Duration::from_millis(1700), &ctx).send_update);
    }

    #[test]
    fn update_sequence_is_strictly_monotonic() {
        let mut engine = engine();
        let mut last = None;
        for _ in 0..32 {
            let frame = engine.build_update(42);
            let seq = u16::from_le_bytes([frame[4], frame[5]]);
            if let Some(previous) = last {
                assert_eq!(seq, previous + 1);
            }
            last = Some(seq);
        }
    }

    #[test]
    fn gate_signals_on_stop() {
        let gate = Arc::new(MoveGate::new());
        let mut engine = MovementEngine::new(gate.clone(), false);
        engine.move_to(Vec3::new(0.0, 10.0, 0.0), None);
        assert!(gate.is_moving());

        let waiter = {
            let gate = gate.clone();
            std::thread::spawn(move || {
                gate.wait_until_idle(|| true);
            })
        };
        std::thread::sleep(Duration::from_millis(50));
        engine.stop();
        waiter.join().expect("join");
        assert!(!gate.is_moving());
    }
}
