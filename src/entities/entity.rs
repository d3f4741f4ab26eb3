use std::collections::BTreeMap;
use std::time::Instant;

use glam::Vec3;

use crate::proto::position::PositionRecord;
use crate::proto::zone::SpawnRecord;

/// A server-visible actor in the current zone, the player included.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub spawn_id: u32,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Degrees, 0 = North, clockwise positive.
    pub heading: f32,
    pub level: u8,
    pub class_id: u8,
    pub race_id: u32,
    pub gender: u8,
    pub guild_id: u32,
    pub hp_percent: u8,
    pub cur_mana: u16,
    pub max_mana: u16,
    pub animation: u16,
    pub delta_x: f32,
    pub delta_y: f32,
    pub delta_z: f32,
    pub delta_heading: f32,
    pub last_update: Instant,
}

impl Entity {
    pub fn from_spawn(record: &SpawnRecord, now: Instant) -> Self {
        Self {
            spawn_id: record.spawn_id,
            name: record.name.clone(),
            x: record.position.x,
            y: record.position.y,
            z: record.position.z,
            heading: record.position.heading_degrees(),
            level: record.level,
            class_id: record.class_id,
            race_id: record.race_id,
            gender: record.gender,
            guild_id: record.guild_id,
            hp_percent: record.hp_percent,
            cur_mana: 0,
            max_mana: 0,
            animation: record.position.animation,
            delta_x: 0.0,
            delta_y: 0.0,
            delta_z: 0.0,
            delta_heading: 0.0,
            last_update: now,
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    pub fn distance_to(&self, origin: Vec3) -> f32 {
        self.position().distance(origin)
    }
}

/// Server names use underscores where players type spaces; lookups are
/// case-insensitive.
fn normalize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c == ' ' { '_' } else { c.to_ascii_lowercase() })
        .collect()
}

/// The in-memory world: every entity keyed by its spawn id. A `BTreeMap`
/// keeps enumeration deterministic.
#[derive(Debug, Default)]
pub struct EntityList {
    entities: BTreeMap<u32, Entity>,
}

impl EntityList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, spawn_id: u32) -> Option<&Entity> {
        self.entities.get(&spawn_id)
    }

    pub fn get_mut(&mut self, spawn_id: u32) -> Option<&mut Entity> {
        self.entities.get_mut(&spawn_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn insert_or_replace(&mut self, entity: Entity) {
        self.entities.insert(entity.spawn_id, entity);
    }

    pub fn remove(&mut self, spawn_id: u32) -> Option<Entity> {
        self.entities.remove(&spawn_id)
    }

    /// Applies a decoded position record. Unknown spawn ids are ignored, not
    /// an error; updates never create a record.
    pub fn apply_position(&mut self, spawn_id: u32, record: &PositionRecord, now: Instant) -> bool {
        let Some(entity) = self.entities.get_mut(&spawn_id) else {
            return false;
        };
        entity.x = record.x;
        entity.y = record.y;
        entity.z = record.z;
        entity.heading = record.heading_degrees();
        entity.animation = record.animation;
        entity.delta_x = record.delta_x;
        entity.delta_y = record.delta_y;
        entity.delta_z = record.delta_z;
        entity.delta_heading = record.delta_heading;
        entity.last_update = now;
        true
    }

    pub fn update_hp_percent(&mut self, spawn_id: u32, hp_percent: u8) -> bool {
        match self.entities.get_mut(&spawn_id) {
            Some(entity) => {
                entity.hp_percent = hp_percent.min(100);
                true
            }
            None => false,
        }
    }

    pub fn update_mana(&mut self, spawn_id: u32, cur_mana: u16, max_mana: u16) -> bool {
        match self.entities.get_mut(&spawn_id) {
            Some(entity) => {
                entity.cur_mana = cur_mana;
                entity.max_mana = max_mana;
                true
            }
            None => false,
        }
    }

    pub fn mark_dead(&mut self, spawn_id: u32) -> bool {
        self.update_hp_percent(spawn_id, 0)
    }

    /// Case-insensitive prefix lookup, spaces equivalent to underscores. A
    /// candidate matches when its name extends the query or the query
    /// extends its name; the longest common prefix wins, ties go to the
    /// lowest spawn id.
    pub fn find_by_name_prefix(&self, query: &str) -> Option<&Entity> {
        let q = normalize_name(query);
        if q.is_empty() {
            return None;
        }
        let mut best: Option<(usize, &Entity)> = None;
        for entity in self.entities.values() {
            let n = normalize_name(&entity.name);
            let common = if n.starts_with(&q) {
                q.len()
            } else if q.starts_with(&n) {
                n.len()
            } else {
                continue;
            };
            match best {
                Some((len, _)) if len >= common => {}
                _ => best = Some((common, entity)),
            }
        }
        best.map(|(_, entity)| entity)
    }

    /// Entities ordered by distance from `origin`, optionally filtered by a
    /// case-insensitive substring.
    pub fn enumerate_near(&self, origin: Vec3, filter: Option<&str>) -> Vec<&Entity> {
        let needle = filter.map(normalize_name);
        let mut matches: Vec<&Entity> = self
            .entities
            .values()
            .filter(|entity| match &needle {
                Some(needle) => normalize_name(&entity.name).contains(needle.as_str()),
                None => true,
            })
            .collect();
        matches.sort_by(|a, b| {
            a.distance_to(origin)
                .total_cmp(&b.distance_to(origin))
                .then(a.spawn_id.cmp(&b.spawn_id))
        });
        matches
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }
}
