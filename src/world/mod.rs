pub mod pathfind;
pub mod zone_map;
