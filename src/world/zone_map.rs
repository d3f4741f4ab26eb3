use std::path::Path;

use parry3d::math::{Isometry, Point, Vector};
use parry3d::query::{Ray, RayCast};
use parry3d::shape::TriMesh;

use crate::net::packet::PacketReader;

const MAP_VERSION_V1: u32 = 0x0100_0000;
const MAP_VERSION_V2: u32 = 0x0200_0000;

/// Sentinel for "no ground found"; callers keep their current Z.
pub const BEST_Z_INVALID: f32 = -99999.0;

/// Rays start this far above the query point so a character standing on the
/// surface still hits it.
const RAY_START_LIFT: f32 = 10.0;

/// A zone's collision mesh, used only for downward ray casts.
pub struct ZoneMap {
    mesh: TriMesh,
    vertex_count: usize,
    face_count: usize,
}

impl std::fmt::Debug for ZoneMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZoneMap")
            .field("vertices", &self.vertex_count)
            .field("faces", &self.face_count)
            .finish()
    }
}

impl ZoneMap {
    /// `<maps_root>/base/<zone>.map`
    pub fn load_for_zone(maps_root: &Path, zone: &str) -> Result<Self, String> {
        let path = maps_root.join("base").join(format!("{}.map", zone));
        Self::load(&path)
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let bytes = std::fs::read(path)
            .map_err(|err| format!("unable to open map file {}: {}", path.display(), err))?;
        Self::from_bytes(&bytes)
            .map_err(|err| format!("map file {}: {}", path.display(), err))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
        let mut reader = PacketReader::new(bytes);
        let version = reader
            .read_u32_le()
            .ok_or_else(|| "missing version tag".to_string())?;

        let (face_count, vertex_count) = match version {
            MAP_VERSION_V1 => {
                let face_count = reader
                    .read_u32_le()
                    .ok_or_else(|| "truncated header".to_string())?;
                let vertex_count = reader
                    .read_u16_le()
                    .ok_or_else(|| "truncated header".to_string())?
                    as u32;
                reader
                    .read_u32_le()
                    .ok_or_else(|| "truncated header".to_string())?; // facelist count, unused
                (face_count, vertex_count)
            }
            MAP_VERSION_V2 => {
                let face_count = reader
                    .read_u32_le()
                    .ok_or_else(|| "truncated header".to_string())?;
                let vertex_count = reader
                    .read_u32_le()
                    .ok_or_else(|| "truncated header".to_string())?;
                reader
                    .read_u32_le()
                    .ok_or_else(|| "truncated header".to_string())?; // facelist count, unused
                (face_count, vertex_count)
            }
            other => return Err(format!("unknown map version: {:#010x}", other)),
        };

        let mut vertices = Vec::with_capacity(vertex_count as usize);
        for _ in 0..vertex_count {
            let x = reader
                .read_f32_le()
                .ok_or_else(|| "truncated vertex block".to_string())?;
            let y = reader
                .read_f32_le()
                .ok_or_else(|| "truncated vertex block".to_string())?;
            let z = reader
                .read_f32_le()
                .ok_or_else(|| "truncated vertex block".to_string())?;
            vertices.push(Point::new(x, y, z));
        }

        let mut indices = Vec::with_capacity(face_count as usize);
        for _ in 0..face_count {
            let a = reader
                .read_u32_le()
                .ok_or_else(|| "truncated face block".to_string())?;
            let b = reader
                .read_u32_le()
                .ok_or_else(|| "truncated face block".to_string())?;
            let c = reader
                .read_u32_le()
                .ok_or_else(|| "truncated face block".to_string())?;
            // V1 trails three unused normal words, V2 a flags word
            let trailer = if version == MAP_VERSION_V1 { 12 } else { 4 };
            reader
                .skip(trailer)
                .ok_or_else(|| "truncated face block".to_string())?;
            if a >= vertex_count || b >= vertex_count || c >= vertex_count {
                return Err(format!(
                    "face references vertex out of range ({}, {}, {}) of {}",
                    a, b, c, vertex_count
                ));
            }
            indices.push([a, b, c]);
        }

        let mesh = TriMesh::new(vertices, indices);
        Ok(Self {
            mesh,
            vertex_count: vertex_count as usize,
            face_count: face_count as usize,
        })
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn face_count(&self) -> usize {
        self.face_count
    }

    /// Ground height at (x, y): casts from slightly above the query point
    /// straight down, then straight up if nothing lies below. Returns
    /// `BEST_Z_INVALID` when the column misses the mesh entirely.
    pub fn best_z(&self, x: f32, y: f32, z: f32) -> f32 {
        let origin = Point::new(x, y, z + RAY_START_LIFT);
        let identity = Isometry::identity();

        let down = Ray::new(origin, Vector::new(0.0, 0.0, -1.0));
        if let Some(toi) = self.mesh.cast_ray(&identity, &down, f32::MAX, true) {
            return origin.z - toi;
        }

        let up = Ray::new(origin, Vector::new(0.0, 0.0, 1.0));
        if let Some(toi) = self.mesh.cast_ray(&identity, &up, f32::MAX, true) {
            return origin.z + toi;
        }

        BEST_Z_INVALID
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::net::packet::PacketWriter;

    /// A V2 map containing one square platform at the given height.
    pub fn platform_map_bytes(half_extent: f32, z: f32) -> Vec<u8> {
        let mut writer = PacketWriter::new();
        writer.write_u32_le(super::MAP_VERSION_V2);
        writer.write_u32_le(2); // faces
        writer.write_u32_le(4); // vertices
        writer.write_u32_le(0); // facelist
        for (x, y) in [
            (-half_extent, -half_extent),
            (half_extent, -half_extent),
            (half_extent, half_extent),
            (-half_extent, half_extent),
        ] {
            writer.write_f32_le(x);
            writer.write_f32_le(y);
            writer.write_f32_le(z);
        }
        for [a, b, c] in [[0u32, 1, 2], [0, 2, 3]] {
            writer.write_u32_le(a);
            writer.write_u32_le(b);
            writer.write_u32_le(c);
            writer.write_u32_le(0); // flags
        }
        writer.into_vec()
    }
}
