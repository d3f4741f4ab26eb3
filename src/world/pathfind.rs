use std::collections::{BinaryHeap, HashMap};
use std::path::Path;

use glam::Vec3;

use crate::net::packet::PacketReader;

const NAV_VERSION: u32 = 0x0100_0000;

/// How close the end of a returned path may sit to its start before the
/// result counts as "stuck".
const STUCK_EPSILON: f32 = 0.5;

#[derive(Debug, Clone, Copy)]
pub struct PathfinderOptions {
    /// Simplify collinear runs of waypoints.
    pub smooth_path: bool,
    /// Maximum spacing between generated waypoints.
    pub step_size: f32,
    /// Vertical offset added to every waypoint.
    pub offset: f32,
}

impl Default for PathfinderOptions {
    fn default() -> Self {
        Self {
            smooth_path: true,
            step_size: 10.0,
            offset: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathNode {
    pub pos: Vec3,
    pub teleport: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PathResult {
    pub nodes: Vec<PathNode>,
    /// The path reaches the nearest reachable point rather than the goal.
    pub partial: bool,
    /// The path terminates back at its start.
    pub stuck: bool,
}

/// The two pathfinder variants, selected by the presence of a per-zone
/// navmesh file.
#[derive(Debug)]
pub enum Pathfinder {
    NavMesh(NavMesh),
    Null,
}

impl Pathfinder {
    /// Looks for `<navmesh_root>/<zone>.nav`; a missing file selects the
    /// null variant, a present-but-unparseable file degrades to it with a
    /// warning.
    pub fn load(navmesh_root: &Path, zone: &str) -> Self {
        let path = navmesh_root.join(format!("{}.nav", zone));
        if !path.exists() {
            return Pathfinder::Null;
        }
        match NavMesh::load(&path) {
            Ok(mesh) => Pathfinder::NavMesh(mesh),
            Err(err) => {
                eprintln!(
                    "warning: navmesh {} unusable ({}); falling back to direct paths",
                    path.display(),
                    err
                );
                Pathfinder::Null
            }
        }
    }

    pub fn is_navmesh(&self) -> bool {
        matches!(self, Pathfinder::NavMesh(_))
    }

    pub fn find_path(&self, start: Vec3, end: Vec3, opts: &PathfinderOptions) -> PathResult {
        match self {
            Pathfinder::Null => PathResult {
                nodes: vec![
                    PathNode {
                        pos: start,
                        teleport: false,
                    },
                    PathNode {
                        pos: end,
                        teleport: false,
                    },
                ],
                partial: false,
                stuck: false,
            },
            Pathfinder::NavMesh(mesh) => mesh.find_path(start, end, opts),
        }
    }
}

/// Triangle-soup navigation mesh with precomputed edge adjacency; queries
/// run A* over the triangle graph.
#[derive(Debug)]
pub struct NavMesh {
    vertices: Vec<Vec3>,
    triangles: Vec<[u32; 3]>,
    neighbors: Vec<Vec<usize>>,
}

impl NavMesh {
    pub fn load(path: &Path) -> Result<Self, String> {
        let bytes = std::fs::read(path)
            .map_err(|err| format!("unable to open navmesh {}: {}", path.display(), err))?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
        let mut reader = PacketReader::new(bytes);
        let version = reader
            .read_u32_le()
            .ok_or_else(|| "missing version tag".to_string())?;
        if version != NAV_VERSION {
            return Err(format!("unknown navmesh version: {:#010x}", version));
        }
        let vertex_count = reader
            .read_u32_le()
            .ok_or_else(|| "truncated header".to_string())?;
        let triangle_count = reader
            .read_u32_le()
            .ok_or_else(|| "truncated header".to_string())?;

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
            vertices.push(Vec3::new(x, y, z));
        }

        let mut triangles = Vec::with_capacity(triangle_count as usize);
        for _ in 0..triangle_count {
            let mut tri = [0u32; 3];
            for corner in &mut tri {
                *corner = reader
                    .read_u32_le()
                    .ok_or_else(|| "truncated triangle block".to_string())?;
                if *corner >= vertex_count {
                    return Err(format!(
                        "triangle references vertex {} of {}",
                        corner, vertex_count
                    ));
                }
            }
            triangles.push(tri);
        }

        let neighbors = build_adjacency(&triangles);
        Ok(Self {
            vertices,
            triangles,
            neighbors,
        })
    }

    fn centroid(&self, tri: usize) -> Vec3 {
        let [a, b, c] = self.triangles[tri];
        (self.vertices[a as usize] + self.vertices[b as usize] + self.vertices[c as usize]) / 3.0
    }

    fn contains_2d(&self, tri: usize, point: Vec3) -> bool {
        let [a, b, c] = self.triangles[tri];
        point_in_triangle_2d(
            point,
            self.vertices[a as usize],
            self.vertices[b as usize],
            self.vertices[c as usize],
        )
    }

    /// Triangle under the point, or the one with the nearest centroid.
    fn locate(&self, point: Vec3) -> Option<usize> {
        if self.triangles.is_empty() {
            return None;
        }
        for tri in 0..self.triangles.len() {
            if self.contains_2d(tri, point) {
                return Some(tri);
            }
        }
        (0..self.triangles.len()).min_by(|&a, &b| {
            centroid_distance_2d(self.centroid(a), point)
                .total_cmp(&centroid_distance_2d(self.centroid(b), point))
        })
    }

    fn find_path(&self, start: Vec3, end: Vec3, opts: &PathfinderOptions) -> PathResult {
        let (Some(start_tri), Some(end_tri)) = (self.locate(start), self.locate(end)) else {
            return PathResult {
                nodes: Vec::new(),
                partial: false,
                stuck: true,
            };
        };

        let (triangles, reached_goal) = self.astar(start_tri, end_tri, end);

        let mut points = Vec::new();
        points.push(start);
        for &tri in triangles.iter().skip(1) {
            points.push(self.centroid(tri));
        }
        if reached_goal {
            points.push(end);
        } else if let Some(&last) = triangles.last() {
            let nearest = self.centroid(last);
            if points.last() != Some(&nearest) {
                points.push(nearest);
            }
        }

        if opts.smooth_path {
            points = simplify_collinear(points);
        }
        let points = resample(points, opts.step_size);

        let stuck = points
            .last()
            .map(|last| last.truncate().distance(start.truncate()) < STUCK_EPSILON)
            .unwrap_or(true)
            && start.truncate().distance(end.truncate()) >= STUCK_EPSILON;

        let nodes = points
            .into_iter()
            .map(|p| PathNode {
                pos: p + Vec3::new(0.0, 0.0, opts.offset),
                teleport: false,
            })
            .collect();
        PathResult {
            nodes,
            partial: !reached_goal,
            stuck,
        }
    }

    /// A* over the triangle adjacency graph. Returns the triangle chain and
    /// whether it reached the goal triangle; otherwise the chain ends at the
    /// reachable triangle closest to the goal point.
    fn astar(&self, start: usize, goal: usize, goal_point: Vec3) -> (Vec<usize>, bool) {
        #[derive(PartialEq)]
        struct Candidate {
            score: f32,
            tri: usize,
        }
        impl Eq for Candidate {}
        impl Ord for Candidate {
            fn cmp(&self, other: &Self) -> std::cmp::Ordering {
                // reversed: BinaryHeap is a max-heap
                other.score.total_cmp(&self.score)
            }
        }
        impl PartialOrd for Candidate {
            fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
                Some(self.cmp(other))
            }
        }

        let heuristic = |tri: usize| self.centroid(tri).distance(goal_point);

        let mut open = BinaryHeap::new();
        let mut best_cost: HashMap<usize, f32> = HashMap::new();
        let mut came_from: HashMap<usize, usize> = HashMap::new();
        best_cost.insert(start, 0.0);
        open.push(Candidate {
            score: heuristic(start),
            tri: start,
        });

        let mut closest = start;
        let mut closest_h = heuristic(start);

        while let Some(Candidate { tri, .. }) = open.pop() {
            if tri == goal {
                return (rebuild_chain(&came_from, start, goal), true);
            }
            let h = heuristic(tri);
            if h < closest_h {
                closest_h = h;
                closest = tri;
            }
            let cost = best_cost[&tri];
            for &next in &self.neighbors[tri] {
                let step = self.centroid(tri).distance(self.centroid(next));
                let candidate_cost = cost + step;
                if best_cost
                    .get(&next)
                    .map(|&known| candidate_cost < known)
                    .unwrap_or(true)
                {
                    best_cost.insert(next, candidate_cost);
                    came_from.insert(next, tri);
                    open.push(Candidate {
                        score: candidate_cost + heuristic(next),
                        tri: next,
                    });
                }
            }
        }

        (rebuild_chain(&came_from, start, closest), false)
    }
}

fn rebuild_chain(came_from: &HashMap<usize, usize>, start: usize, end: usize) -> Vec<usize> {
    let mut chain = vec![end];
    let mut current = end;
    while current != start {
        match came_from.get(&current) {
            Some(&prev) => {
                chain.push(prev);
                current = prev;
            }
            None => break,
        }
    }
    chain.reverse();
    chain
}

fn build_adjacency(triangles: &[[u32; 3]]) -> Vec<Vec<usize>> {
    let mut edge_owners: HashMap<(u32, u32), Vec<usize>> = HashMap::new();
    for (idx, tri) in triangles.iter().enumerate() {
        for edge in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
            let key = (edge.0.min(edge.1), edge.0.max(edge.1));
            edge_owners.entry(key).or_default().push(idx);
        }
    }
    let mut neighbors = vec![Vec::new(); triangles.len()];
    for owners in edge_owners.values() {
        for &a in owners {
            for &b in owners {
                if a != b && !neighbors[a].contains(&b) {
                    neighbors[a].push(b);
                }
            }
        }
    }
    for list in &mut neighbors {
        list.sort_unstable();
    }
    neighbors
}

fn point_in_triangle_2d(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> bool {
    let sign = |p1: Vec3, p2: Vec3, p3: Vec3| {
        (p1.x - p3.x) * (p2.y - p3.y) - (p2.x - p3.x) * (p1.y - p3.y)
    };
    let d1 = sign(p, a, b);
    let d2 = sign(p, b, c);
    let d3 = sign(p, c, a);
    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(has_neg && has_pos)
}

fn centroid_distance_2d(centroid: Vec3, point: Vec3) -> f32 {
    centroid.truncate().distance(point.truncate())
}

/// Drops interior points that sit on the straight line between their
/// neighbors (2D test; height rides along).
fn simplify_collinear(points: Vec<Vec3>) -> Vec<Vec3> {
    if points.len() < 3 {
        return points;
    }
    let mut out = vec![points[0]];
    for idx in 1..points.len() - 1 {
        let prev = *out.last().expect("non-empty");
        let here = points[idx];
        let next = points[idx + 1];
        let ab = (here - prev).truncate();
        let bc = (next - here).truncate();
        let cross = ab.x * bc.y - ab.y * bc.x;
        if cross.abs() > 1e-3 {
            out.push(here);
        }
    }
    out.push(points[points.len() - 1]);
    out
}

/// Splits long segments so consecutive waypoints sit at most `step` apart.
fn resample(points: Vec<Vec3>, step: f32) -> Vec<Vec3> {
    if step <= 0.0 || points.len() < 2 {
        return points;
    }
    let mut out = vec![points[0]];
    for window in points.windows(2) {
        let (from, to) = (window[0], window[1]);
        let length = from.distance(to);
        let pieces = (length / step).ceil().max(1.0) as usize;
        for piece in 1..=pieces {
            out.push(from.lerp(to, piece as f32 / pieces as f32));
        }
    }
    out
}
