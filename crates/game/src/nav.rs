//! Tile-grid navigation: 4-neighbour A* behind the [`PathService`] contract and
//! a wall-layer line-of-sight test.

use std::collections::BTreeMap;

use engine::{EntityId, TileCoord, Tilemap, Vec2};
use tracing::debug;

use crate::services::{
    LayerMask, LineOfSight, PathCompletion, PathError, PathService, PathTicket,
};

pub const WALL_TILE_ID: u16 = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingRequest {
    ticket: PathTicket,
    from: Vec2,
    to: Vec2,
}

#[derive(Debug, Clone)]
pub struct GridNavigator {
    width: u32,
    height: u32,
    origin: Vec2,
    walkable: Vec<bool>,
    next_ticket: u64,
    in_flight: BTreeMap<EntityId, PendingRequest>,
}

impl GridNavigator {
    pub fn from_tilemap(tilemap: &Tilemap) -> Self {
        let width = tilemap.width();
        let height = tilemap.height();
        let mut walkable = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                let tile_id = tilemap.tile_at(x, y).unwrap_or(0);
                walkable.push(tile_id != WALL_TILE_ID);
            }
        }

        Self {
            width,
            height,
            origin: tilemap.origin(),
            walkable,
            next_ticket: 0,
            in_flight: BTreeMap::new(),
        }
    }

    fn world_to_tile(&self, world: Vec2) -> Option<TileCoord> {
        let (tile_x, tile_y) = self.world_to_cell(world);
        if tile_x < 0 || tile_y < 0 || tile_x >= self.width as i64 || tile_y >= self.height as i64
        {
            return None;
        }
        Some(TileCoord {
            x: tile_x as u32,
            y: tile_y as u32,
        })
    }

    fn world_to_cell(&self, world: Vec2) -> (i64, i64) {
        (
            (world.x - self.origin.x).floor() as i64,
            (world.y - self.origin.y).floor() as i64,
        )
    }

    fn tile_center_world(&self, tile: TileCoord) -> Vec2 {
        Vec2 {
            x: self.origin.x + tile.x as f32 + 0.5,
            y: self.origin.y + tile.y as f32 + 0.5,
        }
    }

    fn index_of(&self, tile: TileCoord) -> Option<usize> {
        if tile.x >= self.width || tile.y >= self.height {
            return None;
        }
        Some(tile.y as usize * self.width as usize + tile.x as usize)
    }

    fn is_walkable(&self, tile: TileCoord) -> bool {
        self.index_of(tile)
            .and_then(|index| self.walkable.get(index))
            .copied()
            .unwrap_or(false)
    }

    fn is_wall_cell(&self, x: i64, y: i64) -> bool {
        if x < 0 || y < 0 {
            return true;
        }
        !self.is_walkable(TileCoord {
            x: x as u32,
            y: y as u32,
        })
    }

    /// Waypoints through tile centers, ending exactly on `goal_world`.
    pub fn find_path(&self, start_world: Vec2, goal_world: Vec2) -> Result<Vec<Vec2>, PathError> {
        let start_tile = self.world_to_tile(start_world).ok_or(PathError::OutOfBounds)?;
        let goal_tile = self.world_to_tile(goal_world).ok_or(PathError::OutOfBounds)?;
        let tile_path = self
            .find_path_tiles(start_tile, goal_tile)
            .ok_or(PathError::Unreachable)?;

        let mut waypoints = tile_path
            .iter()
            .skip(1)
            .map(|tile| self.tile_center_world(*tile))
            .collect::<Vec<_>>();
        match waypoints.last_mut() {
            Some(last) => *last = goal_world,
            None => waypoints.push(goal_world),
        }
        Ok(waypoints)
    }

    fn find_path_tiles(&self, start: TileCoord, goal: TileCoord) -> Option<Vec<TileCoord>> {
        let start_index = self.index_of(start)?;
        let goal_index = self.index_of(goal)?;
        if !self.is_walkable(start) || !self.is_walkable(goal) {
            return None;
        }

        if start == goal {
            return Some(vec![start]);
        }

        let node_count = self.width as usize * self.height as usize;
        let mut closed = vec![false; node_count];
        let mut best_g = vec![u32::MAX; node_count];
        let mut parent = vec![None::<usize>; node_count];
        let mut open = Vec::new();
        let mut next_insertion = 0u64;

        let start_h = manhattan_distance(start, goal);
        open.push(OpenNode {
            coord: start,
            h_cost: start_h,
            f_cost: start_h,
            insertion_order: next_insertion,
        });
        next_insertion = next_insertion.saturating_add(1);
        best_g[start_index] = 0;

        while !open.is_empty() {
            let best_index = pick_best_open_node_index(&open);
            let current = open.swap_remove(best_index);
            let Some(current_index) = self.index_of(current.coord) else {
                continue;
            };
            if closed[current_index] {
                continue;
            }
            closed[current_index] = true;

            if current.coord == goal {
                return reconstruct_tile_path(&parent, self.width, start_index, goal_index);
            }

            let current_g = best_g[current_index];
            for neighbor in self.neighbors(current.coord).into_iter().flatten() {
                let Some(neighbor_index) = self.index_of(neighbor) else {
                    continue;
                };
                if closed[neighbor_index] || !self.is_walkable(neighbor) {
                    continue;
                }

                let tentative_g = current_g.saturating_add(1);
                if tentative_g >= best_g[neighbor_index] {
                    continue;
                }

                best_g[neighbor_index] = tentative_g;
                parent[neighbor_index] = Some(current_index);
                let h_cost = manhattan_distance(neighbor, goal);
                open.push(OpenNode {
                    coord: neighbor,
                    h_cost,
                    f_cost: tentative_g.saturating_add(h_cost),
                    insertion_order: next_insertion,
                });
                next_insertion = next_insertion.saturating_add(1);
            }
        }

        None
    }

    fn neighbors(&self, coord: TileCoord) -> [Option<TileCoord>; 4] {
        let north = (coord.y + 1 < self.height).then(|| TileCoord {
            x: coord.x,
            y: coord.y + 1,
        });
        let east = (coord.x + 1 < self.width).then(|| TileCoord {
            x: coord.x + 1,
            y: coord.y,
        });
        let south = coord.y.checked_sub(1).map(|y| TileCoord { x: coord.x, y });
        let west = coord.x.checked_sub(1).map(|x| TileCoord { x, y: coord.y });
        [north, east, south, west]
    }

    /// Walks every cell the segment passes through (Amanatides-Woo traversal).
    fn segment_hits_wall(&self, from: Vec2, to: Vec2) -> bool {
        let start = from - self.origin;
        let end = to - self.origin;
        let (mut cell_x, mut cell_y) = self.world_to_cell(from);
        let (end_x, end_y) = self.world_to_cell(to);

        let dx = end.x - start.x;
        let dy = end.y - start.y;
        let step_x: i64 = if dx > 0.0 { 1 } else if dx < 0.0 { -1 } else { 0 };
        let step_y: i64 = if dy > 0.0 { 1 } else if dy < 0.0 { -1 } else { 0 };
        let t_delta_x = if dx != 0.0 { (1.0 / dx).abs() } else { f32::INFINITY };
        let t_delta_y = if dy != 0.0 { (1.0 / dy).abs() } else { f32::INFINITY };
        let mut t_max_x = if dx > 0.0 {
            ((cell_x + 1) as f32 - start.x) / dx
        } else if dx < 0.0 {
            (start.x - cell_x as f32) / -dx
        } else {
            f32::INFINITY
        };
        let mut t_max_y = if dy > 0.0 {
            ((cell_y + 1) as f32 - start.y) / dy
        } else if dy < 0.0 {
            (start.y - cell_y as f32) / -dy
        } else {
            f32::INFINITY
        };

        let max_steps = (end_x - cell_x).abs() + (end_y - cell_y).abs() + 1;
        for _ in 0..=max_steps {
            if self.is_wall_cell(cell_x, cell_y) {
                return true;
            }
            if cell_x == end_x && cell_y == end_y {
                return false;
            }
            if t_max_x < t_max_y {
                cell_x += step_x;
                t_max_x += t_delta_x;
            } else {
                cell_y += step_y;
                t_max_y += t_delta_y;
            }
        }
        self.is_wall_cell(end_x, end_y)
    }
}

impl PathService for GridNavigator {
    fn request_path(&mut self, requester: EntityId, from: Vec2, to: Vec2) -> Option<PathTicket> {
        if self.in_flight.contains_key(&requester) {
            return None;
        }
        let ticket = PathTicket(self.next_ticket);
        self.next_ticket = self.next_ticket.saturating_add(1);
        self.in_flight
            .insert(requester, PendingRequest { ticket, from, to });
        Some(ticket)
    }

    fn is_busy(&self, requester: EntityId) -> bool {
        self.in_flight.contains_key(&requester)
    }

    fn cancel(&mut self, requester: EntityId) {
        self.in_flight.remove(&requester);
    }

    fn poll_completed(&mut self) -> Vec<PathCompletion> {
        let requests = std::mem::take(&mut self.in_flight);
        requests
            .into_iter()
            .map(|(requester, request)| {
                let result = self.find_path(request.from, request.to);
                if let Err(error) = &result {
                    debug!(?requester, %error, "path_request_failed");
                }
                PathCompletion {
                    requester,
                    ticket: request.ticket,
                    result,
                }
            })
            .collect()
    }
}

impl LineOfSight for GridNavigator {
    fn is_blocked(&self, from: Vec2, to: Vec2, mask: LayerMask) -> bool {
        if !mask.contains(LayerMask::WALLS) {
            return false;
        }
        self.segment_hits_wall(from, to)
    }
}

#[derive(Debug, Clone, Copy)]
struct OpenNode {
    coord: TileCoord,
    h_cost: u32,
    f_cost: u32,
    insertion_order: u64,
}

fn pick_best_open_node_index(open: &[OpenNode]) -> usize {
    let mut best_index = 0usize;
    for index in 1..open.len() {
        if open_node_order_key(open[index]) < open_node_order_key(open[best_index]) {
            best_index = index;
        }
    }
    best_index
}

fn open_node_order_key(node: OpenNode) -> (u32, u32, u32, u32, u64) {
    (
        node.f_cost,
        node.h_cost,
        node.coord.y,
        node.coord.x,
        node.insertion_order,
    )
}

fn reconstruct_tile_path(
    parent: &[Option<usize>],
    width: u32,
    start_index: usize,
    goal_index: usize,
) -> Option<Vec<TileCoord>> {
    let mut cursor = goal_index;
    let mut indices = vec![cursor];

    while cursor != start_index {
        cursor = parent.get(cursor).and_then(|value| *value)?;
        indices.push(cursor);
    }
    indices.reverse();
    Some(
        indices
            .into_iter()
            .map(|index| TileCoord {
                x: (index as u32) % width,
                y: (index as u32) / width,
            })
            .collect(),
    )
}

fn manhattan_distance(a: TileCoord, b: TileCoord) -> u32 {
    a.x.abs_diff(b.x).saturating_add(a.y.abs_diff(b.y))
}
