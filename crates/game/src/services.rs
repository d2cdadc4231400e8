//! Collaborators the combat core consumes but does not implement itself.

use engine::{EntityId, Vec2};
use thiserror::Error;

use crate::combat::CombatRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathTicket(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("start or goal lies outside the navigation area")]
    OutOfBounds,
    #[error("no walkable route between start and goal")]
    Unreachable,
    #[error("request was superseded or cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathCompletion {
    pub requester: EntityId,
    pub ticket: PathTicket,
    pub result: Result<Vec<Vec2>, PathError>,
}

/// Asynchronous path planning. Results never arrive during the call that
/// requested them; they come back from a later [`PathService::poll_completed`].
pub trait PathService {
    /// Starts a request. Returns `None` while the requester already has one in
    /// flight.
    fn request_path(&mut self, requester: EntityId, from: Vec2, to: Vec2) -> Option<PathTicket>;

    fn is_busy(&self, requester: EntityId) -> bool;

    /// Forgets any in-flight request so no completion is delivered for it.
    fn cancel(&mut self, requester: EntityId);

    fn poll_completed(&mut self) -> Vec<PathCompletion>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerMask(pub u32);

impl LayerMask {
    pub const NONE: LayerMask = LayerMask(0);
    pub const WALLS: LayerMask = LayerMask(1);

    pub fn contains(self, other: LayerMask) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }
}

pub trait LineOfSight {
    /// True when an obstacle on `mask` lies between `from` and `to`.
    fn is_blocked(&self, from: Vec2, to: Vec2, mask: LayerMask) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetSnapshot {
    pub id: EntityId,
    pub position: Vec2,
    pub alive: bool,
}

pub trait TargetLookup {
    fn find_combatant_by_role(&self, role: CombatRole) -> Option<TargetSnapshot>;

    fn combatant(&self, id: EntityId) -> Option<TargetSnapshot>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_mask_contains() {
        assert!(LayerMask::WALLS.contains(LayerMask::WALLS));
        assert!(LayerMask(0b11).contains(LayerMask::WALLS));
        assert!(!LayerMask::NONE.contains(LayerMask::WALLS));
        assert!(!LayerMask::WALLS.contains(LayerMask::NONE));
    }
}
