//! Core type definitions used throughout the codebase

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for battles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BattleId(pub Uuid);

impl BattleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BattleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BattleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque unit identifier, unique within one side
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(pub String);

impl UnitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Player identifier as issued by the hosting platform
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Battle turn counter
pub type Turn = u32;

/// One of the two sides of a battle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Player1,
    Player2,
}

impl Side {
    pub fn opponent(self) -> Self {
        match self {
            Side::Player1 => Side::Player2,
            Side::Player2 => Side::Player1,
        }
    }

    pub fn all() -> [Side; 2] {
        [Side::Player1, Side::Player2]
    }

    pub fn label(self) -> &'static str {
        match self {
            Side::Player1 => "player1",
            Side::Player2 => "player2",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Side-qualified reference to a unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitRef {
    pub side: Side,
    pub unit_id: UnitId,
}

impl UnitRef {
    pub fn new(side: Side, unit_id: UnitId) -> Self {
        Self { side, unit_id }
    }
}

impl fmt::Display for UnitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.side, self.unit_id)
    }
}

/// A value held once per side
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SidePair<T> {
    pub player1: T,
    pub player2: T,
}

impl<T> SidePair<T> {
    pub fn new(player1: T, player2: T) -> Self {
        Self { player1, player2 }
    }

    pub fn get(&self, side: Side) -> &T {
        match side {
            Side::Player1 => &self.player1,
            Side::Player2 => &self.player2,
        }
    }

    pub fn get_mut(&mut self, side: Side) -> &mut T {
        match side {
            Side::Player1 => &mut self.player1,
            Side::Player2 => &mut self.player2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_opponent() {
        assert_eq!(Side::Player1.opponent(), Side::Player2);
        assert_eq!(Side::Player2.opponent(), Side::Player1);
    }

    #[test]
    fn test_side_serializes_snake_case() {
        let json = serde_json::to_string(&Side::Player2).unwrap();
        assert_eq!(json, "\"player2\"");
    }

    #[test]
    fn test_side_pair_access() {
        let mut pair = SidePair::new(1, 2);
        *pair.get_mut(Side::Player2) += 10;
        assert_eq!(*pair.get(Side::Player1), 1);
        assert_eq!(*pair.get(Side::Player2), 12);
    }

    #[test]
    fn test_unit_id_is_transparent() {
        let id = UnitId::new("legio-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"legio-1\"");
    }
}
