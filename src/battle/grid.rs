//! Square grid coordinates for battle maps
//!
//! The battlefield is a fixed 20x20 grid. Columns are letters A-T, rows are
//! numbered 1-20, so `"J11"` is column 9, row 10 in zero-based terms.

use std::fmt;
use std::str::FromStr;

use nom::bytes::complete::take_while_m_n;
use nom::character::complete::satisfy;
use nom::combinator::{all_consuming, map_res};
use nom::{IResult, Parser};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::battle::constants::GRID_SIZE;
use crate::core::error::{BattleError, Result};

/// Zero-based grid coordinate, always inside the 20x20 board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridCoord {
    pub col: u8,
    pub row: u8,
}

impl GridCoord {
    /// Build a coordinate from zero-based indices, `None` when off the board
    pub fn new(col: u8, row: u8) -> Option<Self> {
        if col < GRID_SIZE && row < GRID_SIZE {
            Some(Self { col, row })
        } else {
            None
        }
    }

    /// Build from signed offsets, clipping at the board edge
    fn offset(&self, dc: i32, dr: i32) -> Option<Self> {
        let col = self.col as i32 + dc;
        let row = self.row as i32 + dr;
        if col < 0 || row < 0 {
            return None;
        }
        Self::new(col as u8, row as u8)
    }

    /// Parse the `A1`..`T20` text form
    pub fn parse(text: &str) -> Result<Self> {
        let (_, (letter, number)) = all_consuming(coordinate)
            .parse(text)
            .map_err(|_| {
                BattleError::InvalidCoordinate(format!("malformed coordinate '{}'", text))
            })?;

        if number == 0 || number > GRID_SIZE {
            return Err(BattleError::InvalidCoordinate(format!(
                "row {} out of range in '{}' (expected 1-{})",
                number, text, GRID_SIZE
            )));
        }

        let col = letter as u8 - b'A';
        Self::new(col, number - 1)
            .ok_or_else(|| BattleError::InvalidCoordinate(format!("'{}' is off the board", text)))
    }

    /// Column letter (`A`..`T`)
    pub fn column_letter(&self) -> char {
        (b'A' + self.col) as char
    }

    /// Chebyshev distance, used for adjacency and engagement range
    pub fn distance(&self, other: &Self) -> u32 {
        let dc = (self.col as i32 - other.col as i32).unsigned_abs();
        let dr = (self.row as i32 - other.row as i32).unsigned_abs();
        dc.max(dr)
    }

    /// Straight-line distance, used for detection ranges
    pub fn euclidean_distance(&self, other: &Self) -> f32 {
        let dc = self.col as f32 - other.col as f32;
        let dr = self.row as f32 - other.row as f32;
        (dc * dc + dr * dr).sqrt()
    }

    /// Manhattan distance, the pathfinding heuristic
    pub fn manhattan_distance(&self, other: &Self) -> u32 {
        let dc = (self.col as i32 - other.col as i32).unsigned_abs();
        let dr = (self.row as i32 - other.row as i32).unsigned_abs();
        dc + dr
    }

    /// Up to 8 neighbours, clipped at the grid edges
    pub fn adjacent(&self) -> Vec<GridCoord> {
        let mut result = Vec::with_capacity(8);
        for dr in -1..=1 {
            for dc in -1..=1 {
                if dc == 0 && dr == 0 {
                    continue;
                }
                if let Some(coord) = self.offset(dc, dr) {
                    result.push(coord);
                }
            }
        }
        result
    }

    pub fn is_adjacent(&self, other: &Self) -> bool {
        self.distance(other) == 1
    }
}

fn coordinate(input: &str) -> IResult<&str, (char, u8)> {
    (
        satisfy(|c| ('A'..='T').contains(&c)),
        map_res(
            take_while_m_n(1, 2, |c: char| c.is_ascii_digit()),
            |digits: &str| digits.parse::<u8>(),
        ),
    )
        .parse(input)
}

/// Parse coordinate text such as `"J11"`
pub fn parse_coordinate(text: &str) -> Result<GridCoord> {
    GridCoord::parse(text)
}

/// Neighbours of a coordinate, clipped at the grid edges
pub fn adjacent_coordinates(coord: GridCoord) -> Vec<GridCoord> {
    coord.adjacent()
}

impl fmt::Display for GridCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.column_letter(), self.row + 1)
    }
}

impl FromStr for GridCoord {
    type Err = BattleError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for GridCoord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for GridCoord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        GridCoord::parse(&text).map_err(serde::de::Error::custom)
    }
}
