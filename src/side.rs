use std::fmt;
use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

/// Number of actuation stations on each side of the body, rear to front.
pub const STATIONS_PER_SIDE: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Left, Side::Right];

    /// Single-letter tag used by the command protocol and status lines.
    pub fn letter(self) -> char {
        match self {
            Side::Left => 'L',
            Side::Right => 'R',
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// One value per side. Replaces parallel left/right arrays so per-side logic is written once.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerSide<T> {
    pub left: T,
    pub right: T,
}

impl<T> PerSide<T> {
    pub fn from_fn(mut f: impl FnMut(Side) -> T) -> Self {
        Self {
            left: f(Side::Left),
            right: f(Side::Right),
        }
    }

    pub fn map<U>(self, mut f: impl FnMut(Side, T) -> U) -> PerSide<U> {
        PerSide {
            left: f(Side::Left, self.left),
            right: f(Side::Right, self.right),
        }
    }
}

impl<T: Clone> PerSide<T> {
    pub fn splat(value: T) -> Self {
        Self {
            left: value.clone(),
            right: value,
        }
    }
}

impl<T> Index<Side> for PerSide<T> {
    type Output = T;

    fn index(&self, side: Side) -> &T {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }
}

impl<T> IndexMut<Side> for PerSide<T> {
    fn index_mut(&mut self, side: Side) -> &mut T {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }
}

/// Per-actuator angle set, degrees, rear to front.
pub type AngleSet = PerSide<[f32; STATIONS_PER_SIDE]>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_by_side() {
        let mut values = PerSide { left: 1, right: 2 };
        assert_eq!(values[Side::Left], 1);
        assert_eq!(values[Side::Right], 2);
        values[Side::Right] = 5;
        assert_eq!(values.right, 5);
    }

    #[test]
    fn map_passes_side() {
        let tagged = PerSide::splat(0).map(|side, _| side.letter());
        assert_eq!(tagged, PerSide { left: 'L', right: 'R' });
    }
}
