use std::{cmp::max, time::Duration};

const TICK_INTERVAL_MS: u64 = 100;
const INITIAL_SNAKE_LENGTH: usize = 3;

/// What happens when the head leaves the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Walls {
    Solid,
    Wrap,
}

#[derive(Debug, Clone)]
pub struct GameConfig {
    pub tick: Duration,
    pub initial_snake_length: usize,
    pub walls: Walls,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(TICK_INTERVAL_MS),
            initial_snake_length: INITIAL_SNAKE_LENGTH,
            walls: Walls::Solid,
        }
    }
}

impl GameConfig {
    /// Smallest (height, width) grid that fits the centered initial snake
    /// and still leaves a free cell for food
    pub fn min_grid(&self) -> (i32, i32) {
        let len = self.initial_snake_length as i32;
        (1, max(2 * (len - 1), len + 1))
    }
}
