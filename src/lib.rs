//! pambu, a terminal snake game.
//!
//! - `snake`: grid cells, directions and the snake body
//! - `game`: the tick-driven engine and the game loop
//! - `term`: the terminal surface the loop draws to and reads keys from
//! - `config`: fixed game parameters

pub mod config;
pub mod game;
pub mod snake;
pub mod term;

pub type TermInt = u16;
pub type Coords = (u16, u16);
