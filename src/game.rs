use std::{fmt, thread::sleep, time::Instant};

use crate::config::{GameConfig, Walls};
use crate::snake::{Cell, Direction, Snake};
use crate::term::{Key, Surface};

use anyhow::{bail, Context, Result};
use log::{debug, info};
use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};

const APPLE_CHAR: char = 'O';
const DEAD_SNAKE_CHAR: char = 'X';

// Uniform probes before falling back to scanning every free cell
const RANDOM_PLACEMENT_ATTEMPTS: usize = 32;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EndReason {
    Wall,
    SelfCollision,
    Quit,
    /// No free cell is left for food
    BoardFilled,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EndReason::Wall => "Hit the wall!",
            EndReason::SelfCollision => "Collision detected!",
            EndReason::Quit => "Thanks for playing pambu!",
            EndReason::BoardFilled => "You won!",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GameState {
    Running,
    Over(EndReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Moved { new_head: Cell, old_tail: Option<Cell>, new_food: Option<Cell> },
    Ended(EndReason),
}

// A reversal is ignored, it would bite straight into the neck
pub fn resolve_direction(key: Option<Key>, current: Direction) -> Direction {
    match key.and_then(Key::direction) {
        Some(dir) if !dir.is_opposite(current) => dir,
        _ => current,
    }
}

/// Picks a free cell for food, or `None` when the snake covers the grid.
pub fn place_food<R: Rng>(snake: &Snake, height: i32, width: i32, rng: &mut R) -> Option<Cell> {
    let total = height as usize * width as usize;
    if snake.len() >= total {
        return None;
    }

    for _ in 0..RANDOM_PLACEMENT_ATTEMPTS {
        let cell = Cell::new(rng.gen_range(0..height), rng.gen_range(0..width));
        if !snake.occupies(cell) {
            return Some(cell);
        }
    }

    // Crowded board, choose among what is left
    let choices: Vec<Cell> = (0..height)
        .flat_map(|row| (0..width).map(move |col| Cell::new(row, col)))
        .filter(|cell| !snake.occupies(*cell))
        .collect();
    choices.choose(rng).copied()
}

pub struct SnakeGame {
    height: i32,
    width: i32,
    config: GameConfig,
    snake: Snake,
    food: Cell,
    score: u32,
    state: GameState,
    rng: StdRng,
}

impl SnakeGame {
    pub fn new(height: u16, width: u16, config: GameConfig) -> Result<Self> {
        Self::with_rng(height, width, config, StdRng::from_entropy())
    }

    pub fn with_rng(height: u16, width: u16, config: GameConfig, mut rng: StdRng) -> Result<Self> {
        let (height, width) = (i32::from(height), i32::from(width));
        let (min_height, min_width) = config.min_grid();
        if config.initial_snake_length == 0 {
            bail!("The snake needs at least one cell");
        }
        if height < min_height || width < min_width {
            bail!(
                "A {}x{} grid is too small, at least {}x{} is needed",
                height, width, min_height, min_width
            );
        }

        let center = Cell::new(height / 2, width / 2);
        let snake = Snake::new(center, config.initial_snake_length, Direction::Right);
        let food = place_food(&snake, height, width, &mut rng)
            .context("No room left for food on a fresh grid")?;

        Ok(SnakeGame { height, width, config, snake, food, score: 0, state: GameState::Running, rng })
    }

    /// A game picked up from an arbitrary layout
    pub fn with_layout(
        height: u16,
        width: u16,
        config: GameConfig,
        snake: Snake,
        food: Cell,
        rng: StdRng,
    ) -> Result<Self> {
        let (height, width) = (i32::from(height), i32::from(width));
        if snake.is_empty() {
            bail!("The snake needs at least one cell");
        }
        if let Some(cell) = snake.body().iter().find(|cell| !cell.is_inside(height, width)) {
            bail!("Snake cell {:?} is outside the {}x{} grid", cell, height, width);
        }
        if !food.is_inside(height, width) {
            bail!("Food {:?} is outside the {}x{} grid", food, height, width);
        }
        if snake.occupies(food) {
            bail!("Food {:?} lies on the snake", food);
        }

        Ok(SnakeGame { height, width, config, snake, food, score: 0, state: GameState::Running, rng })
    }

    pub fn snake(&self) -> &Snake {
        &self.snake
    }

    pub fn food(&self) -> Cell {
        self.food
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn tick(&mut self, key: Option<Key>) -> TickOutcome {
        if let GameState::Over(reason) = self.state {
            return TickOutcome::Ended(reason);
        }

        if key == Some(Key::Escape) {
            return self.end(EndReason::Quit);
        }

        let direction = resolve_direction(key, self.snake.direction());
        let mut new_head = self.snake.head().step(direction);

        if !new_head.is_inside(self.height, self.width) {
            match self.config.walls {
                Walls::Solid => return self.end(EndReason::Wall),
                Walls::Wrap => new_head = new_head.wrapped(self.height, self.width),
            }
        }

        let growing = new_head == self.food;
        if self.snake.bites_itself(new_head, growing) {
            return self.end(EndReason::SelfCollision);
        }

        self.snake.set_direction(direction);
        let old_tail = self.snake.advance(new_head, growing);

        let mut new_food = None;
        if growing {
            self.score += 1;
            debug!("food eaten at {:?}, score {}", new_head, self.score);

            match place_food(&self.snake, self.height, self.width, &mut self.rng) {
                Some(food) => {
                    self.food = food;
                    new_food = Some(food);
                }
                None => return self.end(EndReason::BoardFilled),
            }
        }

        TickOutcome::Moved { new_head, old_tail, new_food }
    }

    pub fn run<S: Surface>(&mut self, surface: &mut S) -> Result<EndReason> {
        info!("new game on a {}x{} grid", self.height, self.width);
        self.print_all(surface)?;

        let mut next_tick = Instant::now() + self.config.tick;

        loop {
            // The board is on screen for a full tick before anything moves
            let now = Instant::now();
            match next_tick.checked_duration_since(now) {
                Some(wait) => {
                    sleep(wait);
                    next_tick += self.config.tick;
                }
                // Running late, start counting from here
                None => next_tick = now + self.config.tick,
            }

            let key = surface.poll_key()?;

            match self.tick(key) {
                TickOutcome::Ended(reason) => {
                    info!("game over: {:?}, score {}", reason, self.score);
                    self.print_end(surface, reason)?;
                    return Ok(reason);
                }
                moved => self.print_update(surface, &moved)?,
            }
        }
    }

    ///////////////////////////////////////////////////////////////////////////

    fn end(&mut self, reason: EndReason) -> TickOutcome {
        self.state = GameState::Over(reason);
        TickOutcome::Ended(reason)
    }

    fn status_line(&self) -> String {
        format!("Score: {}", self.score)
    }

    fn print_all<S: Surface>(&self, surface: &mut S) -> Result<()> {
        surface.clear()?;

        for (i, pos) in self.snake.body().iter().enumerate() {
            surface.draw_char(*pos, self.snake.segment_char(i))?;
        }
        surface.draw_char(self.food, APPLE_CHAR)?;
        surface.show_status(&self.status_line())?;

        surface.refresh()
    }

    fn print_update<S: Surface>(&self, surface: &mut S, outcome: &TickOutcome) -> Result<()> {
        if let TickOutcome::Moved { new_head, old_tail, new_food } = outcome {
            // Erase first, the head may have moved into the old tail cell
            if let Some(old_tail_pos) = old_tail {
                surface.draw_char(*old_tail_pos, ' ')?;
            }

            let last = self.snake.len() - 1;
            surface.draw_char(*new_head, self.snake.segment_char(0))?;
            if last > 0 {
                // The old head became body and the new tail lost a neighbour
                surface.draw_char(self.snake.body()[1], self.snake.segment_char(1))?;
                surface.draw_char(self.snake.tail(), self.snake.segment_char(last))?;
            }

            if let Some(food) = new_food {
                surface.draw_char(*food, APPLE_CHAR)?;
                surface.show_status(&self.status_line())?;
            }

            surface.refresh()?;
        }

        Ok(())
    }

    fn print_end<S: Surface>(&self, surface: &mut S, reason: EndReason) -> Result<()> {
        match reason {
            EndReason::Wall | EndReason::SelfCollision => {
                for pos in self.snake.body() {
                    surface.draw_char(*pos, DEAD_SNAKE_CHAR)?;
                }
            }
            // The winning move grew the snake onto the last food without being drawn
            EndReason::BoardFilled => {
                for (i, pos) in self.snake.body().iter().enumerate() {
                    surface.draw_char(*pos, self.snake.segment_char(i))?;
                }
            }
            EndReason::Quit => {}
        }

        surface.show_status(&format!("{} {}", reason, self.status_line()))?;
        surface.refresh()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snake::Direction::*;

    fn seeded() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn game(snake: Snake, food: Cell) -> SnakeGame {
        SnakeGame::with_layout(10, 10, GameConfig::default(), snake, food, seeded()).unwrap()
    }

    fn cells(game: &SnakeGame) -> Vec<(i32, i32)> {
        game.snake().body().iter().map(|c| (c.row, c.col)).collect()
    }

    fn assert_linked(snake: &Snake) {
        let body: Vec<Cell> = snake.body().iter().copied().collect();
        for pair in body.windows(2) {
            let distance = (pair[0].row - pair[1].row).abs() + (pair[0].col - pair[1].col).abs();
            assert_eq!(distance, 1, "{:?} and {:?} are not adjacent", pair[0], pair[1]);
        }
        for (i, a) in body.iter().enumerate() {
            assert!(!body[i + 1..].contains(a), "{:?} appears twice", a);
        }
    }

    #[test]
    fn test_new_game() {
        let game = SnakeGame::with_rng(10, 10, GameConfig::default(), seeded()).unwrap();

        assert_eq!(game.state(), GameState::Running);
        assert_eq!(game.score(), 0);
        assert_eq!(cells(&game), vec![(5, 5), (5, 4), (5, 3)]);
        assert_eq!(game.snake().direction(), Right);
        assert!(!game.snake().occupies(game.food()));
        assert!(game.food().is_inside(10, 10));
    }

    #[test]
    fn test_grid_too_small() {
        assert!(SnakeGame::with_rng(10, 3, GameConfig::default(), seeded()).is_err());
        assert!(SnakeGame::with_rng(0, 10, GameConfig::default(), seeded()).is_err());
        assert!(SnakeGame::with_rng(1, 4, GameConfig::default(), seeded()).is_ok());

        let config = GameConfig { initial_snake_length: 0, ..Default::default() };
        assert!(SnakeGame::with_rng(10, 10, config, seeded()).is_err());
    }

    #[test]
    fn test_layout_is_checked() {
        let layout = |height, width, snake, food| {
            SnakeGame::with_layout(height, width, GameConfig::default(), snake, food, seeded())
        };

        assert!(layout(10, 10, Snake::new(Cell::new(5, 5), 0, Right), Cell::new(0, 0)).is_err());
        // Food on the body
        assert!(layout(10, 10, Snake::new(Cell::new(5, 5), 3, Right), Cell::new(5, 4)).is_err());
        // Tail sticking out of the left edge
        assert!(layout(10, 10, Snake::new(Cell::new(5, 1), 3, Right), Cell::new(0, 0)).is_err());
        assert!(layout(10, 10, Snake::new(Cell::new(5, 5), 3, Right), Cell::new(10, 0)).is_err());
        assert!(layout(0, 10, Snake::new(Cell::new(0, 5), 1, Right), Cell::new(0, 0)).is_err());

        assert!(layout(10, 10, Snake::new(Cell::new(5, 5), 3, Right), Cell::new(5, 6)).is_ok());
    }

    #[test]
    fn test_plain_move() {
        let mut game = game(Snake::new(Cell::new(5, 5), 3, Right), Cell::new(0, 0));

        let outcome = game.tick(None);

        assert_eq!(
            outcome,
            TickOutcome::Moved { new_head: Cell::new(5, 6), old_tail: Some(Cell::new(5, 3)), new_food: None }
        );
        assert_eq!(cells(&game), vec![(5, 6), (5, 5), (5, 4)]);
        assert_eq!(game.score(), 0);
        assert_eq!(game.food(), Cell::new(0, 0));
        assert_linked(game.snake());
    }

    #[test]
    fn test_eating_food() {
        let mut game = game(Snake::new(Cell::new(5, 5), 3, Right), Cell::new(5, 6));

        let outcome = game.tick(None);

        assert_eq!(cells(&game), vec![(5, 6), (5, 5), (5, 4), (5, 3)]);
        assert_eq!(game.score(), 1);
        assert_eq!(game.state(), GameState::Running);
        assert!(!game.snake().occupies(game.food()));
        assert_eq!(
            outcome,
            TickOutcome::Moved { new_head: Cell::new(5, 6), old_tail: None, new_food: Some(game.food()) }
        );
        assert_linked(game.snake());
    }

    #[test]
    fn test_wall_collision() {
        let mut game = game(Snake::new(Cell::new(0, 3), 3, Up), Cell::new(5, 5));
        let before = cells(&game);

        assert_eq!(game.tick(None), TickOutcome::Ended(EndReason::Wall));
        assert_eq!(game.state(), GameState::Over(EndReason::Wall));
        assert_eq!(cells(&game), before);
        assert_eq!(game.score(), 0);
    }

    #[test]
    fn test_every_wall_is_solid() {
        let cases = [
            (Cell::new(5, 9), Right),
            (Cell::new(5, 0), Left),
            (Cell::new(9, 5), Down),
            (Cell::new(0, 5), Up),
        ];

        for (head, dir) in cases.iter() {
            let mut game = game(Snake::new(*head, 1, *dir), Cell::new(3, 3));
            assert_eq!(game.tick(None), TickOutcome::Ended(EndReason::Wall), "{:?} {:?}", head, dir);
        }
    }

    #[test]
    fn test_wrapping_walls() {
        let config = GameConfig { walls: Walls::Wrap, ..Default::default() };
        let mut game = SnakeGame::with_layout(
            10, 10, config, Snake::new(Cell::new(0, 3), 3, Up), Cell::new(5, 5), seeded(),
        )
        .unwrap();

        game.tick(None);

        assert_eq!(game.state(), GameState::Running);
        assert_eq!(game.snake().head(), Cell::new(9, 3));
        assert_eq!(game.snake().len(), 3);
    }

    #[test]
    fn test_self_collision() {
        // Snake at (5, 5) heading right with length 5, then curl back into the body
        let mut game = game(Snake::new(Cell::new(5, 5), 5, Right), Cell::new(0, 0));

        game.tick(Some(Key::Down));
        game.tick(Some(Key::Left));
        assert_eq!(game.state(), GameState::Running);

        let outcome = game.tick(Some(Key::Up));

        assert_eq!(outcome, TickOutcome::Ended(EndReason::SelfCollision));
        assert_eq!(game.state(), GameState::Over(EndReason::SelfCollision));
        assert_eq!(game.snake().head(), Cell::new(6, 4));
    }

    #[test]
    fn test_chasing_own_tail_is_allowed() {
        // Length 4 going round a 2x2 square, the head always enters the tail's cell
        let mut game = game(Snake::new(Cell::new(5, 5), 2, Right), Cell::new(6, 5));
        game.tick(Some(Key::Down));
        assert_eq!(game.snake().len(), 3);
        game.food = Cell::new(6, 4);
        game.tick(Some(Key::Left));
        assert_eq!(game.snake().len(), 4);
        game.food = Cell::new(0, 0);

        for key in [Key::Up, Key::Right, Key::Down, Key::Left].iter().cycle().take(12) {
            game.tick(Some(*key));
            assert_eq!(game.state(), GameState::Running);
            assert_eq!(game.snake().len(), 4);
            assert_linked(game.snake());
        }
    }

    #[test]
    fn test_reversal_is_ignored() {
        let mut game = game(Snake::new(Cell::new(5, 5), 3, Right), Cell::new(0, 0));

        game.tick(Some(Key::Left));

        assert_eq!(game.snake().direction(), Right);
        assert_eq!(game.snake().head(), Cell::new(5, 6));
        assert_eq!(game.state(), GameState::Running);
    }

    #[test]
    fn test_resolve_direction() {
        assert_eq!(resolve_direction(None, Right), Right);
        assert_eq!(resolve_direction(Some(Key::Left), Right), Right);
        assert_eq!(resolve_direction(Some(Key::Right), Right), Right);
        assert_eq!(resolve_direction(Some(Key::Up), Right), Up);
        assert_eq!(resolve_direction(Some(Key::Other), Down), Down);
        assert_eq!(resolve_direction(Some(Key::Escape), Down), Down);

        let all = [Up, Down, Left, Right];
        let keys = [Key::Up, Key::Down, Key::Left, Key::Right, Key::Escape, Key::Other];
        for current in all.iter() {
            for key in keys.iter() {
                assert!(!resolve_direction(Some(*key), *current).is_opposite(*current));
            }
        }
    }

    #[test]
    fn test_escape_ends_the_game() {
        let mut game = game(Snake::new(Cell::new(5, 5), 3, Right), Cell::new(5, 6));

        assert_eq!(game.tick(Some(Key::Escape)), TickOutcome::Ended(EndReason::Quit));
        assert_eq!(game.state(), GameState::Over(EndReason::Quit));
        // Food right ahead was not eaten
        assert_eq!(game.score(), 0);
        assert_eq!(game.snake().head(), Cell::new(5, 5));
    }

    #[test]
    fn test_over_is_terminal() {
        let mut game = game(Snake::new(Cell::new(0, 3), 3, Up), Cell::new(5, 5));
        game.tick(None);
        let before = cells(&game);

        assert_eq!(game.tick(Some(Key::Right)), TickOutcome::Ended(EndReason::Wall));
        assert_eq!(game.tick(Some(Key::Escape)), TickOutcome::Ended(EndReason::Wall));
        assert_eq!(cells(&game), before);
    }

    #[test]
    fn test_filling_the_board_wins() {
        // 1x4 grid, a 3-cell snake about to eat the last free cell
        let mut game = SnakeGame::with_layout(
            1, 4, GameConfig::default(), Snake::new(Cell::new(0, 2), 3, Right), Cell::new(0, 3), seeded(),
        )
        .unwrap();

        assert_eq!(game.tick(None), TickOutcome::Ended(EndReason::BoardFilled));
        assert_eq!(game.score(), 1);
        assert_eq!(game.snake().len(), 4);
    }

    #[test]
    fn test_place_food_avoids_snake() {
        let mut rng = seeded();
        let snake = Snake::new(Cell::new(1, 2), 3, Right);

        for _ in 0..200 {
            let food = place_food(&snake, 3, 3, &mut rng).unwrap();
            assert!(food.is_inside(3, 3));
            assert!(!snake.occupies(food));
        }
    }

    #[test]
    fn test_place_food_last_free_cell() {
        let mut rng = seeded();
        // 2x2 grid with three cells taken
        let mut snake = Snake::new(Cell::new(0, 1), 2, Right);
        snake.advance(Cell::new(1, 1), true);

        for _ in 0..20 {
            assert_eq!(place_food(&snake, 2, 2, &mut rng), Some(Cell::new(1, 0)));
        }

        snake.advance(Cell::new(1, 0), true);
        assert_eq!(place_food(&snake, 2, 2, &mut rng), None);
    }
}
