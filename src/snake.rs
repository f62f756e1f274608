use std::collections::{HashSet, VecDeque};

use Direction::*;

/// Rows grow downwards, columns to the right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cell {
    pub row: i32,
    pub col: i32,
}

impl Cell {
    pub fn new(row: i32, col: i32) -> Self {
        Cell { row, col }
    }

    pub fn step(self, direction: Direction) -> Self {
        let (d_row, d_col) = direction.offset();
        Cell::new(self.row + d_row, self.col + d_col)
    }

    pub fn is_inside(self, height: i32, width: i32) -> bool {
        self.row >= 0 && self.row < height && self.col >= 0 && self.col < width
    }

    pub fn wrapped(self, height: i32, width: i32) -> Self {
        Cell::new(self.row.rem_euclid(height), self.col.rem_euclid(width))
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn offset(self) -> (i32, i32) {
        match self {
            Up => (-1, 0),
            Down => (1, 0),
            Left => (0, -1),
            Right => (0, 1),
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Up => Down,
            Down => Up,
            Left => Right,
            Right => Left,
        }
    }

    pub fn is_opposite(self, other: Direction) -> bool {
        self.opposite() == other
    }
}

/// Head first. `steps[i]` is the move that led from `body[i + 1]` to `body[i]`,
/// which cell differences alone can't tell apart across a wrapped edge.
#[derive(Debug, Clone)]
pub struct Snake {
    body: VecDeque<Cell>,
    steps: VecDeque<Direction>,
    occupied: HashSet<Cell>,
    direction: Direction,
}

impl Snake {
    pub fn new(head: Cell, size: usize, direction: Direction) -> Self {
        let back = direction.opposite();
        let body: VecDeque<Cell> = (0..size)
            .scan(head, |pos, _| {
                let cell = *pos;
                *pos = pos.step(back);
                Some(cell)
            })
            .collect();
        let steps = (1..size).map(|_| direction).collect();
        let occupied = body.iter().copied().collect();

        Snake { body, steps, occupied, direction }
    }

    pub fn body(&self) -> &VecDeque<Cell> {
        &self.body
    }

    pub fn head(&self) -> Cell {
        self.body[0]
    }

    pub fn tail(&self) -> Cell {
        self.body[self.body.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    pub fn occupies(&self, cell: Cell) -> bool {
        self.occupied.contains(&cell)
    }

    // The tail is about to move away unless the snake is growing
    pub fn bites_itself(&self, next_head: Cell, growing: bool) -> bool {
        self.occupies(next_head) && (growing || next_head != self.tail())
    }

    /// Moves the head onto `new_head`, reached by one step in the current
    /// direction, and returns the vacated tail cell unless growing.
    pub fn advance(&mut self, new_head: Cell, grow: bool) -> Option<Cell> {
        // Tail first, so a head moving into the old tail cell stays indexed
        let old_tail = if grow { None } else { self.body.pop_back() };
        if let Some(tail) = old_tail {
            self.occupied.remove(&tail);
            self.steps.pop_back();
        }

        if !self.body.is_empty() {
            self.steps.push_front(self.direction);
        }
        self.body.push_front(new_head);
        self.occupied.insert(new_head);
        old_tail
    }

    pub fn head_char(&self) -> char {
        match self.direction {
            Up => '^',
            Down => 'v',
            Left => '<',
            Right => '>',
        }
    }

    /// Glyph for the segment at `index`, joining it to its neighbours.
    pub fn segment_char(&self, index: usize) -> char {
        if index == 0 {
            return self.head_char();
        }

        let towards_head = self.steps[index - 1];
        let towards_tail = match self.steps.get(index) {
            Some(step) => step.opposite(),
            None => towards_head.opposite(),
        };

        match (towards_head, towards_tail) {
            (Left, Right) | (Right, Left) => '─',
            (Up, Down) | (Down, Up) => '│',
            (Down, Right) | (Right, Down) => '┌',
            (Down, Left) | (Left, Down) => '┐',
            (Up, Right) | (Right, Up) => '└',
            (Up, Left) | (Left, Up) => '┘',
            // Only reachable for a body folded onto itself
            _ => '█',
        }
    }
}
