use crate::{Coords, TermInt};
use crate::snake::{Cell, Direction};
use std::{io::{Stdout, Write, stdout}, time::Duration};

use anyhow::{Context, Result};
use crossterm::{cursor, execute, queue, style, terminal};
use crossterm::terminal::{ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers, read, poll};
use log::{debug, warn};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Escape,
    Other,
}

impl Key {
    pub fn direction(self) -> Option<Direction> {
        match self {
            Key::Up => Some(Direction::Up),
            Key::Down => Some(Direction::Down),
            Key::Left => Some(Direction::Left),
            Key::Right => Some(Direction::Right),
            Key::Escape | Key::Other => None,
        }
    }

    /// Folds a newer key into the one already pending for this tick.
    /// Escape sticks, and unmapped keys never displace a pending one.
    pub fn merge(pending: Option<Key>, newer: Key) -> Option<Key> {
        match (pending, newer) {
            (Some(Key::Escape), _) => pending,
            (Some(_), Key::Other) => pending,
            _ => Some(newer),
        }
    }
}

impl From<KeyEvent> for Key {
    fn from(ev: KeyEvent) -> Self {
        if is_ctrl_c(&ev) {
            // Raw mode swallows SIGINT, so Ctrl+C only ever arrives as a key
            return Key::Escape;
        }

        match ev.code {
            KeyCode::Char('w') | KeyCode::Char('W') | KeyCode::Up => Key::Up,
            KeyCode::Char('a') | KeyCode::Char('A') | KeyCode::Left => Key::Left,
            KeyCode::Char('s') | KeyCode::Char('S') | KeyCode::Down => Key::Down,
            KeyCode::Char('d') | KeyCode::Char('D') | KeyCode::Right => Key::Right,
            KeyCode::Esc => Key::Escape,
            _ => Key::Other,
        }
    }
}

/// Cells are grid coordinates, bounded by `grid_dimensions()` as
/// `(height, width)`. Borders and the status line live outside the grid.
pub trait Surface {
    fn grid_dimensions(&self) -> (TermInt, TermInt);

    fn draw_char(&mut self, cell: Cell, glyph: char) -> Result<()>;

    /// Replaces the status line, drawn outside the grid
    fn show_status(&mut self, text: &str) -> Result<()>;

    fn clear(&mut self) -> Result<()>;

    fn refresh(&mut self) -> Result<()>;

    /// The key pressed since the last call, if any. Never blocks.
    fn poll_key(&mut self) -> Result<Option<Key>>;
}

/// The real terminal. Holding one keeps the terminal in raw mode on the
/// alternate screen; dropping it puts the terminal back.
pub struct TermManager {
    width: TermInt,
    height: TermInt,
    stdout: Stdout,
    active: bool,
}

impl TermManager {
    pub fn acquire() -> Result<Self> {
        let (width, height) = terminal::size().context("Error reading terminal size")?;
        let mut term = TermManager { width, height, stdout: stdout(), active: false };
        term.setup()?;
        Ok(term)
    }

    fn setup(&mut self) -> Result<()> {
        execute!(self.stdout, EnterAlternateScreen).context("Error entering alt screen")?;
        // From here on a failure must still restore the terminal on drop
        self.active = true;
        self.set_raw_mode(true)?;
        self.set_cursor_visibility(false)?;
        self.set_cursor_blink(false)?;
        debug!("terminal set up, {}x{}", self.width, self.height);
        Ok(())
    }

    pub fn restore(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;

        // Every step is attempted even if an earlier one failed
        let raw = self.set_raw_mode(false);
        let visibility = self.set_cursor_visibility(true);
        let blink = self.set_cursor_blink(true);
        let screen = execute!(self.stdout, LeaveAlternateScreen).context("Error leaving alt screen");

        raw.and(visibility).and(blink).and(screen)
    }

    fn draw_borders(&mut self) -> Result<()> {
        let end_x = self.width.saturating_sub(1);
        let end_y = self.height.saturating_sub(1);

        for x in 0..self.width {
            let ch = if x == 0 || x == end_x {'+'} else {'-'};
            self.print_at((x, 0), ch)?;
            self.print_at((x, end_y), ch)?;
        }

        for y in 1..end_y {
            self.print_at((0, y), '|')?;
            self.print_at((end_x, y), '|')?;
        }

        Ok(())
    }

    fn print_at(&mut self, pos: Coords, ch: char) -> Result<()> {
        queue!(self.stdout, cursor::MoveTo(pos.0, pos.1), style::Print(ch))
            .context("Error drawing to terminal")
    }

    fn print_str_at(&mut self, pos: Coords, text: &str) -> Result<()> {
        queue!(self.stdout, cursor::MoveTo(pos.0, pos.1), style::Print(text))
            .context("Error drawing to terminal")
    }

    fn set_raw_mode(&self, option: bool) -> Result<()> {
        let res = if option {
            terminal::enable_raw_mode()
        } else {
            terminal::disable_raw_mode()
        };

        res.context("Error setting raw mode")
    }

    fn set_cursor_blink(&mut self, option: bool) -> Result<()> {
        let res = if option {
            execute!(self.stdout, cursor::EnableBlinking)
        } else {
            execute!(self.stdout, cursor::DisableBlinking)
        };

        res.context("Error setting cursor blink")
    }

    fn set_cursor_visibility(&mut self, option: bool) -> Result<()> {
        let res = if option {
            execute!(self.stdout, cursor::Show)
        } else {
            execute!(self.stdout, cursor::Hide)
        };

        res.context("Error setting cursor visibility")
    }
}

impl Surface for TermManager {
    fn grid_dimensions(&self) -> (TermInt, TermInt) {
        // One border cell on every side
        (self.height.saturating_sub(2), self.width.saturating_sub(2))
    }

    fn draw_char(&mut self, cell: Cell, glyph: char) -> Result<()> {
        let (height, width) = self.grid_dimensions();
        if !cell.is_inside(height.into(), width.into()) {
            warn!("refusing to draw outside the grid at {:?}", cell);
            return Ok(());
        }
        self.print_at((cell.col as TermInt + 1, cell.row as TermInt + 1), glyph)
    }

    fn show_status(&mut self, text: &str) -> Result<()> {
        let end_y = self.height.saturating_sub(1);
        for x in 1..self.width.saturating_sub(1) {
            self.print_at((x, end_y), '-')?;
        }

        let line = format!("[ {} ]", text);
        let max_len = self.width.saturating_sub(4) as usize;
        let line: String = line.chars().take(max_len).collect();
        self.print_str_at((2, end_y), &line)
    }

    fn clear(&mut self) -> Result<()> {
        execute!(self.stdout, terminal::Clear(ClearType::All)).context("Error clearing")?;
        self.draw_borders()
    }

    fn refresh(&mut self) -> Result<()> {
        self.stdout.flush().context("Error flushing")
    }

    fn poll_key(&mut self) -> Result<Option<Key>> {
        let mut key = None;

        while poll(Duration::from_millis(0)).context("Error polling input")? {
            if let Event::Key(ev) = read().context("Error reading input")? {
                key = Key::merge(key, Key::from(ev));
            }
        }

        Ok(key)
    }
}

impl Drop for TermManager {
    fn drop(&mut self) {
        // Nothing left to report to at this point
        let _ = self.restore();
    }
}

fn is_ctrl_c(ev: &KeyEvent) -> bool {
    ev.code == KeyCode::Char('c') && ev.modifiers.contains(KeyModifiers::CONTROL)
}
