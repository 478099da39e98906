use crate::players::Marks;
use itertools::Itertools;
use ndarray::prelude::*;
use std::fmt;
use std::str::FromStr;

pub const SIZE: usize = 3;
pub const NUM_CELLS: usize = SIZE * SIZE;

/// One of the eight three-in-a-row lines, in the order they are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    Row(usize),
    Column(usize),
    Diagonal,
    AntiDiagonal,
}

/// Row-major snapshot of the nine cells. This is the Q-table key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GameState([Marks; NUM_CELLS]);

/// The 3x3 grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Board {
    grid: Array2<Marks>,
}

impl GameState {
    pub fn new() -> Self {
        GameState([Marks::Empty; NUM_CELLS])
    }

    pub fn cells(&self) -> &[Marks; NUM_CELLS] {
        &self.0
    }

    /// Text form used as the key in persisted tables, e.g. `X-O------`.
    pub fn to_state_key(&self) -> String {
        self.to_string()
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

impl From<[Marks; NUM_CELLS]> for GameState {
    fn from(cells: [Marks; NUM_CELLS]) -> Self {
        GameState(cells)
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.iter().map(|mark| mark.as_char()).collect::<String>())
    }
}

impl FromStr for GameState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut cells = [Marks::Empty; NUM_CELLS];
        let mut count = 0;
        for (i, c) in s.chars().enumerate() {
            if i >= NUM_CELLS {
                return Err(format!("state key {s:?} is longer than {NUM_CELLS} cells"));
            }
            cells[i] = Marks::from_char(c)
                .ok_or_else(|| format!("unknown cell {c:?} in state key {s:?}"))?;
            count += 1;
        }
        if count != NUM_CELLS {
            return Err(format!("state key {s:?} has {count} cells, expected {NUM_CELLS}"));
        }
        Ok(GameState(cells))
    }
}

fn coords(action: usize) -> [usize; 2] {
    [action / SIZE, action % SIZE]
}

impl Board {
    pub fn new() -> Self {
        Board {
            grid: Array::from_elem((SIZE, SIZE), Marks::Empty),
        }
    }

    pub fn from_state(state: &GameState) -> Self {
        let mut board = Board::new();
        for (cell, mark) in board.grid.iter_mut().zip(state.cells()) {
            *cell = *mark;
        }
        board
    }

    pub fn state(&self) -> GameState {
        let mut cells = [Marks::Empty; NUM_CELLS];
        for (slot, mark) in cells.iter_mut().zip(self.grid.iter()) {
            *slot = *mark;
        }
        GameState(cells)
    }

    /// Panics if `action` is not in `0..9`.
    pub fn get(&self, action: usize) -> Marks {
        self.grid[coords(action)]
    }

    pub fn is_empty_cell(&self, action: usize) -> bool {
        action < NUM_CELLS && self.get(action) == Marks::Empty
    }

    /// Marks the cell unconditionally. Legality is the caller's business.
    pub fn place(&mut self, action: usize, mark: Marks) {
        self.grid[coords(action)] = mark;
    }

    /// A copy of the board with `action` marked for `mark`.
    pub fn with_move(&self, action: usize, mark: Marks) -> Board {
        let mut next = self.clone();
        next.place(action, mark);
        next
    }

    /// Empty cells in ascending index order.
    pub fn available_moves(&self) -> Vec<usize> {
        self.grid
            .iter()
            .enumerate()
            .filter(|(_, &mark)| mark == Marks::Empty)
            .map(|(action, _)| action)
            .collect()
    }

    pub fn is_full(&self) -> bool {
        self.grid.iter().all(|&mark| mark != Marks::Empty)
    }

    pub fn count(&self, mark: Marks) -> usize {
        self.grid.iter().filter(|&&cell| cell == mark).count()
    }

    /// Rows, then columns, then the two diagonals; stops at the first line
    /// completely filled with `mark`.
    pub fn winning_line(&self, mark: Marks) -> Option<Line> {
        if mark == Marks::Empty {
            return None;
        }
        let full = |lane: ArrayView1<Marks>| lane.iter().all(|&cell| cell == mark);
        if let Some(row) = self.grid.rows().into_iter().position(full) {
            return Some(Line::Row(row));
        }
        if let Some(column) = self.grid.columns().into_iter().position(full) {
            return Some(Line::Column(column));
        }
        if full(self.grid.diag()) {
            return Some(Line::Diagonal);
        }
        if (0..SIZE).all(|i| self.grid[[i, SIZE - 1 - i]] == mark) {
            return Some(Line::AntiDiagonal);
        }
        None
    }

    pub fn has_won(&self, mark: Marks) -> bool {
        self.winning_line(mark).is_some()
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for Board {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Board::from_state(&s.parse()?))
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let rows = self
            .grid
            .rows()
            .into_iter()
            .map(|row| row.iter().map(|mark| mark.display_char()).join("|"))
            .join("\n-----\n");
        writeln!(f, "{rows}")
    }
}

/// Whether marking the empty cell `action` for `mark` completes a line.
/// Works on the borrowed board only; nothing is mutated.
pub fn would_win(board: &Board, action: usize, mark: Marks) -> bool {
    board.is_empty_cell(action) && board.with_move(action, mark).has_won(mark)
}
