use crate::board::{Board, GameState};
use crate::config::{DRAW_PENALTY, ILLEGAL_MOVE_PENALTY, WIN_REWARD};
use crate::error::LearnError;
use crate::players::Marks;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    Ongoing,
    Win(Marks),
    Draw,
    /// `Marks` tried to play an occupied square.
    IllegalMove(Marks),
}

impl Outcome {
    pub fn is_terminal(self) -> bool {
        self != Outcome::Ongoing
    }
}

/// Result of a single ply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub state: GameState,
    pub reward: f64,
    pub done: bool,
}

/// Tic-tac-toe game owning the live board.
#[derive(Debug, Clone)]
pub struct TicTacToe {
    board: Board,
    outcome: Outcome,
}

impl TicTacToe {
    pub fn new() -> Self {
        TicTacToe {
            board: Board::new(),
            outcome: Outcome::Ongoing,
        }
    }

    /// Continues a game from an arbitrary position. A position that already
    /// contains a line or is full counts as finished.
    pub fn from_board(board: Board) -> Self {
        let outcome = [Marks::Cross, Marks::Nought]
            .into_iter()
            .find(|&mark| board.has_won(mark))
            .map(Outcome::Win)
            .unwrap_or(if board.is_full() {
                Outcome::Draw
            } else {
                Outcome::Ongoing
            });
        TicTacToe { board, outcome }
    }

    pub fn reset(&mut self) -> GameState {
        self.board = Board::new();
        self.outcome = Outcome::Ongoing;
        self.state()
    }

    pub fn state(&self) -> GameState {
        self.board.state()
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn is_done(&self) -> bool {
        self.outcome.is_terminal()
    }

    pub fn winner(&self) -> Option<Marks> {
        match self.outcome {
            Outcome::Win(mark) => Some(mark),
            _ => None,
        }
    }

    pub fn valid_actions(&self) -> Vec<usize> {
        self.board.available_moves()
    }

    /// Plays `action` for `mark`.
    ///
    /// An occupied (or out of range) square ends the episode with
    /// `ILLEGAL_MOVE_PENALTY` and leaves the board as it was. Stepping a
    /// finished episode is an error.
    pub fn step(&mut self, action: usize, mark: Marks) -> Result<Step, LearnError> {
        if self.is_done() {
            return Err(LearnError::EpisodeAlreadyTerminal);
        }
        if !self.board.is_empty_cell(action) {
            self.outcome = Outcome::IllegalMove(mark);
            return Ok(Step {
                state: self.state(),
                reward: ILLEGAL_MOVE_PENALTY,
                done: true,
            });
        }

        self.board.place(action, mark);
        let reward = if self.board.has_won(mark) {
            self.outcome = Outcome::Win(mark);
            WIN_REWARD
        } else if self.board.is_full() {
            self.outcome = Outcome::Draw;
            DRAW_PENALTY
        } else {
            0.0
        };
        Ok(Step {
            state: self.state(),
            reward,
            done: self.is_done(),
        })
    }
}

impl Default for TicTacToe {
    fn default() -> Self {
        Self::new()
    }
}
