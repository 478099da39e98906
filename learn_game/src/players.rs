use crate::board::{would_win, Board, SIZE};
use crate::error::LearnError;
use rand::prelude::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, BufRead, Write};
use std::str::FromStr;

const MAX_ATTEMPTS: usize = 3;

/// Content of a single cell. Cross is the learning agent, Nought its
/// opponent (scripted during training, human during play).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
#[repr(i8)]
pub enum Marks {
    #[default]
    Empty = 0,
    Cross = 1,
    Nought = -1,
}

impl Marks {
    pub fn other(self) -> Self {
        match self {
            Self::Cross => Marks::Nought,
            Self::Nought => Marks::Cross,
            Self::Empty => Marks::Empty,
        }
    }
    pub fn value(self) -> i8 {
        self as i8
    }
    /// Character used in state keys.
    pub fn as_char(self) -> char {
        match self {
            Self::Cross => 'X',
            Self::Nought => 'O',
            Self::Empty => '-',
        }
    }
    pub fn display_char(self) -> char {
        match self {
            Self::Empty => ' ',
            mark => mark.as_char(),
        }
    }
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'X' => Some(Self::Cross),
            'O' => Some(Self::Nought),
            '-' => Some(Self::Empty),
            _ => None,
        }
    }
}

/// How much lookahead the scripted opponent uses.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// Uniformly random legal moves.
    Random,
    /// Takes a win, otherwise blocks one, otherwise random.
    Blocking,
    /// Like `Blocking`, but sets up a double threat before falling back.
    Forking,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Blocking => "blocking",
            Self::Forking => "forking",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random" => Ok(Self::Random),
            "blocking" => Ok(Self::Blocking),
            "forking" => Ok(Self::Forking),
            other => Err(format!(
                "unknown opponent {other:?} (expected random, blocking or forking)"
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScriptedOpponent {
    pub mark: Marks,
    pub difficulty: Difficulty,
}

impl ScriptedOpponent {
    pub fn new(mark: Marks, difficulty: Difficulty) -> Self {
        ScriptedOpponent { mark, difficulty }
    }

    /// Picks a move by the first tier that yields one: win now, block the
    /// other side's win, create a fork, random. Lower tiers are skipped
    /// according to `difficulty`. Candidates are scanned in `valid` order.
    pub fn choose_action(
        &self,
        board: &Board,
        valid: &[usize],
        rng: &mut impl Rng,
    ) -> Result<usize, LearnError> {
        if valid.is_empty() {
            return Err(LearnError::NoLegalActions);
        }
        if self.difficulty != Difficulty::Random {
            if let Some(action) = winning_move(board, valid, self.mark) {
                return Ok(action);
            }
            if let Some(action) = winning_move(board, valid, self.mark.other()) {
                return Ok(action);
            }
        }
        if self.difficulty == Difficulty::Forking {
            if let Some(action) = fork_move(board, valid, self.mark) {
                return Ok(action);
            }
        }
        valid
            .choose(rng)
            .copied()
            .ok_or(LearnError::NoLegalActions)
    }
}

/// First action in `valid` that completes a line for `mark`.
pub fn winning_move(board: &Board, valid: &[usize], mark: Marks) -> Option<usize> {
    valid.iter().copied().find(|&action| would_win(board, action, mark))
}

/// First action in `valid` after which `mark` has at least two distinct
/// winning follow-ups in a game that is still going.
pub fn fork_move(board: &Board, valid: &[usize], mark: Marks) -> Option<usize> {
    valid.iter().copied().find(|&action| {
        if !board.is_empty_cell(action) {
            return false;
        }
        let next = board.with_move(action, mark);
        if next.has_won(mark) || next.is_full() {
            return false;
        }
        let threats = next
            .available_moves()
            .into_iter()
            .filter(|&follow_up| would_win(&next, follow_up, mark))
            .count();
        threats >= 2
    })
}

/// A person typing row and column numbers.
#[derive(Debug)]
pub struct HumanPlayer {
    pub name: String,
    pub mark: Marks,
}

impl HumanPlayer {
    pub fn new(name: String, mark: Marks) -> Self {
        HumanPlayer { name, mark }
    }

    /// Prompts until the player names an empty square. Fails only when the
    /// input is closed or the output cannot be written.
    pub fn choose_action<R: BufRead, W: Write>(
        &self,
        board: &Board,
        input: &mut R,
        output: &mut W,
    ) -> Result<usize, LearnError> {
        loop {
            if let Some(action) = self.move_from_human(board, input, output)? {
                return Ok(action);
            }
            writeln!(output, "Please, try choosing your move again.")?;
        }
    }

    fn move_from_human<R: BufRead, W: Write>(
        &self,
        board: &Board,
        input: &mut R,
        output: &mut W,
    ) -> Result<Option<usize>, LearnError> {
        writeln!(output, "{}, please, choose your move", self.name)?;
        let Some(row) = read_coordinate(input, output, "row")? else {
            return Ok(None);
        };
        let Some(column) = read_coordinate(input, output, "column")? else {
            return Ok(None);
        };
        let action = row * SIZE + column;
        if board.is_empty_cell(action) {
            Ok(Some(action))
        } else {
            writeln!(output, "The square is taken, please, choose another one.")?;
            Ok(None)
        }
    }
}

fn read_coordinate<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    what: &str,
) -> Result<Option<usize>, LearnError> {
    writeln!(output, "please, enter the {what} number (1-3):")?;
    for _ in 0..MAX_ATTEMPTS {
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed").into());
        }
        match line.trim().parse::<usize>() {
            Ok(n @ 1..=3) => return Ok(Some(n - 1)),
            _ => writeln!(output, "Unknown symbol, please, try again (a number 1, 2 or 3):")?,
        }
    }
    writeln!(output, "You tried {MAX_ATTEMPTS} times")?;
    Ok(None)
}
