use crate::agent::QLearningAgent;
use crate::board::GameState;
use crate::config::{TrainingConfig, LOSS_PENALTY};
use crate::environment::{Outcome, TicTacToe};
use crate::error::LearnError;
use crate::players::{Difficulty, HumanPlayer, Marks, ScriptedOpponent};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::{BufRead, Write};

pub mod agent;
pub mod board;
pub mod config;
pub mod environment;
pub mod error;
pub mod players;
pub mod q_table;

/// The learning agent always plays crosses and moves first.
pub const AGENT_MARK: Marks = Marks::Cross;
pub const OPPONENT_MARK: Marks = Marks::Nought;

/// One learning step: the agent's move together with the opponent's reply.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub state: GameState,
    pub action: usize,
    pub reward: f64,
    pub next_state: GameState,
    pub done: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeReport {
    pub transitions: Vec<Transition>,
    pub outcome: Outcome,
    pub total_reward: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EpisodeStats {
    pub wins: usize,
    pub losses: usize,
    pub draws: usize,
    pub illegal: usize,
    pub total_reward: f64,
}

impl EpisodeStats {
    pub fn record(&mut self, report: &EpisodeReport) {
        match report.outcome {
            Outcome::Win(AGENT_MARK) => self.wins += 1,
            Outcome::Win(_) => self.losses += 1,
            Outcome::IllegalMove(_) => self.illegal += 1,
            Outcome::Draw | Outcome::Ongoing => self.draws += 1,
        }
        self.total_reward += report.total_reward;
    }

    pub fn episodes(&self) -> usize {
        self.wins + self.losses + self.draws + self.illegal
    }

    fn percent(&self, count: usize) -> f64 {
        match self.episodes() {
            0 => 0.0,
            n => count as f64 * 100.0 / n as f64,
        }
    }

    pub fn win_rate(&self) -> f64 {
        self.percent(self.wins)
    }

    pub fn loss_rate(&self) -> f64 {
        self.percent(self.losses)
    }

    pub fn draw_rate(&self) -> f64 {
        self.percent(self.draws)
    }

    pub fn average_reward(&self) -> f64 {
        match self.episodes() {
            0 => 0.0,
            n => self.total_reward / n as f64,
        }
    }
}

/// Training driver: the agent (crosses) against a scripted opponent.
pub struct Game {
    pub env: TicTacToe,
    pub opponent: ScriptedOpponent,

    episode: usize,
}

impl Game {
    pub fn new(opponent: ScriptedOpponent) -> Self {
        Game {
            env: TicTacToe::new(),
            opponent,
            episode: 0,
        }
    }

    /// Episodes played so far.
    pub fn episode(&self) -> usize {
        self.episode
    }

    /// Plays the agent's move and, unless that ended the game, the
    /// opponent's reply, then feeds the pair to the agent as one update.
    /// A reply that wins for the opponent is charged to the agent's move as
    /// `LOSS_PENALTY`.
    pub fn learn_turn(
        &mut self,
        agent: &mut QLearningAgent,
        state: GameState,
        rng: &mut impl Rng,
    ) -> Result<Transition, LearnError> {
        let valid = self.env.valid_actions();
        let action = agent.select_training_action(&state, &valid, rng)?;
        let step = self.env.step(action, AGENT_MARK)?;
        let mut transition = Transition {
            state,
            action,
            reward: step.reward,
            next_state: step.state,
            done: step.done,
        };

        if !step.done {
            let valid = self.env.valid_actions();
            let reply = self.opponent.choose_action(self.env.board(), &valid, rng)?;
            let answer = self.env.step(reply, self.opponent.mark)?;
            transition.next_state = answer.state;
            transition.done = answer.done;
            if self.env.winner() == Some(self.opponent.mark) {
                transition.reward = LOSS_PENALTY;
            }
        }

        agent.update(
            &transition.state,
            transition.action,
            transition.reward,
            &transition.next_state,
            transition.done,
        );
        Ok(transition)
    }

    /// One full game from an empty board. Epsilon decays once at the end.
    pub fn learn_episode(
        &mut self,
        agent: &mut QLearningAgent,
        rng: &mut impl Rng,
    ) -> Result<EpisodeReport, LearnError> {
        let mut state = self.env.reset();
        let mut transitions = Vec::with_capacity(5);
        loop {
            let transition = self.learn_turn(agent, state, rng)?;
            transitions.push(transition);
            if transition.done {
                break;
            }
            state = transition.next_state;
        }
        agent.decay_epsilon();
        self.episode += 1;

        let report = EpisodeReport {
            total_reward: transitions.iter().map(|t| t.reward).sum(),
            outcome: self.env.outcome(),
            transitions,
        };
        log::debug!(
            "episode {} ended {:?} after {} agent moves",
            self.episode,
            report.outcome,
            report.transitions.len()
        );
        Ok(report)
    }

    /// Runs every phase of `config` in order, switching the opponent's
    /// difficulty per phase. Returns the tally of each phase.
    pub fn learn_q_table(
        &mut self,
        agent: &mut QLearningAgent,
        config: &TrainingConfig,
        rng: &mut impl Rng,
    ) -> Result<Vec<EpisodeStats>, LearnError> {
        let mut summary = Vec::with_capacity(config.phases.len());
        for phase in &config.phases {
            log::info!(
                "{:<32}{:<32}",
                format!("phase {:?}", phase.name),
                format!("{} episodes vs {}", phase.episodes, phase.opponent)
            );
            self.opponent.difficulty = phase.opponent;
            let mut stats = EpisodeStats::default();
            let mut window = EpisodeStats::default();
            for ep in 0..phase.episodes {
                let report = self.learn_episode(agent, rng)?;
                stats.record(&report);
                window.record(&report);
                if (ep + 1) % config.log_interval == 0 {
                    log::info!(
                        "episode {}/{}: W={:.1}% L={:.1}% D={:.1}% avg reward {:.3} (epsilon {:.3})",
                        ep + 1,
                        phase.episodes,
                        window.win_rate(),
                        window.loss_rate(),
                        window.draw_rate(),
                        window.average_reward(),
                        agent.epsilon()
                    );
                    window = EpisodeStats::default();
                }
            }
            summary.push(stats);
        }
        log::info!(
            "training finished, q-table contains {} states",
            agent.q_table().len()
        );
        Ok(summary)
    }

    /// Plays `episodes` games with the greedy policy and no updates.
    pub fn evaluate(
        &mut self,
        agent: &mut QLearningAgent,
        episodes: usize,
        rng: &mut impl Rng,
    ) -> Result<EpisodeStats, LearnError> {
        let mut stats = EpisodeStats::default();
        for _ in 0..episodes {
            let mut state = self.env.reset();
            let mut total_reward = 0.0;
            while !self.env.is_done() {
                let valid = self.env.valid_actions();
                let action = agent.select_greedy_action(&state, &valid, rng)?;
                let step = self.env.step(action, AGENT_MARK)?;
                total_reward += step.reward;
                state = step.state;
                if step.done {
                    break;
                }
                let valid = self.env.valid_actions();
                let reply = self.opponent.choose_action(self.env.board(), &valid, rng)?;
                state = self.env.step(reply, self.opponent.mark)?.state;
            }
            if self.env.winner() == Some(self.opponent.mark) {
                total_reward += LOSS_PENALTY;
            }
            stats.record(&EpisodeReport {
                transitions: Vec::new(),
                outcome: self.env.outcome(),
                total_reward,
            });
        }
        Ok(stats)
    }
}

/// Trains a fresh agent on `config`'s schedule. All randomness comes from
/// `config.seed`, so equal configs give equal tables.
pub fn train_rl_agent(
    config: &TrainingConfig,
) -> Result<(QLearningAgent, Vec<EpisodeStats>), LearnError> {
    config.validate()?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut agent = QLearningAgent::new(config.hyperparameters);
    let first = config
        .phases
        .first()
        .map_or(Difficulty::Forking, |phase| phase.opponent);
    let mut game = Game::new(ScriptedOpponent::new(OPPONENT_MARK, first));
    let stats = game.learn_q_table(&mut agent, config, &mut rng)?;
    Ok((agent, stats))
}

/// The greedy agent (crosses, moving first) against `human`, who should
/// hold noughts. Moves are read from `input`, the board is written to
/// `output` after every move.
pub fn play_against_human<R: BufRead, W: Write>(
    agent: &mut QLearningAgent,
    human: &HumanPlayer,
    input: &mut R,
    output: &mut W,
    rng: &mut impl Rng,
) -> Result<Outcome, LearnError> {
    let mut env = TicTacToe::new();
    let mut state = env.reset();
    writeln!(
        output,
        "Let's play Tic-Tac-Toe! You are '{}'.",
        human.mark.as_char()
    )?;
    loop {
        let valid = env.valid_actions();
        let action = agent.select_greedy_action(&state, &valid, rng)?;
        state = env.step(action, AGENT_MARK)?.state;
        writeln!(output, "Agent ({}) plays:", AGENT_MARK.as_char())?;
        write!(output, "{}", env.board())?;
        if env.is_done() {
            break;
        }

        let action = human.choose_action(env.board(), input, output)?;
        state = env.step(action, human.mark)?.state;
        write!(output, "{}", env.board())?;
        if env.is_done() {
            break;
        }
    }

    match env.outcome() {
        Outcome::Win(mark) if mark == human.mark => {
            writeln!(output, "Congratulations, {}! You have won!", human.name)?
        }
        Outcome::Win(_) => writeln!(output, "Really sorry, {}, you have lost.", human.name)?,
        _ => writeln!(output, "The game ended in a draw.")?,
    }
    Ok(env.outcome())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Board;
    use crate::config::{Hyperparameters, Phase, DRAW_PENALTY, ILLEGAL_MOVE_PENALTY, WIN_REWARD};

    fn greedy_agent() -> QLearningAgent {
        QLearningAgent::new(Hyperparameters {
            exploration_rate: 0.0,
            min_exploration_rate: 0.0,
            ..Hyperparameters::default()
        })
    }

    fn game_from(position: &str, difficulty: Difficulty) -> (Game, GameState) {
        let board: Board = position.parse().unwrap();
        let state = board.state();
        let mut game = Game::new(ScriptedOpponent::new(OPPONENT_MARK, difficulty));
        game.env = TicTacToe::from_board(board);
        (game, state)
    }

    #[test]
    fn opponent_win_is_charged_to_the_agent_move() {
        // O O .
        // X . .
        // . . X   the agent prefers 7, which neither wins nor blocks 2.
        let (mut game, state) = game_from("OO-X----X", Difficulty::Blocking);
        let mut agent = greedy_agent();
        agent.update(&state, 7, 9.0, &state, true);
        assert!((agent.values(&state)[7] - 0.9).abs() < 1e-12);

        let mut rng = StdRng::seed_from_u64(0);
        let transition = game.learn_turn(&mut agent, state, &mut rng).unwrap();
        assert_eq!(transition.action, 7);
        assert_eq!(transition.reward, LOSS_PENALTY);
        assert!(transition.done);
        assert_eq!(transition.next_state.to_string(), "OOOX---XX");
        assert_eq!(game.env.winner(), Some(OPPONENT_MARK));
        // 0.9 + 0.1 * (-1.0 - 0.9)
        assert!((agent.values(&state)[7] - 0.71).abs() < 1e-12);
    }

    #[test]
    fn agent_win_keeps_the_immediate_reward() {
        let (mut game, state) = game_from("XX-OO----", Difficulty::Forking);
        let mut agent = greedy_agent();
        agent.update(&state, 2, 9.0, &state, true);
        let mut rng = StdRng::seed_from_u64(0);
        let transition = game.learn_turn(&mut agent, state, &mut rng).unwrap();
        assert_eq!(transition.action, 2);
        assert_eq!(transition.reward, WIN_REWARD);
        assert!(transition.done);
        assert_eq!(transition.next_state.to_string(), "XXXOO----");
    }

    #[test]
    fn opponent_draw_keeps_zero_reward() {
        let (mut game, state) = game_from("XOXXOOO--", Difficulty::Forking);
        let mut agent = greedy_agent();
        agent.update(&state, 7, 9.0, &state, true);
        let mut rng = StdRng::seed_from_u64(0);
        let transition = game.learn_turn(&mut agent, state, &mut rng).unwrap();
        assert_eq!(transition.action, 7);
        assert_eq!(transition.reward, 0.0);
        assert_ne!(transition.reward, DRAW_PENALTY);
        assert!(transition.done);
        assert_eq!(game.env.outcome(), Outcome::Draw);
    }

    #[test]
    fn ongoing_turn_bootstraps_from_the_reply() {
        let mut game = Game::new(ScriptedOpponent::new(OPPONENT_MARK, Difficulty::Random));
        let mut agent = greedy_agent();
        let mut rng = StdRng::seed_from_u64(4);
        let state = game.env.reset();
        let transition = game.learn_turn(&mut agent, state, &mut rng).unwrap();
        assert!(!transition.done);
        assert_eq!(transition.reward, 0.0);
        let next = Board::from_state(&transition.next_state);
        assert_eq!(next.count(AGENT_MARK), 1);
        assert_eq!(next.count(OPPONENT_MARK), 1);
        assert!(agent.q_table().contains_key(&transition.next_state));
    }

    #[test]
    fn one_update_per_agent_move() {
        let mut game = Game::new(ScriptedOpponent::new(OPPONENT_MARK, Difficulty::Forking));
        let mut agent = QLearningAgent::new(Hyperparameters::default());
        let mut rng = StdRng::seed_from_u64(21);
        for _ in 0..50 {
            let epsilon = agent.epsilon();
            let report = game.learn_episode(&mut agent, &mut rng).unwrap();
            let (last, earlier) = report.transitions.split_last().unwrap();
            assert!(last.done);
            assert!(earlier.iter().all(|t| !t.done && t.reward == 0.0));
            assert!(report.transitions.len() <= 5);
            assert!([WIN_REWARD, LOSS_PENALTY, 0.0, DRAW_PENALTY].contains(&last.reward));
            assert_ne!(last.reward, ILLEGAL_MOVE_PENALTY);
            assert!(report.outcome.is_terminal());
            assert!(agent.epsilon() < epsilon);
            for pair in report.transitions.windows(2) {
                assert_eq!(pair[0].next_state, pair[1].state);
            }
        }
        assert_eq!(game.episode(), 50);
    }

    #[test]
    fn stats_follow_the_outcome() {
        let mut stats = EpisodeStats::default();
        let report = |outcome, total_reward| EpisodeReport {
            transitions: Vec::new(),
            outcome,
            total_reward,
        };
        stats.record(&report(Outcome::Win(AGENT_MARK), 1.0));
        stats.record(&report(Outcome::Win(OPPONENT_MARK), -1.0));
        stats.record(&report(Outcome::Draw, 0.0));
        stats.record(&report(Outcome::Win(AGENT_MARK), 1.0));
        assert_eq!((stats.wins, stats.losses, stats.draws, stats.illegal), (2, 1, 1, 0));
        assert_eq!(stats.episodes(), 4);
        assert_eq!(stats.win_rate(), 50.0);
        assert_eq!(stats.loss_rate(), 25.0);
        assert_eq!(stats.average_reward(), 0.25);
        assert_eq!(EpisodeStats::default().win_rate(), 0.0);
    }

    #[test]
    fn phases_run_in_order() {
        let config = TrainingConfig {
            phases: vec![
                Phase::new("warmup", 30, Difficulty::Random),
                Phase::new("hard", 20, Difficulty::Forking),
            ],
            log_interval: 10,
            ..TrainingConfig::default()
        };
        let (agent, stats) = train_rl_agent(&config).unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].episodes(), 30);
        assert_eq!(stats[1].episodes(), 20);
        assert!(agent.q_table().len() > 1);
        assert!(agent.epsilon() < config.hyperparameters.exploration_rate);
    }

    #[test]
    fn training_is_reproducible() {
        let config = TrainingConfig {
            phases: TrainingConfig::schedule(200),
            seed: 99,
            ..TrainingConfig::default()
        };
        let (a, _) = train_rl_agent(&config).unwrap();
        let (b, _) = train_rl_agent(&config).unwrap();
        assert_eq!(a.q_table(), b.q_table());
        assert_eq!(a.epsilon(), b.epsilon());
    }
}
