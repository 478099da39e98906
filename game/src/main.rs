use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use learn_game::agent::QLearningAgent;
use learn_game::config::{Hyperparameters, TrainingConfig, NUM_EPISODES};
use learn_game::error::LearnError;
use learn_game::players::{Difficulty, HumanPlayer, Marks, ScriptedOpponent};
use learn_game::q_table::{self, QTable};
use learn_game::{play_against_human, train_rl_agent, Game, OPPONENT_MARK};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

const ARCHIVE_DIR: &str = "q_table_archive";
const EVALUATION_GAMES: usize = 1_000;

/// Train a tic-tac-toe Q-learning agent and play against it.
#[derive(Parser)]
#[command(name = "game", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train an agent against the scripted opponent and save its q-table
    Train {
        /// Total number of training episodes
        #[arg(long)]
        episodes: Option<usize>,

        /// random, blocking, forking, or schedule (all three in turn)
        #[arg(long, default_value = "schedule")]
        opponent: String,

        /// Seed for exploration, tie-breaking and the opponent
        #[arg(long)]
        seed: Option<u64>,

        /// Where to write the table (default: q_table_archive/qtable-<date>.pickle)
        #[arg(long)]
        output: Option<PathBuf>,

        /// JSON training configuration; flags override its values
        #[arg(long)]
        config: Option<PathBuf>,

        /// Also write a .json copy of the table next to the output
        #[arg(long)]
        json: bool,
    },
    /// Play against a trained agent in the terminal
    Play {
        /// Q-table written by `train`
        #[arg(long)]
        q_table: PathBuf,

        /// Seed for breaking ties between equally valued moves
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
    /// Print the size of a q-table and a few learned entries
    Inspect {
        #[arg(long)]
        q_table: PathBuf,

        #[arg(long, default_value_t = 5)]
        samples: usize,
    },
}

fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    match cli.command {
        Command::Train {
            episodes,
            opponent,
            seed,
            output,
            config,
            json,
        } => {
            let config = training_config(config.as_deref(), episodes, &opponent, seed)?;
            let output = output.unwrap_or_else(|| {
                q_table::archive_path(Path::new(ARCHIVE_DIR), Local::now().date_naive())
            });
            train(&config, &output, json)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Play { q_table, seed } => play(&q_table, seed),
        Command::Inspect { q_table, samples } => inspect(&q_table, samples),
    }
}

fn training_config(
    path: Option<&Path>,
    episodes: Option<usize>,
    opponent: &str,
    seed: Option<u64>,
) -> Result<TrainingConfig> {
    let mut config = match path {
        Some(path) => TrainingConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => TrainingConfig::default(),
    };
    if let Some(seed) = seed {
        config.seed = seed;
    }
    let total = episodes.unwrap_or(if path.is_some() {
        config.total_episodes()
    } else {
        NUM_EPISODES
    });
    if episodes.is_some() || path.is_none() || opponent != "schedule" {
        config.phases = match opponent {
            "schedule" => TrainingConfig::schedule(total),
            name => {
                let difficulty: Difficulty = name.parse().map_err(anyhow::Error::msg)?;
                TrainingConfig::single_phase(total, difficulty)
            }
        };
    }
    config.validate()?;
    Ok(config)
}

fn train(config: &TrainingConfig, output: &Path, json: bool) -> Result<()> {
    log::info!(
        "training for {} episodes (seed {})",
        config.total_episodes(),
        config.seed
    );
    let (mut agent, _) = train_rl_agent(config)?;
    agent
        .save(output)
        .with_context(|| format!("saving q-table to {}", output.display()))?;
    if json {
        let sidecar = output.with_extension("json");
        agent
            .save(&sidecar)
            .with_context(|| format!("saving q-table to {}", sidecar.display()))?;
    }

    println!(
        "Training completed! Q-table with {} states saved to {}",
        agent.q_table().len(),
        output.display()
    );

    let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(1));
    for difficulty in [Difficulty::Random, Difficulty::Blocking, Difficulty::Forking] {
        let mut game = Game::new(ScriptedOpponent::new(OPPONENT_MARK, difficulty));
        let stats = game.evaluate(&mut agent, EVALUATION_GAMES, &mut rng)?;
        log::info!(
            "greedy vs {:<8}: W={:.1}% L={:.1}% D={:.1}%",
            difficulty,
            stats.win_rate(),
            stats.loss_rate(),
            stats.draw_rate()
        );
    }
    Ok(())
}

fn play(path: &Path, seed: u64) -> Result<ExitCode> {
    let mut agent = match QLearningAgent::load(path, Hyperparameters::default()) {
        Ok(agent) => agent,
        Err(LearnError::PersistenceNotFound(_)) => {
            eprintln!("Error: could not find q-table file '{}'.", path.display());
            eprintln!("Please run `game train` to train the agent and create the file.");
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e).with_context(|| format!("loading q-table {}", path.display())),
    };
    let human = HumanPlayer::new("Human".to_owned(), Marks::Nought);
    let mut rng = StdRng::seed_from_u64(seed);
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();
    play_against_human(&mut agent, &human, &mut input, &mut output, &mut rng)?;
    Ok(ExitCode::SUCCESS)
}

fn inspect(path: &Path, samples: usize) -> Result<ExitCode> {
    let q: QTable = match q_table::q_table_from_disk(path) {
        Ok(q) => q,
        Err(LearnError::PersistenceNotFound(_)) => {
            eprintln!("Error: the file '{}' was not found.", path.display());
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e).with_context(|| format!("loading q-table {}", path.display())),
    };
    println!("--- Q-Table Inspection ---");
    println!("File: '{}'", path.display());
    println!("Total number of states learned: {}", q.len());
    if q.is_empty() {
        println!("The Q-table is EMPTY. The agent has not learned anything.");
        return Ok(ExitCode::SUCCESS);
    }

    let found = q.non_zero_samples(samples);
    if found.is_empty() {
        println!("The Q-table contains states, but ALL Q-values are still ZERO.");
        return Ok(ExitCode::SUCCESS);
    }
    println!("\n--- Sample States ---");
    for (state, values) in found {
        let formatted: Vec<String> = values.iter().map(|v| format!("{v:.3}")).collect();
        println!("State: {state}");
        println!("  Q-Values: [{}]\n", formatted.join(", "));
    }
    Ok(ExitCode::SUCCESS)
}
