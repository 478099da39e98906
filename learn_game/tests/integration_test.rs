use learn_game::agent::QLearningAgent;
use learn_game::config::TrainingConfig;
use learn_game::environment::Outcome;
use learn_game::error::LearnError;
use learn_game::players::{Difficulty, HumanPlayer, Marks, ScriptedOpponent};
use learn_game::{play_against_human, train_rl_agent, Game, OPPONENT_MARK};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::Cursor;
use std::path::Path;

// Every square once, row by row. Taken squares are re-prompted, so the
// human always ends up on the first free square further down the list.
const HUMAN_MOVES: &str = "1\n1\n1\n2\n1\n3\n2\n1\n2\n2\n2\n3\n3\n1\n3\n2\n3\n3\n";

fn short_training() -> TrainingConfig {
    TrainingConfig {
        phases: TrainingConfig::schedule(600),
        seed: 2024,
        log_interval: 200,
        ..TrainingConfig::default()
    }
}

fn play_scripted(agent: &mut QLearningAgent, seed: u64) -> (Outcome, Vec<u8>) {
    let human = HumanPlayer::new("Oscar".to_owned(), Marks::Nought);
    let mut input = Cursor::new(HUMAN_MOVES);
    let mut output = Vec::new();
    let mut rng = StdRng::seed_from_u64(seed);
    let outcome = play_against_human(agent, &human, &mut input, &mut output, &mut rng).unwrap();
    (outcome, output)
}

fn assert_same_play_after_reload(path: &Path) {
    let config = short_training();
    let (agent, _) = train_rl_agent(&config).unwrap();
    agent.save(path).unwrap();
    let mut restored = QLearningAgent::load(path, config.hyperparameters).unwrap();
    assert_eq!(restored.q_table(), agent.q_table());

    let mut original = agent.clone();
    for seed in [0, 1, 7] {
        let (outcome_a, transcript_a) = play_scripted(&mut original, seed);
        let (outcome_b, transcript_b) = play_scripted(&mut restored, seed);
        assert!(outcome_a.is_terminal());
        assert_eq!(outcome_a, outcome_b);
        assert_eq!(transcript_a, transcript_b);
    }
}

#[test]
fn reloaded_pickle_plays_identically() {
    let dir = tempfile::tempdir().unwrap();
    assert_same_play_after_reload(&dir.path().join("q_table.pickle"));
}

#[test]
fn reloaded_json_plays_identically() {
    let dir = tempfile::tempdir().unwrap();
    assert_same_play_after_reload(&dir.path().join("q_table.json"));
}

#[test]
fn missing_table_asks_for_training() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("never_trained.pickle");
    let err = QLearningAgent::load(&path, TrainingConfig::default().hyperparameters).unwrap_err();
    assert!(matches!(err, LearnError::PersistenceNotFound(_)));
    assert!(err.to_string().contains("train"));
}

#[test]
fn transcript_shows_every_move() {
    let (mut agent, _) = train_rl_agent(&short_training()).unwrap();
    let (outcome, transcript) = play_scripted(&mut agent, 3);
    let text = String::from_utf8(transcript).unwrap();
    assert!(text.starts_with("Let's play Tic-Tac-Toe! You are 'O'."));
    assert!(text.contains("Agent (X) plays:"));
    match outcome {
        Outcome::Win(Marks::Nought) => assert!(text.contains("Congratulations, Oscar!")),
        Outcome::Win(_) => assert!(text.contains("Really sorry, Oscar")),
        _ => assert!(text.contains("The game ended in a draw.")),
    }
}

#[test]
fn trained_agent_beats_a_random_opponent() {
    let config = TrainingConfig {
        phases: TrainingConfig::schedule(5_000),
        seed: 5,
        ..TrainingConfig::default()
    };
    let (mut agent, _) = train_rl_agent(&config).unwrap();
    let mut game = Game::new(ScriptedOpponent::new(OPPONENT_MARK, Difficulty::Random));
    let mut rng = StdRng::seed_from_u64(17);
    let stats = game.evaluate(&mut agent, 500, &mut rng).unwrap();
    assert_eq!(stats.episodes(), 500);
    assert_eq!(stats.illegal, 0);
    assert!(stats.wins > stats.losses, "{stats:?}");
}
