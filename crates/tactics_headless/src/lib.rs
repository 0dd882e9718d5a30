//! Headless battle runner for scripted playtesting and CI verification.
//!
//! This crate drives [`tactics_core`] sessions without any presentation
//! layer. It can:
//!
//! - **Run scenarios**: Play a scenario to completion with a scripted party
//! - **Batch test**: Run every scenario against every strategy in parallel
//! - **Verify determinism**: Check that runs and replays produce identical hashes
//! - **Play interactively**: Accept JSON commands on stdin, one per line
//!
//! # Protocol
//!
//! Communication uses JSON lines (one JSON object per line):
//!
//! - **stdin**: Commands from controller (move, attack, arrived, etc.)
//! - **stdout**: Responses with the events each command produced
//! - **stderr**: Debug logs (human-readable)
//!
//! See [`protocol`] module for the full command/response specification.
//!
//! # Example
//!
//! ```bash
//! # Run a built-in scenario
//! cargo run -p tactics_headless -- run --scenario skirmish
//!
//! # Play interactively
//! echo '{"cmd":"auto"}' | cargo run -p tactics_headless -- play --scenario duel
//!
//! # Verify a replay
//! cargo run -p tactics_headless -- replay --file replay.bin --verify
//! ```

pub mod ascii;
pub mod batch;
pub mod interactive;
pub mod protocol;
pub mod runner;
pub mod scenario;
pub mod strategies;

pub use ascii::{render_session, render_setup, AsciiConfig};
pub use batch::{run_batch, verify_determinism, BatchResults, VerifyResult};
pub use interactive::InteractiveRunner;
pub use protocol::{Command, Response};
pub use runner::{BattleReport, BattleRunner, RunnerError};
pub use scenario::{Scenario, ScenarioError, UnitPlacement};
pub use strategies::PlayerStrategy;
