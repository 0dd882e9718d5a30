//! Interactive runner: one session driven over the JSON lines protocol.

use std::io::{self, BufRead, Write};

use tactics_core::session::{CombatSession, IntentOutcome};
use tracing::{debug, info, warn};

use crate::ascii::{render_session, AsciiConfig};
use crate::protocol::{Command, Response, SessionView, PROTOCOL_VERSION};
use crate::runner::RunnerError;
use crate::scenario::Scenario;
use crate::strategies::PlayerStrategy;

/// A session controlled command by command from outside.
#[derive(Debug)]
pub struct InteractiveRunner {
    scenario: String,
    strategy: PlayerStrategy,
    session: CombatSession,
    finished: bool,
}

impl InteractiveRunner {
    /// Build and start the scenario's session.
    pub fn new(scenario: &Scenario) -> Result<Self, RunnerError> {
        let session = CombatSession::start(scenario.to_setup()?)?;
        Ok(Self {
            scenario: scenario.name.clone(),
            strategy: scenario.strategy,
            session,
            finished: false,
        })
    }

    /// The session being driven.
    #[must_use]
    pub const fn session(&self) -> &CombatSession {
        &self.session
    }

    /// The greeting, carrying the events produced by starting combat.
    pub fn ready(&mut self) -> Response {
        Response::Ready {
            version: PROTOCOL_VERSION.to_string(),
            scenario: self.scenario.clone(),
            events: self.session.drain_events(),
        }
    }

    /// Apply one command. Returns the responses and whether to keep going.
    pub fn handle_command(&mut self, cmd: &Command) -> (Vec<Response>, bool) {
        let name = cmd.name();
        let mut responses = match cmd {
            Command::Query => vec![Response::State(SessionView::capture(&self.session))],
            Command::Render => {
                let config = AsciiConfig {
                    show_legend: false,
                    ..AsciiConfig::default()
                };
                let rows = render_session(&self.session, &config)
                    .lines()
                    .take(self.session.grid().terrain().height() as usize)
                    .map(String::from)
                    .collect();
                vec![Response::Board { rows }]
            }
            Command::Hash => vec![Response::StateHash {
                turns: self.session.turns_taken(),
                hash: self.session.state_hash(),
            }],
            Command::Abort => {
                self.session.abort();
                vec![Response::Accepted {
                    cmd: name.to_string(),
                    events: self.session.drain_events(),
                }]
            }
            Command::Quit => return (vec![Response::Bye], false),
            Command::Auto => match self.session.current_actor() {
                Some(actor) if self.session.awaiting_movement().is_none() => {
                    let intent = self.strategy.decide(&self.session, actor);
                    debug!(?intent, "Auto intent");
                    vec![self.apply(name, intent)]
                }
                _ => vec![Response::error("no player decision pending", Some(name))],
            },
            _ => match cmd.to_intent() {
                Some(intent) => vec![self.apply(name, intent)],
                None => vec![Response::error("unsupported command", Some(name))],
            },
        };

        if !self.finished {
            if let Some(outcome) = self.session.outcome() {
                self.finished = true;
                info!(?outcome, "Interactive combat over");
                responses.push(Response::CombatOver {
                    outcome,
                    turns: self.session.turns_taken(),
                });
            }
        }
        (responses, true)
    }

    fn apply(&mut self, name: &str, intent: tactics_core::session::Intent) -> Response {
        match self.session.handle(intent) {
            IntentOutcome::Accepted => Response::Accepted {
                cmd: name.to_string(),
                events: self.session.drain_events(),
            },
            IntentOutcome::Rejected(reason) => Response::Rejected {
                cmd: name.to_string(),
                reason,
            },
        }
    }

    /// Read commands from `input` until `quit` or end of input.
    pub fn run<R: BufRead, W: Write>(mut self, input: R, mut output: W) -> io::Result<()> {
        output.write_all(self.ready().to_json_line().as_bytes())?;
        output.flush()?;

        for line in input.split(b'\n') {
            let line = line?;
            let (responses, keep_going) = match std::str::from_utf8(&line).map(str::trim) {
                Ok("") => continue,
                Ok(text) => match Command::from_json(text) {
                    Ok(cmd) => self.handle_command(&cmd),
                    Err(e) => (vec![Response::error(format!("Parse error: {e}"), None)], true),
                },
                Err(_) => {
                    warn!(bytes = line.len(), "Dropping non UTF-8 input line");
                    (vec![Response::error("Parse error: invalid UTF-8", None)], true)
                }
            };
            for response in responses {
                output.write_all(response.to_json_line().as_bytes())?;
            }
            output.flush()?;
            if !keep_going {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tactics_core::events::CombatEvent;
    use tactics_core::session::Rejection;

    fn duel() -> InteractiveRunner {
        let mut runner = InteractiveRunner::new(&Scenario::duel()).unwrap();
        let _ = runner.ready();
        runner
    }

    #[test]
    fn test_ready_carries_start_events() {
        let mut runner = InteractiveRunner::new(&Scenario::duel()).unwrap();
        let Response::Ready { events, .. } = runner.ready() else {
            panic!("expected ready");
        };
        assert!(matches!(events.first(), Some(CombatEvent::CombatStarted { .. })));
    }

    #[test]
    fn test_commands_drive_the_duel() {
        let mut runner = duel();
        let (responses, _) = runner.handle_command(&Command::Attack { target: 2 });
        assert_eq!(
            responses,
            vec![Response::Rejected {
                cmd: "attack".to_string(),
                reason: Rejection::InvalidSelection
            }]
        );

        let (responses, _) = runner.handle_command(&Command::Move { x: 1, y: 0 });
        assert!(matches!(responses[0], Response::Accepted { .. }));
        runner.handle_command(&Command::Arrived { unit: 1 });

        let (responses, keep_going) = runner.handle_command(&Command::Attack { target: 2 });
        assert!(keep_going);
        assert!(matches!(responses.last(), Some(Response::CombatOver { .. })));
        assert!(runner.session().is_ended());
    }

    #[test]
    fn test_auto_uses_strategy() {
        let mut runner = duel();
        let (responses, _) = runner.handle_command(&Command::Auto);
        let Response::Accepted { events, .. } = &responses[0] else {
            panic!("expected accepted, got {responses:?}");
        };
        assert!(events.iter().any(|e| matches!(e, CombatEvent::UnitMoved { .. })));

        let (responses, _) = runner.handle_command(&Command::Auto);
        assert!(matches!(responses[0], Response::Error { .. }));
    }

    #[test]
    fn test_run_over_buffers() {
        let input = concat!(
            "{\"cmd\":\"query\"}\n",
            "not json\n",
            "\n",
            "{\"cmd\":\"render\"}\n",
            "{\"cmd\":\"quit\"}\n",
            "{\"cmd\":\"pass\"}\n",
        );
        let mut output = Vec::new();
        duel().run(input.as_bytes(), &mut output).unwrap();

        let lines: Vec<&str> = std::str::from_utf8(&output).unwrap().lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].contains(r#""type":"ready""#));
        assert!(lines[1].contains(r#""type":"state""#));
        assert!(lines[2].contains("Parse error"));
        assert!(lines[3].contains(r#""rows":["#));
        assert_eq!(lines[4], r#"{"type":"bye"}"#);
    }

    #[test]
    fn test_invalid_utf8_line_is_answered() {
        let mut input = vec![0xff, 0xfe, b'\n'];
        input.extend_from_slice(b"{\"cmd\":\"hash\"}\r\n");
        let mut output = Vec::new();
        duel().run(input.as_slice(), &mut output).unwrap();

        let lines: Vec<&str> = std::str::from_utf8(&output).unwrap().lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("invalid UTF-8"));
        assert!(lines[2].contains(r#""type":"state_hash""#));
    }
}
