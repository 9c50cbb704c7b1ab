//! Operator console - line commands in, controller replies out.

use atc_core::messages::OperatorLink;
use atc_core::{
    OperatorCommand, OperatorReply, OperatorResult, PlaneId, PlaneIdError, PlaneReport, Vector,
};
use std::ops::ControlFlow;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::display::AugmentedSet;

pub const HELP: &str = "\
commands:
  list                      list tracked planes
  show <id>                 show one plane
  vel <id> <vx> <vy> <vz>   set a plane's velocity
  pos <id> <x> <y> <z>      set a plane's position (not supported by the controller)
  lookahead <units>         set the conflict prediction horizon
  watch <id>                show velocity for <id> on the display
  unwatch <id>              stop showing velocity for <id>
  help                      this text
  quit                      leave the console";

/// One parsed console line.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleInput {
    Command(OperatorCommand),
    Watch(PlaneId),
    Unwatch(PlaneId),
    Help,
    Quit,
    Empty,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("unknown command '{0}' (try 'help')")]
    UnknownVerb(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("'{0}' is not a number")]
    BadNumber(String),

    #[error(transparent)]
    BadId(#[from] PlaneIdError),
}

fn number(token: &str) -> Result<f64, ParseError> {
    token
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| ParseError::BadNumber(token.to_string()))
}

fn id_and_vector(args: &[&str], usage: &'static str) -> Result<(PlaneId, Vector), ParseError> {
    let [id, x, y, z] = args else {
        return Err(ParseError::Usage(usage));
    };
    Ok((
        PlaneId::new(id)?,
        Vector::new(number(x)?, number(y)?, number(z)?),
    ))
}

fn single_id(args: &[&str], usage: &'static str) -> Result<PlaneId, ParseError> {
    let [id] = args else {
        return Err(ParseError::Usage(usage));
    };
    Ok(PlaneId::new(id)?)
}

/// Parses one console line. Verbs are case-insensitive.
pub fn parse_line(line: &str) -> Result<ConsoleInput, ParseError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some((verb, args)) = tokens.split_first() else {
        return Ok(ConsoleInput::Empty);
    };

    let input = match verb.to_lowercase().as_str() {
        "list" | "ls" => ConsoleInput::Command(OperatorCommand::ListPlanes),
        "show" | "display" => ConsoleInput::Command(OperatorCommand::DisplayPlane {
            id: single_id(args, "show <id>")?,
        }),
        "vel" | "velocity" => {
            let (id, velocity) = id_and_vector(args, "vel <id> <vx> <vy> <vz>")?;
            ConsoleInput::Command(OperatorCommand::UpdatePlaneVelocity { id, velocity })
        }
        "pos" | "position" => {
            let (id, position) = id_and_vector(args, "pos <id> <x> <y> <z>")?;
            ConsoleInput::Command(OperatorCommand::UpdatePlanePosition { id, position })
        }
        "lookahead" => {
            let [seconds] = args else {
                return Err(ParseError::Usage("lookahead <units>"));
            };
            ConsoleInput::Command(OperatorCommand::SetLookahead {
                seconds: number(seconds)?,
            })
        }
        "watch" => ConsoleInput::Watch(single_id(args, "watch <id>")?),
        "unwatch" => ConsoleInput::Unwatch(single_id(args, "unwatch <id>")?),
        "help" | "?" => ConsoleInput::Help,
        "quit" | "exit" => ConsoleInput::Quit,
        other => return Err(ParseError::UnknownVerb(other.to_string())),
    };
    Ok(input)
}

fn plane_line(plane: &PlaneReport) -> String {
    let (p, v) = (plane.position, plane.velocity);
    format!(
        "{} position ({:.1}, {:.1}, {:.1}) velocity ({:.2}, {:.2}, {:.2})",
        plane.id, p.x, p.y, p.z, v.x, v.y, v.z
    )
}

/// Renders a controller reply for the operator.
pub fn format_result(result: &OperatorResult) -> String {
    match result {
        Ok(OperatorReply::Planes(planes)) if planes.is_empty() => "no planes tracked".to_string(),
        Ok(OperatorReply::Planes(planes)) => {
            let mut lines = vec![format!("{} plane(s):", planes.len())];
            lines.extend(planes.iter().map(|plane| format!("  {}", plane_line(plane))));
            lines.join("\n")
        }
        Ok(OperatorReply::Plane(plane)) => plane_line(plane),
        Ok(OperatorReply::Ack) => "ok".to_string(),
        Err(e) => format!("error: {e}"),
    }
}

/// Console session bound to the controller's operator inbox.
pub struct Console {
    link: OperatorLink,
    augmented: AugmentedSet,
}

impl Console {
    pub fn new(link: OperatorLink) -> Self {
        Self {
            link,
            augmented: AugmentedSet::new(),
        }
    }

    /// Shares the display's augmented set so `watch` takes effect there.
    pub fn with_augmented(mut self, augmented: AugmentedSet) -> Self {
        self.augmented = augmented;
        self
    }

    /// Runs one parsed input. `Break` ends the session.
    pub async fn execute(&self, input: ConsoleInput) -> ControlFlow<(), String> {
        let text = match input {
            ConsoleInput::Empty => String::new(),
            ConsoleInput::Help => HELP.to_string(),
            ConsoleInput::Quit => return ControlFlow::Break(()),
            ConsoleInput::Watch(id) => {
                if self.augmented.add(id) {
                    format!("watching {id}")
                } else {
                    format!("already watching {id}")
                }
            }
            ConsoleInput::Unwatch(id) => {
                if self.augmented.remove(id) {
                    format!("stopped watching {id}")
                } else {
                    format!("{id} was not watched")
                }
            }
            ConsoleInput::Command(command) => {
                debug!("console submitting {}", command.kind());
                match self.link.request(command).await {
                    Ok(result) => format_result(&result),
                    Err(e) => format!("error: controller unavailable: {e}"),
                }
            }
        };
        ControlFlow::Continue(text)
    }

    /// Reads lines until `quit` or end of input; returns the lines handled.
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> std::io::Result<usize>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        let mut handled = 0;
        writer.write_all(b"type 'help' for commands\n").await?;
        writer.flush().await?;

        while let Some(line) = lines.next_line().await? {
            handled += 1;
            let reply = match parse_line(&line) {
                Ok(input) => match self.execute(input).await {
                    ControlFlow::Continue(text) => text,
                    ControlFlow::Break(()) => break,
                },
                Err(e) => format!("error: {e}"),
            };
            if !reply.is_empty() {
                writer.write_all(reply.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }

        info!("console closed after {} lines", handled);
        Ok(handled)
    }
}
