//! Parsing of interactive commands.

use chess_core::{ParseError, PieceKind, Side, UciMove};
use std::str::FromStr;
use thiserror::Error;

pub const HELP: &str = "\
commands:
  <uci> | move <uci>     play a move, e.g. e2e4 or a7a8q
  promote <piece>        pick the promotion piece (q, r, b, n)
  toggle <side>          flip a side between human and bot
  bot <side>             let the engine play a side
  manual <side>          take over a side
  resign                 resign for the side to move
  restart                start a new game
  resume                 retry a stalled bot
  board                  show the board
  help                   show this text
  quit                   leave";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),
    #[error(transparent)]
    Notation(#[from] ParseError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Move(UciMove),
    Promote(PieceKind),
    Toggle(Side),
    Bot(Side),
    Manual(Side),
    Resign,
    Restart,
    Resume,
    Board,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err(CommandError::Empty);
        };
        let verb = verb.to_ascii_lowercase();
        let mut argument = |name: &'static str| words.next().ok_or(CommandError::MissingArgument(name));

        let command = match verb.as_str() {
            "move" | "m" => Command::Move(argument("move")?.parse()?),
            "promote" | "p" => Command::Promote(argument("promote")?.parse()?),
            "toggle" | "t" => Command::Toggle(argument("toggle")?.parse()?),
            "bot" => Command::Bot(argument("bot")?.parse()?),
            "manual" | "human" => Command::Manual(argument("manual")?.parse()?),
            "resign" => Command::Resign,
            "restart" | "new" => Command::Restart,
            "resume" | "retry" => Command::Resume,
            "board" | "b" => Command::Board,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            other => match other.parse() {
                Ok(attempt) => Command::Move(attempt),
                Err(_) => return Err(CommandError::Unknown(other.to_string())),
            },
        };
        Ok(command)
    }
}
