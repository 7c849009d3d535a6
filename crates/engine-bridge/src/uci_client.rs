//! Async UCI client for external chess engines.
//!
//! Spawns the engine as a subprocess and talks to it over tokio pipes.
//!
//! # Example
//!
//! ```no_run
//! use engine_bridge::uci_client::UciClient;
//!
//! # async fn run() -> Result<(), engine_bridge::uci_client::UciError> {
//! let mut client = UciClient::spawn("/usr/bin/stockfish")?;
//! client.init().await?;
//! client.set_position(None, &["e2e4".to_string()]).await?;
//! let best_move = client.go("movetime 500").await?;
//! println!("Best move: {}", best_move);
//! client.quit().await?;
//! # Ok(())
//! # }
//! ```

use chess_session::EngineError;
use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::trace;

/// Errors that can occur when communicating with a UCI engine.
#[derive(Error, Debug)]
pub enum UciError {
    /// Failed to spawn the engine process or perform I/O operations.
    #[error("Failed to spawn process: {0}")]
    SpawnError(#[from] std::io::Error),
    /// The engine process did not expose its pipes.
    #[error("Process not ready")]
    NotReady,
    /// The engine closed its output.
    #[error("Engine exited")]
    Closed,
    /// The engine returned an invalid or unexpected response.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<UciError> for EngineError {
    fn from(err: UciError) -> Self {
        match err {
            UciError::InvalidResponse(detail) => EngineError::Protocol(detail),
            other => EngineError::Unavailable(other.to_string()),
        }
    }
}

/// A running UCI engine.
///
/// The process is killed when the client is dropped.
pub struct UciClient {
    process: Child,
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
    /// The engine's name as reported during [`init`](Self::init).
    pub name: String,
    searching: bool,
}

impl UciClient {
    /// Spawns the engine executable at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`UciError::SpawnError`] if the process cannot be spawned.
    pub fn spawn<P: AsRef<Path>>(path: P) -> Result<Self, UciError> {
        Self::spawn_command(path.as_ref(), std::iter::empty::<&OsStr>())
    }

    /// Spawns `program` with extra arguments.
    pub fn spawn_command<I, S>(program: impl AsRef<OsStr>, args: I) -> Result<Self, UciError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut process = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = process.stdin.take().ok_or(UciError::NotReady)?;
        let stdout = process.stdout.take().ok_or(UciError::NotReady)?;

        Ok(Self {
            process,
            stdin,
            lines: BufReader::new(stdout).lines(),
            name: String::new(),
            searching: false,
        })
    }

    /// Sends one command line.
    pub async fn send(&mut self, cmd: &str) -> Result<(), UciError> {
        trace!(cmd, "uci >");
        self.stdin.write_all(cmd.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;
        Ok(())
    }

    /// Reads one trimmed line. Cancel-safe.
    ///
    /// # Errors
    ///
    /// Returns [`UciError::Closed`] at end of output.
    pub async fn read_line(&mut self) -> Result<String, UciError> {
        let line = self.lines.next_line().await?.ok_or(UciError::Closed)?;
        let line = line.trim().to_string();
        trace!(line = %line, "uci <");
        Ok(line)
    }

    /// Runs the `uci` / `isready` handshake and records the engine name.
    pub async fn init(&mut self) -> Result<(), UciError> {
        self.send("uci").await?;
        loop {
            let line = self.read_line().await?;
            if let Some(name) = line.strip_prefix("id name ") {
                self.name = name.to_string();
            }
            if line == "uciok" {
                break;
            }
        }
        self.wait_ready().await
    }

    async fn wait_ready(&mut self) -> Result<(), UciError> {
        self.send("isready").await?;
        while self.read_line().await? != "readyok" {}
        Ok(())
    }

    /// Sets the position from `fen` (or the standard start) plus `moves`.
    pub async fn set_position(&mut self, fen: Option<&str>, moves: &[String]) -> Result<(), UciError> {
        let base = match fen {
            Some(fen) => format!("position fen {}", fen),
            None => "position startpos".to_string(),
        };
        if moves.is_empty() {
            self.send(&base).await
        } else {
            self.send(&format!("{} moves {}", base, moves.join(" "))).await
        }
    }

    /// Starts a search and waits for `bestmove`.
    ///
    /// Dropping the returned future leaves the search running; call
    /// [`stop`](Self::stop) to end it and resynchronize.
    pub async fn go(&mut self, time_control: &str) -> Result<String, UciError> {
        self.send(&format!("go {}", time_control)).await?;
        self.searching = true;
        self.read_bestmove().await
    }

    async fn read_bestmove(&mut self) -> Result<String, UciError> {
        loop {
            let line = self.read_line().await?;
            if let Some(rest) = line.strip_prefix("bestmove") {
                self.searching = false;
                return rest
                    .split_whitespace()
                    .next()
                    .map(str::to_string)
                    .ok_or_else(|| UciError::InvalidResponse(line.clone()));
            }
        }
    }

    /// Ends a running search and discards its `bestmove`. No-op when idle.
    pub async fn stop(&mut self) -> Result<(), UciError> {
        if self.searching {
            self.send("stop").await?;
            self.read_bestmove().await?;
        }
        Ok(())
    }

    /// Starts a new game on the engine side.
    pub async fn new_game(&mut self) -> Result<(), UciError> {
        self.stop().await?;
        self.send("ucinewgame").await?;
        self.wait_ready().await
    }

    /// Sends `quit` and waits for the process to exit.
    pub async fn quit(&mut self) -> Result<(), UciError> {
        self.send("quit").await?;
        self.process.wait().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uci_error_display() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        assert!(UciError::SpawnError(io_error)
            .to_string()
            .contains("Failed to spawn process"));
        assert_eq!(UciError::Closed.to_string(), "Engine exited");
        assert_eq!(
            UciError::InvalidResponse("bad data".to_string()).to_string(),
            "Invalid response: bad data"
        );
    }

    #[test]
    fn test_uci_error_into_engine_error() {
        let err: EngineError = UciError::InvalidResponse("bestmove".to_string()).into();
        assert_eq!(err, EngineError::Protocol("bestmove".to_string()));
        let err: EngineError = UciError::Closed.into();
        assert_eq!(err, EngineError::Unavailable("Engine exited".to_string()));
    }

    #[tokio::test]
    async fn test_spawn_nonexistent_executable_returns_error() {
        match UciClient::spawn("/nonexistent/path/to/engine") {
            Err(UciError::SpawnError(_)) => {}
            _ => panic!("Expected SpawnError"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_handshake_and_search_with_scripted_engine() {
        use std::io::Write;

        let mut script = tempfile::NamedTempFile::new().unwrap();
        write!(
            script,
            r#"while read line; do
  case "$line" in
    uci) echo "id name Scripted"; echo uciok ;;
    isready) echo readyok ;;
    go*) echo "info depth 1"; echo "bestmove e2e4 ponder e7e5" ;;
    quit) exit 0 ;;
  esac
done
"#
        )
        .unwrap();
        script.flush().unwrap();

        let mut client = UciClient::spawn_command("sh", [script.path()]).unwrap();
        client.init().await.unwrap();
        assert_eq!(client.name, "Scripted");
        client.set_position(None, &[]).await.unwrap();
        assert_eq!(client.go("movetime 10").await.unwrap(), "e2e4");
        client.stop().await.unwrap();
        client.quit().await.unwrap();
    }
}
