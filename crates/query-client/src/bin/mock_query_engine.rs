//! Scripted stand-in for a query-engine backend, used by integration tests.
//!
//! Reads JSON-RPC requests from stdin, one per line, and behaves according
//! to `--mode`:
//!
//! - `echo`: answers `{"method", "params", "rows"}`; rows come from the
//!   `MOCK_ROWS` environment variable (JSON array, default `[]`)
//! - `error`: answers every request with an error object
//! - `silent`: reads requests and never answers
//! - `garbage`: answers every request with a non-JSON line
//! - `exit`: exits with status 1 on the first request
//! - `crash-once`: exits on the first request if `--marker` does not exist
//!   yet (creating it), behaves like `echo` otherwise
//! - `slow-first`: delays the first answer by `--delay-ms`, then echoes
//! - `binary-stderr`: writes invalid UTF-8 to stderr before and after each
//!   answer, otherwise echoes
//!
//! Every run writes a few lines of chatter to stderr.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde_json::{json, Value};

/// Scripted JSON-RPC backend for tests
#[derive(Parser)]
#[command(name = "mock-query-engine")]
struct Options {
    #[arg(long, value_enum, default_value_t = Mode::Echo)]
    mode: Mode,

    /// Marker file for `crash-once`
    #[arg(long)]
    marker: Option<PathBuf>,

    /// First-answer delay for `slow-first`
    #[arg(long, default_value_t = 500)]
    delay_ms: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    Echo,
    Error,
    Silent,
    Garbage,
    Exit,
    CrashOnce,
    SlowFirst,
    BinaryStderr,
}

fn binary_chatter(tag: &str) {
    let mut stderr = io::stderr();
    let _ = stderr.write_all(b"\xff\xfe not utf-8 ");
    let _ = writeln!(stderr, "{}", tag);
    let _ = stderr.flush();
}

fn main() {
    let options = Options::parse();
    eprintln!("mock-query-engine: ready (mode={:?})", options.mode);

    let rows: Value = std::env::var("MOCK_ROWS")
        .ok()
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_else(|| json!([]));

    let mut crash_now = false;
    if options.mode == Mode::CrashOnce {
        if let Some(marker) = &options.marker {
            if !marker.exists() {
                let _ = std::fs::write(marker, b"crashed");
                crash_now = true;
            }
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handled = 0usize;

    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }
        handled += 1;

        let request: Value = match serde_json::from_str(&line) {
            Ok(value) => value,
            Err(e) => {
                eprintln!("mock-query-engine: bad request: {}", e);
                continue;
            }
        };
        let id = request.get("id").cloned().unwrap_or(Value::Null);
        let method = request.get("method").cloned().unwrap_or(Value::Null);
        let params = request.get("params").cloned().unwrap_or_else(|| json!({}));
        eprintln!("mock-query-engine: handling {}", method);

        let echo = || {
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": { "method": method, "params": params, "rows": rows },
            })
            .to_string()
        };

        let reply = match options.mode {
            Mode::Silent => continue,
            Mode::Exit => std::process::exit(1),
            Mode::CrashOnce if crash_now => std::process::exit(1),
            Mode::Error => json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32000, "message": "simulated failure" },
            })
            .to_string(),
            Mode::Garbage => "this is not json".to_string(),
            Mode::SlowFirst if handled == 1 => {
                thread::sleep(Duration::from_millis(options.delay_ms));
                echo()
            }
            Mode::BinaryStderr => {
                binary_chatter("before answer");
                // Give the reader time to see the bad line before the reply.
                thread::sleep(Duration::from_millis(200));
                echo()
            }
            _ => echo(),
        };

        if writeln!(stdout, "{}", reply).and_then(|_| stdout.flush()).is_err() {
            break;
        }
        if options.mode == Mode::BinaryStderr {
            thread::sleep(Duration::from_millis(200));
            binary_chatter("after answer");
        }
    }

    eprintln!("mock-query-engine: stdin closed, exiting");
}
