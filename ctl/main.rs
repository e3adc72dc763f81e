#![forbid(unsafe_code)]

//! `inbox-sync-ctl`: local CLI companion for the `inbox-sync` daemon.
//!
//! Connects to the IPC socket and sends one JSON command per invocation.

use std::io::{BufRead, BufReader, Write};

use clap::{Parser, Subcommand};
use interprocess::local_socket::{traits::Stream as _, GenericNamespaced, Stream, ToNsName};

#[derive(Debug, Parser)]
#[command(
    name = "inbox-sync-ctl",
    about = "Local CLI for the inbox-sync daemon",
    version,
    long_about = None
)]
struct Cli {
    /// IPC socket name (must match the daemon's `ipc_name` config).
    #[arg(long, default_value = "inbox-sync")]
    ipc_name: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Import the Todoist Inbox now.
    Sync,

    /// Forget which tasks were already imported.
    Reset,

    /// Show scheduler, ledger, and last-cycle status.
    Status,
}

impl Command {
    fn verb(&self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Reset => "reset",
            Self::Status => "status",
        }
    }
}

fn main() {
    let args = Cli::parse();
    let request_json = serde_json::json!({ "command": args.command.verb() });

    match send_ipc_command(&args.ipc_name, &request_json) {
        Ok(response) => {
            if let Some(obj) = response.as_object() {
                let ok = obj
                    .get("ok")
                    .and_then(serde_json::Value::as_bool)
                    .unwrap_or(false);
                if ok {
                    match obj.get("data") {
                        Some(data) => {
                            if let Some(summary) = data.get("summary").and_then(|v| v.as_str()) {
                                println!("{summary}");
                            } else {
                                println!("{}", serde_json::to_string_pretty(data).unwrap_or_default());
                            }
                        }
                        None => println!("OK"),
                    }
                } else {
                    let err_msg = obj
                        .get("error")
                        .and_then(|v| v.as_str())
                        .unwrap_or("unknown error");
                    eprintln!("Error: {err_msg}");
                    std::process::exit(1);
                }
            } else {
                println!("{response}");
            }
        }
        Err(err) => {
            eprintln!("Failed to connect to daemon: {err}");
            eprintln!("Is inbox-sync running with ipc_name '{}'?", args.ipc_name);
            std::process::exit(1);
        }
    }
}

/// Connect to the IPC socket, send a JSON command, and read the response.
fn send_ipc_command(
    ipc_name: &str,
    request: &serde_json::Value,
) -> std::result::Result<serde_json::Value, Box<dyn std::error::Error>> {
    let name = ipc_name.to_ns_name::<GenericNamespaced>()?;
    let mut stream = Stream::connect(name)?;

    let mut request_line = serde_json::to_string(request)?;
    request_line.push('\n');
    stream.write_all(request_line.as_bytes())?;
    stream.flush()?;

    let mut reader = BufReader::new(&stream);
    let mut response_line = String::new();
    reader.read_line(&mut response_line)?;

    Ok(serde_json::from_str(response_line.trim())?)
}
