use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use panel_core::{PanelEvent, PanelSession, PanelState};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

mod config;

const HELP: &str = "commands: add-worker | remove-worker | process [reset] | interval <n> | \
pause | verbose | tasks | save-db | save-file | import | status | quit";

#[derive(Parser, Debug)]
struct Args {
    /// Controller origin, e.g. http://127.0.0.1:8000
    #[arg(long)]
    server_url: Option<String>,
}

#[derive(Debug, PartialEq)]
enum Op {
    AddWorker,
    RemoveWorker,
    Process { reset: bool },
    Interval(f64),
    Pause,
    Verbose,
    Tasks,
    SaveDb,
    SaveFile,
    Import,
    Status,
    Quit,
}

fn parse_command(line: &str) -> Option<Op> {
    let mut parts = line.split_whitespace();
    let op = match parts.next()? {
        "add-worker" => Op::AddWorker,
        "remove-worker" => Op::RemoveWorker,
        "process" => Op::Process {
            reset: parts.next() == Some("reset"),
        },
        // A missing or garbage argument becomes NaN; the session rejects
        // it with the operator-visible message.
        "interval" => Op::Interval(
            parts
                .next()
                .and_then(|v| v.parse().ok())
                .unwrap_or(f64::NAN),
        ),
        "pause" => Op::Pause,
        "verbose" => Op::Verbose,
        "tasks" => Op::Tasks,
        "save-db" => Op::SaveDb,
        "save-file" => Op::SaveFile,
        "import" => Op::Import,
        "status" => Op::Status,
        "quit" | "exit" => Op::Quit,
        _ => return None,
    };
    Some(op)
}

async fn run_command(session: &Arc<PanelSession>, op: Op) -> bool {
    match op {
        Op::AddWorker => session.add_worker().await,
        Op::RemoveWorker => session.remove_worker().await,
        Op::Process { reset } => session.set_process(reset).await,
        Op::Interval(value) => session.set_scheduler_interval(value).await,
        Op::Pause => session.set_pause_timer().await,
        Op::Verbose => session.set_verbose_log().await,
        Op::Tasks => session.set_tasks().await,
        Op::SaveDb => session.set_save_json_db().await,
        Op::SaveFile => session.set_save_json_file().await,
        Op::Import => session.import_geos_from_csv().await,
        Op::Status => print_status(&session.state().await),
        Op::Quit => return true,
    }
    false
}

fn print_status(state: &PanelState) {
    fn flag(value: Option<bool>) -> &'static str {
        match value {
            Some(true) => "on",
            Some(false) => "off",
            None => "-",
        }
    }
    fn count(value: Option<u64>) -> String {
        value.map_or_else(|| "-".into(), |v| v.to_string())
    }

    println!("timer      {}", state.formatted_timer().unwrap_or_else(|| "-".into()));
    println!("workers    {}", count(state.num_workers));
    println!("process    {}", flag(state.in_process));
    println!("interval   {}", count(state.scheduler_interval));
    println!("pause      {}", flag(state.pause_timer));
    println!("verbose    {}", flag(state.verbose_log));
    println!("save-db    {}", flag(state.save_json_db));
    println!("save-file  {}", flag(state.save_json_file));
    for task in &state.tasks {
        println!("task {:12} {}", task.id, task.progress.as_deref().unwrap_or("-"));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();
    let settings = config::load_settings(args.server_url);

    let session = PanelSession::new();
    let mut events = session.subscribe_events();
    session.connect(&settings.server_url).await?;

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(PanelEvent::LogAppended(entry)) => println!("{entry}"),
                Ok(PanelEvent::StateChanged) => {}
                Ok(PanelEvent::ChannelClosed) => break,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_command(&line) {
                    Some(op) => {
                        if run_command(&session, op).await {
                            break;
                        }
                    }
                    None => {
                        if !line.trim().is_empty() {
                            println!("{HELP}");
                        }
                    }
                }
            }
        }
    }

    session.close().await;
    Ok(())
}
