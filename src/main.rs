use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info};

use codesage::types::InterviewMode;
use codesage::{
    Config, InterviewSession, JsonFileExporter, NullTts, ProcessTts, SessionEvent, SessionHandle,
    SpeechController, SpeechOutput,
};

#[derive(Parser)]
#[command(name = "codesage", about = "Voice-and-code technical interview client")]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
    /// Websocket endpoint of the interview service.
    #[arg(long)]
    server_url: Option<String>,
    /// Language reported with code submissions.
    #[arg(long)]
    language: Option<String>,
}

#[derive(Subcommand)]
enum Mode {
    /// Interview over a fixed list of topics.
    Topics {
        #[arg(required = true)]
        topics: Vec<String>,
    },
    /// Interview driven by a previously uploaded resume.
    Resume { resume_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = Config::from_env().context("loading configuration")?;
    if let Some(url) = cli.server_url {
        config.set_server_url(url);
    }
    if let Some(language) = cli.language {
        config.set_language(language);
    }

    tracing_subscriber::fmt()
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_max_level(config.log_level)
        .init();

    let speech: Arc<dyn SpeechOutput> = match config.tts_command() {
        Some(command) => Arc::new(SpeechController::new(ProcessTts::new(command))),
        None => {
            info!("No CODESAGE_TTS_COMMAND configured; questions will not be narrated");
            Arc::new(SpeechController::new(NullTts))
        }
    };
    let exporter = Arc::new(JsonFileExporter::new(config.results_dir()));

    let (events_tx, events_rx) = mpsc::channel::<SessionEvent>(256);
    let mut machine = InterviewSession::new(&config, speech, exporter, events_tx.clone());
    machine.connect(&config).await?;

    let handle = SessionHandle::new(events_tx);
    let mode = match cli.mode {
        Mode::Topics { topics } => InterviewMode::Topics(topics),
        Mode::Resume { resume_id } => InterviewMode::Resume { resume_id },
    };
    handle.init(mode).await?;

    let mut session_task = tokio::spawn(machine.run(events_rx));

    println!("Commands: answer text | :code <path> | :submit | :hint | :end");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            finished = &mut session_task => {
                match finished {
                    Ok(Some(result)) => info!(
                        "Done: {}/{} questions answered, average score {:.1}",
                        result.completed_questions, result.total_questions, result.average_score
                    ),
                    Ok(None) => error!("Session ended without results"),
                    Err(e) => error!("Session task failed: {e}"),
                }
                break;
            }
            line = lines.next_line() => {
                match line.context("reading stdin")? {
                    None => {
                        let _ = handle.end().await;
                    }
                    Some(line) => {
                        if let Err(e) = dispatch(&handle, line.trim()).await {
                            error!("{e:#}");
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

async fn dispatch(handle: &SessionHandle, line: &str) -> anyhow::Result<()> {
    if line.is_empty() {
        return Ok(());
    }
    if let Some(path) = line.strip_prefix(":code ") {
        let path = path.trim();
        let code = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {path}"))?;
        handle.set_code(code, None).await?;
        info!("Code staged from {path}; :submit to send it");
    } else if line == ":submit" {
        handle.submit().await?;
    } else if line == ":hint" {
        handle.request_hint().await?;
    } else if line == ":end" {
        handle.end().await?;
    } else if line.starts_with(':') {
        error!("Unknown command: {line}");
    } else {
        // A plain line is a typed answer, submitted immediately.
        handle.set_answer(line).await?;
        handle.submit().await?;
    }
    Ok(())
}
