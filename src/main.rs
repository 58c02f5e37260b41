//! vidbrief: voice-enabled video summarization client.

mod app;
mod config;
mod error;
mod export;
mod history;
mod notifier;
mod orchestrator;
mod remote;
mod speech;
mod summary;

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "vidbrief", about = "Voice-enabled video summarization client")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Summarize a single query and exit
    #[arg(short, long)]
    query: Option<String>,

    /// Capture the query by voice, then summarize and exit
    #[arg(long)]
    listen: bool,

    /// List stored summaries and exit
    #[arg(long)]
    history: bool,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug,whisper_rs=info")
    } else {
        EnvFilter::new("info,whisper_rs=warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("vidbrief starting");

    let config = config::Config::load(args.config.as_deref());
    let history = Arc::new(history::HistoryStore::open(config.history.resolved_path()));

    if args.history {
        for entry in history.entries().await {
            println!("{}  {}", entry.saved_at, entry.summary.title);
        }
        return Ok(());
    }

    // Summarization is gated on an identity token being present; the token
    // itself is never interpreted here.
    config.auth.resolve_token()?;

    let backend = Arc::new(remote::HttpSummarizer::new(
        &config.service.endpoint,
        Duration::from_secs(config.service.timeout_secs),
    ));
    let orchestrator = Arc::new(orchestrator::RequestOrchestrator::new(
        backend,
        Arc::clone(&history),
    ));

    let synth = Arc::new(speech::output::EspeakSynthesizer::new(
        &config.speech_output.engine,
    ));
    let speech_out = Arc::new(speech::output::SpeechOutputChannel::new(
        synth,
        &config.speech_output,
    ));

    // Whisper model load takes a few seconds; keep it off the runtime threads.
    let speech_in = tokio::task::spawn_blocking({
        let input_config = config.speech_input.clone();
        move || speech::input::SpeechInputChannel::new(input_config)
    })
    .await?;
    let speech_in = Arc::new(speech_in);

    let notifier = notifier::Notifier::new(config.feedback.notifications);
    let exporter = export::DocumentExporter::new(config.export.resolved_directory());
    let share_target = config
        .export
        .share_command
        .as_deref()
        .map(|command| {
            Box::new(export::CommandShareTarget::new(command)) as Box<dyn export::ShareTarget>
        });
    let share = export::ShareChannel::new(share_target, &config.export.fallback_url);

    let app = app::App::new(
        orchestrator,
        history,
        speech_out,
        speech_in,
        exporter,
        share,
        notifier,
    );

    if args.listen {
        return app.one_shot_voice().await;
    }
    if let Some(query) = args.query {
        return app.one_shot(&query).await;
    }

    app.run().await
}
