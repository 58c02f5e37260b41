//! Interactive session loop.
//!
//! Presentation glue: reads commands from stdin, renders orchestrator
//! state and progress, and forwards result actions to the channels.
//! Everything stateful lives in the components this drives.

use std::io::Write as _;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use crate::export::{ClipboardChannel, DocumentExporter, ShareChannel, ShareOutcome};
use crate::history::HistoryStore;
use crate::notifier::Notifier;
use crate::orchestrator::{RequestOrchestrator, RequestState, SubmitOutcome};
use crate::speech::input::SpeechInputChannel;
use crate::speech::output::SpeechOutputChannel;
use crate::summary::SummaryResult;

const HELP: &str = "\
Type a video title or free-text query to summarize it.
  /listen    speak the query instead of typing it
  /speak     read the current summary aloud (again to stop)
  /copy      copy the current summary to the clipboard
  /export    write the current summary to a document
  /share     share the current summary
  /history   list previously summarized videos
  /quit      exit";

pub struct App {
    orchestrator: Arc<RequestOrchestrator>,
    history: Arc<HistoryStore>,
    speech_out: Arc<SpeechOutputChannel>,
    speech_in: Arc<SpeechInputChannel>,
    exporter: DocumentExporter,
    share: ShareChannel,
    notifier: Notifier,
}

impl App {
    pub fn new(
        orchestrator: Arc<RequestOrchestrator>,
        history: Arc<HistoryStore>,
        speech_out: Arc<SpeechOutputChannel>,
        speech_in: Arc<SpeechInputChannel>,
        exporter: DocumentExporter,
        share: ShareChannel,
        notifier: Notifier,
    ) -> Self {
        Self {
            orchestrator,
            history,
            speech_out,
            speech_in,
            exporter,
            share,
            notifier,
        }
    }

    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        let mut state_rx = self.orchestrator.state();
        let mut progress_rx = self.orchestrator.progress();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        let mut current: Option<SummaryResult> = None;
        let mut bar: Option<ProgressBar> = None;

        println!("vidbrief — type a query, /help for commands");
        prompt();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    match line? {
                        Some(line) => {
                            if !self.handle_line(line.trim(), &mut current).await {
                                break;
                            }
                            if bar.is_none() {
                                prompt();
                            }
                        }
                        None => break,
                    }
                }
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = state_rx.borrow_and_update().clone();
                    self.render_state(&state, &mut bar, &mut current);
                }
                changed = progress_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let progress = *progress_rx.borrow_and_update();
                    if let Some(bar) = &bar {
                        bar.set_position(progress as u64);
                    }
                }
            }
        }

        self.speech_out.stop();
        Ok(())
    }

    /// One-shot mode: summarize a single query and print the result.
    pub async fn one_shot(&self, query: &str) -> Result<(), Box<dyn std::error::Error>> {
        let outcome = self.orchestrator.submit(query).await;
        if outcome == SubmitOutcome::SkippedEmpty {
            println!("Nothing to summarize.");
            return Ok(());
        }

        match &*self.orchestrator.state().borrow() {
            RequestState::Succeeded(result) => {
                print_result(result);
                Ok(())
            }
            RequestState::Failed(error) => {
                self.notifier.notice("Failed to summarize the video", error);
                Err(error.clone().into())
            }
            _ => Ok(()),
        }
    }

    /// One-shot mode with a spoken query.
    pub async fn one_shot_voice(&self) -> Result<(), Box<dyn std::error::Error>> {
        match self.speech_in.listen().await {
            Ok(query) => {
                println!("Heard: \"{query}\"");
                self.one_shot(&query).await
            }
            Err(e) => {
                self.notifier.notice("Could not capture a query", &e.to_string());
                Err(e.into())
            }
        }
    }

    /// Returns false when the session should end.
    async fn handle_line(&self, line: &str, current: &mut Option<SummaryResult>) -> bool {
        match line {
            "" => {}
            "/quit" | "/q" => return false,
            "/help" => println!("{HELP}"),
            "/history" => self.show_history().await,
            "/listen" => self.listen_and_submit().await,
            "/speak" => self.toggle_speech(current.as_ref()).await,
            "/copy" => self.copy(current.as_ref()),
            "/export" => self.export(current.as_ref()),
            "/share" => self.share_current(current.as_ref()).await,
            other if other.starts_with('/') => {
                println!("Unknown command {other}; /help lists commands");
            }
            query => {
                let orchestrator = Arc::clone(&self.orchestrator);
                let query = query.to_string();
                tokio::spawn(async move {
                    orchestrator.submit(&query).await;
                });
            }
        }
        true
    }

    fn render_state(
        &self,
        state: &RequestState,
        bar: &mut Option<ProgressBar>,
        current: &mut Option<SummaryResult>,
    ) {
        match state {
            RequestState::Idle => {}
            RequestState::InProgress => {
                *bar = Some(progress_bar());
            }
            RequestState::Succeeded(result) => {
                if let Some(bar) = bar.take() {
                    bar.finish_and_clear();
                }
                print_result(result);
                *current = Some(result.clone());
                prompt();
            }
            RequestState::Failed(error) => {
                if let Some(bar) = bar.take() {
                    bar.finish_and_clear();
                }
                println!("Failed to summarize: {error}");
                self.notifier.notice("Failed to summarize the video", error);
                prompt();
            }
        }
    }

    async fn show_history(&self) {
        let entries = self.history.entries().await;
        if entries.is_empty() {
            println!("No summaries yet.");
            return;
        }
        println!("Previously summarized videos:");
        for entry in entries {
            println!("  {}  {}", entry.saved_at, entry.summary.title);
        }
    }

    async fn listen_and_submit(&self) {
        match self.speech_in.listen().await {
            Ok(query) => {
                println!("Heard: \"{query}\"");
                let orchestrator = Arc::clone(&self.orchestrator);
                tokio::spawn(async move {
                    orchestrator.submit(&query).await;
                });
            }
            Err(e) => {
                warn!("Speech capture failed: {e}");
                self.notifier.notice("Could not capture a query", &e.to_string());
            }
        }
    }

    async fn toggle_speech(&self, current: Option<&SummaryResult>) {
        let Some(result) = current else {
            self.notifier.notice("No summary yet", "Summarize something first");
            return;
        };
        if let Err(e) = self.speech_out.toggle(&result.text).await {
            self.notifier.notice("Cannot read the summary aloud", &e.to_string());
        }
    }

    fn copy(&self, current: Option<&SummaryResult>) {
        let Some(result) = current else {
            self.notifier.notice("No summary yet", "Summarize something first");
            return;
        };
        match ClipboardChannel::copy_summary(result) {
            Ok(()) => println!("Summary copied to clipboard."),
            Err(e) => self.notifier.notice("Could not copy the summary", &e.to_string()),
        }
    }

    fn export(&self, current: Option<&SummaryResult>) {
        let Some(result) = current else {
            self.notifier.notice("No summary yet", "Summarize something first");
            return;
        };
        match self.exporter.export(result) {
            Ok(path) => println!("Saved {}", path.display()),
            Err(e) => self.notifier.notice("Could not export the summary", &e.to_string()),
        }
    }

    async fn share_current(&self, current: Option<&SummaryResult>) {
        let Some(result) = current else {
            self.notifier.notice("No summary yet", "Summarize something first");
            return;
        };
        match self.share.share(result).await {
            Ok(ShareOutcome::Shared) => println!("Summary shared."),
            Ok(ShareOutcome::Declined) => println!("Share dismissed."),
            Ok(ShareOutcome::CopiedToClipboard) => {
                println!("Summary copied to clipboard (sharing not supported).");
            }
            Err(e) => self.notifier.notice("Could not share the summary", &e.to_string()),
        }
    }
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>3}%")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar
}

fn print_result(result: &SummaryResult) {
    println!();
    println!("{}", result.title);
    println!("{}", result.text);
    println!("Sentiment: {}", result.sentiment);
    let mentions = if result.key_mentions.is_empty() {
        "None".to_string()
    } else {
        result.key_mentions.join(", ")
    };
    println!("Key Mentions: {mentions}");
    println!("Watch: {}", result.link);
}
