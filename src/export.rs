//! Export channels: read-only consumers of a summary result.
//!
//! Clipboard copy, four-line document export, and share with a clipboard
//! fallback. None of these hold state or touch the request lifecycle.

use std::fs;
use std::path::PathBuf;
use std::process::Stdio;

use arboard::Clipboard;
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{info, warn};

use crate::error::{Result, VidbriefError};
use crate::summary::{SummaryResult, MISSING_LINK};

pub struct ClipboardChannel;

impl ClipboardChannel {
    pub fn copy_text(text: &str) -> Result<()> {
        if text.is_empty() {
            return Err(VidbriefError::EmptyText);
        }

        let mut clipboard = Clipboard::new().map_err(|e| {
            warn!("Failed to open clipboard: {e}");
            VidbriefError::Unsupported {
                capability: "clipboard",
            }
        })?;
        clipboard.set_text(text.to_string()).map_err(|e| {
            warn!("Failed to set clipboard: {e}");
            VidbriefError::Unsupported {
                capability: "clipboard",
            }
        })?;

        info!("Copied {} chars to clipboard", text.len());
        Ok(())
    }

    /// Copy the summary body verbatim.
    pub fn copy_summary(result: &SummaryResult) -> Result<()> {
        Self::copy_text(&result.text)
    }
}

pub struct DocumentExporter {
    directory: PathBuf,
}

impl DocumentExporter {
    pub fn new(directory: PathBuf) -> Self {
        Self { directory }
    }

    /// Write the four-line document, named after the result's title.
    pub fn export(&self, result: &SummaryResult) -> Result<PathBuf> {
        fs::create_dir_all(&self.directory)?;
        let path = self
            .directory
            .join(format!("{}.txt", sanitize_filename(&result.title)));
        fs::write(&path, render_document(result))?;
        info!("Exported summary to {}", path.display());
        Ok(path)
    }
}

fn render_document(result: &SummaryResult) -> String {
    format!(
        "Video Title: {}\nSummary: {}\nSentiment: {}\nKey Mentions: {}\n",
        result.title,
        result.text,
        result.sentiment,
        result.key_mentions.join(", ")
    )
}

fn sanitize_filename(title: &str) -> String {
    let name: String = title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || " -_.".contains(c) {
                c
            } else {
                '_'
            }
        })
        .collect();
    let name = name.trim().to_string();
    if name.is_empty() {
        "summary".to_string()
    } else {
        name
    }
}

pub struct ShareRequest {
    pub title: String,
    pub text: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareOutcome {
    Shared,
    /// The user dismissed the share dialog. A neutral outcome, not a failure.
    Declined,
    /// No share capability; the block went to the clipboard instead.
    CopiedToClipboard,
}

/// Native share capability port.
#[async_trait]
pub trait ShareTarget: Send + Sync {
    fn available(&self) -> bool;
    async fn share(&self, request: &ShareRequest) -> Result<ShareOutcome>;
}

/// Shares by piping the share block to an external command.
pub struct CommandShareTarget {
    command: String,
}

impl CommandShareTarget {
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
        }
    }
}

#[async_trait]
impl ShareTarget for CommandShareTarget {
    fn available(&self) -> bool {
        !self.command.trim().is_empty()
    }

    async fn share(&self, request: &ShareRequest) -> Result<ShareOutcome> {
        let mut parts = self.command.split_whitespace();
        let program = parts.next().ok_or(VidbriefError::Unsupported {
            capability: "share",
        })?;

        let mut child = Command::new(program)
            .args(parts)
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|e| {
                warn!("Failed to launch share command '{}': {e}", self.command);
                VidbriefError::Unsupported {
                    capability: "share",
                }
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(share_block(&request.title, &request.text, &request.url).as_bytes())
                .await?;
        }

        let status = child.wait().await?;
        if status.success() {
            Ok(ShareOutcome::Shared)
        } else {
            Ok(ShareOutcome::Declined)
        }
    }
}

pub struct ShareChannel {
    target: Option<Box<dyn ShareTarget>>,
    fallback_url: String,
}

impl ShareChannel {
    pub fn new(target: Option<Box<dyn ShareTarget>>, fallback_url: &str) -> Self {
        Self {
            target,
            fallback_url: fallback_url.to_string(),
        }
    }

    pub async fn share(&self, result: &SummaryResult) -> Result<ShareOutcome> {
        match &self.target {
            Some(target) if target.available() => {
                let url = if result.link != MISSING_LINK {
                    result.link.clone()
                } else {
                    self.fallback_url.clone()
                };
                let request = ShareRequest {
                    title: result.title.clone(),
                    text: result.text.clone(),
                    url,
                };
                target.share(&request).await
            }
            _ => {
                ClipboardChannel::copy_text(&share_block(
                    &result.title,
                    &result.text,
                    &result.link,
                ))?;
                Ok(ShareOutcome::CopiedToClipboard)
            }
        }
    }
}

/// Title, text, and link separated by blank lines.
pub fn share_block(title: &str, text: &str, link: &str) -> String {
    format!("{title}\n\n{text}\n\n{link}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result() -> SummaryResult {
        SummaryResult {
            title: "Rust Talk".into(),
            text: "A talk about Rust.".into(),
            sentiment: "Positive".into(),
            key_mentions: vec!["Alice".into(), "Bob".into()],
            link: "https://youtu.be/x".into(),
        }
    }

    #[test]
    fn document_renders_the_fixed_four_lines() {
        let rendered = render_document(&result());
        assert_eq!(
            rendered,
            "Video Title: Rust Talk\n\
             Summary: A talk about Rust.\n\
             Sentiment: Positive\n\
             Key Mentions: Alice, Bob\n"
        );
    }

    #[test]
    fn exported_document_is_named_after_the_title() {
        let dir = tempfile::tempdir().expect("tempdir");
        let exporter = DocumentExporter::new(dir.path().to_path_buf());

        let path = exporter.export(&result()).expect("export");
        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("Rust Talk.txt"));
        let contents = fs::read_to_string(&path).expect("read back");
        assert!(contents.starts_with("Video Title: Rust Talk"));
    }

    #[test]
    fn filenames_are_sanitized() {
        assert_eq!(sanitize_filename("a/b: c?"), "a_b_ c_");
        assert_eq!(sanitize_filename("///"), "___");
        assert_eq!(sanitize_filename("  "), "summary");
    }

    #[test]
    fn share_block_separates_fields_with_blank_lines() {
        assert_eq!(
            share_block("Title", "Body", "https://example.com"),
            "Title\n\nBody\n\nhttps://example.com"
        );
    }

    struct FakeShareTarget {
        outcome: ShareOutcome,
    }

    #[async_trait]
    impl ShareTarget for FakeShareTarget {
        fn available(&self) -> bool {
            true
        }

        async fn share(&self, request: &ShareRequest) -> Result<ShareOutcome> {
            assert!(!request.url.is_empty());
            Ok(self.outcome)
        }
    }

    #[tokio::test]
    async fn native_share_outcome_passes_through() {
        let channel = ShareChannel::new(
            Some(Box::new(FakeShareTarget {
                outcome: ShareOutcome::Shared,
            })),
            "https://fallback.example",
        );
        assert_eq!(channel.share(&result()).await.expect("share"), ShareOutcome::Shared);
    }

    #[tokio::test]
    async fn declined_share_is_neutral_not_an_error() {
        let channel = ShareChannel::new(
            Some(Box::new(FakeShareTarget {
                outcome: ShareOutcome::Declined,
            })),
            "https://fallback.example",
        );
        assert_eq!(
            channel.share(&result()).await.expect("share"),
            ShareOutcome::Declined
        );
    }

    #[tokio::test]
    async fn sentinel_link_uses_the_fallback_url() {
        struct UrlAssertingTarget;

        #[async_trait]
        impl ShareTarget for UrlAssertingTarget {
            fn available(&self) -> bool {
                true
            }

            async fn share(&self, request: &ShareRequest) -> Result<ShareOutcome> {
                assert_eq!(request.url, "https://fallback.example");
                Ok(ShareOutcome::Shared)
            }
        }

        let channel = ShareChannel::new(Some(Box::new(UrlAssertingTarget)), "https://fallback.example");
        let mut shared = result();
        shared.link = MISSING_LINK.into();
        channel.share(&shared).await.expect("share");
    }
}
