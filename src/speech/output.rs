//! Speech output channel: toggleable playback of summary text.
//!
//! Synthesis is delegated to a platform synthesizer (espeak-ng by default)
//! rendering a WAV stream; playback goes through a rodio sink. One sink is
//! active at most: calling the toggle while speaking stops playback instead
//! of starting a second utterance. The playing flag is the only observable
//! state — started and ended, nothing in between.

use std::io::Cursor;
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hound::{SampleFormat, WavReader};
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamBuilder, Sink};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::SpeechOutputConfig;
use crate::error::{Result, VidbriefError};

/// Delivery parameters. Defaults are biased toward slower, slightly
/// higher-pitched speech than the engine's own defaults, at full volume.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// espeak pitch, 0-99 (engine default 50).
    pub pitch: u8,
    /// Words per minute (engine default 175).
    pub rate_wpm: u32,
    /// espeak amplitude, 0-200 (100 is full).
    pub amplitude: u8,
}

/// Platform synthesizer port.
pub trait Synthesizer: Send + Sync {
    fn available(&self) -> bool;
    fn voices(&self) -> Vec<String>;
    /// Render text to a complete WAV byte stream.
    fn render(&self, text: &str, voice: Option<&str>, delivery: &Delivery) -> Result<Vec<u8>>;
}

/// espeak-ng subprocess synthesizer.
pub struct EspeakSynthesizer {
    binary: String,
}

impl EspeakSynthesizer {
    pub fn new(binary: &str) -> Self {
        Self {
            binary: binary.to_string(),
        }
    }
}

impl Synthesizer for EspeakSynthesizer {
    fn available(&self) -> bool {
        Command::new(&self.binary)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn voices(&self) -> Vec<String> {
        let output = match Command::new(&self.binary).arg("--voices").output() {
            Ok(o) if o.status.success() => o,
            _ => return Vec::new(),
        };
        parse_voice_names(&String::from_utf8_lossy(&output.stdout))
    }

    fn render(&self, text: &str, voice: Option<&str>, delivery: &Delivery) -> Result<Vec<u8>> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--stdout")
            .arg("-p")
            .arg(delivery.pitch.to_string())
            .arg("-s")
            .arg(delivery.rate_wpm.to_string())
            .arg("-a")
            .arg(delivery.amplitude.to_string());
        if let Some(voice) = voice {
            cmd.arg("-v").arg(voice);
        }

        let output = cmd.arg(text).output()?;
        if !output.status.success() {
            return Err(VidbriefError::Playback {
                reason: format!("{} exited with {}", self.binary, output.status),
            });
        }
        Ok(output.stdout)
    }
}

/// Voice table lines look like:
/// ` 5  en-US   M  english-us   en-us`
/// The voice name is the fourth column; the first line is a header.
fn parse_voice_names(table: &str) -> Vec<String> {
    table
        .lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().nth(3))
        .map(str::to_string)
        .collect()
}

/// First engine voice matching a preference, case-insensitively.
/// None means the engine default stands.
pub fn select_voice(voices: &[String], preferences: &[String]) -> Option<String> {
    for preference in preferences {
        let preference = preference.to_lowercase();
        if let Some(voice) = voices
            .iter()
            .find(|v| v.to_lowercase().contains(&preference))
        {
            return Some(voice.clone());
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleAction {
    Started,
    Stopped,
}

pub struct SpeechOutputChannel {
    synth: Arc<dyn Synthesizer>,
    delivery: Delivery,
    preferred_voices: Vec<String>,
    enabled: bool,
    // Kept alive for the channel's lifetime; None when no audio device exists.
    output_stream: Option<OutputStream>,
    speaking: Arc<AtomicBool>,
    playing_tx: watch::Sender<bool>,
    active_sink: Arc<Mutex<Option<Sink>>>,
}

impl SpeechOutputChannel {
    pub fn new(synth: Arc<dyn Synthesizer>, config: &SpeechOutputConfig) -> Self {
        let output_stream = if config.enabled {
            match OutputStreamBuilder::open_default_stream() {
                Ok(stream) => Some(stream),
                Err(e) => {
                    warn!("No audio output available: {e}");
                    None
                }
            }
        } else {
            None
        };

        let (playing_tx, _) = watch::channel(false);

        Self {
            synth,
            delivery: Delivery {
                pitch: config.pitch,
                rate_wpm: config.rate_wpm,
                amplitude: config.amplitude,
            },
            preferred_voices: config.preferred_voices.clone(),
            enabled: config.enabled,
            output_stream,
            speaking: Arc::new(AtomicBool::new(false)),
            playing_tx,
            active_sink: Arc::new(Mutex::new(None)),
        }
    }

    /// Observable play state: exactly two transitions, started and ended
    /// (including ended-by-cancellation).
    pub fn playing(&self) -> watch::Receiver<bool> {
        self.playing_tx.subscribe()
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::Relaxed)
    }

    /// Toggle semantics: speaking → stop; idle → start.
    pub async fn toggle(&self, text: &str) -> Result<ToggleAction> {
        if !self.enabled || !self.synth.available() {
            return Err(VidbriefError::Unsupported {
                capability: "speech synthesis",
            });
        }
        if text.trim().is_empty() {
            return Err(VidbriefError::EmptyText);
        }

        if self.is_speaking() {
            self.stop();
            return Ok(ToggleAction::Stopped);
        }

        let stream = self
            .output_stream
            .as_ref()
            .ok_or(VidbriefError::Unsupported {
                capability: "audio output",
            })?;

        let voice = select_voice(&self.synth.voices(), &self.preferred_voices);
        debug!("Voice: {}", voice.as_deref().unwrap_or("engine default"));

        let wav = {
            let synth = Arc::clone(&self.synth);
            let delivery = self.delivery.clone();
            let text = text.to_string();
            tokio::task::spawn_blocking(move || synth.render(&text, voice.as_deref(), &delivery))
                .await
                .map_err(|e| VidbriefError::Playback {
                    reason: format!("synthesis task failed: {e}"),
                })??
        };

        let (samples, channels, sample_rate) = decode_wav(&wav)?;
        let sink = Sink::connect_new(stream.mixer());
        sink.append(SamplesBuffer::new(channels, sample_rate, samples));
        *self.active_sink.lock().expect("sink lock") = Some(sink);

        self.speaking.store(true, Ordering::Relaxed);
        let _ = self.playing_tx.send(true);
        info!("Speaking {} chars", text.len());

        // Watch for completion; also observes stop() taking the sink away.
        let speaking = Arc::clone(&self.speaking);
        let active_sink = Arc::clone(&self.active_sink);
        let playing_tx = self.playing_tx.clone();
        tokio::spawn(async move {
            loop {
                let done = {
                    let guard = active_sink.lock().expect("sink lock");
                    match guard.as_ref() {
                        Some(sink) => sink.empty(),
                        None => true,
                    }
                };
                if done {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            active_sink.lock().expect("sink lock").take();
            speaking.store(false, Ordering::Relaxed);
            let _ = playing_tx.send(false);
        });

        Ok(ToggleAction::Started)
    }

    /// Stop playback immediately. Safe to call while idle.
    pub fn stop(&self) {
        if let Some(sink) = self.active_sink.lock().expect("sink lock").take() {
            sink.stop();
        }
        self.speaking.store(false, Ordering::Relaxed);
        let _ = self.playing_tx.send(false);
        info!("Speech stopped");
    }
}

fn decode_wav(bytes: &[u8]) -> Result<(Vec<f32>, u16, u32)> {
    let mut reader = WavReader::new(Cursor::new(bytes)).map_err(|e| VidbriefError::Playback {
        reason: format!("WAV decode failed: {e}"),
    })?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Int => reader
            .samples::<i16>()
            .filter_map(|s| s.ok())
            .map(|s| s as f32 / 32768.0)
            .collect(),
        SampleFormat::Float => reader.samples::<f32>().filter_map(|s| s.ok()).collect(),
    };

    if samples.is_empty() {
        return Err(VidbriefError::Playback {
            reason: "synthesizer produced no audio".into(),
        });
    }

    Ok((samples, spec.channels, spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeSynthesizer {
        available: bool,
    }

    impl Synthesizer for FakeSynthesizer {
        fn available(&self) -> bool {
            self.available
        }

        fn voices(&self) -> Vec<String> {
            vec!["english-us".into()]
        }

        fn render(&self, _: &str, _: Option<&str>, _: &Delivery) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    fn channel(available: bool) -> SpeechOutputChannel {
        // enabled=false keeps the constructor from probing real audio devices.
        let config = SpeechOutputConfig {
            enabled: false,
            ..SpeechOutputConfig::default()
        };
        let mut channel =
            SpeechOutputChannel::new(Arc::new(FakeSynthesizer { available }), &config);
        channel.enabled = true;
        channel
    }

    #[tokio::test]
    async fn unavailable_engine_is_reported() {
        let channel = channel(false);
        let err = channel.toggle("hello").await.expect_err("should fail");
        assert!(matches!(err, VidbriefError::Unsupported { .. }));
    }

    #[tokio::test]
    async fn empty_text_is_reported() {
        let channel = channel(true);
        let err = channel.toggle("   ").await.expect_err("should fail");
        assert!(matches!(err, VidbriefError::EmptyText));
    }

    #[tokio::test]
    async fn toggle_while_speaking_stops_instead_of_overlapping() {
        let channel = channel(true);
        channel.speaking.store(true, Ordering::Relaxed);
        let _ = channel.playing_tx.send(true);

        let action = channel.toggle("hello again").await.expect("toggle");
        assert_eq!(action, ToggleAction::Stopped);
        assert!(!channel.is_speaking());
        assert!(!*channel.playing().borrow());
    }

    #[tokio::test]
    async fn stop_while_idle_is_harmless() {
        let channel = channel(true);
        channel.stop();
        assert!(!channel.is_speaking());
    }

    #[test]
    fn voice_preference_matches_case_insensitively() {
        let voices = vec![
            "english-us".to_string(),
            "English-Female-Warm".to_string(),
            "de-DE".to_string(),
        ];
        let prefs = vec!["female".to_string(), "en+f3".to_string()];
        assert_eq!(
            select_voice(&voices, &prefs).as_deref(),
            Some("English-Female-Warm")
        );
    }

    #[test]
    fn voice_preference_falls_back_to_engine_default() {
        let voices = vec!["english-us".to_string()];
        let prefs = vec!["female".to_string()];
        assert_eq!(select_voice(&voices, &prefs), None);
    }

    #[test]
    fn voice_table_parsing_skips_the_header() {
        let table = "Pty Language       Age/Gender VoiceName      File          Other Languages\n\
                     \x20 5  en-US          --/M      english-us     gmw/en-US\n\
                     \x20 5  en-GB          --/F      english-gb     gmw/en-GB\n";
        assert_eq!(parse_voice_names(table), vec!["english-us", "english-gb"]);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_wav(b"not a wav").is_err());
    }
}
