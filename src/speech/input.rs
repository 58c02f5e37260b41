//! Speech input channel: single-shot spoken query capture.
//!
//! Records one utterance from the default input device (16 kHz mono f32,
//! RMS silence auto-stop, hard duration cap) and decodes it with Whisper.
//! One final transcript, single alternative, no interim results. The
//! listening flag is cleared on every exit path.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::config::SpeechInputConfig;
use crate::error::{Result, VidbriefError};

pub struct SpeechInputChannel {
    config: SpeechInputConfig,
    ctx: Option<Arc<WhisperContext>>,
    listening_tx: watch::Sender<bool>,
}

impl SpeechInputChannel {
    /// Loading the Whisper model takes seconds; call off the runtime
    /// threads (spawn_blocking) at startup.
    pub fn new(config: SpeechInputConfig) -> Self {
        let ctx = if config.enabled {
            match load_model(&config.model) {
                Ok(ctx) => Some(Arc::new(ctx)),
                Err(e) => {
                    warn!("Speech recognition unavailable: {e}");
                    None
                }
            }
        } else {
            None
        };

        let (listening_tx, _) = watch::channel(false);

        Self {
            config,
            ctx,
            listening_tx,
        }
    }

    pub fn available(&self) -> bool {
        self.ctx.is_some() && cpal::default_host().default_input_device().is_some()
    }

    /// Listening indicator for the UI. Never left stuck on: the guard in
    /// `listen` clears it on success, error, and cancellation alike.
    pub fn listening(&self) -> watch::Receiver<bool> {
        self.listening_tx.subscribe()
    }

    /// Capture one spoken query and return its transcript.
    pub async fn listen(&self) -> Result<String> {
        let Some(ctx) = self.ctx.clone() else {
            return Err(VidbriefError::Unsupported {
                capability: "speech recognition",
            });
        };

        let _indicator = ListeningIndicator::on(&self.listening_tx);
        info!("Listening...");

        let samples = {
            let config = self.config.clone();
            tokio::task::spawn_blocking(move || capture_utterance(&config))
                .await
                .map_err(|e| VidbriefError::Recognition {
                    reason: format!("capture task failed: {e}"),
                })??
        };

        let min_samples = (self.config.min_speech_duration * self.config.sample_rate as f64) as usize;
        if samples.len() < min_samples || is_silent(&samples, self.config.silence_threshold) {
            return Err(VidbriefError::Recognition {
                reason: "no speech detected".into(),
            });
        }

        let transcript = tokio::task::spawn_blocking(move || transcribe(&ctx, &samples))
            .await
            .map_err(|e| VidbriefError::Recognition {
                reason: format!("transcription task failed: {e}"),
            })??;

        if transcript.is_empty() {
            return Err(VidbriefError::Recognition {
                reason: "nothing recognized".into(),
            });
        }

        info!("Heard: \"{transcript}\"");
        Ok(transcript)
    }
}

/// Scope guard for the listening flag.
struct ListeningIndicator {
    tx: watch::Sender<bool>,
}

impl ListeningIndicator {
    fn on(tx: &watch::Sender<bool>) -> Self {
        let _ = tx.send(true);
        Self { tx: tx.clone() }
    }
}

impl Drop for ListeningIndicator {
    fn drop(&mut self) {
        let _ = self.tx.send(false);
    }
}

struct CaptureState {
    buffer: Vec<f32>,
    silence_start: Option<Instant>,
    done: bool,
}

/// Record from the default input device until silence or the duration cap.
/// Blocking; the cpal stream lives entirely inside this call.
fn capture_utterance(config: &SpeechInputConfig) -> Result<Vec<f32>> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or(VidbriefError::Unsupported {
            capability: "audio input",
        })?;

    debug!(
        "Using audio device: {}",
        device.name().unwrap_or("unknown".into())
    );

    let stream_config = StreamConfig {
        channels: 1,
        sample_rate: SampleRate(config.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let max_samples = (config.max_duration * config.sample_rate as f64) as usize;
    let started = Instant::now();
    let state = Arc::new(Mutex::new(CaptureState {
        buffer: Vec::with_capacity(max_samples),
        silence_start: None,
        done: false,
    }));

    let cb_state = Arc::clone(&state);
    let silence_threshold = config.silence_threshold;
    let silence_duration = config.silence_duration;
    let min_speech_duration = config.min_speech_duration;

    let stream = device
        .build_input_stream(
            &stream_config,
            move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                let mut state = cb_state.lock().expect("capture lock");
                if state.done {
                    return;
                }

                let remaining = max_samples.saturating_sub(state.buffer.len());
                let to_copy = data.len().min(remaining);
                state.buffer.extend_from_slice(&data[..to_copy]);

                if state.buffer.len() >= max_samples {
                    debug!("Capture duration cap reached");
                    state.done = true;
                    return;
                }

                if started.elapsed().as_secs_f64() < min_speech_duration {
                    return;
                }

                if rms_energy(data) < silence_threshold {
                    let silence_start = state.silence_start.get_or_insert_with(Instant::now);
                    if silence_start.elapsed().as_secs_f64() >= silence_duration {
                        debug!("Silence for {silence_duration}s — capture complete");
                        state.done = true;
                    }
                } else {
                    state.silence_start = None;
                }
            },
            move |err| {
                warn!("Audio stream error: {err}");
            },
            None,
        )
        .map_err(|e| VidbriefError::Recognition {
            reason: format!("failed to open input stream: {e}"),
        })?;

    stream.play().map_err(|e| VidbriefError::Recognition {
        reason: format!("failed to start input stream: {e}"),
    })?;

    let deadline = Duration::from_secs_f64(config.max_duration + 2.0);
    while started.elapsed() < deadline {
        std::thread::sleep(Duration::from_millis(100));
        if state.lock().expect("capture lock").done {
            break;
        }
    }
    drop(stream);

    let mut state = state.lock().expect("capture lock");
    let samples = std::mem::take(&mut state.buffer);
    debug!(
        "Captured {:.1}s of audio ({} samples)",
        samples.len() as f64 / config.sample_rate as f64,
        samples.len()
    );
    Ok(samples)
}

/// Decode captured audio to text. Blocking.
fn transcribe(ctx: &WhisperContext, samples: &[f32]) -> Result<String> {
    let t0 = Instant::now();

    let mut state = ctx.create_state().map_err(|e| VidbriefError::Recognition {
        reason: format!("failed to create whisper state: {e}"),
    })?;

    let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
    params.set_language(Some("en"));
    params.set_print_special(false);
    params.set_print_progress(false);
    params.set_print_realtime(false);
    params.set_print_timestamps(false);
    params.set_single_segment(true);
    params.set_token_timestamps(false);

    state
        .full(params, samples)
        .map_err(|e| VidbriefError::Recognition {
            reason: format!("whisper inference failed: {e}"),
        })?;

    let n_segments = state.full_n_segments();
    let mut text = String::new();
    for i in 0..n_segments {
        if let Some(segment) = state.get_segment(i) {
            if let Ok(segment_text) = segment.to_str_lossy() {
                let trimmed = segment_text.trim();
                if !trimmed.is_empty() {
                    if !text.is_empty() {
                        text.push(' ');
                    }
                    text.push_str(trimmed);
                }
            }
        }
    }

    debug!(
        "Transcribed in {:.0}ms: \"{text}\"",
        t0.elapsed().as_secs_f64() * 1000.0
    );
    Ok(text)
}

fn load_model(model: &str) -> std::result::Result<WhisperContext, String> {
    let path = find_model(model)?;
    info!("Loading Whisper model from {}", path.display());

    let params = WhisperContextParameters::default();
    let path_str = path.to_str().ok_or("model path is not valid UTF-8")?;
    WhisperContext::new_with_params(path_str, params)
        .map_err(|e| format!("failed to load Whisper model: {e}"))
}

/// Find a GGML model file: a direct path, or well-known names in the
/// usual cache locations.
fn find_model(model: &str) -> std::result::Result<PathBuf, String> {
    let direct = PathBuf::from(model);
    if direct.exists() && direct.extension().is_some() {
        return Ok(direct);
    }

    let filenames = [
        format!("ggml-{}.bin", model.replace('/', "-")),
        "ggml-base.bin".to_string(),
        "ggml-small.bin".to_string(),
    ];

    let search_dirs: Vec<PathBuf> = [
        std::env::current_dir().ok(),
        dirs::home_dir().map(|h| h.join(".cache/whisper")),
        dirs::home_dir().map(|h| h.join(".vidbrief")),
    ]
    .into_iter()
    .flatten()
    .collect();

    for dir in &search_dirs {
        for name in &filenames {
            let candidate = dir.join(name);
            if candidate.exists() {
                return Ok(candidate);
            }
        }
    }

    Err(format!(
        "no Whisper model found for '{model}' (searched {} locations)",
        search_dirs.len()
    ))
}

fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

fn is_silent(samples: &[f32], threshold: f32) -> bool {
    rms_energy(samples) < threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_energy_of_silence_is_zero() {
        assert_eq!(rms_energy(&[]), 0.0);
        assert_eq!(rms_energy(&[0.0; 512]), 0.0);
    }

    #[test]
    fn rms_energy_detects_signal() {
        let tone: Vec<f32> = (0..512)
            .map(|i| (i as f32 * 0.1).sin() * 0.5)
            .collect();
        assert!(!is_silent(&tone, 0.01));
        assert!(is_silent(&[0.0001; 512], 0.01));
    }

    #[test]
    fn find_model_accepts_a_direct_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ggml-custom.bin");
        std::fs::write(&path, b"stub").expect("write model stub");

        let found = find_model(path.to_str().expect("utf-8 path")).expect("should resolve");
        assert_eq!(found, path);
    }

    #[test]
    fn find_model_reports_missing_models() {
        let err = find_model("definitely-not-a-model").expect_err("should be missing");
        assert!(err.contains("definitely-not-a-model"));
    }

    #[tokio::test]
    async fn disabled_channel_fails_fast_without_sticking_the_indicator() {
        let config = SpeechInputConfig {
            enabled: false,
            ..SpeechInputConfig::default()
        };
        let channel = SpeechInputChannel::new(config);

        let err = channel.listen().await.expect_err("should be unsupported");
        assert!(matches!(err, VidbriefError::Unsupported { .. }));
        assert!(!*channel.listening().borrow());
    }

    #[tokio::test]
    async fn listening_indicator_clears_when_the_guard_drops() {
        let (tx, rx) = watch::channel(false);
        {
            let _guard = ListeningIndicator::on(&tx);
            assert!(*rx.borrow());
        }
        assert!(!*rx.borrow());
    }
}
