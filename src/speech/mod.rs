//! Speech capability channels.
//!
//! - `output`: summary text → audible speech through a platform synthesizer
//! - `input`: single-shot spoken query capture through Whisper
//!
//! Both are optional and feature-detected; anything missing degrades to a
//! user-visible notice, never a failure of the workflow.

pub mod input;
pub mod output;
