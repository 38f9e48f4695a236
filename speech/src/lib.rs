//! Speech interfaces and the output dispatcher.
//!
//! This crate provides:
//! - [`Synthesizer`], [`Player`], [`Listener`]: interfaces implemented by
//!   external text-to-speech, audio output, and transcription providers
//! - [`Dispatcher`]: the priority queue + worker that serializes all
//!   spoken output, with interrupt-and-purge semantics and a bounded
//!   phrase cache
//!
//! # Example
//!
//! ```rust,ignore
//! use lobby_speech::{Dispatcher, Priority};
//!
//! let dispatcher = Dispatcher::new(synthesizer, player, 40);
//! dispatcher.enqueue("Welcome!", Priority::Normal);
//! dispatcher.speak_now("A known visitor just arrived.");
//! ```

mod cache;
mod dispatch;
mod provider;

pub use cache::PhraseCache;
pub use dispatch::{Dispatcher, Priority, SpeechRequest};
pub use provider::{AudioClip, Heard, Listener, Player, SpeechError, Synthesizer};
