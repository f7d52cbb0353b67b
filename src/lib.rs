//! A minimal [LV2](http://lv2plug.in/) plugin that traces the samples flowing through it.
//!
//! The plugin has one audio input (port 0) and one audio output (port 1). Every sample of every
//! processed block is written to a plain-text trace file as `"<output> -> <input>"`, where
//! `<output>` is the value the output buffer held before the plugin touched it.
//!
//! Two flavours exist, chosen when the library is built:
//!
//! * **passthrough** (default): the input is copied to the output,
//!   URI `http://lv2.liamlombard.me/passthrough`.
//! * **monitor** (cargo feature `monitor`): the output is left untouched,
//!   URI `http://lv2.liamlombard.me/level-tester`.
//!
//! The trace file is `log.txt` in the host's working directory. It is truncated on every
//! activation and closed on deactivation. Writing it is blocking I/O on the audio thread, which
//! is why the bundle does not claim `lv2:hardRTCapable`.
//!
//! The matching bundle data lives in `bundles/`; copy the built library next to the Turtle files
//! of the flavour you built.
use lv2::prelude::*;

mod plugin;
pub mod trace;
pub mod variant;

pub use trace::{SampleTrace, TraceConfig, TraceError, TraceValue};
pub use variant::Variant;

use plugin::LevelTester;

lv2_descriptors!(LevelTester);
