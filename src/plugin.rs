use crate::trace::{SampleTrace, TraceConfig};
use crate::variant::Variant;
use lv2::prelude::*;

/// The ports of the plugin. Their indices have to match the bundle's Turtle files.
#[derive(PortCollection)]
pub(crate) struct Ports {
    input: InputPort<Audio>,
    output: OutputPort<Audio>,
}

/// A mono plugin that traces every sample it sees to a text file.
///
/// Depending on its [`Variant`](../variant/enum.Variant.html), it copies its input to its output or
/// leaves the output alone. The trace file is opened by `activate` and closed by `deactivate`, so
/// it only ever contains the samples of the latest activation.
pub(crate) struct LevelTester {
    variant: Variant,
    trace: SampleTrace,
}

unsafe impl UriBound for LevelTester {
    const URI: &'static [u8] = Variant::BUILT.uri();
}

impl LevelTester {
    pub fn with_trace(variant: Variant, config: TraceConfig) -> Self {
        Self {
            variant,
            trace: SampleTrace::new(config),
        }
    }

    /// Start a new trace, truncating the previous one.
    ///
    /// If the file can't be opened, the failure is logged and nothing is traced until the next
    /// activation.
    pub fn start_trace(&mut self) {
        match self.trace.open() {
            Ok(()) => tracing::debug!("tracing samples to {:?}", self.trace.config().path()),
            Err(e) => tracing::warn!("{}", e),
        }
    }

    pub fn stop_trace(&mut self) {
        if let Err(e) = self.trace.close() {
            tracing::warn!("{}", e);
        }
        tracing::debug!("sample trace closed");
    }

    /// Process one block of audio.
    ///
    /// Both buffers are only borrowed for the duration of the call.
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) {
        if let Err(e) = self.variant.process(input, output, &mut self.trace) {
            tracing::warn!("{}", e);
        }
    }
}

impl Plugin for LevelTester {
    type Ports = Ports;

    type InitFeatures = ();
    type AudioFeatures = ();

    // Neither the sample rate, the bundle path nor any host feature is needed.
    fn new(_plugin_info: &PluginInfo, _features: &mut ()) -> Option<Self> {
        Some(LevelTester::with_trace(Variant::BUILT, TraceConfig::default()))
    }

    fn activate(&mut self, _features: &mut ()) {
        self.start_trace();
    }

    fn run(&mut self, ports: &mut Ports, _features: &mut (), _: u32) {
        self.process(&ports.input, &mut ports.output);
    }

    fn deactivate(&mut self, _features: &mut ()) {
        self.stop_trace();
    }
}
