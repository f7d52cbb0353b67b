//! The two flavours of the plugin and the block kernel they share.
use crate::trace::{SampleTrace, TraceError, TraceValue};

/// What the plugin does with its output buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Copy every input sample to the output.
    Passthrough,
    /// Only trace the samples; the output buffer is never written.
    Monitor,
}

impl Variant {
    /// The variant this library was built as.
    ///
    /// Enable the `monitor` feature to build the monitoring flavour.
    #[cfg(not(feature = "monitor"))]
    pub const BUILT: Variant = Variant::Passthrough;
    #[cfg(feature = "monitor")]
    pub const BUILT: Variant = Variant::Monitor;

    /// The plugin URI of this variant, nul-terminated.
    pub const fn uri(self) -> &'static [u8] {
        match self {
            Variant::Passthrough => b"http://lv2.liamlombard.me/passthrough\0",
            Variant::Monitor => b"http://lv2.liamlombard.me/level-tester\0",
        }
    }

    /// Process one block.
    ///
    /// For every sample, the line `"<output> -> <input>"` is traced before the output is touched,
    /// so a passthrough trace shows what was in the output buffer before the copy.
    ///
    /// `input` and `output` must hold the same number of samples.
    pub fn process(
        self,
        input: &[f32],
        output: &mut [f32],
        trace: &mut SampleTrace,
    ) -> Result<(), TraceError> {
        debug_assert_eq!(input.len(), output.len());

        let mut result = Ok(());
        for (in_frame, out_frame) in Iterator::zip(input.iter(), output.iter_mut()) {
            // Keep processing after a failed write; the trace is closed by then.
            if result.is_ok() {
                result = trace.record(format_args!(
                    "{} -> {}",
                    TraceValue(*out_frame),
                    TraceValue(*in_frame)
                ));
            }
            if self == Variant::Passthrough {
                *out_frame = *in_frame;
            }
        }
        result
    }
}
