//! Per-instance diagnostic trace.
//!
//! Every processed sample produces one line in a plain-text file. The file is opened when the
//! plugin is activated, truncating whatever a previous activation left behind, and closed when it
//! is deactivated or dropped.
//!
//! Several instances may trace to the same file. The file is opened in append mode and every line
//! goes out in a single write, so lines of different instances never overwrite each other.
use std::fmt::{self, Write as _};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the trace file when nothing else is configured.
pub const DEFAULT_TRACE_FILE: &str = "log.txt";

/// Significant digits of a traced sample.
const PRECISION: usize = 6;

/// Errors raised by the trace file.
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("failed to open trace file {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write trace line: {0}")]
    Write(#[source] io::Error),
    #[error("failed to flush trace file: {0}")]
    Flush(#[source] io::Error),
}

/// Where the trace goes.
///
/// Relative paths are resolved against the working directory of the host process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceConfig {
    path: PathBuf,
}

impl TraceConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TRACE_FILE)
    }
}

/// A sample as it appears in the trace.
///
/// The notation is C's `%g` with six significant digits: fixed notation for exponents from -4 to
/// 5, scientific notation otherwise, trailing zeros removed. `1.0 / 3.0` is `0.333333`, `1e-7` is
/// `1e-07`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceValue(pub f32);

impl fmt::Display for TraceValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let value = self.0;
        let negative = value.is_sign_negative();
        if value.is_nan() {
            return f.write_str(if negative { "-nan" } else { "nan" });
        }
        if value.is_infinite() {
            return f.write_str(if negative { "-inf" } else { "inf" });
        }
        if value == 0.0 {
            return f.write_str(if negative { "-0" } else { "0" });
        }

        // The exponent is taken after rounding to the final precision, as `%g` does.
        let mut scientific = StackStr::new();
        write!(scientific, "{:.*e}", PRECISION - 1, value)?;
        let (mantissa, exponent) = scientific.as_str().split_at(
            scientific
                .as_str()
                .find('e')
                .ok_or(fmt::Error)?,
        );
        let exponent: i32 = exponent[1..].parse().map_err(|_| fmt::Error)?;

        if exponent < -4 || exponent >= PRECISION as i32 {
            let sign = if exponent < 0 { '-' } else { '+' };
            write!(
                f,
                "{}e{}{:02}",
                trim_zeros(mantissa),
                sign,
                exponent.abs()
            )
        } else {
            let mut fixed = StackStr::new();
            let decimals = (PRECISION as i32 - 1 - exponent) as usize;
            write!(fixed, "{:.*}", decimals, value)?;
            f.write_str(trim_zeros(fixed.as_str()))
        }
    }
}

fn trim_zeros(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}

/// Fixed-size formatting buffer, so formatting a sample never allocates.
struct StackStr {
    buf: [u8; 48],
    len: usize,
}

impl StackStr {
    fn new() -> Self {
        Self {
            buf: [0; 48],
            len: 0,
        }
    }

    fn as_str(&self) -> &str {
        // Only whole `str`s are ever copied in.
        std::str::from_utf8(&self.buf[..self.len]).unwrap_or("")
    }
}

impl fmt::Write for StackStr {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let end = self.len + s.len();
        if end > self.buf.len() {
            return Err(fmt::Error);
        }
        self.buf[self.len..end].copy_from_slice(s.as_bytes());
        self.len = end;
        Ok(())
    }
}

/// The trace file of one plugin instance.
///
/// A closed trace swallows every line. This keeps the audio path free of error handling: if the
/// file could not be opened, or a write failed, the remaining lines of the activation are dropped.
pub struct SampleTrace {
    config: TraceConfig,
    file: Option<File>,
    line: Vec<u8>,
}

impl SampleTrace {
    pub fn new(config: TraceConfig) -> Self {
        Self {
            config,
            file: None,
            line: Vec::with_capacity(64),
        }
    }

    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Create or truncate the trace file.
    ///
    /// An already open file is closed first.
    pub fn open(&mut self) -> Result<(), TraceError> {
        self.close()?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.config.path)
            .and_then(|file| file.set_len(0).map(|_| file))
            .map_err(|source| TraceError::Open {
                path: self.config.path.clone(),
                source,
            })?;
        self.file = Some(file);
        Ok(())
    }

    /// Flush and close the trace file.
    ///
    /// The file is released even if the flush fails.
    pub fn close(&mut self) -> Result<(), TraceError> {
        match self.file.take() {
            Some(mut file) => file.flush().map_err(TraceError::Flush),
            None => Ok(()),
        }
    }

    /// Write one line.
    ///
    /// Does nothing if the trace is closed. On failure, the trace is closed.
    pub fn record(&mut self, line: fmt::Arguments) -> Result<(), TraceError> {
        let file = match self.file.as_mut() {
            Some(file) => file,
            None => return Ok(()),
        };
        let buf = &mut self.line;
        buf.clear();
        let written = match writeln!(buf, "{}", line) {
            Ok(()) => file.write_all(buf),
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            self.file = None;
            return Err(TraceError::Write(e));
        }
        Ok(())
    }
}

impl Drop for SampleTrace {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!("{}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn trace_in(dir: &tempfile::TempDir) -> SampleTrace {
        SampleTrace::new(TraceConfig::new(dir.path().join("trace.txt")))
    }

    #[test]
    fn default_config_points_at_log_txt() {
        assert_eq!(TraceConfig::default().path(), Path::new("log.txt"));
    }

    #[test]
    fn closed_trace_drops_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mut trace = trace_in(&dir);

        trace.record(format_args!("{}", 1.0)).unwrap();

        assert!(!trace.is_open());
        assert!(!dir.path().join("trace.txt").exists());
    }

    #[test]
    fn lines_reach_the_file_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let mut trace = trace_in(&dir);

        trace.open().unwrap();
        trace.record(format_args!("{} -> {}", 0.0, 0.5)).unwrap();
        trace.record(format_args!("{} -> {}", 0.0, -0.25)).unwrap();
        trace.close().unwrap();

        let contents = fs::read_to_string(trace.config().path()).unwrap();
        assert_eq!(contents, "0 -> 0.5\n0 -> -0.25\n");
    }

    #[test]
    fn reopening_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let mut trace = trace_in(&dir);

        trace.open().unwrap();
        trace.record(format_args!("first")).unwrap();
        trace.close().unwrap();

        trace.open().unwrap();
        trace.record(format_args!("second")).unwrap();
        trace.close().unwrap();

        let contents = fs::read_to_string(trace.config().path()).unwrap();
        assert_eq!(contents, "second\n");
    }

    #[test]
    fn dropping_an_open_trace_keeps_its_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.txt");
        {
            let mut trace = trace_in(&dir);
            trace.open().unwrap();
            trace.record(format_args!("kept")).unwrap();
        }
        assert_eq!(fs::read_to_string(path).unwrap(), "kept\n");
    }

    #[test]
    fn open_failure_leaves_the_trace_closed() {
        let dir = tempfile::tempdir().unwrap();
        let mut trace = SampleTrace::new(TraceConfig::new(dir.path().join("missing/trace.txt")));

        match trace.open() {
            Err(TraceError::Open { path, .. }) => assert!(path.ends_with("missing/trace.txt")),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
        assert!(!trace.is_open());
        trace.record(format_args!("dropped")).unwrap();
    }

    #[test]
    fn samples_use_six_significant_digits() {
        let cases: &[(f32, &str)] = &[
            (0.0, "0"),
            (-0.0, "-0"),
            (1.0, "1"),
            (-0.25, "-0.25"),
            (1.0 / 3.0, "0.333333"),
            (2.0 / 3.0, "0.666667"),
            (123456.0, "123456"),
            (1234567.0, "1.23457e+06"),
            (999999.7, "1e+06"),
            (0.0001, "0.0001"),
            (0.00001, "1e-05"),
            (1e-7, "1e-07"),
            (-3.5e20, "-3.5e+20"),
            (f32::INFINITY, "inf"),
            (f32::NEG_INFINITY, "-inf"),
            (f32::NAN, "nan"),
        ];
        for (value, expected) in cases.iter() {
            assert_eq!(TraceValue(*value).to_string(), *expected, "{:e}", value);
        }
    }

    #[test]
    fn instances_sharing_a_file_keep_every_line() {
        let dir = tempfile::tempdir().unwrap();
        let config = TraceConfig::new(dir.path().join("log.txt"));
        let mut first = SampleTrace::new(config.clone());
        let mut second = SampleTrace::new(config.clone());

        first.open().unwrap();
        second.open().unwrap();
        for sample in [1.0, 2.0, 3.0].iter() {
            first.record(format_args!("0 -> {}", sample)).unwrap();
        }
        second.record(format_args!("0 -> 0.5")).unwrap();
        first.record(format_args!("0 -> 4")).unwrap();
        second.record(format_args!("0 -> 0.75")).unwrap();
        first.close().unwrap();
        second.close().unwrap();

        let contents = fs::read_to_string(config.path()).unwrap();
        assert_eq!(
            contents,
            "0 -> 1\n0 -> 2\n0 -> 3\n0 -> 0.5\n0 -> 4\n0 -> 0.75\n"
        );
    }
}
