//! Progress parser for the transcoder's output streams.
//!
//! Pure and stateful: lines in, optional percentage out. The diagnostic
//! stream (stderr) yields the total duration once; the progress stream
//! (stdout, `-progress pipe:1`) yields current-position markers that are
//! remapped into the job's transcode window and emitted only when the
//! displayed value strictly increases.

use regex::Regex;
use std::sync::OnceLock;

/// Transcoding occupies this slice of the job's 0-100 progress range; the
/// windows around it are reserved for setup, cover extraction, and commit.
pub const TRANSCODE_WINDOW_START: u8 = 10;
pub const TRANSCODE_WINDOW_END: u8 = 90;

fn duration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"Duration:\s*(\d+):(\d{2}):(\d{2})(?:\.(\d+))?").expect("static pattern")
    })
}

fn position_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:out_)?time=\s*(\d+):(\d{2}):(\d{2})(?:\.(\d+))?").expect("static pattern")
    })
}

/// Converts `HH:MM:SS(.frac)` captures into seconds.
fn clock_to_secs(caps: &regex::Captures<'_>) -> f64 {
    let part = |i: usize| {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .unwrap_or(0.0)
    };
    let frac = caps
        .get(4)
        .and_then(|m| format!("0.{}", m.as_str()).parse::<f64>().ok())
        .unwrap_or(0.0);
    part(1) * 3600.0 + part(2) * 60.0 + part(3) + frac
}

/// Stateful parser over both transcoder streams.
#[derive(Debug, Default)]
pub struct ProgressParser {
    total_secs: Option<f64>,
    last_reported: u8,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total expected duration, once discovered from the diagnostic stream.
    pub fn total_duration_secs(&self) -> Option<f64> {
        self.total_secs
    }

    /// Feed one diagnostic (stderr) line; the first duration marker fixes the
    /// total, later ones are ignored.
    pub fn observe_diagnostic_line(&mut self, line: &str) {
        if self.total_secs.is_some() {
            return;
        }
        if let Some(caps) = duration_re().captures(line) {
            let secs = clock_to_secs(&caps);
            if secs > 0.0 {
                self.total_secs = Some(secs);
            }
        }
    }

    /// Feed one progress (stdout) line. Returns the remapped percentage when
    /// it strictly increases over the last reported value.
    pub fn observe_progress_line(&mut self, line: &str) -> Option<u8> {
        let total = self.total_secs?;
        let caps = position_re().captures(line)?;
        let position = clock_to_secs(&caps);

        let raw = (position / total * 100.0).clamp(0.0, 100.0);
        let span = f64::from(TRANSCODE_WINDOW_END - TRANSCODE_WINDOW_START) / 100.0;
        let displayed = (f64::from(TRANSCODE_WINDOW_START) + raw * span).round() as u8;
        let displayed = displayed.min(TRANSCODE_WINDOW_END);

        if displayed > self.last_reported {
            self.last_reported = displayed;
            Some(displayed)
        } else {
            None
        }
    }
}
