//! Per-second throughput accounting and reporting.
//!
//! A single [`RateReporter`] owns all measurement state for the process.
//! Inbound data events feed [`RateReporter::accumulate`], the timer
//! facility drives [`RateReporter::tick`] once per elapsed second, and the
//! reporter decides when the configured window is over. Everything runs on
//! one event-loop task, so the state needs no synchronization.

use std::io::{self, Write};
use std::time::Duration;

use log::debug;

use crate::transport::{SessionControl, TimerFacility};

/// Reporting period. The original tool reports once per second and the
/// report line format assumes it, so this is not configurable.
pub const REPORT_PERIOD: Duration = Duration::from_secs(1);

/// Measurement lifecycle, advanced one way only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No measured byte observed yet; the timer is not armed.
    NotStarted,
    /// First byte seen, periodic reporting is running.
    Measuring,
    /// The window elapsed and termination has been requested. Further
    /// ticks and data are ignored.
    Terminating,
}

/// Accounting state and periodic-report logic for one measured stream.
///
/// # Examples
///
/// ```
/// use quicperf::{Phase, RateReporter};
///
/// let mut reporter = RateReporter::new(10);
/// reporter.accumulate(1500);
/// reporter.accumulate(3000);
///
/// assert_eq!(reporter.phase(), Phase::NotStarted);
/// assert_eq!(reporter.bytes_this_second(), 4500);
/// assert_eq!(reporter.total_bytes(), 0); // folded in at the next tick
/// ```
#[derive(Debug)]
pub struct RateReporter {
    phase: Phase,
    second_index: u64,
    bytes_this_second: u64,
    total_bytes: u64,
    duration_secs: u64,
}

impl RateReporter {
    /// Creates a reporter for a measurement window of `duration_secs`
    /// whole seconds.
    pub fn new(duration_secs: u64) -> Self {
        Self {
            phase: Phase::NotStarted,
            second_index: 0,
            bytes_this_second: 0,
            total_bytes: 0,
            duration_secs,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Completed report ticks since the window started.
    pub fn second_index(&self) -> u64 {
        self.second_index
    }

    /// Bytes accumulated since the last tick.
    pub fn bytes_this_second(&self) -> u64 {
        self.bytes_this_second
    }

    /// Bytes folded in by all ticks so far. Never decreases.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Adds `n` received bytes to the current second.
    ///
    /// A zero count is a no-op; it means the transport delivered an empty
    /// notification, which is worth seeing in debug logs but must not
    /// disturb the accounting.
    pub fn accumulate(&mut self, n: u64) {
        if n == 0 {
            debug!("accumulate called with zero bytes");
            return;
        }
        self.bytes_this_second += n;
    }

    /// One-shot latch fired on the first measured byte.
    ///
    /// Arms the repeating report timer and tells the session the window
    /// has started. Subsequent calls are no-ops.
    pub fn on_first_byte(
        &mut self,
        timer: &mut dyn TimerFacility,
        session: &mut dyn SessionControl,
    ) {
        if self.phase != Phase::NotStarted {
            return;
        }
        self.phase = Phase::Measuring;
        timer.arm_repeating(REPORT_PERIOD);
        session.notify_first_byte();
    }

    /// Periodic report handler, invoked once per elapsed second.
    ///
    /// Folds the current second into the running total, prints the report
    /// line, and requests termination from the session once
    /// `duration_secs` ticks have completed. Ticks arriving before the
    /// first byte or after termination are ignored.
    pub fn tick(&mut self, session: &mut dyn SessionControl) {
        if self.phase != Phase::Measuring {
            return;
        }

        self.total_bytes += self.bytes_this_second;
        let line = report_line(self.second_index, self.bytes_this_second, self.total_bytes);
        println!("{}", line);
        let _ = io::stdout().flush();

        self.bytes_this_second = 0;
        self.second_index += 1;

        if self.second_index >= self.duration_secs {
            self.phase = Phase::Terminating;
            session.request_termination();
        }
    }
}

/// Renders one report line.
///
/// `total_bytes` is the cumulative count *after* the current second has
/// been folded in, while `second_index` is the pre-increment index of the
/// second being reported. The average therefore covers `second_index + 1`
/// elapsed whole seconds, counting second 0 — the cadence of the original
/// tool, kept as is. The division is integer division on byte counts.
///
/// # Examples
///
/// ```
/// use quicperf::reporter::report_line;
///
/// assert_eq!(
///     report_line(0, 3000, 3000),
///     "second 0: 23.44 kbit/s (3000 bytes received) (total 3000  average 23.44 kbit/s)"
/// );
/// ```
pub fn report_line(second_index: u64, bytes_this_second: u64, total_bytes: u64) -> String {
    let rate = format_bitrate(bytes_this_second as f64);
    let average = format_bitrate((total_bytes / (second_index + 1)) as f64);
    format!(
        "second {}: {} ({} bytes received) (total {}  average {})",
        second_index, rate, bytes_this_second, total_bytes, average
    )
}

/// Converts a byte count into a human-scaled bits-per-second string.
///
/// The count is multiplied by 8 and divided by 1024 while it exceeds 1024
/// (strictly), walking the units `bit/s`, `kbit/s`, `mbit/s`, `gbit/s`.
/// `gbit/s` is the ceiling: a value past it is rendered unscaled. The
/// scaled value keeps 4 significant digits with trailing zeros trimmed.
///
/// # Examples
///
/// ```
/// use quicperf::format_bitrate;
///
/// assert_eq!(format_bitrate(0.0), "0 bit/s");
/// assert_eq!(format_bitrate(128.0), "1024 bit/s"); // exactly 1024 stays
/// assert_eq!(format_bitrate(3000.0), "23.44 kbit/s");
/// ```
pub fn format_bitrate(bytes: f64) -> String {
    const UNITS: [&str; 4] = ["bit/s", "kbit/s", "mbit/s", "gbit/s"];

    let mut value = bytes * 8.0;
    let mut unit = 0;
    while value > 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{} {}", sig4(value), UNITS[unit])
}

/// Renders `value` with 4 significant digits, C `printf("%.4g")` style:
/// trailing zeros trimmed, scientific notation outside the 1e-4..1e4
/// magnitude range.
fn sig4(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }

    let exp = value.abs().log10().floor() as i32;
    if !(-4..4).contains(&exp) {
        let mantissa = value / 10f64.powi(exp);
        let sign = if exp < 0 { '-' } else { '+' };
        return format!("{}e{}{:02}", trim_zeros(format!("{:.3}", mantissa)), sign, exp.abs());
    }

    let decimals = (3 - exp).max(0) as usize;
    trim_zeros(format!("{:.*}", decimals, value))
}

fn trim_zeros(s: String) -> String {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    }
}
