//! Input capture
//!
//! [`InputCapture`] measures the period of an external signal with a free running timer. It
//! owns a [`CaptureTimer`](crate::timer::CaptureTimer) backend, arms the capture and overflow
//! interrupts on [`InputCapture::enable`], and reports every captured period, or every counter
//! overflow, to a callback from [`InputCapture::on_interrupt`].
//!
//! ```rust,ignore
//! fn on_capture(res: &CaptureResult, _user_data: usize) {
//!     match res.status {
//!         Ok(()) => { /* res.period is valid */ }
//!         Err(_) => { /* signal lost, res.period is saturated */ }
//!     }
//! }
//!
//! let ic = InputCapture::new(timer, Config::default());
//! ic.configure(1, CaptureFlags::TYPE_PERIOD | CaptureFlags::MODE_CONTINUOUS, Some(on_capture), 0)?;
//! ic.enable(1)?;
//!
//! // Timer interrupt handler
//! ic.on_interrupt();
//! ```
//!
//! For one-off measurements from a context that can suspend, use
//! [`InputCapture::capture_cycles`] and friends.

use fugit::MicrosDurationU32;

mod blocking;
mod engine;
mod table;
mod timebase;

pub use blocking::Capture;
pub use engine::InputCapture;
pub use table::CaptureTable;
pub use timebase::{cycles_to_units, Timebase, NSEC_PER_SEC, USEC_PER_SEC};

/// Captures discarded after arming, the counter phase is unknown until the first edge.
pub const SKIPPED_CAPTURES: u8 = 0;

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Bad channel or flags, or no capture configured
    InvalidArgument,
    /// Not implemented by this hardware path
    Unsupported,
    /// A capture is already armed
    Busy,
    /// The timer rejected the configuration
    Io,
    /// Counter overflow before an edge, or unit conversion overflow
    Range,
    /// No capture before the deadline
    TimedOut,
}

impl Error {
    /// Negative errno value used as callback status code
    pub const fn errno(self) -> i32 {
        match self {
            Self::InvalidArgument => -22,
            Self::Unsupported => -134,
            Self::Busy => -16,
            Self::Io => -5,
            Self::Range => -34,
            Self::TimedOut => -116,
        }
    }
}

bitflags::bitflags! {
    /// Capture flags
    pub struct CaptureFlags: u16 {
        /// Capture on the opposite edge
        const POLARITY_INVERTED = 1 << 0;
        /// Capture the signal period
        const TYPE_PERIOD = 1 << 1;
        /// Capture the pulse width
        const TYPE_PULSE = 1 << 2;
        const TYPE_BOTH = Self::TYPE_PERIOD.bits | Self::TYPE_PULSE.bits;
        /// Keep capturing until disabled. Single shot otherwise.
        const MODE_CONTINUOUS = 1 << 3;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for CaptureFlags {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "CaptureFlags({=u16:#x})", self.bits())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CaptureType {
    Period,
    Pulse,
    Both,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CaptureMode {
    /// Disarm after the first captured period
    Single,
    /// Capture every period until disabled
    Continuous,
}

/// Signal polarity
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    Normal,
    Inverted,
}

impl CaptureFlags {
    /// Requested capture type, `None` if no type bit is set
    pub fn capture_type(self) -> Option<CaptureType> {
        if self.contains(Self::TYPE_BOTH) {
            Some(CaptureType::Both)
        } else if self.contains(Self::TYPE_PERIOD) {
            Some(CaptureType::Period)
        } else if self.contains(Self::TYPE_PULSE) {
            Some(CaptureType::Pulse)
        } else {
            None
        }
    }

    pub fn mode(self) -> CaptureMode {
        if self.contains(Self::MODE_CONTINUOUS) {
            CaptureMode::Continuous
        } else {
            CaptureMode::Single
        }
    }

    pub fn polarity(self) -> Polarity {
        if self.contains(Self::POLARITY_INVERTED) {
            Polarity::Inverted
        } else {
            Polarity::Normal
        }
    }
}

/// Result of one capture event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CaptureResult {
    /// Channel the capture was configured on
    pub channel: u8,
    /// Period in timer ticks. Saturated to the counter maximum on [`Error::Range`].
    pub period: u32,
    /// Pulse width in timer ticks. Always 0, pulse width is not measured.
    pub pulse: u32,
    pub status: Result<(), Error>,
}

impl CaptureResult {
    /// 0 on success, a negative errno value otherwise
    pub fn status_code(&self) -> i32 {
        match self.status {
            Ok(()) => 0,
            Err(e) => e.errno(),
        }
    }
}

/// Capture callback.
///
/// Runs in interrupt context: it must return quickly and must not call back into
/// `configure`/`enable`/`disable` without deferring the call.
pub type CaptureCallback = fn(&CaptureResult, usize);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// Captures discarded after each [`InputCapture::enable`]
    pub skip_edges: u8,
    /// How long [`InputCapture::capture_cycles`] suspends between two polls of the result
    pub poll_interval: MicrosDurationU32,
}

impl Config {
    /// Same as `Default`, usable in a `static`
    pub const fn new() -> Self {
        Config {
            skip_edges: SKIPPED_CAPTURES,
            poll_interval: MicrosDurationU32::from_ticks(100),
        }
    }

    pub const fn skip_edges(mut self, skip_edges: u8) -> Self {
        self.skip_edges = skip_edges;
        self
    }

    pub const fn poll_interval(mut self, poll_interval: MicrosDurationU32) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

impl Default for Config {
    fn default() -> Config {
        Config::new()
    }
}
