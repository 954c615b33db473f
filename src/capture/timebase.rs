use super::Error;
use fugit::HertzU32 as Hertz;

pub const USEC_PER_SEC: u64 = 1_000_000;
pub const NSEC_PER_SEC: u64 = 1_000_000_000;

/// Converts `ticks` of a counter running at `cycles_per_second` into `units_per_second` units.
///
/// The product `ticks * units_per_second` must fit in 64 bits, [`Error::Range`] otherwise.
pub fn cycles_to_units(ticks: u64, units_per_second: u64, cycles_per_second: u64) -> Result<u64, Error> {
    if cycles_per_second == 0 {
        return Err(Error::InvalidArgument);
    }
    ticks
        .checked_mul(units_per_second)
        .map(|scaled| scaled / cycles_per_second)
        .ok_or(Error::Range)
}

/// Counter tick rate of a timer
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Timebase {
    clk: Hertz,
    psc: u16,
}

impl Timebase {
    /// `clk` is the timer kernel clock, `psc` the prescaler programmed at initialization
    pub const fn new(clk: Hertz, psc: u16) -> Self {
        Self { clk, psc }
    }

    pub const fn clock(&self) -> Hertz {
        self.clk
    }

    pub const fn prescaler(&self) -> u16 {
        self.psc
    }

    /// Frequency of the counter increment
    pub const fn cycles_per_second(&self) -> u64 {
        self.clk.raw() as u64 / (self.psc as u64 + 1)
    }

    pub fn ticks_to_micros(&self, ticks: u64) -> Result<u64, Error> {
        cycles_to_units(ticks, USEC_PER_SEC, self.cycles_per_second())
    }

    pub fn ticks_to_nanos(&self, ticks: u64) -> Result<u64, Error> {
        cycles_to_units(ticks, NSEC_PER_SEC, self.cycles_per_second())
    }
}
