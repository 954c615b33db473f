/*!
  # Timer backends

  The capture engine never touches registers itself. It drives a [`CaptureTimer`], which exposes
  the handful of counter, capture-comparator and interrupt operations the engine needs.

  Only the first capture comparator (CC1) is used. Its input can be routed from either pin of the
  channel pair:

  | Channel | Mapping  | Comparator input | `Normal` edge | `Inverted` edge |
  |:-------:|:--------:|:----------------:|:-------------:|:---------------:|
  |    1    | Direct   |       TI1        |    rising     |     falling     |
  |    2    | Indirect |       TI2        |    falling    |     rising      |

  Backends:

  - [`sim::SimTimer`], a software model of a general purpose timer, always available;
  - `stm32::Stm32Timer`, the STM32F1 general purpose timers, built when a chip feature is enabled.
*/
#![allow(non_upper_case_globals)]

use crate::capture::Error;
use fugit::HertzU32 as Hertz;

pub mod sim;
#[cfg(any(
    feature = "stm32f100",
    feature = "stm32f101",
    feature = "stm32f103",
    feature = "stm32f105",
    feature = "stm32f107",
))]
pub mod stm32;

bitflags::bitflags! {
    /// Interrupt events, laid out like the timer status register
    pub struct Event: u32 {
        const Update = 1 << 0;
        const C1 = 1 << 1;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Event {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Event({=u32:#x})", self.bits())
    }
}

/// Counter width
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CounterWidth {
    Bits16,
    Bits32,
}

impl CounterWidth {
    /// Largest value the counter can hold
    pub const fn max_ticks(self) -> u32 {
        match self {
            Self::Bits16 => u16::MAX as u32,
            Self::Bits32 => u32::MAX,
        }
    }

    pub const fn bits(self) -> u8 {
        match self {
            Self::Bits16 => 16,
            Self::Bits32 => 32,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
/// Input mapping of the capture comparator (CC1S).
pub enum InputMapping {
    /// CC1 is mapped on TI1.
    Direct = 1,
    /// CC1 is mapped on TI2, the input of the paired channel.
    Indirect = 2,
}

/// Capture polarity
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CapturePolarity {
    /// Capture on rising edges
    ActiveHigh,
    /// Capture on falling edges
    ActiveLow,
}

impl CapturePolarity {
    pub const fn opposite(self) -> Self {
        match self {
            Self::ActiveHigh => Self::ActiveLow,
            Self::ActiveLow => Self::ActiveHigh,
        }
    }
}

/// Register-level operations needed by the capture engine.
///
/// Implementations own one timer instance. The counter must be free running once the backend
/// is constructed.
pub trait CaptureTimer {
    /// Counter width, fixed for the lifetime of the backend
    fn width(&self) -> CounterWidth;

    /// Frequency of the timer kernel clock, before the prescaler
    fn clock(&self) -> Hertz;

    /// Prescaler value, the counter runs at `clock / (prescaler + 1)`
    fn prescaler(&self) -> u16;

    fn set_auto_reload(&mut self, arr: u32);

    /// Let counter overflows raise the update event
    fn enable_update_event(&mut self);

    /// Program input routing and edge of the capture comparator.
    ///
    /// Fails with [`Error::Io`] if the hardware refused the configuration.
    fn init_capture(&mut self, mapping: InputMapping, edge: CapturePolarity)
        -> Result<(), Error>;

    /// Enable or disable the capture input
    fn enable_capture(&mut self, b: bool);

    /// Enable or disable the interrupts for `event` with a single register update
    fn listen(&mut self, event: Event, b: bool);

    fn get_interrupt_flag(&self) -> Event;

    fn clear_interrupt_flag(&mut self, event: Event);

    /// Counter value latched by the last capture
    fn read_capture(&self) -> u32;

    /// Restart the counter from zero without raising the update flag
    fn reset_counter(&mut self);
}
