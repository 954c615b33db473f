//! Software model of a general purpose timer.
//!
//! [`SimTimer`] behaves like the capture-relevant part of a hardware timer: an up-counting
//! counter that wraps at the auto-reload value, an update flag raised on wrap, one capture
//! comparator fed from either input and latched on the selected edge, and interrupt
//! flag/enable registers. Time only advances when [`SimTimer::tick`] is called, which makes it
//! suitable for driving the capture engine deterministically, see the helpers on
//! [`InputCapture<SimTimer>`](crate::capture::InputCapture).
//!
//! ```rust
//! use stm32f1xx_ic::timer::{sim::SimTimer, CounterWidth};
//! use fugit::RateExtU32;
//!
//! let mut tim = SimTimer::new(CounterWidth::Bits16, 1.MHz(), 0);
//! tim.tick(1000);
//! assert_eq!(tim.count(), 1000);
//! ```

use super::{CaptureTimer, CapturePolarity, CounterWidth, Event, InputMapping};
use crate::capture::{Error, InputCapture};
use fugit::HertzU32 as Hertz;

/// Timer input pins of a channel pair
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SimInput {
    Ti1,
    Ti2,
}

#[derive(Debug)]
pub struct SimTimer {
    width: CounterWidth,
    clk: Hertz,
    psc: u16,
    cnt: u32,
    arr: u32,
    update_enabled: bool,
    mapping: Option<InputMapping>,
    polarity: CapturePolarity,
    capture_enabled: bool,
    ccr: u32,
    dier: Event,
    sr: Event,
    reject_init: bool,
}

impl SimTimer {
    /// Creates a running timer. The update event stays disabled until requested.
    pub fn new(width: CounterWidth, clk: Hertz, psc: u16) -> Self {
        Self {
            width,
            clk,
            psc,
            cnt: 0,
            arr: width.max_ticks(),
            update_enabled: false,
            mapping: None,
            polarity: CapturePolarity::ActiveHigh,
            capture_enabled: false,
            ccr: 0,
            dier: Event::empty(),
            sr: Event::empty(),
            reject_init: false,
        }
    }

    /// Advances the counter by `ticks` and returns how many times it wrapped.
    ///
    /// Flags are sticky like in hardware: several wraps between two interrupt services raise
    /// the update flag only once.
    pub fn tick(&mut self, ticks: u32) -> u64 {
        let period = self.arr as u64 + 1;
        let total = self.cnt as u64 + ticks as u64;
        let wraps = total / period;
        self.cnt = (total % period) as u32;
        if wraps > 0 && self.update_enabled {
            self.sr.insert(Event::Update);
        }
        wraps
    }

    /// Presents an edge on `input`.
    ///
    /// The counter is latched if the capture input is enabled, routed from `input` and
    /// sensitive to `polarity`. Returns `true` when a capture happened.
    pub fn edge(&mut self, input: SimInput, polarity: CapturePolarity) -> bool {
        let routed = matches!(
            (self.mapping, input),
            (Some(InputMapping::Direct), SimInput::Ti1) | (Some(InputMapping::Indirect), SimInput::Ti2)
        );
        if self.capture_enabled && routed && polarity == self.polarity {
            self.ccr = self.cnt;
            self.sr.insert(Event::C1);
            true
        } else {
            false
        }
    }

    /// An enabled interrupt has its flag raised
    pub fn pending(&self) -> bool {
        self.sr.intersects(self.dier)
    }

    pub fn count(&self) -> u32 {
        self.cnt
    }

    pub fn set_count(&mut self, cnt: u32) {
        self.cnt = cnt.min(self.arr);
    }

    pub fn auto_reload(&self) -> u32 {
        self.arr
    }

    pub fn is_update_enabled(&self) -> bool {
        self.update_enabled
    }

    pub fn is_capture_enabled(&self) -> bool {
        self.capture_enabled
    }

    pub fn mapping(&self) -> Option<InputMapping> {
        self.mapping
    }

    pub fn polarity(&self) -> CapturePolarity {
        self.polarity
    }

    pub fn listening(&self) -> Event {
        self.dier
    }

    /// Makes the next [`CaptureTimer::init_capture`] fail, like a write the hardware ignored
    pub fn reject_capture_init(&mut self, b: bool) {
        self.reject_init = b;
    }
}

impl CaptureTimer for SimTimer {
    fn width(&self) -> CounterWidth {
        self.width
    }

    fn clock(&self) -> Hertz {
        self.clk
    }

    fn prescaler(&self) -> u16 {
        self.psc
    }

    fn set_auto_reload(&mut self, arr: u32) {
        self.arr = arr.min(self.width.max_ticks());
        self.cnt = self.cnt.min(self.arr);
    }

    fn enable_update_event(&mut self) {
        self.update_enabled = true;
    }

    fn init_capture(&mut self, mapping: InputMapping, edge: CapturePolarity) -> Result<(), Error> {
        if self.reject_init {
            return Err(Error::Io);
        }
        self.mapping = Some(mapping);
        self.polarity = edge;
        Ok(())
    }

    fn enable_capture(&mut self, b: bool) {
        self.capture_enabled = b;
    }

    fn listen(&mut self, event: Event, b: bool) {
        self.dier.set(event, b);
    }

    fn get_interrupt_flag(&self) -> Event {
        self.sr
    }

    fn clear_interrupt_flag(&mut self, event: Event) {
        self.sr.remove(event);
    }

    fn read_capture(&self) -> u32 {
        self.ccr
    }

    fn reset_counter(&mut self) {
        self.cnt = 0;
    }
}

/// Drives a capture engine the way interrupts would on hardware.
///
/// Without a timer (see [`InputCapture::uninit`]) nothing happens.
impl InputCapture<SimTimer> {
    /// Runs the interrupt handler if an enabled interrupt is pending
    pub fn service(&self) -> bool {
        let pending = self.with_timer(|tim| tim.pending()).unwrap_or(false);
        if pending {
            self.on_interrupt();
        }
        pending
    }

    /// Advances the counter by `ticks`, servicing every overflow as it happens
    pub fn advance(&self, mut ticks: u32) {
        while ticks > 0 {
            let step = match self.with_timer(|tim| {
                let step = (tim.auto_reload() - tim.count())
                    .saturating_add(1)
                    .min(ticks);
                tim.tick(step);
                step
            }) {
                Some(step) => step,
                None => return,
            };
            self.service();
            ticks -= step;
        }
    }

    /// Presents an edge and services the resulting capture, see [`SimTimer::edge`]
    pub fn edge(&self, input: SimInput, polarity: CapturePolarity) -> bool {
        let captured = self
            .with_timer(|tim| tim.edge(input, polarity))
            .unwrap_or(false);
        self.service();
        captured
    }
}
