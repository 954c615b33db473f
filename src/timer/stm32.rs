//! STM32F1 general purpose timers
//!
//! The application enables the bus clock of the timer, configures the capture pin as a
//! floating input and binds the timer interrupt to [`InputCapture::on_interrupt`]:
//!
//! ```rust,ignore
//! static IC: InputCapture<Stm32Timer<pac::TIM3>> = InputCapture::uninit(Config::new());
//!
//! // 72 MHz kernel clock counting at 1 MHz
//! IC.init(Stm32Timer::new(dp.TIM3, 72.MHz(), 71)).unwrap();
//!
//! #[interrupt]
//! fn TIM3() {
//!     IC.on_interrupt();
//! }
//! ```
//!
//! [`InputCapture::on_interrupt`]: crate::capture::InputCapture::on_interrupt

use core::ops::Deref;

use super::{CaptureTimer, CapturePolarity, CounterWidth, Event, InputMapping};
use crate::capture::Error;
use crate::pac::{self, tim2::RegisterBlock};
use fugit::HertzU32 as Hertz;

mod sealed {
    pub trait Sealed {}
}

/// General purpose timer with a capture comparator on channel 1
pub trait Instance: sealed::Sealed + Deref<Target = RegisterBlock> {}

macro_rules! instance {
    ($($TIM:ty),+) => {
        $(
            impl sealed::Sealed for $TIM {}
            impl Instance for $TIM {}
        )+
    };
}

instance!(pac::TIM2, pac::TIM3);

#[cfg(feature = "medium")]
instance!(pac::TIM4);

#[cfg(any(feature = "high", feature = "connectivity"))]
instance!(pac::TIM5);

/// Capture backend over one general purpose timer
pub struct Stm32Timer<TIM> {
    tim: TIM,
    clk: Hertz,
}

impl<TIM: Instance> Stm32Timer<TIM> {
    /// Starts `tim` as a free running up-counter at `clk / (psc + 1)`.
    ///
    /// `clk` is the timer kernel clock, twice the APB clock when its prescaler is not 1.
    pub fn new(tim: TIM, clk: Hertz, psc: u16) -> Self {
        // Stopped, up-counting, edge aligned
        tim.cr1().reset();
        tim.psc().write(|w| w.psc().set(psc));
        tim.arr().write(|w| w.arr().set(u16::MAX));

        // Load the prescaler now without raising the update flag
        tim.cr1().modify(|_, w| w.urs().set_bit());
        tim.egr().write(|w| w.ug().set_bit());
        tim.cr1().modify(|_, w| w.urs().clear_bit());

        tim.cr1().modify(|_, w| w.cen().set_bit());
        Self { tim, clk }
    }

    /// Stops the counter and releases the TIM peripheral
    pub fn release(self) -> TIM {
        self.tim.dier().reset();
        self.tim.ccer().reset();
        self.tim.cr1().modify(|_, w| w.cen().clear_bit());
        self.tim
    }

    pub fn count(&self) -> u16 {
        self.tim.cnt().read().bits() as u16
    }
}

impl<TIM: Instance> CaptureTimer for Stm32Timer<TIM> {
    #[inline(always)]
    fn width(&self) -> CounterWidth {
        CounterWidth::Bits16
    }

    #[inline(always)]
    fn clock(&self) -> Hertz {
        self.clk
    }

    #[inline(always)]
    fn prescaler(&self) -> u16 {
        self.tim.psc().read().psc().bits()
    }

    #[inline(always)]
    fn set_auto_reload(&mut self, arr: u32) {
        let arr = arr.min(u16::MAX as u32) as u16;
        self.tim.arr().write(|w| w.arr().set(arr));
    }

    #[inline(always)]
    fn enable_update_event(&mut self) {
        self.tim.cr1().modify(|_, w| w.udis().clear_bit());
    }

    fn init_capture(&mut self, mapping: InputMapping, edge: CapturePolarity) -> Result<(), Error> {
        // CC1S is only writable while the channel is off
        self.tim.ccer().modify(|_, w| w.cc1e().clear_bit());

        // No input prescaler, no filter
        self.tim.ccmr1_input().modify(|_, w| {
            match mapping {
                InputMapping::Direct => w.cc1s().ti1(),
                InputMapping::Indirect => w.cc1s().ti2(),
            };
            unsafe { w.icpsc(0).bits(0).icf(0).bits(0) }
        });
        self.tim
            .ccer()
            .modify(|_, w| w.cc1p().bit(edge == CapturePolarity::ActiveLow));

        if self.tim.ccmr1_input().read().cc1s().bits() == mapping as u8 {
            Ok(())
        } else {
            Err(Error::Io)
        }
    }

    #[inline(always)]
    fn enable_capture(&mut self, b: bool) {
        self.tim.ccer().modify(|_, w| w.cc1e().bit(b));
    }

    #[inline(always)]
    fn listen(&mut self, event: Event, b: bool) {
        self.tim.dier().modify(|r, w| unsafe {
            w.bits(if b {
                r.bits() | event.bits()
            } else {
                r.bits() & !event.bits()
            })
        });
    }

    #[inline(always)]
    fn get_interrupt_flag(&self) -> Event {
        Event::from_bits_truncate(self.tim.sr().read().bits())
    }

    #[inline(always)]
    fn clear_interrupt_flag(&mut self, event: Event) {
        // rc_w0: writing 1 leaves the other flags untouched
        self.tim.sr().write(|w| unsafe { w.bits(0xffff & !event.bits()) });
    }

    #[inline(always)]
    fn read_capture(&self) -> u32 {
        self.tim.ccr1().read().bits()
    }

    #[inline(always)]
    fn reset_counter(&mut self) {
        self.tim.cnt().reset();
    }
}
