//! # Timer input capture for the STM32F1 family of microcontrollers
//!
//! Measures the period of an external signal with a free running general purpose timer,
//! either continuously with a callback invoked from the timer interrupt, or once with a
//! blocking call that gives up after a timeout.
//!
//! The engine is generic over a [`timer::CaptureTimer`] backend. Select the microcontroller
//! with the corresponding feature to get the register-level backend for its timers:
//!
//! - stm32f100
//! - stm32f101
//! - stm32f103
//! - stm32f105
//! - stm32f107
//!
//! ```toml
//! [dependencies.stm32f1xx-ic]
//! version = "0.1.0"
//! features = ["stm32f103", "medium"]
//! ```
//!
//! Without a chip feature only the simulated backend, [`timer::sim::SimTimer`], is built,
//! which is enough to run the engine on a host.
//!
//! ## Usage example
//!
//! ```rust
//! use fugit::RateExtU32;
//! use stm32f1xx_ic::{
//!     capture::{CaptureFlags, CaptureResult, Config, InputCapture},
//!     timer::{sim::{SimInput, SimTimer}, CapturePolarity, CounterWidth},
//! };
//!
//! fn on_capture(res: &CaptureResult, _user_data: usize) {
//!     assert_eq!(res.status, Ok(()));
//!     assert_eq!(res.period, 2500);
//! }
//!
//! let tim = SimTimer::new(CounterWidth::Bits16, 8.MHz(), 7);
//! let ic = InputCapture::new(tim, Config::default());
//! ic.configure(1, CaptureFlags::TYPE_PERIOD, Some(on_capture), 0).unwrap();
//! ic.enable(1).unwrap();
//!
//! ic.advance(2500);
//! ic.edge(SimInput::Ti1, CapturePolarity::ActiveHigh);
//! assert!(!ic.is_armed());
//! assert_eq!(ic.cycles_to_usec(2500), Ok(2500));
//! ```
//!
//! # More examples
//!
//! See the `demos` folder.

#![cfg_attr(not(test), no_std)]

// This mod MUST go first, so that the others see its macros.
#[macro_use]
mod fmt;

#[cfg(feature = "stm32f100")]
pub use stm32f1::stm32f100 as pac;

#[cfg(feature = "stm32f101")]
pub use stm32f1::stm32f101 as pac;

#[cfg(feature = "stm32f103")]
pub use stm32f1::stm32f103 as pac;

#[cfg(any(feature = "stm32f105", feature = "stm32f107"))]
pub use stm32f1::stm32f107 as pac;

pub mod capture;
pub mod timer;
