use super::InputCapture;
use crate::timer::CaptureTimer;

/// Capture engines of several timers, indexed like their interrupt vectors.
///
/// The table is never reallocated: it lives in a `static` shared between the interrupt
/// handlers and the application, and each engine gets its timer at startup.
///
/// ```rust
/// use fugit::RateExtU32;
/// use stm32f1xx_ic::capture::{CaptureTable, Config, InputCapture};
/// use stm32f1xx_ic::timer::{sim::SimTimer, CounterWidth};
///
/// static CAPTURES: CaptureTable<SimTimer, 2> = CaptureTable::new([
///     InputCapture::uninit(Config::new()),
///     InputCapture::uninit(Config::new().skip_edges(1)),
/// ]);
///
/// // Interrupt handler of the second timer
/// fn tim3() {
///     CAPTURES.on_interrupt(1);
/// }
///
/// for ic in CAPTURES.iter() {
///     ic.init(SimTimer::new(CounterWidth::Bits16, 8.MHz(), 7)).unwrap();
/// }
/// tim3();
/// assert_eq!(CAPTURES.get(1).unwrap().cycles_per_second(), 1_000_000);
/// ```
pub struct CaptureTable<TIM, const N: usize> {
    instances: [InputCapture<TIM>; N],
}

impl<TIM, const N: usize> CaptureTable<TIM, N> {
    pub const fn new(instances: [InputCapture<TIM>; N]) -> Self {
        Self { instances }
    }
}

impl<TIM: CaptureTimer, const N: usize> CaptureTable<TIM, N> {
    pub fn get(&self, index: usize) -> Option<&InputCapture<TIM>> {
        self.instances.get(index)
    }

    /// Routes an interrupt to engine `index`. Unknown indices are ignored.
    pub fn on_interrupt(&self, index: usize) {
        match self.get(index) {
            Some(ic) => ic.on_interrupt(),
            None => warn!("interrupt for unknown capture instance {=usize}", index),
        }
    }

    pub fn iter(&self) -> core::slice::Iter<'_, InputCapture<TIM>> {
        self.instances.iter()
    }

    pub const fn len(&self) -> usize {
        N
    }

    pub const fn is_empty(&self) -> bool {
        N == 0
    }
}
