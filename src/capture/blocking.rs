//! Blocking single-shot capture

use embedded_hal::delay::DelayNs;
use fugit::MicrosDurationU32;

use super::engine::Sink;
use super::{CaptureFlags, CaptureMode, Error, InputCapture};
use crate::timer::CaptureTimer;

/// A measured period and pulse width
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Capture<T = u32> {
    pub period: T,
    /// Always 0, pulse width is not measured
    pub pulse: T,
}

impl<TIM: CaptureTimer> InputCapture<TIM> {
    /// Measures one period on `channel`, in timer ticks.
    ///
    /// Suspends through `delay` between polls, so it must not be called from an interrupt.
    /// Capture is disabled again on every return path.
    ///
    /// The mailbox is polled every `poll_interval` of the [`Config`], so `delay` should put
    /// the core or the task to sleep (an RTOS delay, or a timer delay that waits with `wfi`).
    /// A busy-wait delay keeps the core spinning until the capture completes or `timeout`
    /// expires.
    ///
    /// [`Config`]: super::Config
    pub fn capture_cycles(
        &self,
        channel: u8,
        flags: CaptureFlags,
        timeout: MicrosDurationU32,
        delay: &mut impl DelayNs,
    ) -> Result<Capture, Error> {
        if flags.mode() == CaptureMode::Continuous {
            error!("continuous capture needs a callback");
            return Err(Error::Unsupported);
        }

        self.configure_sink(channel, flags, Sink::Mailbox)?;
        self.clear_mailbox();
        self.enable(channel)?;

        let res = self.wait(timeout, delay);

        self.disable(channel)?;
        self.clear_mailbox();
        res
    }

    /// Like [`capture_cycles`](Self::capture_cycles), converted to microseconds
    pub fn capture_usec(
        &self,
        channel: u8,
        flags: CaptureFlags,
        timeout: MicrosDurationU32,
        delay: &mut impl DelayNs,
    ) -> Result<Capture<u64>, Error> {
        let c = self.capture_cycles(channel, flags, timeout, delay)?;
        Ok(Capture {
            period: self.cycles_to_usec(c.period)?,
            pulse: self.cycles_to_usec(c.pulse)?,
        })
    }

    /// Like [`capture_cycles`](Self::capture_cycles), converted to nanoseconds
    pub fn capture_nsec(
        &self,
        channel: u8,
        flags: CaptureFlags,
        timeout: MicrosDurationU32,
        delay: &mut impl DelayNs,
    ) -> Result<Capture<u64>, Error> {
        let c = self.capture_cycles(channel, flags, timeout, delay)?;
        Ok(Capture {
            period: self.cycles_to_nsec(c.period)?,
            pulse: self.cycles_to_nsec(c.pulse)?,
        })
    }

    fn wait(&self, timeout: MicrosDurationU32, delay: &mut impl DelayNs) -> Result<Capture, Error> {
        let step = self.config.poll_interval.ticks().max(1);
        let mut waited = 0u32;
        loop {
            match self.poll_mailbox() {
                Ok(c) => return Ok(c),
                Err(nb::Error::Other(e)) => return Err(e),
                Err(nb::Error::WouldBlock) => {}
            }
            if waited >= timeout.ticks() {
                warn!("no capture within {=u32} us", timeout.ticks());
                return Err(Error::TimedOut);
            }
            delay.delay_us(step);
            waited = waited.saturating_add(step);
        }
    }

    fn poll_mailbox(&self) -> nb::Result<Capture, Error> {
        let res = critical_section::with(|cs| self.mailbox.borrow(cs).take())
            .ok_or(nb::Error::WouldBlock)?;
        res.status.map_err(nb::Error::Other)?;
        Ok(Capture {
            period: res.period,
            pulse: res.pulse,
        })
    }

    fn clear_mailbox(&self) {
        critical_section::with(|cs| self.mailbox.borrow(cs).set(None));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Config;
    use crate::timer::sim::{SimInput, SimTimer};
    use crate::timer::{CapturePolarity, CounterWidth, Event};
    use fugit::{ExtU32, RateExtU32};

    /// Delay that lets a square wave run on the simulated timer, 1 tick per microsecond
    struct Signal<'a> {
        ic: &'a InputCapture<SimTimer>,
        period: Option<u32>,
        now: u32,
        next_edge: u32,
    }

    impl<'a> Signal<'a> {
        fn new(ic: &'a InputCapture<SimTimer>, first_edge: u32, period: Option<u32>) -> Self {
            Self {
                ic,
                period,
                now: 0,
                next_edge: first_edge,
            }
        }
    }

    impl DelayNs for Signal<'_> {
        fn delay_ns(&mut self, ns: u32) {
            let end = self.now + ns / 1000;
            while let Some(p) = self.period.filter(|_| self.next_edge <= end) {
                self.ic.advance(self.next_edge - self.now);
                self.ic.edge(SimInput::Ti1, CapturePolarity::ActiveHigh);
                self.now = self.next_edge;
                self.next_edge += p;
            }
            self.ic.advance(end - self.now);
            self.now = end;
        }
    }

    fn ic() -> InputCapture<SimTimer> {
        InputCapture::new(
            SimTimer::new(CounterWidth::Bits16, 1.MHz(), 0),
            Config::default().poll_interval(50.micros()),
        )
    }

    fn assert_idle(ic: &InputCapture<SimTimer>) {
        assert!(!ic.is_armed());
        ic.with_timer(|t| {
            assert!(t.listening().is_empty());
            assert!(!t.is_capture_enabled());
        });
    }

    #[test]
    fn measures_one_period() {
        let ic = ic();
        let mut signal = Signal::new(&ic, 130, Some(2500));
        let c = ic
            .capture_cycles(1, CaptureFlags::TYPE_PERIOD, 10.millis(), &mut signal)
            .unwrap();
        // measured from enable, the phase of the first edge is unknown
        assert_eq!(c, Capture { period: 130, pulse: 0 });
        assert_idle(&ic);
    }

    #[test]
    fn skipped_edge_gives_a_full_period() {
        let ic = InputCapture::new(
            SimTimer::new(CounterWidth::Bits16, 1.MHz(), 0),
            Config::default().skip_edges(1).poll_interval(50.micros()),
        );
        let mut signal = Signal::new(&ic, 130, Some(2500));
        let c = ic
            .capture_usec(1, CaptureFlags::TYPE_PERIOD, 10.millis(), &mut signal)
            .unwrap();
        assert_eq!(c, Capture { period: 2500, pulse: 0 });
    }

    #[test]
    fn times_out_without_signal() {
        let ic = ic();
        let mut signal = Signal::new(&ic, 0, None);
        assert_eq!(
            ic.capture_cycles(1, CaptureFlags::TYPE_PERIOD, 1000.micros(), &mut signal),
            Err(Error::TimedOut)
        );
        assert!(signal.now >= 1000);
        assert!(signal.now < 1100);
        assert_idle(&ic);

        // nothing shows up later
        ic.advance(0x2_0000);
        assert!(matches!(ic.poll_mailbox(), Err(nb::Error::WouldBlock)));
    }

    #[test]
    fn zero_timeout_polls_once() {
        let ic = ic();
        let mut signal = Signal::new(&ic, 0, None);
        assert_eq!(
            ic.capture_cycles(1, CaptureFlags::TYPE_PERIOD, 0.micros(), &mut signal),
            Err(Error::TimedOut)
        );
        assert_eq!(signal.now, 0);
    }

    #[test]
    fn overflow_is_a_range_error() {
        let ic = ic();
        let mut signal = Signal::new(&ic, 0, None);
        assert_eq!(
            ic.capture_cycles(1, CaptureFlags::TYPE_PERIOD, 1.secs(), &mut signal),
            Err(Error::Range)
        );
        assert!(signal.now >= 0x1_0000);
        assert!(signal.now < 0x2_0000);
        assert_idle(&ic);
    }

    #[test]
    fn continuous_mode_is_rejected() {
        let ic = ic();
        let mut signal = Signal::new(&ic, 10, Some(10));
        assert_eq!(
            ic.capture_cycles(
                1,
                CaptureFlags::TYPE_PERIOD | CaptureFlags::MODE_CONTINUOUS,
                1.millis(),
                &mut signal
            ),
            Err(Error::Unsupported)
        );
        assert_eq!(signal.now, 0);
    }

    #[test]
    fn configuration_errors_are_returned_before_waiting() {
        let ic = ic();
        let mut signal = Signal::new(&ic, 10, Some(10));
        assert_eq!(
            ic.capture_cycles(3, CaptureFlags::TYPE_PERIOD, 1.millis(), &mut signal),
            Err(Error::Unsupported)
        );
        assert_eq!(
            ic.capture_cycles(1, CaptureFlags::TYPE_PULSE, 1.millis(), &mut signal),
            Err(Error::InvalidArgument)
        );

        ic.configure(1, CaptureFlags::TYPE_PERIOD | CaptureFlags::MODE_CONTINUOUS, None, 0)
            .unwrap();
        ic.enable(1).unwrap();
        assert_eq!(
            ic.capture_cycles(1, CaptureFlags::TYPE_PERIOD, 1.millis(), &mut signal),
            Err(Error::Busy)
        );
        assert_eq!(signal.now, 0);
        assert!(ic.is_armed());
    }

    #[test]
    fn converts_to_time_units() {
        let ic = InputCapture::new(
            SimTimer::new(CounterWidth::Bits16, 2.MHz(), 1),
            Config::default().poll_interval(50.micros()),
        );
        let mut signal = Signal::new(&ic, 777, Some(1000));
        let c = ic
            .capture_nsec(1, CaptureFlags::TYPE_PERIOD, 5.millis(), &mut signal)
            .unwrap();
        assert_eq!(c.period, 777_000);
        assert_eq!(c.pulse, 0);
    }

    /// Records every pause instead of letting time pass
    #[derive(Default)]
    struct Sleeps(Vec<u32>);

    impl DelayNs for Sleeps {
        fn delay_ns(&mut self, ns: u32) {
            self.0.push(ns);
        }
    }

    #[test]
    fn every_pause_goes_through_the_delay() {
        let ic = ic();
        let mut sleeps = Sleeps::default();
        assert_eq!(
            ic.capture_cycles(1, CaptureFlags::TYPE_PERIOD, 200.micros(), &mut sleeps),
            Err(Error::TimedOut)
        );
        assert_eq!(sleeps.0, [50_000; 4]);
        assert_idle(&ic);
    }

    #[test]
    fn stale_flags_do_not_leak_into_a_new_capture() {
        let ic = ic();
        ic.with_timer(|t| {
            t.enable_update_event();
            t.tick(0x1_0000);
            assert!(t.get_interrupt_flag().contains(Event::Update));
        });
        let mut signal = Signal::new(&ic, 400, Some(400));
        let c = ic
            .capture_cycles(1, CaptureFlags::TYPE_PERIOD, 1.millis(), &mut signal)
            .unwrap();
        assert_eq!(c.period, 400);
    }
}
