use core::cell::{Cell, RefCell};

use critical_section::Mutex;

use super::{
    CaptureCallback, CaptureFlags, CaptureMode, CaptureResult, CaptureType, Config, Error,
    Polarity, Timebase,
};
use crate::timer::{CaptureTimer, CapturePolarity, CounterWidth, Event, InputMapping};
use fugit::HertzU32 as Hertz;

/// Where the results of a session go
#[derive(Clone, Copy)]
pub(super) enum Sink {
    Discard,
    Callback(CaptureCallback, usize),
    /// Single-slot mailbox read by the blocking wrapper
    Mailbox,
}

struct Session {
    channel: u8,
    sink: Sink,
    mode: CaptureMode,
    armed: bool,
    overflows: u32,
    skip_edges: u8,
    last_period: u32,
}

struct Inner<TIM> {
    tim: Option<TIM>,
    width: CounterWidth,
    timebase: Timebase,
    session: Option<Session>,
}

type Pending = [Option<(Sink, CaptureResult)>; 2];

/// Comparator routing and edge for `channel`.
///
/// The pair shares one comparator: channel 2's input (TI2) is routed to CC1 through the
/// indirect mapping, and captured on the opposite edge.
pub(crate) fn routing(channel: u8, polarity: Polarity) -> (InputMapping, CapturePolarity) {
    let (mapping, edge) = if channel == 1 {
        (InputMapping::Direct, CapturePolarity::ActiveHigh)
    } else {
        (InputMapping::Indirect, CapturePolarity::ActiveLow)
    };
    match polarity {
        Polarity::Normal => (mapping, edge),
        Polarity::Inverted => (mapping, edge.opposite()),
    }
}

fn check_pair(channel: u8) -> Result<(), Error> {
    if channel == 1 || channel == 2 {
        Ok(())
    } else {
        error!("capture only supported on the first two channels");
        Err(Error::InvalidArgument)
    }
}

fn disarm<TIM: CaptureTimer>(tim: &mut TIM, session: &mut Session) {
    tim.listen(Event::C1 | Event::Update, false);
    tim.enable_capture(false);
    session.armed = false;
}

impl<TIM: CaptureTimer> Inner<TIM> {
    fn install(&mut self, tim: TIM) {
        // Frozen for the lifetime of the engine
        self.width = tim.width();
        self.timebase = Timebase::new(tim.clock(), tim.prescaler());
        self.tim = Some(tim);
    }

    fn is_armed(&self) -> bool {
        self.session.as_ref().map_or(false, |s| s.armed)
    }

    fn service(&mut self) -> Pending {
        let mut pending: Pending = [None, None];
        let Self {
            tim,
            width,
            session,
            ..
        } = self;
        let tim = match tim {
            Some(tim) => tim,
            None => return pending,
        };
        let flags = tim.get_interrupt_flag() & (Event::Update | Event::C1);

        let session = match session {
            Some(s) if s.armed => s,
            _ => {
                tim.clear_interrupt_flag(flags);
                return pending;
            }
        };

        if session.skip_edges > 0 {
            tim.clear_interrupt_flag(flags);
            if flags.contains(Event::C1) {
                session.skip_edges -= 1;
                // The next period is measured from this edge
                tim.reset_counter();
                trace!("capture skipped, {=u8} left", session.skip_edges);
            }
            return pending;
        }

        if flags.contains(Event::Update) {
            tim.clear_interrupt_flag(Event::Update);
            session.overflows = session.overflows.saturating_add(1);
            warn!("counter overflow during capture ({=u32})", session.overflows);
            pending[0] = Some((
                session.sink,
                CaptureResult {
                    channel: session.channel,
                    period: width.max_ticks(),
                    pulse: 0,
                    status: Err(Error::Range),
                },
            ));
        }

        if flags.contains(Event::C1) {
            tim.clear_interrupt_flag(Event::C1);
            session.last_period = tim.read_capture();
            match session.mode {
                CaptureMode::Single => disarm(tim, session),
                CaptureMode::Continuous => session.overflows = 0,
            }
            // The counter is not reset by the capture, restart the reference here
            tim.reset_counter();
            trace!("captured {=u32} ticks", session.last_period);
            pending[1] = Some((
                session.sink,
                CaptureResult {
                    channel: session.channel,
                    period: session.last_period,
                    pulse: 0,
                    status: Ok(()),
                },
            ));
        }

        pending
    }
}

/// Input capture engine for one timer.
///
/// Either built around a running timer with [`new`](Self::new), or created empty in a `static`
/// with [`uninit`](Self::uninit) and handed its timer at startup with [`init`](Self::init):
///
/// ```rust
/// use fugit::RateExtU32;
/// use stm32f1xx_ic::capture::{Config, InputCapture};
/// use stm32f1xx_ic::timer::{sim::SimTimer, CounterWidth};
///
/// static IC: InputCapture<SimTimer> = InputCapture::uninit(Config::new());
///
/// // Timer interrupt handler
/// fn tim2() {
///     IC.on_interrupt();
/// }
///
/// IC.init(SimTimer::new(CounterWidth::Bits16, 1.MHz(), 0)).unwrap();
/// assert_eq!(IC.cycles_per_second(), 1_000_000);
/// tim2();
/// ```
pub struct InputCapture<TIM> {
    inner: Mutex<RefCell<Inner<TIM>>>,
    pub(super) mailbox: Mutex<Cell<Option<CaptureResult>>>,
    pub(super) config: Config,
}

impl<TIM> InputCapture<TIM> {
    /// Engine without timer, every operation fails until [`init`](Self::init)
    pub const fn uninit(config: Config) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Inner {
                tim: None,
                width: CounterWidth::Bits16,
                timebase: Timebase::new(Hertz::from_raw(0), 0),
                session: None,
            })),
            mailbox: Mutex::new(Cell::new(None)),
            config,
        }
    }
}

impl<TIM: CaptureTimer> InputCapture<TIM> {
    /// Takes over an initialized timer whose counter is already running
    pub fn new(tim: TIM, config: Config) -> Self {
        let ic = Self::uninit(config);
        critical_section::with(|cs| ic.inner.borrow_ref_mut(cs).install(tim));
        ic
    }

    /// Hands the timer to an engine created with [`uninit`](Self::uninit).
    ///
    /// Fails with [`Error::Busy`] if the engine already has one.
    pub fn init(&self, tim: TIM) -> Result<(), Error> {
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            if inner.tim.is_some() {
                error!("capture timer already initialized");
                return Err(Error::Busy);
            }
            inner.install(tim);
            Ok(())
        })
    }

    /// Prepares a capture on `channel` without arming it.
    ///
    /// `callback` receives every result together with `user_data`. Passing `None` keeps the
    /// hardware configured but discards the results.
    pub fn configure(
        &self,
        channel: u8,
        flags: CaptureFlags,
        callback: Option<CaptureCallback>,
        user_data: usize,
    ) -> Result<(), Error> {
        let sink = match callback {
            Some(cb) => Sink::Callback(cb, user_data),
            None => Sink::Discard,
        };
        self.configure_sink(channel, flags, sink)
    }

    pub(super) fn configure_sink(
        &self,
        channel: u8,
        flags: CaptureFlags,
        sink: Sink,
    ) -> Result<(), Error> {
        match channel {
            1 | 2 => {}
            0 => {
                error!("no capture channel 0");
                return Err(Error::InvalidArgument);
            }
            _ => {
                error!("capture only supported on the first channel pair");
                return Err(Error::Unsupported);
            }
        }

        critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            let max_ticks = inner.width.max_ticks();
            let Inner { tim, session, .. } = &mut *inner;
            let tim = match tim {
                Some(tim) => tim,
                None => {
                    error!("capture timer not initialized");
                    return Err(Error::InvalidArgument);
                }
            };
            if session.as_ref().map_or(false, |s| s.armed) {
                error!("capture already in progress");
                return Err(Error::Busy);
            }
            match flags.capture_type() {
                Some(CaptureType::Period) => {}
                Some(CaptureType::Both) => {
                    error!("pulse width capture is not supported");
                    return Err(Error::Unsupported);
                }
                Some(CaptureType::Pulse) | None => {
                    error!("only period capture is supported");
                    return Err(Error::InvalidArgument);
                }
            }

            let (mapping, edge) = routing(channel, flags.polarity());
            if let Err(e) = tim.init_capture(mapping, edge) {
                error!("could not initialize channel for capture");
                *session = None;
                return Err(e);
            }
            tim.set_auto_reload(max_ticks);
            tim.enable_update_event();
            *session = Some(Session {
                channel,
                sink,
                mode: flags.mode(),
                armed: false,
                overflows: 0,
                skip_edges: 0,
                last_period: 0,
            });
            Ok(())
        })
    }

    /// Arms the capture configured on `channel`
    pub fn enable(&self, channel: u8) -> Result<(), Error> {
        check_pair(channel)?;
        let skip_edges = self.config.skip_edges;
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            let Inner { tim, session, .. } = &mut *inner;
            let (tim, session) = match (tim, session) {
                (Some(tim), Some(s)) if s.channel == channel => (tim, s),
                _ => {
                    error!("capture not configured");
                    return Err(Error::InvalidArgument);
                }
            };
            if session.armed {
                error!("capture already active");
                return Err(Error::Busy);
            }

            session.skip_edges = skip_edges;
            session.overflows = 0;
            tim.clear_interrupt_flag(Event::C1 | Event::Update);
            tim.reset_counter();
            tim.enable_capture(true);
            tim.listen(Event::C1 | Event::Update, true);
            session.armed = true;
            debug!("capture armed on channel {=u8}", channel);
            Ok(())
        })
    }

    /// Disarms the capture of the channel pair. Does nothing if it is not armed.
    ///
    /// Both channels share the comparator, so `channel` may be either of them. A callback
    /// already running is not interrupted, but none is started afterwards.
    pub fn disable(&self, channel: u8) -> Result<(), Error> {
        check_pair(channel)?;
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow_ref_mut(cs);
            let Inner { tim, session, .. } = &mut *inner;
            if let (Some(tim), Some(session)) = (tim, session) {
                if session.armed {
                    disarm(tim, session);
                    debug!("capture disarmed on channel {=u8}", session.channel);
                }
            }
        });
        Ok(())
    }

    /// Timer interrupt entry point.
    ///
    /// An overflow pending together with a capture is reported first. Results are handed to
    /// the session's sink once the engine state is released, in event order.
    pub fn on_interrupt(&self) {
        let pending = critical_section::with(|cs| self.inner.borrow_ref_mut(cs).service());
        for (sink, res) in pending.into_iter().flatten() {
            self.deliver(sink, &res);
        }
    }

    fn deliver(&self, sink: Sink, res: &CaptureResult) {
        match sink {
            Sink::Discard => {}
            Sink::Callback(cb, user_data) => cb(res, user_data),
            Sink::Mailbox => critical_section::with(|cs| {
                let slot = self.mailbox.borrow(cs);
                // Keep the first unread result
                if slot.get().is_none() {
                    slot.set(Some(*res));
                }
            }),
        }
    }

    pub fn is_armed(&self) -> bool {
        critical_section::with(|cs| self.inner.borrow_ref(cs).is_armed())
    }

    pub fn counter_width(&self) -> CounterWidth {
        critical_section::with(|cs| self.inner.borrow_ref(cs).width)
    }

    /// Tick rate of the timer, 0 Hz until initialized
    pub fn timebase(&self) -> Timebase {
        critical_section::with(|cs| self.inner.borrow_ref(cs).timebase)
    }

    /// Frequency of the counter increment
    pub fn cycles_per_second(&self) -> u64 {
        self.timebase().cycles_per_second()
    }

    pub fn cycles_to_usec(&self, cycles: u32) -> Result<u64, Error> {
        self.timebase().ticks_to_micros(cycles as u64)
    }

    pub fn cycles_to_nsec(&self, cycles: u32) -> Result<u64, Error> {
        self.timebase().ticks_to_nanos(cycles as u64)
    }

    /// Runs `f` with exclusive access to the timer backend, `None` if not initialized.
    ///
    /// `f` must not call back into this `InputCapture`.
    pub fn with_timer<R>(&self, f: impl FnOnce(&mut TIM) -> R) -> Option<R> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).tim.as_mut().map(f))
    }
}
