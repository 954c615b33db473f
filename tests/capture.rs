use std::cell::RefCell;

use embedded_hal::delay::DelayNs;
use fugit::{ExtU32, RateExtU32};
use stm32f1xx_ic::capture::{
    Capture, CaptureFlags, CaptureResult, CaptureTable, Config, Error, InputCapture,
};
use stm32f1xx_ic::timer::sim::{SimInput, SimTimer};
use stm32f1xx_ic::timer::{CapturePolarity, CounterWidth};

thread_local! {
    static RESULTS: RefCell<Vec<CaptureResult>> = RefCell::new(Vec::new());
}

fn record(res: &CaptureResult, _user_data: usize) {
    RESULTS.with(|r| r.borrow_mut().push(*res));
}

fn take_results() -> Vec<CaptureResult> {
    RESULTS.with(|r| r.borrow_mut().drain(..).collect())
}

fn new_ic(skip_edges: u8) -> InputCapture<SimTimer> {
    InputCapture::new(
        SimTimer::new(CounterWidth::Bits16, 1.MHz(), 0),
        Config::default().skip_edges(skip_edges),
    )
}

/// Input and edge that a channel/polarity pair reacts to
fn stimulus(channel: u8, inverted: bool) -> (SimInput, CapturePolarity) {
    let (input, edge) = match channel {
        1 => (SimInput::Ti1, CapturePolarity::ActiveHigh),
        _ => (SimInput::Ti2, CapturePolarity::ActiveLow),
    };
    if inverted {
        (input, edge.opposite())
    } else {
        (input, edge)
    }
}

#[test]
fn sixteen_bit_counter_at_one_megahertz() {
    let ic = new_ic(0);
    ic.configure(
        1,
        CaptureFlags::TYPE_PERIOD | CaptureFlags::MODE_CONTINUOUS,
        Some(record),
        0,
    )
    .unwrap();
    ic.enable(1).unwrap();

    ic.advance(1000);
    ic.edge(SimInput::Ti1, CapturePolarity::ActiveHigh);
    ic.advance(2500);
    ic.edge(SimInput::Ti1, CapturePolarity::ActiveHigh);

    let periods: Vec<_> = take_results().iter().map(|r| r.period).collect();
    assert_eq!(periods, [1000, 2500]);
    assert_eq!(ic.cycles_to_usec(2500), Ok(2500));
}

#[test]
fn one_callback_per_reported_edge() {
    let gaps = [17u32, 1, 65_535, 480, 9_999, 2];
    for channel in [1u8, 2] {
        for inverted in [false, true] {
            for continuous in [false, true] {
                for skip in [0u8, 1, 3] {
                    let ic = new_ic(skip);
                    let mut flags = CaptureFlags::TYPE_PERIOD;
                    flags.set(CaptureFlags::POLARITY_INVERTED, inverted);
                    flags.set(CaptureFlags::MODE_CONTINUOUS, continuous);
                    ic.configure(channel, flags, Some(record), 0).unwrap();
                    ic.enable(channel).unwrap();

                    let (input, edge) = stimulus(channel, inverted);
                    for gap in gaps {
                        ic.advance(gap);
                        ic.edge(input, edge);
                        // the opposite edge never captures
                        ic.edge(input, edge.opposite());
                    }

                    let results = take_results();
                    let expected: Vec<u32> = gaps.iter().copied().skip(skip as usize).collect();
                    let expected = if continuous {
                        &expected[..]
                    } else {
                        &expected[..1]
                    };
                    assert_eq!(
                        results.iter().map(|r| r.period).collect::<Vec<_>>(),
                        expected,
                        "channel {} inverted {} continuous {} skip {}",
                        channel,
                        inverted,
                        continuous,
                        skip
                    );
                    assert!(results
                        .iter()
                        .all(|r| r.status.is_ok() && r.pulse == 0 && r.channel == channel));
                    assert_eq!(ic.is_armed(), continuous);
                }
            }
        }
    }
}

#[test]
fn lost_signal_in_continuous_mode() {
    let ic = new_ic(0);
    ic.configure(
        2,
        CaptureFlags::TYPE_PERIOD | CaptureFlags::MODE_CONTINUOUS,
        Some(record),
        0,
    )
    .unwrap();
    ic.enable(2).unwrap();

    ic.advance(100);
    ic.edge(SimInput::Ti2, CapturePolarity::ActiveLow);
    // three full counter periods without an edge
    ic.advance(3 * 0x1_0000);
    ic.advance(40);
    ic.edge(SimInput::Ti2, CapturePolarity::ActiveLow);
    ic.advance(250);
    ic.edge(SimInput::Ti2, CapturePolarity::ActiveLow);

    let results = take_results();
    let codes: Vec<_> = results.iter().map(|r| r.status_code()).collect();
    assert_eq!(codes, [0, -34, -34, -34, 0, 0]);
    assert!(results[1..4].iter().all(|r| r.period == 0xffff));
    assert_eq!(results[5].period, 250);
}

#[test]
fn busy_while_armed() {
    let ic = new_ic(0);
    ic.configure(1, CaptureFlags::TYPE_PERIOD, Some(record), 0)
        .unwrap();
    ic.enable(1).unwrap();
    assert_eq!(ic.enable(1), Err(Error::Busy));
    assert_eq!(
        ic.configure(1, CaptureFlags::TYPE_PERIOD, None, 0),
        Err(Error::Busy)
    );
    assert_eq!(Error::Busy.errno(), -16);

    ic.disable(1).unwrap();
    ic.configure(1, CaptureFlags::TYPE_PERIOD, None, 0).unwrap();
    ic.enable(1).unwrap();
}

#[test]
fn table_dispatches_to_the_right_timer() {
    let table = CaptureTable::new([new_ic(0), new_ic(0), new_ic(0)]);
    for ic in table.iter() {
        ic.configure(
            1,
            CaptureFlags::TYPE_PERIOD | CaptureFlags::MODE_CONTINUOUS,
            Some(record),
            0,
        )
        .unwrap();
        ic.enable(1).unwrap();
    }

    let ic = table.get(2).unwrap();
    ic.with_timer(|t| {
        t.tick(900);
        t.edge(SimInput::Ti1, CapturePolarity::ActiveHigh);
    });
    table.on_interrupt(0);
    table.on_interrupt(1);
    table.on_interrupt(7);
    assert!(take_results().is_empty());

    table.on_interrupt(2);
    assert_eq!(take_results()[0].period, 900);
}

struct Pulses<'a> {
    ic: &'a InputCapture<SimTimer>,
    period: u32,
    phase: u32,
}

impl DelayNs for Pulses<'_> {
    fn delay_ns(&mut self, ns: u32) {
        for _ in 0..ns / 1000 {
            self.ic.advance(1);
            self.phase += 1;
            if self.phase == self.period {
                self.phase = 0;
                self.ic.edge(SimInput::Ti1, CapturePolarity::ActiveHigh);
            }
        }
    }
}

#[test]
fn blocking_capture_after_debounce() {
    let ic = new_ic(1);
    let mut delay = Pulses {
        ic: &ic,
        period: 1250,
        phase: 0,
    };
    let c = ic
        .capture_usec(1, CaptureFlags::TYPE_PERIOD, 5.millis(), &mut delay)
        .unwrap();
    assert_eq!(
        c,
        Capture {
            period: 1250,
            pulse: 0
        }
    );
    assert!(!ic.is_armed());

    // no signal at all
    let mut delay = Pulses {
        ic: &ic,
        period: u32::MAX,
        phase: 0,
    };
    assert_eq!(
        ic.capture_cycles(1, CaptureFlags::TYPE_PERIOD, 2.millis(), &mut delay),
        Err(Error::TimedOut)
    );
    assert!(!ic.is_armed());
}
