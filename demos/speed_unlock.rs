//! Halves the frequency of a speed sensor signal.
//!
//! The input period is captured continuously and a PWM output is driven at twice that period,
//! with a 3/4 duty cycle. When the signal is lost the output is stopped.
//!
//! The timer and the sensor are simulated: the sensor period sweeps from 4 ms up, then the
//! signal disappears.

use core::sync::atomic::{AtomicU32, Ordering};

use fugit::RateExtU32;
use stm32f1xx_ic::{
    capture::{CaptureFlags, CaptureResult, Config, InputCapture, Timebase},
    timer::{
        sim::{SimInput, SimTimer},
        CapturePolarity, CounterWidth,
    },
};

/// Output period in microseconds, 0 when stopped
static OUT_PERIOD: AtomicU32 = AtomicU32::new(0);
static OUT_PULSE: AtomicU32 = AtomicU32::new(0);

// 72 MHz / 7200, one tick every 100 us
const TIMEBASE: Timebase = Timebase::new(fugit::HertzU32::from_raw(72_000_000), 7199);

fn set_output(period: u32, pulse: u32) {
    OUT_PERIOD.store(period, Ordering::Relaxed);
    OUT_PULSE.store(pulse, Ordering::Relaxed);
}

fn on_capture(res: &CaptureResult, _user_data: usize) {
    if res.status.is_err() {
        println!("Overflow ({})", res.status_code());
        set_output(0, 0);
        return;
    }

    let period = TIMEBASE.ticks_to_micros(res.period as u64);
    let pulse = TIMEBASE.ticks_to_micros(3 * res.period as u64 / 4);
    match (period, pulse) {
        (Ok(period), Ok(pulse)) => {
            // Divide speed by 2
            let (period, pulse) = (period * 2, pulse * 2);
            println!("{}/{} ms", res.period, period / 1000);
            set_output(period as u32, pulse as u32);
        }
        _ => set_output(0, 0),
    }
}

fn main() {
    println!("speed unlock");

    let tim = SimTimer::new(CounterWidth::Bits16, 72.MHz(), 7199);
    let ic = InputCapture::new(tim, Config::default().skip_edges(1));
    assert_eq!(ic.timebase(), TIMEBASE);

    if ic
        .configure(
            1,
            CaptureFlags::MODE_CONTINUOUS | CaptureFlags::TYPE_PERIOD,
            Some(on_capture),
            0,
        )
        .is_err()
    {
        println!("Failed to configure capture");
        return;
    }
    if ic.enable(1).is_err() {
        println!("Failed to enable capture");
        return;
    }

    for i in 1..=5u32 {
        // sensor period of 4 * i ms, in 100 us ticks
        let period = 40 * i;
        println!("Set {} msec", 4 * i);
        for _ in 0..3 {
            ic.advance(period);
            ic.edge(SimInput::Ti1, CapturePolarity::ActiveHigh);
        }
        println!(
            "  output: {} us period, {} us pulse",
            OUT_PERIOD.load(Ordering::Relaxed),
            OUT_PULSE.load(Ordering::Relaxed)
        );
    }

    // Sensor unplugged
    ic.advance(0x1_0000);
    println!("  output: {} us period", OUT_PERIOD.load(Ordering::Relaxed));

    if ic.disable(1).is_err() {
        println!("Failed to disable capture");
    }
}
