//! Input lines: Raspberry Pi GPIO or a simulated pulse train.

use std::thread::JoinHandle;

use pulsemeter_sdk::sim::{spawn_generator, SimulatedButton, SimulatedLine};
use pulsemeter_sdk::{GpioError, PulseInput, ResetInput, ShutdownToken};
use tracing::info;

use crate::settings::{Polarity, Settings};

/// Physical header pin to BCM GPIO number, for the 40-pin header.
/// Power and ground pins have no mapping.
const BOARD_TO_BCM: &[(u8, u8)] = &[
    (3, 2),
    (5, 3),
    (7, 4),
    (8, 14),
    (10, 15),
    (11, 17),
    (12, 18),
    (13, 27),
    (15, 22),
    (16, 23),
    (18, 24),
    (19, 10),
    (21, 9),
    (22, 25),
    (23, 11),
    (24, 8),
    (26, 7),
    (27, 0),
    (28, 1),
    (29, 5),
    (31, 6),
    (32, 12),
    (33, 13),
    (35, 19),
    (36, 16),
    (37, 26),
    (38, 20),
    (40, 21),
];

/// BCM GPIO number for a physical header pin.
pub fn board_to_bcm(pin: u8) -> Option<u8> {
    BOARD_TO_BCM
        .iter()
        .find(|(board, _)| *board == pin)
        .map(|(_, bcm)| *bcm)
}

fn require_bcm(pin: u8) -> Result<u8, GpioError> {
    board_to_bcm(pin).ok_or_else(|| GpioError::Configure {
        pin,
        reason: "not a GPIO pin on the 40-pin header".to_string(),
    })
}

/// Where pulses come from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineSource {
    /// The GPIO header.
    Hardware,
    /// A synthetic pulse train at this rate in Hz.
    Simulated(f64),
}

/// The configured input lines.
///
/// Keep `reset` alive for as long as resets should be honoured: dropping it
/// releases the interrupt.
pub struct Lines {
    /// Line whose edges are counted.
    pub pulse: Box<dyn PulseInput>,
    /// Line whose falling edge zeroes the cumulative count.
    pub reset: Box<dyn ResetInput>,
    /// Pulse generator thread, only for simulated lines.
    pub generator: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Lines {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lines")
            .field("simulated", &self.generator.is_some())
            .finish()
    }
}

/// Claim and configure both input lines.
///
/// Pin numbers are validated even for simulated lines so a bad
/// configuration fails the same way on every host.
pub fn open(
    settings: &Settings,
    source: LineSource,
    shutdown: ShutdownToken,
) -> Result<Lines, GpioError> {
    let pulse_bcm = require_bcm(settings.gpio_pin)?;
    let reset_bcm = require_bcm(settings.reset_pin)?;

    match source {
        LineSource::Simulated(hz) => {
            info!(hz, "Using simulated pulse input");
            let line = SimulatedLine::new();
            let generator = spawn_generator(line.clone(), hz, shutdown);
            Ok(Lines {
                pulse: Box::new(line),
                reset: Box::new(SimulatedButton::new()),
                generator: Some(generator),
            })
        }
        LineSource::Hardware => open_hardware(settings, pulse_bcm, reset_bcm),
    }
}

#[cfg(feature = "rpi")]
fn open_hardware(settings: &Settings, pulse_bcm: u8, reset_bcm: u8) -> Result<Lines, GpioError> {
    let pulse = pi::PiPulseLine::open(settings.gpio_pin, pulse_bcm, settings.polarity)?;
    let reset = pi::PiResetLine::open(settings.reset_pin, reset_bcm)?;
    info!(
        pin = settings.gpio_pin,
        bcm = pulse_bcm,
        reset_pin = settings.reset_pin,
        polarity = ?settings.polarity,
        "GPIO configured"
    );
    Ok(Lines {
        pulse: Box::new(pulse),
        reset: Box::new(reset),
        generator: None,
    })
}

#[cfg(not(feature = "rpi"))]
fn open_hardware(settings: &Settings, _pulse_bcm: u8, _reset_bcm: u8) -> Result<Lines, GpioError> {
    Err(GpioError::Configure {
        pin: settings.gpio_pin,
        reason: "built without the `rpi` feature; use --simulate".to_string(),
    })
}

/// Trigger edge and active level for a polarity, as `(rising, active_high)`.
pub fn edge_for(polarity: Polarity) -> (bool, bool) {
    match polarity {
        Polarity::Down => (true, true),
        Polarity::Up => (false, false),
    }
}

#[cfg(feature = "rpi")]
mod pi {
    use std::time::Duration;

    use pulsemeter_sdk::{GpioError, PulseInput, ResetCallback, ResetInput, RESET_DEBOUNCE};
    use rppal::gpio::{Gpio, InputPin, Level, Trigger};

    use super::edge_for;
    use crate::settings::Polarity;

    fn configure_error(pin: u8, e: rppal::gpio::Error) -> GpioError {
        GpioError::Configure {
            pin,
            reason: e.to_string(),
        }
    }

    /// Pulse input with a kernel-latched edge interrupt.
    pub struct PiPulseLine {
        pin: InputPin,
        active: Level,
    }

    impl PiPulseLine {
        pub fn open(board: u8, bcm: u8, polarity: Polarity) -> Result<Self, GpioError> {
            let gpio = Gpio::new().map_err(|e| configure_error(board, e))?;
            let pin = gpio.get(bcm).map_err(|e| configure_error(board, e))?;
            let mut pin = match polarity {
                Polarity::Down => pin.into_input_pulldown(),
                Polarity::Up => pin.into_input_pullup(),
            };

            let (rising, active_high) = edge_for(polarity);
            let trigger = if rising {
                Trigger::RisingEdge
            } else {
                Trigger::FallingEdge
            };
            pin.set_interrupt(trigger, None)
                .map_err(|e| configure_error(board, e))?;

            Ok(Self {
                pin,
                active: if active_high { Level::High } else { Level::Low },
            })
        }
    }

    impl PulseInput for PiPulseLine {
        fn wait_for_edge(&mut self, timeout: Duration) -> Result<bool, GpioError> {
            self.pin
                .poll_interrupt(false, Some(timeout))
                .map(|event| event.is_some())
                .map_err(|e| GpioError::Line(e.to_string()))
        }

        fn is_active(&mut self) -> Result<bool, GpioError> {
            Ok(self.pin.read() == self.active)
        }

        fn clear_pending(&mut self) -> Result<(), GpioError> {
            self.pin
                .poll_interrupt(true, Some(Duration::ZERO))
                .map(|_| ())
                .map_err(|e| GpioError::Line(e.to_string()))
        }
    }

    /// Reset input; rppal runs the callback on its interrupt thread.
    pub struct PiResetLine {
        board: u8,
        pin: InputPin,
    }

    impl PiResetLine {
        pub fn open(board: u8, bcm: u8) -> Result<Self, GpioError> {
            let gpio = Gpio::new().map_err(|e| configure_error(board, e))?;
            let pin = gpio
                .get(bcm)
                .map_err(|e| configure_error(board, e))?
                .into_input_pulldown();
            Ok(Self { board, pin })
        }
    }

    impl ResetInput for PiResetLine {
        fn on_falling_edge(&mut self, mut callback: ResetCallback) -> Result<(), GpioError> {
            self.pin
                .set_async_interrupt(Trigger::FallingEdge, Some(RESET_DEBOUNCE), move |_| {
                    callback()
                })
                .map_err(|e| configure_error(self.board, e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsemeter_sdk::{EdgeCounter, PulseHandle, Shutdown, Tally};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn default_pins_map_to_bcm() {
        assert_eq!(board_to_bcm(37), Some(26));
        assert_eq!(board_to_bcm(38), Some(20));
        assert_eq!(board_to_bcm(11), Some(17));
    }

    #[test]
    fn power_and_ground_pins_are_unmapped() {
        for pin in [0, 1, 2, 4, 6, 9, 14, 17, 20, 25, 30, 34, 39, 41] {
            assert_eq!(board_to_bcm(pin), None, "pin {pin}");
        }
    }

    #[test]
    fn mapping_is_one_to_one() {
        let mut bcm: Vec<u8> = BOARD_TO_BCM.iter().map(|(_, b)| *b).collect();
        bcm.sort_unstable();
        bcm.dedup();
        assert_eq!(bcm.len(), BOARD_TO_BCM.len());
        assert_eq!(bcm, (0..=27).collect::<Vec<u8>>());
    }

    #[test]
    fn polarity_selects_edge_and_level() {
        assert_eq!(edge_for(Polarity::Down), (true, true));
        assert_eq!(edge_for(Polarity::Up), (false, false));
    }

    #[test]
    fn unmapped_pin_fails_even_when_simulated() {
        let settings = Settings {
            gpio_pin: 1,
            ..Settings::default()
        };
        let shutdown = Shutdown::new();

        let err = open(&settings, LineSource::Simulated(10.0), shutdown.token()).unwrap_err();
        assert!(matches!(err, GpioError::Configure { pin: 1, .. }));
    }

    #[test]
    fn simulated_lines_produce_pulses() {
        let settings = Settings::default();
        let shutdown = Shutdown::new();

        let mut lines = open(&settings, LineSource::Simulated(100.0), shutdown.token()).unwrap();
        assert!(lines.pulse.wait_for_edge(Duration::from_secs(1)).unwrap());

        shutdown.trigger();
        lines.generator.take().unwrap().join().unwrap();
    }

    #[test]
    fn simulated_pulses_pass_the_default_debounce() {
        let settings = Settings::default();
        let shutdown = Shutdown::new();
        let handle = PulseHandle::new(Arc::new(Tally::default()));

        let mut lines = open(&settings, LineSource::Simulated(2.0), shutdown.token()).unwrap();
        let counter = EdgeCounter::new(handle.clone(), settings.debounce);
        let token = shutdown.token();
        let mut pulse = lines.pulse;
        let worker = std::thread::spawn(move || counter.run(pulse.as_mut(), &token));

        std::thread::sleep(Duration::from_millis(1200));
        shutdown.trigger();
        worker.join().unwrap().unwrap();
        lines.generator.take().unwrap().join().unwrap();

        assert!(handle.cumulative() > 0);
    }

    #[cfg(not(feature = "rpi"))]
    #[test]
    fn hardware_needs_the_rpi_feature() {
        let shutdown = Shutdown::new();
        let err = open(&Settings::default(), LineSource::Hardware, shutdown.token()).unwrap_err();
        assert!(matches!(err, GpioError::Configure { pin: 37, .. }));
    }
}
