//! Board exporter: device lifecycle, pin initialization and the poll loop.
//!
//! One [`Exporter`] owns one configured board for the lifetime of the
//! process. `run` locates and opens the device, programs every configured
//! pin to digital input, then samples the pins on a fixed cadence until a
//! stop is requested. Device discovery is a one-shot startup check: a
//! missing or unopenable board is a configuration error, never retried.

pub mod pins;
pub mod protocol;

use prometheus::{IntGauge, Registry};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::DeviceConfig;
use crate::error::{Error, Result};
use crate::metrics;
use crate::tracing::prelude::*;
use crate::transport::{usb, Transport};
use self::protocol::ProtocolError;

/// Bound on waiting for a running exporter to acknowledge a stop request.
const STOP_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolved runtime state for one pin, created by [`initialize_pins`] and
/// owned by the poll loop.
#[derive(Debug)]
struct PinState {
    name: String,
    port: u8,
    pin: u8,
    revert: bool,
    gauge: IntGauge,
}

/// Result of one interruptible inter-sweep wait.
#[derive(Debug, PartialEq, Eq)]
enum Wait {
    /// The full interval passed.
    Elapsed,
    /// A stop request arrived during the wait.
    Stopped,
}

/// Sleep for `interval`, returning early if `stop` fires.
///
/// This is the only point where the poll loop observes a stop request; an
/// in-flight register round-trip is never interrupted.
async fn wait_or_stop(stop: &CancellationToken, interval: Duration) -> Wait {
    tokio::select! {
        _ = stop.cancelled() => Wait::Stopped,
        _ = tokio::time::sleep(interval) => Wait::Elapsed,
    }
}

pub struct Exporter {
    cfg: DeviceConfig,
    registry: Registry,
    stop: CancellationToken,
    stopped: CancellationToken,
}

/// Handle for requesting and awaiting an exporter's termination.
///
/// Consuming `stop` makes the request one-shot by construction.
pub struct StopHandle {
    bus: u8,
    device: u8,
    stop: CancellationToken,
    stopped: CancellationToken,
}

impl StopHandle {
    /// Ask the exporter to stop and wait (bounded) for it to wind down.
    ///
    /// A timeout is logged and otherwise ignored so process exit is never
    /// held hostage by a wedged device.
    pub async fn stop(self) {
        self.stop.cancel();
        if tokio::time::timeout(STOP_TIMEOUT, self.stopped.cancelled())
            .await
            .is_err()
        {
            warn!(bus = self.bus, device = self.device, "timeout on stop");
        }
    }
}

impl Exporter {
    pub fn new(cfg: DeviceConfig, registry: Registry) -> Self {
        Self {
            cfg,
            registry,
            stop: CancellationToken::new(),
            stopped: CancellationToken::new(),
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            bus: self.cfg.bus,
            device: self.cfg.device,
            stop: self.stop.clone(),
            stopped: self.stopped.clone(),
        }
    }

    /// Run the exporter to completion.
    ///
    /// Returns `Ok(())` only when termination was externally requested; any
    /// other return carries the error that ended the board's run. The
    /// transport is released on every exit path.
    pub async fn run(self) -> Result<()> {
        // Acknowledges the stop to a pending `StopHandle::stop`, on every
        // exit path including errors.
        let _stopped = self.stopped.clone().drop_guard();

        let selector = self.cfg.selector();
        debug!(
            bus = selector.bus,
            device = selector.device,
            "searching for ioboard"
        );

        let mut board = tokio::task::spawn_blocking(move || {
            match usb::find(&selector).map_err(Error::DeviceOpen)? {
                Some(device) => usb::open(&device).map_err(Error::DeviceOpen),
                None => Err(Error::DeviceNotFound {
                    bus: selector.bus,
                    device: selector.device,
                }),
            }
        })
        .await
        .map_err(|err| Error::DeviceOpen(err.into()))??;

        info!(
            bus = board.bus(),
            device = board.address(),
            "ioboard opened"
        );

        let pin_states = initialize_pins(&mut board, &self.cfg, &self.registry).await?;
        info!(pins = pin_states.len(), "board initialized");

        run_loop(
            &mut board,
            &pin_states,
            self.cfg.poll_interval(),
            &self.stop,
        )
        .await;
        debug!("stop requested, exporter exiting");
        Ok(())
    }
}

/// Program every configured pin and register its gauge, in declared order.
///
/// Nothing is rolled back on failure: a board that fails any step here is
/// unusable and its exporter terminates with the triggering error.
async fn initialize_pins<T: Transport>(
    dev: &mut T,
    cfg: &DeviceConfig,
    registry: &Registry,
) -> Result<Vec<PinState>> {
    // Port-B pull-ups are gated by one global enable bit; it is written once
    // per board, strictly before the first per-pin pull-up bit.
    let mut pull_up_enabled = false;
    let mut states = Vec::with_capacity(cfg.pins.len());

    for pin_cfg in &cfg.pins {
        let setup_error = |step: &'static str| {
            let name = pin_cfg.name.clone();
            move |source: ProtocolError| Error::PinSetup { name, step, source }
        };

        let port = pins::port_index(&pin_cfg.port).ok_or_else(|| Error::InvalidPort {
            name: pin_cfg.name.clone(),
            port: pin_cfg.port.clone(),
        })?;

        if !pins::pin_allowed(port, pin_cfg.pin) {
            return Err(Error::PinNotAllowed {
                name: pin_cfg.name.clone(),
                port: pin_cfg.port.clone(),
                pin: pin_cfg.pin,
            });
        }
        if !pins::pin_wired(port, pin_cfg.pin) {
            warn!(
                name = %pin_cfg.name,
                port = %pin_cfg.port,
                pin = pin_cfg.pin,
                "pin is not wired"
            );
        }

        if pin_cfg.pull_up {
            if port != pins::PULL_UP_PORT {
                return Err(Error::PullUpNotAllowed {
                    name: pin_cfg.name.clone(),
                    port: pin_cfg.port.clone(),
                });
            }

            if !pull_up_enabled {
                pull_up_enabled = true;
                protocol::set_reg_bit(dev, protocol::REG_INT_CON2, 7, 0)
                    .await
                    .map_err(setup_error("allowing pull-up on port b"))?;
            }

            protocol::set_reg_bit(dev, protocol::REG_WPU_B, port, 1)
                .await
                .map_err(setup_error("enabling pull-up"))?;
        }

        protocol::set_reg_bit(dev, protocol::REG_ANSEL + port, pin_cfg.pin, 0)
            .await
            .map_err(setup_error("setting pin to digital"))?;
        protocol::set_reg_bit(dev, protocol::REG_TRIS + port, pin_cfg.pin, 1)
            .await
            .map_err(setup_error("setting pin to input"))?;

        let gauge = metrics::register_pin_gauge(registry, &cfg.prefix, pin_cfg).map_err(
            |source| Error::Metric {
                name: pin_cfg.name.clone(),
                source,
            },
        )?;

        states.push(PinState {
            name: pin_cfg.name.clone(),
            port,
            pin: pin_cfg.pin,
            revert: pin_cfg.revert,
            gauge,
        });
    }

    Ok(states)
}

/// Poll every pin until a stop is requested.
async fn run_loop<T: Transport>(
    dev: &mut T,
    pin_states: &[PinState],
    interval: Duration,
    stop: &CancellationToken,
) {
    loop {
        poll_once(dev, pin_states).await;
        if wait_or_stop(stop, interval).await == Wait::Stopped {
            return;
        }
    }
}

/// Sweep every pin once, in declared order, publishing logical values.
///
/// A read failure is logged and the pin skipped: its gauge keeps the
/// previous value and the remaining pins are still sampled. The next sweep
/// retries naturally.
async fn poll_once<T: Transport>(dev: &mut T, pin_states: &[PinState]) {
    for state in pin_states {
        let raw = match protocol::get_reg_bit(dev, protocol::REG_PORT + state.port, state.pin).await
        {
            Ok(raw) => raw,
            Err(err) => {
                error!(
                    name = %state.name,
                    port = state.port,
                    pin = state.pin,
                    %err,
                    "read error"
                );
                continue;
            }
        };

        let mut value = u8::from(raw != 0);
        if state.revert {
            value ^= 1;
        }

        debug!(name = %state.name, value, "read ok");
        state.gauge.set(i64::from(value));
    }
}


#[cfg(test)]
mod poll_tests {
    use super::*;
    use crate::transport::mock::MockBoard;

    fn state(name: &str, port: u8, pin: u8, revert: bool) -> PinState {
        PinState {
            name: name.to_string(),
            port,
            pin,
            revert,
            gauge: IntGauge::new(format!("test_{name}"), name.to_string()).unwrap(),
        }
    }

    #[tokio::test]
    async fn sampled_bit_published_per_pin() {
        let mut board = MockBoard::default();
        board.set_reg_bit(protocol::REG_PORT + 1, 3, true);

        let high = state("high", 1, 3, false);
        let low = state("low", 1, 4, false);
        let high_gauge = high.gauge.clone();
        let low_gauge = low.gauge.clone();

        poll_once(&mut board, &[high, low]).await;
        assert_eq!(high_gauge.get(), 1);
        assert_eq!(low_gauge.get(), 0);
    }

    #[tokio::test]
    async fn nonzero_raw_byte_collapses_to_one() {
        let mut board = MockBoard::default();
        // The device may return any nonzero byte for a high bit.
        board.script_reply(vec![0x00, 0x5a]);

        let pin = state("noisy", 0, 0, false);
        let gauge = pin.gauge.clone();
        poll_once(&mut board, &[pin]).await;
        assert_eq!(gauge.get(), 1);
    }

    #[tokio::test]
    async fn revert_flips_both_values() {
        let mut board = MockBoard::default();
        let pin = state("inverted", 1, 3, true);
        let gauge = pin.gauge.clone();
        let pins = [pin];

        board.set_reg_bit(protocol::REG_PORT + 1, 3, true);
        poll_once(&mut board, &pins).await;
        assert_eq!(gauge.get(), 0);

        board.set_reg_bit(protocol::REG_PORT + 1, 3, false);
        poll_once(&mut board, &pins).await;
        assert_eq!(gauge.get(), 1);
    }

    #[tokio::test]
    async fn read_error_keeps_previous_value_and_continues_sweep() {
        let mut board = MockBoard::default();
        board.set_reg_bit(protocol::REG_PORT + 2, 0, true);
        board.fail_gets_on = Some(protocol::REG_PORT); // port A reads fail

        let failing = state("failing", 0, 0, false);
        let healthy = state("healthy", 2, 0, false);
        let failing_gauge = failing.gauge.clone();
        let healthy_gauge = healthy.gauge.clone();

        failing_gauge.set(1); // previously published value
        poll_once(&mut board, &[failing, healthy]).await;

        assert_eq!(failing_gauge.get(), 1, "failed read must not touch the gauge");
        assert_eq!(healthy_gauge.get(), 1, "later pins still sampled");
    }
}
