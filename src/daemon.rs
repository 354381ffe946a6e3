//! Runtime wiring: lines, sinks, edge loop and ticker, plus the ordered
//! teardown that follows a stop request.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use pulsemeter_sdk::{
    attach_reset, Broker, BrokerStatus, EdgeCounter, GpioError, LatestSnapshot, Output,
    PullServer, PulseHandle, PulseMeter, ResetInput, Shutdown, SinkPlan, Ticker,
};

use crate::gpio::{self, LineSource};
use crate::settings::Settings;

/// A started pulse meter.
///
/// [`Daemon::start`] brings every part up; [`Daemon::run_until`] waits for
/// a stop request (or a failed edge loop) and tears down in order: ticker,
/// edge wait, pull listener, generator, broker.
pub struct Daemon {
    shutdown: Shutdown,
    handle: PulseHandle,
    ticker: Ticker,
    edges: JoinHandle<Result<(), GpioError>>,
    server: Option<JoinHandle<()>>,
    pull_addr: Option<SocketAddr>,
    generator: Option<std::thread::JoinHandle<()>>,
    broker: Option<Arc<dyn Broker>>,
    reset: Box<dyn ResetInput>,
}

impl Daemon {
    /// Open the lines, connect the broker, pick sinks and start counting.
    ///
    /// Input pin failures are fatal. A pull listener that cannot bind is
    /// logged and skipped.
    pub async fn start(settings: &Settings, source: LineSource) -> Result<Self> {
        let shutdown = Shutdown::new();
        let lines = gpio::open(settings, source, shutdown.token()).map_err(|e| {
            error!(error = %e, "Input pin configuration failed");
            anyhow!(e).context("Failed to configure input pins")
        })?;
        let gpio::Lines {
            pulse: mut pulse_line,
            reset: mut reset_line,
            generator,
        } = lines;

        let (status, broker) = connect_broker(settings).await;
        let plan = SinkPlan::resolve(status, settings.force_pull);
        info!(push = plan.push, pull = plan.pull, broker = ?status, "Sinks selected");

        let mut builder = PulseMeter::builder()
            .uuid(settings.uuid.clone())
            .gpio(settings.gpio_pin)
            .multiplier(settings.multiplier);

        if let Some(broker) = &broker {
            builder = builder.output(Output::Broker(broker.clone()));
        }

        let mut server = None;
        let mut pull_addr = None;
        if plan.pull {
            let latest = LatestSnapshot::new();
            builder = builder.output(Output::pull(latest.clone()));
            match PullServer::bind(("0.0.0.0", settings.pull_port)).await {
                Ok(listener) => {
                    pull_addr = listener.local_addr().ok();
                    server = Some(tokio::spawn(listener.serve(latest, shutdown.token())));
                }
                Err(e) => warn!(port = settings.pull_port, error = %e, "Pull sink unavailable"),
            }
        }

        let meter = builder.build();
        let handle = meter.handle();
        attach_reset(reset_line.as_mut(), meter.handle()).context("Failed to attach reset input")?;

        let counter = EdgeCounter::new(meter.handle(), settings.debounce);
        let token = shutdown.token();
        let edges = tokio::task::spawn_blocking(move || counter.run(pulse_line.as_mut(), &token));

        let ticker = meter.start();
        info!("Pulse meter running");

        Ok(Self {
            shutdown,
            handle,
            ticker,
            edges,
            server,
            pull_addr,
            generator,
            broker,
            reset: reset_line,
        })
    }

    /// Where the pull sink is listening, if it is.
    pub fn pull_addr(&self) -> Option<SocketAddr> {
        self.pull_addr
    }

    /// Handle onto the live pulse counts.
    pub fn handle(&self) -> &PulseHandle {
        &self.handle
    }

    /// Run until `stop` resolves or the edge loop ends, then shut down.
    ///
    /// Returns an error if waiting on `stop` failed or the pulse line
    /// failed; a requested stop returns `Ok`.
    pub async fn run_until<F>(self, stop: F) -> Result<()>
    where
        F: Future<Output = std::io::Result<()>>,
    {
        let Self {
            shutdown,
            handle: _,
            ticker,
            mut edges,
            server,
            pull_addr: _,
            generator,
            broker,
            reset,
        } = self;

        let (stopped, edge_result) = tokio::select! {
            stopped = stop => (stopped, None),
            joined = &mut edges => (Ok(()), Some(joined)),
        };

        info!("Shutting down");
        shutdown.trigger();
        ticker.cancel();
        ticker.join().await;

        let edge_result = match edge_result {
            Some(joined) => joined,
            None => edges.await,
        };
        if let Some(server) = server {
            let _ = server.await;
        }
        if let Some(generator) = generator {
            let _ = generator.join();
        }
        if let Some(broker) = &broker {
            broker.close();
        }
        drop(reset);

        stopped.context("Failed to listen for signals")?;
        match edge_result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                error!(error = %e, "Pulse input failed");
                Err(anyhow!(e).context("Pulse input failed"))
            }
            Err(e) => Err(anyhow!(e).context("Edge loop panicked")),
        }
    }
}

impl std::fmt::Debug for Daemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Daemon")
            .field("pull_addr", &self.pull_addr)
            .field("broker", &self.broker.as_ref().map(|b| b.name().to_string()))
            .field("simulated", &self.generator.is_some())
            .finish()
    }
}

/// Make the single connection attempt, if a broker is configured.
#[cfg(feature = "mqtt")]
async fn connect_broker(settings: &Settings) -> (BrokerStatus, Option<Arc<dyn Broker>>) {
    use pulsemeter_sdk::mqtt::{parse_address, MqttBroker};
    use std::time::Duration;

    /// How long the single connection attempt may take.
    const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

    let Some(address) = settings.broker.as_deref() else {
        return (BrokerStatus::NotConfigured, None);
    };

    let client_id = format!("pulsemeter-{}", settings.uuid);
    let connected = match parse_address(address) {
        Ok((host, port)) => MqttBroker::connect(&host, port, &client_id, CONNECT_TIMEOUT).await,
        Err(e) => Err(e),
    };

    match connected {
        Ok(broker) => {
            let broker: Arc<dyn Broker> = Arc::new(broker);
            (BrokerStatus::Connected, Some(broker))
        }
        Err(e) => {
            warn!(broker = address, error = %e, "Broker unreachable, push sink disabled");
            (BrokerStatus::Unreachable, None)
        }
    }
}

#[cfg(not(feature = "mqtt"))]
async fn connect_broker(settings: &Settings) -> (BrokerStatus, Option<Arc<dyn Broker>>) {
    match settings.broker.as_deref() {
        None => (BrokerStatus::NotConfigured, None),
        Some(address) => {
            warn!(broker = address, "Built without the `mqtt` feature, push sink disabled");
            (BrokerStatus::Unreachable, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    fn local_settings() -> Settings {
        Settings {
            broker: None,
            pull_port: 0,
            ..Settings::default()
        }
    }

    async fn request(addr: SocketAddr) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"GET / HTTP/1.0\r\n\r\n").await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    #[tokio::test]
    async fn pull_sink_serves_without_a_broker() {
        let daemon = Daemon::start(&local_settings(), LineSource::Simulated(2.0))
            .await
            .unwrap();
        let addr = daemon.pull_addr().unwrap();

        let response = request(([127, 0, 0, 1], addr.port()).into()).await;
        assert!(response.starts_with("HTTP/1.0 200 OK"));

        daemon.run_until(async { Ok(()) }).await.unwrap();
    }

    #[tokio::test]
    async fn stop_request_tears_everything_down() {
        let daemon = Daemon::start(&local_settings(), LineSource::Simulated(2.0))
            .await
            .unwrap();
        let addr: SocketAddr = ([127, 0, 0, 1], daemon.pull_addr().unwrap().port()).into();
        let handle = daemon.handle().clone();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let running = tokio::spawn(daemon.run_until(async move {
            let _ = rx.await;
            Ok(())
        }));

        // Let the generator get a pulse past the debounce
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(handle.cumulative() > 0);

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), running)
            .await
            .expect("daemon should stop")
            .unwrap()
            .unwrap();

        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn failed_stop_listener_is_an_error() {
        let daemon = Daemon::start(&local_settings(), LineSource::Simulated(2.0))
            .await
            .unwrap();

        let result = daemon
            .run_until(async { Err(std::io::Error::other("no signal handler")) })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn bad_pin_fails_startup() {
        let settings = Settings {
            reset_pin: 2,
            ..local_settings()
        };
        assert!(Daemon::start(&settings, LineSource::Simulated(2.0)).await.is_err());
    }
}
