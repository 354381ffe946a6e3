//! MQTT push sink.
//!
//! The connection is attempted once. If the broker drops the session later
//! the event loop stops and every following publish fails (and is logged) so
//! the meter keeps ticking without a broker.
//!
//! ## Example
//!
//! ```rust,no_run
//! use pulsemeter_sdk::mqtt::{parse_address, MqttBroker};
//! use pulsemeter_sdk::{Output, PulseMeter};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (host, port) = parse_address("mqtt:1883").expect("address");
//!     let broker = MqttBroker::connect(&host, port, "pulsemeter", Duration::from_secs(5))
//!         .await
//!         .expect("broker");
//!
//!     let meter = PulseMeter::builder().output(Output::broker(broker)).build();
//!     let ticker = meter.start();
//! #   ticker.cancel();
//! }
//! ```

use std::time::Duration;

use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::SinkError;
use crate::output::Broker;

/// Port used when the address has none.
pub const DEFAULT_PORT: u16 = 1883;

/// Keep-alive interval negotiated with the broker.
pub const KEEP_ALIVE: Duration = Duration::from_secs(60);

/// Requests that can queue between the client and the event loop.
const REQUEST_CAPACITY: usize = 16;

/// A connected MQTT client publishing at QoS 0.
pub struct MqttBroker {
    client: AsyncClient,
    address: String,
    driver: JoinHandle<()>,
}

impl MqttBroker {
    /// Connect and wait for the broker's CONNACK, at most `timeout`.
    pub async fn connect(
        host: &str,
        port: u16,
        client_id: &str,
        timeout: Duration,
    ) -> Result<Self, SinkError> {
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(KEEP_ALIVE);

        let (client, mut eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        tokio::time::timeout(timeout, wait_for_connack(&mut eventloop))
            .await
            .map_err(|_| SinkError::Timeout)??;

        let address = format!("{host}:{port}");
        info!(broker = %address, "Connected to MQTT broker");

        let driver = tokio::spawn(drive(eventloop, address.clone()));
        Ok(Self {
            client,
            address,
            driver,
        })
    }
}

impl Broker for MqttBroker {
    fn name(&self) -> &str {
        "mqtt"
    }

    fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), SinkError> {
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload.to_vec())?;
        Ok(())
    }

    fn close(&self) {
        if let Err(e) = self.client.try_disconnect() {
            debug!(error = %e, "MQTT disconnect not sent");
        }
    }
}

impl Drop for MqttBroker {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

impl std::fmt::Debug for MqttBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttBroker")
            .field("address", &self.address)
            .field("running", &!self.driver.is_finished())
            .finish()
    }
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<(), SinkError> {
    loop {
        if let Event::Incoming(Packet::ConnAck(ack)) = eventloop.poll().await? {
            return match ack.code {
                ConnectReturnCode::Success => Ok(()),
                code => Err(SinkError::Connect(format!("broker refused: {code:?}"))),
            };
        }
    }
}

async fn drive(mut eventloop: EventLoop, address: String) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Disconnect)) => {
                warn!(broker = %address, "Broker closed the session");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(broker = %address, error = %e, "MQTT connection lost, push sink stopped");
                break;
            }
        }
    }
}

/// Split `host[:port]` into host and port.
///
/// Bracketed IPv6 literals (`[::1]:1883`) are accepted.
pub fn parse_address(address: &str) -> Result<(String, u16), SinkError> {
    let address = address.trim();
    let invalid = |why: &str| SinkError::Connect(format!("invalid broker address {address:?}: {why}"));

    let (host, port) = if let Some(rest) = address.strip_prefix('[') {
        let (host, tail) = rest.split_once(']').ok_or_else(|| invalid("unclosed bracket"))?;
        match tail.strip_prefix(':') {
            Some(port) => (host, Some(port)),
            None if tail.is_empty() => (host, None),
            None => return Err(invalid("unexpected text after bracket")),
        }
    } else {
        match address.split_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (address, None),
        }
    };

    if host.is_empty() {
        return Err(invalid("empty host"));
    }
    let port = match port {
        Some(port) => port.parse().map_err(|_| invalid("bad port"))?,
        None => DEFAULT_PORT,
    };

    Ok((host.to_string(), port))
}
