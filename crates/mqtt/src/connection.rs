//! The single long-lived broker session.
//!
//! [`Connection::connect`] drives the `rumqttc` event loop in place until the
//! broker answers CONNACK, so a refused or unreachable broker is reported to
//! the caller before anything else starts. After that a driver task keeps
//! polling the event loop in the background:
//!
//! ```text
//! Publisher ──(request)──> AsyncClient ──> EventLoop ──> broker
//!     ▲                                       │
//!     └──────────(DeliveryEvent)───── driver task ──> BrokerCallbacks
//! ```
//!
//! The driver never reconnects. When the link drops it reports the cause
//! through [`BrokerCallbacks::on_connection_lost`] and exits, which closes the
//! delivery channel and turns every later publish into an error.

use std::sync::Arc;

use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, Outgoing, Packet};
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
    time::{timeout, Duration},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::{
    callback::BrokerCallbacks, client::ClientBuilder, config::Config, error::TransferError,
    state::ConnectionState,
};

/// Upper bound on how long DISCONNECT may take to flush during shutdown.
const DISCONNECT_FLUSH: Duration = Duration::from_secs(2);

/// Delivery progress reported by the driver, in event loop order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryEvent {
    /// A PUBLISH left the client with this packet id (0 for QoS 0).
    Sent(u16),
    /// The broker completed delivery of this packet id (PUBACK or PUBCOMP).
    Acked(u16),
}

/// Receiving end of the driver's delivery events.
///
/// A publish that times out before its PUBLISH leaves the client is recorded
/// as abandoned. Its `Sent` event arrives later and must not be claimed by
/// the next publish.
#[derive(Debug)]
pub(crate) struct DeliveryQueue {
    events: mpsc::UnboundedReceiver<DeliveryEvent>,
    abandoned: usize,
}

impl DeliveryQueue {
    pub(crate) fn new(events: mpsc::UnboundedReceiver<DeliveryEvent>) -> Self {
        Self {
            events,
            abandoned: 0,
        }
    }

    /// Drops events left over from earlier publishes.
    pub(crate) fn discard_stale(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            trace!("Discarding stale delivery event {:?}", event);
            if matches!(event, DeliveryEvent::Sent(_)) {
                self.abandoned = self.abandoned.saturating_sub(1);
            }
        }
    }

    /// Records a publish given up on before its `Sent` event was seen.
    pub(crate) fn abandon_unsent(&mut self) {
        self.abandoned += 1;
    }

    /// Next event that belongs to the current publish, skipping the `Sent`
    /// events of abandoned ones. `None` once the driver has stopped.
    pub(crate) async fn next(&mut self) -> Option<DeliveryEvent> {
        loop {
            let event = self.events.recv().await?;
            if matches!(event, DeliveryEvent::Sent(_)) && self.abandoned > 0 {
                self.abandoned -= 1;
                trace!("Skipping late delivery event {:?}", event);
                continue;
            }
            return Some(event);
        }
    }

    #[cfg(test)]
    pub(crate) fn abandoned(&self) -> usize {
        self.abandoned
    }
}

/// An established broker session plus its background driver.
pub struct Connection {
    client: AsyncClient,
    state: ConnectionState,
    deliveries: Mutex<DeliveryQueue>,
    cancel: CancellationToken,
    driver: Mutex<Option<JoinHandle<()>>>,
    ack_timeout: Duration,
}

impl Connection {
    /// Connects to the broker and starts the driver task.
    ///
    /// Fails with the broker's refusal, a network error, or
    /// [`TransferError::ConnectTimeout`]. There is no retry; callers treat
    /// any error here as fatal.
    pub async fn connect(
        config: &Config,
        callbacks: Arc<dyn BrokerCallbacks>,
    ) -> Result<Self, TransferError> {
        let (client, mut event_loop) = ClientBuilder::from_config(config)?.build();

        let mut state = ConnectionState::Disconnected;
        transition(&mut state, ConnectionState::Connecting);
        info!("Connecting to MQTT broker {}:{}...", config.host, config.port);

        let connect_timeout = config.connect_timeout();
        timeout(connect_timeout, await_connack(&mut event_loop))
            .await
            .map_err(|_| TransferError::ConnectTimeout(connect_timeout))??;

        transition(&mut state, ConnectionState::Connected);
        info!("Connection established successfully.");

        let (delivery_tx, delivery_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let driver = tokio::spawn(drive(
            client.clone(),
            event_loop,
            callbacks,
            delivery_tx,
            cancel.clone(),
        ));

        Ok(Self {
            client,
            state,
            deliveries: Mutex::new(DeliveryQueue::new(delivery_rx)),
            cancel,
            driver: Mutex::new(Some(driver)),
            ack_timeout: config.ack_timeout(),
        })
    }

    pub fn client(&self) -> &AsyncClient {
        &self.client
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn ack_timeout(&self) -> Duration {
        self.ack_timeout
    }

    /// Exclusive access to the delivery stream.
    ///
    /// Holding the guard serialises publishers so that acknowledgements can
    /// be matched to the single in-flight message.
    pub(crate) async fn deliveries(&self) -> tokio::sync::MutexGuard<'_, DeliveryQueue> {
        self.deliveries.lock().await
    }

    /// Sends DISCONNECT and waits for the driver to finish.
    ///
    /// Safe to call more than once; later calls are no-ops.
    pub async fn close(&self) {
        self.cancel.cancel();
        if let Some(driver) = self.driver.lock().await.take() {
            if let Err(e) = driver.await {
                warn!("MQTT driver task ended abnormally: {}", e);
            }
            info!("MQTT connection closed");
        }
    }
}

fn transition(state: &mut ConnectionState, next: ConnectionState) {
    debug_assert!(state.can_transition_to(next));
    debug!("Connection state: {} -> {}", state, next);
    *state = next;
}

/// Polls the event loop until the broker accepts or refuses the session.
async fn await_connack(event_loop: &mut EventLoop) -> Result<(), TransferError> {
    loop {
        match event_loop.poll().await? {
            Event::Incoming(Packet::ConnAck(ack)) => {
                if ack.code == ConnectReturnCode::Success {
                    return Ok(());
                }
                return Err(rumqttc::ConnectionError::ConnectionRefused(ack.code).into());
            }
            event => trace!("Pre-CONNACK event: {:?}", event),
        }
    }
}

/// Background loop pumping the event loop for the lifetime of the session.
async fn drive(
    client: AsyncClient,
    mut event_loop: EventLoop,
    callbacks: Arc<dyn BrokerCallbacks>,
    deliveries: mpsc::UnboundedSender<DeliveryEvent>,
    cancel: CancellationToken,
) {
    debug!("MQTT driver started");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Shutdown requested, disconnecting from broker...");
                disconnect(&client, &mut event_loop).await;
                break;
            }
            polled = event_loop.poll() => match polled {
                Ok(event) => {
                    if let Some(cause) = handle_event(event, callbacks.as_ref(), &deliveries) {
                        callbacks.on_connection_lost(&cause);
                        break;
                    }
                }
                Err(e) => {
                    error!("MQTT event loop error: {}", e);
                    callbacks.on_connection_lost(&e.to_string());
                    break;
                }
            }
        }
    }
    debug!("MQTT driver stopped");
}

/// Routes one event. Returns the loss cause when the broker ended the session.
fn handle_event(
    event: Event,
    callbacks: &dyn BrokerCallbacks,
    deliveries: &mpsc::UnboundedSender<DeliveryEvent>,
) -> Option<String> {
    match event {
        Event::Incoming(Packet::PubAck(ack)) => {
            callbacks.on_delivery_complete(ack.pkid);
            let _ = deliveries.send(DeliveryEvent::Acked(ack.pkid));
        }
        Event::Incoming(Packet::PubComp(comp)) => {
            callbacks.on_delivery_complete(comp.pkid);
            let _ = deliveries.send(DeliveryEvent::Acked(comp.pkid));
        }
        Event::Incoming(Packet::Publish(publish)) => {
            callbacks.on_message(&publish.topic, &publish.payload);
        }
        Event::Incoming(Packet::Disconnect) => {
            return Some("Disconnected by broker".to_string());
        }
        Event::Outgoing(Outgoing::Publish(pkid)) => {
            let _ = deliveries.send(DeliveryEvent::Sent(pkid));
        }
        other => trace!("MQTT event: {:?}", other),
    }
    None
}

/// Best-effort DISCONNECT: queue it, then poll until it is written.
async fn disconnect(client: &AsyncClient, event_loop: &mut EventLoop) {
    if let Err(e) = client.try_disconnect() {
        warn!("Error sending disconnect packet: {:?}", e);
        return;
    }
    let flushed = timeout(DISCONNECT_FLUSH, async {
        loop {
            match event_loop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
                Ok(_) => {}
                Err(e) => {
                    debug!("Event loop ended during disconnect: {}", e);
                    break;
                }
            }
        }
    })
    .await;
    if flushed.is_err() {
        warn!("DISCONNECT was not flushed within {:?}", DISCONNECT_FLUSH);
    }
}
