//! Effect dispatcher: executes session effects off the protocol path
//!
//! A single worker drains one bounded, ordered queue, so writes land in the
//! order their decisions were taken. Broker publishes are spawned so a slow
//! broker never holds up persistence. Failures, including effects dropped
//! on a full queue, are logged and counted, never returned to the caller.

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::application::ports::{EventPublisher, PublishError};
use crate::domain::session::TransactionStarted;
use crate::domain::{ChargePointRepository, DomainError, Effect, TransactionRepository};

/// Default number of effects the queue holds before new ones are dropped
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Exchange and routing key for transaction-started messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishTarget {
    pub exchange: String,
    pub routing_key: String,
}

impl Default for PublishTarget {
    fn default() -> Self {
        Self {
            exchange: "management.system".to_string(),
            routing_key: "transaction.routing.key".to_string(),
        }
    }
}

enum Command {
    Run(Effect),
    Flush(oneshot::Sender<()>),
}

#[derive(Clone)]
struct Sinks {
    charge_points: Arc<dyn ChargePointRepository>,
    transactions: Arc<dyn TransactionRepository>,
    publisher: Arc<dyn EventPublisher>,
    target: PublishTarget,
}

/// Handle to the effect worker. Cheap to clone.
#[derive(Clone)]
pub struct EffectDispatcher {
    sender: mpsc::Sender<Command>,
}

impl EffectDispatcher {
    /// Spawn the worker on the current runtime.
    pub fn spawn(
        charge_points: Arc<dyn ChargePointRepository>,
        transactions: Arc<dyn TransactionRepository>,
        publisher: Arc<dyn EventPublisher>,
        target: PublishTarget,
    ) -> Self {
        Self::spawn_with_capacity(
            charge_points,
            transactions,
            publisher,
            target,
            DEFAULT_QUEUE_CAPACITY,
        )
    }

    /// Spawn the worker with a queue of `capacity` effects (at least 1).
    pub fn spawn_with_capacity(
        charge_points: Arc<dyn ChargePointRepository>,
        transactions: Arc<dyn TransactionRepository>,
        publisher: Arc<dyn EventPublisher>,
        target: PublishTarget,
        capacity: usize,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let sinks = Sinks {
            charge_points,
            transactions,
            publisher,
            target,
        };
        tokio::spawn(run(receiver, sinks));
        Self { sender }
    }

    /// Queue effects in order. Never blocks; effects that do not fit in
    /// the queue are dropped.
    pub fn enqueue(&self, effects: impl IntoIterator<Item = Effect>) {
        for effect in effects {
            let kind = effect.kind();
            debug!(effect = kind, "Queueing effect");
            match self.sender.try_send(Command::Run(effect)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    error!(effect = kind, "Effect queue full, dropping effect");
                    metrics::counter!("effect_queue_overflow_total", "effect" => kind).increment(1);
                }
                Err(TrySendError::Closed(_)) => {
                    error!(effect = kind, "Effect worker stopped, dropping effect");
                    metrics::counter!("persistence_failures_total", "effect" => kind).increment(1);
                }
            }
        }
    }

    /// Wait until every effect queued before this call has been executed,
    /// publishes included.
    pub async fn flush(&self) {
        let (done, wait) = oneshot::channel();
        if self.sender.send(Command::Flush(done)).await.is_ok() {
            let _ = wait.await;
        }
    }
}

async fn run(mut receiver: mpsc::Receiver<Command>, sinks: Sinks) {
    let mut publishes = JoinSet::new();

    while let Some(command) = receiver.recv().await {
        match command {
            Command::Run(Effect::PublishTransactionStarted(event)) => {
                publishes.spawn(publish_started(sinks.clone(), event));
            }
            Command::Run(effect) => persist(&sinks, effect).await,
            Command::Flush(done) => {
                while publishes.join_next().await.is_some() {}
                let _ = done.send(());
            }
        }
        while publishes.try_join_next().is_some() {}
    }

    while publishes.join_next().await.is_some() {}
    debug!("Effect worker stopped");
}

async fn persist(sinks: &Sinks, effect: Effect) {
    let kind = effect.kind();
    let (charge_point_id, result) = match effect {
        Effect::PersistConnector {
            charge_point_id,
            update,
        } => {
            let result = sinks
                .charge_points
                .update_connector(&charge_point_id, update)
                .await;
            (charge_point_id, result)
        }
        Effect::PersistChargePointStatus {
            charge_point_id,
            status,
        } => {
            let result = sinks.charge_points.update_status(&charge_point_id, status).await;
            (charge_point_id, result)
        }
        Effect::PersistTransaction(transaction) => {
            let charge_point_id = transaction.charge_point_id.clone();
            let result = sinks.transactions.create(transaction).await;
            (charge_point_id, result)
        }
        Effect::PersistLastActivity {
            charge_point_id,
            at,
        } => {
            let result = sinks
                .charge_points
                .update_last_activity(&charge_point_id, at)
                .await;
            (charge_point_id, result)
        }
        Effect::PublishTransactionStarted(_) => return,
    };

    match result {
        Ok(()) => debug!(charge_point_id = charge_point_id.as_str(), effect = kind, "Effect persisted"),
        Err(e @ DomainError::NotFound { .. }) => {
            warn!(charge_point_id = charge_point_id.as_str(), effect = kind, error = %e, "Charge point record missing, write skipped");
            metrics::counter!("persistence_failures_total", "effect" => kind).increment(1);
        }
        Err(e) => {
            error!(charge_point_id = charge_point_id.as_str(), effect = kind, error = %e, "Persistence write failed");
            metrics::counter!("persistence_failures_total", "effect" => kind).increment(1);
        }
    }
}

async fn publish_started(sinks: Sinks, mut event: TransactionStarted) {
    if event.serial_number.is_none() {
        match sinks.charge_points.find_by_id(&event.charge_point_id).await {
            Ok(record) => event.serial_number = record.map(|r| r.serial_number),
            Err(e) => warn!(
                charge_point_id = event.charge_point_id.as_str(),
                error = %e,
                "Serial number lookup failed"
            ),
        }
    }

    let result = match serde_json::to_value(&event) {
        Ok(payload) => {
            sinks
                .publisher
                .publish(&sinks.target.exchange, &sinks.target.routing_key, payload)
                .await
        }
        Err(e) => Err(PublishError::Encode(e.to_string())),
    };

    match result {
        Ok(()) => debug!(
            charge_point_id = event.charge_point_id.as_str(),
            connector_id = event.connector_id,
            exchange = sinks.target.exchange.as_str(),
            "Transaction started event published"
        ),
        Err(e) => {
            error!(
                charge_point_id = event.charge_point_id.as_str(),
                connector_id = event.connector_id,
                error = %e,
                "Failed to publish transaction started event"
            );
            metrics::counter!("publish_failures_total").increment(1);
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;

    use crate::domain::{ChargePointRecord, ConnectorRecord, ConnectorStatus, ConnectorUpdate, TransactionState};
    use crate::infrastructure::storage::InMemoryStorage;
    use crate::notifications::BrokerPublisher;

    struct FailingPublisher;

    #[async_trait]
    impl EventPublisher for FailingPublisher {
        async fn publish(&self, _: &str, _: &str, _: serde_json::Value) -> Result<(), PublishError> {
            Err(PublishError::Broker("unreachable".into()))
        }
    }

    async fn registered_store() -> Arc<InMemoryStorage> {
        let store = Arc::new(InMemoryStorage::new());
        let mut record = ChargePointRecord::new("CP-1", "SN-001");
        record.connectors.push(ConnectorRecord::new(1));
        record.connectors.push(ConnectorRecord::new(2));
        ChargePointRepository::create(store.as_ref(), record).await.unwrap();
        store
    }

    fn dispatcher(store: Arc<InMemoryStorage>, publisher: Arc<dyn EventPublisher>) -> EffectDispatcher {
        EffectDispatcher::spawn(store.clone(), store, publisher, PublishTarget::default())
    }

    #[tokio::test]
    async fn persists_effects_in_order() {
        let store = registered_store().await;
        let effects = dispatcher(store.clone(), Arc::new(BrokerPublisher::new()));

        let update = |status, meter| Effect::PersistConnector {
            charge_point_id: "CP-1".into(),
            update: ConnectorUpdate {
                connector_id: 1,
                status,
                meter_value: meter,
                start_timestamp: None,
                charge_point_status: Some(status),
            },
        };
        effects.enqueue(vec![
            update(ConnectorStatus::Charging, 10),
            update(ConnectorStatus::Available, 0),
        ]);
        effects.flush().await;

        let record = ChargePointRepository::find_by_id(store.as_ref(), "CP-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status, ConnectorStatus::Available);
        assert_eq!(record.connector(1).unwrap().meter_value, 0);
    }

    #[tokio::test]
    async fn publish_resolves_serial_number() {
        let store = registered_store().await;
        let broker = Arc::new(BrokerPublisher::new());
        let mut subscriber = broker.subscribe();
        let effects = dispatcher(store, broker.clone());

        effects.enqueue(vec![Effect::PublishTransactionStarted(TransactionStarted {
            charge_point_id: "CP-1".into(),
            connector_id: 1,
            serial_number: None,
            start_timestamp: Utc::now(),
        })]);
        effects.flush().await;

        let message = subscriber.try_recv().unwrap();
        assert_eq!(message.exchange, "management.system");
        assert_eq!(message.routing_key, "transaction.routing.key");
        assert_eq!(message.payload["serialNumber"], "SN-001");
        assert_eq!(message.payload["connectorId"], 1);
    }

    #[tokio::test]
    async fn full_queue_drops_new_effects() {
        let store = Arc::new(InMemoryStorage::new());
        let effects = EffectDispatcher::spawn_with_capacity(
            store.clone(),
            store.clone(),
            Arc::new(BrokerPublisher::new()),
            PublishTarget::default(),
            2,
        );

        // The worker has not run yet on this single-threaded runtime
        let tx = |id| Effect::PersistTransaction(TransactionState::new(id, "CP-1", 1, "TAG1", 0, Utc::now()));
        effects.enqueue(vec![tx(1), tx(2), tx(3)]);
        effects.flush().await;

        for (id, kept) in [(1, true), (2, true), (3, false)] {
            let stored = TransactionRepository::find_by_id(store.as_ref(), id).await.unwrap();
            assert_eq!(stored.is_some(), kept, "transaction {id}");
        }

        // Space frees up once drained
        effects.enqueue(vec![tx(4)]);
        effects.flush().await;
        assert!(TransactionRepository::find_by_id(store.as_ref(), 4)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn failures_do_not_stop_the_worker() {
        let store = Arc::new(InMemoryStorage::new());
        let effects = dispatcher(store.clone(), Arc::new(FailingPublisher));

        let tx = TransactionState::new(5, "CP-404", 1, "TAG1", 0, Utc::now());
        effects.enqueue(vec![
            Effect::PersistLastActivity {
                charge_point_id: "CP-404".into(),
                at: Utc::now(),
            },
            Effect::PublishTransactionStarted(TransactionStarted {
                charge_point_id: "CP-404".into(),
                connector_id: 1,
                serial_number: None,
                start_timestamp: Utc::now(),
            }),
            Effect::PersistTransaction(tx),
        ]);
        effects.flush().await;

        let stored = TransactionRepository::find_by_id(store.as_ref(), 5).await.unwrap();
        assert!(stored.is_some());
    }
}
