//! Event pipeline: filter, decode, load, classify, alert, store.
//!
//! Events for the same user are not serialized. Two concurrent events for
//! one user may read the same previous state and the last `put` wins.

use futures_util::future::join_all;
use log::{debug, error, info, warn};
use std::time::Duration;
use tokio::time::timeout;

use crate::alert::AlertSender;
use crate::database::StateStore;
use crate::error::ProcessError;
use crate::models::{
    AlertDecision, SensorEvent, UserState, SCENARIO_RESULT_EVENT, SUCCESS_RESULT_CODE,
};
use crate::sensor::{classify, decode_payload};

/// Why an event was skipped without being treated as a failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgnoreReason {
    NotScenarioResult(String),
    UnsuccessfulResult(Option<String>),
}

/// What happened to the alert of a processed event
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    NotNeeded,
    Sent,
    Failed(ProcessError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    Ignored(IgnoreReason),
    Processed {
        decision: AlertDecision,
        delivery: Delivery,
    },
}

pub struct EventProcessor<S, A> {
    store: S,
    sender: A,
    store_timeout: Duration,
    alert_timeout: Duration,
}

impl<S, A> EventProcessor<S, A>
where
    S: StateStore,
    A: AlertSender,
{
    pub fn new(store: S, sender: A, store_timeout: Duration, alert_timeout: Duration) -> Self {
        EventProcessor {
            store,
            sender,
            store_timeout,
            alert_timeout,
        }
    }

    /// Run one event through the pipeline
    ///
    /// Non-scenario and unsuccessful events are returned as `Ignored`. Once the
    /// payload decodes, the new state is written whether or not an alert was
    /// raised and whether or not its delivery succeeded.
    pub async fn process(&self, event: &SensorEvent) -> Result<EventOutcome, ProcessError> {
        if event.event_type != SCENARIO_RESULT_EVENT {
            debug!("Ignoring event of type {}", event.event_type);
            return Ok(EventOutcome::Ignored(IgnoreReason::NotScenarioResult(
                event.event_type.clone(),
            )));
        }
        if event.result_code.as_deref() != Some(SUCCESS_RESULT_CODE) {
            warn!(
                "Error result for user {}: {:?}",
                event.user_id, event.result_code
            );
            return Ok(EventOutcome::Ignored(IgnoreReason::UnsuccessfulResult(
                event.result_code.clone(),
            )));
        }

        let reading = decode_payload(&event.payload)?;
        debug!(
            "Reading from {}: temp={:.2}°C, acc=({:.3}, {:.3}, {:.3}) g",
            event.user_id,
            reading.temperature,
            reading.acceleration_x,
            reading.acceleration_y,
            reading.acceleration_z
        );

        let previous = timeout(self.store_timeout, self.store.get(&event.user_id))
            .await
            .map_err(|_| ProcessError::StorageUnavailable("state lookup timed out".into()))??;

        let decision = classify(previous.as_ref(), &reading);

        let delivery = match decision {
            AlertDecision::NoAlert => Delivery::NotNeeded,
            AlertDecision::Alert(kind) => {
                info!("Alert {:?} for user {}", kind, event.user_id);
                match self.send_alert(&event.reply_token, kind.message()).await {
                    Ok(()) => Delivery::Sent,
                    Err(e) => {
                        error!("Failed to deliver alert to {}: {}", event.user_id, e);
                        Delivery::Failed(e)
                    }
                }
            }
        };

        let state = UserState::from(&reading);
        timeout(self.store_timeout, self.store.put(&event.user_id, state))
            .await
            .map_err(|_| ProcessError::StorageUnavailable("state update timed out".into()))??;

        Ok(EventOutcome::Processed { decision, delivery })
    }

    /// Process independent events concurrently, one result per event in input order
    pub async fn process_batch(
        &self,
        events: &[SensorEvent],
    ) -> Vec<Result<EventOutcome, ProcessError>> {
        join_all(events.iter().map(|event| self.process(event))).await
    }

    async fn send_alert(&self, reply_token: &str, message: &str) -> Result<(), ProcessError> {
        timeout(self.alert_timeout, self.sender.send(reply_token, message))
            .await
            .map_err(|_| ProcessError::DeliveryFailed("alert delivery timed out".into()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStateStore;
    use crate::models::AlertKind;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    const TIMEOUT: Duration = Duration::from_millis(500);

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl AlertSender for RecordingSender {
        async fn send(&self, reply_token: &str, message: &str) -> Result<(), ProcessError> {
            self.sent
                .lock()
                .unwrap()
                .push((reply_token.to_string(), message.to_string()));
            if self.fail {
                Err(ProcessError::DeliveryFailed("endpoint down".into()))
            } else {
                Ok(())
            }
        }
    }

    struct SlowSender;

    impl AlertSender for SlowSender {
        async fn send(&self, _reply_token: &str, _message: &str) -> Result<(), ProcessError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    #[derive(Default)]
    struct UnreachableStore {
        put_called: AtomicBool,
    }

    impl StateStore for UnreachableStore {
        async fn get(&self, _user_id: &str) -> Result<Option<UserState>, ProcessError> {
            Err(ProcessError::StorageUnavailable("connection refused".into()))
        }

        async fn put(&self, _user_id: &str, _state: UserState) -> Result<(), ProcessError> {
            self.put_called.store(true, Ordering::SeqCst);
            Err(ProcessError::StorageUnavailable("connection refused".into()))
        }
    }

    /// Serves a fixed previous state but refuses every write
    struct ReadOnlyStore {
        previous: UserState,
    }

    impl StateStore for ReadOnlyStore {
        async fn get(&self, _user_id: &str) -> Result<Option<UserState>, ProcessError> {
            Ok(Some(self.previous))
        }

        async fn put(&self, _user_id: &str, _state: UserState) -> Result<(), ProcessError> {
            Err(ProcessError::StorageUnavailable("read-only replica".into()))
        }
    }

    fn processor<A: AlertSender>(sender: A) -> EventProcessor<MemoryStateStore, A> {
        EventProcessor::new(MemoryStateStore::new(), sender, TIMEOUT, TIMEOUT)
    }

    fn payload(temperature: i16, x: i16, y: i16, z: i16) -> Vec<u8> {
        [temperature, x, y, z]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect()
    }

    fn scenario_event(user_id: &str, payload: Vec<u8>) -> SensorEvent {
        SensorEvent {
            event_type: SCENARIO_RESULT_EVENT.to_string(),
            result_code: Some(SUCCESS_RESULT_CODE.to_string()),
            user_id: user_id.to_string(),
            reply_token: format!("reply-{user_id}"),
            payload,
        }
    }

    #[tokio::test]
    async fn first_event_stores_baseline_without_alert() {
        let processor = processor(RecordingSender::default());
        let event = scenario_event("U1", payload(2000, 100, 0, 900));

        let outcome = processor.process(&event).await.unwrap();

        assert_eq!(
            outcome,
            EventOutcome::Processed {
                decision: AlertDecision::NoAlert,
                delivery: Delivery::NotNeeded
            }
        );
        let stored = processor.store.get("U1").await.unwrap().unwrap();
        assert!((stored.accelerometer - 1.0).abs() < 1e-9);
        assert!((stored.temperature - 20.0).abs() < 1e-9);
        assert!(processor.sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn motion_sends_alert_and_updates_state() {
        let processor = processor(RecordingSender::default());
        processor
            .process(&scenario_event("U1", payload(2000, 0, 0, 1000)))
            .await
            .unwrap();

        let outcome = processor
            .process(&scenario_event("U1", payload(3000, 500, 0, 1000)))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            EventOutcome::Processed {
                decision: AlertDecision::Alert(AlertKind::MotionDetected),
                delivery: Delivery::Sent
            }
        );
        assert_eq!(
            *processor.sender.sent.lock().unwrap(),
            vec![(
                "reply-U1".to_string(),
                AlertKind::MotionDetected.message().to_string()
            )]
        );
        let stored = processor.store.get("U1").await.unwrap().unwrap();
        assert!((stored.accelerometer - 1.5).abs() < 1e-9);
        assert!((stored.temperature - 30.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn temperature_jump_reports_engine_start() {
        let processor = processor(RecordingSender::default());
        processor
            .process(&scenario_event("U1", payload(1500, 0, 0, 1000)))
            .await
            .unwrap();

        let outcome = processor
            .process(&scenario_event("U1", payload(4200, 0, 0, 1000)))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            EventOutcome::Processed {
                decision: AlertDecision::Alert(AlertKind::EngineStarted),
                delivery: Delivery::Sent
            }
        );
    }

    #[tokio::test]
    async fn unsuccessful_result_is_ignored() {
        let processor = processor(RecordingSender::default());
        let mut event = scenario_event("U1", payload(2000, 0, 0, 1000));
        event.result_code = Some("gatt_error".to_string());

        let outcome = processor.process(&event).await.unwrap();

        assert_eq!(
            outcome,
            EventOutcome::Ignored(IgnoreReason::UnsuccessfulResult(Some(
                "gatt_error".to_string()
            )))
        );
        assert_eq!(processor.store.get("U1").await, Ok(None));
        assert!(processor.sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn other_event_types_are_ignored() {
        let processor = processor(RecordingSender::default());
        let mut event = scenario_event("U1", Vec::new());
        event.event_type = "link".to_string();

        let outcome = processor.process(&event).await.unwrap();

        assert_eq!(
            outcome,
            EventOutcome::Ignored(IgnoreReason::NotScenarioResult("link".to_string()))
        );
        assert_eq!(processor.store.get("U1").await, Ok(None));
    }

    #[tokio::test]
    async fn malformed_payload_aborts_without_touching_state() {
        let processor = processor(RecordingSender::default());
        let event = scenario_event("U1", vec![0x01, 0x02]);

        assert_eq!(
            processor.process(&event).await,
            Err(ProcessError::MalformedPayload { len: 2 })
        );
        assert_eq!(processor.store.get("U1").await, Ok(None));
    }

    #[tokio::test]
    async fn failed_delivery_still_persists_state() {
        let processor = processor(RecordingSender {
            fail: true,
            ..Default::default()
        });
        processor
            .process(&scenario_event("U1", payload(2000, 0, 0, 1000)))
            .await
            .unwrap();

        let outcome = processor
            .process(&scenario_event("U1", payload(2000, 0, 0, -1000)))
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            EventOutcome::Processed {
                decision: AlertDecision::Alert(AlertKind::MotionDetected),
                delivery: Delivery::Failed(ProcessError::DeliveryFailed(_))
            }
        ));
        let stored = processor.store.get("U1").await.unwrap().unwrap();
        assert!((stored.accelerometer + 1.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_delivery_times_out_and_persists_state() {
        let processor = processor(SlowSender);
        processor
            .process(&scenario_event("U1", payload(2000, 0, 0, 1000)))
            .await
            .unwrap();

        let outcome = processor
            .process(&scenario_event("U1", payload(2000, 0, 0, 0)))
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            EventOutcome::Processed {
                delivery: Delivery::Failed(ProcessError::DeliveryFailed(_)),
                ..
            }
        ));
        let stored = processor.store.get("U1").await.unwrap().unwrap();
        assert!(stored.accelerometer.abs() < 1e-9);
    }

    #[tokio::test]
    async fn storage_failure_aborts_event() {
        let processor = EventProcessor::new(
            UnreachableStore::default(),
            RecordingSender::default(),
            TIMEOUT,
            TIMEOUT,
        );

        let result = processor
            .process(&scenario_event("U1", payload(2000, 0, 0, 1000)))
            .await;

        assert!(matches!(result, Err(ProcessError::StorageUnavailable(_))));
        assert!(!processor.store.put_called.load(Ordering::SeqCst));
        assert!(processor.sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_write_after_alert_fails_event_but_alert_stays_sent() {
        let processor = EventProcessor::new(
            ReadOnlyStore {
                previous: UserState {
                    accelerometer: 1.0,
                    temperature: 20.0,
                },
            },
            RecordingSender::default(),
            TIMEOUT,
            TIMEOUT,
        );

        let result = processor
            .process(&scenario_event("U1", payload(2000, 0, 0, 0)))
            .await;

        assert!(matches!(result, Err(ProcessError::StorageUnavailable(_))));
        assert_eq!(
            *processor.sender.sent.lock().unwrap(),
            vec![(
                "reply-U1".to_string(),
                AlertKind::MotionDetected.message().to_string()
            )]
        );
    }

    #[tokio::test]
    async fn batch_keeps_failures_scoped_to_their_event() {
        let processor = processor(RecordingSender::default());
        let events = vec![
            scenario_event("U1", payload(2000, 0, 0, 1000)),
            scenario_event("U2", vec![0xFF]),
            scenario_event("U3", payload(2500, 0, 0, 1000)),
        ];

        let results = processor.process_batch(&events).await;

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert_eq!(results[1], Err(ProcessError::MalformedPayload { len: 1 }));
        assert!(results[2].is_ok());
        assert!(processor.store.get("U1").await.unwrap().is_some());
        assert!(processor.store.get("U3").await.unwrap().is_some());
    }
}
