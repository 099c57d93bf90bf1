//! Session hub.
//!
//! Ties together the observer registry and the BB84 engine. A run is
//! triggered by any observer and broadcast to all of them: this is a shared
//! multi-viewer session, not a per-requester exchange.
//!
//! # Ordering
//!
//! Runs are serialized through a run gate, so stage messages from two runs
//! never interleave. Within a run the `initializing` broadcast is attempted
//! on every registered observer before the engine starts. Connects and
//! disconnects do not wait for the gate: each broadcast reaches whoever is
//! registered at that moment.

use std::time::Duration;

use qkd_core::{Bb84Config, DEFAULT_BIT_COUNT, EnvRng, Environment, ProtocolRun, bb84};
use qkd_proto::{ClientCommand, StageMessage};
use tokio::sync::Mutex;

use crate::{
    hub_error::{ConfigError, HubError},
    registry::{Observer, ObserverId, ObserverRegistry},
};

/// Hub configuration
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Qubits exchanged per run
    pub bit_count: usize,
    /// Pause between the `initializing` and `complete` stages
    pub stage_delay: Duration,
    /// Upper bound for `bit_count`. Runs execute inline on the runtime.
    pub max_bit_count: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            bit_count: DEFAULT_BIT_COUNT,
            stage_delay: Duration::from_secs(1),
            max_bit_count: 1024,
        }
    }
}

impl HubConfig {
    /// Check the configuration before serving.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bit_count > self.max_bit_count {
            return Err(ConfigError::BitCountTooLarge {
                bit_count: self.bit_count,
                max: self.max_bit_count,
            });
        }
        Ok(())
    }
}

/// Events that the hub processes.
///
/// These are produced by the connection runtime (WebSocket or simulation).
#[derive(Debug, Clone)]
pub enum ServerEvent<O> {
    /// A connection completed its handshake
    ObserverConnected {
        /// ID assigned by the runtime
        observer_id: ObserverId,
        /// Handle to reach the connection
        observer: O,
    },

    /// A text frame arrived from a connection
    TextReceived {
        /// Connection that sent the text
        observer_id: ObserverId,
        /// Raw frame contents
        text: String,
    },

    /// A connection closed (by peer or error)
    ObserverDisconnected {
        /// Connection that was closed
        observer_id: ObserverId,
        /// Reason for closure
        reason: String,
    },
}

/// Outcome of one broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Observers that accepted the message
    pub delivered: usize,
    /// Observers removed because their send failed
    pub dropped: Vec<ObserverId>,
}

/// Broadcast hub for protocol runs.
///
/// Share it behind an `Arc`; every method takes `&self`.
pub struct SessionHub<E, O>
where
    E: Environment,
    O: Observer,
{
    /// Live observers
    registry: Mutex<ObserverRegistry<O>>,
    /// Held for the whole of a run
    run_gate: Mutex<()>,
    /// Environment (time, RNG)
    env: E,
    /// Hub configuration
    config: HubConfig,
}

impl<E, O> SessionHub<E, O>
where
    E: Environment,
    O: Observer,
{
    /// Create a new hub with no observers.
    pub fn new(env: E, config: HubConfig) -> Self {
        Self {
            registry: Mutex::new(ObserverRegistry::new()),
            run_gate: Mutex::new(()),
            env,
            config,
        }
    }

    /// Process a connection event.
    ///
    /// This is the main entry point for the connection runtime. Malformed or
    /// unrecognized commands are logged and ignored; only text from an
    /// unregistered observer is an error.
    pub async fn process_event(&self, event: ServerEvent<O>) -> Result<(), HubError> {
        match event {
            ServerEvent::ObserverConnected { observer_id, observer } => {
                if self.register(observer_id, observer).await {
                    tracing::debug!(%observer_id, "observer connected");
                } else {
                    tracing::warn!(%observer_id, "observer already registered");
                }
                Ok(())
            },
            ServerEvent::TextReceived { observer_id, text } => {
                self.handle_text(observer_id, &text).await
            },
            ServerEvent::ObserverDisconnected { observer_id, reason } => {
                if self.unregister(observer_id).await.is_some() {
                    tracing::debug!(%observer_id, %reason, "observer disconnected");
                }
                Ok(())
            },
        }
    }

    /// Handle a text frame from an observer.
    async fn handle_text(&self, observer_id: ObserverId, text: &str) -> Result<(), HubError> {
        if !self.contains(observer_id).await {
            return Err(HubError::ObserverNotFound(observer_id));
        }

        match ClientCommand::decode(text) {
            Ok(ClientCommand::StartKeyGen { hacker }) => {
                tracing::info!(%observer_id, eavesdropper = hacker, "key generation requested");
                let config = Bb84Config::new(self.config.bit_count).with_eavesdropper(hacker);
                self.run_protocol(config).await;
            },
            Ok(ClientCommand::Unknown) => {
                tracing::debug!(%observer_id, "ignoring unrecognized action");
            },
            Err(e) => {
                tracing::warn!(%observer_id, error = %e, "ignoring malformed request");
            },
        }

        Ok(())
    }

    /// Register an observer.
    ///
    /// Returns `false` if the ID is already registered; the existing handle
    /// is kept.
    pub async fn register(&self, observer_id: ObserverId, observer: O) -> bool {
        self.registry.lock().await.register(observer_id, observer)
    }

    /// Remove an observer. Safe to call for IDs that are already gone.
    pub async fn unregister(&self, observer_id: ObserverId) -> Option<O> {
        self.registry.lock().await.unregister(observer_id)
    }

    /// Deliver `message` to every registered observer.
    ///
    /// Observers whose send fails are removed; the rest still receive the
    /// message. Never fails.
    pub async fn broadcast(&self, message: &StageMessage) -> BroadcastReport {
        let targets = self.registry.lock().await.snapshot();
        let mut report = BroadcastReport::default();

        for (observer_id, observer) in targets {
            match observer.send(message).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::warn!(%observer_id, error = %e, "dropping observer after failed send");
                    report.dropped.push(observer_id);
                },
            }
        }

        if !report.dropped.is_empty() {
            let mut registry = self.registry.lock().await;
            for observer_id in &report.dropped {
                registry.unregister(*observer_id);
            }
        }

        report
    }

    /// Run one BB84 exchange and broadcast its stages.
    ///
    /// Waits for any run already in progress. Once started, the run always
    /// completes, whoever disconnects meanwhile.
    pub async fn run_protocol(&self, config: Bb84Config) -> ProtocolRun {
        let _gate = self.run_gate.lock().await;

        let report = self.broadcast(&StageMessage::initializing(config.eavesdropper)).await;
        tracing::debug!(
            bit_count = config.bit_count,
            eavesdropper = config.eavesdropper,
            observers = report.delivered,
            "run initializing"
        );

        if !self.config.stage_delay.is_zero() {
            self.env.sleep(self.config.stage_delay).await;
        }

        let run = bb84::simulate(config, &mut EnvRng::new(&self.env));

        let report = self.broadcast(&StageMessage::complete(run.key_string(), run.error_rate)).await;
        tracing::info!(
            qber = run.error_rate,
            sifted = run.matching_basis_count(),
            observers = report.delivered,
            "run complete"
        );

        run
    }

    /// Check if an observer is registered.
    pub async fn contains(&self, observer_id: ObserverId) -> bool {
        self.registry.lock().await.contains(observer_id)
    }

    /// Number of registered observers.
    pub async fn observer_count(&self) -> usize {
        self.registry.lock().await.len()
    }

    /// Environment the hub draws time and randomness from.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Hub configuration.
    pub fn config(&self) -> &HubConfig {
        &self.config
    }
}

impl<E, O> std::fmt::Debug for SessionHub<E, O>
where
    E: Environment,
    O: Observer,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHub").field("config", &self.config).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        future::Future,
        sync::{Arc, Mutex as StdMutex},
        time::Instant,
    };

    use qkd_proto::StageStatus;

    use super::*;
    use crate::hub_error::TransportError;

    #[derive(Clone)]
    struct TestEnv;

    impl Environment for TestEnv {
        type Instant = Instant;

        fn now(&self) -> Instant {
            Instant::now()
        }

        fn sleep(&self, _duration: Duration) -> impl Future<Output = ()> + Send {
            std::future::ready(())
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            buffer.fill(0xa5);
        }
    }

    #[derive(Clone, Default)]
    struct Inbox {
        messages: Arc<StdMutex<Vec<StageMessage>>>,
        closed: bool,
    }

    impl Inbox {
        fn closed() -> Self {
            Self { closed: true, ..Self::default() }
        }

        fn statuses(&self) -> Vec<StageStatus> {
            self.messages.lock().unwrap().iter().map(StageMessage::status).collect()
        }
    }

    impl Observer for Inbox {
        fn send(
            &self,
            message: &StageMessage,
        ) -> impl Future<Output = Result<(), TransportError>> + Send {
            let result = if self.closed {
                Err(TransportError::Closed)
            } else {
                self.messages.lock().unwrap().push(message.clone());
                Ok(())
            };
            std::future::ready(result)
        }
    }

    fn hub() -> SessionHub<TestEnv, Inbox> {
        let config = HubConfig { stage_delay: Duration::ZERO, ..HubConfig::default() };
        SessionHub::new(TestEnv, config)
    }

    #[tokio::test]
    async fn register_is_idempotent() {
        let hub = hub();

        assert!(hub.register(ObserverId::new(1), Inbox::default()).await);
        assert!(!hub.register(ObserverId::new(1), Inbox::default()).await);
        assert_eq!(hub.observer_count().await, 1);
    }

    #[tokio::test]
    async fn unregister_absent_is_noop() {
        let hub = hub();
        hub.register(ObserverId::new(1), Inbox::default()).await;

        assert!(hub.unregister(ObserverId::new(9)).await.is_none());
        assert_eq!(hub.observer_count().await, 1);
    }

    #[tokio::test]
    async fn broadcast_drops_failed_observer() {
        let hub = hub();
        let healthy = Inbox::default();
        hub.register(ObserverId::new(1), healthy.clone()).await;
        hub.register(ObserverId::new(2), Inbox::closed()).await;

        let report = hub.broadcast(&StageMessage::initializing(false)).await;

        assert_eq!(report.delivered, 1);
        assert_eq!(report.dropped, vec![ObserverId::new(2)]);
        assert!(!hub.contains(ObserverId::new(2)).await);
        assert_eq!(healthy.statuses(), vec![StageStatus::Initializing]);
    }

    #[tokio::test]
    async fn run_protocol_sends_both_stages_in_order() {
        let hub = hub();
        let inbox = Inbox::default();
        hub.register(ObserverId::new(1), inbox.clone()).await;

        let run = hub.run_protocol(Bb84Config::new(32)).await;

        assert_eq!(inbox.statuses(), vec![StageStatus::Initializing, StageStatus::Complete]);
        let messages = inbox.messages.lock().unwrap();
        assert_eq!(messages[1], StageMessage::complete(run.key_string(), run.error_rate));
    }

    #[tokio::test]
    async fn start_command_runs_configured_bit_count() {
        let hub = hub();
        let inbox = Inbox::default();
        let observer_id = ObserverId::new(1);

        hub.process_event(ServerEvent::ObserverConnected { observer_id, observer: inbox.clone() })
            .await
            .unwrap();
        hub.process_event(ServerEvent::TextReceived {
            observer_id,
            text: r#"{"action":"START_KEY_GEN","hacker":true}"#.to_string(),
        })
        .await
        .unwrap();

        assert_eq!(inbox.statuses(), vec![StageStatus::Initializing, StageStatus::Complete]);
        assert_eq!(
            inbox.messages.lock().unwrap()[0],
            StageMessage::initializing(true)
        );
    }

    #[tokio::test]
    async fn malformed_and_unknown_text_are_ignored() {
        let hub = hub();
        let inbox = Inbox::default();
        let observer_id = ObserverId::new(1);
        hub.register(observer_id, inbox.clone()).await;

        for text in ["garbage", r#"{"action":"PING"}"#] {
            hub.process_event(ServerEvent::TextReceived { observer_id, text: text.to_string() })
                .await
                .unwrap();
        }

        assert!(inbox.statuses().is_empty());
        assert!(hub.contains(observer_id).await);
    }

    #[tokio::test]
    async fn text_from_unknown_observer_is_rejected() {
        let hub = hub();
        let observer_id = ObserverId::new(77);

        let result = hub
            .process_event(ServerEvent::TextReceived {
                observer_id,
                text: r#"{"action":"START_KEY_GEN"}"#.to_string(),
            })
            .await;

        assert_eq!(result, Err(HubError::ObserverNotFound(observer_id)));
    }

    #[tokio::test]
    async fn disconnect_removes_observer() {
        let hub = hub();
        let observer_id = ObserverId::new(1);
        hub.register(observer_id, Inbox::default()).await;

        hub.process_event(ServerEvent::ObserverDisconnected {
            observer_id,
            reason: "client disconnect".to_string(),
        })
        .await
        .unwrap();

        assert_eq!(hub.observer_count().await, 0);
    }

    #[test]
    fn config_rejects_oversized_runs() {
        let config = HubConfig { bit_count: 2048, ..HubConfig::default() };
        assert_eq!(
            config.validate(),
            Err(ConfigError::BitCountTooLarge { bit_count: 2048, max: 1024 })
        );
        assert!(HubConfig::default().validate().is_ok());
    }
}
