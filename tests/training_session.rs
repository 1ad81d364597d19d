use serde_json::json;

use netforge::channel::{MemoryChannel, MemoryConnector, MetricSet, ProgressEvent, TestMetricsEvent};
use netforge::{
    Channel, ClientError, LayerKind, MetricsHistory, ModelConfig, ModelStore, Phase, RequestError,
    ServerEvent, SessionError, TrainingSession,
};

/// dense(16, relu) -> dropout(0.5), built for `classes` label values and
/// ten input columns.
fn built_config(classes: usize) -> ModelConfig {
    let store = ModelStore::new();
    store.add_layer(LayerKind::Dense).unwrap();
    store.add_layer(LayerKind::Dropout).unwrap();
    store.finalize_for_build(classes, 10).unwrap()
}

fn saved(config: ModelConfig) -> impl Fn() -> Result<ModelConfig, ClientError> {
    move || Ok(config.clone())
}

fn progress(epoch: u32, pct: f64, accuracy: f64) -> ServerEvent {
    ServerEvent::Progress(ProgressEvent {
        epoch,
        progress: pct,
        estimated_time: format!("{}s", 30 - epoch),
        metrics: MetricSet { accuracy, precision: 0.5, recall: 0.25 },
    })
}

fn test_metrics() -> ServerEvent {
    ServerEvent::TestMetrics(TestMetricsEvent {
        confusion_matrix: vec![vec![5, 1], vec![2, 8]],
        accuracy: 0.8125,
        precision: 0.8,
        recall: 0.75,
    })
}

/// Starts a session and lets it send its start request.
fn started(
    config: ModelConfig,
    epochs: u32,
) -> (TrainingSession<impl Fn() -> Result<ModelConfig, ClientError>>, MemoryChannel) {
    let channel = MemoryChannel::new();
    let connector = MemoryConnector::new(channel.clone());
    let mut session = TrainingSession::new(saved(config));
    session.start(&connector, epochs).unwrap();
    assert_eq!(session.phase(), Phase::Connecting);
    channel.push(ServerEvent::Connected);
    session.pump();
    (session, channel)
}

#[test]
fn built_model_sends_start_request_on_connect() {
    let config = built_config(3);
    assert_eq!(config.layers.len(), 3);
    assert_eq!(config.input_size, Some(10));
    assert_eq!(
        serde_json::to_value(config.last_layer().unwrap()).unwrap(),
        json!({
            "id": "outputLayer",
            "type": "dense",
            "settings": {"nodes": 3, "activation": "softmax"}
        })
    );

    let (session, channel) = started(config, 5);
    assert_eq!(session.phase(), Phase::AwaitingStart);
    assert!(session.status().is_training);
    assert_eq!(
        channel.emitted(),
        vec![(
            "startTraining".to_owned(),
            json!({
                "action": "startTraining",
                "epochs": 5,
                "optimizer": "rmsprop",
                "metrics": ["accuracy"],
                "loss": "categorical_crossentropy",
                "inputSize": 10
            })
        )]
    );
}

#[test]
fn two_output_nodes_train_with_binary_loss() {
    let (_session, channel) = started(built_config(2), 1);
    let (_, payload) = &channel.emitted()[0];
    assert_eq!(payload["loss"], "binary_crossentropy");
}

#[test]
fn nothing_is_sent_before_the_connection_is_acknowledged() {
    let channel = MemoryChannel::new();
    let connector = MemoryConnector::new(channel.clone());
    let mut session = TrainingSession::new(saved(built_config(3)));
    session.start(&connector, 2).unwrap();

    channel.push(progress(1, 50.0, 0.5));
    session.pump();
    assert_eq!(session.phase(), Phase::Connecting);
    assert_eq!(session.status().progress, 0.0);
    assert!(channel.emitted().is_empty());
}

#[test]
fn progress_is_folded_in_arrival_order() {
    let (mut session, channel) = started(built_config(3), 3);
    let mut history = MetricsHistory::attach(session.subscribe(MetricsHistory::FILTER).unwrap());

    channel.push(progress(1, 33.3, 0.5));
    channel.push(progress(2, 66.6, 0.71234));
    channel.push(progress(3, 90.0, 0.9));
    assert_eq!(session.pump(), 3);
    assert_eq!(history.pump(), 3);

    assert_eq!(session.phase(), Phase::Training);
    assert_eq!(session.status().progress, 90.0);
    assert_eq!(session.status().estimated_time, "27s");
    assert_eq!(session.status().metrics.map(|m| m.accuracy), Some(0.9));

    let epochs: Vec<u32> = history.points().iter().map(|p| p.epoch).collect();
    assert_eq!(epochs, [1, 2, 3]);
    assert_eq!(history.points()[1].accuracy, 71.23);
    assert_eq!(history.points()[1].recall, 25.0);
}

#[test]
fn late_test_metrics_follow_completion() {
    let (mut session, channel) = started(built_config(2), 1);
    channel.push(progress(1, 100.0, 0.8));
    channel.push(ServerEvent::Complete);
    channel.push(test_metrics());
    session.pump();

    assert_eq!(session.phase(), Phase::Evaluated);
    assert!(!channel.is_open());
    let status = session.status();
    assert_eq!(status.progress, 100.0);
    assert!(!status.is_training);
    assert_eq!(status.confusion_matrix, vec![vec![5, 1], vec![2, 8]]);
    assert_eq!(status.test_metrics.map(|m| m.accuracy), Some(0.8125));
}

#[test]
fn completion_may_trail_test_metrics() {
    let (mut session, channel) = started(built_config(2), 1);
    channel.push(progress(1, 80.0, 0.8));
    channel.push(test_metrics());
    channel.push(ServerEvent::Complete);
    session.pump();

    assert_eq!(session.phase(), Phase::Evaluated);
    assert_eq!(session.status().progress, 100.0);
}

#[test]
fn lost_connection_returns_to_idle() {
    let (mut session, channel) = started(built_config(3), 4);
    channel.push(progress(1, 25.0, 0.4));
    channel.push(ServerEvent::Disconnected { reason: "transport close".into() });
    session.pump();

    assert_eq!(session.phase(), Phase::Idle);
    assert_eq!(session.last_error(), Some("Connection lost: transport close"));
    assert!(!session.status().is_training);
    assert_eq!(session.status().progress, 25.0);
}

#[test]
fn failed_config_fetch_closes_the_channel() {
    let channel = MemoryChannel::new();
    let connector = MemoryConnector::new(channel.clone());
    let mut session = TrainingSession::new(|| -> Result<ModelConfig, ClientError> {
        Err(ClientError::Backend {
            status: 500,
            message: "Failed to fetch model configuration".into(),
        })
    });
    session.start(&connector, 3).unwrap();
    channel.push(ServerEvent::Connected);
    session.pump();

    assert_eq!(session.phase(), Phase::Idle);
    assert_eq!(session.last_error(), Some("Failed to fetch model configuration"));
    assert!(!channel.is_open());
    assert!(channel.emitted().is_empty());
}

#[test]
fn unbuilt_model_is_not_sent() {
    let store = ModelStore::new();
    store.add_layer(LayerKind::Dense).unwrap();
    let (session, channel) = started(store.snapshot().as_ref().clone(), 3);

    assert_eq!(session.phase(), Phase::Idle);
    assert_eq!(session.last_error(), Some(RequestError::MissingInputSize.to_string().as_str()));
    assert!(channel.emitted().is_empty());
}

#[test]
fn refused_connection_is_reported() {
    let mut session = TrainingSession::new(saved(built_config(3)));
    let err = session.start(&MemoryConnector::refusing(), 3).unwrap_err();

    assert!(matches!(err, SessionError::Channel(_)));
    assert_eq!(session.phase(), Phase::Idle);
    assert!(session.last_error().unwrap().starts_with("Failed to connect"));
}

#[test]
fn start_is_rejected_while_running_or_without_epochs() {
    let mut idle = TrainingSession::new(saved(built_config(3)));
    let connector = MemoryConnector::new(MemoryChannel::new());
    assert!(matches!(
        idle.start(&connector, 0),
        Err(SessionError::Request(RequestError::NoEpochs))
    ));

    let (mut session, _channel) = started(built_config(3), 2);
    assert!(matches!(session.start(&connector, 2), Err(SessionError::AlreadyRunning)));
}

#[test]
fn detach_unregisters_every_listener() {
    let (mut session, channel) = started(built_config(3), 2);
    let mut history = MetricsHistory::attach(session.subscribe(MetricsHistory::FILTER).unwrap());
    assert_eq!(channel.listener_count(), 2);

    session.detach();
    history.detach();
    assert_eq!(session.phase(), Phase::Idle);
    assert!(!channel.is_open());
    assert_eq!(channel.listener_count(), 0);
}

#[test]
fn a_new_run_starts_from_a_clean_status() {
    let (mut session, channel) = started(built_config(2), 1);
    channel.push(ServerEvent::Complete);
    channel.push(test_metrics());
    session.pump();
    assert_eq!(session.phase(), Phase::Evaluated);

    let next = MemoryChannel::new();
    session.start(&MemoryConnector::new(next.clone()), 2).unwrap();
    assert_eq!(session.phase(), Phase::Connecting);
    assert_eq!(session.status().progress, 0.0);
    assert!(session.status().confusion_matrix.is_empty());
    assert_eq!(session.epochs(), 2);
}
