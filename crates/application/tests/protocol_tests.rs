use application::{DispatchOutcome, GatewayProtocol};
use domain::device::{Device, DeviceKind, DeviceProperties, LightProperties, PlugProperties};
use domain::gateway::StatusReason;
use domain::model::AssetModel;
use domain::transport::Method;
use domain::{
    AttributeId, ChangeEvent, ConfigurationId, ConnectionStatus, DeviceKey, DomainError,
    ProtocolConfiguration,
};
use infrastructure::simulator::{SimulatedGateway, device_payload};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};

const CODE: &str = "secret";
const LIGHT: u32 = 65537;
const PLUG: u32 = 65538;
const REMOTE: u32 = 65539;
const BLIND: u32 = 65540;

// --- Recording asset model ---

struct RecordingModel {
    statuses: Mutex<Vec<(ConfigurationId, ConnectionStatus)>>,
    discovered: Mutex<Vec<(ConfigurationId, DeviceKey)>>,
    events: mpsc::UnboundedSender<(ConfigurationId, ChangeEvent)>,
}

impl RecordingModel {
    fn new() -> (Arc<Self>, EventStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                statuses: Mutex::new(Vec::new()),
                discovered: Mutex::new(Vec::new()),
                events: tx,
            }),
            rx,
        )
    }

    fn statuses_of(&self, configuration: &str) -> Vec<ConnectionStatus> {
        self.statuses
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id.as_str() == configuration)
            .map(|(_, status)| status.clone())
            .collect()
    }

    fn discovered_by(&self, configuration: &str) -> Vec<DeviceKey> {
        self.discovered
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id.as_str() == configuration)
            .map(|(_, key)| *key)
            .collect()
    }
}

impl AssetModel for RecordingModel {
    fn on_device_discovered(&self, configuration: &ConfigurationId, device: &Arc<Device>) {
        self.discovered
            .lock()
            .unwrap()
            .push((configuration.clone(), device.key()));
    }

    fn on_status_change(&self, configuration: &ConfigurationId, status: &ConnectionStatus) {
        self.statuses
            .lock()
            .unwrap()
            .push((configuration.clone(), status.clone()));
    }

    fn on_device_event(&self, configuration: &ConfigurationId, event: &ChangeEvent) {
        let _ = self.events.send((configuration.clone(), event.clone()));
    }
}

// --- Helpers ---

fn gateway() -> SimulatedGateway {
    SimulatedGateway::new(CODE)
        .with_device(device_payload(
            LIGHT,
            "Living room",
            DeviceProperties::Light(LightProperties {
                on: true,
                brightness: 100,
                colour_hex: Some("f1e0b5".to_string()),
                ..Default::default()
            }),
        ))
        .with_device(device_payload(
            PLUG,
            "Kettle",
            DeviceProperties::Plug(PlugProperties { on: false }),
        ))
        .with_device(device_payload(REMOTE, "Remote", DeviceProperties::Remote))
        .with_device(json!({ "9001": "Blind", "9003": BLIND, "5750": 7 }))
}

type EventStream = mpsc::UnboundedReceiver<(ConfigurationId, ChangeEvent)>;

fn protocol(gateway: &SimulatedGateway) -> (GatewayProtocol, Arc<RecordingModel>, EventStream) {
    let (model, events) = RecordingModel::new();
    let protocol = GatewayProtocol::new(Arc::new(gateway.clone()), model.clone());
    (protocol, model, events)
}

fn config(id: &str, host: &str) -> ProtocolConfiguration {
    ProtocolConfiguration::new(id, host).with_security_code(CODE)
}

fn key(kind: DeviceKind, instance_id: u32) -> DeviceKey {
    DeviceKey::new(kind, instance_id)
}

async fn next_event(
    events: &mut mpsc::UnboundedReceiver<(ConfigurationId, ChangeEvent)>,
) -> Option<(ConfigurationId, ChangeEvent)> {
    timeout(Duration::from_millis(500), events.recv()).await.ok().flatten()
}

async fn assert_no_event(events: &mut mpsc::UnboundedReceiver<(ConfigurationId, ChangeEvent)>) {
    let extra = timeout(Duration::from_millis(100), events.recv()).await;
    assert!(extra.is_err(), "unexpected event: {:?}", extra);
}

// --- Scenarios ---

#[tokio::test]
async fn test_attach_discovers_every_device() {
    let gateway = gateway();
    let (protocol, model, _events) = protocol(&gateway);

    let status = protocol.attach(&config("home", "10.0.0.2")).await;

    assert_eq!(status, ConnectionStatus::Connected);
    assert_eq!(
        model.statuses_of("home"),
        vec![
            ConnectionStatus::Disconnected,
            ConnectionStatus::Connecting,
            ConnectionStatus::Connected
        ]
    );
    assert_eq!(
        model.discovered_by("home"),
        vec![
            key(DeviceKind::Light, LIGHT),
            key(DeviceKind::Plug, PLUG),
            key(DeviceKind::Remote, REMOTE),
            key(DeviceKind::Unknown, BLIND),
        ]
    );
}

#[tokio::test]
async fn test_refused_connect_reports_single_error() {
    let gateway = gateway();
    let (protocol, model, _events) = protocol(&gateway);
    let attribute = AttributeId::new("tradfri_65537", "lightStatus");

    // no security code
    let status = protocol
        .attach(&ProtocolConfiguration::new("office", "10.0.0.5"))
        .await;

    assert!(matches!(status, ConnectionStatus::Error(StatusReason::Connection(_))));
    let errors = model
        .statuses_of("office")
        .into_iter()
        .filter(ConnectionStatus::is_error)
        .count();
    assert_eq!(errors, 1);
    assert!(model.discovered_by("office").is_empty());
    let office = ConfigurationId::new("office");
    assert!(
        !protocol
            .link_attribute(attribute, &office, &key(DeviceKind::Light, LIGHT))
            .await
    );
    assert!(protocol.bindings().is_empty());
}

#[tokio::test]
async fn test_missing_host_is_configuration_error() {
    let gateway = gateway();
    let (protocol, model, _events) = protocol(&gateway);

    let status = protocol.attach(&config("broken", "   ")).await;

    assert!(matches!(status, ConnectionStatus::Error(StatusReason::Configuration(_))));
    assert_eq!(model.statuses_of("broken"), vec![status]);
    assert!(protocol.registry().is_empty().await);
    assert_eq!(gateway.sessions_opened(), 0);

    protocol.detach(&ConfigurationId::new("broken")).await;
    assert!(protocol.configurations().is_empty());
}

#[tokio::test]
async fn test_plug_write_sends_single_put() {
    let gateway = gateway();
    let (protocol, _model, _events) = protocol(&gateway);
    let home = ConfigurationId::new("home");
    let attribute = AttributeId::new("kettle", "plugOnOrOff");

    protocol.attach(&config("home", "10.0.0.2")).await;
    assert!(
        protocol
            .link_attribute(attribute.clone(), &home, &key(DeviceKind::Plug, PLUG))
            .await
    );

    let outcome = protocol.write(&attribute, json!(true)).await;

    assert_eq!(outcome, DispatchOutcome::Sent);
    let puts = gateway.requests_with(Method::Put);
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].path, "15001/65538");
    assert_eq!(puts[0].payload, Some(json!({ "3312": [{ "5850": 1 }] })));
}

#[tokio::test]
async fn test_out_of_range_dim_is_rejected() {
    let gateway = gateway();
    let (protocol, _model, _events) = protocol(&gateway);
    let home = ConfigurationId::new("home");
    let attribute = AttributeId::new("tradfri_65537", "lightDimLevel");

    protocol.attach(&config("home", "10.0.0.2")).await;
    assert!(protocol.link_asset_attribute(attribute.clone(), &home).await);

    let outcome = protocol.write(&attribute, json!(256)).await;

    assert!(matches!(outcome, DispatchOutcome::Dropped(DomainError::InvalidValue(_))));
    assert!(gateway.requests_with(Method::Put).is_empty());
}

#[tokio::test]
async fn test_dim_change_emits_one_event() {
    let gateway = gateway();
    let (protocol, _model, mut events) = protocol(&gateway);

    protocol.attach(&config("home", "10.0.0.2")).await;
    gateway
        .update_device(LIGHT, json!({ "3311": [{ "5851": 200 }] }))
        .await;

    let (configuration, event) = next_event(&mut events).await.expect("dim event");
    assert_eq!(configuration.as_str(), "home");
    match event {
        ChangeEvent::LightDimLevel { device, old, new } => {
            assert_eq!(device.instance_id(), LIGHT);
            assert_eq!(old.brightness, 100);
            assert_eq!(new.brightness, 200);
            assert_eq!(new.colour_hex, old.colour_hex);
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert_no_event(&mut events).await;
}

#[tokio::test]
async fn test_shared_gateway_survives_first_detach() {
    let gateway = gateway();
    let (protocol, model, mut events) = protocol(&gateway);
    let first = ConfigurationId::new("first");
    let second = ConfigurationId::new("second");
    let attribute = AttributeId::new("kettle", "plugOnOrOff");

    protocol.attach(&config("first", "10.0.0.9")).await;
    protocol.attach(&config("second", "10.0.0.9")).await;
    assert_eq!(gateway.sessions_opened(), 1);
    assert_eq!(protocol.registry().len().await, 1);
    assert_eq!(model.discovered_by("second").len(), 4);
    assert!(
        protocol
            .link_attribute(attribute.clone(), &second, &key(DeviceKind::Plug, PLUG))
            .await
    );

    protocol.detach(&first).await;

    let connection = protocol
        .registry()
        .lookup(&domain::GatewayAddress::new("10.0.0.9").unwrap())
        .await
        .expect("connection kept for second configuration");
    assert!(connection.status().is_connected());
    assert_eq!(protocol.write(&attribute, json!(true)).await, DispatchOutcome::Sent);

    // only the remaining configuration hears about the plug switching on
    let (configuration, event) = next_event(&mut events).await.expect("plug event");
    assert_eq!(configuration, second);
    assert!(matches!(event, ChangeEvent::PlugOnOff { new, .. } if new.on));
    assert_no_event(&mut events).await;
}

#[tokio::test]
async fn test_no_events_after_last_detach() {
    let gateway = gateway();
    let (protocol, model, mut events) = protocol(&gateway);

    protocol.attach(&config("home", "10.0.0.2")).await;
    protocol.detach(&ConfigurationId::new("home")).await;

    assert!(protocol.registry().is_empty().await);
    assert_eq!(gateway.observer_count(LIGHT), 0);
    assert_eq!(
        gateway
            .update_device(LIGHT, json!({ "3311": [{ "5850": 0 }] }))
            .await,
        0
    );
    assert_no_event(&mut events).await;
    // the detached configuration no longer hears status changes
    assert_eq!(
        model.statuses_of("home").last(),
        Some(&ConnectionStatus::Connected)
    );
}

#[tokio::test]
async fn test_disabled_configuration_ignores_writes() {
    let gateway = gateway();
    let (protocol, _model, _events) = protocol(&gateway);
    let home = ConfigurationId::new("home");
    let attribute = AttributeId::new("desk", "lightStatus");

    protocol.attach(&config("home", "10.0.0.2").disabled()).await;
    protocol
        .link_attribute(attribute.clone(), &home, &key(DeviceKind::Light, LIGHT))
        .await;

    assert_eq!(protocol.write(&attribute, json!(false)).await, DispatchOutcome::Ignored);

    assert!(protocol.set_enabled(&home, true));
    assert_eq!(protocol.write(&attribute, json!(false)).await, DispatchOutcome::Sent);
    assert_eq!(gateway.requests_with(Method::Put).len(), 1);
}

#[tokio::test]
async fn test_unbound_and_unsupported_writes_are_dropped() {
    let gateway = gateway();
    let (protocol, _model, _events) = protocol(&gateway);
    let home = ConfigurationId::new("home");
    let light_attribute = AttributeId::new("desk", "plugOnOrOff");

    protocol.attach(&config("home", "10.0.0.2")).await;

    let outcome = protocol
        .write(&AttributeId::new("nowhere", "lightStatus"), json!(true))
        .await;
    assert!(matches!(outcome, DispatchOutcome::Dropped(DomainError::UnboundAttribute(_))));

    // remote and unknown devices accept no commands
    for device in [key(DeviceKind::Remote, REMOTE), key(DeviceKind::Unknown, BLIND)] {
        assert!(
            !protocol
                .link_attribute(AttributeId::new("x", "lightStatus"), &home, &device)
                .await
        );
    }

    protocol
        .link_attribute(light_attribute.clone(), &home, &key(DeviceKind::Light, LIGHT))
        .await;
    let outcome = protocol.write(&light_attribute, json!(true)).await;
    assert!(matches!(
        outcome,
        DispatchOutcome::Dropped(DomainError::UnsupportedCommand { .. })
    ));
    assert!(gateway.requests_with(Method::Put).is_empty());
}

#[tokio::test]
async fn test_binding_is_first_writer_wins() {
    let gateway = gateway();
    let (protocol, _model, _events) = protocol(&gateway);
    let home = ConfigurationId::new("home");
    let attribute = AttributeId::new("switch", "lightStatus");

    protocol.attach(&config("home", "10.0.0.2")).await;

    assert!(
        protocol
            .link_attribute(attribute.clone(), &home, &key(DeviceKind::Light, LIGHT))
            .await
    );
    assert!(
        !protocol
            .link_attribute(attribute.clone(), &home, &key(DeviceKind::Light, LIGHT))
            .await
    );
    assert_eq!(protocol.bindings().len(), 1);

    assert!(protocol.unlink_attribute(&attribute).is_some());
    assert!(protocol.unlink_attribute(&attribute).is_none());
}

#[tokio::test]
async fn test_decode_error_keeps_observing() {
    let gateway = gateway();
    let (protocol, _model, mut events) = protocol(&gateway);

    protocol.attach(&config("home", "10.0.0.2")).await;

    gateway.push(LIGHT, json!({ "3311": "garbage" })).await;
    gateway
        .update_device(LIGHT, json!({ "3311": [{ "5850": 0 }] }))
        .await;

    let (_, event) = next_event(&mut events).await.expect("on/off event");
    assert!(matches!(event, ChangeEvent::LightOnOff { new, .. } if !new.on));
}

#[tokio::test]
async fn test_remote_notification_emits_event() {
    let gateway = gateway();
    let (protocol, _model, mut events) = protocol(&gateway);

    protocol.attach(&config("home", "10.0.0.2")).await;
    gateway
        .push(REMOTE, device_payload(REMOTE, "Remote", DeviceProperties::Remote))
        .await;

    let (_, event) = next_event(&mut events).await.expect("remote event");
    assert!(matches!(event, ChangeEvent::Remote { device } if device.instance_id() == REMOTE));
    assert_no_event(&mut events).await;
}

#[tokio::test]
async fn test_stream_failure_reaches_model() {
    let gateway = gateway();
    let (protocol, model, _events) = protocol(&gateway);

    protocol.attach(&config("home", "10.0.0.2")).await;
    gateway
        .push_error(PLUG, DomainError::Transport("4.03 Forbidden".to_string()))
        .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(matches!(
        model.statuses_of("home").last(),
        Some(ConnectionStatus::Error(StatusReason::Transport(_)))
    ));
}

#[tokio::test]
async fn test_reattach_replaces_configuration() {
    let gateway = gateway();
    let (protocol, _model, _events) = protocol(&gateway);
    let home = ConfigurationId::new("home");
    let attribute = AttributeId::new("kettle", "plugOnOrOff");

    protocol.attach(&config("home", "10.0.0.2")).await;
    protocol
        .link_attribute(attribute.clone(), &home, &key(DeviceKind::Plug, PLUG))
        .await;

    let status = protocol.attach(&config("home", "10.0.0.2")).await;

    assert_eq!(status, ConnectionStatus::Connected);
    assert_eq!(protocol.configurations().len(), 1);
    assert!(protocol.bindings().is_empty());
    assert_eq!(gateway.sessions_opened(), 2);
}
