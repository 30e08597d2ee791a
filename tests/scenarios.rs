//! End-to-end scenarios against the public API, with an in-memory thermometer.

use std::sync::Arc;
use std::time::Duration;

use futures::channel::mpsc;
use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use ibbq_rust_ble::ble::CharacteristicRole;
use ibbq_rust_ble::{
    ConnectionState, DeviceAddress, DeviceManager, DeviceSession, Error, MockTransport,
    TelemetrySession, Unit, ViewerFrame,
};

async fn wait_for_state(session: &DeviceSession<MockTransport>, state: ConnectionState) {
    for _ in 0..100 {
        if session.connection_state() == state {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("never reached {}", state);
}

#[tokio::test(start_paused = true)]
async fn test_reconnects_once_discoverable_and_decodes_readings() {
    let transport = MockTransport::new("AA:BB");
    transport.set_discoverable(false);
    let address = DeviceAddress::from("AA:BB");
    let session = Arc::new(DeviceSession::new(transport));
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);

    // A direct attempt fails while the thermometer is out of range
    let result = session.connect(Some(&address)).await;
    assert!(matches!(result, Err(Error::DeviceNotFound { .. })));

    let manager = DeviceManager::new(session.clone()).with_address(Some(address));
    manager.start();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);

    session.transport().set_discoverable(true);
    wait_for_state(&session, ConnectionState::Subscribed).await;

    assert!(session.transport().notify_realtime(&[0x00, 0x02, 0xD0, 0x02]).await);
    tokio::time::sleep(Duration::from_millis(10)).await;
    let reading = session.latest().expect("reading appended");
    assert_eq!(reading.probes, vec![Some(51.2), Some(72.0)]);

    manager.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_settings_survive_reconnect() {
    let session = Arc::new(DeviceSession::new(MockTransport::new("AA:BB")).with_unit(Unit::Celsius));
    let manager = DeviceManager::new(session.clone());
    manager.start();
    wait_for_state(&session, ConnectionState::Subscribed).await;

    session
        .set_target_temperature(1, Some("pork".into()), None, Some(63.0))
        .await
        .unwrap();

    session.transport().clear_writes();
    session.transport().drop_link().await;
    wait_for_state(&session, ConnectionState::Disconnected).await;
    wait_for_state(&session, ConnectionState::Subscribed).await;

    let frames = session
        .transport()
        .writes_to(CharacteristicRole::SettingsUpdate);
    // Unit, target, then realtime and battery enables
    assert_eq!(
        frames,
        vec![
            vec![0x02, 0x00, 0x00, 0x00, 0x00, 0x00],
            vec![0x01, 0x01, 0x48, 0xF4, 0x76, 0x02],
            vec![0x0B, 0x01, 0x00, 0x00, 0x00, 0x00],
            vec![0x08, 0x24, 0x00, 0x00, 0x00, 0x00],
        ]
    );
    assert_eq!(session.targets().get(1).unwrap().max_temp_c, 63.0);

    manager.stop().await.unwrap();
}

#[tokio::test]
async fn test_alarm_and_silence() {
    let session = DeviceSession::new(MockTransport::new("AA:BB"));
    session.connect(None).await.unwrap();
    session.subscribe().await.unwrap();
    session
        .set_target_temperature(0, None, None, Some(70.0))
        .await
        .unwrap();

    // 72.0 C on probe 0, probe 1 unplugged
    session.handle_notification(
        &CharacteristicRole::RealtimeTempNotify.uuid(),
        &[0xD0, 0x02, 0xF6, 0xFF],
    );
    assert!(session.alert());

    session.silence_alarm(None).await.unwrap();
    assert!(!session.alert());

    // Changing the target lifts the silence
    session
        .set_target_temperature(0, None, None, Some(71.0))
        .await
        .unwrap();
    assert!(session.alert());
}

struct Viewer {
    frames: mpsc::UnboundedSender<ViewerFrame>,
    out: mpsc::UnboundedReceiver<String>,
}

impl Viewer {
    fn attach(session: Arc<DeviceSession<MockTransport>>) -> Self {
        let (frames, frames_rx) = mpsc::unbounded();
        let (out_tx, out) = mpsc::unbounded();
        tokio::spawn(TelemetrySession::new(session).run(frames_rx, out_tx));
        Self { frames, out }
    }

    async fn next(&mut self) -> Value {
        let text = tokio::time::timeout(Duration::from_secs(1), self.out.next())
            .await
            .expect("viewer got no message")
            .expect("viewer session ended");
        serde_json::from_str(&text).unwrap()
    }

    fn command(&self, command: Value) {
        self.frames
            .unbounded_send(ViewerFrame::Text(command.to_string()))
            .unwrap();
    }
}

#[tokio::test]
async fn test_viewer_full_history_after_clear() {
    let session = Arc::new(DeviceSession::new(MockTransport::new("AA:BB")));
    session.connect(None).await.unwrap();
    session.subscribe().await.unwrap();
    session.handle_notification(&CharacteristicRole::RealtimeTempNotify.uuid(), &[0xD0, 0x02]);

    let mut viewer = Viewer::attach(session.clone());
    assert_eq!(viewer.next().await, json!({"cmd": "unit_update", "unit": "F"}));

    let state = viewer.next().await;
    assert_eq!(state["cmd"], "state_update");
    assert_eq!(state["full_history"], true);
    assert_eq!(state["probe_readings"][0]["probes"], json!([72.0]));

    viewer.command(json!({"cmd": "clear_history"}));
    let state = viewer.next().await;
    assert_eq!(state["full_history"], true);
    assert_eq!(state["probe_readings"][0]["probes"], json!([]));
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn test_every_viewer_wakes_on_change() {
    let session = Arc::new(DeviceSession::new(MockTransport::new("AA:BB")));
    let mut viewers: Vec<Viewer> = (0..3).map(|_| Viewer::attach(session.clone())).collect();
    for viewer in viewers.iter_mut() {
        viewer.next().await;
        viewer.next().await;
    }

    session.handle_notification(&CharacteristicRole::RealtimeTempNotify.uuid(), &[0xC8, 0x00]);
    for viewer in viewers.iter_mut() {
        let state = viewer.next().await;
        assert_eq!(state["probe_readings"][0]["probes"], json!([20.0]));
    }
}
