//! HTTP front end.
//!
//! - `GET /ws` upgrades to the viewer push protocol
//! - `GET /api/presets` lists the configured alarm presets
//! - everything else is served from the web root, if one is configured
//!
//! Plain HTTP goes through [`serve`], HTTPS through [`serve_tls`] with a
//! certificate loaded once by [`load_tls`].

pub mod messages;
pub mod session;

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        ConnectInfo, State, WebSocketUpgrade,
    },
    http::{header, HeaderValue},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use futures::{future, SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::{services::ServeDir, set_header::SetResponseHeaderLayer};
use tracing::{debug, info, warn};

use crate::ble::transport::Transport;
use crate::config::AlarmPreset;
use crate::device::DeviceSession;

pub use messages::{ClientCommand, ServerMessage, StateUpdate};
pub use session::{PoweroffHook, TelemetrySession, ViewerError, ViewerFrame};

/// Shared state of the HTTP handlers.
pub struct AppState<T: Transport> {
    /// The device every viewer watches.
    pub device: Arc<DeviceSession<T>>,
    /// Presets served by `/api/presets`.
    pub presets: Arc<Vec<AlarmPreset>>,
    /// Run on `poweroff` commands; `None` refuses them.
    pub poweroff: Option<PoweroffHook>,
    /// Flips to `true` when the server is shutting down.
    pub shutdown: watch::Receiver<bool>,
}

impl<T: Transport> Clone for AppState<T> {
    fn clone(&self) -> Self {
        Self {
            device: self.device.clone(),
            presets: self.presets.clone(),
            poweroff: self.poweroff.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

/// Build the router.
pub fn router<T: Transport>(state: AppState<T>, webroot: Option<&Path>) -> Router {
    let app = Router::new()
        .route("/ws", get(ws_handler::<T>))
        .route("/api/presets", get(presets_handler::<T>))
        .with_state(state);

    match webroot {
        Some(root) => {
            let files = Router::new()
                .fallback_service(ServeDir::new(root))
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("max-age=0"),
                ));
            app.merge(files)
        }
        None => app,
    }
}

/// Serve `app` on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
}

/// Time open connections get to finish once an HTTPS shutdown starts.
pub const TLS_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Load a PEM certificate chain and private key.
pub async fn load_tls(cert: &Path, key: &Path) -> std::io::Result<RustlsConfig> {
    let tls = RustlsConfig::from_pem_file(cert, key).await?;
    debug!("Loaded TLS certificate {}", cert.display());
    Ok(tls)
}

/// Serve `app` over HTTPS on `addr` until `shutdown` resolves.
pub async fn serve_tls(
    addr: SocketAddr,
    tls: RustlsConfig,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    serve_tls_with_handle(addr, tls, app, shutdown, Handle::new()).await
}

async fn serve_tls_with_handle(
    addr: SocketAddr,
    tls: RustlsConfig,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
    handle: Handle,
) -> std::io::Result<()> {
    let stopper = handle.clone();
    let watcher = tokio::spawn(async move {
        shutdown.await;
        stopper.graceful_shutdown(Some(TLS_SHUTDOWN_GRACE));
    });

    let result = axum_server::bind_rustls(addr, tls)
        .handle(handle)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await;

    watcher.abort();
    result
}

async fn presets_handler<T: Transport>(State(state): State<AppState<T>>) -> impl IntoResponse {
    Json(state.presets.as_ref().clone())
}

/// WebSocket upgrade handler.
async fn ws_handler<T: Transport>(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState<T>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, peer, state))
}

/// Handle a WebSocket connection.
async fn handle_socket<T: Transport>(socket: WebSocket, peer: SocketAddr, state: AppState<T>) {
    let (sender, receiver) = socket.split();

    let frames = receiver.map(|message| match message {
        Ok(message) => viewer_frame(message),
        Err(e) => {
            debug!("WebSocket receive error from {}: {}", peer, e);
            ViewerFrame::Close
        }
    });
    let out = sender.with(|text: String| future::ready(Ok::<_, axum::Error>(Message::Text(text.into()))));

    let session = TelemetrySession::new(state.device.clone())
        .with_peer(Some(peer))
        .with_poweroff(state.poweroff.clone());

    let mut shutdown = state.shutdown.clone();
    tokio::select! {
        result = session.run(frames, out) => {
            if let Err(e) = result {
                warn!("Viewer {} dropped: {}", peer, e);
            }
        }
        Ok(_) = shutdown.wait_for(|stopping| *stopping) => {
            info!("Closing viewer {} for shutdown", peer);
        }
    }
}

fn viewer_frame(message: Message) -> ViewerFrame {
    match message {
        Message::Text(text) => ViewerFrame::Text(text.as_str().to_owned()),
        Message::Binary(data) => ViewerFrame::Binary(data.to_vec()),
        Message::Ping(_) => ViewerFrame::Ping,
        Message::Pong(_) => ViewerFrame::Pong,
        Message::Close(_) => ViewerFrame::Close,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::mock::MockTransport;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn get(addr: SocketAddr, path: &str) -> String {
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
            path
        );
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    async fn start(webroot: Option<&Path>) -> (SocketAddr, watch::Sender<bool>) {
        let (stop_tx, stop_rx) = watch::channel(false);
        let state = AppState {
            device: Arc::new(DeviceSession::new(MockTransport::new("AA:BB"))),
            presets: Arc::new(vec![AlarmPreset {
                name: "beef".to_string(),
                min_temp: None,
                max_temp: 57.0,
            }]),
            poweroff: None,
            shutdown: stop_rx.clone(),
        };

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(state, webroot);

        let mut stop = stop_rx;
        tokio::spawn(serve(listener, app, async move {
            let _ = stop.wait_for(|s| *s).await;
        }));
        (addr, stop_tx)
    }

    #[test]
    fn test_viewer_frame_mapping() {
        assert_eq!(
            viewer_frame(Message::Text("hi".into())),
            ViewerFrame::Text("hi".to_string())
        );
        assert_eq!(
            viewer_frame(Message::Binary(vec![1u8, 2].into())),
            ViewerFrame::Binary(vec![1, 2])
        );
        assert_eq!(viewer_frame(Message::Close(None)), ViewerFrame::Close);
    }

    #[tokio::test]
    async fn test_presets_endpoint() {
        let (addr, stop) = start(None).await;
        let response = get(addr, "/api/presets").await;

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains(r#"[{"name":"beef","min_temp":null,"max_temp":57.0}]"#));
        stop.send(true).unwrap();
    }

    #[tokio::test]
    async fn test_webroot_served_without_caching() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>iBBQ</h1>").unwrap();

        let (addr, stop) = start(Some(dir.path())).await;
        let response = get(addr, "/").await;

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.to_ascii_lowercase().contains("cache-control: max-age=0"));
        assert!(response.ends_with("<h1>iBBQ</h1>"));
        stop.send(true).unwrap();
    }

    fn fixture(name: &str) -> std::path::PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join(name)
    }

    #[tokio::test]
    async fn test_load_tls_pair() {
        assert!(load_tls(&fixture("localhost.crt"), &fixture("localhost.key"))
            .await
            .is_ok());

        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.pem");
        assert!(load_tls(&missing, &fixture("localhost.key")).await.is_err());

        // A key file that holds no key
        assert!(load_tls(&fixture("localhost.crt"), &fixture("localhost.crt"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_tls_server_listens_and_stops() {
        let (stop_tx, stop_rx) = watch::channel(false);
        let state = AppState {
            device: Arc::new(DeviceSession::new(MockTransport::new("AA:BB"))),
            presets: Arc::new(Vec::new()),
            poweroff: None,
            shutdown: stop_rx.clone(),
        };
        let tls = load_tls(&fixture("localhost.crt"), &fixture("localhost.key"))
            .await
            .unwrap();

        let handle = Handle::new();
        let mut stop = stop_rx;
        let server = tokio::spawn(serve_tls_with_handle(
            "127.0.0.1:0".parse().unwrap(),
            tls,
            router(state, None),
            async move {
                let _ = stop.wait_for(|s| *s).await;
            },
            handle.clone(),
        ));

        let addr = handle.listening().await.expect("server bound");
        assert!(tokio::net::TcpStream::connect(addr).await.is_ok());

        stop_tx.send(true).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(10), server)
            .await
            .expect("server stopped")
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_no_webroot_is_not_found() {
        let (addr, stop) = start(None).await;
        let response = get(addr, "/index.html").await;
        assert!(response.starts_with("HTTP/1.1 404"));
        stop.send(true).unwrap();
    }
}
