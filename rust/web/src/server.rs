use crate::events::EventBus;
use crate::gateway::SessionGateway;
use crate::handlers;
use crate::metrics::MetricsCollector;
use crate::recorder::InMemoryRecorder;
use crate::settings::{GatewaySettings, SettingsError};
use std::convert::Infallible;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use warp::filters::BoxedFilter;
use warp::reply::{self, Reply};
use warp::Filter;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    host: String,
    port: u16,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn for_tests() -> Self {
        Self::new("127.0.0.1", 0)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

/// Shared components every route and connection actor works against.
#[derive(Clone)]
pub struct AppContext {
    config: ServerConfig,
    event_bus: EventBus,
    gateway: SessionGateway,
    recorder: Arc<InMemoryRecorder>,
    metrics: MetricsCollector,
}

impl AppContext {
    pub fn new(config: ServerConfig, settings: GatewaySettings) -> Result<Self, ServerError> {
        settings.validate()?;
        let event_bus = EventBus::new();
        let recorder = Arc::new(InMemoryRecorder::new(settings.bot_identity.clone()));
        let metrics = MetricsCollector::new();
        let gateway = SessionGateway::new(
            settings,
            Arc::new(event_bus.clone()),
            Arc::clone(&recorder) as Arc<dyn crate::recorder::MatchRecorder>,
            Arc::new(metrics.clone()),
        );

        Ok(Self {
            config,
            event_bus,
            gateway,
            recorder,
            metrics,
        })
    }

    pub fn new_for_tests(settings: GatewaySettings) -> Result<Self, ServerError> {
        Self::new(ServerConfig::for_tests(), settings)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn event_bus(&self) -> EventBus {
        self.event_bus.clone()
    }

    pub fn gateway(&self) -> SessionGateway {
        self.gateway.clone()
    }

    pub fn recorder(&self) -> Arc<InMemoryRecorder> {
        Arc::clone(&self.recorder)
    }

    pub fn metrics(&self) -> MetricsCollector {
        self.metrics.clone()
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

#[derive(Clone)]
pub struct WebServer {
    context: AppContext,
}

impl WebServer {
    pub fn new(config: ServerConfig, settings: GatewaySettings) -> Result<Self, ServerError> {
        let context = AppContext::new(config, settings)?;
        Ok(Self { context })
    }

    pub fn from_context(context: AppContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub async fn start(self) -> Result<ServerHandle, ServerError> {
        let WebServer { context } = self;
        let bind_addr = Self::bind_addr(context.config())?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let routes = Self::routes(&context);
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
        };

        let (addr, server_future) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(bind_addr, shutdown_signal)
            .map_err(Self::map_warp_error)?;

        tracing::info!(address = %addr, "web server listening");

        let task = tokio::spawn(async move {
            server_future.await;
            Ok(())
        });

        Ok(ServerHandle::new(addr, shutdown_tx, task, context))
    }

    fn bind_addr(config: &ServerConfig) -> Result<SocketAddr, ServerError> {
        let host = config.host();

        if let Ok(addr) = host.parse::<SocketAddr>() {
            return Ok(addr);
        }

        if let Ok(ip) = host.parse::<std::net::IpAddr>() {
            return Ok(SocketAddr::new(ip, config.port()));
        }

        let candidate = format!("{}:{}", host, config.port());
        let mut addrs = candidate.to_socket_addrs().map_err(|err| {
            ServerError::ConfigError(format!("failed to resolve address `{candidate}`: {err}"))
        })?;

        addrs.next().ok_or_else(|| {
            ServerError::ConfigError(format!("failed to resolve address `{candidate}`"))
        })
    }

    fn map_warp_error(err: warp::Error) -> ServerError {
        use std::error::Error as StdError;

        if let Some(source) = err.source() {
            if let Some(io_err) = source.downcast_ref::<std::io::Error>() {
                let recreated = std::io::Error::new(io_err.kind(), io_err.to_string());
                return ServerError::BindError(recreated);
            }
        }

        ServerError::ConfigError(err.to_string())
    }

    /// Every route the server exposes, with request logging.
    pub fn routes(context: &AppContext) -> BoxedFilter<(warp::reply::Response,)> {
        let request_log = warp::log::custom(|info| {
            tracing::debug!(
                method = %info.method(),
                path = info.path(),
                status = info.status().as_u16(),
                elapsed_ms = info.elapsed().as_millis() as u64,
                "request completed"
            );
        });

        Self::health_route(context)
            .or(Self::ws_route(context))
            .unify()
            .or(Self::api_routes(context))
            .unify()
            .with(request_log)
            .map(Reply::into_response)
            .boxed()
    }

    fn health_route(context: &AppContext) -> BoxedFilter<(warp::reply::Response,)> {
        let gateway = context.gateway();
        warp::path("health")
            .and(warp::get())
            .and(warp::path::end())
            .map(move || {
                let registry = gateway.registry();
                let live = registry.match_count().unwrap_or(0);
                let waiting = registry.waiting_players().map(|w| w.len()).unwrap_or(0);
                handlers::health(live, waiting).into_response()
            })
            .boxed()
    }

    fn ws_route(context: &AppContext) -> BoxedFilter<(warp::reply::Response,)> {
        let gateway = context.gateway();
        let bus = context.event_bus();
        warp::path("ws")
            .and(warp::path::end())
            .and(warp::ws())
            .and(Self::with_gateway(gateway))
            .and(warp::any().map(move || bus.clone()))
            .map(|ws: warp::ws::Ws, gateway: SessionGateway, bus: EventBus| {
                ws.on_upgrade(move |socket| handlers::serve_connection(socket, gateway, bus))
                    .into_response()
            })
            .boxed()
    }

    fn api_routes(context: &AppContext) -> BoxedFilter<(warp::reply::Response,)> {
        let lobby = warp::path!("api" / "lobby")
            .and(warp::get())
            .and(Self::with_gateway(context.gateway()))
            .and_then(|gateway: SessionGateway| async move {
                Ok::<_, Infallible>(handlers::lobby(gateway).await)
            });

        let leaderboard = warp::path!("api" / "leaderboard")
            .and(warp::get())
            .and(Self::with_recorder(context.recorder()))
            .and(warp::query::<handlers::LimitQuery>())
            .and_then(
                |recorder: Arc<InMemoryRecorder>, query: handlers::LimitQuery| async move {
                    Ok::<_, Infallible>(handlers::leaderboard(recorder, query).await)
                },
            );

        let recent = warp::path!("api" / "matches")
            .and(warp::get())
            .and(Self::with_recorder(context.recorder()))
            .and(warp::query::<handlers::LimitQuery>())
            .and_then(
                |recorder: Arc<InMemoryRecorder>, query: handlers::LimitQuery| async move {
                    Ok::<_, Infallible>(handlers::recent_matches(recorder, query).await)
                },
            );

        let metrics = context.metrics();
        let metrics = warp::path!("api" / "metrics")
            .and(warp::get())
            .map(move || reply::json(&metrics.snapshot()).into_response());

        lobby
            .or(leaderboard)
            .unify()
            .or(recent)
            .unify()
            .or(metrics)
            .unify()
            .boxed()
    }

    fn with_gateway(
        gateway: SessionGateway,
    ) -> impl Filter<Extract = (SessionGateway,), Error = Infallible> + Clone {
        warp::any().map(move || gateway.clone())
    }

    fn with_recorder(
        recorder: Arc<InMemoryRecorder>,
    ) -> impl Filter<Extract = (Arc<InMemoryRecorder>,), Error = Infallible> + Clone {
        warp::any().map(move || Arc::clone(&recorder))
    }
}

pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Result<(), ServerError>>>,
    context: AppContext,
}

impl ServerHandle {
    fn new(
        addr: SocketAddr,
        shutdown: oneshot::Sender<()>,
        task: JoinHandle<Result<(), ServerError>>,
        context: AppContext,
    ) -> Self {
        Self {
            addr,
            shutdown: Some(shutdown),
            task: Some(task),
            context,
        }
    }

    pub fn address(&self) -> SocketAddr {
        self.addr
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub async fn shutdown(mut self) -> Result<(), ServerError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            match task.await {
                Ok(result) => result?,
                Err(err) => {
                    return Err(ServerError::ConfigError(format!(
                        "server task join error: {err}"
                    )))
                }
            }
        }

        Ok(())
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_addr_accepts_ip_and_socket_forms() {
        let addr = WebServer::bind_addr(&ServerConfig::new("127.0.0.1", 9000)).unwrap();
        assert_eq!(addr.port(), 9000);
        let addr = WebServer::bind_addr(&ServerConfig::new("127.0.0.1:7000", 9000)).unwrap();
        assert_eq!(addr.port(), 7000);
    }

    #[test]
    fn invalid_settings_are_refused() {
        let settings = GatewaySettings {
            queue_wait_ms: 0,
            ..GatewaySettings::default()
        };
        assert!(matches!(
            AppContext::new_for_tests(settings),
            Err(ServerError::Settings(_))
        ));
    }

    #[tokio::test]
    async fn logged_routes_still_reply() {
        let context = AppContext::new_for_tests(GatewaySettings::default()).unwrap();
        let routes = WebServer::routes(&context);

        let response = warp::test::request().path("/health").reply(&routes).await;
        assert_eq!(response.status(), warp::http::StatusCode::OK);

        let response = warp::test::request().path("/missing").reply(&routes).await;
        assert_eq!(response.status(), warp::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn server_starts_and_stops() {
        let context = AppContext::new_for_tests(GatewaySettings::default()).unwrap();
        let handle = WebServer::from_context(context).start().await.unwrap();
        assert_ne!(handle.address().port(), 0);
        handle.shutdown().await.unwrap();
    }
}
