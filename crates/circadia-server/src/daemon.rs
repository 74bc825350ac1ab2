//! Daemon orchestration: wires the store, context, listener and scheduler.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use circadia_core::{Clock, SystemClock};
use circadia_store::Store;

use crate::audio::AudioAssurance;
use crate::audio::pactl::PactlConnector;
use crate::audio::player::RodioOutput;
use crate::bus::SocketPublisher;
use crate::config::DaemonConfig;
use crate::context::DaemonContext;
use crate::dispatch::{BusDispatcher, make_connection_handler};
use crate::error::ServerResult;
use crate::events::DaemonEvent;
use crate::notify::DesktopNotifier;
use crate::scheduler::Scheduler;
use crate::signals::{ShutdownHandle, SignalHandler};
use crate::socket::SocketServer;

/// How long shutdown waits for the scheduler to finish its tick.
const SCHEDULER_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// A bound, ready-to-run daemon.
pub struct Daemon {
    server: SocketServer,
    ctx: Arc<DaemonContext>,
    scheduler: Scheduler,
    signals: SignalHandler,
}

impl Daemon {
    /// Opens the store and binds the bus socket.
    ///
    /// Fails with [`ServerError::SocketInUse`](crate::ServerError::SocketInUse)
    /// if another daemon already answers on the socket.
    pub async fn bind(config: DaemonConfig) -> ServerResult<Self> {
        let store = Arc::new(Store::open(&config.database_path)?);
        debug!(path = %config.database_path.display(), "Store opened");

        let server = SocketServer::new(config.server.clone()).await?;

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let audio = Arc::new(AudioAssurance::new(
            config.audio.clone(),
            Arc::new(RodioOutput::new()),
            Arc::new(PactlConnector::default()),
            clock.clone(),
        ));
        let publisher = Arc::new(SocketPublisher::new(&config.server.socket_path));
        let ctx = DaemonContext::new(store, audio, publisher, clock);

        let notifier = Arc::new(DesktopNotifier::new(&config.app_name));
        let scheduler = Scheduler::new(config.scheduler.clone(), ctx.clone(), notifier);

        Ok(Self {
            server,
            ctx,
            scheduler,
            signals: SignalHandler::new(),
        })
    }

    pub fn context(&self) -> &Arc<DaemonContext> {
        &self.ctx
    }

    /// Registers a presentation-layer observer before the daemon starts.
    pub fn subscribe(&self) -> broadcast::Receiver<DaemonEvent> {
        self.ctx.subscribe()
    }

    /// A handle that stops [`run`](Self::run) from elsewhere.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.signals.shutdown_handle()
    }

    /// Runs until SIGINT, SIGTERM or a programmatic shutdown.
    pub async fn run(self) -> ServerResult<()> {
        let Self {
            server,
            ctx,
            scheduler,
            signals,
        } = self;

        signals.spawn_listener();

        let scheduler_handle = scheduler.handle();
        let scheduler_task = tokio::spawn(scheduler.run());

        let reload_task = {
            let handle = scheduler_handle.clone();
            let mut reload = signals.reload();
            tokio::spawn(async move {
                while reload.wait().await {
                    if handle.restart().await.is_err() {
                        break;
                    }
                }
            })
        };

        let dispatcher = Arc::new(BusDispatcher::new(ctx.clone(), scheduler_handle.clone()));
        info!(socket = %server.socket_path().display(), "Daemon running");

        let result = server
            .run_until_shutdown(make_connection_handler(dispatcher), signals.shutdown().wait())
            .await;

        reload_task.abort();
        if scheduler_handle.stop().await.is_ok()
            && tokio::time::timeout(SCHEDULER_STOP_TIMEOUT, scheduler_task)
                .await
                .is_err()
        {
            warn!("Scheduler did not stop in time");
        }
        ctx.shutdown();
        drop(server);

        info!("Daemon stopped");
        result
    }
}
