//! The Lifecycle Controller: wires the two registries together, binds the HTTP
//! server, and brings everything down cleanly on SIGINT/SIGTERM.

use actix::Actor;

use crate::config::Config;
use crate::error::HubError;
use crate::room::RoomRegistry;
use crate::server::http::{self, Hub};
use crate::session::{SessionDirectory, Shutdown};

/// Starts the two registries and the HTTP server, then blocks until either the server
/// exits on its own or a shutdown signal arrives, in which case the registries are told
/// to stop first so in-flight sends get a chance to finish.
pub async fn run(config: Config) -> Result<(), HubError> {
    let rooms = RoomRegistry::new().start();
    let sessions = SessionDirectory::new(rooms.clone()).start();
    let hub = Hub {
        sessions: sessions.clone(),
        rooms,
    };

    let addr = format!("0.0.0.0:{}", config.port);
    let server = http::bind(hub, &addr).map_err(|source| HubError::Bind {
        addr: addr.clone(),
        source,
    })?;
    log::info!("listening on {addr}");

    let handle = server.handle();

    tokio::select! {
        result = server => {
            result.map_err(HubError::Serve)?;
        }
        _ = shutdown_signal() => {
            log::info!("shutdown signal received");
            sessions.do_send(Shutdown);
            handle.stop(true).await;
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sig) => sig,
        Err(err) => {
            log::warn!("failed to install SIGTERM handler: {err}");
            std::future::pending().await
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}
