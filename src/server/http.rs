//! External interface: a single `/ws` WebSocket route. Resolves or generates the
//! connecting client's id, then hands the upgraded stream to a fresh Connection Handler.

use actix::Addr;
use actix_web::{
    web::{get, Data, Payload, Query},
    App, HttpRequest, HttpResponse, HttpServer,
};
use actix_web_actors::ws;
use serde::Deserialize;

use crate::room::RoomRegistry;
use crate::session::actor::Session;
use crate::session::SessionDirectory;
use crate::utils::generate_client_id;

/// The two process-wide registries, handed to every connection through `App::app_data`.
#[derive(Clone)]
pub struct Hub {
    pub sessions: Addr<SessionDirectory>,
    pub rooms: Addr<RoomRegistry>,
}

/// The optional `clientId` query parameter used to resume a prior session.
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    #[serde(rename = "clientId")]
    client_id: Option<String>,
}

async fn socket(
    req: HttpRequest,
    query: Query<ConnectQuery>,
    stream: Payload,
    hub: Data<Hub>,
) -> actix_web::Result<HttpResponse> {
    let client_id = query
        .into_inner()
        .client_id
        .filter(|id| !id.is_empty())
        .map(std::sync::Arc::from)
        .unwrap_or_else(generate_client_id);

    ws::start(
        Session::new(client_id, hub.sessions.clone(), hub.rooms.clone()),
        &req,
        stream,
    )
}

/// Builds the `App` factory shared by the live server and integration tests.
pub fn app_factory(
    hub: Hub,
) -> App<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    App::new()
        .app_data(Data::new(hub))
        .route("/ws", get().to(socket))
}

pub fn bind(hub: Hub, addr: &str) -> std::io::Result<actix_web::dev::Server> {
    let server = HttpServer::new(move || app_factory(hub.clone())).bind(addr)?.run();
    Ok(server)
}
