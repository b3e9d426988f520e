use actix_web::{HttpRequest, HttpResponse, Result, get, web};
use tokio::task::spawn_local;

use crate::ws::{handler, server::RoomRegistry};

#[get("/ws/{room}")]
pub async fn websocket(
    req: HttpRequest,
    stream: web::Payload,
    path: web::Path<String>,
    registry: web::Data<RoomRegistry>,
) -> Result<HttpResponse> {
    let room = path.into_inner();
    let (res, session, msg_stream) = actix_ws::handle(&req, stream)?;

    // spawn websocket handler (and don't await it) so that the response is returned immediately
    spawn_local(handler::relay_ws(registry, session, msg_stream, room));

    Ok(res)
}
