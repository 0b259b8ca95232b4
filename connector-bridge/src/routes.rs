//! HTTP routes served next to the notification callback.

use std::convert::Infallible;
use std::sync::Arc;

use warp::filters::BoxedFilter;
use warp::reply::Response;
use warp::{Filter, Reply};

use crate::commands::CommandDispatcher;
use crate::live::live_route;
use crate::relay::FanOutRelay;
use crate::schema::SchemaRegistry;
use crate::status::{StatusHandler, StatusPhase};
use crate::view::render_status_page;

/// Body of `GET /`.
pub const GREETING: &str = "Hello from connector-bridge!";

/// Everything the bridge serves besides `PUT /notification`:
/// `GET /`, `GET /status/:id` and `GET /live`.
pub fn bridge_routes(
    status: Arc<StatusHandler>,
    schemas: Arc<SchemaRegistry>,
    relay: FanOutRelay,
    dispatcher: CommandDispatcher,
) -> BoxedFilter<(Response,)> {
    index_route()
        .or(status_route(status, schemas))
        .unify()
        .or(live_route(relay, dispatcher))
        .unify()
        .boxed()
}

/// `GET /`: plain greeting.
pub fn index_route() -> BoxedFilter<(Response,)> {
    warp::get()
        .and(warp::path::end())
        .map(|| GREETING.into_response())
        .boxed()
}

/// `GET /status/:id`: read the status resource of an endpoint and render it.
pub fn status_route(
    status: Arc<StatusHandler>,
    schemas: Arc<SchemaRegistry>,
) -> BoxedFilter<(Response,)> {
    warp::get()
        .and(warp::path!("status" / String))
        .and_then(move |endpoint_id: String| {
            let status = Arc::clone(&status);
            let schemas = Arc::clone(&schemas);
            async move { Ok::<_, Infallible>(handle_status(&status, &schemas, &endpoint_id).await) }
        })
        .boxed()
}

async fn handle_status(
    status: &StatusHandler,
    schemas: &SchemaRegistry,
    endpoint_id: &str,
) -> Response {
    let response = match status.fetch(endpoint_id, &schemas.status_schema()).await {
        Ok(report) => warp::reply::html(render_status_page(&report)).into_response(),
        Err(e) => {
            let code = e.status_code();
            warp::reply::with_status(e.to_string(), code).into_response()
        }
    };

    tracing::debug!(
        endpoint = %endpoint_id,
        phase = %StatusPhase::Responded,
        status = response.status().as_u16(),
        "Status request"
    );
    response
}
