//! Server-Sent Events for the live family list

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::workflow::WargaStats;
use crate::AppState;

/// GET /api/keluarga/events
///
/// Streams `families` events, each carrying the full family list (members
/// included) and the statistics computed from it. A failed read is sent as
/// an `error` event; the stream keeps going.
pub async fn family_event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to family events");

    let mut feed = Box::pin(state.families.list_families().into_stream());

    let stream = async_stream::stream! {
        while let Some(update) = feed.next().await {
            match update {
                Ok(families) => {
                    let payload = json!({
                        "families": &families,
                        "stats": WargaStats::compute(&families),
                    });
                    debug!(families = families.len(), "SSE: Sending family snapshot");
                    yield Ok(Event::default().event("families").data(payload.to_string()));
                }
                Err(e) => {
                    warn!(error = %e, "SSE: Family feed error");
                    yield Ok(Event::default().event("error").data(e.to_string()));
                }
            }
        }
        info!("SSE: Family event stream ended");
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
