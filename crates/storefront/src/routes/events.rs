//! Server-sent events stream of application events.
//!
//! Each open tab subscribes here; auth and consent changes arrive as JSON
//! payloads and the tab resynchronizes its gated surfaces. Lagged
//! subscribers silently skip ahead - events are advisory, state is always
//! refetchable.

use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_core::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::instrument;

use crate::state::AppState;

/// Stream application events to the browser.
#[instrument(skip(state))]
pub async fn stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events().subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|event| {
        event
            .ok()
            .and_then(|e| Event::default().json_data(&e).ok())
            .map(Ok)
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
