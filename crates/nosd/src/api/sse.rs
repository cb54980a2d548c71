use std::convert::Infallible;

use axum::response::sse::Event;
use futures::stream::Stream;
use tokio::sync::broadcast;

use txengine::TxEvent;

/// Converts a transaction's event broadcast into an SSE stream for
/// `GET /pools/tx/{id}/stream` (and the equivalent routes under
/// `net`/`updates`). Lagged receivers just drop the gap and keep going;
/// the client can always fall back to `/log` with a cursor to catch up.
pub fn tx_event_stream(mut rx: broadcast::Receiver<TxEvent>) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(TxEvent::Step(step)) => {
                    let data = serde_json::to_string(&step).unwrap_or_default();
                    yield Ok(Event::default().event("step").data(data));
                }
                Ok(TxEvent::Log(line)) => {
                    yield Ok(Event::default().event("log").data(line));
                }
                Ok(TxEvent::Finished { ok }) => {
                    yield Ok(Event::default().event("finished").data(ok.to_string()));
                    break;
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}
