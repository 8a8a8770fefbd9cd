//! Per-subscriber websocket plumbing.

use std::fmt::Display;
use std::time::Duration;
use futures::{Sink, SinkExt, Stream, StreamExt};
use rocket_ws::Message;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, warn};
use crate::hub::{HubHandle, Payload, Subscription};

/// Upper bound on one write burst, including the final close.
pub const WRITE_WAIT: Duration = Duration::from_secs(10);

/// Drains `queue` onto `sink` until the queue is closed or a write fails.
///
/// Everything already queued when the loop wakes is fed and then flushed once.
/// On exit the sink is closed, best effort.
pub async fn run_send_loop<S, M>(mut queue: mpsc::Receiver<Payload>, mut sink: S, write_wait: Duration)
where
    S: Sink<M> + Unpin,
    S::Error: Display,
    M: From<String>,
{
    while let Some(first) = queue.recv().await {
        let burst = async {
            sink.feed(M::from(first.to_string())).await?;
            while let Ok(next) = queue.try_recv() {
                sink.feed(M::from(next.to_string())).await?;
            }
            sink.flush().await
        };

        match timeout(write_wait, burst).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("Subscriber write failed: {}", e);
                break;
            }
            Err(_) => {
                warn!("Subscriber write exceeded {:?}, closing", write_wait);
                break;
            }
        }
    }

    match timeout(write_wait, sink.close()).await {
        Ok(Ok(())) => debug!("Subscriber connection closed"),
        Ok(Err(e)) => debug!("Subscriber close failed: {}", e),
        Err(_) => debug!("Subscriber close timed out"),
    }
}

/// Reads until the peer closes or errors. Inbound frames carry no meaning.
async fn drain_incoming<R, E>(mut incoming: R)
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    while let Some(frame) = incoming.next().await {
        match frame {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("Subscriber read failed: {}", e);
                break;
            }
        }
    }
}

/// Runs one subscriber connection to completion and unregisters it.
pub async fn serve<T, E>(stream: T, subscription: Subscription, hub: HubHandle, write_wait: Duration)
where
    T: Stream<Item = Result<Message, E>> + Sink<Message> + Unpin,
    <T as Sink<Message>>::Error: Display,
    E: Display,
{
    let Subscription { id, poll_id, queue } = subscription;
    let (sink, incoming) = stream.split::<Message>();

    let send_loop = run_send_loop::<_, Message>(queue, sink, write_wait);
    let reader = drain_incoming(incoming);
    tokio::pin!(send_loop);
    tokio::pin!(reader);

    let writer_done = tokio::select! {
        _ = &mut send_loop => true,
        _ = &mut reader => false,
    };

    if let Err(e) = hub.unregister(&poll_id, id).await {
        debug!(%poll_id, subscriber = id, "Unregister skipped: {}", e);
    }
    if !writer_done {
        // Unregistering closed the queue, so this finishes promptly.
        send_loop.await;
    }
    debug!(%poll_id, subscriber = id, "Subscriber disconnected");
}
