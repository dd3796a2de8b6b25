// ── Reactive fleet streams ──
//
// Subscription types for consuming view changes from the FleetStore.

mod filter;

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

pub use filter::VehicleFilter;

use crate::store::FleetView;

/// A subscription to the fleet view.
///
/// Provides both point-in-time access and change notification via
/// [`changed`](Self::changed) or by converting into a `Stream`.
pub struct FleetStream {
    current: Arc<FleetView>,
    receiver: watch::Receiver<Arc<FleetView>>,
}

impl FleetStream {
    pub(crate) fn new(receiver: watch::Receiver<Arc<FleetView>>) -> Self {
        let current = Arc::clone(&receiver.borrow());
        Self { current, receiver }
    }

    /// The view as of creation or the last `changed()`.
    pub fn current(&self) -> &Arc<FleetView> {
        &self.current
    }

    /// The latest view (may have changed since creation).
    pub fn latest(&self) -> Arc<FleetView> {
        Arc::clone(&self.receiver.borrow())
    }

    /// Whether a newer view has been published than the one last seen.
    pub fn has_changed(&self) -> bool {
        self.receiver.has_changed().unwrap_or(false)
    }

    /// Wait for the next change, returning the new view.
    /// Returns `None` once the store has been dropped.
    pub async fn changed(&mut self) -> Option<Arc<FleetView>> {
        self.receiver.changed().await.ok()?;
        let view = Arc::clone(&self.receiver.borrow_and_update());
        self.current = Arc::clone(&view);
        Some(view)
    }

    /// Convert into a `Stream`. The first item is the current view.
    pub fn into_stream(self) -> FleetWatchStream {
        FleetWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter yielding a new `Arc<FleetView>` on every mutation.
pub struct FleetWatchStream {
    inner: WatchStream<Arc<FleetView>>,
}

impl Stream for FleetWatchStream {
    type Item = Arc<FleetView>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
