use super::*;

use tracing::debug;

#[uniffi::export]
impl MoodlogCore {
    /// Register a callback receiving every feed change.
    ///
    /// Only one callback can be registered at a time; registering again
    /// replaces the previous one.
    pub fn set_feed_callback(&self, callback: Box<dyn FeedCallback>) {
        let callback: Arc<dyn FeedCallback> = Arc::from(callback);
        let (feed, rt) = match (self.feed_store(), get_tokio_runtime()) {
            (Ok(feed), Ok(rt)) => (feed, rt),
            _ => {
                debug!("feed callback ignored, core not initialized");
                return;
            }
        };

        let mut rx = feed.watch();
        let task = rt.spawn(async move {
            while rx.changed().await.is_ok() {
                let view = FeedView::from(&*rx.borrow_and_update());
                callback.on_feed_changed(view);
            }
        });

        if let Some(previous) = self.callback_task.lock().replace(task) {
            previous.abort();
        }
    }

    /// Stop delivering feed changes. Call this on logout.
    pub fn clear_feed_callback(&self) {
        self.stop_callback_task();
    }
}
