use tracing::info;

use crate::session::SessionSnapshot;

/// Consumer of per-frame session snapshots, typically the on-screen UI.
pub trait RenderSink {
    fn present(&mut self, snapshot: &SessionSnapshot);
}

/// Sink that ignores everything.
#[derive(Debug, Default)]
pub struct NullSink;

impl RenderSink for NullSink {
    fn present(&mut self, _snapshot: &SessionSnapshot) {}
}

/// Headless sink that logs a line whenever a note fires and keeps the most
/// recent snapshot around.
#[derive(Debug, Default)]
pub struct LogSink {
    last: Option<SessionSnapshot>,
    triggers: usize,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<&SessionSnapshot> {
        self.last.as_ref()
    }

    pub fn triggers(&self) -> usize {
        self.triggers
    }
}

impl RenderSink for LogSink {
    fn present(&mut self, snapshot: &SessionSnapshot) {
        if let Some(trigger) = snapshot.trigger {
            self.triggers += 1;
            info!(
                swara = %trigger.variant,
                x = trigger.x,
                y = trigger.y,
                score = snapshot.score,
                notes = snapshot.notes_played,
                "♪"
            );
        }
        self.last = Some(snapshot.clone());
    }
}

impl<F: FnMut(&SessionSnapshot)> RenderSink for F {
    fn present(&mut self, snapshot: &SessionSnapshot) {
        self(snapshot)
    }
}
