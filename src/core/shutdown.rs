use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Running,
    ShuttingDown,
    Stopped,
}

/// Process-wide stop request, shared by every worker.
///
/// Transitions only move forward: Running -> ShuttingDown -> Stopped.
#[derive(Debug)]
pub struct ShutdownSignal {
    state: watch::Sender<Lifecycle>,
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (state, _) = watch::channel(Lifecycle::Running);
        Self { state }
    }

    pub fn state(&self) -> Lifecycle {
        *self.state.borrow()
    }

    pub fn is_requested(&self) -> bool {
        self.state() != Lifecycle::Running
    }

    /// Returns `true` for the call that actually moved the state.
    pub fn request(&self) -> bool {
        self.state.send_if_modified(|state| {
            if *state == Lifecycle::Running {
                *state = Lifecycle::ShuttingDown;
                true
            } else {
                false
            }
        })
    }

    pub fn mark_stopped(&self) {
        self.state.send_if_modified(|state| {
            if *state == Lifecycle::Stopped {
                false
            } else {
                *state = Lifecycle::Stopped;
                true
            }
        });
    }

    pub fn listener(&self) -> ShutdownListener {
        ShutdownListener {
            state: self.state.subscribe(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShutdownListener {
    state: watch::Receiver<Lifecycle>,
}

impl ShutdownListener {
    /// Resolves once shutdown has been requested. Cancel safe.
    pub async fn requested(&mut self) {
        // a dropped signal counts as a stop request
        let _ = self
            .state
            .wait_for(|state| *state != Lifecycle::Running)
            .await;
    }

    pub fn is_requested(&self) -> bool {
        *self.state.borrow() != Lifecycle::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_lifecycle_moves_forward_only() {
        let signal = ShutdownSignal::new();
        assert_eq!(signal.state(), Lifecycle::Running);
        assert!(signal.request());
        assert!(!signal.request());
        assert_eq!(signal.state(), Lifecycle::ShuttingDown);
        signal.mark_stopped();
        assert!(!signal.request());
        assert_eq!(signal.state(), Lifecycle::Stopped);
    }

    #[tokio::test]
    async fn test_listener_wakes_on_request() {
        let signal = std::sync::Arc::new(ShutdownSignal::new());
        let mut listener = signal.listener();
        assert!(!listener.is_requested());

        let trigger = std::sync::Arc::clone(&signal);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.request();
        });

        tokio::time::timeout(Duration::from_secs(2), listener.requested())
            .await
            .expect("listener should observe the request");
        assert!(listener.is_requested());
    }

    #[tokio::test]
    async fn test_listener_created_after_request_resolves_immediately() {
        let signal = ShutdownSignal::new();
        signal.request();
        let mut listener = signal.listener();
        tokio::time::timeout(Duration::from_millis(100), listener.requested())
            .await
            .unwrap();
    }
}
