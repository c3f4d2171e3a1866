use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

/// Controls that are disabled while their request is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Generate,
    Upload,
}

const CONTROL_COUNT: usize = 2;

impl Control {
    fn slot(self) -> usize {
        match self {
            Control::Generate => 0,
            Control::Upload => 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Controls {
    busy: Arc<[AtomicBool; CONTROL_COUNT]>,
}

impl Controls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self, control: Control) -> bool {
        !self.busy[control.slot()].load(Ordering::Acquire)
    }

    /// Disables the control until the returned guard is dropped.
    /// `None` when the control is already disabled.
    pub fn try_acquire(&self, control: Control) -> Option<BusyGuard> {
        self.busy[control.slot()]
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        debug!(?control, "control disabled");
        Some(BusyGuard {
            controls: self.clone(),
            control,
        })
    }
}

/// Re-enables its control on drop: success, error, panic or task abort alike.
#[derive(Debug)]
pub struct BusyGuard {
    controls: Controls,
    control: Control,
}

impl BusyGuard {
    pub fn control(&self) -> Control {
        self.control
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.controls.busy[self.control.slot()].store(false, Ordering::Release);
        debug!(control = ?self.control, "control re-enabled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_refused_until_release() {
        let controls = Controls::new();
        let guard = controls.try_acquire(Control::Generate).unwrap();
        assert!(!controls.is_enabled(Control::Generate));
        assert!(controls.is_enabled(Control::Upload));
        assert!(controls.try_acquire(Control::Generate).is_none());
        drop(guard);
        assert!(controls.is_enabled(Control::Generate));
        assert!(controls.try_acquire(Control::Generate).is_some());
    }

    #[tokio::test]
    async fn guard_released_when_task_fails() {
        let controls = Controls::new();
        let guard = controls.try_acquire(Control::Generate).unwrap();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            Err::<(), &str>("provider exploded")
        });
        assert!(handle.await.unwrap().is_err());
        assert!(controls.is_enabled(Control::Generate));
    }

    #[tokio::test]
    async fn guard_released_when_task_aborted() {
        let controls = Controls::new();
        let guard = controls.try_acquire(Control::Upload).unwrap();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            std::future::pending::<()>().await;
        });
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
        assert!(controls.is_enabled(Control::Upload));
    }
}
