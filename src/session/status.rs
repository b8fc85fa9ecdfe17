use std::sync::Arc;

use tokio::sync::watch;

/// Long-running operations currently in progress.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct ProcessStatus {
    pub is_converting: bool,
    pub is_frame_extracting: bool,
    pub is_cropping: bool,
    pub is_trimming: bool,
    pub is_generating_gif: bool,
}

impl ProcessStatus {
    pub fn is_idle(&self) -> bool {
        *self == ProcessStatus::default()
    }

    fn slot(&mut self, flag: StatusFlag) -> &mut bool {
        match flag {
            StatusFlag::Converting => &mut self.is_converting,
            StatusFlag::FrameExtracting => &mut self.is_frame_extracting,
            StatusFlag::Cropping => &mut self.is_cropping,
            StatusFlag::Trimming => &mut self.is_trimming,
            StatusFlag::GeneratingGif => &mut self.is_generating_gif,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusFlag {
    Converting,
    FrameExtracting,
    Cropping,
    Trimming,
    GeneratingGif,
}

/// Shared status flags, observable through a `watch` channel.
#[derive(Clone)]
pub struct StatusBoard {
    tx: Arc<watch::Sender<ProcessStatus>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ProcessStatus::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> ProcessStatus {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProcessStatus> {
        self.tx.subscribe()
    }

    /// Set `flag` until the returned guard drops.
    #[must_use = "the flag is cleared when the guard drops"]
    pub fn raise(&self, flag: StatusFlag) -> StatusGuard {
        self.set(flag, true);
        StatusGuard {
            board: self.clone(),
            flag,
        }
    }

    fn set(&self, flag: StatusFlag, value: bool) {
        self.tx.send_if_modified(|s| {
            let slot = s.slot(flag);
            let changed = *slot != value;
            *slot = value;
            changed
        });
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

pub struct StatusGuard {
    board: StatusBoard,
    flag: StatusFlag,
}

impl Drop for StatusGuard {
    fn drop(&mut self) {
        self.board.set(self.flag, false);
    }
}
