use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::progress::PlayerData;

use super::dual::DualStore;

enum SaveJob {
    Write(Box<PlayerData>),
    Barrier(Sender<()>),
}

/// Worker thread that drains routine saves off the caller's thread, in
/// submission order.
pub(crate) struct BackgroundSaver {
    sender: Option<Sender<SaveJob>>,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundSaver {
    pub(crate) fn spawn(stores: Arc<DualStore>) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<SaveJob>();
        let handle = thread::Builder::new()
            .name("questline-saver".to_string())
            .spawn(move || {
                for job in receiver {
                    match job {
                        SaveJob::Write(data) => {
                            let report = stores.write(&data);
                            debug!(player = %data.id(), ?report, "background_save_done");
                        }
                        SaveJob::Barrier(ack) => {
                            let _ = ack.send(());
                        }
                    }
                }
            })?;
        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
        })
    }

    /// Queues a snapshot. Returns it back if the worker is gone so the caller
    /// can write it synchronously instead.
    pub(crate) fn submit(&self, data: PlayerData) -> Result<(), PlayerData> {
        let Some(sender) = &self.sender else {
            return Err(data);
        };
        match sender.send(SaveJob::Write(Box::new(data))) {
            Ok(()) => Ok(()),
            Err(mpsc::SendError(SaveJob::Write(data))) => Err(*data),
            Err(mpsc::SendError(SaveJob::Barrier(_))) => Ok(()),
        }
    }

    /// Blocks until every job queued before this call has been written.
    pub(crate) fn wait_idle(&self) {
        let Some(sender) = &self.sender else {
            return;
        };
        let (ack_sender, ack_receiver) = mpsc::channel();
        if sender.send(SaveJob::Barrier(ack_sender)).is_err() {
            warn!("background_saver_gone");
            return;
        }
        if ack_receiver.recv().is_err() {
            warn!("background_saver_dropped_barrier");
        }
    }
}

impl Drop for BackgroundSaver {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("background_saver_panicked");
            }
        }
    }
}
