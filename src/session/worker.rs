use std::sync::mpsc;

/// What a poll of a [`PendingRequest`] found.
#[derive(Debug)]
pub(crate) enum WorkerPoll<T> {
    Pending,
    Ready(T),
    /// The worker thread went away without sending anything.
    Lost,
}

/// Result slot for one backend call running on its own thread.
#[derive(Debug)]
pub(crate) struct PendingRequest<T> {
    rx: mpsc::Receiver<T>,
}

impl<T: Send + 'static> PendingRequest<T> {
    pub(crate) fn spawn<W>(work: W) -> Self
    where
        W: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<T>();
        std::thread::spawn(move || {
            let result = work();
            let _ = tx.send(result);
        });
        Self { rx }
    }

    pub(crate) fn try_take(&self) -> WorkerPoll<T> {
        match self.rx.try_recv() {
            Ok(result) => WorkerPoll::Ready(result),
            Err(mpsc::TryRecvError::Empty) => WorkerPoll::Pending,
            Err(mpsc::TryRecvError::Disconnected) => WorkerPoll::Lost,
        }
    }

    /// Blocks until the worker answers. There is no timeout.
    pub(crate) fn wait(self) -> WorkerPoll<T> {
        match self.rx.recv() {
            Ok(result) => WorkerPoll::Ready(result),
            Err(mpsc::RecvError) => WorkerPoll::Lost,
        }
    }
}
