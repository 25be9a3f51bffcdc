//! Deferred Book
//!
//! Runs book calls on a dedicated worker thread and hands back a `Pending`
//! result. One worker per handle, jobs run in submission order, so calls made
//! through the same handle keep their order.

use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, ShelfError};

use super::Book;

type Job = Box<dyn FnOnce(&Book) + Send + 'static>;

/// Book handle whose calls run off the caller's thread
pub struct DeferredBook {
    /// Job queue feeding the worker (None once shut down)
    sender: Option<Sender<Job>>,

    /// Worker thread (joined on drop)
    worker: Option<JoinHandle<()>>,
}

/// Result of a deferred call, available once the worker has run it
pub struct Pending<R> {
    receiver: Receiver<Result<R>>,
}

impl<R> Pending<R> {
    /// Block until the call completes
    pub fn wait(self) -> Result<R> {
        self.receiver.recv().map_err(|_| ShelfError::WorkerGone)?
    }

    /// Non-blocking poll; None while the call is still queued or running
    pub fn try_wait(&self) -> Option<Result<R>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(channel::TryRecvError::Empty) => None,
            Err(channel::TryRecvError::Disconnected) => Some(Err(ShelfError::WorkerGone)),
        }
    }
}

impl DeferredBook {
    /// Start the worker thread for `book`
    pub fn spawn(book: Book) -> Result<Self> {
        let (sender, receiver) = channel::unbounded::<Job>();

        let worker = thread::Builder::new()
            .name(format!("bookshelf-{}", book.name()))
            .spawn(move || {
                for job in receiver.iter() {
                    job(&book);
                }
            })?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    pub fn write<T>(&self, key: impl Into<String>, value: T) -> Pending<()>
    where
        T: Serialize + Send + 'static,
    {
        let key = key.into();
        self.submit(move |book| book.write(&key, &value).map(|_| ()))
    }

    pub fn read<T>(&self, key: impl Into<String>, default: T) -> Pending<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let key = key.into();
        self.submit(move |book| book.read(&key, default))
    }

    pub fn read_opt<T>(&self, key: impl Into<String>) -> Pending<Option<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let key = key.into();
        self.submit(move |book| book.read_opt(&key))
    }

    pub fn exists(&self, key: impl Into<String>) -> Pending<bool> {
        let key = key.into();
        self.submit(move |book| book.exists(&key))
    }

    pub fn delete(&self, key: impl Into<String>) -> Pending<()> {
        let key = key.into();
        self.submit(move |book| book.delete(&key))
    }

    pub fn keys(&self) -> Pending<Vec<String>> {
        self.submit(|book| book.keys())
    }

    pub fn destroy(&self) -> Pending<()> {
        self.submit(|book| book.destroy())
    }

    /// Queue `f` for the worker
    ///
    /// If the worker is gone the job (and its reply sender) is dropped, and
    /// the returned `Pending` resolves to `WorkerGone`.
    fn submit<R, F>(&self, f: F) -> Pending<R>
    where
        R: Send + 'static,
        F: FnOnce(&Book) -> Result<R> + Send + 'static,
    {
        let (reply, receiver) = channel::bounded(1);
        let job: Job = Box::new(move |book| {
            let _ = reply.send(f(book));
        });

        if let Some(sender) = &self.sender {
            let _ = sender.send(job);
        }

        Pending { receiver }
    }
}

impl Drop for DeferredBook {
    fn drop(&mut self) {
        // Closing the queue lets the worker drain remaining jobs and exit
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("Deferred book worker panicked");
            }
        }
    }
}
