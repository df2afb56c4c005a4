//! Lazy, single-pass sequences of records
//!
//! A stream is either fed by a producer thread through a bounded channel, or wraps a
//! plain iterator. Dropping a stream (or calling [EntityStream::close]) disconnects the
//! producer and waits for it, so a consumer that stops early never leaks a thread.
use crate::Error;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::thread::JoinHandle;

/// Number of records buffered between a producer and its consumer
pub const DEFAULT_BUFFER: usize = 1024;

/// Sending half of a producer-backed [EntityStream]
pub struct Sink<T> {
    tx: Sender<Result<T, Error>>,
}

impl<T> Sink<T> {
    /// Pushes a record, returns false once the consumer is gone and producing should stop
    pub fn send(&self, item: Result<T, Error>) -> bool {
        self.tx.send(item).is_ok()
    }
}

enum Source<T> {
    Channel {
        rx: Receiver<Result<T, Error>>,
        producer: Option<JoinHandle<()>>,
    },
    Iter(Box<dyn Iterator<Item = Result<T, Error>> + Send>),
    Closed,
}

/// A finite, single-pass, not restartable sequence of records
pub struct EntityStream<T> {
    source: Source<T>,
}

impl<T: Send + 'static> EntityStream<T> {
    /// Runs `produce` on its own thread, with the default buffer size
    pub fn spawn<F>(produce: F) -> Self
    where
        F: FnOnce(Sink<T>) + Send + 'static,
    {
        Self::spawn_with_buffer(DEFAULT_BUFFER, produce)
    }

    /// Runs `produce` on its own thread, at most `buffer` records are queued
    pub fn spawn_with_buffer<F>(buffer: usize, produce: F) -> Self
    where
        F: FnOnce(Sink<T>) + Send + 'static,
    {
        let (tx, rx) = bounded(buffer.max(1));
        let producer = std::thread::spawn(move || produce(Sink { tx }));
        Self {
            source: Source::Channel {
                rx,
                producer: Some(producer),
            },
        }
    }

    /// Stream over an iterator, consumed on the caller's thread
    pub fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = Result<T, Error>>,
        I::IntoIter: Send + 'static,
    {
        Self {
            source: Source::Iter(Box::new(iter.into_iter())),
        }
    }

    /// Stream over records already in memory
    pub fn from_vec(records: Vec<T>) -> Self {
        Self::from_iter(records.into_iter().map(Ok))
    }

    /// A stream with nothing in it, for tables absent from the feed
    pub fn empty() -> Self {
        Self {
            source: Source::Closed,
        }
    }

    /// A stream yielding a single error
    pub fn error(error: Error) -> Self {
        Self::from_iter(std::iter::once(Err(error)))
    }

    /// Transforms every record of the stream, errors are passed through
    pub fn map<U, F>(self, mut f: F) -> EntityStream<U>
    where
        U: Send + 'static,
        F: FnMut(T) -> U + Send + 'static,
    {
        EntityStream::from_iter(Iterator::map(self, move |item| item.map(&mut f)))
    }
}

impl<T> EntityStream<T> {
    /// Stops consuming: the producer is disconnected and joined
    ///
    /// Calling it more than once, or on an exhausted stream, is harmless.
    pub fn close(&mut self) {
        match std::mem::replace(&mut self.source, Source::Closed) {
            Source::Channel { rx, producer } => {
                drop(rx);
                if let Some(producer) = producer {
                    if producer.join().is_err() {
                        log::error!("a record producer panicked");
                    }
                }
            }
            Source::Iter(_) | Source::Closed => {}
        }
    }
}

impl<T> Iterator for EntityStream<T> {
    type Item = Result<T, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.source {
            Source::Channel { rx, .. } => rx.recv().ok(),
            Source::Iter(iter) => iter.next(),
            Source::Closed => None,
        }
    }
}

impl<T> Drop for EntityStream<T> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn producer_is_released_on_early_close() {
        let produced = Arc::new(AtomicUsize::new(0));
        let counter = produced.clone();
        let mut stream = EntityStream::spawn_with_buffer(2, move |sink| {
            for i in 0..1_000_000 {
                if !sink.send(Ok(i)) {
                    return;
                }
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        assert_eq!(stream.next().map(|r| r.ok()), Some(Some(0)));
        stream.close();
        assert!(produced.load(Ordering::SeqCst) < 1_000_000);
        assert!(stream.next().is_none());
    }

    #[test]
    fn map_keeps_errors() {
        let stream = EntityStream::from_iter(vec![Ok(1), Err(Error::MissingFile("x".into())), Ok(3)]);
        let mapped: Vec<_> = stream.map(|i| i * 10).collect();
        assert_eq!(mapped.len(), 3);
        assert_eq!(mapped[0].as_ref().ok(), Some(&10));
        assert!(mapped[1].is_err());
        assert_eq!(mapped[2].as_ref().ok(), Some(&30));
    }

    #[test]
    fn empty_stream() {
        assert_eq!(EntityStream::<u32>::empty().count(), 0);
    }
}
