//! Bounded multi-producer, single-consumer command channel.
//!
//! Producers are network tasks; the consumer is the host thread. Pushing
//! never blocks or awaits: a push that would exceed the depth limit is
//! rejected instead. Popping never blocks either.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use crate::error::{BridgeError, QueueErrorKind};

use super::command::QueuedCommand;

/// Create a queue that holds at most `max_depth` commands.
pub fn command_queue(max_depth: usize) -> (CommandSender, CommandReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let depth = Arc::new(AtomicUsize::new(0));

    (
        CommandSender {
            tx,
            depth: Arc::clone(&depth),
            max_depth,
        },
        CommandReceiver { rx, depth },
    )
}

/// Producer half. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: mpsc::UnboundedSender<QueuedCommand>,
    depth: Arc<AtomicUsize>,
    max_depth: usize,
}

impl CommandSender {
    /// Append a command, returning the queue depth including it.
    ///
    /// Commands are delivered in the order their `push` calls complete.
    pub fn push(&self, command: QueuedCommand) -> Result<usize, BridgeError> {
        // Reserve a slot first so concurrent pushes cannot overshoot the limit.
        let previous = self.depth.fetch_add(1, Ordering::AcqRel);
        if previous >= self.max_depth {
            self.depth.fetch_sub(1, Ordering::AcqRel);
            warn!(
                request_id = %command.request_id,
                path = %command.path,
                depth = previous,
                "Command queue full, rejecting command"
            );
            return Err(BridgeError::Queue {
                kind: QueueErrorKind::Full { depth: previous },
            });
        }

        if self.tx.send(command).is_err() {
            self.depth.fetch_sub(1, Ordering::AcqRel);
            return Err(BridgeError::Queue {
                kind: QueueErrorKind::Closed,
            });
        }

        Ok(previous + 1)
    }

    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> usize {
        self.max_depth
    }

    /// Whether the consumer has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half. Owned by the dispatcher.
#[derive(Debug)]
pub struct CommandReceiver {
    rx: mpsc::UnboundedReceiver<QueuedCommand>,
    depth: Arc<AtomicUsize>,
}

impl CommandReceiver {
    /// Take the oldest command, if any, without waiting.
    pub fn try_pop(&mut self) -> Option<QueuedCommand> {
        match self.rx.try_recv() {
            Ok(command) => {
                self.depth.fetch_sub(1, Ordering::AcqRel);
                Some(command)
            }
            Err(_) => None,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.depth() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::thread;

    fn command(n: usize) -> QueuedCommand {
        QueuedCommand::new("/transform/set", format!(r#"{{"n":{}}}"#, n), 0)
    }

    #[test]
    fn test_fifo_order() {
        let (tx, mut rx) = command_queue(16);
        for n in 0..5 {
            tx.push(command(n)).unwrap();
        }
        assert_eq!(rx.depth(), 5);

        for n in 0..5 {
            let popped = rx.try_pop().unwrap();
            assert_eq!(popped.json_body().unwrap()["n"], n);
        }
        assert!(rx.try_pop().is_none());
        assert!(rx.is_empty());
    }

    #[test]
    fn test_pop_on_empty_does_not_block() {
        let (_tx, mut rx) = command_queue(4);
        assert!(rx.try_pop().is_none());
    }

    #[test]
    fn test_full_queue_rejects_without_enqueueing() {
        let (tx, mut rx) = command_queue(2);
        assert_eq!(tx.push(command(0)).unwrap(), 1);
        assert_eq!(tx.push(command(1)).unwrap(), 2);

        let result = tx.push(command(2));
        assert!(matches!(
            result,
            Err(BridgeError::Queue {
                kind: QueueErrorKind::Full { depth: 2 }
            })
        ));
        assert_eq!(tx.depth(), 2);

        rx.try_pop().unwrap();
        assert_eq!(tx.push(command(3)).unwrap(), 2);

        let remaining: Vec<_> = std::iter::from_fn(|| rx.try_pop())
            .map(|c| c.json_body().unwrap()["n"].as_u64().unwrap())
            .collect();
        assert_eq!(remaining, vec![1, 3]);
    }

    #[test]
    fn test_closed_queue() {
        let (tx, rx) = command_queue(2);
        drop(rx);
        assert!(tx.is_closed());
        assert!(matches!(
            tx.push(command(0)),
            Err(BridgeError::Queue {
                kind: QueueErrorKind::Closed
            })
        ));
        assert_eq!(tx.depth(), 0);
    }

    #[test]
    fn test_concurrent_producers_never_exceed_limit() {
        let (tx, mut rx) = command_queue(100);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tx = tx.clone();
                thread::spawn(move || (0..50).filter(|n| tx.push(command(*n)).is_ok()).count())
            })
            .collect();

        let accepted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(accepted, 100);
        assert_eq!(std::iter::from_fn(|| rx.try_pop()).count(), 100);
    }

    #[test]
    fn test_concurrent_producers_keep_per_producer_order() {
        const PRODUCERS: u64 = 8;
        const PER_PRODUCER: u64 = 200;

        let (tx, mut rx) = command_queue((PRODUCERS * PER_PRODUCER) as usize);
        let handles: Vec<_> = (0..PRODUCERS)
            .map(|producer| {
                let tx = tx.clone();
                thread::spawn(move || {
                    for seq in 0..PER_PRODUCER {
                        let body = format!(r#"{{"producer":{},"seq":{}}}"#, producer, seq);
                        tx.push(QueuedCommand::new("/transform/set", body, 0)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut last_seq: HashMap<u64, u64> = HashMap::new();
        let mut request_ids = HashSet::new();
        let mut total = 0;
        while let Some(popped) = rx.try_pop() {
            let body = popped.json_body().unwrap();
            let producer = body["producer"].as_u64().unwrap();
            let seq = body["seq"].as_u64().unwrap();
            if let Some(previous) = last_seq.insert(producer, seq) {
                assert!(
                    seq > previous,
                    "producer {} delivered seq {} after {}",
                    producer,
                    seq,
                    previous
                );
            }
            assert!(request_ids.insert(popped.request_id), "duplicate request id");
            total += 1;
        }

        assert_eq!(total, PRODUCERS * PER_PRODUCER);
        assert_eq!(last_seq.len(), PRODUCERS as usize);
        assert!(last_seq.values().all(|seq| *seq == PER_PRODUCER - 1));
    }
}
