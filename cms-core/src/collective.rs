//! Collective (`L4`): broadcast, reduce, and barrier across ranks
//!
//! The root draws the job's hash vector once and every other rank must use
//! the exact same one — that distribution is a broadcast. After every rank
//! has built its local sketch (and local ground-truth tallies), those
//! results are summed into a single global sketch — that is a reduce. A
//! barrier lets every rank agree it has reached a point (e.g. "input has
//! been fully partitioned") before proceeding.
//!
//! This module abstracts those three operations behind a [`Collective`]
//! trait so the rest of the crate, and its tests, never depend on a
//! particular transport. [`InProcessCollective`] is a single-participant
//! fake for unit tests; [`ThreadCollective`] runs every rank as an OS thread
//! within one process, connected by channels, which is enough to exercise
//! the full multi-rank protocol (including distributed-equivalence checks)
//! without needing MPI or any other out-of-process transport.

use std::any::Any;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Barrier};

use tracing::debug;

use crate::common::{Result, SketchError};

/// Capability to broadcast a value from a root rank, reduce values across
/// all ranks via a commutative, associative combine function, and
/// synchronize ranks at a barrier.
pub trait Collective {
    /// This rank's index, `0..num_ranks()`.
    fn rank(&self) -> usize;

    /// Total number of ranks participating in this collective.
    fn num_ranks(&self) -> usize;

    /// Distributes `value` from rank 0 to every rank. Rank 0 must pass
    /// `Some(value)`; every other rank passes `None` and receives back a
    /// copy of rank 0's value.
    ///
    /// # Errors
    /// Returns `SketchError::ProtocolFailure` if the broadcast could not be
    /// completed, e.g. a peer disconnected.
    fn broadcast<T: Clone + Send + 'static>(&self, value: Option<T>) -> Result<T>;

    /// Combines `value` from every rank into one result, visible to every
    /// rank, using `combine` to fold pairs together. `combine` must be
    /// commutative and associative since the fold order is unspecified.
    ///
    /// # Errors
    /// Returns `SketchError::ProtocolFailure` if the reduce could not be
    /// completed.
    fn reduce<T, F>(&self, value: T, combine: F) -> Result<T>
    where
        T: Send + 'static,
        F: Fn(T, T) -> T + Send + Sync;

    /// Blocks until every rank has called `barrier`.
    ///
    /// # Errors
    /// Returns `SketchError::ProtocolFailure` if the barrier could not be
    /// completed.
    fn barrier(&self) -> Result<()>;
}

/// A single-participant collective: broadcast returns its own input
/// unchanged, reduce is the identity, barrier is a no-op. Used for unit
/// tests of code written against [`Collective`] that don't need to exercise
/// multi-rank behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct InProcessCollective;

impl Collective for InProcessCollective {
    fn rank(&self) -> usize {
        0
    }

    fn num_ranks(&self) -> usize {
        1
    }

    fn broadcast<T: Clone + Send + 'static>(&self, value: Option<T>) -> Result<T> {
        value.ok_or_else(|| SketchError::ProtocolFailure {
            reason: "rank 0 must supply a value to broadcast".to_string(),
        })
    }

    fn reduce<T, F>(&self, value: T, _combine: F) -> Result<T>
    where
        T: Send + 'static,
        F: Fn(T, T) -> T + Send + Sync,
    {
        Ok(value)
    }

    fn barrier(&self) -> Result<()> {
        Ok(())
    }
}

type BoxedMessage = Box<dyn Any + Send>;

/// One rank's endpoint into a [`ThreadCollective`] group: a shared barrier
/// and a full mesh of channels to every other rank, used to implement
/// broadcast and reduce without a real network transport.
pub struct ThreadCollective {
    rank: usize,
    num_ranks: usize,
    barrier: Arc<Barrier>,
    senders: Vec<Sender<BoxedMessage>>,
    receiver: Receiver<BoxedMessage>,
}

impl ThreadCollective {
    /// Builds one [`ThreadCollective`] endpoint per rank, fully connected by
    /// channels and sharing one barrier, ready to hand to `num_ranks`
    /// threads (one per rank).
    pub fn group(num_ranks: usize) -> Result<Vec<Self>> {
        crate::common::validation::validate_rank_geometry(num_ranks, 1)?;
        let barrier = Arc::new(Barrier::new(num_ranks));

        // senders[i][j] is how rank i sends to rank j.
        let mut senders: Vec<Vec<Sender<BoxedMessage>>> = vec![Vec::with_capacity(num_ranks); num_ranks];
        let mut receivers: Vec<Option<Receiver<BoxedMessage>>> = (0..num_ranks).map(|_| None).collect();
        for target in 0..num_ranks {
            let (tx, rx) = std::sync::mpsc::channel();
            for sender_list in senders.iter_mut() {
                sender_list.push(tx.clone());
            }
            receivers[target] = Some(rx);
        }

        Ok((0..num_ranks)
            .map(|rank| Self {
                rank,
                num_ranks,
                barrier: Arc::clone(&barrier),
                senders: senders[rank].clone(),
                receiver: receivers[rank].take().expect("receiver set exactly once"),
            })
            .collect())
    }

    fn send_to(&self, target: usize, message: BoxedMessage) -> Result<()> {
        self.senders[target]
            .send(message)
            .map_err(|err| SketchError::ProtocolFailure {
                reason: format!("rank {} could not send to rank {target}: {err}", self.rank),
            })
    }

    fn recv_one(&self) -> Result<BoxedMessage> {
        self.receiver.recv().map_err(|err| SketchError::ProtocolFailure {
            reason: format!("rank {} failed to receive: {err}", self.rank),
        })
    }

    fn downcast<T: 'static>(message: BoxedMessage, rank: usize) -> Result<T> {
        message.downcast::<T>().map(|boxed| *boxed).map_err(|_| {
            SketchError::ProtocolFailure {
                reason: format!("rank {rank} received a message of unexpected type"),
            }
        })
    }
}

impl Collective for ThreadCollective {
    fn rank(&self) -> usize {
        self.rank
    }

    fn num_ranks(&self) -> usize {
        self.num_ranks
    }

    fn broadcast<T: Clone + Send + 'static>(&self, value: Option<T>) -> Result<T> {
        if self.rank == 0 {
            let value = value.ok_or_else(|| SketchError::ProtocolFailure {
                reason: "rank 0 must supply a value to broadcast".to_string(),
            })?;
            for target in 0..self.num_ranks {
                if target == self.rank {
                    continue;
                }
                self.send_to(target, Box::new(value.clone()))?;
            }
            Ok(value)
        } else {
            let message = self.recv_one()?;
            Self::downcast(message, self.rank)
        }
    }

    fn reduce<T, F>(&self, value: T, combine: F) -> Result<T>
    where
        T: Send + 'static,
        F: Fn(T, T) -> T + Send + Sync,
    {
        self.barrier.wait();
        debug!(rank = self.rank, num_ranks = self.num_ranks, "reduce barrier cleared");
        if self.rank == 0 {
            let mut acc = value;
            for _ in 1..self.num_ranks {
                let message = self.recv_one()?;
                let contribution: T = Self::downcast(message, self.rank)?;
                acc = combine(acc, contribution);
            }
            debug!(rank = self.rank, "root finished sum-reduction");
            self.broadcast(Some(acc))
        } else {
            self.send_to(0, Box::new(value))?;
            self.broadcast(None)
        }
    }

    fn barrier(&self) -> Result<()> {
        self.barrier.wait();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_process_broadcast_returns_supplied_value() {
        let collective = InProcessCollective;
        let value = collective.broadcast(Some(42u32)).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn in_process_reduce_is_identity() {
        let collective = InProcessCollective;
        let value = collective.reduce(7u32, |a, b| a + b).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn in_process_barrier_does_not_block() {
        assert!(InProcessCollective.barrier().is_ok());
    }

    #[test]
    fn thread_collective_group_has_requested_size() {
        let group = ThreadCollective::group(4).unwrap();
        assert_eq!(group.len(), 4);
        for (i, member) in group.iter().enumerate() {
            assert_eq!(member.rank(), i);
            assert_eq!(member.num_ranks(), 4);
        }
    }

    #[test]
    fn thread_collective_barrier_releases_every_rank() {
        let group = ThreadCollective::group(3).unwrap();
        std::thread::scope(|scope| {
            for member in &group {
                scope.spawn(move || {
                    member.barrier().unwrap();
                });
            }
        });
    }

    #[test]
    fn thread_collective_broadcast_reaches_every_rank() {
        let group = ThreadCollective::group(3).unwrap();
        let results: Vec<u32> = std::thread::scope(|scope| {
            let handles: Vec<_> = group
                .into_iter()
                .map(|member| {
                    scope.spawn(move || {
                        let value = if member.rank() == 0 { Some(99u32) } else { None };
                        member.broadcast(value).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(results.iter().all(|&v| v == 99));
    }

    #[test]
    fn thread_collective_reduce_sums_every_rank() {
        let group = ThreadCollective::group(4).unwrap();
        let results: Vec<u32> = std::thread::scope(|scope| {
            let handles: Vec<_> = group
                .into_iter()
                .map(|member| {
                    let contribution = (member.rank() + 1) as u32;
                    scope.spawn(move || member.reduce(contribution, |a, b| a + b).unwrap())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(results.iter().all(|&v| v == 10));
    }
}
