//! The innovation ledger keeps track of structural innovations within
//! one generation of a population, in order to make sure identical
//! mutations are assigned the same innovation numbers.
//!
//! For link innovations the endpoints and the recurrent flag identify
//! identical mutations. For node innovations the split connection's
//! innovation number identifies them, and the new node ID plus the two
//! new link innovation numbers are recorded.
//!
//! The ledger also owns the population's monotone innovation and
//! node-ID counters. Lookup-or-append runs under one mutex, which is
//! the single shared critical section of the parallel epoch executor:
//! the first writer of a structurally equivalent mutation wins, and
//! later writers observe its numbers.

use crate::{Innovation, NodeId};

use ahash::RandomState;

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// The identifiers allotted to an add-node mutation: the new hidden
/// node and the two connections replacing the split one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeSplit {
    /// ID of the inserted hidden node.
    pub node_id: NodeId,
    /// Innovation of the connection into the new node.
    pub in_innovation: Innovation,
    /// Innovation of the connection out of the new node.
    pub out_innovation: Innovation,
}

#[derive(Debug, Default)]
struct LedgerInner {
    next_innovation: Innovation,
    next_node_id: NodeId,
    links: HashMap<(NodeId, NodeId, bool), Innovation, RandomState>,
    splits: HashMap<Innovation, NodeSplit, RandomState>,
}

/// A per-population registry of the current generation's structural
/// innovations.
#[derive(Debug, Default)]
pub struct InnovationLedger {
    inner: Mutex<LedgerInner>,
}

impl InnovationLedger {
    /// Creates a ledger whose counters continue from the given next
    /// innovation number and node ID.
    ///
    /// # Examples
    /// ```
    /// use evoneat::genomics::InnovationLedger;
    ///
    /// let ledger = InnovationLedger::new(4, 5);
    /// assert_eq!(ledger.next_innovation(), 4);
    /// assert_eq!(ledger.next_node_id(), 5);
    /// ```
    pub fn new(next_innovation: Innovation, next_node_id: NodeId) -> InnovationLedger {
        InnovationLedger {
            inner: Mutex::new(LedgerInner {
                next_innovation,
                next_node_id,
                links: HashMap::default(),
                splits: HashMap::default(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LedgerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the innovation number for a link between the given
    /// endpoints, reusing the number of an equivalent mutation already
    /// recorded this generation or allotting a fresh one.
    pub fn link_innovation(
        &self,
        source: NodeId,
        target: NodeId,
        recurrent: bool,
    ) -> Innovation {
        let mut inner = self.lock();
        if let Some(&innovation) = inner.links.get(&(source, target, recurrent)) {
            return innovation;
        }
        let innovation = inner.next_innovation;
        inner.next_innovation += 1;
        inner.links.insert((source, target, recurrent), innovation);
        innovation
    }

    /// Returns the identifiers for splitting the connection with the
    /// given innovation number, reusing the numbers of an equivalent
    /// mutation already recorded this generation or allotting fresh
    /// ones.
    pub fn node_split(&self, split_innovation: Innovation) -> NodeSplit {
        let mut inner = self.lock();
        if let Some(split) = inner.splits.get(&split_innovation) {
            return *split;
        }
        let split = NodeSplit {
            node_id: inner.next_node_id,
            in_innovation: inner.next_innovation,
            out_innovation: inner.next_innovation + 1,
        };
        inner.next_node_id += 1;
        inner.next_innovation += 2;
        inner.splits.insert(split_innovation, split);
        split
    }

    /// Clears the recorded mutations at a generation boundary. The
    /// counters keep their values.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.links.clear();
        inner.splits.clear();
    }

    /// Returns the next innovation number that would be allotted.
    pub fn next_innovation(&self) -> Innovation {
        self.lock().next_innovation
    }

    /// Returns the next node ID that would be allotted.
    pub fn next_node_id(&self) -> NodeId {
        self.lock().next_node_id
    }

    /// Returns the number of link mutations recorded this generation.
    pub fn link_record_count(&self) -> usize {
        self.lock().links.len()
    }

    /// Returns the number of node mutations recorded this generation.
    pub fn node_record_count(&self) -> usize {
        self.lock().splits.len()
    }
}
