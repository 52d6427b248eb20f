//! Per-address neighbor views shared by the edge-table and packet graphs.
use crate::address::Address;
use crate::models::dto::{HostPeers, PeerCount, WeightedEdge};
use std::collections::BTreeMap;

pub type Neighbors = BTreeMap<Address, u64>;

/// Outbound and inbound neighbors of every address, with weights.
///
/// Only ever filled from the same pass that records directed edges, so the
/// weights always agree with the edge map they came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerIndex {
    outbound: BTreeMap<Address, Neighbors>,
    inbound: BTreeMap<Address, Neighbors>,
}

impl PeerIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, source: Address, destination: Address, weight: u64) {
        let out = self.outbound.entry(source).or_default().entry(destination).or_insert(0);
        *out = out.saturating_add(weight);
        let inb = self.inbound.entry(destination).or_default().entry(source).or_insert(0);
        *inb = inb.saturating_add(weight);
    }

    pub fn outbound(&self, addr: &Address) -> Option<&Neighbors> {
        self.outbound.get(addr)
    }

    pub fn inbound(&self, addr: &Address) -> Option<&Neighbors> {
        self.inbound.get(addr)
    }

    /// Heaviest outbound peers of `addr`, at most `limit` of them.
    pub fn top_outbound(&self, addr: &Address, limit: usize) -> Vec<(Address, u64)> {
        rank(self.outbound(addr).into_iter().flatten().map(|(a, w)| (*a, *w)), limit)
    }

    /// Heaviest inbound peers of `addr`, at most `limit` of them.
    pub fn top_inbound(&self, addr: &Address, limit: usize) -> Vec<(Address, u64)> {
        rank(self.inbound(addr).into_iter().flatten().map(|(a, w)| (*a, *w)), limit)
    }

    pub fn host(&self, addr: Address, limit: usize) -> HostPeers {
        let counts = |ranked: Vec<(Address, u64)>| -> Vec<PeerCount> {
            ranked
                .into_iter()
                .map(|(peer, packets)| PeerCount { peer, packets })
                .collect()
        };
        HostPeers {
            ip: addr,
            outbound: counts(self.top_outbound(&addr, limit)),
            inbound: counts(self.top_inbound(&addr, limit)),
        }
    }
}

/// Sorts by weight descending, breaking ties by ascending key, and keeps the
/// first `limit` entries.
pub fn rank<K: Ord, I>(entries: I, limit: usize) -> Vec<(K, u64)>
where
    I: IntoIterator<Item = (K, u64)>,
{
    let mut ranked: Vec<(K, u64)> = entries.into_iter().collect();
    ranked.sort_by(|(ka, wa), (kb, wb)| wb.cmp(wa).then_with(|| ka.cmp(kb)));
    ranked.truncate(limit);
    ranked
}

pub(crate) fn rank_edges<'a, I>(edges: I, limit: usize) -> Vec<WeightedEdge>
where
    I: IntoIterator<Item = (&'a (Address, Address), &'a u64)>,
{
    rank(edges.into_iter().map(|(pair, w)| (*pair, *w)), limit)
        .into_iter()
        .map(|((source, destination), weight)| WeightedEdge {
            source,
            destination,
            weight,
        })
        .collect()
}
