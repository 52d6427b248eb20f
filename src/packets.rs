//! Unweighted host graph built from decoded capture packets.
//!
//! Unlike the edge-table aggregator, repeated packets between the same
//! ordered pair do not add weight: an edge is either present or not.
use crate::address::Address;
use crate::decode::{PacketDecoder, PacketStream};
use crate::error::{Error, Result};
use crate::graph::PeerIndex;
use crate::models::dto::{EdgeRecord, GraphView, NodeRecord};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info};

/// Source and destination of one IP packet.
pub type Endpoints = (Address, Address);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PacketGraph {
    nodes: BTreeSet<Address>,
    edges: BTreeSet<Endpoints>,
    packets_seen: u64,
    packets_skipped: u64,
}

impl PacketGraph {
    pub fn nodes(&self) -> &BTreeSet<Address> {
        &self.nodes
    }

    pub fn edges(&self) -> &BTreeSet<Endpoints> {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Packets read from the capture, including the non-IP ones.
    pub fn packets_seen(&self) -> u64 {
        self.packets_seen
    }

    pub fn packets_skipped(&self) -> u64 {
        self.packets_skipped
    }

    /// Neighbor view where every present edge has weight 1.
    pub fn peers(&self) -> PeerIndex {
        let mut peers = PeerIndex::new();
        for &(source, destination) in &self.edges {
            peers.record(source, destination, 1);
        }
        peers
    }

    pub fn view(&self) -> GraphView {
        let nodes: Vec<NodeRecord> = self
            .nodes
            .iter()
            .map(|ip| NodeRecord {
                id: ip.to_string(),
                label: ip.to_string(),
            })
            .collect();
        let edges: Vec<EdgeRecord> = self
            .edges
            .iter()
            .map(|(a, b)| EdgeRecord {
                from: a.to_string(),
                to: b.to_string(),
                title: format!("SRC {a} \u{2192} DST {b}"),
            })
            .collect();

        GraphView {
            host_count: nodes.len(),
            connection_count: edges.len(),
            nodes,
            edges,
            parsed: true,
        }
    }
}

pub struct PacketGraphBuilder;

impl PacketGraphBuilder {
    /// Drains `packets` once. The first decoding error ends the build.
    pub fn build<I>(packets: I) -> Result<PacketGraph>
    where
        I: IntoIterator<Item = Result<Option<Endpoints>>>,
    {
        let mut graph = PacketGraph::default();

        for packet in packets {
            graph.packets_seen += 1;
            let Some((source, destination)) = packet? else {
                graph.packets_skipped += 1;
                continue;
            };

            graph.nodes.insert(source);
            graph.nodes.insert(destination);
            if source != destination {
                graph.edges.insert((source, destination));
            }
        }

        info!(
            packets = graph.packets_seen,
            hosts = graph.nodes.len(),
            connections = graph.edges.len(),
            "Packet graph built"
        );
        Ok(graph)
    }

    pub fn from_stream(stream: PacketStream) -> Result<PacketGraph> {
        Self::build(stream)
    }
}

/// Builds a graph from an existing `.pcap`/`.pcapng` file.
pub fn import_capture(decoder: &dyn PacketDecoder, path: &Path) -> Result<PacketGraph> {
    let supported = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pcap") || ext.eq_ignore_ascii_case("pcapng"))
        .unwrap_or(false);
    if !supported {
        return Err(Error::UnsupportedArtifact(path.display().to_string()));
    }

    debug!("Importing capture {}", path.display());
    PacketGraphBuilder::from_stream(decoder.decode(path)?)
}
