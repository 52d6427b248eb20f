//! Weighted host graph built from `count,src,dst` edge tables.
//!
//! Edge tables exported from capture tools are rarely clean: some rows carry
//! extra columns or duplicated addresses, some have a non-numeric count. The
//! aggregator repairs what it can (the last two addresses on a row are taken
//! as source and destination), counts what it cannot, and never aborts on a
//! bad row. Only a table with no rows at all is an error.
use crate::address::Address;
use crate::error::{Error, Result, RowDefect};
use crate::graph::{rank_edges, PeerIndex};
use crate::models::dto::{GraphSummary, WeightedEdge};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

pub type EdgeKey = (Address, Address);

/// Aggregated result of an edge table.
#[derive(Debug, Clone, Default)]
pub struct TrafficGraph {
    nodes: BTreeSet<Address>,
    directed: BTreeMap<EdgeKey, u64>,
    undirected: BTreeMap<EdgeKey, u64>,
    peers: PeerIndex,
    rows_skipped: usize,
    rows_repaired: usize,
}

impl TrafficGraph {
    pub fn nodes(&self) -> &BTreeSet<Address> {
        &self.nodes
    }

    pub fn directed(&self) -> &BTreeMap<EdgeKey, u64> {
        &self.directed
    }

    /// Both directions merged, keyed with the numerically smaller address first.
    pub fn undirected(&self) -> &BTreeMap<EdgeKey, u64> {
        &self.undirected
    }

    pub fn peers(&self) -> &PeerIndex {
        &self.peers
    }

    pub fn rows_skipped(&self) -> usize {
        self.rows_skipped
    }

    pub fn rows_repaired(&self) -> usize {
        self.rows_repaired
    }

    pub fn directed_weight(&self, source: Address, destination: Address) -> u64 {
        self.directed.get(&(source, destination)).copied().unwrap_or(0)
    }

    pub fn undirected_weight(&self, a: Address, b: Address) -> u64 {
        self.undirected.get(&canonical(a, b)).copied().unwrap_or(0)
    }

    pub fn top_directed(&self, limit: usize) -> Vec<WeightedEdge> {
        rank_edges(&self.directed, limit)
    }

    pub fn top_undirected(&self, limit: usize) -> Vec<WeightedEdge> {
        rank_edges(&self.undirected, limit)
    }

    pub fn summary(&self, limit: usize) -> GraphSummary {
        GraphSummary {
            unique_ips: self.nodes.len(),
            directed_edges: self.directed.len(),
            undirected_edges: self.undirected.len(),
            rows_repaired: self.rows_repaired,
            rows_skipped: self.rows_skipped,
            top_directed: self.top_directed(limit),
            top_undirected: self.top_undirected(limit),
        }
    }

    fn insert(&mut self, source: Address, destination: Address, count: u64) {
        let weight = self.directed.entry((source, destination)).or_insert(0);
        *weight = weight.saturating_add(count);
        self.peers.record(source, destination, count);
        self.nodes.insert(source);
        self.nodes.insert(destination);
    }

    fn merge_directions(&mut self) {
        self.undirected.clear();
        for (&(source, destination), &weight) in &self.directed {
            let merged = self.undirected.entry(canonical(source, destination)).or_insert(0);
            *merged = merged.saturating_add(weight);
        }
    }
}

fn canonical(a: Address, b: Address) -> EdgeKey {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// A data row reduced to the edge it describes.
#[derive(Debug, PartialEq, Eq)]
struct ReducedRow {
    count: u64,
    source: Address,
    destination: Address,
    repaired: bool,
}

fn reduce_row(fields: &[&str]) -> Result<ReducedRow, RowDefect> {
    let count = fields[0]
        .parse::<u64>()
        .map_err(|_| RowDefect::BadCount(fields[0].to_string()))?;

    let addresses: Vec<Address> = fields[1..].iter().filter_map(|f| Address::parse(f)).collect();
    let [.., source, destination] = addresses[..] else {
        return Err(RowDefect::TooFewAddresses(addresses.len()));
    };

    Ok(ReducedRow {
        count,
        source,
        destination,
        repaired: fields.len() > 3,
    })
}

/// Streaming builder for [`TrafficGraph`]. The first row pushed is the header.
#[derive(Debug, Default)]
pub struct EdgeAggregator {
    graph: TrafficGraph,
    seen_header: bool,
}

impl EdgeAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregates a whole table held in memory.
    pub fn aggregate<I, R, S>(rows: I) -> Result<TrafficGraph>
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut aggregator = Self::new();
        for row in rows {
            aggregator.push_row(row);
        }
        aggregator.finish()
    }

    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<TrafficGraph> {
        let path = path.as_ref();
        info!("Reading edge table {}", path.display());
        Self::from_csv_reader(File::open(path)?)
    }

    pub fn from_csv_reader<R: Read>(reader: R) -> Result<TrafficGraph> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut aggregator = Self::new();
        for record in rdr.records() {
            match record {
                Ok(record) => aggregator.push_row(record.iter()),
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(e) => aggregator.push_undecodable(e.to_string()),
            }
        }
        aggregator.finish()
    }

    pub fn push_row<R, S>(&mut self, row: R)
    where
        R: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if !self.seen_header {
            self.seen_header = true;
            return;
        }

        let raw: Vec<S> = row.into_iter().collect();
        let fields: Vec<&str> = raw.iter().map(|f| f.as_ref().trim()).collect();
        if fields.is_empty() {
            return;
        }

        match reduce_row(&fields) {
            Ok(row) => {
                if row.repaired {
                    self.graph.rows_repaired += 1;
                }
                if row.source == row.destination {
                    return;
                }
                self.graph.insert(row.source, row.destination, row.count);
            }
            Err(defect) => self.skip(defect),
        }
    }

    /// Accounts for a record the table reader could not decode.
    pub fn push_undecodable(&mut self, reason: String) {
        if !self.seen_header {
            self.seen_header = true;
            return;
        }
        self.skip(RowDefect::Undecodable(reason));
    }

    pub fn finish(mut self) -> Result<TrafficGraph> {
        if !self.seen_header {
            return Err(Error::InputEmpty);
        }
        self.graph.merge_directions();
        info!(
            nodes = self.graph.nodes.len(),
            directed = self.graph.directed.len(),
            undirected = self.graph.undirected.len(),
            skipped = self.graph.rows_skipped,
            repaired = self.graph.rows_repaired,
            "Edge table aggregated"
        );
        Ok(self.graph)
    }

    fn skip(&mut self, defect: RowDefect) {
        debug!("Skipping row: {defect}");
        self.graph.rows_skipped += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        Address::parse(s).unwrap()
    }

    fn table(lines: &[&str]) -> Vec<Vec<String>> {
        lines
            .iter()
            .map(|l| l.split(',').map(str::to_string).collect())
            .collect()
    }

    fn aggregate(lines: &[&str]) -> TrafficGraph {
        EdgeAggregator::aggregate(table(lines)).unwrap()
    }

    #[test]
    fn sums_counts_per_ordered_pair() {
        let graph = aggregate(&[
            "count,src,dst",
            "3,10.0.0.1,10.0.0.2",
            "4,10.0.0.1,10.0.0.2",
            "2,10.0.0.2,10.0.0.1",
        ]);
        assert_eq!(graph.directed_weight(addr("10.0.0.1"), addr("10.0.0.2")), 7);
        assert_eq!(graph.directed_weight(addr("10.0.0.2"), addr("10.0.0.1")), 2);
        assert_eq!(graph.undirected_weight(addr("10.0.0.2"), addr("10.0.0.1")), 9);
        assert_eq!(graph.undirected().len(), 1);
        assert_eq!(graph.rows_skipped(), 0);
        assert_eq!(graph.rows_repaired(), 0);
    }

    #[test]
    fn header_is_not_validated() {
        let graph = aggregate(&["5,10.0.0.1,10.0.0.2", "1,10.0.0.3,10.0.0.4"]);
        assert_eq!(graph.directed().len(), 1);
        assert_eq!(graph.directed_weight(addr("10.0.0.3"), addr("10.0.0.4")), 1);
    }

    #[test]
    fn non_numeric_count_is_skipped() {
        let graph = aggregate(&["h", "1,10.0.0.1,10.0.0.2", "abc,10.0.0.1,10.0.0.2"]);
        assert_eq!(graph.rows_skipped(), 1);
        assert_eq!(graph.directed_weight(addr("10.0.0.1"), addr("10.0.0.2")), 1);
    }

    #[test]
    fn negative_count_is_skipped() {
        let graph = aggregate(&["h", "-4,10.0.0.1,10.0.0.2"]);
        assert_eq!(graph.rows_skipped(), 1);
        assert!(graph.directed().is_empty());
    }

    #[test]
    fn too_few_addresses_is_skipped() {
        let graph = aggregate(&["h", "3,10.0.0.1,not-an-ip", "3,10.0.0.1", "7"]);
        assert_eq!(graph.rows_skipped(), 3);
        assert!(graph.nodes().is_empty());
    }

    #[test]
    fn extra_columns_use_last_two_addresses() {
        let graph = aggregate(&["h", "3,10.0.0.1,10.0.0.2,10.0.0.2,10.0.0.3"]);
        assert_eq!(graph.rows_repaired(), 1);
        assert_eq!(graph.directed_weight(addr("10.0.0.2"), addr("10.0.0.3")), 3);
        assert_eq!(graph.directed().len(), 1);
        assert!(!graph.nodes().contains(&addr("10.0.0.1")));
    }

    #[test]
    fn self_loop_is_dropped_silently() {
        let graph = aggregate(&["h", "5,10.0.0.1,10.0.0.1"]);
        assert!(graph.directed().is_empty());
        assert!(graph.nodes().is_empty());
        assert_eq!(graph.rows_skipped(), 0);
        assert_eq!(graph.rows_repaired(), 0);
    }

    #[test]
    fn fields_are_trimmed() {
        let graph = aggregate(&["h", " 2 , 10.0.0.1 ,10.0.0.2 "]);
        assert_eq!(graph.directed_weight(addr("10.0.0.1"), addr("10.0.0.2")), 2);
    }

    #[test]
    fn empty_row_is_ignored() {
        let rows: Vec<Vec<&str>> = vec![vec!["h"], vec![], vec!["1", "10.0.0.1", "10.0.0.2"]];
        let graph = EdgeAggregator::aggregate(rows).unwrap();
        assert_eq!(graph.rows_skipped(), 0);
        assert_eq!(graph.directed().len(), 1);
    }

    #[test]
    fn empty_input_is_an_error() {
        let rows: Vec<Vec<&str>> = Vec::new();
        assert!(matches!(EdgeAggregator::aggregate(rows), Err(Error::InputEmpty)));
    }

    #[test]
    fn header_only_is_an_empty_graph() {
        let graph = aggregate(&["count,src,dst"]);
        assert!(graph.nodes().is_empty());
        assert_eq!(graph.rows_skipped(), 0);
    }

    #[test]
    fn nodes_and_edges_stay_consistent() {
        let graph = aggregate(&[
            "h",
            "1,10.0.0.1,10.0.0.2",
            "2,10.0.0.2,10.0.0.3",
            "3,10.0.0.3,10.0.0.1",
            "4,10.0.0.3,10.0.0.2",
            "x,10.0.0.9,10.0.0.8",
            "5,10.0.0.4,10.0.0.4",
        ]);

        let endpoints: BTreeSet<Address> =
            graph.directed().keys().flat_map(|(s, d)| [*s, *d]).collect();
        assert_eq!(&endpoints, graph.nodes());

        for (&(s, d), _) in graph.directed() {
            assert_ne!(s, d);
            assert_eq!(
                graph.undirected_weight(s, d),
                graph.directed_weight(s, d) + graph.directed_weight(d, s)
            );
        }
        for (&(a, b), _) in graph.undirected() {
            assert!(a < b);
        }
    }

    #[test]
    fn peers_follow_directed_weights() {
        let graph = aggregate(&[
            "h",
            "3,10.0.0.1,10.0.0.2",
            "6,10.0.0.1,10.0.0.3",
            "1,10.0.0.3,10.0.0.1",
        ]);
        let a = addr("10.0.0.1");
        assert_eq!(
            graph.peers().top_outbound(&a, 10),
            vec![(addr("10.0.0.3"), 6), (addr("10.0.0.2"), 3)]
        );
        assert_eq!(graph.peers().top_inbound(&a, 10), vec![(addr("10.0.0.3"), 1)]);
    }

    #[test]
    fn summary_ranks_heaviest_edges() {
        let graph = aggregate(&[
            "h",
            "3,10.0.0.1,10.0.0.2",
            "9,10.0.0.2,10.0.0.1",
            "5,10.0.0.5,10.0.0.6",
        ]);
        let summary = graph.summary(1);
        assert_eq!(summary.unique_ips, 4);
        assert_eq!(summary.directed_edges, 3);
        assert_eq!(summary.undirected_edges, 2);
        assert_eq!(summary.top_directed[0].weight, 9);
        assert_eq!(summary.top_undirected[0].weight, 12);
        assert_eq!(summary.top_undirected[0].source, addr("10.0.0.1"));
    }

    #[test]
    fn reads_csv_with_ragged_rows() {
        let data = "count,src,dst\n\
                    10,192.168.1.2,8.8.8.8\n\
                    oops,192.168.1.2,8.8.8.8\n\
                    4,192.168.1.2,192.168.1.9,8.8.8.8,192.168.1.2\n";
        let graph = EdgeAggregator::from_csv_reader(data.as_bytes()).unwrap();
        assert_eq!(graph.rows_skipped(), 1);
        assert_eq!(graph.rows_repaired(), 1);
        assert_eq!(graph.directed_weight(addr("192.168.1.2"), addr("8.8.8.8")), 10);
        assert_eq!(graph.directed_weight(addr("8.8.8.8"), addr("192.168.1.2")), 4);
        assert_eq!(graph.undirected_weight(addr("8.8.8.8"), addr("192.168.1.2")), 14);
    }

    #[test]
    fn empty_csv_is_an_error() {
        assert!(matches!(
            EdgeAggregator::from_csv_reader("".as_bytes()),
            Err(Error::InputEmpty)
        ));
    }

    #[test]
    fn undecodable_record_is_skipped() {
        let mut data = b"count,src,dst\n1,10.0.0.1,10.0.0.2\n".to_vec();
        data.extend_from_slice(b"2,10.0.0.1,\xff\xfe\n");
        let graph = EdgeAggregator::from_csv_reader(&data[..]).unwrap();
        assert_eq!(graph.rows_skipped(), 1);
        assert_eq!(graph.directed().len(), 1);
    }
}
