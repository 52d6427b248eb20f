//! Host-communication graphs from edge tables and packet captures.
//!
//! Two independent producers feed the same downstream views:
//! [`edges::EdgeAggregator`] sums packet counts from `count,src,dst` tables,
//! while [`packets::PacketGraphBuilder`] records which address pairs talked in
//! a capture file. [`jobs::CaptureJobManager`] runs timed captures in the
//! background and stores the resulting graphs for later queries.
pub mod address;
pub mod capture;
pub mod config;
pub mod decode;
pub mod edges;
pub mod error;
pub mod graph;
pub mod jobs;
pub mod models;
pub mod packets;
pub mod registry;

pub use address::{is_ipv4, Address};
pub use config::CaptureConfig;
pub use edges::{EdgeAggregator, TrafficGraph};
pub use error::{Error, Result};
pub use graph::PeerIndex;
pub use jobs::CaptureJobManager;
pub use packets::{PacketGraph, PacketGraphBuilder};
