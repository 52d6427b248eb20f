use clap::{ArgAction, Parser, Subcommand};
use netmapper::decode::default_decoder;
use netmapper::models::domain::JobStatus;
use netmapper::packets::import_capture;
use netmapper::{CaptureConfig, CaptureJobManager, EdgeAggregator, PacketGraph, TrafficGraph};
use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// netmapper builds host-communication graphs from edge tables and packet captures
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Aggregate a `count,src,dst` edge table
    Edges {
        /// CSV file; the first row is treated as a header
        csv: PathBuf,

        /// Number of heaviest edges to list
        #[arg(short = 't', long, default_value_t = 30)]
        top: usize,

        /// Max peers listed per address and direction
        #[arg(short = 'p', long, default_value_t = 200)]
        peers: usize,

        /// Display output as formatted JSON
        #[arg(short = 'j', long, action = ArgAction::SetTrue)]
        json: bool,
    },

    /// Build a graph from an existing pcap/pcapng file
    Import {
        file: PathBuf,

        #[arg(short = 'j', long, action = ArgAction::SetTrue)]
        json: bool,
    },

    /// Capture live traffic with tshark, then build a graph
    Capture {
        /// Capture duration in seconds (1-3600)
        #[arg(short = 'd', long, default_value_t = 60)]
        duration: u64,

        /// Interface selector as listed by `tshark -D`
        #[arg(short = 'i', long)]
        interface: Option<String>,

        /// Path to the tshark executable
        #[arg(long)]
        tshark: Option<PathBuf>,

        /// Seconds between status checks
        #[arg(long, default_value_t = 1)]
        poll: u64,

        #[arg(short = 'j', long, action = ArgAction::SetTrue)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Args::parse().command {
        Command::Edges {
            csv,
            top,
            peers,
            json,
        } => {
            let graph = EdgeAggregator::from_csv_path(&csv)?;
            print_traffic(&graph, top, peers, json)?;
        }
        Command::Import { file, json } => {
            let decoder = default_decoder();
            let graph = import_capture(decoder.as_ref(), &file)?;
            print_packets(&graph, json)?;
        }
        Command::Capture {
            duration,
            interface,
            tshark,
            poll,
            json,
        } => {
            let mut config = CaptureConfig::from_env();
            if tshark.is_some() {
                config.tshark_path = tshark;
            }
            let manager = CaptureJobManager::with_defaults(config);

            let ticket = manager.create(duration, interface);
            info!(
                "Job {} capturing for {}s",
                ticket.job_id, ticket.duration_seconds
            );

            let report = manager
                .wait(ticket.job_id, Duration::from_secs(poll.max(1)))
                .await?;
            if report.status == JobStatus::Error {
                let reason = report.error.unwrap_or_else(|| "unknown error".into());
                return Err(reason.into());
            }
            let graph = manager.result(ticket.job_id)?;
            print_packets(&graph, json)?;
        }
    }
    Ok(())
}

fn print_traffic(
    graph: &TrafficGraph,
    top: usize,
    peers: usize,
    json: bool,
) -> Result<(), Box<dyn Error>> {
    let summary = graph.summary(top);
    let hosts: Vec<_> = graph
        .nodes()
        .iter()
        .map(|ip| graph.peers().host(*ip, peers))
        .collect();

    if json {
        let out = serde_json::json!({ "summary": summary, "hosts": hosts });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("Unique IPs: {}", summary.unique_ips);
    println!("Directed edges: {}", summary.directed_edges);
    println!("Undirected edges: {}", summary.undirected_edges);
    println!("Malformed rows fixed (extra columns): {}", summary.rows_repaired);
    println!("Rows skipped: {}", summary.rows_skipped);

    println!("\nTop directed connections");
    for edge in &summary.top_directed {
        println!("  {:>8}  {} -> {}", edge.weight, edge.source, edge.destination);
    }
    println!("\nTop undirected connections");
    for edge in &summary.top_undirected {
        println!("  {:>8}  {} <-> {}", edge.weight, edge.source, edge.destination);
    }

    for host in &hosts {
        println!("\n{}", host.ip);
        for peer in &host.outbound {
            println!("  -> {} ({} packets)", peer.peer, peer.packets);
        }
        for peer in &host.inbound {
            println!("  <- {} ({} packets)", peer.peer, peer.packets);
        }
    }
    Ok(())
}

fn print_packets(graph: &PacketGraph, json: bool) -> Result<(), Box<dyn Error>> {
    let view = graph.view();
    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!("Hosts: {}", view.host_count);
    println!("Connections: {}", view.connection_count);
    for edge in &view.edges {
        println!("  {}", edge.title);
    }
    Ok(())
}
