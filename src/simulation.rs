use async_stream::stream;
use causeway_node::{Cluster, NetworkConfig, NodeConfigBuilder, NodeError, NodeEvent, NodeIndex};
use chrono::{DateTime, Local};
use colored::*;
use futures::future::join_all;
use futures::stream::{Stream, StreamExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// A transaction description carried as the message payload.
pub type Transaction = String;

/// Errors that abort a simulation run.
#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),

    #[error("Simulation did not settle: {pending} message(s) still held back")]
    Stranded { pending: usize },

    #[error("Nodes disagree after settling: {0}")]
    Diverged(String),

    #[error("Invalid workload: {0}")]
    InvalidWorkload(String),
}

pub type Result<T> = std::result::Result<T, SimulationError>;

/// Upper bound on per-node event buffering. Reporters that fall further
/// behind skip events; delivery counts come from the nodes themselves.
const MAX_EVENT_CAPACITY: usize = 65_536;

/// Event channel size for a workload: room for every delivery a node can
/// see, within `[100, MAX_EVENT_CAPACITY]`.
fn event_capacity(transactions: usize, num_nodes: usize) -> usize {
    transactions
        .saturating_mul(num_nodes)
        .clamp(100, MAX_EVENT_CAPACITY)
}

/// Statistics collected during a simulation run
#[derive(Clone, Debug)]
pub struct SimulationStats {
    pub scenario: &'static str,
    pub num_nodes: usize,
    pub transactions: usize,
    pub deliveries: u64,
    pub held_back: usize,
    pub events_missed: usize,
    pub final_clock: String,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub total_time: Duration,
}

impl SimulationStats {
    pub fn print(&self) {
        println!("\n╔════════════════════════════════════════════════════════════╗");
        println!("║              Simulation Statistics                         ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║  Scenario:                  {:>30} ║", self.scenario);
        println!("║  Number of Nodes:           {:>30} ║", self.num_nodes);
        println!("║  Transactions Sent:         {:>30} ║", self.transactions);
        println!("║  Deliveries:                {:>30} ║", self.deliveries);
        println!("║  Held Back on Arrival:      {:>30} ║", self.held_back);
        println!("║  Events Missed by Reporter: {:>30} ║", self.events_missed);
        println!("║  Final Clock:               {:>30} ║", self.final_clock);
        println!("║  Started:                   {:>30} ║", self.started_at.format("%H:%M:%S%.3f"));
        println!("║  Finished:                  {:>30} ║", self.finished_at.format("%H:%M:%S%.3f"));
        println!("║  Total Time:                {:>29}s ║", format!("{:.3}", self.total_time.as_secs_f64()));
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

/// Counters shared by the reporter tasks.
#[derive(Default)]
struct Tally {
    held_back: AtomicUsize,
    missed: AtomicUsize,
}

/// Print every event of every node until the cluster is dropped.
fn spawn_reporters(cluster: &Cluster<Transaction>, tally: &Arc<Tally>) -> Vec<JoinHandle<()>> {
    cluster
        .nodes()
        .iter()
        .map(|node| {
            let mut rx = node.subscribe();
            let tally = Arc::clone(tally);
            tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(event) => report(&event, &tally),
                        Err(RecvError::Lagged(skipped)) => {
                            tally.missed.fetch_add(skipped as usize, Ordering::Relaxed);
                            warn!(skipped, "reporter lagged behind node events");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            })
        })
        .collect()
}

fn report(event: &NodeEvent<Transaction>, tally: &Tally) {
    match event {
        NodeEvent::HeldBack {
            node,
            sender,
            payload,
            reason,
            ..
        } => {
            tally.held_back.fetch_add(1, Ordering::Relaxed);
            println!(
                "  {} Node {} holding transaction from Node {}: '{}' ({:?})",
                "⏸".yellow(),
                node,
                sender,
                payload,
                reason
            );
        }
        NodeEvent::Delivered {
            node,
            sender,
            timestamp,
            payload,
            from_queue,
        } => {
            let via = if *from_queue { " (from hold-back queue)" } else { "" };
            println!(
                "  {} Node {} processed transaction from Node {}: '{}' {}{}",
                "✓".green(),
                node,
                sender,
                payload,
                timestamp,
                via.dimmed()
            );
        }
    }
}

fn announce(from: NodeIndex, transaction: &str, timestamp: &causeway_node::VectorClock) {
    println!(
        "{} Node {} sends transaction: '{}' with clock {}",
        "→".cyan(),
        from,
        transaction.bold(),
        timestamp
    );
}

/// Wait for the network, verify the final state and collect statistics.
async fn finish(
    scenario: &'static str,
    cluster: Cluster<Transaction>,
    reporters: Vec<JoinHandle<()>>,
    tally: Arc<Tally>,
    transactions: usize,
    started_at: DateTime<Local>,
    start: Instant,
) -> Result<SimulationStats> {
    cluster.settle().await?;

    let pending: usize = cluster.nodes().iter().map(|n| n.pending_count()).sum();
    if pending > 0 {
        for node in cluster.nodes() {
            for sender in cluster.peers_of(node.id()) {
                let held = node.pending_from(sender);
                if held > 0 {
                    warn!(node = node.id(), sender, held, "messages stranded in hold-back queue");
                }
            }
        }
        return Err(SimulationError::Stranded { pending });
    }

    let clocks = cluster.clocks();
    println!("\nFinal clocks:");
    for (id, clock) in clocks.iter().enumerate() {
        println!("  Node {}: {}", id, clock);
    }
    // Converged clocks must account for every send exactly once.
    if !cluster.is_converged() || clocks[0].sum() != transactions as u64 {
        let listing: Vec<String> = clocks.iter().map(|c| c.to_string()).collect();
        return Err(SimulationError::Diverged(listing.join(" ")));
    }

    let deliveries: u64 = cluster.nodes().iter().map(|n| n.delivered_count()).sum();

    // Dropping the cluster closes every event channel so reporters finish.
    let num_nodes = cluster.len();
    drop(cluster);
    join_all(reporters).await;

    let stats = SimulationStats {
        scenario,
        num_nodes,
        transactions,
        deliveries,
        held_back: tally.held_back.load(Ordering::Relaxed),
        events_missed: tally.missed.load(Ordering::Relaxed),
        final_clock: clocks[0].to_string(),
        started_at,
        finished_at: Local::now(),
        total_time: start.elapsed(),
    };
    info!(
        scenario,
        deliveries = stats.deliveries,
        held_back = stats.held_back,
        "simulation settled"
    );
    Ok(stats)
}

/// The three-bank trace: a deposit from bank 0, a pause, then a
/// withdrawal from bank 1 that causally follows it.
pub async fn run_banking(network: NetworkConfig, pause: Duration) -> Result<SimulationStats> {
    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║        Distributed Banking with Vector Clocks              ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    let started_at = Local::now();
    let start = Instant::now();

    let cluster: Cluster<Transaction> = Cluster::new(3, NodeConfigBuilder::new().build(), network)?;
    let tally = Arc::new(Tally::default());
    let reporters = spawn_reporters(&cluster, &tally);

    let deposit = cluster.multicast_delayed(0, "Deposit $10,000".to_string(), &[1, 2])?;
    announce(0, deposit.payload(), deposit.timestamp());

    tokio::time::sleep(pause).await;

    let withdraw = cluster.multicast_delayed(1, "Withdraw $10,000".to_string(), &[0, 2])?;
    announce(1, withdraw.payload(), withdraw.timestamp());

    finish("banking", cluster, reporters, tally, 2, started_at, start).await
}

/// Generator that yields `(sender, transaction)` pairs for a random workload
fn transaction_generator(
    num_nodes: usize,
    count: usize,
    seed: u64,
) -> impl Stream<Item = (NodeIndex, Transaction)> {
    stream! {
        let mut rng = StdRng::seed_from_u64(seed);
        for i in 0..count {
            let sender = rng.gen_range(0..num_nodes);
            let amount = rng.gen_range(1..=100) * 100;
            let transaction = if rng.gen_bool(0.5) {
                format!("Deposit ${} #{}", amount, i)
            } else {
                format!("Withdraw ${} #{}", amount, i)
            };
            yield (sender, transaction);
        }
    }
}

/// Random broadcast workload with jittered fan-out.
pub async fn run_random(
    num_nodes: usize,
    transactions: usize,
    network: NetworkConfig,
    seed: u64,
) -> Result<SimulationStats> {
    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║        Random Causal Broadcast Workload                    ║");
    println!("║  Nodes: {} | Transactions: {} ║", num_nodes, transactions);
    println!("╚════════════════════════════════════════════════════════════╝");

    if num_nodes == 0 {
        return Err(SimulationError::InvalidWorkload(
            "at least one node is required".to_string(),
        ));
    }

    let started_at = Local::now();
    let start = Instant::now();

    let node_config = NodeConfigBuilder::new()
        .event_capacity(event_capacity(transactions, num_nodes))
        .build();
    let cluster: Cluster<Transaction> = Cluster::new(num_nodes, node_config, network)?;
    let tally = Arc::new(Tally::default());
    let reporters = spawn_reporters(&cluster, &tally);

    let mut workload = Box::pin(transaction_generator(num_nodes, transactions, seed));
    let mut sent = 0;
    while let Some((sender, transaction)) = workload.next().await {
        let message = cluster.broadcast_delayed(sender, transaction)?;
        announce(sender, message.payload(), message.timestamp());
        sent += 1;

        // Give in-flight messages a chance to land between sends
        tokio::task::yield_now().await;
        if sent % 5 == 0 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    finish("random", cluster, reporters, tally, sent, started_at, start).await
}
