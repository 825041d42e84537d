//! In-process auction between simulated agents.
//!
//! Every agent watches the shared store through its own event stream, bids on
//! each offer it sees, and tries to claim offers once its own bid shows up on
//! the feed. The winner resolves the offer, standing in for running the job.

use anyhow::{Context, Result, bail};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tender_config::RegistryConfig;
use tender_core::{Job, JobId, JobOffer, KeyValueStore, MachineId};
use tender_registry::{EventStream, JobEvent, OfferRegistry};
use tender_store::MemoryStore;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Run the simulation and print who won each offer.
pub async fn run(config: &RegistryConfig, agents: usize, jobs: usize, timeout: u64) -> Result<()> {
    if agents == 0 {
        bail!("At least one agent is required");
    }

    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let keyspace = config.keyspace();
    let registry = Arc::new(
        OfferRegistry::new(store.clone(), keyspace.clone()).with_bid_ttl(config.bid_ttl),
    );
    let (wins_tx, mut wins_rx) = mpsc::channel(jobs.max(1));

    let mut tasks = Vec::new();
    for _ in 0..agents {
        let (events, pump) = EventStream::new(store.clone(), &keyspace)
            .with_buffer(config.event_buffer)
            .start();
        let agent = Agent {
            machine: MachineId::new(Uuid::new_v4().to_string()),
            registry: registry.clone(),
            claim_ttl: config.claim_ttl,
            wins: wins_tx.clone(),
        };
        tasks.push(pump);
        tasks.push(tokio::spawn(agent.run(events)));
    }
    drop(wins_tx);

    println!("Publishing {} offers to {} agents under {}", jobs, agents, keyspace.root());
    for n in 0..jobs {
        let offer = JobOffer::new(Job::new(format!("job-{n}"), json!({ "sequence": n })));
        registry
            .publish_offer(&offer)
            .await
            .with_context(|| format!("Failed to publish offer {}", offer.job_id()))?;
    }

    let mut winners: BTreeMap<JobId, MachineId> = BTreeMap::new();
    let deadline = tokio::time::sleep(Duration::from_secs(timeout));
    tokio::pin!(deadline);

    while winners.len() < jobs {
        tokio::select! {
            _ = &mut deadline => {
                warn!(claimed = winners.len(), jobs, "Simulation timed out");
                break;
            }
            win = wins_rx.recv() => match win {
                Some((job, machine)) => {
                    if let Some(previous) = winners.insert(job.clone(), machine) {
                        bail!("Offer {} was claimed twice (first by {})", job, previous);
                    }
                }
                None => break,
            },
        }
    }

    for task in &tasks {
        task.abort();
    }

    println!("\n--- Assignments ---");
    let mut tally: BTreeMap<&MachineId, usize> = BTreeMap::new();
    for (job, machine) in &winners {
        println!("  {} -> {}", job, machine);
        *tally.entry(machine).or_default() += 1;
    }
    println!("\n--- Wins per agent ---");
    for (machine, count) in &tally {
        println!("  {} - {}", machine, count);
    }

    let unresolved = registry.unresolved_offers().await;
    if winners.len() == jobs && unresolved.is_empty() {
        println!("\n✓ Every offer was claimed exactly once");
        Ok(())
    } else {
        bail!(
            "{} of {} offers claimed, {} still unresolved",
            winners.len(),
            jobs,
            unresolved.len()
        );
    }
}

struct Agent {
    machine: MachineId,
    registry: Arc<OfferRegistry>,
    claim_ttl: Duration,
    wins: mpsc::Sender<(JobId, MachineId)>,
}

impl Agent {
    async fn run(self, mut events: mpsc::Receiver<JobEvent>) {
        info!(machine = %self.machine, "Agent started");

        while let Some(event) = events.recv().await {
            match event {
                JobEvent::JobOffered(offer) => {
                    if let Err(e) = self.registry.submit_bid(offer.job_id(), &self.machine).await {
                        warn!(machine = %self.machine, job = %offer.job_id(), error = %e, "Failed to bid");
                    }
                }
                JobEvent::JobBidSubmitted(bid) if bid.machine_id == self.machine => {
                    if !self
                        .registry
                        .claim_offer(&bid.job_id, &self.machine, self.claim_ttl)
                        .await
                    {
                        continue;
                    }
                    self.registry.resolve_offer(&bid.job_id).await;
                    if self.wins.send((bid.job_id, self.machine.clone())).await.is_err() {
                        break;
                    }
                }
                JobEvent::JobBidSubmitted(_) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulation_assigns_every_offer() {
        let config = RegistryConfig::default();
        run(&config, 4, 8, 10).await.unwrap();
    }

    #[tokio::test]
    async fn test_simulation_requires_agents() {
        assert!(run(&RegistryConfig::default(), 0, 1, 1).await.is_err());
    }
}
