//! Synthetic connection churn.

use std::time::Duration;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use strand_session::{ManagedSession, Manager, ManagerConfig};
use tracing::{debug, info};

/// Simulation parameters.
#[derive(Debug, Clone)]
pub struct SimParams {
    pub clients: usize,
    pub rounds: usize,
    pub tick: Duration,
    pub resume_rate: f64,
    pub seed: Option<u64>,
}

/// Application state a client carries across reconnects.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct ClientState {
    visits: u64,
}

#[derive(Debug)]
struct Client {
    slot: usize,
    generation: u32,
    connected: bool,
    state: ClientState,
}

impl Client {
    fn session_id(&self) -> String {
        format!("client-{}-{}", self.slot, self.generation)
    }

    fn ip(&self) -> String {
        format!("10.0.{}.{}", self.slot / 256, self.slot % 256)
    }
}

/// Outcome of a simulation run.
#[derive(Debug, Serialize)]
pub struct SimReport {
    pub policy: String,
    pub capacity: usize,
    pub clients: usize,
    pub rounds: usize,
    /// Reconnects that recovered their detached state.
    pub resumed: u64,
    /// Reconnects whose detached state was already evicted or expired.
    pub lost: u64,
    /// Clients that gave up on their old session and started a new one.
    pub abandoned: u64,
    pub live: usize,
    pub detached: usize,
    pub evicted: u64,
    pub expired: u64,
}

impl SimReport {
    /// Print a human-readable summary.
    pub fn print(&self) {
        println!();
        println!("Strand Simulation");
        println!("{}", "─".repeat(40));
        println!("  Policy:     {}", self.policy);
        println!("  Capacity:   {}", self.capacity);
        println!("  Clients:    {}", self.clients);
        println!("  Rounds:     {}", self.rounds);
        println!();
        println!("  Resumed:    {}", self.resumed);
        println!("  Lost:       {}", self.lost);
        println!("  Abandoned:  {}", self.abandoned);
        println!();
        println!("  Live:       {}", self.live);
        println!("  Detached:   {}", self.detached);
        println!("  Evicted:    {}", self.evicted);
        println!("  Expired:    {}", self.expired);
        println!();
    }
}

/// Run the simulation to completion.
pub async fn run(config: ManagerConfig, params: SimParams) -> Result<SimReport> {
    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let policy = config.eviction_policy.to_string();
    let capacity = config.max_detached_sessions;
    let manager = Manager::new(config)?;

    info!(
        clients = params.clients,
        rounds = params.rounds,
        policy = %policy,
        capacity,
        "Starting simulation"
    );

    let mut clients: Vec<Client> = (0..params.clients)
        .map(|slot| Client {
            slot,
            generation: 0,
            connected: false,
            state: ClientState::default(),
        })
        .collect();

    for client in &mut clients {
        manager.register(ManagedSession::new(client.session_id(), client.ip()))?;
        client.connected = true;
    }

    let (mut resumed, mut lost, mut abandoned) = (0u64, 0u64, 0u64);

    for round in 0..params.rounds {
        for client in &mut clients {
            if client.connected {
                client.state.visits += 1;
                if rng.random_bool(0.5) {
                    let payload = serde_json::to_vec(&client.state)?;
                    manager.on_disconnect(&client.session_id(), payload);
                    client.connected = false;
                }
                continue;
            }

            if !rng.random_bool(params.resume_rate) {
                abandoned += 1;
                client.generation += 1;
                client.state = ClientState::default();
            } else if manager.get(&client.session_id()).is_some() {
                manager.touch(&client.session_id());
            }

            let session =
                manager.register(ManagedSession::new(client.session_id(), client.ip()))?;
            match session.detached_payload {
                Some(payload) => {
                    client.state = serde_json::from_slice(&payload)
                        .context("Detached payload is not valid client state")?;
                    resumed += 1;
                }
                None if client.state.visits > 0 => {
                    client.state = ClientState::default();
                    lost += 1;
                }
                None => {}
            }
            client.connected = true;
        }

        debug!(round, stats = ?manager.stats(), "Round complete");
        tokio::time::sleep(params.tick).await;
    }

    let stats = manager.stats();
    manager.shutdown(Duration::from_secs(1)).await?;

    info!(resumed, lost, abandoned, "Simulation complete");

    Ok(SimReport {
        policy,
        capacity,
        clients: params.clients,
        rounds: params.rounds,
        resumed,
        lost,
        abandoned,
        live: stats.live,
        detached: stats.detached,
        evicted: stats.evicted,
        expired: stats.expired,
    })
}
