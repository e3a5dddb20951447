// Ragsim
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Ragsim CLI Tool
//!
//! Command-line interface for building a resource-allocation graph in a state
//! file and running deadlock analyses over it.

mod config;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use config::RagsimConfig;
use ragsim_core::{
    AdmissionInput, BankersInput, GraphStore, HeuristicPredictor, ResolutionStrategy, analyze_cycles, assess, check_safety, detect_deadlock, extract_features, generate_samples, resolve,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ragsim")]
#[command(about = "Ragsim - Resource Allocation Graph deadlock simulator")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// State file to operate on
    #[arg(long, short = 's', global = true)]
    state: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty state file
    Init {
        /// Overwrite an existing state file
        #[arg(long)]
        force: bool,
    },
    /// Add a process, auto-naming it when no id is given
    AddProcess { id: Option<String> },
    /// Add a resource, auto-naming it when no id is given
    AddResource {
        id: Option<String>,
        /// Number of instances
        #[arg(long, short = 'i', default_value_t = 1)]
        instances: u32,
    },
    /// Allocate instances of a resource to a process
    Allocate {
        process: String,
        resource: String,
        #[arg(long, short = 'c', default_value_t = 1)]
        count: u32,
    },
    /// Record a pending request of a process for a resource
    Request {
        process: String,
        resource: String,
        #[arg(long, short = 'c', default_value_t = 1)]
        count: u32,
    },
    /// Release allocated instances back to a resource
    Release {
        process: String,
        resource: String,
        #[arg(long, short = 'c', default_value_t = 1)]
        count: u32,
    },
    /// Withdraw a pending request
    Withdraw {
        process: String,
        resource: String,
        #[arg(long, short = 'c', default_value_t = 1)]
        count: u32,
    },
    /// Remove a process and every edge that references it
    RemoveProcess { process: String },
    /// Print the graph
    Show,
    /// Detect deadlocked processes from pending requests
    Detect,
    /// Enumerate cycles and classify the deadlock
    Cycles,
    /// Print the feature vector
    Features {
        /// Print named fields instead of the ordered vector
        #[arg(long)]
        named: bool,
    },
    /// Estimate deadlock risk
    Predict,
    /// Break the current deadlock
    Resolve {
        /// preempt or terminate
        #[arg(long)]
        strategy: ResolutionStrategy,
        /// Print the outcome without saving it
        #[arg(long)]
        dry_run: bool,
    },
    /// Run the Banker's safety check on a JSON state file
    Safety { file: PathBuf },
    /// Decide whether a request can be granted safely
    Admit {
        /// JSON Banker's state
        file: PathBuf,
        /// Process index
        #[arg(long)]
        process: usize,
        /// Requested instances per resource type, e.g. 1,0,2
        #[arg(long, value_delimiter = ',', required = true)]
        request: Vec<u32>,
    },
    /// Replace the state with a canonical JSON encoding
    Import { file: PathBuf },
    /// Print the canonical JSON encoding of the state
    Export,
    /// Generate labelled random samples
    Generate {
        #[arg(long, default_value_t = 0)]
        seed: u64,
        #[arg(long, default_value_t = 10)]
        samples: usize,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match RagsimConfig::resolve_config(cli.config.clone(), cli.state.clone()) {
        Ok(config) => config,
        Err(e) => {
            init_tracing("warn");
            error!("Failed to load configuration: {:#}", e);
            process::exit(1);
        }
    };
    init_tracing(&config.log_level);
    debug!(state = %config.state_file.display(), "resolved configuration");

    if let Err(e) = run(cli.command, &config) {
        error!("Command failed: {:#}", e);
        process::exit(1);
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn run(command: Commands, config: &RagsimConfig) -> Result<()> {
    match command {
        Commands::Init { force } => handle_init(config, force),
        Commands::AddProcess { id } => mutate(config, |store| {
            let id = store.add_process(id.as_deref())?;
            println!("Added process {id}");
            Ok(())
        }),
        Commands::AddResource { id, instances } => mutate(config, |store| {
            let id = store.add_resource(id.as_deref(), instances)?;
            println!("Added resource {id} with {instances} instance(s)");
            Ok(())
        }),
        Commands::Allocate { process, resource, count } => mutate(config, |store| {
            store.add_allocation(&process, &resource, count)?;
            println!("Allocated {count} instance(s) of {resource} to {process}");
            Ok(())
        }),
        Commands::Request { process, resource, count } => mutate(config, |store| {
            store.add_request(&process, &resource, count)?;
            println!("{process} requests {count} instance(s) of {resource}");
            Ok(())
        }),
        Commands::Release { process, resource, count } => mutate(config, |store| {
            store.remove_allocation(&process, &resource, count)?;
            println!("{process} released {count} instance(s) of {resource}");
            Ok(())
        }),
        Commands::Withdraw { process, resource, count } => mutate(config, |store| {
            store.remove_request(&process, &resource, count)?;
            println!("{process} withdrew {count} requested instance(s) of {resource}");
            Ok(())
        }),
        Commands::RemoveProcess { process } => mutate(config, |store| {
            store.remove_process(&process)?;
            println!("Removed process {process}");
            Ok(())
        }),
        Commands::Show => handle_show(&load_store(&config.state_file)?),
        Commands::Detect => print_json(config, &detect_deadlock(&load_store(&config.state_file)?)),
        Commands::Cycles => print_json(config, &analyze_cycles(&load_store(&config.state_file)?)),
        Commands::Features { named } => handle_features(config, named),
        Commands::Predict => {
            let store = load_store(&config.state_file)?;
            print_json(config, &assess(&store, &HeuristicPredictor)?)
        }
        Commands::Resolve { strategy, dry_run } => handle_resolve(config, strategy, dry_run),
        Commands::Safety { file } => {
            let input: BankersInput = read_json(&file)?;
            print_json(config, &check_safety(&input.into_state()?))
        }
        Commands::Admit { file, process, request } => {
            let state: BankersInput = read_json(&file)?;
            let verdict = AdmissionInput { state, process, request }.evaluate()?;
            print_json(config, &verdict)
        }
        Commands::Import { file } => handle_import(config, &file),
        Commands::Export => {
            let store = load_store(&config.state_file)?;
            println!("{}", store.to_json(config.pretty_json)?);
            Ok(())
        }
        Commands::Generate { seed, samples } => print_json(config, &generate_samples(seed, samples, &config.generator)?),
    }
}

/// Load the state file; a missing file is an empty graph
fn load_store(path: &Path) -> Result<GraphStore> {
    if !path.exists() {
        debug!(path = %path.display(), "state file missing, starting empty");
        return Ok(GraphStore::new());
    }
    let content = std::fs::read_to_string(path).with_context(|| format!("reading state {}", path.display()))?;
    GraphStore::from_json(&content).with_context(|| format!("loading state {}", path.display()))
}

fn save_store(store: &GraphStore, config: &RagsimConfig) -> Result<()> {
    let path = &config.state_file;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(path, store.to_json(config.pretty_json)?).with_context(|| format!("writing state {}", path.display()))?;
    info!(path = %path.display(), "saved state");
    Ok(())
}

/// Load, apply `f`, and save only if `f` succeeds
fn mutate(config: &RagsimConfig, f: impl FnOnce(&mut GraphStore) -> Result<()>) -> Result<()> {
    let mut store = load_store(&config.state_file)?;
    f(&mut store)?;
    save_store(&store, config)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

fn print_json<T: Serialize>(config: &RagsimConfig, value: &T) -> Result<()> {
    let json = if config.pretty_json { serde_json::to_string_pretty(value)? } else { serde_json::to_string(value)? };
    println!("{json}");
    Ok(())
}

fn handle_init(config: &RagsimConfig, force: bool) -> Result<()> {
    if config.state_file.exists() && !force {
        bail!("state file {} already exists (use --force to overwrite)", config.state_file.display());
    }
    save_store(&GraphStore::new(), config)?;
    println!("Initialized empty state at {}", config.state_file.display());
    Ok(())
}

/// Replace the state without reading the current file, which may be unreadable
fn handle_import(config: &RagsimConfig, file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let store = GraphStore::from_json(&content).with_context(|| format!("importing {}", file.display()))?;
    save_store(&store, config)?;
    println!("Imported {} process(es) and {} resource(s)", store.process_count(), store.resource_count());
    Ok(())
}

fn handle_show(store: &GraphStore) -> Result<()> {
    if store.is_empty() {
        println!("Graph is empty");
        return Ok(());
    }

    let processes: Vec<&str> = store.processes().collect();
    println!("Processes: {}", processes.join(", "));
    println!("Resources:");
    for (id, info) in store.resources() {
        println!("  {id}: {}/{} available", info.available, info.total);
    }
    println!("Allocations:");
    for (process, resource, count) in store.allocations() {
        println!("  {resource} -> {process}: {count}");
    }
    println!("Requests:");
    for (process, resource, count) in store.requests() {
        println!("  {process} -> {resource}: {count}");
    }
    Ok(())
}

fn handle_features(config: &RagsimConfig, named: bool) -> Result<()> {
    let features = extract_features(&load_store(&config.state_file)?);
    if named { print_json(config, &features) } else { print_json(config, &features.to_array()) }
}

fn handle_resolve(config: &RagsimConfig, strategy: ResolutionStrategy, dry_run: bool) -> Result<()> {
    let store = load_store(&config.state_file)?;
    let resolution = resolve(&store, strategy)?;

    if resolution.victims.is_empty() {
        println!("No deadlock to resolve");
        return Ok(());
    }
    println!("Victims: {}", resolution.victims.join(", "));
    if resolution.deadlock_persists {
        println!("Deadlock persists after resolution");
    } else {
        println!("Deadlock resolved");
    }

    if !dry_run {
        save_store(&resolution.store, config)?;
    }
    Ok(())
}
