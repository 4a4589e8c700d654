use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use camp_cascade::config::{Config, ConfigOverrides};
use camp_cascade::display::{print_conflicts, print_grid, print_outcome};
use camp_cascade::export::write_plan_csv;
use camp_cascade::parser::{load_assignments, load_divisions, load_locations, load_reservations};
use camp_cascade::schedule::{
    apply_plan, build_plan, detect_conflicts, parse_slot_list, Claim, DivisionMap, LocationRegistry,
    ReservationTable, RotationHistory, ScheduleContext,
};
use camp_cascade::store::{AssignmentStore, JsonFileStore};
use camp_cascade::synth::{generate_camp, CampParams};
use camp_cascade::web::{start_server, AppState};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "camp-cascade",
    version,
    about = "Conflict detection and cascade reassignment for camp schedules"
)]
struct Cli {
    #[arg(short, long, global = true, env = "CAMP_CASCADE_CONFIG")]
    config: Option<PathBuf>,
    /// Directory holding one JSON grid per day
    #[arg(long, global = true)]
    data: Option<String>,
    #[arg(long, global = true)]
    iteration_cap: Option<usize>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, clap::Args, Clone)]
struct ClaimArgs {
    #[arg(long)]
    date: NaiveDate,
    #[arg(long)]
    location: String,
    /// Defaults to the location name
    #[arg(long)]
    activity: Option<String>,
    /// e.g. "3,4" or "3-5"
    #[arg(long)]
    slots: String,
    #[arg(long = "bunk")]
    bunks: Vec<String>,
    /// Claim for every bunk of a division instead of --bunk
    #[arg(long, conflicts_with = "bunks")]
    division: Option<String>,
    /// Comma-separated divisions the caller schedules
    #[arg(long)]
    editable: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Show {
        #[arg(long)]
        date: NaiveDate,
    },
    Detect {
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        location: String,
        #[arg(long)]
        slots: String,
        #[arg(long = "bunk")]
        bunks: Vec<String>,
        #[arg(long)]
        editable: Option<String>,
    },
    Plan {
        #[command(flatten)]
        claim: ClaimArgs,
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    Apply {
        #[command(flatten)]
        claim: ClaimArgs,
        /// Apply even if some conflicts stay blocked
        #[arg(long)]
        force: bool,
    },
    Import {
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        assignments: PathBuf,
    },
    Demo {
        #[arg(long, default_value_t = 1)]
        seed: u64,
    },
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
    Config {
        #[arg(long)]
        init: bool,
    },
}

/// Static camp setup read from the configured CSV files
struct Camp {
    registry: LocationRegistry,
    divisions: DivisionMap,
    reservations: ReservationTable,
}

fn load_camp(config: &Config) -> Result<Camp> {
    let registry = load_locations(&config.storage.locations)
        .with_context(|| format!("failed loading locations: {}", config.storage.locations))?;

    let divisions = if Path::new(&config.storage.bunks).exists() {
        load_divisions(&config.storage.bunks)
            .with_context(|| format!("failed loading bunks: {}", config.storage.bunks))?
    } else {
        warn!(path = %config.storage.bunks, "no bunk file, divisions unknown");
        DivisionMap::new()
    };

    let reservations = match &config.storage.reservations {
        Some(path) => load_reservations(path).with_context(|| format!("failed loading reservations: {}", path))?,
        None => ReservationTable::new(),
    };

    info!(
        locations = registry.len(),
        divisions = divisions.division_names().count(),
        reservations = reservations.len(),
        "camp loaded"
    );
    Ok(Camp {
        registry,
        divisions,
        reservations,
    })
}

fn open_store(config: &Config) -> Result<JsonFileStore> {
    JsonFileStore::open(Path::new(&config.storage.data_dir), config.day.slot_count)
        .with_context(|| format!("failed opening store: {}", config.storage.data_dir))
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|r| {
        r.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

fn claim_from_args(args: &ClaimArgs, divisions: &DivisionMap) -> Result<Claim> {
    let slots = parse_slot_list(&args.slots)?;
    let activity = args.activity.clone().unwrap_or_else(|| args.location.clone());
    let claim = match &args.division {
        Some(division) => Claim::for_division(divisions, division, &args.location, activity, slots)?,
        None => {
            if args.bunks.is_empty() {
                bail!("pass --bunk or --division");
            }
            Claim::new(&args.location, activity, slots, args.bunks.clone())
        }
    };
    Ok(claim)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("camp_cascade=info")),
        )
        .init();
    let cli = Cli::parse();

    if let Commands::Config { init } = &cli.command {
        let path = cli.config.clone().unwrap_or_else(Config::default_path);
        if *init {
            Config::write_template(&path)?;
            println!("Wrote config template to {}", path.display());
        } else {
            print!("{}", Config::default_template());
        }
        return Ok(());
    }

    let mut config = Config::load(cli.config.as_deref())?;
    let port = match &cli.command {
        Commands::Serve { port } => *port,
        _ => None,
    };
    config.apply_overrides(ConfigOverrides {
        data_dir: cli.data.clone(),
        iteration_cap: cli.iteration_cap,
        port,
    });

    match cli.command {
        Commands::Show { date } => {
            let store = open_store(&config)?;
            let snapshot = store.load(date)?;
            println!("{} (version {})", date, snapshot.version);
            print_grid(&snapshot.grid, &config.day.start_time, config.day.minutes_per_slot);
        }
        Commands::Detect {
            date,
            location,
            slots,
            bunks,
            editable,
        } => {
            let camp = load_camp(&config)?;
            let store = open_store(&config)?;
            let snapshot = store.load(date)?;
            let editable = camp.divisions.editable_bunks(split_list(editable.as_deref()).as_slice());
            let ctx = ScheduleContext::new(&snapshot.grid, &camp.registry)
                .with_divisions(&camp.divisions)
                .with_editable(&editable)
                .with_locks(&camp.reservations);
            let report = detect_conflicts(&ctx, &location, &parse_slot_list(&slots)?, &bunks)?;
            print_conflicts(&location, &report);
        }
        Commands::Plan { claim, csv } => {
            let camp = load_camp(&config)?;
            let store = open_store(&config)?;
            let snapshot = store.load(claim.date)?;
            let history = store.history(claim.date, config.rotation.lookback_days)?;
            let request = claim_from_args(&claim, &camp.divisions)?;
            let editable = camp.divisions.editable_bunks(split_list(claim.editable.as_deref()).as_slice());
            let ctx = ScheduleContext::new(&snapshot.grid, &camp.registry)
                .with_divisions(&camp.divisions)
                .with_editable(&editable)
                .with_locks(&camp.reservations)
                .with_history(&history)
                .with_weights(&config.rotation);
            let outcome = build_plan(&ctx, &request, &config.planner)?;
            print_outcome(&outcome);
            if let Some(path) = csv {
                write_plan_csv(&outcome, &path)?;
                println!("\nPlan saved to {}", path.display());
            }
        }
        Commands::Apply { claim, force } => {
            let camp = load_camp(&config)?;
            let store = open_store(&config)?;
            let mut snapshot = store.load(claim.date)?;
            let history = store.history(claim.date, config.rotation.lookback_days)?;
            let request = claim_from_args(&claim, &camp.divisions)?;
            let editable = camp.divisions.editable_bunks(split_list(claim.editable.as_deref()).as_slice());
            let outcome = {
                let ctx = ScheduleContext::new(&snapshot.grid, &camp.registry)
                    .with_divisions(&camp.divisions)
                    .with_editable(&editable)
                    .with_locks(&camp.reservations)
                    .with_history(&history)
                    .with_weights(&config.rotation);
                build_plan(&ctx, &request, &config.planner)?
            };
            print_outcome(&outcome);

            if !outcome.reserved_slots.is_empty() {
                bail!("{} is reserved; nothing applied", request.location);
            }
            if !outcome.is_clean() && !force {
                bail!("{} conflict(s) blocked; rerun with --force to apply anyway", outcome.blocked.len());
            }
            apply_plan(&mut snapshot.grid, &request, &outcome)?;
            let version = store.save(claim.date, &snapshot.grid, snapshot.version)?;
            println!("\nApplied; {} is now at version {}", claim.date, version);
        }
        Commands::Import { date, assignments } => {
            let grid = load_assignments(&assignments, config.day.slot_count)
                .with_context(|| format!("failed loading assignments: {}", assignments.display()))?;
            let store = open_store(&config)?;
            let current = store.load(date)?;
            let version = store.save(date, &grid, current.version)?;
            println!("Imported {} bunks for {} (version {})", grid.bunks.len(), date, version);
        }
        Commands::Demo { seed } => run_demo(seed, &config)?,
        Commands::Serve { .. } => {
            let camp = load_camp(&config)?;
            let store = open_store(&config)?;
            println!(
                "Starting web server on {}:{}...",
                config.server.host, config.server.port
            );
            start_server(AppState {
                store: Arc::new(store),
                registry: camp.registry,
                divisions: camp.divisions,
                reservations: camp.reservations,
                config,
            })
            .await?;
        }
        // handled before the config is loaded
        Commands::Config { .. } => {}
    }

    Ok(())
}

/// Generates a crowded camp and claims the busiest location for a bunk of the last division
fn run_demo(seed: u64, config: &Config) -> Result<()> {
    let camp = generate_camp(seed, &CampParams::crowded())?;
    let names = camp.division_names();
    let (Some(caller), Some(claimant_division)) = (names.first(), names.last()) else {
        bail!("synthetic camp has no divisions");
    };
    // Slot 1 must not sit under a pinned block of the claimant.
    let free_at_one = |bunk: &str| {
        camp.grid
            .block_slots(bunk, 1)
            .iter()
            .all(|&slot| camp.grid.entry(bunk, slot).map_or(true, |e| !e.pinned))
    };
    let Some(claimant) = camp
        .divisions
        .bunks_in(claimant_division)
        .and_then(|bunks| bunks.iter().find(|b| free_at_one(b.as_str())).cloned())
    else {
        bail!("division {} has no bunk free at slot 1", claimant_division);
    };
    let Some(location) = camp.registry.iter().next().map(|l| l.name.clone()) else {
        bail!("synthetic camp has no locations");
    };

    let claim = Claim::new(&location, &location, vec![1], vec![claimant]);
    let editable = camp.divisions.editable_bunks(std::slice::from_ref(caller));
    let history = RotationHistory::new();
    let ctx = ScheduleContext::new(&camp.grid, &camp.registry)
        .with_divisions(&camp.divisions)
        .with_editable(&editable)
        .with_history(&history)
        .with_weights(&config.rotation);

    println!("Demo camp (seed {}): {} claims {} at slot 1", seed, claim.bunks[0], location);
    print_grid(&camp.grid, &config.day.start_time, config.day.minutes_per_slot);
    let outcome = build_plan(&ctx, &claim, &config.planner)?;
    print_outcome(&outcome);
    Ok(())
}
