use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tracker::{
    Coordinate, DistanceTracker, FixedDistanceSource, HttpPathFinder, Path, PathFinder,
    RouteUpdatedSet, Store, StraightLineFinder, TrackerConfig, TrackerError, Waypoint,
    WaypointSet,
};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Track walking progress along a multi-leg path"
)]
struct Args {
    /// Directory holding the JSON store (overrides WALK_TRACKER_DATA)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Base URL of the routing service (overrides ROUTING_URL)
    #[arg(long, global = true)]
    routing_url: Option<String>,

    /// Join waypoints with straight lines instead of asking the routing service
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start an empty path
    New {
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        name: Option<String>,
    },
    /// Append a waypoint after the last one
    Add {
        #[arg(allow_negative_numbers = true)]
        lat: f64,
        #[arg(allow_negative_numbers = true)]
        lon: f64,
        #[arg(long, default_value = "")]
        label: String,
        /// Keep a straight line to the previous waypoint
        #[arg(long)]
        straight: bool,
    },
    /// Remove the waypoint at an index
    Remove { index: usize },
    /// Move a waypoint to another index
    Move { from: usize, to: usize },
    /// Insert a waypoint before the one at an index
    Insert {
        index: usize,
        #[arg(allow_negative_numbers = true)]
        lat: f64,
        #[arg(allow_negative_numbers = true)]
        lon: f64,
        #[arg(long, default_value = "")]
        label: String,
    },
    /// Update progress from daily distances or a given total
    Progress {
        /// JSON object mapping YYYY-MM-DD to metres walked that day
        #[arg(long, conflicts_with_all = ["walked", "today"])]
        distances: Option<PathBuf>,
        /// Total walked distance in metres
        #[arg(long, required_unless_present = "distances")]
        walked: Option<f64>,
        /// Part of the walked distance covered today
        #[arg(long, default_value_t = 0.0)]
        today: f64,
    },
    /// Resume a stopped path
    Restart,
    /// Make a finished path current, archiving the current one
    Switch { index: usize },
    /// List finished paths
    Finished,
    /// Stop the current path and move it to the finished list
    Finish {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Print waypoints and legs
    Show,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "walk_tracker=info,tracker=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let mut config = TrackerConfig::from_env()?;
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(routing_url) = args.routing_url {
        config.routing_url = routing_url;
    }

    let store = Store::open(&config.data_dir)?;
    tracing::info!("using store in {:?}", store.dir());

    if args.offline {
        run(StraightLineFinder, store, args.command).await
    } else {
        tracing::info!("routing through {}", config.routing_url);
        let finder = HttpPathFinder::from_config(&config);
        run(finder, store, args.command).await
    }
}

async fn run<P: PathFinder>(
    finder: P,
    mut store: Store,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    let today = Local::now().date_naive();
    let path = store.load_path()?.unwrap_or_else(|| Path::new(today));
    let mut set = WaypointSet::with_path(finder, path);

    let report = match command {
        Command::New { date, name } => {
            set.new_path(date);
            let mut path = set.into_path();
            if let Some(name) = name {
                path.name = name;
            }
            store.save_path(&path)?;
            store.save_walking_distance(None)?;
            println!("started {}", path.display_label());
            return Ok(());
        }
        Command::Add {
            lat,
            lon,
            label,
            straight,
        } => {
            let waypoint = Waypoint::new(Coordinate::new(lat, lon), label);
            set.append(waypoint, straight).await?
        }
        Command::Remove { index } => {
            let waypoint = waypoint_at(&set, index)?;
            set.remove(&waypoint).await?
        }
        Command::Move { from, to } => set.move_waypoint(from, to).await?,
        Command::Insert {
            index,
            lat,
            lon,
            label,
        } => {
            let waypoint = Waypoint::new(Coordinate::new(lat, lon), label);
            set.insert(index, waypoint).await?
        }
        Command::Progress {
            distances: Some(file),
            ..
        } => {
            let source = FixedDistanceSource::from_json_file(&file)?;
            let mut tracker = DistanceTracker::with_stored(source, store.load_walking_distance()?);
            set.refresh_walked_distance(&mut tracker, today).await?;
            let todays = set.todays_path();
            print_progress(&set, todays.as_deref());
            store.save_path(set.path())?;
            store.save_walking_distance(tracker.stored().as_ref())?;
            return Ok(());
        }
        Command::Progress {
            walked,
            today: walked_today,
            ..
        } => {
            let walked = walked.unwrap_or_default();
            set.apply_walked_distance(walked, walked - walked_today);
            let todays = set.todays_path();
            print_progress(&set, todays.as_deref());
            store.save_path(set.path())?;
            return Ok(());
        }
        Command::Restart => {
            let mut path = set.into_path();
            store.restart_path(&mut path)?;
            println!("resumed {}", path.display_label());
            return Ok(());
        }
        Command::Switch { index } => {
            match store.switch_path(set.into_path(), index)? {
                Some(path) => println!("switched to {}", path.display_label()),
                None => println!("no finished path at {index}"),
            }
            return Ok(());
        }
        Command::Finished => {
            for (index, path) in store.load_finished_paths()?.iter().enumerate() {
                println!(
                    "  [{index}] {} finished {} ({:.0} m)",
                    path.display_label(),
                    path.finished_date.format("%Y/%m/%d"),
                    path.total_distance()
                );
            }
            return Ok(());
        }
        Command::Finish { date } => {
            let mut path = set.into_path();
            path.finished_date = date.unwrap_or(today);
            let label = path.display_label();
            store.archive_path(path)?;
            store.save_path(&Path::new(today))?;
            store.save_walking_distance(None)?;
            println!("archived {label}");
            return Ok(());
        }
        Command::Show => {
            print_path(&set);
            return Ok(());
        }
    };

    print_report(&report);
    store.save_path(set.path())?;
    tracing::info!(
        waypoints = set.waypoints().len(),
        legs = set.path().legs().len(),
        "path saved"
    );
    Ok(())
}

fn waypoint_at<P: PathFinder>(set: &WaypointSet<P>, index: usize) -> Result<Waypoint, TrackerError> {
    set.waypoints()
        .get(index)
        .cloned()
        .ok_or(TrackerError::NotFound)
}

fn print_report(report: &RouteUpdatedSet) {
    if report.is_empty() {
        println!("no legs changed");
        return;
    }
    for update in &report.before {
        println!(
            "- {} -> {} ({:.0} m)",
            update.leg.start_label(),
            update.leg.finish_label(),
            update.leg.total_distance()
        );
    }
    for update in &report.after {
        println!(
            "+ {} -> {} ({:.0} m)",
            update.leg.start_label(),
            update.leg.finish_label(),
            update.leg.total_distance()
        );
    }
}

fn print_path<P: PathFinder>(set: &WaypointSet<P>) {
    let path = set.path();
    println!("{}", path.display_label());
    println!(
        "walked {:.0} m of {:.0} m, {:.0} m remaining",
        path.walked_distance(),
        path.total_distance(),
        path.remaining_distance()
    );
    for waypoint in set.waypoints() {
        println!(
            "  [{}] {:<16} {:>10.5} {:>11.5} {:?}",
            waypoint.sequence_index.map_or("-".into(), |i| i.to_string()),
            waypoint.label,
            waypoint.position.lat,
            waypoint.position.lon,
            waypoint.color
        );
    }
    for (index, leg) in path.legs().iter().enumerate() {
        println!(
            "  leg {index}: {} -> {} {:.0} m ({:.0} m walked)",
            leg.start_label(),
            leg.finish_label(),
            leg.total_distance(),
            leg.traversed_distance()
        );
    }
}

fn print_progress<P: PathFinder>(set: &WaypointSet<P>, todays: Option<&[Coordinate]>) {
    let path = set.path();
    println!("{}", path.display_label());
    println!("remaining {:.0} m", path.remaining_distance());
    match path.completed_waypoint_index() {
        Some(index) => println!("last reached waypoint {index}"),
        None => println!("no waypoint reached yet"),
    }
    if let Some(position) = path.current_position() {
        println!("current position {:.5}, {:.5}", position.lat, position.lon);
    }
    if let Some(points) = todays {
        println!("today's path has {} points", points.len());
    }
}
