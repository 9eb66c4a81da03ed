//! Command-line front end: sites CSV in, itinerary CSV and geometry JSON out.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tour_planner::config::PlannerConfig;
use tour_planner::geometry::StraightLineRoutes;
use tour_planner::haversine::HaversineEstimator;
use tour_planner::itinerary::{self, Site};
use tour_planner::osrm::{OsrmClient, Profile};
use tour_planner::traits::{RouteGeometryService, TravelTimeService};
use tour_planner::{Coordinate, Plan, PlanRequest, Planner, StartPoint, TourShape};

#[derive(Debug, Parser)]
#[command(name = "tour-planner", about = "Plan a road-time visiting order across geocoded sites")]
struct Cli {
    /// Sites CSV (site_id,label,latitude,longitude[,headcount])
    #[arg(long)]
    sites: PathBuf,

    /// Output directory
    #[arg(long, default_value = "output")]
    output: PathBuf,

    /// Return to the starting point
    #[arg(long)]
    closed_loop: bool,

    /// Solver time limit in seconds
    #[arg(long)]
    tsp_limit: Option<u64>,

    /// Custom start latitude
    #[arg(long, requires = "start_lon")]
    start_lat: Option<f64>,

    /// Custom start longitude
    #[arg(long, requires = "start_lat")]
    start_lon: Option<f64>,

    /// Custom start label
    #[arg(long, default_value = "")]
    start_label: String,

    /// Travel profile (driving or foot)
    #[arg(long)]
    profile: Option<Profile>,

    /// OSRM base URL
    #[arg(long)]
    osrm_url: Option<String>,

    /// Estimate travel times from straight-line distance instead of OSRM
    #[arg(long)]
    offline: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tour_planner=debug")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = PlannerConfig::from_env().context("invalid environment configuration")?;
    if let Some(profile) = cli.profile {
        config.osrm.profile = profile;
    }
    if let Some(url) = cli.osrm_url.clone() {
        config.osrm.base_url = Some(url);
    }

    let file = File::open(&cli.sites)
        .with_context(|| format!("failed to open {}", cli.sites.display()))?;
    let sites = itinerary::read_sites(file).context("failed to read sites CSV")?;
    info!(sites = sites.len(), path = %cli.sites.display(), "loaded sites");

    let request = PlanRequest {
        shape: if cli.closed_loop {
            TourShape::Closed
        } else {
            TourShape::Open
        },
        start: match (cli.start_lat, cli.start_lon) {
            (Some(lat), Some(lon)) => Some(StartPoint {
                label: cli.start_label.clone(),
                coordinate: Coordinate::new(lat, lon),
            }),
            _ => None,
        },
        time_limit: cli.tsp_limit.map(Duration::from_secs),
    };

    let plan = if cli.offline {
        info!("offline mode: haversine travel times and straight-line geometry");
        config.matrix.pause = Duration::ZERO;
        config.geometry.pause = Duration::ZERO;
        run(&HaversineEstimator::default(), &StraightLineRoutes, config, &sites, &request)?
    } else {
        let osrm = OsrmClient::new(config.osrm.clone()).context("failed to build OSRM client")?;
        run(&osrm, &osrm, config, &sites, &request)?
    };

    write_outputs(&cli.output, &plan)?;
    print_stats(&plan);
    Ok(())
}

fn run<T: TravelTimeService, G: RouteGeometryService>(
    table: &T,
    routes: &G,
    config: PlannerConfig,
    sites: &[Site],
    request: &PlanRequest,
) -> Result<Plan> {
    let planner = Planner::new(table, routes, config);
    let plan = planner.plan(sites, request)?;
    for warning in &plan.warnings {
        warn!(?warning, "planning warning");
    }
    Ok(plan)
}

fn write_outputs(dir: &Path, plan: &Plan) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let route_path = dir.join("route_solution_sites.csv");
    itinerary::export_csv(&plan.itinerary, &route_path)
        .with_context(|| format!("failed to write {}", route_path.display()))?;
    info!(path = %route_path.display(), "itinerary written");

    if let Some(geometry) = &plan.geometry {
        let geometry_path = dir.join("route_geometry.json");
        let file = File::create(&geometry_path)
            .with_context(|| format!("failed to create {}", geometry_path.display()))?;
        serde_json::to_writer(file, geometry).context("failed to write route geometry")?;
        info!(path = %geometry_path.display(), segments = geometry.len(), "geometry written");
    }
    Ok(())
}

fn print_stats(plan: &Plan) {
    let stops = &plan.itinerary;
    let summary = &plan.summary;
    if stops.is_empty() {
        info!("no site in the itinerary");
        return;
    }
    info!(
        visited = summary.visited_sites,
        total_minutes = summary.total_minutes,
        total_hours = summary.total_hours,
        avg_segment_minutes = summary.avg_segment_minutes,
        closed_loop = summary.closed_loop,
        "route statistics"
    );

    let show = stops.len().min(5);
    for stop in &stops[..show] {
        info!(order = stop.order, label = %stop.site.label, segment_min = stop.segment_minutes(), "stop");
    }
    if stops.len() > 2 * show {
        info!(hidden = stops.len() - 2 * show, "intermediate stops");
    }
    if stops.len() > show {
        let tail = show.min(stops.len() - show);
        for stop in &stops[stops.len() - tail..] {
            info!(order = stop.order, label = %stop.site.label, segment_min = stop.segment_minutes(), "stop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_start_point() {
        let cli = Cli::parse_from([
            "tour-planner",
            "--sites",
            "sites.csv",
            "--start-lat",
            "48.8698",
            "--start-lon",
            "2.3078",
            "--closed-loop",
        ]);
        assert_eq!(cli.start_lat, Some(48.8698));
        assert!(cli.closed_loop);
        assert_eq!(cli.output, PathBuf::from("output"));
    }

    #[test]
    fn test_cli_profile_parses() {
        let cli = Cli::parse_from(["tour-planner", "--sites", "s.csv", "--profile", "foot", "--offline"]);
        assert_eq!(cli.profile, Some(Profile::Foot));
        assert!(cli.offline);
    }

    #[test]
    fn test_offline_run_uses_straight_lines() {
        let mut config = PlannerConfig::default();
        config.matrix.pause = Duration::ZERO;
        config.geometry.pause = Duration::ZERO;
        let sites = vec![
            Site::new("a", "A", 48.85, 2.35),
            Site::new("b", "B", 48.86, 2.36),
            Site::new("c", "C", 48.87, 2.30),
        ];
        let request = PlanRequest {
            time_limit: Some(Duration::from_secs(1)),
            ..PlanRequest::default()
        };
        let plan = run(&HaversineEstimator::default(), &StraightLineRoutes, config, &sites, &request).unwrap();
        let geometry = plan.geometry.unwrap();
        assert_eq!(geometry.len(), 1);
        assert_eq!(geometry[0].len(), 3);
    }

    #[test]
    fn test_start_lat_requires_lon() {
        assert!(Cli::try_parse_from(["tour-planner", "--sites", "s.csv", "--start-lat", "1.0"]).is_err());
    }
}
