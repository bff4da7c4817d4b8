//! meshless-run
//!
//! Builds a periodic lattice of gas elements with one sink at its center,
//! solves interaction radii for a number of steps and prints a summary.
//!
//! Usage:
//!   meshless-run [--config <file.json>] [--lattice <n>] [--dims <1|2|3>]
//!                [--partitions <p>] [--steps <s>] [--jitter <fraction>]
//!
//! Environment:
//!   MESHLESS_TARGET_NEIGHBORS, MESHLESS_MAX_ITERATIONS,
//!   MESHLESS_MIN_RADIUS, MESHLESS_MAX_RADIUS  Overlay the loaded config
//!   RUST_LOG                                  Log filter (default: meshless=info)

use meshless_density::{
    DVec3, Dimensions, Element, ElementKind, RadiusSolver, SolveReport, SolverConfig, StepContext,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Parsed command line.
#[derive(Debug, Clone, PartialEq)]
struct Options {
    config: Option<PathBuf>,
    lattice: usize,
    dims: Option<Dimensions>,
    partitions: Option<usize>,
    steps: usize,
    jitter: f64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            config: None,
            lattice: 12,
            dims: None,
            partitions: None,
            steps: 2,
            jitter: 0.0,
        }
    }
}

fn print_usage() {
    eprintln!("meshless-run - Solve adaptive radii on a periodic lattice");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  meshless-run [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <file>      JSON solver config (fields not given keep defaults)");
    eprintln!("  --lattice <n>        Elements per axis (default: 12)");
    eprintln!("  --dims <1|2|3>       Override the config's dimensionality");
    eprintln!("  --partitions <p>     Override the config's partition count");
    eprintln!("  --steps <s>          Steps to run (default: 2)");
    eprintln!("  --jitter <fraction>  Random offset per axis, in lattice spacings (default: 0)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  MESHLESS_TARGET_NEIGHBORS, MESHLESS_MAX_ITERATIONS,");
    eprintln!("  MESHLESS_MIN_RADIUS, MESHLESS_MAX_RADIUS  Overlay the loaded config");
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut options = Options::default();
    let mut iter = args.iter();
    while let Some(flag) = iter.next() {
        let mut value = |name: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("{} requires a value", name))
        };
        match flag.as_str() {
            "--config" => options.config = Some(PathBuf::from(value("--config")?)),
            "--lattice" => options.lattice = parse_number(&value("--lattice")?, "--lattice")?,
            "--dims" => {
                let d: u8 = parse_number(&value("--dims")?, "--dims")?;
                options.dims = Some(Dimensions::try_from(d)?);
            }
            "--partitions" => options.partitions = Some(parse_number(&value("--partitions")?, "--partitions")?),
            "--steps" => options.steps = parse_number(&value("--steps")?, "--steps")?,
            "--jitter" => options.jitter = parse_number(&value("--jitter")?, "--jitter")?,
            other => return Err(format!("unknown argument {}", other)),
        }
    }
    if options.lattice == 0 {
        return Err("--lattice must be at least 1".to_string());
    }
    if !(0.0..0.5).contains(&options.jitter) {
        return Err("--jitter must be in [0, 0.5)".to_string());
    }
    Ok(options)
}

fn parse_number<T: std::str::FromStr>(raw: &str, name: &str) -> Result<T, String> {
    raw.parse()
        .map_err(|_| format!("{} expects a number, got {:?}", name, raw))
}

fn load_config(options: &Options) -> Result<SolverConfig, Box<dyn std::error::Error>> {
    let mut config = match &options.config {
        Some(path) => SolverConfig::load(path)?.with_env()?,
        None => SolverConfig::from_env()?,
    };
    if let Some(dims) = options.dims {
        config.dimensions = dims;
    }
    if let Some(partitions) = options.partitions {
        config.partitions = partitions;
    }
    let side = options.lattice as f64;
    config.periodic_box = Some(match config.dimensions {
        Dimensions::One => [side, 1.0, 1.0],
        Dimensions::Two => [side, side, 1.0],
        Dimensions::Three => [side, side, side],
    });
    config.validate()?;
    Ok(config)
}

/// Unit-spaced, unit-mass gas lattice plus a sink at the box center.
fn build_lattice(dims: Dimensions, n: usize, jitter: f64, rng: &mut impl Rng) -> Vec<Element> {
    let axis = |active: bool| if active { n } else { 1 };
    let (nx, ny, nz) = (axis(true), axis(dims.count() >= 2), axis(dims.count() >= 3));
    let mut elements = Vec::with_capacity(nx * ny * nz + 1);

    for x in 0..nx {
        for y in 0..ny {
            for z in 0..nz {
                let mut offset = DVec3::ZERO;
                if jitter > 0.0 {
                    offset = DVec3::new(
                        rng.gen_range(-jitter..jitter),
                        rng.gen_range(-jitter..jitter),
                        rng.gen_range(-jitter..jitter),
                    );
                }
                let position = dims.project(DVec3::new(x as f64, y as f64, z as f64) + offset);
                let id = elements.len() as u64;
                elements.push(Element::gas(id, position, 1.0, 1.0).with_internal_energy(1.0));
            }
        }
    }

    let center = dims.project(DVec3::splat(n as f64 * 0.5 - 0.25));
    let id = elements.len() as u64;
    elements.push(Element::new(id, ElementKind::Sink, center, 10.0, 1.0));
    elements
}

fn print_step(step: usize, report: &SolveReport, elements: &[Element]) {
    let gas: Vec<&Element> = elements.iter().filter(|e| e.kind == ElementKind::Gas).collect();
    let count = gas.len().max(1) as f64;
    let mean_radius = gas.iter().map(|e| e.radius).sum::<f64>() / count;
    let mean_density = gas.iter().map(|e| e.hydro.density).sum::<f64>() / count;
    let (min_density, max_density) = gas.iter().fold((f64::MAX, f64::MIN), |(lo, hi), e| {
        (lo.min(e.hydro.density), hi.max(e.hydro.density))
    });

    println!("Step {}:", step);
    println!("  Passes:      {}", report.iterations);
    println!("  Evaluated:   {}", report.evaluated);
    println!("  Converged:   {}", report.converged);
    println!("  Clamped:     {} at max, {} at min", report.clamped_max, report.clamped_min);
    println!(
        "  Exchange:    {} requests, {} bytes out, {} bytes in",
        report.exchange.requests, report.exchange.bytes_sent, report.exchange.bytes_received
    );
    println!("  Mean radius: {:.6}", mean_radius);
    println!(
        "  Density:     mean {:.6}, min {:.6}, max {:.6}",
        mean_density, min_density, max_density
    );
    if let Some(sink) = elements.iter().find(|e| e.kind == ElementKind::Sink) {
        println!(
            "  Sink:        radius {:.6}, gas density {:.6}, nearest gas {:.6}",
            sink.radius, sink.hydro.surroundings.gas_density, sink.hydro.surroundings.nearest_gas_distance
        );
    }
}

fn run(options: &Options) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(options)?;
    tracing::debug!("Solver config: {}", serde_json::to_string(&config)?);

    let dims = config.dimensions;
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut elements = build_lattice(dims, options.lattice, options.jitter, &mut rng);
    let solver = RadiusSolver::new(config)?;

    println!("Meshless Density");
    println!("================");
    println!();
    println!(
        "Lattice {}^{} with one sink, {} partition(s)",
        options.lattice,
        dims.count(),
        solver.config().partitions
    );
    println!();

    for step in 0..options.steps {
        let ctx = StepContext {
            first_step: step == 0,
            full_step: true,
        };
        let report = solver.solve(&mut elements, &ctx)?;
        print_step(step, &report, &elements);
    }
    Ok(())
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "meshless=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return;
    }

    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&options) {
        tracing::error!("Run failed: {}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
