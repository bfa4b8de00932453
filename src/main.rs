//! iCube Camera Control CLI
//!
//! Runs the camera through init, start and stop while periodically
//! reporting frame counters. This build links no vendor SDK binding, so
//! frames come from the in-process SDK's synthetic stream.

use chrono::Utc;
use clap::Parser;
use icube_control::{
    control::{CameraController, FileConfig},
    sdk::{mock::SyntheticStream, MockSdk},
    CameraApi,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(
    name = "icube-control",
    version,
    about = "Drive a NET iCube camera and report frame counters"
)]
struct Args {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Exposure applied after init, in milliseconds.
    #[arg(long)]
    exposure: Option<i32>,

    /// Save a frame at every report. `{timestamp}` expands to the UTC time.
    #[arg(long)]
    save: Option<String>,

    /// Seconds between counter reports.
    #[arg(long, default_value_t = 10)]
    report_interval_secs: u64,

    /// Stop after this many seconds instead of waiting for Ctrl-C.
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Delay between synthetic frames.
    #[arg(long, default_value_t = 100)]
    frame_interval_ms: u64,

    /// Size of each synthetic frame in bytes.
    #[arg(long, default_value_t = 1024 * 768 * 3)]
    frame_size: usize,

    /// Deliver every n-th synthetic frame as a bad frame (0 disables).
    #[arg(long, default_value_t = 0)]
    bad_every: u64,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    info!("iCube Camera Control v{}", icube_control::VERSION);
    info!("No vendor SDK binding linked; using the in-process SDK");

    let file_config = match &args.config {
        Some(path) => match FileConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config: {}", e);
                std::process::exit(1);
            }
        },
        None => FileConfig::default(),
    };

    #[cfg(feature = "metrics")]
    let metrics = start_metrics(file_config.metrics.port);

    let sdk = Arc::new(MockSdk::new().with_synthetic_stream(SyntheticStream {
        interval: Duration::from_millis(args.frame_interval_ms),
        frame_size: args.frame_size,
        bad_every: args.bad_every,
    }));

    let controller = match CameraController::new(sdk, file_config.camera) {
        Ok(controller) => controller,
        Err(e) => {
            eprintln!("Invalid camera configuration: {}", e);
            std::process::exit(1);
        }
    };
    let mut api = CameraApi::new(controller);

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = Arc::clone(&running);
    if let Err(e) = ctrlc::set_handler(move || handler_flag.store(false, Ordering::SeqCst)) {
        warn!("Failed to install Ctrl-C handler: {}", e);
    }

    if api.init() != 1 {
        error!("Camera init failed!");
        std::process::exit(1);
    }

    if let Some(milliseconds) = args.exposure {
        if api.set_exposure(milliseconds) != 1 {
            warn!("Failed setting exposure to {} ms", milliseconds);
        }
    }

    if api.start() != 1 {
        error!("Camera start failed!");
        std::process::exit(1);
    }

    info!("Camera initialized!");
    #[cfg(feature = "metrics")]
    publish_metrics(metrics.as_deref(), &api);

    let started = Instant::now();
    let deadline = args.duration_secs.map(Duration::from_secs);
    let report_interval = Duration::from_secs(args.report_interval_secs.max(1));
    let mut last_report = Instant::now();

    while running.load(Ordering::SeqCst) && deadline.map_or(true, |d| started.elapsed() < d) {
        thread::sleep(Duration::from_millis(100));
        if last_report.elapsed() < report_interval {
            continue;
        }
        last_report = Instant::now();

        report(&api, args.save.as_deref());

        #[cfg(feature = "metrics")]
        publish_metrics(metrics.as_deref(), &api);
    }

    let exit_code = if api.stop() == 1 {
        0
    } else {
        error!("Camera stop failed!");
        1
    };

    #[cfg(feature = "metrics")]
    publish_metrics(metrics.as_deref(), &api);

    info!(
        "Done. Images: good({}), bad({})",
        api.good_image_count(),
        api.bad_image_count()
    );
    std::process::exit(exit_code);
}

fn report(api: &CameraApi<MockSdk>, save: Option<&str>) {
    info!(
        "Images: good({}), bad({})",
        api.good_image_count(),
        api.bad_image_count()
    );

    if let Some(template) = save {
        let path = expand_timestamp(template);
        if api.save_file(&path) == 1 {
            info!("Saved image: {}", path);
        } else {
            warn!("Image save failed: {}", path);
        }
    }
}

fn expand_timestamp(template: &str) -> String {
    let stamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
    template.replace("{timestamp}", &stamp)
}

#[cfg(feature = "metrics")]
fn start_metrics(
    port: u16,
) -> Option<Arc<tokio::sync::RwLock<icube_control::metrics::MetricsState>>> {
    use icube_control::metrics::{MetricsRegistry, MetricsServer, MetricsServerConfig};

    if port == 0 {
        return None;
    }

    let registry = match MetricsRegistry::new() {
        Ok(registry) => registry,
        Err(e) => {
            warn!("Failed to create metrics registry: {}", e);
            return None;
        }
    };

    let server = MetricsServer::new(MetricsServerConfig::with_port(port), registry);
    let state = server.state();

    thread::spawn(move || {
        let runtime = match tokio::runtime::Runtime::new() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!("Failed to start metrics runtime: {}", e);
                return;
            }
        };
        if let Err(e) = runtime.block_on(server.run()) {
            warn!("Metrics server stopped: {}", e);
        }
    });

    Some(state)
}

#[cfg(feature = "metrics")]
fn publish_metrics(
    state: Option<&tokio::sync::RwLock<icube_control::metrics::MetricsState>>,
    api: &CameraApi<MockSdk>,
) {
    if let Some(state) = state {
        let controller = api.controller();
        let snapshot = icube_control::metrics::MetricsSnapshot::from_components(
            controller.sink(),
            controller.state(),
        );
        state.blocking_write().update(&snapshot);
    }
}
