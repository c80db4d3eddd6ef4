//! Pit Water-Level Monitoring Service - Main Daemon
//!
//! A daemon that continuously:
//! 1. Samples an ultrasonic distance sensor with outlier rejection
//! 2. Converts averaged distances into water depth readings
//! 3. Persists valid readings to an embedded SQLite database
//! 4. Provides an HTTP endpoint for range queries and the live depth
//!
//! Usage:
//!   cargo run --release                       # pitmon.toml in the cwd
//!   cargo run --release -- -c /etc/pitmon.toml
//!   cargo run --release -- --headless         # no HTTP endpoint
//!
//! Shutdown is coordinated on Ctrl+C: the measurement loop stops first
//! (releasing the sensor), then every database connection is closed.

use pitmon_service::config;
use pitmon_service::db::{ConnectionManager, WorkerId};
use pitmon_service::endpoint::{self, QueryService};
use pitmon_service::monitor::{LiveGauge, MonitorConfig, PitMonitor};
use pitmon_service::sensor::SimulatedSensor;
use pitmon_service::store::WaterLevelStore;
use std::env;
use std::sync::mpsc;
use std::sync::Arc;

fn main() {
    println!("Pit Water-Level Monitoring Service");
    println!("==================================\n");

    // Parse command-line arguments
    let args: Vec<String> = env::args().collect();
    let mut config_path = "pitmon.toml".to_string();
    let mut headless = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-c" | "--config" => {
                if i + 1 < args.len() {
                    config_path = args[i + 1].clone();
                    i += 2;
                } else {
                    eprintln!("Error: {} requires a file path", args[i]);
                    std::process::exit(1);
                }
            }
            "--headless" => {
                headless = true;
                i += 1;
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                eprintln!("Usage: {} [-c CONFIG] [--headless]", args[0]);
                std::process::exit(1);
            }
        }
    }

    // Load configuration snapshot
    let config = match config::load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Initialization failed: {}", e);
            std::process::exit(1);
        }
    };
    println!("Loaded configuration from {}", config_path);

    // Initialize storage: schema failure here is fatal
    let main_worker = WorkerId::new("main");
    let manager = Arc::new(ConnectionManager::new(&config.database.db_path));
    let store = match WaterLevelStore::new(Arc::clone(&manager), &main_worker) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            eprintln!("Initialization failed: {}", e);
            std::process::exit(1);
        }
    };
    println!("Database ready at {}", config.database.db_path);

    // Live gauge shared between the measurement loop and the endpoint
    let gauge = LiveGauge::new();

    // Start HTTP endpoint in a background worker unless headless
    if !headless {
        let service = QueryService::new(Arc::clone(&store), gauge.clone());
        let port = config.ui.port;
        std::thread::spawn(move || {
            if let Err(e) = endpoint::start_endpoint_server(port, service) {
                eprintln!("Endpoint server error: {}", e);
            }
        });
    } else {
        println!("Running headless, no HTTP endpoint");
    }

    // The sensor boundary: a GPIO-backed driver would be constructed here
    // on deployments with hardware attached. The simulator tracks the
    // configured pit geometry so depths land in a plausible band.
    let sensor = SimulatedSensor::new(config.monitor.distance_to_bottom * 0.4, 5.0);

    // Start the measurement loop on its own worker
    let mut monitor = PitMonitor::new(
        MonitorConfig::from(&config.monitor),
        Box::new(sensor),
        Arc::clone(&store),
        gauge,
    );
    monitor.start();
    println!("Measurement loop started. Press Ctrl+C to stop\n");

    // Wait for the termination signal
    let (shutdown_tx, shutdown_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(());
    })
    .expect("failed to install Ctrl+C handler");

    let _ = shutdown_rx.recv();

    // Ordered shutdown: stop the loop (releases the sensor) before closing
    // connections, so no cycle persists through a dead connection
    println!("\nShutting down...");
    monitor.stop();
    manager.close_all();
    println!("Shutdown complete");
}
