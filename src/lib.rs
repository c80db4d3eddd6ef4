/// pitmon_service: containment pit water-level monitoring service.
///
/// # Module structure
///
/// ```text
/// pitmon_service
/// ├── model       — shared data types (Reading) and error enums
/// ├── config      — service configuration loader (pitmon.toml)
/// ├── sensor      — DistanceSensor boundary + simulated sensor
/// ├── monitor     — measurement loop, depth conversion, live gauge
/// │   └── sampler — windowed sampling with drop-extremes outlier rejection
/// ├── db          — per-worker SQLite connection manager, transactions
/// ├── store       — water_levels schema owner and repository
/// └── endpoint    — range-query service + tiny_http API shell
/// ```

/// Public modules
pub mod config;
pub mod db;
pub mod endpoint;
pub mod model;
pub mod monitor;
pub mod sensor;
pub mod store;
