//! Traffic seeder for local development.
//!
//! Publishes randomized driver location updates (and optionally one ride
//! request) to a city's topics, so a locally running pipeline has something
//! to match against.
//!
//! Run with: `cargo run -p hail-server --bin hail_seed -- --city mumbai --drivers 20`

use clap::Parser;
use hail_core::{unix_now, DriverStatus, DriverUpdate, RideRequest};
use hail_ingest::LocationProducer;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "hail_seed", version, about = "Seed driver and rider traffic")]
struct Cli {
    /// Kafka bootstrap servers.
    #[arg(long, default_value = "localhost:9092")]
    brokers: String,

    /// City whose topics receive the traffic.
    #[arg(long, default_value = "mumbai")]
    city: String,

    /// Number of driver updates to publish.
    #[arg(long, default_value_t = 20)]
    drivers: u32,

    /// Center latitude for the generated positions.
    #[arg(long, default_value_t = 19.076)]
    lat: f64,

    /// Center longitude for the generated positions.
    #[arg(long, default_value_t = 72.877)]
    lng: f64,

    /// Also publish one ride request at the center point.
    #[arg(long)]
    request: bool,

    /// PRNG seed for repeatable traffic.
    #[arg(long, default_value_t = 1)]
    seed: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().init();
    let cli = Cli::parse();

    let locations = match LocationProducer::new(&cli.brokers, "%s-locations") {
        Ok(producer) => producer,
        Err(err) => {
            error!(error = %err, "cannot create producer");
            return ExitCode::FAILURE;
        }
    };

    let mut rng = SmallRng::seed_from_u64(cli.seed);
    let now = unix_now();
    for i in 0..cli.drivers {
        // Scatter within roughly two kilometers of the center.
        let update = DriverUpdate {
            driver_id: format!("SIM-{:05}", i),
            city: cli.city.clone(),
            latitude: cli.lat + rng.gen_range(-0.02..0.02),
            longitude: cli.lng + rng.gen_range(-0.02..0.02),
            timestamp: now,
            vehicle_type: "STANDARD".to_string(),
            status: DriverStatus::Active,
        };
        if let Err(err) = locations
            .publish(&cli.city, Some(&update.driver_id), &update)
            .await
        {
            error!(driver_id = %update.driver_id, error = %err, "publish failed");
            return ExitCode::FAILURE;
        }
    }
    info!(drivers = cli.drivers, city = %cli.city, "driver updates published");

    if cli.request {
        let riders = match LocationProducer::new(&cli.brokers, "%s-users") {
            Ok(producer) => producer,
            Err(err) => {
                error!(error = %err, "cannot create producer");
                return ExitCode::FAILURE;
            }
        };
        let request = RideRequest {
            user_id: format!("SIM-USER-{}", cli.seed),
            city: cli.city.clone(),
            latitude: cli.lat,
            longitude: cli.lng,
            timestamp: now,
            request_type: "STANDARD".to_string(),
        };
        if let Err(err) = riders.publish(&cli.city, Some(&request.user_id), &request).await {
            error!(error = %err, "request publish failed");
            return ExitCode::FAILURE;
        }
        info!(user_id = %request.user_id, "ride request published");
    }

    ExitCode::SUCCESS
}
