use std::sync::Arc;

use clap::Parser;
use hwmon_router::{
    actors::egress::publisher_from_config,
    actuators::{
        Actuator, CapabilityRegistry, SERVICE_CAPABILITY, systemd::SystemdServiceActuator,
    },
    config::read_config_file,
    router::Router,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, level_filters::LevelFilter, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Config file
    #[arg(short)]
    file: String,
}

fn init() {
    let filter = filter::Targets::new().with_targets(vec![
        ("hwmon_router", LevelFilter::TRACE),
        ("hwmon_routerd", LevelFilter::TRACE),
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let config = read_config_file(&args.file)?;

    let registry = CapabilityRegistry::new().register(SERVICE_CAPABILITY, || {
        Ok(Arc::new(SystemdServiceActuator::new()) as Arc<dyn Actuator>)
    });
    let router = Router::start(&config, registry, publisher_from_config(&config.egress)?)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if let Some(destination) = router.ingest_line(&line) {
                        debug!("accepted envelope for {destination}");
                    }
                }
                Ok(None) => {
                    info!("end of input");
                    break;
                }
                Err(e) => {
                    error!("failed to read input: {e}");
                    break;
                }
            },

            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    // deliver what is already queued before stopping
    router.scheduler().turn_all().await;
    router.shutdown().await;

    Ok(())
}
