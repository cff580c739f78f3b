use std::path::PathBuf;

use clap::Parser;
use network_compiler::{
    Build, BuildConfig,
    collaborators::ChannelPublisher,
    pipeline::Collaborators,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, prelude::*};

/// Builds the layered network model for a topology and prints it as JSON
#[derive(Parser)]
#[command(name = "network-compiler")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Node-link JSON topology, or a link list
    topology: PathBuf,

    /// TOML build configuration (defaults apply when omitted)
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_filter(filter))
        .init();

    let Args { topology, config } = Args::parse();
    let config = match config {
        Some(path) => match BuildConfig::from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                error!("{}: {e}", path.display());
                std::process::exit(1);
            }
        },
        None => BuildConfig::default(),
    };

    let collaborators = match Collaborators::from_config(&config) {
        Ok(collaborators) => collaborators,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };
    let (publisher, mut snapshots) = ChannelPublisher::channel();
    let forwarder = tokio::spawn(async move {
        while let Some(snapshot) = snapshots.recv().await {
            info!("snapshot after {}: {} bytes", snapshot.stage, snapshot.body.len());
        }
    });

    let build = Build::new(config).collaborators(collaborators.with_publisher(Box::new(publisher)));
    let result = tokio::task::spawn_blocking(move || build.run(&topology)).await;
    let _ = forwarder.await;

    let output = match result {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            error!("{e}");
            std::process::exit(1);
        }
        Err(e) => {
            error!("build task failed: {e}");
            std::process::exit(1);
        }
    };
    match serde_json::to_string_pretty(&output.anm) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            error!("could not serialize the model: {e}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_args() {
        Args::command().debug_assert();

        let args = Args::try_parse_from(["network-compiler", "topology.json", "build.toml"]).unwrap();
        assert_eq!(args.topology, PathBuf::from("topology.json"));
        assert_eq!(args.config, Some(PathBuf::from("build.toml")));

        let args = Args::try_parse_from(["network-compiler", "topology.json"]).unwrap();
        assert_eq!(args.config, None);

        assert!(Args::try_parse_from(["network-compiler"]).is_err());
    }
}
