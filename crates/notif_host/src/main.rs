use notif_host::{run, HostConfig};
use tracing_subscriber::EnvFilter;

fn main() {
    let config = HostConfig::from_env().unwrap_or_default();
    // stdout carries replies; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(config) {
        tracing::error!(%err, "notification host terminated");
        eprintln!("Failed to run notification host: {err:#}");
        std::process::exit(1);
    }
}
