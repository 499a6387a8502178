use anyhow::Result;
use runtimeclass_webhook::{cli, config::Config, fatal_error, setup_tracing, WebhookServer};
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli::build_cli().get_matches();
    let config = Config::from_args(&matches)?;

    if let Err(e) = setup_tracing(&config.log_level, &config.log_fmt, config.log_no_color) {
        fatal_error(e.to_string());
    }
    debug!("tracing system ready");

    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        fatal_error("cannot install the rustls crypto provider".to_owned());
    }

    let server = match WebhookServer::new_from_config(config).await {
        Ok(server) => server,
        Err(e) => fatal_error(e.to_string()),
    };

    if let Err(e) = server.run().await {
        fatal_error(e.to_string());
    }

    Ok(())
}
