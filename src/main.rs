//! adstxt-relay - keep a site's ads.txt in sync with the publisher network
//!
//! `serve` (the default) pre-warms the cache and answers `/ads.txt` over HTTP,
//! `refresh` forces one upstream fetch, `show` prints what would be served.

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use adstxt_relay::app::App;
use adstxt_relay::cli::{Cli, Command};
use adstxt_relay::config::Settings;

/// Logs go to stderr so `show` output stays clean on stdout
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}

/// Completes on ctrl-c
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    let settings = Settings::from_cli(&cli)?;
    let app = App::new(settings)?;

    match cli.command() {
        Command::Serve => {
            let listener = TcpListener::bind(app.settings().listen).await?;
            tracing::info!(addr = %listener.local_addr()?, "serving /ads.txt");
            app.serve(listener, shutdown_signal()).await?;
        }
        Command::Refresh => match app.activate().await {
            Some(content) if !content.is_empty() => {
                println!("ads.txt refreshed ({} lines)", content.lines().count());
            }
            _ => return Err("no ads.txt content available".into()),
        },
        Command::Show => {
            let content = app.service().current_content(None).await.unwrap_or_default();
            print!("{}", content);
        }
    }

    Ok(())
}
