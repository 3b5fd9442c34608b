mod api;
mod app;
mod commands;
mod config;
mod dashboard;
mod debounce;
mod event;
mod form;
mod list;
mod logging;
mod query;
#[cfg(test)]
mod test_support;
mod ui;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "shopdesk")]
#[command(about = "A terminal admin console for e-commerce REST backends, inspired by k9s")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/shopdesk/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// API base URL, overriding the config file
  #[arg(long)]
  api_url: Option<String>,

  /// View to open first: dashboard, users, customers, products, orders or categories
  #[arg(short, long, default_value = "dashboard")]
  view: String,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = config::Config::load(args.config.as_deref())?;

  // Override the backend if specified on command line
  if let Some(api_url) = args.api_url {
    config = config.with_base_url(&api_url)?;
  }

  let _log_guard = logging::init(&config.log)?;

  // Initialize and run the app
  let mut app = app::App::new(&config, &args.view)?;
  app.run().await?;

  Ok(())
}
