//! `validate`: resolve the configuration and probe every selected service

use anyhow::{Result, bail};
use servarr_orchestration::{Orchestrator, Selector};
use std::path::Path;

pub async fn run(config_path: &Path, services: &str) -> Result<i32> {
    let config = super::load_config(config_path)?;
    println!("Configuration valid: {}", config_path.display());
    println!("  Base URL: {}", config.base_url);
    println!("  Instances: {}", config.instances.len());

    let selector = Selector::parse(services);
    if selector.is_empty() {
        bail!("no known services in selector '{}'", services);
    }

    let outcomes = Orchestrator::new(&config)
        .check_connectivity(&selector)
        .await?;

    let mut unreachable = 0usize;
    for (service, outcome) in &outcomes {
        match outcome {
            None => println!("  ✓ {} reachable", service),
            Some(error) => {
                unreachable += 1;
                println!("  ✗ {} unreachable: {}", service, error);
            }
        }
    }

    Ok(if unreachable > 0 { 1 } else { 0 })
}
