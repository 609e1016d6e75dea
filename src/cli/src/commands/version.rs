//! `a3s-pull version` command.

use clap::Args;

#[derive(Args)]
pub struct VersionArgs;

pub async fn execute(_args: VersionArgs) -> Result<(), Box<dyn std::error::Error>> {
    println!("a3s-pull version {}", a3s_pull_core::VERSION);
    Ok(())
}
