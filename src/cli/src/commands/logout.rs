//! `a3s-pull logout` command - remove stored registry credentials.

use a3s_pull_runtime::CredentialStore;
use clap::Args;

#[derive(Args)]
pub struct LogoutArgs {
    /// Registry server (default: docker.io)
    pub server: Option<String>,

    /// Remove credentials for every registry
    #[arg(long, conflicts_with = "server")]
    pub all: bool,
}

pub async fn execute(args: LogoutArgs) -> Result<(), Box<dyn std::error::Error>> {
    let store = CredentialStore::default_path()?;

    let servers = if args.all {
        store.registries()?
    } else {
        vec![args.server.unwrap_or_else(|| "docker.io".to_string())]
    };

    for server in servers {
        if store.remove(&server)? {
            println!("Removing login credentials for {}", server);
        } else {
            println!("Not logged in to {}", server);
        }
    }

    Ok(())
}
