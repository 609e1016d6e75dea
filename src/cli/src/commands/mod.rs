//! CLI command definitions and dispatch.

mod login;
mod logout;
mod pull;
mod version;
mod view;

use clap::{Parser, Subcommand};

/// A3S Pull - fetch images and their artifacts into a local content store.
#[derive(Parser)]
#[command(name = "a3s-pull", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// Pull a reference and its artifacts into the content store
    Pull(pull::PullArgs),
    /// Print the manifest a reference resolves to
    View(view::ViewArgs),
    /// Store registry credentials
    Login(login::LoginArgs),
    /// Remove stored registry credentials
    Logout(logout::LogoutArgs),
    /// Show version information
    Version(version::VersionArgs),
}

/// Dispatch a parsed CLI to the appropriate command handler.
pub async fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Pull(args) => pull::execute(args).await,
        Command::View(args) => view::execute(args).await,
        Command::Login(args) => login::execute(args).await,
        Command::Logout(args) => logout::execute(args).await,
        Command::Version(args) => version::execute(args).await,
    }
}
