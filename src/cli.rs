use clap::{Parser, Subcommand};
use std::net::SocketAddr;

#[derive(Parser, Debug)]
#[command(name = "ghrelay")]
#[command(about = "Redirects short URLs to GitHub release assets", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP redirect server
    Server(ServerArgs),
    /// Resolve one asset and print its download URL
    Resolve(ResolveArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServerArgs {
    /// Address to bind, overrides `server.bind_addr`
    #[arg(long)]
    pub address: Option<SocketAddr>,
}

#[derive(clap::Args, Debug)]
pub struct ResolveArgs {
    pub owner: String,
    pub repo: String,
    pub tag: String,
    pub asset: String,
}
