pub mod commands;

use clap::{Parser, Subcommand};

use crate::routes::Service;

#[derive(Parser)]
#[command(name = "core-permissions-api")]
#[command(about = "Multi-tenant users and permissions API")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server (default when no command is given)")]
    Serve {
        #[arg(long = "service", value_enum, help = "Business module to mount; repeat for several, all when omitted")]
        services: Vec<Service>,

        #[arg(long, env = "SERVER_PORT", help = "Port to listen on")]
        port: Option<u16>,
    },

    #[command(about = "Print a bcrypt hash for seeding a user password")]
    HashPassword {
        #[arg(help = "Plain text password")]
        password: String,
    },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        None => commands::serve::handle(Vec::new(), None).await,
        Some(Commands::Serve { services, port }) => commands::serve::handle(services, port).await,
        Some(Commands::HashPassword { password }) => commands::hash_password::handle(&password),
    }
}
