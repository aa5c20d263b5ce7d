use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::app;
use crate::auth::{generate_jwt, Claims};
use crate::database::models::AgentRole;

#[derive(Debug, Parser)]
#[command(name = "shiftdesk-api", about = "Back-office attendance API")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server (the default)
    Serve {
        /// Port to bind; falls back to SHIFTDESK_PORT, PORT, then 3000
        #[arg(long)]
        port: Option<u16>,
    },
    /// Mint a JWT for local development and testing
    Token {
        #[arg(long)]
        agent_id: Uuid,
        #[arg(long, default_value = "dev")]
        name: String,
        /// "agent" or "admin"
        #[arg(long, default_value = "agent")]
        role: String,
    },
    /// Mark sessions left open before a given day as incomplete
    Reconcile {
        /// Defaults to today
        #[arg(long)]
        before: Option<NaiveDate>,
    },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command.unwrap_or(Command::Serve { port: None }) {
        Command::Serve { port } => serve(port).await,
        Command::Token { agent_id, name, role } => {
            let role = match role.as_str() {
                "admin" => AgentRole::Admin,
                _ => AgentRole::Agent,
            };
            let token = generate_jwt(Claims::new(agent_id, name, role))?;
            println!("{token}");
            Ok(())
        }
        Command::Reconcile { before } => {
            let state = app::build_state().await?;
            let before = before.unwrap_or_else(|| state.attendance.work_date());
            let outcome = state.attendance.reconcile_abandoned(before).await?;
            println!(
                "reconciled {} session(s): {:?}",
                outcome.session_ids.len(),
                outcome.session_ids
            );
            Ok(())
        }
    }
}

async fn serve(port: Option<u16>) -> anyhow::Result<()> {
    let state = app::build_state().await?;
    let app = app::router(state);

    // Allow tests or deployments to override port via env
    let port = port
        .or_else(|| std::env::var("SHIFTDESK_PORT").ok().and_then(|s| s.parse().ok()))
        .or_else(|| std::env::var("PORT").ok().and_then(|s| s.parse().ok()))
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("Shiftdesk API listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
