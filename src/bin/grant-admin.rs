/// Grant or revoke the admin role for an existing account.
///
/// Usage: grant-admin --email EMAIL [--revoke]
use clap::Parser;

use canteen_api::{db, services::auth::AuthService};

#[derive(Parser)]
#[command(name = "grant-admin", about = "Grant or revoke the canteen admin role")]
struct Args {
    /// Email of the account to change
    #[arg(long)]
    email: String,

    /// Remove the admin role instead of granting it
    #[arg(long)]
    revoke: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable not set"))?;
    let pool = db::create_pool(&database_url).await?;

    let grant = !args.revoke;
    if AuthService::set_admin(&pool, &args.email, grant).await? {
        tracing::info!(
            "{} admin role for {}",
            if grant { "Granted" } else { "Revoked" },
            args.email
        );
        Ok(())
    } else {
        anyhow::bail!("No account registered with {}", args.email)
    }
}
