use clap::{Parser, Subcommand};

use recipe_api::{app, auth::services, state::AppState};

#[derive(Parser, Debug)]
#[command(author, version, about = "Recipe API server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create a staff account with superuser rights
    CreateSuperuser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
}

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "recipe_api=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let state = AppState::init().await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let config = state.config.clone();
            let app = app::build_app(state);
            app::serve(app, &config).await?;
        }
        Command::CreateSuperuser { email, password } => {
            let user = services::create_superuser(state.store.as_ref(), &email, &password)
                .await
                .map_err(|e| anyhow::anyhow!("could not create superuser: {e}"))?;
            tracing::info!(user_id = %user.id, email = %user.email, "superuser created");
        }
    }
    Ok(())
}
