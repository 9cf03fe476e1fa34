use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use consult_intake::app::form_admin_use_case::FormAdminUseCase;
use consult_intake::app::user_use_case::UserUseCase;
use consult_intake::config::Config;
use consult_intake::engine::{self, Answers};
use consult_intake::storage::Database;
use consult_intake::{logging, observability, seed, server};

#[derive(Parser)]
#[command(name = "consult_intake")]
#[command(about = "Consultation intake service: dynamic screening forms, risk scoring and crisis alerts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Port override (defaults to config / CONSULT_PORT)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Create or update the database schema
    Migrate,
    /// Insert the default screening template and an admin account
    Seed {
        #[arg(long, default_value = "admin@example.org")]
        admin_email: String,
        #[arg(long, default_value = "Administrator")]
        admin_name: String,
    },
    /// Score a JSON answers file against the active template for a slug
    Score {
        /// Template slug
        #[arg(long, default_value = seed::SCREENING_SLUG)]
        slug: String,
        /// JSON object mapping field keys to answers
        answers: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let mut config = Config::load().context("loading configuration")?;
    let _guard = logging::init_logging(&config.logging.dir);
    match &config.source {
        Some(path) => info!("Loaded configuration from {}", path.display()),
        None => info!("No config file found, using defaults and environment"),
    }

    let db = Arc::new(
        Database::open(&config.database.path)
            .with_context(|| format!("opening database at {}", config.database.path))?,
    );

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            observability::init();
            server::start_server(&config, db).await?;
        }
        Commands::Migrate => {
            db.migrate()?;
            info!("Database schema is up to date");
        }
        Commands::Seed {
            admin_email,
            admin_name,
        } => {
            let template = seed::seed_templates(&FormAdminUseCase::new(db.clone()))?;
            let admin = seed::seed_admin(&UserUseCase::new(db), &admin_name, &admin_email)?;
            println!("Admin user id: {}", admin.id);
            if let Some(template) = template {
                println!("Seeded template '{}' v{}", template.slug, template.version);
            }
        }
        Commands::Score { slug, answers } => {
            let raw = std::fs::read_to_string(&answers)
                .with_context(|| format!("reading {}", answers.display()))?;
            let answers: Answers = serde_json::from_str(&raw).context("answers must be a JSON object")?;
            let template = db.get_active_template(&slug)?;
            let evaluation = engine::evaluate(&template, &answers, &config.risk)?;
            println!("{}", serde_json::to_string_pretty(&evaluation)?);
        }
    }

    Ok(())
}
