mod config;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use family_context::FamilyContextModule;
use family_context_sdk::{Family, FamilyId, FamilyRole};
use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, LoggingConfig};

/// Family Finance - maintenance of the local family databases
#[derive(Parser)]
#[command(name = "family-finance")]
#[command(about = "Family Finance - maintenance of the local family databases")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the data directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show migration state, families and the active family
    Status,
    /// Run the startup flow (legacy migration, last active family)
    Migrate,
    /// List registered families
    Families,
    /// Create a family and make it active
    Create {
        name: String,
        /// Externally resolved family id; reused if already registered
        #[arg(long)]
        id: Option<FamilyId>,
    },
    /// Make a family active
    Switch { id: FamilyId },
    /// Rename a family
    Rename { id: FamilyId, name: String },
    /// Families an email is mapped to
    Lookup { email: String },
    /// Map an email to a family
    Link {
        email: String,
        family_id: FamilyId,
        member_id: String,
        #[arg(long, default_value = "member")]
        role: FamilyRole,
    },
}

fn init_logging(cfg: &LoggingConfig, verbose: u8) {
    let level = match verbose {
        0 => cfg.level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cfg.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_family(family: &Family, active: Option<&FamilyId>) {
    let marker = if active == Some(&family.id) { "*" } else { " " };
    println!(
        "{marker} {}  {}  (created {})",
        family.id,
        family.name,
        family.created_at.to_rfc3339()
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config
        && !path.is_file()
    {
        anyhow::bail!("config file does not exist: {}", path.display());
    }

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.family_context.data_dir = dir;
    }
    init_logging(&config.logging, cli.verbose);
    tracing::debug!(
        data_dir = %config.family_context.data_dir.display(),
        "Configuration loaded"
    );

    let module = FamilyContextModule::new(config.family_context);
    let outcome = run(&module, cli.command.unwrap_or(Commands::Status)).await;
    module.shutdown().await;
    outcome
}

async fn run(module: &FamilyContextModule, command: Commands) -> Result<()> {
    let ctx = module.context();
    match command {
        Commands::Status => {
            let status = module.migration().check().await?;
            println!("legacy migration: {status}");
            let active = ctx.last_active().await?;
            for family in ctx.list_families().await? {
                print_family(&family, active.as_ref().map(|f| &f.id));
            }
        }
        Commands::Migrate => match module.start().await? {
            Some(family) => println!("active family: {} ({})", family.name, family.id),
            None => println!("no family yet, create one"),
        },
        Commands::Families => {
            let active = ctx.last_active().await?;
            for family in ctx.list_families().await? {
                print_family(&family, active.as_ref().map(|f| &f.id));
            }
        }
        Commands::Create { name, id } => {
            let family = match id {
                Some(id) => ctx.create_family_with_id(&id, &name).await?,
                None => ctx.create_family(&name).await?,
            };
            println!("{} {}", family.id, family.name);
        }
        Commands::Switch { id } => match ctx.activate(&id).await? {
            Some(family) => println!("active family: {} ({})", family.name, family.id),
            None => anyhow::bail!("family not found: {id}"),
        },
        Commands::Rename { id, name } => match ctx.rename(&id, &name).await? {
            Some(family) => println!("{} {}", family.id, family.name),
            None => anyhow::bail!("family not found: {id}"),
        },
        Commands::Lookup { email } => {
            for m in ctx.find_mappings_by_email(&email).await? {
                println!(
                    "{}  {}  {}  member {}",
                    m.id,
                    m.family_id,
                    m.family_role.as_str(),
                    m.member_id
                );
            }
        }
        Commands::Link {
            email,
            family_id,
            member_id,
            role,
        } => {
            let m = ctx.link_user(&email, &family_id, role, &member_id).await?;
            println!("{} -> {} ({})", m.email, m.family_id, m.family_role.as_str());
        }
    }
    Ok(())
}
