mod config;
mod inspect_cmds;
mod project_cmds;
mod resolve;
mod run_cmd;
mod sync_cmd;
mod tools_cmd;

use clap::{Parser, Subcommand};

use weaver_db::pool;

use config::WeaverConfig;

#[derive(Parser)]
#[command(name = "weaver", about = "Run tool plans against a project's virtual file tree")]
struct Cli {
    /// Database URL (overrides WEAVER_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a weaver config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = "postgresql://localhost:5432/weaver")]
        db_url: String,
        /// Per-file size limit for blueprint syncs, in bytes
        #[arg(long)]
        max_file_bytes: Option<usize>,
        /// Steps of one ready set run concurrently
        #[arg(long)]
        max_parallel_steps: Option<usize>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Create the database if needed and apply migrations
    DbInit,
    /// Project management
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },
    /// Execute a plan JSON file against a project
    Run {
        /// Path to the plan JSON file
        plan: String,
        /// Project ID or name
        #[arg(long)]
        project: String,
        /// Override the number of steps run concurrently
        #[arg(long)]
        parallel: Option<usize>,
        /// User the run acts on behalf of
        #[arg(long)]
        user: Option<String>,
    },
    /// Replace a project's tree with a blueprint JSON file
    Sync {
        /// Path to the blueprint JSON file
        blueprint: String,
        /// Project ID or name
        #[arg(long)]
        project: String,
    },
    /// Print a project's tree
    Tree {
        /// Project ID or name
        #[arg(long)]
        project: String,
        /// Subtree to print
        #[arg(default_value = "/")]
        path: String,
    },
    /// Print a file's content
    Cat {
        /// Project ID or name
        #[arg(long)]
        project: String,
        /// File path
        path: String,
    },
    /// Print the project's content version
    Version {
        /// Project ID or name
        #[arg(long)]
        project: String,
    },
    /// List the tools available to plans
    Tools {
        /// Print full descriptors with input/output schemas as JSON
        #[arg(long)]
        verbose: bool,
    },
}

#[derive(Subcommand)]
pub enum ProjectCommands {
    /// Create a project with an empty root directory
    Create {
        /// Unique project name
        name: String,
        /// Owner recorded on the project
        #[arg(long)]
        owner: Option<String>,
    },
    /// List all projects
    List,
}

/// Execute the `weaver init` command: write config file.
fn cmd_init(
    db_url: &str,
    max_file_bytes: Option<usize>,
    max_parallel_steps: Option<usize>,
    force: bool,
) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
            max_connections: None,
        },
        sync: config::SyncSection { max_file_bytes },
        executor: config::ExecutorSection { max_parallel_steps },
    };
    config::save_config_to(&path, &cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    println!();
    println!("Next: run `weaver db-init` to create and migrate the database.");

    Ok(())
}

/// Execute the `weaver db-init` command: create database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let resolved = WeaverConfig::resolve(cli_db_url)?;

    println!("Initializing weaver database...");
    if pool::ensure_database_exists(&resolved.db_config).await? {
        println!("Created database.");
    }

    let db_pool = pool::create_pool(&resolved.db_config).await?;
    let result = async {
        pool::run_migrations(&db_pool).await?;
        let summary = pool::store_summary(&db_pool).await?;
        println!("Database ready.");
        println!("  projects: {}", summary.projects);
        println!("  nodes:    {}", summary.nodes);
        anyhow::Ok(())
    }
    .await;
    db_pool.close().await;
    result?;

    println!("weaver db-init complete.");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            db_url,
            max_file_bytes,
            max_parallel_steps,
            force,
        } => {
            cmd_init(&db_url, max_file_bytes, max_parallel_steps, force)?;
        }
        Commands::DbInit => {
            cmd_db_init(cli.database_url.as_deref()).await?;
        }
        Commands::Tools { verbose } => {
            let resolved = WeaverConfig::resolve(cli.database_url.as_deref())?;
            tools_cmd::run_tools(resolved.sync, verbose)?;
        }
        Commands::Project { command } => {
            let resolved = WeaverConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = project_cmds::run_project_command(command, &db_pool).await;
            db_pool.close().await;
            result?;
        }
        Commands::Run {
            plan,
            project,
            parallel,
            user,
        } => {
            let resolved =
                WeaverConfig::resolve(cli.database_url.as_deref())?.with_parallelism(parallel);
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let opts = run_cmd::RunOptions {
                plan_file: &plan,
                project: &project,
                user: user.as_deref(),
            };
            let result = run_cmd::run_plan(&db_pool, &resolved, opts).await;
            db_pool.close().await;
            result?;
        }
        Commands::Sync { blueprint, project } => {
            let resolved = WeaverConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = sync_cmd::run_sync(&db_pool, resolved.sync, &blueprint, &project).await;
            db_pool.close().await;
            result?;
        }
        Commands::Tree { project, path } => {
            let resolved = WeaverConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = inspect_cmds::run_tree(&db_pool, &project, &path).await;
            db_pool.close().await;
            result?;
        }
        Commands::Cat { project, path } => {
            let resolved = WeaverConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = inspect_cmds::run_cat(&db_pool, &project, &path).await;
            db_pool.close().await;
            result?;
        }
        Commands::Version { project } => {
            let resolved = WeaverConfig::resolve(cli.database_url.as_deref())?;
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = inspect_cmds::run_version(&db_pool, &project).await;
            db_pool.close().await;
            result?;
        }
    }

    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_overrides() {
        let cli = Cli::try_parse_from([
            "weaver",
            "--database-url",
            "postgresql://h/db",
            "run",
            "plan.json",
            "--project",
            "site",
            "--parallel",
            "1",
            "--user",
            "ana",
        ])
        .unwrap();
        assert_eq!(cli.database_url.as_deref(), Some("postgresql://h/db"));
        match cli.command {
            Commands::Run {
                plan,
                project,
                parallel,
                user,
            } => {
                assert_eq!(plan, "plan.json");
                assert_eq!(project, "site");
                assert_eq!(parallel, Some(1));
                assert_eq!(user.as_deref(), Some("ana"));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn tree_path_defaults_to_root() {
        let cli = Cli::try_parse_from(["weaver", "tree", "--project", "site"]).unwrap();
        match cli.command {
            Commands::Tree { path, .. } => assert_eq!(path, "/"),
            _ => panic!("expected tree"),
        }
    }

    #[test]
    fn project_is_required_for_sync() {
        assert!(Cli::try_parse_from(["weaver", "sync", "bp.json"]).is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
