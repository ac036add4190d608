//! qmlscope CLI - build, inspect and watch a QML workspace index

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use qmlscope::config::{default_config_path, ensure_gitignore, load_config, write_config};
use qmlscope::{FileUri, IndexConfig, WorkspaceIndex};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "qmlscope")]
#[command(version)]
#[command(about = "Incremental, persistently cached index of a QML workspace")]
#[command(long_about = r#"
qmlscope indexes the QML documents and qmldir manifests of a workspace:
  • Imports, exports and symbols per document
  • Module registry with builtin Qt modules
  • File dependency edges with cascading invalidation
  • SQLite cache validated against file timestamps

Example usage:
  qmlscope index --path ./app
  qmlscope resolve QtQuick.Controls --component Button
  qmlscope file ./app/qml/Main.qml
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Workspace root
    #[arg(short, long, global = true, default_value = ".")]
    path: PathBuf,

    /// Config file (defaults to <path>/qmlscope.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the cache and scan the workspace
    Index,

    /// Scan, then keep the index in sync until Ctrl-C
    Watch,

    /// Print the entry for one document as JSON
    File {
        /// Document path
        file: PathBuf,
    },

    /// Resolve a module, or a component within it
    Resolve {
        /// Module name, full or a trailing suffix
        module: String,

        /// Component name
        #[arg(long)]
        component: Option<String>,

        /// Requested version, e.g. 2.15
        #[arg(long)]
        version: Option<String>,
    },

    /// List every known module
    Modules {
        /// Include builtin Qt modules
        #[arg(long)]
        builtins: bool,
    },

    /// Show cache statistics
    Stats,

    /// Drop every cached entry
    Clear,

    /// Write a default qmlscope.toml
    InitConfig {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let root = std::path::absolute(&cli.path)?;
    let config_path = cli.config.clone().unwrap_or_else(|| default_config_path(&root));

    if let Commands::InitConfig { force } = cli.command {
        write_config(&config_path, &IndexConfig::default(), force)?;
        ensure_gitignore(&root)?;
        println!("✅ Wrote {}", config_path.display());
        return Ok(());
    }

    let mut config = load_config(&config_path)?.unwrap_or_default();
    if !matches!(cli.command, Commands::Watch) {
        config.watch = false;
    }
    let index = WorkspaceIndex::open(&root, config)?;
    run(&index, &root, cli.command).await
}

async fn run(index: &WorkspaceIndex, root: &Path, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Index => {
            println!("🚀 Indexing workspace: {}", root.display());
            let scan = index.init().await?;
            println!("{}", scan);
            for failure in &scan.sources.failures {
                println!("  ⚠️  {}: {}", failure.path.display(), failure.message);
            }
            println!("\n{}", index.stats()?);
        }

        Commands::Watch => {
            let scan = index.init().await?;
            println!("{}", scan);
            println!("👀 Watching {} (Ctrl-C to stop)", root.display());
            tokio::signal::ctrl_c().await?;
            index.dispose().await;
            println!("\n{}", index.stats()?);
        }

        Commands::File { file } => {
            index.load_from_store()?;
            let uri = FileUri::from_path(&file)?;
            match index.get_file_entry(&uri).await? {
                Some(entry) => println!("{}", serde_json::to_string_pretty(&entry)?),
                None => anyhow::bail!("no such document: {}", uri.as_path().display()),
            }
        }

        Commands::Resolve {
            module,
            component,
            version,
        } => {
            index.load_from_store()?;
            let version = version.as_deref();
            match component {
                Some(component) => match index.resolve_component(&module, &component, version) {
                    Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                    None => anyhow::bail!("component {} not found in module {}", component, module),
                },
                None => match index.resolve_module(&module, version) {
                    Some(entry) => println!("{}", serde_json::to_string_pretty(&entry)?),
                    None => anyhow::bail!("module {} not found", module),
                },
            }
        }

        Commands::Modules { builtins } => {
            index.load_from_store()?;
            let modules: Vec<_> = index
                .get_all_modules()
                .into_iter()
                .filter(|module| builtins || !module.is_builtin())
                .collect();
            if modules.is_empty() {
                println!("❌ No modules indexed. Run `qmlscope index` first.");
            }
            for module in modules {
                let origin = match &module.manifest_path {
                    Some(path) => path.as_path().display().to_string(),
                    None => "builtin".to_string(),
                };
                println!(
                    "- {} {} ({} components) [{}]",
                    module.name,
                    module.version,
                    module.components.len(),
                    origin
                );
            }
        }

        Commands::Stats => {
            println!("{}", index.stats()?);
        }

        Commands::Clear => {
            index.clear_cache()?;
            println!("✅ Cache cleared");
        }

        Commands::InitConfig { .. } => {}
    }

    Ok(())
}
