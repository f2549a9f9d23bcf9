//! Forge CLI
//!
//! Runs the studio server and works with the saved-project library from the
//! terminal.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use forge_client::GeminiClient;
use forge_orchestrator::{
    create_router, AppState, Config, CredentialFlow, EnvCredentialFlow, ForgeError,
    GenerationOutcome, ProjectStore, SavedProject, Studio,
};
use forge_preview::{CodeExport, LibraryEntry, LibraryJson, LibraryMarkdown, PreviewDocument, Viewport};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Forge - AI website studio
///
/// Describe a website in plain language, get a complete single-page site back,
/// refine it iteratively, and keep every result in a local library.
#[derive(Parser, Debug)]
#[command(name = "forge")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: forge.json in current directory)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the studio HTTP and WebSocket server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Generate a new site, or refine a saved one
    Generate {
        /// What the site should be (may be empty when files are attached)
        #[arg(value_name = "PROMPT")]
        prompt: Option<String>,

        /// File to send along with the prompt (repeatable)
        #[arg(short, long = "attach", value_name = "FILE")]
        attach: Vec<PathBuf>,

        /// Refine this saved project instead of creating a new one
        #[arg(short, long, value_name = "ID")]
        refine: Option<String>,
    },

    /// List saved projects, most recent first
    List {
        /// Print JSON instead of a Markdown table
        #[arg(long)]
        json: bool,
    },

    /// Show a saved project
    Show {
        /// Project id
        id: String,

        /// Also print the HTML, CSS and JavaScript
        #[arg(long)]
        code: bool,

        /// Print the full record as JSON
        #[arg(long, conflicts_with = "code")]
        json: bool,
    },

    /// Render a saved project as a standalone HTML document
    Preview {
        /// Project id
        id: String,

        /// Frame the document at a device width (desktop, tablet, mobile)
        #[arg(long)]
        viewport: Option<Viewport>,

        /// Write to this file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        out: Option<PathBuf>,
    },

    /// Write a saved project's source files to a directory
    Export {
        /// Project id
        id: String,

        /// Output directory
        #[arg(short, long, value_name = "DIR")]
        out: PathBuf,
    },

    /// Delete a saved project
    Delete {
        /// Project id
        id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(config = ?args.config, "Config file");

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            config.validate()?;
            serve(config).await
        }
        Command::Generate {
            prompt,
            attach,
            refine,
        } => generate(&config, prompt.unwrap_or_default(), attach, refine).await,
        Command::List { json } => list(&config, json).await,
        Command::Show { id, code, json } => show(&config, &id, code, json).await,
        Command::Preview { id, viewport, out } => {
            preview(&config, &id, viewport, out.as_deref()).await
        }
        Command::Export { id, out } => export(&config, &id, &out).await,
        Command::Delete { id, yes } => delete(&config, &id, yes).await,
    }
}

/// Loads configuration from the specified path or default location.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

/// Builds the model client from configuration and whatever key is available.
fn build_client(config: &Config, credentials: &EnvCredentialFlow) -> GeminiClient {
    let mut client = GeminiClient::new(credentials.api_key().unwrap_or_default(), &config.model)
        .with_base_url(&config.base_url)
        .with_options(config.request_options());
    if let Some(timeout) = config.request_timeout() {
        client = client.with_timeout(timeout);
    }
    client
}

fn build_studio(config: &Config, store: ProjectStore) -> Studio {
    let credentials = EnvCredentialFlow::new(&config.api_key_env);
    let client = build_client(config, &credentials);
    Studio::new(Arc::new(client), Arc::new(credentials), store)
        .with_max_attachment_bytes(config.max_attachment_bytes)
}

async fn load_project(config: &Config, id: &str) -> anyhow::Result<(ProjectStore, SavedProject)> {
    let store = ProjectStore::load(&config.store_file).await;
    let project = store
        .get(id)
        .cloned()
        .ok_or_else(|| ForgeError::project_not_found(id))?;
    Ok((store, project))
}

fn library_entry(project: &SavedProject) -> LibraryEntry {
    LibraryEntry::new(
        &project.id,
        project.title(),
        &project.site.metadata.description,
        &project.prompt,
        project.timestamp,
    )
}

// ============================================================================
// Commands
// ============================================================================

async fn serve(config: Config) -> anyhow::Result<()> {
    let credentials = EnvCredentialFlow::new(&config.api_key_env);
    if !credentials.has_valid_credential() {
        credentials.open_selector().await;
    }

    let store = ProjectStore::load(&config.store_file).await;
    let studio = build_studio(&config, store);

    let addr = format!("{}:{}", config.host, config.port);
    println!("Configuration loaded:");
    println!("  Model: {}", config.model);
    println!("  Store file: {}", config.store_file);
    println!("  Max attachment size: {} bytes", config.max_attachment_bytes);

    let router = create_router(AppState::new(config, Arc::new(studio)));
    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        anyhow::anyhow!("Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port")
    })?;

    println!();
    println!("Forge studio running on http://{addr}");
    println!("Press Ctrl+C to stop");
    tracing::info!(addr = %addr, "Studio server started");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl+C, shutting down");
            }
        })
        .await?;

    Ok(())
}

async fn generate(
    config: &Config,
    prompt: String,
    attach: Vec<PathBuf>,
    refine: Option<String>,
) -> anyhow::Result<()> {
    let credentials = EnvCredentialFlow::new(&config.api_key_env);
    if !credentials.has_valid_credential() {
        anyhow::bail!(
            "No API key found in ${}\n\nSuggestion: Export your Gemini API key, e.g. `export {}=...`",
            credentials.var(),
            credentials.var()
        );
    }

    let store = ProjectStore::load(&config.store_file).await;
    let studio = build_studio(config, store);

    if let Some(id) = &refine {
        let project = studio.load_project(id).await?;
        println!("Refining \"{}\" ({})", project.title(), project.id);
    }

    if !attach.is_empty() {
        let report = studio.attach_files(attach).await;
        for name in &report.attached {
            println!("  Attached: {name}");
        }
        for failure in &report.failed {
            eprintln!("  Skipped {}: {}", failure.path.display(), failure.message);
        }
    }

    println!("Generating...");
    let outcome = studio.request_generation(&prompt, refine.is_some()).await?;

    let Some(id) = outcome.project_id() else {
        println!("Nothing to generate: give a prompt or attach a file");
        return Ok(());
    };
    let title = studio
        .project(id)
        .await
        .map(|p| p.title().to_string())
        .unwrap_or_default();

    match &outcome {
        GenerationOutcome::Refined { .. } => println!("Refined \"{title}\" ({id})"),
        _ => println!("Created \"{title}\" ({id})"),
    }
    println!("Run `forge preview {id} --out site.html` to view it");
    Ok(())
}

async fn list(config: &Config, json: bool) -> anyhow::Result<()> {
    let store = ProjectStore::load(&config.store_file).await;
    let entries: Vec<LibraryEntry> = store.projects().iter().map(library_entry).collect();

    if json {
        println!("{}", LibraryJson::new(&entries).generate_pretty()?);
    } else {
        print!("{}", LibraryMarkdown::new(&entries).generate());
    }
    Ok(())
}

async fn show(config: &Config, id: &str, code: bool, json: bool) -> anyhow::Result<()> {
    let (_, project) = load_project(config, id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&project)?);
        return Ok(());
    }

    println!("Title: {}", project.title());
    println!("Description: {}", project.site.metadata.description);
    println!("Prompt: {}", project.prompt);
    println!("Updated: {}", project.timestamp.format("%Y-%m-%d %H:%M UTC"));
    println!("ID: {}", project.id);

    if code {
        println!();
        println!("--- HTML ---");
        println!("{}", project.site.html);
        println!("--- CSS ---");
        println!("{}", project.site.css);
        println!("--- JavaScript ---");
        println!("{}", project.site.js);
    }
    Ok(())
}

async fn preview(
    config: &Config,
    id: &str,
    viewport: Option<Viewport>,
    out: Option<&Path>,
) -> anyhow::Result<()> {
    let (_, project) = load_project(config, id).await?;
    let document = PreviewDocument::new(&project.site).with_options(config.preview.to_options());
    let html = match viewport {
        Some(viewport) => document.render_frame(viewport),
        None => document.render(),
    };

    match out {
        Some(path) => {
            std::fs::write(path, html)?;
            println!("Preview written to {}", path.display());
        }
        None => print!("{html}"),
    }
    Ok(())
}

async fn export(config: &Config, id: &str, out: &Path) -> anyhow::Result<()> {
    let (_, project) = load_project(config, id).await?;
    let files = CodeExport::new(&project.site)
        .with_options(config.preview.to_options())
        .write_to_dir(out)?;

    println!("Exported \"{}\":", project.title());
    for path in files.paths() {
        println!("  {}", path.display());
    }
    Ok(())
}

async fn delete(config: &Config, id: &str, yes: bool) -> anyhow::Result<()> {
    let (mut store, project) = load_project(config, id).await?;

    if !yes && !confirm(&format!(
        "Delete \"{}\" ({})? This cannot be undone. [y/N] ",
        project.title(),
        project.id
    ))? {
        println!("Cancelled");
        return Ok(());
    }

    store.remove(id);
    store.persist().await?;
    tracing::info!(id = %id, "Project deleted");
    println!("Deleted \"{}\"", project.title());
    Ok(())
}

/// Asks a yes/no question on the terminal; anything but `y`/`yes` is no.
fn confirm(question: &str) -> anyhow::Result<bool> {
    let mut stdout = std::io::stdout();
    stdout.write_all(question.as_bytes())?;
    stdout.flush()?;

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
