//! fundtree CLI - funding template editor and job tracker

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use parking_lot::RwLock;
use tracing::Level;

use fundtree::editor::{render_outline, EditScript};
use fundtree::jobs::{BannerView, FileJobSource, JobBanner};
use fundtree::tree::{duplicate_node_ids, validate_forest};
use fundtree::{
    FileTemplateStore, FixSuggestion, FundError, FundtreeConfig, JobFilter, JobPoller,
    JobRegistry, TemplateDocument, TemplateEditor,
};

#[derive(Parser)]
#[command(name = "fundtree")]
#[command(about = "fundtree - funding template editor and job tracker")]
#[command(version)]
struct Cli {
    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate every node of a template (.json, .yaml)
    Validate {
        file: PathBuf,
    },

    /// Print the template as an indented outline
    Show {
        file: PathBuf,
    },

    /// Replay an edit script against a template
    Edit {
        file: PathBuf,

        /// Edit script (.json, .yaml)
        #[arg(short, long)]
        script: PathBuf,

        /// Write the edited template here (format from the extension)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Also save a new version into this store directory
        #[arg(long)]
        store: Option<PathBuf>,
    },

    /// Show job banners from a notifications file
    Jobs {
        /// Notifications file (.json, .yaml)
        notifications: PathBuf,

        #[arg(long)]
        spec: Option<String>,

        /// Repeat to accept several job types
        #[arg(long = "job-type")]
        job_types: Vec<String>,

        #[arg(long)]
        job_id: Option<String>,

        /// Keep polling at the configured interval until every job completes
        #[arg(short, long)]
        watch: bool,

        /// Emit banners as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration
    Config {
        /// Only print the config file location
        #[arg(long)]
        path: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    // Logs go to stderr so command output stays pipeable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Validate { file } => validate_template(&file).await,
        Commands::Show { file } => show_template(&file).await,
        Commands::Edit {
            file,
            script,
            out,
            store,
        } => edit_template(&file, &script, out.as_deref(), store.as_deref()).await,
        Commands::Jobs {
            notifications,
            spec,
            job_types,
            job_id,
            watch,
            json,
        } => {
            let filter = JobFilter {
                job_id,
                job_types,
                specification_id: spec,
            };
            show_jobs(&notifications, filter, watch, json).await
        }
        Commands::Config { path } => show_config(path),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.downcast_ref::<FundError>().and_then(|e| e.fix_suggestion()) {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

async fn load_template(file: &Path) -> anyhow::Result<TemplateDocument> {
    TemplateDocument::load(file)
        .await
        .with_context(|| format!("loading template {}", file.display()))
}

async fn validate_template(file: &Path) -> anyhow::Result<()> {
    let doc = load_template(file).await?;
    let forest = doc.to_forest();

    for id in duplicate_node_ids(&forest) {
        println!("{} node id '{}' is used more than once", "⚠".yellow(), id);
    }

    let failures = validate_forest(&forest);
    for (node_id, report) in &failures {
        println!("{} {}", "✗".red(), node_id.bold());
        for error in &report.errors {
            println!("    {}: {}", error.field.to_string().cyan(), error.message);
        }
    }

    match failures.into_iter().next() {
        Some((node_id, report)) => Err(FundError::Validation {
            node_id: node_id.to_string(),
            report,
        }
        .into()),
        None => {
            println!(
                "{} Template '{}' is valid ({} nodes)",
                "✓".green(),
                doc.template_id,
                forest.node_count()
            );
            Ok(())
        }
    }
}

async fn show_template(file: &Path) -> anyhow::Result<()> {
    let doc = load_template(file).await?;
    println!("{} {} (v{})", doc.template_id.bold(), doc.name, doc.version);
    print!("{}", render_outline(&doc.to_forest()));
    Ok(())
}

async fn edit_template(
    file: &Path,
    script: &Path,
    out: Option<&Path>,
    store: Option<&Path>,
) -> anyhow::Result<()> {
    let config = FundtreeConfig::load()?;
    let doc = load_template(file).await?;
    let script = EditScript::load(script)
        .await
        .with_context(|| format!("loading edit script {}", script.display()))?;

    let mut editor = TemplateEditor::from_document(doc, &config.editor);
    let report = script.apply(&mut editor)?;

    println!(
        "{} Applied {} of {} operations",
        "→".cyan(),
        report.applied,
        script.ops.len()
    );
    for index in &report.refused {
        println!(
            "  {} operation {} ({}) was refused",
            "⚠".yellow(),
            index,
            script.ops[*index].name()
        );
    }
    for id in &report.needs_renumber {
        println!("  {} clone '{}' needs a new numeric id", "⚠".yellow(), id);
    }

    if let Some(dir) = store {
        let store = FileTemplateStore::new(dir);
        let version = editor.save(&store).await?;
        println!("{} Saved version {} to {}", "✓".green(), version, dir.display());
    }

    match out {
        Some(path) => {
            editor.to_document().save(path).await?;
            println!("{} Wrote {}", "✓".green(), path.display());
        }
        None => print!("{}", render_outline(editor.forest())),
    }
    Ok(())
}

async fn show_jobs(
    notifications: &Path,
    filter: JobFilter,
    watch: bool,
    json: bool,
) -> anyhow::Result<()> {
    let config = FundtreeConfig::load()?;
    let mut registry = JobRegistry::new();
    registry.subscribe(filter);
    let registry = Arc::new(RwLock::new(registry));

    let source = Arc::new(FileJobSource::new(notifications));
    if watch {
        let polls = JobPoller::from_config(source, &config.jobs)
            .stop_when_settled(true)
            .start(&registry)
            .join()
            .await;
        tracing::debug!(polls, "watch finished");
    } else {
        JobPoller::new(source, config.jobs.poll_interval())
            .poll_once(&registry)
            .await?;
    }

    let banners = registry.read().banners();
    if json {
        let views: Vec<BannerView<'_>> = banners.iter().map(BannerView::from).collect();
        println!("{}", serde_json::to_string_pretty(&views)?);
    } else if banners.is_empty() {
        println!("{} No matching jobs", "→".cyan());
    } else {
        for banner in &banners {
            print_banner(banner);
        }
    }
    Ok(())
}

fn print_banner(banner: &JobBanner) {
    let title = if banner.is_error() {
        banner.title.red().bold()
    } else if banner.state.is_terminal() {
        banner.title.green().bold()
    } else {
        banner.title.cyan().bold()
    };
    println!("{} [{}]", title, banner.job_id);
    if let Some(summary) = &banner.summary {
        println!("    {}", summary);
    }
    if let Some(invoker) = &banner.invoker {
        println!(
            "    {} {} at {}",
            "by".dimmed(),
            invoker,
            banner.last_updated.format("%Y-%m-%d %H:%M")
        );
    }
}

fn show_config(path_only: bool) -> anyhow::Result<()> {
    let path = FundtreeConfig::config_path();
    if path_only {
        println!("{}", path.display());
        return Ok(());
    }
    let config = FundtreeConfig::load()?;
    println!("{} {}", "#".dimmed(), path.display().to_string().dimmed());
    print!("{}", config.to_toml()?);
    Ok(())
}
