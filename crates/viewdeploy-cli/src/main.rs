use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use walkdir::WalkDir;

use viewdeploy_core::{Config, Environment, SchemaSubstitution};
use viewdeploy_sequence::EntrySequence;
use viewdeploy_sql::{DependencySet, ViewDefinition};

const DEFAULT_CONFIG: &str = "viewdeploy.toml";
const SECRETS_CONFIG: &str = "passwords.toml";
const CONFIG_ENV_VAR: &str = "VIEWDEPLOY_CONFIG";

/// viewdeploy - Deploy versioned SQL view definitions
#[derive(Parser)]
#[command(name = "viewdeploy")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: viewdeploy.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Target environment flags (exactly one is required)
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct EnvSelection {
    /// Select the UAT environment
    #[arg(long, visible_alias = "test")]
    uat: bool,

    /// Select the production environment
    #[arg(long, visible_alias = "production")]
    prod: bool,

    /// Select the local environment
    #[arg(long)]
    local: bool,
}

impl EnvSelection {
    fn environment(&self) -> Environment {
        if self.prod {
            Environment::Prod
        } else if self.local {
            Environment::Local
        } else {
            Environment::Uat
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Render view files for an environment into a deployment script
    Deploy {
        #[command(flatten)]
        env: EnvSelection,

        /// Show the SQL without writing the script
        #[arg(long)]
        show: bool,

        /// Dependency view file to inline into the views that read it (repeatable)
        #[arg(long = "inline", value_name = "FILE")]
        inline: Vec<PathBuf>,

        /// Output script (default: deploy-<env>.sql)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// SQL files (default: every *.sql file in the current directory)
        #[arg(value_name = "FILENAME")]
        files: Vec<PathBuf>,
    },

    /// Show how a view file is split into header, CTEs and body
    Inspect {
        /// View file to parse
        file: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Concatenate patches listed in a sequence file
    Cat {
        /// Sequence file to read
        #[arg(short = 'f', long, default_value = "sequence.txt", conflicts_with = "patches")]
        file: PathBuf,

        /// Use the given patches instead of the sequence file
        #[arg(long, num_args = 1..)]
        patches: Vec<String>,

        /// Categories (path prefixes) of patch to include
        categories: Vec<String>,

        /// Entry to start at
        #[arg(long = "from")]
        start: Option<String>,

        /// Entry to stop before
        #[arg(long = "to")]
        stop: Option<String>,

        /// Limit the number of patches to include
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Just list the selected entries
        #[arg(long)]
        list: bool,

        /// Do not check that patches exist or are ASCII
        #[arg(long = "nocheck")]
        no_check: bool,
    },
}

fn main() -> Result<()> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Deploy { env, show, inline, output, files } => {
            let config = load_config(cli.config.as_deref(), cli.verbose)?;
            let options = DeployOptions {
                environment: env.environment(),
                show,
                inline,
                output,
                files,
            };
            deploy_command(&config, options, cli.verbose)
        }
        Commands::Inspect { file, json } => inspect_command(&file, json),
        Commands::Cat { file, patches, categories, start, stop, limit, list, no_check } => {
            let selection = CatOptions {
                file,
                patches,
                categories,
                start,
                stop,
                limit,
                list,
                check: !no_check,
            };
            cat_command(&selection, cli.verbose)
        }
    }
}

/// Install the stderr tracing subscriber; `RUST_LOG` overrides the level
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Load the config file plus an optional secrets file next to it
fn load_config(explicit: Option<&Path>, verbose: bool) -> Result<Config> {
    let path = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
        .or_else(|| Some(PathBuf::from(DEFAULT_CONFIG)).filter(|p| p.exists()));

    let Some(path) = path else {
        if verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        return Ok(Config::default());
    };

    let secrets = path
        .parent()
        .map(|dir| dir.join(SECRETS_CONFIG))
        .unwrap_or_else(|| PathBuf::from(SECRETS_CONFIG));

    let config = Config::from_files(&[path.clone(), secrets])
        .with_context(|| format!("Failed to load config from {}", path.display()))?;

    if verbose {
        eprintln!("{} {}", "Loaded config from:".cyan(), path.display());
    }

    Ok(config)
}

struct DeployOptions {
    environment: Environment,
    show: bool,
    inline: Vec<PathBuf>,
    output: Option<PathBuf>,
    files: Vec<PathBuf>,
}

/// Deploy command - inline, substitute and emit view definitions
fn deploy_command(config: &Config, options: DeployOptions, verbose: bool) -> Result<()> {
    let env = options.environment;
    let settings = config.environment(env)?;
    let substitution = SchemaSubstitution::for_environment(config, env)?;

    let files = if options.files.is_empty() {
        discover_sql_files(Path::new("."))?
    } else {
        options.files
    };
    check_files(&files)?;

    let mut dependencies = DependencySet::new();
    for path in &options.inline {
        let view = read_view(path)?;
        dependencies
            .insert(view)
            .with_context(|| format!("Failed to inline dependencies into {}", path.display()))?;
    }

    if verbose && !dependencies.is_empty() {
        eprintln!("{} {} dependency views", "Loaded".cyan(), dependencies.len());
    }

    let mut statements = Vec::with_capacity(files.len());
    for path in &files {
        let view = read_view(path)?;
        let view = dependencies
            .inline_into(&view)
            .with_context(|| format!("Failed to inline dependencies into {}", path.display()))?;

        if verbose {
            eprintln!("  {} {} ({} CTEs)", "Rendered".cyan(), path.display(), view.ctes.len());
        }

        statements.push(substitution.apply(&view.render()));
    }

    tracing::info!(environment = %env, views = statements.len(), "rendered deployment");

    if options.show {
        for statement in &statements {
            println!("{}", statement);
            println!();
        }
        return Ok(());
    }

    if settings.check {
        let prompt = format!("Are you ready to update {}?", env.label());
        let stdin = std::io::stdin();
        if !confirm(&prompt, &mut stdin.lock(), &mut std::io::stdout())? {
            println!("{}", "Aborted".yellow());
            return Ok(());
        }
    }

    let output = options
        .output
        .unwrap_or_else(|| PathBuf::from(format!("deploy-{}.sql", env)));

    std::fs::write(&output, build_script(&statements))
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "{} {} ({} views)",
        "Deployment script written to:".green(),
        output.display(),
        statements.len()
    );

    Ok(())
}

/// Every `*.sql` file directly inside `dir`, sorted by name
fn discover_sql_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "sql") {
            files.push(path.to_path_buf());
        }
    }

    Ok(files)
}

/// Reject an empty file list or paths that are not files
fn check_files(files: &[PathBuf]) -> Result<()> {
    let non_files: Vec<String> = files
        .iter()
        .filter(|path| !path.is_file())
        .map(|path| path.display().to_string())
        .collect();

    if !non_files.is_empty() {
        anyhow::bail!("Not a file: {:?}", non_files);
    }
    if files.is_empty() {
        anyhow::bail!("No files specified.");
    }
    Ok(())
}

fn read_view(path: &Path) -> Result<ViewDefinition> {
    let sql = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read SQL file {}", path.display()))?;

    ViewDefinition::parse(&sql).with_context(|| format!("Failed to parse view in {}", path.display()))
}

/// Join statements into one script, terminating each with `;`
fn build_script(statements: &[String]) -> String {
    let mut script = String::new();

    for statement in statements {
        let statement = statement.trim_end();
        script.push_str(statement);
        if !statement.ends_with(';') {
            script.push(';');
        }
        script.push_str("\n\n");
    }

    script
}

/// Ask until the answer is a prefix of `yes` or `no`; end of input means no
fn confirm(prompt: &str, input: &mut impl BufRead, out: &mut impl Write) -> Result<bool> {
    writeln!(out, "{}", prompt)?;

    loop {
        write!(out, ">> ")?;
        out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(false);
        }

        let answer = line.trim().to_lowercase();
        if answer.is_empty() {
            continue;
        }
        if "no".starts_with(&answer) {
            return Ok(false);
        }
        if "yes".starts_with(&answer) {
            return Ok(true);
        }
    }
}

/// Inspect command - print the parsed structure of one view
fn inspect_command(path: &Path, json: bool) -> Result<()> {
    let view = read_view(path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!("{} {}", "View:".bold(), view.name.green());
    println!("{} {}", "Header:".bold(), view.header);
    if !view.preamble.is_empty() {
        println!("{} {} lines", "Preamble:".bold(), view.preamble.lines().count());
    }

    println!("{} {}", "CTEs:".bold(), view.ctes.len());
    for (i, cte) in view.ctes.iter().enumerate() {
        println!("  {}. {} ({} lines)", i + 1, cte.name.yellow(), cte.body.lines().count());
    }

    println!("{}", "Body:".bold());
    println!("{}", view.body);

    Ok(())
}

struct CatOptions {
    file: PathBuf,
    patches: Vec<String>,
    categories: Vec<String>,
    start: Option<String>,
    stop: Option<String>,
    limit: Option<usize>,
    list: bool,
    check: bool,
}

/// Cat command - concatenate a range of patches from the sequence file
fn cat_command(options: &CatOptions, verbose: bool) -> Result<()> {
    let root = Path::new(".");

    let mut sequence = if options.patches.is_empty() {
        EntrySequence::load(&options.file)?
    } else {
        EntrySequence::from_patches(options.patches.iter().cloned())
    };

    if options.check {
        sequence.check(root)?;
    }

    sequence = sequence.slice(options.start.as_deref(), options.stop.as_deref())?;
    if let Some(limit) = options.limit {
        sequence = sequence.limit(limit);
    }
    sequence = sequence.filter_categories(&options.categories);

    if verbose {
        eprintln!("{} {} patches", "Selected".cyan(), sequence.filenames().count());
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if options.list {
        sequence.write_list(&mut out)?;
    } else {
        sequence.cat(root, &mut out, options.check)?;
    }

    Ok(())
}
