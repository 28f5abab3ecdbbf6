use clap::{Parser, Subcommand};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

use orgwarden::{build_enforcer, evaluate_batch, PolicySummary, RootConfig, RootError};
use orgwarden_core::{AccessRequest, SubjectDescriptor};
use orgwarden_policy::{PolicyModel, OWNER_ROLE};

/// orgwarden: multi-tenant access decisions
///
/// Answers "may this subject perform this action on this object?" against
/// a CSV policy file.
#[derive(Parser, Debug)]
#[command(name = "orgwarden", version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Override the policy file from the config
    #[arg(short, long, global = true)]
    policy: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Decide a single request. Exits 0 on allow, 2 on deny
    Check {
        #[arg(long)]
        user: String,

        #[arg(long, default_value = "")]
        team: String,

        #[arg(long, default_value = "")]
        dept: String,

        #[arg(long, default_value = "")]
        org: String,

        /// Comma-separated team memberships
        #[arg(long, value_delimiter = ',')]
        teams: Vec<String>,

        /// Comma-separated roles
        #[arg(long, value_delimiter = ',')]
        roles: Vec<String>,

        #[arg(long)]
        object: String,

        #[arg(long)]
        action: String,

        /// Print the deciding clause and tuple, then every other grant
        #[arg(long)]
        explain: bool,
    },

    /// Evaluate JSON-lines requests from a file (or stdin with "-")
    Batch { input: PathBuf },

    /// Persist the owner role edges into the policy file
    Bootstrap,

    /// Load the policy file and report what it contains
    Validate,

    /// Print the policy model
    Model,
}

const EXIT_DENY: u8 = 2;

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("orgwarden=debug,orgwarden_policy=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("orgwarden=warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<RootConfig, RootError> {
    let mut config = match &cli.config {
        Some(p) => RootConfig::load(p)?,
        None => RootConfig::load(&RootConfig::default_config_path())?,
    };
    if let Some(policy) = &cli.policy {
        config.policy_file = policy.clone();
        config.validate()?;
    }
    Ok(config)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, RootError> {
    let config = load_config(&cli)?;
    match cli.command {
        Commands::Check {
            user,
            team,
            dept,
            org,
            teams,
            roles,
            object,
            action,
            explain,
        } => {
            let subject = SubjectDescriptor::new(user)
                .with_team(team)
                .with_dept(dept)
                .with_org(org)
                .with_teams(teams)
                .with_roles(roles);
            cmd_check(&config, &subject, &object, &action, explain)
        }
        Commands::Batch { input } => cmd_batch(&config, &input),
        Commands::Bootstrap => cmd_bootstrap(&config),
        Commands::Validate => cmd_validate(&config),
        Commands::Model => {
            print!("{}", PolicyModel::default());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn cmd_check(
    config: &RootConfig,
    subject: &SubjectDescriptor,
    object: &str,
    action: &str,
    explain: bool,
) -> Result<ExitCode, RootError> {
    let enforcer = build_enforcer(config)?;
    let decision = enforcer.evaluate_explained(subject, object, action)?;
    if explain {
        println!("{}", decision);
        // one snapshot so every index resolves against the list it came from
        let snapshot = enforcer.snapshot();
        let request = AccessRequest::new(subject, object, action);
        for outcome in snapshot.all_matches(&request) {
            let Some(policy) = snapshot.policies().get(outcome.policy_index) else {
                continue;
            };
            println!("  match {} on [{}]", outcome.clause, policy);
        }
    } else {
        println!("{}", if decision.allowed { "allow" } else { "deny" });
    }
    Ok(if decision.allowed {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_DENY)
    })
}

fn cmd_batch(config: &RootConfig, input: &Path) -> Result<ExitCode, RootError> {
    let enforcer = build_enforcer(config)?;
    let stdout = std::io::stdout();
    let summary = if input.as_os_str() == "-" {
        evaluate_batch(&enforcer, std::io::stdin().lock(), stdout.lock())?
    } else {
        let file = std::fs::File::open(input)?;
        evaluate_batch(&enforcer, BufReader::new(file), stdout.lock())?
    };
    eprintln!(
        "{} allowed, {} denied, {} errors",
        summary.allowed, summary.denied, summary.errors
    );
    Ok(ExitCode::SUCCESS)
}

fn cmd_bootstrap(config: &RootConfig) -> Result<ExitCode, RootError> {
    let enforcer = build_enforcer(config)?;
    let added = enforcer.bootstrap_owner_role()?;
    let owner_edges = enforcer
        .snapshot()
        .roles()
        .permissions_of(OWNER_ROLE)
        .len();
    info!(added = added.len(), "owner bootstrap complete");
    println!(
        "owner role: {} permissions in {}",
        owner_edges,
        config.policy_file.display()
    );
    Ok(ExitCode::SUCCESS)
}

fn cmd_validate(config: &RootConfig) -> Result<ExitCode, RootError> {
    let enforcer = build_enforcer(config)?;
    let summary = PolicySummary::of(&enforcer);
    println!("Policy file OK: {}", config.policy_file.display());
    println!("  Policies:  {}", summary.policies);
    println!("  Groupings: {}", summary.groupings);
    println!("  Loaded at: {}", summary.loaded_at);
    Ok(ExitCode::SUCCESS)
}
