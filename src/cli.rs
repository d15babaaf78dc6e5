use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "relorch")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Coordinated release of routings, MBOMs and baselines", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// PLM database file
    #[arg(long, global = true, env = "RELORCH_DB")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show the release plan and readiness for an item
    Plan(PlanArgs),

    /// Release an item's routings, MBOMs and baselines
    Execute(ExecuteArgs),

    /// List release rulesets by kind
    Rulesets {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage electronic signatures
    #[command(subcommand)]
    Esign(EsignCommand),

    /// Seed the database from a TOML fixture
    Import {
        /// Fixture file
        path: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Plan / Execute
// ============================================================================

#[derive(Args)]
pub struct LimitArgs {
    /// Maximum routings considered
    #[arg(long)]
    pub routing_limit: Option<u32>,

    /// Maximum MBOMs considered
    #[arg(long)]
    pub mbom_limit: Option<u32>,

    /// Maximum baselines considered
    #[arg(long)]
    pub baseline_limit: Option<u32>,
}

#[derive(Args)]
pub struct PlanArgs {
    /// Root item id
    pub item: String,

    /// Skip routings
    #[arg(long)]
    pub no_routings: bool,

    /// Skip MBOMs
    #[arg(long)]
    pub no_mboms: bool,

    /// Skip baselines
    #[arg(long)]
    pub no_baselines: bool,

    /// Release ruleset id
    #[arg(short, long)]
    pub ruleset: Option<String>,

    #[command(flatten)]
    pub limits: LimitArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ExecuteArgs {
    /// Root item id
    pub item: String,

    /// Skip routings
    #[arg(long)]
    pub no_routings: bool,

    /// Skip MBOMs
    #[arg(long)]
    pub no_mboms: bool,

    /// Include baselines
    #[arg(long)]
    pub baselines: bool,

    /// Release ruleset id
    #[arg(short, long)]
    pub ruleset: Option<String>,

    /// Report what would happen without changing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Reopen released artifacts if the run aborts
    #[arg(long)]
    pub rollback_on_failure: bool,

    /// Keep going past blocked or failed steps
    #[arg(long)]
    pub continue_on_error: bool,

    /// Relax baseline diagnostics (never bypasses e-sign)
    #[arg(long)]
    pub baseline_force: bool,

    /// Fail the release matching this key (requires failpoints enabled)
    #[arg(long = "failpoint", value_name = "KEY")]
    pub failpoints: Vec<String>,

    #[command(flatten)]
    pub limits: LimitArgs,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// ============================================================================
// E-sign Commands
// ============================================================================

#[derive(Subcommand)]
pub enum EsignCommand {
    /// Show manifest completeness for an item
    Status {
        /// Item id
        item: String,

        /// Item generation (defaults to current)
        #[arg(short, long)]
        generation: Option<u32>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create the signature manifest for an item generation
    Manifest {
        /// Item id
        item: String,

        /// Item generation (defaults to current)
        #[arg(short, long)]
        generation: Option<u32>,

        /// Required signature as MEANING or MEANING:ROLE
        #[arg(long = "require", value_name = "MEANING[:ROLE]")]
        required: Vec<String>,

        /// Optional signature as MEANING or MEANING:ROLE
        #[arg(long = "optional", value_name = "MEANING[:ROLE]")]
        optional: Vec<String>,
    },

    /// Sign an item generation
    Sign {
        /// Item id
        item: String,

        /// Signature meaning (e.g. approved, reviewed)
        meaning: String,

        /// Who signs
        #[arg(long)]
        signer: String,

        /// Reason for signing
        #[arg(long)]
        reason: Option<String>,

        /// Item generation (defaults to current)
        #[arg(short, long)]
        generation: Option<u32>,
    },

    /// Revoke a signature
    Revoke {
        /// Signature id
        signature: i64,
    },

    /// Re-check the hashes of a signature
    Verify {
        /// Signature id
        signature: i64,
    },
}
