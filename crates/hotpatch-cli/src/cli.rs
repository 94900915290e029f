use std::path::PathBuf;

use clap::error::ErrorKind as ClapErrorKind;
use clap::{Args, Parser, Subcommand};
use hotpatch_core::GenerateError;
use hotpatch_types::{EngineKind, PatchMode};

#[derive(Parser)]
#[command(
    name = "hotpatch",
    about = "Generate minimal, reconstructable patches between two package versions",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build a patch from a base and a new package
    Generate(GenerateArgs),
    /// Show the manifest and entries of a patch
    Inspect(InspectArgs),
    /// Check a patch signature against a public key
    Verify(VerifyArgs),
    /// Create an Ed25519 signing key
    Keygen(KeygenArgs),
}

#[derive(Args)]
pub struct GenerateArgs {
    /// Base package (zip or exploded directory)
    #[arg(long)]
    pub base: PathBuf,
    /// New package (zip or exploded directory)
    #[arg(long)]
    pub new: PathBuf,
    /// Patch file to write
    #[arg(short, long)]
    pub output: PathBuf,
    /// Hex-encoded Ed25519 secret key file
    #[arg(long)]
    pub signing_key: Option<PathBuf>,
    /// auto, primary, or native-accelerated
    #[arg(long)]
    pub engine: Option<EngineKind>,
    /// full-code-selection or byte-diff
    #[arg(long)]
    pub mode: Option<PatchMode>,
    /// TOML settings file; flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub timeout_secs: Option<u64>,
    #[arg(long)]
    pub work_dir: Option<PathBuf>,
    /// Do not write `<output>.json`
    #[arg(long)]
    pub no_sidecar: bool,
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Args)]
pub struct InspectArgs {
    pub patch: PathBuf,
}

#[derive(Args)]
pub struct VerifyArgs {
    pub patch: PathBuf,
    /// Hex-encoded Ed25519 public key
    #[arg(long)]
    pub public_key: String,
}

#[derive(Args)]
pub struct KeygenArgs {
    /// Where to write the secret key
    pub out: PathBuf,
    /// Overwrite an existing key file
    #[arg(long)]
    pub force: bool,
}

/// Exit code for a rejected command line: 0 for help and version output,
/// the invalid-configuration code for usage errors.
pub fn parse_exit_code(err: &clap::Error) -> i32 {
    match err.kind() {
        ClapErrorKind::DisplayHelp
        | ClapErrorKind::DisplayVersion
        | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => 0,
        _ => GenerateError::InvalidConfig(err.to_string()).kind().exit_code(),
    }
}
