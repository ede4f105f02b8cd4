#![forbid(unsafe_code)]

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use dxil_profile::TargetOptions;
use dxil_root_signature::{deserialize, print_root_signature, words_from_le_bytes};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "dxil-tool",
    about = "Inspect DirectX shader profiles and serialized root signatures."
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a shader profile (e.g. `ps_6_0`) to its target triple
    Profile {
        /// Profile token, `<stage>_<major>_<minor>`
        token: String,

        /// DXIL validator version, `<major>.<minor>`
        #[arg(long, value_name = "VERSION")]
        validator_version: Option<String>,

        /// Fail instead of falling back to defaults on invalid values
        #[arg(long, action = clap::ArgAction::SetTrue)]
        strict: bool,
    },
    /// Decode a root signature blob (little-endian 32-bit words) and print it
    RootSignature {
        /// Path to the serialized root signature
        path: PathBuf,

        /// Print even if the decoded signature fails validation
        #[arg(long, action = clap::ArgAction::SetTrue)]
        no_validate: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    run(Args::parse())
}

fn run(args: Args) -> anyhow::Result<()> {
    match args.command {
        Command::Profile {
            token,
            validator_version,
            strict,
        } => profile(token, validator_version, strict),
        Command::RootSignature { path, no_validate } => root_signature(path, no_validate),
    }
}

fn profile(token: String, validator_version: Option<String>, strict: bool) -> anyhow::Result<()> {
    let mut options = TargetOptions::default().with_profile(token);
    options.validator_version = validator_version;
    let resolved = options.resolve();

    for diagnostic in &resolved.diagnostics {
        eprintln!("warning: {diagnostic}");
    }
    if strict && resolved.has_diagnostics() {
        bail!(
            "{} invalid option value(s); refusing to fall back to defaults",
            resolved.diagnostics.len()
        );
    }

    println!("triple: {}", resolved.triple);
    match &resolved.profile {
        Some(profile) => {
            println!("stage: {}", profile.stage());
            println!("shader model: {}.{}", profile.major(), profile.minor());
        }
        None => println!("stage: unknown"),
    }
    println!("validator: {}", resolved.validator_version);
    Ok(())
}

fn root_signature(path: PathBuf, no_validate: bool) -> anyhow::Result<()> {
    let bytes = fs::read(&path).with_context(|| format!("read {}", path.display()))?;
    let words = words_from_le_bytes(&bytes)
        .with_context(|| format!("{} is not a sequence of 32-bit words", path.display()))?;
    let desc = deserialize(&words).context("decode root signature")?;
    tracing::debug!(
        parameters = desc.parameters.len(),
        static_samplers = desc.static_samplers.len(),
        ranges = desc.descriptor_ranges.len(),
        "decoded root signature"
    );
    if !no_validate {
        desc.validate().context("validate root signature")?;
    }
    println!("{}", print_root_signature(&desc));
    Ok(())
}
