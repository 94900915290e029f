use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;

use colored::Colorize;
use hotpatch_core::{
    verify_container, GenerationResult, GeneratorConfig, GeneratorSettings, Outcome,
    PatchGenerator, TracingObserver,
};
use hotpatch_crypto::{SigningKey, VerifyingKey};
use hotpatch_pack::{PatchManifest, PatchReader};
use hotpatch_types::ErrorKind;
use tracing::warn;

use crate::cli::*;

/// Run one command and return the process exit code.
pub fn run_command(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Command::Generate(args) => cmd_generate(args, cli.format),
        Command::Inspect(args) => cmd_inspect(args, cli.format),
        Command::Verify(args) => cmd_verify(args, cli.format),
        Command::Keygen(args) => cmd_keygen(args),
    }
}

fn fail(kind: ErrorKind, message: impl std::fmt::Display) -> i32 {
    eprintln!("{} {} [{}]: {}", "✗".red().bold(), kind.description(), kind.code(), message);
    kind.exit_code()
}

fn settings_from(args: &GenerateArgs) -> anyhow::Result<GeneratorSettings> {
    let mut settings = match &args.config {
        Some(path) => GeneratorSettings::from_file(path)?,
        None => GeneratorSettings::default(),
    };
    if let Some(mode) = args.mode {
        settings.mode = mode;
    }
    if let Some(engine) = args.engine {
        settings.engine = engine;
    }
    if let Some(secs) = args.timeout_secs {
        settings.timeout_secs = Some(secs);
    }
    if let Some(dir) = &args.work_dir {
        settings.work_dir = Some(dir.clone());
    }
    if let Some(key) = &args.signing_key {
        settings.signing_key = Some(key.clone());
    }
    if args.no_sidecar {
        settings.write_sidecar_manifest = false;
    }
    if let Some(description) = &args.description {
        settings.description = Some(description.clone());
    }
    Ok(settings)
}

fn cmd_generate(args: GenerateArgs, format: OutputFormat) -> anyhow::Result<i32> {
    let settings = match settings_from(&args) {
        Ok(settings) => settings,
        Err(e) => return Ok(fail(ErrorKind::Unknown, e)),
    };
    let config = GeneratorConfig::new(&args.base, &args.new, &args.output).with_settings(settings);
    let generator = match PatchGenerator::new(config) {
        Ok(generator) => Arc::new(generator.with_observer(Arc::new(TracingObserver))),
        Err(e) => return Ok(fail(e.kind(), e)),
    };

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(async {
        let mut handle = Arc::clone(&generator).spawn()?;
        let result = tokio::select! {
            joined = &mut handle => joined?,
            _ = tokio::signal::ctrl_c() => {
                warn!("interrupt received, cancelling");
                generator.cancel();
                handle.await?
            }
        };
        anyhow::Ok(result)
    })?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => print_generation(&result),
    }
    Ok(result.exit_code())
}

fn print_generation(result: &GenerationResult) {
    match &result.outcome {
        Outcome::Completed => {
            let path = result
                .patch_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            println!("{} Patch written to {}", "✓".green().bold(), path.bold());
            println!("  Changes: {}", result.summary);
            println!(
                "  Size: {} bytes ({:.1}% of new package)",
                result.patch_size,
                result.compression_ratio * 100.0
            );
            if let Some(manifest) = &result.manifest {
                println!("  Patch id: {}", manifest.patch_id.cyan());
                println!("  SHA-256: {}", manifest.sha256.dimmed());
            }
            if result.signed {
                println!("  Signed: {}", "yes".green());
            }
        }
        Outcome::NoChanges => {
            println!("{} No changes between packages; no patch written", "✓".green().bold());
        }
        Outcome::Cancelled => {
            println!("{} Generation cancelled", "!".yellow().bold());
        }
        Outcome::Failed { kind, message } => {
            fail(*kind, message);
            return;
        }
    }
    println!("  Elapsed: {:.2}s", result.elapsed.as_secs_f64());
}

fn cmd_inspect(args: InspectArgs, format: OutputFormat) -> anyhow::Result<i32> {
    let mut reader = match PatchReader::open(&args.patch) {
        Ok(reader) => reader,
        Err(e) => return Ok(fail(e.kind(), e)),
    };
    let (manifest, entries) = match reader.manifest().and_then(|m| Ok((m, reader.entries()?))) {
        Ok(found) => found,
        Err(e) => return Ok(fail(e.kind(), e)),
    };

    match format {
        OutputFormat::Json => {
            let doc = serde_json::json!({ "manifest": manifest, "entries": entries });
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        OutputFormat::Text => {
            print_manifest(&manifest);
            println!("Entries:");
            for entry in &entries {
                let storage = entry.storage.map(|s| s.to_string()).unwrap_or_else(|| "?".into());
                println!(
                    "  {:<8} {:>10} {:>10}  {}",
                    storage,
                    entry.size,
                    entry.compressed_size,
                    entry.name
                );
            }
        }
    }
    Ok(0)
}

fn print_manifest(manifest: &PatchManifest) {
    println!("Patch {}", manifest.patch_id.yellow().bold());
    println!(
        "  {} ({}) -> {} ({})",
        manifest.base_version, manifest.base_version_code, manifest.target_version, manifest.target_version_code
    );
    println!("  Mode: {}", manifest.patch_mode.to_string().cyan());
    println!("  Created: {}", manifest.created_at.to_rfc3339());
    if let Some(description) = &manifest.description {
        println!("  Description: {description}");
    }
    let changes = &manifest.changes;
    for (label, domain) in [
        ("code", &changes.code),
        ("containers", &changes.code_containers),
        ("resources", &changes.resources),
        ("assets", &changes.assets),
    ] {
        println!(
            "  {:<10} {}~ {}+ {}-",
            label,
            domain.modified.len(),
            domain.added.len(),
            domain.deleted.len()
        );
    }
}

fn cmd_verify(args: VerifyArgs, format: OutputFormat) -> anyhow::Result<i32> {
    let key = match VerifyingKey::from_hex(&args.public_key) {
        Ok(key) => key,
        Err(e) => return Ok(fail(ErrorKind::SigningKeyInvalid, e)),
    };
    match verify_container(&args.patch, &key) {
        Ok(record) => {
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
                OutputFormat::Text => {
                    println!("{} Signature valid", "✓".green().bold());
                    println!("  Public key: {}", record.public_key.cyan());
                    println!("  Digest: {}", record.digest.dimmed());
                }
            }
            Ok(0)
        }
        Err(e) => Ok(fail(e.kind(), e)),
    }
}

fn cmd_keygen(args: KeygenArgs) -> anyhow::Result<i32> {
    let key = SigningKey::generate();
    let mut options = OpenOptions::new();
    options.write(true);
    if args.force {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }
    let mut file = match options.open(&args.out) {
        Ok(file) => file,
        Err(e) => {
            let kind = ErrorKind::from_io(&e, ErrorKind::FileWriteFailed);
            return Ok(fail(kind, format!("{}: {e}", args.out.display())));
        }
    };
    writeln!(file, "{}", key.to_hex())?;
    println!("{} Signing key written to {}", "✓".green().bold(), args.out.display());
    println!("  Public key: {}", key.verifying_key().to_hex().cyan());
    Ok(0)
}
