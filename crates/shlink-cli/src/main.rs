mod manifest;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use miette::{Context, IntoDiagnostic};

use shlink_ir::Stage;
use shlink_linker::{Program, link_program};

use crate::manifest::{Manifest, load_limits};

/// shlink: multi-stage shader program linker
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Program manifest (TOML)
    manifest: PathBuf,

    /// Implementation limits (TOML), overriding the manifest's
    #[arg(long)]
    limits: Option<PathBuf>,

    /// Require both a vertex and a fragment shader
    #[arg(long)]
    api_es2: bool,

    /// Report uniform component overruns as warnings
    #[arg(long)]
    lenient_uniform_limits: bool,

    /// Dump each linked stage to stdout
    #[arg(long)]
    dump_ir: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    env_logger::init_from_env(env_logger::Env::new().default_filter_or(filter));

    // 1. Load the manifest and its shaders.
    let manifest = Manifest::load(&cli.manifest)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to load {}", cli.manifest.display()))?;
    let base_dir = cli.manifest.parent().unwrap_or(Path::new("."));
    let (mut program, mut options) = manifest.into_program(base_dir).into_diagnostic()?;

    // 2. Command-line overrides.
    if let Some(path) = &cli.limits {
        options.limits = load_limits(path).into_diagnostic()?;
    }
    options.api_es2 |= cli.api_es2;
    options.skip_strict_max_uniform_limit_check |= cli.lenient_uniform_limits;

    // 3. Link.
    link_program(&mut program, &options);

    let log = program.info_log.to_string();
    if !log.is_empty() {
        eprint!("{log}");
    }
    if !program.link_status {
        return Err(miette::miette!(
            "link failed with {} error(s)",
            program.info_log.error_count()
        ));
    }

    // 4. Report.
    print_summary(&program);
    if cli.dump_ir {
        for stage in Stage::ALL {
            if let Some(shader) = program.linked_shader(stage) {
                println!("; {} shader", stage.name());
                println!("{}", shlink_ir::dump_shader(shader));
            }
        }
    }

    Ok(())
}

fn print_summary(program: &Program) {
    let stages: Vec<_> = Stage::ALL
        .into_iter()
        .filter(|&s| program.linked_shader(s).is_some())
        .map(Stage::name)
        .collect();
    println!(
        "linked version {}{} program: {}",
        program.version,
        if program.is_es { " es" } else { "" },
        stages.join(", ")
    );

    for uniform in &program.uniforms {
        let location = match (uniform.location, &uniform.block) {
            (Some(loc), _) => format!("location {loc}"),
            (None, Some(block)) => format!("block {block}"),
            (None, None) => "-".to_string(),
        };
        println!("  uniform {} {}: {location}", uniform.ty, uniform.name);
    }
    for block in &program.uniform_blocks {
        println!("  uniform block {} ({} bytes)", block.name, block.data_size);
    }
    for captured in &program.captured_varyings {
        println!(
            "  captured {} {}: buffer {} offset {}",
            captured.ty, captured.name, captured.buffer, captured.offset
        );
    }
}
