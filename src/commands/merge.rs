//! Merge command implementation
//!
//! Loads the templates named on the command line (or in a manifest), merges
//! them and writes the result. Conflicts are reported on stderr as
//! `ERROR: <description>` lines; they only affect the exit code under
//! `--strict`.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use log::info;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use heat_merge::config::{self, Manifest, MergeOptions};
use heat_merge::filesystem::DiskFS;
use heat_merge::template::merge::merge;
use heat_merge::template::scaling::ScaleRule;

/// Output serialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Yaml,
    Json,
}

/// Arguments for the merge command
#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Templates to merge, in order
    #[arg(value_name = "TEMPLATE")]
    pub templates: Vec<PathBuf>,

    /// Manifest file listing templates and merge options
    #[arg(short, long, value_name = "FILE")]
    pub manifest: Option<PathBuf>,

    /// Role that slave roles are merged into
    #[arg(long, value_name = "ROLE")]
    pub master_role: Option<String>,

    /// Roles to merge into the master role
    #[arg(long, value_name = "ROLE", num_args = 1..)]
    pub slave_roles: Vec<String>,

    /// Directory that FileInclude paths are relative to
    #[arg(long, value_name = "DIR", env = "HEAT_MERGE_INCLUDED_TEMPLATE_DIR")]
    pub included_template_dir: Option<PathBuf>,

    /// Where to write the merged template ("-" for stdout)
    #[arg(short, long, value_name = "PATH", default_value = "-")]
    pub output: PathBuf,

    /// Scale resources starting with PREFIX to COUNT copies (repeatable)
    #[arg(long = "scale", value_name = "PREFIX=COUNT")]
    pub scale: Vec<ScaleRule>,

    /// Route server images through per-role <Role>Image parameters
    #[arg(long)]
    pub change_image_params: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
    pub format: OutputFormat,

    /// Exit with an error if any conflict was found
    #[arg(long)]
    pub strict: bool,
}

/// Execute the merge command
pub fn execute(args: MergeArgs) -> Result<()> {
    let manifest = match &args.manifest {
        Some(path) => config::from_file(path)
            .with_context(|| format!("Failed to load manifest {}", path.display()))?,
        None => Manifest::default(),
    };

    let templates = if args.templates.is_empty() {
        manifest.templates.clone()
    } else {
        args.templates.clone()
    };
    let options = build_options(&args, &manifest)?;

    info!("Merging {} template(s)", templates.len());
    let outcome = merge(&templates, &options, &DiskFS)?;

    let rendered = match args.format {
        OutputFormat::Yaml => outcome.document.to_yaml_string()?,
        OutputFormat::Json => outcome.document.to_json_string()?,
    };
    write_output(&args.output, &rendered)?;

    outcome.report_conflicts(&mut io::stderr().lock())?;
    if args.strict && outcome.has_conflicts() {
        anyhow::bail!("{} merge conflict(s) found", outcome.conflicts.len());
    }
    Ok(())
}

/// Combine manifest options with command-line flags. Flags win.
fn build_options(args: &MergeArgs, manifest: &Manifest) -> Result<MergeOptions> {
    let mut options = manifest.options()?;

    if let Some(master) = &args.master_role {
        options.master_role = Some(master.clone());
    }
    if !args.slave_roles.is_empty() {
        options.slave_roles = args.slave_roles.clone();
    }
    if let Some(dir) = &args.included_template_dir {
        options.included_template_dir = dir.clone();
    }
    for rule in &args.scale {
        options.scaling.insert(rule.clone());
    }
    options.change_image_params |= args.change_image_params;

    Ok(options)
}

fn write_output(path: &Path, content: &str) -> Result<()> {
    if path == Path::new("-") {
        let mut stdout = io::stdout().lock();
        stdout.write_all(content.as_bytes())?;
        stdout.flush()?;
        return Ok(());
    }
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write output to {}", path.display()))?;
    info!("Wrote merged template to {}", path.display());
    Ok(())
}
