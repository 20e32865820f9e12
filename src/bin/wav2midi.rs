use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use std::{path::PathBuf, process, sync::Arc};
use wav2midi_core::{
    ConversionRequest, ConversionWorker, Converter, MergeTarget, ModelRegistry, PipelineEvent,
    ProcessInvoker, Settings, StemRouting,
};

#[derive(Parser)]
#[command(name = "wav2midi")]
#[command(about = "Convert a song into per-instrument MIDI files", long_about = None)]
#[command(version)]
struct Cli {
    /// Settings file (TOML). Defaults to the platform config directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Separate and transcribe one audio file
    Convert {
        #[arg(short, long)]
        input: PathBuf,

        /// Output root; results go to <output>/<song>/
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Enable 6-stem separation (guitar/piano)
        #[arg(long)]
        six_stems: bool,

        /// Re-run all separations
        #[arg(long)]
        force_separate: bool,

        /// Re-run MIDI conversion
        #[arg(long)]
        force_midi: bool,

        /// Pre-separate speech/music/effects with this model bundle first
        #[arg(long, value_name = "BUNDLE")]
        bandit: Option<String>,

        /// Pre-separation stem fed to the main separator
        #[arg(long, requires = "bandit")]
        primary_stem: Option<String>,

        /// Merge a pre-separation stem into a separated stem, e.g. speech=vocals
        #[arg(long, value_name = "STEM=TARGET", value_parser = parse_route, requires = "bandit")]
        route: Vec<(String, MergeTarget)>,

        #[arg(long)]
        models_dir: Option<PathBuf>,
    },

    /// List installed pre-separation model bundles
    Models {
        #[arg(long)]
        models_dir: Option<PathBuf>,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Convert {
            input,
            output,
            six_stems,
            force_separate,
            force_midi,
            bandit,
            primary_stem,
            route,
            models_dir,
        } => {
            let options = ConvertOptions {
                input,
                output,
                six_stems,
                force_separate,
                force_midi,
                bandit,
                primary_stem,
                route,
                models_dir,
            };
            handle_convert(cli.config, options)
        }
        Commands::Models { models_dir } => handle_models(cli.config, models_dir),
    };

    match result {
        Ok(()) => process::exit(0),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

struct ConvertOptions {
    input: PathBuf,
    output: Option<PathBuf>,
    six_stems: bool,
    force_separate: bool,
    force_midi: bool,
    bandit: Option<String>,
    primary_stem: Option<String>,
    route: Vec<(String, MergeTarget)>,
    models_dir: Option<PathBuf>,
}

fn parse_route(s: &str) -> Result<(String, MergeTarget), String> {
    let (stem, target) = s
        .split_once('=')
        .ok_or_else(|| format!("expected STEM=TARGET, got `{s}`"))?;
    let target = target.parse::<MergeTarget>().map_err(|e| e.to_string())?;
    Ok((stem.trim().to_string(), target))
}

fn load_settings(config: Option<PathBuf>, models_dir: Option<PathBuf>) -> anyhow::Result<Settings> {
    let mut settings = Settings::load_or_default(config.as_deref()).context("loading settings")?;
    if let Some(dir) = models_dir {
        settings.models_dir = dir;
    }
    Ok(settings)
}

fn handle_convert(config: Option<PathBuf>, opts: ConvertOptions) -> anyhow::Result<()> {
    if !opts.input.exists() {
        bail!("Input file not found: {}", opts.input.display());
    }

    let mut settings = load_settings(config, opts.models_dir)?;
    if let Some(out) = opts.output {
        settings.output_root = out;
    }
    let registry = ModelRegistry::discover(&settings.models_dir);

    let mut request = ConversionRequest::new(&opts.input);
    request.six_stems = opts.six_stems;
    request.force_separate = opts.force_separate;
    request.force_midi = opts.force_midi;

    if let Some(name) = opts.bandit {
        let bundle = registry.find(&name).ok_or_else(|| {
            anyhow!(
                "model bundle `{name}` not found in {}",
                settings.models_dir.display()
            )
        })?;
        let mut routing = StemRouting::from_stems(&bundle.stems);
        if let Some(stem) = &opts.primary_stem {
            routing.set_primary(stem)?;
        }
        for (stem, target) in &opts.route {
            routing.set_target(stem, *target)?;
        }
        request = request.with_bundle(name);
        request.routing = Some(routing);
    }

    eprintln!("🎵 wav2midi");
    eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    eprintln!("Input:  {}", opts.input.display());
    eprintln!("Output: {}", settings.output_root.display());
    eprintln!("Model:  {}", settings.separator_model(request.six_stems));
    eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let worker = ConversionWorker::new(Converter::new(settings, registry, Arc::new(ProcessInvoker)));
    let events = worker.start(request)?;

    for event in events {
        match event {
            PipelineEvent::Line(line) => eprintln!("{line}"),
            PipelineEvent::Finished(Ok(report)) => {
                eprintln!();
                eprintln!("✅ Conversion completed!");
                eprintln!("MIDI files:");
                for f in &report.midi_files {
                    println!("{}", f.display());
                }
                if !report.failed_stems.is_empty() {
                    eprintln!("⚠️  Failed stems: {}", report.failed_stems.join(", "));
                }
                return Ok(());
            }
            PipelineEvent::Finished(Err(e)) => return Err(e.into()),
        }
    }

    Err(anyhow!("conversion worker exited without a result"))
}

fn handle_models(config: Option<PathBuf>, models_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let settings = load_settings(config, models_dir)?;
    let registry = ModelRegistry::discover(&settings.models_dir);

    eprintln!("📋 Model bundles in {}", settings.models_dir.display());
    eprintln!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if registry.is_empty() {
        eprintln!("  (none found)");
        return Ok(());
    }

    for bundle in registry.bundles() {
        eprintln!("  • {} (type: {})", bundle.name, bundle.model_type);
        if bundle.stems.is_empty() {
            eprintln!("      no stems found in config");
            continue;
        }
        let routing = StemRouting::from_stems(&bundle.stems);
        for (stem, target) in routing.routes() {
            let marker = if stem == routing.primary() { " [input]" } else { "" };
            eprintln!("      {stem:<15} -> {target}{marker}");
        }
    }

    eprintln!();
    eprintln!("Use --bandit <name> to pre-separate with a bundle");

    Ok(())
}
