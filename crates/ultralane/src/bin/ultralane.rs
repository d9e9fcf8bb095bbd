use std::{fs, path::PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use ultralane::data::{
    preview_record, tusimple::read_annotation_file, LabelPipeline, PipelineConfig,
};

#[derive(Parser)]
#[command(name = "ultralane")]
#[command(about = "TuSimple label generation for row-anchor lane detection")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a TuSimple dataset into image/mask/row-encoding samples and split manifests
    Generate {
        /// Pipeline configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// TuSimple root holding the *.json annotation files
        #[arg(short, long)]
        data_root: Option<PathBuf>,

        /// Output directory
        #[arg(short, long)]
        output_root: Option<PathBuf>,

        /// Random seed for rotation angles and the split shuffle
        #[arg(long)]
        seed: Option<u64>,

        /// Fraction of samples written to train_files.txt
        #[arg(long)]
        train_ratio: Option<f64>,

        /// Skip writing row encodings (-cls.png)
        #[arg(long)]
        no_cls: bool,

        /// Skip the rotated copy of each sample
        #[arg(long)]
        no_rotation: bool,
    },

    /// Render one annotation record for visual inspection
    Preview {
        /// Annotation file (JSON Lines)
        #[arg(short, long)]
        annotation: PathBuf,

        /// 1-based line number of the record
        #[arg(short, long, default_value_t = 1)]
        line: usize,

        /// Directory the annotation's image paths are relative to
        #[arg(short, long)]
        data_root: PathBuf,

        /// Directory receiving the preview images
        #[arg(short, long)]
        output: PathBuf,

        /// TrueType font used to write lane ordinals on the display mask
        #[arg(long)]
        font: Option<PathBuf>,

        /// Pipeline configuration file (JSON) for stroke and encoder settings
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Write a default pipeline configuration
    Config {
        /// Destination file
        #[arg(short, long, default_value = "ultralane.json")]
        path: PathBuf,

        #[arg(short, long)]
        data_root: PathBuf,

        #[arg(short, long)]
        output_root: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            config,
            data_root,
            output_root,
            seed,
            train_ratio,
            no_cls,
            no_rotation,
        } => {
            let mut pipeline_config = match (config, data_root.clone(), output_root.clone()) {
                (Some(path), _, _) => PipelineConfig::load(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                (None, Some(data_root), Some(output_root)) => {
                    PipelineConfig::new(data_root, output_root)
                }
                _ => bail!("either --config or both --data-root and --output-root are required"),
            };

            if let Some(data_root) = data_root {
                pipeline_config.data_root = data_root;
            }
            if let Some(output_root) = output_root {
                pipeline_config.output_root = output_root;
            }
            if seed.is_some() {
                pipeline_config.seed = seed;
            }
            if let Some(ratio) = train_ratio {
                pipeline_config.train_ratio = ratio;
            }
            if no_cls {
                pipeline_config.build_cls_label = false;
            }
            if no_rotation {
                pipeline_config.rotation_enabled = false;
            }

            let summary = LabelPipeline::new(pipeline_config)?.run()?;
            println!(
                "{} samples from {} records ({} skipped): {} train, {} valid",
                summary.samples, summary.records, summary.skipped, summary.train, summary.valid
            );
            Ok(())
        }

        Commands::Preview {
            annotation,
            line,
            data_root,
            output,
            font,
            config,
        } => {
            let pipeline_config = match config {
                Some(path) => {
                    let mut loaded = PipelineConfig::load(&path)
                        .with_context(|| format!("loading {}", path.display()))?;
                    loaded.data_root = data_root;
                    loaded
                }
                None => PipelineConfig::new(data_root, output.clone()),
            };

            let record = read_annotation_file(&annotation)?
                .into_iter()
                .find(|(number, _)| *number == line)
                .with_context(|| format!("{} has no record on line {line}", annotation.display()))?
                .1?;

            let font = font
                .map(|path| {
                    fs::read(&path).with_context(|| format!("reading font {}", path.display()))
                })
                .transpose()?;
            let preview = preview_record(&pipeline_config, &record, font)?;

            fs::create_dir_all(&output)
                .with_context(|| format!("creating {}", output.display()))?;
            let name = record.sample_name();
            preview.overlay.save(output.join(format!("{name}-overlay.png")))?;
            preview.cls.save(output.join(format!("{name}-cls-preview.png")))?;
            preview
                .display_mask
                .save(output.join(format!("{name}-display.png")))?;

            info!(sample = %name, presence = %preview.presence.digits(), "preview written");
            Ok(())
        }

        Commands::Config {
            path,
            data_root,
            output_root,
        } => {
            PipelineConfig::new(data_root, output_root).save(&path)?;
            println!("Wrote default configuration to {}", path.display());
            Ok(())
        }
    }
}
