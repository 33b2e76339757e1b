use burst_gallery::config::{self, GalleryConfig};
use burst_gallery::gallery::{Gallery, GalleryChange, GalleryObserver};
use burst_gallery::{logging, output};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "burst-gallery")]
#[command(about = "Browse and maintain a directory of captured photo bursts")]
#[command(long_about = "\
Browse and maintain a directory of captured photo bursts

Each burst (stack) is an index file plus one image and one thumbnail per
frame, all in the gallery directory:

  DCIM/fcam/
  ├── img_0003.xml          # stack index, newest shown first
  ├── img_0003_00.jpg       # frame 0, full resolution
  ├── thumb_0003_00.jpg     # frame 0 thumbnail
  └── img_0001.xml          # an older stack

Thumbnails are decoded in the background and a luma histogram is computed
for each frame.

Run 'burst-gallery gen-config' to generate a documented config file.")]
#[command(version)]
struct Cli {
    /// Config file (missing file means defaults)
    #[arg(long, default_value = "burst-gallery.toml", global = true)]
    config: PathBuf,

    /// Gallery directory, overriding the config file
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load the gallery and print every stack
    List {
        /// Print a JSON snapshot instead of the text listing
        #[arg(long)]
        json: bool,
        /// Give up waiting for thumbnails after this many seconds
        #[arg(long, default_value_t = 60)]
        timeout_secs: u64,
    },
    /// Delete a stack's index, images, and thumbnails
    Delete {
        /// Index file name, e.g. img_0003.xml
        name: String,
    },
    /// Refresh periodically and print every change
    Watch {
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
    },
    /// Print a stock config file with all options documented
    GenConfig,
}

/// Forwards gallery changes to the printer thread.
struct ChangeForwarder {
    tx: mpsc::Sender<GalleryChange>,
}

impl GalleryObserver for ChangeForwarder {
    fn on_gallery_change(&self, change: &GalleryChange) {
        let _ = self.tx.send(change.clone());
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match &cli.command {
        Command::List { json, timeout_secs } => {
            list(&open_gallery(&cli)?, *json, Duration::from_secs(*timeout_secs))?
        }
        Command::Delete { name } => delete(&open_gallery(&cli)?, name)?,
        Command::Watch { interval_ms } => {
            watch(&open_gallery(&cli)?, Duration::from_millis(*interval_ms))?
        }
        Command::GenConfig => print!("{}", config::stock_config_toml()),
    }

    Ok(())
}

/// Resolve config, start logging, and open the gallery it names.
fn open_gallery(cli: &Cli) -> Result<Gallery, Box<dyn std::error::Error>> {
    let config = resolve_config(cli)?;
    logging::init_tracing(&config.logging.level);
    Ok(Gallery::open(&config)?)
}

fn list(gallery: &Gallery, json: bool, timeout: Duration) -> Result<(), Box<dyn std::error::Error>> {
    let report = gallery.refresh();
    if !gallery.wait_idle(timeout) {
        tracing::warn!(pending = gallery.pending_jobs(), "timed out waiting for thumbnails");
    }
    let stacks = gallery.stacks();
    if json {
        let snapshot = output::gallery_snapshot(&stacks);
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        for line in output::format_refresh(&report) {
            println!("{}", line);
        }
        output::print_gallery(&stacks);
    }
    Ok(())
}

fn delete(gallery: &Gallery, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    gallery.refresh();
    let (position, _) = gallery.find_stack(name).ok_or_else(|| {
        format!(
            "no stack named {name} in {}",
            gallery.gallery_dir().display()
        )
    })?;
    let summary = gallery.delete_stack(position)?;
    output::print_removal(name, &summary);
    Ok(())
}

/// Refresh every `interval` and print each change. Runs until interrupted.
fn watch(gallery: &Gallery, interval: Duration) -> Result<(), Box<dyn std::error::Error>> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        for change in rx {
            println!("{}", output::format_change(&change));
        }
    });
    gallery.add_observer(Arc::new(ChangeForwarder { tx }))?;

    println!("==> Watching {}", gallery.gallery_dir().display());
    loop {
        let report = gallery.refresh();
        if report.changed() || !report.skipped.is_empty() {
            for line in output::format_refresh(&report) {
                println!("{}", line);
            }
        }
        std::thread::sleep(interval);
    }
}

/// Load the config file and apply command-line overrides.
fn resolve_config(cli: &Cli) -> Result<GalleryConfig, config::ConfigError> {
    let mut config = config::load_config(&cli.config)?;
    if let Some(dir) = &cli.dir {
        config.gallery.dir = dir.clone();
    }
    config.validate()?;
    Ok(config)
}
