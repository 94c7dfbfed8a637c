use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::{error, info};
use simplelog::{Config, LevelFilter, WriteLogger};

use stripreader::decoder::{FileDecoder, ImageDecoder, identity_path};
use stripreader::display::{DisplaySurface, ImageAdjustments, PageView, PngSurface};
use stripreader::pagination::{PageGeometry, PaginationConfig, compute_pages};
use stripreader::panic_handler;
use stripreader::paths;
use stripreader::position;
use stripreader::session::{PageTurn, ReaderSession};
use stripreader::settings::Settings;
use stripreader::store::Preferences;

#[derive(Parser)]
#[command(
    name = "stripreader",
    version,
    about = "Read one tall scanned image as screen-sized pages"
)]
struct Cli {
    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Preferences and reading positions file
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Log debug details
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the page layout of an image
    Pages {
        image: PathBuf,
        /// Overlap to preview instead of the saved one
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        overlap: Option<u8>,
    },
    /// Open an image, move through it and render the current page
    Show {
        image: PathBuf,
        /// One-based page number to jump to
        #[arg(long, conflicts_with_all = ["next", "prev"])]
        page: Option<String>,
        #[arg(long, conflicts_with = "prev")]
        next: bool,
        #[arg(long)]
        prev: bool,
        #[arg(long, default_value = "page.png")]
        out: PathBuf,
    },
    /// Render every page into a directory
    Export {
        image: PathBuf,
        #[arg(long)]
        out_dir: PathBuf,
    },
    /// Reopen the last image at its saved page
    Resume {
        #[arg(long, default_value = "page.png")]
        out: PathBuf,
    },
    /// Set how much of each page repeats on the next, in percent
    Overlap {
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        percent: u8,
    },
    /// Change brightness, contrast or colour inversion
    Adjust {
        #[arg(long)]
        brightness: Option<f32>,
        #[arg(long)]
        contrast: Option<f32>,
        #[arg(long)]
        invert: Option<bool>,
        /// Restore neutral values
        #[arg(long, conflicts_with_all = ["brightness", "contrast", "invert"])]
        reset: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let log_path = paths::log_path()?;
    WriteLogger::init(
        level,
        Config::default(),
        File::create(&log_path).with_context(|| format!("Failed to create {log_path:?}"))?,
    )?;
    panic_handler::initialize_panic_handler();

    info!("Starting stripreader");

    let settings_path = match &cli.config {
        Some(path) => path.clone(),
        None => paths::settings_path()?,
    };
    let settings = Settings::load_or_create(&settings_path);

    let store_path = match &cli.store {
        Some(path) => path.clone(),
        None => paths::preferences_path()?,
    };
    let prefs = Preferences::load_or_ephemeral(Some(store_path.as_path()));

    let res = run(cli.command, &settings, prefs);
    if let Err(err) = &res {
        error!("Application error: {err:?}");
    }
    info!("Shutting down stripreader");
    res
}

fn run(command: Command, settings: &Settings, prefs: Preferences) -> Result<()> {
    match command {
        Command::Pages { image, overlap } => print_pages(&image, overlap, settings, &prefs),
        Command::Show {
            image,
            page,
            next,
            prev,
            out,
        } => {
            let mut session = open_session(settings, prefs);
            session.open(&FileDecoder, image.as_path())?;

            if let Some(page) = page {
                session.go_to_page_input(&page)?;
            } else if next {
                report_turn(session.next_page());
            } else if prev {
                report_turn(session.previous_page());
            }
            render_current(&mut session, &out)
        }
        Command::Export { image, out_dir } => {
            let mut session = open_session(settings, prefs);
            session.open(&FileDecoder, image.as_path())?;
            let transform = ImageAdjustments::load(session.store()).transform();
            let mut surface = PngSurface::to_directory(&out_dir);

            let total = session.total_pages();
            for index in 0..total {
                let image = session.page_image(index)?;
                let view = PageView {
                    index,
                    total,
                    rect: session.pages()[index],
                    image: &image,
                };
                surface.present(&view, &transform)?;
            }
            println!("Wrote {total} pages to {}", out_dir.display());
            Ok(())
        }
        Command::Resume { out } => {
            let Some(identity) = position::last_opened(&prefs) else {
                bail!("No image has been opened yet");
            };
            let mut session = open_session(settings, prefs);
            session.open(&FileDecoder, identity_path(&identity).as_path())?;
            render_current(&mut session, &out)
        }
        Command::Overlap { percent } => {
            let mut session = open_session(settings, prefs);
            let config = session.set_overlap(percent);
            println!("Page overlap set to {}%", config.overlap_percent());
            Ok(())
        }
        Command::Adjust {
            brightness,
            contrast,
            invert,
            reset,
        } => {
            let mut prefs = prefs;
            let mut adjustments = ImageAdjustments::load(&prefs);
            if reset {
                adjustments.reset(&mut prefs)?;
                println!("Image adjustments reset");
            } else {
                if let Some(brightness) = brightness {
                    adjustments = adjustments.with_brightness(brightness);
                }
                if let Some(contrast) = contrast {
                    adjustments = adjustments.with_contrast(contrast);
                }
                if let Some(invert) = invert {
                    adjustments = adjustments.with_invert(invert);
                }
                adjustments.save(&mut prefs)?;
            }
            println!(
                "Brightness {} | Contrast {} | Invert colors: {}",
                adjustments.brightness,
                adjustments.contrast,
                if adjustments.invert { "ON" } else { "OFF" }
            );
            Ok(())
        }
    }
}

fn open_session(settings: &Settings, prefs: Preferences) -> ReaderSession<Preferences> {
    ReaderSession::with_cache_capacity(prefs, settings.viewport(), settings.crop_cache_pages)
}

fn print_pages(
    image: &Path,
    overlap: Option<u8>,
    settings: &Settings,
    prefs: &Preferences,
) -> Result<()> {
    let source = FileDecoder.decode(image)?;
    let config = PaginationConfig::new(overlap.unwrap_or_else(|| position::saved_overlap(prefs)));
    let viewport = settings.viewport();
    let pages = compute_pages(source.size(), &viewport, config);

    if let Some(geometry) = PageGeometry::compute(source.size(), &viewport, config) {
        println!(
            "{}x{} image, scale {:.4}, page {}px, overlap {}px",
            source.width(),
            source.height(),
            geometry.scale_factor,
            geometry.page_height,
            geometry.overlap
        );
    }
    for (index, page) in pages.iter().enumerate() {
        println!(
            "{:>4}  rows {:>7}..{:<7} height {}",
            index + 1,
            page.start_y,
            page.end_y(),
            page.height
        );
    }
    println!("{} pages", pages.len());
    Ok(())
}

fn report_turn(turn: PageTurn) {
    match turn {
        PageTurn::Moved(_) => {}
        PageTurn::AtFirst => println!("First page"),
        PageTurn::AtLast => println!("Last page"),
        PageTurn::Empty => println!("Nothing to display"),
    }
}

fn render_current(session: &mut ReaderSession<Preferences>, out: &Path) -> Result<()> {
    let Some(indicator) = session.page_indicator() else {
        bail!("Image has no pages to display");
    };
    let transform = ImageAdjustments::load(session.store()).transform();
    session.present_current(&mut PngSurface::to_file(out), &transform)?;
    println!("{indicator} -> {}", out.display());
    Ok(())
}
