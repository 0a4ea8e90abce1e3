use clap::Parser;
use eframe::egui;
use log::info;
use multiviewer::MultiViewerApp;

#[derive(Parser)]
#[command(name = "multiviewer", about = "Multi-stream video wall viewer")]
struct Args {
    /// Start in the administration screen instead of the viewer
    #[arg(long)]
    admin: bool,
}

fn setup_logging() -> Result<(), fern::InitError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(log::LevelFilter::Info)
        .chain(std::io::stdout())
        .chain(fern::log_file("multiviewer.log")?)
        .apply()?;
    Ok(())
}

fn main() -> eframe::Result<()> {
    if let Err(e) = setup_logging() {
        eprintln!("failed to set up logging: {e}");
    }

    let args = Args::parse();

    #[cfg(feature = "gstreamer")]
    if let Err(e) = gstreamer::init() {
        log::error!("failed to initialize media backend: {e}");
    }

    info!("Starting MultiViewer");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1200.0, 800.0]),
        ..Default::default()
    };

    if args.admin {
        eframe::run_native(
            "MultiViewer Administration",
            options,
            Box::new(|_cc| Ok(Box::new(MultiViewerApp::admin()))),
        )
    } else {
        eframe::run_native(
            "MultiViewer",
            options,
            Box::new(|_cc| Ok(Box::new(MultiViewerApp::viewer()))),
        )
    }
}
