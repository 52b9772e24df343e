mod cli;

use std::fs::{File, OpenOptions};
use std::io::BufReader;

use anyhow::{Context, Result, bail};
use clap::Parser;
use hyperspec_scan_rs::acquisition::cube::render;
use hyperspec_scan_rs::acquisition::export::{StandardTiffWriter, TiffWriter, export_spectrum};
use hyperspec_scan_rs::acquisition::{
    AcquisitionConfig, AcquisitionSession, CaptureReplay, ScanOutcome, SpectrumKind, Step,
    StreamTransport,
};
use hyperspec_scan_rs::logger::{self, debug, info, warn};

use cli::{Cli, Command, ReplayArgs, ScanArgs};

fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.verbose {
        logger::init_with_default("debug");
    } else {
        logger::init();
    }

    info!("Starting hyperspec_scan...");

    match &cli.command {
        Command::Replay(args) => replay(&cli, args),
        Command::Scan(args) => scan(&cli, args),
    }
}

fn replay(cli: &Cli, args: &ReplayArgs) -> Result<()> {
    let config = AcquisitionConfig::builder()
        .calibration_table(&cli.calibration)
        .sensitivity_table(&cli.sensitivity)
        .compression(args.compression.into())
        .build();
    debug!(?config, "Replay configuration");

    let source = CaptureReplay::open(&args.file)?;
    let mut session = AcquisitionSession::replay(source, config);
    session.begin_replay()?;
    let outcome = session
        .run_to_completion()
        .with_context(|| format!("replaying {}", args.file.display()))?;
    report(&outcome);

    if let Some(cell) = &args.reference {
        let reference = session.arm_reflectance(cell[0], cell[1], args.reference_percent)?;
        info!(cell = ?reference.cell, target = reference.target_percent, "Reflectance reference set");
    }

    let Some(cube) = session.cube() else {
        bail!("{} contains no scan header", args.file.display());
    };

    if let Some(cell) = &args.spectrum {
        let (x, y) = (cell[0], cell[1]);
        let Some(spectrum) = cube.read_spectrum(x, y) else {
            bail!("cell ({x}, {y}) is outside the {:?} scan", cube.shape());
        };
        let (kind, values) = if session.reflectance().is_armed() {
            (SpectrumKind::Reflectance, session.reflectance().apply(spectrum))
        } else {
            (SpectrumKind::Radiance, spectrum.to_vec())
        };
        // Exports land next to the capture file, named after it.
        let stem = args.file.with_extension("");
        let path = export_spectrum(&stem, kind, (x, y), &args.label, cube.wavelengths(), &values)?;
        if let Some((wavelength, value)) = cube.peak(x, y) {
            info!(wavelength, value, "Spectrum peak");
        }
        info!("Spectrum written to {}", path.display());
    }

    if let Some(path) = &args.export_srgb {
        let image = render(cube, args.preview.into(), &session.white_balance(), args.brightness);
        let mut output = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        StandardTiffWriter.write_rgb_tiff(&image, &mut output, session.config().compression)?;
        info!("Preview written to {}", path.display());
    }

    Ok(())
}

fn scan(cli: &Cli, args: &ScanArgs) -> Result<()> {
    let config = AcquisitionConfig::builder()
        .calibration_table(&cli.calibration)
        .sensitivity_table(&cli.sensitivity)
        .save_dir(&args.save_dir)
        .save_label(&args.label)
        .compression(args.compression.into())
        .build();
    debug!(?config, "Scan configuration");

    let request = args.request();
    let (pan_count, tilt_count) = request.grid_dimensions()?;
    info!(pan_count, tilt_count, "Scan grid");

    let device = OpenOptions::new()
        .read(true)
        .write(true)
        .open(&args.device)
        .with_context(|| format!("opening {}", args.device.display()))?;
    let reader = BufReader::new(device.try_clone()?);
    let mut session = AcquisitionSession::live(StreamTransport::new(reader, device), config);

    session.start_scan(&request)?;
    info!("Scan started on {}", args.device.display());

    loop {
        match session.process_one_frame()? {
            Step::FrameWritten(progress) => info!(
                pan = progress.pan_index,
                tilt = progress.tilt_index,
                "{}% complete",
                progress.percent
            ),
            Step::LongDark { integration_time } => {
                info!(integration_time, "Long dark frame received")
            }
            Step::Done(outcome) => {
                report(&outcome);
                return Ok(());
            }
            Step::Continue => {}
        }
    }
}

fn report(outcome: &ScanOutcome) {
    match outcome {
        ScanOutcome::Completed(summary) => {
            info!(
                cells_written = summary.cells_written,
                frames_skipped = summary.frames_skipped,
                "Scan complete"
            );
            if let Some(saved) = &summary.saved {
                info!("Capture saved to {}", saved.csv_path.display());
                info!("Image saved to {}", saved.image_path.display());
            }
        }
        ScanOutcome::Stopped => warn!("Scan stopped before completion"),
    }
}
