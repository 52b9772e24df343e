use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, instrument, warn};

use crate::acquisition::calibration::{CalibrationSet, CalibrationSource, TableCalibrationSource};
use crate::acquisition::common::{AcquisitionConfig, FrameError, ReflectanceError, Result, ScanError};
use crate::acquisition::cube::{HyperspectralCube, WhiteBalance};
use crate::acquisition::export::{CaptureSink, CaptureWriter, SavedCapture};
use crate::acquisition::protocol::command::{STOP_COMMAND, ScanRequest};
use crate::acquisition::protocol::dark::DarkFrameSet;
use crate::acquisition::protocol::frame::{DataFrame, Frame, HeaderFrame};
use crate::acquisition::protocol::geometry::ScanGeometry;
use crate::acquisition::protocol::source::LineSource;
use crate::acquisition::radiometry::RadiometricConverter;
use crate::acquisition::reflectance::{ReflectanceCalibrator, ReflectanceReference};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AwaitingHeader,
    Accumulating,
    /// Cancellation observed, synthetic terminator in progress
    Stopping,
}

/// Cell written by the most recent light frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameProgress {
    pub pan_index: usize,
    pub tilt_index: usize,
    pub percent: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanSummary {
    pub cells_written: usize,
    pub frames_skipped: usize,
    /// Files written by the capture sink, if the session has one
    pub saved: Option<SavedCapture>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    Completed(ScanSummary),
    /// Cancelled; the cube was discarded and nothing was saved
    Stopped,
}

/// Result of one unit of work
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Line consumed without producing anything worth yielding for
    Continue,
    FrameWritten(FrameProgress),
    /// Dark frame long enough that a live host should get control back
    LongDark { integration_time: i64 },
    /// Scan finished; the session is back to `Idle`
    Done(ScanOutcome),
}

/// Cancellation flag that can be shared with another thread or an event handler.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Drives one scan at a time over a line source.
///
/// The same state machine serves live transports and saved captures; the only difference
/// is the optional capture sink chosen at construction. Frame-level problems are absorbed
/// and counted, structural ones (calibration, geometry, transport) are returned and put
/// the session back to `Idle`.
pub struct AcquisitionSession<S: LineSource, C: CalibrationSource = TableCalibrationSource> {
    source: S,
    calibration_source: C,
    sink: Option<Box<dyn CaptureSink>>,
    config: AcquisitionConfig,
    state: SessionState,
    stop: StopHandle,
    stop_sent: bool,
    calibration: Option<Arc<CalibrationSet>>,
    converter: Option<RadiometricConverter>,
    cube: Option<HyperspectralCube>,
    dark: DarkFrameSet,
    reflectance: ReflectanceCalibrator,
    raw_lines: Vec<String>,
    frames_skipped: usize,
}

impl<S: LineSource> AcquisitionSession<S, TableCalibrationSource> {
    /// Session over a live device: calibration from the configured tables, completed scans
    /// saved under the configured directory.
    pub fn live(source: S, config: AcquisitionConfig) -> Self {
        let sink = CaptureWriter::new(&config);
        Self::with_table_calibration(source, config).with_sink(sink)
    }

    /// Session over a saved capture; nothing is written back to disk.
    pub fn replay(source: S, config: AcquisitionConfig) -> Self {
        Self::with_table_calibration(source, config)
    }

    fn with_table_calibration(source: S, config: AcquisitionConfig) -> Self {
        let calibration_source =
            TableCalibrationSource::new(config.calibration_table.clone(), config.sensitivity_table.clone());
        Self::new(source, calibration_source, config)
    }
}

impl<S: LineSource, C: CalibrationSource> AcquisitionSession<S, C> {
    pub fn new(source: S, calibration_source: C, config: AcquisitionConfig) -> Self {
        Self {
            source,
            calibration_source,
            sink: None,
            config,
            state: SessionState::Idle,
            stop: StopHandle::default(),
            stop_sent: false,
            calibration: None,
            converter: None,
            cube: None,
            dark: DarkFrameSet::new(),
            reflectance: ReflectanceCalibrator::new(),
            raw_lines: Vec::new(),
            frames_skipped: 0,
        }
    }

    pub fn with_sink(mut self, sink: impl CaptureSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Validates the request and sends the scan-start command.
    #[instrument(skip(self, request))]
    pub fn start_scan(&mut self, request: &ScanRequest) -> Result<()> {
        self.ensure_idle()?;
        let command = request.command(self.config.pixels)?;
        self.source.send_command(&command)?;
        info!(command = %command, "Scan started");
        self.begin(SessionState::AwaitingHeader);
        Ok(())
    }

    /// Prepares to read a saved capture; no command is sent.
    pub fn begin_replay(&mut self) -> Result<()> {
        self.ensure_idle()?;
        info!("Replaying capture");
        self.begin(SessionState::AwaitingHeader);
        Ok(())
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.state != SessionState::Idle {
            return Err(ScanError::InvalidState(format!("scan already in progress ({:?})", self.state)));
        }
        Ok(())
    }

    fn begin(&mut self, state: SessionState) {
        self.stop.reset();
        self.stop_sent = false;
        self.raw_lines.clear();
        self.frames_skipped = 0;
        self.state = state;
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Cancels the running scan and tells the device to stop right away. The scan itself
    /// ends on the next `step`. Stops raised through a `StopHandle` from elsewhere send the
    /// command at that point instead.
    pub fn request_stop(&mut self) -> Result<()> {
        if self.state == SessionState::Idle {
            return Ok(());
        }
        self.stop.request_stop();
        self.send_stop()
    }

    fn send_stop(&mut self) -> Result<()> {
        if self.stop_sent {
            return Ok(());
        }
        if let Err(e) = self.source.send_command(STOP_COMMAND) {
            return Err(self.fail(e));
        }
        self.stop_sent = true;
        Ok(())
    }

    /// Consumes exactly one line, or the pending cancellation.
    pub fn step(&mut self) -> Result<Step> {
        if self.state == SessionState::Idle {
            return Err(ScanError::InvalidState("no scan in progress".to_string()));
        }

        if self.stop.is_stop_requested() {
            self.state = SessionState::Stopping;
            info!("Stop requested, terminating scan");
            self.send_stop()?;
            return self.finish();
        }

        let line = match self.source.next_line() {
            Ok(Some(line)) => line,
            Ok(None) => {
                return Err(self.fail(ScanError::Transport("line source ended before terminator".to_string())));
            }
            Err(e) => return Err(self.fail(e)),
        };

        let decoded = Frame::decode(&line, self.spectral_bins());
        if matches!(decoded, Ok(Frame::Header(_))) {
            self.raw_lines.clear();
        }
        self.raw_lines.push(line);

        match decoded {
            Ok(Frame::Header(header)) => match self.accept_header(&header) {
                Ok(()) => Ok(Step::Continue),
                Err(e) => Err(self.fail(e)),
            },
            Ok(Frame::Dark(frame)) => Ok(self.record_dark(frame)),
            Ok(Frame::Light(frame)) => Ok(self.record_light(frame)),
            Ok(Frame::Heartbeat { tag }) => {
                debug!(tag, "Heartbeat");
                Ok(Step::Continue)
            }
            Ok(Frame::Terminator) => self.finish(),
            Err(FrameError::BeforeHeader) => {
                debug!("Ignoring data line before scan header");
                Ok(Step::Continue)
            }
            Err(e) => Ok(self.skip(e)),
        }
    }

    /// Cooperative mode: runs until a frame is written, a long dark is seen or the scan ends.
    pub fn process_one_frame(&mut self) -> Result<Step> {
        loop {
            match self.step()? {
                Step::Continue => continue,
                step => return Ok(step),
            }
        }
    }

    /// Tight loop mode.
    pub fn run_to_completion(&mut self) -> Result<ScanOutcome> {
        loop {
            if let Step::Done(outcome) = self.step()? {
                return Ok(outcome);
            }
        }
    }

    fn spectral_bins(&self) -> Option<usize> {
        match self.state {
            SessionState::Accumulating => self.cube.as_ref().map(|cube| cube.geometry().spectral_bins),
            _ => None,
        }
    }

    #[instrument(skip(self, header), fields(unit = header.unit_id, boxcar = header.boxcar_width))]
    fn accept_header(&mut self, header: &HeaderFrame) -> Result<()> {
        let geometry = ScanGeometry::from_header(header, self.config.pixels)?;

        let calibration = match &self.calibration {
            Some(calibration) if calibration.unit_id == header.unit_id => Arc::clone(calibration),
            _ => {
                let calibration = Arc::new(self.calibration_source.load(header.unit_id, self.config.pixels)?);
                self.calibration = Some(Arc::clone(&calibration));
                calibration
            }
        };

        let wavelengths = calibration.boxcar_wavelengths(geometry.boxcar_width);
        let converter = RadiometricConverter::new(calibration, &geometry, self.config.base_integration_offset);
        info!(
            pan_count = geometry.pan_count,
            tilt_count = geometry.tilt_count,
            spectral_bins = geometry.spectral_bins,
            "Scan header accepted"
        );
        self.cube = Some(HyperspectralCube::new(geometry, wavelengths)?);
        self.converter = Some(converter);
        self.dark.clear();
        self.reflectance.clear();
        self.frames_skipped = 0;
        self.state = SessionState::Accumulating;
        Ok(())
    }

    fn record_dark(&mut self, frame: DataFrame) -> Step {
        let integration_time = frame.integration_time;
        if self.dark.push(integration_time, frame.counts) {
            debug!(integration_time, "Dark sequence restarted");
        }
        if integration_time > self.config.long_dark_threshold {
            Step::LongDark { integration_time }
        } else {
            Step::Continue
        }
    }

    fn record_light(&mut self, frame: DataFrame) -> Step {
        // Light frames only decode once a header has set up both.
        let (Some(cube), Some(converter)) = (self.cube.as_mut(), self.converter.as_ref()) else {
            return Step::Continue;
        };
        let darks = &self.dark;

        let written = cube
            .geometry()
            .index_of(frame.pan, frame.tilt)
            .and_then(|(pan_index, tilt_index)| {
                if cube.is_written(pan_index, tilt_index) {
                    return Err(FrameError::AlreadyWritten {
                        pan: frame.pan,
                        tilt: frame.tilt,
                    });
                }
                let conversion = converter.convert(&frame, darks)?;
                cube.write(
                    tilt_index,
                    pan_index,
                    &conversion.spectrum,
                    &conversion.sums,
                    frame.saturation > 0,
                    frame.saturation as f64,
                )?;
                Ok(FrameProgress {
                    pan_index,
                    tilt_index,
                    percent: cube.geometry().progress_percent(pan_index, tilt_index),
                })
            });

        match written {
            Ok(progress) => Step::FrameWritten(progress),
            Err(e) => self.skip(e),
        }
    }

    fn skip(&mut self, error: FrameError) -> Step {
        self.frames_skipped += 1;
        match error {
            FrameError::Malformed { .. } => debug!(%error, "Skipping frame"),
            _ => warn!(%error, "Skipping frame"),
        }
        Step::Continue
    }

    fn finish(&mut self) -> Result<Step> {
        if self.state == SessionState::Stopping {
            self.cube = None;
            self.converter = None;
            self.raw_lines.clear();
            self.state = SessionState::Idle;
            self.stop.reset();
            self.stop_sent = false;
            info!("Scan stopped, capture discarded");
            return Ok(Step::Done(ScanOutcome::Stopped));
        }

        let accumulating = self.state == SessionState::Accumulating;
        self.state = SessionState::Idle;
        // A cube left over from an earlier scan is not this scan's capture.
        let Some(cube) = self.cube.as_ref().filter(|_| accumulating) else {
            warn!("Terminator received before any scan header");
            return Ok(Step::Done(ScanOutcome::Completed(ScanSummary {
                cells_written: 0,
                frames_skipped: self.frames_skipped,
                saved: None,
            })));
        };

        let saved = match self.sink.as_mut() {
            Some(sink) => Some(sink.persist(&self.raw_lines, cube)?),
            None => None,
        };
        let summary = ScanSummary {
            cells_written: cube.cells_written(),
            frames_skipped: self.frames_skipped,
            saved,
        };
        info!(
            cells_written = summary.cells_written,
            frames_skipped = summary.frames_skipped,
            "Scan complete"
        );
        Ok(Step::Done(ScanOutcome::Completed(summary)))
    }

    fn fail(&mut self, error: ScanError) -> ScanError {
        warn!(%error, state = ?self.state, "Scan aborted");
        self.state = SessionState::Idle;
        self.stop.reset();
        self.stop_sent = false;
        error
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &AcquisitionConfig {
        &self.config
    }

    /// Cube of the current or most recently completed scan.
    pub fn cube(&self) -> Option<&HyperspectralCube> {
        self.cube.as_ref()
    }

    pub fn calibration(&self) -> Option<&CalibrationSet> {
        self.calibration.as_deref()
    }

    pub fn dark_frames(&self) -> &DarkFrameSet {
        &self.dark
    }

    /// Lines received since the current scan's header, header included.
    pub fn raw_lines(&self) -> &[String] {
        &self.raw_lines
    }

    pub fn reflectance(&self) -> &ReflectanceCalibrator {
        &self.reflectance
    }

    pub fn arm_reflectance(
        &mut self,
        x: usize,
        y: usize,
        target_percent: f64,
    ) -> std::result::Result<&ReflectanceReference, ReflectanceError> {
        self.reflectance.arm(self.cube.as_ref(), x, y, target_percent)
    }

    pub fn clear_reflectance(&mut self) {
        self.reflectance.clear();
    }

    pub fn white_balance(&self) -> WhiteBalance {
        self.reflectance.white_balance()
    }
}
