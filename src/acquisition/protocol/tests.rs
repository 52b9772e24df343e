use std::cell::RefCell;
use std::io::{Cursor, Write};
use std::rc::Rc;

use approx::assert_relative_eq;

use super::*;
use crate::acquisition::common::{AcquisitionConfig, FrameError, ScanError};
use crate::acquisition::test_support::{
    self, MissingCalibrationSource, RecordedCapture, RecordingSink, StaticCalibrationSource, VecLineSource,
    data_line, header_line,
};

const PIXELS: usize = 8;

type TestSession = AcquisitionSession<VecLineSource, StaticCalibrationSource>;

struct Harness {
    session: TestSession,
    captures: Rc<RefCell<Vec<RecordedCapture>>>,
    sent: Rc<RefCell<Vec<String>>>,
    loads: Rc<std::cell::Cell<usize>>,
}

fn config() -> AcquisitionConfig {
    AcquisitionConfig::builder().pixels(PIXELS).build()
}

fn harness_with(source: VecLineSource, pixels: usize) -> Harness {
    let sent = source.sent.clone();
    let calibration = StaticCalibrationSource::new(test_support::linear_calibration(pixels, 400.0, 2.0));
    let loads = calibration.loads.clone();
    let sink = RecordingSink::default();
    let captures = sink.captures.clone();
    let config = AcquisitionConfig::builder().pixels(pixels).build();
    Harness {
        session: AcquisitionSession::new(source, calibration, config).with_sink(sink),
        captures,
        sent,
        loads,
    }
}

fn harness(lines: Vec<String>) -> Harness {
    harness_with(VecLineSource::new(lines), PIXELS)
}

/// 3x3 grid at steps of 2, boxcar 1
fn small_header() -> String {
    header_line(1, (0, 4, 2), (0, 4, 2), 1)
}

fn counts(value: f64) -> Vec<f64> {
    vec![value; PIXELS]
}

fn completed(outcome: ScanOutcome) -> ScanSummary {
    match outcome {
        ScanOutcome::Completed(summary) => summary,
        ScanOutcome::Stopped => panic!("scan was stopped"),
    }
}

#[test]
fn test_decode_terminator_regardless_of_suffix() {
    assert_eq!(Frame::decode("x", None), Ok(Frame::Terminator));
    assert_eq!(Frame::decode("xdone,1,2", Some(4)), Ok(Frame::Terminator));
}

#[test]
fn test_decode_header_fields() {
    let frame = Frame::decode("h,7,-100,100,20,-50,50,10,100,3,500", None).unwrap();

    assert_eq!(
        frame,
        Frame::Header(HeaderFrame {
            unit_id: 7,
            pan_start: -100,
            pan_stop: 100,
            pan_step: 20,
            tilt_start: -50,
            tilt_stop: 50,
            tilt_step: 10,
            boxcar_width: 3,
            dark_repeat: Some(500),
        })
    );
}

#[test]
fn test_decode_header_without_dark_repeat() {
    let Frame::Header(header) = Frame::decode("h,7,0,10,2,0,10,2,100,1", None).unwrap() else {
        panic!("expected header");
    };
    assert_eq!(header.dark_repeat, None);
    assert_eq!(header.boxcar_width, 1);
}

#[test]
fn test_decode_short_header_is_malformed() {
    assert!(matches!(
        Frame::decode("h,7,0,10", None),
        Err(FrameError::Malformed { expected: 10, found: 4 })
    ));
}

#[test]
fn test_decode_data_before_header() {
    assert_eq!(Frame::decode("0,0,1,1000,0,1,2", None), Err(FrameError::BeforeHeader));
}

#[test]
fn test_decode_wrong_field_count_is_malformed() {
    assert_eq!(
        Frame::decode("0,0,1", Some(PIXELS)),
        Err(FrameError::Malformed {
            expected: PIXELS + 5,
            found: 3
        })
    );
}

#[test]
fn test_decode_frame_tags() {
    let dark = data_line(2, 4, 0, 1000, 0, &counts(5.0));
    let light = data_line(2, 4, 1, 1000, 3, &counts(7.0));

    let Frame::Dark(frame) = Frame::decode(&dark, Some(PIXELS)).unwrap() else {
        panic!("expected dark frame");
    };
    assert_eq!((frame.pan, frame.tilt, frame.integration_time), (2, 4, 1000));
    assert_eq!(frame.counts, counts(5.0));

    let Frame::Light(frame) = Frame::decode(&light, Some(PIXELS)).unwrap() else {
        panic!("expected light frame");
    };
    assert_eq!(frame.saturation, 3);

    for tag in [2, 9] {
        let line = data_line(0, 0, tag, 1000, 0, &counts(0.0));
        assert_eq!(Frame::decode(&line, Some(PIXELS)), Ok(Frame::Heartbeat { tag }));
    }
}

#[test]
fn test_decode_rejects_non_numeric_counts() {
    let line = format!("0,0,1,1000,0,{}", vec!["abc"; PIXELS].join(","));
    assert!(matches!(Frame::decode(&line, Some(PIXELS)), Err(FrameError::InvalidField(_))));
}

#[test]
fn test_dark_sequence_resets_on_shorter_integration() {
    let mut darks = DarkFrameSet::new();
    let restarts: Vec<bool> = [100, 200, 300, 50, 150]
        .into_iter()
        .map(|time| darks.push(time, vec![time as f64]))
        .collect();

    assert_eq!(restarts, vec![true, false, false, true, false]);
    assert_eq!(darks.integration_times(), vec![50, 150]);
    assert_eq!(darks.find(150), Some(&[150.0][..]));
    assert_eq!(darks.find(300), None);
}

#[test]
fn test_dark_equal_integration_time_does_not_reset() {
    let mut darks = DarkFrameSet::new();
    darks.push(100, vec![1.0]);
    darks.push(100, vec![2.0]);

    assert_eq!(darks.len(), 2);
    // First exact match wins.
    assert_eq!(darks.find(100), Some(&[1.0][..]));
}

#[test]
fn test_degrees_to_steps() {
    assert_eq!(degrees_to_steps(90.0), 512);
    assert_eq!(degrees_to_steps(-90.0), -512);
    assert_eq!(degrees_to_steps(1.0), 5);
    assert_eq!(degrees_to_steps(-1.0), -5);
    assert_eq!(clamp_degrees(135.0), MAX_DEGREES);
    assert_eq!(clamp_degrees(-135.0), -MAX_DEGREES);
}

#[test]
fn test_default_scan_command() {
    let command = ScanRequest::default().command(288).unwrap();
    assert_eq!(command, "h-341,341,170,-341,341,170,2000000,2,120000,");
}

#[test]
fn test_scan_command_clamps_range() {
    let request = ScanRequest::builder()
        .pan(-120.0, 45.0)
        .tilt(0.0, 200.0)
        .pan_resolution(9.0)
        .tilt_resolution(9.0)
        .max_integration_ms(50)
        .boxcar_width(1)
        .dark_repeat_s(5)
        .build();

    assert_eq!(request.command(288).unwrap(), "h-512,256,51,0,512,51,50000,1,5000,");
}

#[test]
fn test_grid_dimensions() {
    assert_eq!(ScanRequest::default().grid_dimensions().unwrap(), (5, 5));
}

#[test]
fn test_inverted_range_is_invalid_geometry() {
    let request = ScanRequest::builder().pan(30.0, -30.0).build();

    assert!(matches!(request.command(288), Err(ScanError::InvalidGeometry(_))));
    assert!(matches!(request.grid_dimensions(), Err(ScanError::InvalidGeometry(_))));
}

#[test]
fn test_zero_resolution_is_invalid_geometry() {
    let request = ScanRequest::builder().tilt_resolution(0.1).build();
    assert!(matches!(request.command(288), Err(ScanError::InvalidGeometry(_))));
}

#[test]
fn test_boxcar_width_must_fit_sensor() {
    for width in [0, 289] {
        let request = ScanRequest::builder().boxcar_width(width).build();
        assert!(matches!(request.command(288), Err(ScanError::InvalidGeometry(_))));
    }
}

#[test]
fn test_spectral_bin_count_is_ceiling() {
    for width in 1..=288 {
        assert_eq!(spectral_bin_count(288, width), (288 + width - 1) / width);
    }
    assert_eq!(spectral_bin_count(288, 5), 58);
}

#[test]
fn test_geometry_indexing() {
    let header = HeaderFrame {
        unit_id: 1,
        pan_start: -10,
        pan_stop: 10,
        pan_step: 5,
        tilt_start: 0,
        tilt_stop: 6,
        tilt_step: 3,
        boxcar_width: 4,
        dark_repeat: None,
    };
    let geometry = ScanGeometry::from_header(&header, 288).unwrap();

    assert_eq!((geometry.pan_count, geometry.tilt_count), (5, 3));
    assert_eq!(geometry.spectral_bins, 72);
    assert_eq!(geometry.index_of(5, 6), Ok((3, 2)));
    assert_eq!(geometry.pan_position(3), 5);
    assert_eq!(geometry.tilt_position(2), 6);
    assert_eq!(geometry.index_of(15, 0), Err(FrameError::OutOfRange { pan: 15, tilt: 0 }));
    assert_eq!(geometry.index_of(0, -3), Err(FrameError::OutOfRange { pan: 0, tilt: -3 }));
    assert_eq!(geometry.progress_percent(0, 0), 0);
    assert_eq!(geometry.progress_percent(4, 1), 60);
}

#[test]
fn test_geometry_rejects_zero_step() {
    let header = HeaderFrame {
        unit_id: 1,
        pan_start: 0,
        pan_stop: 10,
        pan_step: 0,
        tilt_start: 0,
        tilt_stop: 10,
        tilt_step: 2,
        boxcar_width: 1,
        dark_repeat: None,
    };
    assert!(matches!(
        ScanGeometry::from_header(&header, 288),
        Err(ScanError::InvalidGeometry(_))
    ));
}

#[test]
fn test_geometry_rejects_corrupt_header_ranges() {
    for line in [
        "h,1,-9223372036854775808,9223372036854775807,1,0,4,2,0,1,0",
        "h,1,0,4000000000,1,0,4000000000,1,0,1,0",
        "h,1,-512,513,1,0,4,2,0,1,0",
    ] {
        let Ok(Frame::Header(header)) = Frame::decode(line, None) else {
            panic!("{line} did not decode as a header");
        };
        assert!(
            matches!(ScanGeometry::from_header(&header, 288), Err(ScanError::InvalidGeometry(_))),
            "{line}"
        );
    }
}

#[test]
fn test_geometry_accepts_full_gimbal_sweep() {
    let Ok(Frame::Header(header)) = Frame::decode("h,1,-512,512,1,-512,512,1,0,288,0", None) else {
        panic!("full sweep did not decode as a header");
    };
    let geometry = ScanGeometry::from_header(&header, 288).unwrap();

    assert_eq!((geometry.pan_count, geometry.tilt_count), (MAX_AXIS_CELLS, MAX_AXIS_CELLS));
    assert_eq!(geometry.index_of(i64::MIN, 0), Err(FrameError::OutOfRange { pan: i64::MIN, tilt: 0 }));
}

#[test]
fn test_end_to_end_scan_is_persisted() {
    let pixels = 288;
    let lines = vec![
        "h,1,0,10,2,0,10,2,100,1,500".to_string(),
        data_line(0, 0, 0, 1000, 0, &vec![0.0; pixels]),
        data_line(0, 0, 1, 1000, 0, &vec![1000.0; pixels]),
        "x".to_string(),
    ];
    let mut h = harness_with(VecLineSource::new(lines), pixels);
    h.session.begin_replay().unwrap();

    assert_eq!(h.session.step().unwrap(), Step::Continue);
    assert_eq!(h.session.state(), SessionState::Accumulating);
    assert_eq!(h.session.cube().unwrap().shape(), (6, 6, pixels));

    assert_eq!(h.session.step().unwrap(), Step::Continue);
    assert_eq!(
        h.session.step().unwrap(),
        Step::FrameWritten(FrameProgress {
            pan_index: 0,
            tilt_index: 0,
            percent: 0
        })
    );

    // Display row 0 holds the highest tilt, which has not been measured.
    let cube = h.session.cube().unwrap();
    assert!(cube.read_spectrum(0, 5).unwrap().iter().all(|&value| value == 0.0));
    // (1000 - 0) / (1.0 * (1000 + 550)) with unit sensitivity and identity linearization
    for &value in cube.read_spectrum(0, 0).unwrap() {
        assert_relative_eq!(value, 1000.0 / 1550.0, epsilon = 1e-9);
    }
    assert!(h.captures.borrow().is_empty());

    let Step::Done(outcome) = h.session.step().unwrap() else {
        panic!("terminator should finish the scan");
    };
    let summary = completed(outcome);
    assert_eq!(summary.cells_written, 1);
    assert_eq!(summary.frames_skipped, 0);
    assert!(summary.saved.is_some());
    assert_eq!(h.session.state(), SessionState::Idle);

    let captures = h.captures.borrow();
    assert_eq!(captures.len(), 1);
    assert_eq!(captures[0].shape, (6, 6, pixels));
    assert_eq!(captures[0].raw_lines.len(), 4);
    assert_eq!(captures[0].raw_lines[3], "x");
}

#[test]
fn test_light_equal_to_dark_is_zero_radiance() {
    let mut h = harness(vec![
        small_header(),
        data_line(2, 2, 0, 1000, 0, &counts(420.0)),
        data_line(2, 2, 1, 1000, 0, &counts(420.0)),
        "x".to_string(),
    ]);
    h.session.begin_replay().unwrap();
    completed(h.session.run_to_completion().unwrap());

    let cube = h.session.cube().unwrap();
    assert!(cube.is_written(1, 1));
    assert!(cube.read_spectrum(1, 1).unwrap().iter().all(|&value| value == 0.0));
}

#[test]
fn test_start_scan_sends_command() {
    let mut h = harness(vec![small_header(), "x".to_string()]);
    h.session.start_scan(&ScanRequest::default()).unwrap();

    assert_eq!(h.session.state(), SessionState::AwaitingHeader);
    assert_eq!(h.sent.borrow().as_slice(), ["h-341,341,170,-341,341,170,2000000,2,120000,"]);

    let err = h.session.start_scan(&ScanRequest::default()).unwrap_err();
    assert!(matches!(err, ScanError::InvalidState(_)));
}

#[test]
fn test_invalid_request_never_leaves_idle() {
    let mut h = harness(vec![]);
    let request = ScanRequest::builder().tilt(40.0, -40.0).build();

    assert!(matches!(h.session.start_scan(&request), Err(ScanError::InvalidGeometry(_))));
    assert_eq!(h.session.state(), SessionState::Idle);
    assert!(h.sent.borrow().is_empty());
}

#[test]
fn test_step_requires_active_scan() {
    let mut h = harness(vec![small_header()]);
    assert!(matches!(h.session.step(), Err(ScanError::InvalidState(_))));
}

#[test]
fn test_cancellation_discards_scan() {
    let mut h = harness(vec![
        small_header(),
        data_line(0, 0, 0, 1000, 0, &counts(0.0)),
        data_line(0, 0, 1, 1000, 0, &counts(100.0)),
        data_line(2, 0, 1, 1000, 0, &counts(100.0)),
        "x".to_string(),
    ]);
    h.session.start_scan(&ScanRequest::default()).unwrap();
    assert!(matches!(h.session.process_one_frame().unwrap(), Step::FrameWritten(_)));

    let stop = h.session.stop_handle();
    stop.request_stop();
    assert_eq!(h.session.step().unwrap(), Step::Done(ScanOutcome::Stopped));

    assert_eq!(h.session.state(), SessionState::Idle);
    assert!(h.session.cube().is_none());
    assert!(h.captures.borrow().is_empty());
    assert_eq!(h.sent.borrow().last().map(String::as_str), Some(STOP_COMMAND));
    assert!(!stop.is_stop_requested());
}

#[test]
fn test_request_stop_sends_command_before_next_read() {
    let source = VecLineSource::new(vec![
        small_header(),
        data_line(0, 0, 0, 200_000, 0, &counts(0.0)),
        data_line(0, 0, 1, 200_000, 0, &counts(100.0)),
        "x".to_string(),
    ]);
    let reads = source.reads.clone();
    let mut h = harness_with(source, PIXELS);
    h.session.start_scan(&ScanRequest::default()).unwrap();
    assert!(matches!(h.session.process_one_frame().unwrap(), Step::LongDark { .. }));
    let reads_before_stop = reads.get();

    h.session.request_stop().unwrap();

    assert_eq!(reads.get(), reads_before_stop);
    assert_eq!(h.sent.borrow().last().map(String::as_str), Some(STOP_COMMAND));

    assert_eq!(h.session.step().unwrap(), Step::Done(ScanOutcome::Stopped));
    assert_eq!(reads.get(), reads_before_stop);
    let stops = h.sent.borrow().iter().filter(|command| *command == STOP_COMMAND).count();
    assert_eq!(stops, 1);
    assert!(h.captures.borrow().is_empty());
}

#[test]
fn test_request_stop_while_idle_sends_nothing() {
    let mut h = harness(vec!["x".to_string()]);

    h.session.request_stop().unwrap();

    assert!(h.sent.borrow().is_empty());
    assert_eq!(h.session.state(), SessionState::Idle);
}

#[test]
fn test_malformed_line_is_skipped() {
    let mut h = harness(vec![
        small_header(),
        data_line(0, 0, 0, 1000, 0, &counts(0.0)),
        "0,0,1".to_string(),
        "x".to_string(),
    ]);
    h.session.begin_replay().unwrap();
    let summary = completed(h.session.run_to_completion().unwrap());

    assert_eq!(summary.cells_written, 0);
    assert_eq!(summary.frames_skipped, 1);
    let cube = h.session.cube().unwrap();
    assert!(!cube.is_written(0, 0));
    assert!(cube.read_spectrum(0, 0).unwrap().iter().all(|&value| value == 0.0));
    assert_eq!(h.captures.borrow().len(), 1);
}

#[test]
fn test_light_without_matching_dark_is_skipped() {
    let mut h = harness(vec![
        small_header(),
        data_line(0, 0, 0, 1000, 0, &counts(0.0)),
        data_line(0, 0, 1, 2000, 0, &counts(100.0)),
        data_line(2, 0, 1, 1000, 0, &counts(100.0)),
        "x".to_string(),
    ]);
    h.session.begin_replay().unwrap();
    let summary = completed(h.session.run_to_completion().unwrap());

    assert_eq!(summary.cells_written, 1);
    assert_eq!(summary.frames_skipped, 1);
    assert!(!h.session.cube().unwrap().is_written(0, 0));
    assert!(h.session.cube().unwrap().is_written(1, 0));
}

#[test]
fn test_repeated_and_out_of_range_cells_are_skipped() {
    let mut h = harness(vec![
        small_header(),
        data_line(0, 0, 0, 1000, 0, &counts(0.0)),
        data_line(0, 0, 1, 1000, 0, &counts(100.0)),
        data_line(0, 0, 1, 1000, 0, &counts(900.0)),
        data_line(40, 0, 1, 1000, 0, &counts(100.0)),
        "x".to_string(),
    ]);
    h.session.begin_replay().unwrap();
    let summary = completed(h.session.run_to_completion().unwrap());

    assert_eq!(summary.cells_written, 1);
    assert_eq!(summary.frames_skipped, 2);
    let first = h.session.cube().unwrap().read_spectrum(0, 0).unwrap()[0];
    assert_relative_eq!(first, 100.0 / 1550.0, epsilon = 1e-9);
}

#[test]
fn test_heartbeat_and_pre_header_lines_are_ignored() {
    let mut h = harness(vec![
        data_line(0, 0, 1, 1000, 0, &counts(100.0)),
        small_header(),
        data_line(0, 0, 2, 0, 0, &counts(0.0)),
        "x".to_string(),
    ]);
    h.session.begin_replay().unwrap();
    let summary = completed(h.session.run_to_completion().unwrap());

    assert_eq!(summary.frames_skipped, 0);
    assert_eq!(summary.cells_written, 0);
}

#[test]
fn test_saturation_is_recorded() {
    let mut h = harness(vec![
        small_header(),
        data_line(0, 0, 0, 1000, 0, &counts(0.0)),
        data_line(0, 0, 1, 1000, 12, &counts(100.0)),
        "x".to_string(),
    ]);
    h.session.begin_replay().unwrap();
    h.session.run_to_completion().unwrap();

    let projections = h.session.cube().unwrap().projections();
    // Tilt index 0 sits on the bottom display row.
    assert_eq!(projections.saturated.get(2, 0), Some(true));
    assert_eq!(projections.saturation_magnitude.get(2, 0), Some(12.0));
    assert_eq!(projections.saturated.get(0, 0), Some(false));
}

#[test]
fn test_long_dark_yields_in_cooperative_mode() {
    let mut h = harness(vec![
        small_header(),
        data_line(0, 0, 0, 150_000, 0, &counts(0.0)),
        data_line(0, 0, 1, 150_000, 0, &counts(10.0)),
        "x".to_string(),
    ]);
    h.session.begin_replay().unwrap();

    assert_eq!(
        h.session.process_one_frame().unwrap(),
        Step::LongDark {
            integration_time: 150_000
        }
    );
    assert!(matches!(h.session.process_one_frame().unwrap(), Step::FrameWritten(_)));
    assert!(matches!(h.session.process_one_frame().unwrap(), Step::Done(_)));
}

#[test]
fn test_end_of_stream_before_terminator_is_transport_error() {
    let mut h = harness(vec![small_header(), data_line(0, 0, 0, 1000, 0, &counts(0.0))]);
    h.session.begin_replay().unwrap();

    assert!(matches!(h.session.run_to_completion(), Err(ScanError::Transport(_))));
    assert_eq!(h.session.state(), SessionState::Idle);
    assert!(h.captures.borrow().is_empty());
}

#[test]
fn test_transport_failure_returns_to_idle() {
    let source = VecLineSource::new(vec![small_header()]).failing_when_empty();
    let mut h = harness_with(source, PIXELS);
    h.session.begin_replay().unwrap();

    let err = h.session.run_to_completion().unwrap_err();
    assert!(matches!(err, ScanError::Transport(message) if message == "device disconnected"));
    assert_eq!(h.session.state(), SessionState::Idle);
    assert!(h.captures.borrow().is_empty());
}

#[test]
fn test_calibration_failure_aborts_scan() {
    let source = VecLineSource::new(vec![small_header(), "x".to_string()]);
    let mut session = AcquisitionSession::new(source, MissingCalibrationSource, config());
    session.begin_replay().unwrap();

    assert!(matches!(session.step(), Err(ScanError::Calibration(_))));
    assert_eq!(session.state(), SessionState::Idle);
    assert!(session.cube().is_none());
}

#[test]
fn test_invalid_header_geometry_aborts_scan() {
    let mut h = harness(vec![header_line(1, (10, 0, 2), (0, 4, 2), 1), "x".to_string()]);
    h.session.begin_replay().unwrap();

    assert!(matches!(h.session.step(), Err(ScanError::InvalidGeometry(_))));
    assert_eq!(h.session.state(), SessionState::Idle);
}

#[test]
fn test_corrupt_header_is_rejected_without_saving() {
    for header in [
        "h,1,-9223372036854775808,9223372036854775807,1,0,4,2,0,1,0",
        "h,1,0,4000000000,1,0,4000000000,1,0,1,0",
    ] {
        let mut h = harness(vec![header.to_string(), "x".to_string()]);
        h.session.begin_replay().unwrap();

        assert!(matches!(h.session.run_to_completion(), Err(ScanError::InvalidGeometry(_))));
        assert_eq!(h.session.state(), SessionState::Idle);
        assert!(h.session.cube().is_none());
        assert!(h.captures.borrow().is_empty());
    }
}

#[test]
fn test_calibration_loaded_once_per_unit() {
    let scan = |unit: u32| vec![header_line(unit, (0, 4, 2), (0, 4, 2), 1), "x".to_string()];
    let lines: Vec<String> = [scan(1), scan(1), scan(2)].concat();
    let mut h = harness(lines);

    for expected_loads in [1, 1, 2] {
        h.session.begin_replay().unwrap();
        h.session.run_to_completion().unwrap();
        assert_eq!(h.loads.get(), expected_loads);
    }
    assert_eq!(h.session.calibration().map(|calibration| calibration.unit_id), Some(2));
}

#[test]
fn test_second_header_starts_fresh_scan() {
    let mut h = harness(vec![
        small_header(),
        data_line(0, 0, 0, 1000, 0, &counts(0.0)),
        data_line(0, 0, 1, 1000, 0, &counts(100.0)),
        header_line(1, (0, 2, 2), (0, 6, 2), 2),
        data_line(0, 0, 1, 1000, 0, &counts(100.0)[..4]),
        "x".to_string(),
    ]);
    h.session.begin_replay().unwrap();
    let summary = completed(h.session.run_to_completion().unwrap());

    // The dark set was cleared with the new header.
    assert!(h.session.dark_frames().is_empty());
    assert_eq!(summary.cells_written, 0);
    assert_eq!(summary.frames_skipped, 1);
    assert_eq!(h.session.cube().unwrap().shape(), (4, 2, 4));
    assert_eq!(h.captures.borrow()[0].raw_lines.len(), 3);
}

#[test]
fn test_terminator_before_header_does_not_save_previous_cube() {
    let mut h = harness(vec![
        small_header(),
        data_line(0, 0, 0, 1000, 0, &counts(0.0)),
        data_line(0, 0, 1, 1000, 0, &counts(100.0)),
        "x".to_string(),
        "x".to_string(),
    ]);
    h.session.begin_replay().unwrap();
    completed(h.session.run_to_completion().unwrap());

    h.session.begin_replay().unwrap();
    let summary = completed(h.session.run_to_completion().unwrap());

    assert_eq!(summary.cells_written, 0);
    assert_eq!(summary.saved, None);
    assert_eq!(h.captures.borrow().len(), 1);
    assert_eq!(h.session.state(), SessionState::Idle);
}

#[test]
fn test_new_header_clears_reflectance_reference() {
    let mut h = harness(vec![
        small_header(),
        data_line(0, 0, 0, 1000, 0, &counts(0.0)),
        data_line(0, 0, 1, 1000, 0, &counts(100.0)),
        "x".to_string(),
        small_header(),
        "x".to_string(),
    ]);
    h.session.begin_replay().unwrap();
    h.session.run_to_completion().unwrap();

    h.session.arm_reflectance(0, 0, 99.0).unwrap();
    assert!(h.session.reflectance().is_armed());

    h.session.begin_replay().unwrap();
    h.session.run_to_completion().unwrap();
    assert!(!h.session.reflectance().is_armed());
    assert_eq!(h.session.white_balance(), crate::acquisition::cube::WhiteBalance::IDENTITY);
}

#[test]
fn test_replay_from_calibration_tables() {
    let dir = tempfile::tempdir().unwrap();
    let calibration_path = dir.path().join("calibration_data.txt");
    let sensitivity_path = dir.path().join("sensitivity_data.csv");
    let ones = vec!["1.0"; PIXELS].join(",");
    std::fs::write(
        &calibration_path,
        format!("1,wavCoef,400,2,0,0,0,0,\n1,radSens,{ones},\n1,linCoefs,1,0,\n"),
    )
    .unwrap();
    std::fs::write(&sensitivity_path, test_support::sensitivity_table_text(300, 1200)).unwrap();

    let capture = [
        small_header(),
        data_line(4, 4, 0, 500, 0, &counts(10.0)),
        data_line(4, 4, 1, 500, 0, &counts(1060.0)),
        "x".to_string(),
    ]
    .join("\r\n");
    let config = AcquisitionConfig::builder()
        .pixels(PIXELS)
        .calibration_table(&calibration_path)
        .sensitivity_table(&sensitivity_path)
        .build();
    let mut session = AcquisitionSession::replay(CaptureReplay::from_reader(Cursor::new(capture)), config);
    session.begin_replay().unwrap();
    let summary = completed(session.run_to_completion().unwrap());

    assert_eq!(summary.cells_written, 1);
    assert!(summary.saved.is_none());
    let cube = session.cube().unwrap();
    assert_relative_eq!(cube.wavelengths()[0], 400.0);
    assert_relative_eq!(cube.read_spectrum(2, 2).unwrap()[0], 1050.0 / 1050.0, epsilon = 1e-9);
}

#[test]
fn test_capture_replay_open_missing_file() {
    let result = CaptureReplay::open("/nonexistent/capture.csv");
    assert!(matches!(result, Err(ScanError::Transport(_))));
}

#[test]
fn test_stream_transport_lines_and_commands() {
    let input = Cursor::new(b"first\r\nsec\xffond\nlast".to_vec());
    let mut transport = StreamTransport::new(input, Vec::new());

    assert_eq!(transport.next_line().unwrap().as_deref(), Some("first"));
    assert_eq!(transport.next_line().unwrap().as_deref(), Some("sec\u{fffd}ond"));
    assert_eq!(transport.next_line().unwrap().as_deref(), Some("last"));
    assert_eq!(transport.next_line().unwrap(), None);

    transport.send_command(STOP_COMMAND).unwrap();
    let (_, written) = transport.into_inner();
    assert_eq!(written, b"stop");
}

struct BrokenWriter;

impl Write for BrokenWriter {
    fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
        Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "port closed"))
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_stream_transport_write_failure() {
    let mut transport = StreamTransport::new(Cursor::new(Vec::new()), BrokenWriter);
    assert!(matches!(transport.send_command("h1,2,3,"), Err(ScanError::Transport(_))));
}
