//! Line grammar of the scanner's data stream.
//!
//! ```text
//! h,<unit>,<panStart>,<panStop>,<panStep>,<tiltStart>,<tiltStop>,<tiltStep>,?,<boxcar>,<darkRepeat>
//! <pan>,<tilt>,<type 0|1|2>,<integrationTime>,<saturation>,<count_0>,...,<count_n-1>
//! x...
//! ```

use crate::acquisition::common::error::FrameError;

const HEADER_TAG: &str = "h";
const TERMINATOR_PREFIX: char = 'x';
const DATA_PREFIX_FIELDS: usize = 5;
const HEADER_MIN_FIELDS: usize = 10;

const DARK_TAG: i64 = 0;
const LIGHT_TAG: i64 = 1;

/// Scan header reported by the device once the sweep begins
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderFrame {
    pub unit_id: u32,
    pub pan_start: i64,
    pub pan_stop: i64,
    pub pan_step: i64,
    pub tilt_start: i64,
    pub tilt_stop: i64,
    pub tilt_step: i64,
    pub boxcar_width: usize,
    /// Dark-repeat interval echoed by the device, absent on older firmware
    pub dark_repeat: Option<i64>,
}

/// One spectrometer readout at a gimbal position
#[derive(Debug, Clone, PartialEq)]
pub struct DataFrame {
    pub pan: i64,
    pub tilt: i64,
    pub integration_time: i64,
    pub saturation: i64,
    /// Raw per-bin counts, one per spectral bin
    pub counts: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Header(HeaderFrame),
    Dark(DataFrame),
    Light(DataFrame),
    /// Keep-alive readout (type 2 or any unknown tag)
    Heartbeat { tag: i64 },
    Terminator,
}

impl Frame {
    /// Decodes one line. `spectral_bins` is `None` until a header has set up the scan,
    /// in which case only headers and terminators decode.
    pub fn decode(line: &str, spectral_bins: Option<usize>) -> Result<Frame, FrameError> {
        let line = line.trim();
        if line.starts_with(TERMINATOR_PREFIX) {
            return Ok(Frame::Terminator);
        }

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields[0] == HEADER_TAG {
            return decode_header(&fields).map(Frame::Header);
        }

        let bins = spectral_bins.ok_or(FrameError::BeforeHeader)?;
        let expected = bins + DATA_PREFIX_FIELDS;
        if fields.len() != expected {
            return Err(FrameError::Malformed {
                expected,
                found: fields.len(),
            });
        }

        let tag = parse_int(fields[2])?;
        let frame = DataFrame {
            pan: parse_int(fields[0])?,
            tilt: parse_int(fields[1])?,
            integration_time: parse_int(fields[3])?,
            saturation: parse_int(fields[4])?,
            counts: fields[DATA_PREFIX_FIELDS..]
                .iter()
                .map(|field| parse_count(field))
                .collect::<Result<_, _>>()?,
        };

        Ok(match tag {
            DARK_TAG => Frame::Dark(frame),
            LIGHT_TAG => Frame::Light(frame),
            tag => Frame::Heartbeat { tag },
        })
    }
}

fn decode_header(fields: &[&str]) -> Result<HeaderFrame, FrameError> {
    if fields.len() < HEADER_MIN_FIELDS {
        return Err(FrameError::Malformed {
            expected: HEADER_MIN_FIELDS,
            found: fields.len(),
        });
    }

    let unit_id = fields[1]
        .parse::<u32>()
        .map_err(|e| FrameError::InvalidField(format!("unit id '{}': {e}", fields[1])))?;
    let boxcar_width = fields[9]
        .parse::<usize>()
        .map_err(|e| FrameError::InvalidField(format!("boxcar width '{}': {e}", fields[9])))?;
    let dark_repeat = match fields.get(10) {
        Some(field) if !field.is_empty() => Some(parse_int(field)?),
        _ => None,
    };

    Ok(HeaderFrame {
        unit_id,
        pan_start: parse_int(fields[2])?,
        pan_stop: parse_int(fields[3])?,
        pan_step: parse_int(fields[4])?,
        tilt_start: parse_int(fields[5])?,
        tilt_stop: parse_int(fields[6])?,
        tilt_step: parse_int(fields[7])?,
        boxcar_width,
        dark_repeat,
    })
}

fn parse_int(field: &str) -> Result<i64, FrameError> {
    field
        .parse::<i64>()
        .map_err(|e| FrameError::InvalidField(format!("'{field}': {e}")))
}

fn parse_count(field: &str) -> Result<f64, FrameError> {
    field
        .parse::<f64>()
        .map_err(|e| FrameError::InvalidField(format!("'{field}': {e}")))
}
