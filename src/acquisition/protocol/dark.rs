/// Dark readout at one integration time
#[derive(Debug, Clone, PartialEq)]
pub struct DarkFrame {
    pub integration_time: i64,
    pub counts: Vec<f64>,
}

/// Dark references of the current sweep, in the order the device sent them.
///
/// Dark frames arrive in non-decreasing integration-time order within one sweep;
/// a shorter integration time than the last entry starts a new sweep.
#[derive(Debug, Clone, Default)]
pub struct DarkFrameSet {
    entries: Vec<DarkFrame>,
}

impl DarkFrameSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a dark frame, returning `true` when it started a new sequence.
    pub fn push(&mut self, integration_time: i64, counts: Vec<f64>) -> bool {
        let restart = self
            .entries
            .last()
            .is_none_or(|last| integration_time < last.integration_time);
        if restart {
            self.entries.clear();
        }
        self.entries.push(DarkFrame {
            integration_time,
            counts,
        });
        restart
    }

    /// Counts of the dark frame taken at exactly `integration_time`.
    pub fn find(&self, integration_time: i64) -> Option<&[f64]> {
        self.entries
            .iter()
            .find(|entry| entry.integration_time == integration_time)
            .map(|entry| entry.counts.as_slice())
    }

    pub fn integration_times(&self) -> Vec<i64> {
        self.entries.iter().map(|entry| entry.integration_time).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
