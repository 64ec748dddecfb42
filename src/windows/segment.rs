use chrono::{DateTime, Utc};

use super::types::Window;
use crate::position::PositionSample;

/// Reconstructs daylight windows from samples ordered by ascending timestamp.
///
/// A window starts at the first daylight sample after an eclipsed one and
/// ends at the first eclipsed sample after it. Runs touching either end of
/// the sequence get an unbounded edge on that side. Ordering is not checked.
pub fn daylight_windows(samples: &[PositionSample]) -> Vec<Window> {
    let mut windows = Vec::new();
    let Some(last) = samples.len().checked_sub(1) else {
        return windows;
    };
    let mut start: Option<DateTime<Utc>> = None;

    for (i, sample) in samples.iter().enumerate() {
        if !sample.visibility.is_daylight() {
            continue;
        }

        if i == 0 {
            if last == 0 {
                windows.push(Window::unbounded());
            } else if samples[1].visibility.is_eclipsed() {
                windows.push(Window::new(None, Some(samples[1].timestamp)));
            }
        } else if i == last {
            if start.is_none() && samples[i - 1].visibility.is_eclipsed() {
                start = Some(sample.timestamp);
            }
            windows.push(Window::new(start, None));
        } else {
            if samples[i - 1].visibility.is_eclipsed() {
                start = Some(sample.timestamp);
            }
            if samples[i + 1].visibility.is_eclipsed() {
                windows.push(Window::new(start.take(), Some(samples[i + 1].timestamp)));
            }
        }
    }

    windows
}
