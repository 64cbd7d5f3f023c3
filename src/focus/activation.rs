// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

use super::FocusKey;
use std::time::{Duration, Instant};

pub const DEFAULT_WINDOW: Duration = Duration::from_millis(400);

/// Result of a confirm press on a channel row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Press {
    /// First press: select the row for preview
    Preview,
    /// Second press: open fullscreen
    Confirm,
}

#[derive(Debug, Clone)]
struct ArmedPress {
    key: FocusKey,
    armed_until: Instant,
}

/// Double-confirm detection for channel rows.
///
/// A single record of the last armed row is kept and inspected on every press;
/// no timer runs. An elapsed record stays around so a later press on the same
/// row can be recognised as a fresh first press.
#[derive(Debug, Clone)]
pub struct TwoStepActivation {
    window: Duration,
    last: Option<ArmedPress>,
}

impl Default for TwoStepActivation {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl TwoStepActivation {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn press(&mut self, key: &FocusKey, now: Instant, already_selected: bool) -> Press {
        if let Some(last) = &self.last {
            if &last.key == key {
                if now < last.armed_until {
                    self.last = None;
                    return Press::Confirm;
                }
                self.arm(key, now);
                return Press::Preview;
            }
        }

        if already_selected {
            self.last = None;
            return Press::Confirm;
        }

        self.arm(key, now);
        Press::Preview
    }

    fn arm(&mut self, key: &FocusKey, now: Instant) {
        self.last = Some(ArmedPress {
            key: key.clone(),
            armed_until: now + self.window,
        });
    }

    pub fn disarm(&mut self) {
        self.last = None;
    }

    pub fn is_armed(&self, now: Instant) -> bool {
        self.last.as_ref().is_some_and(|last| now < last.armed_until)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn test_once_selects_twice_confirms() {
        let mut activation = TwoStepActivation::default();
        let key = FocusKey::channel_item(0);
        let t0 = Instant::now();

        assert_eq!(activation.press(&key, t0, false), Press::Preview);
        assert_eq!(activation.press(&key, t0 + 399 * MS, true), Press::Confirm);
        assert!(!activation.is_armed(t0 + 399 * MS));
    }

    #[test]
    fn test_lapsed_window_is_a_fresh_first_press() {
        let mut activation = TwoStepActivation::default();
        let key = FocusKey::channel_item(0);
        let t0 = Instant::now();

        assert_eq!(activation.press(&key, t0, false), Press::Preview);
        assert!(!activation.is_armed(t0 + 400 * MS));

        // the row is selected by now, but its own window lapsed
        let t1 = t0 + 700 * MS;
        assert_eq!(activation.press(&key, t1, true), Press::Preview);
        assert!(activation.is_armed(t1 + 10 * MS));
        assert_eq!(activation.press(&key, t1 + 100 * MS, true), Press::Confirm);
    }

    #[test]
    fn test_selected_row_confirms_on_single_press() {
        let mut activation = TwoStepActivation::default();
        let t0 = Instant::now();

        assert_eq!(
            activation.press(&FocusKey::channel_item(4), t0, true),
            Press::Confirm
        );
    }

    #[test]
    fn test_other_row_rearms() {
        let mut activation = TwoStepActivation::default();
        let a = FocusKey::channel_item(1);
        let b = FocusKey::channel_item(2);
        let t0 = Instant::now();

        assert_eq!(activation.press(&a, t0, false), Press::Preview);
        assert_eq!(activation.press(&b, t0 + 50 * MS, false), Press::Preview);
        // a lost its arm when b was pressed
        assert_eq!(activation.press(&a, t0 + 100 * MS, false), Press::Preview);
        assert_eq!(activation.press(&a, t0 + 150 * MS, true), Press::Confirm);
    }

    #[test]
    fn test_disarm() {
        let mut activation = TwoStepActivation::new(Duration::from_millis(500));
        let key = FocusKey::channel_item(0);
        let t0 = Instant::now();

        activation.press(&key, t0, false);
        assert!(activation.is_armed(t0 + 450 * MS));
        activation.disarm();
        assert!(!activation.is_armed(t0 + 450 * MS));
        assert_eq!(activation.press(&key, t0 + 460 * MS, false), Press::Preview);
    }
}
