//! Two-button gesture classification.
//!
//! A press runs from the first poll that sees either button down until the
//! first poll that sees both up. Holding both buttons at any point during the
//! press makes it a two-button gesture.

use log::debug;

/// Multiple of the long-press threshold at which a hold forces sleep.
pub const FORCE_SLEEP_FACTOR: u64 = 3;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ButtonLevels {
    pub button1: bool,
    pub button2: bool,
}

impl ButtonLevels {
    pub const RELEASED: Self = Self {
        button1: false,
        button2: false,
    };

    pub const fn any(self) -> bool {
        self.button1 || self.button2
    }

    pub const fn combo(self) -> Option<ButtonCombo> {
        match (self.button1, self.button2) {
            (true, true) => Some(ButtonCombo::Both),
            (true, false) => Some(ButtonCombo::Button1),
            (false, true) => Some(ButtonCombo::Button2),
            (false, false) => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ButtonCombo {
    Button1,
    Button2,
    Both,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GestureEvent {
    Button1Short,
    Button1Long,
    Button2Short,
    Button2Long,
    BothShort,
    BothLong,
    ForceSleep,
}

impl GestureEvent {
    fn from_parts(combo: ButtonCombo, class: HoldClass) -> Self {
        match (class, combo) {
            (HoldClass::ForceSleep, _) => Self::ForceSleep,
            (HoldClass::Short, ButtonCombo::Button1) => Self::Button1Short,
            (HoldClass::Long, ButtonCombo::Button1) => Self::Button1Long,
            (HoldClass::Short, ButtonCombo::Button2) => Self::Button2Short,
            (HoldClass::Long, ButtonCombo::Button2) => Self::Button2Long,
            (HoldClass::Short, ButtonCombo::Both) => Self::BothShort,
            (HoldClass::Long, ButtonCombo::Both) => Self::BothLong,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HoldClass {
    Short,
    Long,
    ForceSleep,
}

/// Holds up to and including the threshold are short.
pub const fn classify_hold(held_ms: u64, long_press_ms: u64) -> HoldClass {
    if held_ms >= FORCE_SLEEP_FACTOR * long_press_ms {
        HoldClass::ForceSleep
    } else if held_ms > long_press_ms {
        HoldClass::Long
    } else {
        HoldClass::Short
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum PressState {
    Ready,
    Held {
        started_ms: u64,
        combo: ButtonCombo,
        consumed: bool,
    },
    /// Ignoring input until both buttons are up.
    AwaitRelease,
}

#[derive(Debug)]
pub struct GestureClassifier {
    long_press_ms: u64,
    state: PressState,
}

impl GestureClassifier {
    pub const fn new(long_press_ms: u32) -> Self {
        Self {
            long_press_ms: long_press_ms as u64,
            state: PressState::Ready,
        }
    }

    pub const fn long_press_ms(&self) -> u64 {
        self.long_press_ms
    }

    pub const fn is_holding(&self) -> bool {
        matches!(self.state, PressState::Held { .. })
    }

    /// Drops the current press, if any, and waits for a full release.
    pub fn require_release(&mut self) {
        self.state = PressState::AwaitRelease;
    }

    /// The current press yields no command on release. It can still escalate
    /// to [`GestureEvent::ForceSleep`].
    pub fn consume_current_press(&mut self) {
        if let PressState::Held { consumed, .. } = &mut self.state {
            *consumed = true;
        }
    }

    /// Feeds one sample. Returns at most one event per press.
    pub fn poll(&mut self, levels: ButtonLevels, now_ms: u64) -> Option<GestureEvent> {
        match self.state {
            PressState::Ready => {
                if let Some(combo) = levels.combo() {
                    self.state = PressState::Held {
                        started_ms: now_ms,
                        combo,
                        consumed: false,
                    };
                }
                None
            }
            PressState::AwaitRelease => {
                if !levels.any() {
                    self.state = PressState::Ready;
                }
                None
            }
            PressState::Held {
                started_ms,
                combo,
                consumed,
            } => {
                let held_ms = now_ms.saturating_sub(started_ms);

                if levels.any() {
                    if classify_hold(held_ms, self.long_press_ms) == HoldClass::ForceSleep {
                        self.state = PressState::AwaitRelease;
                        return Some(GestureEvent::ForceSleep);
                    }

                    // Both buttons win over either one for the rest of the press.
                    let combo = match (combo, levels.combo()) {
                        (ButtonCombo::Both, _) | (_, None) => combo,
                        (_, Some(current)) => current,
                    };
                    self.state = PressState::Held {
                        started_ms,
                        combo,
                        consumed,
                    };
                    return None;
                }

                self.state = PressState::Ready;
                let class = classify_hold(held_ms, self.long_press_ms);
                if consumed && class != HoldClass::ForceSleep {
                    debug!("gesture: consumed press released held_ms={}", held_ms);
                    return None;
                }

                let event = GestureEvent::from_parts(combo, class);
                debug!("gesture: {:?} held_ms={}", event, held_ms);
                Some(event)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: u64 = 1_000;
    const STEP: u64 = 10;

    const B1: ButtonLevels = ButtonLevels {
        button1: true,
        button2: false,
    };
    const B2: ButtonLevels = ButtonLevels {
        button1: false,
        button2: true,
    };
    const BOTH: ButtonLevels = ButtonLevels {
        button1: true,
        button2: true,
    };

    /// Holds `levels` from t=0 and releases at `held_ms`, sampling every
    /// `STEP`. Returns every event emitted.
    fn hold(levels: ButtonLevels, held_ms: u64) -> std::vec::Vec<GestureEvent> {
        let mut classifier = GestureClassifier::new(THRESHOLD as u32);
        let mut events = std::vec::Vec::new();
        let mut t = 0;
        while t < held_ms {
            events.extend(classifier.poll(levels, t));
            t += STEP;
        }
        events.extend(classifier.poll(ButtonLevels::RELEASED, held_ms));
        events
    }

    #[test]
    fn hold_durations_map_to_short_long_and_force_sleep() {
        let cases = [
            (B1, GestureEvent::Button1Short, GestureEvent::Button1Long),
            (B2, GestureEvent::Button2Short, GestureEvent::Button2Long),
            (BOTH, GestureEvent::BothShort, GestureEvent::BothLong),
        ];

        for (levels, short, long) in cases {
            for held_ms in (STEP..=4 * THRESHOLD).step_by(STEP as usize * 7) {
                let expected = if held_ms <= THRESHOLD {
                    short
                } else if held_ms < 3 * THRESHOLD {
                    long
                } else {
                    GestureEvent::ForceSleep
                };
                assert_eq!(hold(levels, held_ms), [expected], "{levels:?} held {held_ms}");
            }
        }
    }

    #[test]
    fn boundaries_are_exclusive_for_long_and_inclusive_for_sleep() {
        assert_eq!(hold(B1, THRESHOLD), [GestureEvent::Button1Short]);
        assert_eq!(hold(B1, THRESHOLD + STEP), [GestureEvent::Button1Long]);
        assert_eq!(hold(B1, 3 * THRESHOLD - STEP), [GestureEvent::Button1Long]);
        assert_eq!(hold(B1, 3 * THRESHOLD), [GestureEvent::ForceSleep]);
    }

    #[test]
    fn press_seen_by_a_single_poll_is_short() {
        let mut classifier = GestureClassifier::new(THRESHOLD as u32);
        assert_eq!(classifier.poll(B2, 100), None);
        assert_eq!(
            classifier.poll(ButtonLevels::RELEASED, 250),
            Some(GestureEvent::Button2Short)
        );
    }

    #[test]
    fn both_buttons_win_even_if_one_is_released_first() {
        let mut classifier = GestureClassifier::new(THRESHOLD as u32);
        classifier.poll(B1, 0);
        classifier.poll(BOTH, 50);
        classifier.poll(B2, 120);
        assert_eq!(
            classifier.poll(ButtonLevels::RELEASED, 200),
            Some(GestureEvent::BothShort)
        );
    }

    #[test]
    fn force_sleep_fires_while_held_and_once_per_press() {
        let mut classifier = GestureClassifier::new(THRESHOLD as u32);
        classifier.poll(BOTH, 0);
        assert_eq!(classifier.poll(BOTH, 2_990), None);
        assert_eq!(classifier.poll(BOTH, 3_000), Some(GestureEvent::ForceSleep));
        assert_eq!(classifier.poll(BOTH, 4_000), None);
        assert_eq!(classifier.poll(ButtonLevels::RELEASED, 4_100), None);
        assert!(!classifier.is_holding());
    }

    #[test]
    fn consumed_press_only_escalates_to_sleep() {
        let mut classifier = GestureClassifier::new(THRESHOLD as u32);
        classifier.poll(B1, 0);
        classifier.consume_current_press();
        assert_eq!(classifier.poll(ButtonLevels::RELEASED, 1_500), None);

        classifier.poll(B1, 2_000);
        classifier.consume_current_press();
        assert_eq!(classifier.poll(B1, 5_000), Some(GestureEvent::ForceSleep));
    }

    #[test]
    fn require_release_ignores_the_rest_of_a_press() {
        let mut classifier = GestureClassifier::new(THRESHOLD as u32);
        classifier.poll(B1, 0);
        classifier.require_release();
        assert_eq!(classifier.poll(B1, 100), None);
        assert_eq!(classifier.poll(ButtonLevels::RELEASED, 200), None);
        classifier.poll(B2, 300);
        assert_eq!(
            classifier.poll(ButtonLevels::RELEASED, 400),
            Some(GestureEvent::Button2Short)
        );
    }
}
