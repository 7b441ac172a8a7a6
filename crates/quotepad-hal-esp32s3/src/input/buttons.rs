use embedded_hal::digital::InputPin;

use quotepad_core::gesture::ButtonLevels;

#[derive(Debug, Clone, Copy)]
pub struct ButtonConfig {
    active_low: bool,
    debounce_polls: u8,
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self {
            active_low: true,
            debounce_polls: 3,
        }
    }
}

impl ButtonConfig {
    pub const fn with_active_low(mut self, active_low: bool) -> Self {
        self.active_low = active_low;
        self
    }

    pub const fn with_debounce_polls(mut self, debounce_polls: u8) -> Self {
        self.debounce_polls = debounce_polls;
        self
    }
}

#[derive(Debug)]
pub enum ButtonError<B1Err, B2Err> {
    Button1(B1Err),
    Button2(B2Err),
}

#[derive(Debug, Clone, Copy)]
struct Debounced {
    raw: bool,
    stable: bool,
    stable_count: u8,
}

impl Debounced {
    const fn new(pressed: bool) -> Self {
        Self {
            raw: pressed,
            stable: pressed,
            stable_count: 0,
        }
    }

    fn update(&mut self, pressed: bool, threshold: u8) -> bool {
        if pressed == self.raw {
            self.stable_count = self.stable_count.saturating_add(1);
        } else {
            self.raw = pressed;
            self.stable_count = 0;
        }

        if self.stable_count >= threshold {
            self.stable = self.raw;
        }
        self.stable
    }
}

/// Debounced sampler for the two front buttons.
#[derive(Debug)]
pub struct ButtonPair<B1, B2> {
    button1: B1,
    button2: B2,
    config: ButtonConfig,
    state1: Debounced,
    state2: Debounced,
}

impl<B1, B2> ButtonPair<B1, B2>
where
    B1: InputPin,
    B2: InputPin,
{
    pub fn new(
        mut button1: B1,
        mut button2: B2,
        config: ButtonConfig,
    ) -> Result<Self, ButtonError<B1::Error, B2::Error>> {
        let high1 = button1.is_high().map_err(ButtonError::Button1)?;
        let high2 = button2.is_high().map_err(ButtonError::Button2)?;

        Ok(Self {
            state1: Debounced::new(pressed_from_level(high1, config.active_low)),
            state2: Debounced::new(pressed_from_level(high2, config.active_low)),
            button1,
            button2,
            config,
        })
    }

    /// Reads both pins once and returns the debounced levels.
    pub fn sample(&mut self) -> Result<ButtonLevels, ButtonError<B1::Error, B2::Error>> {
        let high1 = self.button1.is_high().map_err(ButtonError::Button1)?;
        let high2 = self.button2.is_high().map_err(ButtonError::Button2)?;
        let threshold = self.config.debounce_polls.max(1);

        Ok(ButtonLevels {
            button1: self
                .state1
                .update(pressed_from_level(high1, self.config.active_low), threshold),
            button2: self
                .state2
                .update(pressed_from_level(high2, self.config.active_low), threshold),
        })
    }
}

#[inline]
fn pressed_from_level(high: bool, active_low: bool) -> bool {
    if active_low { !high } else { high }
}
