impl<N, L, R, D, G> QuoteDevice<N, L, R, D, G>
where
    N: NetworkLink,
    L: QuoteLibrary,
    R: RawStore,
    D: DelayNs,
    G: RngCore,
{
    pub fn with_screen<F>(&self, now_ms: u64, f: F)
    where
        F: FnOnce(Screen<'_>),
    {
        match self.ui {
            UiState::Ready => f(Screen::Text {
                primary: READY_TITLE,
                secondary: READY_HINT,
            }),
            UiState::Fetching => f(Screen::Text {
                primary: FETCHING_TITLE,
                secondary: FETCHING_HINT,
            }),
            UiState::Scrolling {
                speed_ms,
                started_ms,
            } => f(Screen::Scrolling {
                text: &self.text,
                speed_ms,
                elapsed_ms: now_ms.saturating_sub(started_ms),
            }),
            UiState::Notice { primary, secondary } => f(Screen::Text { primary, secondary }),
            UiState::Live { kind: LiveKind::Time } => {
                let time = self.clock.now(now_ms).map(|local| local.format_time());
                f(Screen::Text {
                    primary: time.as_deref().unwrap_or(UNSET_TIME_TEXT),
                    secondary: TIME_LABEL,
                })
            }
            UiState::Live { kind: LiveKind::Date } => {
                let date = self.clock.now(now_ms).map(|local| local.format_date());
                f(Screen::Text {
                    primary: date.as_deref().unwrap_or(UNSET_DATE_TEXT),
                    secondary: DATE_LABEL,
                })
            }
            UiState::Sleeping => f(Screen::Text {
                primary: SLEEP_TITLE,
                secondary: SLEEP_HINT,
            }),
        }
    }
}
