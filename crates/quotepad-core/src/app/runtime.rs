impl<N, L, R, D, G> QuoteDevice<N, L, R, D, G>
where
    N: NetworkLink,
    L: QuoteLibrary,
    R: RawStore,
    D: DelayNs,
    G: RngCore,
{
    pub fn new(
        settings: Settings,
        io: Collaborators<N, L, D, G>,
        store: PersistentStore<R>,
        candidates: CandidateList,
        quote_url: &'static str,
    ) -> Self {
        let mut classifier = GestureClassifier::new(settings.long_press_ms);
        // The press that woke the device is not a command.
        classifier.require_release();

        Self {
            pipeline: QuotePipeline::new(&settings, quote_url, candidates),
            clock: TimeKeeper::new(settings.local_offset_secs()),
            settings,
            io,
            store,
            classifier,
            power: PowerState::Idle,
            ui: UiState::Ready,
            text: QuoteText::new(),
            last_source: None,
            last_activity_ms: None,
            pending_redraw: true,
            last_frame_slot: None,
        }
    }

    pub fn with_rate_policy(mut self, policy: RatePolicy) -> Self {
        self.pipeline = self.pipeline.with_rate_policy(policy);
        self
    }

    pub fn power_state(&self) -> PowerState {
        self.power
    }

    pub fn effective_mode(&self) -> OperationMode {
        self.pipeline.effective_mode()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &PersistentStore<R> {
        &self.store
    }

    pub fn io(&self) -> &Collaborators<N, L, D, G> {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut Collaborators<N, L, D, G> {
        &mut self.io
    }

    pub fn clock(&self) -> &TimeKeeper {
        &self.clock
    }

    /// Source of the text currently on screen, if it is a quote.
    pub fn last_source(&self) -> Option<QuoteSource> {
        self.last_source
    }

    pub fn tick(&mut self, levels: ButtonLevels, now_ms: u64) -> TickResult {
        if self.power == PowerState::Sleeping {
            return TickResult::NoRender;
        }
        self.last_activity_ms.get_or_insert(now_ms);

        let was_holding = self.classifier.is_holding();
        let event = self.classifier.poll(levels, now_ms);
        if levels.any() {
            self.last_activity_ms = Some(now_ms);
        }

        // Preempts everything, including a pending fetch.
        if event == Some(GestureEvent::ForceSleep) {
            self.enter_sleep("forced");
            return TickResult::Sleep;
        }

        if !was_holding && self.classifier.is_holding() {
            self.on_press_started(now_ms);
        }

        if self.ui == UiState::Fetching {
            self.complete_fetch(now_ms);
        }

        if let Some(event) = event {
            self.dispatch(event, now_ms);
        }

        if self.power == PowerState::Idle && !levels.any() && self.idle_expired(now_ms) {
            self.enter_sleep("idle");
        }

        if self.power == PowerState::Sleeping {
            return TickResult::Sleep;
        }

        self.render_decision(now_ms)
    }

    fn idle_expired(&self, now_ms: u64) -> bool {
        let since = self.last_activity_ms.unwrap_or(now_ms);
        now_ms.saturating_sub(since) >= self.settings.idle_timeout_ms()
    }

    fn complete_fetch(&mut self, now_ms: u64) {
        let quote = self
            .pipeline
            .acquire(&mut self.io, &mut self.store, &mut self.clock, now_ms);
        self.text = quote.text;
        self.last_source = Some(quote.source);
        self.show_scrolling(self.settings.quote_scroll_ms, now_ms);
        self.finish_command(now_ms);
    }

    fn finish_command(&mut self, now_ms: u64) {
        self.power = PowerState::Idle;
        self.last_activity_ms = Some(now_ms);
    }

    fn show_scrolling(&mut self, speed_ms: u16, now_ms: u64) {
        self.ui = UiState::Scrolling {
            speed_ms,
            started_ms: now_ms,
        };
        self.pending_redraw = true;
        self.last_frame_slot = None;
    }

    fn show_notice(&mut self, primary: &'static str, secondary: &'static str) {
        self.ui = UiState::Notice { primary, secondary };
        self.pending_redraw = true;
    }

    fn set_text(&mut self, text: &str) {
        self.text.clear();
        payload::push_truncated(&mut self.text, text);
    }

    fn enter_sleep(&mut self, reason: &str) {
        info!("device: sleeping reason={}", reason);
        self.power = PowerState::Sleeping;
        self.ui = UiState::Sleeping;
        self.pending_redraw = true;
    }

    fn render_decision(&mut self, now_ms: u64) -> TickResult {
        let slot = match self.ui {
            UiState::Scrolling {
                speed_ms,
                started_ms,
            } => Some(now_ms.saturating_sub(started_ms) / speed_ms.max(1) as u64),
            UiState::Live { .. } => Some(
                self.clock
                    .unix_time(now_ms)
                    .unwrap_or(now_ms / LIVE_FRAME_MS),
            ),
            UiState::Ready | UiState::Fetching | UiState::Notice { .. } | UiState::Sleeping => {
                None
            }
        };

        if self.pending_redraw || (slot.is_some() && slot != self.last_frame_slot) {
            self.pending_redraw = false;
            self.last_frame_slot = slot;
            return TickResult::RenderRequested;
        }

        TickResult::NoRender
    }
}
