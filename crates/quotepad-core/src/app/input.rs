impl<N, L, R, D, G> QuoteDevice<N, L, R, D, G>
where
    N: NetworkLink,
    L: QuoteLibrary,
    R: RawStore,
    D: DelayNs,
    G: RngCore,
{
    fn on_press_started(&mut self, now_ms: u64) {
        if let UiState::Live { kind } = self.ui {
            info!("device: live {:?} display cancelled", kind);
            self.classifier.consume_current_press();
            self.ui = UiState::Ready;
            self.pending_redraw = true;
            self.finish_command(now_ms);
        }
    }

    fn dispatch(&mut self, event: GestureEvent, now_ms: u64) {
        info!("device: command {:?}", event);
        self.power = PowerState::Active;

        match event {
            GestureEvent::Button1Short => {
                // Stays active until the fetch completes on the next tick.
                self.ui = UiState::Fetching;
                self.pending_redraw = true;
                return;
            }
            GestureEvent::Button1Long => {
                self.start_live(LiveKind::Time, now_ms);
                return;
            }
            GestureEvent::Button2Long => {
                self.start_live(LiveKind::Date, now_ms);
                return;
            }
            GestureEvent::Button2Short => match self.pipeline.cached_quote(&self.store) {
                Some(quote) => {
                    self.text = quote.text;
                    self.last_source = Some(quote.source);
                    self.show_scrolling(self.settings.quote_scroll_ms, now_ms);
                }
                None => {
                    self.last_source = None;
                    self.show_notice(NO_CACHE_TITLE, NO_CACHE_HINT);
                }
            },
            GestureEvent::BothShort => {
                let phrase = fortune::pick(&mut self.io.rng);
                self.set_text(phrase);
                self.last_source = None;
                self.show_scrolling(self.settings.message_scroll_ms, now_ms);
            }
            GestureEvent::BothLong => {
                self.set_text(fortune::CREDITS);
                self.last_source = None;
                self.show_scrolling(self.settings.message_scroll_ms, now_ms);
            }
            GestureEvent::ForceSleep => {
                self.enter_sleep("forced");
                return;
            }
        }

        self.finish_command(now_ms);
    }

    fn start_live(&mut self, kind: LiveKind, now_ms: u64) {
        if !self.clock.is_synced() {
            self.pipeline
                .ensure_clock(&mut self.io, &mut self.store, &mut self.clock, now_ms);
        }
        self.ui = UiState::Live { kind };
        self.last_source = None;
        self.pending_redraw = true;
        self.last_frame_slot = None;
    }
}
