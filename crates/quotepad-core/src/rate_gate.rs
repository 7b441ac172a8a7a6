//! Daily gate on live quote fetches.

use crate::clock::LocalDateTime;
use crate::persist::{PersistentStore, RawStore, WATERMARK_SLOT};

/// (day-of-month, hour) of the last successful live fetch.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RateWatermark {
    pub day: u8,
    pub hour: u8,
}

impl RateWatermark {
    pub const fn at(now: &LocalDateTime) -> Self {
        Self {
            day: now.day,
            hour: now.hour,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match *bytes {
            [day @ 1..=31, hour @ 0..=23] => Some(Self { day, hour }),
            _ => None,
        }
    }

    pub const fn to_bytes(self) -> [u8; 2] {
        [self.day, self.hour]
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum RatePolicy {
    /// A new day *and* an hour at or past the watermark hour.
    #[default]
    Conjunctive,
    /// Any change of calendar day.
    CalendarDay,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RateGate {
    policy: RatePolicy,
}

impl RateGate {
    pub const fn new(policy: RatePolicy) -> Self {
        Self { policy }
    }

    pub const fn policy(&self) -> RatePolicy {
        self.policy
    }

    pub fn permits(&self, watermark: Option<RateWatermark>, now: &LocalDateTime) -> bool {
        let Some(mark) = watermark else {
            return true;
        };

        match self.policy {
            RatePolicy::Conjunctive => now.day != mark.day && now.hour >= mark.hour,
            RatePolicy::CalendarDay => now.day != mark.day,
        }
    }

    pub fn permits_live_fetch<R: RawStore>(
        &self,
        store: &PersistentStore<R>,
        now: &LocalDateTime,
    ) -> bool {
        self.permits(load_watermark(store), now)
    }
}

pub fn load_watermark<R: RawStore>(store: &PersistentStore<R>) -> Option<RateWatermark> {
    let mut bytes = [0u8; 2];
    let len = store.read_bytes(WATERMARK_SLOT, &mut bytes);
    RateWatermark::from_bytes(&bytes[..len])
}

/// Writes the watermark without committing, so it lands with the quote.
pub fn stage_watermark<R: RawStore>(store: &mut PersistentStore<R>, mark: RateWatermark) {
    store.stage_bytes(WATERMARK_SLOT, &mark.to_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::{MemoryStore, STORE_BYTES};

    fn at(day: u8, hour: u8) -> LocalDateTime {
        LocalDateTime {
            year: 2024,
            month: 3,
            day,
            hour,
            minute: 0,
            second: 0,
            weekday: 0,
        }
    }

    #[test]
    fn missing_watermark_permits() {
        let store = PersistentStore::new(MemoryStore::<STORE_BYTES>::new());
        assert!(RateGate::default().permits_live_fetch(&store, &at(5, 10)));
    }

    #[test]
    fn same_day_is_denied() {
        let mut store = PersistentStore::new(MemoryStore::<STORE_BYTES>::new());
        stage_watermark(&mut store, RateWatermark { day: 5, hour: 10 });
        store.commit().unwrap();

        let gate = RateGate::default();
        assert!(!gate.permits_live_fetch(&store, &at(5, 14)));
        // No fetch in between, so the answer does not change.
        assert!(!gate.permits_live_fetch(&store, &at(5, 14)));
    }

    #[test]
    fn conjunctive_policy_also_waits_for_the_hour() {
        let mark = Some(RateWatermark { day: 5, hour: 10 });
        let gate = RateGate::new(RatePolicy::Conjunctive);

        assert!(!gate.permits(mark, &at(6, 9)));
        assert!(gate.permits(mark, &at(6, 10)));
        assert!(gate.permits(mark, &at(6, 23)));
    }

    #[test]
    fn calendar_day_policy_ignores_the_hour() {
        let mark = Some(RateWatermark { day: 5, hour: 10 });
        let gate = RateGate::new(RatePolicy::CalendarDay);

        assert!(gate.permits(mark, &at(6, 0)));
        assert!(!gate.permits(mark, &at(5, 23)));
    }

    #[test]
    fn out_of_range_bytes_are_absent() {
        assert_eq!(RateWatermark::from_bytes(&[0, 5]), None);
        assert_eq!(RateWatermark::from_bytes(&[5, 24]), None);
        assert_eq!(RateWatermark::from_bytes(&[5]), None);
        assert_eq!(
            RateWatermark::from_bytes(&[31, 23]),
            Some(RateWatermark { day: 31, hour: 23 })
        );
    }
}
