use chrono::{DateTime, Utc};

/// Injectable time source. Trial expiry is always re-derived from stored
/// timestamps against this clock, never from a background sweep.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed clock for deterministic tests. Interior-mutable so a test can move
/// time forward without touching stored data.
#[cfg(test)]
pub struct FixedClock(pub std::sync::Mutex<DateTime<Utc>>);

#[cfg(test)]
impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        FixedClock(std::sync::Mutex::new(now))
    }

    pub fn advance(&self, delta: chrono::Duration) {
        let mut now = self.0.lock().unwrap();
        *now += delta;
    }
}

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}
