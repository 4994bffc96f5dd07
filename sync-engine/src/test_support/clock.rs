//! Manually driven clock.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Local, TimeDelta, Utc};
use mockable::Clock;

use super::lock;

pub struct MutableClock(Mutex<DateTime<Utc>>);

impl MutableClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self(Mutex::new(now))
    }

    pub fn advance(&self, delta: Duration) {
        *lock(&self.0, "clock") += to_delta(delta);
    }

    pub fn rewind(&self, delta: Duration) {
        *lock(&self.0, "clock") -= to_delta(delta);
    }
}

fn to_delta(delta: Duration) -> TimeDelta {
    match TimeDelta::from_std(delta) {
        Ok(delta) => delta,
        Err(error) => panic!("failed to convert Duration to TimeDelta: {error}; delta={delta:?}"),
    }
}

impl Clock for MutableClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *lock(&self.0, "clock")
    }
}
