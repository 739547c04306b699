// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! What the persona is doing right now, from a weekly schedule.
//!
//! The clock is injected so tests can pin the wall time.

use std::sync::Arc;

use chrono::{Datelike, Local, NaiveDateTime, Timelike, Weekday};
use parley_config::model::ScheduleConfig;
use parley_config::parse_time_range;
use parley_core::ParleyError;

/// Source of local wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock stuck at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Provides the persona's current activity for the system prompt.
pub trait ActivityLookup: Send + Sync {
    fn current_activity(&self) -> String;
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Slot {
    start: u32,
    end: u32,
    activity: String,
}

impl Slot {
    fn contains(&self, minute: u32) -> bool {
        if self.start < self.end {
            (self.start..self.end).contains(&minute)
        } else {
            // Crosses midnight, e.g. 23:00-06:00.
            minute >= self.start || minute < self.end
        }
    }
}

/// Weekly schedule lookup.
///
/// Each weekday is evaluated against its own table only, so a range that
/// wraps past midnight on Monday covers Monday's early hours, not Tuesday's.
pub struct ScheduleActivity {
    days: [Vec<Slot>; 7],
    fallback: String,
    clock: Arc<dyn Clock>,
}

impl ScheduleActivity {
    pub fn from_config(config: &ScheduleConfig, clock: Arc<dyn Clock>) -> Result<Self, ParleyError> {
        let mut days: [Vec<Slot>; 7] = Default::default();
        for (index, (day, table)) in config.days().into_iter().enumerate() {
            for (range, activity) in table {
                let (start, end) = parse_time_range(range).ok_or_else(|| {
                    ParleyError::Config(format!(
                        "schedule.{day} key `{range}` is not a valid HH:MM-HH:MM range"
                    ))
                })?;
                days[index].push(Slot {
                    start,
                    end,
                    activity: activity.clone(),
                });
            }
            // Earliest start wins when ranges overlap.
            days[index].sort_by_key(|slot| slot.start);
        }

        Ok(Self {
            days,
            fallback: config.fallback_activity.clone(),
            clock,
        })
    }

    /// Activity at an arbitrary local time.
    pub fn activity_at(&self, at: NaiveDateTime) -> &str {
        let day = weekday_index(at.weekday());
        let minute = at.hour() * 60 + at.minute();
        self.days[day]
            .iter()
            .find(|slot| slot.contains(minute))
            .map(|slot| slot.activity.as_str())
            .unwrap_or(self.fallback.as_str())
    }
}

impl ActivityLookup for ScheduleActivity {
    fn current_activity(&self) -> String {
        self.activity_at(self.clock.now()).to_string()
    }
}

fn weekday_index(day: Weekday) -> usize {
    day.num_days_from_monday() as usize
}
