//! Preference tiers: named conditions such as "always" or "night" that gate
//! whether a recipient wants a notification right now.

use std::sync::Arc;

use chrono::Timelike;
use chrono_tz::Tz;
use serde_json::Value;
use tracing::debug;

use courier_config::ResolvedConfig;
use courier_core::{EntityRef, SharedClock, SystemClock};

/// What a preference check gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct CheckContext<'a> {
    pub entity: &'a EntityRef,
    /// The host's record for the recipient, if it had one.
    pub recipient: Option<&'a Value>,
    pub config: &'a ResolvedConfig,
    pub event: &'a str,
}

/// Decides whether every candidate in one tier is sent.
pub trait PreferenceCheck: Send + Sync {
    fn check(&self, ctx: &CheckContext<'_>) -> bool;
}

impl<F> PreferenceCheck for F
where
    F: Fn(&CheckContext<'_>) -> bool + Send + Sync,
{
    fn check(&self, ctx: &CheckContext<'_>) -> bool {
        self(ctx)
    }
}

/// Passes every time.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysCheck;

impl PreferenceCheck for AlwaysCheck {
    fn check(&self, _ctx: &CheckContext<'_>) -> bool {
        true
    }
}

/// Passes when the recipient's local hour falls in `[start_hour, end_hour)`.
///
/// A window whose start is after its end wraps midnight, so 20..6 is "night".
/// Equal hours, including 0..24, cover the whole day.
/// The recipient's time zone is read from `timezone_field` on their record,
/// then from the same path in their resolved configuration, falling back to
/// `default_tz`.
#[derive(Clone)]
pub struct TimeWindowCheck {
    start_hour: u32,
    end_hour: u32,
    default_tz: Tz,
    timezone_field: String,
    clock: SharedClock,
}

impl TimeWindowCheck {
    pub fn new(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour: start_hour % 24,
            end_hour: end_hour % 24,
            default_tz: Tz::UTC,
            timezone_field: "timezone".to_owned(),
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn default_tz(mut self, tz: Tz) -> Self {
        self.default_tz = tz;
        self
    }

    #[must_use]
    pub fn timezone_field(mut self, field: impl Into<String>) -> Self {
        self.timezone_field = field.into();
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Whether `hour` (0-23) is inside the window.
    pub fn contains(&self, hour: u32) -> bool {
        if self.start_hour == self.end_hour {
            true
        } else if self.start_hour < self.end_hour {
            (self.start_hour..self.end_hour).contains(&hour)
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }

    fn timezone_for(&self, ctx: &CheckContext<'_>) -> Tz {
        let named = ctx
            .recipient
            .and_then(|record| courier_core::tree::get_path(record, &self.timezone_field))
            .or_else(|| ctx.config.get(&self.timezone_field))
            .and_then(Value::as_str);
        match named.map(str::parse::<Tz>) {
            Some(Ok(tz)) => tz,
            Some(Err(_)) => {
                debug!(entity = %ctx.entity, tz = ?named, "unknown time zone, using default");
                self.default_tz
            }
            None => self.default_tz,
        }
    }
}

impl PreferenceCheck for TimeWindowCheck {
    fn check(&self, ctx: &CheckContext<'_>) -> bool {
        let tz = self.timezone_for(ctx);
        let hour = self.clock.now().with_timezone(&tz).hour();
        self.contains(hour)
    }
}

impl std::fmt::Debug for TimeWindowCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeWindowCheck")
            .field("start_hour", &self.start_hour)
            .field("end_hour", &self.end_hour)
            .field("default_tz", &self.default_tz)
            .field("timezone_field", &self.timezone_field)
            .finish_non_exhaustive()
    }
}
