//! Cron schedule parsing, used by [`crate::dispatch`] to re-arm its tick
//! timer.
use std::str::FromStr;
use std::time::Duration;

use chrono::Utc;
use cron::Schedule;

/// A parsed cron expression, and the fallback re-validation interval used
/// whenever it has no next occurrence.
pub struct Cron {
    schedule: Schedule,
}

impl Cron {
    /// Parse a standard 5-field cron expression (or `@daily` and friends).
    ///
    /// The `cron` crate only accepts 6-or-7-field, seconds-first
    /// expressions and knows nothing of `@`-macros, so both are translated
    /// here: a macro expands to its standard 5-field equivalent, and any
    /// 5-field expression is padded with a leading `0` seconds field.
    pub fn parse(expr: &str) -> anyhow::Result<Self> {
        let expr = expr.trim();
        let standard = expand_macro(expr).unwrap_or(expr);
        let expanded = pad_seconds_field(standard);
        let schedule = Schedule::from_str(&expanded)?;
        Ok(Cron { schedule })
    }

    /// Duration until the next scheduled occurrence, or `None` if the
    /// schedule has no next time (an exhausted one-shot expression).
    pub fn next(&self) -> Option<Duration> {
        let now = Utc::now();
        let upcoming = self.schedule.after(&now).next()?;
        let delta = upcoming.signed_duration_since(now);
        Some(delta.to_std().unwrap_or(Duration::ZERO))
    }
}

/// Expand a `@`-macro to its standard 5-field equivalent, per the usual
/// crontab shorthand set.
fn expand_macro(expr: &str) -> Option<&'static str> {
    match expr {
        "@yearly" | "@annually" => Some("0 0 1 1 *"),
        "@monthly" => Some("0 0 1 * *"),
        "@weekly" => Some("0 0 * * 0"),
        "@daily" | "@midnight" => Some("0 0 * * *"),
        "@hourly" => Some("0 * * * *"),
        _ => None,
    }
}

/// Pad a 5-field standard expression with a leading `0` seconds field, as
/// the `cron` crate expects seconds-first 6-or-7-field expressions. Already
/// 6-or-7-field expressions pass through unchanged.
fn pad_seconds_field(expr: &str) -> String {
    if expr.split_whitespace().count() == 5 {
        format!("0 {expr}")
    } else {
        expr.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_standard_five_field_expression() {
        let cron = Cron::parse("0 3 * * *").expect("valid expression");
        assert!(cron.next().is_some());
    }

    #[test]
    fn parses_at_daily_macro() {
        let cron = Cron::parse("@daily").expect("valid macro");
        assert!(cron.next().is_some());
    }

    #[test]
    fn parses_at_hourly_macro() {
        let cron = Cron::parse("@hourly").expect("valid macro");
        assert!(cron.next().is_some());
    }

    #[test]
    fn parses_six_field_expression_unchanged() {
        let cron = Cron::parse("0 0 0 * * *").expect("valid expression");
        assert!(cron.next().is_some());
    }

    #[test]
    fn rejects_malformed_expression() {
        assert!(Cron::parse("not a cron expression").is_err());
    }
}
