//! The anchor request that drives enumeration.

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{RefsError, Result};
use crate::index::message_ordinal;

/// Members pulled when none are given: control plus four perturbations.
pub const DEFAULT_MEMBERS: [&str; 5] = ["c00", "p01", "p02", "p03", "p04"];

pub const DEFAULT_VARIABLE: &str = "pres_msl";
pub const DEFAULT_HORIZON: &str = "Days:1-10";
pub const DEFAULT_WINDOW_DAYS: u32 = 10;

/// A validated request for one lead time around an anchor date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnchorRequest {
    date: NaiveDate,
    forecast_hour: u32,
    variable: String,
    members: Vec<String>,
    horizon: String,
    window_days: u32,
}

impl AnchorRequest {
    /// Create a request with the default variable, members, horizon and window.
    ///
    /// Fails before any remote interaction if the forecast hour has no message.
    pub fn new(date: NaiveDate, forecast_hour: u32) -> Result<Self> {
        message_ordinal(forecast_hour)?;
        Ok(Self {
            date,
            forecast_hour,
            variable: DEFAULT_VARIABLE.to_string(),
            members: DEFAULT_MEMBERS.iter().map(|m| m.to_string()).collect(),
            horizon: DEFAULT_HORIZON.to_string(),
            window_days: DEFAULT_WINDOW_DAYS,
        })
    }

    pub fn with_variable(mut self, variable: impl Into<String>) -> Self {
        self.variable = variable.into();
        self
    }

    pub fn with_members<I, S>(mut self, members: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let members: Vec<String> = members.into_iter().map(Into::into).collect();
        if members.is_empty() {
            return Err(RefsError::InvalidRequest(
                "at least one ensemble member is required".to_string(),
            ));
        }
        if let Some(bad) = members.iter().find(|m| m.is_empty() || m.contains('/')) {
            return Err(RefsError::InvalidRequest(format!(
                "invalid ensemble member '{}'",
                bad
            )));
        }
        self.members = members;
        Ok(self)
    }

    pub fn with_horizon(mut self, horizon: impl Into<String>) -> Self {
        self.horizon = horizon.into();
        self
    }

    pub fn with_window_days(mut self, window_days: u32) -> Self {
        self.window_days = window_days;
        self
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn forecast_hour(&self) -> u32 {
        self.forecast_hour
    }

    /// 0-based position of the requested message in every index file.
    pub fn message_ordinal(&self) -> usize {
        // validated in `new`
        (self.forecast_hour / 3 - 1) as usize
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn horizon(&self) -> &str {
        &self.horizon
    }

    pub fn window_days(&self) -> u32 {
        self.window_days
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, 15).unwrap()
    }

    #[test]
    fn test_defaults() {
        let request = AnchorRequest::new(date(), 24).unwrap();
        assert_eq!(request.variable(), "pres_msl");
        assert_eq!(request.members().len(), 5);
        assert_eq!(request.horizon(), "Days:1-10");
        assert_eq!(request.window_days(), 10);
        assert_eq!(request.message_ordinal(), 7);
    }

    #[test]
    fn test_rejects_hour_zero() {
        assert!(matches!(
            AnchorRequest::new(date(), 0),
            Err(RefsError::InvalidForecastHour { hour: 0, .. })
        ));
    }

    #[test]
    fn test_rejects_empty_members() {
        let result = AnchorRequest::new(date(), 6)
            .unwrap()
            .with_members(Vec::<String>::new());
        assert!(matches!(result, Err(RefsError::InvalidRequest(_))));
    }

    #[test]
    fn test_custom_members() {
        let request = AnchorRequest::new(date(), 6)
            .unwrap()
            .with_members(["c00", "p10"])
            .unwrap()
            .with_window_days(3);
        assert_eq!(request.members(), ["c00", "p10"]);
        assert_eq!(request.window_days(), 3);
    }
}
