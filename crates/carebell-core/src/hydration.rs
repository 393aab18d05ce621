//! Daily hydration progress and quick-log amounts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::schedule::IntervalSchedule;

/// Quick-log amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaterPreset {
    Sip,
    Glass,
    Bottle,
}

impl WaterPreset {
    pub fn ml(self) -> u32 {
        match self {
            WaterPreset::Sip => 100,
            WaterPreset::Glass => 250,
            WaterPreset::Bottle => 500,
        }
    }
}

impl fmt::Display for WaterPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WaterPreset::Sip => "sip",
            WaterPreset::Glass => "glass",
            WaterPreset::Bottle => "bottle",
        };
        f.write_str(name)
    }
}

impl FromStr for WaterPreset {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sip" => Ok(WaterPreset::Sip),
            "glass" => Ok(WaterPreset::Glass),
            "bottle" => Ok(WaterPreset::Bottle),
            _ => Err(ParseError::Amount(s.to_string())),
        }
    }
}

/// Parse a logged amount: a positive number of millilitres or a preset name.
pub fn parse_amount(input: &str) -> Result<u32, ParseError> {
    if let Ok(preset) = input.parse::<WaterPreset>() {
        return Ok(preset.ml());
    }
    match input.trim().trim_end_matches("ml").trim().parse::<u32>() {
        Ok(ml) if ml > 0 => Ok(ml),
        _ => Err(ParseError::Amount(input.to_string())),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HydrationSummary {
    pub schedule_id: String,
    pub today_total_ml: u32,
    pub goal_ml: u32,
    /// 0 to 100; stays at 100 past the goal
    pub progress_pct: u32,
    pub remaining_ml: u32,
    pub glasses_remaining: u32,
}

impl HydrationSummary {
    pub fn new(schedule: &IntervalSchedule, today_total_ml: u32, glass_ml: u32) -> Self {
        let remaining_ml = schedule.remaining_to_goal(today_total_ml);
        let progress_pct = if schedule.goal_amount == 0 {
            100
        } else {
            let pct = today_total_ml as u64 * 100 / schedule.goal_amount as u64;
            pct.min(100) as u32
        };
        Self {
            schedule_id: schedule.id.clone(),
            today_total_ml,
            goal_ml: schedule.goal_amount,
            progress_pct,
            remaining_ml,
            glasses_remaining: remaining_ml.div_ceil(glass_ml.max(1)),
        }
    }

    pub fn goal_met(&self) -> bool {
        self.remaining_ml == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets() {
        assert_eq!(parse_amount("sip").unwrap(), 100);
        assert_eq!(parse_amount("Glass").unwrap(), 250);
        assert_eq!(parse_amount("bottle").unwrap(), 500);
        assert_eq!(parse_amount("330").unwrap(), 330);
        assert_eq!(parse_amount("330ml").unwrap(), 330);
        assert!(parse_amount("0").is_err());
        assert!(parse_amount("-5").is_err());
        assert!(parse_amount("cup").is_err());
    }

    #[test]
    fn progress_caps_at_goal() {
        let water = IntervalSchedule::default();

        let summary = HydrationSummary::new(&water, 500, 250);
        assert_eq!(summary.progress_pct, 25);
        assert_eq!(summary.remaining_ml, 1500);
        assert_eq!(summary.glasses_remaining, 6);
        assert!(!summary.goal_met());

        let summary = HydrationSummary::new(&water, 2600, 250);
        assert_eq!(summary.progress_pct, 100);
        assert_eq!(summary.remaining_ml, 0);
        assert_eq!(summary.glasses_remaining, 0);
        assert!(summary.goal_met());
    }

    #[test]
    fn zero_goal_is_always_met() {
        let water = IntervalSchedule {
            goal_amount: 0,
            ..IntervalSchedule::default()
        };
        let summary = HydrationSummary::new(&water, 0, 250);
        assert_eq!(summary.progress_pct, 100);
        assert!(summary.goal_met());
    }
}
