use std::error::Error;
use chrono::{DateTime, TimeZone, Utc};
use banner_rotator::logger::{LogEvent, Logger};
use banner_rotator::{errln, logln};

/// Function type for scenario entry functions
pub type ScenarioFn = fn(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn Error>>;

/// Entry in the scenario catalog
#[derive(Clone)]
pub struct ScenarioEntry {
    pub short_name: &'static str,
    pub run: ScenarioFn,
}

inventory::collect!(ScenarioEntry);

/// Get all registered scenarios from the catalog, sorted by name
pub fn get_scenario_catalog() -> Vec<ScenarioEntry> {
    let mut catalog: Vec<ScenarioEntry> = inventory::iter::<ScenarioEntry>
        .into_iter()
        .cloned()
        .collect();
    catalog.sort_by_key(|entry| entry.short_name);
    catalog
}

/// Simulated clock start shared by all scenarios
pub fn scenario_start() -> Result<DateTime<Utc>, Box<dyn Error>> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| "invalid scenario start time".into())
}

/// Log a validation line and collect it into `errors` when `condition` does not hold
pub fn check(condition: bool, msg: String, errors: &mut Vec<String>, logger: &mut Logger) {
    if condition {
        logln!(logger, LogEvent::Scenario, "✓ {}", msg);
    } else {
        errln!(logger, LogEvent::Scenario, "✗ {}", msg);
        errors.push(msg);
    }
}

// Scenario modules
pub mod click_quota;
pub mod schedule_window;
pub mod view_quota;
pub mod weighted_fairness;
