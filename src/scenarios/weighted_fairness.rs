/// This scenario checks that view shares follow banner weights.
///
/// It has three variants, each serving 20000 requests to a single place:
///
/// - Variant A: weights 10 and 1
/// - Variant B: three banners with equal weight 5
/// - Variant C: weights 1, 2, 3 and 4
///
/// Expected behavior:
/// - Every banner's share of views is within 1.5 percentage points of weight / sum(weights)
/// - Variant A shows the weight-10 banner roughly ten times as often as the weight-1 banner

use chrono::Duration;

use banner_rotator::banners::{Banner, Place};
use banner_rotator::logger::{LogEvent, Logger};
use banner_rotator::repository::MemoryRepository;
use banner_rotator::rotation::{Rotation, RotationStat};
use banner_rotator::rotator::BannerRotator;
use banner_rotator::snapshot::Snapshot;
use banner_rotator::logln;
use crate::scenarios::check;

inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "weighted_fairness",
    run,
});

pub const REQUESTS: usize = 20_000;
const SHARE_TOLERANCE: f64 = 0.015;

/// Rotator with one place, "main", and one unlimited banner per weight
pub fn prepare_rotator(weights: &[u8]) -> Result<BannerRotator<MemoryRepository>, Box<dyn std::error::Error>> {
    let mut banners = Vec::with_capacity(weights.len());
    for (banner_id, &weight) in weights.iter().enumerate() {
        let banner = Banner::new(banner_id, &format!("Banner w{}", weight), "https://example.com", weight)?;
        banners.push(banner.place_on(0));
    }
    Ok(BannerRotator::new(MemoryRepository::new(Snapshot {
        campaigns: Vec::new(),
        places: vec![Place::new(0, "Main", "main")],
        banners,
    })))
}

/// Serve `REQUESTS` requests for the given weights and return the statistics
pub fn run_variant(description: &str, weights: &[u8], logger: &mut Logger) -> Result<RotationStat, Box<dyn std::error::Error>> {
    logln!(logger, LogEvent::Rotation, "\n{}", description);
    let mut rotator = prepare_rotator(weights)?;
    let start = crate::scenarios::scenario_start()?;
    let rotation = Rotation::new("main", REQUESTS, start, Duration::seconds(1));
    let rotation_run = rotation.run(&mut rotator, logger)?;
    let stat = RotationStat::new(&rotation_run, rotator.repository.banners());
    stat.printout(logger);
    Ok(stat)
}

/// Compare observed and expected shares, collecting failures into `errors`
fn check_shares(variant: &str, stat: &RotationStat, errors: &mut Vec<String>, logger: &mut Logger) {
    for banner_stat in &stat.banner_stats {
        let expected = stat.expected_share(banner_stat.banner_id);
        check(
            (banner_stat.view_share - expected).abs() <= SHARE_TOLERANCE,
            format!(
                "Variant {}: banner #{} (weight {}) share {:.4} ≈ {:.4} (tolerance: ±{:.3})",
                variant, banner_stat.banner_id, banner_stat.weight, banner_stat.view_share, expected, SHARE_TOLERANCE
            ),
            errors,
            logger,
        );
    }
}

pub fn run(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn std::error::Error>> {
    let stats_a = run_variant("Running with weights 10 and 1", &[10, 1], logger)?;
    let stats_b = run_variant("Running with three equal weights", &[5, 5, 5], logger)?;
    let stats_c = run_variant("Running with weights 1, 2, 3 and 4", &[1, 2, 3, 4], logger)?;

    logln!(logger, LogEvent::Scenario, "");

    let mut errors = Vec::new();

    check_shares("A", &stats_a, &mut errors, logger);
    check_shares("B", &stats_b, &mut errors, logger);
    check_shares("C", &stats_c, &mut errors, logger);

    // Heavy banner should be shown roughly ten times as often as the light one
    let heavy = stats_a.banner_stat(0).map_or(0, |s| s.views);
    let light = stats_a.banner_stat(1).map_or(0, |s| s.views);
    let ratio = if light > 0 { heavy as f64 / light as f64 } else { f64::INFINITY };
    check(
        (8.0..=12.0).contains(&ratio),
        format!("Variant A: weight 10 banner shown {:.2}x as often as weight 1 banner (expected 8-12x)", ratio),
        &mut errors,
        logger,
    );

    for (variant, stat) in [("A", &stats_a), ("B", &stats_b), ("C", &stats_c)] {
        check(
            stat.not_found == 0,
            format!("Variant {}: every request served ({} not found)", variant, stat.not_found),
            &mut errors,
            logger,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(format!("Scenario '{}' validation failed:\n{}", scenario_name, errors.join("\n")).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_passes() {
        let mut logger = Logger::new();
        run("weighted_fairness", &mut logger).unwrap();
    }

    #[test]
    fn test_check_shares_reports_skewed_share() {
        use banner_rotator::logger::MemoryReceiver;
        use banner_rotator::rotation::BannerStat;

        let stat_for = |banner_id, weight, views| BannerStat {
            banner_id,
            name: format!("Banner {}", banner_id),
            weight,
            views,
            clicks: 0,
            view_share: views as f64 / 100.0,
        };
        let stat = RotationStat {
            banner_stats: vec![stat_for(0, 5, 70), stat_for(1, 5, 30)],
            requests: 100,
            served: 100,
            not_found: 0,
        };
        let mut logger = Logger::new();
        let (receiver, buffer) = MemoryReceiver::new(vec![LogEvent::Scenario]);
        logger.add_receiver(receiver);
        let mut errors = Vec::new();

        check_shares("X", &stat, &mut errors, &mut logger);

        assert_eq!(errors.len(), 2);
        assert!(errors[0].starts_with("Variant X: banner #0"));
        assert_eq!(buffer.borrow().matches("ERROR ✗").count(), 2);
    }

    #[test]
    fn test_prepare_rotator_rejects_invalid_weight() {
        assert!(prepare_rotator(&[5, 0]).is_err());
    }
}
