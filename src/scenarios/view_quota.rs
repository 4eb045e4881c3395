/// This scenario tests that view quotas cap how often a banner is shown.
///
/// It has two variants:
///
/// - Variant A: banners capped at 100 and 300 views next to an unlimited one, 1000 requests
/// - Variant B: banners capped at 100 and 200 views only, 500 requests
///
/// Expected behavior:
/// - A capped banner ends with exactly its quota of views, never more
/// - Once the caps are reached in variant A, the unlimited banner takes every request
/// - In variant B exactly 300 requests are served and the remaining 200 find no eligible banner,
///   all of them after the last served request

use chrono::Duration;

use banner_rotator::banners::{Banner, Place};
use banner_rotator::logger::{LogEvent, Logger};
use banner_rotator::repository::MemoryRepository;
use banner_rotator::rotation::{RequestOutcome, Rotation, RotationRun, RotationStat};
use banner_rotator::rotator::BannerRotator;
use banner_rotator::snapshot::Snapshot;
use banner_rotator::logln;
use crate::scenarios::check;

inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "view_quota",
    run,
});

/// Variant configuration for the view quota scenario
enum VariantConfig {
    /// Two capped banners and one unlimited banner
    CappedWithFallback,
    /// Capped banners only
    CappedOnly,
}

fn prepare_rotator(variant: &VariantConfig) -> Result<BannerRotator<MemoryRepository>, Box<dyn std::error::Error>> {
    let max_views: &[u64] = match variant {
        VariantConfig::CappedWithFallback => &[100, 300, 0],
        VariantConfig::CappedOnly => &[100, 200],
    };
    let mut banners = Vec::with_capacity(max_views.len());
    for (banner_id, &max) in max_views.iter().enumerate() {
        let mut banner = Banner::new(banner_id, &format!("Capped at {}", max), "https://example.com", 5)?.place_on(0);
        banner.max_views = max;
        banners.push(banner);
    }
    Ok(BannerRotator::new(MemoryRepository::new(Snapshot {
        campaigns: Vec::new(),
        places: vec![Place::new(0, "Sidebar", "sidebar")],
        banners,
    })))
}

fn run_variant(
    description: &str,
    variant: VariantConfig,
    requests: usize,
    logger: &mut Logger,
) -> Result<(BannerRotator<MemoryRepository>, RotationRun, RotationStat), Box<dyn std::error::Error>> {
    logln!(logger, LogEvent::Rotation, "\n{}", description);
    let mut rotator = prepare_rotator(&variant)?;
    let rotation = Rotation::new("sidebar", requests, crate::scenarios::scenario_start()?, Duration::minutes(1));
    let rotation_run = rotation.run(&mut rotator, logger)?;
    let stat = RotationStat::new(&rotation_run, rotator.repository.banners());
    stat.printout(logger);
    Ok((rotator, rotation_run, stat))
}

pub fn run(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn std::error::Error>> {
    let (rotator_a, _, stats_a) = run_variant("Running with two capped banners and a fallback", VariantConfig::CappedWithFallback, 1000, logger)?;
    let (rotator_b, run_b, stats_b) = run_variant("Running with capped banners only", VariantConfig::CappedOnly, 500, logger)?;

    logln!(logger, LogEvent::Scenario, "");

    let mut errors = Vec::new();

    for (variant, rotator) in [("A", &rotator_a), ("B", &rotator_b)] {
        for banner in rotator.repository.banners().iter().filter(|b| b.max_views > 0) {
            check(
                banner.views == banner.max_views,
                format!("Variant {}: banner #{} ended with exactly its quota: {}", variant, banner.banner_id, banner.views_str()),
                &mut errors,
                logger,
            );
        }
    }

    check(
        stats_a.not_found == 0,
        format!("Variant A: every request served thanks to the unlimited banner ({} not found)", stats_a.not_found),
        &mut errors,
        logger,
    );
    let fallback_views = stats_a.banner_stat(2).map_or(0, |s| s.views);
    check(
        fallback_views == 1000 - 100 - 300,
        format!("Variant A: unlimited banner took the remaining requests: {} == {}", fallback_views, 1000 - 100 - 300),
        &mut errors,
        logger,
    );

    check(
        stats_b.served == 300 && stats_b.not_found == 200,
        format!("Variant B: served {} (expected 300), no eligible banner {} (expected 200)", stats_b.served, stats_b.not_found),
        &mut errors,
        logger,
    );
    let first_not_found = run_b.outcomes.iter().position(|o| matches!(o, RequestOutcome::NOT_FOUND { .. }));
    let last_served = run_b.outcomes.iter().rposition(|o| matches!(o, RequestOutcome::Served(_)));
    check(
        matches!((first_not_found, last_served), (Some(nf), Some(ls)) if nf > ls),
        format!("Variant B: quota exhaustion is final (first not found at {:?}, last served at {:?})", first_not_found, last_served),
        &mut errors,
        logger,
    );

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
        run("view_quota", &mut logger).unwrap();
    }
}
