/// This scenario tests that click quotas retire banners once they have collected enough clicks.
///
/// Clicks are simulated with a per-banner click-through rate.
///
/// It has two variants:
///
/// - Variant A: a banner limited to 20 clicks (CTR 10%) next to an unlimited one (CTR 2%), 5000 requests
/// - Variant B: two banners limited to 5 and 10 clicks (CTR 5%), 3000 requests
///
/// Expected behavior:
/// - Limited banners end with exactly their click quota and are never shown after the last allowed click
/// - Every click produces an audit record
/// - In variant B the place runs dry once both quotas are used up

use chrono::Duration;

use banner_rotator::banners::{Banner, Place};
use banner_rotator::logger::{LogEvent, Logger};
use banner_rotator::repository::MemoryRepository;
use banner_rotator::rotation::{Rotation, RotationRun, RotationStat};
use banner_rotator::rotator::BannerRotator;
use banner_rotator::snapshot::Snapshot;
use banner_rotator::logln;
use crate::scenarios::check;

inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "click_quota",
    run,
});

/// (max_clicks, click-through rate) per banner
type BannerSetup = (u64, f64);

fn prepare(setup: &[BannerSetup], requests: usize) -> Result<(BannerRotator<MemoryRepository>, Rotation), Box<dyn std::error::Error>> {
    let mut banners = Vec::with_capacity(setup.len());
    let mut rotation = Rotation::new("footer", requests, crate::scenarios::scenario_start()?, Duration::minutes(5));
    for (banner_id, &(max_clicks, ctr)) in setup.iter().enumerate() {
        let mut banner = Banner::new(banner_id, &format!("Max {} clicks", max_clicks), "https://example.com", 5)?.place_on(0);
        banner.max_clicks = max_clicks;
        banners.push(banner);
        rotation.click_through_overrides.push((banner_id, ctr));
    }
    let rotator = BannerRotator::new(MemoryRepository::new(Snapshot {
        campaigns: Vec::new(),
        places: vec![Place::new(0, "Footer", "footer")],
        banners,
    }));
    Ok((rotator, rotation))
}

fn run_variant(
    description: &str,
    setup: &[BannerSetup],
    requests: usize,
    logger: &mut Logger,
) -> Result<(BannerRotator<MemoryRepository>, RotationRun, RotationStat), Box<dyn std::error::Error>> {
    logln!(logger, LogEvent::Rotation, "\n{}", description);
    let (mut rotator, rotation) = prepare(setup, requests)?;
    let rotation_run = rotation.run(&mut rotator, logger)?;
    let stat = RotationStat::new(&rotation_run, rotator.repository.banners());
    stat.printout(logger);
    Ok((rotator, rotation_run, stat))
}

/// Number of views a banner got after its click quota was used up
fn views_after_quota(rotation_run: &RotationRun, banner_id: usize, max_clicks: u64) -> usize {
    let mut clicks = 0;
    let mut late_views = 0;
    for view in rotation_run.served().filter(|v| v.banner_id == banner_id) {
        if clicks >= max_clicks {
            late_views += 1;
        }
        if view.clicked {
            clicks += 1;
        }
    }
    late_views
}

fn check_quotas(
    variant: &str,
    rotator: &BannerRotator<MemoryRepository>,
    rotation_run: &RotationRun,
    errors: &mut Vec<String>,
    logger: &mut Logger,
) {
    for banner in rotator.repository.banners().iter().filter(|b| b.max_clicks > 0) {
        check(
            banner.clicks == banner.max_clicks,
            format!("Variant {}: banner #{} ended with exactly its click quota: {}", variant, banner.banner_id, banner.clicks_str()),
            errors,
            logger,
        );
        let late_views = views_after_quota(rotation_run, banner.banner_id, banner.max_clicks);
        check(
            late_views == 0,
            format!("Variant {}: banner #{} shown {} times after its last allowed click", variant, banner.banner_id, late_views),
            errors,
            logger,
        );
    }

    let counted: u64 = rotator.repository.banners().iter().map(|b| b.clicks).sum();
    check(
        rotator.repository.clicks().len() as u64 == counted,
        format!("Variant {}: {} click audit records for {} counted clicks", variant, rotator.repository.clicks().len(), counted),
        errors,
        logger,
    );
}

pub fn run(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn std::error::Error>> {
    let (rotator_a, run_a, stats_a) = run_variant("Running with one click-limited banner", &[(20, 0.1), (0, 0.02)], 5000, logger)?;
    let (rotator_b, run_b, stats_b) = run_variant("Running with click-limited banners only", &[(5, 0.05), (10, 0.05)], 3000, logger)?;

    logln!(logger, LogEvent::Scenario, "");

    let mut errors = Vec::new();

    check_quotas("A", &rotator_a, &run_a, &mut errors, logger);
    check_quotas("B", &rotator_b, &run_b, &mut errors, logger);

    let limited = stats_a.banner_stat(0).map_or(0, |s| s.views);
    let open = stats_a.banner_stat(1).map_or(0, |s| s.views);
    check(
        limited < open,
        format!("Variant A: retired banner shown less than the unlimited one: {} < {}", limited, open),
        &mut errors,
        logger,
    );
    check(
        stats_a.not_found == 0,
        format!("Variant A: every request served ({} not found)", stats_a.not_found),
        &mut errors,
        logger,
    );
    check(
        stats_b.not_found > 0,
        format!("Variant B: place runs dry once both quotas are used up ({} not found)", stats_b.not_found),
        &mut errors,
        logger,
    );

    if errors.is_empty() {
        Ok(())
    } else {
        Err(format!("Scenario '{}' validation failed:\n{}", scenario_name, errors.join("\n")).into())
    }
}
