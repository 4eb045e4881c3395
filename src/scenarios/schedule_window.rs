/// This scenario tests that banners are only shown inside their display window.
///
/// A single place is rotated for one simulated week with one request every 10 minutes.
/// The week starts on a Monday.
///
/// Banners:
/// - "Weekend promo" (weight 10): Saturday and Sunday only
/// - "Launch" (weight 5): from Wednesday on, no end
/// - "Evergreen" (weight 1): no schedule
/// - "Expired" (weight 10): finished the day before the week started
///
/// Expected behavior:
/// - Every view falls inside its banner's window (bounds inclusive)
/// - The expired banner is never shown
/// - The promo is shown during the weekend and takes most of the weekend views
/// - The evergreen banner keeps the place from ever running dry

use chrono::{DateTime, Duration, Utc};

use banner_rotator::banners::{Banner, Place};
use banner_rotator::logger::{LogEvent, Logger};
use banner_rotator::repository::MemoryRepository;
use banner_rotator::rotation::{Rotation, RotationRun, RotationStat};
use banner_rotator::rotator::BannerRotator;
use banner_rotator::snapshot::Snapshot;
use banner_rotator::logln;
use crate::scenarios::check;

inventory::submit!(crate::scenarios::ScenarioEntry {
    short_name: "schedule_window",
    run,
});

const PROMO: usize = 0;
const LAUNCH: usize = 1;
const EVERGREEN: usize = 2;
const EXPIRED: usize = 3;

fn scheduled(
    banner_id: usize,
    name: &str,
    weight: u8,
    start_at: Option<DateTime<Utc>>,
    finish_at: Option<DateTime<Utc>>,
) -> Result<Banner, Box<dyn std::error::Error>> {
    let mut banner = Banner::new(banner_id, name, "https://example.com", weight)?.place_on(0);
    banner.start_at = start_at;
    banner.finish_at = finish_at;
    Ok(banner)
}

fn prepare_rotator(week_start: DateTime<Utc>) -> Result<BannerRotator<MemoryRepository>, Box<dyn std::error::Error>> {
    let banners = vec![
        scheduled(PROMO, "Weekend promo", 10, Some(week_start + Duration::days(5)), Some(week_start + Duration::days(7)))?,
        scheduled(LAUNCH, "Launch", 5, Some(week_start + Duration::days(2)), None)?,
        scheduled(EVERGREEN, "Evergreen", 1, None, None)?,
        scheduled(EXPIRED, "Expired", 10, Some(week_start - Duration::days(30)), Some(week_start - Duration::days(1)))?,
    ];
    Ok(BannerRotator::new(MemoryRepository::new(Snapshot {
        campaigns: Vec::new(),
        places: vec![Place::new(0, "Homepage", "homepage")],
        banners,
    })))
}

/// Views served outside their banner's window, as (banner id, time)
fn views_outside_window(rotation_run: &RotationRun, banners: &[Banner]) -> Vec<(usize, DateTime<Utc>)> {
    rotation_run
        .served()
        .filter(|view| {
            banners.iter().find(|b| b.banner_id == view.banner_id).map_or(true, |b| {
                b.start_at.is_some_and(|start| view.at < start) || b.finish_at.is_some_and(|finish| view.at > finish)
            })
        })
        .map(|view| (view.banner_id, view.at))
        .collect()
}

pub fn run(scenario_name: &str, logger: &mut Logger) -> Result<(), Box<dyn std::error::Error>> {
    let week_start = crate::scenarios::scenario_start()?;
    let step = Duration::minutes(10);
    let requests = (Duration::days(7).num_minutes() / step.num_minutes()) as usize;

    logln!(logger, LogEvent::Rotation, "\nRunning one week of scheduled banners");
    let mut rotator = prepare_rotator(week_start)?;
    let rotation = Rotation::new("homepage", requests, week_start, step);
    let rotation_run = rotation.run(&mut rotator, logger)?;
    let stat = RotationStat::new(&rotation_run, rotator.repository.banners());
    stat.printout(logger);

    logln!(logger, LogEvent::Scenario, "");

    let mut errors = Vec::new();

    let outside = views_outside_window(&rotation_run, rotator.repository.banners());
    check(
        outside.is_empty(),
        format!("Every view inside its banner's window ({} outside, first: {:?})", outside.len(), outside.first()),
        &mut errors,
        logger,
    );

    let expired_views = stat.banner_stat(EXPIRED).map_or(0, |s| s.views);
    check(
        expired_views == 0,
        format!("Expired banner never shown ({} views)", expired_views),
        &mut errors,
        logger,
    );

    let weekend_start = week_start + Duration::days(5);
    let weekend_views = rotation_run.served().filter(|v| v.at >= weekend_start).count();
    let weekend_promo = rotation_run.served().filter(|v| v.at >= weekend_start && v.banner_id == PROMO).count();
    check(
        weekend_views > 0 && weekend_promo * 2 > weekend_views,
        format!("Promo takes most of the weekend: {} of {} views", weekend_promo, weekend_views),
        &mut errors,
        logger,
    );

    let launch_views = stat.banner_stat(LAUNCH).map_or(0, |s| s.views);
    check(
        launch_views > 0,
        format!("Launch banner shown after it started ({} views)", launch_views),
        &mut errors,
        logger,
    );

    check(
        stat.not_found == 0,
        format!("Evergreen banner keeps the place filled ({} not found)", stat.not_found),
        &mut errors,
        logger,
    );

    if errors.is_empty() {
        Ok(())
    } else {
        Err(format!("Scenario '{}' validation failed:\n{}", scenario_name, errors.join("\n")).into())
    }
}
