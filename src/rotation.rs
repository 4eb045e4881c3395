//! Replays a stream of banner requests against a repository with a simulated clock.
//!
//! Every request serves a banner through [`BannerRotator`], which records the view, and then
//! flips a Bernoulli coin with the banner's click-through rate to decide whether it is clicked.
//! Results are collected per banner in [`RotationStat`].

use std::error::Error;
use std::sync::atomic::Ordering;

use chrono::{DateTime, Duration, Utc};
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Bernoulli, Distribution};

use crate::banners::{Banner, BannerId, PlacementId};
use crate::errors::{RepositoryError, SelectionError, ServeError};
use crate::logger::{LogEvent, Logger};
use crate::repository::{BannerRepository, ClickRequest, PlaceRef};
use crate::rotator::BannerRotator;
use crate::utils::{get_seed, TOTAL_ROTATION_RUNS};
use crate::logln;

/// One served banner
#[derive(Debug, Clone, PartialEq)]
pub struct ServedView {
    pub at: DateTime<Utc>,
    pub banner_id: BannerId,
    pub clicked: bool,
}

/// Outcome of a single request
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    Served(ServedView),
    NOT_FOUND { at: DateTime<Utc> },
}

/// Parameters of a rotation run
#[derive(Debug, Clone)]
pub struct Rotation {
    pub place_slug: String,
    pub requests: usize,
    pub start: DateTime<Utc>,
    /// Simulated time between two consecutive requests
    pub step: Duration,
    /// Click-through rate used for banners without an entry in `click_through_overrides`
    pub click_through_rate: f64,
    pub click_through_overrides: Vec<(BannerId, f64)>,
}

impl Rotation {
    pub fn new(place_slug: &str, requests: usize, start: DateTime<Utc>, step: Duration) -> Self {
        Self {
            place_slug: place_slug.to_string(),
            requests,
            start,
            step,
            click_through_rate: 0.0,
            click_through_overrides: Vec::new(),
        }
    }

    fn click_through_rate_for(&self, banner_id: BannerId) -> f64 {
        self.click_through_overrides
            .iter()
            .find(|(id, _)| *id == banner_id)
            .map_or(self.click_through_rate, |(_, ctr)| *ctr)
    }

    /// Run all requests against `rotator`, recording views and simulated clicks
    pub fn run<R: BannerRepository>(&self, rotator: &mut BannerRotator<R>, logger: &mut Logger) -> Result<RotationRun, Box<dyn Error>> {
        TOTAL_ROTATION_RUNS.fetch_add(1, Ordering::Relaxed);

        let place_id = rotator
            .repository
            .place_by_slug(&self.place_slug)
            .map(|place| place.place_id)
            .ok_or_else(|| RepositoryError::UnknownPlace { slug: self.place_slug.clone() })?;

        let mut rng_selection = StdRng::seed_from_u64(get_seed(1991));
        let mut rng_clicks = StdRng::seed_from_u64(get_seed(2992));

        let mut outcomes = Vec::with_capacity(self.requests);
        let mut now = self.start;

        for _ in 0..self.requests {
            match rotator.serve_place(place_id, now, &mut rng_selection, logger) {
                Ok(banner) => {
                    let click_dist = Bernoulli::new(self.click_through_rate_for(banner.banner_id))?;
                    let clicked = click_dist.sample(&mut rng_clicks);
                    if clicked {
                        let mut request = ClickRequest::at(now);
                        request.place = Some(PlaceRef::Id(place_id));
                        rotator.click(banner.banner_id, request)?;
                    }
                    outcomes.push(RequestOutcome::Served(ServedView {
                        at: now,
                        banner_id: banner.banner_id,
                        clicked,
                    }));
                }
                Err(ServeError::Selection(SelectionError::NoEligibleBanner { .. })) => {
                    outcomes.push(RequestOutcome::NOT_FOUND { at: now });
                }
                Err(e) => return Err(e.into()),
            }
            now += self.step;
        }

        Ok(RotationRun { place_id, outcomes })
    }
}

/// Outcomes of a rotation run, matched to requests by index
pub struct RotationRun {
    pub place_id: PlacementId,
    pub outcomes: Vec<RequestOutcome>,
}

impl RotationRun {
    pub fn served(&self) -> impl Iterator<Item = &ServedView> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            RequestOutcome::Served(view) => Some(view),
            RequestOutcome::NOT_FOUND { .. } => None,
        })
    }
}

/// Statistics for a single banner
#[derive(Debug, Clone, PartialEq)]
pub struct BannerStat {
    pub banner_id: BannerId,
    pub name: String,
    pub weight: u8,
    pub views: usize,
    pub clicks: usize,
    /// Fraction of all served requests that showed this banner
    pub view_share: f64,
}

/// Complete rotation statistics
#[derive(Debug, Clone, PartialEq)]
pub struct RotationStat {
    pub banner_stats: Vec<BannerStat>,
    pub requests: usize,
    pub served: usize,
    pub not_found: usize,
}

impl RotationStat {
    /// Aggregate a run over every banner assigned to its place, active or not
    pub fn new(rotation_run: &RotationRun, banners: &[Banner]) -> Self {
        let mut banner_stats: Vec<BannerStat> = banners
            .iter()
            .filter(|b| b.placements.contains(&rotation_run.place_id))
            .map(|b| BannerStat {
                banner_id: b.banner_id,
                name: b.name.clone(),
                weight: b.weight(),
                views: 0,
                clicks: 0,
                view_share: 0.0,
            })
            .collect();

        let mut served = 0;
        let mut not_found = 0;
        for outcome in &rotation_run.outcomes {
            match outcome {
                RequestOutcome::Served(view) => {
                    served += 1;
                    if let Some(stat) = banner_stats.iter_mut().find(|s| s.banner_id == view.banner_id) {
                        stat.views += 1;
                        if view.clicked {
                            stat.clicks += 1;
                        }
                    }
                }
                RequestOutcome::NOT_FOUND { .. } => not_found += 1,
            }
        }

        for stat in &mut banner_stats {
            stat.view_share = if served > 0 { stat.views as f64 / served as f64 } else { 0.0 };
        }

        Self {
            banner_stats,
            requests: rotation_run.outcomes.len(),
            served,
            not_found,
        }
    }

    pub fn banner_stat(&self, banner_id: BannerId) -> Option<&BannerStat> {
        self.banner_stats.iter().find(|s| s.banner_id == banner_id)
    }

    /// Share each banner would get if all of them stayed eligible for the whole run
    pub fn expected_share(&self, banner_id: BannerId) -> f64 {
        let weight_sum: u32 = self.banner_stats.iter().map(|s| u32::from(s.weight)).sum();
        match self.banner_stat(banner_id) {
            Some(stat) if weight_sum > 0 => f64::from(stat.weight) / f64::from(weight_sum),
            _ => 0.0,
        }
    }

    pub fn printout(&self, logger: &mut Logger) {
        logln!(logger, LogEvent::Rotation, "Requests: {}, served: {}, no eligible banner: {}", self.requests, self.served, self.not_found);
        for stat in &self.banner_stats {
            logln!(
                logger,
                LogEvent::Rotation,
                "  #{} {:<24} weight {:>2}  views {:>7}  clicks {:>5}  share {:>6.2}% (expected {:>6.2}%)",
                stat.banner_id,
                stat.name,
                stat.weight,
                stat.views,
                stat.clicks,
                stat.view_share * 100.0,
                self.expected_share(stat.banner_id) * 100.0
            );
        }
    }
}
