//! Selection of a single banner for a place: eligibility filtering, weight normalization and one
//! weighted draw. This is the only place where raw weights are turned into the probabilities the
//! selector expects.

use std::fmt;
use std::sync::atomic::Ordering;

use chrono::{DateTime, Utc};

use crate::banners::{Banner, BannerId, PlacementId};
use crate::eligibility::EligibilityFilter;
use crate::errors::{RepositoryError, SelectionError, ServeError};
use crate::logger::{LogEvent, Logger};
use crate::repository::{BannerRepository, Click, ClickRequest};
use crate::selector::{pick_at, RandomSource};
use crate::utils::VERBOSE_SELECTION;
use crate::{errln, logln};

/// An eligible banner paired with its share of the total candidate weight
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate<'a> {
    pub banner: &'a Banner,
    pub bias: f64,
}

/// Normalize candidate weights into probabilities summing to one
///
/// Returns the candidates in input order together with the weight sum.
pub fn normalize<'a>(eligible: &[&'a Banner]) -> (Vec<Candidate<'a>>, u32) {
    let weight_sum: u32 = eligible.iter().map(|b| u32::from(b.weight())).sum();
    let candidates = eligible
        .iter()
        .map(|&banner| Candidate {
            banner,
            bias: f64::from(banner.weight()) / f64::from(weight_sum),
        })
        .collect();
    (candidates, weight_sum)
}

/// The arithmetic behind one selection decision
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionTrace {
    pub place_id: PlacementId,
    pub now: DateTime<Utc>,
    /// `(banner_id, weight, bias)` in the order the draw walked them
    pub candidates: Vec<(BannerId, u8, f64)>,
    pub weight_sum: u32,
    pub draw: f64,
    pub banner_id: BannerId,
}

impl fmt::Display for SelectionTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "place {} at {}: ", self.place_id, self.now.to_rfc3339())?;
        let parts: Vec<String> = self
            .candidates
            .iter()
            .map(|(banner_id, weight, bias)| format!("#{} w={} p={:.4}", banner_id, weight, bias))
            .collect();
        write!(
            f,
            "[{}] weight_sum={} draw={:.6} -> #{}",
            parts.join(", "),
            self.weight_sum,
            self.draw,
            self.banner_id
        )
    }
}

/// Filter, normalize and draw once. Returns the candidates, weight sum, draw and winner.
fn draw_winner<'a>(
    filter: &EligibilityFilter,
    banners: &'a [Banner],
    place_id: PlacementId,
    now: DateTime<Utc>,
    random: &mut dyn RandomSource,
) -> Result<(Vec<Candidate<'a>>, u32, f64, &'a Banner), SelectionError> {
    let eligible = filter.select(banners, place_id, now);
    if eligible.is_empty() {
        return Err(SelectionError::NoEligibleBanner { place_id });
    }

    let (candidates, weight_sum) = normalize(&eligible);
    let entries: Vec<(&Banner, f64)> = candidates.iter().map(|c| (c.banner, c.bias)).collect();
    let draw = random.next_unit();
    match pick_at(&entries, draw) {
        Some(&banner) => Ok((candidates, weight_sum, draw, banner)),
        None => Err(SelectionError::NoEligibleBanner { place_id }),
    }
}

/// Select a banner for `place_id` at `now` with the given filter and return the decision trace
pub fn select_banner_traced_with<'a>(
    filter: &EligibilityFilter,
    banners: &'a [Banner],
    place_id: PlacementId,
    now: DateTime<Utc>,
    random: &mut dyn RandomSource,
) -> Result<(&'a Banner, SelectionTrace), SelectionError> {
    let (candidates, weight_sum, draw, banner) = draw_winner(filter, banners, place_id, now, random)?;
    let trace = SelectionTrace {
        place_id,
        now,
        candidates: candidates
            .iter()
            .map(|c| (c.banner.banner_id, c.banner.weight(), c.bias))
            .collect(),
        weight_sum,
        draw,
        banner_id: banner.banner_id,
    };
    Ok((banner, trace))
}

/// Select a banner with the standard eligibility rules and return the decision trace
pub fn select_banner_traced<'a>(
    banners: &'a [Banner],
    place_id: PlacementId,
    now: DateTime<Utc>,
    random: &mut dyn RandomSource,
) -> Result<(&'a Banner, SelectionTrace), SelectionError> {
    select_banner_traced_with(&EligibilityFilter::new(), banners, place_id, now, random)
}

/// Select a banner for `place_id` at `now` with the given filter
pub fn select_banner_with<'a>(
    filter: &EligibilityFilter,
    banners: &'a [Banner],
    place_id: PlacementId,
    now: DateTime<Utc>,
    random: &mut dyn RandomSource,
) -> Result<&'a Banner, SelectionError> {
    draw_winner(filter, banners, place_id, now, random).map(|(_, _, _, banner)| banner)
}

/// Select a banner for `place_id` at `now` with probability proportional to its weight.
///
/// Fails with [`SelectionError::NoEligibleBanner`] when no banner passes the standard
/// eligibility rules. Consumes exactly one draw from `random` otherwise.
pub fn select_banner<'a>(
    banners: &'a [Banner],
    place_id: PlacementId,
    now: DateTime<Utc>,
    random: &mut dyn RandomSource,
) -> Result<&'a Banner, SelectionError> {
    select_banner_with(&EligibilityFilter::new(), banners, place_id, now, random)
}

/// Serves banners out of a repository: select, then record the view
pub struct BannerRotator<R: BannerRepository> {
    pub filter: EligibilityFilter,
    pub repository: R,
}

impl<R: BannerRepository> BannerRotator<R> {
    pub fn new(repository: R) -> Self {
        Self {
            filter: EligibilityFilter::new(),
            repository,
        }
    }

    /// Pick a banner for the place named by `place_slug` and count a view for it.
    ///
    /// The returned banner is the snapshot copy taken before the view was recorded.
    pub fn serve(
        &mut self,
        place_slug: &str,
        now: DateTime<Utc>,
        random: &mut dyn RandomSource,
        logger: &mut Logger,
    ) -> Result<Banner, ServeError> {
        let place_id = self
            .repository
            .place_by_slug(place_slug)
            .map(|p| p.place_id)
            .ok_or_else(|| RepositoryError::UnknownPlace { slug: place_slug.to_string() })?;
        self.serve_place(place_id, now, random, logger)
    }

    /// Same as [`BannerRotator::serve`] for a known place id
    pub fn serve_place(
        &mut self,
        place_id: PlacementId,
        now: DateTime<Utc>,
        random: &mut dyn RandomSource,
        logger: &mut Logger,
    ) -> Result<Banner, ServeError> {
        let banners = self.repository.banners_for_place(place_id);
        let verbose = VERBOSE_SELECTION.load(Ordering::Relaxed) && logger.is_enabled(LogEvent::Selection);

        let selected = if verbose {
            select_banner_traced_with(&self.filter, &banners, place_id, now, random).map(|(banner, trace)| {
                logln!(logger, LogEvent::Selection, "{}", trace);
                banner
            })
        } else {
            select_banner_with(&self.filter, &banners, place_id, now, random)
        };

        let banner = match selected {
            Ok(banner) => banner.clone(),
            Err(e) => {
                if verbose {
                    errln!(logger, LogEvent::Selection, "{} ({} banners in snapshot)", e, banners.len());
                }
                return Err(e.into());
            }
        };

        self.repository.record_view(banner.banner_id)?;
        Ok(banner)
    }

    pub fn click(&mut self, banner_id: BannerId, request: ClickRequest) -> Result<Click, RepositoryError> {
        self.repository.record_click(banner_id, request)
    }
}
