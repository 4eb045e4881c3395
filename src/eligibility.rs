//! Eligibility of a banner for display at a given place and time.
//!
//! A banner is eligible when every rule in the filter holds. Rules are independent predicates
//! evaluated in order with short-circuit AND, so each one can be tested on its own and the first
//! failing rule names the reason a banner was skipped.

use chrono::{DateTime, Utc};

use crate::banners::{Banner, PlacementId};

/// The place and moment a banner is being considered for
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EligibilityContext {
    pub place_id: PlacementId,
    pub now: DateTime<Utc>,
}

pub type RuleFn = fn(&Banner, &EligibilityContext) -> bool;

/// A named eligibility predicate
#[derive(Clone, Copy)]
pub struct EligibilityRule {
    pub name: &'static str,
    pub check: RuleFn,
}

pub fn rule_is_active(banner: &Banner, _ctx: &EligibilityContext) -> bool {
    banner.is_active
}

pub fn rule_assigned_to_place(banner: &Banner, ctx: &EligibilityContext) -> bool {
    banner.placements.contains(&ctx.place_id)
}

pub fn rule_started(banner: &Banner, ctx: &EligibilityContext) -> bool {
    banner.start_at.map_or(true, |start_at| start_at <= ctx.now)
}

pub fn rule_not_finished(banner: &Banner, ctx: &EligibilityContext) -> bool {
    banner.finish_at.map_or(true, |finish_at| finish_at >= ctx.now)
}

pub fn rule_under_view_quota(banner: &Banner, _ctx: &EligibilityContext) -> bool {
    banner.max_views == 0 || banner.max_views > banner.views
}

pub fn rule_under_click_quota(banner: &Banner, _ctx: &EligibilityContext) -> bool {
    banner.max_clicks == 0 || banner.max_clicks > banner.clicks
}

/// Rules every served banner has to pass
pub const STANDARD_RULES: [EligibilityRule; 6] = [
    EligibilityRule { name: "active", check: rule_is_active },
    EligibilityRule { name: "assigned_to_place", check: rule_assigned_to_place },
    EligibilityRule { name: "started", check: rule_started },
    EligibilityRule { name: "not_finished", check: rule_not_finished },
    EligibilityRule { name: "under_view_quota", check: rule_under_view_quota },
    EligibilityRule { name: "under_click_quota", check: rule_under_click_quota },
];

/// Conjunction of eligibility rules
#[derive(Clone)]
pub struct EligibilityFilter {
    pub rules: Vec<EligibilityRule>,
}

impl EligibilityFilter {
    /// Filter with the standard rule set
    pub fn new() -> Self {
        Self::with_rules(STANDARD_RULES.to_vec())
    }

    pub fn with_rules(rules: Vec<EligibilityRule>) -> Self {
        Self { rules }
    }

    pub fn is_eligible(&self, banner: &Banner, ctx: &EligibilityContext) -> bool {
        self.rules.iter().all(|rule| (rule.check)(banner, ctx))
    }

    /// Name of the first rule the banner fails, `None` if it is eligible
    pub fn rejected_by(&self, banner: &Banner, ctx: &EligibilityContext) -> Option<&'static str> {
        self.rules
            .iter()
            .find(|rule| !(rule.check)(banner, ctx))
            .map(|rule| rule.name)
    }

    /// Banners eligible for `place_id` at `now`, in input order
    pub fn select<'a>(&self, banners: &'a [Banner], place_id: PlacementId, now: DateTime<Utc>) -> Vec<&'a Banner> {
        let ctx = EligibilityContext { place_id, now };
        banners
            .iter()
            .filter(|banner| self.is_eligible(banner, &ctx))
            .collect()
    }
}

impl Default for EligibilityFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn ctx() -> EligibilityContext {
        EligibilityContext { place_id: 1, now: now() }
    }

    fn banner(banner_id: usize) -> Banner {
        Banner::new(banner_id, "Test Banner", "https://example.com", 5).unwrap().place_on(1)
    }

    #[test]
    fn test_rule_is_active() {
        let mut b = banner(0);
        assert!(rule_is_active(&b, &ctx()));
        b.is_active = false;
        assert!(!rule_is_active(&b, &ctx()));
    }

    #[test]
    fn test_rule_assigned_to_place() {
        let b = banner(0);
        assert!(rule_assigned_to_place(&b, &ctx()));
        let other = EligibilityContext { place_id: 2, now: now() };
        assert!(!rule_assigned_to_place(&b, &other));
    }

    #[test]
    fn test_rule_started_is_inclusive() {
        let mut b = banner(0);
        assert!(rule_started(&b, &ctx()));
        b.start_at = Some(now());
        assert!(rule_started(&b, &ctx()));
        b.start_at = Some(now() + Duration::seconds(1));
        assert!(!rule_started(&b, &ctx()));
    }

    #[test]
    fn test_rule_not_finished_is_inclusive() {
        let mut b = banner(0);
        assert!(rule_not_finished(&b, &ctx()));
        b.finish_at = Some(now());
        assert!(rule_not_finished(&b, &ctx()));
        b.finish_at = Some(now() - Duration::seconds(1));
        assert!(!rule_not_finished(&b, &ctx()));
    }

    #[test]
    fn test_rule_under_view_quota() {
        let mut b = banner(0);
        b.views = 1_000_000;
        assert!(rule_under_view_quota(&b, &ctx()), "0 means unlimited");
        b.max_views = 10;
        b.views = 9;
        assert!(rule_under_view_quota(&b, &ctx()));
        b.views = 10;
        assert!(!rule_under_view_quota(&b, &ctx()));
        b.views = 11;
        assert!(!rule_under_view_quota(&b, &ctx()));
    }

    #[test]
    fn test_rule_under_click_quota() {
        let mut b = banner(0);
        b.clicks = 500;
        assert!(rule_under_click_quota(&b, &ctx()));
        b.max_clicks = 3;
        b.clicks = 2;
        assert!(rule_under_click_quota(&b, &ctx()));
        b.clicks = 3;
        assert!(!rule_under_click_quota(&b, &ctx()));
    }

    #[test]
    fn test_select_keeps_only_eligible() {
        let mut inactive = banner(1);
        inactive.is_active = false;
        let elsewhere = Banner::new(2, "Elsewhere", "https://example.com", 5).unwrap().place_on(7);
        let mut expired = banner(3);
        expired.finish_at = Some(now() - Duration::days(1));
        let mut sold_out = banner(4);
        sold_out.max_views = 100;
        sold_out.views = 100;

        let banners = vec![banner(0), inactive, elsewhere, expired, sold_out, banner(5)];
        let filter = EligibilityFilter::new();
        let ids: Vec<usize> = filter.select(&banners, 1, now()).iter().map(|b| b.banner_id).collect();
        assert_eq!(ids, vec![0, 5]);
    }

    #[test]
    fn test_select_empty_input() {
        let filter = EligibilityFilter::new();
        assert!(filter.select(&[], 1, now()).is_empty());
    }

    #[test]
    fn test_rejected_by_names_first_failing_rule() {
        let filter = EligibilityFilter::new();
        let mut b = banner(0);
        assert_eq!(filter.rejected_by(&b, &ctx()), None);

        b.max_clicks = 1;
        b.clicks = 1;
        assert_eq!(filter.rejected_by(&b, &ctx()), Some("under_click_quota"));

        b.start_at = Some(now() + Duration::hours(1));
        assert_eq!(filter.rejected_by(&b, &ctx()), Some("started"));
    }

    #[test]
    fn test_custom_rule_set() {
        // Only activity matters, placement is ignored
        let filter = EligibilityFilter::with_rules(vec![STANDARD_RULES[0]]);
        let b = Banner::new(0, "Anywhere", "https://example.com", 5).unwrap();
        assert!(filter.is_eligible(&b, &ctx()));
    }
}
