//! Aggregations over the audit trail for the reporting dashboard.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use super::domain::round_to;
use super::repository::StoredDecision;
use super::risk::RiskLevel;

pub const TREND_WINDOW_DAYS: i64 = 30;

const INCOME_BRACKETS: [(&str, u32); 3] = [("<3k", 3_000), ("3k-6k", 6_000), ("6k-10k", 10_000)];
const INCOME_OPEN_BRACKET: &str = "10k+";

const LOAN_BUCKETS: [(&str, u32); 3] = [("<1L", 100_000), ("1-2L", 200_000), ("2-5L", 500_000)];
const LOAN_OPEN_BUCKET: &str = "5L+";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DecisionStats {
    pub total_applications: usize,
    pub approved: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyTrend {
    pub date: NaiveDate,
    pub approved: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncomeBracketStats {
    pub bracket: &'static str,
    pub approved: usize,
    pub rejected: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiskCount {
    pub risk_level: RiskLevel,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoanBucketStats {
    pub bucket: &'static str,
    pub approved: usize,
    pub rejected: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyAreaStats {
    pub area: String,
    pub approved: usize,
    pub rejected: usize,
    pub total: usize,
    pub approval_rate: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    approved: usize,
    rejected: usize,
}

impl Tally {
    fn record(&mut self, decision: &StoredDecision) {
        if decision.row.is_approved() {
            self.approved += 1;
        } else {
            self.rejected += 1;
        }
    }

    fn total(&self) -> usize {
        self.approved + self.rejected
    }
}

pub fn summarize(decisions: &[StoredDecision]) -> DecisionStats {
    let approved = decisions.iter().filter(|d| d.row.is_approved()).count();
    DecisionStats {
        total_applications: decisions.len(),
        approved,
        rejected: decisions.len() - approved,
    }
}

/// Per-day counts for the trailing 30 days, oldest day first. Days without decisions are omitted.
pub fn daily_trends(decisions: &[StoredDecision], now: DateTime<Utc>) -> Vec<DailyTrend> {
    let cutoff = now - Duration::days(TREND_WINDOW_DAYS);
    let mut days: BTreeMap<NaiveDate, Tally> = BTreeMap::new();
    for decision in decisions.iter().filter(|d| d.row.created_at >= cutoff) {
        days.entry(decision.row.created_at.date_naive())
            .or_default()
            .record(decision);
    }
    days.into_iter()
        .map(|(date, tally)| DailyTrend {
            date,
            approved: tally.approved,
            rejected: tally.rejected,
        })
        .collect()
}

fn bucket_index(value: u32, bounds: &[(&'static str, u32)]) -> usize {
    bounds
        .iter()
        .position(|(_, upper)| value < *upper)
        .unwrap_or(bounds.len())
}

fn bucketed<F>(
    decisions: &[StoredDecision],
    bounds: &[(&'static str, u32)],
    open_label: &'static str,
    value: F,
) -> Vec<(&'static str, Tally)>
where
    F: Fn(&StoredDecision) -> u32,
{
    let mut tallies = vec![Tally::default(); bounds.len() + 1];
    for decision in decisions {
        tallies[bucket_index(value(decision), bounds)].record(decision);
    }
    bounds
        .iter()
        .map(|(label, _)| *label)
        .chain(std::iter::once(open_label))
        .zip(tallies)
        .filter(|(_, tally)| tally.total() > 0)
        .collect()
}

pub fn income_brackets(decisions: &[StoredDecision]) -> Vec<IncomeBracketStats> {
    bucketed(decisions, &INCOME_BRACKETS, INCOME_OPEN_BRACKET, |d| {
        d.row.applicant.applicant_income
    })
    .into_iter()
    .map(|(bracket, tally)| IncomeBracketStats {
        bracket,
        approved: tally.approved,
        rejected: tally.rejected,
        total: tally.total(),
    })
    .collect()
}

pub fn risk_distribution(decisions: &[StoredDecision]) -> Vec<RiskCount> {
    RiskLevel::ALL
        .into_iter()
        .map(|risk_level| RiskCount {
            risk_level,
            count: decisions
                .iter()
                .filter(|d| d.row.risk_level == risk_level)
                .count(),
        })
        .filter(|entry| entry.count > 0)
        .collect()
}

/// Buckets on the real-currency loan amount (1L = 100 000).
pub fn loan_amount_distribution(decisions: &[StoredDecision]) -> Vec<LoanBucketStats> {
    bucketed(decisions, &LOAN_BUCKETS, LOAN_OPEN_BUCKET, |d| {
        d.row.applicant.loan_amount
    })
    .into_iter()
    .map(|(bucket, tally)| LoanBucketStats {
        bucket,
        approved: tally.approved,
        rejected: tally.rejected,
        total: tally.total(),
    })
    .collect()
}

pub fn property_area_stats(decisions: &[StoredDecision]) -> Vec<PropertyAreaStats> {
    let mut areas: BTreeMap<&str, Tally> = BTreeMap::new();
    for decision in decisions {
        areas
            .entry(decision.row.applicant.property_area.as_str())
            .or_default()
            .record(decision);
    }
    areas
        .into_iter()
        .map(|(area, tally)| PropertyAreaStats {
            area: area.to_string(),
            approved: tally.approved,
            rejected: tally.rejected,
            total: tally.total(),
            approval_rate: round_to(tally.approved as f64 * 100.0 / tally.total() as f64, 1),
        })
        .collect()
}
