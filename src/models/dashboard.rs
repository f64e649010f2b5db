//! Dashboard statistics types and the aggregation rules behind them

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// The two timestamps of a loan that the dashboards care about
#[derive(Debug, Clone, FromRow)]
pub struct LoanActivity {
    pub issued_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StatEntry {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TimeSeriesEntry {
    pub date: NaiveDate,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminDashboardStats {
    pub total_loans: i64,
    pub active_loans: i64,
    pub returned_loans: i64,
    pub overdue_loans: i64,
    pub total_users: i64,
    pub loan_status_chart: Vec<StatEntry>,
    pub loans_over_time: Vec<TimeSeriesEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserDashboardStats {
    pub my_total_loans: i64,
    pub my_active_loans: i64,
    pub my_returned_loans: i64,
    pub my_overdue_loans: i64,
    pub my_loan_status_chart: Vec<StatEntry>,
}

/// Loan counters shared by both dashboards
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoanSummary {
    pub total: i64,
    pub active: i64,
    pub returned: i64,
    pub overdue: i64,
}

impl LoanSummary {
    /// Count loans; an outstanding loan issued before `now - overdue_after_days` is overdue.
    pub fn from_activity(loans: &[LoanActivity], now: DateTime<Utc>, overdue_after_days: i64) -> Self {
        let cutoff = now - Duration::days(overdue_after_days);
        loans.iter().fold(Self::default(), |mut acc, loan| {
            acc.total += 1;
            match loan.returned_at {
                Some(_) => acc.returned += 1,
                None => {
                    acc.active += 1;
                    if loan.issued_at < cutoff {
                        acc.overdue += 1;
                    }
                }
            }
            acc
        })
    }

    fn chart(&self, always_show_overdue: bool) -> Vec<StatEntry> {
        let mut chart = vec![
            StatEntry { name: "Active".to_string(), value: self.active },
            StatEntry { name: "Returned".to_string(), value: self.returned },
        ];
        if always_show_overdue || self.overdue > 0 {
            chart.push(StatEntry { name: "Overdue".to_string(), value: self.overdue });
        }
        chart
    }
}

/// Number of issues per calendar day (UTC), oldest first
pub fn loans_over_time(loans: &[LoanActivity]) -> Vec<TimeSeriesEntry> {
    let mut by_day: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for loan in loans {
        *by_day.entry(loan.issued_at.date_naive()).or_default() += 1;
    }
    by_day
        .into_iter()
        .map(|(date, count)| TimeSeriesEntry { date, count })
        .collect()
}

impl AdminDashboardStats {
    pub fn build(loans: &[LoanActivity], total_users: i64, now: DateTime<Utc>, overdue_after_days: i64) -> Self {
        let summary = LoanSummary::from_activity(loans, now, overdue_after_days);
        Self {
            total_loans: summary.total,
            active_loans: summary.active,
            returned_loans: summary.returned,
            overdue_loans: summary.overdue,
            total_users,
            loan_status_chart: summary.chart(true),
            loans_over_time: loans_over_time(loans),
        }
    }
}

impl UserDashboardStats {
    pub fn build(loans: &[LoanActivity], now: DateTime<Utc>, overdue_after_days: i64) -> Self {
        let summary = LoanSummary::from_activity(loans, now, overdue_after_days);
        Self {
            my_total_loans: summary.total,
            my_active_loans: summary.active,
            my_returned_loans: summary.returned,
            my_overdue_loans: summary.overdue,
            my_loan_status_chart: summary.chart(false),
        }
    }
}
