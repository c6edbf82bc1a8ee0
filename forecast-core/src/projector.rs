//! Month-by-month balance rollover with manual overrides.
//!
//! The walk starts at the month of the earliest transaction, carrying the
//! running balance forward one month at a time. A month with an override
//! adopts it at entry, before that month's income and expense are applied.
//! Months before the earliest transaction are never walked: their start
//! balance is the override for that month or the base balance directly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::month::YearMonth;
use crate::transaction::{MonthOverrides, Transaction, TransactionType};

/// Derived figures for one viewed month.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FinancialSummary {
    pub start_balance: i64,
    pub total_income: i64,
    pub total_expense: i64,
    pub projected_balance: i64,
    /// Start balance was inherited from earlier months
    pub is_carry_over: bool,
    /// Start balance was pinned by the user
    pub is_manual_override: bool,
}

impl FinancialSummary {
    fn from_parts(start_balance: i64, flow: MonthFlow, is_carry_over: bool, is_manual_override: bool) -> Self {
        Self {
            start_balance,
            total_income: flow.income,
            total_expense: flow.expense,
            projected_balance: start_balance.saturating_add(flow.income).saturating_sub(flow.expense),
            is_carry_over,
            is_manual_override,
        }
    }
}

/// Income and expense totals for a single month.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonthFlow {
    pub income: i64,
    pub expense: i64,
}

impl MonthFlow {
    pub fn net(&self) -> i64 {
        self.income.saturating_sub(self.expense)
    }
}

/// One row of a projected timeline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonthProjection {
    pub month: YearMonth,
    pub summary: FinancialSummary,
}

/// Borrowed view over a ledger with flows pre-bucketed by month.
///
/// Building one is linear in the number of transactions; each projection is
/// linear in the number of months walked.
#[derive(Debug)]
pub struct Projector<'a> {
    base_start_balance: i64,
    overrides: &'a MonthOverrides,
    flows: BTreeMap<YearMonth, MonthFlow>,
    earliest: Option<YearMonth>,
}

impl<'a> Projector<'a> {
    pub fn new(base_start_balance: i64, transactions: &[Transaction], overrides: &'a MonthOverrides) -> Self {
        let mut flows: BTreeMap<YearMonth, MonthFlow> = BTreeMap::new();
        for tx in transactions {
            let flow = flows.entry(tx.month()).or_default();
            match tx.kind {
                TransactionType::Income => flow.income = flow.income.saturating_add(tx.amount),
                TransactionType::Expense => flow.expense = flow.expense.saturating_add(tx.amount),
            }
        }
        let earliest = flows.keys().next().copied();
        Self {
            base_start_balance,
            overrides,
            flows,
            earliest,
        }
    }

    /// Month of the chronologically first transaction, if any.
    pub fn earliest_month(&self) -> Option<YearMonth> {
        self.earliest
    }

    pub fn flow(&self, month: YearMonth) -> MonthFlow {
        self.flows.get(&month).copied().unwrap_or_default()
    }

    pub fn project(&self, target: YearMonth) -> FinancialSummary {
        let earliest = self.earliest.unwrap_or(target);
        if target < earliest {
            let pinned = self.overrides.get(&target).copied();
            let start = pinned.unwrap_or(self.base_start_balance);
            return FinancialSummary::from_parts(start, self.flow(target), false, pinned.is_some());
        }

        let carried = self.carried_into(earliest, target);
        debug!(%target, %earliest, carried, "rolled balance forward");
        self.summarize(target, earliest, carried)
    }

    /// Projections for every month in `from..=to`, in calendar order.
    ///
    /// The walk up to `from` happens once; later rows reuse the carried balance.
    pub fn timeline(&self, from: YearMonth, to: YearMonth) -> Vec<MonthProjection> {
        let mut carried: Option<i64> = None;
        from.through(to)
            .map(|month| {
                let summary = match self.earliest {
                    Some(earliest) if month >= earliest => {
                        let entering = carried.unwrap_or_else(|| self.carried_into(earliest, month));
                        carried = Some(self.close(month, entering));
                        self.summarize(month, earliest, entering)
                    }
                    _ => self.project(month),
                };
                MonthProjection { month, summary }
            })
            .collect()
    }

    /// Balance carried into `target` by walking `earliest..target`.
    fn carried_into(&self, earliest: YearMonth, target: YearMonth) -> i64 {
        earliest
            .through(target)
            .take_while(|m| *m < target)
            .fold(self.base_start_balance, |rolling, month| self.close(month, rolling))
    }

    /// Closing balance of `month` given the balance carried into it. An
    /// override replaces the carried value before the month's flows apply.
    fn close(&self, month: YearMonth, carried: i64) -> i64 {
        let start = self.overrides.get(&month).copied().unwrap_or(carried);
        start.saturating_add(self.flow(month).net())
    }

    fn summarize(&self, target: YearMonth, earliest: YearMonth, carried: i64) -> FinancialSummary {
        let pinned = self.overrides.get(&target).copied();
        let start = pinned.unwrap_or(carried);
        let is_carry_over = pinned.is_none() && target > earliest;
        FinancialSummary::from_parts(start, self.flow(target), is_carry_over, pinned.is_some())
    }
}

/// Project the balance of `target` from the full ledger inputs.
pub fn project(
    base_start_balance: i64,
    transactions: &[Transaction],
    overrides: &MonthOverrides,
    target: YearMonth,
) -> FinancialSummary {
    Projector::new(base_start_balance, transactions, overrides).project(target)
}
