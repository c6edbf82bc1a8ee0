//! User-facing edits over a [`LedgerData`] document.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::info;
use uuid::Uuid;

use crate::error::LedgerError;
use crate::month::YearMonth;
use crate::projector::{FinancialSummary, MonthProjection, Projector};
use crate::transaction::{
    validate_fields, LedgerData, NewTransaction, Transaction, TransactionType,
};

/// Expense total for one description within a month
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpenseSlice {
    pub description: String,
    pub total: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    data: LedgerData,
}

impl Ledger {
    pub fn new(data: LedgerData) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &LedgerData {
        &self.data
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.data.transactions
    }

    pub fn add_transaction(&mut self, new: NewTransaction) -> Result<Transaction, LedgerError> {
        new.validate()?;
        let tx = new.with_id(Uuid::new_v4().to_string());
        info!(id = %tx.id, date = %tx.date, amount = tx.amount, kind = tx.kind.as_str(), "added transaction");
        self.data.transactions.push(tx.clone());
        Ok(tx)
    }

    pub fn update_transaction(&mut self, updated: Transaction) -> Result<(), LedgerError> {
        validate_fields(&updated.description, updated.amount)?;
        let slot = self
            .data
            .transactions
            .iter_mut()
            .find(|t| t.id == updated.id)
            .ok_or_else(|| LedgerError::UnknownTransaction(updated.id.clone()))?;
        info!(id = %updated.id, "updated transaction");
        *slot = updated;
        Ok(())
    }

    pub fn delete_transaction(&mut self, id: &str) -> Result<Transaction, LedgerError> {
        let index = self
            .data
            .transactions
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| LedgerError::UnknownTransaction(id.to_string()))?;
        info!(id, "deleted transaction");
        Ok(self.data.transactions.remove(index))
    }

    pub fn find(&self, id: &str) -> Option<&Transaction> {
        self.data.transactions.iter().find(|t| t.id == id)
    }

    /// Earliest transaction month; anchors the rollover walk.
    pub fn earliest_month(&self) -> Option<YearMonth> {
        self.data.transactions.iter().map(Transaction::month).min()
    }

    /// Pin or unpin the start balance of `month`.
    ///
    /// Pinning the first month of the ledger (or any month while the ledger
    /// is empty) rewrites the base start balance instead of storing an
    /// override, and drops any override already stored for that month.
    pub fn set_month_start_balance(&mut self, month: YearMonth, value: Option<i64>) {
        let Some(value) = value else {
            if self.data.month_overrides.remove(&month).is_some() {
                info!(%month, "cleared start balance override");
            }
            return;
        };

        let first_month = self.earliest_month().unwrap_or(month);
        if month == first_month {
            info!(%month, value, "set base start balance");
            self.data.start_balance = value;
            self.data.month_overrides.remove(&month);
        } else {
            info!(%month, value, "pinned start balance override");
            self.data.month_overrides.insert(month, value);
        }
    }

    /// Replace everything, as on import or a remote snapshot.
    pub fn replace_all(&mut self, data: LedgerData) {
        info!(
            transactions = data.transactions.len(),
            overrides = data.month_overrides.len(),
            "replaced ledger contents"
        );
        self.data = data;
    }

    pub fn projector(&self) -> Projector<'_> {
        Projector::new(
            self.data.start_balance,
            &self.data.transactions,
            &self.data.month_overrides,
        )
    }

    pub fn summary(&self, month: YearMonth) -> FinancialSummary {
        self.projector().project(month)
    }

    pub fn timeline(&self, from: YearMonth, to: YearMonth) -> Vec<MonthProjection> {
        self.projector().timeline(from, to)
    }

    /// Transactions dated within `month`, oldest first.
    pub fn month_transactions(&self, month: YearMonth) -> Vec<Transaction> {
        let mut out: Vec<Transaction> = self
            .data
            .transactions
            .iter()
            .filter(|t| month.contains(t.date))
            .cloned()
            .collect();
        out.sort_by_key(|t| t.date);
        out
    }

    /// Expense totals per description for `month`, largest first.
    pub fn expense_breakdown(&self, month: YearMonth) -> Vec<ExpenseSlice> {
        let mut totals: BTreeMap<&str, i64> = BTreeMap::new();
        for t in &self.data.transactions {
            if t.kind == TransactionType::Expense && month.contains(t.date) {
                *totals.entry(t.description.as_str()).or_default() += t.amount;
            }
        }
        let mut slices: Vec<ExpenseSlice> = totals
            .into_iter()
            .map(|(description, total)| ExpenseSlice {
                description: description.to_string(),
                total,
            })
            .collect();
        slices.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.description.cmp(&b.description)));
        slices
    }
}

/// Date prefilled for a new entry while viewing `view`.
pub fn default_entry_date(view: YearMonth, today: NaiveDate) -> NaiveDate {
    if view.contains(today) {
        today
    } else {
        view.first_day().unwrap_or(today)
    }
}
