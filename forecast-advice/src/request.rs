//! What gets sent to the advice model for one viewed month.

use forecast_core::{format_amount, FinancialSummary, Ledger, Transaction, YearMonth};

/// Shown when the model answers with nothing.
pub const FALLBACK_ADVICE: &str = "No advice could be generated for this month.";

#[derive(Debug, Clone)]
pub struct AdviceRequest {
    pub month: YearMonth,
    pub summary: FinancialSummary,
    pub transactions: Vec<Transaction>,
    pub currency_symbol: String,
    /// Language the answer should be written in
    pub language: String,
}

impl AdviceRequest {
    pub fn for_month(ledger: &Ledger, month: YearMonth, currency_symbol: &str, language: &str) -> Self {
        Self {
            month,
            summary: ledger.summary(month),
            transactions: ledger.month_transactions(month),
            currency_symbol: currency_symbol.to_string(),
            language: language.to_string(),
        }
    }

    fn money(&self, value: i64) -> String {
        format_amount(value, &self.currency_symbol)
    }

    pub fn system_prompt(&self) -> String {
        format!(
            "You are a friendly and practical financial advisor. Answer in {} in under 200 words, \
             using short paragraphs or bullet points.",
            self.language
        )
    }

    pub fn user_prompt(&self) -> String {
        let s = &self.summary;
        let mut out = String::new();
        out.push_str(&format!("Monthly snapshot for {}\n\n", self.month));
        out.push_str("Summary:\n");
        out.push_str(&format!("- Starting balance: {}\n", self.money(s.start_balance)));
        out.push_str(&format!("- Total income: {}\n", self.money(s.total_income)));
        out.push_str(&format!("- Total expenses: {}\n", self.money(s.total_expense)));
        out.push_str(&format!("- Projected month-end balance: {}\n\n", self.money(s.projected_balance)));

        out.push_str("Transactions:\n");
        if self.transactions.is_empty() {
            out.push_str("- (none)\n");
        }
        for t in &self.transactions {
            out.push_str(&format!(
                "- {}: {} ({}) - {}\n",
                t.date,
                t.description,
                t.kind.as_str(),
                self.money(t.amount)
            ));
        }

        out.push_str(
            "\nPlease provide:\n\
             1. A brief assessment of the month's financial health (Good, Tight, or Risky).\n\
             2. One specific, actionable tip based on these entries.\n\
             3. A short encouraging closing remark.\n",
        );
        out
    }
}
