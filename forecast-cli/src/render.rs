use forecast_core::{
    format_amount, ExpenseSlice, FinancialSummary, MonthProjection, SyncStatus, Transaction, TransactionType,
    YearMonth,
};

pub fn status_label(status: &SyncStatus) -> String {
    match status {
        SyncStatus::Idle => "idle".to_string(),
        SyncStatus::Saving => "saving".to_string(),
        SyncStatus::Synced => "synced".to_string(),
        SyncStatus::Error(message) => format!("error: {message}"),
    }
}

fn start_note(summary: &FinancialSummary) -> &'static str {
    if summary.is_manual_override {
        " (manual)"
    } else if summary.is_carry_over {
        " (carried over)"
    } else {
        ""
    }
}

pub fn summary_lines(month: YearMonth, summary: &FinancialSummary, symbol: &str) -> Vec<String> {
    vec![
        format!("# {month}"),
        format!(
            "Start balance:     {:>14}{}",
            format_amount(summary.start_balance, symbol),
            start_note(summary)
        ),
        format!("Income:            {:>14}", format_amount(summary.total_income, symbol)),
        format!("Expense:           {:>14}", format_amount(summary.total_expense, symbol)),
        format!("Projected balance: {:>14}", format_amount(summary.projected_balance, symbol)),
    ]
}

pub fn transaction_line(t: &Transaction, symbol: &str) -> String {
    let sign = match t.kind {
        TransactionType::Income => '+',
        TransactionType::Expense => '-',
    };
    format!(
        "{}  {sign}{:>12}  {}  [{}]",
        t.date,
        format_amount(t.amount, symbol),
        t.description,
        t.id
    )
}

pub fn breakdown_line(slice: &ExpenseSlice, total: i64, symbol: &str) -> String {
    let share = if total > 0 { slice.total as f64 * 100.0 / total as f64 } else { 0.0 };
    format!("{:>12}  {:>5.1}%  {}", format_amount(slice.total, symbol), share, slice.description)
}

pub fn timeline_line(row: &MonthProjection, symbol: &str) -> String {
    let s = &row.summary;
    format!(
        "{}  start {:>12}  +{:>11}  -{:>11}  = {:>12}{}",
        row.month,
        format_amount(s.start_balance, symbol),
        format_amount(s.total_income, symbol),
        format_amount(s.total_expense, symbol),
        format_amount(s.projected_balance, symbol),
        if s.is_manual_override { "  *" } else { "" }
    )
}

pub fn print_summary(
    month: YearMonth,
    summary: &FinancialSummary,
    transactions: &[Transaction],
    breakdown: &[ExpenseSlice],
    symbol: &str,
) {
    for line in summary_lines(month, summary, symbol) {
        println!("{line}");
    }

    if !breakdown.is_empty() {
        println!("\n## Expenses by description\n");
        for slice in breakdown {
            println!("{}", breakdown_line(slice, summary.total_expense, symbol));
        }
    }

    println!("\n## Transactions\n");
    if transactions.is_empty() {
        println!("(none)");
    }
    for t in transactions {
        println!("{}", transaction_line(t, symbol));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use forecast_core::NewTransaction;

    fn summary(carry: bool, manual: bool) -> FinancialSummary {
        FinancialSummary {
            start_balance: 800,
            total_income: 0,
            total_expense: 200,
            projected_balance: 600,
            is_carry_over: carry,
            is_manual_override: manual,
        }
    }

    #[test]
    fn test_summary_marks_start_source() {
        let feb = YearMonth::new(2024, 2).unwrap();
        let lines = summary_lines(feb, &summary(true, false), "¥");
        assert_eq!(lines[0], "# 2024-02");
        assert!(lines[1].ends_with("¥800 (carried over)"));
        assert!(summary_lines(feb, &summary(false, true), "¥")[1].ends_with("(manual)"));
        assert!(lines[4].ends_with("¥600"));
    }

    #[test]
    fn test_transaction_line() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let t = NewTransaction::new("家賃", 85000, TransactionType::Expense, date).with_id("abc");
        let line = transaction_line(&t, "¥");
        assert!(line.starts_with("2024-01-15  -"));
        assert!(line.contains("¥85,000  家賃  [abc]"));
    }

    #[test]
    fn test_breakdown_share() {
        let slice = ExpenseSlice {
            description: "食費".to_string(),
            total: 250,
        };
        assert!(breakdown_line(&slice, 1000, "¥").contains(" 25.0%"));
        assert!(breakdown_line(&slice, 0, "¥").contains("  0.0%"));
    }

    #[test]
    fn test_status_label() {
        assert_eq!(status_label(&SyncStatus::Synced), "synced");
        assert_eq!(status_label(&SyncStatus::Error("boom".into())), "error: boom");
    }
}
