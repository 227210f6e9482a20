//! ui::output
//!
//! Output formatting and display.
//!
//! # Design
//!
//! Output is formatted consistently and respects the quiet flag. Results go
//! to stdout; errors, warnings and debug notes go to stderr.

use std::fmt::Display;

use crate::api::{ApiUserInfo, Company, CompanyTransactions};
use crate::auth::OAuthUserInfo;

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Quiet mode - minimal output
    Quiet,
    /// Normal mode - standard output
    Normal,
    /// Debug mode - verbose output
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }

    /// Default log filter directive for this verbosity.
    pub fn log_filter(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "error",
            Verbosity::Normal => "warn",
            Verbosity::Debug => "debug",
        }
    }
}

/// Print a message (respects quiet mode).
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

/// Print an error message (always shown).
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

/// Print a warning message (respects quiet mode).
pub fn warn(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        eprintln!("warning: {}", message);
    }
}

/// Print a success message (respects quiet mode).
pub fn success(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

/// Format a list of items.
pub fn format_list<T: Display>(items: &[T], prefix: &str) -> String {
    items
        .iter()
        .map(|item| format!("{}{}", prefix, item))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format an amount in whole US dollars with thousands separators.
pub fn format_usd(amount: f64) -> String {
    let whole = amount.round() as i64;
    let digits = whole.unsigned_abs().to_string();

    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    if whole < 0 {
        format!("-${}", grouped)
    } else {
        format!("${}", grouped)
    }
}

/// Format the companies list.
pub fn format_companies(companies: &[Company]) -> String {
    if companies.is_empty() {
        return "No companies".to_string();
    }

    let rows: Vec<String> = companies
        .iter()
        .map(|c| {
            format!(
                "{:>4}  {:<24} {:<10} target {:>14}  invested {:>14}  investors {}",
                c.id,
                c.name,
                c.region,
                format_usd(c.target_usd),
                format_usd(c.investment_usd),
                c.no_investors
            )
        })
        .collect();
    rows.join("\n")
}

/// Format a company's transactions.
pub fn format_transactions(data: &CompanyTransactions) -> String {
    let mut out = format!("{} ({})", data.company.name, data.company.region);
    if data.transactions.is_empty() {
        out.push_str("\n  No transactions");
        return out;
    }

    let rows: Vec<String> = data
        .transactions
        .iter()
        .map(|t| {
            format!(
                "{:<8} investor {:<10} {:>14}",
                t.id,
                t.investor_id,
                format_usd(t.amount_usd)
            )
        })
        .collect();
    out.push('\n');
    out.push_str(&format_list(&rows, "  "));
    out
}

/// Format user details from both the authorization server and the API.
pub fn format_user(oauth: Option<&OAuthUserInfo>, api: Option<&ApiUserInfo>) -> String {
    let mut lines = Vec::new();
    if let Some(oauth) = oauth {
        lines.push(format!("Name:    {} {}", oauth.given_name, oauth.family_name));
    }
    if let Some(api) = api {
        if let Some(title) = &api.title {
            lines.push(format!("Title:   {}", title));
        }
        if !api.regions.is_empty() {
            lines.push(format!("Regions: {}", api.regions.join(", ")));
        }
    }

    if lines.is_empty() {
        "No user details".to_string()
    } else {
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Transaction;

    fn company() -> Company {
        Company {
            id: 2,
            name: "Global Health".to_string(),
            region: "Europe".to_string(),
            target_usd: 15_000_000.0,
            investment_usd: 9_000_000.0,
            no_investors: 450,
        }
    }

    #[test]
    fn verbosity_from_flags() {
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Debug);
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
        assert_eq!(Verbosity::Debug.log_filter(), "debug");
    }

    #[test]
    fn usd_grouping() {
        assert_eq!(format_usd(0.0), "$0");
        assert_eq!(format_usd(999.0), "$999");
        assert_eq!(format_usd(1000.0), "$1,000");
        assert_eq!(format_usd(15_000_000.0), "$15,000,000");
        assert_eq!(format_usd(-2500.4), "-$2,500");
    }

    #[test]
    fn companies_table() {
        let out = format_companies(&[company()]);
        assert!(out.contains("Global Health"));
        assert!(out.contains("$15,000,000"));
        assert_eq!(format_companies(&[]), "No companies");
    }

    #[test]
    fn transactions_list() {
        let out = format_transactions(&CompanyTransactions {
            id: 2,
            company: company(),
            transactions: vec![Transaction {
                id: "11".to_string(),
                investor_id: "11X".to_string(),
                amount_usd: 100_000.0,
            }],
        });
        assert!(out.starts_with("Global Health (Europe)"));
        assert!(out.contains("  11 "));
        assert!(out.contains("$100,000"));
    }

    #[test]
    fn user_details() {
        let oauth = OAuthUserInfo {
            given_name: "Guest".to_string(),
            family_name: "User".to_string(),
        };
        let api = ApiUserInfo {
            title: Some("Senior Investment Advisor".to_string()),
            regions: vec!["USA".to_string(), "Europe".to_string()],
        };

        let out = format_user(Some(&oauth), Some(&api));
        assert!(out.contains("Guest User"));
        assert!(out.contains("USA, Europe"));
        assert_eq!(format_user(None, None), "No user details");
    }

    #[test]
    fn format_list_prefixes() {
        assert_eq!(format_list(&["a", "b"], "- "), "- a\n- b");
    }
}
