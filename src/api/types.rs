//! api::types
//!
//! Resources returned by the business API.

use serde::{Deserialize, Serialize};

/// A company that investors can put money into.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: u32,
    pub name: String,
    pub region: String,
    pub target_usd: f64,
    pub investment_usd: f64,
    pub no_investors: u32,
}

/// One investment in a company.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub investor_id: String,
    pub amount_usd: f64,
}

/// A company with its transactions.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyTransactions {
    pub id: u32,
    pub company: Company,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

/// User attributes held by the API rather than the authorization server.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiUserInfo {
    /// Job title
    pub title: Option<String>,
    /// Regions the user may see data for
    pub regions: Vec<String>,
}
