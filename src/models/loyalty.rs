use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Earn,
    Redeem,
    Bonus,
    Penalty,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Earn => "earn",
            TransactionType::Redeem => "redeem",
            TransactionType::Bonus => "bonus",
            TransactionType::Penalty => "penalty",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "earn" => Some(TransactionType::Earn),
            "redeem" => Some(TransactionType::Redeem),
            "bonus" => Some(TransactionType::Bonus),
            "penalty" => Some(TransactionType::Penalty),
            _ => None,
        }
    }
}

/// Append-only ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoyaltyTransaction {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub points: i64,
    pub description: String,
    pub reference_id: Option<String>,
    pub reference_type: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoyaltySummary {
    pub user_id: String,
    pub balance: i64,
    pub transactions: Vec<LoyaltyTransaction>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ReconcileReport {
    pub scanned: usize,
    pub repaired: usize,
    pub points_awarded: i64,
}
