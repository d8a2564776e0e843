use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Cents;

pub type CustomerId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerSegment {
    VipHighValue,
    StrategicAccount,
    GrowingBusiness,
    StableRegular,
    OccasionalBuyer,
    PriceSensitive,
    PaymentDelayed,
    AtRiskChurn,
}

impl CustomerSegment {
    pub const ALL: [CustomerSegment; 8] = [
        CustomerSegment::VipHighValue,
        CustomerSegment::StrategicAccount,
        CustomerSegment::GrowingBusiness,
        CustomerSegment::StableRegular,
        CustomerSegment::OccasionalBuyer,
        CustomerSegment::PriceSensitive,
        CustomerSegment::PaymentDelayed,
        CustomerSegment::AtRiskChurn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerSegment::VipHighValue => "vip_high_value",
            CustomerSegment::StrategicAccount => "strategic_account",
            CustomerSegment::GrowingBusiness => "growing_business",
            CustomerSegment::StableRegular => "stable_regular",
            CustomerSegment::OccasionalBuyer => "occasional_buyer",
            CustomerSegment::PriceSensitive => "price_sensitive",
            CustomerSegment::PaymentDelayed => "payment_delayed",
            CustomerSegment::AtRiskChurn => "at_risk_churn",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        let normalized = s.to_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|seg| seg.as_str() == normalized)
    }

    pub fn label(&self) -> &'static str {
        match self {
            CustomerSegment::VipHighValue => "Client VIP haute valeur",
            CustomerSegment::StrategicAccount => "Compte stratégique",
            CustomerSegment::GrowingBusiness => "Entreprise en croissance",
            CustomerSegment::StableRegular => "Client régulier stable",
            CustomerSegment::OccasionalBuyer => "Acheteur occasionnel",
            CustomerSegment::PriceSensitive => "Sensible au prix",
            CustomerSegment::PaymentDelayed => "Paiement différé",
            CustomerSegment::AtRiskChurn => "À risque de désabonnement",
        }
    }

    pub fn is_high_value(&self) -> bool {
        matches!(
            self,
            CustomerSegment::VipHighValue | CustomerSegment::StrategicAccount
        )
    }
}

impl std::fmt::Display for CustomerSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentBehavior {
    EarlyPayer,
    PromptPayer,
    RegularDelay,
    Negotiator,
    ProblematicPayer,
}

impl PaymentBehavior {
    pub const ALL: [PaymentBehavior; 5] = [
        PaymentBehavior::EarlyPayer,
        PaymentBehavior::PromptPayer,
        PaymentBehavior::RegularDelay,
        PaymentBehavior::Negotiator,
        PaymentBehavior::ProblematicPayer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentBehavior::EarlyPayer => "early_payer",
            PaymentBehavior::PromptPayer => "prompt_payer",
            PaymentBehavior::RegularDelay => "regular_delay",
            PaymentBehavior::Negotiator => "negotiator",
            PaymentBehavior::ProblematicPayer => "problematic_payer",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        let normalized = s.to_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|b| b.as_str() == normalized)
    }
}

impl std::fmt::Display for PaymentBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(RiskLevel::Low),
            "medium" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            _ => None,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Aggregate purchasing statistics, the only inputs of the scoring rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerStats {
    pub total_revenue_cents: Cents,
    /// Number of purchases
    pub purchase_frequency: u32,
    pub last_purchase_at: Option<DateTime<Utc>>,
    /// Average payment delay in days; zero or negative means early
    pub avg_payment_delay_days: i32,
}

/// Output of the scoring rules, cached on the customer row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerIntelligence {
    pub score: u8,
    pub segment: CustomerSegment,
    /// In [0, 1], four decimals
    pub churn_probability: f64,
    pub predicted_ltv_cents: Cents,
    pub payment_behavior: PaymentBehavior,
    pub satisfaction_score: u8,
    pub risk_level: RiskLevel,
    pub days_since_last_purchase: Option<i64>,
    pub avg_order_value_cents: Cents,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub email: Option<String>,
    pub stats: CustomerStats,
    pub active: bool,
    /// Last computed intelligence, `None` until first scored
    pub intelligence: Option<CustomerIntelligence>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(name: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            email: None,
            stats: CustomerStats::default(),
            active: true,
            intelligence: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_stats(mut self, stats: CustomerStats) -> Self {
        self.stats = stats;
        self
    }

    /// Fold one purchase into the aggregate statistics and return the new
    /// total revenue. Returns `None`, leaving the customer untouched, when
    /// the total would overflow.
    pub fn record_purchase(&mut self, amount_cents: Cents, at: DateTime<Utc>) -> Option<Cents> {
        let total = self.stats.total_revenue_cents.checked_add(amount_cents)?;
        self.stats.total_revenue_cents = total;
        self.stats.purchase_frequency = self.stats.purchase_frequency.saturating_add(1);
        if self.stats.last_purchase_at.is_none_or(|last| at > last) {
            self.stats.last_purchase_at = Some(at);
        }
        self.updated_at = Utc::now();
        Some(total)
    }

    pub fn segment(&self) -> Option<CustomerSegment> {
        self.intelligence.as_ref().map(|i| i.segment)
    }
}
