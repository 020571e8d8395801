//! Contribution configuration and effective-dated category rules.

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::SourceType;

/// A statutory insurance or fund type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionType {
    /// Basic pension insurance.
    Pension,
    /// Basic medical insurance.
    Medical,
    /// Unemployment insurance.
    Unemployment,
    /// Work injury insurance (employer only in most regions).
    WorkInjury,
    /// Maternity insurance.
    Maternity,
    /// Occupational (enterprise) annuity.
    OccupationalAnnuity,
    /// Housing provident fund.
    HousingFund,
}

impl ContributionType {
    /// The rounding policy applied when a config does not name one.
    pub fn default_rounding(self) -> RoundingPolicyKind {
        match self {
            ContributionType::HousingFund => RoundingPolicyKind::Threshold,
            _ => RoundingPolicyKind::Standard,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            ContributionType::Pension => "pension",
            ContributionType::Medical => "medical",
            ContributionType::Unemployment => "unemployment",
            ContributionType::WorkInjury => "work_injury",
            ContributionType::Maternity => "maternity",
            ContributionType::OccupationalAnnuity => "occupational_annuity",
            ContributionType::HousingFund => "housing_fund",
        }
    }
}

impl fmt::Display for ContributionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Names a rounding policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingPolicyKind {
    /// Round half away from zero to two fractional digits.
    Standard,
    /// Integer part, plus one when the discarded fraction is at least 0.1.
    Threshold,
}

/// One insurance or fund type with its rates and base limits.
///
/// # Example
///
/// ```
/// use payroll_engine::models::{ContributionConfig, ContributionType, RoundingPolicyKind};
/// use rust_decimal::Decimal;
///
/// let yaml = r#"
/// id: housing_fund_2024
/// name: Housing provident fund
/// contribution_type: housing_fund
/// employer_rate: "0.12"
/// employee_rate: "0.12"
/// base_floor: "2360.00"
/// base_cap: "35283.00"
/// applicable_personnel_categories: [staff]
/// "#;
/// let config: ContributionConfig = serde_yaml::from_str(yaml).unwrap();
/// assert!(config.is_active);
/// assert_eq!(config.rounding_policy(), RoundingPolicyKind::Threshold);
/// assert_eq!(config.clamp_base(Decimal::new(1000, 0)), Decimal::new(236000, 2));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributionConfig {
    /// Unique identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// The contribution type this config computes.
    pub contribution_type: ContributionType,
    /// Employer contribution rate (e.g. 0.16 for 16%).
    pub employer_rate: Decimal,
    /// Employee contribution rate.
    pub employee_rate: Decimal,
    /// Minimum contribution base, if any.
    #[serde(default)]
    pub base_floor: Option<Decimal>,
    /// Maximum contribution base, if any.
    #[serde(default)]
    pub base_cap: Option<Decimal>,
    /// Personnel categories this contribution applies to.
    #[serde(default)]
    pub applicable_personnel_categories: BTreeSet<String>,
    /// Whether the config is in use.
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// Source domain whose matched staging record supplies the base.
    /// When absent the employee's gross pay is the base.
    #[serde(default)]
    pub staged_source: Option<SourceType>,
    /// Explicit rounding policy; defaults by contribution type.
    #[serde(default)]
    pub rounding: Option<RoundingPolicyKind>,
}

pub(crate) fn default_true() -> bool {
    true
}

impl ContributionConfig {
    /// Clamps a contribution base to the configured floor and cap.
    pub fn clamp_base(&self, base: Decimal) -> Decimal {
        let floored = match self.base_floor {
            Some(floor) if base < floor => floor,
            _ => base,
        };
        match self.base_cap {
            Some(cap) if floored > cap => cap,
            _ => floored,
        }
    }

    /// The rounding policy used for this config's amounts.
    pub fn rounding_policy(&self) -> RoundingPolicyKind {
        self.rounding
            .unwrap_or_else(|| self.contribution_type.default_rounding())
    }

    /// Whether this config applies to a personnel category.
    pub fn applies_to(&self, category: &str) -> bool {
        self.applicable_personnel_categories.contains(category)
    }
}

/// A half-open date interval `[start, end)`; `end = None` is open-ended.
///
/// # Example
///
/// ```
/// use payroll_engine::models::EffectiveInterval;
/// use chrono::NaiveDate;
///
/// let d = |m, day| NaiveDate::from_ymd_opt(2024, m, day).unwrap();
/// let interval = EffectiveInterval::new(d(1, 1), Some(d(7, 1)));
/// assert!(interval.contains(d(6, 30)));
/// assert!(!interval.contains(d(7, 1)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveInterval {
    /// First day the interval covers.
    pub effective_date: NaiveDate,
    /// First day the interval no longer covers.
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

impl EffectiveInterval {
    /// Creates an interval.
    pub fn new(effective_date: NaiveDate, end_date: Option<NaiveDate>) -> Self {
        Self {
            effective_date,
            end_date,
        }
    }

    /// True if `end_date`, when set, is after `effective_date`.
    pub fn is_well_formed(&self) -> bool {
        self.end_date.is_none_or(|end| end > self.effective_date)
    }

    /// True if the interval covers `date`.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.effective_date <= date && self.end_date.is_none_or(|end| end > date)
    }

    /// True if the two intervals share at least one day.
    pub fn overlaps(&self, other: &EffectiveInterval) -> bool {
        let self_starts_before_other_ends = other
            .end_date
            .is_none_or(|end| self.effective_date < end);
        let other_starts_before_self_ends = self
            .end_date
            .is_none_or(|end| other.effective_date < end);
        self_starts_before_other_ends && other_starts_before_self_ends
    }
}

/// Associates a personnel category with a contribution config over an
/// effective interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    /// The personnel category.
    pub personnel_category_id: String,
    /// The contribution config this rule selects.
    pub config_id: String,
    /// The dates the rule is in force.
    #[serde(flatten)]
    pub interval: EffectiveInterval,
    /// Whether the rule is in use.
    #[serde(default = "default_true")]
    pub is_active: bool,
}
