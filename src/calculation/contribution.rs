//! Contribution amount calculation.
//!
//! Clamps a contribution base to the config's floor and cap, multiplies it
//! by each side's rate at full precision, and rounds by the config's policy.

use rust_decimal::Decimal;

use super::rounding::rounding_policy;
use crate::models::{AuditStep, CategoryRule, ContributionConfig, ContributionLine};

/// The result of calculating one contribution type, including its audit step.
#[derive(Debug, Clone)]
pub struct ContributionResult {
    /// The rounded amounts and the inputs behind them.
    pub line: ContributionLine,
    /// The audit step recording this calculation.
    pub audit_step: AuditStep,
}

/// Calculates the employer and employee amounts for one contribution type.
///
/// # Arguments
///
/// * `config` - The config selected by the rule resolver
/// * `rule` - The rule that selected it
/// * `raw_base` - The unclamped contribution base
/// * `step_number` - The step number for audit trail sequencing
///
/// # Examples
///
/// ```
/// use payroll_engine::calculation::calculate_contribution;
/// use payroll_engine::models::{
///     CategoryRule, ContributionConfig, ContributionType, EffectiveInterval,
/// };
/// use chrono::NaiveDate;
/// use rust_decimal::Decimal;
/// use std::str::FromStr;
///
/// let config = ContributionConfig {
///     id: "housing_fund_2024".to_string(),
///     name: "Housing fund".to_string(),
///     contribution_type: ContributionType::HousingFund,
///     employer_rate: Decimal::from_str("0.12").unwrap(),
///     employee_rate: Decimal::from_str("0.12").unwrap(),
///     base_floor: None,
///     base_cap: Some(Decimal::from_str("30000").unwrap()),
///     applicable_personnel_categories: ["staff".to_string()].into(),
///     is_active: true,
///     staged_source: None,
///     rounding: None,
/// };
/// let rule = CategoryRule {
///     personnel_category_id: "staff".to_string(),
///     config_id: config.id.clone(),
///     interval: EffectiveInterval::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), None),
///     is_active: true,
/// };
///
/// let result = calculate_contribution(&config, &rule, Decimal::from_str("8333.75").unwrap(), 1);
/// // 8333.75 x 0.12 = 1000.05, below the 0.1 threshold
/// assert_eq!(result.line.employee_amount, Decimal::from_str("1000").unwrap());
/// ```
pub fn calculate_contribution(
    config: &ContributionConfig,
    rule: &CategoryRule,
    raw_base: Decimal,
    step_number: u32,
) -> ContributionResult {
    let base = config.clamp_base(raw_base);
    let policy = rounding_policy(config.rounding_policy());

    let raw_employer = base * config.employer_rate;
    let raw_employee = base * config.employee_rate;
    let employer_amount = policy.round(raw_employer);
    let employee_amount = policy.round(raw_employee);

    let clamp_note = if base == raw_base {
        String::new()
    } else {
        format!(" (base {} clamped to {})", raw_base.normalize(), base.normalize())
    };

    let audit_step = AuditStep {
        step_number,
        rule_id: format!("contribution:{}", config.contribution_type),
        rule_name: config.name.clone(),
        input: serde_json::json!({
            "config_id": config.id,
            "rule_effective_date": rule.interval.effective_date.to_string(),
            "raw_base": raw_base.normalize().to_string(),
            "base_floor": config.base_floor.map(|d| d.normalize().to_string()),
            "base_cap": config.base_cap.map(|d| d.normalize().to_string()),
            "employer_rate": config.employer_rate.normalize().to_string(),
            "employee_rate": config.employee_rate.normalize().to_string()
        }),
        output: serde_json::json!({
            "base": base.normalize().to_string(),
            "employer_raw": raw_employer.normalize().to_string(),
            "employee_raw": raw_employee.normalize().to_string(),
            "employer_amount": employer_amount.to_string(),
            "employee_amount": employee_amount.to_string(),
            "rounding": config.rounding_policy()
        }),
        reasoning: format!(
            "{} x {} = {} (employer), {} x {} = {} (employee){}",
            base.normalize(),
            config.employer_rate.normalize(),
            employer_amount,
            base.normalize(),
            config.employee_rate.normalize(),
            employee_amount,
            clamp_note
        ),
    };

    ContributionResult {
        line: ContributionLine {
            contribution_type: config.contribution_type,
            config_id: config.id.clone(),
            rule_effective_date: rule.interval.effective_date,
            base,
            employer_rate: config.employer_rate,
            employee_rate: config.employee_rate,
            employer_amount,
            employee_amount,
            rounding: config.rounding_policy(),
        },
        audit_step,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContributionType, EffectiveInterval, RoundingPolicyKind};
    use chrono::NaiveDate;
    use std::collections::BTreeSet;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn config(contribution_type: ContributionType, employer: &str, employee: &str) -> ContributionConfig {
        ContributionConfig {
            id: format!("{contribution_type}_2024"),
            name: contribution_type.to_string(),
            contribution_type,
            employer_rate: dec(employer),
            employee_rate: dec(employee),
            base_floor: Some(dec("4000")),
            base_cap: Some(dec("30000")),
            applicable_personnel_categories: BTreeSet::from(["staff".to_string()]),
            is_active: true,
            staged_source: None,
            rounding: None,
        }
    }

    fn rule(config: &ContributionConfig) -> CategoryRule {
        CategoryRule {
            personnel_category_id: "staff".to_string(),
            config_id: config.id.clone(),
            interval: EffectiveInterval::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), None),
            is_active: true,
        }
    }

    #[test]
    fn test_standard_contribution() {
        let config = config(ContributionType::Pension, "0.16", "0.08");
        let result = calculate_contribution(&config, &rule(&config), dec("12345.67"), 1);

        assert_eq!(result.line.base, dec("12345.67"));
        // 12345.67 x 0.16 = 1975.3072
        assert_eq!(result.line.employer_amount, dec("1975.31"));
        // 12345.67 x 0.08 = 987.6536
        assert_eq!(result.line.employee_amount, dec("987.65"));
        assert_eq!(result.line.rounding, RoundingPolicyKind::Standard);
        assert_eq!(result.audit_step.rule_id, "contribution:pension");
    }

    #[test]
    fn test_base_clamped_to_cap() {
        let config = config(ContributionType::Medical, "0.095", "0.02");
        let result = calculate_contribution(&config, &rule(&config), dec("45000"), 2);

        assert_eq!(result.line.base, dec("30000"));
        assert_eq!(result.line.employer_amount, dec("2850.00"));
        assert_eq!(result.line.employee_amount, dec("600.00"));
        assert!(result.audit_step.reasoning.contains("clamped to 30000"));
    }

    #[test]
    fn test_base_clamped_to_floor() {
        let config = config(ContributionType::Unemployment, "0.005", "0.005");
        let result = calculate_contribution(&config, &rule(&config), dec("1500"), 3);

        assert_eq!(result.line.base, dec("4000"));
        assert_eq!(result.line.employee_amount, dec("20.00"));
    }

    #[test]
    fn test_housing_fund_uses_threshold_rounding() {
        let config = config(ContributionType::HousingFund, "0.12", "0.07");
        // 10001 x 0.12 = 1200.12, 10001 x 0.07 = 700.07
        let result = calculate_contribution(&config, &rule(&config), dec("10001"), 4);

        assert_eq!(result.line.rounding, RoundingPolicyKind::Threshold);
        assert_eq!(result.line.employer_amount, dec("1201"));
        assert_eq!(result.line.employee_amount, dec("700"));
        assert_eq!(result.audit_step.output["rounding"], "threshold");
    }

    #[test]
    fn test_explicit_rounding_overrides_type_default() {
        let mut config = config(ContributionType::HousingFund, "0.12", "0.07");
        config.rounding = Some(RoundingPolicyKind::Standard);
        let result = calculate_contribution(&config, &rule(&config), dec("10001"), 1);

        assert_eq!(result.line.employer_amount, dec("1200.12"));
        assert_eq!(result.line.employee_amount, dec("700.07"));
    }

    #[test]
    fn test_zero_employee_rate() {
        let config = config(ContributionType::WorkInjury, "0.004", "0");
        let result = calculate_contribution(&config, &rule(&config), dec("10000"), 1);

        assert_eq!(result.line.employer_amount, dec("40.00"));
        assert_eq!(result.line.employee_amount, Decimal::ZERO);
    }
}
