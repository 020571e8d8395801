//! Net pay calculation.

use rust_decimal::Decimal;

use super::rounding::{RoundingPolicy, StandardRounding};
use crate::models::{AuditStep, ContributionLine};

/// The result of a net pay calculation, including its audit step.
#[derive(Debug, Clone)]
pub struct NetPayResult {
    /// Gross pay rounded to two places.
    pub gross_pay: Decimal,
    /// Income tax rounded to two places.
    pub income_tax: Decimal,
    /// Employee contributions plus income tax.
    pub total_deductions: Decimal,
    /// Gross pay less total deductions.
    pub net_pay: Decimal,
    /// The audit step recording this calculation.
    pub audit_step: AuditStep,
}

/// Computes net pay from rounded components.
///
/// Gross pay and income tax are rounded with the standard policy. Deductions
/// are the sum of the already-rounded employee contribution amounts plus
/// income tax; nothing is rounded again after summing.
///
/// # Examples
///
/// ```
/// use payroll_engine::calculation::calculate_net_pay;
/// use rust_decimal::Decimal;
/// use std::str::FromStr;
///
/// let result = calculate_net_pay(
///     Decimal::from_str("8000").unwrap(),
///     &[],
///     Decimal::from_str("45.005").unwrap(),
///     1,
/// );
/// assert_eq!(result.income_tax, Decimal::from_str("45.01").unwrap());
/// assert_eq!(result.net_pay, Decimal::from_str("7954.99").unwrap());
/// ```
pub fn calculate_net_pay(
    gross_pay: Decimal,
    lines: &[ContributionLine],
    income_tax: Decimal,
    step_number: u32,
) -> NetPayResult {
    let gross_pay = StandardRounding.round(gross_pay);
    let income_tax = StandardRounding.round(income_tax);
    let employee_contributions: Decimal = lines.iter().map(|line| line.employee_amount).sum();
    let total_deductions = employee_contributions + income_tax;
    let net_pay = gross_pay - total_deductions;

    let audit_step = AuditStep {
        step_number,
        rule_id: "net_pay".to_string(),
        rule_name: "Net Pay".to_string(),
        input: serde_json::json!({
            "gross_pay": gross_pay.to_string(),
            "employee_contributions": lines
                .iter()
                .map(|line| serde_json::json!({
                    "contribution_type": line.contribution_type,
                    "amount": line.employee_amount.to_string()
                }))
                .collect::<Vec<_>>(),
            "income_tax": income_tax.to_string()
        }),
        output: serde_json::json!({
            "total_deductions": total_deductions.to_string(),
            "net_pay": net_pay.to_string()
        }),
        reasoning: format!(
            "{} - ({} contributions + {} tax) = {}",
            gross_pay, employee_contributions, income_tax, net_pay
        ),
    };

    NetPayResult {
        gross_pay,
        income_tax,
        total_deductions,
        net_pay,
        audit_step,
    }
}
