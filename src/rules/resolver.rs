//! Contribution rule book and resolver.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use tracing::debug;

use crate::error::{PayrollError, PayrollResult};
use crate::models::{CategoryRule, ContributionConfig, ContributionType};

/// The config selected for a category, type and date, with the rule that
/// selected it.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedRule<'a> {
    /// The selected contribution config.
    pub config: &'a ContributionConfig,
    /// The category rule in force.
    pub rule: &'a CategoryRule,
}

/// Contribution configs and the effective-dated rules that attach them to
/// personnel categories.
///
/// # Example
///
/// ```
/// use payroll_engine::models::{
///     CategoryRule, ContributionConfig, ContributionType, EffectiveInterval,
/// };
/// use payroll_engine::rules::RuleBook;
/// use chrono::NaiveDate;
/// use rust_decimal::Decimal;
///
/// let config = ContributionConfig {
///     id: "pension_2024".to_string(),
///     name: "Pension".to_string(),
///     contribution_type: ContributionType::Pension,
///     employer_rate: Decimal::new(16, 2),
///     employee_rate: Decimal::new(8, 2),
///     base_floor: None,
///     base_cap: None,
///     applicable_personnel_categories: ["staff".to_string()].into(),
///     is_active: true,
///     staged_source: None,
///     rounding: None,
/// };
/// let rule = CategoryRule {
///     personnel_category_id: "staff".to_string(),
///     config_id: "pension_2024".to_string(),
///     interval: EffectiveInterval::new(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), None),
///     is_active: true,
/// };
///
/// let book = RuleBook::build(vec![config], vec![rule]).unwrap();
/// let resolved = book
///     .resolve("staff", ContributionType::Pension, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())
///     .unwrap();
/// assert_eq!(resolved.config.id, "pension_2024");
/// ```
#[derive(Debug, Clone, Default)]
pub struct RuleBook {
    configs: HashMap<String, ContributionConfig>,
    rules: Vec<CategoryRule>,
}

impl RuleBook {
    /// Builds a rule book, validating every config and rule.
    pub fn build(
        configs: impl IntoIterator<Item = ContributionConfig>,
        rules: impl IntoIterator<Item = CategoryRule>,
    ) -> PayrollResult<Self> {
        let mut book = Self::default();
        for config in configs {
            book.add_config(config)?;
        }
        for rule in rules {
            book.add_rule(rule)?;
        }
        Ok(book)
    }

    /// Adds a contribution config. Config ids are unique.
    pub fn add_config(&mut self, config: ContributionConfig) -> PayrollResult<()> {
        if self.configs.contains_key(&config.id) {
            return Err(PayrollError::ValidationError {
                field: "id".to_string(),
                message: format!("contribution config '{}' is defined twice", config.id),
            });
        }
        self.configs.insert(config.id.clone(), config);
        Ok(())
    }

    /// Adds a category rule.
    ///
    /// Rejects rules that reference an unknown config, have an empty
    /// interval, repeat a (category, config, effective date) key, overlap an
    /// active rule for the same category and config, or share an effective
    /// date with an active rule of the same contribution type for the same
    /// category.
    pub fn add_rule(&mut self, rule: CategoryRule) -> PayrollResult<()> {
        let config = self.configs.get(&rule.config_id).ok_or_else(|| {
            PayrollError::UnknownContributionConfig {
                config_id: rule.config_id.clone(),
            }
        })?;

        if !rule.interval.is_well_formed() {
            return Err(PayrollError::ValidationError {
                field: "end_date".to_string(),
                message: format!(
                    "rule for category '{}' ends on or before it takes effect",
                    rule.personnel_category_id
                ),
            });
        }

        let same_category = self
            .rules
            .iter()
            .filter(|existing| existing.personnel_category_id == rule.personnel_category_id);

        for existing in same_category {
            let same_config = existing.config_id == rule.config_id;
            let same_start = existing.interval.effective_date == rule.interval.effective_date;

            if same_config && same_start {
                return Err(PayrollError::DuplicateRule {
                    category: rule.personnel_category_id.clone(),
                    key: rule.config_id.clone(),
                    effective_date: rule.interval.effective_date,
                });
            }

            if !(existing.is_active && rule.is_active) {
                continue;
            }

            if same_config && existing.interval.overlaps(&rule.interval) {
                return Err(PayrollError::OverlappingRule {
                    category: rule.personnel_category_id.clone(),
                    config_id: rule.config_id.clone(),
                });
            }

            let same_type = self
                .configs
                .get(&existing.config_id)
                .is_some_and(|other| other.contribution_type == config.contribution_type);
            if same_type && same_start {
                return Err(PayrollError::DuplicateRule {
                    category: rule.personnel_category_id.clone(),
                    key: config.contribution_type.to_string(),
                    effective_date: rule.interval.effective_date,
                });
            }
        }

        self.rules.push(rule);
        Ok(())
    }

    /// Finds the config in force for a category and type on a date.
    ///
    /// Among active rules for the category whose config has the requested
    /// type, is active and lists the category as applicable, and whose
    /// interval covers `as_of`, the rule with the latest effective date wins.
    pub fn resolve(
        &self,
        category: &str,
        contribution_type: ContributionType,
        as_of: NaiveDate,
    ) -> PayrollResult<ResolvedRule<'_>> {
        let resolved = self
            .rules
            .iter()
            .filter(|rule| {
                rule.is_active
                    && rule.personnel_category_id == category
                    && rule.interval.contains(as_of)
            })
            .filter_map(|rule| {
                self.configs
                    .get(&rule.config_id)
                    .filter(|config| {
                        config.is_active
                            && config.contribution_type == contribution_type
                            && config.applies_to(category)
                    })
                    .map(|config| ResolvedRule { config, rule })
            })
            .max_by_key(|resolved| resolved.rule.interval.effective_date)
            .ok_or_else(|| PayrollError::NoApplicableRule {
                category: category.to_string(),
                contribution_type,
                date: as_of,
            })?;

        debug!(
            category,
            contribution_type = %contribution_type,
            as_of = %as_of,
            config_id = %resolved.config.id,
            "Resolved contribution rule"
        );
        Ok(resolved)
    }

    /// The contribution types an employee of the category owes: the types
    /// of active configs that list the category as applicable.
    pub fn contribution_types_for(&self, category: &str) -> BTreeSet<ContributionType> {
        self.configs
            .values()
            .filter(|config| config.is_active && config.applies_to(category))
            .map(|config| config.contribution_type)
            .collect()
    }

    /// All rules, in insertion order.
    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EffectiveInterval, RoundingPolicyKind};
    use rust_decimal::Decimal;
    use std::collections::BTreeSet;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn config(id: &str, contribution_type: ContributionType, rate: i64) -> ContributionConfig {
        ContributionConfig {
            id: id.to_string(),
            name: id.to_string(),
            contribution_type,
            employer_rate: Decimal::new(rate, 2),
            employee_rate: Decimal::new(rate, 2),
            base_floor: None,
            base_cap: None,
            applicable_personnel_categories: BTreeSet::from(["x".to_string()]),
            is_active: true,
            staged_source: None,
            rounding: None,
        }
    }

    fn rule(config_id: &str, start: NaiveDate, end: Option<NaiveDate>) -> CategoryRule {
        CategoryRule {
            personnel_category_id: "x".to_string(),
            config_id: config_id.to_string(),
            interval: EffectiveInterval::new(start, end),
            is_active: true,
        }
    }

    /// Category X: rule A for [2024-01-01, 2024-07-01), rule B from 2024-07-01.
    fn book_with_a_and_b() -> RuleBook {
        RuleBook::build(
            vec![
                config("a", ContributionType::HousingFund, 10),
                config("b", ContributionType::HousingFund, 12),
            ],
            vec![
                rule("a", d(2024, 1, 1), Some(d(2024, 7, 1))),
                rule("b", d(2024, 7, 1), None),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_resolve_within_first_interval() {
        let book = book_with_a_and_b();
        let resolved = book
            .resolve("x", ContributionType::HousingFund, d(2024, 3, 1))
            .unwrap();
        assert_eq!(resolved.config.id, "a");
    }

    #[test]
    fn test_resolve_on_boundary_picks_new_rule() {
        let book = book_with_a_and_b();
        let resolved = book
            .resolve("x", ContributionType::HousingFund, d(2024, 7, 1))
            .unwrap();
        assert_eq!(resolved.config.id, "b");
    }

    #[test]
    fn test_resolve_day_before_boundary_picks_old_rule() {
        let book = book_with_a_and_b();
        let resolved = book
            .resolve("x", ContributionType::HousingFund, d(2024, 6, 30))
            .unwrap();
        assert_eq!(resolved.config.id, "a");
        assert_eq!(resolved.rule.interval.effective_date, d(2024, 1, 1));
    }

    #[test]
    fn test_resolve_before_any_rule_fails() {
        let book = book_with_a_and_b();
        match book
            .resolve("x", ContributionType::HousingFund, d(2023, 12, 31))
            .unwrap_err()
        {
            PayrollError::NoApplicableRule {
                category,
                contribution_type,
                date,
            } => {
                assert_eq!(category, "x");
                assert_eq!(contribution_type, ContributionType::HousingFund);
                assert_eq!(date, d(2023, 12, 31));
            }
            other => panic!("Expected NoApplicableRule, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_other_category_fails() {
        let book = book_with_a_and_b();
        assert!(book
            .resolve("y", ContributionType::HousingFund, d(2024, 3, 1))
            .is_err());
    }

    #[test]
    fn test_latest_effective_rule_wins_when_open_rules_overlap() {
        let book = RuleBook::build(
            vec![
                config("old", ContributionType::Pension, 16),
                config("new", ContributionType::Pension, 14),
            ],
            vec![rule("old", d(2020, 1, 1), None), rule("new", d(2024, 5, 1), None)],
        )
        .unwrap();

        let before = book.resolve("x", ContributionType::Pension, d(2024, 4, 30)).unwrap();
        let after = book.resolve("x", ContributionType::Pension, d(2024, 5, 1)).unwrap();
        assert_eq!(before.config.id, "old");
        assert_eq!(after.config.id, "new");
    }

    #[test]
    fn test_inactive_rule_is_skipped() {
        let mut book = RuleBook::build(vec![config("a", ContributionType::Medical, 2)], vec![])
            .unwrap();
        let mut inactive = rule("a", d(2024, 1, 1), None);
        inactive.is_active = false;
        book.add_rule(inactive).unwrap();

        assert!(book.resolve("x", ContributionType::Medical, d(2024, 2, 1)).is_err());
    }

    #[test]
    fn test_inactive_config_is_skipped() {
        let mut inactive = config("a", ContributionType::Medical, 2);
        inactive.is_active = false;
        let book = RuleBook::build(vec![inactive], vec![rule("a", d(2024, 1, 1), None)]).unwrap();

        assert!(book.resolve("x", ContributionType::Medical, d(2024, 2, 1)).is_err());
        assert!(book.contribution_types_for("x").is_empty());
    }

    #[test]
    fn test_rule_for_category_outside_config_is_skipped() {
        let mut book = RuleBook::build(vec![config("a", ContributionType::Medical, 2)], vec![])
            .unwrap();
        let mut stray = rule("a", d(2024, 1, 1), None);
        stray.personnel_category_id = "y".to_string();
        book.add_rule(stray).unwrap();

        match book
            .resolve("y", ContributionType::Medical, d(2024, 2, 1))
            .unwrap_err()
        {
            PayrollError::NoApplicableRule { category, .. } => assert_eq!(category, "y"),
            other => panic!("Expected NoApplicableRule, got {:?}", other),
        }
        assert!(book.contribution_types_for("y").is_empty());
    }

    #[test]
    fn test_overlap_for_same_pair_is_rejected() {
        let mut book = book_with_a_and_b();
        let err = book
            .add_rule(rule("a", d(2024, 6, 1), Some(d(2024, 8, 1))))
            .unwrap_err();
        assert_eq!(err.reason_code(), "OVERLAPPING_RULE");
    }

    #[test]
    fn test_duplicate_effective_date_for_same_pair_is_rejected() {
        let mut book = book_with_a_and_b();
        let mut duplicate = rule("a", d(2024, 1, 1), Some(d(2024, 2, 1)));
        duplicate.is_active = false;
        let err = book.add_rule(duplicate).unwrap_err();
        assert_eq!(err.reason_code(), "DUPLICATE_RULE");
    }

    #[test]
    fn test_same_type_same_start_is_rejected() {
        let mut book = book_with_a_and_b();
        book.add_config(config("c", ContributionType::HousingFund, 5))
            .unwrap();
        let err = book.add_rule(rule("c", d(2024, 7, 1), None)).unwrap_err();
        match err {
            PayrollError::DuplicateRule { key, .. } => assert_eq!(key, "housing_fund"),
            other => panic!("Expected DuplicateRule, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_config_is_rejected() {
        let mut book = RuleBook::default();
        let err = book.add_rule(rule("missing", d(2024, 1, 1), None)).unwrap_err();
        assert_eq!(err.reason_code(), "UNKNOWN_CONTRIBUTION_CONFIG");
    }

    #[test]
    fn test_empty_interval_is_rejected() {
        let mut book = RuleBook::build(vec![config("a", ContributionType::Medical, 2)], vec![])
            .unwrap();
        let err = book
            .add_rule(rule("a", d(2024, 1, 1), Some(d(2024, 1, 1))))
            .unwrap_err();
        assert_eq!(err.reason_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_no_two_rules_resolve_for_same_category_and_date() {
        let book = book_with_a_and_b();
        let mut day = d(2023, 12, 1);
        while day < d(2025, 1, 1) {
            let covering = book
                .rules()
                .iter()
                .filter(|r| r.is_active && r.interval.contains(day))
                .count();
            assert!(covering <= 1, "{covering} rules cover {day}");
            day = day.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_contribution_types_for_category() {
        let mut book = book_with_a_and_b();
        let mut pension = config("p", ContributionType::Pension, 8);
        pension.rounding = Some(RoundingPolicyKind::Standard);
        book.add_config(pension).unwrap();

        let types = book.contribution_types_for("x");
        assert_eq!(
            types.into_iter().collect::<Vec<_>>(),
            vec![ContributionType::Pension, ContributionType::HousingFund]
        );
        assert!(book.contribution_types_for("nobody").is_empty());
    }
}
