//! # Company Contribution Preview
//!
//! Computes per-employee contributions for every active employee of a
//! company and folds them into a summary. Summary totals are sums of the
//! rows' already-rounded amounts, so detail and summary always agree.
//! Previews are never audit-logged.

use aqlhr_core::{Amount, CompanyId, EmployeeId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::contribution::{compute_contribution, ContributionBreakdown};
use crate::schedule::{resolve_rates, RateSchedule};
use crate::types::{Employee, EmployeeGosiConfig, Nationality, RatePair, SystemType};

/// One employee's line in a preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewRow {
    pub employee_id: EmployeeId,
    pub full_name: String,
    pub system_type: SystemType,
    pub nationality: Nationality,
    pub salary: Amount,
    pub rates: RatePair,
    pub contributions: ContributionBreakdown,
}

/// Company-wide counts and totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreviewSummary {
    pub total_employees: usize,
    pub old_system_count: usize,
    pub new_system_count: usize,
    pub saudi_count: usize,
    pub non_saudi_count: usize,
    pub total_salary: Amount,
    pub total_employee_contributions: Amount,
    pub total_employer_contributions: Amount,
    pub total_contributions: Amount,
}

impl PreviewSummary {
    fn add(&mut self, row: &PreviewRow) {
        self.total_employees += 1;
        match row.system_type {
            SystemType::Old => self.old_system_count += 1,
            SystemType::New => self.new_system_count += 1,
        }
        match row.nationality {
            Nationality::Saudi => self.saudi_count += 1,
            Nationality::NonSaudi => self.non_saudi_count += 1,
        }
        self.total_salary = self.total_salary + row.salary;
        self.total_employee_contributions =
            self.total_employee_contributions + row.contributions.employee_contribution;
        self.total_employer_contributions =
            self.total_employer_contributions + row.contributions.employer_contribution;
        self.total_contributions = self.total_contributions + row.contributions.total;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyPreview {
    pub company_id: CompanyId,
    pub as_of_date: NaiveDate,
    pub summary: PreviewSummary,
    pub employees: Vec<PreviewRow>,
    /// Active employees with no configuration or no applicable rate.
    pub unresolved_employee_ids: Vec<EmployeeId>,
}

/// Build the preview for `company_id` from a roster joined with configs.
///
/// Inactive employees and employees of other companies are ignored.
/// Rows are ordered by name, then id.
pub fn build_preview(
    company_id: CompanyId,
    roster: &[(Employee, Option<EmployeeGosiConfig>)],
    schedule: &RateSchedule,
    as_of: NaiveDate,
) -> CompanyPreview {
    let mut employees = Vec::new();
    let mut unresolved = Vec::new();

    for (employee, config) in roster
        .iter()
        .filter(|(e, _)| e.is_active && e.company_id == company_id)
    {
        let resolved = config
            .as_ref()
            .and_then(|cfg| resolve_rates(cfg, schedule, as_of).ok().map(|s| (cfg, s)));
        match resolved {
            Some((cfg, snapshot)) => employees.push(PreviewRow {
                employee_id: employee.id,
                full_name: employee.full_name.clone(),
                system_type: cfg.gosi_system_type,
                nationality: cfg.nationality,
                salary: employee.salary,
                rates: snapshot.rates,
                contributions: compute_contribution(employee.salary, snapshot.rates),
            }),
            None => {
                tracing::warn!(employee_id = %employee.id, "preview: no applicable GOSI rate");
                unresolved.push(employee.id);
            }
        }
    }

    employees.sort_by(|a, b| {
        a.full_name
            .cmp(&b.full_name)
            .then_with(|| a.employee_id.cmp(&b.employee_id))
    });
    unresolved.sort();

    let mut summary = PreviewSummary::default();
    for row in &employees {
        summary.add(row);
    }

    CompanyPreview {
        company_id,
        as_of_date: as_of,
        summary,
        employees,
        unresolved_employee_ids: unresolved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::initial_config;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn employee(
        company: CompanyId,
        name: &str,
        salary_halalas: i64,
        nationality: Nationality,
        hire: NaiveDate,
        schedule: &RateSchedule,
    ) -> (Employee, Option<EmployeeGosiConfig>) {
        let now = Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap();
        let id = EmployeeId::new();
        let cfg = initial_config(id, nationality, hire, schedule, now).unwrap();
        (
            Employee {
                id,
                company_id: company,
                full_name: name.to_string(),
                salary: Amount::from_halalas(salary_halalas),
                is_active: true,
                created_at: now,
            },
            Some(cfg),
        )
    }

    #[test]
    fn counts_by_system_and_nationality() {
        let schedule = RateSchedule::default_schedule();
        let company = CompanyId::new();
        let roster = vec![
            employee(company, "Ahmed", 1_000_000, Nationality::Saudi, date(2020, 1, 1), &schedule),
            employee(company, "Fatima", 1_200_000, Nationality::Saudi, date(2024, 9, 1), &schedule),
            employee(company, "Ravi", 800_000, Nationality::NonSaudi, date(2025, 2, 1), &schedule),
        ];
        let p = build_preview(company, &roster, &schedule, date(2026, 1, 15));

        assert_eq!(p.summary.total_employees, 3);
        assert_eq!(p.summary.old_system_count, 1);
        assert_eq!(p.summary.new_system_count, 2);
        assert_eq!(p.summary.saudi_count, 2);
        assert_eq!(p.summary.non_saudi_count, 1);
        assert_eq!(p.employees[0].full_name, "Ahmed");
        assert!(p.unresolved_employee_ids.is_empty());
    }

    #[test]
    fn inactive_and_foreign_employees_excluded() {
        let schedule = RateSchedule::default_schedule();
        let company = CompanyId::new();
        let mut inactive =
            employee(company, "Gone", 500_000, Nationality::Saudi, date(2020, 1, 1), &schedule);
        inactive.0.is_active = false;
        let other = employee(
            CompanyId::new(),
            "Elsewhere",
            500_000,
            Nationality::Saudi,
            date(2020, 1, 1),
            &schedule,
        );
        let p = build_preview(company, &[inactive, other], &schedule, date(2026, 1, 15));
        assert_eq!(p.summary.total_employees, 0);
        assert_eq!(p.summary.total_contributions, Amount::ZERO);
    }

    #[test]
    fn employee_without_config_is_unresolved() {
        let schedule = RateSchedule::default_schedule();
        let company = CompanyId::new();
        let (emp, _) =
            employee(company, "NoConfig", 500_000, Nationality::Saudi, date(2020, 1, 1), &schedule);
        let id = emp.id;
        let p = build_preview(company, &[(emp, None)], &schedule, date(2026, 1, 15));
        assert!(p.employees.is_empty());
        assert_eq!(p.unresolved_employee_ids, vec![id]);
    }

    proptest! {
        #[test]
        fn summary_equals_sum_of_rows(
            salaries in proptest::collection::vec(0i64..10_000_000, 0..25),
            saudi_mask in proptest::collection::vec(any::<bool>(), 25),
        ) {
            let schedule = RateSchedule::default_schedule();
            let company = CompanyId::new();
            let roster: Vec<_> = salaries
                .iter()
                .zip(saudi_mask.iter())
                .enumerate()
                .map(|(i, (s, saudi))| {
                    let nat = if *saudi { Nationality::Saudi } else { Nationality::NonSaudi };
                    let hire = if i % 2 == 0 { date(2021, 5, 1) } else { date(2024, 8, 1) };
                    employee(company, &format!("E{i:03}"), *s, nat, hire, &schedule)
                })
                .collect();

            let p = build_preview(company, &roster, &schedule, date(2026, 3, 1));
            let ee: Amount = p.employees.iter().map(|r| r.contributions.employee_contribution).sum();
            let er: Amount = p.employees.iter().map(|r| r.contributions.employer_contribution).sum();
            let tot: Amount = p.employees.iter().map(|r| r.contributions.total).sum();
            let sal: Amount = p.employees.iter().map(|r| r.salary).sum();

            prop_assert_eq!(p.summary.total_employees, salaries.len());
            prop_assert_eq!(p.summary.total_employee_contributions, ee);
            prop_assert_eq!(p.summary.total_employer_contributions, er);
            prop_assert_eq!(p.summary.total_contributions, tot);
            prop_assert_eq!(p.summary.total_salary, sal);
            prop_assert_eq!(tot, ee + er);
        }
    }
}
