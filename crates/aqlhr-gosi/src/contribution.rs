//! Contribution math.

use aqlhr_core::Amount;
use serde::{Deserialize, Serialize};

use crate::types::RatePair;

/// Employee and employer shares of one month's contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionBreakdown {
    pub employee_contribution: Amount,
    pub employer_contribution: Amount,
    pub total: Amount,
}

/// `salary × rate / 100` for each side, each rounded to the halala.
/// `total` is the sum of the rounded shares.
pub fn compute_contribution(salary: Amount, rates: RatePair) -> ContributionBreakdown {
    let employee_contribution = salary.apply_rate(rates.employee_rate);
    let employer_contribution = salary.apply_rate(rates.employer_rate);
    ContributionBreakdown {
        employee_contribution,
        employer_contribution,
        total: employee_contribution + employer_contribution,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aqlhr_core::RatePercent;
    use proptest::prelude::*;

    #[test]
    fn saudi_new_system_example() {
        let rates = RatePair::new(
            RatePercent::parse("9.75").unwrap(),
            RatePercent::parse("11.75").unwrap(),
        );
        let c = compute_contribution(Amount::parse("12000").unwrap(), rates);
        assert_eq!(c.employee_contribution.to_string(), "1170.00");
        assert_eq!(c.employer_contribution.to_string(), "1410.00");
        assert_eq!(c.total.to_string(), "2580.00");
    }

    #[test]
    fn non_saudi_employee_pays_nothing() {
        let rates = RatePair::new(RatePercent::ZERO, RatePercent::parse("2").unwrap());
        let c = compute_contribution(Amount::parse("8500.50").unwrap(), rates);
        assert_eq!(c.employee_contribution, Amount::ZERO);
        assert_eq!(c.employer_contribution.to_string(), "170.01");
    }

    proptest! {
        #[test]
        fn shares_match_salary_times_rate(
            salary in 0i64..5_000_000_000,
            e in 0u32..=10_000,
            r in 0u32..=10_000,
        ) {
            let rates = RatePair::new(
                RatePercent::from_bps_clamped(e),
                RatePercent::from_bps_clamped(r),
            );
            let c = compute_contribution(Amount::from_halalas(salary), rates);

            let exact_e = i128::from(salary) * i128::from(e);
            let exact_r = i128::from(salary) * i128::from(r);
            prop_assert!((i128::from(c.employee_contribution.halalas()) * 10_000 - exact_e).abs() <= 5_000);
            prop_assert!((i128::from(c.employer_contribution.halalas()) * 10_000 - exact_r).abs() <= 5_000);
            prop_assert_eq!(
                c.total.halalas(),
                c.employee_contribution.halalas() + c.employer_contribution.halalas()
            );
        }
    }
}
