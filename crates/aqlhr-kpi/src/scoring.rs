//! # Performance Scoring
//!
//! Converts a KPI's `current_value` against its `target_value` into a score,
//! averages scores per module, and maps the average to a letter grade.
//!
//! | Direction | Score |
//! |-----------|-------|
//! | `HigherIsBetter` | `min(100, current / target × 100)` |
//! | `LowerIsBetter` | `max(0, 100 − current / target × 100)` |
//! | `Proportional` | `current / target × 100`, uncapped |
//!
//! An explicit direction on the KPI wins. Otherwise it is inferred from the
//! name and unit (see [`ScoreDirection::infer`]). KPIs without both values,
//! inactive KPIs, and KPIs with a zero target are not scored.

use std::fmt;

use aqlhr_core::{KpiId, ModuleId};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::types::{Module, ModuleKpi};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreDirection {
    HigherIsBetter,
    LowerIsBetter,
    Proportional,
}

impl ScoreDirection {
    /// Fallback heuristic for KPIs registered without a direction.
    ///
    /// Percentage-style KPIs (name contains `Accuracy` or `Compliance`, or
    /// unit `%`) are checked first, so "Time Accuracy" is higher-is-better.
    /// Matching is case-sensitive.
    pub fn infer(kpi_name: &str, unit: Option<&str>) -> Self {
        if kpi_name.contains("Accuracy") || kpi_name.contains("Compliance") || unit == Some("%") {
            Self::HigherIsBetter
        } else if kpi_name.contains("Latency") || kpi_name.contains("Time") {
            Self::LowerIsBetter
        } else {
            Self::Proportional
        }
    }

    /// The direction used for `kpi`: explicit if set, inferred otherwise.
    pub fn for_kpi(kpi: &ModuleKpi) -> Self {
        kpi.direction
            .unwrap_or_else(|| Self::infer(&kpi.kpi_name, kpi.unit.as_deref()))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HigherIsBetter => "higher_is_better",
            Self::LowerIsBetter => "lower_is_better",
            Self::Proportional => "proportional",
        }
    }

    fn apply(self, current: f64, target: f64) -> f64 {
        let ratio = current / target * 100.0;
        match self {
            Self::HigherIsBetter => ratio.min(100.0),
            Self::LowerIsBetter => (100.0 - ratio).max(0.0),
            Self::Proportional => ratio,
        }
    }
}

impl std::str::FromStr for ScoreDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "higher_is_better" => Ok(Self::HigherIsBetter),
            "lower_is_better" => Ok(Self::LowerIsBetter),
            "proportional" => Ok(Self::Proportional),
            other => Err(format!("unknown score direction: {other}")),
        }
    }
}

/// Letter grade for a module's overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Grade {
    APlus,
    A,
    BPlus,
    B,
    CPlus,
    C,
    D,
    F,
}

impl Grade {
    const THRESHOLDS: [(f64, Grade); 7] = [
        (98.0, Grade::APlus),
        (90.0, Grade::A),
        (85.0, Grade::BPlus),
        (80.0, Grade::B),
        (75.0, Grade::CPlus),
        (70.0, Grade::C),
        (60.0, Grade::D),
    ];

    pub fn from_score(score: f64) -> Self {
        Self::THRESHOLDS
            .iter()
            .find(|(min, _)| score >= *min)
            .map_or(Grade::F, |(_, g)| *g)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::APlus => "A+",
            Self::A => "A",
            Self::BPlus => "B+",
            Self::B => "B",
            Self::CPlus => "C+",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Grade {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Self::APlus,
            Self::A,
            Self::BPlus,
            Self::B,
            Self::CPlus,
            Self::C,
            Self::D,
            Self::F,
        ]
        .into_iter()
        .find(|g| g.as_str() == s)
        .ok_or_else(|| format!("unknown grade: {s}"))
    }
}

impl Serialize for Grade {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Grade {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiScore {
    pub kpi_id: KpiId,
    pub kpi_name: String,
    pub current_value: f64,
    pub target_value: f64,
    pub unit: Option<String>,
    pub direction: ScoreDirection,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModulePerformance {
    pub module_id: ModuleId,
    pub module_name: String,
    pub category: Option<String>,
    pub overall_score: f64,
    pub performance_grade: Grade,
    pub scored_kpi_count: usize,
    pub kpi_scores: Vec<KpiScore>,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Score one KPI, or `None` if it is inactive or lacks a usable
/// current/target pair.
pub fn score_kpi(kpi: &ModuleKpi) -> Option<KpiScore> {
    if !kpi.is_active {
        return None;
    }
    let (current, target) = (kpi.current_value?, kpi.target_value?);
    if target == 0.0 || !target.is_finite() || !current.is_finite() {
        return None;
    }
    let direction = ScoreDirection::for_kpi(kpi);
    Some(KpiScore {
        kpi_id: kpi.id,
        kpi_name: kpi.kpi_name.clone(),
        current_value: current,
        target_value: target,
        unit: kpi.unit.clone(),
        direction,
        score: round2(direction.apply(current, target)),
    })
}

/// Score every KPI of `module` and grade the mean.
///
/// `kpis` may contain KPIs of other modules; only those with a matching
/// `module_id` count. Scores are ordered by `kpi_order`.
pub fn score_module(module: &Module, category: Option<&str>, kpis: &[ModuleKpi]) -> ModulePerformance {
    let mut own: Vec<&ModuleKpi> = kpis.iter().filter(|k| k.module_id == module.id).collect();
    own.sort_by_key(|k| k.kpi_order);

    let kpi_scores: Vec<KpiScore> = own.into_iter().filter_map(score_kpi).collect();
    let overall_score = if kpi_scores.is_empty() {
        0.0
    } else {
        round2(kpi_scores.iter().map(|s| s.score).sum::<f64>() / kpi_scores.len() as f64)
    };

    ModulePerformance {
        module_id: module.id,
        module_name: module.name.clone(),
        category: category.map(str::to_string),
        overall_score,
        performance_grade: Grade::from_score(overall_score),
        scored_kpi_count: kpi_scores.len(),
        kpi_scores,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KpiDefinition;
    use chrono::Utc;
    use proptest::prelude::*;
    use uuid::Uuid;

    fn kpi(module: &Module, name: &str, unit: Option<&str>, target: f64, current: Option<f64>) -> ModuleKpi {
        let def = KpiDefinition {
            kpi_name: name.into(),
            kpi_name_ar: None,
            kpi_order: 0,
            target_value: Some(target),
            unit: unit.map(str::to_string),
            calculation_method: None,
            direction: None,
        };
        let mut k = ModuleKpi::from_definition(module.id, &def, Utc::now());
        k.current_value = current;
        k
    }

    fn module() -> Module {
        Module::new("Payroll", Uuid::new_v4(), "acme", Utc::now())
    }

    fn score(k: &ModuleKpi) -> f64 {
        score_kpi(k).unwrap().score
    }

    #[test]
    fn percent_kpi_at_target_scores_100() {
        let m = module();
        assert_eq!(score(&kpi(&m, "Coverage", Some("%"), 80.0, Some(80.0))), 100.0);
    }

    #[test]
    fn percent_kpi_is_capped() {
        let m = module();
        assert_eq!(score(&kpi(&m, "Coverage", Some("%"), 50.0, Some(100.0))), 100.0);
    }

    #[test]
    fn latency_kpi_inverts() {
        let m = module();
        assert_eq!(score(&kpi(&m, "Sync Latency", Some("ms"), 500.0, Some(0.0))), 100.0);
        assert_eq!(score(&kpi(&m, "Sync Latency", Some("ms"), 500.0, Some(500.0))), 0.0);
        assert_eq!(score(&kpi(&m, "Sync Latency", Some("ms"), 500.0, Some(2000.0))), 0.0);
    }

    #[test]
    fn proportional_kpi_is_uncapped() {
        let m = module();
        assert_eq!(score(&kpi(&m, "Headcount", None, 50.0, Some(75.0))), 150.0);
    }

    #[test]
    fn percent_rule_wins_over_time_rule() {
        assert_eq!(
            ScoreDirection::infer("Time Accuracy", None),
            ScoreDirection::HigherIsBetter
        );
        assert_eq!(
            ScoreDirection::infer("Processing Time (hours)", Some("hours")),
            ScoreDirection::LowerIsBetter
        );
        assert_eq!(ScoreDirection::infer("latency", None), ScoreDirection::Proportional);
    }

    #[test]
    fn explicit_direction_overrides_name() {
        let m = module();
        let mut k = kpi(&m, "Response Time", None, 10.0, Some(5.0));
        assert_eq!(score(&k), 50.0);
        k.direction = Some(ScoreDirection::Proportional);
        assert_eq!(score(&k), 50.0);
        k.direction = Some(ScoreDirection::HigherIsBetter);
        k.current_value = Some(20.0);
        assert_eq!(score(&k), 100.0);
    }

    #[test]
    fn unscorable_kpis_are_skipped() {
        let m = module();
        assert!(score_kpi(&kpi(&m, "Compliance %", Some("%"), 100.0, None)).is_none());
        assert!(score_kpi(&kpi(&m, "Compliance %", Some("%"), 0.0, Some(3.0))).is_none());
        let mut inactive = kpi(&m, "Compliance %", Some("%"), 100.0, Some(90.0));
        inactive.is_active = false;
        assert!(score_kpi(&inactive).is_none());
    }

    #[test]
    fn module_without_scorable_kpis_scores_zero() {
        let m = module();
        let perf = score_module(&m, Some("Core HR"), &[kpi(&m, "X", None, 10.0, None)]);
        assert_eq!(perf.overall_score, 0.0);
        assert_eq!(perf.performance_grade, Grade::F);
        assert_eq!(perf.scored_kpi_count, 0);
    }

    #[test]
    fn module_score_is_mean_of_own_kpis() {
        let m = module();
        let other = module();
        let kpis = vec![
            kpi(&m, "Compliance %", Some("%"), 100.0, Some(97.0)),
            kpi(&m, "Sync Latency", None, 100.0, Some(20.0)),
            kpi(&other, "Compliance %", Some("%"), 100.0, Some(10.0)),
        ];
        let perf = score_module(&m, None, &kpis);
        assert_eq!(perf.scored_kpi_count, 2);
        assert_eq!(perf.overall_score, 88.5);
        assert_eq!(perf.performance_grade, Grade::BPlus);
    }

    #[test]
    fn grade_boundaries() {
        assert_eq!(Grade::from_score(98.0), Grade::APlus);
        assert_eq!(Grade::from_score(97.0), Grade::A);
        assert_eq!(Grade::from_score(90.0), Grade::A);
        assert_eq!(Grade::from_score(89.99), Grade::BPlus);
        assert_eq!(Grade::from_score(80.0), Grade::B);
        assert_eq!(Grade::from_score(75.0), Grade::CPlus);
        assert_eq!(Grade::from_score(70.0), Grade::C);
        assert_eq!(Grade::from_score(60.0), Grade::D);
        assert_eq!(Grade::from_score(59.99), Grade::F);
        assert_eq!(Grade::from_score(140.0), Grade::APlus);
    }

    #[test]
    fn grade_serializes_as_letter() {
        assert_eq!(serde_json::to_string(&Grade::APlus).unwrap(), "\"A+\"");
        let g: Grade = serde_json::from_str("\"C+\"").unwrap();
        assert_eq!(g, Grade::CPlus);
    }

    proptest! {
        #[test]
        fn higher_is_better_stays_in_range(current in 0.0f64..1e6, target in 0.01f64..1e6) {
            let s = ScoreDirection::HigherIsBetter.apply(current, target);
            prop_assert!((0.0..=100.0).contains(&s));
        }

        #[test]
        fn lower_is_better_stays_in_range(current in 0.0f64..1e6, target in 0.01f64..1e6) {
            let s = ScoreDirection::LowerIsBetter.apply(current, target);
            prop_assert!((0.0..=100.0).contains(&s));
        }
    }
}
