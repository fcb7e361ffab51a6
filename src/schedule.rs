//! Dependency graph of the statistics stages
//!
//! Stages are connected by two kinds of edges. A [`Edge::Device`] edge is
//! satisfied by queue order alone. A [`Edge::Host`] edge needs a scalar read
//! back to the host before the dependent dispatch can be encoded, so the plan
//! is cut into [`Wave`]s at host edges and the orchestrator synchronises only
//! between waves.

use std::fmt;

use crate::error::{Error, Result};

/// One dispatched step of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Minimum reduction
    Min,
    /// Maximum reduction
    Max,
    /// Sum reduction
    Sum,
    /// Sort
    Sort,
    /// Per-element squared deviation
    Variance,
    /// Sum of squared deviations
    VarianceSum,
}

impl Stage {
    /// Every stage in issue order
    pub const ALL: [Stage; 6] = [
        Stage::Min,
        Stage::Max,
        Stage::Sum,
        Stage::Sort,
        Stage::Variance,
        Stage::VarianceSum,
    ];

    /// Human-readable label used in reports
    pub fn label(self) -> &'static str {
        match self {
            Stage::Min => "Min",
            Stage::Max => "Max",
            Stage::Sum => "Sum",
            Stage::Sort => "Sort",
            Stage::Variance => "Variance",
            Stage::VarianceSum => "Variance sum",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How a dependency is satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    /// A scalar must be read back and passed as a kernel argument
    Host,
    /// Queue order is enough; data stays on the device
    Device,
}

/// `to` cannot run before `from` has produced its output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    /// Producer
    pub from: Stage,
    /// Consumer
    pub to: Stage,
    /// How the dependency is satisfied
    pub edge: Edge,
}

/// Stages issued together between two host synchronisation points
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wave {
    /// Zero-based wave number
    pub index: usize,
    /// Stages in issue order
    pub stages: Vec<Stage>,
    /// Producers whose scalar must be read back before this wave is issued
    pub host_inputs: Vec<Stage>,
}

/// Ordered stages plus their dependencies.
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    stages: Vec<Stage>,
    dependencies: Vec<Dependency>,
}

impl ExecutionPlan {
    /// Empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// The statistics pipeline: four independent stages, then the mean
    /// round-trip, then the variance chain.
    pub fn statistics() -> Self {
        let mut plan = Self::new();
        for stage in Stage::ALL {
            plan.stages.push(stage);
        }
        plan.dependencies = vec![
            Dependency {
                from: Stage::Sum,
                to: Stage::Variance,
                edge: Edge::Host,
            },
            Dependency {
                from: Stage::Variance,
                to: Stage::VarianceSum,
                edge: Edge::Device,
            },
        ];
        plan
    }

    /// Append a stage. Stages must be added in a valid issue order.
    pub fn push(&mut self, stage: Stage) -> Result<()> {
        if self.stages.contains(&stage) {
            return Err(Error::config("plan", format!("stage {stage} added twice")));
        }
        self.stages.push(stage);
        Ok(())
    }

    /// Record that `to` depends on `from`. Both must already be in the plan
    /// with `from` issued first.
    pub fn depend(&mut self, from: Stage, to: Stage, edge: Edge) -> Result<()> {
        let pos = |s: Stage| self.stages.iter().position(|&x| x == s);
        match (pos(from), pos(to)) {
            (Some(f), Some(t)) if f < t => {
                self.dependencies.push(Dependency { from, to, edge });
                Ok(())
            }
            (Some(_), Some(_)) => Err(Error::config(
                "plan",
                format!("{to} is issued before its dependency {from}"),
            )),
            _ => Err(Error::config(
                "plan",
                format!("dependency {from} -> {to} names a stage not in the plan"),
            )),
        }
    }

    /// Stages in issue order
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Dependencies whose consumer is `stage`
    pub fn dependencies_of(&self, stage: Stage) -> impl Iterator<Item = &Dependency> {
        self.dependencies.iter().filter(move |d| d.to == stage)
    }

    /// Split the plan at host edges.
    ///
    /// A stage's wave is the latest wave among its producers, plus one when
    /// the edge crosses to the host. Issue order within a wave is preserved.
    pub fn waves(&self) -> Vec<Wave> {
        let mut assigned: Vec<(Stage, usize)> = Vec::with_capacity(self.stages.len());
        for &stage in &self.stages {
            let wave = self
                .dependencies_of(stage)
                .filter_map(|d| {
                    let from = assigned.iter().find(|(s, _)| *s == d.from)?.1;
                    Some(match d.edge {
                        Edge::Host => from + 1,
                        Edge::Device => from,
                    })
                })
                .max()
                .unwrap_or(0);
            assigned.push((stage, wave));
        }

        let count = assigned.iter().map(|(_, w)| w + 1).max().unwrap_or(0);
        (0..count)
            .map(|index| {
                let stages: Vec<Stage> = assigned
                    .iter()
                    .filter(|(_, w)| *w == index)
                    .map(|(s, _)| *s)
                    .collect();
                let mut host_inputs: Vec<Stage> = stages
                    .iter()
                    .flat_map(|&s| self.dependencies_of(s))
                    .filter(|d| d.edge == Edge::Host)
                    .map(|d| d.from)
                    .collect();
                host_inputs.sort_unstable();
                host_inputs.dedup();
                Wave {
                    index,
                    stages,
                    host_inputs,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statistics_plan_has_two_waves() {
        let waves = ExecutionPlan::statistics().waves();
        assert_eq!(waves.len(), 2);
        assert_eq!(
            waves[0].stages,
            vec![Stage::Min, Stage::Max, Stage::Sum, Stage::Sort]
        );
        assert!(waves[0].host_inputs.is_empty());
        assert_eq!(waves[1].stages, vec![Stage::Variance, Stage::VarianceSum]);
        assert_eq!(waves[1].host_inputs, vec![Stage::Sum]);
    }

    #[test]
    fn test_device_edges_do_not_split() {
        let mut plan = ExecutionPlan::new();
        plan.push(Stage::Variance).unwrap();
        plan.push(Stage::VarianceSum).unwrap();
        plan.depend(Stage::Variance, Stage::VarianceSum, Edge::Device)
            .unwrap();
        assert_eq!(plan.waves().len(), 1);
    }

    #[test]
    fn test_chained_host_edges() {
        let mut plan = ExecutionPlan::new();
        for s in [Stage::Sum, Stage::Variance, Stage::VarianceSum] {
            plan.push(s).unwrap();
        }
        plan.depend(Stage::Sum, Stage::Variance, Edge::Host).unwrap();
        plan.depend(Stage::Variance, Stage::VarianceSum, Edge::Host)
            .unwrap();
        let waves = plan.waves();
        assert_eq!(waves.len(), 3);
        assert_eq!(waves[2].host_inputs, vec![Stage::Variance]);
    }

    #[test]
    fn test_shared_producer_listed_once() {
        let mut plan = ExecutionPlan::new();
        for s in [Stage::Sum, Stage::Min, Stage::Variance, Stage::Sort, Stage::VarianceSum] {
            plan.push(s).unwrap();
        }
        plan.depend(Stage::Sum, Stage::Variance, Edge::Host).unwrap();
        plan.depend(Stage::Min, Stage::Sort, Edge::Host).unwrap();
        plan.depend(Stage::Sum, Stage::VarianceSum, Edge::Host).unwrap();

        let waves = plan.waves();
        assert_eq!(waves.len(), 2);
        assert_eq!(waves[1].host_inputs, vec![Stage::Min, Stage::Sum]);
    }

    #[test]
    fn test_rejects_backward_dependency() {
        let mut plan = ExecutionPlan::new();
        plan.push(Stage::Variance).unwrap();
        plan.push(Stage::Sum).unwrap();
        assert!(plan.depend(Stage::Sum, Stage::Variance, Edge::Host).is_err());
        assert!(plan.push(Stage::Sum).is_err());
        assert!(plan.depend(Stage::Min, Stage::Sum, Edge::Device).is_err());
    }
}
