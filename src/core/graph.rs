//! Step graph - the DAG of typed steps
//!
//! Steps may be added in any order. Edges are inferred from deferred
//! references and branch membership, plus any explicit `depends_on`;
//! validation rejects name collisions, unknown targets, and cycles.

use crate::core::reference::{PipelineValue, ReferenceTarget};
use crate::core::step::{Step, StepKind};
use crate::error::{Result, ValidationError};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Default)]
pub struct StepGraph {
    steps: Vec<Step>,
    index: HashMap<String, usize>,
}

impl StepGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a step; names must be unique across the whole graph
    pub fn add_step(&mut self, step: Step) -> Result<()> {
        if self.index.contains_key(&step.name) {
            return Err(ValidationError::DuplicateStepName { name: step.name }.into());
        }
        self.index.insert(step.name.clone(), self.steps.len());
        self.steps.push(step);
        Ok(())
    }

    pub fn step(&self, name: &str) -> Option<&Step> {
        self.index.get(name).map(|i| &self.steps[*i])
    }

    /// Steps in declaration order
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Full dependency map: inferred reference edges, explicit `depends_on`,
    /// and the edge from a conditional to each of its branch members
    pub fn dependency_map(&self) -> HashMap<String, BTreeSet<String>> {
        let mut deps: HashMap<String, BTreeSet<String>> = self
            .steps
            .iter()
            .map(|step| {
                let mut set: BTreeSet<String> =
                    step.referenced_steps().into_iter().map(String::from).collect();
                set.extend(step.depends_on.iter().cloned());
                (step.name.clone(), set)
            })
            .collect();

        for step in &self.steps {
            if let StepKind::Conditional(branch) = &step.kind {
                for member in branch.if_steps.iter().chain(&branch.else_steps) {
                    if self.index.contains_key(member) {
                        if let Some(set) = deps.get_mut(member) {
                            set.insert(step.name.clone());
                        }
                    }
                }
            }
        }

        deps
    }

    /// Structural validation: every referenced target declared, conditional
    /// branches well formed, and the graph acyclic
    pub fn validate(&self) -> Result<()> {
        self.check_targets()?;
        self.sorted_indices(&self.dependency_map())?;
        Ok(())
    }

    /// Steps in dependency order; ties among independent steps are broken by
    /// declaration order for determinism
    pub fn topological_order(&self) -> Result<Vec<&Step>> {
        self.check_targets()?;
        let order = self.sorted_indices(&self.dependency_map())?;
        Ok(order.into_iter().map(|i| &self.steps[i]).collect())
    }

    fn check_targets(&self) -> Result<()> {
        for step in &self.steps {
            for value in step.input_values() {
                if let PipelineValue::Deferred(r) = value {
                    let target = match self.step(&r.step) {
                        Some(t) => t,
                        None => {
                            return Err(unknown(&r.step, &step.name));
                        }
                    };
                    match &r.target {
                        ReferenceTarget::Output(name) => {
                            if !target.declares_output(name) {
                                return Err(unknown(
                                    &format!("{}.{}", r.step, name),
                                    &step.name,
                                ));
                            }
                        }
                        ReferenceTarget::PropertyFile { file, .. } => {
                            if target.property_file(file).is_none() {
                                return Err(unknown(
                                    &format!("{}.{}", r.step, file),
                                    &step.name,
                                ));
                            }
                        }
                    }
                }
            }

            for dep in &step.depends_on {
                if !self.index.contains_key(dep) {
                    return Err(unknown(dep, &step.name));
                }
            }

            if let StepKind::Conditional(branch) = &step.kind {
                if branch.if_steps.is_empty() {
                    return Err(ValidationError::EmptyIfBranch {
                        step: step.name.clone(),
                    }
                    .into());
                }
                for member in branch.if_steps.iter().chain(&branch.else_steps) {
                    if !self.index.contains_key(member) {
                        return Err(unknown(member, &step.name));
                    }
                }
            }
        }
        Ok(())
    }

    /// Kahn's algorithm over declaration indices; the ready set is ordered,
    /// which makes ties deterministic
    fn sorted_indices(&self, deps: &HashMap<String, BTreeSet<String>>) -> Result<Vec<usize>> {
        let mut indegree = vec![0usize; self.steps.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.steps.len()];

        for (i, step) in self.steps.iter().enumerate() {
            if let Some(set) = deps.get(&step.name) {
                for dep in set {
                    if let Some(&j) = self.index.get(dep) {
                        indegree[i] += 1;
                        dependents[j].push(i);
                    }
                }
            }
        }

        let mut ready: BTreeSet<usize> = indegree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d == 0)
            .map(|(i, _)| i)
            .collect();
        let mut order = Vec::with_capacity(self.steps.len());

        while let Some(&i) = ready.iter().next() {
            ready.remove(&i);
            order.push(i);
            for &j in &dependents[i] {
                indegree[j] -= 1;
                if indegree[j] == 0 {
                    ready.insert(j);
                }
            }
        }

        if order.len() < self.steps.len() {
            return Err(ValidationError::CyclicGraph {
                cycle: self.find_cycle(deps),
            }
            .into());
        }

        Ok(order)
    }

    /// Extract one concrete cycle for the error message
    fn find_cycle(&self, deps: &HashMap<String, BTreeSet<String>>) -> Vec<String> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            White,
            Gray,
            Black,
        }

        fn visit<'a>(
            node: &'a str,
            deps: &'a HashMap<String, BTreeSet<String>>,
            marks: &mut HashMap<&'a str, Mark>,
            stack: &mut Vec<&'a str>,
        ) -> Option<Vec<String>> {
            marks.insert(node, Mark::Gray);
            stack.push(node);
            for dep in deps.get(node).into_iter().flatten() {
                match marks.get(dep.as_str()).copied().unwrap_or(Mark::White) {
                    Mark::Gray => {
                        let start = stack
                            .iter()
                            .position(|n| *n == dep.as_str())
                            .unwrap_or(0);
                        let mut cycle: Vec<String> =
                            stack[start..].iter().map(|s| s.to_string()).collect();
                        cycle.push(dep.clone());
                        return Some(cycle);
                    }
                    Mark::White => {
                        if let Some(cycle) = visit(dep, deps, marks, stack) {
                            return Some(cycle);
                        }
                    }
                    Mark::Black => {}
                }
            }
            stack.pop();
            marks.insert(node, Mark::Black);
            None
        }

        let mut marks = HashMap::new();
        let mut stack = Vec::new();
        for step in &self.steps {
            if marks.get(step.name.as_str()).copied().unwrap_or(Mark::White) == Mark::White {
                if let Some(cycle) = visit(&step.name, deps, &mut marks, &mut stack) {
                    return cycle;
                }
            }
        }
        Vec::new()
    }
}

fn unknown(target: &str, referenced_by: &str) -> crate::error::PipelineError {
    ValidationError::UnknownTarget {
        target: target.to_string(),
        referenced_by: referenced_by.to_string(),
    }
    .into()
}
