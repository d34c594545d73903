use crate::executor::{Document, MethodInvocation};
use crate::phase::{PhaseId, PhaseSpec};
use serde_json::json;
use std::collections::BTreeMap;

/// Supplies the invocations a phase runs.
pub trait PhasePlanner: Send + Sync {
    fn plan(&self, phase: &PhaseSpec, document: &Document) -> Vec<MethodInvocation>;
}

/// Fixed invocation lists per phase, independent of the document.
#[derive(Clone, Debug, Default)]
pub struct StaticPlan {
    phases: BTreeMap<PhaseId, Vec<MethodInvocation>>,
}

impl StaticPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_phase(mut self, phase: u8, invocations: Vec<MethodInvocation>) -> Self {
        self.phases.insert(PhaseId(phase), invocations);
        self
    }

    pub fn invocations(&self, phase: PhaseId) -> &[MethodInvocation] {
        self.phases.get(&phase).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn total_invocations(&self) -> usize {
        self.phases.values().map(Vec::len).sum()
    }

    /// A plan shaped like the default catalogue: `questions` micro questions,
    /// 6 dimensions, 10 policy areas and 4 clusters.
    pub fn reference(questions: usize) -> Self {
        let question_ids: Vec<String> = (1..=questions).map(|i| format!("Q{:03}", i)).collect();
        let per_question = |method: &str| -> Vec<MethodInvocation> {
            question_ids
                .iter()
                .map(|q| MethodInvocation::new(method).for_question(q.clone()))
                .collect()
        };
        let slots = |method: &str, prefix: &str, n: usize| -> Vec<MethodInvocation> {
            (1..=n)
                .map(|i| {
                    MethodInvocation::new(method).with_payload(json!({ "slot": format!("{}{:02}", prefix, i) }))
                })
                .collect()
        };

        Self::new()
            .with_phase(1, vec![MethodInvocation::new("config.validate")])
            .with_phase(
                2,
                vec![
                    MethodInvocation::new("ingest.normalize"),
                    MethodInvocation::new("ingest.chunk"),
                ],
            )
            .with_phase(3, per_question("micro.answer"))
            .with_phase(4, per_question("micro.score"))
            .with_phase(5, slots("aggregate.dimension", "D", 6))
            .with_phase(6, slots("aggregate.policy_area", "PA", 10))
            .with_phase(7, slots("aggregate.cluster", "CL", 4))
            .with_phase(8, vec![MethodInvocation::new("macro.evaluate")])
            .with_phase(9, slots("recommend.generate", "CL", 4))
            .with_phase(10, vec![MethodInvocation::new("report.assemble")])
            .with_phase(
                11,
                vec![
                    MethodInvocation::new("export.json"),
                    MethodInvocation::new("export.markdown"),
                ],
            )
    }
}

impl PhasePlanner for StaticPlan {
    fn plan(&self, phase: &PhaseSpec, _document: &Document) -> Vec<MethodInvocation> {
        self.invocations(phase.id).to_vec()
    }
}
