use agentproto::AgentOp;

/// A step to reverse a prior successful step on later failure. Registered
/// at plan time, never discovered after the fact, so the engine can reason
/// about rollback independent of which concrete step failed.
#[derive(Debug, Clone)]
pub struct CompensatingAction {
    pub name: String,
    pub op: AgentOp,
    pub args: serde_json::Value,
}

impl CompensatingAction {
    pub fn new(name: impl Into<String>, op: AgentOp, args: serde_json::Value) -> Self {
        Self { name: name.into(), op, args }
    }
}

/// One declared step of a `Plan`. `cmd_label` is the opaque string stored
/// on the persisted `TxStep` (never the literal shell invocation).
#[derive(Debug, Clone)]
pub struct PlanStep {
    pub name: String,
    pub op: AgentOp,
    pub args: serde_json::Value,
    pub cmd_label: String,
    pub destructive: bool,
    pub compensation: Option<CompensatingAction>,
}

impl PlanStep {
    pub fn new(
        name: impl Into<String>,
        op: AgentOp,
        args: serde_json::Value,
        destructive: bool,
    ) -> Self {
        let name = name.into();
        Self {
            cmd_label: format!("{}:{:?}", name, op),
            name,
            op,
            args,
            destructive,
            compensation: None,
        }
    }

    pub fn with_compensation(mut self, compensation: CompensatingAction) -> Self {
        self.compensation = Some(compensation);
        self
    }
}

/// A fully built, FIFO-ordered sequence of steps for one domain. Built by a
/// pure workflow function with no side effects beyond read-only validation.
#[derive(Debug, Clone)]
pub struct Plan {
    pub domain: String,
    pub steps: Vec<PlanStep>,
}

impl Plan {
    pub fn new(domain: impl Into<String>) -> Self {
        Self { domain: domain.into(), steps: Vec::new() }
    }

    pub fn push(&mut self, step: PlanStep) -> &mut Self {
        self.steps.push(step);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_preserves_step_order() {
        let mut plan = Plan::new("pool");
        plan.push(PlanStep::new("a", AgentOp::BtrfsMkfs, serde_json::json!({}), true));
        plan.push(PlanStep::new("b", AgentOp::BtrfsMount, serde_json::json!({}), false));
        assert_eq!(plan.steps[0].name, "a");
        assert_eq!(plan.steps[1].name, "b");
    }
}
