use crate::{
    application::services::cost::CostCalculator,
    domain::{
        errors::DomainResult,
        models::{CostEstimate, MessageKind},
        value_objects::{Recipient, parse_recipients},
    },
};

pub struct EstimateCostUseCase {
    calculator: CostCalculator,
}

impl EstimateCostUseCase {
    pub fn new(calculator: CostCalculator) -> Self {
        Self { calculator }
    }

    pub fn execute(&self, kind: MessageKind, content: &str, recipients: &[String]) -> DomainResult<CostEstimate> {
        let recipients: Vec<String> = parse_recipients(recipients)?
            .into_iter()
            .map(Recipient::into_inner)
            .collect();
        Ok(self.calculator.estimate(kind, content, &recipients))
    }
}
