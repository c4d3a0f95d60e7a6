use serde_json::json;

use salesbot_core::domain::slots::{SlotPatch, Slots};
use salesbot_core::domain::tool::{ToolCall, ToolName};
use salesbot_core::errors::DomainError;

use crate::llm::ToolSchema;

/// Outcome of running one tool against the current record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolEffect {
    pub patch: Option<SlotPatch>,
    pub slots: Slots,
    pub output: String,
}

/// The closed tool set offered to the model, and the pure execution of every tool except
/// the completion signal.
#[derive(Clone, Debug)]
pub struct ToolRegistry {
    schemas: Vec<ToolSchema>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self { schemas: ToolName::ALL.iter().map(|tool| schema_for(*tool)).collect() }
    }
}

impl ToolRegistry {
    pub fn schemas(&self) -> &[ToolSchema] {
        &self.schemas
    }

    pub fn schema(&self, tool: ToolName) -> Option<&ToolSchema> {
        self.schemas.iter().find(|schema| schema.name == tool.as_str())
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Slot writers patch exactly their own slot; `get_info` only reads. Either way the
    /// output is the full client record as a text table.
    pub fn execute(&self, slots: &Slots, call: &ToolCall) -> Result<ToolEffect, DomainError> {
        match call {
            ToolCall::SlotFilling { .. } => Err(DomainError::InvariantViolation(
                "the completion signal `SlotFilling` is not an executable tool".to_string(),
            )),
            ToolCall::GetInfo => Ok(ToolEffect {
                patch: None,
                slots: slots.clone(),
                output: slots.render_table(),
            }),
            writer => {
                let patch = writer.slot_patch().ok_or_else(|| {
                    DomainError::InvariantViolation(format!(
                        "tool `{}` has no slot to write",
                        writer.name()
                    ))
                })?;
                let slots = slots.clone().merged(&patch);
                let output = slots.render_table();
                Ok(ToolEffect { patch: Some(patch), slots, output })
            }
        }
    }
}

fn schema_for(tool: ToolName) -> ToolSchema {
    let (description, parameters) = match tool {
        ToolName::InformName => (
            "Save the name of the client you are talking to.",
            object(json!({ "client_name": { "type": "string" } }), &["client_name"]),
        ),
        ToolName::InformAge => (
            "Save the age of the client you are talking to.",
            object(
                json!({ "age": { "type": "integer", "minimum": 0, "maximum": 150 } }),
                &["age"],
            ),
        ),
        ToolName::InformObjective => (
            "Save the goal or purpose of use of the notebook (work, study, gaming and others).",
            object(json!({ "description": { "type": "string" } }), &["description"]),
        ),
        ToolName::InformRam => (
            "Save the desired RAM capacity: 4GB, 8GB, 16GB or 32GB.",
            object(json!({ "capacity": { "type": "string" } }), &["capacity"]),
        ),
        ToolName::InformGpu => (
            "Save whether the computer needs a GPU (Yes, No or Maybe).",
            object(
                json!({ "needs_gpu": { "type": "string", "enum": ["Yes", "No", "Maybe"] } }),
                &["needs_gpu"],
            ),
        ),
        ToolName::GetInfo => (
            "Return everything known about the client you are talking to: name, age, \
             notebook usage and other details.",
            object(json!({}), &[]),
        ),
        ToolName::SlotFilling => (
            "Information to generate a notebook recommendation. Call it once every \
             requirement is known.",
            object(
                json!({
                    "client_name": { "type": "string", "description": "The client's name." },
                    "age": { "type": "integer", "description": "The client's age." },
                    "goal": {
                        "type": "string",
                        "description": "Purpose of use: work, study, gaming and similar."
                    },
                    "ram": {
                        "type": "string",
                        "description": "How much RAM: 4GB, 8GB, 16GB or 32GB."
                    },
                    "has_gpu": {
                        "type": "string",
                        "enum": ["Yes", "No", "Maybe"],
                        "description": "Whether a GPU is needed."
                    }
                }),
                &["client_name", "age", "goal", "ram", "has_gpu"],
            ),
        ),
    };

    ToolSchema { name: tool.as_str().to_string(), description: description.to_string(), parameters }
}

fn object(properties: serde_json::Value, required: &[&str]) -> serde_json::Value {
    json!({ "type": "object", "properties": properties, "required": required })
}

#[cfg(test)]
mod tests {
    use salesbot_core::domain::slots::{GpuNeed, SlotName, SlotPatch, Slots};
    use salesbot_core::domain::tool::{ToolCall, ToolName};
    use salesbot_core::errors::DomainError;

    use super::ToolRegistry;

    #[test]
    fn registry_exposes_one_schema_per_tool() {
        let registry = ToolRegistry::default();
        assert_eq!(registry.len(), ToolName::ALL.len());
        for tool in ToolName::ALL {
            let schema = registry.schema(tool).expect("schema");
            assert_eq!(schema.parameters["type"], "object");
        }
        let completion = registry.schema(ToolName::SlotFilling).expect("completion");
        assert_eq!(completion.parameters["required"].as_array().map(Vec::len), Some(5));
    }

    #[test]
    fn writer_sets_only_its_slot_and_returns_record_table() {
        let registry = ToolRegistry::default();
        let slots = Slots::default().merged(&SlotPatch::client_name("Ana"));

        let effect = registry
            .execute(&slots, &ToolCall::InformGpu { needs_gpu: GpuNeed::Maybe })
            .expect("execute");

        assert_eq!(effect.patch, Some(SlotPatch::needs_gpu(GpuNeed::Maybe)));
        assert_eq!(effect.slots.client_name.as_deref(), Some("Ana"));
        assert_eq!(effect.slots.needs_gpu, Some(GpuNeed::Maybe));
        assert_eq!(effect.slots.missing(), vec![SlotName::Age, SlotName::Goal, SlotName::Ram]);
        assert_eq!(effect.output, "Client Name | Age | Goal | RAM | GPU\nAna | - | - | - | Maybe");
    }

    #[test]
    fn get_info_reads_without_patch() {
        let registry = ToolRegistry::default();
        let slots = Slots::default().merged(&SlotPatch::age(41));

        let effect = registry.execute(&slots, &ToolCall::GetInfo).expect("execute");

        assert_eq!(effect.patch, None);
        assert_eq!(effect.slots, slots);
        assert!(effect.output.contains("41"));
    }

    #[test]
    fn completion_signal_is_never_executed() {
        let registry = ToolRegistry::default();
        let call = ToolCall::SlotFilling {
            requirements: Slots::default().merged(&SlotPatch::needs_gpu(GpuNeed::No)),
        };

        let error = registry.execute(&Slots::default(), &call).expect_err("not executable");
        assert!(matches!(error, DomainError::InvariantViolation(_)));
    }
}
