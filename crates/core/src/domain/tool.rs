//! Closed set of tools the model may request, with typed argument payloads.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::domain::slots::{GpuNeed, SlotName, SlotPatch, Slots};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolName {
    InformName,
    InformAge,
    InformObjective,
    InformRam,
    InformGpu,
    GetInfo,
    SlotFilling,
}

impl ToolName {
    pub const ALL: [ToolName; 7] = [
        Self::InformName,
        Self::InformAge,
        Self::InformObjective,
        Self::InformRam,
        Self::InformGpu,
        Self::GetInfo,
        Self::SlotFilling,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InformName => "inform_name",
            Self::InformAge => "inform_age",
            Self::InformObjective => "inform_objective",
            Self::InformRam => "inform_ram",
            Self::InformGpu => "inform_gpu",
            Self::GetInfo => "get_info",
            Self::SlotFilling => "SlotFilling",
        }
    }

    /// The slot a writer tool owns; `None` for `get_info` and the completion signal.
    pub fn owned_slot(&self) -> Option<SlotName> {
        match self {
            Self::InformName => Some(SlotName::ClientName),
            Self::InformAge => Some(SlotName::Age),
            Self::InformObjective => Some(SlotName::Goal),
            Self::InformRam => Some(SlotName::Ram),
            Self::InformGpu => Some(SlotName::NeedsGpu),
            Self::GetInfo | Self::SlotFilling => None,
        }
    }

    pub fn is_completion_signal(&self) -> bool {
        matches!(self, Self::SlotFilling)
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::GetInfo)
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = ToolArgsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tool| tool.as_str() == value)
            .ok_or_else(|| ToolArgsError::UnknownTool { name: value.to_string() })
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ToolArgsError {
    #[error("unknown tool `{name}`")]
    UnknownTool { name: String },
    #[error("invalid arguments for `{tool}`: {message}")]
    InvalidArguments { tool: ToolName, message: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum ToolCall {
    InformName { client_name: String },
    InformAge { age: u32 },
    InformObjective { description: String },
    InformRam { capacity: String },
    InformGpu { needs_gpu: GpuNeed },
    GetInfo,
    /// The completion signal. Carries whatever requirements the model sent that could be
    /// read; unreadable or missing fields stay open.
    SlotFilling { requirements: Slots },
}

impl ToolCall {
    /// Builds a typed call from the model's wire form. Numeric strings are accepted for
    /// ages and yes/no/maybe spellings or booleans for the GPU preference. The completion
    /// signal never fails on its arguments.
    pub fn parse(name: &str, args: &Value) -> Result<Self, ToolArgsError> {
        let tool = name.parse::<ToolName>()?;
        if tool.is_completion_signal() {
            return Ok(Self::completion(args));
        }
        let empty = Map::new();
        let fields = match args {
            Value::Object(fields) => fields,
            Value::Null => &empty,
            other => {
                return Err(ToolArgsError::InvalidArguments {
                    tool,
                    message: format!("expected a JSON object, got `{other}`"),
                });
            }
        };

        let call = match tool {
            ToolName::InformName => {
                Self::InformName { client_name: require_text(tool, fields, "client_name")? }
            }
            ToolName::InformAge => Self::InformAge { age: require_age(tool, fields, "age")? },
            ToolName::InformObjective => {
                Self::InformObjective { description: require_text(tool, fields, "description")? }
            }
            ToolName::InformRam => {
                Self::InformRam { capacity: require_text(tool, fields, "capacity")? }
            }
            ToolName::InformGpu => {
                Self::InformGpu { needs_gpu: require_gpu(tool, fields, "needs_gpu")? }
            }
            ToolName::GetInfo => Self::GetInfo,
            ToolName::SlotFilling => Self::completion(args),
        };
        Ok(call)
    }

    /// Reads the completion signal's requirements field by field, keeping what parses.
    pub fn completion(args: &Value) -> Self {
        let tool = ToolName::SlotFilling;
        let Some(fields) = args.as_object() else {
            return Self::SlotFilling { requirements: Slots::default() };
        };
        let requirements = Slots {
            client_name: require_text(tool, fields, "client_name").ok(),
            age: require_age(tool, fields, "age").ok(),
            goal: require_text(tool, fields, "goal").ok(),
            ram: require_text(tool, fields, "ram").ok(),
            needs_gpu: require_gpu(tool, fields, "has_gpu").ok(),
        };
        Self::SlotFilling { requirements }
    }

    pub fn name(&self) -> ToolName {
        match self {
            Self::InformName { .. } => ToolName::InformName,
            Self::InformAge { .. } => ToolName::InformAge,
            Self::InformObjective { .. } => ToolName::InformObjective,
            Self::InformRam { .. } => ToolName::InformRam,
            Self::InformGpu { .. } => ToolName::InformGpu,
            Self::GetInfo => ToolName::GetInfo,
            Self::SlotFilling { .. } => ToolName::SlotFilling,
        }
    }

    /// Canonical wire arguments.
    pub fn args(&self) -> Value {
        match self {
            Self::InformName { client_name } => json!({ "client_name": client_name }),
            Self::InformAge { age } => json!({ "age": age }),
            Self::InformObjective { description } => json!({ "description": description }),
            Self::InformRam { capacity } => json!({ "capacity": capacity }),
            Self::InformGpu { needs_gpu } => json!({ "needs_gpu": needs_gpu.as_str() }),
            Self::GetInfo => json!({}),
            Self::SlotFilling { requirements } => json!({
                "client_name": requirements.client_name,
                "age": requirements.age,
                "goal": requirements.goal,
                "ram": requirements.ram,
                "has_gpu": requirements.needs_gpu.map(|gpu| gpu.as_str()),
            }),
        }
    }

    /// The slot write this call performs, if it is a slot writer.
    pub fn slot_patch(&self) -> Option<SlotPatch> {
        match self {
            Self::InformName { client_name } => Some(SlotPatch::client_name(client_name.clone())),
            Self::InformAge { age } => Some(SlotPatch::age(*age)),
            Self::InformObjective { description } => Some(SlotPatch::goal(description.clone())),
            Self::InformRam { capacity } => Some(SlotPatch::ram(capacity.clone())),
            Self::InformGpu { needs_gpu } => Some(SlotPatch::needs_gpu(*needs_gpu)),
            Self::GetInfo | Self::SlotFilling { .. } => None,
        }
    }
}

fn require_text(
    tool: ToolName,
    fields: &Map<String, Value>,
    key: &str,
) -> Result<String, ToolArgsError> {
    match fields.get(key) {
        Some(Value::String(text)) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        Some(Value::Number(number)) => Ok(number.to_string()),
        Some(other) => {
            Err(invalid(tool, format!("`{key}` must be a non-empty string, got `{other}`")))
        }
        None => Err(invalid(tool, format!("missing required field `{key}`"))),
    }
}

fn require_age(
    tool: ToolName,
    fields: &Map<String, Value>,
    key: &str,
) -> Result<u32, ToolArgsError> {
    let parsed = match fields.get(key) {
        Some(Value::Number(number)) => number.as_u64().and_then(|age| u32::try_from(age).ok()),
        Some(Value::String(text)) => text.trim().parse::<u32>().ok(),
        Some(_) => None,
        None => return Err(invalid(tool, format!("missing required field `{key}`"))),
    };
    parsed
        .filter(|age| *age <= 150)
        .ok_or_else(|| invalid(tool, format!("`{key}` must be a whole number between 0 and 150")))
}

fn require_gpu(
    tool: ToolName,
    fields: &Map<String, Value>,
    key: &str,
) -> Result<GpuNeed, ToolArgsError> {
    match fields.get(key) {
        Some(Value::Bool(flag)) => Ok(GpuNeed::from(*flag)),
        Some(Value::String(text)) => {
            text.parse::<GpuNeed>().map_err(|error| invalid(tool, error.to_string()))
        }
        Some(other) => {
            Err(invalid(tool, format!("`{key}` must be yes, no or maybe, got `{other}`")))
        }
        None => Err(invalid(tool, format!("missing required field `{key}`"))),
    }
}

fn invalid(tool: ToolName, message: String) -> ToolArgsError {
    ToolArgsError::InvalidArguments { tool, message }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ToolArgsError, ToolCall, ToolName};
    use crate::domain::slots::{GpuNeed, SlotName, SlotPatch};

    #[test]
    fn parses_every_slot_writer() {
        let cases = [
            ("inform_name", json!({"client_name": "Ana"}), SlotPatch::client_name("Ana")),
            ("inform_age", json!({"age": 25}), SlotPatch::age(25)),
            ("inform_objective", json!({"description": "gaming"}), SlotPatch::goal("gaming")),
            ("inform_ram", json!({"capacity": "16GB"}), SlotPatch::ram("16GB")),
            ("inform_gpu", json!({"needs_gpu": "Sim"}), SlotPatch::needs_gpu(GpuNeed::Yes)),
        ];

        for (name, args, expected) in cases {
            let call = ToolCall::parse(name, &args).expect("well-formed call");
            assert_eq!(call.name().as_str(), name);
            assert_eq!(call.slot_patch(), Some(expected));
        }
    }

    #[test]
    fn each_writer_owns_exactly_the_slot_it_patches() {
        let calls = [
            ToolCall::InformName { client_name: "Ana".to_string() },
            ToolCall::InformAge { age: 40 },
            ToolCall::InformObjective { description: "work".to_string() },
            ToolCall::InformRam { capacity: "8GB".to_string() },
            ToolCall::InformGpu { needs_gpu: GpuNeed::No },
        ];
        for call in calls {
            let patch = call.slot_patch().expect("writer has a patch");
            let owned: Option<SlotName> = call.name().owned_slot();
            assert_eq!(patch.touched(), owned.into_iter().collect::<Vec<_>>());
        }
    }

    #[test]
    fn age_accepts_numeric_strings() {
        let call = ToolCall::parse("inform_age", &json!({"age": " 15 "})).expect("coerced age");
        assert_eq!(call, ToolCall::InformAge { age: 15 });
    }

    #[test]
    fn malformed_arguments_are_rejected() {
        let error =
            ToolCall::parse("inform_age", &json!({"age": "twenty"})).expect_err("bad age");
        assert!(matches!(error, ToolArgsError::InvalidArguments { tool: ToolName::InformAge, .. }));

        let error = ToolCall::parse("inform_name", &json!({})).expect_err("missing name");
        assert!(error.to_string().contains("client_name"));

        let error = ToolCall::parse("inform_ram", &json!("16GB")).expect_err("not an object");
        assert!(matches!(error, ToolArgsError::InvalidArguments { .. }));
    }

    #[test]
    fn unknown_tools_are_rejected() {
        let error = ToolCall::parse("delete_everything", &json!({})).expect_err("unknown");
        assert_eq!(error, ToolArgsError::UnknownTool { name: "delete_everything".to_string() });
    }

    #[test]
    fn completion_signal_parses_full_record() {
        let call = ToolCall::parse(
            "SlotFilling",
            &json!({
                "client_name": "Ana",
                "age": 25,
                "goal": "gaming",
                "ram": "32GB",
                "has_gpu": true
            }),
        )
        .expect("completion call");

        assert!(call.name().is_completion_signal());
        assert_eq!(call.slot_patch(), None);
        let ToolCall::SlotFilling { requirements } = call else {
            panic!("expected completion payload");
        };
        assert!(requirements.is_complete());
        assert_eq!(requirements.needs_gpu, Some(GpuNeed::Yes));
    }

    #[test]
    fn completion_signal_keeps_only_readable_requirements() {
        let call = ToolCall::parse(
            "SlotFilling",
            &json!({"client_name": "Ana", "age": "about 30", "has_gpu": "not needed"}),
        )
        .expect("loose completion call");

        let ToolCall::SlotFilling { requirements } = &call else {
            panic!("expected completion payload");
        };
        assert_eq!(requirements.client_name.as_deref(), Some("Ana"));
        assert_eq!(requirements.age, None);
        assert_eq!(requirements.needs_gpu, None);
        assert_eq!(call.args()["age"], json!(null));

        let bare = ToolCall::parse("SlotFilling", &json!("done")).expect("non-object args");
        assert_eq!(bare, ToolCall::SlotFilling { requirements: Default::default() });
    }

    #[test]
    fn get_info_ignores_arguments_and_is_read_only() {
        let call = ToolCall::parse("get_info", &json!(null)).expect("get_info");
        assert_eq!(call, ToolCall::GetInfo);
        assert!(call.name().is_read_only());
        assert_eq!(call.args(), json!({}));
    }
}
