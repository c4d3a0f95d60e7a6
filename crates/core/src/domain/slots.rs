//! Slot schema: the fields required before a recommendation can be generated.
//!
//! Slots are filled incrementally. Every write is a [`SlotPatch`] that only touches the
//! fields it carries, so writes to different slots commute.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotName {
    ClientName,
    Age,
    Goal,
    Ram,
    NeedsGpu,
}

impl SlotName {
    pub const ALL: [SlotName; 5] =
        [Self::ClientName, Self::Age, Self::Goal, Self::Ram, Self::NeedsGpu];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientName => "client_name",
            Self::Age => "age",
            Self::Goal => "goal",
            Self::Ram => "ram",
            Self::NeedsGpu => "needs_gpu",
        }
    }

    /// Column header used when the slot record is rendered for the model.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ClientName => "Client Name",
            Self::Age => "Age",
            Self::Goal => "Goal",
            Self::Ram => "RAM",
            Self::NeedsGpu => "GPU",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            Self::ClientName => "the client's name",
            Self::Age => "the client's age",
            Self::Goal => "the primary purpose of the notebook (e.g., work, study, gaming)",
            Self::Ram => "the amount of RAM needed (e.g., 8GB, 16GB)",
            Self::NeedsGpu => "whether the client needs a dedicated GPU (Yes, No or Maybe)",
        }
    }
}

impl fmt::Display for SlotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bullet list of every slot, embedded in the persona prompt.
pub fn slots_description() -> String {
    SlotName::ALL
        .iter()
        .map(|slot| format!("- {}: {}", slot.label(), slot.description()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GpuNeed {
    Yes,
    No,
    Maybe,
}

impl GpuNeed {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "Yes",
            Self::No => "No",
            Self::Maybe => "Maybe",
        }
    }
}

impl From<bool> for GpuNeed {
    fn from(value: bool) -> Self {
        if value {
            Self::Yes
        } else {
            Self::No
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unrecognized gpu preference `{value}` (expected yes|no|maybe)")]
pub struct GpuNeedParseError {
    pub value: String,
}

impl FromStr for GpuNeed {
    type Err = GpuNeedParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "yes" | "y" | "true" | "sim" | "si" | "sí" | "oui" | "ja" => Ok(Self::Yes),
            "no" | "n" | "false" | "não" | "nao" | "non" | "nein" => Ok(Self::No),
            "maybe" | "talvez" | "quizás" | "quizas" | "peut-être" | "vielleicht" | "unsure" => {
                Ok(Self::Maybe)
            }
            _ => Err(GpuNeedParseError { value: value.trim().to_string() }),
        }
    }
}

impl fmt::Display for GpuNeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The client record collected so far. `None` means the slot is still open.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slots {
    pub client_name: Option<String>,
    pub age: Option<u32>,
    pub goal: Option<String>,
    pub ram: Option<String>,
    pub needs_gpu: Option<GpuNeed>,
}

/// A partial write. Only `Some` fields are applied.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotPatch {
    pub client_name: Option<String>,
    pub age: Option<u32>,
    pub goal: Option<String>,
    pub ram: Option<String>,
    pub needs_gpu: Option<GpuNeed>,
}

impl SlotPatch {
    pub fn client_name(value: impl Into<String>) -> Self {
        Self { client_name: Some(value.into()), ..Self::default() }
    }

    pub fn age(value: u32) -> Self {
        Self { age: Some(value), ..Self::default() }
    }

    pub fn goal(value: impl Into<String>) -> Self {
        Self { goal: Some(value.into()), ..Self::default() }
    }

    pub fn ram(value: impl Into<String>) -> Self {
        Self { ram: Some(value.into()), ..Self::default() }
    }

    pub fn needs_gpu(value: GpuNeed) -> Self {
        Self { needs_gpu: Some(value), ..Self::default() }
    }

    pub fn is_empty(&self) -> bool {
        self.touched().is_empty()
    }

    /// Slots this patch writes.
    pub fn touched(&self) -> Vec<SlotName> {
        let mut touched = Vec::new();
        if self.client_name.is_some() {
            touched.push(SlotName::ClientName);
        }
        if self.age.is_some() {
            touched.push(SlotName::Age);
        }
        if self.goal.is_some() {
            touched.push(SlotName::Goal);
        }
        if self.ram.is_some() {
            touched.push(SlotName::Ram);
        }
        if self.needs_gpu.is_some() {
            touched.push(SlotName::NeedsGpu);
        }
        touched
    }
}

impl Slots {
    /// Field-wise merge: fields absent from the patch keep their current value.
    pub fn merge(&mut self, patch: &SlotPatch) {
        if let Some(client_name) = &patch.client_name {
            self.client_name = Some(client_name.clone());
        }
        if let Some(age) = patch.age {
            self.age = Some(age);
        }
        if let Some(goal) = &patch.goal {
            self.goal = Some(goal.clone());
        }
        if let Some(ram) = &patch.ram {
            self.ram = Some(ram.clone());
        }
        if let Some(needs_gpu) = patch.needs_gpu {
            self.needs_gpu = Some(needs_gpu);
        }
    }

    pub fn merged(mut self, patch: &SlotPatch) -> Self {
        self.merge(patch);
        self
    }

    pub fn value(&self, slot: SlotName) -> Option<String> {
        match slot {
            SlotName::ClientName => self.client_name.clone(),
            SlotName::Age => self.age.map(|age| age.to_string()),
            SlotName::Goal => self.goal.clone(),
            SlotName::Ram => self.ram.clone(),
            SlotName::NeedsGpu => self.needs_gpu.map(|gpu| gpu.as_str().to_string()),
        }
    }

    pub fn missing(&self) -> Vec<SlotName> {
        SlotName::ALL.into_iter().filter(|slot| self.value(*slot).is_none()).collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.missing().len() == SlotName::ALL.len()
    }

    /// Header row plus value row, columns separated by ` | `; open slots render `-`.
    pub fn render_table(&self) -> String {
        let header =
            SlotName::ALL.iter().map(SlotName::label).collect::<Vec<_>>().join(" | ");
        let values = SlotName::ALL
            .iter()
            .map(|slot| self.value(*slot).unwrap_or_else(|| "-".to_string()))
            .collect::<Vec<_>>()
            .join(" | ");
        format!("{header}\n{values}")
    }
}
