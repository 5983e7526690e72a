//! Catalog data: practices and their ordered steps.
//!
//! Practices are immutable once built. The session engine only ever reads
//! them through an `Arc<Practice>`.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Practice-type tag. Only `Breath` changes engine behaviour (it runs the
/// breath phase cycle); the rest matter to renderers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum PracticeKind {
    Breath,
    Witness,
    Presence,
    Energy,
    Reframing,
    FreeForm,
}

impl PracticeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PracticeKind::Breath => "breath",
            PracticeKind::Witness => "witness",
            PracticeKind::Presence => "presence",
            PracticeKind::Energy => "energy",
            PracticeKind::Reframing => "reframing",
            PracticeKind::FreeForm => "free-form",
        }
    }
}

/// Seconds for inhale, hold, exhale and rest, in that order.
///
/// Stored as given; zero entries are clamped to one second when read through
/// [`BreathPattern::phase_secs`] so a bad pattern can never stall the cycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "Vec<u32>", into = "Vec<u32>")]
pub struct BreathPattern([u32; 4]);

impl BreathPattern {
    pub const BOX: BreathPattern = BreathPattern([4, 4, 4, 4]);

    pub fn new(inhale: u32, hold: u32, exhale: u32, rest: u32) -> Self {
        Self([inhale, hold, exhale, rest])
    }

    /// Effective duration of the phase at `index` (0..4), never below 1s.
    pub fn phase_secs(&self, index: usize) -> u32 {
        self.0.get(index).copied().unwrap_or(0).max(1)
    }

    pub fn cycle_secs(&self) -> u32 {
        (0..4).map(|index| self.phase_secs(index)).sum()
    }

    pub fn raw(&self) -> [u32; 4] {
        self.0
    }
}

impl Default for BreathPattern {
    fn default() -> Self {
        Self::BOX
    }
}

// Missing trailing entries become 0 and are clamped on read.
impl From<Vec<u32>> for BreathPattern {
    fn from(values: Vec<u32>) -> Self {
        let mut pattern = [0u32; 4];
        for (slot, value) in pattern.iter_mut().zip(values) {
            *slot = value;
        }
        Self(pattern)
    }
}

impl From<BreathPattern> for Vec<u32> {
    fn from(pattern: BreathPattern) -> Self {
        pattern.0.to_vec()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub title: String,
    pub instruction: String,
    #[serde(default)]
    pub guidance: Option<String>,
    /// `None` or `0` means the step is self-timed.
    #[serde(default)]
    pub duration_secs: Option<u32>,
    /// Script spoken when the step is introduced. Defaults to title and
    /// instruction.
    #[serde(default)]
    pub narration: Option<String>,
    /// Precomputed narration cache key, used instead of the script text.
    #[serde(default)]
    pub narration_key: Option<String>,
    /// Opaque directive for renderers.
    #[serde(default)]
    pub visual: Option<String>,
}

impl Step {
    pub fn new(title: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            instruction: instruction.into(),
            guidance: None,
            duration_secs: None,
            narration: None,
            narration_key: None,
            visual: None,
        }
    }

    pub fn with_duration(mut self, secs: u32) -> Self {
        self.duration_secs = Some(secs);
        self
    }

    pub fn with_guidance(mut self, guidance: impl Into<String>) -> Self {
        self.guidance = Some(guidance.into());
        self
    }

    pub fn with_narration(mut self, script: impl Into<String>) -> Self {
        self.narration = Some(script.into());
        self
    }

    pub fn with_visual(mut self, visual: impl Into<String>) -> Self {
        self.visual = Some(visual.into());
        self
    }

    /// Countdown length, or `None` for a self-timed step.
    pub fn timed_secs(&self) -> Option<u32> {
        self.duration_secs.filter(|secs| *secs > 0)
    }

    pub fn intro_script(&self) -> String {
        match &self.narration {
            Some(script) if !script.trim().is_empty() => script.clone(),
            _ => format!("{}. {}", self.title, self.instruction),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Practice {
    pub id: String,
    pub title: String,
    pub xp: u32,
    pub kind: PracticeKind,
    #[serde(default)]
    pub breath_pattern: Option<BreathPattern>,
    /// Free-running guided flow: narration completion starts and advances
    /// steps.
    #[serde(default)]
    pub auto_advance: bool,
    #[serde(default)]
    pub nominal_duration_secs: Option<u32>,
    pub steps: Vec<Step>,
}

impl Practice {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        kind: PracticeKind,
        xp: u32,
        steps: Vec<Step>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            xp,
            kind,
            breath_pattern: None,
            auto_advance: false,
            nominal_duration_secs: None,
            steps,
        }
    }

    pub fn with_breath_pattern(mut self, pattern: BreathPattern) -> Self {
        self.breath_pattern = Some(pattern);
        self
    }

    pub fn with_auto_advance(mut self) -> Self {
        self.auto_advance = true;
        self
    }

    pub fn is_breath(&self) -> bool {
        self.kind == PracticeKind::Breath
    }

    /// Pattern the breath cycle runs with; `None` for non-breath practices.
    pub fn effective_breath_pattern(&self) -> Option<BreathPattern> {
        self.is_breath()
            .then(|| self.breath_pattern.unwrap_or_default())
    }

    pub fn total_duration_secs(&self) -> u32 {
        self.nominal_duration_secs.unwrap_or_else(|| {
            self.steps
                .iter()
                .filter_map(Step::timed_secs)
                .sum()
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            bail!("practice has an empty id");
        }
        if self.steps.is_empty() {
            bail!("practice '{}' has no steps", self.id);
        }
        if let Some(index) = self
            .steps
            .iter()
            .position(|step| step.title.trim().is_empty() && step.instruction.trim().is_empty())
        {
            bail!("practice '{}' step {index} has no text", self.id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_pattern_is_padded_and_clamped() {
        let pattern: BreathPattern = serde_json::from_str("[4, 0, 6]").unwrap();
        assert_eq!(pattern.raw(), [4, 0, 6, 0]);
        assert_eq!(pattern.phase_secs(1), 1);
        assert_eq!(pattern.phase_secs(3), 1);
        assert_eq!(pattern.cycle_secs(), 12);
    }

    #[test]
    fn zero_duration_is_self_timed() {
        let step = Step::new("Settle", "Find a comfortable seat").with_duration(0);
        assert_eq!(step.timed_secs(), None);
        assert_eq!(step.with_duration(90).timed_secs(), Some(90));
    }

    #[test]
    fn intro_script_falls_back_to_title_and_instruction() {
        let step = Step::new("Settle", "Find a comfortable seat");
        assert_eq!(step.intro_script(), "Settle. Find a comfortable seat");
        let scripted = step.with_narration("Welcome.");
        assert_eq!(scripted.intro_script(), "Welcome.");
    }

    #[test]
    fn breath_pattern_only_for_breath_practices() {
        let steps = vec![Step::new("a", "b").with_duration(60)];
        let breath = Practice::new("1", "Box", PracticeKind::Breath, 10, steps.clone());
        assert_eq!(breath.effective_breath_pattern(), Some(BreathPattern::BOX));

        let witness = Practice::new("2", "Watch", PracticeKind::Witness, 10, steps)
            .with_breath_pattern(BreathPattern::new(1, 2, 3, 4));
        assert_eq!(witness.effective_breath_pattern(), None);
        assert_eq!(witness.total_duration_secs(), 60);
    }

    #[test]
    fn practice_without_steps_is_invalid() {
        let empty = Practice::new("1", "Empty", PracticeKind::FreeForm, 5, vec![]);
        assert!(empty.validate().is_err());
    }

    #[test]
    fn deserializes_camel_case_catalog_entry() {
        let json = r#"{
            "id": "box",
            "title": "Box Breathing",
            "xp": 35,
            "kind": "breath",
            "breathPattern": [3, 3, 3, 3],
            "steps": [
                {"title": "Arrive", "instruction": "Sit tall"},
                {"title": "Breathe", "instruction": "Follow the square", "durationSecs": 180}
            ]
        }"#;
        let practice: Practice = serde_json::from_str(json).unwrap();
        assert_eq!(practice.kind, PracticeKind::Breath);
        assert_eq!(practice.steps[1].timed_secs(), Some(180));
        assert!(!practice.auto_advance);
        assert_eq!(practice.total_duration_secs(), 180);
    }
}
