//! Practice catalog: built-in practices, JSON catalogs and the remote daily
//! script. Everything is normalized into [`Practice`] before the engine sees
//! it.

pub mod daily;

use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};

use crate::models::{BreathPattern, Practice, PracticeKind, Step};

pub use daily::DailyScriptSource;

pub const DEFAULT_PRACTICE_ID: &str = "default-pause";

#[derive(Debug, Clone)]
pub struct Catalog {
    practices: Vec<Arc<Practice>>,
}

impl Catalog {
    pub fn new(practices: Vec<Practice>) -> Self {
        Self {
            practices: practices.into_iter().map(Arc::new).collect(),
        }
    }

    /// Parse a JSON array of practices. Invalid entries are dropped with a
    /// warning; a catalog that ends up empty holds the default practice.
    pub fn from_json(json: &str) -> Result<Self> {
        let parsed: Vec<Practice> =
            serde_json::from_str(json).context("failed to parse practice catalog")?;

        let mut practices: Vec<Practice> = parsed
            .into_iter()
            .filter(|practice| match practice.validate() {
                Ok(()) => true,
                Err(err) => {
                    log::warn!("Skipping invalid practice: {err:#}");
                    false
                }
            })
            .collect();

        if practices.is_empty() {
            practices.push(default_practice());
        }
        Ok(Self::new(practices))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog {}", path.display()))?;
        Self::from_json(&contents)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Practice>> {
        self.practices
            .iter()
            .find(|practice| practice.id == id)
            .cloned()
    }

    pub fn practices(&self) -> &[Arc<Practice>] {
        &self.practices
    }

    pub fn builtin() -> Self {
        Self::new(vec![
            Practice::new(
                "quick-calm",
                "Quick Calm",
                PracticeKind::Breath,
                35,
                vec![
                    Step::new("Settle", "Sit comfortably and let your shoulders drop.")
                        .with_narration("Find a comfortable seat. Let your shoulders drop, and when you're ready, begin.")
                        .with_visual("breath-circle")
                        .with_duration(0),
                    Step::new("Box breathing", "Follow the square: in, hold, out, rest.")
                        .with_visual("breath-square")
                        .with_duration(180),
                ],
            )
            .with_breath_pattern(BreathPattern::new(3, 3, 3, 3)),
            Practice::new(
                "witness",
                "The Witness",
                PracticeKind::Witness,
                50,
                vec![
                    Step::new("Notice", "Watch thoughts arise without following them.")
                        .with_guidance("Each thought is a cloud. Let it pass.")
                        .with_visual("thought-sky")
                        .with_duration(120),
                    Step::new("Label", "Name each thought softly: planning, remembering, judging.")
                        .with_guidance("A gentle label, then back to watching.")
                        .with_duration(120),
                    Step::new("Rest as awareness", "Rest as the one who notices.")
                        .with_guidance("You are the sky, not the weather."),
                ],
            ),
            Practice::new(
                "body-presence",
                "Body Presence",
                PracticeKind::Presence,
                40,
                vec![
                    Step::new("Feet", "Bring attention to the soles of your feet.")
                        .with_visual("body-map:feet")
                        .with_duration(60),
                    Step::new("Torso", "Feel the breath moving in your chest and belly.")
                        .with_visual("body-map:torso")
                        .with_duration(60),
                    Step::new("Whole body", "Sense the whole body at once.")
                        .with_visual("body-map:whole")
                        .with_duration(90),
                ],
            ),
            Practice::new(
                "energy-reset",
                "Energy Reset",
                PracticeKind::Energy,
                30,
                vec![
                    Step::new("Shake out", "Gently shake your hands and arms.")
                        .with_guidance("Loose and easy.")
                        .with_duration(30),
                    Step::new("Stretch", "Reach up tall, then fold forward.")
                        .with_guidance("Move slowly and breathe.")
                        .with_duration(45),
                ],
            )
            .with_auto_advance(),
            Practice::new(
                "reframe",
                "Reframe a Thought",
                PracticeKind::Reframing,
                45,
                vec![
                    Step::new("Name it", "Write down the thought that is bothering you."),
                    Step::new("Question it", "Is it completely true? What evidence do you have?"),
                    Step::new("Reframe", "Write a kinder, more balanced version."),
                ],
            ),
            Practice::new(
                "free-write",
                "Free Write",
                PracticeKind::FreeForm,
                25,
                vec![Step::new("Write", "Write whatever comes to mind for five minutes.")
                    .with_duration(300)],
            ),
        ])
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Minimal single-step practice used whenever content is missing or broken.
pub fn default_practice() -> Practice {
    Practice::new(
        DEFAULT_PRACTICE_ID,
        "Mindful Pause",
        PracticeKind::Presence,
        10,
        vec![Step::new(
            "Pause",
            "Take three slow breaths and notice how you feel.",
        )
        .with_guidance("Breathe slowly. There is nowhere else to be.")
        .with_duration(60)],
    )
}
