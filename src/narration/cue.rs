use crate::session::{SessionSnapshot, SubState};

/// What a given session state should sound like.
///
/// `key` identifies the state entry for deduplication and stale-continuation
/// checks. `text` is `None` when the state is silent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrationCue {
    pub key: String,
    pub text: Option<String>,
    pub cache_key: Option<String>,
}

pub fn cue_for(snapshot: &SessionSnapshot) -> NarrationCue {
    let mut key = format!(
        "{}:{}:{}",
        snapshot.session_id,
        snapshot.step_index,
        snapshot.sub_state.as_str()
    );

    if snapshot.sub_state == SubState::Active {
        if let Some(breath) = snapshot.breath {
            key.push_str(&format!(":{}:{}", breath.phase.as_str(), breath.cycle_count));
        }
    }

    if snapshot.paused {
        key.push_str(":paused");
        return NarrationCue {
            key,
            text: None,
            cache_key: None,
        };
    }

    let (text, cache_key) = match snapshot.sub_state {
        SubState::Intro => (
            Some(snapshot.step.intro_script()),
            snapshot.step.narration_key.clone(),
        ),
        SubState::Active => match snapshot.breath {
            Some(breath) => (
                Some(breath.phase.cue().to_string()),
                Some(format!("breath:{}", breath.phase.as_str())),
            ),
            None => (snapshot.step.guidance.clone(), None),
        },
        SubState::Complete => (
            Some(format!("{} complete. Well done.", snapshot.practice_title)),
            None,
        ),
    };

    NarrationCue {
        key,
        text: text.filter(|text| !text.trim().is_empty()),
        cache_key,
    }
}
