mod common;

use std::{sync::Arc, time::Duration};

use stillpoint_lib::{
    breath::BreathPhase,
    session::{Rejection, SessionEvent, SubState},
    speech::SpeechProvider,
};

use common::{
    drain, harness, quick_calm, self_paced, settle, witness, MemoryStore, MockPlayer,
    ScriptedProvider,
};

#[tokio::test(start_paused = true)]
async fn quick_calm_walkthrough_completes_once() {
    let provider = ScriptedProvider::ok("hifi");
    let mut h = harness(
        vec![provider.clone() as Arc<dyn SpeechProvider>],
        MockPlayer::instant(),
        MemoryStore::new(),
        true,
    );

    let snapshot = h.controller.select_practice(quick_calm()).await;
    assert_eq!(snapshot.sub_state, SubState::Intro);

    // Step 0 is self-timed: no countdown, but the breath cycle runs.
    let snapshot = h.controller.start().await.unwrap();
    assert_eq!(snapshot.sub_state, SubState::Active);
    assert!(!snapshot.timer_running);
    assert!(!h.controller.timer_running().await);
    assert!(h.controller.breath_running().await);

    let snapshot = h.controller.advance().await.unwrap();
    assert_eq!(snapshot.step_index, 1);
    assert_eq!(snapshot.sub_state, SubState::Intro);
    assert!(!h.controller.breath_running().await);

    let snapshot = h.controller.start().await.unwrap();
    assert!(snapshot.timer_running);
    assert_eq!(snapshot.remaining_secs, 180);
    assert!(h.controller.advance().await.is_err());

    tokio::time::sleep(Duration::from_millis(180_500)).await;

    let snapshot = h.controller.snapshot().await.unwrap();
    assert_eq!(snapshot.remaining_secs, 0);
    assert!(!snapshot.timer_running);
    assert!(snapshot.breath.is_some());

    let snapshot = h.controller.advance().await.unwrap();
    assert_eq!(snapshot.sub_state, SubState::Complete);
    assert_eq!(
        h.controller.advance().await.unwrap_err(),
        Rejection::AlreadyComplete
    );

    let stored = h.store.events();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].xp, 35);
    assert_eq!(stored[0].title, "Quick Calm");

    let completions = drain(&mut h.events)
        .into_iter()
        .filter(|event| matches!(event, SessionEvent::Completed(_)))
        .count();
    assert_eq!(completions, 1);
    assert!(provider.texts().iter().any(|text| text == "Breathe in"));
}

#[tokio::test(start_paused = true)]
async fn advance_during_countdown_is_rejected_without_mutation() {
    let h = harness(Vec::new(), MockPlayer::instant(), MemoryStore::new(), false);
    h.controller.select_practice(witness()).await;
    h.controller.start().await.unwrap();

    tokio::time::sleep(Duration::from_millis(10_500)).await;
    let before = h.controller.snapshot().await.unwrap();
    assert_eq!(before.remaining_secs, 110);

    let rejection = h.controller.advance().await.unwrap_err();
    assert_eq!(rejection, Rejection::StepNotFinished { remaining_secs: 110 });

    let after = h.controller.snapshot().await.unwrap();
    assert_eq!(after.step_index, before.step_index);
    assert_eq!(after.sub_state, before.sub_state);
    assert_eq!(after.revision, before.revision);
}

#[tokio::test(start_paused = true)]
async fn pause_freezes_countdown_and_resume_continues() {
    let h = harness(Vec::new(), MockPlayer::instant(), MemoryStore::new(), false);
    h.controller.select_practice(witness()).await;
    h.controller.start().await.unwrap();

    tokio::time::sleep(Duration::from_millis(20_500)).await;
    let paused = h.controller.pause().await.unwrap();
    assert!(paused.paused);
    assert_eq!(paused.remaining_secs, 100);
    assert_eq!(h.controller.pause().await.unwrap_err(), Rejection::AlreadyPaused);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.controller.snapshot().await.unwrap().remaining_secs, 100);

    h.controller.resume().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100_500)).await;
    let snapshot = h.controller.snapshot().await.unwrap();
    assert_eq!(snapshot.remaining_secs, 0);
    assert!(snapshot.can_advance());
}

#[tokio::test(start_paused = true)]
async fn pause_on_the_expiry_boundary_does_not_strand_the_step() {
    let h = harness(Vec::new(), MockPlayer::instant(), MemoryStore::new(), false);
    h.controller.select_practice(witness()).await;
    h.controller.start().await.unwrap();

    // Wake on the same instant as the last tick. Either order must leave a
    // step that can still finish.
    tokio::time::sleep(Duration::from_secs(120)).await;
    let paused = h.controller.pause().await.unwrap();
    assert!(paused.remaining_secs <= 1);
    settle().await;

    h.controller.resume().await.unwrap();
    tokio::time::sleep(Duration::from_millis(1_500)).await;

    let snapshot = h.controller.snapshot().await.unwrap();
    assert_eq!(snapshot.remaining_secs, 0);
    assert!(!snapshot.timer_running);
    assert!(snapshot.can_advance());
    assert!(!h.controller.timer_running().await);

    let next = h.controller.advance().await.unwrap();
    assert_eq!(next.step_index, 1);
}

#[tokio::test(start_paused = true)]
async fn selecting_a_new_practice_tears_down_the_old_session() {
    let provider = ScriptedProvider::ok("hifi");
    let mut h = harness(
        vec![provider.clone() as Arc<dyn SpeechProvider>],
        MockPlayer::manual(),
        MemoryStore::new(),
        true,
    );

    let first = h.controller.select_practice(quick_calm()).await;
    h.controller.start().await.unwrap();
    h.controller.advance().await.unwrap();
    h.controller.start().await.unwrap();
    settle().await;
    assert!(h.controller.timer_running().await);
    assert!(h.controller.breath_running().await);
    assert_eq!(h.player.current().as_deref(), Some("Breathe in"));
    drain(&mut h.events);

    let second = h.controller.select_practice(witness()).await;
    assert_ne!(first.session_id, second.session_id);
    assert_eq!(second.step_index, 0);
    assert_eq!(second.sub_state, SubState::Intro);
    assert!(!h.controller.timer_running().await);
    assert!(!h.controller.breath_running().await);
    assert!(h.player.stopped().contains(&"Breathe in".to_string()));

    let events = drain(&mut h.events);
    let ended = events
        .iter()
        .position(|event| matches!(event, SessionEvent::Ended { session_id } if *session_id == first.session_id));
    let fresh = events
        .iter()
        .position(|event| matches!(event, SessionEvent::StateChanged(s) if s.session_id == second.session_id));
    assert!(ended.unwrap() < fresh.unwrap());

    // Nothing from the old timers reaches the new session.
    tokio::time::sleep(Duration::from_secs(5)).await;
    let snapshot = h.controller.snapshot().await.unwrap();
    assert_eq!(snapshot.session_id, second.session_id);
    assert_eq!(snapshot.sub_state, SubState::Intro);
    assert_eq!(snapshot.remaining_secs, 0);
}

#[tokio::test(start_paused = true)]
async fn breath_phases_reach_the_session() {
    let h = harness(Vec::new(), MockPlayer::instant(), MemoryStore::new(), false);
    h.controller.select_practice(quick_calm()).await;
    h.controller.start().await.unwrap();

    tokio::time::sleep(Duration::from_millis(12_500)).await;
    let breath = h.controller.snapshot().await.unwrap().breath.unwrap();
    assert_eq!(breath.phase, BreathPhase::Inhale);
    assert_eq!(breath.cycle_count, 1);

    h.controller.pause().await.unwrap();
    assert!(!h.controller.breath_running().await);
    tokio::time::sleep(Duration::from_secs(10)).await;
    let held = h.controller.snapshot().await.unwrap().breath.unwrap();
    assert_eq!(held, breath);
}

#[tokio::test(start_paused = true)]
async fn every_tier_failing_still_completes() {
    let hifi = ScriptedProvider::failing("hifi");
    let pcm = ScriptedProvider::failing("pcm");
    let local = ScriptedProvider::failing("local");
    let h = harness(
        vec![
            hifi.clone() as Arc<dyn SpeechProvider>,
            pcm.clone(),
            local.clone(),
        ],
        MockPlayer::instant(),
        MemoryStore::new(),
        true,
    );

    h.controller.select_practice(self_paced(false)).await;
    for _ in 0..2 {
        h.controller.start().await.unwrap();
        settle().await;
        h.controller.advance().await.unwrap();
        settle().await;
    }

    assert_eq!(
        h.controller.snapshot().await.unwrap().sub_state,
        SubState::Complete
    );
    assert_eq!(h.store.events().len(), 1);
    assert!(h.player.played().is_empty());
    assert!(!h.controller.narrator().is_speaking());
    // One attempt per tier per narration, no retries.
    assert_eq!(hifi.calls(), pcm.calls());
    assert_eq!(pcm.calls(), local.calls());
}

#[tokio::test(start_paused = true)]
async fn failed_persistence_still_reports_complete() {
    let h = harness(Vec::new(), MockPlayer::instant(), MemoryStore::failing(), false);
    h.controller.select_practice(self_paced(false)).await;
    for _ in 0..2 {
        h.controller.start().await.unwrap();
        h.controller.advance().await.unwrap();
    }
    assert_eq!(
        h.controller.snapshot().await.unwrap().sub_state,
        SubState::Complete
    );
}

#[tokio::test(start_paused = true)]
async fn exit_discards_the_session() {
    let h = harness(Vec::new(), MockPlayer::instant(), MemoryStore::new(), false);
    h.controller.select_practice(witness()).await;
    h.controller.start().await.unwrap();

    assert!(h.controller.exit().await);
    assert!(h.controller.snapshot().await.is_none());
    assert!(!h.controller.timer_running().await);
    assert_eq!(h.controller.start().await.unwrap_err(), Rejection::NoSession);
    assert!(!h.controller.exit().await);
}

#[tokio::test(start_paused = true)]
async fn malformed_practice_is_replaced_by_default() {
    use stillpoint_lib::catalog::DEFAULT_PRACTICE_ID;
    use stillpoint_lib::{Practice, PracticeKind};

    let h = harness(Vec::new(), MockPlayer::instant(), MemoryStore::new(), false);
    let broken = Arc::new(Practice::new("empty", "Empty", PracticeKind::Presence, 5, Vec::new()));

    let snapshot = h.controller.select_practice(broken).await;
    assert_eq!(snapshot.practice_id, DEFAULT_PRACTICE_ID);
    assert!(snapshot.step_count >= 1);
}
