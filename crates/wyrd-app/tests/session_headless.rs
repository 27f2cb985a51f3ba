use std::io::Write;

use wyrd_app::{
    AppConfig, CursorSample, IdleCursor, ScriptedCursor, Session, SessionConfig, SessionKind,
    SweepCursor, UpdateMode, load_config,
};
use wyrd_core::{DraftConfig, ThreadingAuthority, WyrdConfig};

fn small_config() -> AppConfig {
    AppConfig {
        engine: WyrdConfig {
            draft: DraftConfig {
                num_shafts: 5,
                num_warps: 20,
                num_weft: 8,
                ..DraftConfig::default()
            },
            ..WyrdConfig::default()
        },
        session: SessionConfig::default(),
    }
    .with_seed(314)
}

#[test]
fn idle_room_ticks_at_idle_rate() {
    let mut session = Session::new(small_config()).expect("session");
    let mut source = IdleCursor;
    let mut frames = Vec::new();
    for _ in 0..90 {
        if let Some(tick) = session.tick(&mut source).expect("tick") {
            assert!(!tick.motion);
            assert_eq!(tick.shed.len(), 20);
            frames.push(tick.frame);
        }
    }
    assert_eq!(frames, vec![0, 28, 56, 84]);
    assert_eq!(session.draft_ticks(), 4);
    assert_eq!(session.draft().authority(), ThreadingAuthority::Compact);
    assert!(session.field().iter().all(|&v| v == 0.0));
}

#[test]
fn motion_pushes_cursor_into_treadling() {
    let mut session = Session::new(small_config()).expect("session");
    let mut source = ScriptedCursor::new(vec![CursorSample::moving(3)]);
    let tick = session.tick(&mut source).expect("tick").expect("frame 0 is due");
    assert!(tick.motion);
    assert_eq!(*session.draft().treadling().front(), 3);
    assert!(!session.draft().update_warp());
    assert!(!session.draft().update_weft());

    let emitted = (1..12)
        .filter_map(|_| session.tick(&mut source).expect("tick"))
        .count();
    // Active rate 4: frames 4 and 8.
    assert_eq!(emitted, 2);
}

#[test]
fn out_of_range_cursor_is_skipped() {
    let mut session = Session::new(small_config()).expect("session");
    let before = session.draft().treadling().to_vec();
    let mut source = ScriptedCursor::new(vec![CursorSample::moving(9)]);
    session.tick(&mut source).expect("tick");
    // The rejected push leaves the window as it was.
    assert_eq!(session.draft().treadling().to_vec(), before);
    assert!(session.field().iter().all(|&v| v == 0.0));
}

#[test]
fn movement_field_fires_and_resets() {
    let mut config = small_config();
    config.session.field_max = 1.0;
    config.session.field_increment = 0.25;
    let mut session = Session::new(config).expect("session");
    let mut source = ScriptedCursor::new(vec![CursorSample::moving(2)]);

    let mut levels = Vec::new();
    for _ in 0..6 {
        session.tick(&mut source).expect("tick");
        levels.push(session.field()[2]);
    }
    assert_eq!(levels, vec![0.25, 0.5, 0.75, 1.0, 1.25, 0.0]);
    assert!(session.draft().tie_up()[2].iter().all(|&v| v <= 1));
    assert_eq!(session.field()[0], 0.0);
}

#[test]
fn mode_reset_cycles_update_mode() {
    let mut session = Session::new(small_config()).expect("session");
    assert_eq!(session.mode(), UpdateMode::Push);
    let mut source = ScriptedCursor::new(vec![CursorSample {
        cursor: 0,
        motion: false,
        mode_reset: true,
    }]);
    session.tick(&mut source).expect("tick");
    assert_eq!(session.mode(), UpdateMode::Repeat);
    // Frames 1..27 are not due, so the mode holds.
    for _ in 1..28 {
        session.tick(&mut source).expect("tick");
    }
    assert_eq!(session.mode(), UpdateMode::Repeat);
    session.tick(&mut source).expect("tick");
    assert_eq!(session.mode(), UpdateMode::Mirror);
}

#[test]
fn every_mode_keeps_draft_invariants() {
    for mode in [
        UpdateMode::Push,
        UpdateMode::Repeat,
        UpdateMode::Mirror,
        UpdateMode::Recursive,
    ] {
        let mut config = small_config();
        config.session.initial_mode = mode;
        config.session.idle_rate = 1;
        let mut session = Session::new(config).expect("session");
        let mut source = IdleCursor;
        for _ in 0..50 {
            session.tick(&mut source).expect("tick");
            let draft = session.draft();
            assert_eq!(draft.treadling().len(), 8);
            assert_eq!(draft.drawdown().len(), 8);
            assert_eq!(draft.threading().len(), 5);
            assert!(draft.threading().iter().all(|row| row.len() == 20));
        }
        assert_eq!(session.draft_ticks(), 50);
    }
}

#[test]
fn print_session_follows_automaton() {
    let mut config = small_config();
    config.session.kind = SessionKind::Print;
    config.session.idle_rate = 1;
    config.session.print_chance = 0.0;
    let mut session = Session::new(config).expect("session");
    let mut source = IdleCursor;
    for _ in 0..40 {
        let tick = session.tick(&mut source).expect("tick").expect("every frame");
        assert_eq!(*session.draft().treadling().front(), tick.state_total);
    }
}

#[test]
fn morph_restarts_on_interval() {
    let mut config = small_config();
    config.session.idle_rate = 1;
    config.session.morph_interval = 5;
    // 100 columns drain the initial wipe only after 101 steps.
    config.engine.automaton.cols = 3;
    let mut session = Session::new(config).expect("session");
    let mut source = IdleCursor;
    for _ in 0..4 {
        session.tick(&mut source).expect("tick");
    }
    assert!(!session.grid().is_morphing());
    session.tick(&mut source).expect("tick");
    assert!(session.grid().is_morphing());
    assert_eq!(session.grid().morph_t(), 0);
}

#[test]
fn seeded_sessions_are_reproducible() {
    let run = || {
        let mut session = Session::new(small_config()).expect("session");
        let mut source = SweepCursor::new(5, 40, 60).with_frames_per_step(3);
        let sheds: Vec<String> = (0..600)
            .filter_map(|_| session.tick(&mut source).expect("tick"))
            .map(|tick| tick.shed)
            .collect();
        (sheds, session.draft().snapshot())
    };
    assert_eq!(run(), run());
}

#[test]
fn config_file_round_trip() {
    let config = small_config();
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    let json = serde_json::to_string_pretty(&config).expect("json");
    file.write_all(json.as_bytes()).expect("write");
    let loaded = load_config(file.path()).expect("load");
    assert_eq!(loaded, config);
}

#[test]
fn partial_config_file_uses_defaults() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    write!(
        file,
        r#"{{ "draft": {{ "num_shafts": 3 }}, "session": {{ "kind": "print" }} }}"#
    )
    .expect("write");
    let loaded = load_config(file.path()).expect("load");
    assert_eq!(loaded.engine.draft.num_shafts, 3);
    assert_eq!(loaded.engine.draft.num_warps, 50);
    assert_eq!(loaded.session.kind, SessionKind::Print);
    assert_eq!(loaded.session.idle_rate, 28);
}

#[test]
fn invalid_config_file_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    write!(file, r#"{{ "session": {{ "idle_rate": 0 }} }}"#).expect("write");
    let err = load_config(file.path()).expect_err("zero rate");
    assert!(format!("{err:#}").contains("update rates must be at least 1"));
}
