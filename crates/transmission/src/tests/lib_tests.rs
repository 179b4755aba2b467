use super::*;
use shared::domain::Severity;

fn state(gear: i64, clutch_position: f64) -> ControlState {
    ControlState {
        gear: Gear::new(gear).expect("gear in range"),
        clutch_position,
        throttle_position: 0.0,
    }
}

fn run(start: ControlState, command: Command, times: usize) -> ControlState {
    (0..times).fold(start, |current, _| apply(current, command).0)
}

#[test]
fn throttle_is_clamped_to_percent_range() {
    let base = ControlState::default();
    for (input, expected) in [
        (-25.0, 0.0),
        (-0.001, 0.0),
        (0.0, 0.0),
        (42.5, 42.5),
        (100.0, 100.0),
        (100.5, 100.0),
        (1.0e9, 100.0),
        (f64::NEG_INFINITY, 0.0),
        (f64::INFINITY, 100.0),
    ] {
        let (next, notice) = apply(base, Command::SetThrottle(input));
        assert_eq!(next.throttle_position, expected, "input {input}");
        assert!(notice.is_none());
    }
}

#[test]
fn nan_throttle_closes_throttle() {
    let base = ControlState {
        throttle_position: 60.0,
        ..ControlState::default()
    };
    let (next, _) = apply(base, Command::SetThrottle(f64::NAN));
    assert_eq!(next.throttle_position, 0.0);
}

#[test]
fn clutch_position_is_clamped_and_drives_pressed_flag() {
    let (next, notice) = apply(ControlState::default(), Command::SetClutchPosition(1.7));
    assert_eq!(next.clutch_position, 1.0);
    assert!(next.clutch_pressed());
    assert!(notice.is_none());

    let (next, _) = apply(next, Command::SetClutchPosition(-3.0));
    assert_eq!(next.clutch_position, 0.0);
    assert!(!next.clutch_pressed());

    let (next, _) = apply(next, Command::SetClutchPosition(0.8));
    assert!(!next.clutch_pressed());
    assert!(next.can_shift());
}

#[test]
fn toggle_clutch_engages_and_disengages_with_notices() {
    let (released, notice) = apply(state(0, 1.0), Command::ToggleClutch);
    assert_eq!(released.clutch_position, 0.0);
    assert!(!released.clutch_pressed());
    assert_eq!(notice, Some(Notice::info("Clutch ENGAGED")));

    let (pulled, notice) = apply(released, Command::ToggleClutch);
    assert_eq!(pulled.clutch_position, 1.0);
    assert!(pulled.clutch_pressed());
    assert_eq!(notice, Some(Notice::warning("Clutch DISENGAGED")));
}

#[test]
fn toggle_clutch_twice_restores_lever() {
    for start in [state(2, 1.0), state(2, 0.0)] {
        let twice = run(start, Command::ToggleClutch, 2);
        assert_eq!(twice.clutch_position, start.clutch_position);
        assert_eq!(twice.clutch_pressed(), start.clutch_pressed());
    }
}

#[test]
fn shifting_without_clutch_is_rejected() {
    for clutch in [0.0, 0.5, 0.79] {
        for command in [Command::ShiftUp, Command::ShiftDown, Command::ShiftToNeutral] {
            let start = state(3, clutch);
            let (next, notice) = apply(start, command);
            assert_eq!(next, start);
            let notice = notice.expect("rejection notice");
            assert_eq!(notice.text, "Press clutch to shift gears");
            assert_eq!(notice.severity, Severity::Error);
        }
    }
}

#[test]
fn shift_up_from_neutral_reports_first_gear() {
    let (next, notice) = apply(state(0, 1.0), Command::ShiftUp);
    assert_eq!(next.gear.number(), 1);
    assert_eq!(
        notice,
        Some(Notice {
            text: "Shifted to 1 gear".to_string(),
            severity: Severity::Info,
        })
    );
}

#[test]
fn shift_up_stops_at_top_gear() {
    let top = run(state(0, 1.0), Command::ShiftUp, 10);
    assert_eq!(top.gear, Gear::TOP);

    let (next, notice) = apply(top, Command::ShiftUp);
    assert_eq!(next.gear, Gear::TOP);
    assert_eq!(notice, Some(Notice::warning("Already in top gear")));
}

#[test]
fn shift_down_stops_at_neutral() {
    let bottom = run(state(6, 1.0), Command::ShiftDown, 10);
    assert_eq!(bottom.gear, Gear::NEUTRAL);

    let (next, notice) = apply(state(0, 1.0), Command::ShiftDown);
    assert_eq!(next.gear, Gear::NEUTRAL);
    assert_eq!(notice, Some(Notice::warning("Already in neutral")));
}

#[test]
fn shift_down_into_neutral_names_neutral() {
    let (next, notice) = apply(state(1, 1.0), Command::ShiftDown);
    assert!(next.gear.is_neutral());
    assert_eq!(notice, Some(Notice::info("Shifted to Neutral")));

    let (_, notice) = apply(state(4, 0.8), Command::ShiftDown);
    assert_eq!(notice, Some(Notice::info("Shifted to 3 gear")));
}

#[test]
fn shift_to_neutral_always_reports() {
    let (next, notice) = apply(state(5, 1.0), Command::ShiftToNeutral);
    assert!(next.gear.is_neutral());
    assert_eq!(notice, Some(Notice::info("Shifted to Neutral")));

    let (again, notice) = apply(next, Command::ShiftToNeutral);
    assert_eq!(again, next);
    assert_eq!(notice, Some(Notice::info("Shifted to Neutral")));
}

#[test]
fn set_gear_bypasses_interlock_and_clamps() {
    let (next, notice) = apply(state(0, 0.0), Command::SetGear(4));
    assert_eq!(next.gear.number(), 4);
    assert!(notice.is_none());

    assert_eq!(apply(state(0, 0.0), Command::SetGear(11)).0.gear, Gear::TOP);
    assert_eq!(apply(state(3, 0.0), Command::SetGear(-2)).0.gear, Gear::NEUTRAL);
}

#[test]
fn control_input_mirrors_state() {
    let current = ControlState {
        gear: Gear::new(2).expect("gear"),
        clutch_position: 0.25,
        throttle_position: 30.0,
    };
    let input = current.to_input();
    assert_eq!(input.gear.number(), 2);
    assert_eq!(input.clutch_position, 0.25);
    assert_eq!(input.throttle_position, 30.0);
}

#[test]
fn parses_named_commands() {
    assert_eq!("shift_up".parse::<Command>(), Ok(Command::ShiftUp));
    assert_eq!(" Toggle_Clutch ".parse::<Command>(), Ok(Command::ToggleClutch));
    assert_eq!("neutral".parse::<Command>(), Ok(Command::ShiftToNeutral));
    assert_eq!(
        "wheelie".parse::<Command>(),
        Err(UnknownCommand("wheelie".to_string()))
    );
}
