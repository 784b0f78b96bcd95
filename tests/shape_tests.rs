//! Properties of the staged load curve.

use std::time::{Duration, Instant};

use proptest::prelude::*;
use rstest::rstest;

use tpo_loadgen::domain::Stage;
use tpo_loadgen::runner::{ShapeTick, StageShape};

fn desired_at(stage: Stage, avg_rt: f64, progress: f64) -> u32 {
    let start = Instant::now();
    let mut shape = StageShape::new(vec![stage], 40.0, start);
    let now = start + Duration::from_secs_f64(progress * stage.duration_secs());
    match shape.tick(avg_rt, now) {
        ShapeTick::Run { desired_users, .. } => desired_users,
        ShapeTick::Finished => panic!("stage finished unexpectedly"),
    }
}

#[rstest]
// Low curve exponents front-load the ramp, high ones back-load it.
#[case(1.0, 3.0)]
#[case(0.5, 2.0)]
fn lower_curve_spawns_earlier(#[case] front: f64, #[case] back: f64) {
    let at_quarter_front = desired_at(Stage::new(100.0, 1.0, front), 0.5, 0.25);
    let at_quarter_back = desired_at(Stage::new(100.0, 1.0, back), 0.5, 0.25);
    assert!(
        at_quarter_front > at_quarter_back,
        "curve {front} should be ahead of curve {back} early in the stage \
         ({at_quarter_front} vs {at_quarter_back})"
    );
}

#[rstest]
#[case(Stage::new(40.0, 5.0, 2.0))]
#[case(Stage::new(40.0, 2.0, 0.0))]
#[case(Stage::new(13.0, 0.5, 4.0))]
fn stage_end_reaches_little_law_user_count(#[case] stage: Stage) {
    let avg_rt = 0.5;
    let desired = desired_at(stage, avg_rt, 0.999);
    let expected = (avg_rt * stage.target_rps).ceil() as u32;
    // Within rounding of ceil(avg_rt * target_rps) right before the stage ends.
    assert!(
        desired.abs_diff(expected) <= 1,
        "expected ~{expected} users, got {desired}"
    );
}

#[test]
fn multi_stage_sequence_advances_and_finishes() {
    let start = Instant::now();
    let stages = vec![
        Stage::new(40.0, 1.0, 2.0),
        Stage::new(40.0, 1.0, 0.0),
        Stage::new(0.0, 1.0, 4.0),
    ];
    let mut shape = StageShape::new(stages, 40.0, start);

    let mut finished_at = None;
    for second in 0..300u64 {
        let now = start + Duration::from_secs(second);
        match shape.tick(0.5, now) {
            ShapeTick::Run { desired_users, .. } => {
                assert!(desired_users <= 21, "never above avg_rt * peak + rounding");
            }
            ShapeTick::Finished => {
                finished_at = Some(second);
                break;
            }
        }
    }
    // Three one-minute stages; each advance happens on the tick after the
    // minute boundary.
    let finished_at = finished_at.expect("shape never finished");
    assert!((180..=185).contains(&finished_at), "finished at {finished_at}s");
    assert_eq!(shape.stage_index(), 3);
}

proptest! {
    #[test]
    fn user_count_is_monotone_within_a_rampup_stage(
        curve in 0.0f64..4.0,
        avg_rt in 0.05f64..2.0,
        target in 1.0f64..100.0,
        p1 in 0.0f64..0.999,
        p2 in 0.0f64..0.999,
    ) {
        let (lo, hi) = if p1 <= p2 { (p1, p2) } else { (p2, p1) };
        let stage = Stage::new(target, 1.0, curve);
        let early = desired_at(stage, avg_rt, lo);
        let late = desired_at(stage, avg_rt, hi);
        prop_assert!(early <= late, "ramp went backwards: {early} -> {late}");
    }

    #[test]
    fn user_count_stays_within_stage_bounds(
        curve in 0.0f64..4.0,
        avg_rt in 0.05f64..2.0,
        target in 0.0f64..100.0,
        progress in 0.0f64..0.999,
    ) {
        let stage = Stage::new(target, 1.0, curve);
        let desired = desired_at(stage, avg_rt, progress);
        let ceiling = (avg_rt * target).ceil() as u32;
        prop_assert!(desired <= ceiling, "{desired} users exceeds ceiling {ceiling}");
    }
}
