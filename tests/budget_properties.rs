//! Property tests for unit-cap projection
//!
//! Inputs are generated from integers so every case is finite.

use budgetfit::budget::{project_unit_cap, CapInputs};
use quickcheck_macros::quickcheck;

fn inputs(requested: u16, remaining_ms: i32, t1_ms: u16, tpu_us: u32) -> CapInputs {
    CapInputs {
        requested: requested as usize,
        remaining_secs: Some(remaining_ms as f64 / 1000.0),
        t1: t1_ms as f64 / 1000.0,
        time_per_unit: Some(tpu_us as f64 / 1_000_000.0),
        available_mem: None,
        mem_per_unit: None,
        free_mem_ratio: 0.2,
    }
}

#[quickcheck]
fn prop_cap_within_bounds(requested: u16, remaining_ms: i32, t1_ms: u16, tpu_us: u32, mem: u32, mpu: u16) -> bool {
    let cap = project_unit_cap(&CapInputs {
        available_mem: Some(mem as u64),
        mem_per_unit: Some(mpu as f64),
        ..inputs(requested, remaining_ms, t1_ms, tpu_us)
    });
    cap >= 1 && cap <= (requested as usize).max(1)
}

#[quickcheck]
fn prop_more_time_never_lowers_cap(requested: u16, remaining_ms: i32, extra_ms: u16, t1_ms: u16, tpu_us: u32) -> bool {
    let base = inputs(requested, remaining_ms, t1_ms, tpu_us);
    let longer = CapInputs {
        remaining_secs: base.remaining_secs.map(|r| r + extra_ms as f64 / 1000.0),
        ..base
    };
    project_unit_cap(&longer) >= project_unit_cap(&base)
}

#[quickcheck]
fn prop_unknown_memory_cost_is_ignored(requested: u16, remaining_ms: i32, t1_ms: u16, tpu_us: u32, mem: u32, negative: u16) -> bool {
    let without = inputs(requested, remaining_ms, t1_ms, tpu_us);
    let expected = project_unit_cap(&without);

    let unmeasured = CapInputs {
        available_mem: Some(mem as u64),
        mem_per_unit: None,
        ..without
    };
    let unusable = CapInputs {
        available_mem: Some(mem as u64),
        mem_per_unit: Some(-(negative as f64)),
        ..without
    };
    let no_probe = CapInputs {
        available_mem: None,
        mem_per_unit: Some(128.0),
        ..without
    };

    project_unit_cap(&unmeasured) == expected
        && project_unit_cap(&unusable) == expected
        && project_unit_cap(&no_probe) == expected
}

#[quickcheck]
fn prop_unbounded_time_keeps_requested(requested: u16, t1_ms: u16, tpu_us: u32) -> bool {
    let unbounded = CapInputs {
        remaining_secs: None,
        ..inputs(requested, 0, t1_ms, tpu_us)
    };
    project_unit_cap(&unbounded) == (requested as usize).max(1)
}

#[test]
fn test_documented_scenario() {
    // remaining - t1 = 1.0s at 1/30s per unit
    let cap = project_unit_cap(&CapInputs {
        requested: 100,
        remaining_secs: Some(1.05),
        t1: 0.05,
        time_per_unit: Some((0.15 - 0.05) / 3.0),
        available_mem: None,
        mem_per_unit: None,
        free_mem_ratio: 0.2,
    });
    assert_eq!(cap, 31);
}

#[test]
fn test_requested_below_cap() {
    let cap = project_unit_cap(&CapInputs {
        requested: 50,
        remaining_secs: Some(100.0),
        t1: 0.05,
        time_per_unit: Some(0.01),
        available_mem: None,
        mem_per_unit: None,
        free_mem_ratio: 0.2,
    });
    assert_eq!(cap, 50);
}
