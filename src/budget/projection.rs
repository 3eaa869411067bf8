//! Unit cost derivation and unit-cap projection
//!
//! Pure functions over measured calibration numbers, kept apart from the
//! trainer so the arithmetic can be checked exactly.

/// Seconds per unit from the two calibration passes.
///
/// The 1-unit pass (`t1`) carries fixed setup cost, so the slope between the
/// passes is used when it is positive. Otherwise `t1` itself, and `floor`
/// when even that measured nothing.
pub fn time_per_unit(t1: f64, t2: f64, calibration_units: usize, floor: f64) -> f64 {
    if t2 > t1 && calibration_units > 1 {
        (t2 - t1) / (calibration_units - 1) as f64
    } else if t1 > 0.0 {
        t1
    } else {
        floor
    }
}

/// Bytes per unit from the two calibration passes.
///
/// `mem1` is the memory taken by the 1-unit pass, `mem2` by the larger pass
/// (already clamped to at least `mem1`). The smaller of the two estimates is
/// kept; it can be zero or negative when memory was released meanwhile.
pub fn mem_per_unit(mem1: f64, mem2: f64, calibration_units: usize) -> f64 {
    mem1.min(mem2 / calibration_units.max(1) as f64)
}

/// Inputs to [`project_unit_cap`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapInputs {
    /// Units the caller asked for
    pub requested: usize,

    /// Seconds left in the budget, `None` when unbounded
    pub remaining_secs: Option<f64>,

    /// Duration of the cached 1-unit pass, reserved from the remaining time
    pub t1: f64,

    /// Measured seconds per unit
    pub time_per_unit: Option<f64>,

    /// Available memory in bytes at the start of the call
    pub available_mem: Option<u64>,

    /// Measured bytes per unit
    pub mem_per_unit: Option<f64>,

    /// Fraction of available memory to keep free
    pub free_mem_ratio: f64,
}

/// Largest unit count that fits the remaining time and memory.
///
/// Each limiting term only applies when its inputs are known and its per-unit
/// cost is positive. The result never exceeds `requested` and is at least 1.
pub fn project_unit_cap(inputs: &CapInputs) -> usize {
    let mut cap = inputs.requested;

    if let (Some(remaining), Some(tpu)) = (inputs.remaining_secs, inputs.time_per_unit) {
        if tpu > 0.0 {
            let by_time = ((remaining - inputs.t1) / tpu).floor() + 1.0;
            cap = cap.min(to_units(by_time));
        }
    }

    if let (Some(available), Some(mpu)) = (inputs.available_mem, inputs.mem_per_unit) {
        if mpu > 0.0 {
            let usable = (1.0 - inputs.free_mem_ratio) * available as f64;
            cap = cap.min(to_units((usable / mpu).floor()));
        }
    }

    cap.max(1)
}

/// Saturating float to unit count; negative and NaN become 0
fn to_units(value: f64) -> usize {
    if value.is_nan() || value <= 0.0 {
        0
    } else {
        value as usize
    }
}
