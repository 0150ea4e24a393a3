// src/utils/bounds.rs
//! Clamping helpers used by the device setters

/// Clamp `value` into `[min, max]` and snap it onto the grid of `step`
/// anchored at `min`. Values halfway between two grid points round up.
pub fn clamp_to_step(value: u32, min: u32, max: u32, step: u32) -> u32 {
    let clamped = value.clamp(min, max);
    if step <= 1 {
        return clamped;
    }
    let offset = clamped - min;
    let snapped = min + (offset + step / 2) / step * step;
    snapped.min(max)
}

/// Move `current` by one `step` up or down, staying inside `[min, max]`.
pub fn step_within(current: u32, min: u32, max: u32, step: u32, up: bool) -> u32 {
    let next = if up {
        current.saturating_add(step)
    } else {
        current.saturating_sub(step)
    };
    next.clamp(min, max)
}

/// Member of `levels` closest to `value`; ties go to the lower level.
///
/// Returns `value` unchanged when `levels` is empty.
pub fn snap_to_level(value: u32, levels: &[u32]) -> u32 {
    levels
        .iter()
        .copied()
        .min_by_key(|level| (level.abs_diff(value), *level))
        .unwrap_or(value)
}

/// Neighbouring member of a sorted `levels` set, saturating at either end.
pub fn adjacent_level(current: u32, levels: &[u32], up: bool) -> u32 {
    let snapped = snap_to_level(current, levels);
    let Some(index) = levels.iter().position(|level| *level == snapped) else {
        return current;
    };
    let next = if up {
        (index + 1).min(levels.len() - 1)
    } else {
        index.saturating_sub(1)
    };
    levels[next]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::constants::device::ENERGY_LEVELS_J;

    #[test]
    fn test_clamp_to_step() {
        assert_eq!(clamp_to_step(0, 5, 200, 5), 5);
        assert_eq!(clamp_to_step(500, 5, 200, 5), 200);
        assert_eq!(clamp_to_step(92, 5, 200, 5), 90);
        assert_eq!(clamp_to_step(93, 5, 200, 5), 95);
        assert_eq!(clamp_to_step(73, 30, 200, 1), 73);
    }

    #[test]
    fn test_step_within() {
        assert_eq!(step_within(195, 5, 200, 5, true), 200);
        assert_eq!(step_within(200, 5, 200, 5, true), 200);
        assert_eq!(step_within(5, 5, 200, 5, false), 5);
        assert_eq!(step_within(70, 30, 200, 5, false), 65);
    }

    #[test]
    fn test_snap_to_level() {
        assert_eq!(snap_to_level(150, &ENERGY_LEVELS_J), 150);
        assert_eq!(snap_to_level(160, &ENERGY_LEVELS_J), 150);
        assert_eq!(snap_to_level(165, &ENERGY_LEVELS_J), 170);
        assert_eq!(snap_to_level(0, &ENERGY_LEVELS_J), 1);
        assert_eq!(snap_to_level(1000, &ENERGY_LEVELS_J), 200);
        assert_eq!(snap_to_level(42, &[]), 42);
    }

    #[test]
    fn test_adjacent_level() {
        assert_eq!(adjacent_level(150, &ENERGY_LEVELS_J, true), 170);
        assert_eq!(adjacent_level(150, &ENERGY_LEVELS_J, false), 120);
        assert_eq!(adjacent_level(200, &ENERGY_LEVELS_J, true), 200);
        assert_eq!(adjacent_level(1, &ENERGY_LEVELS_J, false), 1);
    }
}
