//! Conversions between absolute and relative (frame-to-frame displacement)
//! coordinates over dense `[frames, slots, 2]` buffers with a `[frames,
//! slots]` presence mask. Both directions are pure, and exactly invertible
//! on entries whose mask chain holds from the origin frame.

/// Per non-initial frame, the displacement from the previous frame's
/// position of the same slot. The frame-0 row, and any entry where either
/// the current or the previous frame's mask bit is false, is the 0.0
/// sentinel.
pub fn to_relative(positions: &[f32], mask: &[bool], frames: usize, slots: usize) -> Vec<f32> {
    debug_assert_eq!(positions.len(), frames * slots * 2);
    debug_assert_eq!(mask.len(), frames * slots);

    let mut relative = vec![0.0f32; positions.len()];
    for t in 1..frames {
        for slot in 0..slots {
            if mask[t * slots + slot] && mask[(t - 1) * slots + slot] {
                let cur = (t * slots + slot) * 2;
                let prev = ((t - 1) * slots + slot) * 2;
                relative[cur] = positions[cur] - positions[prev];
                relative[cur + 1] = positions[cur + 1] - positions[prev + 1];
            }
        }
    }
    relative
}

/// Reconstructs absolute positions by cumulative summation of displacements
/// starting from `origin` (`[slots, 2]`, the last known observed position
/// per slot). `relative[0]` is the sentinel row and is ignored. Wherever
/// the mask chain from the origin breaks, the output stays sentinel for the
/// rest of that slot.
pub fn to_absolute(
    origin: &[f32],
    relative: &[f32],
    mask: &[bool],
    frames: usize,
    slots: usize,
) -> Vec<f32> {
    debug_assert_eq!(origin.len(), slots * 2);
    debug_assert_eq!(relative.len(), frames * slots * 2);
    debug_assert_eq!(mask.len(), frames * slots);

    let mut positions = vec![0.0f32; relative.len()];
    for slot in 0..slots {
        let mut x = origin[slot * 2];
        let mut y = origin[slot * 2 + 1];
        let mut chain_ok = mask[slot];

        if chain_ok {
            positions[slot * 2] = x;
            positions[slot * 2 + 1] = y;
        }

        for t in 1..frames {
            chain_ok = chain_ok && mask[t * slots + slot];
            if !chain_ok {
                continue;
            }
            let base = (t * slots + slot) * 2;
            x += relative[base];
            y += relative[base + 1];
            positions[base] = x;
            positions[base + 1] = y;
        }
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAMES: usize = 4;
    const SLOTS: usize = 2;

    fn straight_walk() -> (Vec<f32>, Vec<bool>) {
        // Slot 0 walks along x, slot 1 along y.
        let mut positions = vec![0.0f32; FRAMES * SLOTS * 2];
        for t in 0..FRAMES {
            positions[(t * SLOTS) * 2] = t as f32;
            positions[(t * SLOTS) * 2 + 1] = 1.0;
            positions[(t * SLOTS + 1) * 2] = -2.0;
            positions[(t * SLOTS + 1) * 2 + 1] = 0.5 * t as f32;
        }
        (positions, vec![true; FRAMES * SLOTS])
    }

    #[test]
    fn frame_zero_row_is_sentinel() {
        let (positions, mask) = straight_walk();
        let relative = to_relative(&positions, &mask, FRAMES, SLOTS);
        assert_eq!(&relative[..SLOTS * 2], &[0.0; SLOTS * 2]);
    }

    #[test]
    fn round_trips_exactly_on_fully_masked_windows() {
        let (positions, mask) = straight_walk();
        let relative = to_relative(&positions, &mask, FRAMES, SLOTS);
        let rebuilt = to_absolute(&positions[..SLOTS * 2], &relative, &mask, FRAMES, SLOTS);
        assert_eq!(rebuilt, positions);
    }

    #[test]
    fn displacement_is_sentinel_across_mask_gaps() {
        let (positions, mut mask) = straight_walk();
        mask[2 * SLOTS] = false; // slot 0 missing at frame 2

        let relative = to_relative(&positions, &mask, FRAMES, SLOTS);
        // Frames 2 and 3 of slot 0 both involve the gap.
        assert_eq!(relative[(2 * SLOTS) * 2], 0.0);
        assert_eq!(relative[(3 * SLOTS) * 2], 0.0);
        // Slot 1 is untouched.
        assert_eq!(relative[(2 * SLOTS + 1) * 2 + 1], 0.5);
    }

    #[test]
    fn broken_chain_stays_sentinel_to_window_end() {
        let (positions, mut mask) = straight_walk();
        mask[2 * SLOTS] = false;

        let relative = to_relative(&positions, &mask, FRAMES, SLOTS);
        let rebuilt = to_absolute(&positions[..SLOTS * 2], &relative, &mask, FRAMES, SLOTS);

        // Valid up to the gap.
        assert_eq!(rebuilt[(1 * SLOTS) * 2], positions[(1 * SLOTS) * 2]);
        // Sentinel from the gap onwards, even though frame 3 is masked true.
        assert_eq!(rebuilt[(2 * SLOTS) * 2], 0.0);
        assert_eq!(rebuilt[(3 * SLOTS) * 2], 0.0);
        // Slot 1 round-trips in full.
        assert_eq!(
            rebuilt[(3 * SLOTS + 1) * 2 + 1],
            positions[(3 * SLOTS + 1) * 2 + 1]
        );
    }

    #[test]
    fn reconstructs_predictions_from_last_observed_position() {
        // Prediction use: origin is the last observed position, the
        // relative buffer is model output with an all-true mask.
        let origin = [10.0f32, -3.0];
        let relative = [0.0f32, 0.0, 1.0, 1.0, 1.0, 1.0];
        let mask = [true; 3];
        let rebuilt = to_absolute(&origin, &relative, &mask, 3, 1);
        assert_eq!(rebuilt, vec![10.0, -3.0, 11.0, -2.0, 12.0, -1.0]);
    }
}
