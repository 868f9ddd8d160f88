//! Merging of all groups into contiguous device-ready buffers.
//!
//! Every group's per-point data lands in four flat global arrays at the
//! group's offset, with offsets assigned as the running sum of preceding
//! counts. The whole set is rebuilt whenever any group's count changes,
//! because every later group's offset shifts; content-only edits reuse the
//! same path since the rewrite is a straight memcpy per group.

use crate::group::GroupState;
use crate::split;

/// CPU-side snapshot of the packed global buffers, ready for upload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackedBuffers {
    /// Primary f32 coordinates, 2 per point.
    pub position_hi: Vec<f32>,
    /// Sub-f32 residuals, 2 per point.
    pub position_lo: Vec<f32>,
    /// RGBA8 bytes, 4 per point.
    pub color: Vec<u8>,
    /// Error magnitudes `(negX, posX, negY, posY)`, 4 per point.
    pub error: Vec<f32>,
    /// Total point count across all groups.
    pub total: usize,
}

/// Assign offsets and rebuild the packed buffers from every group's data.
///
/// Offsets are contiguous and non-overlapping in group order. Missing
/// error values are zero-filled so the error buffer always holds exactly
/// four entries per point.
pub fn pack(groups: &mut [GroupState]) -> PackedBuffers {
    let total: usize = groups.iter().map(|g| g.count).sum();

    let mut packed = PackedBuffers {
        position_hi: vec![0.0; total * 2],
        position_lo: vec![0.0; total * 2],
        color: vec![0; total * 4],
        error: vec![0.0; total * 4],
        total,
    };

    let mut offset = 0;
    for group in groups.iter_mut() {
        group.offset = offset;
        offset += group.count;

        if group.count == 0 {
            continue;
        }

        let p = group.offset * 2;
        for (i, &value) in group.positions.iter().take(group.count * 2).enumerate() {
            let (hi, lo) = split::split(value);
            packed.position_hi[p + i] = hi;
            packed.position_lo[p + i] = lo;
        }

        let c = group.offset * 4;
        packed.color[c..c + group.color.len().min(group.count * 4)]
            .copy_from_slice(&group.color[..group.color.len().min(group.count * 4)]);

        let e = group.offset * 4;
        let n = group.errors.len().min(group.count * 4);
        packed.error[e..e + n].copy_from_slice(&group.errors[..n]);
    }

    tracing::trace!("Packed {} points across {} groups", total, groups.len());

    packed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::group::GroupSpec;

    fn group(id: usize, spec: GroupSpec) -> GroupState {
        let mut g = GroupState::new(id);
        g.apply(spec.or(GroupSpec::defaults())).expect("update failed");
        g
    }

    fn positions(n: usize) -> Vec<f64> {
        (0..n).flat_map(|i| [i as f64, i as f64]).collect()
    }

    #[test]
    fn test_single_group_defaults() {
        // Three points, no errors, default color.
        let mut groups = vec![group(0, GroupSpec::new().positions(vec![0.0, 0.0, 1.0, 1.0, 2.0, 2.0]))];
        let packed = pack(&mut groups);

        assert_eq!(packed.total, 3);
        assert_eq!(packed.position_hi, vec![0.0, 0.0, 1.0, 1.0, 2.0, 2.0]);
        assert_eq!(packed.position_lo, vec![0.0; 6]);
        assert_eq!(packed.color, [0, 0, 0, 255].repeat(3));
        assert_eq!(packed.error, vec![0.0; 12]);
    }

    #[test]
    fn test_offsets_are_running_sums() {
        let mut groups = vec![
            group(0, GroupSpec::new().positions(positions(2))),
            group(1, GroupSpec::new().positions(positions(3))),
            group(2, GroupSpec::new().positions(positions(4))),
        ];
        let packed = pack(&mut groups);

        assert_eq!([groups[0].offset, groups[1].offset, groups[2].offset], [0, 2, 5]);
        assert_eq!(packed.position_hi.len(), 18);
    }

    #[test]
    fn test_second_group_lands_at_its_offset() {
        let mut groups = vec![
            group(0, GroupSpec::new().positions(positions(2))),
            group(1, GroupSpec::new().positions(vec![7.0, 8.0, 9.0, 10.0, 11.0, 12.0])),
        ];
        let packed = pack(&mut groups);

        assert_eq!(packed.position_hi.len(), 10);
        // Group 1 begins at point offset 2, i.e. flat index 4.
        assert_eq!(&packed.position_hi[4..], &[7.0, 8.0, 9.0, 10.0, 11.0, 12.0]);
    }

    #[test]
    fn test_resize_shifts_later_offsets() {
        let mut groups = vec![
            group(0, GroupSpec::new().positions(positions(2)).color(Color::RED)),
            group(1, GroupSpec::new().positions(positions(3)).color(Color::GREEN)),
            group(2, GroupSpec::new().positions(positions(1)).color(Color::BLUE)),
        ];
        pack(&mut groups);
        assert_eq!(groups[2].offset, 5);

        groups[1]
            .apply(GroupSpec::new().positions(positions(5)))
            .unwrap();
        let packed = pack(&mut groups);

        assert_eq!([groups[0].offset, groups[1].offset, groups[2].offset], [0, 2, 7]);
        // Group 0 and 2 keep their data identity.
        assert_eq!(&packed.color[..8], &[255, 0, 0, 255].repeat(2)[..]);
        assert_eq!(&packed.color[7 * 4..], &[0, 0, 255, 255]);
    }

    #[test]
    fn test_pack_is_idempotent() {
        let mut groups = vec![
            group(0, GroupSpec::new().positions(positions(3)).errors(vec![0.1; 12])),
            group(1, GroupSpec::new().positions(positions(2))),
        ];
        let first = pack(&mut groups);
        let second = pack(&mut groups);
        assert_eq!(first, second);
    }

    #[test]
    fn test_residuals_survive_packing() {
        let big = 1e9 + 0.125;
        let mut groups = vec![group(0, GroupSpec::new().positions(vec![big, 0.0]))];
        let packed = pack(&mut groups);

        let rebuilt = packed.position_hi[0] as f64 + packed.position_lo[0] as f64;
        assert_eq!(rebuilt, big);
    }

    #[test]
    fn test_short_error_array_zero_filled() {
        let mut groups = vec![group(
            0,
            GroupSpec::new().positions(positions(2)).errors(vec![1.0, 2.0]),
        )];
        let packed = pack(&mut groups);
        assert_eq!(packed.error, vec![1.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_empty_group_is_noop_entry() {
        let mut groups = vec![
            group(0, GroupSpec::new().positions(Vec::new())),
            group(1, GroupSpec::new().positions(positions(2))),
        ];
        let packed = pack(&mut groups);
        assert_eq!(groups[1].offset, 0);
        assert_eq!(packed.total, 2);
    }
}
