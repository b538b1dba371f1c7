use std::ops::Range;

use glam::UVec3;

use crate::config::linear_index;

/// Per-cluster slice of the two index arrays.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ClusterRecord {
    pub point_start: u32,
    pub point_count: u32,
    pub spot_start: u32,
    pub spot_count: u32,
}

impl ClusterRecord {
    /// Decodes a texel of the `rgba32float` grid texture.
    pub fn from_texel(texel: [f32; 4]) -> Self {
        let [point_start, point_count, spot_start, spot_count] = texel.map(|v| v as u32);
        Self {
            point_start,
            point_count,
            spot_start,
            spot_count,
        }
    }

    pub fn to_texel(self) -> [f32; 4] {
        [
            self.point_start as f32,
            self.point_count as f32,
            self.spot_start as f32,
            self.spot_count as f32,
        ]
    }

    pub fn point_range(&self) -> Range<usize> {
        let start = self.point_start as usize;
        start..start + self.point_count as usize
    }

    pub fn spot_range(&self) -> Range<usize> {
        let start = self.spot_start as usize;
        start..start + self.spot_count as usize
    }
}

/// Host copy of one dispatch's output, from either kernel.
#[derive(Clone, Debug, PartialEq)]
pub struct ClusterGrid {
    pub grid: UVec3,
    /// One record per cluster, x fastest.
    pub records: Vec<ClusterRecord>,
    pub point_indices: Vec<u32>,
    pub spot_indices: Vec<u32>,
    /// Final cursor values. A value above the array length means references
    /// were dropped.
    pub cursor: [u32; 2],
}

impl ClusterGrid {
    pub fn cluster_count(&self) -> usize {
        self.records.len()
    }

    pub fn record(&self, coord: UVec3) -> ClusterRecord {
        self.records[linear_index(self.grid, coord)]
    }

    /// Point light indices of `coord`. Empty for clusters whose reservation
    /// fell past the end of the array.
    pub fn point_lights(&self, coord: UVec3) -> &[u32] {
        self.point_indices
            .get(self.record(coord).point_range())
            .unwrap_or(&[])
    }

    pub fn spot_lights(&self, coord: UVec3) -> &[u32] {
        self.spot_indices
            .get(self.record(coord).spot_range())
            .unwrap_or(&[])
    }

    pub fn total_point_refs(&self) -> u64 {
        self.records.iter().map(|r| r.point_count as u64).sum()
    }

    pub fn total_spot_refs(&self) -> u64 {
        self.records.iter().map(|r| r.spot_count as u64).sum()
    }

    pub fn coords(&self) -> impl Iterator<Item = UVec3> + '_ {
        let grid = self.grid;
        (0..grid.z).flat_map(move |z| {
            (0..grid.y).flat_map(move |y| (0..grid.x).map(move |x| UVec3::new(x, y, z)))
        })
    }

    /// True when no two clusters' point ranges, and no two spot ranges,
    /// share an index slot.
    pub fn ranges_disjoint(&self) -> bool {
        fn disjoint(mut ranges: Vec<Range<usize>>) -> bool {
            ranges.retain(|r| !r.is_empty());
            ranges.sort_by_key(|r| r.start);
            ranges.windows(2).all(|w| w[0].end <= w[1].start)
        }
        disjoint(self.records.iter().map(ClusterRecord::point_range).collect())
            && disjoint(self.records.iter().map(ClusterRecord::spot_range).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texel_encoding_is_exact_for_index_sized_values() {
        let record = ClusterRecord {
            point_start: 65535,
            point_count: 64,
            spot_start: 12,
            spot_count: 0,
        };
        assert_eq!(ClusterRecord::from_texel(record.to_texel()), record);
    }

    #[test]
    fn overlapping_ranges_are_detected() {
        let mut grid = ClusterGrid {
            grid: UVec3::new(2, 1, 1),
            records: vec![
                ClusterRecord {
                    point_start: 0,
                    point_count: 3,
                    ..Default::default()
                },
                ClusterRecord {
                    point_start: 3,
                    point_count: 2,
                    ..Default::default()
                },
            ],
            point_indices: vec![0, 1, 2, 0, 4],
            spot_indices: vec![],
            cursor: [5, 0],
        };
        assert!(grid.ranges_disjoint());
        assert_eq!(grid.point_lights(UVec3::new(1, 0, 0)), &[0, 4]);
        assert_eq!(grid.total_point_refs(), 5);

        grid.records[1].point_start = 2;
        assert!(!grid.ranges_disjoint());
    }

    #[test]
    fn coords_follow_record_order() {
        let grid = ClusterGrid {
            grid: UVec3::new(2, 3, 2),
            records: vec![ClusterRecord::default(); 12],
            point_indices: vec![],
            spot_indices: vec![],
            cursor: [0, 0],
        };
        let coords: Vec<_> = grid.coords().collect();
        assert_eq!(coords.len(), 12);
        assert_eq!(coords[1], UVec3::new(1, 0, 0));
        assert_eq!(coords[2], UVec3::new(0, 1, 0));
        assert_eq!(coords[6], UVec3::new(0, 0, 1));
    }
}
