//! Removal of isolated damage pixels from binary masks
//!
//! Damage pixels are grouped into connected components (8-connectivity by
//! default, matching a full 3x3 structuring element) using a two-pass
//! union-find labeling. Components smaller than the configured size are reset
//! to 0.

use crate::types::{BinaryMask, DamageError, DamageResult};
use ndarray::Array2;

/// Pixel neighbourhood used when grouping damage pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Four,
    Eight,
}

/// Speckle cleaning parameters
#[derive(Debug, Clone)]
pub struct CleaningParams {
    /// Components with fewer pixels than this are removed
    pub min_component_size: usize,
    pub connectivity: Connectivity,
}

impl Default for CleaningParams {
    fn default() -> Self {
        Self {
            min_component_size: 2, // Single isolated pixels only
            connectivity: Connectivity::Eight,
        }
    }
}

/// Summary of a cleaning pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleaningStats {
    pub components: usize,
    pub removed_components: usize,
    pub removed_pixels: usize,
}

struct UnionFind {
    parent: Vec<u32>,
}

impl UnionFind {
    fn new() -> Self {
        // Label 0 is background
        Self { parent: vec![0] }
    }

    fn make_label(&mut self) -> u32 {
        let label = self.parent.len() as u32;
        self.parent.push(label);
        label
    }

    fn find(&mut self, mut label: u32) -> u32 {
        while self.parent[label as usize] != label {
            let grandparent = self.parent[self.parent[label as usize] as usize];
            self.parent[label as usize] = grandparent;
            label = grandparent;
        }
        label
    }

    fn union(&mut self, a: u32, b: u32) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi as usize] = lo;
        }
    }
}

/// Label connected components of pixels equal to 1.
///
/// Returns the label image (0 = background, labels numbered 1..=n in raster
/// scan order of first appearance) and the number of components.
pub fn label_components(mask: &BinaryMask, connectivity: Connectivity) -> (Array2<u32>, usize) {
    let (height, width) = mask.dim();
    let mut labels = Array2::<u32>::zeros((height, width));
    let mut uf = UnionFind::new();

    // First pass: provisional labels and equivalences
    for i in 0..height {
        for j in 0..width {
            if mask[[i, j]] != 1 {
                continue;
            }

            let mut neighbours = [0u32; 4];
            let mut count = 0;
            if j > 0 {
                neighbours[count] = labels[[i, j - 1]];
                count += 1;
            }
            if i > 0 {
                neighbours[count] = labels[[i - 1, j]];
                count += 1;
                if connectivity == Connectivity::Eight {
                    if j > 0 {
                        neighbours[count] = labels[[i - 1, j - 1]];
                        count += 1;
                    }
                    if j + 1 < width {
                        neighbours[count] = labels[[i - 1, j + 1]];
                        count += 1;
                    }
                }
            }

            let mut current = 0u32;
            for &n in neighbours[..count].iter().filter(|&&n| n > 0) {
                if current == 0 {
                    current = n;
                } else {
                    uf.union(current, n);
                }
            }
            if current == 0 {
                current = uf.make_label();
            }
            labels[[i, j]] = current;
        }
    }

    // Second pass: resolve to compact labels
    let mut compact = vec![0u32; uf.parent.len()];
    let mut next = 0u32;
    for label in labels.iter_mut() {
        if *label == 0 {
            continue;
        }
        let root = uf.find(*label);
        if compact[root as usize] == 0 {
            next += 1;
            compact[root as usize] = next;
        }
        *label = compact[root as usize];
    }

    (labels, next as usize)
}

/// Pixel count of each component; index 0 holds the background count
pub fn component_sizes(labels: &Array2<u32>, num_components: usize) -> Vec<usize> {
    let mut sizes = vec![0usize; num_components + 1];
    for &label in labels.iter() {
        sizes[label as usize] += 1;
    }
    sizes
}

/// Speckle cleaner for binary damage masks
pub struct MaskCleaner {
    params: CleaningParams,
}

impl MaskCleaner {
    pub fn new() -> Self {
        Self {
            params: CleaningParams::default(),
        }
    }

    pub fn with_params(params: CleaningParams) -> DamageResult<Self> {
        if params.min_component_size == 0 {
            return Err(DamageError::Config(
                "min_component_size must be at least 1".to_string(),
            ));
        }
        Ok(Self { params })
    }

    /// Reset damage components below the minimum size to 0; NoData is left untouched
    pub fn clean(&self, mask: &BinaryMask) -> (BinaryMask, CleaningStats) {
        log::info!(
            "Removing damage components smaller than {} pixels ({:?}-connected)",
            self.params.min_component_size,
            self.params.connectivity
        );

        let (labels, num_components) = label_components(mask, self.params.connectivity);
        let sizes = component_sizes(&labels, num_components);

        let mut stats = CleaningStats {
            components: num_components,
            ..Default::default()
        };
        let remove: Vec<bool> = sizes
            .iter()
            .enumerate()
            .map(|(label, &size)| label > 0 && size < self.params.min_component_size)
            .collect();
        stats.removed_components = remove.iter().filter(|&&r| r).count();

        let mut cleaned = mask.clone();
        for (value, &label) in cleaned.iter_mut().zip(labels.iter()) {
            if remove[label as usize] {
                *value = 0;
                stats.removed_pixels += 1;
            }
        }

        log::info!(
            "Removed {} of {} components ({} pixels)",
            stats.removed_components,
            stats.components,
            stats.removed_pixels
        );
        (cleaned, stats)
    }
}

impl Default for MaskCleaner {
    fn default() -> Self {
        Self::new()
    }
}

/// Remove damage pixels with no damaged 8-neighbour
pub fn remove_isolated_pixels(mask: &BinaryMask) -> BinaryMask {
    MaskCleaner::new().clean(mask).0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MASK_NODATA;
    use ndarray::array;

    #[test]
    fn test_label_components_eight_connected() {
        let mask = array![
            [1u8, 0, 0, 1],
            [0, 1, 0, 1],
            [0, 0, 0, 0],
            [1, 1, 0, 0],
        ];
        let (labels, n) = label_components(&mask, Connectivity::Eight);
        assert_eq!(n, 3);
        assert_eq!(labels[[0, 0]], labels[[1, 1]]);
        assert_eq!(labels[[0, 3]], labels[[1, 3]]);
        assert_eq!(labels[[3, 0]], labels[[3, 1]]);
        assert_ne!(labels[[0, 0]], labels[[0, 3]]);
    }

    #[test]
    fn test_label_components_four_connected() {
        let mask = array![[1u8, 0], [0, 1]];
        let (_, n) = label_components(&mask, Connectivity::Four);
        assert_eq!(n, 2);
        let (_, n) = label_components(&mask, Connectivity::Eight);
        assert_eq!(n, 1);
    }

    #[test]
    fn test_u_shape_merges_into_one_label() {
        let mask = array![
            [1u8, 0, 1],
            [1, 0, 1],
            [1, 1, 1],
        ];
        let (labels, n) = label_components(&mask, Connectivity::Four);
        assert_eq!(n, 1);
        assert!(labels.iter().all(|&l| l <= 1));
    }

    #[test]
    fn test_remove_isolated_pixels() {
        let mask = array![
            [1u8, 0, 0, 0],
            [0, 0, 0, 1],
            [0, 0, 1, 0],
            [0, 0, 0, 0],
        ];
        let cleaned = remove_isolated_pixels(&mask);
        // Top-left pixel is isolated, the diagonal pair survives
        assert_eq!(cleaned[[0, 0]], 0);
        assert_eq!(cleaned[[1, 3]], 1);
        assert_eq!(cleaned[[2, 2]], 1);
    }

    #[test]
    fn test_clean_keeps_nodata_and_reports_stats() {
        let mask = array![
            [1u8, MASK_NODATA, 1],
            [0, 0, 0],
            [1, 1, 1],
        ];
        let cleaner = MaskCleaner::with_params(CleaningParams {
            min_component_size: 3,
            connectivity: Connectivity::Eight,
        })
        .unwrap();
        let (cleaned, stats) = cleaner.clean(&mask);

        assert_eq!(cleaned[[0, 1]], MASK_NODATA);
        assert_eq!(cleaned[[0, 0]], 0);
        assert_eq!(cleaned[[0, 2]], 0);
        assert_eq!(cleaned.row(2).to_vec(), vec![1, 1, 1]);
        assert_eq!(
            stats,
            CleaningStats {
                components: 3,
                removed_components: 2,
                removed_pixels: 2,
            }
        );
    }

    #[test]
    fn test_zero_min_size_rejected() {
        let params = CleaningParams {
            min_component_size: 0,
            ..Default::default()
        };
        assert!(MaskCleaner::with_params(params).is_err());
    }
}
