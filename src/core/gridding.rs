use crate::core::geometry::Polygon;
use crate::types::{BoundingBox, DamageError, DamageResult, Fid};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Random validation grid parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridParams {
    /// Cell edge length in map units
    pub cell_size: f64,
    /// Number of cells to keep after shuffling
    pub sample_size: usize,
    /// Seed for reproducible sampling; entropy-seeded when absent
    pub seed: Option<u64>,
}

impl Default for GridParams {
    fn default() -> Self {
        Self {
            cell_size: 20.0,    // 20 m x 20 m cells
            sample_size: 2800,
            seed: None,
        }
    }
}

/// One fishnet cell with its sampling key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    pub fid: Fid,
    pub random: f64,
    pub geometry: Polygon,
}

/// Generates a randomly sampled fishnet over an area of interest
pub struct GridSampler {
    params: GridParams,
}

impl GridSampler {
    pub fn new(params: GridParams) -> DamageResult<Self> {
        if !params.cell_size.is_finite() || params.cell_size <= 0.0 {
            return Err(DamageError::Config(format!(
                "Grid cell size must be positive, got {}",
                params.cell_size
            )));
        }
        Ok(Self { params })
    }

    /// Square cells anchored at the lower-left corner of the AOI envelope,
    /// restricted to those intersecting the AOI polygon
    pub fn fishnet(&self, aoi: &Polygon) -> Vec<Polygon> {
        let bbox = aoi.bbox();
        let size = self.params.cell_size;
        let cols = (bbox.width() / size).ceil() as usize;
        let rows = (bbox.height() / size).ceil() as usize;

        log::debug!("Fishnet {} rows x {} cols of {} m cells", rows, cols, size);

        let mut cells = Vec::new();
        for r in 0..rows {
            for c in 0..cols {
                let x = bbox.min_x + c as f64 * size;
                let y = bbox.min_y + r as f64 * size;
                let cell = Polygon::from_bbox(&BoundingBox::new(x, y, x + size, y + size));
                if cell.intersects(aoi) {
                    cells.push(cell);
                }
            }
        }
        cells
    }

    /// Assign uniform random keys, sort descending and keep the top `sample_size`
    pub fn sample(&self, aoi: &Polygon) -> Vec<GridCell> {
        let mut rng = match self.params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.sample_with_rng(aoi, &mut rng)
    }

    pub fn sample_with_rng<R: Rng>(&self, aoi: &Polygon, rng: &mut R) -> Vec<GridCell> {
        let fishnet = self.fishnet(aoi);
        log::info!("Created fishnet with {} cells inside the AOI", fishnet.len());

        let mut cells: Vec<GridCell> = fishnet
            .into_iter()
            .map(|geometry| GridCell {
                fid: 0,
                random: rng.gen::<f64>(),
                geometry,
            })
            .collect();

        cells.sort_by(|a, b| b.random.total_cmp(&a.random));

        if self.params.sample_size > cells.len() {
            log::warn!(
                "Requested {} cells but the fishnet only has {}; keeping all",
                self.params.sample_size,
                cells.len()
            );
        }
        cells.truncate(self.params.sample_size);

        for (fid, cell) in cells.iter_mut().enumerate() {
            cell.fid = fid as Fid;
        }

        log::info!("Selected {} validation cells", cells.len());
        cells
    }
}
