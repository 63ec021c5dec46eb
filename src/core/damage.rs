//! Building-level damage attribution
//!
//! Damage pixels of a cleaned mask are grouped into regions, building
//! footprints overlapping any region are flagged as damaged, and damaged
//! buildings are tallied per IDP camp.

use crate::core::cleaning::{label_components, Connectivity};
use crate::core::geometry::{MultiPolygon, Polygon};
use crate::types::{BinaryMask, BoundingBox, DamageError, DamageResult, Fid, GeoTransform};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Connected damaged area (raster value 1) as a set of pixel footprints
#[derive(Debug, Clone, PartialEq)]
pub struct DamageRegion {
    pub id: u32,
    pub pixels: Vec<BoundingBox>,
    pub bbox: BoundingBox,
}

impl DamageRegion {
    pub fn area(&self) -> f64 {
        self.pixels.iter().map(|p| p.width() * p.height()).sum()
    }

    /// True when the footprint shares interior area with a damaged pixel;
    /// touching a pixel edge or corner does not count
    pub fn overlaps(&self, footprint: &MultiPolygon) -> bool {
        let footprint_bbox = footprint.bbox();
        if self.bbox.intersection(&footprint_bbox).is_none() {
            return false;
        }
        self.pixels
            .iter()
            .filter(|pixel| pixel.intersection(&footprint_bbox).is_some())
            .any(|pixel| footprint.overlaps_polygon(&Polygon::from_bbox(pixel)))
    }
}

/// A building footprint polygon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    pub fid: Fid,
    pub geometry: MultiPolygon,
}

/// A footprint flagged by the damage mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamagedBuilding {
    pub fid: Fid,
    pub geometry: MultiPolygon,
    pub damage: u8,
}

/// A camp boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camp {
    pub name: String,
    pub geometry: MultiPolygon,
}

/// Damaged-building count for one camp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampDamage {
    pub camp: String,
    pub damaged_buildings: usize,
}

/// Convert the damage pixels (value 1) of a mask into regions; value-0 and
/// NoData areas are dropped
pub fn polygonize_damage(mask: &BinaryMask, transform: &GeoTransform) -> DamageResult<Vec<DamageRegion>> {
    if !transform.is_north_up() {
        return Err(DamageError::Processing(
            "Polygonizing requires a north-up raster".to_string(),
        ));
    }

    let (labels, count) = label_components(mask, Connectivity::Four);
    let mut pixels: Vec<Vec<BoundingBox>> = vec![Vec::new(); count];
    for ((row, col), &label) in labels.indexed_iter() {
        if label > 0 {
            pixels[label as usize - 1].push(transform.pixel_bounds(row, col));
        }
    }

    let regions: Vec<DamageRegion> = pixels
        .into_iter()
        .enumerate()
        .map(|(i, pixels)| {
            let bbox = pixels.iter().skip(1).fold(pixels[0], |acc, p| BoundingBox {
                min_x: acc.min_x.min(p.min_x),
                min_y: acc.min_y.min(p.min_y),
                max_x: acc.max_x.max(p.max_x),
                max_y: acc.max_y.max(p.max_y),
            });
            DamageRegion {
                id: i as u32 + 1,
                pixels,
                bbox,
            }
        })
        .collect();

    log::info!("Extracted {} damage regions", regions.len());
    Ok(regions)
}

/// Footprints overlapping any damage region, tagged with `damage = 1`
pub fn damaged_buildings(regions: &[DamageRegion], footprints: &[Footprint]) -> Vec<DamagedBuilding> {
    let damaged: Vec<DamagedBuilding> = footprints
        .iter()
        .filter(|f| regions.iter().any(|r| r.overlaps(&f.geometry)))
        .map(|f| DamagedBuilding {
            fid: f.fid,
            geometry: f.geometry.clone(),
            damage: 1,
        })
        .collect();

    log::info!(
        "{} of {} building footprints intersect damage",
        damaged.len(),
        footprints.len()
    );
    damaged
}

/// Count damaged buildings per camp, in order of first appearance. A building
/// counts toward every camp whose interior it overlaps.
pub fn camp_damage_counts(damaged: &[DamagedBuilding], camps: &[Camp]) -> Vec<CampDamage> {
    let mut counts: Vec<CampDamage> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for building in damaged.iter().filter(|b| b.damage == 1) {
        for camp in camps {
            if !building.geometry.overlaps(&camp.geometry) {
                continue;
            }
            match index.get(camp.name.as_str()) {
                Some(&i) => counts[i].damaged_buildings += 1,
                None => {
                    index.insert(camp.name.as_str(), counts.len());
                    counts.push(CampDamage {
                        camp: camp.name.clone(),
                        damaged_buildings: 1,
                    });
                }
            }
        }
    }

    for entry in &counts {
        log::info!("{}: {} damaged buildings", entry.camp, entry.damaged_buildings);
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MASK_NODATA;
    use ndarray::array;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> MultiPolygon {
        Polygon::from_bbox(&BoundingBox::new(x0, y0, x1, y1)).into()
    }

    fn sample_regions() -> Vec<DamageRegion> {
        // 4x4 mask with 10 m pixels, top-left (0, 40)
        let mask = array![
            [1u8, 1, 0, 0],
            [0, 0, 0, 0],
            [0, 0, 0, MASK_NODATA],
            [0, 0, 0, 1],
        ];
        polygonize_damage(&mask, &GeoTransform::north_up(0.0, 40.0, 10.0)).unwrap()
    }

    #[test]
    fn test_polygonize_damage() {
        let regions = sample_regions();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].bbox, BoundingBox::new(0.0, 30.0, 20.0, 40.0));
        assert_eq!(regions[0].area(), 200.0);
        assert_eq!(regions[1].bbox, BoundingBox::new(30.0, 0.0, 40.0, 10.0));
    }

    #[test]
    fn test_damaged_buildings() {
        let regions = sample_regions();
        let footprints = vec![
            Footprint { fid: 1, geometry: rect(2.0, 32.0, 8.0, 38.0) },   // inside a pixel
            Footprint { fid: 2, geometry: rect(12.0, 12.0, 18.0, 18.0) }, // undamaged area
            Footprint { fid: 3, geometry: rect(25.0, 2.0, 38.0, 8.0) },   // covers a pixel centre
        ];

        let damaged = damaged_buildings(&regions, &footprints);
        let fids: Vec<Fid> = damaged.iter().map(|b| b.fid).collect();
        assert_eq!(fids, vec![1, 3]);
        assert!(damaged.iter().all(|b| b.damage == 1));
    }

    #[test]
    fn test_thin_footprint_crossing_pixels() {
        // Two damaged 10 m pixels side by side at x 0..20, y 30..40
        let mask = array![[1u8, 1], [0, 0]];
        let regions = polygonize_damage(&mask, &GeoTransform::north_up(0.0, 40.0, 10.0)).unwrap();

        // Crosses both pixel interiors without covering a pixel centre and
        // without any vertex inside a pixel
        let footprints = vec![
            Footprint { fid: 7, geometry: rect(-5.0, 31.0, 25.0, 33.0) },
            Footprint { fid: 8, geometry: rect(-5.0, 40.0, 25.0, 42.0) }, // shares the top edge only
            Footprint { fid: 9, geometry: rect(20.0, 30.0, 24.0, 40.0) }, // shares the right edge only
        ];
        let damaged = damaged_buildings(&regions, &footprints);
        let fids: Vec<Fid> = damaged.iter().map(|b| b.fid).collect();
        assert_eq!(fids, vec![7]);
    }

    #[test]
    fn test_multipart_footprint_reported_once() {
        let regions = sample_regions();
        let footprint = Footprint {
            fid: 4,
            geometry: MultiPolygon::new(vec![
                Polygon::from_bbox(&BoundingBox::new(2.0, 32.0, 8.0, 38.0)),
                Polygon::from_bbox(&BoundingBox::new(32.0, 2.0, 38.0, 8.0)),
            ]),
        };
        assert_eq!(damaged_buildings(&regions, &[footprint]).len(), 1);
    }

    #[test]
    fn test_edge_contact_does_not_count_toward_camp() {
        let damaged = vec![
            DamagedBuilding { fid: 1, geometry: rect(50.0, 0.0, 52.0, 2.0), damage: 1 },
            DamagedBuilding { fid: 2, geometry: rect(10.0, 10.0, 12.0, 12.0), damage: 1 },
        ];
        let camps = vec![
            Camp { name: "Ardamata".to_string(), geometry: rect(0.0, 0.0, 50.0, 50.0) },
            Camp { name: "Abuzar".to_string(), geometry: rect(60.0, 0.0, 100.0, 50.0) },
        ];

        let counts = camp_damage_counts(&damaged, &camps);
        assert_eq!(
            counts,
            vec![CampDamage { camp: "Ardamata".to_string(), damaged_buildings: 1 }]
        );
    }

    #[test]
    fn test_camp_damage_counts() {
        let damaged = vec![
            DamagedBuilding { fid: 1, geometry: rect(1.0, 1.0, 2.0, 2.0), damage: 1 },
            DamagedBuilding { fid: 2, geometry: rect(51.0, 1.0, 52.0, 2.0), damage: 1 },
            DamagedBuilding { fid: 3, geometry: rect(3.0, 3.0, 4.0, 4.0), damage: 1 },
            DamagedBuilding { fid: 4, geometry: rect(200.0, 200.0, 201.0, 201.0), damage: 1 },
        ];
        let camps = vec![
            Camp { name: "Abuzar".to_string(), geometry: rect(50.0, 0.0, 100.0, 50.0) },
            Camp { name: "Ardamata".to_string(), geometry: rect(0.0, 0.0, 50.0, 50.0) },
        ];

        let counts = camp_damage_counts(&damaged, &camps);
        assert_eq!(
            counts,
            vec![
                CampDamage { camp: "Ardamata".to_string(), damaged_buildings: 2 },
                CampDamage { camp: "Abuzar".to_string(), damaged_buildings: 1 },
            ]
        );
    }
}
