use crate::core::damage::{Camp, DamagedBuilding, Footprint};
use crate::core::geometry::{MultiPolygon, Point, Polygon};
use crate::core::gridding::GridCell;
use crate::core::zonal::ValidationUnit;
use crate::types::{DamageError, DamageResult, Fid};
use gdal::spatial_ref::SpatialRef;
use gdal::vector::{Feature, FieldValue, Geometry, LayerAccess, LayerOptions};
use gdal::{Dataset, DriverManager};
use gdal_sys::{OGRFieldType, OGRwkbGeometryType};
use std::path::Path;

/// OGR reader and writer for polygon layers (shapefiles, GeoPackages, ...)
pub struct VectorIo;

fn ring_points(ring: &Geometry) -> Vec<Point> {
    ring.get_point_vec().into_iter().map(|(x, y, _)| (x, y)).collect()
}

fn polygon_from_ogr(polygon: &Geometry) -> Option<Polygon> {
    let rings = polygon.geometry_count();
    if rings == 0 {
        return None;
    }
    let exterior = ring_points(&polygon.get_geometry(0));
    let holes = (1..rings).map(|i| ring_points(&polygon.get_geometry(i))).collect();
    Some(Polygon::with_holes(exterior, holes))
}

/// Polygon parts of a (multi)polygon geometry
fn polygons_from_ogr(geometry: &Geometry) -> Vec<Polygon> {
    match geometry.geometry_name().to_uppercase().as_str() {
        "POLYGON" => polygon_from_ogr(geometry).into_iter().collect(),
        "MULTIPOLYGON" => (0..geometry.geometry_count())
            .filter_map(|i| polygon_from_ogr(&geometry.get_geometry(i)))
            .collect(),
        other => {
            log::warn!("Skipping non-polygon geometry {}", other);
            Vec::new()
        }
    }
}

fn feature_fid(feature: &Feature) -> DamageResult<Fid> {
    feature
        .fid()
        .map(|fid| fid as Fid)
        .ok_or_else(|| DamageError::InvalidFormat("Feature without FID".to_string()))
}

impl VectorIo {
    /// Visit every polygon feature of the first layer, all parts together
    fn read_layer<P, T, F>(path: P, mut visit: F) -> DamageResult<Vec<T>>
    where
        P: AsRef<Path>,
        F: FnMut(&Feature, MultiPolygon) -> DamageResult<T>,
    {
        log::info!("Reading vector layer: {}", path.as_ref().display());

        let dataset = Dataset::open(path.as_ref())?;
        let mut layer = dataset.layer(0)?;
        let mut items = Vec::new();
        for feature in layer.features() {
            let Some(geometry) = feature.geometry() else {
                log::warn!("Skipping feature {:?} without geometry", feature.fid());
                continue;
            };
            let parts = polygons_from_ogr(geometry);
            if parts.is_empty() {
                continue;
            }
            items.push(visit(&feature, MultiPolygon::new(parts))?);
        }

        log::debug!("Read {} features", items.len());
        Ok(items)
    }

    /// WKT of the first layer's spatial reference, empty when undefined
    pub fn projection<P: AsRef<Path>>(path: P) -> DamageResult<String> {
        let dataset = Dataset::open(path.as_ref())?;
        let layer = dataset.layer(0)?;
        match layer.spatial_ref() {
            Some(srs) => Ok(srs.to_wkt()?),
            None => Ok(String::new()),
        }
    }

    /// First polygon of the first layer, e.g. the area of interest
    pub fn read_aoi<P: AsRef<Path>>(path: P) -> DamageResult<Polygon> {
        let features = Self::read_layer(path, |_, geometry| Ok(geometry))?;
        let mut parts = features.into_iter().flat_map(|geometry| geometry.parts);
        let aoi = parts
            .next()
            .ok_or_else(|| DamageError::InvalidFormat("AOI layer contains no polygon".to_string()))?;
        let ignored = parts.count();
        if ignored > 0 {
            log::warn!("AOI layer has {} further polygons; using the first", ignored);
        }
        Ok(aoi)
    }

    /// Validation cells with their ground-truth label field
    pub fn read_validation_units<P: AsRef<Path>>(path: P, truth_field: &str) -> DamageResult<Vec<ValidationUnit>> {
        Self::read_layer(path, |feature, geometry| {
            let fid = feature_fid(feature)?;
            let damage = feature.field_as_integer64_by_name(truth_field)?.ok_or_else(|| {
                DamageError::InvalidFormat(format!("Unit {} has no '{}' value", fid, truth_field))
            })?;
            Ok(ValidationUnit { fid, damage, geometry })
        })
    }

    pub fn read_footprints<P: AsRef<Path>>(path: P) -> DamageResult<Vec<Footprint>> {
        Self::read_layer(path, |feature, geometry| {
            Ok(Footprint {
                fid: feature_fid(feature)?,
                geometry,
            })
        })
    }

    pub fn read_camps<P: AsRef<Path>>(path: P, name_field: &str) -> DamageResult<Vec<Camp>> {
        Self::read_layer(path, |feature, geometry| {
            let name = feature.field_as_string_by_name(name_field)?.unwrap_or_default();
            Ok(Camp { name, geometry })
        })
    }

    fn create_polygon_layer<'a, P: AsRef<Path>>(
        dataset: &'a mut Dataset,
        path: P,
        projection: &str,
    ) -> DamageResult<gdal::vector::Layer<'a>> {
        let srs = if projection.is_empty() {
            None
        } else {
            Some(SpatialRef::from_wkt(projection)?)
        };
        let name = path
            .as_ref()
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("layer")
            .to_string();
        let layer = dataset.create_layer(LayerOptions {
            name: &name,
            srs: srs.as_ref(),
            ty: OGRwkbGeometryType::wkbPolygon,
            options: None,
        })?;
        Ok(layer)
    }

    fn create_dataset<P: AsRef<Path>>(path: P) -> DamageResult<Dataset> {
        let driver = DriverManager::get_driver_by_name("ESRI Shapefile")?;
        Ok(driver.create_vector_only(path.as_ref())?)
    }

    /// Save the selected validation grid with its `RAND` sampling key
    pub fn write_grid<P: AsRef<Path>>(path: P, cells: &[GridCell], projection: &str) -> DamageResult<()> {
        log::info!("Saving {} grid cells to {}", cells.len(), path.as_ref().display());

        let mut dataset = Self::create_dataset(path.as_ref())?;
        let mut layer = Self::create_polygon_layer(&mut dataset, path.as_ref(), projection)?;
        layer.create_defn_fields(&[
            ("CELL_ID", OGRFieldType::OFTInteger64),
            ("RAND", OGRFieldType::OFTReal),
            ("Damage", OGRFieldType::OFTInteger),
        ])?;

        for cell in cells {
            let geometry = Geometry::from_wkt(&cell.geometry.to_wkt())?;
            layer.create_feature_fields(
                geometry,
                &["CELL_ID", "RAND", "Damage"],
                &[
                    FieldValue::Integer64Value(cell.fid),
                    FieldValue::RealValue(cell.random),
                    FieldValue::IntegerValue(0),
                ],
            )?;
        }
        Ok(())
    }

    /// Save damaged building footprints with a `damage` field
    pub fn write_damaged_buildings<P: AsRef<Path>>(
        path: P,
        buildings: &[DamagedBuilding],
        projection: &str,
    ) -> DamageResult<()> {
        log::info!("Saving {} damaged footprints to {}", buildings.len(), path.as_ref().display());

        let mut dataset = Self::create_dataset(path.as_ref())?;
        let mut layer = Self::create_polygon_layer(&mut dataset, path.as_ref(), projection)?;
        layer.create_defn_fields(&[
            ("SRC_FID", OGRFieldType::OFTInteger64),
            ("damage", OGRFieldType::OFTInteger),
        ])?;

        for building in buildings {
            let geometry = Geometry::from_wkt(&building.geometry.to_wkt())?;
            layer.create_feature_fields(
                geometry,
                &["SRC_FID", "damage"],
                &[
                    FieldValue::Integer64Value(building.fid),
                    FieldValue::IntegerValue(building.damage as i32),
                ],
            )?;
        }
        Ok(())
    }
}
