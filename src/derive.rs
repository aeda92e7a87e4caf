//! Derived listing features.
//!
//! Both ratios share one zero-fill policy: a zero denominator or any
//! non-finite quotient resolves to `0.0`, meaning "ratio undefined".

use std::fmt;
use std::str::FromStr;

use crate::types::ListingParams;

/// Every column the assembler can draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Floor,
    IsApartment,
    KitchenArea,
    LivingArea,
    Rooms,
    Studio,
    TotalArea,
    BuildingId,
    BuildYear,
    BuildingTypeInt,
    Latitude,
    Longitude,
    CeilingHeight,
    FlatsCount,
    FloorsTotal,
    HasElevator,
    AreaRatio,
    RoomDensity,
}

impl Column {
    pub const ALL: [Column; 18] = [
        Column::Floor,
        Column::IsApartment,
        Column::KitchenArea,
        Column::LivingArea,
        Column::Rooms,
        Column::Studio,
        Column::TotalArea,
        Column::BuildingId,
        Column::BuildYear,
        Column::BuildingTypeInt,
        Column::Latitude,
        Column::Longitude,
        Column::CeilingHeight,
        Column::FlatsCount,
        Column::FloorsTotal,
        Column::HasElevator,
        Column::AreaRatio,
        Column::RoomDensity,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Column::Floor => "floor",
            Column::IsApartment => "is_apartment",
            Column::KitchenArea => "kitchen_area",
            Column::LivingArea => "living_area",
            Column::Rooms => "rooms",
            Column::Studio => "studio",
            Column::TotalArea => "total_area",
            Column::BuildingId => "building_id",
            Column::BuildYear => "build_year",
            Column::BuildingTypeInt => "building_type_int",
            Column::Latitude => "latitude",
            Column::Longitude => "longitude",
            Column::CeilingHeight => "ceiling_height",
            Column::FlatsCount => "flats_count",
            Column::FloorsTotal => "floors_total",
            Column::HasElevator => "has_elevator",
            Column::AreaRatio => "area_ratio",
            Column::RoomDensity => "room_density",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Column {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Column::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| format!("unknown column `{s}`"))
    }
}

/// Raw attributes with flags encoded as 0/1, plus the two computed ratios.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedFeatures {
    raw: ListingParams,
    pub area_ratio: f64,
    pub room_density: f64,
}

impl DerivedFeatures {
    pub fn value(&self, column: Column) -> f64 {
        let p = &self.raw;
        match column {
            Column::Floor => p.floor,
            Column::IsApartment => encode(p.is_apartment),
            Column::KitchenArea => p.kitchen_area,
            Column::LivingArea => p.living_area,
            Column::Rooms => p.rooms,
            Column::Studio => encode(p.studio),
            Column::TotalArea => p.total_area,
            Column::BuildingId => p.building_id,
            Column::BuildYear => p.build_year,
            Column::BuildingTypeInt => p.building_type_int,
            Column::Latitude => p.latitude,
            Column::Longitude => p.longitude,
            Column::CeilingHeight => p.ceiling_height,
            Column::FlatsCount => p.flats_count,
            Column::FloorsTotal => p.floors_total,
            Column::HasElevator => encode(p.has_elevator),
            Column::AreaRatio => self.area_ratio,
            Column::RoomDensity => self.room_density,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureDeriver;

impl FeatureDeriver {
    pub fn derive(&self, params: &ListingParams) -> DerivedFeatures {
        DerivedFeatures {
            area_ratio: ratio(params.living_area, params.total_area),
            room_density: ratio(params.rooms, params.total_area),
            raw: params.clone(),
        }
    }
}

fn encode(flag: bool) -> f64 {
    if flag {
        1.0
    } else {
        0.0
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    let q = numerator / denominator;
    if q.is_finite() {
        q
    } else {
        0.0
    }
}
