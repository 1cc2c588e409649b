//! Aperture definitions and the per image aperture table

use crate::error::{GerbvError, Result};
use std::collections::BTreeMap;
use tracing::debug;

/// Smallest aperture number usable by Gerber files; lower ids are internal
pub const APERTURE_MIN: i32 = 10;
/// Largest aperture number
pub const APERTURE_MAX: i32 = 9999;
/// Maximum number of numeric parameters per aperture
pub const APERTURE_PARAMETERS_MAX: usize = 102;

const MM_PER_INCH: f64 = 25.4;

/// Shape of an aperture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ApertureType {
    None,
    Circle,
    Rectangle,
    Oval,
    Polygon,
    Macro,
    MacroCircle,
    MacroOutline,
    MacroPolygon,
    MacroMoire,
    MacroThermal,
    MacroLine20,
    MacroLine21,
    MacroLine22,
}

impl ApertureType {
    pub fn is_macro(&self) -> bool {
        !matches!(
            self,
            ApertureType::None
                | ApertureType::Circle
                | ApertureType::Rectangle
                | ApertureType::Oval
                | ApertureType::Polygon
        )
    }

    /// Standard aperture template letter in RS-274X, if any
    pub fn template_code(&self) -> Option<char> {
        match self {
            ApertureType::Circle => Some('C'),
            ApertureType::Rectangle => Some('R'),
            ApertureType::Oval => Some('O'),
            ApertureType::Polygon => Some('P'),
            _ => None,
        }
    }
}

/// Measurement unit an aperture was declared in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Unit {
    Inch,
    Millimeter,
    #[default]
    Unspecified,
}

/// A tool definition. Parameters are stored in inches.
#[derive(Debug, Clone, PartialEq)]
pub struct Aperture {
    pub aperture_type: ApertureType,
    parameters: Vec<f64>,
    /// Name of the aperture macro template for macro typed apertures
    pub macro_name: Option<String>,
    pub unit: Unit,
}

impl Aperture {
    pub fn new(aperture_type: ApertureType, parameters: &[f64], unit: Unit) -> Result<Self> {
        if parameters.len() > APERTURE_PARAMETERS_MAX {
            return Err(GerbvError::InvalidParameterCount {
                count: parameters.len(),
                max: APERTURE_PARAMETERS_MAX,
            });
        }

        Ok(Self {
            aperture_type,
            parameters: parameters.to_vec(),
            macro_name: None,
            unit,
        })
    }

    pub fn circle(diameter: f64) -> Self {
        Self {
            aperture_type: ApertureType::Circle,
            parameters: vec![diameter],
            macro_name: None,
            unit: Unit::Inch,
        }
    }

    /// Circle aperture from a millimeter diameter, stored in inches
    pub fn circle_mm(diameter_mm: f64) -> Self {
        Self::circle(diameter_mm / MM_PER_INCH)
    }

    pub fn rectangle(width: f64, height: f64) -> Self {
        Self {
            aperture_type: ApertureType::Rectangle,
            parameters: vec![width, height],
            macro_name: None,
            unit: Unit::Inch,
        }
    }

    pub fn with_macro_name(mut self, name: impl Into<String>) -> Self {
        self.macro_name = Some(name.into());
        self
    }

    pub fn parameters(&self) -> &[f64] {
        &self.parameters
    }

    pub fn parameter(&self, index: usize) -> f64 {
        self.parameters.get(index).copied().unwrap_or(0.0)
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    /// Half extents of the shape when flashed, `(0, 0)` when unknown
    pub fn half_extents(&self) -> (f64, f64) {
        match self.aperture_type {
            ApertureType::Circle | ApertureType::Polygon => {
                let r = self.parameter(0) / 2.0;
                (r, r)
            }
            ApertureType::Rectangle | ApertureType::Oval => {
                (self.parameter(0) / 2.0, self.parameter(1) / 2.0)
            }
            // Macro primitives are not evaluated here
            _ => (0.0, 0.0),
        }
    }

    /// Width of the stroke when the aperture draws a line
    pub fn stroke_width(&self) -> f64 {
        match self.aperture_type {
            ApertureType::Circle | ApertureType::Polygon => self.parameter(0),
            ApertureType::Rectangle | ApertureType::Oval => {
                self.parameter(0).min(self.parameter(1))
            }
            _ => 0.0,
        }
    }

    /// Same shape rotated by a quarter turn
    pub(crate) fn quarter_turned(&self) -> Self {
        let mut turned = self.clone();
        if matches!(
            self.aperture_type,
            ApertureType::Rectangle | ApertureType::Oval
        ) && self.parameters.len() >= 2
        {
            turned.parameters.swap(0, 1);
        }
        turned
    }
}

/// Sparse aperture table indexed by D-code
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApertureTable {
    apertures: BTreeMap<i32, Aperture>,
}

impl ApertureTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, id: i32) -> Result<&Aperture> {
        self.apertures
            .get(&id)
            .ok_or(GerbvError::ApertureNotFound { id })
    }

    pub fn get(&self, id: i32) -> Option<&Aperture> {
        self.apertures.get(&id)
    }

    pub fn contains(&self, id: i32) -> bool {
        self.apertures.contains_key(&id)
    }

    /// Define or replace a user visible aperture
    pub fn define(
        &mut self,
        id: i32,
        aperture_type: ApertureType,
        parameters: &[f64],
        unit: Unit,
    ) -> Result<&Aperture> {
        if !(APERTURE_MIN..=APERTURE_MAX).contains(&id) {
            return Err(GerbvError::InvalidId {
                id,
                min: APERTURE_MIN,
                max: APERTURE_MAX,
            });
        }
        let aperture = Aperture::new(aperture_type, parameters, unit)?;
        debug!("Defining aperture D{} as {:?}", id, aperture_type);
        Ok(self.insert(id, aperture))
    }

    /// Insert without range checks, used for internal ids below `APERTURE_MIN`
    pub(crate) fn insert(&mut self, id: i32, aperture: Aperture) -> &Aperture {
        self.apertures.insert(id, aperture);
        &self.apertures[&id]
    }

    pub(crate) fn remove(&mut self, id: i32) -> Option<Aperture> {
        self.apertures.remove(&id)
    }

    /// First free id at or above `APERTURE_MIN`
    pub fn next_free_id(&self) -> Option<i32> {
        (APERTURE_MIN..=APERTURE_MAX).find(|id| !self.apertures.contains_key(id))
    }

    /// Id of an existing aperture equal to `aperture`
    pub fn find(&self, aperture: &Aperture) -> Option<i32> {
        self.apertures
            .iter()
            .find(|(id, existing)| **id >= APERTURE_MIN && *existing == aperture)
            .map(|(id, _)| *id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, &Aperture)> {
        self.apertures.iter().map(|(id, ap)| (*id, ap))
    }

    pub fn len(&self) -> usize {
        self.apertures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apertures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_and_lookup() {
        let mut table = ApertureTable::new();
        table
            .define(10, ApertureType::Circle, &[0.01], Unit::Inch)
            .unwrap();

        let ap = table.lookup(10).unwrap();
        assert_eq!(ap.aperture_type, ApertureType::Circle);
        assert_eq!(ap.parameter(0), 0.01);
        assert!(matches!(
            table.lookup(11),
            Err(GerbvError::ApertureNotFound { id: 11 })
        ));
    }

    #[test]
    fn test_define_rejects_reserved_and_out_of_range_ids() {
        let mut table = ApertureTable::new();

        assert!(matches!(
            table.define(9, ApertureType::Circle, &[0.01], Unit::Inch),
            Err(GerbvError::InvalidId { id: 9, .. })
        ));
        assert!(matches!(
            table.define(10_000, ApertureType::Circle, &[0.01], Unit::Inch),
            Err(GerbvError::InvalidId { id: 10_000, .. })
        ));
        assert!(table.is_empty());
    }

    #[test]
    fn test_define_rejects_too_many_parameters() {
        let mut table = ApertureTable::new();
        let params = vec![0.1; APERTURE_PARAMETERS_MAX + 1];

        let result = table.define(10, ApertureType::MacroOutline, &params, Unit::Inch);
        assert!(matches!(
            result,
            Err(GerbvError::InvalidParameterCount { count, .. }) if count == APERTURE_PARAMETERS_MAX + 1
        ));

        let params = vec![0.1; APERTURE_PARAMETERS_MAX];
        assert!(table
            .define(10, ApertureType::MacroOutline, &params, Unit::Inch)
            .is_ok());
    }

    #[test]
    fn test_circle_mm_converts_to_inches() {
        let ap = Aperture::circle_mm(25.4);
        assert!((ap.parameter(0) - 1.0).abs() < 1e-12);
        assert_eq!(ap.unit, Unit::Inch);
    }

    #[test]
    fn test_next_free_id_and_find() {
        let mut table = ApertureTable::new();
        table.insert(10, Aperture::circle(0.01));
        table.insert(11, Aperture::rectangle(0.02, 0.03));

        assert_eq!(table.next_free_id(), Some(12));
        assert_eq!(table.find(&Aperture::rectangle(0.02, 0.03)), Some(11));
        assert_eq!(table.find(&Aperture::circle(0.5)), None);
    }

    #[test]
    fn test_half_extents() {
        assert_eq!(Aperture::circle(0.2).half_extents(), (0.1, 0.1));
        assert_eq!(Aperture::rectangle(0.2, 0.4).half_extents(), (0.1, 0.2));
        assert_eq!(Aperture::rectangle(0.2, 0.4).stroke_width(), 0.2);
    }
}
