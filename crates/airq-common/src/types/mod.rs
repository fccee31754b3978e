//! Domain types shared across the AirQ workspace
//!
//! The measurement model mirrors the hourly air quality dataset: a unique
//! timestamp plus thirteen optional readings. A reading is `None` whenever the
//! source reported no value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AirqError;

/// Sensor parameter carried by a [`Measurement`]
///
/// The set is closed: read queries accept a parameter name only if it parses
/// into one of these variants, and the storage column is always taken from
/// [`Parameter::column`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Parameter {
    #[serde(rename = "co")]
    Co,
    #[serde(rename = "nmhc")]
    Nmhc,
    #[serde(rename = "benzene")]
    Benzene,
    #[serde(rename = "nox")]
    Nox,
    #[serde(rename = "no2")]
    No2,
    #[serde(rename = "pt08_s1_co")]
    Pt08S1Co,
    #[serde(rename = "pt08_s2_nmhc")]
    Pt08S2Nmhc,
    #[serde(rename = "pt08_s3_nox")]
    Pt08S3Nox,
    #[serde(rename = "pt08_s4_no2")]
    Pt08S4No2,
    #[serde(rename = "pt08_s5_o3")]
    Pt08S5O3,
    #[serde(rename = "temperature")]
    Temperature,
    #[serde(rename = "relative_humidity")]
    RelativeHumidity,
    #[serde(rename = "absolute_humidity")]
    AbsoluteHumidity,
}

impl Parameter {
    /// Every parameter, in source column order
    pub const ALL: [Parameter; 13] = [
        Parameter::Co,
        Parameter::Nmhc,
        Parameter::Benzene,
        Parameter::Nox,
        Parameter::No2,
        Parameter::Pt08S1Co,
        Parameter::Pt08S2Nmhc,
        Parameter::Pt08S3Nox,
        Parameter::Pt08S4No2,
        Parameter::Pt08S5O3,
        Parameter::Temperature,
        Parameter::RelativeHumidity,
        Parameter::AbsoluteHumidity,
    ];

    /// Storage column / API name
    pub fn column(&self) -> &'static str {
        match self {
            Parameter::Co => "co",
            Parameter::Nmhc => "nmhc",
            Parameter::Benzene => "benzene",
            Parameter::Nox => "nox",
            Parameter::No2 => "no2",
            Parameter::Pt08S1Co => "pt08_s1_co",
            Parameter::Pt08S2Nmhc => "pt08_s2_nmhc",
            Parameter::Pt08S3Nox => "pt08_s3_nox",
            Parameter::Pt08S4No2 => "pt08_s4_no2",
            Parameter::Pt08S5O3 => "pt08_s5_o3",
            Parameter::Temperature => "temperature",
            Parameter::RelativeHumidity => "relative_humidity",
            Parameter::AbsoluteHumidity => "absolute_humidity",
        }
    }

    /// Header of the column holding this reading in the input file
    pub fn source_column(&self) -> &'static str {
        match self {
            Parameter::Co => "CO(GT)",
            Parameter::Nmhc => "NMHC(GT)",
            Parameter::Benzene => "C6H6(GT)",
            Parameter::Nox => "NOx(GT)",
            Parameter::No2 => "NO2(GT)",
            Parameter::Pt08S1Co => "PT08.S1(CO)",
            Parameter::Pt08S2Nmhc => "PT08.S2(NMHC)",
            Parameter::Pt08S3Nox => "PT08.S3(NOx)",
            Parameter::Pt08S4No2 => "PT08.S4(NO2)",
            Parameter::Pt08S5O3 => "PT08.S5(O3)",
            Parameter::Temperature => "T",
            Parameter::RelativeHumidity => "RH",
            Parameter::AbsoluteHumidity => "AH",
        }
    }

    /// Physical unit, when the reading is a calibrated concentration
    ///
    /// The PT08 metal oxide sensors report raw responses and have no unit.
    pub fn unit(&self) -> Option<&'static str> {
        match self {
            Parameter::Co => Some("mg/m³"),
            Parameter::Nmhc | Parameter::Benzene | Parameter::No2 => Some("µg/m³"),
            Parameter::Nox => Some("ppb"),
            Parameter::Temperature => Some("°C"),
            Parameter::RelativeHumidity => Some("%"),
            Parameter::AbsoluteHumidity => Some("g/m³"),
            Parameter::Pt08S1Co
            | Parameter::Pt08S2Nmhc
            | Parameter::Pt08S3Nox
            | Parameter::Pt08S4No2
            | Parameter::Pt08S5O3 => None,
        }
    }
}

impl std::fmt::Display for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}

impl std::str::FromStr for Parameter {
    type Err = AirqError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Parameter::ALL
            .iter()
            .copied()
            .find(|p| p.column() == s)
            .ok_or_else(|| AirqError::InvalidParameter(s.to_string()))
    }
}

/// One hourly sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub timestamp: DateTime<Utc>,
    pub co: Option<f64>,
    pub nmhc: Option<f64>,
    pub benzene: Option<f64>,
    pub nox: Option<f64>,
    pub no2: Option<f64>,
    pub pt08_s1_co: Option<f64>,
    pub pt08_s2_nmhc: Option<f64>,
    pub pt08_s3_nox: Option<f64>,
    pub pt08_s4_no2: Option<f64>,
    pub pt08_s5_o3: Option<f64>,
    pub temperature: Option<f64>,
    pub relative_humidity: Option<f64>,
    pub absolute_humidity: Option<f64>,
}

impl Measurement {
    /// Create a measurement with every reading absent
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            co: None,
            nmhc: None,
            benzene: None,
            nox: None,
            no2: None,
            pt08_s1_co: None,
            pt08_s2_nmhc: None,
            pt08_s3_nox: None,
            pt08_s4_no2: None,
            pt08_s5_o3: None,
            temperature: None,
            relative_humidity: None,
            absolute_humidity: None,
        }
    }

    pub fn reading(&self, parameter: Parameter) -> Option<f64> {
        match parameter {
            Parameter::Co => self.co,
            Parameter::Nmhc => self.nmhc,
            Parameter::Benzene => self.benzene,
            Parameter::Nox => self.nox,
            Parameter::No2 => self.no2,
            Parameter::Pt08S1Co => self.pt08_s1_co,
            Parameter::Pt08S2Nmhc => self.pt08_s2_nmhc,
            Parameter::Pt08S3Nox => self.pt08_s3_nox,
            Parameter::Pt08S4No2 => self.pt08_s4_no2,
            Parameter::Pt08S5O3 => self.pt08_s5_o3,
            Parameter::Temperature => self.temperature,
            Parameter::RelativeHumidity => self.relative_humidity,
            Parameter::AbsoluteHumidity => self.absolute_humidity,
        }
    }

    pub fn set_reading(&mut self, parameter: Parameter, value: Option<f64>) {
        let slot = match parameter {
            Parameter::Co => &mut self.co,
            Parameter::Nmhc => &mut self.nmhc,
            Parameter::Benzene => &mut self.benzene,
            Parameter::Nox => &mut self.nox,
            Parameter::No2 => &mut self.no2,
            Parameter::Pt08S1Co => &mut self.pt08_s1_co,
            Parameter::Pt08S2Nmhc => &mut self.pt08_s2_nmhc,
            Parameter::Pt08S3Nox => &mut self.pt08_s3_nox,
            Parameter::Pt08S4No2 => &mut self.pt08_s4_no2,
            Parameter::Pt08S5O3 => &mut self.pt08_s5_o3,
            Parameter::Temperature => &mut self.temperature,
            Parameter::RelativeHumidity => &mut self.relative_humidity,
            Parameter::AbsoluteHumidity => &mut self.absolute_humidity,
        };
        *slot = value;
    }

    /// Builder-style variant of [`Measurement::set_reading`]
    pub fn with_reading(mut self, parameter: Parameter, value: f64) -> Self {
        self.set_reading(parameter, Some(value));
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parameter_from_str() {
        assert_eq!("co".parse::<Parameter>().unwrap(), Parameter::Co);
        assert_eq!("pt08_s5_o3".parse::<Parameter>().unwrap(), Parameter::Pt08S5O3);
        assert_eq!(
            "relative_humidity".parse::<Parameter>().unwrap(),
            Parameter::RelativeHumidity
        );
        assert!(matches!(
            "co; DROP TABLE".parse::<Parameter>(),
            Err(AirqError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_parameter_serde_matches_column() {
        for parameter in Parameter::ALL {
            let json = serde_json::to_string(&parameter).unwrap();
            assert_eq!(json, format!("\"{}\"", parameter.column()));
        }
    }

    #[test]
    fn test_parameter_units() {
        assert_eq!(Parameter::Co.unit(), Some("mg/m³"));
        assert_eq!(Parameter::Nox.unit(), Some("ppb"));
        assert_eq!(Parameter::Pt08S3Nox.unit(), None);
    }

    #[test]
    fn test_measurement_readings() {
        let ts = Utc.with_ymd_and_hms(2004, 3, 10, 18, 0, 0).unwrap();
        let mut m = Measurement::new(ts).with_reading(Parameter::Co, 2.6);
        m.set_reading(Parameter::Temperature, Some(13.6));

        assert_eq!(m.reading(Parameter::Co), Some(2.6));
        assert_eq!(m.reading(Parameter::Temperature), Some(13.6));
        assert_eq!(m.reading(Parameter::Nmhc), None);

        m.set_reading(Parameter::Co, None);
        assert_eq!(m.co, None);
    }
}
