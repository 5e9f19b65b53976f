use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize, Serializer};

/// A latitude/longitude pair in decimal degrees.
///
/// `(0, 0)` doubles as the "no location data" marker. It collides with a real
/// point in the Gulf of Guinea, which is accepted as a known limitation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// The "no location data" marker.
    pub const UNSET: Coordinates = Coordinates { latitude: 0.0, longitude: 0.0 };

    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub fn is_unset(&self) -> bool {
        *self == Self::UNSET
    }

    /// Parse a `"<lat>,<lon>"` string as returned in the `loc` field of ipinfo-style payloads.
    pub fn parse_loc(loc: &str) -> Option<Self> {
        let (lat, lon) = loc.split_once(',')?;
        let latitude = lat.trim().parse().ok()?;
        let longitude = lon.trim().parse().ok()?;
        Some(Self { latitude, longitude })
    }
}

/// Geolocation record for a single IP.
///
/// Every descriptive field is optional because providers omit them freely
/// (e.g. bogon addresses only carry `ip` and `bogon`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bogon: Option<bool>,

    /// Filled from `loc` when the provider does not send numeric coordinates.
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
}

impl GeoLocation {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }

    /// `loc` with surrounding whitespace removed, if it carries anything at all.
    pub fn loc_str(&self) -> Option<&str> {
        self.loc.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn set_coordinates(&mut self, coords: Coordinates) {
        self.latitude = coords.latitude;
        self.longitude = coords.longitude;
    }
}

/// Human-readable condition for a weather code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherCondition {
    pub description: String,
    pub image: String,
}

/// Current conditions at a location, decorated with the condition text and icon.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherSnapshot {
    pub description: String,
    pub code: i32,
    pub is_day: bool,
    pub temp_c: f64,
    pub apparent_c: f64,
    pub wind_kmh: f64,
    pub gust_kmh: f64,
    pub wind_direction_deg: i32,
    pub humidity: i32,
    pub pressure_hpa: f64,
    pub precipitation_mm: f64,
    pub cloud_cover: i32,
    #[serde(rename = "weather_image")]
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_at: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

/// Outcome of a weather lookup. Failures never escape as errors; they become `Unknown`.
#[derive(Debug, Clone, PartialEq)]
pub enum WeatherReport {
    Observed(Box<WeatherSnapshot>),
    Unknown,
}

impl WeatherReport {
    pub const UNKNOWN: &'static str = "Unknown";

    pub fn description(&self) -> &str {
        match self {
            WeatherReport::Observed(snapshot) => &snapshot.description,
            WeatherReport::Unknown => Self::UNKNOWN,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, WeatherReport::Unknown)
    }
}

impl From<WeatherSnapshot> for WeatherReport {
    fn from(snapshot: WeatherSnapshot) -> Self {
        WeatherReport::Observed(Box::new(snapshot))
    }
}

impl Serialize for WeatherReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            WeatherReport::Observed(snapshot) => snapshot.serialize(serializer),
            WeatherReport::Unknown => serializer.serialize_str(Self::UNKNOWN),
        }
    }
}
