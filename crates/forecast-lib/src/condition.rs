//! Weather condition vocabularies
//!
//! Canonical condition codes are OpenWeatherMap condition ids. Other
//! vocabularies (WeatherAPI.com codes, WMO codes from Open-Meteo) are mapped
//! onto them so the model always sees a single code set.
//! See: https://openweathermap.org/weather-conditions

use serde::{Deserialize, Serialize};

/// Canonical code used when a foreign code has no mapping
pub const CLEAR_SKY: i32 = 800;

/// Coarse condition grouping of a canonical code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionGroup {
    Thunderstorm,
    Drizzle,
    Rain,
    Snow,
    Atmosphere,
    Clear,
    Clouds,
    Unknown,
}

impl ConditionGroup {
    pub fn from_code(code: i32) -> Self {
        match code {
            200..=299 => Self::Thunderstorm,
            300..=399 => Self::Drizzle,
            500..=599 => Self::Rain,
            600..=699 => Self::Snow,
            700..=799 => Self::Atmosphere,
            800 => Self::Clear,
            801..=899 => Self::Clouds,
            _ => Self::Unknown,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Thunderstorm => "Thunderstorm",
            Self::Drizzle => "Drizzle",
            Self::Rain => "Rain",
            Self::Snow => "Snow",
            Self::Atmosphere => "Mist / Fog",
            Self::Clear => "Clear",
            Self::Clouds => "Clouds",
            Self::Unknown => "Unknown",
        }
    }
}

/// Map a WeatherAPI.com condition code to the canonical vocabulary
/// See: https://www.weatherapi.com/docs/weather_conditions.json
pub fn from_weatherapi_code(code: i32) -> i32 {
    match code {
        1000 => 800,                             // Sunny / Clear
        1003 => 802,                             // Partly cloudy
        1006 => 803,                             // Cloudy
        1009 => 804,                             // Overcast
        1030 => 701,                             // Mist
        1135 | 1147 => 741,                      // Fog, freezing fog
        1063 | 1180 | 1183 | 1240 => 500,        // Light / patchy rain
        1186 | 1189 | 1243 => 501,               // Moderate rain
        1192 | 1195 | 1246 => 502,               // Heavy / torrential rain
        1198 | 1201 => 511,                      // Freezing rain
        1150 | 1153 => 300,                      // Light drizzle
        1072 | 1168 | 1171 => 301,               // Freezing drizzle
        1069 | 1204 | 1207 | 1249 | 1252 => 611, // Sleet
        1066 | 1210 | 1213 | 1255 => 600,        // Light snow
        1216 | 1219 | 1258 => 601,               // Moderate snow
        1114 | 1117 | 1222 | 1225 => 602,        // Heavy snow, blizzard
        1237 | 1261 | 1264 => 611,               // Ice pellets
        1087 | 1273 => 200,                      // Thundery outbreaks, light rain with thunder
        1276 => 201,                             // Moderate or heavy rain with thunder
        1279 | 1282 => 621,                      // Snow with thunder
        _ => CLEAR_SKY,
    }
}

/// Map a WMO weather interpretation code (Open-Meteo `weather_code`) to the
/// canonical vocabulary
/// See: https://open-meteo.com/en/docs#weathervariables
pub fn from_wmo_code(code: i32) -> i32 {
    match code {
        0 => 800,
        1 => 801,
        2 => 802,
        3 => 804,
        45 | 48 => 741,
        51 => 300,
        53 => 301,
        55 => 302,
        56 | 57 => 311,
        61 => 500,
        63 => 501,
        65 => 502,
        66 | 67 => 511,
        71 => 600,
        73 => 601,
        75 => 602,
        77 => 600,
        80 => 520,
        81 => 521,
        82 => 522,
        85 => 620,
        86 => 622,
        95 => 200,
        96 | 99 => 202,
        _ => CLEAR_SKY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weatherapi_mapping() {
        assert_eq!(from_weatherapi_code(1000), 800);
        assert_eq!(from_weatherapi_code(1009), 804);
        assert_eq!(from_weatherapi_code(1195), 502);
        assert_eq!(from_weatherapi_code(1276), 201);
        assert_eq!(from_weatherapi_code(-5), CLEAR_SKY);
    }

    #[test]
    fn test_wmo_mapping() {
        assert_eq!(from_wmo_code(0), 800);
        assert_eq!(from_wmo_code(3), 804);
        assert_eq!(from_wmo_code(45), 741);
        assert_eq!(from_wmo_code(63), 501);
        assert_eq!(from_wmo_code(99), 202);
        assert_eq!(from_wmo_code(999), CLEAR_SKY);
    }

    #[test]
    fn test_mapped_codes_land_in_expected_groups() {
        assert_eq!(
            ConditionGroup::from_code(from_weatherapi_code(1087)),
            ConditionGroup::Thunderstorm
        );
        assert_eq!(ConditionGroup::from_code(from_wmo_code(73)), ConditionGroup::Snow);
        assert_eq!(ConditionGroup::from_code(from_wmo_code(2)), ConditionGroup::Clouds);
        assert_eq!(ConditionGroup::from_code(42), ConditionGroup::Unknown);
        assert_eq!(ConditionGroup::Clear.description(), "Clear");
    }
}
