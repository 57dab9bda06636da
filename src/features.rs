//! The fixed request schema and its projection onto a model's column order.
//!
//! Every field of [`FlightFeatures`] is required: there are no `Option`s and
//! no serde defaults, so a body missing any column fails to deserialize. The
//! cabin class travels as `class` on the wire and in the persisted column
//! ordering; `cabin_class` is only the Rust-side name.

use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

pub const AIRLINES: [&str; 6] = [
    "AirAsia",
    "Air_India",
    "GO_FIRST",
    "Indigo",
    "SpiceJet",
    "Vistara",
];

pub const CITIES: [&str; 6] = [
    "Bangalore",
    "Chennai",
    "Delhi",
    "Hyderabad",
    "Kolkata",
    "Mumbai",
];

pub const TIMES_OF_DAY: [&str; 6] = [
    "Afternoon",
    "Early_Morning",
    "Evening",
    "Late_Night",
    "Morning",
    "Night",
];

/// A family of indicator columns named `<prefix>_<category>`.
#[derive(Debug, Clone, Copy)]
pub struct OneHotGroup {
    pub prefix: &'static str,
    pub categories: &'static [&'static str],
}

pub const ONE_HOT_GROUPS: [OneHotGroup; 5] = [
    OneHotGroup {
        prefix: "airline",
        categories: &AIRLINES,
    },
    OneHotGroup {
        prefix: "source",
        categories: &CITIES,
    },
    OneHotGroup {
        prefix: "destination",
        categories: &CITIES,
    },
    OneHotGroup {
        prefix: "departure",
        categories: &TIMES_OF_DAY,
    },
    OneHotGroup {
        prefix: "arrival",
        categories: &TIMES_OF_DAY,
    },
];

/// Wire names of every schema field, in declaration order.
pub const FEATURE_NAMES: [&str; 34] = [
    "stops",
    "class",
    "duration",
    "days_left",
    "airline_AirAsia",
    "airline_Air_India",
    "airline_GO_FIRST",
    "airline_Indigo",
    "airline_SpiceJet",
    "airline_Vistara",
    "source_Bangalore",
    "source_Chennai",
    "source_Delhi",
    "source_Hyderabad",
    "source_Kolkata",
    "source_Mumbai",
    "destination_Bangalore",
    "destination_Chennai",
    "destination_Delhi",
    "destination_Hyderabad",
    "destination_Kolkata",
    "destination_Mumbai",
    "departure_Afternoon",
    "departure_Early_Morning",
    "departure_Evening",
    "departure_Late_Night",
    "departure_Morning",
    "departure_Night",
    "arrival_Afternoon",
    "arrival_Early_Morning",
    "arrival_Evening",
    "arrival_Late_Night",
    "arrival_Morning",
    "arrival_Night",
];

#[allow(non_snake_case)]
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FlightFeatures {
    pub stops: i64,
    #[serde(rename = "class")]
    pub cabin_class: i64,
    pub duration: f64,
    pub days_left: i64,
    pub airline_AirAsia: i64,
    pub airline_Air_India: i64,
    pub airline_GO_FIRST: i64,
    pub airline_Indigo: i64,
    pub airline_SpiceJet: i64,
    pub airline_Vistara: i64,
    pub source_Bangalore: i64,
    pub source_Chennai: i64,
    pub source_Delhi: i64,
    pub source_Hyderabad: i64,
    pub source_Kolkata: i64,
    pub source_Mumbai: i64,
    pub destination_Bangalore: i64,
    pub destination_Chennai: i64,
    pub destination_Delhi: i64,
    pub destination_Hyderabad: i64,
    pub destination_Kolkata: i64,
    pub destination_Mumbai: i64,
    pub departure_Afternoon: i64,
    pub departure_Early_Morning: i64,
    pub departure_Evening: i64,
    pub departure_Late_Night: i64,
    pub departure_Morning: i64,
    pub departure_Night: i64,
    pub arrival_Afternoon: i64,
    pub arrival_Early_Morning: i64,
    pub arrival_Evening: i64,
    pub arrival_Late_Night: i64,
    pub arrival_Morning: i64,
    pub arrival_Night: i64,
}

impl FlightFeatures {
    /// Looks up a column by its wire name.
    pub fn value_of(&self, name: &str) -> Option<f64> {
        let value = match name {
            "stops" => self.stops as f64,
            "class" => self.cabin_class as f64,
            "duration" => self.duration,
            "days_left" => self.days_left as f64,
            "airline_AirAsia" => self.airline_AirAsia as f64,
            "airline_Air_India" => self.airline_Air_India as f64,
            "airline_GO_FIRST" => self.airline_GO_FIRST as f64,
            "airline_Indigo" => self.airline_Indigo as f64,
            "airline_SpiceJet" => self.airline_SpiceJet as f64,
            "airline_Vistara" => self.airline_Vistara as f64,
            "source_Bangalore" => self.source_Bangalore as f64,
            "source_Chennai" => self.source_Chennai as f64,
            "source_Delhi" => self.source_Delhi as f64,
            "source_Hyderabad" => self.source_Hyderabad as f64,
            "source_Kolkata" => self.source_Kolkata as f64,
            "source_Mumbai" => self.source_Mumbai as f64,
            "destination_Bangalore" => self.destination_Bangalore as f64,
            "destination_Chennai" => self.destination_Chennai as f64,
            "destination_Delhi" => self.destination_Delhi as f64,
            "destination_Hyderabad" => self.destination_Hyderabad as f64,
            "destination_Kolkata" => self.destination_Kolkata as f64,
            "destination_Mumbai" => self.destination_Mumbai as f64,
            "departure_Afternoon" => self.departure_Afternoon as f64,
            "departure_Early_Morning" => self.departure_Early_Morning as f64,
            "departure_Evening" => self.departure_Evening as f64,
            "departure_Late_Night" => self.departure_Late_Night as f64,
            "departure_Morning" => self.departure_Morning as f64,
            "departure_Night" => self.departure_Night as f64,
            "arrival_Afternoon" => self.arrival_Afternoon as f64,
            "arrival_Early_Morning" => self.arrival_Early_Morning as f64,
            "arrival_Evening" => self.arrival_Evening as f64,
            "arrival_Late_Night" => self.arrival_Late_Night as f64,
            "arrival_Morning" => self.arrival_Morning as f64,
            "arrival_Night" => self.arrival_Night as f64,
            _ => return None,
        };
        Some(value)
    }

    /// Builds the single input row in exactly the column order the model was
    /// trained on. Values are narrowed to `f32`, the precision tree splits are
    /// evaluated at.
    pub fn project(&self, ordering: &[String]) -> Result<Vec<f32>, ServiceError> {
        ordering
            .iter()
            .map(|name| {
                self.value_of(name)
                    .map(|v| v as f32)
                    .ok_or_else(|| ServiceError::UnknownFeature(name.clone()))
            })
            .collect()
    }

    /// Checks that every one-hot group holds only 0/1 values with exactly one
    /// category set.
    pub fn validate_one_hot(&self) -> Result<(), ServiceError> {
        let mut problems = Vec::new();

        for group in ONE_HOT_GROUPS {
            let mut set = 0usize;
            for category in group.categories {
                let column = format!("{}_{}", group.prefix, category);
                match self.value_of(&column) {
                    Some(v) if v == 1.0 => set += 1,
                    Some(v) if v == 0.0 => {}
                    Some(v) => problems.push(format!("{column} must be 0 or 1, got {v}")),
                    None => problems.push(format!("{column} is missing")),
                }
            }
            if set != 1 {
                problems.push(format!(
                    "exactly one {}_* field must be 1, found {set}",
                    group.prefix
                ));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::unprocessable(problems.join("; ")))
        }
    }
}
