use serde::Serialize;
use thiserror::Error;

use crate::models::{Activity, Category, Summary};
use crate::utils::parse_date;

pub const TRANSPORT_TYPES: [&str; 7] = [
    "Car(Petrol)",
    "Car(Diesel)",
    "Bus",
    "Train",
    "Bicycle",
    "Motorcycle",
    "Flight",
];

/// Used until the backend list from `/activities/energy-types` arrives
pub const ENERGY_TYPES: [&str; 5] = ["Electricity", "Natural Gas", "Heating Oil", "Coal", "Appliance"];

pub const ENERGY_UNITS: [&str; 4] = ["kWh", "m³", "kg", "liters"];

pub const DEFAULT_UNIT: &str = "kWh";

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Please choose a mode of transport")]
    MissingVehicleType,
    #[error("Please choose an energy source")]
    MissingEnergyType,
    #[error("Distance must be a number greater than 0 (got '{0}')")]
    InvalidDistance(String),
    #[error("Usage must be a number greater than 0 (got '{0}')")]
    InvalidUsage(String),
    #[error("Unknown unit '{0}', expected one of kWh, m³, kg, liters")]
    UnknownUnit(String),
    #[error("Invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("{0} activities cannot be logged")]
    UnsupportedCategory(Category),
}

/// Raw form input, exactly as typed
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityDraft {
    pub category: Category,
    /// Vehicle type for transport, energy source for energy
    pub kind: String,
    /// Distance in km for transport, usage for energy
    pub amount: String,
    pub unit: String,
    pub date: String,
    pub notes: String,
}

impl Default for ActivityDraft {
    fn default() -> Self {
        Self::new(Category::Transport)
    }
}

impl ActivityDraft {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            kind: String::new(),
            amount: String::new(),
            unit: String::new(),
            date: String::new(),
            notes: String::new(),
        }
    }

    /// Check the draft and build the request payload.
    /// Nothing is sent to the backend unless this succeeds.
    pub fn validate(&self) -> Result<NewActivity, ValidationError> {
        let notes = Some(self.notes.trim().to_string()).filter(|n| !n.is_empty());
        let date = match self.date.trim() {
            "" => None,
            raw => {
                // datetime-local style input keeps only the day
                let day = raw.split(['T', ' ']).next().unwrap_or(raw);
                let parsed = parse_date(day).map_err(|_| ValidationError::InvalidDate(raw.to_string()))?;
                Some(parsed.format("%Y-%m-%d").to_string())
            }
        };
        let kind = self.kind.trim();

        match self.category {
            Category::Transport => {
                if kind.is_empty() {
                    return Err(ValidationError::MissingVehicleType);
                }
                let distance_km = parse_positive(&self.amount)
                    .ok_or_else(|| ValidationError::InvalidDistance(self.amount.trim().to_string()))?;
                Ok(NewActivity::Transport {
                    vehicle_type: kind.to_string(),
                    distance_km,
                    date,
                    notes,
                })
            }
            Category::Energy => {
                if kind.is_empty() {
                    return Err(ValidationError::MissingEnergyType);
                }
                let usage = parse_positive(&self.amount)
                    .ok_or_else(|| ValidationError::InvalidUsage(self.amount.trim().to_string()))?;
                let unit = normalize_unit(&self.unit)?;
                Ok(NewActivity::Energy {
                    energy_type: kind.to_string(),
                    usage,
                    unit,
                    date,
                    notes,
                })
            }
            other => Err(ValidationError::UnsupportedCategory(other)),
        }
    }
}

fn parse_positive(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}

fn normalize_unit(raw: &str) -> Result<String, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(DEFAULT_UNIT.to_string());
    }
    let lower = raw.to_lowercase();
    let unit = match lower.as_str() {
        "kwh" => "kWh",
        "m³" | "m3" => "m³",
        "kg" => "kg",
        "l" | "liter" | "liters" | "litre" | "litres" => "liters",
        _ => return Err(ValidationError::UnknownUnit(raw.to_string())),
    };
    Ok(unit.to_string())
}

/// Validated request body for `POST /activities`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "category", rename_all = "lowercase")]
pub enum NewActivity {
    Transport {
        vehicle_type: String,
        distance_km: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        date: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        notes: Option<String>,
    },
    Energy {
        energy_type: String,
        usage: f64,
        unit: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        date: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        notes: Option<String>,
    },
}

impl NewActivity {
    pub fn category(&self) -> Category {
        match self {
            NewActivity::Transport { .. } => Category::Transport,
            NewActivity::Energy { .. } => Category::Energy,
        }
    }

    /// Fill in whatever the backend left out of its create response
    pub fn complete(&self, mut created: Activity) -> Activity {
        if created.category == Category::Other {
            created.category = self.category();
        }
        match self {
            NewActivity::Transport { vehicle_type, distance_km, date, notes } => {
                if created.kind.is_empty() {
                    created.kind = vehicle_type.clone();
                }
                created.distance_km = created.distance_km.or(Some(*distance_km));
                fill_common(&mut created, date, notes);
            }
            NewActivity::Energy { energy_type, usage, unit, date, notes } => {
                if created.kind.is_empty() {
                    created.kind = energy_type.clone();
                }
                created.usage = created.usage.or(Some(*usage));
                if created.unit.is_none() {
                    created.unit = Some(unit.clone());
                }
                fill_common(&mut created, date, notes);
            }
        }
        created
    }
}

fn fill_common(created: &mut Activity, date: &Option<String>, notes: &Option<String>) {
    if created.timestamp.is_empty() {
        created.timestamp = date
            .clone()
            .unwrap_or_else(|| chrono::Utc::now().to_rfc3339());
    }
    if created.notes.is_none() {
        created.notes = notes.clone();
    }
}

/// Client-side history plus running summary.
///
/// Counters are updated incrementally on create and delete and only
/// reconciled with the server when a refresh replaces them.
#[derive(Debug, Clone, Default)]
pub struct ActivityLog {
    history: Vec<Activity>,
    summary: Summary,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> &[Activity] {
        &self.history
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Activity> {
        self.history.iter().find(|a| a.id == id)
    }

    /// Newest first, optionally restricted to one category
    pub fn filtered(&self, category: Option<Category>) -> Vec<&Activity> {
        self.history
            .iter()
            .filter(|a| category.is_none_or(|c| a.category == c))
            .collect()
    }

    pub fn record_created(&mut self, activity: Activity) {
        let summary = &mut self.summary;
        summary.total_emissions_kg += activity.emission();
        summary.activities_logged += 1;
        summary.average_kg = summary.total_emissions_kg / summary.activities_logged as f64;
        self.history.insert(0, activity);
    }

    /// Remove a single entry. Returns None, leaving counters alone, when the id is unknown.
    pub fn remove(&mut self, id: &str) -> Option<Activity> {
        let index = self.history.iter().position(|a| a.id == id)?;
        let removed = self.history.remove(index);

        let summary = &mut self.summary;
        summary.activities_logged = summary.activities_logged.saturating_sub(1);
        summary.total_emissions_kg = (summary.total_emissions_kg - removed.emission()).max(0.0);
        summary.average_kg = if summary.activities_logged > 0 {
            summary.total_emissions_kg / summary.activities_logged as f64
        } else {
            0.0
        };
        Some(removed)
    }

    pub fn replace_history(&mut self, history: Vec<Activity>) {
        self.history = history;
    }

    pub fn replace_summary(&mut self, summary: Summary) {
        self.summary = summary;
    }
}
