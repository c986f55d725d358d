use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Top-level activity classification.
/// Older backend revisions also stored food records; anything unrecognised lands in `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[serde(alias = "Transport")]
    Transport,
    #[serde(alias = "Energy")]
    Energy,
    #[serde(alias = "Food")]
    Food,
    #[serde(other)]
    Other,
}

impl Category {
    /// Categories that can be submitted from the activity form
    pub const LOGGABLE: [Category; 2] = [Category::Transport, Category::Energy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Transport => "transport",
            Category::Energy => "energy",
            Category::Food => "food",
            Category::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::Transport => "Transport",
            Category::Energy => "Energy",
            Category::Food => "Food",
            Category::Other => "Other",
        }
    }

    /// Parse user input such as `transport`, `Energy` or `all`
    /// Returns None for "all" and for unknown values
    pub fn parse_filter(value: &str) -> Option<Category> {
        match value.trim().to_lowercase().as_str() {
            "transport" => Some(Category::Transport),
            "energy" => Some(Category::Energy),
            "food" => Some(Category::Food),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identifiers arrive as strings (document ids) or integers (row ids) depending on the backend
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => s,
            RawId::Integer(n) => n.to_string(),
            RawId::Float(n) => format!("{}", n),
        }
    }
}

fn deserialize_optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RawId>::deserialize(deserializer)?.map(String::from))
}

/// A single logged transport or energy-use event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawActivity")]
pub struct Activity {
    pub id: String,
    pub category: Category,
    /// Sub-kind, e.g. "Car(Petrol)" or "Electricity"
    pub kind: String,
    pub distance_km: Option<f64>,
    pub usage: Option<f64>,
    pub unit: Option<String>,
    pub servings: Option<f64>,
    /// CO₂-equivalent in kilograms, computed by the backend
    pub co2_kg: f64,
    /// Creation time as sent by the backend, parsed on demand
    pub timestamp: String,
    pub notes: Option<String>,
}

/// Wire shape of an activity across backend revisions
/// Every alias is a separate field so records carrying several of them still decode
#[derive(Deserialize)]
struct RawActivity {
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    id: Option<String>,
    #[serde(default, rename = "_id", deserialize_with = "deserialize_optional_id")]
    mongo_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    activity_id: Option<String>,
    /// Null or missing means `Category::Other`
    #[serde(default)]
    category: Option<Category>,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default, rename = "type")]
    type_name: Option<String>,
    #[serde(default)]
    energy_type: Option<String>,
    #[serde(default)]
    vehicle_type: Option<String>,
    #[serde(default)]
    transport_type: Option<String>,
    #[serde(default)]
    distance_km: Option<f64>,
    #[serde(default)]
    distance: Option<f64>,
    #[serde(default)]
    usage: Option<f64>,
    #[serde(default)]
    energy_amount: Option<f64>,
    #[serde(default)]
    usage_kwh: Option<f64>,
    #[serde(default)]
    amount: Option<f64>,
    #[serde(default)]
    unit: Option<String>,
    #[serde(default)]
    servings: Option<f64>,
    #[serde(default)]
    co2_kg: Option<f64>,
    #[serde(default)]
    co2: Option<f64>,
    #[serde(default)]
    emission_kg: Option<f64>,
    #[serde(default)]
    emissions: Option<f64>,
    #[serde(default)]
    carbon: Option<f64>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

impl From<RawActivity> for Activity {
    fn from(raw: RawActivity) -> Self {
        let usage_kwh_unit = raw.usage_kwh.is_some() && raw.unit.is_none();
        Self {
            id: raw.id.or(raw.mongo_id).or(raw.activity_id).unwrap_or_default(),
            category: raw.category.unwrap_or(Category::Other),
            kind: raw
                .kind
                .or(raw.vehicle_type)
                .or(raw.energy_type)
                .or(raw.transport_type)
                .or(raw.type_name)
                .unwrap_or_default(),
            distance_km: raw.distance_km.or(raw.distance),
            usage: raw
                .usage
                .or(raw.usage_kwh)
                .or(raw.energy_amount)
                .or(raw.amount),
            unit: if usage_kwh_unit { Some("kWh".to_string()) } else { raw.unit },
            servings: raw.servings,
            co2_kg: raw
                .co2_kg
                .or(raw.emission_kg)
                .or(raw.co2)
                .or(raw.emissions)
                .or(raw.carbon)
                .unwrap_or(0.0),
            timestamp: raw
                .timestamp
                .or(raw.created_at)
                .or(raw.date)
                .unwrap_or_default(),
            notes: raw.notes.filter(|n| !n.trim().is_empty()),
        }
    }
}

impl Activity {
    /// Emissions with negative backend values clamped to zero
    pub fn emission(&self) -> f64 {
        if self.co2_kg.is_finite() { self.co2_kg.max(0.0) } else { 0.0 }
    }

    /// Human-readable quantity, e.g. "15 km" or "12 kWh"
    pub fn quantity_label(&self) -> String {
        if let Some(distance) = self.distance_km {
            return format!("{} km", crate::utils::format_number(distance));
        }
        if let Some(usage) = self.usage {
            let unit = self.unit.as_deref().unwrap_or("kWh");
            return format!("{} {}", crate::utils::format_number(usage), unit);
        }
        if let Some(servings) = self.servings {
            return format!("{} servings", crate::utils::format_number(servings));
        }
        String::new()
    }

    pub fn matches_search(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.kind.to_lowercase().contains(&query)
            || self.category.as_str().contains(&query)
            || self
                .notes
                .as_ref()
                .map(|n| n.to_lowercase().contains(&query))
                .unwrap_or(false)
    }
}

/// Aggregate counters shown on the dashboard and activity screen
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawSummary")]
pub struct Summary {
    pub total_emissions_kg: f64,
    pub activities_logged: u64,
    pub average_kg: f64,
}

#[derive(Deserialize)]
struct RawSummary {
    #[serde(default)]
    total_emissions_kg: Option<f64>,
    #[serde(default)]
    total_emissions: Option<f64>,
    #[serde(default)]
    total_co2: Option<f64>,
    #[serde(default)]
    activities_logged: Option<u64>,
    #[serde(default)]
    total_activities: Option<u64>,
    #[serde(default)]
    activity_count: Option<u64>,
    #[serde(default)]
    count: Option<u64>,
    #[serde(default)]
    average_kg: Option<f64>,
    #[serde(default)]
    average_impact: Option<f64>,
    #[serde(default)]
    average: Option<f64>,
}

impl From<RawSummary> for Summary {
    fn from(raw: RawSummary) -> Self {
        let total = raw
            .total_emissions_kg
            .or(raw.total_emissions)
            .or(raw.total_co2)
            .unwrap_or(0.0)
            .max(0.0);
        let count = raw
            .activities_logged
            .or(raw.total_activities)
            .or(raw.activity_count)
            .or(raw.count)
            .unwrap_or(0);
        let average = raw
            .average_kg
            .or(raw.average_impact)
            .or(raw.average)
            .unwrap_or_else(|| if count > 0 { total / count as f64 } else { 0.0 });
        Self {
            total_emissions_kg: total,
            activities_logged: count,
            average_kg: average,
        }
    }
}

impl Summary {
    /// Derive a summary from a full activity list
    pub fn from_activities(activities: &[Activity]) -> Self {
        let total: f64 = activities.iter().map(Activity::emission).sum();
        let count = activities.len() as u64;
        Self {
            total_emissions_kg: total,
            activities_logged: count,
            average_kg: if count > 0 { total / count as f64 } else { 0.0 },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, deserialize_with = "deserialize_optional_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, alias = "weeklyGoal", alias = "weekly_goal", skip_serializing_if = "Option::is_none")]
    pub weekly_goal_kg: Option<f64>,
}

impl User {
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() { &self.email } else { &self.name }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Result of a login or registration
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekly_goal: Option<f64>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.weekly_goal.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

/// Chatbot answer; the text field name differs between backend versions
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub reply: String,
    pub conversation_id: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct RawChatReply {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    reply: Option<String>,
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    conversation_id: Option<String>,
}

impl RawChatReply {
    pub(crate) fn into_reply(self) -> Option<ChatReply> {
        let reply = self.response.or(self.reply).or(self.answer).or(self.message)?;
        Some(ChatReply {
            reply,
            conversation_id: self.conversation_id,
        })
    }
}

/// A single line in the assistant panel
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub content: String,
    pub from_bot: bool,
}

impl ChatMessage {
    pub fn user(content: String) -> Self {
        Self { content, from_bot: false }
    }

    pub fn bot(content: String) -> Self {
        Self { content, from_bot: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(default, alias = "_id", alias = "conversation_id", deserialize_with = "deserialize_optional_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "updated_at")]
    pub created_at: Option<String>,
    #[serde(default, alias = "last_message")]
    pub preview: Option<String>,
}

/// Recommendations come back either as plain strings or as titled entries
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Recommendation {
    Text(String),
    Detailed {
        #[serde(alias = "tip", alias = "name")]
        title: String,
        #[serde(default)]
        description: Option<String>,
    },
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recommendation::Text(text) => f.write_str(text),
            Recommendation::Detailed { title, description: Some(d) } => write!(f, "{}: {}", title, d),
            Recommendation::Detailed { title, description: None } => f.write_str(title),
        }
    }
}

/// A geocoded point from the backend passthrough
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawLocation")]
pub struct GeoLocation {
    pub lat: f64,
    pub lng: f64,
    pub address: Option<String>,
}

#[derive(Deserialize)]
struct RawLocation {
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    lng: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    formatted_address: Option<String>,
}

impl From<RawLocation> for GeoLocation {
    fn from(raw: RawLocation) -> Self {
        Self {
            lat: raw.lat.or(raw.latitude).unwrap_or(0.0),
            lng: raw.lng.or(raw.lon).or(raw.longitude).unwrap_or(0.0),
            address: raw.address.or(raw.formatted_address).or(raw.display_name),
        }
    }
}
