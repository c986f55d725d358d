//! Eco-friendly places for the Discover tab.

use std::collections::BTreeSet;
use std::fmt;

use crate::store::{Store, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceCategory {
    Food,
    Transport,
    Shopping,
}

impl PlaceCategory {
    pub const ALL: [PlaceCategory; 3] = [PlaceCategory::Food, PlaceCategory::Transport, PlaceCategory::Shopping];

    pub fn label(&self) -> &'static str {
        match self {
            PlaceCategory::Food => "Food",
            PlaceCategory::Transport => "Transport",
            PlaceCategory::Shopping => "Shopping",
        }
    }

    /// "all" (or empty) yields Ok(None)
    pub fn parse_filter(value: &str) -> Result<Option<PlaceCategory>, String> {
        match value.trim().to_lowercase().as_str() {
            "" | "all" => Ok(None),
            "food" => Ok(Some(PlaceCategory::Food)),
            "transport" => Ok(Some(PlaceCategory::Transport)),
            "shopping" => Ok(Some(PlaceCategory::Shopping)),
            other => Err(format!("Unknown place category '{}'", other)),
        }
    }
}

impl fmt::Display for PlaceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EcoPlace {
    pub id: u32,
    pub name: &'static str,
    pub category: PlaceCategory,
    pub distance_km: f64,
    pub rating: f64,
    pub reviews: u32,
    /// CO₂ saved per visit compared to the conventional alternative
    pub co2_saved_kg: f64,
    pub description: &'static str,
    pub tags: &'static [&'static str],
    liked_by_default: bool,
}

static CATALOG: [EcoPlace; 6] = [
    EcoPlace {
        id: 1,
        name: "Green Grocers Market",
        category: PlaceCategory::Food,
        distance_km: 0.8,
        rating: 4.8,
        reviews: 234,
        co2_saved_kg: 2.5,
        description: "Organic produce and locally sourced items",
        tags: &["Organic", "Local", "Zero Waste"],
        liked_by_default: false,
    },
    EcoPlace {
        id: 2,
        name: "EcoCycle Bike Share",
        category: PlaceCategory::Transport,
        distance_km: 0.3,
        rating: 4.6,
        reviews: 189,
        co2_saved_kg: 3.2,
        description: "Electric bike rental stations citywide",
        tags: &["Electric", "Convenient", "Affordable"],
        liked_by_default: true,
    },
    EcoPlace {
        id: 3,
        name: "Solar Cafe",
        category: PlaceCategory::Food,
        distance_km: 1.2,
        rating: 4.9,
        reviews: 312,
        co2_saved_kg: 1.8,
        description: "Plant-based meals, solar-powered kitchen",
        tags: &["Vegan", "Solar", "Sustainable"],
        liked_by_default: false,
    },
    EcoPlace {
        id: 4,
        name: "Public Transit Hub",
        category: PlaceCategory::Transport,
        distance_km: 0.5,
        rating: 4.5,
        reviews: 156,
        co2_saved_kg: 4.1,
        description: "Central station with electric buses",
        tags: &["Public", "Electric", "Fast"],
        liked_by_default: false,
    },
    EcoPlace {
        id: 5,
        name: "EcoMart Superstore",
        category: PlaceCategory::Shopping,
        distance_km: 1.5,
        rating: 4.7,
        reviews: 428,
        co2_saved_kg: 2.0,
        description: "Sustainable products and refill station",
        tags: &["Bulk Buy", "Refills", "Plastic-Free"],
        liked_by_default: true,
    },
    EcoPlace {
        id: 6,
        name: "Green Wheels Carpool",
        category: PlaceCategory::Transport,
        distance_km: 0.2,
        rating: 4.8,
        reviews: 267,
        co2_saved_kg: 5.5,
        description: "Community carpooling network",
        tags: &["Carpool", "Community", "Cost-Effective"],
        liked_by_default: false,
    },
];

pub fn catalog() -> &'static [EcoPlace] {
    &CATALOG
}

pub fn find(id: u32) -> Option<&'static EcoPlace> {
    CATALOG.iter().find(|p| p.id == id)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaceFilter {
    pub category: Option<PlaceCategory>,
    pub query: String,
}

impl PlaceFilter {
    /// Category must match and the query must appear in the name or description
    pub fn matches(&self, place: &EcoPlace) -> bool {
        if self.category.is_some_and(|c| c != place.category) {
            return false;
        }
        let query = self.query.trim().to_lowercase();
        query.is_empty()
            || place.name.to_lowercase().contains(&query)
            || place.description.to_lowercase().contains(&query)
    }

    /// All -> Food -> Transport -> Shopping -> All
    pub fn cycle_category(&mut self) {
        self.category = match self.category {
            None => Some(PlaceCategory::Food),
            Some(PlaceCategory::Food) => Some(PlaceCategory::Transport),
            Some(PlaceCategory::Transport) => Some(PlaceCategory::Shopping),
            Some(PlaceCategory::Shopping) => None,
        };
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscoverStats {
    pub total: usize,
    pub saved: usize,
    pub average_rating: f64,
    /// Sum over saved places
    pub co2_saved_kg: f64,
}

/// Catalog view state: the active filter and the liked set
#[derive(Debug, Clone, PartialEq)]
pub struct Places {
    pub filter: PlaceFilter,
    liked: BTreeSet<u32>,
}

impl Default for Places {
    fn default() -> Self {
        Self::with_liked(CATALOG.iter().filter(|p| p.liked_by_default).map(|p| p.id).collect())
    }
}

impl Places {
    pub fn with_liked(liked: BTreeSet<u32>) -> Self {
        Self { filter: PlaceFilter::default(), liked }
    }

    /// Restore liked places; the catalog defaults apply until the user changes them
    pub fn load(store: &Store) -> Result<Self, StoreError> {
        Ok(match store.liked_places()? {
            Some(liked) => Self::with_liked(liked),
            None => Self::default(),
        })
    }

    pub fn is_liked(&self, id: u32) -> bool {
        self.liked.contains(&id)
    }

    pub fn liked(&self) -> &BTreeSet<u32> {
        &self.liked
    }

    /// Flip the liked state and persist it. Returns the new state.
    pub fn toggle_like(&mut self, store: &Store, id: u32) -> Result<bool, StoreError> {
        let now_liked = if self.liked.remove(&id) {
            false
        } else {
            self.liked.insert(id);
            true
        };
        store.set_liked_places(&self.liked)?;
        tracing::debug!(id, liked = now_liked, "Toggled liked place");
        Ok(now_liked)
    }

    pub fn visible(&self) -> Vec<&'static EcoPlace> {
        CATALOG.iter().filter(|p| self.filter.matches(p)).collect()
    }

    pub fn stats(&self) -> DiscoverStats {
        let total = CATALOG.len();
        let saved: Vec<&EcoPlace> = CATALOG.iter().filter(|p| self.is_liked(p.id)).collect();
        DiscoverStats {
            total,
            saved: saved.len(),
            average_rating: if total > 0 {
                CATALOG.iter().map(|p| p.rating).sum::<f64>() / total as f64
            } else {
                0.0
            },
            co2_saved_kg: saved.iter().map(|p| p.co2_saved_kg).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_nothing_stored() {
        let store = Store::in_memory().unwrap();
        let places = Places::load(&store).unwrap();
        assert!(places.is_liked(2));
        assert!(places.is_liked(5));
        assert_eq!(places.stats().saved, 2);
    }

    #[test]
    fn test_toggle_like_persists() {
        let store = Store::in_memory().unwrap();
        let mut places = Places::load(&store).unwrap();
        assert!(places.toggle_like(&store, 1).unwrap());
        assert!(!places.toggle_like(&store, 2).unwrap());

        let reloaded = Places::load(&store).unwrap();
        assert!(reloaded.is_liked(1));
        assert!(!reloaded.is_liked(2));
        assert!(reloaded.is_liked(5));
    }

    #[test]
    fn test_filter_by_category_and_search() {
        let mut places = Places::default();
        assert_eq!(places.visible().len(), 6);

        places.filter.category = Some(PlaceCategory::Transport);
        assert_eq!(places.visible().len(), 3);

        places.filter.query = "ELECTRIC".to_string();
        let names: Vec<&str> = places.visible().iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["EcoCycle Bike Share", "Public Transit Hub"]);

        places.filter.category = None;
        places.filter.query = "solar".to_string();
        assert_eq!(places.visible()[0].name, "Solar Cafe");
    }

    #[test]
    fn test_stats() {
        let stats = Places::default().stats();
        assert_eq!(stats.total, 6);
        assert!((stats.average_rating - 4.7166).abs() < 0.001);
        assert!((stats.co2_saved_kg - 5.2).abs() < 1e-9);

        let none = Places::with_liked(BTreeSet::new()).stats();
        assert_eq!(none.saved, 0);
        assert_eq!(none.co2_saved_kg, 0.0);
    }

    #[test]
    fn test_cycle_category_wraps() {
        let mut filter = PlaceFilter::default();
        for _ in 0..4 {
            filter.cycle_category();
        }
        assert_eq!(filter.category, None);
    }

    #[test]
    fn test_parse_filter() {
        assert_eq!(PlaceCategory::parse_filter("All"), Ok(None));
        assert_eq!(PlaceCategory::parse_filter("shopping"), Ok(Some(PlaceCategory::Shopping)));
        assert!(PlaceCategory::parse_filter("bars").is_err());
    }
}
