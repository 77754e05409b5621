//! Platform-neutral listing record
//!
//! One `ListingRecord` describes a single inventory item independently of
//! any marketplace. Adapters translate it to and from platform wire
//! formats; the record itself never carries platform-specific fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ValidationError;

/// Item condition, platform-neutral
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    New,
    LikeNew,
    Excellent,
    Good,
    Fair,
    Poor,
}

impl Condition {
    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Condition::New => "New",
            Condition::LikeNew => "Like New",
            Condition::Excellent => "Excellent",
            Condition::Good => "Good",
            Condition::Fair => "Fair",
            Condition::Poor => "Poor",
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Condition {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "new" => Ok(Condition::New),
            "like_new" => Ok(Condition::LikeNew),
            "excellent" => Ok(Condition::Excellent),
            "good" => Ok(Condition::Good),
            "fair" => Ok(Condition::Fair),
            "poor" => Ok(Condition::Poor),
            _ => Err(ValidationError::UnknownCondition(s.to_string())),
        }
    }
}

/// Item category, platform-neutral
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Clothing,
    Shoes,
    Accessories,
    Bags,
    Other,
}

impl Category {
    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            Category::Clothing => "Clothing",
            Category::Shoes => "Shoes",
            Category::Accessories => "Accessories",
            Category::Bags => "Bags",
            Category::Other => "Other",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Category {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "clothing" => Ok(Category::Clothing),
            "shoes" => Ok(Category::Shoes),
            "accessories" => Ok(Category::Accessories),
            "bags" => Ok(Category::Bags),
            "other" => Ok(Category::Other),
            _ => Err(ValidationError::UnknownCategory(s.to_string())),
        }
    }
}

/// A normalized price: amount plus ISO currency code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in major units
    pub amount: f64,

    /// ISO 4217 currency code
    pub currency: String,
}

impl Price {
    /// Create a new price
    pub fn new(amount: f64, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }
}

/// Listing lifecycle status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    /// Live on at least one platform, or awaiting its first creation
    #[default]
    Active,
    /// Removed from every platform
    Deleted,
}

/// The platform-neutral representation of one inventory item
///
/// The `remote_ids` map holds one entry per platform on which creation
/// has been confirmed successful, keyed by platform name. It is the one
/// piece of state mutated by multiple flows; callers serialize updates
/// per listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    /// Caller-assigned inventory identifier
    pub id: String,

    /// Listing title
    pub title: String,

    /// Listing description
    pub description: String,

    /// Asking price
    pub price: Price,

    /// Item condition
    pub condition: Condition,

    /// Item category
    pub category: Category,

    /// Brand name, if known
    pub brand: Option<String>,

    /// Size label, if applicable
    pub size: Option<String>,

    /// Available quantity
    pub quantity: u32,

    /// Ordered photo references
    #[serde(default)]
    pub photos: Vec<String>,

    /// Platform name to confirmed remote listing identifier
    #[serde(default)]
    pub remote_ids: HashMap<String, String>,

    /// Lifecycle status
    #[serde(default)]
    pub status: ListingStatus,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl ListingRecord {
    /// Create a new active listing record
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        price: Price,
        condition: Condition,
        category: Category,
        quantity: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            price,
            condition,
            category,
            brand: None,
            size: None,
            quantity,
            photos: Vec::new(),
            remote_ids: HashMap::new(),
            status: ListingStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the brand
    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    /// Set the size
    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }

    /// Set the photo references
    pub fn with_photos(mut self, photos: Vec<String>) -> Self {
        self.photos = photos;
        self
    }

    /// Validate structure before any dispatch
    ///
    /// Checks required text fields, non-negative price and quantity, and
    /// the photo bound. Quantity is unsigned so only the price can go
    /// negative here.
    pub fn validate(&self, max_photos: usize) -> Result<(), ValidationError> {
        if self.id.trim().is_empty() {
            return Err(ValidationError::MissingField("id"));
        }
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingField("title"));
        }
        if self.description.trim().is_empty() {
            return Err(ValidationError::MissingField("description"));
        }
        if self.price.amount < 0.0 {
            return Err(ValidationError::NegativePrice(self.price.amount));
        }
        if self.photos.len() > max_photos {
            return Err(ValidationError::TooManyPhotos {
                count: self.photos.len(),
                max: max_photos,
            });
        }
        Ok(())
    }

    /// Remote listing identifier on a platform, if creation succeeded there
    pub fn remote_id(&self, platform: &str) -> Option<&str> {
        self.remote_ids.get(platform).map(String::as_str)
    }

    /// Record a confirmed remote identifier for a platform
    pub fn record_remote_id(&mut self, platform: impl Into<String>, remote_id: impl Into<String>) {
        self.remote_ids.insert(platform.into(), remote_id.into());
        self.status = ListingStatus::Active;
        self.touch();
    }

    /// Remove a platform's remote identifier after a confirmed delete
    ///
    /// Returns true if an entry was removed. When the last entry goes,
    /// the record becomes logically deleted.
    pub fn clear_remote_id(&mut self, platform: &str) -> bool {
        let removed = self.remote_ids.remove(platform).is_some();
        if removed {
            if self.remote_ids.is_empty() {
                self.status = ListingStatus::Deleted;
            }
            self.touch();
        }
        removed
    }

    /// Update the mutation timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Partial field set for listing updates
///
/// Only set fields are pushed to platforms; unset fields are untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub quantity: Option<u32>,
    pub condition: Option<Condition>,
}

impl ListingPatch {
    /// True when no field is set
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.quantity.is_none()
            && self.condition.is_none()
    }

    /// Apply the set fields to a stored record
    pub fn apply_to(&self, record: &mut ListingRecord) {
        if let Some(title) = &self.title {
            record.title = title.clone();
        }
        if let Some(description) = &self.description {
            record.description = description.clone();
        }
        if let Some(price) = self.price {
            record.price.amount = price;
        }
        if let Some(quantity) = self.quantity {
            record.quantity = quantity;
        }
        if let Some(condition) = self.condition {
            record.condition = condition;
        }
        record.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> ListingRecord {
        ListingRecord::new(
            "item-001",
            "Vintage denim jacket",
            "Levi's trucker jacket, lightly worn",
            Price::new(250.0, "USD"),
            Condition::Good,
            Category::Clothing,
            1,
        )
    }

    // Test 1: New record starts active with an empty remote-id map
    #[test]
    fn test_new_record_defaults() {
        let record = sample_record();

        assert_eq!(record.status, ListingStatus::Active);
        assert!(record.remote_ids.is_empty());
        assert!(record.photos.is_empty());
        assert_eq!(record.quantity, 1);
    }

    // Test 2: Valid record passes validation
    #[test]
    fn test_validate_ok() {
        let record = sample_record();
        assert!(record.validate(10).is_ok());
    }

    // Test 3: Empty required fields fail validation
    #[test]
    fn test_validate_missing_fields() {
        let mut record = sample_record();
        record.title = "  ".to_string();
        assert_eq!(
            record.validate(10),
            Err(ValidationError::MissingField("title"))
        );

        let mut record = sample_record();
        record.description = String::new();
        assert_eq!(
            record.validate(10),
            Err(ValidationError::MissingField("description"))
        );
    }

    // Test 4: Negative price fails validation
    #[test]
    fn test_validate_negative_price() {
        let mut record = sample_record();
        record.price.amount = -10.0;
        assert_eq!(record.validate(10), Err(ValidationError::NegativePrice(-10.0)));
    }

    // Test 5: Zero price is allowed
    #[test]
    fn test_validate_zero_price() {
        let mut record = sample_record();
        record.price.amount = 0.0;
        assert!(record.validate(10).is_ok());
    }

    // Test 6: Photo bound is enforced
    #[test]
    fn test_validate_photo_bound() {
        let record = sample_record()
            .with_photos((0..11).map(|i| format!("https://img/{}.jpg", i)).collect());

        assert_eq!(
            record.validate(10),
            Err(ValidationError::TooManyPhotos { count: 11, max: 10 })
        );
        assert!(record.validate(11).is_ok());
    }

    // Test 7: Recording and clearing remote ids drives lifecycle status
    #[test]
    fn test_remote_id_lifecycle() {
        let mut record = sample_record();

        record.record_remote_id("mercari", "m-123");
        record.record_remote_id("vinted", "v-456");
        assert_eq!(record.remote_id("mercari"), Some("m-123"));
        assert_eq!(record.remote_id("vinted"), Some("v-456"));
        assert_eq!(record.status, ListingStatus::Active);

        assert!(record.clear_remote_id("mercari"));
        assert_eq!(record.status, ListingStatus::Active);

        assert!(record.clear_remote_id("vinted"));
        assert_eq!(record.status, ListingStatus::Deleted);

        // Clearing an absent entry is a no-op
        assert!(!record.clear_remote_id("vinted"));
    }

    // Test 8: Patch application only touches set fields
    #[test]
    fn test_patch_apply() {
        let mut record = sample_record();
        let patch = ListingPatch {
            price: Some(199.0),
            quantity: Some(2),
            ..Default::default()
        };

        patch.apply_to(&mut record);

        assert!((record.price.amount - 199.0).abs() < f64::EPSILON);
        assert_eq!(record.quantity, 2);
        assert_eq!(record.title, "Vintage denim jacket");
        assert_eq!(record.condition, Condition::Good);
    }

    // Test 9: Empty patch detection
    #[test]
    fn test_patch_is_empty() {
        assert!(ListingPatch::default().is_empty());
        assert!(!ListingPatch {
            title: Some("New title".to_string()),
            ..Default::default()
        }
        .is_empty());
    }

    // Test 10: Condition parsing accepts labels and snake case
    #[test]
    fn test_condition_from_str() {
        assert_eq!("New".parse::<Condition>().unwrap(), Condition::New);
        assert_eq!("Like New".parse::<Condition>().unwrap(), Condition::LikeNew);
        assert_eq!("like_new".parse::<Condition>().unwrap(), Condition::LikeNew);
        assert_eq!("GOOD".parse::<Condition>().unwrap(), Condition::Good);
        assert!("Mint".parse::<Condition>().is_err());
    }

    // Test 11: Category parsing
    #[test]
    fn test_category_from_str() {
        assert_eq!("Shoes".parse::<Category>().unwrap(), Category::Shoes);
        assert_eq!("bags".parse::<Category>().unwrap(), Category::Bags);
        assert!("Furniture".parse::<Category>().is_err());
    }

    // Test 12: Serde round-trip preserves the record
    #[test]
    fn test_serde_round_trip() {
        let mut record = sample_record().with_brand("Levi's").with_size("M");
        record.record_remote_id("mercari", "m-123");

        let json = serde_json::to_string(&record).unwrap();
        let back: ListingRecord = serde_json::from_str(&json).unwrap();

        assert_eq!(back, record);
    }
}
