use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Output columns, in file order
pub const RECORD_COLUMNS: [&str; 7] = [
    "good_name",
    "price",
    "old_price",
    "id",
    "category",
    "category_label",
    "date",
];

/// One scraped product record
///
/// Every field is always present in the serialized row; a field the page did
/// not provide is `None` and serializes as an empty cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "good_name")]
    pub name: Option<String>,

    pub price: Option<String>,

    pub old_price: Option<String>,

    #[serde(rename = "id")]
    pub external_id: Option<String>,

    #[serde(rename = "category")]
    pub category_name: String,

    pub category_label: Option<String>,

    pub date: NaiveDate,
}
