//! Predefined query catalog: each entry binds a form (or plain link) to a
//! named SQL template.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Value, json};

use crate::db::QueryParams;
use crate::error::ValidationError;
use crate::routes::Route;

pub const DEFAULT_MAX_PRICE: f64 = 1_000_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Number,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CatalogField {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub placeholder: &'static str,
    pub default: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dispatch {
    /// One statement, rows returned directly.
    Single,
    /// `;`-separated script, rows from the last row-producing statement.
    Sequential,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Inputs {
    None,
    PriceSearch,
    Text {
        field: &'static str,
        default: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub key: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub template: &'static str,
    #[serde(skip)]
    pub segment: &'static str,
    pub fields: &'static [CatalogField],
    pub dispatch: Dispatch,
    #[serde(skip)]
    inputs: Inputs,
}

impl CatalogEntry {
    #[must_use]
    pub fn route(&self) -> Route {
        Route::CatalogQuery(self.segment)
    }

    #[must_use]
    pub fn is_form(&self) -> bool {
        !self.fields.is_empty()
    }

    /// Validates raw form input and turns it into bound parameters plus the
    /// criteria echoed next to the results. Runs before any connection opens.
    pub fn prepare(&self, input: &CatalogInput) -> Result<PreparedQuery, ValidationError> {
        match self.inputs {
            Inputs::None => Ok(PreparedQuery {
                params: QueryParams::new(),
                criteria: BTreeMap::from([("q".to_string(), json!(self.title))]),
            }),
            Inputs::PriceSearch => {
                let name = input.text("name");
                let range = PriceRange::parse(input.text("min_price"), input.text("max_price"))?;
                let pattern = (!name.is_empty()).then(|| format!("%{name}%"));

                Ok(PreparedQuery {
                    params: QueryParams::new()
                        .with("name", pattern)
                        .with("min_price", range.min)
                        .with("max_price", range.max),
                    criteria: BTreeMap::from([
                        ("name".to_string(), json!(name)),
                        ("min".to_string(), json!(range.min)),
                        ("max".to_string(), json!(range.max)),
                    ]),
                })
            }
            Inputs::Text { field, default } => {
                let value = Some(input.text(field))
                    .filter(|value| !value.is_empty())
                    .unwrap_or(default);

                Ok(PreparedQuery {
                    params: QueryParams::new().with_text(field, value),
                    criteria: BTreeMap::from([(field.to_string(), json!(value))]),
                })
            }
        }
    }
}

/// Raw form values keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogInput(BTreeMap<String, String>);

impl CatalogInput {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Trimmed value, empty when the field was not submitted.
    #[must_use]
    pub fn text(&self, name: &str) -> &str {
        self.0.get(name).map_or("", |value| value.trim())
    }
}

impl FromIterator<(String, String)> for CatalogInput {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreparedQuery {
    pub params: QueryParams,
    pub criteria: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

impl PriceRange {
    /// Blank bounds default to `0` and [`DEFAULT_MAX_PRICE`].
    pub fn parse(min: &str, max: &str) -> Result<Self, ValidationError> {
        let min = parse_price("min_price", min.trim(), 0.0)?;
        let max = parse_price("max_price", max.trim(), DEFAULT_MAX_PRICE)?;

        if min < 0.0 || max < 0.0 {
            return Err(ValidationError::PriceRange(
                "prices must not be negative".to_string(),
            ));
        }
        if min > max {
            return Err(ValidationError::PriceRange(format!(
                "minimum {min} is greater than maximum {max}"
            )));
        }
        Ok(Self { min, max })
    }
}

fn parse_price(field: &str, raw: &str, default: f64) -> Result<f64, ValidationError> {
    if raw.is_empty() {
        return Ok(default);
    }
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ValidationError::InvalidField {
            field: field.to_string(),
            reason: format!("`{raw}` is not a number"),
        }),
    }
}

const PRICE_SEARCH_FIELDS: &[CatalogField] = &[
    CatalogField {
        name: "name",
        label: "Name contains",
        kind: FieldKind::Text,
        placeholder: "e.g. brake pads",
        default: None,
    },
    CatalogField {
        name: "min_price",
        label: "Min price",
        kind: FieldKind::Number,
        placeholder: "0",
        default: None,
    },
    CatalogField {
        name: "max_price",
        label: "Max price",
        kind: FieldKind::Number,
        placeholder: "1000",
        default: None,
    },
];

const SERIES_FIELDS: &[CatalogField] = &[CatalogField {
    name: "series",
    label: "Plate series",
    kind: FieldKind::Text,
    placeholder: "HT",
    default: Some("HT"),
}];

const CONTRACT_FIELDS: &[CatalogField] = &[CatalogField {
    name: "contract",
    label: "Contract number",
    kind: FieldKind::Text,
    placeholder: "C-1001",
    default: Some("C-1001"),
}];

const fn link(
    key: &'static str,
    segment: &'static str,
    template: &'static str,
    title: &'static str,
    description: &'static str,
) -> CatalogEntry {
    CatalogEntry {
        key,
        title,
        description,
        template,
        segment,
        fields: &[],
        dispatch: Dispatch::Single,
        inputs: Inputs::None,
    }
}

pub static CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        key: "search-products",
        title: "Product search",
        description: "Filter spare parts by name and price range.",
        template: "search_products",
        segment: "run",
        fields: PRICE_SEARCH_FIELDS,
        dispatch: Dispatch::Single,
        inputs: Inputs::PriceSearch,
    },
    link(
        "all-products",
        "all",
        "products",
        "All products",
        "The full spare parts catalog.",
    ),
    link(
        "hired-march-2020",
        "simple/1",
        "simple_1_hired_march2020",
        "Staff hired in March 2020",
        "Who joined the team during the spring intake.",
    ),
    link(
        "hired-last-10-days",
        "simple/2",
        "simple_2_hired_last10",
        "Staff hired in the last 10 days",
        "New specialists from the last ten days.",
    ),
    CatalogEntry {
        key: "plates-by-series",
        title: "Plates by series",
        description: "Vehicle registration plates of one series.",
        template: "simple_3_plates_by_series",
        segment: "simple/3",
        fields: SERIES_FIELDS,
        dispatch: Dispatch::Single,
        inputs: Inputs::Text {
            field: "series",
            default: "HT",
        },
    },
    link(
        "waybills-march-2020",
        "simple/4",
        "simple_4_ttn_count_march2020",
        "Waybills issued in March 2020",
        "How many waybills were written out.",
    ),
    link(
        "weight-by-client-2020",
        "simple/5",
        "simple_5_total_weight_2020",
        "Shipment weight by client, 2020",
        "Total shipped weight per client for 2020.",
    ),
    link(
        "youngest-employee",
        "simple/6",
        "simple_6_youngest_birthdate",
        "Youngest employee",
        "The most recently born specialist.",
    ),
    link(
        "waybill-report",
        "hard/1",
        "hard_1_report_ttn",
        "Waybill report",
        "Summary of issued waybills.",
    ),
    CatalogEntry {
        key: "contract-staff",
        title: "Staff on a client contract",
        description: "Who served the chosen contract in March 2020.",
        template: "hard_2_staff_for_client_contract_march2020",
        segment: "hard/2",
        fields: CONTRACT_FIELDS,
        dispatch: Dispatch::Single,
        inputs: Inputs::Text {
            field: "contract",
            default: "C-1001",
        },
    },
    link(
        "heaviest-client-march-2020",
        "hard/3",
        "hard_3_max_weight_client_march2020",
        "Heaviest client, March 2020",
        "Who ordered the most weight in March.",
    ),
    link(
        "staff-never-issued",
        "hard/4",
        "hard_4_staff_never_issued",
        "Staff without waybills",
        "Employees who never issued a waybill.",
    ),
    link(
        "staff-idle-march-2020",
        "hard/5",
        "hard_5_staff_not_march2020",
        "No waybills in March 2020",
        "Employees without shipments in March 2020.",
    ),
    CatalogEntry {
        key: "most-frequent-client-2020",
        title: "Most frequent client, 2020",
        description: "The client with the most shipments of the year.",
        template: "hard_6_view_most_frequent_2020",
        segment: "hard/6",
        fields: &[],
        dispatch: Dispatch::Sequential,
        inputs: Inputs::None,
    },
];

#[must_use]
pub fn find_entry(key: &str) -> Option<&'static CatalogEntry> {
    CATALOG.iter().find(|entry| entry.key == key)
}
