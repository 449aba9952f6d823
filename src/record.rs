use std::fmt;

use serde::Deserialize;

pub const CUSTOMER_ID_FIELD: &str = "Customer_ID__c";
pub const NAME_FIELD: &str = "Name";
pub const STAGE_FIELD: &str = "Stage__c";
pub const PRODUCT_FIELD: &str = "Product__c";

// Field order used by the table, the export and the clipboard.
pub const RECORD_FIELDS: [&str; 4] = [CUSTOMER_ID_FIELD, NAME_FIELD, STAGE_FIELD, PRODUCT_FIELD];

/// A single customer row as served by the backend. Identity is `customer_id`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Record {
    #[serde(rename = "Customer_ID__c", default)]
    pub customer_id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Stage__c", default)]
    pub stage: String,
    #[serde(rename = "Product__c", default)]
    pub product: String,
}

impl Record {
    pub fn new(
        customer_id: impl Into<String>,
        name: impl Into<String>,
        stage: impl Into<String>,
        product: impl Into<String>,
    ) -> Self {
        Record {
            customer_id: customer_id.into(),
            name: name.into(),
            stage: stage.into(),
            product: product.into(),
        }
    }

    pub fn value(&self, field: SortField) -> &str {
        match field {
            SortField::CustomerId => &self.customer_id,
            SortField::Name => &self.name,
            SortField::Stage => &self.stage,
            SortField::Product => &self.product,
        }
    }

    pub fn values(&self) -> [&str; 4] {
        [&self.customer_id, &self.name, &self.stage, &self.product]
    }
}

/// The declared (and sortable) columns of the customer table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    CustomerId,
    #[default]
    Name,
    Stage,
    Product,
}

impl SortField {
    pub const ALL: [SortField; 4] = [
        SortField::CustomerId,
        SortField::Name,
        SortField::Stage,
        SortField::Product,
    ];

    pub fn field_name(&self) -> &'static str {
        match self {
            SortField::CustomerId => CUSTOMER_ID_FIELD,
            SortField::Name => NAME_FIELD,
            SortField::Stage => STAGE_FIELD,
            SortField::Product => PRODUCT_FIELD,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SortField::CustomerId => "Customer ID",
            SortField::Name => "Name",
            SortField::Stage => "Stage",
            SortField::Product => "Product",
        }
    }

    pub fn from_index(idx: usize) -> Option<SortField> {
        SortField::ALL.get(idx).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    pub fn arrow(&self) -> &'static str {
        match self {
            SortDirection::Asc => "▲",
            SortDirection::Desc => "▼",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage filter. `All` is sent to the backend as an empty string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StageFilter {
    #[default]
    All,
    Booked,
    BranchQueue,
    OpsQueue,
}

impl StageFilter {
    pub const OPTIONS: [StageFilter; 4] = [
        StageFilter::All,
        StageFilter::Booked,
        StageFilter::BranchQueue,
        StageFilter::OpsQueue,
    ];

    pub fn value(&self) -> &'static str {
        match self {
            StageFilter::All => "",
            StageFilter::Booked => "Booked",
            StageFilter::BranchQueue => "Branch Queue",
            StageFilter::OpsQueue => "OPS Queue",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StageFilter::All => "All",
            other => other.value(),
        }
    }

    /// Stage value to match, `None` when no filter is active.
    pub fn stage(&self) -> Option<&'static str> {
        match self {
            StageFilter::All => None,
            other => Some(other.value()),
        }
    }

    /// Accepts a label or value, ignoring case and surrounding whitespace.
    pub fn parse(input: &str) -> Option<StageFilter> {
        let input = input.trim();
        StageFilter::OPTIONS.into_iter().find(|f| {
            f.value().eq_ignore_ascii_case(input) || f.label().eq_ignore_ascii_case(input)
        })
    }

    pub fn next(&self) -> StageFilter {
        let idx = StageFilter::OPTIONS
            .iter()
            .position(|f| f == self)
            .unwrap_or(0);
        StageFilter::OPTIONS[(idx + 1) % StageFilter::OPTIONS.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_uses_backend_field_names() {
        let json =
            r#"{"Customer_ID__c":"C1","Name":"Alice","Stage__c":"Booked","Product__c":"Loan"}"#;
        let record: Record = serde_json::from_str(json).unwrap();
        assert_eq!(record, Record::new("C1", "Alice", "Booked", "Loan"));
        assert_eq!(record.value(SortField::Stage), "Booked");
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let record: Record = serde_json::from_str(r#"{"Customer_ID__c":"C2"}"#).unwrap();
        assert_eq!(record.name, "");
        assert_eq!(record.values(), ["C2", "", "", ""]);
    }

    #[test]
    fn filter_parses_labels_and_values() {
        assert_eq!(StageFilter::parse(""), Some(StageFilter::All));
        assert_eq!(StageFilter::parse("all"), Some(StageFilter::All));
        assert_eq!(StageFilter::parse(" ops queue "), Some(StageFilter::OpsQueue));
        assert_eq!(StageFilter::parse("Branch Queue"), Some(StageFilter::BranchQueue));
        assert_eq!(StageFilter::parse("Closed"), None);
    }

    #[test]
    fn filter_cycles_through_all_options() {
        let mut filter = StageFilter::All;
        for expected in [
            StageFilter::Booked,
            StageFilter::BranchQueue,
            StageFilter::OpsQueue,
            StageFilter::All,
        ] {
            filter = filter.next();
            assert_eq!(filter, expected);
        }
    }

    #[test]
    fn sort_fields_map_to_columns() {
        assert_eq!(SortField::from_index(0), Some(SortField::CustomerId));
        assert_eq!(SortField::from_index(4), None);
        assert_eq!(SortField::default().field_name(), "Name");
    }
}
