use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;
use crate::schema::{mutation_payload, require_name, MaybeSet, MutationMode};
use crate::value::{OdooStruct, OdooValue};

/// Many2many "replace the whole set" command.
const REPLACE_LINKS: i64 = 6;

/// A `res.partner` record as the caller intends to write it.
///
/// `active`, `customer_rank` and `supplier_rank` are only sent when supplied;
/// the backend applies `true` / `0` / `0` on create.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Partner {
    pub id: Option<i64>,
    pub name: MaybeSet<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub mobile: Option<String>,
    pub website: Option<String>,
    pub is_company: Option<bool>,
    pub parent_id: Option<i64>,
    pub street: Option<String>,
    pub street2: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
    pub country_id: Option<i64>,
    pub state_id: Option<i64>,
    pub function: Option<String>,
    pub title: Option<i64>,
    pub category_id: Option<Vec<i64>>,
    pub user_id: Option<i64>,
    pub vat: Option<String>,
    #[serde(rename = "ref")]
    pub reference: Option<String>,
    pub lang: Option<String>,
    pub active: Option<bool>,
    pub customer_rank: Option<i64>,
    pub supplier_rank: Option<i64>,
}

impl Partner {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: MaybeSet::Set(name.into()), ..Self::default() }
    }

    pub fn validate(&self, mode: MutationMode) -> Result<(), ValidationError> {
        require_name(&self.name, mode)?;
        for (field, rank) in [("customer_rank", self.customer_rank), ("supplier_rank", self.supplier_rank)]
        {
            if rank.is_some_and(|rank| rank < 0) {
                return Err(ValidationError::invalid(field, "must not be negative"));
            }
        }
        Ok(())
    }

    pub fn to_mutation_payload(&self, mode: MutationMode) -> Result<OdooStruct, ValidationError> {
        self.validate(mode)?;
        let mut payload = mutation_payload(self)?;
        if let Some(category_ids) = &self.category_id {
            let ids = category_ids.iter().copied().map(OdooValue::Int).collect();
            payload.insert(
                "category_id".to_string(),
                OdooValue::Array(vec![OdooValue::Array(vec![
                    OdooValue::Int(REPLACE_LINKS),
                    OdooValue::Int(0),
                    OdooValue::Array(ids),
                ])]),
            );
        }
        if mode == MutationMode::Update && payload.is_empty() {
            return Err(ValidationError::invalid("fields", "at least one field must be supplied"));
        }
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::Partner;
    use crate::schema::MutationMode;
    use crate::value::OdooValue;

    #[test]
    fn create_payload_skips_unsupplied_defaults() {
        let partner = Partner { email: Some("ops@acme.test".to_string()), ..Partner::named("Acme") };
        let payload = partner.to_mutation_payload(MutationMode::Create).expect("payload");
        let keys: Vec<&str> = payload.keys().map(String::as_str).collect();

        assert_eq!(keys, vec!["email", "name"]);
    }

    #[test]
    fn update_never_resets_ranks_implicitly() {
        let partner = Partner { phone: Some("+57 1".to_string()), ..Partner::default() };
        let payload = partner.to_mutation_payload(MutationMode::Update).expect("payload");

        assert!(!payload.contains_key("customer_rank"));
        assert!(!payload.contains_key("supplier_rank"));
        assert!(!payload.contains_key("name"));
    }

    #[test]
    fn categories_are_sent_as_replace_command() {
        let partner = Partner { category_id: Some(vec![2, 5]), ..Partner::named("Acme") };
        let payload = partner.to_mutation_payload(MutationMode::Create).expect("payload");

        assert_eq!(payload.get("category_id"), Some(&OdooValue::from(json!([[6, 0, [2, 5]]]))));
    }

    #[test]
    fn ref_field_keeps_backend_name() {
        let partner: Partner =
            serde_json::from_str(r#"{"name": "Acme", "ref": "C-001"}"#).expect("parses");
        let payload = partner.to_mutation_payload(MutationMode::Create).expect("payload");
        assert_eq!(payload.get("ref"), Some(&OdooValue::from("C-001")));
    }

    #[test]
    fn negative_rank_is_rejected() {
        let partner = Partner { supplier_rank: Some(-1), ..Partner::named("Acme") };
        assert!(partner.to_mutation_payload(MutationMode::Create).is_err());
    }
}
