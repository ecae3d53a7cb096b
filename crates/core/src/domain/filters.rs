//! Search filters for the two record types and their domain builders.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::domain::criteria::{Criterion, Domain, Operator};
use crate::domain::lead::{LeadPriority, LeadType};
use crate::errors::ValidationError;
use crate::value::OdooValue;

pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 500;

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

fn default_active() -> bool {
    true
}

fn check_limit(limit: u32) -> Result<(), ValidationError> {
    if limit == 0 || limit > MAX_LIMIT {
        return Err(ValidationError::invalid("limit", format!("must be within 1..={MAX_LIMIT}")));
    }
    Ok(())
}

fn text(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LeadSearchFilters {
    #[serde(default)]
    pub stage_id: Option<i64>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub team_id: Option<i64>,
    #[serde(default, rename = "type")]
    pub lead_type: Option<LeadType>,
    #[serde(default)]
    pub priority: Option<LeadPriority>,
    #[serde(default)]
    pub email_from: Option<String>,
    #[serde(default)]
    pub partner_name: Option<String>,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country_id: Option<i64>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

impl Default for LeadSearchFilters {
    fn default() -> Self {
        Self {
            stage_id: None,
            user_id: None,
            team_id: None,
            lead_type: None,
            priority: None,
            email_from: None,
            partner_name: None,
            contact_name: None,
            city: None,
            country_id: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl LeadSearchFilters {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_limit(self.limit)
    }

    /// Equality terms first, then partial matches, in declaration order.
    pub fn domain(&self) -> Domain {
        let mut domain = Domain::new();
        if let Some(stage_id) = self.stage_id {
            domain.push(Criterion::eq("stage_id", stage_id));
        }
        if let Some(user_id) = self.user_id {
            domain.push(Criterion::eq("user_id", user_id));
        }
        if let Some(team_id) = self.team_id {
            domain.push(Criterion::eq("team_id", team_id));
        }
        if let Some(lead_type) = self.lead_type {
            domain.push(Criterion::eq("type", lead_type.as_str()));
        }
        if let Some(priority) = self.priority {
            domain.push(Criterion::eq("priority", priority.as_str()));
        }
        if let Some(email) = text(&self.email_from) {
            domain.push(Criterion::ilike("email_from", email));
        }
        if let Some(partner_name) = text(&self.partner_name) {
            domain.push(Criterion::ilike("partner_name", partner_name));
        }
        if let Some(contact_name) = text(&self.contact_name) {
            domain.push(Criterion::ilike("contact_name", contact_name));
        }
        if let Some(city) = text(&self.city) {
            domain.push(Criterion::ilike("city", city));
        }
        if let Some(country_id) = self.country_id {
            domain.push(Criterion::eq("country_id", country_id));
        }
        domain
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PartnerSearchFilters {
    #[serde(default)]
    pub is_company: Option<bool>,
    #[serde(default)]
    pub customer_rank: Option<i64>,
    #[serde(default)]
    pub supplier_rank: Option<i64>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country_id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

impl Default for PartnerSearchFilters {
    fn default() -> Self {
        Self {
            is_company: None,
            customer_rank: None,
            supplier_rank: None,
            user_id: None,
            category_id: None,
            city: None,
            country_id: None,
            name: None,
            email: None,
            active: true,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl PartnerSearchFilters {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_limit(self.limit)
    }

    /// Always starts with the `active` term.
    pub fn domain(&self) -> Domain {
        let mut domain = vec![Criterion::eq("active", self.active)];
        if let Some(is_company) = self.is_company {
            domain.push(Criterion::eq("is_company", is_company));
        }
        if let Some(rank) = self.customer_rank {
            domain.push(Criterion::new("customer_rank", Operator::Ge, rank));
        }
        if let Some(rank) = self.supplier_rank {
            domain.push(Criterion::new("supplier_rank", Operator::Ge, rank));
        }
        if let Some(user_id) = self.user_id {
            domain.push(Criterion::eq("user_id", user_id));
        }
        if let Some(category_id) = self.category_id {
            domain.push(Criterion::new(
                "category_id",
                Operator::In,
                OdooValue::Array(vec![OdooValue::Int(category_id)]),
            ));
        }
        if let Some(city) = text(&self.city) {
            domain.push(Criterion::ilike("city", city));
        }
        if let Some(country_id) = self.country_id {
            domain.push(Criterion::eq("country_id", country_id));
        }
        if let Some(name) = text(&self.name) {
            domain.push(Criterion::ilike("name", name));
        }
        if let Some(email) = text(&self.email) {
            domain.push(Criterion::ilike("email", email));
        }
        domain
    }
}

#[cfg(test)]
mod tests {
    use super::{LeadSearchFilters, PartnerSearchFilters};
    use crate::domain::criteria::{Criterion, Operator};
    use crate::domain::lead::LeadType;

    #[test]
    fn empty_lead_filters_produce_unfiltered_domain_with_default_page() {
        let filters: LeadSearchFilters = serde_json::from_str("{}").expect("defaults");
        assert!(filters.domain().is_empty());
        assert_eq!(filters.limit, 10);
        assert_eq!(filters.offset, 0);
    }

    #[test]
    fn lead_text_filters_use_partial_match() {
        let filters = LeadSearchFilters {
            city: Some("Bogotá".to_string()),
            lead_type: Some(LeadType::Lead),
            email_from: Some("   ".to_string()),
            ..LeadSearchFilters::default()
        };

        assert_eq!(
            filters.domain(),
            vec![Criterion::eq("type", "lead"), Criterion::ilike("city", "Bogotá")]
        );
    }

    #[test]
    fn partner_domain_always_carries_active() {
        let filters = PartnerSearchFilters::default();
        assert_eq!(filters.domain(), vec![Criterion::eq("active", true)]);
    }

    #[test]
    fn partner_ranks_are_lower_bounds_and_category_is_membership() {
        let filters = PartnerSearchFilters {
            customer_rank: Some(1),
            category_id: Some(4),
            ..PartnerSearchFilters::default()
        };
        let domain = filters.domain();

        assert_eq!(domain[1].operator, Operator::Ge);
        assert_eq!(domain[2].operator, Operator::In);
        assert_eq!(domain[2].value.ids(), vec![4]);
    }

    #[test]
    fn zero_or_oversized_limit_is_rejected() {
        let zero = LeadSearchFilters { limit: 0, ..LeadSearchFilters::default() };
        assert!(zero.validate().is_err());
        let huge = PartnerSearchFilters { limit: 10_000, ..PartnerSearchFilters::default() };
        assert!(huge.validate().is_err());
    }
}
