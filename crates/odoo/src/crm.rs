//! CRM operations over leads, partners and the reference collections.
//!
//! Each operation returns a typed `Result<CrmOutcome, CrmError>`; surfaces
//! turn it into an `OperationResult` envelope.

use std::sync::Arc;

use leadbridge_core::{
    CrmModel, CrmOutcome, Criterion, Lead, LeadSearchFilters, MutationMode, OdooStruct, OdooValue,
    Partner, PartnerSearchFilters,
};
use tracing::info;

use crate::errors::CrmError;
use crate::gateway::{OdooGateway, SearchOptions};

pub const LEAD_FIELDS: &[&str] = &[
    "id",
    "name",
    "contact_name",
    "partner_name",
    "email_from",
    "phone",
    "mobile",
    "website",
    "function",
    "street",
    "city",
    "zip",
    "country_id",
    "state_id",
    "user_id",
    "team_id",
    "stage_id",
    "priority",
    "expected_revenue",
    "probability",
    "description",
    "type",
    "create_date",
    "write_date",
    "x_studio_programa_academico",
    "x_studio_canal_de_contacto",
    "x_studio_programa_de_interes",
    "progress",
    "manage_reason",
    "action_request_lead",
];

/// Returned after a lead is created or updated.
pub const LEAD_SUMMARY_FIELDS: &[&str] =
    &["id", "name", "contact_name", "partner_name", "email_from", "create_date", "write_date"];

pub const PARTNER_FIELDS: &[&str] = &[
    "id",
    "name",
    "display_name",
    "email",
    "phone",
    "mobile",
    "website",
    "is_company",
    "parent_id",
    "street",
    "street2",
    "city",
    "zip",
    "country_id",
    "state_id",
    "function",
    "title",
    "category_id",
    "user_id",
    "vat",
    "ref",
    "lang",
    "active",
    "customer_rank",
    "supplier_rank",
    "create_date",
    "write_date",
];

pub const PARTNER_SUMMARY_FIELDS: &[&str] =
    &["id", "name", "display_name", "email", "is_company", "create_date", "write_date"];

const STAGE_FIELDS: &[&str] = &["id", "name", "sequence", "fold", "team_id"];
const TEAM_FIELDS: &[&str] = &["id", "name", "user_id", "member_ids"];
const COUNTRY_FIELDS: &[&str] = &["id", "name", "code"];
const COUNTRY_LIMIT: u32 = 250;

#[derive(Clone)]
pub struct CrmService {
    gateway: Arc<OdooGateway>,
}

impl CrmService {
    pub fn new(gateway: Arc<OdooGateway>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &OdooGateway {
        &self.gateway
    }

    pub async fn get_leads(&self, filters: &LeadSearchFilters) -> Result<CrmOutcome, CrmError> {
        filters.validate()?;
        let domain = filters.domain();
        let model = CrmModel::Lead.as_str();

        let total = self.gateway.search_count(model, &domain).await?;
        let options = SearchOptions::fields(LEAD_FIELDS)
            .limit(filters.limit)
            .offset(filters.offset)
            .order("create_date desc");
        let leads = self.gateway.search_read(model, &domain, &options).await?;

        let message = format!("Found {} leads of {total} total", leads.len());
        Ok(CrmOutcome::new(record_list(leads)).with_count(total).with_message(message))
    }

    pub async fn create_lead(&self, lead: &Lead) -> Result<CrmOutcome, CrmError> {
        let payload = lead.to_mutation_payload(MutationMode::Create)?;
        let id = self.gateway.create(CrmModel::Lead.as_str(), payload).await?;
        info!(event_name = "crm.lead.created", lead_id = id, "lead created");

        let record = self.summary(CrmModel::Lead, id, LEAD_SUMMARY_FIELDS).await?;
        Ok(CrmOutcome::new(record).with_message(format!("Lead created with ID {id}")))
    }

    pub async fn update_lead(&self, id: i64, lead: &Lead) -> Result<CrmOutcome, CrmError> {
        let payload = lead.to_mutation_payload(MutationMode::Update)?;
        self.apply_update(CrmModel::Lead, id, payload, LEAD_SUMMARY_FIELDS).await
    }

    /// Full field set of one lead, used by the summary and suggestion tools.
    pub async fn read_lead(&self, id: i64) -> Result<OdooStruct, CrmError> {
        self.gateway
            .read(CrmModel::Lead.as_str(), &[id], LEAD_FIELDS)
            .await?
            .into_iter()
            .next()
            .ok_or(CrmError::NotFound { model: CrmModel::Lead, id })
    }

    pub async fn get_partners(
        &self,
        filters: &PartnerSearchFilters,
    ) -> Result<CrmOutcome, CrmError> {
        filters.validate()?;
        let domain = filters.domain();
        let model = CrmModel::Partner.as_str();

        let total = self.gateway.search_count(model, &domain).await?;
        let options = SearchOptions::fields(PARTNER_FIELDS)
            .limit(filters.limit)
            .offset(filters.offset)
            .order("name asc");
        let partners = self.gateway.search_read(model, &domain, &options).await?;

        let message = format!("Found {} partners of {total} total", partners.len());
        Ok(CrmOutcome::new(record_list(partners)).with_count(total).with_message(message))
    }

    pub async fn create_partner(&self, partner: &Partner) -> Result<CrmOutcome, CrmError> {
        let payload = partner.to_mutation_payload(MutationMode::Create)?;
        let id = self.gateway.create(CrmModel::Partner.as_str(), payload).await?;
        info!(event_name = "crm.partner.created", partner_id = id, "partner created");

        let record = self.summary(CrmModel::Partner, id, PARTNER_SUMMARY_FIELDS).await?;
        Ok(CrmOutcome::new(record).with_message(format!("Partner created with ID {id}")))
    }

    pub async fn update_partner(&self, id: i64, partner: &Partner) -> Result<CrmOutcome, CrmError> {
        let payload = partner.to_mutation_payload(MutationMode::Update)?;
        self.apply_update(CrmModel::Partner, id, payload, PARTNER_SUMMARY_FIELDS).await
    }

    pub async fn get_crm_stages(&self) -> Result<CrmOutcome, CrmError> {
        let stages = self
            .gateway
            .search_read("crm.stage", &[], &SearchOptions::fields(STAGE_FIELDS))
            .await?;
        let message = format!("Found {} stages", stages.len());
        let count = stages.len() as i64;
        Ok(CrmOutcome::new(record_list(stages)).with_count(count).with_message(message))
    }

    pub async fn get_crm_teams(&self) -> Result<CrmOutcome, CrmError> {
        let teams = self
            .gateway
            .search_read("crm.team", &[], &SearchOptions::fields(TEAM_FIELDS))
            .await?;
        let message = format!("Found {} teams", teams.len());
        let count = teams.len() as i64;
        Ok(CrmOutcome::new(record_list(teams)).with_count(count).with_message(message))
    }

    pub async fn get_countries(&self) -> Result<CrmOutcome, CrmError> {
        let countries = self
            .gateway
            .search_read(
                "res.country",
                &[],
                &SearchOptions::fields(COUNTRY_FIELDS).limit(COUNTRY_LIMIT),
            )
            .await?;
        let message = format!("Found {} countries", countries.len());
        let count = countries.len() as i64;
        Ok(CrmOutcome::new(record_list(countries)).with_count(count).with_message(message))
    }

    /// Reads the session user back to prove the uid is usable.
    pub async fn test_connection(&self) -> Result<CrmOutcome, CrmError> {
        let uid = self.gateway.uid();
        let user = self
            .gateway
            .read("res.users", &[uid], &["name", "login"])
            .await?
            .into_iter()
            .next()
            .map(OdooValue::Struct)
            .unwrap_or(OdooValue::Bool(false));

        let mut data = OdooStruct::new();
        data.insert("uid".to_string(), OdooValue::Int(uid));
        data.insert("database".to_string(), OdooValue::from(self.gateway.database()));
        data.insert("user".to_string(), user);

        let message = format!("Connected to Odoo as {}", self.gateway.username());
        Ok(CrmOutcome::new(OdooValue::Struct(data)).with_message(message))
    }

    async fn apply_update(
        &self,
        model: CrmModel,
        id: i64,
        payload: OdooStruct,
        summary_fields: &[&str],
    ) -> Result<CrmOutcome, CrmError> {
        let existing = self
            .gateway
            .search(model.as_str(), &[Criterion::eq("id", id)], &SearchOptions::default().limit(1))
            .await?;
        if existing.is_empty() {
            return Err(CrmError::NotFound { model, id });
        }

        if !self.gateway.write(model.as_str(), &[id], payload).await? {
            return Err(CrmError::NotApplied { model, id });
        }
        info!(event_name = "crm.record.updated", model = %model, record_id = id, "record updated");

        let record = self.summary(model, id, summary_fields).await?;
        Ok(CrmOutcome::new(record).with_message(format!("{} {id} updated", model.label())))
    }

    async fn summary(
        &self,
        model: CrmModel,
        id: i64,
        fields: &[&str],
    ) -> Result<OdooValue, CrmError> {
        let record = self.gateway.read(model.as_str(), &[id], fields).await?.into_iter().next();
        Ok(match record {
            Some(record) => OdooValue::Struct(record),
            None => {
                let mut fallback = OdooStruct::new();
                fallback.insert("id".to_string(), OdooValue::Int(id));
                OdooValue::Struct(fallback)
            }
        })
    }
}

fn record_list(records: Vec<OdooStruct>) -> OdooValue {
    OdooValue::Array(records.into_iter().map(OdooValue::Struct).collect())
}
