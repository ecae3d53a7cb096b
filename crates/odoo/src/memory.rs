//! In-process stand-in for an Odoo backend.
//!
//! Evaluates search domains over seeded records, resolves many2one ids to
//! `[id, name]` pairs on read, and records every `execute_kw` call so tests
//! can assert on what reached the backend.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use leadbridge_core::normalize::TIMESTAMP_FORMAT;
use leadbridge_core::{OdooStruct, OdooValue};
use secrecy::ExposeSecret;
use tokio::sync::Mutex;

use crate::errors::TransportError;
use crate::transport::{Credentials, ObjectCall, OdooTransport};

const SUPPORTED_OPERATORS: &[&str] =
    &["=", "!=", "ilike", "not ilike", "in", "not in", ">", "<", ">=", "<="];

const MAGIC_FIELDS: &[&str] = &["id", "create_date", "write_date", "display_name"];

struct ModelSchema {
    name: &'static str,
    fields: &'static [&'static str],
    relations: &'static [(&'static str, &'static str)],
}

const SCHEMAS: &[ModelSchema] = &[
    ModelSchema {
        name: "crm.lead",
        fields: &[
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
            "active",
            "x_studio_programa_academico",
            "x_studio_canal_de_contacto",
            "x_studio_programa_de_interes",
            "progress",
            "manage_reason",
            "action_request_lead",
        ],
        relations: &[
            ("country_id", "res.country"),
            ("user_id", "res.users"),
            ("team_id", "crm.team"),
            ("stage_id", "crm.stage"),
        ],
    },
    ModelSchema {
        name: "res.partner",
        fields: &[
            "name",
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
        ],
        relations: &[
            ("parent_id", "res.partner"),
            ("country_id", "res.country"),
            ("user_id", "res.users"),
        ],
    },
    ModelSchema {
        name: "crm.stage",
        fields: &["name", "sequence", "fold", "team_id"],
        relations: &[("team_id", "crm.team")],
    },
    ModelSchema {
        name: "crm.team",
        fields: &["name", "user_id", "member_ids"],
        relations: &[("user_id", "res.users")],
    },
    ModelSchema { name: "res.country", fields: &["name", "code"], relations: &[] },
    ModelSchema { name: "res.users", fields: &["name", "login"], relations: &[] },
];

impl ModelSchema {
    fn find(model: &str) -> Option<&'static ModelSchema> {
        SCHEMAS.iter().find(|schema| schema.name == model)
    }

    fn has_field(&self, field: &str) -> bool {
        MAGIC_FIELDS.contains(&field) || self.fields.contains(&field)
    }

    fn comodel(&self, field: &str) -> Option<&'static str> {
        self.relations.iter().find(|(name, _)| *name == field).map(|(_, comodel)| *comodel)
    }

    fn defaults(&self) -> Vec<(&'static str, OdooValue)> {
        match self.name {
            "crm.lead" => vec![
                ("active", OdooValue::Bool(true)),
                ("type", OdooValue::from("lead")),
                ("priority", OdooValue::from("0")),
            ],
            "res.partner" => vec![
                ("active", OdooValue::Bool(true)),
                ("is_company", OdooValue::Bool(false)),
                ("customer_rank", OdooValue::Int(0)),
                ("supplier_rank", OdooValue::Int(0)),
            ],
            _ => Vec::new(),
        }
    }
}

fn fault(message: impl Into<String>) -> TransportError {
    TransportError::Fault { code: 1, message: message.into() }
}

#[derive(Default)]
struct Table {
    records: BTreeMap<i64, OdooStruct>,
    next_id: i64,
}

struct Rejection {
    model: String,
    method: String,
    message: String,
}

#[derive(Default)]
struct MemoryState {
    tables: BTreeMap<String, Table>,
    calls: Vec<ObjectCall>,
    rejections: Vec<Rejection>,
    refuse_writes: bool,
}

pub struct InMemoryTransport {
    state: Mutex<MemoryState>,
    login: Option<(String, String, String)>,
    uid: i64,
    reachable: bool,
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTransport {
    /// Accepts any credentials and authenticates as uid 2.
    pub fn new() -> Self {
        Self { state: Mutex::new(MemoryState::default()), login: None, uid: 2, reachable: true }
    }

    pub fn with_login(mut self, database: &str, username: &str, password: &str) -> Self {
        self.login = Some((database.to_string(), username.to_string(), password.to_string()));
        self
    }

    /// Every exchange fails as if the host refused the connection.
    pub fn unreachable(mut self) -> Self {
        self.reachable = false;
        self
    }

    pub fn uid(&self) -> i64 {
        self.uid
    }

    /// Seeds one record. An `id` entry fixes the record id.
    pub fn with_record(mut self, model: &str, record: OdooStruct) -> Self {
        self.state.get_mut().insert(model, record);
        self
    }

    pub fn with_records(self, model: &str, records: impl IntoIterator<Item = OdooStruct>) -> Self {
        records.into_iter().fold(self, |transport, record| transport.with_record(model, record))
    }

    pub async fn calls(&self) -> Vec<ObjectCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn count_calls(&self, method: &str) -> usize {
        self.state.lock().await.calls.iter().filter(|call| call.method == method).count()
    }

    /// The stored record, with its id, exactly as the fake backend holds it.
    pub async fn record(&self, model: &str, id: i64) -> Option<OdooStruct> {
        let state = self.state.lock().await;
        let mut record = state.tables.get(model)?.records.get(&id)?.clone();
        record.insert("id".to_string(), OdooValue::Int(id));
        Some(record)
    }

    /// Makes every later `model.method` call fail with `message`.
    pub async fn reject(&self, model: &str, method: &str, message: &str) {
        self.state.lock().await.rejections.push(Rejection {
            model: model.to_string(),
            method: method.to_string(),
            message: message.to_string(),
        });
    }

    /// Makes `write` answer `false` without touching any record.
    pub async fn refuse_writes(&self) {
        self.state.lock().await.refuse_writes = true;
    }

    fn accepts(&self, credentials: &Credentials) -> bool {
        match &self.login {
            None => true,
            Some((database, username, password)) => {
                credentials.database == *database
                    && credentials.username == *username
                    && credentials.password.expose_secret() == password
            }
        }
    }

    fn ensure_reachable(&self) -> Result<(), TransportError> {
        if self.reachable {
            Ok(())
        } else {
            Err(TransportError::Http("connection refused".to_string()))
        }
    }
}

#[async_trait]
impl OdooTransport for InMemoryTransport {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Option<i64>, TransportError> {
        self.ensure_reachable()?;
        Ok(self.accepts(credentials).then_some(self.uid))
    }

    async fn version(&self) -> Result<OdooValue, TransportError> {
        self.ensure_reachable()?;
        let mut version = OdooStruct::new();
        version.insert("server_version".to_string(), OdooValue::from("16.0"));
        version.insert("server_serie".to_string(), OdooValue::from("16.0"));
        version.insert("protocol_version".to_string(), OdooValue::Int(1));
        Ok(OdooValue::Struct(version))
    }

    async fn execute_kw(
        &self,
        credentials: &Credentials,
        uid: i64,
        call: ObjectCall,
    ) -> Result<OdooValue, TransportError> {
        self.ensure_reachable()?;
        if uid != self.uid || !self.accepts(credentials) {
            return Err(fault("Access Denied"));
        }

        let mut state = self.state.lock().await;
        state.calls.push(call.clone());
        if let Some(rejection) = state
            .rejections
            .iter()
            .find(|rejection| rejection.model == call.model && rejection.method == call.method)
        {
            return Err(fault(rejection.message.clone()));
        }

        let schema = ModelSchema::find(&call.model)
            .ok_or_else(|| fault(format!("Object {} doesn't exist", call.model)))?;
        state.dispatch(schema, &call, uid)
    }
}

impl MemoryState {
    fn insert(&mut self, model: &str, mut record: OdooStruct) -> i64 {
        let table = self.tables.entry(model.to_string()).or_default();
        let id = record
            .remove("id")
            .and_then(|id| id.as_i64())
            .unwrap_or_else(|| table.next_id.max(1));
        table.next_id = table.next_id.max(id + 1);
        table.records.insert(id, record);
        id
    }

    fn dispatch(
        &mut self,
        schema: &ModelSchema,
        call: &ObjectCall,
        uid: i64,
    ) -> Result<OdooValue, TransportError> {
        let fields = requested_fields(call.kwargs.get("fields").or_else(|| call.args.get(1)));
        match call.method.as_str() {
            "search_read" => {
                let ids = self.search(schema, call.args.first(), &call.kwargs)?;
                self.read(schema, &ids, &fields)
            }
            "search" => {
                let ids = self.search(schema, call.args.first(), &call.kwargs)?;
                Ok(OdooValue::Array(ids.into_iter().map(OdooValue::Int).collect()))
            }
            "search_count" => {
                let ids = self.search(schema, call.args.first(), &OdooStruct::new())?;
                Ok(OdooValue::Int(ids.len() as i64))
            }
            "read" => {
                let ids = id_list(call.args.first())?;
                let table = self.tables.get(schema.name);
                if let Some(missing) = ids
                    .iter()
                    .find(|id| !table.is_some_and(|table| table.records.contains_key(id)))
                {
                    return Err(missing_record(schema, *missing, uid));
                }
                self.read(schema, &ids, &fields)
            }
            "create" => {
                let Some(OdooValue::Struct(values)) = call.args.first() else {
                    return Err(fault("create expects a dictionary of field values"));
                };
                let mut record = prepare_values(schema, values)?;
                for (field, value) in schema.defaults() {
                    record.entry(field.to_string()).or_insert(value);
                }
                let now = OdooValue::DateTime(Utc::now().naive_utc());
                record.insert("create_date".to_string(), now.clone());
                record.insert("write_date".to_string(), now);
                Ok(OdooValue::Int(self.insert(schema.name, record)))
            }
            "write" => {
                let ids = id_list(call.args.first())?;
                let Some(OdooValue::Struct(values)) = call.args.get(1) else {
                    return Err(fault("write expects a dictionary of field values"));
                };
                let values = prepare_values(schema, values)?;
                let refuse = self.refuse_writes;
                let table = self.tables.entry(schema.name.to_string()).or_default();
                if let Some(missing) = ids.iter().find(|id| !table.records.contains_key(id)) {
                    return Err(missing_record(schema, *missing, uid));
                }
                if refuse {
                    return Ok(OdooValue::Bool(false));
                }

                let now = OdooValue::DateTime(Utc::now().naive_utc());
                for id in &ids {
                    if let Some(record) = table.records.get_mut(id) {
                        record.extend(values.clone());
                        record.insert("write_date".to_string(), now.clone());
                    }
                }
                Ok(OdooValue::Bool(true))
            }
            other => Err(fault(format!(
                "The method '{other}' does not exist on the model '{}'",
                schema.name
            ))),
        }
    }

    fn search(
        &self,
        schema: &ModelSchema,
        domain: Option<&OdooValue>,
        kwargs: &OdooStruct,
    ) -> Result<Vec<i64>, TransportError> {
        let leaves = parse_domain(schema, domain)?;
        let order = parse_order(schema, kwargs.get("order"))?;

        let mut matched: Vec<(i64, &OdooStruct)> = self
            .tables
            .get(schema.name)
            .map(|table| {
                table
                    .records
                    .iter()
                    .filter(|(id, record)| leaves.iter().all(|leaf| leaf.matches(**id, record)))
                    .map(|(id, record)| (*id, record))
                    .collect()
            })
            .unwrap_or_default();

        matched.sort_by(|(left_id, left), (right_id, right)| {
            for (field, descending) in &order {
                let ordering = sort_cmp(
                    &field_value(*left_id, left, field),
                    &field_value(*right_id, right, field),
                );
                let ordering = if *descending { ordering.reverse() } else { ordering };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            left_id.cmp(right_id)
        });

        let offset = kwargs.get("offset").and_then(OdooValue::as_i64).unwrap_or(0).max(0) as usize;
        let limit = kwargs
            .get("limit")
            .and_then(OdooValue::as_i64)
            .filter(|limit| *limit > 0)
            .map(|limit| limit as usize)
            .unwrap_or(usize::MAX);

        Ok(matched.into_iter().skip(offset).take(limit).map(|(id, _)| id).collect())
    }

    fn read(
        &self,
        schema: &ModelSchema,
        ids: &[i64],
        fields: &[String],
    ) -> Result<OdooValue, TransportError> {
        if let Some(unknown) = fields.iter().find(|field| !schema.has_field(field)) {
            return Err(fault(format!("Invalid field '{unknown}' on model '{}'", schema.name)));
        }

        let Some(table) = self.tables.get(schema.name) else {
            return Ok(OdooValue::Array(Vec::new()));
        };
        let rows = ids
            .iter()
            .filter_map(|id| table.records.get(id).map(|record| (*id, record)))
            .map(|(id, record)| OdooValue::Struct(self.project(schema, id, record, fields)))
            .collect();
        Ok(OdooValue::Array(rows))
    }

    fn project(
        &self,
        schema: &ModelSchema,
        id: i64,
        record: &OdooStruct,
        fields: &[String],
    ) -> OdooStruct {
        let names: Vec<&str> = if fields.is_empty() {
            schema.fields.iter().copied().chain(["create_date", "write_date"]).collect()
        } else {
            fields.iter().map(String::as_str).collect()
        };

        let mut row = OdooStruct::new();
        row.insert("id".to_string(), OdooValue::Int(id));
        for name in names.into_iter().filter(|name| *name != "id") {
            let stored = if name == "display_name" {
                record.get("display_name").or_else(|| record.get("name"))
            } else {
                record.get(name)
            };
            let value = match (schema.comodel(name), stored) {
                (Some(comodel), Some(OdooValue::Int(target))) => OdooValue::Array(vec![
                    OdooValue::Int(*target),
                    OdooValue::String(self.display_name(comodel, *target)),
                ]),
                (_, Some(value)) => value.clone(),
                (_, None) => OdooValue::Bool(false),
            };
            row.insert(name.to_string(), value);
        }
        row
    }

    fn display_name(&self, model: &str, id: i64) -> String {
        self.tables
            .get(model)
            .and_then(|table| table.records.get(&id))
            .and_then(|record| record.get("name"))
            .and_then(OdooValue::as_str)
            .unwrap_or_default()
            .to_string()
    }
}

fn missing_record(schema: &ModelSchema, id: i64, uid: i64) -> TransportError {
    fault(format!(
        "Record does not exist or has been deleted.\n(Record: {}({id},), User: {uid})",
        schema.name
    ))
}

fn requested_fields(value: Option<&OdooValue>) -> Vec<String> {
    value
        .and_then(OdooValue::as_array)
        .map(|items| items.iter().filter_map(OdooValue::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

fn id_list(value: Option<&OdooValue>) -> Result<Vec<i64>, TransportError> {
    match value {
        Some(OdooValue::Int(id)) => Ok(vec![*id]),
        Some(OdooValue::Array(items)) => items
            .iter()
            .map(|item| item.as_i64().ok_or_else(|| fault("record ids must be integers")))
            .collect(),
        _ => Err(fault("expected a record id or a list of record ids")),
    }
}

/// Validates field names and unwraps `[(6, 0, ids)]` many2many commands.
fn prepare_values(schema: &ModelSchema, values: &OdooStruct) -> Result<OdooStruct, TransportError> {
    let mut prepared = OdooStruct::new();
    for (field, value) in values {
        if !schema.fields.contains(&field.as_str()) {
            return Err(fault(format!("Invalid field '{field}' on model '{}'", schema.name)));
        }
        let value = match value.as_array() {
            Some([OdooValue::Array(command)]) => match command.as_slice() {
                [OdooValue::Int(6), _, ids @ OdooValue::Array(_)] => ids.clone(),
                _ => value.clone(),
            },
            _ => value.clone(),
        };
        prepared.insert(field.clone(), value);
    }
    Ok(prepared)
}

struct Leaf {
    field: String,
    operator: String,
    value: OdooValue,
}

fn parse_domain(
    schema: &ModelSchema,
    domain: Option<&OdooValue>,
) -> Result<Vec<Leaf>, TransportError> {
    let items = match domain {
        None | Some(OdooValue::Nil) => return Ok(Vec::new()),
        Some(OdooValue::Array(items)) => items,
        Some(other) => return Err(fault(format!("Invalid domain {other:?}"))),
    };

    let mut leaves = Vec::with_capacity(items.len());
    for item in items {
        if item.as_str() == Some("&") {
            continue;
        }
        let Some([OdooValue::String(field), OdooValue::String(operator), value]) = item.as_array()
        else {
            return Err(fault(format!("Invalid leaf {item:?}")));
        };
        if !schema.has_field(field) {
            return Err(fault(format!(
                "Invalid field {}.{field} in leaf ('{field}', '{operator}', {value:?})",
                schema.name
            )));
        }
        if !SUPPORTED_OPERATORS.contains(&operator.as_str()) {
            return Err(fault(format!("Invalid leaf: unsupported operator '{operator}'")));
        }
        leaves.push(Leaf { field: field.clone(), operator: operator.clone(), value: value.clone() });
    }
    Ok(leaves)
}

fn parse_order(
    schema: &ModelSchema,
    order: Option<&OdooValue>,
) -> Result<Vec<(String, bool)>, TransportError> {
    let Some(spec) = order.and_then(OdooValue::as_str) else {
        return Ok(Vec::new());
    };

    let mut terms = Vec::new();
    for term in spec.split(',').map(str::trim).filter(|term| !term.is_empty()) {
        let mut parts = term.split_whitespace();
        let field = parts.next().unwrap_or_default();
        if !schema.has_field(field) {
            return Err(fault(format!("Invalid order field '{field}' on model '{}'", schema.name)));
        }
        let descending = parts.next().is_some_and(|direction| direction.eq_ignore_ascii_case("desc"));
        terms.push((field.to_string(), descending));
    }
    Ok(terms)
}

fn field_value(id: i64, record: &OdooStruct, field: &str) -> OdooValue {
    if field == "id" {
        return OdooValue::Int(id);
    }
    record.get(field).cloned().unwrap_or(OdooValue::Bool(false))
}

impl Leaf {
    fn matches(&self, id: i64, record: &OdooStruct) -> bool {
        let current = field_value(id, record, &self.field);
        match self.operator.as_str() {
            "=" => equals(&current, &self.value),
            "!=" => !equals(&current, &self.value),
            "ilike" => ilike(&current, &self.value),
            "not ilike" => !ilike(&current, &self.value),
            "in" => contained(&current, &self.value),
            "not in" => !contained(&current, &self.value),
            ">" => compare(&current, &self.value) == Some(Ordering::Greater),
            "<" => compare(&current, &self.value) == Some(Ordering::Less),
            ">=" => matches!(
                compare(&current, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            "<=" => {
                matches!(compare(&current, &self.value), Some(Ordering::Less | Ordering::Equal))
            }
            _ => false,
        }
    }
}

fn text(value: &OdooValue) -> Option<String> {
    match value {
        OdooValue::String(text) => Some(text.clone()),
        OdooValue::DateTime(timestamp) => Some(timestamp.format(TIMESTAMP_FORMAT).to_string()),
        _ => None,
    }
}

fn equals(current: &OdooValue, expected: &OdooValue) -> bool {
    if matches!(expected, OdooValue::Bool(false)) {
        return current.is_falsy();
    }
    match (current.as_f64(), expected.as_f64()) {
        (Some(left), Some(right)) => left == right,
        _ => match (text(current), text(expected)) {
            (Some(left), Some(right)) => left == right,
            _ => current == expected,
        },
    }
}

fn ilike(current: &OdooValue, pattern: &OdooValue) -> bool {
    match (current.as_str(), pattern.as_str()) {
        (Some(current), Some(pattern)) => {
            current.to_lowercase().contains(&pattern.trim_matches('%').to_lowercase())
        }
        _ => false,
    }
}

fn contained(current: &OdooValue, candidates: &OdooValue) -> bool {
    let Some(candidates) = candidates.as_array() else {
        return false;
    };
    match current {
        OdooValue::Array(values) => values
            .iter()
            .any(|value| candidates.iter().any(|candidate| equals(value, candidate))),
        _ => candidates.iter().any(|candidate| equals(current, candidate)),
    }
}

fn compare(current: &OdooValue, expected: &OdooValue) -> Option<Ordering> {
    if current.is_falsy() {
        return None;
    }
    match (current.as_f64(), expected.as_f64()) {
        (Some(left), Some(right)) => left.partial_cmp(&right),
        _ => match (text(current), text(expected)) {
            (Some(left), Some(right)) => Some(left.cmp(&right)),
            _ => None,
        },
    }
}

fn sort_cmp(left: &OdooValue, right: &OdooValue) -> Ordering {
    match (left.is_falsy(), right.is_falsy()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => compare(left, right).unwrap_or(Ordering::Equal),
    }
}
