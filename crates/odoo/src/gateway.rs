use std::sync::Arc;
use std::time::Duration;

use leadbridge_core::config::OdooConfig;
use leadbridge_core::domain::criteria::domain_value;
use leadbridge_core::{Criterion, OdooStruct, OdooValue};
use tracing::{debug, info, warn};

use crate::errors::GatewayError;
use crate::fixtures;
use crate::transport::{Credentials, ObjectCall, OdooTransport, XmlRpcTransport};

/// Options for `search_read` and `search`.
#[derive(Clone, Debug, Default)]
pub struct SearchOptions {
    pub fields: Vec<String>,
    pub limit: Option<u32>,
    pub offset: u32,
    pub order: Option<String>,
}

impl SearchOptions {
    pub fn fields(fields: &[&str]) -> Self {
        Self { fields: fields.iter().map(|field| field.to_string()).collect(), ..Self::default() }
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    pub fn order(mut self, order: &str) -> Self {
        self.order = Some(order.to_string());
        self
    }

    fn kwargs(&self) -> OdooStruct {
        let mut kwargs = OdooStruct::new();
        if !self.fields.is_empty() {
            kwargs.insert("fields".to_string(), string_list(&self.fields));
        }
        if let Some(limit) = self.limit {
            kwargs.insert("limit".to_string(), OdooValue::from(limit));
        }
        if self.offset > 0 {
            kwargs.insert("offset".to_string(), OdooValue::from(self.offset));
        }
        if let Some(order) = &self.order {
            kwargs.insert("order".to_string(), OdooValue::from(order.as_str()));
        }
        kwargs
    }
}

/// An authenticated session against one Odoo database.
///
/// Only [`OdooGateway::connect`] produces a value, so every method runs with
/// a valid uid. The session is never refreshed.
pub struct OdooGateway {
    transport: Arc<dyn OdooTransport>,
    credentials: Credentials,
    uid: i64,
}

impl std::fmt::Debug for OdooGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OdooGateway")
            .field("database", &self.credentials.database)
            .field("username", &self.credentials.username)
            .field("uid", &self.uid)
            .finish_non_exhaustive()
    }
}

impl OdooGateway {
    pub async fn connect(
        transport: Arc<dyn OdooTransport>,
        credentials: Credentials,
    ) -> Result<Self, GatewayError> {
        let uid = match transport.authenticate(&credentials).await {
            Ok(Some(uid)) => uid,
            Ok(None) => {
                warn!(
                    event_name = "odoo.gateway.auth_rejected",
                    database = %credentials.database,
                    username = %credentials.username,
                    "odoo rejected the configured credentials"
                );
                return Err(GatewayError::Connection(format!(
                    "authentication failed for user `{}` on database `{}`",
                    credentials.username, credentials.database
                )));
            }
            Err(error) => {
                warn!(
                    event_name = "odoo.gateway.unreachable",
                    error = %error,
                    "odoo authentication exchange failed"
                );
                return Err(GatewayError::Connection(error.to_string()));
            }
        };

        info!(
            event_name = "odoo.gateway.connected",
            database = %credentials.database,
            username = %credentials.username,
            uid,
            "connected to odoo"
        );
        Ok(Self { transport, credentials, uid })
    }

    /// Builds the transport `config` asks for and connects through it.
    pub async fn from_config(config: &OdooConfig) -> Result<Self, GatewayError> {
        let credentials = Credentials {
            database: config.database.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        };

        let transport: Arc<dyn OdooTransport> = if config.mock {
            info!(event_name = "odoo.gateway.mock_mode", "serving demo records from memory");
            Arc::new(fixtures::demo_transport())
        } else {
            let transport =
                XmlRpcTransport::new(&config.url, Duration::from_secs(config.timeout_secs))
                    .map_err(|error| GatewayError::Connection(error.to_string()))?;
            Arc::new(transport)
        };

        Self::connect(transport, credentials).await
    }

    pub fn uid(&self) -> i64 {
        self.uid
    }

    pub fn database(&self) -> &str {
        &self.credentials.database
    }

    pub fn username(&self) -> &str {
        &self.credentials.username
    }

    pub async fn invoke(
        &self,
        model: &str,
        method: &str,
        args: Vec<OdooValue>,
        kwargs: OdooStruct,
    ) -> Result<OdooValue, GatewayError> {
        debug!(event_name = "odoo.gateway.call", model, method, "calling odoo");
        let call = ObjectCall::new(model, method, args, kwargs);
        self.transport.execute_kw(&self.credentials, self.uid, call).await.map_err(|error| {
            warn!(
                event_name = "odoo.gateway.call_failed",
                model,
                method,
                error = %error,
                "odoo call failed"
            );
            GatewayError::from_call(model, method, error)
        })
    }

    pub async fn search_read(
        &self,
        model: &str,
        domain: &[Criterion],
        options: &SearchOptions,
    ) -> Result<Vec<OdooStruct>, GatewayError> {
        let result =
            self.invoke(model, "search_read", vec![domain_value(domain)], options.kwargs()).await?;
        records("search_read", result)
    }

    pub async fn search(
        &self,
        model: &str,
        domain: &[Criterion],
        options: &SearchOptions,
    ) -> Result<Vec<i64>, GatewayError> {
        let mut kwargs = options.kwargs();
        kwargs.remove("fields");
        let result = self.invoke(model, "search", vec![domain_value(domain)], kwargs).await?;
        ids("search", result)
    }

    pub async fn search_count(&self, model: &str, domain: &[Criterion]) -> Result<i64, GatewayError> {
        let result = self
            .invoke(model, "search_count", vec![domain_value(domain)], OdooStruct::new())
            .await?;
        result.as_i64().ok_or_else(|| unexpected("search_count", "expected an integer", &result))
    }

    pub async fn read(
        &self,
        model: &str,
        ids: &[i64],
        fields: &[&str],
    ) -> Result<Vec<OdooStruct>, GatewayError> {
        let mut kwargs = OdooStruct::new();
        kwargs.insert(
            "fields".to_string(),
            OdooValue::Array(fields.iter().map(|field| OdooValue::from(*field)).collect()),
        );
        let result = self.invoke(model, "read", vec![id_list(ids)], kwargs).await?;
        records("read", result)
    }

    pub async fn create(&self, model: &str, values: OdooStruct) -> Result<i64, GatewayError> {
        let result =
            self.invoke(model, "create", vec![OdooValue::Struct(values)], OdooStruct::new()).await?;
        result.as_i64().ok_or_else(|| unexpected("create", "expected the new record id", &result))
    }

    /// `Ok(false)` when the backend answers without applying the write.
    pub async fn write(
        &self,
        model: &str,
        ids: &[i64],
        values: OdooStruct,
    ) -> Result<bool, GatewayError> {
        let result = self
            .invoke(model, "write", vec![id_list(ids), OdooValue::Struct(values)], OdooStruct::new())
            .await?;
        result.as_bool().ok_or_else(|| unexpected("write", "expected a boolean", &result))
    }

    pub async fn server_version(&self) -> Result<OdooValue, GatewayError> {
        self.transport.version().await.map_err(|error| GatewayError::Transport(error.to_string()))
    }
}

fn string_list(items: &[String]) -> OdooValue {
    OdooValue::Array(items.iter().map(|item| OdooValue::from(item.as_str())).collect())
}

fn id_list(ids: &[i64]) -> OdooValue {
    OdooValue::Array(ids.iter().copied().map(OdooValue::Int).collect())
}

fn unexpected(method: &str, detail: &str, value: &OdooValue) -> GatewayError {
    GatewayError::UnexpectedResult {
        method: method.to_string(),
        detail: format!("{detail}, got {value:?}"),
    }
}

fn records(method: &str, value: OdooValue) -> Result<Vec<OdooStruct>, GatewayError> {
    let OdooValue::Array(items) = value else {
        return Err(unexpected(method, "expected a list of records", &value));
    };
    items
        .into_iter()
        .map(|item| match item {
            OdooValue::Struct(fields) => Ok(fields),
            other => Err(unexpected(method, "expected a record", &other)),
        })
        .collect()
}

fn ids(method: &str, value: OdooValue) -> Result<Vec<i64>, GatewayError> {
    let OdooValue::Array(items) = &value else {
        return Err(unexpected(method, "expected a list of ids", &value));
    };
    items
        .iter()
        .map(|item| item.as_i64().ok_or_else(|| unexpected(method, "expected an integer id", item)))
        .collect()
}
