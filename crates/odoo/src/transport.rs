use std::time::Duration;

use async_trait::async_trait;
use leadbridge_core::{OdooStruct, OdooValue};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};

use crate::errors::TransportError;
use crate::xmlrpc::{decode_response, encode_call, MethodResponse};

/// Tenant and login used on every backend exchange.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub database: String,
    pub username: String,
    pub password: SecretString,
}

/// One `execute_kw` invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectCall {
    pub model: String,
    pub method: String,
    pub args: Vec<OdooValue>,
    pub kwargs: OdooStruct,
}

impl ObjectCall {
    pub fn new(
        model: impl Into<String>,
        method: impl Into<String>,
        args: Vec<OdooValue>,
        kwargs: OdooStruct,
    ) -> Self {
        Self { model: model.into(), method: method.into(), args, kwargs }
    }
}

/// The three backend entry points the gateway needs.
#[async_trait]
pub trait OdooTransport: Send + Sync {
    /// `Ok(None)` when the backend rejects the credentials.
    async fn authenticate(&self, credentials: &Credentials) -> Result<Option<i64>, TransportError>;

    async fn version(&self) -> Result<OdooValue, TransportError>;

    async fn execute_kw(
        &self,
        credentials: &Credentials,
        uid: i64,
        call: ObjectCall,
    ) -> Result<OdooValue, TransportError>;
}

/// XML-RPC over HTTP against `{base_url}/xmlrpc/2/{common,object}`.
pub struct XmlRpcTransport {
    client: Client,
    base_url: String,
}

impl XmlRpcTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string() })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn call(
        &self,
        service: &str,
        method: &str,
        params: &[OdooValue],
    ) -> Result<OdooValue, TransportError> {
        let response = self
            .client
            .post(format!("{}/xmlrpc/2/{service}", self.base_url))
            .header("content-type", "text/xml")
            .body(encode_call(method, params))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(TransportError::Status { status: status.as_u16(), body });
        }

        match decode_response(&body)? {
            MethodResponse::Success(value) => Ok(value),
            MethodResponse::Fault { code, message } => Err(TransportError::Fault { code, message }),
        }
    }
}

#[async_trait]
impl OdooTransport for XmlRpcTransport {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Option<i64>, TransportError> {
        let result = self
            .call(
                "common",
                "authenticate",
                &[
                    OdooValue::from(credentials.database.as_str()),
                    OdooValue::from(credentials.username.as_str()),
                    OdooValue::from(credentials.password.expose_secret()),
                    OdooValue::Struct(OdooStruct::new()),
                ],
            )
            .await?;
        Ok(result.as_i64().filter(|uid| *uid > 0))
    }

    async fn version(&self) -> Result<OdooValue, TransportError> {
        self.call("common", "version", &[]).await
    }

    async fn execute_kw(
        &self,
        credentials: &Credentials,
        uid: i64,
        call: ObjectCall,
    ) -> Result<OdooValue, TransportError> {
        self.call(
            "object",
            "execute_kw",
            &[
                OdooValue::from(credentials.database.as_str()),
                OdooValue::Int(uid),
                OdooValue::from(credentials.password.expose_secret()),
                OdooValue::String(call.model),
                OdooValue::String(call.method),
                OdooValue::Array(call.args),
                OdooValue::Struct(call.kwargs),
            ],
        )
        .await
    }
}
