//! XML-RPC request encoding and response decoding.
//!
//! Covers the value types Odoo's `/xmlrpc/2` endpoints exchange: `int`/`i4`,
//! `boolean`, `string`, `double`, `dateTime.iso8601`, `base64`, `nil`,
//! `array` and `struct`.

use std::fmt::Write as _;

use base64::Engine;
use chrono::NaiveDateTime;
use leadbridge_core::{OdooStruct, OdooValue};
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

const DATETIME_FORMAT: &str = "%Y%m%dT%H:%M:%S";
const DATETIME_FORMAT_DASHED: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("invalid xml: {0}")]
    Xml(String),
    #[error("malformed xml-rpc document: {0}")]
    Malformed(String),
}

/// A decoded `methodResponse`.
#[derive(Clone, Debug, PartialEq)]
pub enum MethodResponse {
    Success(OdooValue),
    Fault { code: i64, message: String },
}

pub fn encode_call(method: &str, params: &[OdooValue]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\"?>\n<methodCall><methodName>");
    xml.push_str(&escape(method));
    xml.push_str("</methodName><params>");
    for param in params {
        xml.push_str("<param>");
        encode_value(param, &mut xml);
        xml.push_str("</param>");
    }
    xml.push_str("</params></methodCall>");
    xml
}

fn encode_value(value: &OdooValue, xml: &mut String) {
    xml.push_str("<value>");
    match value {
        OdooValue::Nil => xml.push_str("<nil/>"),
        OdooValue::Bool(flag) => {
            xml.push_str(if *flag { "<boolean>1</boolean>" } else { "<boolean>0</boolean>" })
        }
        OdooValue::Int(number) => {
            let _ = write!(xml, "<int>{number}</int>");
        }
        OdooValue::Double(number) => {
            let _ = write!(xml, "<double>{number}</double>");
        }
        OdooValue::String(text) => {
            xml.push_str("<string>");
            xml.push_str(&escape(text.as_str()));
            xml.push_str("</string>");
        }
        OdooValue::DateTime(timestamp) => {
            let _ = write!(
                xml,
                "<dateTime.iso8601>{}</dateTime.iso8601>",
                timestamp.format(DATETIME_FORMAT)
            );
        }
        OdooValue::Base64(bytes) => {
            xml.push_str("<base64>");
            xml.push_str(&base64::engine::general_purpose::STANDARD.encode(bytes));
            xml.push_str("</base64>");
        }
        OdooValue::Array(items) => {
            xml.push_str("<array><data>");
            for item in items {
                encode_value(item, xml);
            }
            xml.push_str("</data></array>");
        }
        OdooValue::Struct(fields) => {
            xml.push_str("<struct>");
            for (name, field) in fields {
                xml.push_str("<member><name>");
                xml.push_str(&escape(name.as_str()));
                xml.push_str("</name>");
                encode_value(field, xml);
                xml.push_str("</member>");
            }
            xml.push_str("</struct>");
        }
    }
    xml.push_str("</value>");
}

#[derive(Debug, Default)]
struct Node {
    name: String,
    children: Vec<Node>,
    text: String,
}

impl Node {
    fn child(&self, name: &str) -> Result<&Node, CodecError> {
        self.children.iter().find(|child| child.name == name).ok_or_else(|| {
            CodecError::Malformed(format!("<{}> has no <{name}> element", self.name))
        })
    }
}

fn parse_tree(xml: &str) -> Result<Node, CodecError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Node> = Vec::new();
    let mut root: Option<Node> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => stack.push(Node {
                name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
                ..Node::default()
            }),
            Ok(Event::Empty(start)) => {
                let node = Node {
                    name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
                    ..Node::default()
                };
                attach(&mut stack, &mut root, node)?;
            }
            Ok(Event::End(_)) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| CodecError::Malformed("unbalanced closing tag".to_string()))?;
                attach(&mut stack, &mut root, node)?;
            }
            Ok(Event::Text(text)) => {
                if let Some(current) = stack.last_mut() {
                    let unescaped =
                        text.unescape().map_err(|error| CodecError::Xml(error.to_string()))?;
                    current.text.push_str(&unescaped);
                }
            }
            Ok(Event::CData(data)) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(error) => return Err(CodecError::Xml(error.to_string())),
        }
    }

    if !stack.is_empty() {
        return Err(CodecError::Malformed("document ended inside an element".to_string()));
    }
    root.ok_or_else(|| CodecError::Malformed("empty document".to_string()))
}

fn attach(stack: &mut [Node], root: &mut Option<Node>, node: Node) -> Result<(), CodecError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None if root.is_none() => *root = Some(node),
        None => return Err(CodecError::Malformed("multiple root elements".to_string())),
    }
    Ok(())
}

pub fn decode_response(xml: &str) -> Result<MethodResponse, CodecError> {
    let root = parse_tree(xml)?;
    if root.name != "methodResponse" {
        return Err(CodecError::Malformed(format!("unexpected root <{}>", root.name)));
    }

    if let Ok(fault) = root.child("fault") {
        let value = decode_value(fault.child("value")?)?;
        let code = value.get("faultCode").and_then(OdooValue::as_i64).unwrap_or_default();
        let message = value
            .get("faultString")
            .and_then(OdooValue::as_str)
            .unwrap_or("unknown fault")
            .to_string();
        return Ok(MethodResponse::Fault { code, message });
    }

    let param = root.child("params")?.child("param")?;
    Ok(MethodResponse::Success(decode_value(param.child("value")?)?))
}

fn decode_value(node: &Node) -> Result<OdooValue, CodecError> {
    let Some(typed) = node.children.first() else {
        return Ok(OdooValue::String(node.text.clone()));
    };
    let text = typed.text.trim();

    match typed.name.as_str() {
        "int" | "i4" | "i8" => text
            .parse::<i64>()
            .map(OdooValue::Int)
            .map_err(|_| CodecError::Malformed(format!("`{text}` is not an integer"))),
        "boolean" => match text {
            "1" | "true" => Ok(OdooValue::Bool(true)),
            "0" | "false" => Ok(OdooValue::Bool(false)),
            other => Err(CodecError::Malformed(format!("`{other}` is not a boolean"))),
        },
        "string" => Ok(OdooValue::String(typed.text.clone())),
        "double" => text
            .parse::<f64>()
            .map(OdooValue::Double)
            .map_err(|_| CodecError::Malformed(format!("`{text}` is not a double"))),
        "dateTime.iso8601" => NaiveDateTime::parse_from_str(text, DATETIME_FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(text, DATETIME_FORMAT_DASHED))
            .map(OdooValue::DateTime)
            .map_err(|_| CodecError::Malformed(format!("`{text}` is not a dateTime.iso8601"))),
        "base64" => {
            let compact: String = text.chars().filter(|ch| !ch.is_whitespace()).collect();
            base64::engine::general_purpose::STANDARD
                .decode(compact)
                .map(OdooValue::Base64)
                .map_err(|error| CodecError::Malformed(format!("invalid base64: {error}")))
        }
        "nil" => Ok(OdooValue::Nil),
        "array" => {
            let data = typed.child("data")?;
            data.children
                .iter()
                .filter(|child| child.name == "value")
                .map(decode_value)
                .collect::<Result<Vec<_>, _>>()
                .map(OdooValue::Array)
        }
        "struct" => {
            let mut fields = OdooStruct::new();
            for member in typed.children.iter().filter(|child| child.name == "member") {
                let name = member.child("name")?.text.clone();
                fields.insert(name, decode_value(member.child("value")?)?);
            }
            Ok(OdooValue::Struct(fields))
        }
        other => Err(CodecError::Malformed(format!("unknown value type <{other}>"))),
    }
}
