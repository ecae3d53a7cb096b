//! Demo records served in mock mode.

use chrono::NaiveDate;
use leadbridge_core::{OdooStruct, OdooValue};

use crate::memory::InMemoryTransport;

/// Builds a record from `(field, value)` pairs.
pub fn record<const N: usize>(fields: [(&str, OdooValue); N]) -> OdooStruct {
    fields.into_iter().map(|(field, value)| (field.to_string(), value)).collect()
}

/// A backend timestamp on a fixed day of May 2024.
pub fn timestamp(day: u32, hour: u32) -> OdooValue {
    NaiveDate::from_ymd_opt(2024, 5, day)
        .and_then(|date| date.and_hms_opt(hour, 0, 0))
        .map(OdooValue::DateTime)
        .unwrap_or(OdooValue::Bool(false))
}

pub fn demo_transport() -> InMemoryTransport {
    InMemoryTransport::new()
        .with_records("res.users", users())
        .with_records("res.country", countries())
        .with_records("crm.team", teams())
        .with_records("crm.stage", stages())
        .with_records("crm.lead", leads())
        .with_records("res.partner", partners())
}

fn users() -> Vec<OdooStruct> {
    vec![
        record([
            ("id", OdooValue::Int(2)),
            ("name", OdooValue::from("Admisiones Bot")),
            ("login", OdooValue::from("bot@demo.test")),
        ]),
        record([
            ("id", OdooValue::Int(6)),
            ("name", OdooValue::from("Laura Gómez")),
            ("login", OdooValue::from("laura@demo.test")),
        ]),
    ]
}

fn countries() -> Vec<OdooStruct> {
    [(49, "Colombia", "CO"), (156, "Mexico", "MX"), (68, "Spain", "ES"), (173, "Peru", "PE")]
        .into_iter()
        .map(|(id, name, code)| {
            record([
                ("id", OdooValue::Int(id)),
                ("name", OdooValue::from(name)),
                ("code", OdooValue::from(code)),
            ])
        })
        .collect()
}

fn teams() -> Vec<OdooStruct> {
    vec![
        record([
            ("id", OdooValue::Int(1)),
            ("name", OdooValue::from("Pregrado")),
            ("user_id", OdooValue::Int(6)),
            ("member_ids", OdooValue::Array(vec![OdooValue::Int(2), OdooValue::Int(6)])),
        ]),
        record([
            ("id", OdooValue::Int(2)),
            ("name", OdooValue::from("Posgrado")),
            ("user_id", OdooValue::Int(6)),
            ("member_ids", OdooValue::Array(vec![OdooValue::Int(6)])),
        ]),
    ]
}

fn stages() -> Vec<OdooStruct> {
    [(1, "Nuevo", 1, false), (2, "Contactado", 2, false), (3, "Inscrito", 3, false), (4, "Perdido", 4, true)]
        .into_iter()
        .map(|(id, name, sequence, fold)| {
            record([
                ("id", OdooValue::Int(id)),
                ("name", OdooValue::from(name)),
                ("sequence", OdooValue::Int(sequence)),
                ("fold", OdooValue::Bool(fold)),
                ("team_id", OdooValue::Bool(false)),
            ])
        })
        .collect()
}

fn leads() -> Vec<OdooStruct> {
    let rows: [(&str, &str, &str, Option<&str>, i64, &str); 8] = [
        ("Maestría en Analítica", "Camila Rojas", "Bogotá", Some("+57 300 111 2233"), 1, "Maestría en Analítica de Datos"),
        ("Especialización Finanzas", "Andrés Pardo", "Bogotá", None, 2, "Especialización en Finanzas"),
        ("Pregrado Ingeniería", "Valentina Ruiz", "Medellín", Some("+57 310 555 0101"), 1, "Ingeniería de Sistemas"),
        ("Doctorado Educación", "Julián Castro", "Cali", None, 3, "Doctorado en Educación"),
        ("MBA Ejecutivo", "Paula Herrera", "Bogotá", Some("+57 315 222 9090"), 2, "MBA"),
        ("Diplomado Marketing", "Santiago López", "Barranquilla", None, 1, "Marketing Digital"),
        ("Maestría Derecho", "Mariana Díaz", "Lima", Some("+51 987 654 321"), 4, "Maestría en Derecho"),
        ("Pregrado Psicología", "Daniela Moreno", "Bogotá", Some("+57 301 444 1212"), 1, "Psicología"),
    ];

    rows.into_iter()
        .enumerate()
        .map(|(index, (name, contact, city, phone, stage, program))| {
            let id = index as i64 + 1;
            let day = 20 - index as u32;
            record([
                ("id", OdooValue::Int(id)),
                ("name", OdooValue::from(name)),
                ("contact_name", OdooValue::from(contact)),
                ("email_from", OdooValue::from(format!("lead{id}@demo.test"))),
                ("phone", phone.map(OdooValue::from).unwrap_or(OdooValue::Bool(false))),
                ("city", OdooValue::from(city)),
                ("country_id", OdooValue::Int(if city == "Lima" { 173 } else { 49 })),
                ("stage_id", OdooValue::Int(stage)),
                ("team_id", OdooValue::Int(if name.starts_with("Pregrado") { 1 } else { 2 })),
                ("user_id", OdooValue::Int(6)),
                ("type", OdooValue::from("lead")),
                ("priority", OdooValue::from(if stage == 3 { "2" } else { "1" })),
                ("probability", OdooValue::Double(10.0 * stage as f64)),
                ("x_studio_programa_de_interes", OdooValue::from(program)),
                ("x_studio_canal_de_contacto", OdooValue::from("Formulario web")),
                ("active", OdooValue::Bool(true)),
                ("create_date", timestamp(day, 9)),
                ("write_date", timestamp(day, 15)),
            ])
        })
        .collect()
}

fn partners() -> Vec<OdooStruct> {
    let rows: [(&str, bool, &str, i64, i64); 4] = [
        ("Universidad del Norte Aliados", true, "Barranquilla", 1, 0),
        ("Camila Rojas", false, "Bogotá", 1, 0),
        ("Editorial Académica S.A.S.", true, "Bogotá", 0, 1),
        ("Julián Castro", false, "Cali", 1, 0),
    ];

    rows.into_iter()
        .enumerate()
        .map(|(index, (name, is_company, city, customer_rank, supplier_rank))| {
            let id = index as i64 + 10;
            record([
                ("id", OdooValue::Int(id)),
                ("name", OdooValue::from(name)),
                ("email", OdooValue::from(format!("contact{id}@demo.test"))),
                ("is_company", OdooValue::Bool(is_company)),
                ("city", OdooValue::from(city)),
                ("country_id", OdooValue::Int(49)),
                ("customer_rank", OdooValue::Int(customer_rank)),
                ("supplier_rank", OdooValue::Int(supplier_rank)),
                ("active", OdooValue::Bool(true)),
                ("create_date", timestamp(index as u32 + 1, 8)),
                ("write_date", timestamp(index as u32 + 1, 8)),
            ])
        })
        .collect()
}
