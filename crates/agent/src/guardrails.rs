use leadbridge_core::CrmModel;
use serde_json::Value;

use crate::planner::BulkUpdatePlan;

/// Fields a generated plan may never write.
pub const PROTECTED_FIELDS: &[&str] =
    &["id", "create_date", "write_date", "create_uid", "write_uid", "display_name", "__last_update"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow,
    Deny { reason_code: &'static str, field: String, user_message: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardrailPolicy {
    pub protected_fields: Vec<String>,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self { protected_fields: PROTECTED_FIELDS.iter().map(|field| field.to_string()).collect() }
    }
}

impl GuardrailPolicy {
    /// Checks a parsed plan before anything reaches the backend.
    pub fn evaluate(&self, plan: &BulkUpdatePlan, target: CrmModel) -> GuardrailDecision {
        if let Some(model) = plan.model.as_deref() {
            if model != target.as_str() {
                return GuardrailDecision::Deny {
                    reason_code: "model_mismatch",
                    field: "model".to_string(),
                    user_message: format!(
                        "The plan targets `{model}` but the request was for `{target}`."
                    ),
                };
            }
        }

        if plan.updates.is_empty() {
            return GuardrailDecision::Deny {
                reason_code: "empty_updates",
                field: "updates".to_string(),
                user_message: "The plan does not change any field.".to_string(),
            };
        }

        if let Some(field) =
            plan.updates.keys().find(|field| self.protected_fields.iter().any(|p| p == *field))
        {
            return GuardrailDecision::Deny {
                reason_code: "protected_field",
                field: field.clone(),
                user_message: format!("`{field}` is managed by the backend and cannot be updated."),
            };
        }

        if let Some((field, _)) =
            plan.updates.iter().find(|(_, value)| matches!(value, Value::Array(_) | Value::Object(_)))
        {
            return GuardrailDecision::Deny {
                reason_code: "non_scalar_update",
                field: field.clone(),
                user_message: format!(
                    "`{field}` must be set to a text, number or boolean value."
                ),
            };
        }

        GuardrailDecision::Allow
    }
}

#[cfg(test)]
mod tests {
    use leadbridge_core::{CrmModel, Criterion};
    use serde_json::{json, Map, Value};

    use super::{GuardrailDecision, GuardrailPolicy};
    use crate::planner::BulkUpdatePlan;

    fn plan(model: Option<&str>, updates: Value) -> BulkUpdatePlan {
        let updates: Map<String, Value> = match updates {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        BulkUpdatePlan {
            action: Some("update_records".to_string()),
            model: model.map(str::to_string),
            search_criteria: vec![Criterion::eq("phone", false)],
            updates,
            description: "fill phones".to_string(),
            estimated_impact: None,
        }
    }

    fn reason(decision: GuardrailDecision) -> &'static str {
        match decision {
            GuardrailDecision::Deny { reason_code, .. } => reason_code,
            GuardrailDecision::Allow => "allow",
        }
    }

    #[test]
    fn scalar_updates_on_the_requested_model_are_allowed() {
        let policy = GuardrailPolicy::default();
        let decision = policy.evaluate(&plan(Some("crm.lead"), json!({"phone": "555"})), CrmModel::Lead);
        assert_eq!(decision, GuardrailDecision::Allow);
    }

    #[test]
    fn id_writes_are_denied() {
        let policy = GuardrailPolicy::default();
        let decision = policy.evaluate(&plan(None, json!({"id": 7, "phone": "1"})), CrmModel::Lead);

        let GuardrailDecision::Deny { reason_code, field, user_message } = decision else {
            panic!("expected a denial");
        };
        assert_eq!(reason_code, "protected_field");
        assert_eq!(field, "id");
        assert!(user_message.contains("cannot be updated"));
    }

    #[test]
    fn empty_and_structured_updates_are_denied() {
        let policy = GuardrailPolicy::default();
        assert_eq!(reason(policy.evaluate(&plan(None, json!({})), CrmModel::Lead)), "empty_updates");
        assert_eq!(
            reason(policy.evaluate(&plan(None, json!({"category_id": [1, 2]})), CrmModel::Partner)),
            "non_scalar_update"
        );
    }

    #[test]
    fn plan_for_another_model_is_denied() {
        let policy = GuardrailPolicy::default();
        let decision =
            policy.evaluate(&plan(Some("res.partner"), json!({"phone": "555"})), CrmModel::Lead);
        assert_eq!(reason(decision), "model_mismatch");
    }
}
