use std::collections::BTreeMap;

use serde::Serialize;

use crate::db::QueryParams;
use crate::reports::ReportDefinition;

/// Parameter values supplied when opening a report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewRequest {
    pub values: BTreeMap<String, String>,
    /// True when the parameter form itself was submitted.
    pub submitted: bool,
}

impl ViewRequest {
    #[must_use]
    pub fn with_value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn submitted(mut self) -> Self {
        self.submitted = true;
        self
    }

    fn has_any_value(&self) -> bool {
        self.values.values().any(|value| !value.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamValue {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewPlan {
    /// One value per declared parameter, in declared order.
    pub values: Vec<ParamValue>,
    pub execute: bool,
}

impl ViewPlan {
    #[must_use]
    pub fn query_params(&self) -> QueryParams {
        self.values
            .iter()
            .fold(QueryParams::new(), |params, value| {
                params.with_text(value.name.clone(), value.value.clone())
            })
    }
}

/// Provided non-empty value, else the declared default, else an empty string.
/// Reports without parameters always execute; otherwise execution needs a
/// submitted form or at least one non-empty provided value.
#[must_use]
pub fn plan_view(report: &ReportDefinition, request: &ViewRequest) -> ViewPlan {
    let values = report
        .params
        .iter()
        .map(|param| {
            let value = request
                .values
                .get(&param.name)
                .filter(|value| !value.is_empty())
                .or(param.default.as_ref())
                .cloned()
                .unwrap_or_default();
            ParamValue {
                name: param.name.clone(),
                value,
            }
        })
        .collect();

    let execute = report.params.is_empty() || request.submitted || request.has_any_value();
    ViewPlan { values, execute }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqlValue;
    use crate::reports::ReportParam;

    fn report(params: Vec<ReportParam>) -> ReportDefinition {
        ReportDefinition {
            id: "by-client".to_string(),
            title: "By client".to_string(),
            description: String::new(),
            sql: "SELECT * FROM waybills WHERE client_id = %(client)s".to_string(),
            params,
        }
    }

    #[test]
    fn report_without_params_executes_immediately() {
        let plan = plan_view(&report(Vec::new()), &ViewRequest::default());

        assert!(plan.execute);
        assert!(plan.values.is_empty());
        assert!(plan.query_params().is_empty());
    }

    #[test]
    fn parameterised_report_renders_form_until_values_arrive() {
        let report = report(vec![ReportParam::new("client", Some("1"))]);
        let plan = plan_view(&report, &ViewRequest::default());

        assert!(!plan.execute);
        assert_eq!(plan.values[0].value, "1");
    }

    #[test]
    fn submission_executes_with_defaults_in_declared_order() {
        let report = report(vec![
            ReportParam::new("since", Some("2020-01-01")),
            ReportParam::new("client", None),
        ]);
        let plan = plan_view(&report, &ViewRequest::default().submitted());

        assert!(plan.execute);
        let names = plan
            .values
            .iter()
            .map(|value| value.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["since", "client"]);
        assert_eq!(plan.values[1].value, "");
    }

    #[test]
    fn provided_value_overrides_default_and_triggers_execution() {
        let report = report(vec![ReportParam::new("client", Some("1"))]);
        let plan = plan_view(&report, &ViewRequest::default().with_value("client", "7"));

        assert!(plan.execute);
        assert_eq!(
            plan.query_params().get("client"),
            Some(&SqlValue::Text("7".to_string()))
        );
    }

    #[test]
    fn empty_provided_value_falls_back_to_default() {
        let report = report(vec![ReportParam::new("client", Some("1"))]);
        let plan = plan_view(&report, &ViewRequest::default().with_value("client", ""));

        assert!(!plan.execute);
        assert_eq!(plan.values[0].value, "1");
    }
}
