//! Per-kind node validation
//!
//! Runs before a save reaches the mutation engine. Results are data
//! (`ValidationReport`) so forms can show each message next to its field.

use std::collections::HashSet;
use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::identity::{ids_in_use, is_id_in_use};
use super::visit;
use crate::template::{
    AggregationType, Calculation, CalculationType, Forest, FundingLine, FundingLineType, Node,
    NodeId, NodeKind,
};

static FUNDING_LINE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").expect("valid regex"));

/// Form field an error belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Name,
    TemplateLineId,
    TemplateCalculationId,
    FundingLineCode,
    AggregationType,
    AllowedEnumTypeValues,
    GroupRate,
    PercentageChange,
    /// Where the node sits in the tree
    Placement,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Name => "name",
            Field::TemplateLineId => "templateLineId",
            Field::TemplateCalculationId => "templateCalculationId",
            Field::FundingLineCode => "fundingLineCode",
            Field::AggregationType => "aggregationType",
            Field::AllowedEnumTypeValues => "allowedEnumTypeValues",
            Field::GroupRate => "groupRate",
            Field::PercentageChange => "percentageChangeBetweenAandB",
            Field::Placement => "placement",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

impl FieldError {
    pub fn new(field: Field, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<FieldError>,
}

impl ValidationReport {
    pub fn push(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_error(&self, field: Field) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    pub fn messages_for(&self, field: Field) -> Vec<&str> {
        self.errors
            .iter()
            .filter(|e| e.field == field)
            .map(|e| e.message.as_str())
            .collect()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

fn check_name(name: &str, report: &mut ValidationReport) {
    if name.trim().is_empty() {
        report.push(FieldError::new(Field::Name, "name is required"));
    }
}

fn check_template_id(
    forest: &Forest,
    namespace: NodeKind,
    id: u32,
    node_id: &str,
    field: Field,
    report: &mut ValidationReport,
) {
    if id == 0 {
        report.push(FieldError::new(field, "id must be a positive number"));
    } else if is_id_in_use(forest, namespace, id, Some(node_id)) {
        report.push(FieldError::new(field, format!("id {} is in use", id)));
    }
}

/// Validate a funding line as it would be saved into `forest`
pub fn validate_funding_line(forest: &Forest, line: &FundingLine) -> ValidationReport {
    let mut report = ValidationReport::default();
    check_name(&line.name, &mut report);
    check_template_id(
        forest,
        NodeKind::FundingLine,
        line.template_line_id,
        &line.id,
        Field::TemplateLineId,
        &mut report,
    );

    if line.line_type == FundingLineType::Payment {
        match line.funding_line_code.as_deref().map(str::trim) {
            None | Some("") => report.push(FieldError::new(
                Field::FundingLineCode,
                "funding line code is required for payment lines",
            )),
            Some(code) if !FUNDING_LINE_CODE.is_match(code) => report.push(FieldError::new(
                Field::FundingLineCode,
                "funding line code may only contain letters, digits, dashes and underscores",
            )),
            Some(_) => {}
        }
    }

    report
}

/// Validate a calculation as it would be saved into `forest`
pub fn validate_calculation(forest: &Forest, calc: &Calculation) -> ValidationReport {
    let mut report = ValidationReport::default();
    check_name(&calc.name, &mut report);
    check_template_id(
        forest,
        NodeKind::Calculation,
        calc.template_calculation_id,
        &calc.id,
        Field::TemplateCalculationId,
        &mut report,
    );

    if calc.calculation_type == CalculationType::Enum {
        let values: Vec<&str> = calc
            .allowed_enum_type_values
            .iter()
            .map(|v| v.trim())
            .collect();
        if values.is_empty() || values.iter().any(|v| v.is_empty()) {
            report.push(FieldError::new(
                Field::AllowedEnumTypeValues,
                "enum calculations need at least one non-empty allowed value",
            ));
        } else if values.iter().collect::<HashSet<_>>().len() != values.len() {
            report.push(FieldError::new(
                Field::AllowedEnumTypeValues,
                "allowed values must be distinct",
            ));
        }
    }

    let calculation_ids = ids_in_use(forest, NodeKind::Calculation);
    match calc.effective_aggregation() {
        AggregationType::GroupRate => {
            let rate = calc.group_rate.unwrap_or_default();
            check_pair(
                rate.numerator,
                rate.denominator,
                &calculation_ids,
                Field::GroupRate,
                ("numerator", "denominator"),
                &mut report,
            );
        }
        AggregationType::PercentageChangeBetweenAandB => {
            let change = calc.percentage_change.unwrap_or_default();
            check_pair(
                change.calculation_a,
                change.calculation_b,
                &calculation_ids,
                Field::PercentageChange,
                ("calculation A", "calculation B"),
                &mut report,
            );
        }
        AggregationType::None | AggregationType::Sum | AggregationType::Average => {}
    }

    report
}

fn check_pair(
    first: Option<u32>,
    second: Option<u32>,
    known: &HashSet<u32>,
    field: Field,
    labels: (&str, &str),
    report: &mut ValidationReport,
) {
    for (value, label) in [(first, labels.0), (second, labels.1)] {
        match value {
            None => report.push(FieldError::new(field, format!("{} is required", label))),
            Some(id) if !known.contains(&id) => report.push(FieldError::new(
                field,
                format!("{} refers to unknown calculation {}", label, id),
            )),
            Some(_) => {}
        }
    }
    if let (Some(a), Some(b)) = (first, second) {
        if a == b {
            report.push(FieldError::new(
                field,
                format!("{} and {} must differ", labels.0, labels.1),
            ));
        }
    }
}

pub fn validate_node(forest: &Forest, node: &Node) -> ValidationReport {
    match node {
        Node::FundingLine(line) => validate_funding_line(forest, line),
        Node::Calculation(calc) => validate_calculation(forest, calc),
    }
}

/// Containment rules the mutation engine enforces, re-checked for loaded trees
fn check_placement(node: &Node, parent: Option<&Node>, report: &mut ValidationReport) {
    match parent {
        None if node.kind() != NodeKind::FundingLine => report.push(FieldError::new(
            Field::Placement,
            "a root must be a funding line",
        )),
        Some(parent) if !parent.can_contain(node.kind()) => report.push(FieldError::new(
            Field::Placement,
            format!("a {} cannot sit under a {}", node.kind(), parent.kind()),
        )),
        _ => {}
    }
}

/// Validate every node and its placement; only failing nodes are returned, in pre-order
pub fn validate_forest(forest: &Forest) -> Vec<(NodeId, ValidationReport)> {
    let mut failures = Vec::new();
    let _ = visit::walk(forest, |visit| {
        let node = visit.node;
        let mut report = validate_node(forest, node);
        check_placement(node, visit.parent.map(|p| p.as_ref()), &mut report);
        if !report.is_valid() {
            failures.push((Arc::clone(node.id()), report));
        }
        ControlFlow::<()>::Continue(())
    });
    failures
}

/// Structural ids that occur more than once (integrity diagnostic)
pub fn duplicate_node_ids(forest: &Forest) -> Vec<NodeId> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for id in forest.node_ids() {
        if !seen.insert(Arc::clone(&id)) && !duplicates.contains(&id) {
            duplicates.push(id);
        }
    }
    duplicates
}
