//! Partial node updates produced by the sidebar forms

use serde::{Deserialize, Deserializer, Serialize};

use super::node::{
    AggregationType, Calculation, CalculationType, FundingLine, FundingLineType, GroupRate, Node,
    NodeId, NodeKind, PercentageChange, ValueFormat,
};

/// Clearable field: absent leaves it alone, `null` clears it
fn clearable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Field-level update keyed by node id and kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum NodeUpdate {
    FundingLine(FundingLineUpdate),
    Calculation(CalculationUpdate),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingLineUpdate {
    pub id: NodeId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub template_line_id: Option<u32>,
    #[serde(default, rename = "type")]
    pub line_type: Option<FundingLineType>,
    #[serde(
        default,
        deserialize_with = "clearable",
        skip_serializing_if = "Option::is_none"
    )]
    pub funding_line_code: Option<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationUpdate {
    pub id: NodeId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub template_calculation_id: Option<u32>,
    #[serde(default, rename = "type")]
    pub calculation_type: Option<CalculationType>,
    #[serde(default)]
    pub value_format: Option<ValueFormat>,
    #[serde(default)]
    pub aggregation_type: Option<AggregationType>,
    #[serde(default)]
    pub allowed_enum_type_values: Option<Vec<String>>,
    #[serde(
        default,
        deserialize_with = "clearable",
        skip_serializing_if = "Option::is_none"
    )]
    pub group_rate: Option<Option<GroupRate>>,
    #[serde(
        default,
        rename = "percentageChangeBetweenAandB",
        deserialize_with = "clearable",
        skip_serializing_if = "Option::is_none"
    )]
    pub percentage_change: Option<Option<PercentageChange>>,
    #[serde(
        default,
        deserialize_with = "clearable",
        skip_serializing_if = "Option::is_none"
    )]
    pub formula_text: Option<Option<String>>,
}

impl FundingLineUpdate {
    pub fn new(id: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            name: None,
            template_line_id: None,
            line_type: None,
            funding_line_code: None,
        }
    }

    pub fn apply(&self, line: &FundingLine) -> FundingLine {
        let mut next = line.clone();
        if let Some(name) = &self.name {
            next.name = name.clone();
        }
        if let Some(id) = self.template_line_id {
            next.template_line_id = id;
        }
        if let Some(line_type) = self.line_type {
            next.line_type = line_type;
        }
        if let Some(code) = &self.funding_line_code {
            next.funding_line_code = code.clone();
        }
        next
    }
}

impl CalculationUpdate {
    pub fn new(id: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            name: None,
            template_calculation_id: None,
            calculation_type: None,
            value_format: None,
            aggregation_type: None,
            allowed_enum_type_values: None,
            group_rate: None,
            percentage_change: None,
            formula_text: None,
        }
    }

    pub fn apply(&self, calc: &Calculation) -> Calculation {
        let mut next = calc.clone();
        if let Some(name) = &self.name {
            next.name = name.clone();
        }
        if let Some(id) = self.template_calculation_id {
            next.template_calculation_id = id;
        }
        if let Some(calculation_type) = self.calculation_type {
            next.calculation_type = calculation_type;
        }
        if let Some(format) = self.value_format {
            next.value_format = format;
        }
        if let Some(aggregation) = self.aggregation_type {
            next.aggregation_type = aggregation;
        }
        if let Some(values) = &self.allowed_enum_type_values {
            next.allowed_enum_type_values = values.clone();
        }
        if let Some(group_rate) = self.group_rate {
            next.group_rate = group_rate;
        }
        if let Some(change) = self.percentage_change {
            next.percentage_change = change;
        }
        if let Some(formula) = &self.formula_text {
            next.formula_text = formula.clone();
        }
        next
    }
}

impl NodeUpdate {
    pub fn id(&self) -> &NodeId {
        match self {
            NodeUpdate::FundingLine(update) => &update.id,
            NodeUpdate::Calculation(update) => &update.id,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            NodeUpdate::FundingLine(_) => NodeKind::FundingLine,
            NodeUpdate::Calculation(_) => NodeKind::Calculation,
        }
    }

    /// Apply to a node of the matching kind; `None` on kind mismatch
    pub fn apply(&self, node: &Node) -> Option<Node> {
        match (self, node) {
            (NodeUpdate::FundingLine(update), Node::FundingLine(line)) => {
                Some(Node::FundingLine(update.apply(line)))
            }
            (NodeUpdate::Calculation(update), Node::Calculation(calc)) => {
                Some(Node::Calculation(update.apply(calc)))
            }
            _ => None,
        }
    }
}

impl From<FundingLineUpdate> for NodeUpdate {
    fn from(update: FundingLineUpdate) -> Self {
        NodeUpdate::FundingLine(update)
    }
}

impl From<CalculationUpdate> for NodeUpdate {
    fn from(update: CalculationUpdate) -> Self {
        NodeUpdate::Calculation(update)
    }
}
