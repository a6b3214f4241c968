//! Funding line and calculation nodes
//!
//! Nodes are immutable once built and shared through `Arc<Node>`: an edit
//! produces new node values along the edited path only.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Structural node id, unique within a forest
pub type NodeId = Arc<str>;

/// Node discriminator; also names the two numeric id namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    FundingLine,
    Calculation,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::FundingLine => write!(f, "funding line"),
            NodeKind::Calculation => write!(f, "calculation"),
        }
    }
}

/// A template tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Node {
    FundingLine(FundingLine),
    Calculation(Calculation),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FundingLineType {
    Payment,
    Information,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CalculationType {
    Cash,
    Rate,
    PupilNumber,
    Number,
    Weighting,
    Boolean,
    Enum,
}

impl CalculationType {
    /// Numeric types are the only ones that aggregate
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Cash | Self::Rate | Self::PupilNumber | Self::Number | Self::Weighting
        )
    }

    pub fn default_value_format(self) -> ValueFormat {
        match self {
            Self::Cash => ValueFormat::Currency,
            Self::Weighting => ValueFormat::Percentage,
            Self::Boolean => ValueFormat::Boolean,
            Self::Enum => ValueFormat::String,
            Self::Rate | Self::PupilNumber | Self::Number => ValueFormat::Number,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ValueFormat {
    #[default]
    Number,
    Percentage,
    Currency,
    Boolean,
    String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AggregationType {
    #[default]
    None,
    Sum,
    Average,
    GroupRate,
    PercentageChangeBetweenAandB,
}

/// Numerator/denominator pair, by template calculation id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRate {
    pub numerator: Option<u32>,
    pub denominator: Option<u32>,
}

/// Percentage change between calculation A and calculation B
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentageChange {
    pub calculation_a: Option<u32>,
    pub calculation_b: Option<u32>,
    #[serde(default)]
    pub calculation_aggregation_type: AggregationType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingLine {
    pub id: NodeId,
    pub name: String,
    pub template_line_id: u32,
    #[serde(rename = "type")]
    pub line_type: FundingLineType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funding_line_code: Option<String>,
    #[serde(default)]
    pub is_root_node: bool,
    #[serde(default)]
    pub children: Vec<Arc<Node>>,
}

impl FundingLine {
    pub fn new(
        id: impl Into<NodeId>,
        name: impl Into<String>,
        template_line_id: u32,
        line_type: FundingLineType,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            template_line_id,
            line_type,
            funding_line_code: None,
            is_root_node: false,
            children: Vec::new(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.funding_line_code = Some(code.into());
        self
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children.into_iter().map(Arc::new).collect();
        self
    }

    /// The funding line code, only when the line is a payment line
    pub fn effective_funding_line_code(&self) -> Option<&str> {
        match self.line_type {
            FundingLineType::Payment => self.funding_line_code.as_deref(),
            FundingLineType::Information => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Calculation {
    pub id: NodeId,
    pub name: String,
    pub template_calculation_id: u32,
    #[serde(rename = "type")]
    pub calculation_type: CalculationType,
    #[serde(default)]
    pub value_format: ValueFormat,
    #[serde(default)]
    pub aggregation_type: AggregationType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_enum_type_values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_rate: Option<GroupRate>,
    #[serde(
        default,
        rename = "percentageChangeBetweenAandB",
        skip_serializing_if = "Option::is_none"
    )]
    pub percentage_change: Option<PercentageChange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula_text: Option<String>,
    #[serde(default)]
    pub children: Vec<Arc<Node>>,
}

impl Calculation {
    pub fn new(
        id: impl Into<NodeId>,
        name: impl Into<String>,
        template_calculation_id: u32,
        calculation_type: CalculationType,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            template_calculation_id,
            calculation_type,
            value_format: calculation_type.default_value_format(),
            aggregation_type: AggregationType::None,
            allowed_enum_type_values: Vec::new(),
            group_rate: None,
            percentage_change: None,
            formula_text: None,
            children: Vec::new(),
        }
    }

    pub fn with_aggregation(mut self, aggregation_type: AggregationType) -> Self {
        self.aggregation_type = aggregation_type;
        self
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children.into_iter().map(Arc::new).collect();
        self
    }

    // Type-conditional fields are kept when the type changes but only
    // surface through these accessors while their precondition holds.

    pub fn effective_value_format(&self) -> ValueFormat {
        match self.calculation_type {
            CalculationType::Boolean => ValueFormat::Boolean,
            CalculationType::Enum => ValueFormat::String,
            _ => self.value_format,
        }
    }

    pub fn effective_aggregation(&self) -> AggregationType {
        if self.calculation_type.is_numeric() {
            self.aggregation_type
        } else {
            AggregationType::None
        }
    }

    pub fn effective_group_rate(&self) -> Option<&GroupRate> {
        match self.effective_aggregation() {
            AggregationType::GroupRate => self.group_rate.as_ref(),
            _ => None,
        }
    }

    pub fn effective_percentage_change(&self) -> Option<&PercentageChange> {
        match self.effective_aggregation() {
            AggregationType::PercentageChangeBetweenAandB => self.percentage_change.as_ref(),
            _ => None,
        }
    }

    pub fn effective_allowed_enum_values(&self) -> &[String] {
        match self.calculation_type {
            CalculationType::Enum => &self.allowed_enum_type_values,
            _ => &[],
        }
    }
}

impl From<FundingLine> for Node {
    fn from(line: FundingLine) -> Self {
        Node::FundingLine(line)
    }
}

impl From<Calculation> for Node {
    fn from(calculation: Calculation) -> Self {
        Node::Calculation(calculation)
    }
}

impl Node {
    pub fn id(&self) -> &NodeId {
        match self {
            Node::FundingLine(line) => &line.id,
            Node::Calculation(calc) => &calc.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Node::FundingLine(line) => &line.name,
            Node::Calculation(calc) => &calc.name,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::FundingLine(_) => NodeKind::FundingLine,
            Node::Calculation(_) => NodeKind::Calculation,
        }
    }

    /// Numeric business id in this node's namespace
    pub fn template_id(&self) -> u32 {
        match self {
            Node::FundingLine(line) => line.template_line_id,
            Node::Calculation(calc) => calc.template_calculation_id,
        }
    }

    pub fn children(&self) -> &[Arc<Node>] {
        match self {
            Node::FundingLine(line) => &line.children,
            Node::Calculation(calc) => &calc.children,
        }
    }

    pub fn is_root_node(&self) -> bool {
        matches!(self, Node::FundingLine(line) if line.is_root_node)
    }

    /// Funding lines hold anything; calculations hold calculations only
    pub fn can_contain(&self, kind: NodeKind) -> bool {
        match self {
            Node::FundingLine(_) => true,
            Node::Calculation(_) => kind == NodeKind::Calculation,
        }
    }

    /// Shallow copy with a new child list
    pub fn with_children(&self, children: Vec<Arc<Node>>) -> Node {
        match self {
            Node::FundingLine(line) => Node::FundingLine(FundingLine {
                children,
                ..line.clone_fields()
            }),
            Node::Calculation(calc) => Node::Calculation(Calculation {
                children,
                ..calc.clone_fields()
            }),
        }
    }

    /// Shallow copy with a new structural id
    pub fn with_id(&self, id: NodeId) -> Node {
        let mut node = self.with_children(self.children().to_vec());
        match &mut node {
            Node::FundingLine(line) => line.id = id,
            Node::Calculation(calc) => calc.id = id,
        }
        node
    }

    /// Shallow copy with the root flag set; calculations never carry it
    pub fn with_root_flag(&self, is_root: bool) -> Node {
        match self {
            Node::FundingLine(line) => Node::FundingLine(FundingLine {
                is_root_node: is_root,
                children: line.children.clone(),
                ..line.clone_fields()
            }),
            Node::Calculation(_) => self.with_children(self.children().to_vec()),
        }
    }
}

trait CloneFields {
    /// Clone every field except the children, which stay empty
    fn clone_fields(&self) -> Self;
}

impl CloneFields for FundingLine {
    fn clone_fields(&self) -> Self {
        Self {
            id: Arc::clone(&self.id),
            name: self.name.clone(),
            template_line_id: self.template_line_id,
            line_type: self.line_type,
            funding_line_code: self.funding_line_code.clone(),
            is_root_node: self.is_root_node,
            children: Vec::new(),
        }
    }
}

impl CloneFields for Calculation {
    fn clone_fields(&self) -> Self {
        Self {
            id: Arc::clone(&self.id),
            name: self.name.clone(),
            template_calculation_id: self.template_calculation_id,
            calculation_type: self.calculation_type,
            value_format: self.value_format,
            aggregation_type: self.aggregation_type,
            allowed_enum_type_values: self.allowed_enum_type_values.clone(),
            group_rate: self.group_rate,
            percentage_change: self.percentage_change,
            formula_text: self.formula_text.clone(),
            children: Vec::new(),
        }
    }
}
