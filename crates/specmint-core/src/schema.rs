use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::rules::CrossFieldRule;

/// JSON Schema type keyword carried by a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaType {
    Object,
    Array,
    String,
    Integer,
    Number,
    Boolean,
    Null,
    /// Unrecognized or missing type keyword; generated as a string.
    Other(String),
}

impl SchemaType {
    pub fn from_keyword(keyword: &str) -> Self {
        match keyword {
            "object" => SchemaType::Object,
            "array" => SchemaType::Array,
            "string" => SchemaType::String,
            "integer" => SchemaType::Integer,
            "number" => SchemaType::Number,
            "boolean" => SchemaType::Boolean,
            "null" => SchemaType::Null,
            other => SchemaType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SchemaType::Object => "object",
            SchemaType::Array => "array",
            SchemaType::String => "string",
            SchemaType::Integer => "integer",
            SchemaType::Number => "number",
            SchemaType::Boolean => "boolean",
            SchemaType::Null => "null",
            SchemaType::Other(value) => value.as_str(),
        }
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Semantic string formats with a dedicated generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StringFormat {
    Email,
    Uuid,
    Date,
    DateTime,
    Uri,
    Phone,
}

impl StringFormat {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "email" => Some(StringFormat::Email),
            "uuid" => Some(StringFormat::Uuid),
            "date" => Some(StringFormat::Date),
            "date-time" => Some(StringFormat::DateTime),
            "uri" => Some(StringFormat::Uri),
            "phone" => Some(StringFormat::Phone),
            _ => None,
        }
    }
}

/// A node in the parsed schema tree.
///
/// Built once by [`crate::parse_schema`] and never mutated afterwards. Bound
/// pairs are already normalized (`max >= min`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaNode {
    pub schema_type: SchemaType,
    /// Locator unique within the tree: root is `""`, properties are `a.b`,
    /// array items are `a[]`.
    pub path: String,
    pub description: Option<String>,
    pub properties: BTreeMap<String, SchemaNode>,
    pub items: Option<Box<SchemaNode>>,
    /// Required property names in declaration order.
    pub required: Vec<String>,
    pub enum_values: Vec<Value>,
    pub examples: Vec<Value>,
    /// Raw `format` keyword; see [`SchemaNode::string_format`].
    pub format: Option<String>,
    pub pattern: Option<String>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub multiple_of: Option<f64>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
    /// Inclusion chance when this node is a non-required property.
    pub optional_probability: f64,
    pub llm_enhanced: bool,
    pub cross_field_rules: Vec<CrossFieldRule>,
}

impl SchemaNode {
    /// Empty node of the given type at `path`.
    pub fn new(schema_type: SchemaType, path: impl Into<String>) -> Self {
        Self {
            schema_type,
            path: path.into(),
            description: None,
            properties: BTreeMap::new(),
            items: None,
            required: Vec::new(),
            enum_values: Vec::new(),
            examples: Vec::new(),
            format: None,
            pattern: None,
            minimum: None,
            maximum: None,
            multiple_of: None,
            min_length: None,
            max_length: None,
            min_items: None,
            max_items: None,
            optional_probability: crate::parser::DEFAULT_OPTIONAL_PROBABILITY,
            llm_enhanced: false,
            cross_field_rules: Vec::new(),
        }
    }

    /// Known format of this node, if any.
    pub fn string_format(&self) -> Option<StringFormat> {
        self.format.as_deref().and_then(StringFormat::from_keyword)
    }

    pub fn is_required(&self, property: &str) -> bool {
        self.required.iter().any(|name| name == property)
    }

    /// Paths of descendant nodes marked for enrichment, in tree order.
    pub fn llm_fields(&self) -> Vec<String> {
        let mut fields = Vec::new();
        self.collect_llm_fields(&mut fields);
        fields
    }

    fn collect_llm_fields(&self, out: &mut Vec<String>) {
        if self.llm_enhanced && !self.path.is_empty() {
            out.push(self.path.clone());
        }
        for child in self.properties.values() {
            child.collect_llm_fields(out);
        }
        if let Some(items) = &self.items {
            items.collect_llm_fields(out);
        }
    }

    /// Every cross-field rule declared in this subtree, parents first.
    pub fn collect_rules(&self) -> Vec<CrossFieldRule> {
        let mut rules = self.cross_field_rules.clone();
        for child in self.properties.values() {
            rules.extend(child.collect_rules());
        }
        if let Some(items) = &self.items {
            rules.extend(items.collect_rules());
        }
        rules
    }

    /// Walk the tree depth-first, calling `visit` for every node.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a SchemaNode)) {
        visit(self);
        for child in self.properties.values() {
            child.walk(visit);
        }
        if let Some(items) = &self.items {
            items.walk(visit);
        }
    }
}
