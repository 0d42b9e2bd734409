//! `<diagram>` payload: a graph of nodes and edges plus layer and camera
//! metadata, with its own decoding, serialization and validation.

use crate::ast::{parse_bool, Attribute, AttributeList, AttributeSet, CanonicalAttributes};
use crate::error::{DecodeError, DecodeResult, ValidationError, ValidationIssue};
use crate::parser::XmlNode;
use crate::serializer::Fragment;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagram {
    pub id: String,
    pub projection: String,
    pub layout: String,
    pub unit: String,
    pub graph: DiagramGraph,
    pub layers: Vec<DiagramLayer>,
    pub camera: Option<DiagramCamera>,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramGraph {
    pub nodes: Vec<DiagramNode>,
    pub edges: Vec<DiagramEdge>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramNode {
    pub id: String,
    pub label: String,
    pub group: String,
    pub owner: String,
    pub weight: String,
    pub pct_complete: String,
    pub x: String,
    pub y: String,
    pub z: String,
    pub styles: Vec<DiagramStyle>,
    pub data: Vec<DiagramData>,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramEdge {
    pub from: String,
    pub to: String,
    pub kind: String,
    /// Must be given explicitly; `None` fails validation
    pub directed: Option<bool>,
    pub weight: String,
    pub styles: Vec<DiagramStyle>,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramStyle {
    pub color: String,
    pub shape: String,
    pub size: String,
    pub stroke: String,
    pub width: String,
    pub dash: String,
    pub curvature: String,
    pub texture: String,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramLayer {
    pub id: String,
    pub z: String,
    pub kind: String,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramCamera {
    pub azimuth: String,
    pub elevation: String,
    pub distance: String,
    pub attributes: Vec<Attribute>,
}

/// Arbitrary keyed payload attached to a node; body kept raw
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramData {
    pub key: String,
    pub body: String,
}

impl Diagram {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn node(&self, id: &str) -> Option<&DiagramNode> {
        self.graph.nodes.iter().find(|node| node.id == id)
    }

    pub(crate) fn from_parts(
        source: &str,
        attributes: Vec<Attribute>,
        children: &[XmlNode<'_>],
    ) -> DecodeResult<Self> {
        let mut attrs = AttributeSet::new(attributes);
        let mut diagram = Diagram {
            id: attrs.take("id"),
            projection: attrs.take("projection"),
            layout: attrs.take("layout"),
            unit: attrs.take("unit"),
            ..Default::default()
        };
        diagram.attributes = attrs.rest();

        for child in children {
            match child.name {
                "graph" => {
                    for item in &child.children {
                        match item.name {
                            "node" => diagram.graph.nodes.push(DiagramNode::from_node(item)),
                            "edge" => diagram.graph.edges.push(DiagramEdge::from_node(source, item)?),
                            _ => {}
                        }
                    }
                }
                "layer" => {
                    let mut attrs = AttributeSet::new(child.attributes.clone());
                    diagram.layers.push(DiagramLayer {
                        id: attrs.take("id"),
                        z: attrs.take("z"),
                        kind: attrs.take("kind"),
                        attributes: attrs.rest(),
                    });
                }
                "camera" => {
                    let mut attrs = AttributeSet::new(child.attributes.clone());
                    diagram.camera = Some(DiagramCamera {
                        azimuth: attrs.take("azimuth"),
                        elevation: attrs.take("elevation"),
                        distance: attrs.take("distance"),
                        attributes: attrs.rest(),
                    });
                }
                _ => {}
            }
        }

        Ok(diagram)
    }

    /// Canonical child markup: graph, layers, camera
    pub(crate) fn inner_fragments(&self) -> Vec<Fragment> {
        let mut fragments = Vec::new();

        let graph = &self.graph;
        if !graph.nodes.is_empty() || !graph.edges.is_empty() {
            let mut children: Vec<Fragment> = graph.nodes.iter().map(DiagramNode::fragment).collect();
            children.extend(graph.edges.iter().map(DiagramEdge::fragment));
            fragments.push(Fragment::element("graph", Vec::new(), children));
        }

        for layer in &self.layers {
            let attrs = AttributeList::new()
                .known("id", &layer.id)
                .known("z", &layer.z)
                .known("kind", &layer.kind)
                .extend(&layer.attributes);
            fragments.push(Fragment::element("layer", attrs, Vec::new()));
        }

        if let Some(camera) = &self.camera {
            let attrs = AttributeList::new()
                .known("azimuth", &camera.azimuth)
                .known("elevation", &camera.elevation)
                .known("distance", &camera.distance)
                .extend(&camera.attributes);
            fragments.push(Fragment::element("camera", attrs, Vec::new()));
        }

        fragments
    }

    /// Structural checks. Issues carry no kind; the document validator
    /// attributes them to the diagram element when merging.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();
        let mut issue = |field: &str, message: String| {
            issues.push(ValidationIssue {
                kind: None,
                field: Some(field.to_string()),
                message,
            });
        };

        if self.id.trim().is_empty() {
            issue("id", "diagram missing id".to_string());
        }

        let mut node_ids = HashSet::new();
        for (i, node) in self.graph.nodes.iter().enumerate() {
            if node.id.trim().is_empty() {
                issue("node.id", format!("node[{}] missing id", i));
            } else if !node_ids.insert(node.id.as_str()) {
                issue("node.id", format!("duplicate node id {}", node.id));
            }
        }

        for (i, edge) in self.graph.edges.iter().enumerate() {
            if edge.from.trim().is_empty() || edge.to.trim().is_empty() {
                issue("edge.from_to", format!("edge[{}] missing from/to", i));
            } else {
                if !node_ids.contains(edge.from.as_str()) {
                    issue(
                        "edge.from",
                        format!("edge from references missing node {}", edge.from),
                    );
                }
                if !node_ids.contains(edge.to.as_str()) {
                    issue(
                        "edge.to",
                        format!("edge to references missing node {}", edge.to),
                    );
                }
            }
            if edge.directed.is_none() {
                issue("edge.directed", format!("edge[{}] missing directed flag", i));
            }
        }

        ValidationError::new(issues).into_result()
    }
}

impl CanonicalAttributes for Diagram {
    fn canonical_attributes(&self) -> Vec<Attribute> {
        AttributeList::new()
            .known("id", &self.id)
            .known("projection", &self.projection)
            .known("layout", &self.layout)
            .known("unit", &self.unit)
            .extend(&self.attributes)
    }
}

impl DiagramNode {
    fn from_node(node: &XmlNode<'_>) -> Self {
        let mut attrs = AttributeSet::new(node.attributes.clone());
        let mut result = DiagramNode {
            id: attrs.take("id"),
            label: attrs.take("label"),
            group: attrs.take("group"),
            owner: attrs.take("owner"),
            weight: attrs.take("weight"),
            pct_complete: attrs.take("pct_complete"),
            x: attrs.take("x"),
            y: attrs.take("y"),
            z: attrs.take("z"),
            ..Default::default()
        };
        result.attributes = attrs.rest();

        for child in &node.children {
            match child.name {
                "style" => result.styles.push(DiagramStyle::from_node(child)),
                "data" => {
                    let key = child
                        .attributes
                        .iter()
                        .find(|attr| attr.name == "key")
                        .map(|attr| attr.value.clone())
                        .unwrap_or_default();
                    result.data.push(DiagramData {
                        key,
                        body: child.inner.to_string(),
                    });
                }
                _ => {}
            }
        }

        result
    }

    fn fragment(&self) -> Fragment {
        let attrs = AttributeList::new()
            .known("id", &self.id)
            .known("label", &self.label)
            .known("group", &self.group)
            .known("owner", &self.owner)
            .known("weight", &self.weight)
            .known("pct_complete", &self.pct_complete)
            .known("x", &self.x)
            .known("y", &self.y)
            .known("z", &self.z)
            .extend(&self.attributes);

        let mut children: Vec<Fragment> = self.styles.iter().map(DiagramStyle::fragment).collect();
        for data in &self.data {
            let attrs = AttributeList::new().known("key", &data.key).extend(&[]);
            children.push(Fragment::element(
                "data",
                attrs,
                vec![Fragment::Raw(data.body.clone())],
            ));
        }

        Fragment::element("node", attrs, children)
    }
}

impl DiagramEdge {
    fn from_node(source: &str, node: &XmlNode<'_>) -> DecodeResult<Self> {
        let mut attrs = AttributeSet::new(node.attributes.clone());
        let directed = match attrs.take_opt("directed") {
            Some(value) => Some(parse_bool(&value).ok_or_else(|| {
                DecodeError::invalid_syntax(
                    source,
                    node.offset,
                    format!("invalid boolean '{}' for attribute 'directed'", value),
                )
            })?),
            None => None,
        };

        let mut edge = DiagramEdge {
            from: attrs.take("from"),
            to: attrs.take("to"),
            kind: attrs.take("kind"),
            directed,
            weight: attrs.take("weight"),
            ..Default::default()
        };
        edge.attributes = attrs.rest();
        edge.styles = node
            .children
            .iter()
            .filter(|child| child.name == "style")
            .map(DiagramStyle::from_node)
            .collect();

        Ok(edge)
    }

    fn fragment(&self) -> Fragment {
        let attrs = AttributeList::new()
            .known("from", &self.from)
            .known("to", &self.to)
            .known("kind", &self.kind)
            .flag("directed", self.directed)
            .known("weight", &self.weight)
            .extend(&self.attributes);
        let children = self.styles.iter().map(DiagramStyle::fragment).collect();
        Fragment::element("edge", attrs, children)
    }
}

impl DiagramStyle {
    fn from_node(node: &XmlNode<'_>) -> Self {
        let mut attrs = AttributeSet::new(node.attributes.clone());
        let mut style = DiagramStyle {
            color: attrs.take("color"),
            shape: attrs.take("shape"),
            size: attrs.take("size"),
            stroke: attrs.take("stroke"),
            width: attrs.take("width"),
            dash: attrs.take("dash"),
            curvature: attrs.take("curvature"),
            texture: attrs.take("texture"),
            ..Default::default()
        };
        style.attributes = attrs.rest();
        style
    }

    fn fragment(&self) -> Fragment {
        let attrs = AttributeList::new()
            .known("color", &self.color)
            .known("shape", &self.shape)
            .known("size", &self.size)
            .known("stroke", &self.stroke)
            .known("width", &self.width)
            .known("dash", &self.dash)
            .known("curvature", &self.curvature)
            .known("texture", &self.texture)
            .extend(&self.attributes);
        Fragment::element("style", attrs, Vec::new())
    }
}
