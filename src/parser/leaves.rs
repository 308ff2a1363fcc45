use scraper::{ElementRef, Node};

/// One leaf of a translation cell, in document order.
#[derive(Debug, Clone, PartialEq)]
pub enum LeafNode {
    Text(String),
    Markup {
        tag: String,
        href: Option<String>,
        text: String,
    },
}

impl LeafNode {
    pub fn text(s: &str) -> Self {
        LeafNode::Text(s.to_string())
    }
}

/// Walk `root` in pre-order (the element itself, then its descendants) and
/// yield one node per text or element encountered. Comments, doctypes and
/// other node kinds are skipped.
pub fn leaf_nodes(root: ElementRef<'_>) -> impl Iterator<Item = LeafNode> + '_ {
    root.descendants().filter_map(|node| match node.value() {
        Node::Text(text) => Some(LeafNode::Text(text.to_string())),
        Node::Element(element) => {
            let nested = ElementRef::wrap(node)
                .map(|el| el.text().collect::<String>())
                .unwrap_or_default();
            Some(LeafNode::Markup {
                tag: element.name().to_string(),
                href: element.attr("href").map(str::to_string),
                text: nested,
            })
        }
        _ => None,
    })
}
