//! Arena-based DOM for XHTML content documents.
//!
//! All nodes are stored in a contiguous vector; parent/child/sibling links
//! are indices into that vector. The container hands out node ids rather
//! than aliased references, so every mutation flows through [`Document`]
//! accessor calls.

/// Unique identifier for a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Sentinel value for no node.
    pub(crate) const NONE: NodeId = NodeId(u32::MAX);

    pub(crate) fn is_some(&self) -> bool {
        self.0 != u32::MAX
    }

    pub(crate) fn is_none(&self) -> bool {
        self.0 == u32::MAX
    }
}

/// Qualified XML name: optional prefix plus local name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QName {
    pub prefix: Option<String>,
    pub local: String,
}

impl QName {
    pub fn new(local: impl Into<String>) -> Self {
        Self {
            prefix: None,
            local: local.into(),
        }
    }

    pub fn with_prefix(prefix: Option<String>, local: impl Into<String>) -> Self {
        Self {
            prefix,
            local: local.into(),
        }
    }

    /// The name as written in markup (`prefix:local` or `local`).
    pub fn as_markup(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{}:{}", p, self.local),
            None => self.local.clone(),
        }
    }
}

/// XML attribute.
#[derive(Debug, Clone)]
pub struct Attr {
    pub name: QName,
    pub value: String,
}

/// Node type in the arena DOM.
#[derive(Debug, Clone)]
pub enum NodeData {
    /// Document root (virtual; holds the prologue and the root element).
    Document,
    /// Element with name and attributes.
    Element { name: QName, attrs: Vec<Attr> },
    /// Text content.
    Text(String),
    /// CDATA section.
    CData(String),
    /// Comment.
    Comment(String),
    /// Processing instruction (content between `<?` and `?>`).
    ProcessingInstruction(String),
    /// Document type declaration (content after `<!DOCTYPE `).
    Doctype(String),
}

/// A node in the arena DOM.
#[derive(Debug)]
pub struct Node {
    pub data: NodeData,
    parent: NodeId,
    first_child: NodeId,
    last_child: NodeId,
    prev_sibling: NodeId,
    next_sibling: NodeId,
}

impl Node {
    fn new(data: NodeData) -> Self {
        Self {
            data,
            parent: NodeId::NONE,
            first_child: NodeId::NONE,
            last_child: NodeId::NONE,
            prev_sibling: NodeId::NONE,
            next_sibling: NodeId::NONE,
        }
    }
}

/// An XHTML document as an arena of nodes.
pub struct Document {
    nodes: Vec<Node>,
    document: NodeId,
    /// Whether the source carried an XML declaration (re-emitted as UTF-8).
    pub(crate) has_decl: bool,
}

impl Document {
    /// Create a new empty document with a virtual root.
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            document: NodeId::NONE,
            has_decl: false,
        };
        doc.document = doc.alloc(Node::new(NodeData::Document));
        doc
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Get the virtual document root id.
    pub fn document(&self) -> NodeId {
        self.document
    }

    /// Get a node by id.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        if id.is_none() {
            return None;
        }
        self.nodes.get(id.0 as usize)
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if id.is_none() {
            return None;
        }
        self.nodes.get_mut(id.0 as usize)
    }

    /// Create a new element node (detached).
    pub fn create_element(&mut self, name: QName, attrs: Vec<Attr>) -> NodeId {
        self.alloc(Node::new(NodeData::Element { name, attrs }))
    }

    /// Create a new text node (detached).
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(Node::new(NodeData::Text(text.into())))
    }

    pub fn create_cdata(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(Node::new(NodeData::CData(text.into())))
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.alloc(Node::new(NodeData::Comment(text.into())))
    }

    pub fn create_pi(&mut self, content: impl Into<String>) -> NodeId {
        self.alloc(Node::new(NodeData::ProcessingInstruction(content.into())))
    }

    pub fn create_doctype(&mut self, content: impl Into<String>) -> NodeId {
        self.alloc(Node::new(NodeData::Doctype(content.into())))
    }

    /// Append a child to a parent node.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);

        let last_child = self
            .get(parent)
            .map(|n| n.last_child)
            .unwrap_or(NodeId::NONE);

        if let Some(child_node) = self.get_mut(child) {
            child_node.parent = parent;
            child_node.prev_sibling = last_child;
            child_node.next_sibling = NodeId::NONE;
        }

        if last_child.is_some()
            && let Some(last_node) = self.get_mut(last_child)
        {
            last_node.next_sibling = child;
        }

        if let Some(parent_node) = self.get_mut(parent) {
            if parent_node.first_child.is_none() {
                parent_node.first_child = child;
            }
            parent_node.last_child = child;
        }
    }

    /// Append text to a parent, merging with an existing trailing text node.
    pub fn append_text(&mut self, parent: NodeId, text: &str) {
        let last_child = self
            .get(parent)
            .map(|n| n.last_child)
            .unwrap_or(NodeId::NONE);

        if let Some(last) = self.get_mut(last_child)
            && let NodeData::Text(existing) = &mut last.data
        {
            existing.push_str(text);
            return;
        }

        let text_node = self.create_text(text);
        self.append(parent, text_node);
    }

    /// Insert a node before an attached sibling.
    pub fn insert_before(&mut self, sibling: NodeId, new_node: NodeId) {
        self.detach(new_node);

        let parent = self
            .get(sibling)
            .map(|n| n.parent)
            .unwrap_or(NodeId::NONE);
        let prev = self
            .get(sibling)
            .map(|n| n.prev_sibling)
            .unwrap_or(NodeId::NONE);

        if let Some(new) = self.get_mut(new_node) {
            new.parent = parent;
            new.prev_sibling = prev;
            new.next_sibling = sibling;
        }

        if let Some(sib) = self.get_mut(sibling) {
            sib.prev_sibling = new_node;
        }

        if prev.is_some() {
            if let Some(p) = self.get_mut(prev) {
                p.next_sibling = new_node;
            }
        } else if let Some(par) = self.get_mut(parent) {
            par.first_child = new_node;
        }
    }

    /// Unlink a node from its parent and siblings. The node (and its
    /// subtree) stays in the arena and can be re-attached.
    pub fn detach(&mut self, id: NodeId) {
        let (parent, prev, next) = match self.get(id) {
            Some(n) => (n.parent, n.prev_sibling, n.next_sibling),
            None => return,
        };
        if parent.is_none() {
            return;
        }

        if prev.is_some() {
            if let Some(p) = self.get_mut(prev) {
                p.next_sibling = next;
            }
        } else if let Some(par) = self.get_mut(parent) {
            par.first_child = next;
        }

        if next.is_some() {
            if let Some(n) = self.get_mut(next) {
                n.prev_sibling = prev;
            }
        } else if let Some(par) = self.get_mut(parent) {
            par.last_child = prev;
        }

        if let Some(node) = self.get_mut(id) {
            node.parent = NodeId::NONE;
            node.prev_sibling = NodeId::NONE;
            node.next_sibling = NodeId::NONE;
        }
    }

    /// Parent of a node, if attached.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).map(|n| n.parent).filter(|p| p.is_some())
    }

    /// Iterate over children of a node.
    pub fn children(&self, parent: NodeId) -> ChildrenIter<'_> {
        let first = self
            .get(parent)
            .map(|n| n.first_child)
            .unwrap_or(NodeId::NONE);
        ChildrenIter {
            doc: self,
            current: first,
        }
    }

    /// Iterate over the subtree below a node, depth-first pre-order,
    /// excluding the node itself.
    pub fn descendants(&self, root: NodeId) -> DescendantsIter<'_> {
        let mut stack: Vec<NodeId> = self.children(root).collect();
        stack.reverse();
        DescendantsIter { doc: self, stack }
    }

    /// Find the first element matching a predicate (depth-first).
    pub fn find<F>(&self, predicate: F) -> Option<NodeId>
    where
        F: Fn(&Node) -> bool,
    {
        self.descendants(self.document)
            .find(|&id| self.get(id).is_some_and(|n| predicate(n)))
    }

    /// Find the first element with the given local name.
    pub fn find_by_tag(&self, tag: &str) -> Option<NodeId> {
        self.find(|node| {
            matches!(&node.data, NodeData::Element { name, .. } if name.local == tag)
        })
    }

    /// The `body` element, if present.
    pub fn body(&self) -> Option<NodeId> {
        self.find_by_tag("body")
    }

    /// The `head` element, if present.
    pub fn head(&self) -> Option<NodeId> {
        self.find_by_tag("head")
    }

    /// The document element (first element child of the virtual root).
    pub fn root_element(&self) -> Option<NodeId> {
        self.children(self.document)
            .find(|&id| self.is_element(id))
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over children of a node.
pub struct ChildrenIter<'a> {
    doc: &'a Document,
    current: NodeId,
}

impl<'a> Iterator for ChildrenIter<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current.is_none() {
            return None;
        }
        let id = self.current;
        self.current = self
            .doc
            .get(id)
            .map(|n| n.next_sibling)
            .unwrap_or(NodeId::NONE);
        Some(id)
    }
}

/// Depth-first pre-order iterator over a subtree.
pub struct DescendantsIter<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for DescendantsIter<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let mut children: Vec<NodeId> = self.doc.children(id).collect();
        children.reverse();
        self.stack.extend(children);
        Some(id)
    }
}

/// Convenience accessors for element and text nodes.
impl Document {
    /// Check if a node is an element.
    pub fn is_element(&self, id: NodeId) -> bool {
        self.get(id)
            .is_some_and(|n| matches!(n.data, NodeData::Element { .. }))
    }

    /// Check if a node is a text node.
    pub fn is_text(&self, id: NodeId) -> bool {
        self.get(id)
            .is_some_and(|n| matches!(n.data, NodeData::Text(_)))
    }

    /// Get an element's local name (tag).
    pub fn element_local(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Element { name, .. } => Some(name.local.as_str()),
            _ => None,
        })
    }

    /// Get an element's qualified name.
    pub fn element_name(&self, id: NodeId) -> Option<&QName> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Element { name, .. } => Some(name),
            _ => None,
        })
    }

    /// Get an attribute value by local name.
    pub fn attr(&self, id: NodeId, attr_name: &str) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|a| a.name.local == attr_name)
                .map(|a| a.value.as_str()),
            _ => None,
        })
    }

    /// Set an attribute (replacing an existing one with the same local name).
    pub fn set_attr(&mut self, id: NodeId, attr_name: &str, value: &str) {
        if let Some(node) = self.get_mut(id)
            && let NodeData::Element { attrs, .. } = &mut node.data
        {
            for attr in attrs.iter_mut() {
                if attr.name.local == attr_name {
                    attr.value = value.to_string();
                    return;
                }
            }
            attrs.push(Attr {
                name: QName::new(attr_name),
                value: value.to_string(),
            });
        }
    }

    /// Check if an element's `class` attribute contains the given class.
    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attr(id, "class")
            .is_some_and(|v| v.split_ascii_whitespace().any(|c| c == class))
    }

    /// Get the content of a text node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Text(s) | NodeData::CData(s) => Some(s.as_str()),
            _ => None,
        })
    }

    /// Concatenated text content of a subtree (the node itself included).
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let Some(t) = self.text(id) {
            out.push_str(t);
        }
        for desc in self.descendants(id) {
            if let Some(t) = self.text(desc) {
                out.push_str(t);
            }
        }
        out
    }

    /// Number of nodes allocated in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the document is empty (only the virtual root).
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }
}
