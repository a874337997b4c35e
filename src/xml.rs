// 📄 XML Tree - minimal namespace-aware document model
//
// Thin layer over quick-xml: parse a whole document into an Element tree
// (input sizes fit in memory, per the batch design), and serialize a
// built tree back out with declaration, CDATA and comment nodes intact.
//
// Parsed elements carry their resolved namespace URI and local name.
// Built elements use prefixed names directly ("wp:post_id") with the
// xmlns attributes declared on the root; `namespace` stays None.

use anyhow::{bail, Context, Result};
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;
use quick_xml::writer::Writer;
use std::fs::File;
use std::io::{BufRead, BufWriter, Write as IoWrite};
use std::path::Path;

/// A child of an element: nested element, character data, or comment
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
}

/// One XML element with attributes and ordered children
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    /// Local name when parsed; prefixed name when built for output
    pub name: String,

    /// Resolved namespace URI (parse side only)
    pub namespace: Option<String>,

    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Element {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Builder: add an attribute
    pub fn with_attr(mut self, key: &str, value: &str) -> Self {
        self.attributes.push((key.to_string(), value.to_string()));
        self
    }

    /// Builder: add a nested element
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    /// Builder: add a text node
    pub fn with_text(mut self, text: &str) -> Self {
        self.children.push(Node::Text(text.to_string()));
        self
    }

    /// Builder: add a CDATA node
    pub fn with_cdata(mut self, text: &str) -> Self {
        self.children.push(Node::CData(text.to_string()));
        self
    }

    /// Builder: add a comment node
    pub fn with_comment(mut self, text: &str) -> Self {
        self.children.push(Node::Comment(text.to_string()));
        self
    }

    pub fn push_child(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// First child element matching namespace + local name
    pub fn find(&self, namespace: Option<&str>, name: &str) -> Option<&Element> {
        self.find_all(namespace, name).next()
    }

    /// All child elements matching namespace + local name, in order.
    /// The keys are owned by the iterator, so the returned borrows only
    /// tie to the tree itself.
    pub fn find_all<'a>(
        &'a self,
        namespace: Option<&str>,
        name: &str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        let name = name.to_string();
        let namespace = namespace.map(str::to_string);

        self.children.iter().filter_map(move |node| match node {
            Node::Element(el) if el.name == name && el.namespace == namespace => Some(el),
            _ => None,
        })
    }

    /// Attribute value by (qualified) name
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Concatenated text + CDATA content of this element
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            match node {
                Node::Text(t) | Node::CData(t) => out.push_str(t),
                _ => {}
            }
        }
        out
    }

    /// Parse a document from a file, returning the root element
    pub fn parse_file(path: &Path) -> Result<Element> {
        let reader = NsReader::from_file(path)
            .with_context(|| format!("cannot open {}", path.display()))?;
        parse_document(reader).with_context(|| format!("malformed XML in {}", path.display()))
    }

    /// Parse a document from a string, returning the root element
    pub fn parse_str(input: &str) -> Result<Element> {
        parse_document(NsReader::from_str(input))
    }

    /// Serialize this element as a complete document into a writer
    pub fn write_document<W: IoWrite>(&self, sink: W) -> Result<()> {
        let mut writer = Writer::new(sink);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        write_element(&mut writer, self)?;
        Ok(())
    }

    /// Serialize this element as a complete document to a file
    pub fn write_file(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("cannot create {}", path.display()))?;
        self.write_document(BufWriter::new(file))
    }

    /// Serialize to an in-memory string (mainly for tests)
    pub fn to_document_string(&self) -> Result<String> {
        let mut out = Vec::new();
        self.write_document(&mut out)?;
        Ok(String::from_utf8(out)?)
    }
}

fn parse_document<R: BufRead>(mut reader: NsReader<R>) -> Result<Element> {
    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let (ns, event) = reader.read_resolved_event_into(&mut buf)?;
        match event {
            Event::Start(start) => {
                let el = element_from_start(&ns, &start)?;
                stack.push(el);
            }
            Event::Empty(start) => {
                let el = element_from_start(&ns, &start)?;
                attach(&mut stack, &mut root, el);
            }
            Event::End(_) => {
                let el = stack.pop().context("unbalanced closing tag")?;
                attach(&mut stack, &mut root, el);
            }
            Event::Text(text) => {
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(Node::Text(text.unescape()?.into_owned()));
                }
            }
            Event::CData(cdata) => {
                if let Some(parent) = stack.last_mut() {
                    let content = String::from_utf8_lossy(&cdata.into_inner()).into_owned();
                    parent.children.push(Node::CData(content));
                }
            }
            // declaration, comments, PIs and doctype carry no model data
            Event::Decl(_) | Event::Comment(_) | Event::PI(_) | Event::DocType(_) => {}
            Event::Eof => break,
        }
        buf.clear();
    }

    match root {
        Some(el) => Ok(el),
        None => bail!("document has no root element"),
    }
}

fn element_from_start(ns: &ResolveResult, start: &BytesStart) -> Result<Element> {
    let mut el = Element::new(&String::from_utf8_lossy(start.local_name().as_ref()));

    el.namespace = match ns {
        ResolveResult::Bound(namespace) => {
            Some(String::from_utf8_lossy(namespace.0).into_owned())
        }
        _ => None,
    };

    for attr in start.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        el.attributes.push((key, value));
    }

    Ok(el)
}

fn attach(stack: &mut Vec<Element>, root: &mut Option<Element>, el: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(el)),
        None => *root = Some(el),
    }
}

fn write_element<W: IoWrite>(writer: &mut Writer<W>, el: &Element) -> Result<()> {
    let mut start = BytesStart::new(el.name.as_str());
    for (key, value) in &el.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }
    writer.write_event(Event::Start(start))?;

    for node in &el.children {
        match node {
            Node::Element(child) => write_element(writer, child)?,
            Node::Text(text) => writer.write_event(Event::Text(BytesText::new(text)))?,
            Node::CData(text) => write_cdata(writer, text)?,
            Node::Comment(text) => writer.write_event(Event::Comment(BytesText::new(text)))?,
        }
    }

    writer.write_event(Event::End(BytesEnd::new(el.name.as_str())))?;
    Ok(())
}

/// A CDATA section cannot contain its own "]]>" terminator. Content is
/// arbitrary HTML, so every occurrence is split across two adjacent
/// sections ("]]" ends one, ">" starts the next); readers concatenate
/// them back to the original text.
fn write_cdata<W: IoWrite>(writer: &mut Writer<W>, text: &str) -> Result<()> {
    let mut parts = text.split("]]>").peekable();

    while let Some(part) = parts.next() {
        if parts.peek().is_some() {
            writer.write_event(Event::CData(BytesCData::new(format!("{}]]", part))))?;
            writer.write_event(Event::CData(BytesCData::new(">")))?;
        } else {
            writer.write_event(Event::CData(BytesCData::new(part)))?;
        }
    }

    Ok(())
}
