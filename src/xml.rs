//! Minimal XML element tree
//!
//! Both the camera project file and the stitcher document are small,
//! attribute-heavy XML files. They are read into and written from a plain
//! owned [`Element`] tree using `quick-xml` events.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::fs;
use std::path::Path;

/// An XML element with ordered attributes and children
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: Option<String>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder-style attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(key, value);
        self
    }

    /// Builder-style text content
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Builder-style child
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Set an attribute, replacing an existing one with the same key.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(child);
    }

    /// First direct child with the given name
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Follow a slash-separated path of direct children, e.g. `"gyro/calibration"`.
    pub fn find(&self, path: &str) -> Option<&Element> {
        path.split('/')
            .filter(|part| !part.is_empty())
            .try_fold(self, |current, part| current.child(part))
    }

    /// Every element named `name` below this one, in document order.
    pub fn descendants<'a>(&'a self, name: &str) -> Vec<&'a Element> {
        let mut found = Vec::new();
        self.collect_descendants(name, &mut found);
        found
    }

    fn collect_descendants<'a>(&'a self, name: &str, found: &mut Vec<&'a Element>) {
        for child in &self.children {
            if child.name == name {
                found.push(child);
            }
            child.collect_descendants(name, found);
        }
    }

    /// Text content, trimmed; None when absent or empty
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    /// Parse a document and return its root element.
    pub fn parse(input: &str) -> Result<Element, XmlError> {
        let mut reader = Reader::from_str(input);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| XmlError::ParseError(e.to_string()))?;

            match event {
                Event::Start(start) => stack.push(element_from_start(&start)?),
                Event::Empty(start) => {
                    let element = element_from_start(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| XmlError::ParseError("unexpected closing tag".to_string()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    let text = text
                        .unescape()
                        .map_err(|e| XmlError::ParseError(e.to_string()))?;
                    append_text(&mut stack, &text);
                }
                Event::CData(data) => {
                    let raw = data.into_inner();
                    append_text(&mut stack, &String::from_utf8_lossy(&raw));
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(XmlError::Unclosed(open.name.clone()));
        }
        root.ok_or(XmlError::NoRoot)
    }

    /// Read and parse a file.
    pub fn parse_file(path: &Path) -> Result<Element, XmlError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| XmlError::IoError(format!("{}: {}", path.display(), e)))?;
        Self::parse(&contents)
    }

    /// Render as a UTF-8 document with declaration and two-space indentation.
    pub fn to_document_string(&self) -> Result<String, XmlError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(|e| XmlError::WriteError(e.to_string()))?;
        write_element(&mut writer, self)?;

        let mut out = String::from_utf8(writer.into_inner())
            .map_err(|e| XmlError::WriteError(e.to_string()))?;
        out.push('\n');
        Ok(out)
    }

    /// Render and write to `path`.
    pub fn write_document(&self, path: &Path) -> Result<(), XmlError> {
        let document = self.to_document_string()?;
        fs::write(path, document)
            .map_err(|e| XmlError::IoError(format!("{}: {}", path.display(), e)))
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element, XmlError> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| XmlError::ParseError(e.to_string()))?
        .to_string();

    let mut element = Element::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| XmlError::ParseError(e.to_string()))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| XmlError::ParseError(e.to_string()))?
            .to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| XmlError::ParseError(e.to_string()))?
            .to_string();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), XmlError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        return Ok(());
    }
    if root.is_some() {
        return Err(XmlError::MultipleRoots);
    }
    *root = Some(element);
    Ok(())
}

fn append_text(stack: &mut [Element], text: &str) {
    if let Some(current) = stack.last_mut() {
        current.text.get_or_insert_with(String::new).push_str(text);
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<(), XmlError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    let text = element.text.as_deref().filter(|t| !t.is_empty());
    if element.children.is_empty() && text.is_none() {
        return writer
            .write_event(Event::Empty(start))
            .map_err(|e| XmlError::WriteError(e.to_string()));
    }

    writer
        .write_event(Event::Start(start))
        .map_err(|e| XmlError::WriteError(e.to_string()))?;
    if let Some(text) = text {
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(|e| XmlError::WriteError(e.to_string()))?;
    }
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(|e| XmlError::WriteError(e.to_string()))
}

/// XML errors
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("XML parse error: {0}")]
    ParseError(String),

    #[error("XML write error: {0}")]
    WriteError(String),

    #[error("document has no root element")]
    NoRoot,

    #[error("document has more than one root element")]
    MultipleRoots,

    #[error("element <{0}> is never closed")]
    Unclosed(String),
}
