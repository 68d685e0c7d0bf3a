//! Rendering the stitcher document
//!
//! The stitcher reads a `stitchParam` XML document. Sections nest as
//! elements and plain fields flatten into attributes, in declaration order.
//! A few elements (video groups, gyro files) come from the stitch source
//! rather than the settings graph.

use flugelhorn_settings::{Section, Value};
use std::path::Path;

use crate::source::{StitchSource, VideoGroup};
use crate::xml::{Element, XmlError};

/// Root element name expected by the stitcher
pub const ROOT_ELEMENT: &str = "stitchParam";

/// Gyro fields rendered as attributes; the rest of the gyro section is
/// rendered as child elements.
const GYRO_ATTRIBUTES: &[&str] = &["version", "type", "enable", "filter"];

/// Render a fully populated settings graph and its source.
pub fn render(config: &Section, source: &StitchSource) -> Result<Element, RenderError> {
    let lens_count = lens_count(config)?;
    if source.media.is_empty() {
        return Err(RenderError::Shape("stitch source has no video groups".to_string()));
    }

    let mut input = attributes_element("input", section(config, "input")?);
    for (index, group) in source.media.iter().enumerate() {
        input.push(video_group(index, group, lens_count)?);
    }

    let blend = attributes_element("blend", section(config, "blend")?).with_child(
        attributes_element("calibration", section(config, "blend.calibration")?),
    );

    let preference = Element::new("preference")
        .with_child(attributes_element("encode", section(config, "preference.encode")?))
        .with_child(attributes_element("decode", section(config, "preference.decode")?))
        .with_child(attributes_element("blender", section(config, "preference.blender")?));

    let output = attributes_element("output", section(config, "output")?)
        .with_child(attributes_element("video", section(config, "video")?))
        .with_child(attributes_element("audio", section(config, "audio")?));

    let document = Element::new(ROOT_ELEMENT)
        .with_child(input)
        .with_child(blend)
        .with_child(preference)
        .with_child(gyro(config)?)
        .with_child(attributes_element("color", section(config, "color")?))
        .with_child(attributes_element("depthMap", section(config, "depthMap")?))
        .with_child(output);

    Ok(document)
}

/// Render and write the document to `path`.
pub fn write_document(
    config: &Section,
    source: &StitchSource,
    path: &Path,
) -> Result<(), RenderError> {
    let document = render(config, source)?;
    document.write_document(path)?;
    tracing::info!(path = %path.display(), "wrote stitch document");
    Ok(())
}

fn lens_count(config: &Section) -> Result<usize, RenderError> {
    let value = config
        .get("input.lensCount")
        .ok_or_else(|| RenderError::Shape("missing field input.lensCount".to_string()))?;
    match value.as_i64() {
        Some(n) if n > 0 => Ok(n as usize),
        _ => Err(RenderError::Shape(format!(
            "input.lensCount must be a positive integer, got {}",
            value
        ))),
    }
}

fn section<'a>(config: &'a Section, path: &str) -> Result<&'a Section, RenderError> {
    path.split('.')
        .try_fold(config, |current, name| current.section(name))
        .ok_or_else(|| RenderError::Shape(format!("missing section {}", path)))
}

/// An element whose attributes are the section's fields.
fn attributes_element(name: &str, section: &Section) -> Element {
    let mut element = Element::new(name);
    for field in section.fields() {
        if let Some(value) = field.value().to_attribute() {
            element.attributes.push((field.name().to_string(), value));
        }
    }
    element
}

fn video_group(index: usize, group: &VideoGroup, lens_count: usize) -> Result<Element, RenderError> {
    if group.slots.len() != lens_count {
        return Err(RenderError::Shape(format!(
            "video group {} has {} files, expected {}",
            index,
            group.slots.len(),
            lens_count
        )));
    }

    let mut element = Element::new("videoGroup")
        .with_attribute("ptsOffset", format!("{:.3}", group.pts_offset))
        .with_attribute("enable", "1")
        .with_child(
            Element::new("trim")
                .with_attribute("start", format!("{:.3}", group.start))
                .with_attribute("end", format!("{:.3}", group.end)),
        );

    for (slot, path) in group.slots.iter().enumerate() {
        if path.as_os_str().is_empty() {
            return Err(RenderError::Shape(format!(
                "video group {} slot {} has no file",
                index, slot
            )));
        }
        element.push(Element::new("file").with_attribute("src", path.to_string_lossy()));
    }

    Ok(element)
}

fn gyro(config: &Section) -> Result<Element, RenderError> {
    let gyro = section(config, "gyro")?;

    let mut element = Element::new("gyro");
    for name in GYRO_ATTRIBUTES {
        if let Some(value) = field_value(gyro, name)?.to_attribute() {
            element.attributes.push((name.to_string(), value));
        }
    }

    element.push(text_element("timeOffset", field_value(gyro, "timeOffset")?));
    element.push(
        Element::new("files").with_child(text_element("file", field_value(gyro, "filename")?)),
    );
    element.push(attributes_element("calibration", section(config, "gyro_calibration")?));
    element.push(attributes_element("angle", section(config, "gyro_angle")?));

    Ok(element)
}

fn field_value<'a>(section: &'a Section, name: &str) -> Result<&'a Value, RenderError> {
    section
        .field(name)
        .map(|field| field.value())
        .ok_or_else(|| RenderError::Shape(format!("missing field {}.{}", section.path(), name)))
}

fn text_element(name: &str, value: &Value) -> Element {
    let element = Element::new(name);
    match value.to_attribute() {
        Some(text) => element.with_text(text),
        None => element,
    }
}

/// Rendering errors
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("serialization shape error: {0}")]
    Shape(String),

    #[error(transparent)]
    Xml(#[from] XmlError),
}
