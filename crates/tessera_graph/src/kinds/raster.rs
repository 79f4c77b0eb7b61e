// SPDX-License-Identifier: MIT OR Apache-2.0
//! Raster processing kinds.
//!
//! These kinds carry no pixel pipeline; they model the connection rules of
//! sources, filters, combiners and writers.

use crate::factory::NodeRegistry;
use crate::keywords::{KeywordError, KeywordList};
use crate::node::{Node, NodeClass, NodeKind};
use crate::port::PortSpec;
use std::any::Any;

const FILENAME_KEY: &str = "filename";
const SCALE_KEY: &str = "scale";
const OUTPUT_TYPE_KEY: &str = "output_type";

/// Register the raster kinds
pub fn register(registry: &mut NodeRegistry) {
    registry.register_kind::<ImageHandler>();
    registry.register_kind::<ImageResampler>();
    registry.register_kind::<ImageMosaic>();
    registry.register_kind::<ImageFileWriter>();
}

fn is_image_source(candidate: &Node) -> bool {
    candidate.class().is_a(NodeClass::ImageSource)
}

/// Source reading a raster file
#[derive(Debug, Clone, Default)]
pub struct ImageHandler {
    /// Path of the raster
    pub filename: String,
}

impl NodeKind for ImageHandler {
    fn kind_name(&self) -> &'static str {
        "ImageHandler"
    }

    fn class(&self) -> NodeClass {
        NodeClass::ImageHandler
    }

    fn input_spec(&self) -> PortSpec {
        PortSpec::Fixed(0)
    }

    fn can_connect_input(&self, _index: usize, _candidate: &Node) -> bool {
        false
    }

    fn save_state(&self, record: &mut KeywordList, prefix: &str) {
        if !self.filename.is_empty() {
            record.add(prefix, FILENAME_KEY, &self.filename);
        }
    }

    fn load_state(&mut self, record: &KeywordList, prefix: &str) -> Result<(), KeywordError> {
        if let Some(filename) = record.find(prefix, FILENAME_KEY) {
            self.filename = filename.to_string();
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Single-input filter changing resolution
#[derive(Debug, Clone)]
pub struct ImageResampler {
    /// Output to input size ratio
    pub scale: f64,
}

impl Default for ImageResampler {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

impl NodeKind for ImageResampler {
    fn kind_name(&self) -> &'static str {
        "ImageResampler"
    }

    fn class(&self) -> NodeClass {
        NodeClass::ImageFilter
    }

    fn input_spec(&self) -> PortSpec {
        PortSpec::Fixed(1)
    }

    fn can_connect_input(&self, index: usize, candidate: &Node) -> bool {
        index == 0 && is_image_source(candidate)
    }

    fn save_state(&self, record: &mut KeywordList, prefix: &str) {
        record.add(prefix, SCALE_KEY, self.scale);
    }

    fn load_state(&mut self, record: &KeywordList, prefix: &str) -> Result<(), KeywordError> {
        if let Some(scale) = record.parse::<f64>(prefix, SCALE_KEY)? {
            if !scale.is_finite() || scale <= 0.0 {
                return Err(KeywordError::InvalidValue {
                    key: format!("{prefix}{SCALE_KEY}"),
                    value: scale.to_string(),
                });
            }
            self.scale = scale;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Combiner stacking any number of sources
#[derive(Debug, Clone, Default)]
pub struct ImageMosaic;

impl NodeKind for ImageMosaic {
    fn kind_name(&self) -> &'static str {
        "ImageMosaic"
    }

    fn class(&self) -> NodeClass {
        NodeClass::ImageCombiner
    }

    fn input_spec(&self) -> PortSpec {
        PortSpec::Dynamic(0)
    }

    fn can_connect_input(&self, _index: usize, candidate: &Node) -> bool {
        is_image_source(candidate)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Sink writing its single input to a file
#[derive(Debug, Clone)]
pub struct ImageFileWriter {
    /// Destination path
    pub filename: String,
    /// Output format name
    pub output_type: String,
}

impl Default for ImageFileWriter {
    fn default() -> Self {
        Self {
            filename: String::new(),
            output_type: "tiff".to_string(),
        }
    }
}

impl NodeKind for ImageFileWriter {
    fn kind_name(&self) -> &'static str {
        "ImageFileWriter"
    }

    fn class(&self) -> NodeClass {
        NodeClass::ImageWriter
    }

    fn input_spec(&self) -> PortSpec {
        PortSpec::Fixed(1)
    }

    fn output_spec(&self) -> PortSpec {
        PortSpec::Fixed(0)
    }

    fn can_connect_input(&self, index: usize, candidate: &Node) -> bool {
        index == 0 && is_image_source(candidate)
    }

    fn can_connect_output(&self, _index: usize, _candidate: &Node) -> bool {
        false
    }

    fn save_state(&self, record: &mut KeywordList, prefix: &str) {
        if !self.filename.is_empty() {
            record.add(prefix, FILENAME_KEY, &self.filename);
        }
        record.add(prefix, OUTPUT_TYPE_KEY, &self.output_type);
    }

    fn load_state(&mut self, record: &KeywordList, prefix: &str) -> Result<(), KeywordError> {
        if let Some(filename) = record.find(prefix, FILENAME_KEY) {
            self.filename = filename.to_string();
        }
        if let Some(output_type) = record.find(prefix, OUTPUT_TYPE_KEY) {
            self.output_type = output_type.to_string();
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities() {
        let handler = Node::new(ImageHandler::default());
        let writer = Node::new(ImageFileWriter::default());
        let resampler = ImageResampler::default();
        assert!(resampler.can_connect_input(0, &handler));
        assert!(!resampler.can_connect_input(1, &handler));
        assert!(!resampler.can_connect_input(0, &writer));
        assert!(ImageMosaic.can_connect_input(5, &handler));
        assert!(!ImageHandler::default().can_connect_input(0, &handler));
    }

    #[test]
    fn test_kind_state() {
        let mut record = KeywordList::new();
        let writer = ImageFileWriter {
            filename: "out.tif".to_string(),
            output_type: "png".to_string(),
        };
        writer.save_state(&mut record, "object1.");

        let mut restored = ImageFileWriter::default();
        restored.load_state(&record, "object1.").unwrap();
        assert_eq!(restored.filename, "out.tif");
        assert_eq!(restored.output_type, "png");

        record.add("object2.", SCALE_KEY, -2.0);
        let mut resampler = ImageResampler::default();
        assert!(resampler.load_state(&record, "object2.").is_err());
        assert_eq!(resampler.scale, 1.0);
    }
}
