//! Output serialization for rendered documents.

use authgen_config::OutputFormat;
use authgen_core::CompileError;

use crate::model::EnvoyFilter;

/// Turns a rendered EnvoyFilter into text.
pub trait DocumentSerializer: Send + Sync {
    fn format(&self) -> OutputFormat;

    fn serialize(&self, document: &EnvoyFilter) -> Result<String, CompileError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct YamlSerializer;

impl DocumentSerializer for YamlSerializer {
    fn format(&self) -> OutputFormat {
        OutputFormat::Yaml
    }

    fn serialize(&self, document: &EnvoyFilter) -> Result<String, CompileError> {
        serde_yaml::to_string(document).map_err(CompileError::serialization)
    }
}

/// Pretty-printed JSON with a trailing newline.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl DocumentSerializer for JsonSerializer {
    fn format(&self) -> OutputFormat {
        OutputFormat::Json
    }

    fn serialize(&self, document: &EnvoyFilter) -> Result<String, CompileError> {
        let mut out = serde_json::to_string_pretty(document).map_err(CompileError::serialization)?;
        out.push('\n');
        Ok(out)
    }
}

pub fn serializer_for(format: OutputFormat) -> Box<dyn DocumentSerializer> {
    match format {
        OutputFormat::Yaml => Box::new(YamlSerializer),
        OutputFormat::Json => Box::new(JsonSerializer),
    }
}
