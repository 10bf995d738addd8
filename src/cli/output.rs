//! Output formatting utilities

use serde::Serialize;

use crate::error::{SavesnapError, SavesnapResult};

/// Output format for command results on stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

/// Render a serializable value as JSON or YAML
///
/// Returns `None` for `Text`; callers print their own text rendering.
pub fn render<T: Serialize>(data: &T, format: OutputFormat) -> SavesnapResult<Option<String>> {
    match format {
        OutputFormat::Text => Ok(None),
        OutputFormat::Json => Ok(Some(serde_json::to_string_pretty(data)?)),
        OutputFormat::Yaml => serde_yaml::to_string(data)
            .map(Some)
            .map_err(|e| SavesnapError::Serialization(e.to_string())),
    }
}

/// Print `data` in `format`, using `text` for the human-readable form
pub fn print_output<T: Serialize>(
    data: &T,
    format: OutputFormat,
    text: impl FnOnce() -> String,
) -> SavesnapResult<()> {
    match render(data, format)? {
        Some(rendered) => println!("{}", rendered.trim_end()),
        None => print!("{}", text()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Sample {
        name: &'static str,
        count: u32,
    }

    #[test]
    fn test_render_formats() {
        let sample = Sample {
            name: "snap",
            count: 2,
        };

        assert_eq!(render(&sample, OutputFormat::Text).unwrap(), None);

        let json = render(&sample, OutputFormat::Json).unwrap().unwrap();
        assert!(json.contains("\"name\": \"snap\""));

        let yaml = render(&sample, OutputFormat::Yaml).unwrap().unwrap();
        assert!(yaml.contains("count: 2"));
    }
}
