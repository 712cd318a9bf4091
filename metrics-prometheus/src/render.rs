use metrics_storage::MetricFamilySamples;

use crate::formatting::{write_help_line, write_metric_line, write_type_line};

/// Content type of the output of [`TextRenderer`].
pub const MIME_TYPE: &str = "text/plain; version=0.0.4";

/// Renders metric families in the Prometheus [text exposition format].
///
/// Each family is written as an optional `# HELP` line (omitted when the help text is empty), a
/// `# TYPE` line, one line per sample, and a trailing blank line.  Families and samples are written
/// in the order given.
///
/// [text exposition format]: https://github.com/prometheus/docs/blob/main/content/docs/instrumenting/exposition_formats.md#text-format-details
#[derive(Clone, Copy, Debug, Default)]
pub struct TextRenderer;

impl TextRenderer {
    /// Creates a new `TextRenderer`.
    pub fn new() -> TextRenderer {
        TextRenderer
    }

    /// Renders the given metric families.
    pub fn render(&self, families: &[MetricFamilySamples]) -> String {
        let mut output = String::new();

        for family in families {
            if !family.help().is_empty() {
                write_help_line(&mut output, family.name(), family.help());
            }
            write_type_line(&mut output, family.name(), family.kind().as_str());

            for sample in family.samples() {
                write_metric_line(&mut output, sample.name(), sample.labels(), sample.value());
            }

            output.push('\n');
        }

        output
    }

    /// Gets the content type of the rendered output.
    pub fn mime_type(&self) -> &'static str {
        MIME_TYPE
    }
}
