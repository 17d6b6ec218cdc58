pub mod table;
pub mod views;

use std::io::{self, Write};

use ferrodcf_core::Envelope;
use serde_json::Value;

pub use self::table::Table;
use crate::cli::OutputFormat;
use crate::error::CliError;

pub fn render(
    envelope: &Envelope<Value>,
    tables: &[Table],
    format: OutputFormat,
    pretty: bool,
) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    match format {
        OutputFormat::Json => write_json(&mut writer, envelope, pretty)?,
        OutputFormat::Table => write_tables(&mut writer, envelope, tables)?,
    }
    writer.flush()?;
    Ok(())
}

pub fn write_json<W: Write>(
    writer: &mut W,
    envelope: &Envelope<Value>,
    pretty: bool,
) -> Result<(), CliError> {
    let payload = if pretty {
        serde_json::to_string_pretty(envelope)?
    } else {
        serde_json::to_string(envelope)?
    };
    writeln!(writer, "{payload}")?;
    Ok(())
}

/// Tables first, then warnings and errors. Falls back to the JSON data when
/// a command produced no tables.
pub fn write_tables<W: Write>(
    writer: &mut W,
    envelope: &Envelope<Value>,
    tables: &[Table],
) -> Result<(), CliError> {
    if tables.is_empty() && !envelope.data.is_null() {
        writeln!(writer, "{}", serde_json::to_string_pretty(&envelope.data)?)?;
    }
    for (index, table) in tables.iter().enumerate() {
        if index > 0 {
            writeln!(writer)?;
        }
        write!(writer, "{table}")?;
    }

    if !envelope.meta.warnings.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "warnings:")?;
        for warning in &envelope.meta.warnings {
            writeln!(writer, "  - {warning}")?;
        }
    }

    if !envelope.errors.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "errors:")?;
        for error in &envelope.errors {
            writeln!(writer, "  - {}: {}", error.code, error.message)?;
        }
    }

    let sources = envelope
        .meta
        .source_chain
        .iter()
        .map(|source| source.as_str())
        .collect::<Vec<_>>()
        .join(",");
    writeln!(writer)?;
    writeln!(
        writer,
        "request {} | sources {} | {} ms | cache_hit {}",
        envelope.meta.request_id, sources, envelope.meta.latency_ms, envelope.meta.cache_hit
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrodcf_core::{EnvelopeError, EnvelopeMeta, ProviderId};
    use serde_json::json;

    fn envelope(errors: Vec<EnvelopeError>) -> Envelope<Value> {
        let mut meta =
            EnvelopeMeta::new("request-12345", vec![ProviderId::Yahoo, ProviderId::Fred], 7, false)
                .expect("meta");
        meta.push_warning("no beta reported for ACME; using 1.00");
        Envelope::with_errors(meta, json!({"ticker": "ACME"}), errors).expect("envelope")
    }

    #[test]
    fn json_output_is_a_single_line_unless_pretty() {
        let mut buffer = Vec::new();
        write_json(&mut buffer, &envelope(Vec::new()), false).expect("render");
        let rendered = String::from_utf8(buffer).expect("utf8");
        assert_eq!(rendered.lines().count(), 1);

        let parsed: Value = serde_json::from_str(&rendered).expect("valid json");
        assert_eq!(parsed["data"]["ticker"], "ACME");
        assert_eq!(parsed["meta"]["source_chain"], json!(["yahoo", "fred"]));
    }

    #[test]
    fn table_output_lists_warnings_and_errors() {
        let error = EnvelopeError::new("valuation.invalid_input", "terminal growth too high")
            .expect("error");
        let mut table = Table::key_value("Inputs");
        table.push_pair("Beta", "1.00");

        let mut buffer = Vec::new();
        write_tables(&mut buffer, &envelope(vec![error]), &[table]).expect("render");
        let rendered = String::from_utf8(buffer).expect("utf8");

        assert!(rendered.starts_with("Inputs\n  Beta  1.00\n"));
        assert!(rendered.contains("warnings:\n  - no beta reported"));
        assert!(rendered.contains("errors:\n  - valuation.invalid_input: terminal growth too high"));
        assert!(rendered.contains("sources yahoo,fred"));
    }
}
