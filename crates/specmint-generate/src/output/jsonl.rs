use std::io::Write;

use crate::errors::GenerationError;
use crate::model::GeneratedRecord;

/// One compact JSON object per line, in slice order.
pub(crate) fn write_lines<W: Write>(
    mut writer: W,
    records: &[GeneratedRecord],
) -> Result<W, GenerationError> {
    for record in records {
        serde_json::to_writer(&mut writer, &record.data)?;
        writer.write_all(b"\n")?;
    }
    Ok(writer)
}

/// A pretty-printed JSON array of the record payloads.
pub(crate) fn write_array<W: Write>(
    mut writer: W,
    records: &[GeneratedRecord],
) -> Result<W, GenerationError> {
    let payloads: Vec<_> = records.iter().map(|record| &record.data).collect();
    serde_json::to_writer_pretty(&mut writer, &payloads)?;
    writer.write_all(b"\n")?;
    Ok(writer)
}
