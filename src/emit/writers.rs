use anyhow::{anyhow, Result};
use std::io::Write;

use super::{ConsensusRun, RunStatus, RunSummary};
use crate::caller::ConsensusCall;

/// Column header of the per-position report.
pub const TSV_HEADER: &str = "#reference\tposition\tcall\tkind\tsurviving_depth\traw_depth\texcess_depth\tconfidence\tforced_no_call\n";

/// Bases per FASTA line.
pub const FASTA_LINE_WIDTH: usize = 60;

/// One report line for `call`, newline included.
pub fn tsv_row(call: &ConsensusCall) -> String {
    format!(
        "{reference}\t{position}\t{called}\t{kind}\t{surviving}\t{raw}\t{excess}\t{confidence:.4}\t{forced}\n",
        reference = call.reference,
        position = call.position,
        called = call.called,
        kind = call.kind,
        surviving = call.surviving_depth,
        raw = call.raw_depth,
        excess = call.excess_depth,
        confidence = call.confidence,
        forced = call.is_forced_no_call,
    )
}

/// Comment line closing the report of a run that did not complete.
pub fn status_trailer(status: &RunStatus) -> Option<String> {
    if status.is_complete() {
        None
    } else {
        Some(format!("# status: {status}\n"))
    }
}

/// Write the per-position report.
///
/// A run that did not complete ends with a [`status_trailer`] line.
pub fn write_tsv<W: Write>(writer: &mut W, run: &ConsensusRun) -> Result<()> {
    writer.write_all(TSV_HEADER.as_bytes())?;
    for call in &run.calls {
        writer.write_all(tsv_row(call).as_bytes())?;
    }
    if let Some(trailer) = status_trailer(run.status()) {
        writer.write_all(trailer.as_bytes())?;
    }
    writer.flush()?;
    Ok(())
}

/// Render the per-position report into a string (useful for tests and snapshots).
pub fn render_tsv(run: &ConsensusRun) -> Result<String> {
    let mut buffer = Vec::new();
    write_tsv(&mut buffer, run)?;
    String::from_utf8(buffer).map_err(|_| anyhow!("rendered TSV is not valid UTF-8"))
}

/// Write one FASTA record per reference.
///
/// Headers are `>{reference}`, or `>{sample} {reference}` when a sample name
/// is given. Records of a run that did not complete carry
/// `incomplete: {status}` at the end of the header.
pub fn write_fasta<W: Write>(writer: &mut W, run: &ConsensusRun, sample: Option<&str>) -> Result<()> {
    let status = run.status();
    for (reference, sequence) in run.consensus_sequences() {
        match sample {
            Some(sample) => write!(writer, ">{sample} {reference}")?,
            None => write!(writer, ">{reference}")?,
        }
        if !status.is_complete() {
            write!(writer, " incomplete: {status}")?;
        }
        writer.write_all(b"\n")?;
        for line in sequence.chunks(FASTA_LINE_WIDTH) {
            writer.write_all(line)?;
            writer.write_all(b"\n")?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Render the consensus FASTA into a string.
pub fn render_fasta(run: &ConsensusRun, sample: Option<&str>) -> Result<String> {
    let mut buffer = Vec::new();
    write_fasta(&mut buffer, run, sample)?;
    String::from_utf8(buffer).map_err(|_| anyhow!("rendered FASTA is not valid UTF-8"))
}

/// Write the run summary as pretty-printed JSON.
pub fn write_summary_json<W: Write>(writer: &mut W, summary: &RunSummary) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, summary)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
