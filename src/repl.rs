//! Interactive query loop for the command line.

use std::io::{BufRead, Write};

use scholar_retrieval::{Orchestrator, QueryResponse};

use crate::error::Result;

/// Prompt printed before each line of input.
const PROMPT: &str = "> ";

/// Inputs that end the session (case-insensitive).
const EXIT_WORDS: &[&str] = &["exit", "quit"];

/// Print a query response the way the REPL and `scholar query` show it.
///
/// # Errors
///
/// Returns an error if `output` cannot be written.
pub fn print_response(output: &mut impl Write, response: &QueryResponse) -> Result<()> {
    writeln!(output, "\nTop Results ({} mode):\n", response.mode)?;
    if response.hits.is_empty() {
        writeln!(output, "No results.")?;
    } else {
        write!(output, "{}", response.results)?;
    }
    for report in response
        .sources
        .iter()
        .filter(|r| !matches!(r.status, scholar_retrieval::SourceStatus::Ok { .. }))
    {
        writeln!(output, "  ({} source did not answer)", report.source)?;
    }
    writeln!(output, "\n---\n")?;
    Ok(())
}

/// Read queries from `input` until EOF or `exit`/`quit`, printing each
/// fused context to `output`.
///
/// Queries starting with `author:` or `recent` are routed accordingly.
///
/// # Errors
///
/// Returns an error only on I/O failure; query failures are printed and
/// the loop continues.
pub async fn run(
    orchestrator: &Orchestrator,
    mut input: impl BufRead,
    mut output: impl Write,
) -> Result<()> {
    writeln!(
        output,
        "Research Assistant CLI. Type your query (or 'exit' to quit):"
    )?;
    let mut line = String::new();
    loop {
        write!(output, "{PROMPT}")?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if EXIT_WORDS.iter().any(|w| query.eq_ignore_ascii_case(w)) {
            break;
        }

        match orchestrator.answer(query, None).await {
            Ok(response) => print_response(&mut output, &response)?,
            Err(e) => writeln!(output, "error: {e}")?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use scholar_retrieval::RetrievalConfig;
    use std::io::Cursor;

    fn orchestrator() -> Orchestrator {
        Orchestrator::new(RetrievalConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn exit_ends_session() {
        let mut out = Vec::new();
        run(&orchestrator(), Cursor::new("QUIT\nnever reached\n"), &mut out)
            .await
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Research Assistant CLI."));
        assert!(!text.contains("Top Results"));
    }

    #[tokio::test]
    async fn queries_print_results_until_eof() {
        let mut out = Vec::new();
        run(&orchestrator(), Cursor::new("\nauthor: Jane Doe\n"), &mut out)
            .await
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Top Results (author mode)"));
        assert!(text.contains("No results."));
        assert!(text.contains("graph source did not answer"));
    }
}
