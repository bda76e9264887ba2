use std::collections::BTreeSet;

use serde::Serialize;

use crate::{
    document::Document,
    error::Result,
    index_db::IndexDb,
    query::{QueryPlan, SearchFilters, Window},
    tokenizer::TextTokenizer,
};

/// Parameters for a search, independent of the CLI.
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    pub phrase: String,
    pub filters: SearchFilters,
    /// Reserved. Accepted but has no effect on matching.
    pub exact_match: bool,
    pub offset: usize,
    pub limit: Option<usize>,
}

/// Result of a search.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchOutcome {
    /// Distinct normalized tokens of the phrase, in phrase order.
    pub tokens: Vec<String>,
    /// Matches before `offset`/`limit` are applied.
    pub total: usize,
    /// Matching documents, ascending by id.
    pub documents: Vec<Document>,
}

/// Build the query plan for `params`.
pub fn plan_search(
    params: &SearchParams,
    tokenizer: &TextTokenizer,
) -> Result<QueryPlan> {
    let tokens = tokenizer.unique_tokens(&params.phrase)?;
    Ok(QueryPlan::new(tokens, &params.filters).with_window(Window {
        offset: params.offset,
        limit: params.limit,
    }))
}

/// Execute a search.
///
/// 1. Tokenize the phrase with the index's tokenizer
/// 2. Build a plan: one token predicate per distinct token plus one per
///    active filter
/// 3. Evaluate the plan against a single index snapshot
///
/// A phrase with no tokens matches nothing.
pub fn execute_search(
    params: &SearchParams,
    tokenizer: &TextTokenizer,
    index: &IndexDb,
) -> Result<SearchOutcome> {
    if params.exact_match {
        tracing::debug!("exact matching is reserved and has no effect");
    }

    let plan = plan_search(params, tokenizer)?;
    let tokens: Vec<String> = plan.tokens().map(str::to_string).collect();
    if plan.is_empty() {
        tracing::debug!(phrase = %params.phrase, "phrase has no tokens");
        return Ok(SearchOutcome {
            tokens,
            ..Default::default()
        });
    }

    tracing::debug!(%plan, "executing query plan");
    let result = index.query(&plan)?;

    Ok(SearchOutcome {
        tokens,
        total: result.total,
        documents: result.documents,
    })
}

/// Format results for human-readable terminal output.
///
/// Matched segments are wrapped in `[` `]`.
pub fn format_human(
    outcome: &SearchOutcome,
    tokenizer: &TextTokenizer,
) -> Result<String> {
    if outcome.total == 0 {
        return Ok("No results found.\n".to_string());
    }

    let tokens: BTreeSet<String> = outcome.tokens.iter().cloned().collect();
    let mut out = String::new();
    for doc in &outcome.documents {
        out.push_str(&format!(
            "{} S{:02}E{:02} {} --> {} #{}\n",
            doc.show, doc.season, doc.episode, doc.start, doc.end, doc.id
        ));
        let text = tokenizer.highlight(&doc.text, &tokens, "[", "]")?;
        for line in text.lines() {
            out.push_str(&format!("    {line}\n"));
        }
    }

    if outcome.documents.len() == outcome.total {
        out.push_str(&format!("\n{} result(s)\n", outcome.total));
    } else {
        out.push_str(&format!(
            "\n{} of {} result(s)\n",
            outcome.documents.len(),
            outcome.total
        ));
    }
    Ok(out)
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    query: &'a str,
    tokens: &'a [String],
    total: usize,
    result_count: usize,
    results: &'a [Document],
}

/// Format results as JSON output.
pub fn format_json(outcome: &SearchOutcome, query: &str) -> Result<String> {
    Ok(serde_json::to_string_pretty(&JsonOutput {
        query,
        tokens: &outcome.tokens,
        total: outcome.total,
        result_count: outcome.documents.len(),
        results: &outcome.documents,
    })?)
}
