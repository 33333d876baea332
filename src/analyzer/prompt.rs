//! Prompt template and few-shot examples for the query analyzer

use crate::llm::ChatMessage;

use super::quarter_months;

/// Render the analyzer prompt for one query against a reference date.
pub fn analyzer_prompt(query: &str, year: i32, month: u32) -> String {
    let quarter_table: String = (1..=4)
        .map(|q| {
            format!(
                "   - Q{q}: months={:?}\n",
                quarter_months(q).iter().collect::<Vec<_>>()
            )
        })
        .collect();

    format!(
        r#"Analyze this query for company, temporal, and content information.
Current Reference Date: {year}-{month}
Query: {query}

For companies:
1. Identify the primary company name, country of origin, and industry context.
2. Generate name variations with strict ordering priority:
   - Primary/shortest clear English name first (must be meaningful)
   - Stock ticker ONLY if major listed company (e.g., SBUX, ATRA)
   - Common alternative English forms
   - For non-English companies: primary native script after English, then
     full native script variations

   Examples of good ordering:
   - Samsung SDS -> ["Samsung", "삼성", "Samsung SDS", "삼성SDS"]
   - Starbucks -> ["Starbucks", "SBUX", "Starbucks Coffee"]
   - Shin-Etsu -> ["Shin-Etsu", "信越", "Shinetsu", "信越化学工業"]

   Avoid single letters, redundant legal forms ("Co., Ltd."), and partial names.

For temporal information:
1. Basic handling:
   - Convert all months to integers (1-12)
   - If no temporal info: all null, confidence = 0
   - When ONLY relative terms are present, calculate from the reference date:
     "Recent" = last 3-6 months, "Latest" = last 3 months
   - Use explicit dates from the query when present

2. Quarter period guidelines (months span the pre/post-announcement window):
{quarter_table}   - ALWAYS include quarter info when a specific quarter is mentioned
   - Example: "Q2 2024" -> quarter: {{"number": [2], "year": [2024]}}
   - Multi-year: include all relevant years (e.g., Q4 2024 + Jan 2025)

For content information:
1. Key terms ordered by search effectiveness: core business terms first,
   then native translations for non-English companies, then specific
   product/technical terms. Skip generic words and time references.
2. For non-English companies, each English term MUST be immediately followed
   by its native translation:
   - ["earnings", "실적", "call", "발표"]
   - ["game", "게임", "release", "출시"]

Confidence scoring:
- High (0.9-0.95): well-known companies, explicit dates, clear actions
- Medium (0.8-0.89): less specific ranges, derived information
- Low (0.7-0.79): vague references, uncommon companies
- Zero: missing or uncertain information

Output JSON with:
{{
    "thought_process": [clear steps explaining reasoning],
    "company_info": {{
        "name": "primary name",
        "origin": "country",
        "variations": ["ordered by search priority"],
        "confidence": 0-1
    }},
    "temporal_info": {{
        "years": [list of integers] or null,
        "months": [list of integers 1-12] or null,
        "quarter": {{"number": [1-4] or null, "year": [integer] or null}},
        "confidence": 0-1
    }},
    "content_info": {{
        "domain": "business domain",
        "key_terms": ["ordered by search effectiveness"],
        "action_type": "specific action",
        "confidence": 0-1
    }},
    "original_query": "query string"
}}"#
    )
}

/// Few-shot examples anchoring the output schema and variation ordering.
pub fn example_messages() -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(
            "You are a query analyzer for an email retrieval system over \
             financial research conversations. You extract structured company, \
             temporal, and content facets and respond with JSON only.",
        ),
        ChatMessage::user(
            "Analyze this query for company, temporal, and content information.\n\
             Current Reference Date: 2025-2\n\
             Query: What did Krafton announce about game releases in early 2025?",
        ),
        ChatMessage::assistant(
            r#"{
    "thought_process": [
        "First, I identify the company: Krafton, a Korean game developer",
        "Then, I resolve 'early 2025' to the first months of 2025",
        "Finally, I extract content terms with Korean translations paired"
    ],
    "company_info": {
        "name": "Krafton",
        "origin": "South Korea",
        "variations": ["Krafton", "크래프톤"],
        "confidence": 0.95
    },
    "temporal_info": {
        "years": [2025],
        "months": [1, 2, 3],
        "quarter": null,
        "confidence": 0.85
    },
    "content_info": {
        "domain": "gaming",
        "key_terms": ["game", "게임", "release", "출시"],
        "action_type": "announcement",
        "confidence": 0.9
    },
    "original_query": "What did Krafton announce about game releases in early 2025?"
}"#,
        ),
        ChatMessage::user(
            "Analyze this query for company, temporal, and content information.\n\
             Current Reference Date: 2025-2\n\
             Query: Summarize the latest semiconductor market trends",
        ),
        ChatMessage::assistant(
            r#"{
    "thought_process": [
        "First, I check for a company: none is named, so confidence is 0",
        "Then, I resolve 'latest' against the reference date 2025-2 to the last 3 months",
        "Finally, I extract the domain terms"
    ],
    "company_info": {
        "name": null,
        "origin": null,
        "variations": null,
        "confidence": 0.0
    },
    "temporal_info": {
        "years": [2024, 2025],
        "months": [12, 1, 2],
        "quarter": null,
        "confidence": 0.8
    },
    "content_info": {
        "domain": "semiconductors",
        "key_terms": ["semiconductor", "market", "trend"],
        "action_type": "analysis",
        "confidence": 0.85
    },
    "original_query": "Summarize the latest semiconductor market trends"
}"#,
        ),
    ]
}
