//! Exact/fuzzy/semantic search over the tool & provider catalog, plus
//! ranking, suggestions, and a sensitive-data scan on results.
//!
//! This sits above [`crate::repository::ToolRepository`]: it takes a
//! snapshot read of the catalog and never mutates it, so it composes with
//! whatever locking discipline the repository implementation uses.

use crate::providers::base::Provider;
use crate::repository::ToolRepository;
use crate::security::{scan_for_secrets, SensitiveDataFinding};
use crate::tools::Tool;
use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

static WORD_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z0-9]+").unwrap());

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is",
    "it", "its", "of", "on", "that", "the", "to", "was", "will", "with", "or", "but", "not",
    "this", "can", "have", "do", "does", "get", "set", "use", "using", "used",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchAlgorithm {
    Exact,
    Fuzzy,
    Semantic,
    Combined,
}

impl Default for SearchAlgorithm {
    fn default() -> Self {
        SearchAlgorithm::Combined
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchType {
    Exact,
    Fuzzy,
    Semantic,
}

impl MatchType {
    fn as_str(&self) -> &'static str {
        match self {
            MatchType::Exact => "exact",
            MatchType::Fuzzy => "fuzzy",
            MatchType::Semantic => "semantic",
        }
    }
}

/// Either half of a catalog entry a result can point at. Providers are
/// represented by a lightweight summary rather than the trait object itself
/// so results stay `Clone` and comparable.
#[derive(Debug, Clone)]
pub enum SearchItem {
    Tool(Tool),
    Provider { name: String, provider_type: String },
}

impl SearchItem {
    fn name(&self) -> &str {
        match self {
            SearchItem::Tool(t) => &t.name,
            SearchItem::Provider { name, .. } => name,
        }
    }

    fn description(&self) -> String {
        match self {
            SearchItem::Tool(t) => t.description.clone(),
            SearchItem::Provider { provider_type, .. } => format!("{} provider", provider_type),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub providers: Option<HashSet<String>>,
    pub transports: Option<HashSet<String>>,
    pub tags: Option<HashSet<String>>,
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub algorithm: SearchAlgorithm,
    pub filters: SearchFilters,
    pub limit: usize,
    pub fuzzy_threshold: f64,
    pub semantic_threshold: f64,
    pub security_scan: bool,
    pub filter_sensitive: bool,
    pub boost_factors: HashMap<(String, MatchType), f64>,
    /// Substring match on description, used by the exact algorithm.
    pub match_description: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            algorithm: SearchAlgorithm::default(),
            filters: SearchFilters::default(),
            limit: 20,
            fuzzy_threshold: 0.6,
            semantic_threshold: 0.3,
            security_scan: false,
            filter_sensitive: false,
            boost_factors: HashMap::new(),
            match_description: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub item: SearchItem,
    pub score: f64,
    pub match_type: MatchType,
    pub matched_fields: HashSet<String>,
    pub security_warnings: Vec<SensitiveDataFinding>,
}

pub struct SearchEngine {
    repository: Arc<dyn ToolRepository>,
}

impl SearchEngine {
    pub fn new(repository: Arc<dyn ToolRepository>) -> Self {
        Self { repository }
    }

    pub async fn search(&self, query: &str, opts: &SearchOptions) -> Result<Vec<SearchResult>> {
        let tools = self.repository.get_tools().await?;
        let providers = self.repository.get_providers().await?;

        let filtered_tools = filter_tools(&tools, &providers, &opts.filters);

        let mut results = match opts.algorithm {
            SearchAlgorithm::Exact => exact_search(&filtered_tools, query, opts),
            SearchAlgorithm::Fuzzy => fuzzy_search(&filtered_tools, query, opts),
            SearchAlgorithm::Semantic => semantic_search(&filtered_tools, query, opts),
            SearchAlgorithm::Combined => {
                let mut combined = exact_search(&filtered_tools, query, opts);
                combined.extend(fuzzy_search(&filtered_tools, query, opts));
                combined.extend(semantic_search(&filtered_tools, query, opts));
                dedup_keep_highest(combined)
            }
        };

        rank(&mut results, opts);

        if opts.security_scan || opts.filter_sensitive {
            for result in results.iter_mut() {
                result.security_warnings = scan_item(&result.item);
            }
            if opts.filter_sensitive {
                results.retain(|r| r.security_warnings.is_empty());
            }
        }

        if opts.limit > 0 && results.len() > opts.limit {
            results.truncate(opts.limit);
        }

        Ok(results)
    }

    /// Distinct tool/provider names or keywords whose lowercase form contains
    /// `partial` (itself lowercased). Requires `partial.len() >= min_length`.
    pub async fn suggest(&self, partial: &str, limit: usize, min_length: usize) -> Result<Vec<String>> {
        if partial.len() < min_length {
            return Ok(Vec::new());
        }
        let needle = partial.to_lowercase();
        let tools = self.repository.get_tools().await?;
        let providers = self.repository.get_providers().await?;

        let mut seen = HashSet::new();
        let mut out = Vec::new();

        let mut push = |candidate: String, seen: &mut HashSet<String>, out: &mut Vec<String>| {
            if candidate.to_lowercase().contains(&needle) && seen.insert(candidate.clone()) {
                out.push(candidate);
            }
        };

        for tool in &tools {
            push(tool.name.clone(), &mut seen, &mut out);
            for kw in keywords(&tool.description) {
                push(kw, &mut seen, &mut out);
            }
            for tag in &tool.tags {
                push(tag.clone(), &mut seen, &mut out);
            }
        }
        for provider in &providers {
            push(provider.name(), &mut seen, &mut out);
        }

        if limit > 0 && out.len() > limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    /// Semantic search seeded by a reference tool's own keywords, excluding
    /// the reference itself from the result set.
    pub async fn suggest_similar_tools(&self, reference: &Tool, limit: usize) -> Result<Vec<SearchResult>> {
        let query = format!("{} {}", reference.name, reference.description);
        let mut opts = SearchOptions {
            algorithm: SearchAlgorithm::Semantic,
            limit,
            ..SearchOptions::default()
        };
        opts.limit = 0; // filter self first, then truncate
        let mut results = self.search(&query, &opts).await?;
        results.retain(|r| r.item.name() != reference.name);
        if limit > 0 && results.len() > limit {
            results.truncate(limit);
        }
        Ok(results)
    }
}

fn scan_item(item: &SearchItem) -> Vec<SensitiveDataFinding> {
    let mut findings = scan_for_secrets("description", &item.description());
    if let SearchItem::Tool(tool) = item {
        if let Some(props) = &tool.inputs.properties {
            for (key, value) in props {
                findings.extend(scan_for_secrets(
                    &format!("inputs.{}", key),
                    &value.to_string(),
                ));
            }
        }
        if let Some(props) = &tool.outputs.properties {
            for (key, value) in props {
                findings.extend(scan_for_secrets(
                    &format!("outputs.{}", key),
                    &value.to_string(),
                ));
            }
        }
    }
    findings
}

fn provider_type_for_tool(tool: &Tool, providers: &[Arc<dyn Provider>]) -> Option<String> {
    let provider_name = tool.name.split_once('.').map(|(p, _)| p)?;
    providers
        .iter()
        .find(|p| p.name() == provider_name)
        .map(|p| p.type_().as_key().to_string())
}

fn filter_tools(tools: &[Tool], providers: &[Arc<dyn Provider>], filters: &SearchFilters) -> Vec<Tool> {
    tools
        .iter()
        .filter(|tool| {
            if let Some(allowed) = &filters.providers {
                let provider_name = tool.name.split_once('.').map(|(p, _)| p).unwrap_or("");
                if !allowed.contains(provider_name) {
                    return false;
                }
            }
            if let Some(allowed) = &filters.transports {
                match provider_type_for_tool(tool, providers) {
                    Some(t) if allowed.contains(&t) => {}
                    _ => return false,
                }
            }
            if let Some(tags) = &filters.tags {
                if !tags.is_empty() && !tool.tags.iter().any(|t| tags.contains(t)) {
                    return false;
                }
            }
            true
        })
        .cloned()
        .collect()
}

fn exact_search(tools: &[Tool], query: &str, opts: &SearchOptions) -> Vec<SearchResult> {
    let query_lower = query.trim().to_lowercase();
    if query_lower.is_empty() {
        return Vec::new();
    }

    tools
        .iter()
        .filter_map(|tool| {
            let mut matched_fields = HashSet::new();
            if tool.name.to_lowercase() == query_lower {
                matched_fields.insert("name".to_string());
            }
            if opts.match_description && tool.description.to_lowercase().contains(&query_lower) {
                matched_fields.insert("description".to_string());
            }
            if matched_fields.is_empty() {
                return None;
            }
            Some(SearchResult {
                item: SearchItem::Tool(tool.clone()),
                score: 1.0,
                match_type: MatchType::Exact,
                matched_fields,
                security_warnings: Vec::new(),
            })
        })
        .collect()
}

fn fuzzy_search(tools: &[Tool], query: &str, opts: &SearchOptions) -> Vec<SearchResult> {
    let query_lower = query.trim().to_lowercase();
    if query_lower.is_empty() {
        return Vec::new();
    }

    tools
        .iter()
        .filter_map(|tool| {
            let name_sim = string_similarity(&tool.name.to_lowercase(), &query_lower);
            let desc_sim = string_similarity(&tool.description.to_lowercase(), &query_lower);
            let score = name_sim.max(desc_sim);
            if score < opts.fuzzy_threshold {
                return None;
            }
            let mut matched_fields = HashSet::new();
            if name_sim >= desc_sim {
                matched_fields.insert("name".to_string());
            } else {
                matched_fields.insert("description".to_string());
            }
            Some(SearchResult {
                item: SearchItem::Tool(tool.clone()),
                score,
                match_type: MatchType::Fuzzy,
                matched_fields,
                security_warnings: Vec::new(),
            })
        })
        .collect()
}

/// `1.0` for case-insensitive equality, `0.8` for a substring match either
/// way, else a normalized edit-distance score.
fn string_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    if a.contains(b) || b.contains(a) {
        return 0.8;
    }
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - (levenshtein(a, b) as f64 / max_len as f64)
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (la, lb) = (a.len(), b.len());
    let mut prev: Vec<usize> = (0..=lb).collect();
    let mut curr = vec![0usize; lb + 1];

    for i in 1..=la {
        curr[0] = i;
        for j in 1..=lb {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[lb]
}

fn keywords(text: &str) -> Vec<String> {
    WORD_PATTERN
        .find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .filter(|w| w.len() > 2 && !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

fn keyword_set(text: &str) -> HashSet<String> {
    keywords(text).into_iter().collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

fn context_keywords(tool: &Tool) -> HashSet<String> {
    let mut kw = HashSet::new();
    if let Some(props) = &tool.inputs.properties {
        for key in props.keys() {
            kw.extend(keywords(key));
        }
    }
    if let Some(props) = &tool.outputs.properties {
        for key in props.keys() {
            kw.extend(keywords(key));
        }
    }
    kw
}

fn semantic_search(tools: &[Tool], query: &str, opts: &SearchOptions) -> Vec<SearchResult> {
    let query_kw = keyword_set(query);
    if query_kw.is_empty() {
        return Vec::new();
    }

    tools
        .iter()
        .filter_map(|tool| {
            let name_kw = keyword_set(&tool.name.replace('.', " "));
            let desc_kw = keyword_set(&tool.description);
            let ctx_kw = context_keywords(tool);

            let name_sim = jaccard(&name_kw, &query_kw);
            let desc_sim = jaccard(&desc_kw, &query_kw);
            let ctx_sim = jaccard(&ctx_kw, &query_kw);

            let score = 0.4 * name_sim + 0.4 * desc_sim + 0.2 * ctx_sim;
            if score < opts.semantic_threshold {
                return None;
            }

            let mut matched_fields = HashSet::new();
            if name_sim > 0.0 {
                matched_fields.insert("name".to_string());
            }
            if desc_sim > 0.0 {
                matched_fields.insert("description".to_string());
            }
            if ctx_sim > 0.0 {
                matched_fields.insert("context".to_string());
            }

            Some(SearchResult {
                item: SearchItem::Tool(tool.clone()),
                score,
                match_type: MatchType::Semantic,
                matched_fields,
                security_warnings: Vec::new(),
            })
        })
        .collect()
}

fn dedup_keep_highest(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut best: HashMap<String, SearchResult> = HashMap::new();
    for result in results {
        let key = result.item.name().to_string();
        match best.get(&key) {
            Some(existing) if existing.score >= result.score => {}
            _ => {
                best.insert(key, result);
            }
        }
    }
    best.into_values().collect()
}

fn popularity(name: &str) -> f64 {
    let lower = name.to_lowercase();
    let verb = lower.split('.').last().unwrap_or(&lower);
    if verb.starts_with("get") || verb.starts_with("list") || verb.starts_with("fetch") {
        0.3
    } else if verb.starts_with("create") || verb.starts_with("post") || verb.starts_with("add") {
        0.2
    } else if verb.starts_with("update") || verb.starts_with("put") {
        0.2
    } else if verb.starts_with("delete") || verb.starts_with("remove") {
        0.1
    } else {
        0.0
    }
}

fn quality(item: &SearchItem) -> f64 {
    let mut score = 0.0;
    if item.description().len() > 50 {
        score += 0.5;
    }
    if let SearchItem::Tool(tool) = item {
        if tool.inputs.properties.as_ref().map(|p| !p.is_empty()).unwrap_or(false) {
            score += 0.25;
        }
        if tool.outputs.properties.as_ref().map(|p| !p.is_empty()).unwrap_or(false) {
            score += 0.25;
        }
    }
    score.min(1.0)
}

fn context_relevance(result: &SearchResult, query: &str) -> f64 {
    if result.item.name().eq_ignore_ascii_case(query.trim()) {
        return 1.0;
    }
    if result.matched_fields.contains("name") {
        0.8
    } else if result.matched_fields.contains("description") {
        0.6
    } else if result.matched_fields.contains("context") {
        0.4
    } else {
        0.0
    }
}

fn rank(results: &mut [SearchResult], opts: &SearchOptions) {
    // final_score = 0.4*base + 0.2*popularity + 0.1*recency + 0.2*quality + 0.1*context_relevance
    // Recency has no signal available in this in-memory catalog; treated as neutral (0.5).
    for result in results.iter_mut() {
        let base = result.score;
        let pop = popularity(result.item.name());
        let qual = quality(&result.item);
        let ctx = context_relevance(result, "");
        let mut final_score = 0.4 * base + 0.2 * pop + 0.1 * 0.5 + 0.2 * qual + 0.1 * ctx;

        let provider_name = result
            .item
            .name()
            .split_once('.')
            .map(|(p, _)| p.to_string());
        if let Some(provider_name) = provider_name {
            if let Some(boost) = opts.boost_factors.get(&(provider_name, result.match_type)) {
                final_score *= boost;
            }
        }

        result.score = final_score.clamp(0.0, 1.0);
    }

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.item.name().cmp(b.item.name()))
    });
}
