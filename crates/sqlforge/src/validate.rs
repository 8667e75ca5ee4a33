//! Template validation: structural checks, heuristic advisories and a
//! thread-safe memoization cache.
//!
//! Validation is a pure function of the template string, so results can be
//! memoized process-wide. The cache uses at-most-once insert semantics:
//! losing a parse race is benign since both paths produce identical reports.

use crate::diagnostics::{Diagnostic, Severity, codes};
use crate::error::{EngineError, EngineResult};
use crate::template::{Template, TemplateNode};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Mutex};

/// Placeholder names the engine understands.
pub const KNOWN_PLACEHOLDERS: &[&str] = &[
    "table",
    "columns",
    "values",
    "set",
    "where",
    "orderby",
    "limit",
    "top",
    "offset",
    "arg",
    "batch_values",
    "if",
    "join",
    "groupby",
    "having",
    "upsert",
    "now",
];

/// Option names the engine understands.
pub const KNOWN_OPTIONS: &[&str] = &[
    "param", "exclude", "include", "regex", "alias", "desc", "quoted", "soft", "schema", "table",
    "on",
];

/// Result of validating one template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    pub suggestions: Vec<Diagnostic>,
}

impl ValidationReport {
    fn from_diagnostics(diagnostics: Vec<Diagnostic>) -> Self {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut suggestions = Vec::new();
        for d in diagnostics {
            match d.severity {
                Severity::Error => errors.push(d),
                Severity::Warning => warnings.push(d),
                Severity::Suggestion => suggestions.push(d),
            }
        }
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
            suggestions,
        }
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// All diagnostics: errors, then warnings, then suggestions.
    pub fn all(&self) -> impl Iterator<Item = &Diagnostic> {
        self.errors
            .iter()
            .chain(self.warnings.iter())
            .chain(self.suggestions.iter())
    }
}

/// Validate a template string.
pub fn validate_template(source: &str) -> ValidationReport {
    let template = match Template::parse(source) {
        Ok(t) => t,
        Err(err) => {
            return ValidationReport::from_diagnostics(vec![err.to_diagnostic()]);
        }
    };

    let mut diagnostics = Vec::new();
    if let Err(err) = check_structure(&template) {
        diagnostics.push(err.to_diagnostic());
    }
    diagnostics.extend(advisory_diagnostics(&template));
    ValidationReport::from_diagnostics(diagnostics)
}

/// Structural checks beyond parsing: unknown placeholder names and
/// unbalanced parentheses in literal SQL. Returns the first failure.
pub(crate) fn check_structure(template: &Template) -> EngineResult<()> {
    check_placeholder_names(&template.nodes)?;
    check_paren_balance(template)
}

fn check_placeholder_names(nodes: &[TemplateNode]) -> EngineResult<()> {
    for node in nodes {
        match node {
            TemplateNode::Literal(_) => {}
            TemplateNode::Placeholder(p) => {
                if !KNOWN_PLACEHOLDERS.contains(&p.name.as_str()) {
                    return Err(EngineError::UnknownPlaceholder {
                        name: p.name.clone(),
                    });
                }
            }
            TemplateNode::Conditional(c) => {
                check_placeholder_names(&c.inner)?;
                if let Some(else_nodes) = &c.else_branch {
                    check_placeholder_names(else_nodes)?;
                }
            }
        }
    }
    Ok(())
}

fn collect_literal_text(nodes: &[TemplateNode], out: &mut String) {
    for node in nodes {
        match node {
            TemplateNode::Literal(text) => out.push_str(text),
            TemplateNode::Placeholder(_) => out.push(' '),
            TemplateNode::Conditional(c) => {
                collect_literal_text(&c.inner, out);
                if let Some(else_nodes) = &c.else_branch {
                    collect_literal_text(else_nodes, out);
                }
            }
        }
    }
}

fn check_paren_balance(template: &Template) -> EngineResult<()> {
    let mut text = String::new();
    collect_literal_text(&template.nodes, &mut text);

    let mut depth: i64 = 0;
    let mut in_string = false;
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if in_string {
            if ch == '\'' {
                // Escaped quote: ''
                if chars.peek() == Some(&'\'') {
                    chars.next();
                } else {
                    in_string = false;
                }
            }
            continue;
        }
        match ch {
            '\'' => in_string = true,
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err(EngineError::UnmatchedParens);
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(EngineError::UnmatchedParens);
    }
    Ok(())
}

static SELECT_STAR: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"(?i)SELECT\s+\*").expect("static regex")
});

pub(crate) fn contains_keyword(text: &str, keyword: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    let keyword = keyword.to_ascii_lowercase();
    let mut start = 0;
    while let Some(idx) = lower[start..].find(&keyword) {
        let abs = start + idx;
        let before_ok = abs == 0
            || !lower[..abs]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
        let after = abs + keyword.len();
        let after_ok = after >= lower.len()
            || !lower[after..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
        if before_ok && after_ok {
            return true;
        }
        start = abs + keyword.len();
    }
    false
}

/// Heuristic advisories: unknown options, deprecated placeholders, risky
/// SQL shapes. These never block plan emission.
pub(crate) fn advisory_diagnostics(template: &Template) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    collect_node_advisories(&template.nodes, &mut out);

    let source = template.source();

    if SELECT_STAR.is_match(source) {
        out.push(Diagnostic::suggestion(
            codes::SELECT_STAR,
            "SELECT * used; consider selecting explicit columns",
        ));
    }

    let head_is_mutation = {
        let head = source
            .trim_start()
            .split_whitespace()
            .next()
            .unwrap_or_default();
        head.eq_ignore_ascii_case("update") || head.eq_ignore_ascii_case("delete")
    };
    let has_where = contains_keyword(source, "where") || template.has_placeholder("where");
    if head_is_mutation && !has_where {
        out.push(Diagnostic::warning(
            codes::MISSING_WHERE,
            "UPDATE/DELETE without WHERE affects all rows",
        ));
    }

    let has_order_by =
        contains_keyword(source, "order") && contains_keyword(source, "by");
    let has_limit = contains_keyword(source, "limit")
        || contains_keyword(source, "fetch")
        || contains_keyword(source, "rownum")
        || template.has_placeholder("limit")
        || template.has_placeholder("top");
    if has_order_by && !has_limit {
        out.push(Diagnostic::suggestion(
            codes::ORDER_BY_WITHOUT_LIMIT,
            "ORDER BY without a limit may sort an unbounded result",
        ));
    }

    if contains_keyword(source, "join")
        && !contains_keyword(source, "on")
        && !has_where
        && !template.has_placeholder("join")
    {
        out.push(Diagnostic::suggestion(
            codes::JOIN_WITHOUT_CONDITION,
            "JOIN without ON or WHERE may produce a Cartesian product",
        ));
    }

    out
}

fn collect_node_advisories(nodes: &[TemplateNode], out: &mut Vec<Diagnostic>) {
    for node in nodes {
        match node {
            TemplateNode::Literal(_) => {}
            TemplateNode::Placeholder(p) => {
                for (name, _value) in p.options.iter() {
                    if !KNOWN_OPTIONS.contains(&name) {
                        out.push(
                            Diagnostic::warning(
                                codes::UNKNOWN_OPTION,
                                format!("unknown option '--{name}' on {{{{{}}}}}", p.name),
                            )
                            .with_span(p.span.clone()),
                        );
                    }
                }
                if p.name == "if" {
                    out.push(
                        Diagnostic::warning(
                            codes::DEPRECATED_PLACEHOLDER,
                            "{{if}} is deprecated and renders nothing; use {{*ifnotnull ...}} blocks",
                        )
                        .with_span(p.span.clone()),
                    );
                }
            }
            TemplateNode::Conditional(c) => {
                collect_node_advisories(&c.inner, out);
                if let Some(else_nodes) = &c.else_branch {
                    collect_node_advisories(else_nodes, out);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Memoization cache
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct CacheInner {
    map: HashMap<String, CacheEntry>,
    generation: u64,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    report: Arc<ValidationReport>,
    last_access: u64,
}

impl CacheInner {
    fn touch(&mut self, key: &str) -> Option<Arc<ValidationReport>> {
        let entry = self.map.get_mut(key)?;
        self.generation += 1;
        entry.last_access = self.generation;
        Some(Arc::clone(&entry.report))
    }

    fn evict_lru(&mut self, capacity: usize) -> u64 {
        let mut evicted = 0u64;
        while self.map.len() > capacity {
            let oldest_key = self
                .map
                .iter()
                .min_by_key(|(_, e)| e.last_access)
                .map(|(k, _)| k.clone());

            if let Some(key) = oldest_key {
                self.map.remove(&key);
                evicted += 1;
            } else {
                break;
            }
        }
        evicted
    }
}

/// Validator cache statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatorCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub size: usize,
    pub capacity: usize,
}

impl ValidatorCacheStats {
    /// Cache hit ratio (0.0 – 1.0). Returns 0.0 if no lookups have occurred.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Thread-safe validation cache (simple LRU).
///
/// This is the only process-wide state in the engine. Capacity 0 disables
/// caching entirely.
#[derive(Debug)]
pub struct ValidatorCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl Default for ValidatorCache {
    fn default() -> Self {
        Self::new(256)
    }
}

impl ValidatorCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(CacheInner {
                map: HashMap::with_capacity(capacity),
                generation: 0,
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Validate through the cache.
    pub fn validate(&self, source: &str) -> Arc<ValidationReport> {
        if self.capacity == 0 {
            return Arc::new(validate_template(source));
        }

        {
            let mut inner = self.inner.lock().expect("validator cache mutex poisoned");
            if let Some(found) = inner.touch(source) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(target: "sqlforge::validate", "cache hit");
                return found;
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(target: "sqlforge::validate", "cache miss");

        // Validate outside the lock to reduce contention.
        let report = Arc::new(validate_template(source));

        let mut inner = self.inner.lock().expect("validator cache mutex poisoned");
        // Double-check: another thread may have inserted while we validated.
        if let Some(found) = inner.touch(source) {
            return found;
        }

        inner.generation += 1;
        let access = inner.generation;
        inner.map.insert(
            source.to_string(),
            CacheEntry {
                report: Arc::clone(&report),
                last_access: access,
            },
        );
        let evicted = inner.evict_lru(self.capacity);
        if evicted > 0 {
            self.evictions.fetch_add(evicted, Ordering::Relaxed);
        }
        report
    }

    pub fn stats(&self) -> ValidatorCacheStats {
        let size = self
            .inner
            .lock()
            .expect("validator cache mutex poisoned")
            .map
            .len();
        ValidatorCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            size,
            capacity: self.capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_template_is_error() {
        let report = validate_template("  ");
        assert!(!report.is_valid);
        assert_eq!(report.errors[0].code, codes::EMPTY_TEMPLATE);
    }

    #[test]
    fn unknown_placeholder_is_error() {
        let report = validate_template("SELECT {{colums}} FROM {{table}}");
        assert!(!report.is_valid);
        assert_eq!(report.errors[0].code, codes::UNKNOWN_PLACEHOLDER);
    }

    #[test]
    fn unknown_option_is_warning() {
        let report = validate_template("SELECT {{columns --sort}} FROM {{table}}");
        assert!(report.is_valid);
        assert!(report.warnings.iter().any(|d| d.code == codes::UNKNOWN_OPTION));
    }

    #[test]
    fn unmatched_parens() {
        let report = validate_template("SELECT COUNT(id FROM {{table}}");
        assert!(!report.is_valid);
        assert_eq!(report.errors[0].code, codes::UNMATCHED_PARENS);
    }

    #[test]
    fn parens_inside_string_literal_ignored() {
        let report = validate_template("SELECT ':-)' FROM {{table}}");
        assert!(report.is_valid);
    }

    #[test]
    fn select_star_suggestion() {
        let report = validate_template("SELECT * FROM {{table}}");
        assert!(report.is_valid);
        assert!(report
            .suggestions
            .iter()
            .any(|d| d.code == codes::SELECT_STAR));
    }

    #[test]
    fn mutation_without_where_warns() {
        let report = validate_template("UPDATE users SET name = @name");
        assert!(report.is_valid);
        assert!(report.warnings.iter().any(|d| d.code == codes::MISSING_WHERE));

        let report = validate_template("DELETE FROM users WHERE id = @id");
        assert!(!report.warnings.iter().any(|d| d.code == codes::MISSING_WHERE));
    }

    #[test]
    fn where_placeholder_counts_as_where() {
        let report = validate_template("DELETE FROM {{table}} {{where}}");
        assert!(!report.warnings.iter().any(|d| d.code == codes::MISSING_WHERE));
    }

    #[test]
    fn order_by_without_limit_suggests() {
        let report = validate_template("SELECT {{columns}} FROM {{table}} ORDER BY id");
        assert!(report
            .suggestions
            .iter()
            .any(|d| d.code == codes::ORDER_BY_WITHOUT_LIMIT));

        let report = validate_template("SELECT {{columns}} FROM {{table}} ORDER BY id {{limit}}");
        assert!(!report
            .suggestions
            .iter()
            .any(|d| d.code == codes::ORDER_BY_WITHOUT_LIMIT));
    }

    #[test]
    fn join_without_condition_suggests() {
        let report = validate_template("SELECT a.x FROM a JOIN b");
        assert!(report
            .suggestions
            .iter()
            .any(|d| d.code == codes::JOIN_WITHOUT_CONDITION));

        let report = validate_template("SELECT a.x FROM a JOIN b ON a.id = b.a_id");
        assert!(!report
            .suggestions
            .iter()
            .any(|d| d.code == codes::JOIN_WITHOUT_CONDITION));
    }

    #[test]
    fn deprecated_if_placeholder_warns() {
        let report = validate_template("SELECT 1 {{if}}");
        assert!(report
            .warnings
            .iter()
            .any(|d| d.code == codes::DEPRECATED_PLACEHOLDER));
    }

    #[test]
    fn keyword_matching_respects_word_boundaries() {
        // "nowhere" must not count as WHERE.
        assert!(!contains_keyword("SELECT nowhere FROM t", "where"));
        assert!(contains_keyword("SELECT 1 WHERE x = 1", "where"));
        assert!(contains_keyword("select 1 where x = 1", "WHERE"));
    }

    #[test]
    fn cache_returns_equal_reports() {
        let cache = ValidatorCache::new(16);
        let a = cache.validate("SELECT {{columns}} FROM {{table}}");
        let b = cache.validate("SELECT {{columns}} FROM {{table}}");
        assert_eq!(a, b);
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn cache_capacity_zero_disables() {
        let cache = ValidatorCache::new(0);
        cache.validate("SELECT 1");
        cache.validate("SELECT 1");
        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.size, 0);
    }

    #[test]
    fn cache_evicts_least_recently_used() {
        let cache = ValidatorCache::new(2);
        cache.validate("SELECT 1");
        cache.validate("SELECT 2");
        cache.validate("SELECT 1"); // touch 1
        cache.validate("SELECT 3"); // evicts 2
        let stats = cache.stats();
        assert_eq!(stats.size, 2);
        assert_eq!(stats.evictions, 1);
    }

    #[test]
    fn concurrent_validation_is_consistent() {
        let cache = Arc::new(ValidatorCache::new(64));
        let source = "UPDATE users SET name = @name";
        let single = validate_template(source);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.validate(source))
            })
            .collect();
        for handle in handles {
            let report = handle.join().expect("validator thread panicked");
            assert_eq!(*report, single);
        }
    }
}
