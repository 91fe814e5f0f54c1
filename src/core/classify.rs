//! Context classification for candidate artifacts.
//!
//! Scores the lines surrounding a finding to label it error-handling /
//! testing / debugging / development / general, with a confidence value.
//! Pure function of its inputs; the scanner calls this once per finding.

use aho_corasick::AhoCorasick;
use indexmap::IndexMap;
use serde::Serialize;

/// Default window radius (lines before/after the candidate).
pub const DEFAULT_RADIUS: usize = 5;

/// Tighter radius for breakpoint statements.
pub const BREAKPOINT_RADIUS: usize = 3;

/// Inferred purpose of the code surrounding an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContextType {
    ErrorHandling,
    Testing,
    Debugging,
    Development,
    General,
}

impl ContextType {
    pub fn label(&self) -> &'static str {
        match self {
            ContextType::ErrorHandling => "error-handling",
            ContextType::Testing => "testing",
            ContextType::Debugging => "debugging",
            ContextType::Development => "development",
            ContextType::General => "general",
        }
    }
}

/// Classification outcome attached to every artifact.
#[derive(Debug, Clone, Serialize)]
pub struct ContextInfo {
    pub context_type: ContextType,
    /// matched indicators / total indicators for the winning category
    pub confidence: f32,
    /// The indicator phrases that matched within the window.
    pub indicators: Vec<String>,
}

impl ContextInfo {
    pub fn general() -> Self {
        Self {
            context_type: ContextType::General,
            confidence: 0.0,
            indicators: Vec::new(),
        }
    }
}

/// Structural position flags, computed independently of the context score.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StructuralFlags {
    pub in_function: bool,
    pub in_conditional: bool,
    pub in_loop: bool,
}

struct CategoryIndicators {
    phrases: Vec<&'static str>,
    automaton: AhoCorasick,
}

/// Keyword-indicator classifier. Categories are held in declaration order;
/// confidence ties resolve to the first declared category.
pub struct ContextClassifier {
    categories: IndexMap<ContextType, CategoryIndicators>,
}

impl ContextClassifier {
    pub fn new() -> anyhow::Result<Self> {
        let mut categories = IndexMap::new();

        let table: [(ContextType, &[&'static str]); 4] = [
            (
                ContextType::ErrorHandling,
                &[
                    "catch", "try {", "throw", "error", "err)", "exception", "finally", "reject",
                    "failed",
                ][..],
            ),
            (
                ContextType::Testing,
                &[
                    "test", "spec", "describe(", "it(", "expect(", "assert", "mock", "beforeeach",
                    "aftereach", "fixture",
                ][..],
            ),
            (
                ContextType::Debugging,
                &[
                    "debug", "console.", "trace", "breakpoint", "inspect", "dump", "verbose",
                    "fixme",
                ][..],
            ),
            (
                ContextType::Development,
                &[
                    "development", "staging", "localhost", "process.env", "feature flag",
                    "experiment", "wip",
                ][..],
            ),
        ];

        for (context_type, phrases) in table {
            let automaton = AhoCorasick::new(phrases)?;
            categories.insert(
                context_type,
                CategoryIndicators {
                    phrases: phrases.to_vec(),
                    automaton,
                },
            );
        }

        Ok(Self { categories })
    }

    /// Classify the surroundings of `lines[index]` within `radius` lines.
    ///
    /// The candidate line itself is excluded from the window so an artifact's
    /// own tokens cannot vote on its context.
    pub fn classify(&self, lines: &[String], index: usize, radius: usize) -> ContextInfo {
        let lo = index.saturating_sub(radius);
        let hi = (index + radius + 1).min(lines.len());

        let mut window = String::new();
        for (i, line) in lines.iter().enumerate().take(hi).skip(lo) {
            if i == index {
                continue;
            }
            window.push_str(&line.to_lowercase());
            window.push('\n');
        }

        let mut best: Option<(ContextType, f32, Vec<String>)> = None;
        for (context_type, indicators) in &self.categories {
            let mut matched = std::collections::BTreeSet::new();
            for hit in indicators.automaton.find_iter(&window) {
                matched.insert(hit.pattern().as_usize());
            }
            if matched.is_empty() {
                continue;
            }

            let confidence = matched.len() as f32 / indicators.phrases.len() as f32;
            let hit_phrases: Vec<String> = matched
                .iter()
                .map(|&i| indicators.phrases[i].to_string())
                .collect();

            // Strictly-highest wins; ties keep the earlier declared category.
            let better = match &best {
                Some((_, best_conf, _)) => confidence > *best_conf,
                None => true,
            };
            if better {
                best = Some((*context_type, confidence, hit_phrases));
            }
        }

        match best {
            Some((context_type, confidence, indicators)) => ContextInfo {
                context_type,
                confidence,
                indicators,
            },
            None => ContextInfo::general(),
        }
    }

    /// Structural flags via simple backward/forward line scans for canonical
    /// keyword tokens. Lexical only; brace balance is not consulted.
    pub fn structural_flags(&self, lines: &[String], index: usize) -> StructuralFlags {
        const LOOKBACK: usize = 30;

        let mut flags = StructuralFlags::default();
        let lo = index.saturating_sub(LOOKBACK);

        for line in lines[lo..=index.min(lines.len().saturating_sub(1))].iter().rev() {
            let t = line.trim_start();
            if !flags.in_function
                && (t.starts_with("function ")
                    || t.contains("function(")
                    || t.contains("=> {")
                    || t.starts_with("def "))
            {
                flags.in_function = true;
            }
            if !flags.in_conditional
                && (t.starts_with("if ")
                    || t.starts_with("if(")
                    || t.starts_with("} else")
                    || t.starts_with("else ")
                    || t.starts_with("switch"))
            {
                flags.in_conditional = true;
            }
            if !flags.in_loop
                && (t.starts_with("for ")
                    || t.starts_with("for(")
                    || t.starts_with("while ")
                    || t.starts_with("while(")
                    || t.starts_with("do {"))
            {
                flags.in_loop = true;
            }
            if flags.in_function && flags.in_conditional && flags.in_loop {
                break;
            }
        }

        // Forward scan for headers that trail their body, like the `while`
        // half of a do-while.
        if !flags.in_loop {
            const LOOKAHEAD: usize = 10;
            let start = (index + 1).min(lines.len());
            let hi = (index + 1 + LOOKAHEAD).min(lines.len());
            for line in &lines[start..hi] {
                let t = line.trim_start();
                if t.starts_with("} while") || t.starts_with("}while") {
                    flags.in_loop = true;
                    break;
                }
            }
        }

        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_lines(src: &str) -> Vec<String> {
        src.lines().map(|s| s.to_string()).collect()
    }

    #[test]
    fn neutral_surroundings_classify_as_general() {
        let lines = to_lines(
            "function calculateTotal(items) {\n  const sum = items.reduce(add);\n  console.log(\"debug value:\", sum);\n  return sum;\n}",
        );
        let classifier = ContextClassifier::new().unwrap();
        let ctx = classifier.classify(&lines, 2, DEFAULT_RADIUS);

        assert_eq!(ctx.context_type, ContextType::General);
        assert_eq!(ctx.confidence, 0.0);
    }

    #[test]
    fn catch_block_classifies_as_error_handling() {
        let lines = to_lines(
            "try {\n  await save(data);\n} catch (err) {\n  console.error('Failed to save:', err);\n  throw err;\n}",
        );
        let classifier = ContextClassifier::new().unwrap();
        let ctx = classifier.classify(&lines, 3, DEFAULT_RADIUS);

        assert_eq!(ctx.context_type, ContextType::ErrorHandling);
        assert!(ctx.confidence > 0.0);
        assert!(ctx.indicators.iter().any(|i| i == "catch"));
    }

    #[test]
    fn test_file_surroundings_classify_as_testing() {
        let lines = to_lines(
            "describe('cart', () => {\n  it('adds items', () => {\n    console.log(cart);\n    expect(cart.size).toBe(1);\n  });\n});",
        );
        let classifier = ContextClassifier::new().unwrap();
        let ctx = classifier.classify(&lines, 2, DEFAULT_RADIUS);

        assert_eq!(ctx.context_type, ContextType::Testing);
    }

    #[test]
    fn own_line_is_excluded_from_window() {
        // Only the candidate line mentions debugging vocabulary.
        let lines = to_lines("const a = 1;\nconsole.debug('x');\nconst b = 2;");
        let classifier = ContextClassifier::new().unwrap();
        let ctx = classifier.classify(&lines, 1, DEFAULT_RADIUS);

        assert_eq!(ctx.context_type, ContextType::General);
    }

    #[test]
    fn structural_flags_detect_function_and_conditional() {
        let lines = to_lines(
            "function run() {\n  if (ready) {\n    console.log('go');\n  }\n}",
        );
        let classifier = ContextClassifier::new().unwrap();
        let flags = classifier.structural_flags(&lines, 2);

        assert!(flags.in_function);
        assert!(flags.in_conditional);
        assert!(!flags.in_loop);
    }

    #[test]
    fn do_while_tail_below_marks_loop() {
        // The `do {` header sits beyond the backward window; only the
        // trailing `} while` below the candidate gives the loop away.
        let mut lines = vec!["do {".to_string()];
        for _ in 0..35 {
            lines.push("  step();".to_string());
        }
        lines.push("  console.log('retrying');".to_string());
        lines.push("} while (shouldRetry);".to_string());

        let classifier = ContextClassifier::new().unwrap();
        let flags = classifier.structural_flags(&lines, 36);

        assert!(flags.in_loop);
    }
}
