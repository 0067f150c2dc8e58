//! On-disk summary cache.
//!
//! The cache is a sequence of `("<method>" <summary>)` entries, one per line,
//! sorted by method:
//!
//! ```text
//! ("LFoo;.bar:()V" ("0" ()))
//! ("LFoo;.baz:(LFoo;)V" ("4" (0)))
//! ```
//!
//! Any malformed entry makes the whole cache corrupt; callers treat that as
//! a miss and recompute every summary.

use std::{collections::HashMap, fmt::Write as _, fs, path::Path};

use crate::{
    analysis::summary::{Summary, SummaryMap},
    ir::MethodRef,
    utils::SExpr,
    Error, Result,
};

/// Parses cache text.
///
/// # Errors
///
/// Returns [`Error::CorruptSummaryCache`] for any malformed entry, including
/// text that is not a sequence of s-expressions.
pub fn parse(text: &str) -> Result<HashMap<MethodRef, Summary>> {
    let entries = SExpr::parse_all(text).map_err(|e| Error::CorruptSummaryCache(e.to_string()))?;

    let mut summaries = HashMap::with_capacity(entries.len());
    for entry in &entries {
        let [method, summary] = entry.as_list().unwrap_or_default() else {
            return Err(Error::CorruptSummaryCache(format!("bad cache entry {entry}")));
        };
        let method = method
            .as_str()
            .and_then(|m| MethodRef::parse(m).ok())
            .ok_or_else(|| Error::CorruptSummaryCache(format!("bad method in {entry}")))?;
        summaries.insert(method, Summary::from_s_expr(summary)?);
    }
    Ok(summaries)
}

/// Formats `summaries` as cache text.
#[must_use]
pub fn render(summaries: &SummaryMap) -> String {
    let mut entries: Vec<(MethodRef, Summary)> = summaries
        .iter()
        .map(|e| (e.key().clone(), e.value().clone()))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut text = String::new();
    for (method, summary) in entries {
        let entry = SExpr::List(vec![SExpr::string(method.to_string()), summary.to_s_expr()]);
        let _ = writeln!(text, "{entry}");
    }
    text
}

/// Loads a cache file.
///
/// # Errors
///
/// Returns [`Error::FileError`] if the file cannot be read and
/// [`Error::CorruptSummaryCache`] if its contents are malformed.
pub fn load(path: &Path) -> Result<HashMap<MethodRef, Summary>> {
    parse(&fs::read_to_string(path)?)
}

/// Writes `summaries` to a cache file.
///
/// # Errors
///
/// Returns [`Error::FileError`] if the file cannot be written.
pub fn save(path: &Path, summaries: &SummaryMap) -> Result<()> {
    fs::write(path, render(summaries))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{dataflow::Effects, summary::seeded_summaries};

    #[test]
    fn test_cache_text() {
        let summaries = seeded_summaries();
        let bar = MethodRef::parse("LFoo;.bar:(LFoo;)V").unwrap();
        summaries.insert(bar.clone(), Summary::new(Effects::WRITE_MAY_ESCAPE, [0]));

        let text = render(&summaries);
        assert_eq!(
            text,
            "(\"LFoo;.bar:(LFoo;)V\" (\"4\" (0)))\n(\"Ljava/lang/Object;.<init>:()V\" (\"0\" (0)))\n"
        );

        let loaded = parse(&text).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[&bar].effects, Effects::WRITE_MAY_ESCAPE);
    }

    #[test]
    fn test_corrupt_cache() {
        for text in [
            "(\"LFoo;.bar:()V\" (\"banana\" ()))",
            "(\"not a method\" (\"0\" ()))",
            "(\"LFoo;.bar:()V\")",
            "(\"LFoo;.bar:()V\" (\"0\" ())",
        ] {
            assert!(matches!(parse(text), Err(Error::CorruptSummaryCache(_))), "{text}");
        }
    }

    #[test]
    fn test_file_round_trip() {
        let path = std::env::temp_dir().join(format!("optscope-cache-{}.sexpr", std::process::id()));
        let summaries = seeded_summaries();
        save(&path, &summaries).unwrap();
        let loaded = load(&path).unwrap();
        let _ = fs::remove_file(&path);
        assert_eq!(loaded.len(), 1);
        assert!(load(&path).is_err());
    }
}
