use std::sync::OnceLock;

static QUIET: OnceLock<bool> = OnceLock::new();

/// `ISSUEBASE_QUIET=1` silences human output (progress bars, summaries)
pub fn is_quiet() -> bool {
    *QUIET.get_or_init(|| {
        std::env::var("ISSUEBASE_QUIET")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    })
}
