//! Context extraction (spec §4.C step 2). Direct mapping when
//! `task_type != custom`; otherwise classify by keyword, tie-broken by
//! first-match in a fixed table — grounded on the teacher's
//! `is_code_related`/`is_planning_related`/... keyword-table idiom in
//! `orchestrator/router.rs`.

use lazy_static::lazy_static;

use crate::domain::{ContextType, Request, TaskType};

lazy_static! {
    /// Checked in order; the first context whose keyword set matches wins.
    static ref KEYWORD_TABLE: Vec<(ContextType, Vec<&'static str>)> = vec![
        (ContextType::Security, vec!["security", "vulnerability", "exploit", "cve", "auth", "encrypt", "injection"]),
        (ContextType::Debugging, vec!["bug", "error", "exception", "crash", "stack trace", "debug", "broken", "fails"]),
        (ContextType::Performance, vec!["performance", "latency", "throughput", "slow", "optimiz", "benchmark", "profil"]),
        (ContextType::Architecture, vec!["architecture", "design pattern", "microservice", "system design", "scalab"]),
        (ContextType::Testing, vec!["test", "unit test", "integration test", "coverage", "assert"]),
        (ContextType::Documentation, vec!["document", "readme", "docstring", "comment the", "explain"]),
        (ContextType::Review, vec!["review", "code review", "pull request", "pr feedback"]),
        (ContextType::Refactoring, vec!["refactor", "clean up", "restructure", "simplify"]),
        (ContextType::CodeGeneration, vec!["write a", "implement", "create a function", "generate code", "build a"]),
    ];
}

pub fn extract_context(request: &Request) -> ContextType {
    if let Some(direct) = ContextType::from_task_type(request.task_type) {
        return direct;
    }
    classify_by_keyword(&request.prompt)
}

fn classify_by_keyword(prompt: &str) -> ContextType {
    let lower = prompt.to_lowercase();
    for (context, keywords) in KEYWORD_TABLE.iter() {
        if keywords.iter().any(|k| lower.contains(k)) {
            return *context;
        }
    }
    ContextType::General
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_custom_task_type_maps_directly() {
        let req = Request::new("anything", TaskType::Testing);
        assert_eq!(extract_context(&req), ContextType::Testing);
    }

    #[test]
    fn custom_task_type_classifies_by_keyword() {
        let req = Request::new("There's a nasty race condition bug causing a crash", TaskType::Custom);
        assert_eq!(extract_context(&req), ContextType::Debugging);
    }

    #[test]
    fn custom_task_type_defaults_to_general() {
        let req = Request::new("hello there", TaskType::Custom);
        assert_eq!(extract_context(&req), ContextType::General);
    }

    #[test]
    fn first_match_wins_on_keyword_overlap() {
        // Contains both a security and a debugging keyword; security is
        // checked first in KEYWORD_TABLE so it must win.
        let req = Request::new("there's a security vulnerability causing a crash", TaskType::Custom);
        assert_eq!(extract_context(&req), ContextType::Security);
    }
}
