//! Persona Router (spec §4.D) — maps slash-commands, explicit config, and
//! context to a persona identity with a prompt preamble. Selection stops at
//! the first matching priority tier.

use lazy_static::lazy_static;
use std::collections::BTreeSet;

use crate::domain::{ComplexityLevel, ContextType, Persona, PersonaId, Request};

lazy_static! {
    /// Closed slash-command table, checked against the start of the prompt.
    static ref SLASH_COMMANDS: Vec<(&'static str, PersonaId)> = vec![
        ("/dev", PersonaId::Developer),
        ("/arch", PersonaId::Architect),
        ("/security", PersonaId::SecurityAnalyst),
        ("/test", PersonaId::Tester),
        ("/docs", PersonaId::TechnicalWriter),
        ("/perf", PersonaId::PerformanceExpert),
        ("/review", PersonaId::Reviewer),
    ];

    static ref PERSONA_TABLE: Vec<Persona> = build_persona_table();
}

fn persona(
    id: PersonaId,
    preamble: &str,
    contexts: &[ContextType],
    complexities: &[ComplexityLevel],
) -> Persona {
    Persona {
        id,
        prompt_preamble: preamble.to_string(),
        preferred_context_types: contexts.iter().map(|c| c.key()).collect::<BTreeSet<_>>(),
        preferred_complexity: complexities.iter().map(|c| c.key()).collect::<BTreeSet<_>>(),
    }
}

fn build_persona_table() -> Vec<Persona> {
    vec![
        persona(
            PersonaId::Developer,
            "You are an expert software developer. Write correct, idiomatic, well-tested code.",
            &[ContextType::CodeGeneration, ContextType::General],
            &[ComplexityLevel::Trivial, ComplexityLevel::Simple, ComplexityLevel::Moderate],
        ),
        persona(
            PersonaId::Architect,
            "You are a systems architect. Reason about structure, tradeoffs, and scalability before proposing a design.",
            &[ContextType::Architecture],
            &[ComplexityLevel::Complex, ComplexityLevel::VeryComplex, ComplexityLevel::Expert],
        ),
        persona(
            PersonaId::Reviewer,
            "You are a meticulous code reviewer. Identify defects, risks, and deviations from best practice.",
            &[ContextType::Review, ContextType::Refactoring],
            &[ComplexityLevel::Moderate, ComplexityLevel::Complex],
        ),
        persona(
            PersonaId::SecurityAnalyst,
            "You are a security analyst. Think like an attacker, then defend like an engineer.",
            &[ContextType::Security],
            &[ComplexityLevel::Complex, ComplexityLevel::VeryComplex, ComplexityLevel::Expert, ComplexityLevel::Critical],
        ),
        persona(
            PersonaId::PerformanceExpert,
            "You are a performance engineer. Quantify before you optimize.",
            &[ContextType::Performance],
            &[ComplexityLevel::Moderate, ComplexityLevel::Complex, ComplexityLevel::VeryComplex],
        ),
        persona(
            PersonaId::Tester,
            "You are a test engineer. Cover the happy path, the edges, and the ways this will be misused.",
            &[ContextType::Testing],
            &[ComplexityLevel::Simple, ComplexityLevel::Moderate, ComplexityLevel::Complex],
        ),
        persona(
            PersonaId::TechnicalWriter,
            "You are a technical writer. Be precise, concise, and complete.",
            &[ContextType::Documentation],
            &[ComplexityLevel::Trivial, ComplexityLevel::Simple, ComplexityLevel::Moderate],
        ),
        persona(
            PersonaId::Custom,
            "You are a capable technical assistant.",
            &[],
            &[],
        ),
    ]
}

/// Table-driven mapping from context type to a default persona, used as
/// priority tier 3 when neither a slash command nor explicit config apply.
fn persona_for_context(context: ContextType) -> PersonaId {
    match context {
        ContextType::CodeGeneration => PersonaId::Developer,
        ContextType::Debugging => PersonaId::Developer,
        ContextType::Architecture => PersonaId::Architect,
        ContextType::Security => PersonaId::SecurityAnalyst,
        ContextType::Performance => PersonaId::PerformanceExpert,
        ContextType::Testing => PersonaId::Tester,
        ContextType::Documentation => PersonaId::TechnicalWriter,
        ContextType::Review => PersonaId::Reviewer,
        ContextType::Refactoring => PersonaId::Reviewer,
        ContextType::General => PersonaId::Developer,
    }
}

pub fn persona_by_id(id: PersonaId) -> &'static Persona {
    PERSONA_TABLE
        .iter()
        .find(|p| p.id == id)
        .expect("persona table covers every PersonaId variant")
}

/// Detects a leading slash command, returning the matched persona and the
/// prompt with the command token stripped (spec §4.D: the stripped prompt
/// becomes the `effective_prompt` downstream).
pub fn strip_slash_command(prompt: &str) -> Option<(PersonaId, String)> {
    let trimmed = prompt.trim_start();
    for (command, persona_id) in SLASH_COMMANDS.iter() {
        if trimmed.starts_with(command) {
            let rest = trimmed[command.len()..].trim_start();
            return Some((*persona_id, rest.to_string()));
        }
    }
    None
}

/// `select_persona(request, context_type, complexity) -> Persona` (spec
/// §4.D). Returns the persona plus the effective prompt (command-stripped
/// when a slash command matched, the original prompt otherwise).
pub fn select_persona(
    request: &Request,
    context_type: ContextType,
    _complexity: crate::domain::ComplexityLevel,
) -> (&'static Persona, String) {
    if let Some((persona_id, effective_prompt)) = strip_slash_command(&request.prompt) {
        return (persona_by_id(persona_id), effective_prompt);
    }

    if let Some(persona_id) = request.persona_config.persona {
        return (persona_by_id(persona_id), request.prompt.clone());
    }

    let persona_id = persona_for_context(context_type);
    (persona_by_id(persona_id), request.prompt.clone())
}
