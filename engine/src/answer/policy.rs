//! Grounding/refusal policy rules
//!
//! The fixed replies live here as constants and are emitted by code, verbatim,
//! never by the model. Greeting detection is a deterministic rule set so the
//! greeting path provably ignores the grounding context. Scope classification
//! goes through the generator but with a constrained two-token output parsed
//! here.

/// Short neutral reply for pure greetings. No legal content.
pub const GREETING_REPLY: &str = "Bonjour ! Je suis votre assistant juridique spécialisé en \
droit du travail marocain. Comment puis-je vous aider ?";

/// Fixed refusal for questions outside Moroccan labor law.
pub const OUT_OF_SCOPE_REPLY: &str = "Je suis désolé, cette question sort de mon domaine de \
compétence. Je ne peux répondre qu'aux questions portant sur le droit du travail marocain.";

/// Fixed reply when no retrieved material supports an answer.
pub const INSUFFICIENT_REPLY: &str = "Aucune information juridique pertinente n'a été trouvée \
pour répondre à cette question. Pourriez-vous la reformuler ou préciser votre demande ?";

/// Sentinel the synthesis prompt asks for when the fragments cannot support
/// an answer; mapped back to INSUFFICIENT_REPLY by the synthesizer.
pub const INSUFFICIENT_SENTINEL: &str = "INSUFFISANT";

/// Token the scope classifier must emit for out-of-domain questions.
pub const OUT_OF_SCOPE_TOKEN: &str = "OUT_OF_SCOPE";

/// Token the scope classifier must emit for in-domain questions.
pub const IN_SCOPE_TOKEN: &str = "IN_SCOPE";

/// Instructions for the scope classification call.
pub const SCOPE_INSTRUCTIONS: &str = "\
You are a classifier for a Moroccan labor law assistant. Decide whether the \
user's message is a question about Moroccan labor law (Code du travail \
marocain and related legal texts). Questions about foreign law, unrelated \
topics, or requests for personal opinions not grounded in Moroccan \
legislation are out of scope. Reply with exactly one word: IN_SCOPE or \
OUT_OF_SCOPE. No other text.";

/// Instructions for the final synthesis call. The labeled fragments are
/// appended below these rules; the user question arrives as the user message.
pub const SYNTHESIS_INSTRUCTIONS: &str = "\
You are a Moroccan labor law expert. Answer the user's question strictly and \
exclusively from the retrieved material below. Rules:
1. The GRAPH section is the authoritative factual backbone; the SEMANTIC \
section provides explanatory enrichment; the WEB section provides \
supplementary context only.
2. Never add facts, assumptions, or legal information absent from the \
material. Never use your pre-trained knowledge.
3. Do not dump the material verbatim; write a structured, complete answer \
covering all relevant legal details it contains.
4. Always respond in French, regardless of the language of the question or \
of the material.
5. If the material does not actually support an answer to this question, \
reply with exactly the single word INSUFFISANT.";

/// Greeting lexicon, all entries pre-normalized
const GREETINGS: &[&str] = &[
    "bonjour",
    "bonsoir",
    "salut",
    "salam",
    "salam alaykoum",
    "hello",
    "hi",
    "hey",
    "coucou",
    "merci",
    "merci beaucoup",
    "au revoir",
    "bye",
    "goodbye",
    "bonne journée",
];

/// Utterances longer than this cannot be pure greetings
const MAX_GREETING_WORDS: usize = 4;

/// Lowercase and strip punctuation, collapsing whitespace
fn normalize(utterance: &str) -> String {
    utterance
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '\'' { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Deterministic greeting check
///
/// True only for short utterances that are (or open with) a known pleasantry
/// and carry no substantive question. Decided without the generator and
/// without the grounding context.
pub fn is_greeting(utterance: &str) -> bool {
    let normalized = normalize(utterance);
    if normalized.is_empty() {
        return false;
    }
    if normalized.split_whitespace().count() > MAX_GREETING_WORDS {
        return false;
    }

    GREETINGS.iter().any(|g| {
        normalized == *g || normalized.starts_with(&format!("{} ", g))
    })
}

/// Outcome of the scope classification call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    InScope,
    OutOfScope,
}

/// Parse the classifier's reply
///
/// Accepts either token anywhere in the output; when a verbose reply carries
/// both, the first occurrence is taken as the verdict. An unparseable reply
/// counts as in scope: failing open keeps a misbehaving classifier from
/// refusing valid legal questions, and the grounding gate still protects
/// against fabrication downstream.
pub fn parse_scope(reply: &str) -> Scope {
    match (reply.find(IN_SCOPE_TOKEN), reply.find(OUT_OF_SCOPE_TOKEN)) {
        (Some(i), Some(o)) if i < o => Scope::InScope,
        (_, Some(_)) => Scope::OutOfScope,
        _ => Scope::InScope,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_greetings_detected() {
        assert!(is_greeting("Bonjour"));
        assert!(is_greeting("bonjour !"));
        assert!(is_greeting("Salam"));
        assert!(is_greeting("Hello"));
        assert!(is_greeting("Merci beaucoup !"));
        assert!(is_greeting("Au revoir"));
    }

    #[test]
    fn test_greeting_with_address_detected() {
        assert!(is_greeting("Bonjour maître"));
        assert!(is_greeting("salut, ça va ?"));
    }

    #[test]
    fn test_questions_are_not_greetings() {
        assert!(!is_greeting("Bonjour, quelle est la durée légale du préavis ?"));
        assert!(!is_greeting("Quelle est la durée du congé de maternité ?"));
        assert!(!is_greeting("What is the capital of France?"));
        assert!(!is_greeting(""));
        assert!(!is_greeting("   "));
    }

    #[test]
    fn test_greeting_word_must_lead() {
        // "merci" buried inside a question does not make it a greeting
        assert!(!is_greeting("peux-tu me dire merci"));
    }

    #[test]
    fn test_parse_scope_tokens() {
        assert_eq!(parse_scope("IN_SCOPE"), Scope::InScope);
        assert_eq!(parse_scope("OUT_OF_SCOPE"), Scope::OutOfScope);
        assert_eq!(parse_scope("The answer is OUT_OF_SCOPE."), Scope::OutOfScope);
    }

    #[test]
    fn test_parse_scope_first_token_wins_when_both_appear() {
        assert_eq!(
            parse_scope("IN_SCOPE, definitely not OUT_OF_SCOPE"),
            Scope::InScope
        );
        assert_eq!(
            parse_scope("OUT_OF_SCOPE (not IN_SCOPE)"),
            Scope::OutOfScope
        );
    }

    #[test]
    fn test_parse_scope_fails_open() {
        assert_eq!(parse_scope("je ne sais pas"), Scope::InScope);
        assert_eq!(parse_scope(""), Scope::InScope);
    }
}
