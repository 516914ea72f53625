//! Text normalization and the small phrase matchers the flows share.
//!
//! Every free-text comparison in the dialogue goes through [`normalize`]
//! first, so matching is insensitive to case, accents and punctuation.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Canonical form of a chat message: lowercase, diacritics stripped,
/// every run of non-alphanumerics collapsed to a single space, trimmed.
///
/// Idempotent: `normalize(normalize(s)) == normalize(s)`.
pub fn normalize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.nfd() {
        if is_combining_mark(c) {
            continue;
        }
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else {
            out.push(' ');
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whole-word containment over a normalized string.
fn contains_term(norm: &str, term: &str) -> bool {
    format!(" {norm} ").contains(&format!(" {term} "))
}

fn contains_any(norm: &str, terms: &[&str]) -> bool {
    terms.iter().any(|t| contains_term(norm, t))
}

pub fn is_yes(text: &str) -> bool {
    let n = normalize(text);
    contains_any(
        &n,
        &[
            "sim", "s", "claro", "isso", "confirmo", "confirmar", "pode", "ok", "certo", "exato",
            "positivo", "yes",
        ],
    )
}

pub fn is_no(text: &str) -> bool {
    let n = normalize(text);
    contains_any(&n, &["nao", "n", "negativo", "errado", "incorreto", "no"])
}

/// "Back to the menu" intents.
pub fn is_go_menu(text: &str) -> bool {
    let n = normalize(text);
    contains_any(&n, &["menu", "voltar", "inicio", "opcoes"])
}

/// "Pick another event" intents; "0" is the reserved shortcut inside
/// option lists.
pub fn is_switch_event(text: &str) -> bool {
    let n = normalize(text);
    n == "0" || contains_any(&n, &["trocar", "mudar", "outro evento", "outra prova"])
}

pub fn is_polite_end(text: &str) -> bool {
    let n = normalize(text);
    contains_any(
        &n,
        &["obrigado", "obrigada", "valeu", "brigado", "tchau", "ate mais", "so isso"],
    )
}

/// Affirmative answer to "anything else I can help with?". Bare words
/// like "ajuda" also appear inside negations, so only whole phrases
/// count here.
pub fn wants_more_help(text: &str) -> bool {
    let n = normalize(text);
    is_yes(text)
        || contains_any(
            &n,
            &["quero ajuda", "preciso de ajuda", "tenho uma duvida", "mais uma duvida", "menu"],
        )
}

pub fn is_fix_cpf(text: &str) -> bool {
    let n = normalize(text);
    n == "1" || contains_any(&n, &["corrigir", "digitei errado", "errei"])
}

pub fn is_create_account(text: &str) -> bool {
    let n = normalize(text);
    n == "2" || contains_any(&n, &["cadastro", "cadastrar", "criar conta", "conta"])
}

pub fn wants_human(text: &str) -> bool {
    let n = normalize(text);
    contains_any(&n, &["atendente", "humano", "pessoa", "falar com alguem"])
}

/// Extract a CPF from free text: keep digits only, accept exactly 11.
pub fn extract_cpf(text: &str) -> Option<String> {
    let digits = only_digits(text);
    (digits.len() == 11).then_some(digits)
}

pub fn only_digits(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// `11122233344` -> `111.222.333-44`. Anything else is returned as-is.
pub fn format_cpf(cpf: &str) -> String {
    let d = only_digits(cpf);
    if d.len() != 11 {
        return cpf.to_string();
    }
    format!("{}.{}.{}-{}", &d[0..3], &d[3..6], &d[6..9], &d[9..11])
}

// ---------------------------------------------------------------------------
