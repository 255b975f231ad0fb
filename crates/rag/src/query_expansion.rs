//! Query expansion for improved retrieval
//!
//! Widens a raw follower query with:
//! - Acronym expansion (word-boundary only, never substring)
//! - Domain synonyms for creator-economy sales vocabulary
//!
//! Pure string processing, no LLM or network calls.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

/// Query expander for retrieval
///
/// Produces a small ordered list of query variants, original first.
/// Acronyms are substituted before synonyms; expansion short-circuits
/// once the cap is reached.
pub struct QueryExpander {
    /// Term -> synonyms, keys lowercase
    synonyms: RwLock<HashMap<String, Vec<String>>>,
    /// Acronym -> expansion, keys lowercase
    acronyms: RwLock<HashMap<String, String>>,
}

impl QueryExpander {
    /// Create an expander with the default creator-sales dictionaries
    pub fn new() -> Self {
        let expander = Self {
            synonyms: RwLock::new(HashMap::new()),
            acronyms: RwLock::new(HashMap::new()),
        };
        expander.load_default_dictionaries();
        expander
    }

    fn load_default_dictionaries(&self) {
        let synonyms: Vec<(&str, Vec<&str>)> = vec![
            // Pricing
            ("precio", vec!["coste", "valor", "tarifa"]),
            ("cuesta", vec!["vale", "precio"]),
            ("barato", vec!["económico", "asequible"]),
            ("caro", vec!["costoso", "elevado"]),
            ("descuento", vec!["oferta", "promoción", "rebaja"]),
            // Products
            ("curso", vec!["formación", "programa", "training"]),
            ("mentoría", vec!["mentoring", "asesoría", "acompañamiento"]),
            ("clase", vec!["sesión", "lección"]),
            ("plantilla", vec!["template", "recurso"]),
            ("ebook", vec!["guía", "libro digital"]),
            // Purchase process
            ("comprar", vec!["adquirir", "contratar", "pagar"]),
            ("pago", vec!["transferencia", "tarjeta", "checkout"]),
            ("reserva", vec!["cita", "agenda", "booking"]),
            ("factura", vec!["recibo", "invoice"]),
            // Support
            ("problema", vec!["error", "fallo", "incidencia"]),
            ("acceso", vec!["login", "entrar", "cuenta"]),
            ("devolución", vec!["reembolso", "garantía"]),
            // English mirror terms for bilingual creators
            ("price", vec!["cost", "fee"]),
            ("course", vec!["program", "training"]),
            ("refund", vec!["return", "money back"]),
        ];

        let mut syn_map = self.synonyms.write();
        for (term, syns) in synonyms {
            syn_map.insert(
                term.to_string(),
                syns.iter().map(|s| s.to_string()).collect(),
            );
        }
        drop(syn_map);

        let acronyms: Vec<(&str, &str)> = vec![
            ("ia", "inteligencia artificial"),
            ("rrss", "redes sociales"),
            ("dm", "mensaje directo"),
            ("info", "información"),
            ("seo", "posicionamiento en buscadores"),
            ("cm", "community manager"),
            ("faq", "preguntas frecuentes"),
            ("pdf", "documento pdf"),
        ];

        let mut acr_map = self.acronyms.write();
        for (acronym, expansion) in acronyms {
            acr_map.insert(acronym.to_string(), expansion.to_string());
        }
    }

    /// Expand a query into at most `max_expansions + 1` variants.
    ///
    /// The original query is always first and duplicates are dropped.
    /// Acronym substitution runs first (token-level, word-boundary only),
    /// then synonym substitution with the first 2 synonyms per matched
    /// term, short-circuiting once the cap is reached.
    pub fn expand(&self, query: &str, max_expansions: usize) -> Vec<String> {
        let mut variants = vec![query.to_string()];
        let query_lower = query.to_lowercase();
        let tokens: Vec<&str> = query_lower.split_whitespace().collect();

        // Acronym pass: whole-token replacement, never substring
        let acronyms = self.acronyms.read();
        for (i, token) in tokens.iter().enumerate() {
            if variants.len() > max_expansions {
                break;
            }
            let stripped = token.trim_matches(|c: char| !c.is_alphanumeric());
            if let Some(expansion) = acronyms.get(stripped) {
                let mut replaced: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
                replaced[i] = token.replace(stripped, expansion);
                push_unique(&mut variants, replaced.join(" "));
            }
        }
        drop(acronyms);

        // Synonym pass: first 2 synonyms of each matched term
        let synonyms = self.synonyms.read();
        'outer: for (i, token) in tokens.iter().enumerate() {
            let stripped = token.trim_matches(|c: char| !c.is_alphanumeric());
            if let Some(syns) = synonyms.get(stripped) {
                for syn in syns.iter().take(2) {
                    if variants.len() > max_expansions {
                        break 'outer;
                    }
                    let mut replaced: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
                    replaced[i] = token.replace(stripped, syn);
                    push_unique(&mut variants, replaced.join(" "));
                }
            }
        }

        variants
    }

    /// All whitespace tokens across the expanded variants, used to
    /// widen the lexical query set. `max_expansions == 0` yields only
    /// the original query's tokens.
    pub fn expand_tokens(&self, query: &str, max_expansions: usize) -> HashSet<String> {
        self.expand(query, max_expansions)
            .iter()
            .flat_map(|variant| variant.split_whitespace())
            .map(|token| token.to_lowercase())
            .collect()
    }

    /// Register a custom synonym list, case-insensitive on the key
    pub fn add_synonym(&self, term: &str, synonyms: &[&str]) {
        self.synonyms.write().insert(
            term.to_lowercase(),
            synonyms.iter().map(|s| s.to_lowercase()).collect(),
        );
    }

    /// Register a custom acronym, case-insensitive on the key
    pub fn add_acronym(&self, acronym: &str, expansion: &str) {
        self.acronyms
            .write()
            .insert(acronym.to_lowercase(), expansion.to_string());
    }
}

impl Default for QueryExpander {
    fn default() -> Self {
        Self::new()
    }
}

fn push_unique(variants: &mut Vec<String>, candidate: String) {
    if !variants.contains(&candidate) {
        variants.push(candidate);
    }
}
