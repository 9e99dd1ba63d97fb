//! Send-vs-ask classification of the customer's original message.
//!
//! Decides whether a document a tool resolved should actually be delivered.
//! "Please resend my quote PDF" asks for the document; "What's the total on
//! my quote?" asks about its contents and gets a text answer only.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentIntent {
    SendDocument,
    AskAboutContent,
}

/// Verbs that request delivery whatever follows them.
const SEND_VERBS: &[&str] = &[
    "send", "resend", "re-send", "forward", "attach", "download", "share",
];

/// Verbs that are also nouns ("my email is ..."); they only request delivery
/// when a record or pronoun is their object.
const MAIL_VERBS: &[&str] = &["email", "e-mail", "mail", "re-email"];

/// Phrases that ask for the document without a verb.
const COPY_PHRASES: &[&str] = &["copy of", "another copy", "a copy", "the pdf"];

/// Words skipped when looking for the object of a send verb.
const FILLERS: &[&str] = &[
    "me", "us", "him", "her", "my", "our", "your", "the", "a", "an", "over", "again", "back",
    "through", "please", "pls", "across", "along", "updated", "new", "latest", "current",
    "revised", "final", "another", "full", "that", "this",
];

/// Objects that make a send request about delivering the record itself.
const RECORD_NOUNS: &[&str] = &[
    "quote", "quotes", "quotation", "estimate", "invoice", "invoices", "bill", "receipt",
    "statement", "order", "orders", "confirmation", "pdf", "copy", "document", "documents",
    "doc", "file", "attachment", "it", "them", "one",
];

/// Objects that turn "send me ..." into a question about contents.
const CONTENT_OBJECTS: &[&str] = &[
    "total", "totals", "amount", "balance", "price", "prices", "pricing", "cost", "costs",
    "status", "details", "breakdown", "info", "information", "date", "due", "tracking",
    "number", "figure", "figures",
];

/// Generic document words; naming one alongside any send verb wins.
const DOCUMENT_NOUNS: &[&str] = &["pdf", "copy", "document", "file", "attachment"];

/// How far past the verb the object is looked for.
const OBJECT_REACH: usize = 4;

fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push(' ');
    let mut last_space = true;
    for c in text.chars() {
        let c = match c {
            '\u{2019}' | '\u{2018}' => '\'',
            other => other.to_ascii_lowercase(),
        };
        if c.is_alphanumeric() || c == '\'' || c == '-' {
            out.push(c);
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    if !last_space {
        out.push(' ');
    }
    out
}

fn mentions(haystack: &str, cues: &[&str]) -> bool {
    cues.iter().any(|cue| haystack.contains(&format!(" {cue} ")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Object {
    Record,
    Content,
    Other,
}

/// What the verb at `verb` acts on, skipping pronouns and articles.
fn object_of(words: &[&str], verb: usize) -> Object {
    let next = words
        .iter()
        .skip(verb + 1)
        .take(OBJECT_REACH)
        .find(|w| !FILLERS.contains(w));
    match next {
        Some(w) if RECORD_NOUNS.contains(w) => Object::Record,
        Some(w) if CONTENT_OBJECTS.contains(w) => Object::Content,
        _ => Object::Other,
    }
}

/// Classify the customer's message.
///
/// A send verb whose object is a record ("send me my quote", "email the
/// invoice") asks for the document. One whose object is a figure ("send me
/// the total") asks about contents unless a document word appears too.
/// Other words in the sentence, such as "when" or "due", do not override it.
pub fn classify(text: &str) -> DocumentIntent {
    let normalized = normalize(text);
    let words: Vec<&str> = normalized.split_whitespace().collect();

    let mut bare_send = false;
    let mut content_send = false;
    for (i, word) in words.iter().enumerate() {
        let generic = SEND_VERBS.contains(word);
        if !generic && !MAIL_VERBS.contains(word) {
            continue;
        }
        match object_of(&words, i) {
            Object::Record => return DocumentIntent::SendDocument,
            Object::Content => content_send = true,
            Object::Other if generic => bare_send = true,
            Object::Other => {}
        }
    }

    let wants_copy = mentions(&normalized, COPY_PHRASES);
    let names_document = mentions(&normalized, DOCUMENT_NOUNS);
    if (content_send && names_document) || (bare_send && !content_send) || wants_copy {
        DocumentIntent::SendDocument
    } else {
        DocumentIntent::AskAboutContent
    }
}
