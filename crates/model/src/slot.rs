//! Reference-or-inline slots.
//!
//! A slot is decided once, at decode time: a child sub-document that carries
//! its own `kind` tag is inlined as a complete value; otherwise only the
//! by-name reference survives. The resolution pass later attaches a copy of
//! the referenced entity next to the name, so both stay inspectable.

use serde::Serialize;

/// A field that either embeds a complete child entity or names another
/// entity of the same kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Linked<T> {
    /// Complete sub-document inlined at decode time.
    Inline(T),
    /// By-name reference; `resolved` is attached during the resolution pass.
    Ref(NamedRef<T>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedRef<T> {
    pub name: String,
    pub resolved: Option<T>,
}

impl<T> Linked<T> {
    pub fn inline(value: T) -> Self {
        Linked::Inline(value)
    }

    pub fn reference(name: impl Into<String>) -> Self {
        Linked::Ref(NamedRef { name: name.into(), resolved: None })
    }

    /// Build a slot from an optional inline value and a by-name reference.
    /// The two are mutually exclusive; an inline value wins, an empty name
    /// means "no slot at all".
    pub fn from_parts(inline: Option<T>, name: String) -> Option<Self> {
        match inline {
            Some(value) => Some(Linked::Inline(value)),
            None if !name.is_empty() => Some(Linked::reference(name)),
            None => None,
        }
    }

    /// The entity carried by this slot: the inline value, or the resolved
    /// copy once the resolution pass has run.
    pub fn entity(&self) -> Option<&T> {
        match self {
            Linked::Inline(value) => Some(value),
            Linked::Ref(named) => named.resolved.as_ref(),
        }
    }

    /// The reference name, for by-name slots.
    pub fn ref_name(&self) -> Option<&str> {
        match self {
            Linked::Inline(_) => None,
            Linked::Ref(named) => Some(named.name.as_str()),
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, Linked::Inline(_))
    }
}
