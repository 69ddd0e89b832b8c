//! Structured identifiers and the naming rules that build them.
//!
//! An identifier is an ordered list of segments plus the kind it was resolved
//! for. Scopes contribute the leading segments, kinds contribute a fixed
//! sub-namespace, and the short type name comes last.

use crate::config::Namespaces;
use crate::error::Error;
use std::fmt;

/// Separator used when rendering an identifier as a string.
pub const SEPARATOR: char = '.';

/// Naming context a short type name is resolved under.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum Scope {
    Core,
    Extension(String),
    Module(String),
}

impl Scope {
    /// Extension scope, or core when the name is absent or blank.
    pub fn extension(name: Option<&str>) -> Self {
        match name.map(str::trim) {
            Some(name) if !name.is_empty() => Scope::Extension(name.to_string()),
            _ => Scope::Core,
        }
    }

    /// Module scope, or core when the name is absent or blank.
    pub fn module(name: Option<&str>) -> Self {
        match name.map(str::trim) {
            Some(name) if !name.is_empty() => Scope::Module(name.to_string()),
            _ => Scope::Core,
        }
    }

    pub fn is_core(&self) -> bool {
        matches!(self, Scope::Core)
    }

    /// Leading segments for this scope under the configured roots.
    pub fn root_segments(&self, namespaces: &Namespaces) -> Vec<String> {
        match self {
            Scope::Core => split_segments(&namespaces.core),
            Scope::Extension(name) => {
                let mut segments = split_segments(&namespaces.extensions);
                segments.push(capitalize(name));
                segments
            }
            Scope::Module(name) => {
                let mut segments = split_segments(&namespaces.modules);
                segments.push(capitalize(name));
                segments
            }
        }
    }
}

/// What an identifier names; each kind owns a fixed sub-namespace.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Kind {
    /// A type directly under the scope root.
    Class,
    Controller,
    ApiController,
    Job,
    Model,
    EventSubscriber,
    Schema,
    ValidatorRule,
    ValidatorFilter,
    ConsoleCommand,
    Interface,
}

impl Kind {
    pub const ALL: [Kind; 11] = [
        Kind::Class,
        Kind::Controller,
        Kind::ApiController,
        Kind::Job,
        Kind::Model,
        Kind::EventSubscriber,
        Kind::Schema,
        Kind::ValidatorRule,
        Kind::ValidatorFilter,
        Kind::ConsoleCommand,
        Kind::Interface,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Class => "class",
            Kind::Controller => "controller",
            Kind::ApiController => "api_controller",
            Kind::Job => "job",
            Kind::Model => "model",
            Kind::EventSubscriber => "event_subscriber",
            Kind::Schema => "schema",
            Kind::ValidatorRule => "validator_rule",
            Kind::ValidatorFilter => "validator_filter",
            Kind::ConsoleCommand => "console_command",
            Kind::Interface => "interface",
        }
    }

    /// Segments inserted between the scope root and the short name.
    ///
    /// Event subscribers are the one kind whose sub-namespace depends on the
    /// scope: core events live under `Events`, extension and module
    /// subscribers under `Subscribers`.
    pub fn sub_segments(&self, scope: &Scope) -> &'static [&'static str] {
        match self {
            Kind::Class => &[],
            Kind::Controller => &["Controllers"],
            Kind::ApiController => &["Api"],
            Kind::Job => &["Jobs"],
            Kind::Model => &["Models"],
            Kind::EventSubscriber if scope.is_core() => &["Events"],
            Kind::EventSubscriber => &["Subscribers"],
            Kind::Schema => &["Models", "Schema"],
            Kind::ValidatorRule => &["Validator", "Rule"],
            Kind::ValidatorFilter => &["Validator", "Filter"],
            Kind::ConsoleCommand => &["Console"],
            Kind::Interface => &["Interfaces"],
        }
    }
}

impl TryFrom<&str> for Kind {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        Kind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| Error::UnknownKind(value.to_string()))
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully-qualified type identifier.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Identifier {
    segments: Vec<String>,
    kind: Option<Kind>,
}

impl Identifier {
    /// Build an identifier from scope, kind sub-namespace, and short name.
    pub fn build(namespaces: &Namespaces, scope: &Scope, kind: Kind, short_name: &str) -> Self {
        let mut segments = scope.root_segments(namespaces);
        segments.extend(kind.sub_segments(scope).iter().map(|s| s.to_string()));
        segments.extend(split_segments(short_name));
        Self {
            segments,
            kind: Some(kind),
        }
    }

    /// Parse a rendered identifier. Empty segments are dropped.
    pub fn parse(value: &str) -> Self {
        Self {
            segments: split_segments(value),
            kind: None,
        }
    }

    /// Same segments, one more trailing segment.
    pub fn child(&self, segment: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(split_segments(segment));
        Self {
            segments,
            kind: self.kind,
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn kind(&self) -> Option<Kind> {
        self.kind
    }

    /// Last segment: the short type name.
    pub fn short_name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    /// Everything before the short name, rendered.
    pub fn namespace(&self) -> String {
        let end = self.segments.len().saturating_sub(1);
        self.segments[..end].join(&SEPARATOR.to_string())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join(&SEPARATOR.to_string()))
    }
}

/// Uppercase the first character, leave the rest untouched.
pub fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn split_segments(value: &str) -> Vec<String> {
    value
        .split([SEPARATOR, '\\', '/'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
