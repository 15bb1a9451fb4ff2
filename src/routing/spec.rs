//! Declarative route descriptions.
//!
//! # Responsibilities
//! - Hold the immutable matching contract of one route: path pattern,
//!   methods, media types, predicate lists
//! - Validate construction invariants in the builder
//! - Evaluate a request head against the contract, reporting which
//!   stage rejected it
//!
//! # Design Decisions
//! - One flat builder struct; no inheritance chain of narrowing builders
//! - Patterns compile once at build time; matching allocates only for
//!   parameterized captures
//! - `complexity` grows with segment and predicate count and is used by
//!   the registry as an ordering hint, not a semantic field

use std::collections::HashSet;

use http::{Method, StatusCode};
use regex::Regex;
use thiserror::Error;

use crate::http::media::MediaType;
use crate::http::params::ParamMap;
use crate::http::request::RequestHead;
use crate::routing::predicate::{Predicate, PredicateParseError};

/// How a route's path pattern is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathType {
    /// Byte-for-byte equality.
    Exact,
    /// Pattern is a prefix of the request path.
    Prefix,
    /// Segment-wise matching; `{name}` segments capture.
    Parameterized,
    /// Full-path regular expression match.
    Regex,
    /// Literal-prefix screen, then full-path regular expression match.
    RegexWithPrefix,
}

/// Construction-time route validation failure.
#[derive(Debug, Error)]
pub enum RouteBuildError {
    #[error("route path pattern must be non-empty")]
    EmptyPath,

    #[error("consumes/produces require methods to be set explicitly")]
    MethodsRequired,

    #[error("invalid path pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },

    #[error(transparent)]
    Predicate(#[from] PredicateParseError),
}

#[derive(Debug)]
enum Segment {
    Literal(String),
    Capture(String),
}

#[derive(Debug)]
enum CompiledPath {
    Exact,
    Prefix,
    Parameterized(Vec<Segment>),
    Regex(Regex),
    RegexWithPrefix { literal: String, pattern: Regex },
}

/// Which stage of [`RouteSpec::evaluate`] rejected the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SpecMatch {
    /// Full match; carries parameterized path captures.
    Matched(ParamMap),
    Path,
    Method,
    Consumes,
    Produces,
    Predicate,
}

/// Immutable description of a path pattern, allowed methods, media types
/// and guard predicates.
#[derive(Debug)]
pub struct RouteSpec {
    path_pattern: String,
    path_type: PathType,
    methods: HashSet<Method>,
    consumes: Vec<MediaType>,
    produces: Vec<MediaType>,
    param_predicates: Vec<Predicate>,
    header_predicates: Vec<Predicate>,
    status: StatusCode,
    complexity: u32,
    compiled: CompiledPath,
}

impl RouteSpec {
    pub fn builder() -> RouteSpecBuilder {
        RouteSpecBuilder::default()
    }

    pub fn path_pattern(&self) -> &str {
        &self.path_pattern
    }

    pub fn path_type(&self) -> PathType {
        self.path_type
    }

    pub fn methods(&self) -> &HashSet<Method> {
        &self.methods
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Matching-order hint: higher means more constrained.
    pub fn complexity(&self) -> u32 {
        self.complexity
    }

    /// Evaluate the request head against this route, in order: path,
    /// method, consumes, produces, parameter predicates, header
    /// predicates. The first failing stage short-circuits.
    pub(crate) fn evaluate(&self, head: &RequestHead) -> SpecMatch {
        let captures = match self.match_path(&head.path) {
            Some(captures) => captures,
            None => return SpecMatch::Path,
        };

        if !self.methods.contains(&head.method) {
            return SpecMatch::Method;
        }

        if !self.consumes.is_empty() {
            // A request without a Content-Type carries no body constraint
            // to violate.
            if let Some(content_type) = head.content_type() {
                if !self.consumes.iter().any(|c| c.includes(&content_type)) {
                    return SpecMatch::Consumes;
                }
            }
        }

        if !self.produces.is_empty() {
            let accepted = head.accepted_media();
            // No Accept header means the client accepts anything.
            if !accepted.is_empty()
                && !accepted
                    .iter()
                    .any(|a| self.produces.iter().any(|p| p.compatible(a)))
            {
                return SpecMatch::Produces;
            }
        }

        if !self
            .param_predicates
            .iter()
            .all(|p| p.test(&head.query))
        {
            return SpecMatch::Predicate;
        }

        if !self
            .header_predicates
            .iter()
            .all(|p| p.test(head.headers.as_params()))
        {
            return SpecMatch::Predicate;
        }

        SpecMatch::Matched(captures)
    }

    fn match_path(&self, path: &str) -> Option<ParamMap> {
        match &self.compiled {
            CompiledPath::Exact => (path == self.path_pattern).then(ParamMap::new),
            CompiledPath::Prefix => path.starts_with(&self.path_pattern).then(ParamMap::new),
            CompiledPath::Parameterized(segments) => match_segments(segments, path),
            CompiledPath::Regex(pattern) => pattern.is_match(path).then(ParamMap::new),
            CompiledPath::RegexWithPrefix { literal, pattern } => {
                (path.starts_with(literal.as_str()) && pattern.is_match(path))
                    .then(ParamMap::new)
            }
        }
    }
}

fn match_segments(segments: &[Segment], path: &str) -> Option<ParamMap> {
    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() != segments.len() {
        return None;
    }

    let mut captures = ParamMap::new();
    for (segment, part) in segments.iter().zip(&parts) {
        match segment {
            Segment::Literal(literal) if literal == part => {}
            Segment::Literal(_) => return None,
            Segment::Capture(name) => captures.insert(name.clone(), *part),
        }
    }
    Some(captures)
}

/// Longest leading run of the pattern with no regex metacharacters.
/// Used as a cheap screen before the full regex match.
fn literal_prefix(pattern: &str) -> String {
    pattern
        .chars()
        .take_while(|c| !r"\.+*?()|[]{}^$".contains(*c))
        .collect()
}

fn all_known_methods() -> HashSet<Method> {
    [
        Method::GET,
        Method::HEAD,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
        Method::PATCH,
        Method::TRACE,
    ]
    .into_iter()
    .collect()
}

/// Builder for [`RouteSpec`]; validates invariants in [`build`](Self::build).
#[derive(Debug, Default)]
pub struct RouteSpecBuilder {
    path_pattern: Option<String>,
    path_type: Option<PathType>,
    methods: Option<HashSet<Method>>,
    consumes: Vec<MediaType>,
    produces: Vec<MediaType>,
    param_exprs: Vec<String>,
    header_exprs: Vec<String>,
    status: Option<StatusCode>,
}

impl RouteSpecBuilder {
    pub fn path(mut self, pattern: impl Into<String>) -> Self {
        self.path_pattern = Some(pattern.into());
        self
    }

    /// Defaults to [`PathType::Exact`] when not set.
    pub fn path_type(mut self, path_type: PathType) -> Self {
        self.path_type = Some(path_type);
        self
    }

    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods
            .get_or_insert_with(HashSet::new)
            .extend(methods);
        self
    }

    pub fn consumes(mut self, types: impl IntoIterator<Item = MediaType>) -> Self {
        self.consumes.extend(types);
        self
    }

    pub fn produces(mut self, types: impl IntoIterator<Item = MediaType>) -> Self {
        self.produces.extend(types);
        self
    }

    /// Guard expressions evaluated against query parameters.
    pub fn matches_params<S: Into<String>>(
        mut self,
        exprs: impl IntoIterator<Item = S>,
    ) -> Self {
        self.param_exprs.extend(exprs.into_iter().map(Into::into));
        self
    }

    /// Guard expressions evaluated against headers.
    pub fn matches_headers<S: Into<String>>(
        mut self,
        exprs: impl IntoIterator<Item = S>,
    ) -> Self {
        self.header_exprs.extend(exprs.into_iter().map(Into::into));
        self
    }

    /// Status the dispatcher reports for responses on this route.
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    pub fn build(self) -> Result<RouteSpec, RouteBuildError> {
        let path_pattern = match self.path_pattern {
            Some(p) if !p.is_empty() => p,
            _ => return Err(RouteBuildError::EmptyPath),
        };

        let explicit_methods = self.methods.is_some();
        if !explicit_methods && !(self.consumes.is_empty() && self.produces.is_empty()) {
            return Err(RouteBuildError::MethodsRequired);
        }
        let methods = match self.methods {
            Some(m) if !m.is_empty() => m,
            Some(_) => return Err(RouteBuildError::MethodsRequired),
            None => all_known_methods(),
        };

        let path_type = self.path_type.unwrap_or(PathType::Exact);
        let compiled = compile_path(&path_pattern, path_type)?;

        let param_predicates = self
            .param_exprs
            .iter()
            .map(|e| Predicate::parse(e))
            .collect::<Result<Vec<_>, _>>()?;
        let header_predicates = self
            .header_exprs
            .iter()
            .map(|e| Predicate::parse(e))
            .collect::<Result<Vec<_>, _>>()?;

        let segment_count = path_pattern.split('/').count() as u32;
        let predicate_count = (param_predicates.len() + header_predicates.len()) as u32;
        let media_count = (!self.consumes.is_empty()) as u32 + (!self.produces.is_empty()) as u32;
        let complexity = segment_count + 2 * predicate_count + media_count;

        Ok(RouteSpec {
            path_pattern,
            path_type,
            methods,
            consumes: self.consumes,
            produces: self.produces,
            param_predicates,
            header_predicates,
            status: self.status.unwrap_or(StatusCode::OK),
            complexity,
            compiled,
        })
    }
}

fn compile_path(pattern: &str, path_type: PathType) -> Result<CompiledPath, RouteBuildError> {
    let compile_regex = |p: &str| {
        // Anchor so the pattern must cover the whole path.
        Regex::new(&format!("^(?:{p})$")).map_err(|source| RouteBuildError::InvalidPattern {
            pattern: p.to_string(),
            source,
        })
    };

    Ok(match path_type {
        PathType::Exact => CompiledPath::Exact,
        PathType::Prefix => CompiledPath::Prefix,
        PathType::Parameterized => {
            let segments = pattern
                .split('/')
                .map(|part| {
                    if let Some(name) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                        Segment::Capture(name.to_string())
                    } else {
                        Segment::Literal(part.to_string())
                    }
                })
                .collect();
            CompiledPath::Parameterized(segments)
        }
        PathType::Regex => CompiledPath::Regex(compile_regex(pattern)?),
        PathType::RegexWithPrefix => CompiledPath::RegexWithPrefix {
            literal: literal_prefix(pattern),
            pattern: compile_regex(pattern)?,
        },
    })
}
