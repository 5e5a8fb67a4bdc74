//! Placeholder substitution for step commands and paths
//!
//! `{server}`, `{host}`, `{farm}` and `{tag.<key>}` are replaced from the
//! target server. `${VAR}` is left for the shell.

use regex::Regex;
use sequencing::ServerTarget;
use std::sync::LazyLock;
use thiserror::Error;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\$?)\{([A-Za-z_][A-Za-z0-9_.-]*)\}").expect("Invalid placeholder regex")
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unknown placeholder {{{0}}}")]
    Unknown(String),

    #[error("placeholder {{{0}}} needs a target server")]
    NeedsServer(String),

    #[error("server [{server}] has no tag '{tag}'")]
    MissingTag { server: String, tag: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placeholder<'a> {
    Server,
    Host,
    Farm,
    Tag(&'a str),
}

impl<'a> Placeholder<'a> {
    fn parse(name: &'a str) -> Result<Self, TemplateError> {
        match name {
            "server" => Ok(Self::Server),
            "host" => Ok(Self::Host),
            "farm" => Ok(Self::Farm),
            _ => match name.strip_prefix("tag.") {
                Some(key) if !key.is_empty() => Ok(Self::Tag(key)),
                _ => Err(TemplateError::Unknown(name.to_string())),
            },
        }
    }

    fn value(self, server: &ServerTarget) -> Result<String, TemplateError> {
        match self {
            Self::Server => Ok(server.name.clone()),
            Self::Host => Ok(server.address().to_string()),
            Self::Farm => Ok(server.load_balancer_farm.clone()),
            Self::Tag(key) => server
                .tag(key)
                .map(str::to_string)
                .ok_or_else(|| TemplateError::MissingTag {
                    server: server.name.clone(),
                    tag: key.to_string(),
                }),
        }
    }
}

/// A string with server placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    raw: String,
}

impl Template {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    fn names(&self) -> impl Iterator<Item = &str> {
        PLACEHOLDER.captures_iter(&self.raw).filter_map(|caps| {
            if caps[1].is_empty() {
                caps.get(2).map(|m| m.as_str())
            } else {
                None
            }
        })
    }

    /// Problems that would make `render` fail for any server
    pub fn check(&self, has_server: bool) -> Vec<TemplateError> {
        self.names()
            .filter_map(|name| match Placeholder::parse(name) {
                Err(err) => Some(err),
                Ok(_) if !has_server => Some(TemplateError::NeedsServer(name.to_string())),
                Ok(_) => None,
            })
            .collect()
    }

    /// Substitute every placeholder
    pub fn render(&self, server: Option<&ServerTarget>) -> Result<String, TemplateError> {
        let mut rendered = String::with_capacity(self.raw.len());
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(&self.raw) {
            if !caps[1].is_empty() {
                continue;
            }
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(2)) else {
                continue;
            };
            let placeholder = Placeholder::parse(name.as_str())?;
            let server =
                server.ok_or_else(|| TemplateError::NeedsServer(name.as_str().to_string()))?;

            rendered.push_str(&self.raw[last..whole.start()]);
            rendered.push_str(&placeholder.value(server)?);
            last = whole.end();
        }

        rendered.push_str(&self.raw[last..]);
        Ok(rendered)
    }
}
