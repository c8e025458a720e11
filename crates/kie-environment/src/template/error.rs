//! Template error types

use std::fmt;

use minijinja::ErrorKind;

/// Errors that can occur while rendering a configuration template
#[derive(Debug)]
pub enum TemplateError {
    /// Template rendering failed
    Render(minijinja::Error),
    /// Template syntax is invalid
    Syntax(String),
    /// A referenced value is undefined
    Undefined(String),
    /// The context could not be turned into template values
    Context(String),
}

impl TemplateError {
    /// Line of the template the error points at, when known
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Render(e) => e.line(),
            _ => None,
        }
    }
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Render(e) => write!(f, "template render error: {}", e),
            Self::Syntax(msg) => write!(f, "template syntax error: {}", msg),
            Self::Undefined(var) => write!(f, "undefined variable: {}", var),
            Self::Context(msg) => write!(f, "invalid template context: {}", msg),
        }
    }
}

impl std::error::Error for TemplateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Render(e) => Some(e),
            _ => None,
        }
    }
}

impl From<minijinja::Error> for TemplateError {
    fn from(err: minijinja::Error) -> Self {
        let detail = || match err.line() {
            Some(line) => format!("{} (line {})", err.detail().unwrap_or(""), line),
            None => err.detail().unwrap_or("").to_string(),
        };
        match err.kind() {
            ErrorKind::SyntaxError => Self::Syntax(detail()),
            ErrorKind::UndefinedError => Self::Undefined(detail()),
            _ => Self::Render(err),
        }
    }
}

impl From<TemplateError> for kie_common::Error {
    fn from(err: TemplateError) -> Self {
        kie_common::Error::template_in("template", err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TemplateError::Undefined("console.name".to_string());
        assert!(err.to_string().contains("undefined variable"));
        assert!(err.to_string().contains("console.name"));
    }

    #[test]
    fn test_syntax_error_display() {
        let err = TemplateError::Syntax("unexpected end of input".to_string());
        assert!(err.to_string().contains("syntax error"));
    }

    #[test]
    fn converts_into_template_error() {
        let err: kie_common::Error = TemplateError::Syntax("bad".into()).into();
        assert!(matches!(err, kie_common::Error::Template { .. }));
        assert!(!err.is_retryable());
    }
}
