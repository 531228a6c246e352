use signer::error::SignerError;
use std::backtrace::Backtrace;
use std::error::Error;
use std::fmt;

fn should_render_backtrace() -> bool {
    matches!(
        std::env::var("RUST_BACKTRACE").as_deref(),
        Ok("1") | Ok("full")
    )
}

pub type RunnerResult<T> = Result<T, RunnerError>;

/// Backtrace captured when a non-signer error is created.
pub struct CapturedBacktrace(Backtrace);

impl CapturedBacktrace {
    fn capture() -> Self {
        Self(Backtrace::capture())
    }
}

impl fmt::Debug for CapturedBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors ending a signing run before a report could be produced.
#[derive(Debug)]
pub enum RunnerError {
    /// Failure raised by the signing core.
    Signer(SignerError),
    /// Invalid or missing configuration.
    Config(Box<dyn Error + Send + Sync>, CapturedBacktrace),
    /// A required environment variable is not set.
    MissingEnvVar(&'static str, CapturedBacktrace),
    Io(std::io::Error, CapturedBacktrace),
}

impl RunnerError {
    pub fn category(&self) -> &'static str {
        match self {
            RunnerError::Signer(_) => "signing error",
            RunnerError::Config(_, _) | RunnerError::MissingEnvVar(_, _) => {
                "configuration error"
            }
            RunnerError::Io(_, _) => "i/o error",
        }
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self {
            RunnerError::Signer(err) => Some(err.backtrace()),
            RunnerError::Config(_, cb)
            | RunnerError::MissingEnvVar(_, cb)
            | RunnerError::Io(_, cb) => Some(&cb.0),
        }
    }

    pub fn config<E: Error + Send + Sync + 'static>(err: E) -> Self {
        RunnerError::Config(Box::new(err), CapturedBacktrace::capture())
    }

    pub fn missing_env_var(name: &'static str) -> Self {
        RunnerError::MissingEnvVar(name, CapturedBacktrace::capture())
    }

    /// Renders the error and its causes for the terminal.
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        out.push_str("release signing failed\n");
        out.push_str(&format!("category: {}\n", self.category()));
        out.push_str(&format!("error: {self}\n"));

        let mut source = Error::source(self);
        let mut idx = 1usize;
        while let Some(err) = source {
            out.push_str(&format!("cause {idx}: {err}\n"));
            source = err.source();
            idx += 1;
        }

        if should_render_backtrace()
            && let Some(backtrace) = self.backtrace()
        {
            out.push_str("backtrace:\n");
            out.push_str(&backtrace.to_string());
            if !out.ends_with('\n') {
                out.push('\n');
            }
        }

        out
    }
}

impl fmt::Display for RunnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerError::Signer(err) => write!(f, "{err}"),
            RunnerError::Config(source, _) => write!(f, "configuration error: {source}"),
            RunnerError::MissingEnvVar(name, _) => {
                write!(f, "environment variable `{name}` is not set")
            }
            RunnerError::Io(source, _) => write!(f, "i/o error: {source}"),
        }
    }
}

impl Error for RunnerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RunnerError::Signer(err) => err.source(),
            RunnerError::Config(source, _) => Some(source.as_ref()),
            RunnerError::MissingEnvVar(_, _) => None,
            RunnerError::Io(source, _) => Some(source),
        }
    }
}

impl From<std::io::Error> for RunnerError {
    fn from(err: std::io::Error) -> Self {
        RunnerError::Io(err, CapturedBacktrace::capture())
    }
}

impl From<SignerError> for RunnerError {
    fn from(err: SignerError) -> Self {
        RunnerError::Signer(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signer_config::shared::ValidationError;

    #[test]
    fn report_lists_the_configuration_cause() {
        let err = RunnerError::config(ValidationError::EmptyField("github.owner".to_string()));

        let report = err.render_report();

        assert!(report.starts_with("release signing failed\ncategory: configuration error\n"));
        assert!(report.contains("error: configuration error: `github.owner` cannot be empty\n"));
        assert!(report.contains("cause 1: `github.owner` cannot be empty\n"));
    }

    #[test]
    fn missing_token_has_no_cause() {
        let report = RunnerError::missing_env_var("GITHUB_PAT").render_report();

        assert!(report.contains("error: environment variable `GITHUB_PAT` is not set\n"));
        assert!(!report.contains("cause"));
    }
}
