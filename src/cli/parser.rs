use thiserror::Error;

pub const SUPPORTED_METHODS: [&str; 5] = ["GET", "HEAD", "DELETE", "PUT", "POST"];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("method \"{0}\" is not supported")]
    UnsupportedMethod(String),

    #[error("expected at most 3 arguments (method, path, body), got {0}")]
    TooManyArguments(usize),
}

/// A validated request: upper-case method, `/`-prefixed path, raw body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputParser {
    method: String,
    url: String,
    body: String,
}

impl InputParser {
    /// `[]` is `GET /`; otherwise `method [path [body]]`.
    pub fn new<S: AsRef<str>>(args: &[S]) -> Result<Self, ParseError> {
        if args.len() > 3 {
            return Err(ParseError::TooManyArguments(args.len()));
        }

        let arg = |i: usize| args.get(i).map(|s| s.as_ref());
        let method = arg(0).unwrap_or("GET").to_ascii_uppercase();
        if !SUPPORTED_METHODS.contains(&method.as_str()) {
            return Err(ParseError::UnsupportedMethod(method));
        }

        let url = match arg(1).unwrap_or("/") {
            u if u.starts_with('/') => u.to_string(),
            u => format!("/{u}"),
        };

        Ok(Self {
            method,
            url,
            body: arg(2).unwrap_or_default().to_string(),
        })
    }

    /// Splits a REPL line into method and path; whatever follows the path is
    /// the body verbatim, so JSON with spaces survives.
    pub fn from_line(line: &str) -> Result<Self, ParseError> {
        let mut rest = line.trim();
        let mut args = Vec::with_capacity(3);

        while args.len() < 2 && !rest.is_empty() {
            match rest.split_once(char::is_whitespace) {
                Some((token, tail)) => {
                    args.push(token);
                    rest = tail.trim_start();
                }
                None => {
                    args.push(rest);
                    rest = "";
                }
            }
        }
        if !rest.is_empty() {
            args.push(rest);
        }

        Self::new(&args)
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}
