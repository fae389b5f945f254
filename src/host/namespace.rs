use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout};

use parking_lot::Mutex;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::{HostError, SubmissionHost};

/// A top-level name defined by the submission
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Function,
    Value(Value),
    /// A value with no JSON form, kept as its `repr`
    Opaque(String),
}

#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum WireBinding {
    Function,
    Value { value: Value },
    Opaque { repr: String },
}

impl From<WireBinding> for Binding {
    fn from(wire: WireBinding) -> Self {
        match wire {
            WireBinding::Function => Self::Function,
            WireBinding::Value { value } => Self::Value(value),
            WireBinding::Opaque { repr } => Self::Opaque(repr),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum LoadReply {
    Bindings(HashMap<String, WireBinding>),
    Error(String),
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum CallReply {
    Ok(Value),
    Raised(String),
}

/// Something a checker can call with JSON arguments
///
/// The outer `Result` reports host failures; the inner one carries the
/// `"<ErrorKind>: <message>"` text of an exception raised by the callee.
pub trait Callable {
    fn name(&self) -> &str;

    fn call(&self, args: &[Value]) -> Result<Result<Value, String>, HostError>;
}

/// Name lookup over a loaded submission
///
/// Checkers only see the submission through this trait, so every symbol is
/// checked for presence and shape before it is used.
pub trait Symbols {
    /// Returns a handle to `name` if the submission defines it as a function
    fn function(&self, name: &str) -> Option<Box<dyn Callable + '_>>;

    /// Returns the value of `name` if the submission defines it as a variable
    fn value(&self, name: &str) -> Option<Value>;
}

/// The loaded submission: its top-level bindings plus a live interpreter
/// session used to invoke its functions
pub struct Namespace {
    bindings: HashMap<String, Binding>,
    session: Mutex<Session>,
}

impl Namespace {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    fn call(&self, name: &str, args: &[Value]) -> Result<Result<Value, String>, HostError> {
        let request = json!({ "call": name, "args": args });
        let reply: CallReply = self.session.lock().request(Some(&request))?;
        Ok(match reply {
            CallReply::Ok(value) => Ok(value),
            CallReply::Raised(message) => Err(message),
        })
    }
}

impl Symbols for Namespace {
    fn function(&self, name: &str) -> Option<Box<dyn Callable + '_>> {
        match self.bindings.get(name) {
            Some(Binding::Function) => Some(Box::new(SubmissionFunction {
                namespace: self,
                name: name.to_string(),
            })),
            _ => None,
        }
    }

    fn value(&self, name: &str) -> Option<Value> {
        match self.bindings.get(name)? {
            Binding::Value(value) => Some(value.clone()),
            Binding::Opaque(repr) => Some(Value::String(repr.clone())),
            Binding::Function => None,
        }
    }
}

pub struct SubmissionFunction<'a> {
    namespace: &'a Namespace,
    name: String,
}

impl Callable for SubmissionFunction<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, args: &[Value]) -> Result<Result<Value, String>, HostError> {
        self.namespace.call(&self.name, args)
    }
}

struct Session {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl Session {
    /// Optionally sends one request line, then reads one reply line
    fn request<T: DeserializeOwned>(&mut self, request: Option<&Value>) -> Result<T, HostError> {
        if let Some(request) = request {
            let mut line = serde_json::to_string(request)
                .map_err(|e| HostError::Protocol(e.to_string()))?;
            line.push('\n');
            self.stdin.write_all(line.as_bytes())?;
            self.stdin.flush()?;
        }

        let mut reply = String::new();
        if self.stdout.read_line(&mut reply)? == 0 {
            return Err(HostError::Protocol(format!(
                "interpreter session ended unexpectedly: {}",
                self.drain_stderr()
            )));
        }

        serde_json::from_str(&reply)
            .map_err(|e| HostError::Protocol(format!("unreadable reply {reply:?}: {e}")))
    }

    fn drain_stderr(&mut self) -> String {
        let mut text = String::new();
        if let Some(stderr) = self.child.stderr.as_mut() {
            let _ = stderr.read_to_string(&mut text);
        }
        text.trim().to_string()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.child.kill() {
            log::debug!("Interpreter session already gone: {e}");
        }
        let _ = self.child.wait();
    }
}

impl SubmissionHost {
    /// Executes the submission at `path` once and exposes its top-level bindings
    ///
    /// Errors raised while loading are returned as [`HostError::Load`] with
    /// file paths scrubbed, never converted into test case records here.
    pub fn load(&self, path: &Path) -> Result<Namespace, HostError> {
        let path_arg = path.to_string_lossy();
        let mut child = self.driver_command(&["session", &path_arg])?.spawn()?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            return Err(HostError::Protocol("interpreter streams unavailable".to_string()));
        };

        let mut session = Session {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        };

        match session.request::<LoadReply>(None)? {
            LoadReply::Error(message) => Err(HostError::Load(self.clean_error(&message))),
            LoadReply::Bindings(bindings) => {
                log::debug!("Loaded submission with {} bindings", bindings.len());
                Ok(Namespace {
                    bindings: bindings
                        .into_iter()
                        .map(|(name, binding)| (name, binding.into()))
                        .collect(),
                    session: Mutex::new(session),
                })
            }
        }
    }
}
