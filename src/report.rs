//! Abstract reporting surface and the runner glue that feeds it.
//!
//! The engine does not own a test framework; it translates block outcomes
//! into the [`Reporter`] contract. The [`Runner`] also captures uncaught
//! host errors raised while a spec runs and books them as failed
//! expectations on that spec.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use crate::block::{Block, Outcome, TestBody};
use crate::error::{Error, Result};

/// One checked expectation within a spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Expectation {
    pub passed: bool,
    pub message: String,
}

/// Final report for one spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestResult {
    pub id: String,
    pub name: String,
    pub passed: bool,
    pub expectations: Vec<Expectation>,
    pub disabled: bool,
}

/// Consumer of suite and spec lifecycle notifications.
pub trait Reporter {
    fn suite_enter(&self, name: &str);
    fn suite_leave(&self, name: &str);
    fn suite_started(&self, name: &str);
    fn suite_finished(&self, name: &str);
    fn test_started(&self, id: &str, name: &str);
    fn test_finished(&self, result: &TestResult);
}

struct CurrentSpec {
    id: String,
    name: String,
    block: Block,
}

struct RunnerInner {
    reporter: Rc<dyn Reporter>,
    current: Option<CurrentSpec>,
}

/// Translates block outcomes to the reporter interface, one spec at a time.
#[derive(Clone)]
pub struct Runner {
    inner: Rc<RefCell<RunnerInner>>,
}

impl Runner {
    #[must_use]
    pub fn new(reporter: Rc<dyn Reporter>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(RunnerInner {
                reporter,
                current: None,
            })),
        }
    }

    pub fn enter_suite(&self, name: &str) {
        let reporter = self.reporter();
        reporter.suite_enter(name);
        reporter.suite_started(name);
    }

    pub fn leave_suite(&self, name: &str) {
        let reporter = self.reporter();
        reporter.suite_finished(name);
        reporter.suite_leave(name);
    }

    /// Run one spec through a block. The result is reported when the block
    /// fully resolves, which may be after this call returns.
    pub fn run_spec(&self, id: &str, name: &str, block: Block, body: TestBody) {
        self.reporter().test_started(id, name);
        {
            let mut inner = self.inner.borrow_mut();
            inner.current = Some(CurrentSpec {
                id: id.to_owned(),
                name: name.to_owned(),
                block: block.clone(),
            });
        }

        let runner = self.clone();
        block.run(body, move |outcome| runner.finish_spec(&outcome));
    }

    /// Report a disabled spec without running anything.
    pub fn skip_spec(&self, id: &str, name: &str) {
        let reporter = self.reporter();
        reporter.test_started(id, name);
        reporter.test_finished(&TestResult {
            id: id.to_owned(),
            name: name.to_owned(),
            passed: false,
            expectations: Vec::new(),
            disabled: true,
        });
    }

    /// Route an uncaught host error to the running spec as a failed
    /// expectation. Errors with no spec running are the caller's problem.
    pub fn report_uncaught(&self, message: &str) -> Result<()> {
        let inner = self.inner.borrow();
        match &inner.current {
            Some(current) if current.block.is_running() => {
                tracing::warn!(
                    event = "runner.uncaught",
                    spec = %current.id,
                    message,
                    "Uncaught error attributed to running spec"
                );
                current.block.note_failure(message);
                Ok(())
            }
            _ => Err(Error::Callback(format!(
                "uncaught error with no spec running: {message}"
            ))),
        }
    }

    fn finish_spec(&self, outcome: &Outcome) {
        let (reporter, current) = {
            let mut inner = self.inner.borrow_mut();
            (inner.reporter.clone(), inner.current.take())
        };
        let Some(current) = current else {
            return;
        };

        let expectations = match outcome {
            Outcome::Passed => Vec::new(),
            Outcome::Failed(messages) => messages
                .iter()
                .map(|message| Expectation {
                    passed: false,
                    message: message.clone(),
                })
                .collect(),
        };
        reporter.test_finished(&TestResult {
            id: current.id,
            name: current.name,
            passed: outcome.passed(),
            expectations,
            disabled: false,
        });
    }

    fn reporter(&self) -> Rc<dyn Reporter> {
        self.inner.borrow().reporter.clone()
    }
}

impl fmt::Debug for Runner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Runner")
            .field("current", &inner.current.as_ref().map(|c| c.id.clone()))
            .finish_non_exhaustive()
    }
}

/// Reporter that records everything it hears, for tests and debugging.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub events: RefCell<Vec<String>>,
    pub results: RefCell<Vec<TestResult>>,
}

impl Reporter for RecordingReporter {
    fn suite_enter(&self, name: &str) {
        self.events.borrow_mut().push(format!("enter {name}"));
    }

    fn suite_leave(&self, name: &str) {
        self.events.borrow_mut().push(format!("leave {name}"));
    }

    fn suite_started(&self, name: &str) {
        self.events.borrow_mut().push(format!("suite-start {name}"));
    }

    fn suite_finished(&self, name: &str) {
        self.events.borrow_mut().push(format!("suite-finish {name}"));
    }

    fn test_started(&self, id: &str, _name: &str) {
        self.events.borrow_mut().push(format!("test-start {id}"));
    }

    fn test_finished(&self, result: &TestResult) {
        self.events
            .borrow_mut()
            .push(format!("test-finish {}", result.id));
        self.results.borrow_mut().push(result.clone());
    }
}
