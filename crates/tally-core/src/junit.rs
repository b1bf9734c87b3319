//! JUnit XML parsing.
//!
//! Build artifacts carry standard `<testsuites>` documents, but plenty
//! of producers emit a bare `<testsuite>` at the root instead; both are
//! accepted. Each shape is one event-reader pass; the bare-suite form is
//! tried second and both diagnostics are reported when neither fits.

use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

/// A parsed document: one or more test suites.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Suites {
    pub suites: Vec<Suite>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Suite {
    pub name: String,
    pub time: f64,
    pub cases: Vec<Case>,
}

/// One `<testcase>` element.
///
/// `failure`, `skipped` and `output` hold the child element's text when
/// it is present; an empty self-closing child yields an empty string,
/// which is distinct from the child being absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Case {
    pub name: String,
    pub class_name: String,
    pub time: f64,
    pub failure: Option<String>,
    pub skipped: Option<String>,
    pub output: Option<String>,
}

#[derive(Debug, Error)]
pub enum JunitError {
    /// Neither document shape parsed; carries both attempts' diagnostics.
    #[error("not a valid testsuites ({suites_err}) nor testsuite ({suite_err}) document")]
    InvalidDocument { suites_err: String, suite_err: String },
}

/// Error of a single parse attempt against one expected root element.
#[derive(Debug, Error)]
enum AttemptError {
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("document is not utf-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("invalid {attr} attribute {value:?}")]
    InvalidAttr { attr: &'static str, value: String },
    #[error("unexpected root element <{found}>, wanted <{want}>")]
    UnexpectedRoot { found: String, want: &'static str },
    #[error("document has no root element")]
    NoRoot,
}

#[derive(Clone, Copy, PartialEq)]
enum RootKind {
    Suites,
    Suite,
}

impl RootKind {
    fn element(self) -> &'static str {
        match self {
            RootKind::Suites => "testsuites",
            RootKind::Suite => "testsuite",
        }
    }
}

#[derive(Clone, Copy)]
enum Capture {
    Failure,
    Skipped,
    Output,
}

/// Parse a JUnit payload, accepting either a `<testsuites>` or a bare
/// `<testsuite>` root.
pub fn parse(buf: &[u8]) -> Result<Suites, JunitError> {
    match parse_root(buf, RootKind::Suites) {
        Ok(suites) => Ok(suites),
        Err(outer) => match parse_root(buf, RootKind::Suite) {
            Ok(suites) => Ok(suites),
            Err(inner) => Err(JunitError::InvalidDocument {
                suites_err: outer.to_string(),
                suite_err: inner.to_string(),
            }),
        },
    }
}

fn parse_root(buf: &[u8], want: RootKind) -> Result<Suites, AttemptError> {
    let text = std::str::from_utf8(buf)?;
    let mut reader = Reader::from_str(text);

    // Element depths for the two accepted shapes. Only direct children
    // are collected; anything nested deeper (properties, nested suites)
    // is skipped.
    let suite_depth = match want {
        RootKind::Suites => 2,
        RootKind::Suite => 1,
    };
    let case_depth = suite_depth + 1;
    let child_depth = case_depth + 1;

    let mut out = Suites::default();
    let mut seen_root = false;
    let mut depth = 0usize;
    let mut suite: Option<Suite> = None;
    let mut case: Option<Case> = None;
    let mut capture: Option<Capture> = None;
    let mut text_buf = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                if depth == 1 {
                    check_root(&e, want, &mut seen_root)?;
                    if want == RootKind::Suite {
                        suite = Some(suite_from_attrs(&e)?);
                    }
                } else if depth == suite_depth && e.local_name().as_ref() == b"testsuite" {
                    suite = Some(suite_from_attrs(&e)?);
                } else if depth == case_depth
                    && suite.is_some()
                    && e.local_name().as_ref() == b"testcase"
                {
                    case = Some(case_from_attrs(&e)?);
                } else if depth == child_depth && case.is_some() {
                    capture = match e.local_name().as_ref() {
                        b"failure" => Some(Capture::Failure),
                        b"skipped" => Some(Capture::Skipped),
                        b"system-out" => Some(Capture::Output),
                        _ => None,
                    };
                    text_buf.clear();
                }
            }
            Event::Empty(e) => {
                // A self-closing element: same shape rules as Start, but
                // it opens and closes in place.
                let at = depth + 1;
                if at == 1 {
                    check_root(&e, want, &mut seen_root)?;
                    if want == RootKind::Suite {
                        out.suites.push(suite_from_attrs(&e)?);
                    }
                } else if at == suite_depth && e.local_name().as_ref() == b"testsuite" {
                    out.suites.push(suite_from_attrs(&e)?);
                } else if at == case_depth
                    && e.local_name().as_ref() == b"testcase"
                {
                    if let Some(s) = suite.as_mut() {
                        s.cases.push(case_from_attrs(&e)?);
                    }
                } else if at == child_depth {
                    if let Some(c) = case.as_mut() {
                        match e.local_name().as_ref() {
                            b"failure" => c.failure = Some(String::new()),
                            b"skipped" => c.skipped = Some(String::new()),
                            b"system-out" => c.output = Some(String::new()),
                            _ => {}
                        }
                    }
                }
            }
            Event::End(e) => {
                if depth == child_depth {
                    if let (Some(cap), Some(c)) = (capture.take(), case.as_mut()) {
                        let text = std::mem::take(&mut text_buf);
                        match cap {
                            Capture::Failure => c.failure = Some(text),
                            Capture::Skipped => c.skipped = Some(text),
                            Capture::Output => c.output = Some(text),
                        }
                    }
                } else if depth == case_depth && e.local_name().as_ref() == b"testcase" {
                    if let (Some(c), Some(s)) = (case.take(), suite.as_mut()) {
                        s.cases.push(c);
                    }
                } else if depth == suite_depth && e.local_name().as_ref() == b"testsuite" {
                    if let Some(s) = suite.take() {
                        out.suites.push(s);
                    }
                }
                depth -= 1;
            }
            Event::Text(t) => {
                if capture.is_some() {
                    text_buf.push_str(&t.unescape()?);
                }
            }
            Event::CData(t) => {
                if capture.is_some() {
                    text_buf.push_str(&String::from_utf8_lossy(&t.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(AttemptError::NoRoot);
    }
    Ok(out)
}

fn check_root(e: &BytesStart, want: RootKind, seen_root: &mut bool) -> Result<(), AttemptError> {
    let found = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
    if found != want.element() {
        return Err(AttemptError::UnexpectedRoot {
            found,
            want: want.element(),
        });
    }
    *seen_root = true;
    Ok(())
}

fn suite_from_attrs(e: &BytesStart) -> Result<Suite, AttemptError> {
    let mut suite = Suite::default();
    for attr in e.attributes().flatten() {
        let value = String::from_utf8_lossy(&attr.value).into_owned();
        match attr.key.local_name().as_ref() {
            b"name" => suite.name = value,
            b"time" => suite.time = parse_time(&value)?,
            _ => {}
        }
    }
    Ok(suite)
}

fn case_from_attrs(e: &BytesStart) -> Result<Case, AttemptError> {
    let mut case = Case::default();
    for attr in e.attributes().flatten() {
        let value = String::from_utf8_lossy(&attr.value).into_owned();
        match attr.key.local_name().as_ref() {
            b"name" => case.name = value,
            b"classname" => case.class_name = value,
            b"time" => case.time = parse_time(&value)?,
            _ => {}
        }
    }
    Ok(case)
}

fn parse_time(value: &str) -> Result<f64, AttemptError> {
    if value.is_empty() {
        return Ok(0.0);
    }
    value.parse().map_err(|_| AttemptError::InvalidAttr {
        attr: "time",
        value: value.to_string(),
    })
}
