use std::path::Path;

use serde::Serialize;

const SYSTEM_PREFIXES: &[&str] = &["std::", "core::", "alloc::", "backtrace::", "__rust"];

/// Call stack captured when a report is built. Frames are ordered oldest first, the way the
/// error tracking service expects them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stacktrace {
    pub frames: Vec<Frame>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Frame {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abs_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lineno: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colno: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pre_context: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_line: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub post_context: Vec<String>,
    pub in_app: bool,
}

impl Stacktrace {
    /// Captures the current call stack.
    ///
    /// Frames belonging to the unwinder are always dropped. `skip` further frames are dropped
    /// after those, starting with this function's own frame. Returns `None` when nothing is left.
    #[inline(never)]
    pub fn capture(skip: usize, context_lines: usize) -> Option<Stacktrace> {
        let backtrace = backtrace::Backtrace::new();

        let mut frames: Vec<Frame> = backtrace
            .frames()
            .iter()
            .skip_while(|frame| {
                frame.symbols().iter().any(|symbol| {
                    symbol
                        .name()
                        .map(|name| is_unwinder(&format!("{:#}", name)))
                        .unwrap_or(false)
                })
            })
            .skip(skip)
            .flat_map(|frame| frame.symbols())
            .map(|symbol| {
                let function = symbol.name().map(|name| format!("{:#}", name));
                let in_app = function.as_deref().map(is_in_app).unwrap_or(false);
                let mut frame = Frame {
                    function,
                    filename: symbol
                        .filename()
                        .and_then(|p| p.file_name())
                        .map(|f| f.to_string_lossy().into_owned()),
                    abs_path: symbol.filename().map(|p| p.to_string_lossy().into_owned()),
                    lineno: symbol.lineno(),
                    colno: symbol.colno(),
                    in_app,
                    ..Default::default()
                };
                if let (Some(path), Some(lineno)) = (symbol.filename(), symbol.lineno()) {
                    add_source_context(&mut frame, path, lineno, context_lines);
                }
                frame
            })
            .collect();

        if frames.is_empty() {
            return None;
        }

        frames.reverse();
        Some(Stacktrace { frames })
    }
}

fn is_unwinder(function: &str) -> bool {
    function.trim_start_matches('<').starts_with("backtrace::")
}

fn is_in_app(function: &str) -> bool {
    let function = function.trim_start_matches('<');
    !SYSTEM_PREFIXES
        .iter()
        .any(|prefix| function.starts_with(prefix))
}

fn add_source_context(frame: &mut Frame, path: &Path, lineno: u32, context_lines: usize) {
    if context_lines == 0 || lineno == 0 {
        return;
    }

    let Ok(source) = std::fs::read_to_string(path) else {
        return;
    };

    let lines: Vec<&str> = source.lines().collect();
    let index = (lineno - 1) as usize;
    let Some(line) = lines.get(index) else {
        return;
    };

    let start = index.saturating_sub(context_lines);
    let end = (index + 1 + context_lines).min(lines.len());

    frame.pre_context = lines[start..index].iter().map(|l| l.to_string()).collect();
    frame.context_line = Some(line.to_string());
    frame.post_context = lines[index + 1..end]
        .iter()
        .map(|l| l.to_string())
        .collect();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_system_frames() {
        assert!(!is_in_app("std::rt::lang_start"));
        assert!(!is_in_app("<core::pin::Pin<P> as core::future::Future>::poll"));
        assert!(is_in_app("sentry_tee::sentry::core::SentryCore::write"));
        assert!(is_unwinder("backtrace::capture::Backtrace::new"));
        assert!(is_unwinder("<backtrace::capture::Backtrace>::create"));
    }

    #[test]
    fn reads_surrounding_lines() {
        let path = std::env::temp_dir().join(format!("sentry-tee-ctx-{}.rs", uuid::Uuid::new_v4()));
        std::fs::write(&path, "one\ntwo\nthree\nfour\nfive\nsix\n").unwrap();

        let mut frame = Frame::default();
        add_source_context(&mut frame, &path, 3, 3);

        assert_eq!(frame.pre_context, vec!["one", "two"]);
        assert_eq!(frame.context_line.as_deref(), Some("three"));
        assert_eq!(frame.post_context, vec!["four", "five", "six"]);

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn out_of_range_lines_are_ignored() {
        let mut frame = Frame::default();
        add_source_context(&mut frame, Path::new("/definitely/not/here.rs"), 10, 3);
        assert_eq!(frame, Frame::default());
    }

    #[test]
    fn captures_frames_oldest_first() {
        let trace = Stacktrace::capture(0, 0).expect("stack should not be empty");
        assert!(!trace.frames.is_empty());
        assert!(trace
            .frames
            .iter()
            .all(|f| f.function.as_deref().map(|n| !is_unwinder(n)).unwrap_or(true)));
    }
}
